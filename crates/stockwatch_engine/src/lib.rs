//! Stockwatch engine: fetching, locating, throttling and notifying.
mod check;
mod decode;
mod fetch;
mod locate;
mod notify;
mod orchestrator;
mod persist;
mod throttle;
mod types;

pub use check::{system_clock, CheckRunner, CheckSettings, Clock};
pub use decode::{decode_html, host_tld, DecodedHtml};
pub use fetch::{
    FetchSettings, Fetcher, ReqwestTransport, RetryingFetcher, Transport, DEFAULT_USER_AGENT,
};
pub use locate::{locate, ElementPath, LocateError};
pub use notify::{
    build_email, compose_message, Dispatch, LogNotifier, NotificationMessage, Notifier,
    NotifyError, SmtpNotifier, DEFAULT_SMTP_HOST,
};
pub use orchestrator::{Orchestrator, DEFAULT_MAX_CONCURRENCY};
pub use persist::{ensure_dir, write_atomically, PersistError};
pub use throttle::{StoreError, ThrottleMap, ThrottleStore, DEFAULT_THROTTLE_FILE};
pub use types::{
    CheckError, CheckOutcome, CheckReport, Delivery, FetchError, FetchMetadata, FetchOutput,
    RunSummary,
};

pub use stockwatch_core::{FailureKind, RetryPolicy, Stage, TargetConfig};
