//! Stockwatch core: target configuration and the pure decisions the engine makes.
mod cooldown;
mod failure;
mod retry;
mod stage;
mod target;

pub use cooldown::{is_due, throttle_key, THROTTLE_KEY_SEPARATOR};
pub use failure::FailureKind;
pub use retry::RetryPolicy;
pub use stage::Stage;
pub use target::{
    ConfigError, TargetConfig, DEFAULT_COOLDOWN_SECONDS, DEFAULT_MAX_RETRIES,
    DEFAULT_TIMEOUT_SECONDS,
};
