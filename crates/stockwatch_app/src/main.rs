mod config;
mod logging;
mod settings;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use stockwatch_core::TargetConfig;
use stockwatch_engine::{
    CheckRunner, CheckSettings, Clock, FetchSettings, LogNotifier, Notifier, Orchestrator,
    ReqwestTransport, RetryingFetcher, RunSummary, SmtpNotifier, ThrottleStore,
};
use stockwatch_logging::{watch_error, watch_info, watch_warn};

use crate::settings::AppSettings;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

fn main() {
    let settings = AppSettings::from_env(std::env::args().nth(1));
    logging::initialize(settings.log_destination, settings.log_level);

    watch_info!("Run started");
    match run(&settings) {
        Ok(summary) => watch_info!(
            "Run finished: {} target(s), {} found, {} failed",
            summary.reports.len(),
            summary.found(),
            summary.failed()
        ),
        Err(err) => watch_error!("Run finished with error: {:#}", err),
    }
    // Target outcomes never affect the exit status.
}

fn run(settings: &AppSettings) -> anyhow::Result<RunSummary> {
    let targets = config::load_targets(&settings.config_path)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(check_all(settings, targets))
}

async fn check_all(
    settings: &AppSettings,
    targets: Vec<TargetConfig>,
) -> anyhow::Result<RunSummary> {
    let transport =
        ReqwestTransport::new(FetchSettings::default()).context("failed to build HTTP client")?;
    let fetcher = Arc::new(RetryingFetcher::new(transport));
    let notifier = build_notifier(settings)?;
    let store = Arc::new(ThrottleStore::open(&settings.throttle_path));
    let clock: Clock = Arc::new(|| Utc::now().timestamp_micros() as f64 / 1_000_000.0);

    let runner = CheckRunner::new(fetcher, notifier, store)
        .with_settings(CheckSettings {
            proxy_prefix: settings.proxy_prefix.clone(),
            retry_delay: settings.retry_delay,
            ..CheckSettings::default()
        })
        .with_clock(clock);
    Ok(Orchestrator::new(runner, settings.max_concurrency)
        .run_all(targets)
        .await)
}

fn build_notifier(settings: &AppSettings) -> anyhow::Result<Arc<dyn Notifier>> {
    match (&settings.smtp_user, &settings.smtp_password) {
        (Some(user), Some(password)) => {
            let smtp = SmtpNotifier::relay(&settings.smtp_host, user, password, SMTP_TIMEOUT)
                .context("failed to configure SMTP")?;
            watch_info!("Sending notifications as {} via {}", user, settings.smtp_host);
            Ok(Arc::new(smtp))
        }
        _ => {
            watch_warn!(
                "SMTP_USER and SMTP_PASSWORD are not both set; matches are only logged and \
                 nobody is notified"
            );
            Ok(Arc::new(LogNotifier))
        }
    }
}
