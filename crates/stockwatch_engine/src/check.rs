use std::panic;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use scraper::Html;
use stockwatch_core::{RetryPolicy, Stage, TargetConfig};
use stockwatch_logging::{target_tag, watch_debug, watch_error, watch_info, watch_warn};
use tokio::task;

use crate::decode::{decode_html, host_tld};
use crate::fetch::Fetcher;
use crate::locate::{locate, ElementPath};
use crate::notify::{Dispatch, Notifier};
use crate::throttle::ThrottleStore;
use crate::{CheckError, CheckOutcome, CheckReport, Delivery};

/// Source of "now" as Unix seconds.
pub type Clock = Arc<dyn Fn() -> f64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or(0.0)
    })
}

#[derive(Debug, Clone)]
pub struct CheckSettings {
    /// Prepended to the page url for targets that ask for a proxy.
    pub proxy_prefix: Option<String>,
    pub retry_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            proxy_prefix: None,
            retry_delay: Duration::from_secs(1),
            backoff_factor: 1.0,
        }
    }
}

/// Runs one target through fetch, locate, throttle decision and notification.
pub struct CheckRunner {
    fetcher: Arc<dyn Fetcher>,
    notifier: Arc<dyn Notifier>,
    store: Arc<ThrottleStore>,
    settings: CheckSettings,
    clock: Clock,
}

impl CheckRunner {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        notifier: Arc<dyn Notifier>,
        store: Arc<ThrottleStore>,
    ) -> Self {
        Self {
            fetcher,
            notifier,
            store,
            settings: CheckSettings::default(),
            clock: system_clock(),
        }
    }

    pub fn with_settings(mut self, settings: CheckSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub async fn run(&self, target: &TargetConfig) -> CheckReport {
        let tag = target_tag(
            &target.site,
            &target.label,
            &target.element_path,
            &target.monitor_text,
        );
        let outcome = match self.execute(target, &tag).await {
            Ok(outcome) => outcome,
            Err(err) => CheckOutcome::Failed(err),
        };
        log_outcome(&tag, &outcome);
        CheckReport::new(target, outcome)
    }

    async fn execute(&self, target: &TargetConfig, tag: &str) -> Result<CheckOutcome, CheckError> {
        let url = target.effective_url(self.settings.proxy_prefix.as_deref())?;
        let policy = RetryPolicy::new(target.max_retries)
            .with_delay(self.settings.retry_delay)
            .with_backoff(self.settings.backoff_factor);

        watch_debug!("{} stage={:?} url={}", tag, Stage::Fetching, url);
        let output = self.fetcher.fetch(&url, target.timeout(), &policy).await?;

        // The parsed document is not Send; it must be gone before the next await.
        let match_count = {
            watch_debug!("{} stage={:?} bytes={}", tag, Stage::Parsing, output.bytes.len());
            let decoded = decode_html(
                &output.bytes,
                output.metadata.content_type.as_deref(),
                host_tld(&target.page_url).as_deref(),
            );
            if decoded.had_errors {
                watch_warn!(
                    "{} page is not valid {}; invalid bytes replaced",
                    tag,
                    decoded.encoding_label
                );
            }
            let document = Html::parse_document(&decoded.html);

            watch_debug!("{} stage={:?}", tag, Stage::Locating);
            let path = ElementPath::parse(&target.element_path)?;
            locate(&document, &path, &target.monitor_text).len()
        };
        if match_count == 0 {
            return Ok(CheckOutcome::NotFound);
        }

        watch_debug!("{} stage={:?} matches={}", tag, Stage::Deciding, match_count);
        let now = (self.clock)();
        let (eligible, skipped) = self.partition(target, now).await?;
        for recipient in &skipped {
            watch_info!(
                "{} was notified about {} within the last {}s, skipping",
                recipient,
                target.page_url,
                target.cooldown_seconds
            );
        }
        if eligible.is_empty() {
            return Ok(CheckOutcome::Found {
                eligible,
                skipped,
                delivery: Delivery::NoneDue,
            });
        }

        watch_debug!("{} stage={:?} recipients={:?}", tag, Stage::Notifying, eligible);
        let delivery = match self.notifier.send(target, &eligible).await {
            Ok(Dispatch::LoggedOnly) => Delivery::LoggedOnly,
            Ok(Dispatch::Delivered) => {
                let sent_at = (self.clock)();
                match self.record(&eligible, &target.page_url, sent_at).await {
                    Ok(()) => Delivery::Sent,
                    Err(reason) => {
                        watch_error!("{} notification sent but not recorded: {}", tag, reason);
                        Delivery::SentUnrecorded(reason)
                    }
                }
            }
            Err(err) => Delivery::Failed(err),
        };

        Ok(CheckOutcome::Found {
            eligible,
            skipped,
            delivery,
        })
    }

    // Store access is blocking file IO, kept off the async worker threads.

    async fn partition(
        &self,
        target: &TargetConfig,
        now: f64,
    ) -> Result<(Vec<String>, Vec<String>), CheckError> {
        let store = self.store.clone();
        let recipients = target.recipients.clone();
        let page_url = target.page_url.clone();
        let cooldown = target.cooldown_seconds;
        task::spawn_blocking(move || store.partition(&recipients, &page_url, cooldown, now))
            .await
            .map_err(|err| match err.try_into_panic() {
                Ok(payload) => panic::resume_unwind(payload),
                Err(err) => CheckError::Panicked(format!("throttle lookup did not finish: {err}")),
            })
    }

    async fn record(&self, recipients: &[String], page_url: &str, at: f64) -> Result<(), String> {
        let store = self.store.clone();
        let recipients = recipients.to_vec();
        let page_url = page_url.to_string();
        match task::spawn_blocking(move || store.record(&recipients, &page_url, at)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err.to_string()),
            Err(err) => Err(format!("throttle update did not finish: {err}")),
        }
    }
}

fn log_outcome(tag: &str, outcome: &CheckOutcome) {
    match outcome {
        CheckOutcome::NotFound => watch_info!("{} not present", tag),
        CheckOutcome::Found {
            eligible, delivery, ..
        } => match delivery {
            Delivery::NoneDue => watch_info!("{} present; no recipient due for notification", tag),
            Delivery::Sent => watch_info!("{} present; notified {:?}", tag, eligible),
            Delivery::SentUnrecorded(reason) => {
                watch_warn!("{} present; notified {:?} but not recorded: {}", tag, eligible, reason)
            }
            Delivery::LoggedOnly => {
                watch_warn!("{} present; {:?} not notified, message only logged", tag, eligible)
            }
            Delivery::Failed(err) => {
                watch_error!("{} present; notifying {:?} failed: {}", tag, eligible, err)
            }
        },
        CheckOutcome::Failed(err) => {
            watch_error!("{} failed at {:?}: {}", tag, err.stage(), err)
        }
    }
}
