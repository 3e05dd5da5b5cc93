use stockwatch_core::{ConfigError, FailureKind, Stage, TargetConfig};
use thiserror::Error;

use crate::locate::LocateError;
use crate::notify::NotifyError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub requested_url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} after {attempts} attempt(s): {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
    pub attempts: u32,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            attempts: 1,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// Reasons a check ends without reaching a found/not-found verdict.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    #[error("invalid target: {0}")]
    Config(#[from] ConfigError),
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("locate failed: {0}")]
    Locate(#[from] LocateError),
    #[error("check aborted: {0}")]
    Panicked(String),
}

impl CheckError {
    /// Stage the check was in when it failed.
    pub fn stage(&self) -> Stage {
        match self {
            CheckError::Config(_) | CheckError::Fetch(_) | CheckError::Panicked(_) => {
                Stage::Fetching
            }
            CheckError::Locate(_) => Stage::Locating,
        }
    }
}

/// What happened after the marker was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Every recipient is still inside its cooldown; the notifier was not called.
    NoneDue,
    Sent,
    /// Sent, but the throttle store could not be updated.
    SentUnrecorded(String),
    /// The notifier only logged the message; the throttle store was left untouched.
    LoggedOnly,
    /// The notifier failed; the throttle store was left untouched.
    Failed(NotifyError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    NotFound,
    Found {
        eligible: Vec<String>,
        skipped: Vec<String>,
        delivery: Delivery,
    },
    Failed(CheckError),
}

/// Terminal result of one target check, carrying the target identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub site: String,
    pub label: String,
    pub element_path: Vec<String>,
    pub monitor_text: String,
    pub page_url: String,
    pub outcome: CheckOutcome,
}

impl CheckReport {
    pub fn new(target: &TargetConfig, outcome: CheckOutcome) -> Self {
        Self {
            site: target.site.clone(),
            label: target.label.clone(),
            element_path: target.element_path.clone(),
            monitor_text: target.monitor_text.clone(),
            page_url: target.page_url.clone(),
            outcome,
        }
    }

    pub fn tag(&self) -> String {
        stockwatch_logging::target_tag(
            &self.site,
            &self.label,
            &self.element_path,
            &self.monitor_text,
        )
    }

    pub fn is_found(&self) -> bool {
        matches!(self.outcome, CheckOutcome::Found { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, CheckOutcome::Failed(_))
    }
}

/// Reports of one orchestrated pass, in configuration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub reports: Vec<CheckReport>,
}

impl RunSummary {
    pub fn found(&self) -> usize {
        self.reports.iter().filter(|r| r.is_found()).count()
    }

    pub fn not_found(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.outcome == CheckOutcome::NotFound)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| r.is_failed()).count()
    }

    pub fn notified(&self) -> usize {
        self.reports
            .iter()
            .filter_map(|r| match &r.outcome {
                CheckOutcome::Found {
                    eligible,
                    delivery: Delivery::Sent | Delivery::SentUnrecorded(_),
                    ..
                } => Some(eligible.len()),
                _ => None,
            })
            .sum()
    }
}
