/// Separator between recipient and page url in a throttle key.
pub const THROTTLE_KEY_SEPARATOR: char = '|';

pub fn throttle_key(recipient: &str, page_url: &str) -> String {
    format!("{recipient}{THROTTLE_KEY_SEPARATOR}{page_url}")
}

/// True when a recipient last notified at `last_notified` (Unix seconds) may
/// be notified again at `now`.
///
/// A zero cooldown never suppresses, even if the clock stepped backwards.
pub fn is_due(last_notified: Option<f64>, now: f64, cooldown_seconds: u64) -> bool {
    match last_notified {
        None => true,
        Some(_) if cooldown_seconds == 0 => true,
        Some(last) => now - last >= cooldown_seconds as f64,
    }
}
