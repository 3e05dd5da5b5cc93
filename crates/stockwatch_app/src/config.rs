use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use stockwatch_core::TargetConfig;
use stockwatch_logging::{watch_error, watch_info};

/// Load the target list, dropping (and logging) entries that fail validation.
pub fn load_targets(path: &Path) -> anyhow::Result<Vec<TargetConfig>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read target config {}", path.display()))?;
    let targets = parse_targets(&raw)
        .with_context(|| format!("failed to parse target config {}", path.display()))?;
    watch_info!("Loaded {} target(s) from {}", targets.len(), path.display());
    Ok(targets)
}

pub fn parse_targets(raw: &str) -> anyhow::Result<Vec<TargetConfig>> {
    let cleaned = strip_json_comments(raw);
    let parsed: Vec<TargetConfig> = serde_json::from_str(&cleaned)?;
    if parsed.is_empty() {
        bail!("no targets configured");
    }

    let valid: Vec<TargetConfig> = parsed
        .into_iter()
        .enumerate()
        .filter_map(|(index, target)| match target.validate() {
            Ok(()) => Some(target),
            Err(err) => {
                watch_error!(
                    "Skipping target #{} ({} / {}): {}",
                    index,
                    target.site,
                    target.label,
                    err
                );
                None
            }
        })
        .collect();
    Ok(valid)
}

/// Remove `//` line comments and `/* */` block comments that sit outside
/// string literals. Newlines are kept so parse errors report real line numbers.
pub fn strip_json_comments(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
            }
            _ => out.push(c),
        }
    }
    out
}
