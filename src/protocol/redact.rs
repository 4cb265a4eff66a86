//! Credential scrubbing for anything that reaches the log.
use std::{borrow::Cow, sync::LazyLock};

use regex::Regex;

pub const REDACTED: &str = "*** REDACTED ***";

// Quoted or bare key, `:` or `=`, then a quoted (escape-aware) or bare value.
static PASSWORD_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(["']?password["']?\s*[:=]\s*)("(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|[^,}\s]+)"#,
    )
    .expect("password pattern")
});

/// Replaces the value of every `password` field in `text`.
pub fn redact(text: &str) -> Cow<'_, str> {
    PASSWORD_FIELD.replace_all(text, |caps: &regex::Captures| {
        format!("{}\"{REDACTED}\"", &caps[1])
    })
}
