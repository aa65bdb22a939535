use std::time::Instant;

#[cfg(feature = "profiling")]
use crate::telemetry::tags;
#[cfg(feature = "profiling")]
use std::collections::BTreeSet;
#[cfg(feature = "profiling")]
use std::sync::{OnceLock, RwLock};

/// Microseconds elapsed since `started_at`, clamped to `u64::MAX`.
#[inline]
pub fn elapsed_us(started_at: Instant) -> u64 {
    started_at.elapsed().as_micros().min(u64::MAX as u128) as u64
}

/// Comma-separated tag list restricting which profiling events are emitted.
pub const PROFILE_TAGS_ENV: &str = "LINEPROTO_PROFILE_TAGS";

/// Parses a tag list. `None` means every tag is enabled.
#[cfg(feature = "profiling")]
fn parse_tags<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Option<BTreeSet<String>> {
    let mut enabled = BTreeSet::new();
    for token in tokens {
        let token = token.trim().to_ascii_lowercase();
        match token.as_str() {
            "" => continue,
            "*" | "all" => return None,
            _ => {
                enabled.insert(token);
            }
        }
    }
    (!enabled.is_empty()).then_some(enabled)
}

#[cfg(feature = "profiling")]
fn enabled_tags() -> &'static RwLock<Option<BTreeSet<String>>> {
    static ENABLED: OnceLock<RwLock<Option<BTreeSet<String>>>> = OnceLock::new();
    ENABLED.get_or_init(|| {
        let from_env = std::env::var(PROFILE_TAGS_ENV)
            .ok()
            .and_then(|raw| parse_tags(raw.split(',')));
        RwLock::new(from_env)
    })
}

#[cfg(feature = "profiling")]
fn store_enabled(enabled: Option<BTreeSet<String>>) {
    match enabled_tags().write() {
        Ok(mut guard) => *guard = enabled,
        Err(poisoned) => *poisoned.into_inner() = enabled,
    }
}

/// Restricts profiling output to the given tags; an empty slice enables all.
#[cfg(feature = "profiling")]
pub fn set_enabled_tags(tags: &[&str]) {
    store_enabled(parse_tags(tags.iter().copied()));
}

#[cfg(not(feature = "profiling"))]
pub fn set_enabled_tags(_tags: &[&str]) {}

/// Re-reads the enabled tags from [`PROFILE_TAGS_ENV`].
#[cfg(feature = "profiling")]
pub fn reload_enabled_tags_from_env() {
    let from_env = std::env::var(PROFILE_TAGS_ENV)
        .ok()
        .and_then(|raw| parse_tags(raw.split(',')));
    store_enabled(from_env);
}

#[cfg(not(feature = "profiling"))]
pub fn reload_enabled_tags_from_env() {}

/// Returns true when any tag of the stack is enabled.
#[cfg(feature = "profiling")]
pub fn is_tag_stack_enabled(tag_stack: &[&str]) -> bool {
    let guard = match enabled_tags().read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    match guard.as_ref() {
        None => true,
        Some(enabled) => tag_stack
            .iter()
            .any(|tag| enabled.contains(&tag.to_ascii_lowercase())),
    }
}

#[cfg(not(feature = "profiling"))]
pub fn is_tag_stack_enabled(_tag_stack: &[&str]) -> bool {
    false
}

/// Emits a profiling event on the subsystem's tracing target.
#[cfg(feature = "profiling")]
#[inline]
pub fn event(
    target: &'static str,
    tag_stack: &[&str],
    op: &'static str,
    result: &'static str,
    elapsed_us: u64,
    message: &'static str,
) {
    if !is_tag_stack_enabled(tag_stack) {
        return;
    }

    // tracing needs the target as a literal-like constant per callsite
    match target {
        tags::PROFILE_POOL => {
            tracing::debug!(target: tags::PROFILE_POOL, op, result, elapsed_us, tags = ?tag_stack, "{message}");
        }
        tags::PROFILE_READER => {
            tracing::debug!(target: tags::PROFILE_READER, op, result, elapsed_us, tags = ?tag_stack, "{message}");
        }
        tags::PROFILE_INGEST => {
            tracing::debug!(target: tags::PROFILE_INGEST, op, result, elapsed_us, tags = ?tag_stack, "{message}");
        }
        _ => {
            tracing::debug!(target: "lineproto.profile", op, result, elapsed_us, original_target = target, tags = ?tag_stack, "{message}");
        }
    }
}

#[cfg(not(feature = "profiling"))]
#[inline]
pub fn event(
    _target: &'static str,
    _tag_stack: &[&str],
    _op: &'static str,
    _result: &'static str,
    _elapsed_us: u64,
    _message: &'static str,
) {
}
