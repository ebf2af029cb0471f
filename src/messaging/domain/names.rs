//! Shared naming rule for topic and subscription components.

/// Pattern every publisher, event, subscriber, and process name must match.
pub const NAME_PATTERN: &str = "^[a-z]+[a-z-]*[a-z]+$";

/// Returns `true` when `value` matches [`NAME_PATTERN`].
///
/// Names are lowercase ASCII letters and hyphens, at least two characters
/// long, and start and end with a letter.
#[must_use]
pub fn is_valid_name(value: &str) -> bool {
    let bytes = value.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };

    bytes.len() >= 2
        && first.is_ascii_lowercase()
        && last.is_ascii_lowercase()
        && bytes
            .iter()
            .all(|byte| byte.is_ascii_lowercase() || *byte == b'-')
}
