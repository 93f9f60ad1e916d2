//! Comparison helpers for secrets.

/// Compare two strings without short-circuiting on the first differing byte.
///
/// Length is not hidden.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}
