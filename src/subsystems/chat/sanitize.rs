//! Reply post-processing.

use std::sync::LazyLock;

use regex::Regex;

/// `*emphasis*` pairs, matched lazily left to right within a line.
static EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*(.*?)\*").expect("emphasis pattern is valid"));

/// Strip single-asterisk emphasis markers and surrounding whitespace.
///
/// `*a* b` becomes `a b`. Markers do not nest. Idempotent.
pub fn sanitize(text: &str) -> String {
    EMPHASIS.replace_all(text, "$1").trim().to_string()
}
