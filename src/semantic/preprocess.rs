//! Text normalization for embedding input.
//!
//! Every string handed to the embedding model goes through
//! [`normalize_text`]:
//! 1. Strip markup, keeping the visible text
//! 2. Lowercase
//! 3. Replace anything outside `[a-z0-9 .,;:!?()-]` with a space
//! 4. Collapse whitespace and trim

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

/// Characters that survive normalization (whitespace is collapsed later).
static NOISE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9\s.,;:!?()\-]").expect("static regex is valid"));

/// Normalize free text for embedding. Total: never fails, empty in, empty out.
pub fn normalize_text(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let visible = strip_markup(text);
    let lowered = visible.to_lowercase();
    let cleaned = NOISE_RE.replace_all(&lowered, " ");

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove markup tags, replacing each element with its text content.
/// Entities are decoded as a side effect of parsing.
fn strip_markup(text: &str) -> String {
    if !text.contains('<') && !text.contains('&') {
        return text.to_string();
    }

    let fragment = Html::parse_fragment(text);
    fragment.root_element().text().collect()
}
