//! Post-processing: deterministic cleanup of model-generated descriptions.
//!
//! Alt text is a single short paragraph stored in an XML attribute. Even
//! with a prompt that asks for "just the description", vision models
//! regularly wrap it in code fences, prefix it with `Alt text:`, put it in
//! quotes, or spread it over several lines. Each rule below removes one of
//! those habits without touching the wording itself.
//!
//! ## Rule order
//!
//! Fences come off first so the label and quote rules see the real text.
//! Whitespace is collapsed before the label rule so a label followed by a
//! newline is still recognised.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all rules to the raw model output. May return an empty string.
///
/// Rules (applied in order):
/// 1. Strip outer code fences
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 3. Collapse all whitespace runs (including newlines) to one space
/// 4. Strip a leading `Alt text:` / `Description:` style label
/// 5. Strip matching outer quotes
pub fn clean_description(input: &str) -> String {
    let s = strip_fences(input);
    let s = remove_invisible_chars(&s);
    let s = collapse_whitespace(&s);
    let s = strip_label(&s);
    strip_outer_quotes(&s)
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*\n(.*?)\n?```\s*$").unwrap());

fn strip_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Collapse whitespace ──────────────────────────────────────────────

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Rule 4: Strip leading label ──────────────────────────────────────────────
//
// Matches `Alt text:`, `Alt-text -`, `**Description:**`, `Image description:`
// and `Caption:` at the very start, case-insensitively.

static RE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\**\s*(?:alt[\s-]?text|alternative text|image description|description|caption)\s*\**\s*[:\-–]\s*\**\s*",
    )
    .unwrap()
});

fn strip_label(input: &str) -> String {
    RE_LABEL.replace(input, "").to_string()
}

// ── Rule 5: Strip matching outer quotes ──────────────────────────────────────

fn strip_outer_quotes(input: &str) -> String {
    const PAIRS: &[(char, char)] = &[('"', '"'), ('\'', '\''), ('“', '”'), ('‘', '’')];
    let trimmed = input.trim();
    for (open, close) in PAIRS {
        if let Some(inner) = trimmed
            .strip_prefix(*open)
            .and_then(|s| s.strip_suffix(*close))
        {
            // A lone quote character is not a pair.
            if trimmed.chars().count() >= 2 {
                return inner.trim().to_string();
            }
        }
    }
    trimmed.to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────
