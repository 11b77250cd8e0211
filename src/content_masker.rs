/// Content masking: replaces high-cardinality values with fixed placeholders
///
/// Rules run in a fixed order and each one rewrites every match before the
/// next one starts:
/// 1. dotted-quad addresses -> `<IP>`
/// 2. `0x` hexadecimal tokens -> `<HEX>`
/// 3. standalone integers -> `<NUM>`
/// 4. absolute path-like tokens -> `<PATH>`
///
/// Addresses and hex run before integers so their digits are gone by the
/// time the integer rule looks. Placeholders contain no digits or slashes,
/// which keeps the whole function idempotent.
use once_cell::sync::Lazy;
use regex::Regex;

pub const IP_PLACEHOLDER: &str = "<IP>";
pub const HEX_PLACEHOLDER: &str = "<HEX>";
pub const NUM_PLACEHOLDER: &str = "<NUM>";
pub const PATH_PLACEHOLDER: &str = "<PATH>";

static IP_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").expect("valid regex literal"));
static HEX_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"0x[0-9a-fA-F]+").expect("valid regex literal"));
static NUM_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+\b").expect("valid regex literal"));
static PATH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/[\w/.\-]+").expect("valid regex literal"));

/// Mask volatile substrings of a log message
pub fn mask_content(content: &str) -> String {
    let masked = IP_PATTERN.replace_all(content, IP_PLACEHOLDER);
    let masked = HEX_PATTERN.replace_all(&masked, HEX_PLACEHOLDER);
    let masked = NUM_PATTERN.replace_all(&masked, NUM_PLACEHOLDER);
    let masked = PATH_PATTERN.replace_all(&masked, PATH_PLACEHOLDER);
    masked.into_owned()
}

/// Mask a possibly missing value (an empty table cell, a null field).
/// Missing input masks to the empty string.
pub fn mask_optional(content: Option<&str>) -> String {
    content.map(mask_content).unwrap_or_default()
}
