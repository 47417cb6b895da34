//! Derives a storage-legal bucket name from a user-supplied folder label.
//!
//! The generator never fails: any input, including an empty string or pure
//! punctuation, produces a 3–63 character name made of `[a-z0-9.-]` that
//! starts and ends alphanumeric, carries a random 8-character uniqueness
//! suffix, and avoids the reserved shapes (`xn--` prefix, `-s3alias` suffix,
//! IPv4 literals). Uniqueness rests on the random suffix alone; there is no
//! collision retry loop, the folders table's UNIQUE constraint is the
//! backstop.

use uuid::Uuid;

const MAX_LEN: usize = 63;
const SUFFIX_LEN: usize = 8;

/// Produce a fresh bucket name for `label`.
///
/// The reserved-shape checks run against the final, suffixed string: the
/// truncation and suffix steps can reintroduce a forbidden pattern that was
/// absent from the intermediate base.
pub fn generate(label: &str) -> String {
    // Lowercase and map everything outside [a-z0-9.-] to a hyphen.
    let mut name: String = label
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '.' | '-' => c,
            _ => '-',
        })
        .collect();

    name = trim_non_alphanumeric(&name);
    name = collapse_runs(&name);
    name = name.replace(".-", "-").replace("-.", "-");

    if name.len() < 3 {
        name = format!("{}-{}", name, random_token(6));
        // A hyphen straight after an empty base would leave a leading hyphen.
        name = trim_non_alphanumeric(&name);
    }

    if name.len() > MAX_LEN {
        name = format!("{}-{}", &name[..57], random_token(5));
    }

    // Reserve room for the uniqueness suffix, then append it.
    let max_base = MAX_LEN - SUFFIX_LEN - 1;
    if name.len() > max_base {
        name.truncate(max_base);
        name = trim_non_alphanumeric(&name);
    }
    name = format!("{}-{}", name, random_token(SUFFIX_LEN));

    if let Some(rest) = name.strip_prefix("xn--") {
        name = format!("bucket-{}", rest);
    }

    if let Some(base) = name.strip_suffix("-s3alias") {
        name = format!("{}-bucket", base);
    }

    if is_ipv4_like(&name) {
        name = format!("bucket-{}", name.replace('.', "-"));
    }

    name
}

/// Strip leading/trailing characters that are not `[a-z0-9]`.
fn trim_non_alphanumeric(name: &str) -> String {
    name.trim_matches(|c: char| !c.is_ascii_lowercase() && !c.is_ascii_digit())
        .to_string()
}

/// Collapse runs of dots to one dot and runs of hyphens to one hyphen.
fn collapse_runs(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev: Option<char> = None;
    for c in name.chars() {
        if (c == '.' || c == '-') && prev == Some(c) {
            continue;
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

/// Random lowercase-alphanumeric token of length `len`, taken from UUID v4
/// hex with the hyphens removed.
fn random_token(len: usize) -> String {
    Uuid::new_v4().simple().to_string()[..len].to_string()
}

/// Check if a string matches IPv4-like dotted decimal form (`1.2.3.4`).
pub(crate) fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() != 4 {
        return false;
    }
    parts.iter().all(|segment| {
        !segment.is_empty()
            && segment.len() <= 3
            && segment.chars().all(|c| c.is_ascii_digit())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_legal(name: &str) {
        assert!(
            name.len() >= 3 && name.len() <= 63,
            "length out of range: {name:?} ({})",
            name.len()
        );
        assert!(
            name.chars()
                .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-')),
            "illegal character in {name:?}"
        );
        let first = name.chars().next().unwrap();
        let last = name.chars().last().unwrap();
        assert!(first.is_ascii_alphanumeric(), "bad first char in {name:?}");
        assert!(last.is_ascii_alphanumeric(), "bad last char in {name:?}");
        assert!(!name.contains(".."), "double dot in {name:?}");
        assert!(!name.contains(".-"), "dot-hyphen in {name:?}");
        assert!(!name.contains("-."), "hyphen-dot in {name:?}");
        assert!(!name.starts_with("xn--"), "punycode prefix in {name:?}");
        assert!(!name.ends_with("-s3alias"), "reserved suffix in {name:?}");
        assert!(!is_ipv4_like(name), "IPv4 shape: {name:?}");
    }

    #[test]
    fn hostile_inputs_always_produce_legal_names() {
        let inputs = [
            "",
            "a",
            "My Summer Trip!!",
            "  spaces  everywhere  ",
            "日本語のフォルダ",
            "!!!###$$$%%%",
            "...---...",
            "192.168.0.1",
            "xn--punycode-label",
            "trailing-s3alias",
            &"x".repeat(200),
            &"a.b-".repeat(40),
            "UPPERCASE_NAME",
        ];
        for input in inputs {
            assert_legal(&generate(input));
        }
    }

    #[test]
    fn same_label_yields_distinct_names() {
        assert_ne!(generate("holiday photos"), generate("holiday photos"));
    }

    #[test]
    fn summer_trip_label_keeps_recognizable_base() {
        let name = generate("My Summer Trip!!");
        assert!(name.len() <= 63);
        let suffix = name.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_eq!(name, format!("my-summer-trip-{suffix}"));
    }

    #[test]
    fn long_label_is_truncated_with_room_for_suffix() {
        let name = generate(&"photos-".repeat(30));
        assert!(name.len() <= 63);
        assert_legal(&name);
    }

    #[test]
    fn ipv4_labels_are_rewritten() {
        // The suffix breaks the literal shape, but the rewrite must also
        // survive a label that dodges suffixing entirely.
        let name = generate("10.0.0.1");
        assert_legal(&name);
        assert!(!is_ipv4_like(&name));
    }

    #[test]
    fn empty_label_gets_random_base() {
        let name = generate("");
        assert_legal(&name);
    }
}
