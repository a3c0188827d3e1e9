use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// How a block of raw text is split into candidate artist names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeparatorPolicy {
    /// Treat bullets, hyphens and newlines as commas, then split on commas
    #[default]
    Auto,
    Comma,
    Space,
    Newline,
}

impl SeparatorPolicy {
    /// The character a normalized list is joined with under this policy
    #[must_use]
    pub const fn delimiter(self) -> char {
        match self {
            SeparatorPolicy::Auto | SeparatorPolicy::Comma => ',',
            SeparatorPolicy::Space => ' ',
            SeparatorPolicy::Newline => '\n',
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SeparatorPolicy::Auto => "auto",
            SeparatorPolicy::Comma => "comma",
            SeparatorPolicy::Space => "space",
            SeparatorPolicy::Newline => "newline",
        }
    }
}

impl fmt::Display for SeparatorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown separator policy '{0}' (expected auto, comma, space or newline)")]
pub struct UnknownSeparatorPolicy(pub String);

impl FromStr for SeparatorPolicy {
    type Err = UnknownSeparatorPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(SeparatorPolicy::Auto),
            "comma" => Ok(SeparatorPolicy::Comma),
            "space" => Ok(SeparatorPolicy::Space),
            "newline" => Ok(SeparatorPolicy::Newline),
            _ => Err(UnknownSeparatorPolicy(s.to_string())),
        }
    }
}

/// Bullet, its UTF-8-read-as-Windows-1252 form, hyphen and newline
fn auto_delimiters() -> &'static Regex {
    static AUTO_DELIMITERS: OnceLock<Regex> = OnceLock::new();
    AUTO_DELIMITERS.get_or_init(|| {
        Regex::new("•|â€¢|-|\n").expect("auto delimiter pattern is a valid regex")
    })
}

/// Split raw text (pasted, typed or OCR output) into candidate artist names.
///
/// Fragments are trimmed, empty fragments are dropped and exact duplicates are
/// removed keeping the first occurrence. Blank input yields an empty list.
///
/// ```rust
/// use playlist_seeder::normalizer::{normalize, SeparatorPolicy};
///
/// let names = normalize("Pink Floyd, Radiohead,, Radiohead ", SeparatorPolicy::Comma);
/// assert_eq!(names, vec!["Pink Floyd", "Radiohead"]);
/// ```
#[must_use]
pub fn normalize(raw_text: &str, policy: SeparatorPolicy) -> Vec<String> {
    match policy {
        SeparatorPolicy::Auto => {
            let rewritten = auto_delimiters().replace_all(raw_text, ",");
            dedup_fragments(rewritten.split(','))
        }
        other => dedup_fragments(raw_text.split(other.delimiter())),
    }
}

fn dedup_fragments<'a>(fragments: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();

    for fragment in fragments {
        let name = fragment.trim();
        if name.is_empty() {
            continue;
        }
        if seen.insert(name) {
            names.push(name.to_string());
        }
    }

    log::trace!("Normalized {} candidate names", names.len());
    names
}

/// Join a candidate list back into text using the policy's delimiter
#[must_use]
pub fn join(names: &[String], policy: SeparatorPolicy) -> String {
    names.join(&policy.delimiter().to_string())
}
