//! Alternate-name equivalence.
//!
//! Two titles are the same alternate name when they differ only in the
//! conjunction used (`and`, `und`, `to`, `&`, or none at all) or in a `": "`
//! versus `" "` separator. Everything else must match literally, ignoring case.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use strsim::jaro_winkler;

const SEPARATOR: &str = "(?:: | )";
const WORD_CONJUNCTIONS: &str = "(?:and|und|to)";
const OPTIONAL_SPACE: &str = " ?";

static CONJUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(: | )?(?:\b(?:and|und|to)\b|&)(: | )?").expect("conjunction pattern is valid")
});

/// Anchored, case-insensitive pattern built from one display name.
#[derive(Debug, Clone)]
pub struct AltNamePattern {
    source: String,
    name: String,
    regex: Option<Regex>,
}

impl AltNamePattern {
    pub fn compile(name: &str) -> Self {
        let mut body = String::with_capacity(name.len() * 2);
        let mut cursor = 0;
        for found in CONJUNCTION.captures_iter(name) {
            let Some(whole) = found.get(0) else {
                continue;
            };
            push_literal(&mut body, &name[cursor..whole.start()]);
            push_conjunction_slot(&mut body, found.get(1).is_some(), found.get(2).is_some());
            cursor = whole.end();
        }
        push_literal(&mut body, &name[cursor..]);

        let source = format!("^{body}$");
        // Escaped input always parses; only the size limit can reject it.
        let regex = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .ok();
        Self {
            source,
            name: name.to_string(),
            regex,
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(text),
            None => self.name.to_lowercase() == text.to_lowercase(),
        }
    }

    /// Anchored pattern source without the case-insensitivity flag, suitable for
    /// a case-insensitive regex operator such as Postgres `~*`.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for AltNamePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for AltNamePattern {}

fn push_literal(out: &mut String, segment: &str) {
    let mut chars = segment.chars().peekable();
    let mut buf = [0u8; 4];
    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&' ') {
            chars.next();
            out.push_str(SEPARATOR);
        } else if c == ' ' {
            out.push_str(SEPARATOR);
        } else {
            out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
        }
    }
}

/// A side that had no separator in the source name (`"(and"`, `"to,"`) only
/// allows an optional space there.
fn push_conjunction_slot(out: &mut String, spaced_before: bool, spaced_after: bool) {
    let before = if spaced_before { SEPARATOR } else { OPTIONAL_SPACE };
    let after = if spaced_after { SEPARATOR } else { OPTIONAL_SPACE };

    let mut alternatives = vec![
        format!("{before}{WORD_CONJUNCTIONS}{after}"),
        format!("{SEPARATOR}?&{SEPARATOR}?"),
    ];
    if spaced_before && spaced_after {
        alternatives.push(SEPARATOR.to_string());
    }

    out.push_str("(?:");
    out.push_str(&alternatives.join("|"));
    out.push(')');
}

/// Decides whether `text` is an alternate spelling of `name`.
///
/// `name` is the side the comparison is built from; implementations need not be
/// symmetric.
pub trait NameMatcher: Send + Sync {
    fn matches(&self, name: &str, text: &str) -> bool;

    /// Fixes `name` once for repeated comparisons against many texts.
    fn prepare(&self, name: &str) -> Box<dyn Fn(&str) -> bool + Send + Sync + '_> {
        let name = name.to_string();
        Box::new(move |text| self.matches(&name, text))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AltNameMatcher;

impl NameMatcher for AltNameMatcher {
    fn matches(&self, name: &str, text: &str) -> bool {
        AltNamePattern::compile(name).is_match(text)
    }

    fn prepare(&self, name: &str) -> Box<dyn Fn(&str) -> bool + Send + Sync + '_> {
        let pattern = AltNamePattern::compile(name);
        Box::new(move |text| pattern.is_match(text))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimilarityMatcher {
    pub threshold: f64,
}

impl Default for SimilarityMatcher {
    fn default() -> Self {
        Self { threshold: 0.95 }
    }
}

impl SimilarityMatcher {
    pub fn normalize(input: &str) -> String {
        input
            .to_lowercase()
            .replace('&', " and ")
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect::<String>()
            .split_whitespace()
            .map(|token| match token {
                "und" | "to" => "and",
                other => other,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl NameMatcher for SimilarityMatcher {
    fn matches(&self, name: &str, text: &str) -> bool {
        jaro_winkler(&Self::normalize(name), &Self::normalize(text)) >= self.threshold
    }
}
