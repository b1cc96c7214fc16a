//! PII redaction applied to mail text before it leaves for the extraction model.

use regex::{NoExpand, Regex};

/// Ordered (label, pattern) list. Every pattern needs at least one digit or
/// an `@` to match, and no `<LABEL>` token contains either.
const PATTERNS: &[(&str, &str)] = &[
    ("PHONE", r"\b(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4,}\b"),
    // Indian mobile numbers written 5-5, with an optional +91 or 0 prefix.
    ("PHONE", r"(?:(?:\+|\b)91[-\s]?|\b0|\b)\d{5}[-\s]?\d{5}\b"),
    ("EMAIL", r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
    ("UPI", r"[a-zA-Z0-9.\-_]{2,256}@[a-zA-Z]{2,64}"),
    ("CARD", r"\b(?:\d[ -]*?){13,16}\b"),
    ("IP", r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b"),
    ("PAN", r"\b[A-Z]{5}[0-9]{4}[A-Z]\b"),
    ("AADHAAR", r"\b\d{4}\s\d{4}\s\d{4}\b"),
];

/// Stateless redactor. Build once at startup and share it.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    patterns: Vec<(String, Regex)>,
}

impl Sanitizer {
    pub fn new() -> Result<Self, regex::Error> {
        let patterns = PATTERNS
            .iter()
            .map(|(label, pattern)| Ok((format!("<{}>", label), Regex::new(pattern)?)))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { patterns })
    }

    /// Replaces every match with its `<LABEL>` token.
    ///
    /// Passes repeat until the text stops changing, so the result is a fixed
    /// point: sanitizing it again is a no-op. Each replacement removes at
    /// least one digit or `@`, which bounds the number of passes.
    pub fn sanitize(&self, text: &str) -> String {
        let mut current = text.to_string();
        loop {
            let next = self.redact_once(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn redact_once(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (placeholder, pattern) in &self.patterns {
            let replaced = pattern.replace_all(&out, NoExpand(placeholder)).into_owned();
            out = replaced;
        }
        out
    }
}
