//! Complaint narrative cleaning
//!
//! Lowercases, strips contact details and stray symbols, removes boilerplate
//! sentences, stop words and redaction placeholders, then drops records that end up
//! empty.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::loader::load_lines;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"\S+@\S+\.\S+").unwrap();
    static ref PHONE_RE: Regex =
        Regex::new(r"(\+?\d{1,2}\s?)?(\(?\d{3}\)?[\s.-]?)?\d{3}[\s.-]?\d{4}").unwrap();
    static ref DISALLOWED_RE: Regex = Regex::new(r"[^a-zA-Z0-9\s.?]").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Redaction markers and filler values found in the complaint export
pub const PLACEHOLDERS: [&str; 7] = ["xxxx", "xxxxx", "xxxxxx", "---", "n/a", "na", "unknown"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreprocessStats {
    pub rows_before: usize,
    pub rows_after: usize,
    pub rows_with_placeholders: usize,
}

impl PreprocessStats {
    pub fn rows_removed(&self) -> usize {
        self.rows_before - self.rows_after
    }
}

#[derive(Debug, Default)]
pub struct ComplaintPreprocessor {
    boilerplate: Vec<Regex>,
    stop_words: HashSet<String>,
}

impl ComplaintPreprocessor {
    pub fn new(boilerplate: &[String], stop_words: &[String]) -> Result<Self> {
        let mut patterns = Vec::with_capacity(boilerplate.len());
        for sentence in boilerplate {
            // Match against text that already went through the same cleaning
            let normalized = clean_text(&sentence.to_lowercase());
            if normalized.is_empty() {
                continue;
            }
            let re = RegexBuilder::new(&regex::escape(&normalized))
                .case_insensitive(true)
                .build()
                .with_context(|| format!("Invalid boilerplate sentence: {}", sentence))?;
            patterns.push(re);
        }

        Ok(Self {
            boilerplate: patterns,
            stop_words: stop_words.iter().map(|w| w.to_lowercase()).collect(),
        })
    }

    /// Build from optional newline-separated `.txt` word lists
    pub fn from_files(boilerplate_file: Option<&Path>, stopwords_file: Option<&Path>) -> Result<Self> {
        let boilerplate = match boilerplate_file {
            Some(p) => load_lines(p).context("Failed to load boilerplate file")?,
            None => Vec::new(),
        };
        let stop_words = match stopwords_file {
            Some(p) => load_lines(p).context("Failed to load stopwords file")?,
            None => Vec::new(),
        };
        Self::new(&boilerplate, &stop_words)
    }

    pub fn remove_boilerplate(&self, text: &str) -> String {
        let mut out = text.to_string();
        for re in &self.boilerplate {
            out = re.replace_all(&out, "").into_owned();
        }
        collapse_whitespace(&out)
    }

    pub fn remove_stopwords(&self, text: &str) -> String {
        text.split_whitespace()
            .filter(|w| !self.stop_words.contains(*w))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Full cleaning pass for one narrative
    pub fn clean(&self, text: &str) -> String {
        let mut out = clean_text(&text.to_lowercase());
        if !self.boilerplate.is_empty() {
            out = self.remove_boilerplate(&out);
        }
        if !self.stop_words.is_empty() {
            out = self.remove_stopwords(&out);
        }
        remove_placeholders(&out)
    }

    /// Clean `column` in every record and drop records left empty
    pub fn preprocess(&self, records: Vec<Value>, column: &str) -> Result<(Vec<Value>, PreprocessStats)> {
        if !records.is_empty() && !records.iter().any(|r| r.get(column).is_some()) {
            anyhow::bail!("Column '{}' not found in records", column);
        }

        let mut stats = PreprocessStats {
            rows_before: records.len(),
            ..PreprocessStats::default()
        };
        info!("Preprocessing {} records (column: {})", records.len(), column);

        let mut kept = Vec::with_capacity(records.len());
        for mut record in records {
            let raw = match record.get(column) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };

            let cleaned = self.clean(&raw);
            if has_placeholder(&clean_text(&raw.to_lowercase())) {
                stats.rows_with_placeholders += 1;
            }

            if cleaned.trim().is_empty() {
                continue;
            }
            if let Some(obj) = record.as_object_mut() {
                obj.insert(column.to_string(), Value::String(cleaned));
                kept.push(record);
            }
        }

        stats.rows_after = kept.len();
        debug!(
            "Removed {} empty rows, {} rows contained placeholders",
            stats.rows_removed(),
            stats.rows_with_placeholders
        );

        Ok((kept, stats))
    }
}

/// Strip emails, phone numbers and symbols other than `.` and `?`
pub fn clean_text(text: &str) -> String {
    let text = EMAIL_RE.replace_all(text, "");
    let text = PHONE_RE.replace_all(&text, "");
    let text = DISALLOWED_RE.replace_all(&text, " ");
    collapse_whitespace(&text)
}

/// Drop placeholder tokens; only whole tokens are removed
pub fn remove_placeholders(text: &str) -> String {
    text.split_whitespace()
        .filter(|w| !PLACEHOLDERS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

fn has_placeholder(text: &str) -> bool {
    text.split_whitespace().any(|w| PLACEHOLDERS.contains(&w))
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_text_strips_contacts() {
        let cleaned = clean_text("call me at 555-123-4567 or mail jane.doe@example.com!! ok?");
        assert_eq!(cleaned, "call me at or mail ok?");
    }

    #[test]
    fn test_clean_text_keeps_periods_and_questions() {
        assert_eq!(clean_text("Why?  It was $50.00 (late)."), "Why? It was 50.00 late .");
    }

    #[test]
    fn test_placeholders_are_whole_tokens() {
        assert_eq!(
            remove_placeholders("on xxxx i paid na fees unknown finance"),
            "on i paid fees finance"
        );
    }

    #[test]
    fn test_full_pipeline() -> Result<()> {
        let pre = ComplaintPreprocessor::new(
            &["I am writing to file a complaint.".to_string()],
            &["the".to_string(), "a".to_string()],
        )?;

        let out = pre.clean("I am writing to file a complaint. The bank charged XXXX a fee!");
        assert_eq!(out, "bank charged fee");
        Ok(())
    }

    #[test]
    fn test_preprocess_drops_empty_rows() -> Result<()> {
        let pre = ComplaintPreprocessor::default();
        let records = vec![
            json!({"id": 1, "narrative": "Card was charged twice"}),
            json!({"id": 2, "narrative": "XXXX XXXX"}),
            json!({"id": 3, "narrative": null}),
            json!({"id": 4}),
        ];

        let (kept, stats) = pre.preprocess(records, "narrative")?;
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0]["narrative"], "card was charged twice");
        assert_eq!(stats.rows_before, 4);
        assert_eq!(stats.rows_after, 1);
        assert_eq!(stats.rows_removed(), 3);
        assert_eq!(stats.rows_with_placeholders, 1);
        Ok(())
    }

    #[test]
    fn test_preprocess_unknown_column() {
        let pre = ComplaintPreprocessor::default();
        let err = pre
            .preprocess(vec![json!({"text": "x"})], "narrative")
            .unwrap_err();
        assert!(err.to_string().contains("Column 'narrative' not found"));
    }
}
