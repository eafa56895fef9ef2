//! Foreign-language span detection.
//!
//! Nietzsche salts the German with French, and translators differ in
//! whether they keep, translate, or footnote those spans; passages with
//! embedded French correlate with divergence. The detector matches a fixed
//! table of French phrases known from the source material, compiled once.
//!
//! Only distinctive multiword phrases (plus `ressentiment`, which survives
//! untranslated in every edition) are matched. One-word patterns like bare
//! `esprit` fire on too much legitimate English to be usable.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// French phrases matched case-insensitively; `[’']` accepts both
/// typewriter and typographic apostrophes, which OCR mixes freely.
const FRENCH_PHRASE_PATTERNS: &[&str] = &[
    r"il ne cherche le vrai que pour faire le bien",
    r"bon sens",
    r"bel esprit",
    r"l[’']art pour l[’']art",
    r"ressentiment",
    r"par excellence",
    r"vis-à-vis",
    r"raison d[’']être",
    r"entre nous",
    r"n[’']est-ce pas",
    r"noblesse oblige",
    r"cause première",
    r"idée fixe",
    r"savoir vivre",
    r"je ne sais quoi",
    r"laisser aller",
];

fn compiled_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        FRENCH_PHRASE_PATTERNS
            .iter()
            .map(|p| {
                Regex::new(&format!(r"(?i)\b{}\b", p))
                    .expect("built-in French phrase pattern must compile")
            })
            .collect()
    })
}

/// One detected foreign-language span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignSpan {
    /// The matched text as it appears in the source.
    pub phrase: String,

    /// Byte offset of the match start.
    pub start: usize,

    /// Byte offset one past the match end.
    pub end: usize,
}

/// Detect foreign-language spans in a text.
///
/// Returns spans sorted by start offset, exact duplicates removed. The
/// phrase table is mutually non-overlapping, so spans never nest.
pub fn detect_foreign_spans(text: &str) -> Vec<ForeignSpan> {
    let mut spans: Vec<ForeignSpan> = Vec::new();
    for pattern in compiled_patterns() {
        for m in pattern.find_iter(text) {
            spans.push(ForeignSpan {
                phrase: m.as_str().to_string(),
                start: m.start(),
                end: m.end(),
            });
        }
    }
    spans.sort_by_key(|s| (s.start, s.end));
    spans.dedup();
    spans
}

/// Number of foreign-language spans in a text.
pub fn foreign_span_count(text: &str) -> usize {
    detect_foreign_spans(text).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_phrase_with_offsets() {
        let text = "the philosopher par excellence of the modern age";
        let spans = detect_foreign_spans(text);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].phrase, "par excellence");
        assert_eq!(&text[spans[0].start..spans[0].end], "par excellence");
    }

    #[test]
    fn test_case_insensitive() {
        let spans = detect_foreign_spans("A certain Noblesse Oblige among spirits.");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].phrase, "Noblesse Oblige");
    }

    #[test]
    fn test_both_apostrophe_styles() {
        let typewriter = detect_foreign_spans("its raison d'être was clear");
        let typographic = detect_foreign_spans("its raison d’être was clear");
        assert_eq!(typewriter.len(), 1);
        assert_eq!(typographic.len(), 1);
    }

    #[test]
    fn test_multiple_spans_sorted() {
        let text = "entre nous, the man of ressentiment lacks all bon sens entirely";
        let spans = detect_foreign_spans(text);
        let phrases: Vec<&str> = spans.iter().map(|s| s.phrase.as_str()).collect();
        assert_eq!(phrases, vec!["entre nous", "ressentiment", "bon sens"]);
        assert!(spans.windows(2).all(|w| w[0].start < w[1].start));
    }

    #[test]
    fn test_plain_english_has_no_spans() {
        let text = "He who fights with monsters should look to it that he himself \
                    does not become a monster in the process.";
        assert_eq!(foreign_span_count(text), 0);
    }

    #[test]
    fn test_long_quote_detected_whole() {
        let text = "\u{201c}il ne cherche le vrai que pour faire le bien\u{201d} — \
                    so the good man speaks";
        let spans = detect_foreign_spans(text);
        assert_eq!(spans.len(), 1);
        assert!(spans[0].phrase.starts_with("il ne cherche"));
    }

    #[test]
    fn test_word_boundary_respected() {
        // hyphenation after the phrase keeps the boundary intact
        let spans = detect_foreign_spans("his ressentiment-laden morality");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].phrase, "ressentiment");

        // an inflected continuation breaks the boundary and must not match
        assert_eq!(foreign_span_count("their ressentimental mood"), 0);
    }
}
