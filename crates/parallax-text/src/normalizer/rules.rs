//! Substitution rule sets.
//!
//! A [`RuleSet`] is an ordered collection of substitution rules compiled
//! once and applied many times. Two rule kinds exist:
//!
//! - **word rules** — exact whole-word replacements (`Theil → Teil`),
//!   matched against maximal alphabetic runs so they can never fire inside
//!   a longer word (`Theater` is safe from the `Th*` family);
//! - **pattern rules** — regexes applied in declared order after the word
//!   pass (`(\w+)iren\b → ${1}ieren`).
//!
//! Word rules are one simultaneous table lookup per token, so ordering
//! questions arise only among pattern rules and are resolved by declaration
//! order. Duplicate word patterns keep the first declaration.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{TextError, TextResult};

/// One rule as declared in a JSON rule file.
///
/// ```json
/// [
///   {"pattern": "Theil", "replacement": "Teil"},
///   {"pattern": "(\\w+)iren\\b", "replacement": "${1}ieren", "is_regex": true}
/// ]
/// ```
///
/// Replacement strings for regex rules use `${1}`-style group references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Literal word or regex source, depending on `is_regex`.
    pub pattern: String,

    /// Replacement text; group references allowed for regex rules.
    pub replacement: String,

    /// Treat `pattern` as a regex instead of a whole word.
    #[serde(default)]
    pub is_regex: bool,
}

impl RuleSpec {
    /// Shorthand for a whole-word rule.
    pub fn word(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
            is_regex: false,
        }
    }

    /// Shorthand for a regex rule.
    pub fn regex(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
            is_regex: true,
        }
    }
}

/// Compiled, ordered substitution rules.
pub struct RuleSet {
    name: String,
    words: HashMap<String, String>,
    patterns: Vec<(Regex, String)>,
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSet")
            .field("name", &self.name)
            .field("word_rules", &self.words.len())
            .field("pattern_rules", &self.patterns.len())
            .finish()
    }
}

impl RuleSet {
    /// Compile a rule set from specs.
    ///
    /// # Errors
    ///
    /// [`TextError::InvalidPattern`] when a regex fails to compile, when a
    /// word pattern is empty, or when a word pattern contains non-alphabetic
    /// characters (those tokens can never match a word run; declare them
    /// with `is_regex` instead).
    pub fn compile(name: impl Into<String>, specs: &[RuleSpec]) -> TextResult<Self> {
        let mut words = HashMap::new();
        let mut patterns = Vec::new();

        for spec in specs {
            if spec.is_regex {
                let regex = Regex::new(&spec.pattern).map_err(|e| TextError::InvalidPattern {
                    pattern: spec.pattern.clone(),
                    reason: e.to_string(),
                })?;
                patterns.push((regex, spec.replacement.clone()));
            } else {
                if spec.pattern.is_empty() {
                    return Err(TextError::InvalidPattern {
                        pattern: spec.pattern.clone(),
                        reason: "word pattern must not be empty".to_string(),
                    });
                }
                if !spec.pattern.chars().all(char::is_alphabetic) {
                    return Err(TextError::InvalidPattern {
                        pattern: spec.pattern.clone(),
                        reason: "word pattern must be purely alphabetic; use is_regex for anything else"
                            .to_string(),
                    });
                }
                words
                    .entry(spec.pattern.clone())
                    .or_insert_with(|| spec.replacement.clone());
            }
        }

        Ok(Self {
            name: name.into(),
            words,
            patterns,
        })
    }

    /// Load and compile a rule set from a JSON file.
    ///
    /// # Errors
    ///
    /// [`TextError::RuleFile`] when the file cannot be read,
    /// [`TextError::Serialization`] when it is not a JSON array of rule
    /// specs, and compilation errors as for [`compile`](Self::compile).
    pub fn from_json_file(path: &Path) -> TextResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| TextError::RuleFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let specs: Vec<RuleSpec> = serde_json::from_str(&raw)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "rules".to_string());
        Self::compile(name, &specs)
    }

    /// Apply every rule to a text: one word-table pass, then each pattern
    /// rule in declared order. Pure and deterministic; text with no matches
    /// passes through unchanged.
    pub fn apply(&self, text: &str) -> String {
        let mut result = self.apply_word_rules(text);
        for (regex, replacement) in &self.patterns {
            result = regex.replace_all(&result, replacement.as_str()).into_owned();
        }
        result
    }

    /// Replace maximal alphabetic runs through the word table.
    fn apply_word_rules(&self, text: &str) -> String {
        if self.words.is_empty() {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len());
        let mut word = String::new();

        for ch in text.chars() {
            if ch.is_alphabetic() {
                word.push(ch);
            } else {
                self.flush_word(&mut word, &mut out);
                out.push(ch);
            }
        }
        self.flush_word(&mut word, &mut out);

        out
    }

    fn flush_word(&self, word: &mut String, out: &mut String) {
        if word.is_empty() {
            return;
        }
        match self.words.get(word.as_str()) {
            Some(replacement) => out.push_str(replacement),
            None => out.push_str(word),
        }
        word.clear();
    }

    /// Name of this rule set (file stem or built-in identifier).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total number of compiled rules.
    pub fn len(&self) -> usize {
        self.words.len() + self.patterns.len()
    }

    /// True when no rules were compiled.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty() && self.patterns.is_empty()
    }
}
