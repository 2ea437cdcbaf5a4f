//! Deterministic quality-control scoring for generated articles.
//!
//! [`QualityController::validate`] is a pure function: identical text and
//! metadata always produce identical results, and no input makes it fail.
//! Checks whose required metadata is absent are skipped rather than failed
//! and do not count toward the score denominator.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::row::RowMeta;

/// Level-2 markdown headings at the start of a line.
static H2_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^##\s").expect("invalid heading pattern"));

/// Section marker the FAQ check looks for.
pub const FAQ_MARKER: &str = "## FAQ";

/// Check names, in battery order.
pub const CHECK_WORD_COUNT: &str = "word_count";
pub const CHECK_TITLE_LENGTH: &str = "title_length";
pub const CHECK_READABILITY: &str = "readability";
pub const CHECK_STRUCTURE: &str = "structure";
pub const CHECK_KEYWORD_INTEGRATION: &str = "keyword_integration";
pub const CHECK_FAQ_PRESENCE: &str = "faq_presence";

/// Thresholds for the QC battery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcConfig {
    /// Minimum whitespace-token count for the rewritten content.
    #[serde(default = "default_min_word_count")]
    pub min_word_count: usize,
    /// Inclusive character bounds for the title.
    #[serde(default = "default_title_min")]
    pub title_min: usize,
    #[serde(default = "default_title_max")]
    pub title_max: usize,
    /// Minimum Flesch reading-ease score.
    #[serde(default = "default_min_reading_ease")]
    pub min_reading_ease: f64,
    /// Minimum number of `##` section headings.
    #[serde(default = "default_min_h2_count")]
    pub min_h2_count: usize,
}

fn default_min_word_count() -> usize {
    800
}

fn default_title_min() -> usize {
    45
}

fn default_title_max() -> usize {
    70
}

fn default_min_reading_ease() -> f64 {
    50.0
}

fn default_min_h2_count() -> usize {
    3
}

impl Default for QcConfig {
    fn default() -> Self {
        Self {
            min_word_count: default_min_word_count(),
            title_min: default_title_min(),
            title_max: default_title_max(),
            min_reading_ease: default_min_reading_ease(),
            min_h2_count: default_min_h2_count(),
        }
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    /// 0-100. Most checks are all-or-nothing; `word_count` earns
    /// proportional credit below the minimum.
    pub score: f64,
    pub details: String,
}

/// Aggregate verdict over one article.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QcResult {
    pub title: String,
    pub word_count: usize,
    /// Applicable checks in battery order; skipped checks are absent.
    pub checks: Vec<CheckResult>,
    /// Mean of the applicable check scores, 0-100.
    pub overall_score: f64,
    /// True iff every applicable check passed.
    pub passed: bool,
    /// `details` of each failing check, prefixed with its name.
    pub feedback: Vec<String>,
}

/// Rule-based content validator.
#[derive(Debug, Clone, Default)]
pub struct QualityController {
    config: QcConfig,
}

impl QualityController {
    pub fn new(config: QcConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QcConfig {
        &self.config
    }

    /// Scores `text` against the full battery. Never fails: degenerate
    /// input (empty text) scores every applicable check as failed.
    pub fn validate(&self, text: &str, title: &str, meta: &RowMeta) -> QcResult {
        let word_count = count_words(text);

        let mut checks = vec![
            self.check_word_count(word_count),
            self.check_title_length(title),
            self.check_readability(text),
            self.check_structure(text),
        ];
        if let Some(keyword) = meta.focus_keyword() {
            checks.push(check_keyword_integration(text, keyword));
        }
        checks.push(check_faq_presence(text));

        let overall_score = if checks.is_empty() {
            0.0
        } else {
            checks.iter().map(|c| c.score).sum::<f64>() / checks.len() as f64
        };
        let passed = checks.iter().all(|c| c.passed);
        let feedback = checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| format!("{}: {}", c.name, c.details))
            .collect();

        QcResult {
            title: title.to_string(),
            word_count,
            checks,
            overall_score,
            passed,
            feedback,
        }
    }

    fn check_word_count(&self, word_count: usize) -> CheckResult {
        let min = self.config.min_word_count;
        let passed = word_count >= min;
        let score = if passed {
            100.0
        } else {
            (word_count as f64 / min as f64 * 100.0).min(100.0)
        };
        CheckResult {
            name: CHECK_WORD_COUNT,
            passed,
            score,
            details: format!("{} words (minimum {})", word_count, min),
        }
    }

    fn check_title_length(&self, title: &str) -> CheckResult {
        let length = title.chars().count();
        let passed = length >= self.config.title_min && length <= self.config.title_max;
        CheckResult {
            name: CHECK_TITLE_LENGTH,
            passed,
            score: if passed { 100.0 } else { 0.0 },
            details: format!(
                "title is {} characters (expected {}-{})",
                length, self.config.title_min, self.config.title_max
            ),
        }
    }

    fn check_readability(&self, text: &str) -> CheckResult {
        let ease = flesch_reading_ease(text);
        let passed = ease >= self.config.min_reading_ease;
        CheckResult {
            name: CHECK_READABILITY,
            passed,
            score: if passed { 100.0 } else { 0.0 },
            details: format!(
                "Flesch reading ease {:.1} (minimum {:.1})",
                ease, self.config.min_reading_ease
            ),
        }
    }

    fn check_structure(&self, text: &str) -> CheckResult {
        let headings = H2_HEADING.find_iter(text).count();
        let passed = headings >= self.config.min_h2_count;
        CheckResult {
            name: CHECK_STRUCTURE,
            passed,
            score: if passed { 100.0 } else { 0.0 },
            details: format!(
                "{} section headings (minimum {})",
                headings, self.config.min_h2_count
            ),
        }
    }
}

fn check_keyword_integration(text: &str, keyword: &str) -> CheckResult {
    let passed = text.to_lowercase().contains(&keyword.to_lowercase());
    CheckResult {
        name: CHECK_KEYWORD_INTEGRATION,
        passed,
        score: if passed { 100.0 } else { 0.0 },
        details: if passed {
            format!("focus keyword '{}' present", keyword)
        } else {
            format!("focus keyword '{}' missing from content", keyword)
        },
    }
}

fn check_faq_presence(text: &str) -> CheckResult {
    let passed = text.contains(FAQ_MARKER);
    CheckResult {
        name: CHECK_FAQ_PRESENCE,
        passed,
        score: if passed { 100.0 } else { 0.0 },
        details: if passed {
            format!("'{}' section present", FAQ_MARKER)
        } else {
            format!("'{}' section missing", FAQ_MARKER)
        },
    }
}

fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Flesch reading ease: 206.835 - 1.015 (words/sentences) - 84.6 (syllables/words).
///
/// Empty text scores 0. Sentence and syllable counting use the usual
/// heuristics (terminal punctuation, vowel groups with a silent-e discount).
fn flesch_reading_ease(text: &str) -> f64 {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }

    let sentences = text
        .split(['.', '!', '?'])
        .filter(|s| s.trim().chars().any(|c| c.is_alphanumeric()))
        .count()
        .max(1);

    let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();

    let words_per_sentence = words.len() as f64 / sentences as f64;
    let syllables_per_word = syllables as f64 / words.len() as f64;

    206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word
}

fn count_syllables(word: &str) -> usize {
    let word: String = word
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_lowercase();
    if word.is_empty() {
        return 1;
    }

    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut count = 0;
    let mut previous_was_vowel = false;
    for c in word.chars() {
        let vowel = is_vowel(c);
        if vowel && !previous_was_vowel {
            count += 1;
        }
        previous_was_vowel = vowel;
    }

    // Silent trailing 'e' as in "make"; keep at least one syllable.
    if word.ends_with('e') && !word.ends_with("le") && count > 1 {
        count -= 1;
    }
    count.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta_with_keywords(keywords: &str) -> RowMeta {
        RowMeta {
            keywords: keywords.to_string(),
            ..Default::default()
        }
    }

    fn passing_text(words: usize) -> String {
        let mut text = String::from("## First Part\n\n## Second Part\n\n## FAQ\n\n");
        let used = count_words(&text);
        let filler = "The cat sat on the mat. ".repeat((words - used) / 6 + 1);
        let tokens: Vec<&str> = filler.split_whitespace().take(words - used).collect();
        text.push_str(&tokens.join(" "));
        text
    }

    #[test]
    fn test_validate_is_deterministic() {
        let qc = QualityController::default();
        let meta = meta_with_keywords("gardening");
        let text = passing_text(900);

        let first = qc.validate(&text, "A Title Of Respectable Middling Length Here", &meta);
        let second = qc.validate(&text, "A Title Of Respectable Middling Length Here", &meta);

        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_text_fails_without_panicking() {
        let qc = QualityController::default();
        let result = qc.validate("", "Short", &RowMeta::default());

        assert!(!result.passed);
        assert_eq!(result.word_count, 0);
        let word_check = result
            .checks
            .iter()
            .find(|c| c.name == CHECK_WORD_COUNT)
            .expect("word_count check missing");
        assert!(!word_check.passed);
        assert_eq!(word_check.score, 0.0);
    }

    #[test]
    fn test_word_count_partial_credit_and_details() {
        let qc = QualityController::default();
        let text = "word ".repeat(400);
        let result = qc.validate(&text, "Short", &RowMeta::default());

        let check = result
            .checks
            .iter()
            .find(|c| c.name == CHECK_WORD_COUNT)
            .expect("word_count check missing");
        assert!(!check.passed);
        assert_eq!(check.score, 50.0);
        assert!(check.details.contains("400"));
        assert!(check.details.contains("800"));
    }

    #[test]
    fn test_keyword_check_skipped_without_keywords() {
        let qc = QualityController::default();
        let result = qc.validate("some text", "Short", &RowMeta::default());

        assert!(result
            .checks
            .iter()
            .all(|c| c.name != CHECK_KEYWORD_INTEGRATION));
    }

    #[test]
    fn test_keyword_check_case_insensitive() {
        let qc = QualityController::default();
        let meta = meta_with_keywords("Raised Beds");
        let result = qc.validate("all about raised beds here", "Short", &meta);

        let check = result
            .checks
            .iter()
            .find(|c| c.name == CHECK_KEYWORD_INTEGRATION)
            .expect("keyword check missing");
        assert!(check.passed);
    }

    #[test]
    fn test_structure_counts_h2_headings_only() {
        let qc = QualityController::default();
        let text = "# Top\n## One\n### Sub\n## Two\n## FAQ\n";
        let result = qc.validate(text, "Short", &RowMeta::default());

        let check = result
            .checks
            .iter()
            .find(|c| c.name == CHECK_STRUCTURE)
            .expect("structure check missing");
        assert!(check.passed, "three ## headings should pass: {}", check.details);
    }

    #[test]
    fn test_faq_marker_detection() {
        let qc = QualityController::default();
        let with = qc.validate("## FAQ\n", "Short", &RowMeta::default());
        let without = qc.validate("no questions here", "Short", &RowMeta::default());

        let find = |r: &QcResult| {
            r.checks
                .iter()
                .find(|c| c.name == CHECK_FAQ_PRESENCE)
                .map(|c| c.passed)
        };
        assert_eq!(find(&with), Some(true));
        assert_eq!(find(&without), Some(false));
    }

    #[test]
    fn test_overall_score_is_mean_of_applicable_checks() {
        let qc = QualityController::default();
        let result = qc.validate("", "Short", &RowMeta::default());

        // Five applicable checks (keyword skipped), all scoring zero.
        assert_eq!(result.checks.len(), 5);
        assert_eq!(result.overall_score, 0.0);
    }

    #[test]
    fn test_all_checks_pass_on_good_article() {
        let qc = QualityController::new(QcConfig {
            title_min: 10,
            ..Default::default()
        });
        let meta = meta_with_keywords("cat");
        let text = passing_text(900);
        let result = qc.validate(&text, "How to Care for an Indoor Cat", &meta);

        assert!(result.passed, "feedback: {:?}", result.feedback);
        assert_eq!(result.overall_score, 100.0);
        assert!(result.feedback.is_empty());
    }

    #[test]
    fn test_flesch_simple_prose_scores_high() {
        let text = "The cat sat on the mat. The dog ran to the park. ".repeat(20);
        assert!(flesch_reading_ease(&text) > 80.0);
    }

    #[test]
    fn test_syllable_heuristic() {
        assert_eq!(count_syllables("cat"), 1);
        assert_eq!(count_syllables("garden"), 2);
        assert_eq!(count_syllables("make"), 1);
        assert_eq!(count_syllables("table"), 2);
        assert_eq!(count_syllables(""), 1);
    }
}
