//! Working state of one article row.
//!
//! A row is created from one input CSV line, mutated exactly once by the
//! row processor that owns it, and immutable afterwards. It ends up either
//! fully processed (outline, content, and QC result present) or failed
//! (`error` set, derived fields recording whatever the pipeline reached
//! before the failure).

use serde::{Deserialize, Serialize};

use crate::qc::QcResult;

/// Optional metadata columns carried alongside the title.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowMeta {
    #[serde(default)]
    pub description: String,
    /// Comma-separated keyword list; the first entry is the focus keyword.
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub target_audience: String,
    /// Existing article body, if any, fed to the rewrite stages as reference.
    #[serde(default)]
    pub content: String,
}

impl RowMeta {
    /// First non-empty entry of the keyword list, used by the QC
    /// keyword-integration check. `None` when no keywords were supplied.
    pub fn focus_keyword(&self) -> Option<&str> {
        self.keywords
            .split(',')
            .map(str::trim)
            .find(|k| !k.is_empty())
    }
}

/// Lifecycle of a row through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// Loaded from CSV, not yet processed.
    Pending,
    /// First generation stage produced an outline.
    Outlined,
    /// Final generation stage produced the rewritten content.
    Rewritten,
    /// QC ran over the rewritten content; terminal success state.
    Scored,
    /// A generation stage failed; terminal failure state.
    Failed,
}

/// One article's working state.
#[derive(Debug, Clone)]
pub struct Row {
    pub title: String,
    pub meta: RowMeta,
    pub generated_outline: Option<String>,
    pub rewritten_content: Option<String>,
    /// Whitespace-token count of the rewritten content, set at scoring time.
    pub word_count: usize,
    pub qc_result: Option<QcResult>,
    /// Human-readable failure message; mutually exclusive with `qc_result`.
    pub error: Option<String>,
    state: RowState,
}

impl Row {
    pub fn new(title: String, meta: RowMeta) -> Self {
        Self {
            title,
            meta,
            generated_outline: None,
            rewritten_content: None,
            word_count: 0,
            qc_result: None,
            error: None,
            state: RowState::Pending,
        }
    }

    pub fn state(&self) -> RowState {
        self.state
    }

    pub fn record_outline(&mut self, outline: String) {
        self.generated_outline = Some(outline);
        self.state = RowState::Outlined;
    }

    pub fn record_content(&mut self, content: String) {
        self.rewritten_content = Some(content);
        self.state = RowState::Rewritten;
    }

    pub fn record_qc(&mut self, result: QcResult) {
        self.word_count = result.word_count;
        self.qc_result = Some(result);
        self.state = RowState::Scored;
    }

    /// Marks the row failed at its current point of progress. Derived fields
    /// already recorded are kept, not rolled back.
    pub fn record_error(&mut self, message: String) {
        self.error = Some(message);
        self.state = RowState::Failed;
    }
}
