//! CSV input and output.
//!
//! Input needs a `title` column; `description`, `keywords`,
//! `target_audience`, and `content` default to empty when absent. Rows
//! with a blank title are skipped with a warning. Output preserves one
//! line per processed row, failed rows included, so input and output stay
//! in 1:1 correspondence.

use std::path::Path;

use tracing::{info, warn};

use crate::error::ConfigError;
use crate::row::{Row, RowMeta};

const OUTPUT_HEADERS: [&str; 10] = [
    "title",
    "description",
    "keywords",
    "target_audience",
    "content",
    "generated_outline",
    "rewritten_content",
    "word_count",
    "qc_score",
    "error",
];

/// Loads and validates the input CSV.
///
/// Fields are picked by header position so ragged rows work: a row shorter
/// than the header reads as empty strings for its missing trailing columns.
pub fn load_rows(path: &Path) -> Result<Vec<Row>, ConfigError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let title_col = column("title").ok_or_else(|| ConfigError::MissingColumn("title".to_string()))?;
    let description_col = column("description");
    let keywords_col = column("keywords");
    let target_audience_col = column("target_audience");
    let content_col = column("content");

    let field = |record: &csv::StringRecord, col: Option<usize>| {
        col.and_then(|i| record.get(i))
            .unwrap_or("")
            .trim()
            .to_string()
    };

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let title = field(&record, Some(title_col));
        if title.is_empty() {
            // index is zero-based and the header occupies line 1.
            warn!(line = index + 2, "skipping row with missing title");
            continue;
        }
        rows.push(Row::new(
            title,
            RowMeta {
                description: field(&record, description_col),
                keywords: field(&record, keywords_col),
                target_audience: field(&record, target_audience_col),
                content: field(&record, content_col),
            },
        ));
    }

    if rows.is_empty() {
        return Err(ConfigError::EmptyInput);
    }
    info!(rows = rows.len(), path = %path.display(), "input loaded");
    Ok(rows)
}

/// Writes processed rows, input columns first, derived columns after.
/// Failed rows keep their input columns and the `error` message; their
/// derived columns stay empty.
pub fn write_rows(rows: &[Row], path: &Path) -> Result<(), ConfigError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(OUTPUT_HEADERS)?;

    for row in rows {
        let (word_count, qc_score) = match &row.qc_result {
            Some(qc) => (
                qc.word_count.to_string(),
                format!("{:.1}", qc.overall_score),
            ),
            None => (String::new(), String::new()),
        };
        writer.write_record([
            row.title.as_str(),
            row.meta.description.as_str(),
            row.meta.keywords.as_str(),
            row.meta.target_audience.as_str(),
            row.meta.content.as_str(),
            row.generated_outline.as_deref().unwrap_or(""),
            row.rewritten_content.as_deref().unwrap_or(""),
            word_count.as_str(),
            qc_score.as_str(),
            row.error.as_deref().unwrap_or(""),
        ])?;
    }

    writer.flush().map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    info!(rows = rows.len(), path = %path.display(), "output written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qc::QualityController;
    use std::io::Write;

    fn temp_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write csv");
        file
    }

    #[test]
    fn test_load_with_all_columns() {
        let file = temp_csv(
            "title,description,keywords,target_audience,content\n\
             How to Start a Garden,Beginner guide,gardening,new gardeners,old text\n",
        );
        let rows = load_rows(file.path()).expect("load rows");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "How to Start a Garden");
        assert_eq!(rows[0].meta.keywords, "gardening");
    }

    #[test]
    fn test_load_with_only_title_column() {
        let file = temp_csv("title\nFirst Article\nSecond Article\n");
        let rows = load_rows(file.path()).expect("load rows");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].meta, RowMeta::default());
    }

    #[test]
    fn test_missing_title_column_is_fatal() {
        let file = temp_csv("description,keywords\nno titles,here\n");
        assert!(matches!(
            load_rows(file.path()),
            Err(ConfigError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_blank_title_rows_are_skipped() {
        let file = temp_csv("title,description\nKept Article,ok\n ,blank title\nAnother,ok\n");
        let rows = load_rows(file.path()).expect("load rows");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "Kept Article");
        assert_eq!(rows[1].title, "Another");
    }

    #[test]
    fn test_short_rows_read_missing_columns_as_empty() {
        let file = temp_csv(
            "title,description,keywords\n\
             Full Row,has a description,gardening\n\
             Short Row\n\
             ,row without title\n",
        );
        let rows = load_rows(file.path()).expect("load rows");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].meta.keywords, "gardening");
        assert_eq!(rows[1].title, "Short Row");
        assert_eq!(rows[1].meta.description, "");
        assert_eq!(rows[1].meta.keywords, "");
    }

    #[test]
    fn test_empty_input_is_fatal() {
        let file = temp_csv("title\n\n");
        assert!(matches!(load_rows(file.path()), Err(ConfigError::EmptyInput)));
    }

    #[test]
    fn test_write_preserves_row_count_including_failures() {
        let qc = QualityController::default();

        let mut scored = Row::new("Scored".to_string(), RowMeta::default());
        scored.record_outline("# Outline".to_string());
        scored.record_content("some generated body".to_string());
        let result = qc.validate("some generated body", "Scored", &scored.meta);
        scored.record_qc(result);

        let mut failed = Row::new("Failed".to_string(), RowMeta::default());
        failed.record_error("rewrite stage failed: stub".to_string());

        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out.csv");
        write_rows(&[scored, failed], &path).expect("write rows");

        let mut reader = csv::Reader::from_path(&path).expect("read back");
        let headers = reader.headers().expect("headers").clone();
        assert_eq!(headers.len(), OUTPUT_HEADERS.len());

        let records: Vec<csv::StringRecord> =
            reader.records().collect::<Result<_, _>>().expect("records");
        assert_eq!(records.len(), 2);

        // Scored row has derived fields and no error.
        assert_eq!(&records[0][0], "Scored");
        assert!(!records[0][7].is_empty());
        assert!(records[0][9].is_empty());

        // Failed row keeps its place with empty derived fields.
        assert_eq!(&records[1][0], "Failed");
        assert!(records[1][5].is_empty());
        assert!(records[1][6].is_empty());
        assert!(records[1][7].is_empty());
        assert_eq!(&records[1][9], "rewrite stage failed: stub");
    }

    #[test]
    fn test_qc_score_formatted_to_one_decimal() {
        let qc = QualityController::default();
        let mut row = Row::new("Title".to_string(), RowMeta::default());
        row.record_outline("o".to_string());
        row.record_content("body".to_string());
        row.record_qc(qc.validate("body", "Title", &row.meta));

        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out.csv");
        write_rows(&[row], &path).expect("write rows");

        let mut reader = csv::Reader::from_path(&path).expect("read back");
        let record = reader
            .records()
            .next()
            .expect("one record")
            .expect("valid record");
        let score = &record[8];
        assert!(score.contains('.'), "score should be one-decimal: {score}");
    }
}
