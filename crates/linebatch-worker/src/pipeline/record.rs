//! Turning raw dataset lines into embeddable records

use linebatch_common::record::RecordPayload;
use linebatch_common::sanitize::Sanitizer;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;

/// One usable dataset line: the text to embed and what to store next to the vector
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRecord {
    pub id: u64,
    pub text: String,
    pub payload: RecordPayload,
}

/// Records of a batch plus how many lines were dropped
#[derive(Debug, Default)]
pub struct PreparedBatch {
    pub records: Vec<PreparedRecord>,
    pub malformed: usize,
    pub incomplete: usize,
}

/// Parse every line; malformed JSON and records without title or abstract are skipped
pub fn prepare_batch(
    lines: &[String],
    sanitizer: &Sanitizer,
    source_type: &str,
) -> Result<PreparedBatch> {
    let mut batch = PreparedBatch::default();

    for (position, line) in lines.iter().enumerate() {
        let record: Value = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                warn!(position, error = %e, "Skipping malformed JSON line");
                batch.malformed += 1;
                continue;
            },
        };

        let Some(text) = embed_text(&record, sanitizer) else {
            debug!(position, "Skipping record without title or abstract");
            batch.incomplete += 1;
            continue;
        };

        let payload = RecordPayload::new(source_type, record);
        batch.records.push(PreparedRecord {
            id: payload.id()?,
            text,
            payload,
        });
    }

    Ok(batch)
}

/// `"<title>. <abstract>"`, both sanitized; `None` unless both are non-empty strings
pub fn embed_text(record: &Value, sanitizer: &Sanitizer) -> Option<String> {
    let field = |name: &str| {
        record
            .get(name)
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
    };

    let title = field("title")?;
    let abstract_text = field("abstract")?;
    Some(format!(
        "{}. {}",
        sanitizer.clean(title),
        sanitizer.clean(abstract_text)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use linebatch_common::record::{record_id, DEFAULT_SOURCE_TYPE};
    use serde_json::json;

    #[test]
    fn test_prepare_batch_skips_bad_lines() {
        let sanitizer = Sanitizer::new().unwrap();
        let lines = vec![
            r#"{"id":"1","title":"Deep  $\\alpha$ nets","abstract":"We show\nthat..."}"#.to_string(),
            "{not json".to_string(),
            r#"{"id":"2","title":"No abstract"}"#.to_string(),
            r#"{"id":"3","title":"","abstract":"Empty title"}"#.to_string(),
            String::new(),
        ];

        let batch = prepare_batch(&lines, &sanitizer, DEFAULT_SOURCE_TYPE).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.malformed, 2);
        assert_eq!(batch.incomplete, 2);

        let record = &batch.records[0];
        assert_eq!(record.text, "Deep alpha nets. We show that...");
        assert_eq!(record.payload.source_type, "arXiv");
        assert_eq!(record.id, record_id(&record.payload.original_json).unwrap());
    }

    #[test]
    fn test_embed_text_requires_strings() {
        let sanitizer = Sanitizer::new().unwrap();
        assert_eq!(embed_text(&json!({"title": 5, "abstract": "x"}), &sanitizer), None);
        assert_eq!(
            embed_text(&json!({"title": "T", "abstract": " {A} "}), &sanitizer),
            Some("T. A".to_string())
        );
    }
}
