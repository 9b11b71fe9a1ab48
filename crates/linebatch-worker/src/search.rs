//! Idea lookup: embed a free-text idea and list the closest stored records

use serde_json::Value;
use std::fmt::Write as _;

use crate::error::{Result, WorkerError};
use crate::pipeline::store::SearchHit;
use crate::pipeline::{Embedder, VectorStore};

/// Characters of the abstract shown per match
pub const ABSTRACT_PREVIEW_CHARS: usize = 150;

#[derive(Debug, Clone, PartialEq)]
pub struct IdeaMatch {
    pub score: f32,
    pub source_type: String,
    pub title: String,
    pub abstract_preview: String,
}

impl IdeaMatch {
    /// Points written by other tools may lack parts of the payload
    pub fn from_hit(hit: &SearchHit) -> Self {
        let payload = hit.payload.as_ref();
        let original = payload.and_then(|p| p.get("original_json"));

        Self {
            score: hit.score,
            source_type: payload
                .and_then(|p| p.get("type"))
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            title: collapse(text_field(original, "title")),
            abstract_preview: preview(&collapse(text_field(original, "abstract"))),
        }
    }
}

/// Closest records to `text`, best first
pub async fn find_similar<E, S>(
    embedder: &E,
    store: &S,
    text: &str,
    limit: usize,
) -> Result<Vec<IdeaMatch>>
where
    E: Embedder,
    S: VectorStore,
{
    let text = text.trim();
    if text.is_empty() {
        return Err(WorkerError::config("search text must not be empty"));
    }
    if limit == 0 {
        return Err(WorkerError::config("--limit must be greater than 0"));
    }

    let vector = embedder.embed_query(text).await?;
    let hits = store.search(vector, limit).await?;
    Ok(hits.iter().map(IdeaMatch::from_hit).collect())
}

/// Terminal listing of search results
pub fn render(matches: &[IdeaMatch]) -> String {
    if matches.is_empty() {
        return "No results found. Is the collection empty?\n".to_string();
    }

    let mut out = String::new();
    for (rank, m) in matches.iter().enumerate() {
        // Writing to a String cannot fail
        let _ = writeln!(out, "#{}  score {:.4}  [{}]", rank + 1, m.score, m.source_type);
        let _ = writeln!(out, "    {}", m.title);
        let _ = writeln!(out, "    {}", m.abstract_preview);
        out.push('\n');
    }
    out
}

fn text_field<'a>(record: Option<&'a Value>, key: &str) -> &'a str {
    record
        .and_then(|r| r.get(key))
        .and_then(Value::as_str)
        .unwrap_or("")
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(ABSTRACT_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
