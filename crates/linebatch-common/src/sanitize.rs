//! Text cleanup applied to titles and abstracts before embedding
//!
//! Abstracts carry LaTeX fragments (`$\alpha_1$`, `{\em ...}`) and hard line breaks.
//! The cleanup drops the markup characters, turns braces and control whitespace into
//! spaces, then collapses whitespace runs.

use crate::error::{LinebatchError, Result};
use regex::Regex;

/// Compiled cleanup patterns; build once and reuse for every record
#[derive(Debug, Clone)]
pub struct Sanitizer {
    removed: Regex,
    spaced: Regex,
    whitespace: Regex,
}

impl Sanitizer {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| LinebatchError::Parse(format!("invalid pattern {}: {}", pattern, e)))
        };

        Ok(Self {
            removed: compile(r"[/\\$_]")?,
            spaced: compile(r"[{}\n\r\t]")?,
            whitespace: compile(r"\s+")?,
        })
    }

    pub fn clean(&self, text: &str) -> String {
        let text = self.spaced.replace_all(text.trim(), " ");
        let text = self.removed.replace_all(&text, "");
        self.whitespace.replace_all(&text, " ").trim().to_string()
    }
}
