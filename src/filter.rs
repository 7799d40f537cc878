use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;

/// Compiled drop-list: a regular comment whose text matches any pattern is
/// excluded before layout. Positioned comments bypass filtering.
#[derive(Debug, Default)]
pub struct CommentFilter {
    patterns: Vec<Regex>,
}

impl CommentFilter {
    /// Compile the inline pattern plus one pattern per non-empty line of the
    /// filter file. An invalid expression is fatal before any processing.
    pub fn compile(inline: Option<&str>, file: Option<&Path>) -> Result<Self> {
        let mut sources: Vec<String> = Vec::new();
        if let Some(pattern) = inline {
            sources.push(pattern.to_owned());
        }
        if let Some(path) = file {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read filter file {}", path.display()))?;
            sources.extend(contents.lines().map(|line| line.trim().to_owned()));
        }

        let mut patterns = Vec::new();
        for source in sources {
            if source.is_empty() {
                continue;
            }
            patterns.push(
                Regex::new(&source)
                    .with_context(|| format!("invalid filter expression: {source}"))?,
            );
        }
        Ok(Self { patterns })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(text))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
