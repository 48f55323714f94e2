//! Built-in document parser for plain-text and Markdown sources.
//!
//! Richer formats (PDF, Word, PowerPoint, LaTeX archives) are the province
//! of an external parsing service implementing [`DocumentParser`]; this
//! built-in rejects them with a diagnostic rather than guessing.

use super::DocumentParser;
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use slidecast_common::{InputKind, ParsedDocument, Section};
use std::path::Path;
use std::sync::OnceLock;

pub struct TextDocumentParser;

fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:#{1,3}\s+(?P<md>.+?)\s*#*\s*$|(?:\d{1,2}\.?\s+)?(?P<kw>abstract|introduction|background|related work|methods?|methodology|approach|experiments?|results|discussion|conclusions?|references)\s*$)",
        )
        .expect("heading regex")
    })
}

/// Scrub control characters, normalizing line endings and dropping anything
/// unprintable that trips up downstream text handling.
fn clean_text(raw: &str) -> String {
    raw.replace("\r\n", "\n")
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

fn flush_section(title: Option<String>, lines: &mut Vec<&str>, out: &mut Vec<Section>) {
    let content = lines.join("\n").trim().to_string();
    lines.clear();
    match title {
        Some(title) => out.push(Section { title, content }),
        None if content.len() > 80 => out.push(Section {
            title: "Overview".to_string(),
            content,
        }),
        None => {}
    }
}

/// Split text into sections at recognized headings. Text before the first
/// heading is dropped into an untitled preamble section when non-trivial.
fn split_sections(text: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut current_title: Option<String> = None;
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(caps) = heading_regex().captures(trimmed) {
            flush_section(current_title.take(), &mut current, &mut sections);
            let title = caps
                .name("md")
                .or_else(|| caps.name("kw"))
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_else(|| trimmed.to_string());
            current_title = Some(title);
        } else {
            current.push(line);
        }
    }
    flush_section(current_title.take(), &mut current, &mut sections);

    sections
}

#[async_trait]
impl DocumentParser for TextDocumentParser {
    async fn parse(
        &self,
        input: &Path,
        kind: InputKind,
        _workdir: &Path,
    ) -> Result<ParsedDocument> {
        if kind != InputKind::Document {
            anyhow::bail!(
                "unsupported input kind '{}': this build parses plain-text documents only",
                kind
            );
        }

        let raw = tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("Failed to read document {:?}", input))?;

        let text = clean_text(&raw);
        if text.trim().is_empty() {
            anyhow::bail!("document is empty or unreadable: {:?}", input);
        }

        let sections = split_sections(&text);

        Ok(ParsedDocument {
            text,
            sections,
            figures: Vec::new(),
        })
    }
}
