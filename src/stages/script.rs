//! Built-in slide script generation.
//!
//! An offline, heuristic stand-in for an LLM-backed generator: one title
//! slide plus one slide per detected section, with bullets lifted from the
//! section's opening sentences. `fallback_skeleton` is the fixed script the
//! orchestrator substitutes when any generator returns nothing.

use super::ScriptGenerator;
use anyhow::Result;
use async_trait::async_trait;
use slidecast_common::{ParsedDocument, Section, Slide, StylePreset};

pub struct OutlineScriptGenerator;

/// Section titles used when a document yields no usable structure.
const SKELETON_SECTIONS: &[&str] = &[
    "Introduction",
    "Background",
    "Methods",
    "Results",
    "Conclusion",
];

/// The fixed 6-slide script used when script generation produces nothing:
/// a title slide plus one slide per skeleton section.
pub fn fallback_skeleton(title: &str) -> Vec<Slide> {
    let mut slides = vec![Slide {
        number: 1,
        title: title.to_string(),
        bullets: vec![
            "Generated presentation".to_string(),
            "Automatic overview".to_string(),
        ],
        narration: format!("Welcome to this presentation about {}.", title),
        notes: None,
        visual_hint: Some("Title slide".to_string()),
    }];

    for (i, section) in SKELETON_SECTIONS.iter().enumerate() {
        slides.push(Slide {
            number: (i + 2) as u32,
            title: section.to_string(),
            bullets: vec![format!("Key points on {}", section.to_lowercase())],
            narration: format!(
                "In this section we look at the {} of the work.",
                section.to_lowercase()
            ),
            notes: None,
            visual_hint: None,
        });
    }

    slides
}

/// First `max` sentences of a text, each clipped to a displayable length.
fn leading_sentences(text: &str, max: usize) -> Vec<String> {
    text.split_terminator(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.len() > 15)
        .take(max)
        .map(|s| {
            let mut bullet: String = s.chars().take(160).collect();
            if bullet.len() < s.len() {
                bullet.push('…');
            }
            bullet
        })
        .collect()
}

fn narration_for(section: &Section) -> String {
    let lead: String = section.content.chars().take(300).collect();
    format!("Turning to {}. {}", section.title, lead.trim())
}

/// Synthetic sections carved out of raw text when none were detected,
/// so long unstructured documents still produce a multi-slide deck.
fn chunk_sections(text: &str, chunks: usize) -> Vec<Section> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }
    let chunk_size = (words.len() / chunks).max(1);

    SKELETON_SECTIONS
        .iter()
        .take(chunks)
        .enumerate()
        .filter_map(|(i, title)| {
            let start = i * chunk_size;
            if start >= words.len() {
                return None;
            }
            let end = (start + chunk_size).min(words.len());
            Some(Section {
                title: title.to_string(),
                content: words[start..end].join(" "),
            })
        })
        .collect()
}

#[async_trait]
impl ScriptGenerator for OutlineScriptGenerator {
    async fn generate(
        &self,
        doc: &ParsedDocument,
        style: StylePreset,
        title: &str,
    ) -> Result<Vec<Slide>> {
        let sections = if doc.sections.is_empty() {
            chunk_sections(&doc.text, SKELETON_SECTIONS.len())
        } else {
            doc.sections.clone()
        };

        let mut slides = vec![Slide {
            number: 1,
            title: title.to_string(),
            bullets: sections
                .iter()
                .take(3)
                .map(|s| s.title.clone())
                .collect(),
            narration: format!("Welcome to this presentation about {}.", title),
            notes: None,
            visual_hint: Some("Title slide".to_string()),
        }];

        for section in sections.iter().take(style.max_slides().saturating_sub(1)) {
            let bullets = leading_sentences(&section.content, style.max_bullets());
            slides.push(Slide {
                number: (slides.len() + 1) as u32,
                title: section.title.clone(),
                bullets,
                narration: narration_for(section),
                notes: None,
                visual_hint: None,
            });
        }

        Ok(slides)
    }
}
