//! Note composition: YAML frontmatter followed by body sections rendered from
//! the knowledge type's field schema.

use crate::constants::codes;
use crate::error::{PipelineError, Result};
use crate::models::{GeneratedContent, KnowledgeType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const FENCE: &str = "---";
const FORBIDDEN_FILENAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteStatus {
    /// Metadata only, written before generation
    Stub,
    Draft,
}

/// Frontmatter of a note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteMetadata {
    pub uid: String,
    #[serde(rename = "type")]
    pub note_type: KnowledgeType,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: NoteStatus,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl NoteMetadata {
    pub fn new(uid: impl Into<String>, note_type: KnowledgeType, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            uid: uid.into(),
            note_type,
            name: name.into(),
            aliases: Vec::new(),
            tags: Vec::new(),
            status: NoteStatus::Stub,
            created: now,
            updated: now,
        }
    }

    /// Add aliases not already present (case-insensitive), never the name itself
    pub fn merge_aliases<I, S>(&mut self, aliases: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for alias in aliases {
            let alias = alias.as_ref().trim();
            if alias.is_empty() || alias.eq_ignore_ascii_case(&self.name) {
                continue;
            }
            if !self.aliases.iter().any(|a| a.eq_ignore_ascii_case(alias)) {
                self.aliases.push(alias.to_string());
            }
        }
    }

    pub fn merge_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            let tag = tag.as_ref().trim().trim_start_matches('#');
            if !tag.is_empty() && !self.tags.iter().any(|t| t == tag) {
                self.tags.push(tag.to_string());
            }
        }
    }
}

/// Strip characters that are illegal in file names and trim whitespace
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !FORBIDDEN_FILENAME_CHARS.contains(c) && !c.is_control())
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches('.').trim();
    if trimmed.is_empty() {
        "Untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `<notes_dir>/<TypeDir>/<sanitized name>.md`
pub fn note_path(notes_dir: &str, knowledge_type: KnowledgeType, name: &str) -> String {
    let dir = notes_dir.trim_end_matches('/');
    let file = format!("{}.md", sanitize_filename(name));
    if dir.is_empty() {
        format!("{}/{file}", knowledge_type.directory())
    } else {
        format!("{dir}/{}/{file}", knowledge_type.directory())
    }
}

/// Render a note. Without `content` only the frontmatter is written.
pub fn compose_note(metadata: &NoteMetadata, content: Option<&GeneratedContent>) -> Result<String> {
    let yaml = serde_yaml::to_string(metadata).map_err(|e| {
        PipelineError::new(
            codes::SNAPSHOT_SERIALIZATION,
            format!("Failed to serialize note metadata: {e}"),
        )
    })?;

    let mut out = format!("{FENCE}\n{yaml}{FENCE}\n");
    let Some(content) = content else {
        return Ok(out);
    };

    for field in metadata.note_type.fields() {
        let Some(value) = content.fields.get(field.key) else {
            continue;
        };
        let rendered = render_value(value, field.list);
        if rendered.is_empty() {
            continue;
        }
        out.push_str(&format!("\n## {}\n\n{rendered}\n", field.heading));
    }
    Ok(out)
}

fn render_value(value: &Value, list: bool) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) if list => bullet(text.trim()),
        Value::String(text) => text.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => bullet(text.trim()),
                other => bullet(&other.to_string()),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

fn bullet(text: &str) -> String {
    format!("- {text}")
}

/// Split a note into its frontmatter YAML and body
pub fn split_frontmatter(raw: &str) -> Option<(&str, &str)> {
    let rest = raw.strip_prefix(FENCE)?.strip_prefix('\n')?;
    let end = rest.find("\n---")?;
    let yaml = &rest[..end + 1];
    let body = rest[end + 4..].trim_start_matches('\n');
    Some((yaml, body))
}

/// Parse the frontmatter of an existing note
pub fn parse_metadata(raw: &str) -> Result<NoteMetadata> {
    let (yaml, _) = split_frontmatter(raw).ok_or_else(|| {
        PipelineError::new(codes::MISSING_ARTIFACT, "Note has no frontmatter block")
    })?;
    serde_yaml::from_str(yaml).map_err(|e| {
        PipelineError::new(
            codes::MISSING_ARTIFACT,
            format!("Note frontmatter is invalid: {e}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn theory_content() -> GeneratedContent {
        serde_json::from_value(json!({
            "definition": "Measure of disorder.",
            "axioms": ["Energy is conserved", "Entropy never decreases"],
            "arguments": [],
            "limitations": "Applies to closed systems."
        }))
        .unwrap()
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("  What/Is: \"Entropy\"?  "), "WhatIs Entropy");
        assert_eq!(sanitize_filename("a<b>c|d*e"), "abcde");
        assert_eq!(sanitize_filename("///"), "Untitled");
    }

    #[test]
    fn test_note_path_uses_type_directory() {
        assert_eq!(
            note_path("notes/", KnowledgeType::Theory, "Entropy: A Primer"),
            "notes/Theories/Entropy A Primer.md"
        );
    }

    #[test]
    fn test_stub_has_frontmatter_only() {
        let meta = NoteMetadata::new("n1", KnowledgeType::Theory, "Entropy");
        let stub = compose_note(&meta, None).unwrap();
        assert!(stub.starts_with("---\n"));
        assert!(stub.ends_with("---\n"));
        assert!(stub.contains("status: Stub"));
        assert!(!stub.contains("##"));
    }

    #[test]
    fn test_body_follows_schema_order() {
        let mut meta = NoteMetadata::new("n1", KnowledgeType::Theory, "Entropy");
        meta.status = NoteStatus::Draft;
        let note = compose_note(&meta, Some(&theory_content())).unwrap();

        let definition = note.find("## Definition").unwrap();
        let axioms = note.find("## Axioms").unwrap();
        let limitations = note.find("## Limitations").unwrap();
        assert!(definition < axioms && axioms < limitations);
        assert!(note.contains("- Entropy never decreases"));
        assert!(!note.contains("## Arguments"));
        assert!(note.contains("- Applies to closed systems."));
    }

    #[test]
    fn test_metadata_round_trips_through_note() {
        let mut meta = NoteMetadata::new("n1", KnowledgeType::Mechanism, "Feedback Loop");
        meta.merge_aliases(["feedback", "Feedback Loop", "FEEDBACK"]);
        meta.merge_tags(["#systems", "systems"]);
        assert_eq!(meta.aliases, vec!["feedback"]);
        assert_eq!(meta.tags, vec!["systems"]);

        let note = compose_note(&meta, None).unwrap();
        assert_eq!(parse_metadata(&note).unwrap(), meta);
        assert_eq!(
            parse_metadata("no frontmatter").unwrap_err().code,
            codes::MISSING_ARTIFACT
        );
    }
}
