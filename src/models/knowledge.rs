//! Knowledge-note artifacts produced along a pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Knowledge-type tag of a note; selects its field schema and folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KnowledgeType {
    Domain,
    Issue,
    Theory,
    Entity,
    Mechanism,
}

/// One section of a note body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub heading: &'static str,
    /// Rendered as a bullet list when the value is an array
    pub list: bool,
}

const fn field(key: &'static str, heading: &'static str, list: bool) -> FieldSpec {
    FieldSpec { key, heading, list }
}

const DOMAIN_FIELDS: &[FieldSpec] = &[
    field("definition", "Definition", false),
    field("scope", "Scope", false),
    field("sub_domains", "Sub-domains", true),
    field("key_issues", "Key Issues", true),
];

const ISSUE_FIELDS: &[FieldSpec] = &[
    field("definition", "Definition", false),
    field("core_tension", "Core Tension", false),
    field("significance", "Significance", false),
    field("related_theories", "Related Theories", true),
];

const THEORY_FIELDS: &[FieldSpec] = &[
    field("definition", "Definition", false),
    field("axioms", "Axioms", true),
    field("arguments", "Arguments", true),
    field("limitations", "Limitations", true),
];

const ENTITY_FIELDS: &[FieldSpec] = &[
    field("definition", "Definition", false),
    field("classification", "Classification", false),
    field("properties", "Properties", true),
    field("examples", "Examples", true),
];

const MECHANISM_FIELDS: &[FieldSpec] = &[
    field("definition", "Definition", false),
    field("operates_on", "Operates On", true),
    field("causal_chain", "Causal Chain", true),
    field("outcomes", "Outcomes", true),
];

impl KnowledgeType {
    pub const ALL: [KnowledgeType; 5] = [
        Self::Domain,
        Self::Issue,
        Self::Theory,
        Self::Entity,
        Self::Mechanism,
    ];

    /// Ordered body schema; `definition` always comes first
    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            Self::Domain => DOMAIN_FIELDS,
            Self::Issue => ISSUE_FIELDS,
            Self::Theory => THEORY_FIELDS,
            Self::Entity => ENTITY_FIELDS,
            Self::Mechanism => MECHANISM_FIELDS,
        }
    }

    /// Folder name under the notes directory
    pub fn directory(&self) -> &'static str {
        match self {
            Self::Domain => "Domains",
            Self::Issue => "Issues",
            Self::Theory => "Theories",
            Self::Entity => "Entities",
            Self::Mechanism => "Mechanisms",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Issue => "issue",
            Self::Theory => "theory",
            Self::Entity => "entity",
            Self::Mechanism => "mechanism",
        }
    }
}

impl fmt::Display for KnowledgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Domain => "Domain",
            Self::Issue => "Issue",
            Self::Theory => "Theory",
            Self::Entity => "Entity",
            Self::Mechanism => "Mechanism",
        };
        write!(f, "{name}")
    }
}

/// Result of the interactive define step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardizedConcept {
    pub standard_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub primary_type: KnowledgeType,
    #[serde(default)]
    pub core_definition: String,
}

/// Result of the enrich task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentData {
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Structured body produced by the generate task, keyed by schema field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratedContent {
    pub fields: Map<String, Value>,
}

impl GeneratedContent {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Schema keys that are absent or empty
    pub fn missing_fields(&self, knowledge_type: KnowledgeType) -> Vec<&'static str> {
        knowledge_type
            .fields()
            .iter()
            .filter(|field| match self.fields.get(field.key) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(Value::Array(items)) => items.is_empty(),
                Some(_) => false,
            })
            .map(|field| field.key)
            .collect()
    }

    pub fn definition(&self) -> Option<&str> {
        self.fields.get("definition").and_then(Value::as_str)
    }
}

/// Result of the fact-check task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundingVerdict {
    pub passed: bool,
    #[serde(default)]
    pub issues: Vec<String>,
}

/// How the generate task should produce content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    Create,
    Improve,
    Merge,
}

/// Inputs of a generate task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub mode: GenerationMode,
    pub knowledge_type: KnowledgeType,
    pub name: String,
    #[serde(default)]
    pub core_definition: Option<String>,
    #[serde(default)]
    pub enrichment: Option<EnrichmentData>,
    /// Current note content (improve) or surviving note content (merge)
    #[serde(default)]
    pub existing_content: Option<String>,
    /// Superseded note content (merge)
    #[serde(default)]
    pub secondary_content: Option<String>,
    /// User instruction (improve)
    #[serde(default)]
    pub instruction: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_schema_starts_with_definition() {
        for kind in KnowledgeType::ALL {
            assert_eq!(kind.fields()[0].key, "definition", "{kind}");
        }
    }

    #[test]
    fn test_missing_fields_detects_empty_values() {
        let content: GeneratedContent = serde_json::from_value(json!({
            "definition": "A theory of things",
            "axioms": [],
            "arguments": ["one"],
            "limitations": "  "
        }))
        .unwrap();

        assert_eq!(
            content.missing_fields(KnowledgeType::Theory),
            vec!["axioms", "limitations"]
        );
        assert_eq!(content.definition(), Some("A theory of things"));
    }
}
