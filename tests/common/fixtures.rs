use concept_pipeline::models::{
    EnrichmentData, GeneratedContent, KnowledgeType, StandardizedConcept, TaskWork,
};
use concept_pipeline::pipeline::note::{compose_note, NoteMetadata};
use serde_json::json;

pub fn entropy_concept() -> StandardizedConcept {
    StandardizedConcept {
        standard_name: "Entropy".to_string(),
        aliases: vec!["thermodynamic entropy".to_string()],
        primary_type: KnowledgeType::Theory,
        core_definition: "A measure of disorder in a system".to_string(),
    }
}

pub fn enrich_work(name: &str) -> TaskWork {
    TaskWork::Enrich {
        standardized: StandardizedConcept {
            standard_name: name.to_string(),
            ..entropy_concept()
        },
        result: None,
    }
}

pub fn enrich_reply() -> String {
    json!({
        "aliases": ["second law"],
        "tags": ["#physics", "thermodynamics"]
    })
    .to_string()
}

/// Complete theory body, as a fenced model reply
pub fn theory_reply(definition: &str) -> String {
    format!(
        "```json\n{}\n```",
        json!({
            "definition": definition,
            "axioms": ["Energy is conserved"],
            "arguments": ["Statistical mechanics"],
            "limitations": ["Assumes equilibrium"]
        })
    )
}

pub fn theory_content(definition: &str) -> GeneratedContent {
    serde_json::from_value(json!({
        "definition": definition,
        "axioms": ["Energy is conserved"],
        "arguments": ["Statistical mechanics"],
        "limitations": ["Assumes equilibrium"]
    }))
    .expect("valid generated content")
}

pub fn enrichment() -> EnrichmentData {
    EnrichmentData {
        aliases: vec!["second law".to_string()],
        tags: vec!["physics".to_string()],
    }
}

/// A written theory note with a body
pub fn existing_theory_note(uid: &str, name: &str, aliases: &[&str]) -> String {
    let mut metadata = NoteMetadata::new(uid, KnowledgeType::Theory, name);
    metadata.merge_aliases(aliases.iter().copied());
    metadata.merge_tags(["physics"]);
    compose_note(&metadata, Some(&theory_content(&format!("{name} as written before"))))
        .expect("note renders")
}
