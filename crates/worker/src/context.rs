// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token-budgeted prompt assembly for the Cards and Facts agents.

use serde::Serialize;

use crate::facts::Fact;
use crate::repo::GlossaryEntry;
use crate::tokens::count_tokens;

/// A named, priority-ranked slice of a prompt. Higher `priority` is admitted
/// first; a section that doesn't fit in the remaining budget is dropped
/// whole — there is no partial-section fallback text in this build.
struct PromptSection {
    name: &'static str,
    content: String,
    priority: u8,
}

impl PromptSection {
    fn tokens(&self) -> usize {
        count_tokens(&self.content)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TokenBreakdown {
    pub total: usize,
    pub system: usize,
    pub history: usize,
    pub facts: usize,
    pub glossary: usize,
    pub transcript: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardsContext {
    pub bullets: Vec<String>,
    pub facts: Vec<(String, serde_json::Value, f32)>,
    pub glossary_context: String,
    pub breakdown: TokenBreakdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct FactsContext {
    pub context: String,
    pub recent_text: String,
    pub breakdown: TokenBreakdown,
}

const CARDS_SYSTEM_PROMPT: &str =
    "You generate concise suggestion cards grounded in the live conversation.";
const FACTS_SYSTEM_PROMPT: &str =
    "You extract and update structured facts from the live conversation transcript.";

/// Greedily admit `sections` (already sorted by descending priority) into
/// `budget_tokens`, returning the admitted sections and tokens spent.
fn assemble_sections(sections: Vec<PromptSection>, budget_tokens: usize) -> (Vec<PromptSection>, usize) {
    let mut admitted = Vec::new();
    let mut used = 0usize;
    for section in sections {
        let cost = section.tokens();
        if used + cost > budget_tokens {
            continue;
        }
        used += cost;
        admitted.push(section);
    }
    (admitted, used)
}

fn section_tokens(admitted: &[PromptSection], name: &str) -> usize {
    admitted.iter().find(|s| s.name == name).map(PromptSection::tokens).unwrap_or(0)
}

/// Build the Cards prompt context for a single ingest cycle.
pub fn build_cards_context(
    current_text: &str,
    facts: &[&Fact],
    glossary: &[GlossaryEntry],
    budget_tokens: usize,
) -> CardsContext {
    let facts_text = facts
        .iter()
        .map(|f| format!("- {}: {} (confidence {:.2})", f.key, f.value, f.confidence))
        .collect::<Vec<_>>()
        .join("\n");
    let glossary_text =
        glossary.iter().map(|g| format!("{}: {}", g.term, g.definition)).collect::<Vec<_>>().join("\n");

    let sections = vec![
        PromptSection { name: "system", content: CARDS_SYSTEM_PROMPT.to_string(), priority: 100 },
        PromptSection { name: "facts", content: facts_text, priority: 80 },
        PromptSection { name: "glossary", content: glossary_text.clone(), priority: 60 },
        PromptSection { name: "transcript", content: current_text.to_string(), priority: 90 },
    ];

    let (admitted, used) = assemble_sections(sections, budget_tokens);
    let breakdown = TokenBreakdown {
        total: used,
        system: section_tokens(&admitted, "system"),
        history: 0,
        facts: section_tokens(&admitted, "facts"),
        glossary: section_tokens(&admitted, "glossary"),
        transcript: section_tokens(&admitted, "transcript"),
    };

    CardsContext {
        bullets: vec![current_text.to_string()],
        facts: facts.iter().map(|f| (f.key.clone(), f.value.clone(), f.confidence)).collect(),
        glossary_context: if admitted.iter().any(|s| s.name == "glossary") {
            glossary_text
        } else {
            String::new()
        },
        breakdown,
    }
}

/// Build the Facts prompt context: cleaned recent transcript plus the
/// currently-known facts, so the Facts agent can reconcile new mentions
/// against what it has already extracted.
pub fn build_facts_context(
    recent_text: &str,
    facts: &[&Fact],
    budget_tokens: usize,
) -> FactsContext {
    let facts_text = facts
        .iter()
        .map(|f| format!("- {}: {}", f.key, f.value))
        .collect::<Vec<_>>()
        .join("\n");

    let sections = vec![
        PromptSection { name: "system", content: FACTS_SYSTEM_PROMPT.to_string(), priority: 100 },
        PromptSection { name: "facts", content: facts_text, priority: 70 },
        PromptSection { name: "transcript", content: recent_text.to_string(), priority: 90 },
    ];

    let (admitted, used) = assemble_sections(sections, budget_tokens);
    let breakdown = TokenBreakdown {
        total: used,
        system: section_tokens(&admitted, "system"),
        history: 0,
        facts: section_tokens(&admitted, "facts"),
        glossary: 0,
        transcript: section_tokens(&admitted, "transcript"),
    };

    let context = admitted.iter().map(|s| s.content.as_str()).collect::<Vec<_>>().join("\n\n");

    FactsContext { context, recent_text: recent_text.to_string(), breakdown }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
