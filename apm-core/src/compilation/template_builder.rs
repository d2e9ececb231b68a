//! Assemble the sections of a compiled agents file.

use indexmap::IndexMap;

use crate::primitives::{Chatmode, Context, Instruction};

/// Top-level header of every compiled file.
pub const AGENTS_HEADER: &str = "# AGENTS.md";

/// Build `## Files matching \`<pattern>\`` sections. Instructions sharing a
/// pattern are grouped under one heading, in input order.
pub fn build_conditional_sections(instructions: &[&Instruction]) -> String {
    let mut grouped: IndexMap<&str, Vec<&Instruction>> = IndexMap::new();
    for instruction in instructions {
        grouped
            .entry(instruction.apply_to.as_str())
            .or_default()
            .push(instruction);
    }

    let mut sections = Vec::with_capacity(grouped.len());
    for (pattern, group) in grouped {
        let bodies: Vec<&str> = group
            .iter()
            .map(|instruction| instruction.content.trim())
            .collect();
        sections.push(format!(
            "## Files matching `{pattern}`\n\n{}",
            bodies.join("\n\n")
        ));
    }
    sections.join("\n\n")
}

/// Chatmode persona section, placed ahead of any instruction sections.
pub fn build_chatmode_section(chatmode: &Chatmode) -> String {
    chatmode.content.trim().to_string()
}

/// Context primitives are appended verbatim, separated by blank lines.
pub fn build_context_sections(contexts: &[&Context]) -> String {
    contexts
        .iter()
        .map(|context| context.content.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Join non-empty sections under the top-level header.
pub fn assemble_document(sections: &[String]) -> String {
    let mut parts = vec![AGENTS_HEADER.to_string()];
    parts.extend(sections.iter().filter(|s| !s.trim().is_empty()).cloned());
    let mut document = parts.join("\n\n");
    document.push('\n');
    document
}
