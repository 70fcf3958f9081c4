//! Section-scoped merge of a generated block into an existing document.
//!
//! The managed section is located by heading text and level, never by
//! markers. Only the section's own span is replaced; everything else in the
//! document is carried over node for node.

use std::ops::Range;

use tracing::{debug, instrument};

use agent_context_shared::{AgentContextError, Result, SectionSpec};

use crate::document::{Document, DocumentNode, section_span};

/// Merge `generated_block` into the section described by `spec`.
///
/// `existing` is the current document's bytes, or `None` when the target
/// does not exist yet. The result is the full updated document text.
///
/// # Errors
///
/// - [`AgentContextError::Parse`] if `existing` is not valid UTF-8.
/// - [`AgentContextError::Validation`] if the generated block contains a
///   heading that would close the managed section.
#[instrument(skip_all, fields(anchor = %spec.anchor_heading, section = %spec.section_heading))]
pub fn merge(existing: Option<&[u8]>, spec: &SectionSpec, generated_block: &str) -> Result<String> {
    let block = Document::parse(generated_block)?;
    check_block_headings(&block, spec)?;

    let document = match existing {
        Some(bytes) => Document::from_bytes(bytes)?,
        None => Document::default(),
    };

    let merged = merge_document(document, spec, block.into_nodes());
    Ok(merged.to_markdown())
}

/// Splice `block` into `document` according to `spec`.
pub fn merge_document(mut document: Document, spec: &SectionSpec, block: Vec<DocumentNode>) -> Document {
    let block = normalize_block(block);

    if document.is_empty() {
        debug!("no existing content, synthesizing document");
        let mut nodes = vec![DocumentNode::heading(spec.anchor_level, &spec.anchor_heading)];
        nodes[0].set_blank_before(0);
        nodes.push(DocumentNode::heading(spec.section_level, &spec.section_heading));
        nodes.extend(block);
        return Document::from_nodes(nodes);
    }

    if !spec.is_nested() {
        debug!(
            anchor_level = spec.anchor_level,
            section_level = spec.section_level,
            "section is not nested under anchor, merging at document root"
        );
        return merge_at_root(document, spec, block);
    }

    let len = document.len();
    let Some(anchor) = document.find_heading(0..len, &spec.anchor_heading, spec.anchor_level) else {
        let at = insertion_point(document.nodes(), 0..len, spec.section_level);
        debug!(at, "anchor heading not found, inserting anchor and section");
        let mut inserted = vec![
            DocumentNode::heading(spec.anchor_level, &spec.anchor_heading),
            DocumentNode::heading(spec.section_level, &spec.section_heading),
        ];
        inserted.extend(block);
        insert_nodes(&mut document, at, inserted);
        return document;
    };

    let run = section_span(document.nodes(), anchor, spec.anchor_level);
    match document.find_heading(run.clone(), &spec.section_heading, spec.section_level) {
        None => {
            let at = insertion_point(document.nodes(), run, spec.section_level);
            debug!(anchor, at, "section heading not found under anchor, inserting");
            let mut inserted = vec![DocumentNode::heading(spec.section_level, &spec.section_heading)];
            inserted.extend(block);
            insert_nodes(&mut document, at, inserted);
        }
        Some(section) => {
            let span = section_span(document.nodes(), section, spec.section_level);
            let span = span.start..span.end.min(run.end);
            debug!(section, replaced = span.len(), "replacing section content");
            replace_nodes(&mut document, span, block);
        }
    }

    document
}

/// Fallback for a spec whose section is not deeper than its anchor: the
/// section is located (or created) at the document root.
fn merge_at_root(mut document: Document, spec: &SectionSpec, block: Vec<DocumentNode>) -> Document {
    let len = document.len();
    match document.find_heading(0..len, &spec.section_heading, spec.section_level) {
        Some(section) => {
            let span = section_span(document.nodes(), section, spec.section_level);
            replace_nodes(&mut document, span, block);
        }
        None => {
            let at = insertion_point(document.nodes(), 0..len, spec.section_level);
            let mut inserted = vec![DocumentNode::heading(spec.section_level, &spec.section_heading)];
            inserted.extend(block);
            insert_nodes(&mut document, at, inserted);
        }
    }
    document
}

/// Where a missing section goes inside `range`: before the first heading at
/// or above `section_level`, or at the end of the range.
///
/// Anything between the new section and that point would otherwise become
/// part of the section and be replaced on the next merge.
fn insertion_point(nodes: &[DocumentNode], mut range: Range<usize>, section_level: u8) -> usize {
    let end = range.end;
    range
        .find(|&i| nodes[i].level().is_some_and(|level| level <= section_level))
        .unwrap_or(end)
}

/// The block always starts one blank line below the section heading.
fn normalize_block(mut block: Vec<DocumentNode>) -> Vec<DocumentNode> {
    if let Some(first) = block.first_mut() {
        first.set_blank_before(1);
    }
    block
}

/// Splice `inserted` in at `at`. The first inserted node sits flush at the
/// top of the document and one blank line below anything else.
fn insert_nodes(document: &mut Document, at: usize, mut inserted: Vec<DocumentNode>) {
    if let Some(first) = inserted.first_mut() {
        first.set_blank_before(usize::from(at > 0));
    }
    let count = inserted.len();
    let nodes = document.nodes_mut();
    nodes.splice(at..at, inserted);
    separate_from_previous(nodes, at + count);
}

fn replace_nodes(document: &mut Document, span: Range<usize>, block: Vec<DocumentNode>) {
    let start = span.start;
    let count = block.len();
    let nodes = document.nodes_mut();
    nodes.splice(span, block);
    if count > 0 {
        separate_from_previous(nodes, start + count);
    }
}

/// Ensure the node at `index` (if any) is not glued to freshly inserted content.
fn separate_from_previous(nodes: &mut [DocumentNode], index: usize) {
    if let Some(node) = nodes.get_mut(index) {
        if node.blank_before() == 0 {
            node.set_blank_before(1);
        }
    }
}

fn check_block_headings(block: &Document, spec: &SectionSpec) -> Result<()> {
    let escaping = block
        .nodes()
        .iter()
        .filter_map(DocumentNode::level)
        .find(|&level| level <= spec.section_level);

    match escaping {
        Some(level) => Err(AgentContextError::validation(format!(
            "generated block contains a level {level} heading, which would end the level {} section \"{}\"",
            spec.section_level, spec.section_heading
        ))),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BLOCK: &str = "### example_gem\n\nContext files for example_gem\n\n- **[Example Gem](example_gem/README.md)**\n  This is an example gem.\n";

    fn spec() -> SectionSpec {
        SectionSpec::default()
    }

    fn run(existing: &str, block: &str) -> String {
        merge(Some(existing.as_bytes()), &spec(), block).unwrap()
    }

    #[test]
    fn absent_document_is_synthesized() {
        let out = merge(None, &spec(), BLOCK).unwrap();
        assert_eq!(out, format!("# Agent\n\n## Context\n\n{BLOCK}"));
    }

    #[test]
    fn whitespace_only_document_counts_as_empty() {
        let out = run("\n\n   \n", "Nothing yet.");
        assert_eq!(out, "# Agent\n\n## Context\n\nNothing yet.\n");
    }

    #[test]
    fn empty_block_on_absent_document() {
        let out = merge(None, &spec(), "").unwrap();
        assert_eq!(out, "# Agent\n\n## Context\n");
    }

    #[test]
    fn missing_anchor_is_prepended() {
        let existing = "# Project Documentation\n\nSome intro.\n";
        let out = run(existing, "Generated.");
        assert_eq!(
            out,
            "# Agent\n\n## Context\n\nGenerated.\n\n# Project Documentation\n\nSome intro.\n"
        );
    }

    #[test]
    fn missing_section_is_inserted_after_anchor() {
        let existing = "# Agent\n\n## Build & Commands\n\nRun `make`.\n";
        let out = run(existing, "Generated.");
        assert_eq!(
            out,
            "# Agent\n\n## Context\n\nGenerated.\n\n## Build & Commands\n\nRun `make`.\n"
        );
    }

    #[test]
    fn missing_section_goes_after_anchor_intro() {
        let existing = "# Agent\nIntro glued to heading.\n";
        let out = run(existing, "Generated.");
        assert_eq!(
            out,
            "# Agent\nIntro glued to heading.\n\n## Context\n\nGenerated.\n"
        );
        assert_eq!(run(&out, "Generated."), out);
    }

    #[test]
    fn missing_section_goes_before_first_sibling() {
        let existing = "# Agent\n\nIntro.\n\n### Deep\n\nx\n\n## Build\n\nmake\n";
        let out = run(existing, "new");
        assert_eq!(
            out,
            "# Agent\n\nIntro.\n\n### Deep\n\nx\n\n## Context\n\nnew\n\n## Build\n\nmake\n"
        );
    }

    #[test]
    fn missing_anchor_keeps_leading_text_above() {
        let existing = "Just text.\n\n- a list\n";
        let out = run(existing, "new");
        assert_eq!(out, "Just text.\n\n- a list\n\n# Agent\n\n## Context\n\nnew\n");
        assert_eq!(run(&out, "new"), out);
    }

    #[test]
    fn existing_section_is_replaced() {
        let existing = "# Agent\n\n## Context\n\nOld context content here.\n\n## Build & Commands\n\nRun `make`.\n";
        let out = run(existing, "");
        assert!(!out.contains("Old context content here."));
        assert_eq!(out, "# Agent\n\n## Context\n\n## Build & Commands\n\nRun `make`.\n");
    }

    #[test]
    fn replacement_includes_deeper_headings() {
        let existing = "# Agent\n\n## Context\n\n### stale_pkg\n\n- old\n\n## Other\n";
        let out = run(existing, BLOCK);
        assert!(!out.contains("stale_pkg"));
        assert!(out.contains("### example_gem"));
        assert!(out.ends_with("This is an example gem.\n\n## Other\n"));
    }

    #[test]
    fn empty_span_at_end_of_document() {
        let out = run("# Agent\n\n## Context\n", "Fresh.");
        assert_eq!(out, "# Agent\n\n## Context\n\nFresh.\n");
    }

    #[test]
    fn section_span_is_bounded_by_anchor_run() {
        let existing = "# Agent\n\n## Context\n\nold\n\n# Appendix\n\nkeep\n";
        let out = run(existing, "new");
        assert_eq!(out, "# Agent\n\n## Context\n\nnew\n\n# Appendix\n\nkeep\n");
    }

    #[test]
    fn section_outside_anchor_is_ignored() {
        let existing = "# Agent\n\nIntro.\n\n# Notes\n\n## Context\n\nunrelated\n";
        let out = run(existing, "new");
        assert_eq!(
            out,
            "# Agent\n\nIntro.\n\n## Context\n\nnew\n\n# Notes\n\n## Context\n\nunrelated\n"
        );
    }

    #[test]
    fn first_anchor_wins() {
        let existing = "# Agent\n\n## Context\n\none\n\n# agent\n\n## Context\n\ntwo\n";
        let out = run(existing, "new");
        assert_eq!(out, "# Agent\n\n## Context\n\nnew\n\n# agent\n\n## Context\n\ntwo\n");
    }

    #[test]
    fn heading_match_is_case_insensitive() {
        let existing = "#  AGENT \n\n## context\n\nold\n";
        let out = run(existing, "new");
        // Existing headings are reused verbatim.
        assert_eq!(out, "#  AGENT \n\n## context\n\nnew\n");
    }

    #[test]
    fn heading_level_must_match() {
        let existing = "## Agent\n\n### Context\n\nkeep me\n";
        let out = run(existing, "new");
        assert_eq!(
            out,
            "# Agent\n\n## Context\n\nnew\n\n## Agent\n\n### Context\n\nkeep me\n"
        );
    }

    #[test]
    fn merge_is_idempotent() {
        let inputs = [
            "",
            "# Project Documentation\n\nIntro.\n",
            "# Agent\n\n## Build & Commands\n\n- make\n",
            "# Agent\n\n## Context\n\nOld.\n\n## Build\n\n```\n# comment\n```\n",
            "Preamble\n# Agent\n## Context\n## Next\n",
            "# Agent\n\nIntro.\n",
            "# Agent\n\nIntro.\n\n### Deep\n\nx\n\n## Build\n",
            "# Agent\n- tight list\n\n## Build\n",
            "Just text.\n",
            "- list first\n",
            "## Context\n\nx\n",
        ];
        for input in inputs {
            let once = run(input, BLOCK);
            let twice = run(&once, BLOCK);
            assert_eq!(once, twice, "merge not idempotent for {input:?}");
            if input.contains("Context") {
                continue;
            }
            for line in input.lines().filter(|l| !l.trim().is_empty()) {
                assert!(once.contains(line), "{line:?} lost from {input:?}");
            }
        }
    }

    #[test]
    fn other_sections_survive_verbatim() {
        let tail = "## Build & Commands\n\n```sh\ncargo test   # trailing spaces  \n```\n\n\n## Style\n* tabs\t\n";
        let existing = format!("# Agent\n\n## Context\n\nOld.\n\n{tail}");
        let out = run(&existing, BLOCK);
        assert!(out.ends_with(tail));
    }

    #[test]
    fn escaping_heading_in_block_is_rejected() {
        let err = merge(None, &spec(), "## Sneaky\n\ntext").unwrap_err();
        assert!(matches!(err, AgentContextError::Validation { .. }));
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let err = merge(Some(b"# Agent\n\xc3\x28"), &spec(), BLOCK).unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn flat_spec_falls_back_to_root() {
        let flat = SectionSpec::new("Agent", 2, "Context", 2);
        let existing = "# Readme\n\nIntro.\n";
        let out = merge(Some(existing.as_bytes()), &flat, "new").unwrap();
        assert_eq!(out, "## Context\n\nnew\n\n# Readme\n\nIntro.\n");

        let again = merge(Some(out.as_bytes()), &flat, "newer").unwrap();
        assert_eq!(again, "## Context\n\nnewer\n\n# Readme\n\nIntro.\n");
    }
}
