//! Flat block-level document model.
//!
//! A [`Document`] is an ordered list of [`DocumentNode`]s. Headings are not
//! nested in a tree: a heading scopes every following node up to the next
//! heading of equal or lower level, which [`section_span`] computes.
//!
//! Block boundaries come from the tree-sitter markdown grammar, which follows
//! CommonMark for fences, containers and lazy continuation lines. Each node
//! keeps its source lines verbatim together with the number of blank lines
//! that preceded it, so nodes the merger does not touch are written back
//! exactly as they were read.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use agent_context_shared::{AgentContextError, Result};

/// `# Heading` with up to three spaces of indentation.
static ATX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(#{1,6})(?:[ \t]+(.*))?$").expect("ATX heading regex")
});

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Block kind of a [`DocumentNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// ATX or setext heading with its normalized text.
    Heading { level: u8, text: String },
    Paragraph,
    /// Consecutive list items; the items are the node's children.
    List,
    ListItem,
    /// Code blocks, thematic breaks, block quotes, HTML and the rest. Opaque.
    Other,
}

/// One block of a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentNode {
    kind: NodeKind,
    raw: String,
    blank_before: usize,
    children: Vec<DocumentNode>,
}

impl DocumentNode {
    fn from_lines(kind: NodeKind, lines: &[&str], blank_before: usize) -> Self {
        Self {
            kind,
            raw: lines.join("\n"),
            blank_before,
            children: Vec::new(),
        }
    }

    /// A fresh ATX heading, e.g. `## Context`.
    pub fn heading(level: u8, text: &str) -> Self {
        let level = level.clamp(1, 6);
        let text = normalize_heading_text(text);
        Self {
            raw: format!("{} {text}", "#".repeat(usize::from(level))),
            kind: NodeKind::Heading { level, text },
            blank_before: 1,
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Verbatim source text of the block, without a trailing newline.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Blank lines between this node and the previous one.
    pub fn blank_before(&self) -> usize {
        self.blank_before
    }

    pub(crate) fn set_blank_before(&mut self, blank_lines: usize) {
        self.blank_before = blank_lines;
    }

    /// List items of a `List` node; empty for every other kind.
    pub fn children(&self) -> &[DocumentNode] {
        &self.children
    }

    /// Heading level, or `None` for non-heading nodes.
    pub fn level(&self) -> Option<u8> {
        match &self.kind {
            NodeKind::Heading { level, .. } => Some(*level),
            _ => None,
        }
    }

    /// Normalized heading text, or `None` for non-heading nodes.
    pub fn heading_text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Heading { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Whether this is a heading at exactly `level` whose text equals
    /// `text`, ignoring case and surrounding whitespace.
    pub fn is_heading(&self, text: &str, level: u8) -> bool {
        match &self.kind {
            NodeKind::Heading { level: l, text: t } => {
                *l == level && t.to_lowercase() == normalize_heading_text(text).to_lowercase()
            }
            _ => false,
        }
    }

    /// Whether this heading closes a section opened at `threshold`.
    fn closes_section(&self, threshold: u8) -> bool {
        self.level().is_some_and(|level| level <= threshold)
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// An ordered sequence of block nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<DocumentNode>,
}

impl Document {
    /// Parse markdown text into block nodes.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(Self {
            nodes: parse_blocks(text)?,
        })
    }

    /// Parse raw bytes, rejecting anything that is not UTF-8.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            AgentContextError::parse(format!(
                "document is not valid UTF-8 (first invalid byte at offset {})",
                e.valid_up_to()
            ))
        })?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        Self::parse(text)
    }

    pub fn from_nodes(nodes: Vec<DocumentNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[DocumentNode] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<DocumentNode> {
        self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut Vec<DocumentNode> {
        &mut self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Index of the first heading matching `text` at `level` within `range`.
    pub fn find_heading(&self, range: Range<usize>, text: &str, level: u8) -> Option<usize> {
        let end = range.end.min(self.nodes.len());
        (range.start..end).find(|&i| self.nodes[i].is_heading(text, level))
    }

    /// Serialize back to markdown.
    ///
    /// Nodes are written verbatim, separated by their recorded blank-line
    /// gaps. Output ends with exactly one newline unless the document is
    /// empty.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            for _ in 0..node.blank_before {
                out.push('\n');
            }
            out.push_str(&node.raw);
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

/// Span of nodes scoped by the heading at `start`.
///
/// The span begins right after `start` and ends before the first heading
/// whose level is `<= threshold`, or at the end of `nodes`.
pub fn section_span(nodes: &[DocumentNode], start: usize, threshold: u8) -> Range<usize> {
    let first = (start + 1).min(nodes.len());
    let end = nodes[first..]
        .iter()
        .position(|node| node.closes_section(threshold))
        .map_or(nodes.len(), |offset| first + offset);
    first..end
}

/// Strip an optional closing `#` sequence and collapse whitespace.
pub fn normalize_heading_text(text: &str) -> String {
    let trimmed = text.trim();
    let without_closing = {
        let stripped = trimmed.trim_end_matches('#');
        if stripped.len() == trimmed.len() {
            trimmed
        } else if stripped.is_empty() || stripped.ends_with([' ', '\t']) {
            stripped
        } else {
            trimmed
        }
    };
    without_closing.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Block parser
// ---------------------------------------------------------------------------

/// Source lines `first..=last` covered by one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineSpan {
    first: usize,
    last: usize,
}

/// Split `text` into top-level blocks using the tree-sitter markdown grammar.
///
/// Block boundaries come from the syntax tree; the node text is always the
/// verbatim source lines.
fn parse_blocks(text: &str) -> Result<Vec<DocumentNode>> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_md::LANGUAGE.into())
        .map_err(|e| AgentContextError::parse(format!("failed to load markdown grammar: {e}")))?;
    let tree = parser
        .parse(text, None)
        .ok_or_else(|| AgentContextError::parse("markdown parser returned no syntax tree"))?;

    let lines: Vec<&str> = text.lines().collect();
    let mut blocks = Vec::new();
    collect_blocks(tree.root_node(), &mut blocks);

    let mut nodes = Vec::new();
    let mut next_line = 0;
    for block in blocks {
        let Some(span) = line_span(text, block, lines.len()) else {
            continue;
        };
        if span.last < next_line {
            continue;
        }

        let first = span.first.max(next_line);
        let blank = fill_gap(&lines, next_line..first, &mut nodes);
        let body = &lines[first..=span.last];
        let kind = if first == span.first {
            classify(block, body)
        } else {
            NodeKind::Other
        };

        let mut node = DocumentNode::from_lines(kind, body, blank);
        if node.kind == NodeKind::List {
            node.children = list_items(text, &lines, block);
        }
        nodes.push(node);
        next_line = span.last + 1;
    }
    fill_gap(&lines, next_line..lines.len(), &mut nodes);

    Ok(nodes)
}

/// Leaf blocks in document order; `section` wrappers are flattened.
fn collect_blocks<'t>(node: tree_sitter::Node<'t>, out: &mut Vec<tree_sitter::Node<'t>>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "section" {
            collect_blocks(child, out);
        } else {
            out.push(child);
        }
    }
}

/// Lines holding the non-blank text of `node`, or `None` if it has none.
fn line_span(text: &str, node: tree_sitter::Node<'_>, line_count: usize) -> Option<LineSpan> {
    let body = text.get(node.start_byte()..node.end_byte())?;
    let content = body.trim();
    if content.is_empty() {
        return None;
    }
    let lead = &body[..body.len() - body.trim_start().len()];
    let first = node.start_position().row + lead.matches('\n').count();
    let last = first + content.matches('\n').count();
    (last < line_count).then_some(LineSpan { first, last })
}

/// Keep stray non-blank lines between blocks as one opaque node. Returns the
/// number of blank lines left before the end of the gap.
fn fill_gap(lines: &[&str], gap: Range<usize>, nodes: &mut Vec<DocumentNode>) -> usize {
    let gap = &lines[gap];
    let Some(last) = gap.iter().rposition(|l| !l.trim().is_empty()) else {
        return gap.len();
    };
    let first = gap.iter().position(|l| !l.trim().is_empty()).unwrap_or(last);
    nodes.push(DocumentNode::from_lines(NodeKind::Other, &gap[first..=last], first));
    gap.len() - last - 1
}

fn classify(block: tree_sitter::Node<'_>, body: &[&str]) -> NodeKind {
    match block.kind() {
        "atx_heading" => body
            .first()
            .and_then(|line| atx_heading(line))
            .map_or(NodeKind::Other, |(level, text)| NodeKind::Heading { level, text }),
        "setext_heading" => setext_heading(body).unwrap_or(NodeKind::Other),
        "paragraph" => NodeKind::Paragraph,
        "list" => NodeKind::List,
        _ => NodeKind::Other,
    }
}

fn atx_heading(line: &str) -> Option<(u8, String)> {
    let caps = ATX_RE.captures(line)?;
    let level = u8::try_from(caps[1].len()).ok()?;
    let text = caps.get(2).map_or("", |m| m.as_str());
    Some((level, normalize_heading_text(text)))
}

/// Content lines plus a `===` (level 1) or `---` (level 2) underline.
fn setext_heading(body: &[&str]) -> Option<NodeKind> {
    let (underline, content) = body.split_last()?;
    if content.is_empty() {
        return None;
    }
    let level = if underline.trim_start().starts_with('=') { 1 } else { 2 };
    let text = content
        .iter()
        .flat_map(|line| line.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ");
    Some(NodeKind::Heading { level, text })
}

fn list_items(text: &str, lines: &[&str], list: tree_sitter::Node<'_>) -> Vec<DocumentNode> {
    let mut cursor = list.walk();
    let mut items = Vec::new();
    let mut previous: Option<usize> = None;

    for item in list.named_children(&mut cursor) {
        if item.kind() != "list_item" {
            continue;
        }
        let Some(span) = line_span(text, item, lines.len()) else {
            continue;
        };
        let blank = previous.map_or(0, |p| span.first.saturating_sub(p + 1));
        items.push(DocumentNode::from_lines(
            NodeKind::ListItem,
            &lines[span.first..=span.last],
            blank,
        ));
        previous = Some(span.last);
    }
    items
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
