//! Title and description extraction for documentation fragments.

/// Title used when a fragment has no heading.
pub const DEFAULT_TITLE: &str = "Documentation";

/// Longest description kept before truncation.
const MAX_DESCRIPTION_CHARS: usize = 197;

const ELLIPSIS: &str = "...";

/// Extract `(title, description)` from a fragment's raw text.
pub fn summarize(raw_text: &str) -> (String, String) {
    let lines = || raw_text.lines().map(str::trim);
    (extract_title(lines()), extract_description(lines()))
}

/// Text of the first `#` line with the markers stripped, or
/// [`DEFAULT_TITLE`].
pub fn extract_title<'a, I>(lines: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .map(str::trim)
        .find(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    BeforeContent,
    InParagraph,
}

/// First paragraph of the fragment, joined with spaces.
///
/// Heading lines are skipped wherever they appear. Leading blank lines are
/// skipped; the first blank line after content ends the paragraph. Results
/// over 197 characters are cut and suffixed with `...`.
pub fn extract_description<'a, I>(lines: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut state = ScanState::BeforeContent;
    let mut parts: Vec<&str> = Vec::new();

    for line in lines.into_iter().map(str::trim) {
        if line.starts_with('#') {
            continue;
        }
        match (state, line.is_empty()) {
            (ScanState::BeforeContent, true) => {}
            (ScanState::InParagraph, true) => break,
            (_, false) => {
                state = ScanState::InParagraph;
                parts.push(line);
            }
        }
    }

    truncate(parts.join(" "))
}

fn truncate(description: String) -> String {
    if description.chars().count() <= MAX_DESCRIPTION_CHARS {
        return description;
    }
    let mut cut: String = description.chars().take(MAX_DESCRIPTION_CHARS).collect();
    cut.push_str(ELLIPSIS);
    cut
}
