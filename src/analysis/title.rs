//! Title resolution from the first page.

use super::{DocumentStats, NormalizedSpan, SpanId};
use crate::text::{collapse_whitespace, needs_separator};

/// The resolved title and the lines it was built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Title {
    pub text: String,
    /// Lines merged into the title; the outline must not repeat them.
    pub absorbed: Vec<SpanId>,
}

/// Pick the document title: the largest text on page one.
///
/// The title is the first run of consecutive page-one lines, in reading
/// order, whose size ratio is within the tier epsilon of the page maximum.
/// A title assembled from several lines or text runs is reported in
/// [`Title::absorbed`]. `claimed` is the first H1 of the outline: when the
/// title would be that line alone, built from a single run, the line stays
/// in the outline and the title comes from the remaining text. The text is
/// empty when nothing on page one is larger than body text.
pub fn resolve_title(lines: &[NormalizedSpan], stats: &DocumentStats, claimed: Option<SpanId>) -> Title {
    let mut page: Vec<&NormalizedSpan> = lines.iter().filter(|l| l.page == 0).collect();
    page.sort_by(|a, b| {
        a.position
            .total_cmp(&b.position)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
            .then(a.id.cmp(&b.id))
    });

    let block = title_block(&page, stats);
    match (block.as_slice(), claimed) {
        ([only], Some(id)) if only.id == id && only.sources.len() == 1 => {
            page.retain(|l| l.id != id);
            let text = join_lines(&title_block(&page, stats));
            Title {
                text,
                absorbed: Vec::new(),
            }
        }
        _ => {
            let absorbed = if block.len() > 1 || block.iter().any(|l| l.sources.len() > 1) {
                block.iter().map(|l| l.id).collect()
            } else {
                Vec::new()
            };
            Title {
                text: join_lines(&block),
                absorbed,
            }
        }
    }
}

/// Consecutive lines at the maximal size, starting at the first one.
fn title_block<'a>(page: &[&'a NormalizedSpan], stats: &DocumentStats) -> Vec<&'a NormalizedSpan> {
    let Some(max_ratio) = page
        .iter()
        .filter(|l| stats.is_above_body(l.ratio))
        .map(|l| l.ratio)
        .reduce(f32::max)
    else {
        return Vec::new();
    };
    let at_max = |l: &&NormalizedSpan| max_ratio - l.ratio <= stats.tier_epsilon;
    page.iter()
        .copied()
        .skip_while(|l| !at_max(l))
        .take_while(|l| at_max(l))
        .collect()
}

fn join_lines(block: &[&NormalizedSpan]) -> String {
    let mut title = String::new();
    for line in block {
        if needs_separator(&title, &line.text) {
            title.push(' ');
        }
        title.push_str(&line.text);
    }
    clean_title(&title)
}

/// Collapse whitespace and strip trailing `.`, `;` and `,`.
pub fn clean_title(title: &str) -> String {
    collapse_whitespace(title)
        .trim_end_matches(|c: char| matches!(c, '.' | ';' | ',') || c.is_whitespace())
        .to_string()
}
