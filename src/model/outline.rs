//! Outline types: heading levels, entries and the per-document result.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Heading level. The outline is capped at three tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
}

impl HeadingLevel {
    /// All levels, outermost first.
    pub const ALL: [HeadingLevel; 3] = [HeadingLevel::H1, HeadingLevel::H2, HeadingLevel::H3];

    /// Level for a 1-based tier rank; ranks beyond three have no level.
    pub fn from_rank(rank: usize) -> Option<Self> {
        match rank {
            1 => Some(HeadingLevel::H1),
            2 => Some(HeadingLevel::H2),
            3 => Some(HeadingLevel::H3),
            _ => None,
        }
    }

    /// 1-based depth.
    pub fn depth(self) -> u8 {
        match self {
            HeadingLevel::H1 => 1,
            HeadingLevel::H2 => 2,
            HeadingLevel::H3 => 3,
        }
    }

    /// Number of tiers between two levels.
    pub fn distance(self, other: HeadingLevel) -> u8 {
        self.depth().abs_diff(other.depth())
    }

    /// The next deeper level, saturating at H3.
    pub fn deeper(self) -> Self {
        match self {
            HeadingLevel::H1 => HeadingLevel::H2,
            _ => HeadingLevel::H3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HeadingLevel::H1 => "H1",
            HeadingLevel::H2 => "H2",
            HeadingLevel::H3 => "H3",
        }
    }
}

impl std::fmt::Display for HeadingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the final outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingEntry {
    pub level: HeadingLevel,
    pub text: String,
    /// Page number (1-based)
    pub page: u32,
}

impl HeadingEntry {
    pub fn new(level: HeadingLevel, text: impl Into<String>, page: u32) -> Self {
        Self {
            level,
            text: text.into(),
            page,
        }
    }
}

/// Headings in reading order.
pub type Outline = Vec<HeadingEntry>;

/// The structured record produced for one input document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub title: String,
    pub outline: Outline,
}

impl DocumentResult {
    pub fn new(title: impl Into<String>, outline: Outline) -> Self {
        Self {
            title: title.into(),
            outline,
        }
    }

    /// An empty result with the given title.
    pub fn empty(title: impl Into<String>) -> Self {
        Self::new(title, Vec::new())
    }

    /// Count entries per level, outermost first.
    pub fn level_counts(&self) -> [usize; 3] {
        let mut counts = [0; 3];
        for entry in &self.outline {
            counts[(entry.level.depth() - 1) as usize] += 1;
        }
        counts
    }

    /// Check the output invariants: pages within `1..=page_count`,
    /// non-empty text, and no consecutive duplicates.
    pub fn validate(&self, page_count: u32) -> Result<()> {
        for (i, entry) in self.outline.iter().enumerate() {
            if entry.page == 0 || entry.page > page_count {
                return Err(Error::PageOutOfRange(entry.page, page_count));
            }
            if entry.text.trim().is_empty() {
                return Err(Error::Render(format!("outline entry {} has empty text", i)));
            }
            if i > 0 && self.outline[i - 1] == *entry {
                return Err(Error::Render(format!(
                    "outline entry {} duplicates its predecessor",
                    i
                )));
            }
        }
        Ok(())
    }
}
