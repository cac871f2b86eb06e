//! Data models for the legal knowledge graph

use serde::{Deserialize, Serialize};

/// Prefix used for Chapter node names.
pub const CHAPTER_PREFIX: &str = "Chapter No.: ";
/// Prefix used for Section node numbers.
pub const SECTION_PREFIX: &str = "Section No.: ";

/// Node labels in the legal graph.
pub const OFFENSE_LABEL: &str = "Offense";
pub const CHAPTER_LABEL: &str = "Chapter";
pub const SECTION_LABEL: &str = "Section";
pub const PUNISHMENT_LABEL: &str = "Punishment";

/// Relationship types attached to an Offense.
pub const REFERS_TO_CHAPTER: &str = "refersToChapter";
pub const REFERS_TO_SECTION: &str = "refersToSection";
pub const HAS_PUNISHMENT: &str = "hasPunishment";

/// One extracted `(offense, chapter, section, punishment)` record.
///
/// Serialized as a 4-element string array, which is the ingestion file
/// format and the model output schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[String; 4]", into = "[String; 4]")]
pub struct OffenseTuple {
    pub offense: String,
    pub chapter: String,
    pub section: String,
    pub punishment: String,
}

impl OffenseTuple {
    pub fn new(
        offense: impl Into<String>,
        chapter: impl Into<String>,
        section: impl Into<String>,
        punishment: impl Into<String>,
    ) -> Self {
        Self {
            offense: offense.into(),
            chapter: chapter.into(),
            section: section.into(),
            punishment: punishment.into(),
        }
    }

    /// Chapter node name as stored in the graph.
    pub fn chapter_name(&self) -> String {
        chapter_name(&self.chapter)
    }

    /// Section node number as stored in the graph.
    pub fn section_number(&self) -> String {
        section_number(&self.section)
    }
}

impl From<[String; 4]> for OffenseTuple {
    fn from([offense, chapter, section, punishment]: [String; 4]) -> Self {
        Self {
            offense,
            chapter,
            section,
            punishment,
        }
    }
}

impl From<OffenseTuple> for [String; 4] {
    fn from(t: OffenseTuple) -> Self {
        [t.offense, t.chapter, t.section, t.punishment]
    }
}

pub fn chapter_name(chapter: &str) -> String {
    format!("{CHAPTER_PREFIX}{chapter}")
}

pub fn section_number(section: &str) -> String {
    format!("{SECTION_PREFIX}{section}")
}

/// Which nodes feed the similarity index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeScope {
    /// Only Offense names (retrieval-only deployments)
    #[default]
    Offenses,
    /// Every node carrying a `name` property (Offense and Chapter)
    AllNamed,
}

/// A node reached during context traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedInfo {
    /// First non-empty of name / number / description, or empty
    pub info: String,
    pub labels: Vec<String>,
}

/// Inclusive hop bounds for context traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopRange {
    pub min: u32,
    pub max: u32,
}

impl HopRange {
    pub fn new(min: u32, max: u32) -> Self {
        let min = min.max(1);
        Self {
            min,
            max: max.max(min),
        }
    }
}

impl Default for HopRange {
    fn default() -> Self {
        Self { min: 1, max: 2 }
    }
}
