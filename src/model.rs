//! Core data model for statutory units
//!
//! A [`TaxSection`] is one unit of the Internal Revenue Code at any
//! granularity (title, chapter, section, ...). The hierarchy field preserves
//! the statutory path from root to leaf, which downstream retrieval uses to
//! keep results grounded in the code's structure.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Classification of a statutory unit, from broadest to narrowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Title,
    Subtitle,
    Chapter,
    Subchapter,
    Part,
    #[default]
    Section,
    Subsection,
    Paragraph,
    Subparagraph,
}

impl SectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionType::Title => "title",
            SectionType::Subtitle => "subtitle",
            SectionType::Chapter => "chapter",
            SectionType::Subchapter => "subchapter",
            SectionType::Part => "part",
            SectionType::Section => "section",
            SectionType::Subsection => "subsection",
            SectionType::Paragraph => "paragraph",
            SectionType::Subparagraph => "subparagraph",
        }
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "title" => Ok(SectionType::Title),
            "subtitle" => Ok(SectionType::Subtitle),
            "chapter" => Ok(SectionType::Chapter),
            "subchapter" => Ok(SectionType::Subchapter),
            "part" => Ok(SectionType::Part),
            "section" => Ok(SectionType::Section),
            "subsection" => Ok(SectionType::Subsection),
            "paragraph" => Ok(SectionType::Paragraph),
            "subparagraph" => Ok(SectionType::Subparagraph),
            other => Err(Error::Parse(format!("unknown section type: {other}"))),
        }
    }
}

/// One validated statutory unit.
///
/// Records are immutable once constructed: re-ingesting a file mints a fresh
/// id unless the caller explicitly supplies the prior one. Parent linkage is
/// advisory only; a `parent_id` pointing outside the current batch is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxSection {
    /// Unique identifier, used as the Qdrant point key.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Optional parent unit; `None` for root-level units.
    #[serde(default)]
    pub parent_id: Option<Uuid>,

    /// Canonical citation, e.g. "26 U.S.C. § 162".
    pub section_number: String,

    /// Human-readable label, e.g. "Trade or business expenses".
    pub title: String,

    /// Verbatim extracted statutory text.
    pub content: String,

    /// Root-to-leaf path, e.g. ["Title 26", "Subtitle A", "Chapter 1", "Section 162"].
    /// May be empty for malformed input.
    pub hierarchy: Vec<String>,

    #[serde(default)]
    pub section_type: SectionType,

    /// Preview labels of child units found inside the content, in document order.
    #[serde(default)]
    pub subsections: Vec<String>,

    #[serde(default)]
    pub effective_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub source_url: Option<String>,

    /// Open-ended bag for attributes not yet promoted to typed fields.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl TaxSection {
    /// Construct with the minimal required fields; everything else defaults.
    pub fn new(
        section_number: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        hierarchy: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: None,
            section_number: section_number.into(),
            title: title.into(),
            content: content.into(),
            hierarchy,
            section_type: SectionType::default(),
            subsections: Vec::new(),
            effective_date: None,
            source_url: None,
            metadata: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Check schema invariants. The detail string names the offending field.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.section_number.trim().is_empty() {
            return Err("section_number must not be empty".to_string());
        }
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        if self.content.trim().is_empty() {
            return Err("content must not be empty".to_string());
        }
        Ok(())
    }
}
