//! Structural extraction from Title 26 HTML
//!
//! The US Code HTML release embeds machine-readable comment markers:
//! a document-id marker, an item-path marker, and `field-start` markers
//! delimiting named blocks (head, statute, effectivedate-note, ...). These
//! functions are pure text-in/fields-out and safe to run concurrently.

use crate::model::SectionType;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::LazyLock;

static DOCUMENT_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"<!--\s*documentid:(\S+)\s+usckey:(\S+)\s+currentthrough:(\d{8})\s+documentPDFPage:(\d+)\s*-->",
    )
    .expect("document id regex")
});

static ITEM_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--\s*itempath:([^\r\n]*?)\s*-->").expect("item path regex"));

static FIELD_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*field-start:([a-z0-9\-]+)\s*-->").expect("field start regex")
});

static SECTION_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Sec\.\s*(\d+[A-Za-z0-9\-]*)").expect("section id regex"));

static SUBSECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\w+)\)\s+[^\n]+").expect("subsection regex"));

static DATE_YMD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})[-/](\d{2})[-/](\d{2})").expect("date regex"));

static DATE_COMPACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{8})").expect("compact date regex"));

/// Identifiers from the document-id marker. All fields are `None` when the
/// marker is absent, which is not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMeta {
    pub document_id: Option<String>,
    pub usc_key: Option<String>,
    pub current_through: Option<String>,
    pub pdf_page: Option<String>,
    pub source_url: Option<String>,
}

impl DocumentMeta {
    /// Key/value view of the populated identifiers, for the record's
    /// metadata bag. Keys match the marker's own token names.
    pub fn to_metadata(&self) -> Vec<(String, String)> {
        let mut entries = Vec::new();
        if let Some(v) = &self.document_id {
            entries.push(("documentid".to_string(), v.clone()));
        }
        if let Some(v) = &self.usc_key {
            entries.push(("usckey".to_string(), v.clone()));
        }
        if let Some(v) = &self.current_through {
            entries.push(("currentthrough".to_string(), v.clone()));
        }
        if let Some(v) = &self.pdf_page {
            entries.push(("documentPDFPage".to_string(), v.clone()));
        }
        entries
    }
}

/// Scan for the document-id marker.
pub fn extract_document_metadata(raw_html: &str) -> DocumentMeta {
    match DOCUMENT_ID_RE.captures(raw_html) {
        Some(caps) => DocumentMeta {
            document_id: Some(caps[1].to_string()),
            usc_key: Some(caps[2].to_string()),
            current_through: Some(caps[3].to_string()),
            pdf_page: Some(caps[4].to_string()),
            source_url: None,
        },
        None => DocumentMeta::default(),
    }
}

/// Scan for the item-path marker; empty string when absent.
pub fn extract_item_path(raw_html: &str) -> String {
    ITEM_PATH_RE
        .captures(raw_html)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_default()
}

/// Collect named field blocks. A block's content is everything between its
/// `field-start` marker and the next marker (or end of document). Unknown
/// field names pass through; downstream just ignores them.
pub fn extract_field_blocks(raw_html: &str) -> HashMap<String, String> {
    let mut blocks = HashMap::new();
    let matches: Vec<_> = FIELD_START_RE.captures_iter(raw_html).collect();
    for (idx, caps) in matches.iter().enumerate() {
        let name = caps[1].to_string();
        let start = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let end = matches
            .get(idx + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(raw_html.len());
        blocks.insert(name, raw_html[start..end].to_string());
    }
    blocks
}

/// Extract visible text from a markup fragment, collapsing all whitespace
/// runs to single spaces. Never fails: fragments without markup are just
/// whitespace-collapsed verbatim.
pub fn html_to_text(fragment: &str) -> String {
    if !fragment.contains('<') {
        return collapse_whitespace(fragment);
    }
    let doc = Html::parse_fragment(fragment);
    let text: String = doc.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize the slash-delimited item path into a root-to-leaf hierarchy.
///
/// Purely numeric segments become "Title {n}"; the all-caps structural
/// keywords are rewritten to their canonical casing; everything else passes
/// through trimmed, in order.
pub fn parse_hierarchy(item_path: &str) -> Vec<String> {
    if item_path.is_empty() {
        return Vec::new();
    }
    item_path
        .trim_matches('/')
        .split('/')
        .filter(|part| !part.is_empty())
        .map(|part| {
            if part.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(n) = part.parse::<u64>() {
                    return format!("Title {n}");
                }
            }
            // SUBCHAPTER must rewrite before CHAPTER matches inside it
            part.trim()
                .replace("SUBCHAPTER", "Subchapter")
                .replace("CHAPTER", "Chapter")
                .replace("SUBTITLE", "Subtitle")
                .replace("PART", "Part")
                .replace("Sec.", "Section")
        })
        .collect()
}

/// Derive the canonical citation for a unit.
///
/// Prefers a `Sec. <id>` token in the raw item path, then the remainder of
/// the document id after its first underscore, then a literal "Unknown".
/// Distinct files can legitimately collide on "Unknown"; no disambiguation
/// is attempted.
pub fn derive_section_number(item_path: &str, meta: &DocumentMeta) -> String {
    if let Some(caps) = SECTION_ID_RE.captures(item_path) {
        return format!("26 U.S.C. § {}", &caps[1]);
    }

    if let Some(document_id) = &meta.document_id {
        if let Some((_, section_id)) = document_id.split_once('_') {
            return format!("26 U.S.C. § {section_id}");
        }
    }

    "26 U.S.C. § Unknown".to_string()
}

/// Derive a human-readable title: `head` field block, then the document's
/// `<title>` element, then the last hierarchy segment, then "Untitled".
pub fn derive_title(
    field_blocks: &HashMap<String, String>,
    raw_html: &str,
    hierarchy: &[String],
) -> String {
    if let Some(head) = field_blocks.get("head") {
        let head_text = html_to_text(head);
        if !head_text.is_empty() {
            return head_text;
        }
    }

    let doc = Html::parse_document(raw_html);
    if let Ok(selector) = Selector::parse("title") {
        if let Some(title_elem) = doc.select(&selector).next() {
            let text: String = title_elem.text().collect::<Vec<_>>().join(" ");
            return collapse_whitespace(&text);
        }
    }

    hierarchy
        .last()
        .cloned()
        .unwrap_or_else(|| "Untitled".to_string())
}

/// Classify the unit from the leading keyword of the last hierarchy segment.
pub fn derive_section_type(hierarchy: &[String]) -> SectionType {
    let Some(last) = hierarchy.last() else {
        return SectionType::Section;
    };
    let last = last.to_lowercase();
    if last.starts_with("title") {
        SectionType::Title
    } else if last.starts_with("subtitle") {
        SectionType::Subtitle
    } else if last.starts_with("chapter") {
        SectionType::Chapter
    } else if last.starts_with("subchapter") {
        SectionType::Subchapter
    } else if last.starts_with("part") {
        SectionType::Part
    } else if last.starts_with("section") {
        SectionType::Section
    } else if last.starts_with("subsection") {
        SectionType::Subsection
    } else if last.starts_with("paragraph") {
        SectionType::Paragraph
    } else if last.starts_with("subparagraph") {
        SectionType::Subparagraph
    } else {
        SectionType::Section
    }
}

/// Collect `(<label>) <rest-of-line>` previews from plain-text content,
/// verbatim and in document order. No deduplication.
pub fn extract_subsections(content: &str) -> Vec<String> {
    if content.is_empty() {
        return Vec::new();
    }
    SUBSECTION_RE
        .find_iter(content)
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// Parse an effective date from the `effectivedate-note` block text.
///
/// Tries `YYYY-MM-DD`/`YYYY/MM/DD` first, then a bare 8-digit `YYYYMMDD`
/// token; first match wins, normalized to UTC midnight. Tokens that match
/// the shape but name an impossible calendar date yield `None`.
pub fn parse_effective_date(effectivedate_html: Option<&str>) -> Option<DateTime<Utc>> {
    let text = html_to_text(effectivedate_html?);

    if let Some(caps) = DATE_YMD_RE.captures(&text) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc());
    }

    if let Some(caps) = DATE_COMPACT_RE.captures(&text) {
        return NaiveDate::parse_from_str(&caps[1], "%Y%m%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc());
    }

    None
}
