//! Batch parsing of Title 26 HTML files
//!
//! [`parse_file`] turns one file into exactly one [`ParseOutcome`];
//! [`StatuteParser`] fans file parsing out across a bounded pool of blocking
//! workers and collects the successes. Per-file failures are absorbed and
//! reported as span events, never propagated: a malformed file must not
//! abort the batch.

use crate::error::Result;
use crate::extract::{
    derive_section_number, derive_section_type, derive_title, extract_document_metadata,
    extract_field_blocks, extract_item_path, extract_subsections, html_to_text, parse_effective_date,
    parse_hierarchy,
};
use crate::model::TaxSection;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn, Instrument};
use walkdir::WalkDir;

/// Why a file produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No (or blank) "statute" field block: the expected outcome for
    /// structural files like titles and chapters that carry no text.
    MissingStatute,
    /// Derived fields failed record validation.
    Validation(String),
    /// Anything else that went wrong reading or parsing the file.
    Parse(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingStatute => write!(f, "missing_statute"),
            SkipReason::Validation(detail) => write!(f, "validation_error: {detail}"),
            SkipReason::Parse(detail) => write!(f, "parse_error: {detail}"),
        }
    }
}

/// Per-file outcome: a record or a tagged skip, never both.
#[derive(Debug)]
pub enum ParseOutcome {
    Section(Box<TaxSection>),
    Skipped { path: PathBuf, reason: SkipReason },
}

/// Parse a single HTML file into a [`ParseOutcome`]. Never panics.
pub fn parse_file(path: &Path) -> ParseOutcome {
    match parse_file_inner(path) {
        Ok(section) => ParseOutcome::Section(Box::new(section)),
        Err(reason) => ParseOutcome::Skipped {
            path: path.to_path_buf(),
            reason,
        },
    }
}

fn parse_file_inner(path: &Path) -> std::result::Result<TaxSection, SkipReason> {
    // Invalid byte sequences are dropped, not fatal
    let bytes = std::fs::read(path).map_err(|e| SkipReason::Parse(e.to_string()))?;
    let raw_html = String::from_utf8_lossy(&bytes);

    let meta = extract_document_metadata(&raw_html);
    let item_path = extract_item_path(&raw_html);
    let hierarchy = parse_hierarchy(&item_path);
    let field_blocks = extract_field_blocks(&raw_html);

    let statute_html = match field_blocks.get("statute") {
        Some(block) if !block.trim().is_empty() => block,
        _ => return Err(SkipReason::MissingStatute),
    };

    let content = html_to_text(statute_html);
    let effective_date = parse_effective_date(field_blocks.get("effectivedate-note").map(String::as_str));
    let section_number = derive_section_number(&item_path, &meta);
    let title = derive_title(&field_blocks, &raw_html, &hierarchy);
    let section_type = derive_section_type(&hierarchy);
    let subsections = extract_subsections(&content);

    let mut section = TaxSection::new(section_number, title, content, hierarchy);
    section.section_type = section_type;
    section.subsections = subsections;
    section.effective_date = effective_date;
    section.source_url = meta.source_url.clone();
    section.metadata.extend(meta.to_metadata());

    section.validate().map_err(SkipReason::Validation)?;
    Ok(section)
}

/// Batch parser for a directory tree of Title 26 HTML files.
pub struct StatuteParser {
    root: PathBuf,
    max_workers: Option<usize>,
}

impl StatuteParser {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_workers: None,
        }
    }

    /// Bound the worker pool; `None` means all available execution units.
    pub fn with_max_workers(mut self, max_workers: Option<usize>) -> Self {
        self.max_workers = max_workers;
        self
    }

    fn worker_count(&self) -> usize {
        self.max_workers
            .filter(|n| *n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4)
            })
    }

    /// Discover every `.htm`/`.html` file under the root (case-insensitive).
    pub fn discover_files(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| {
                        let ext = ext.to_lowercase();
                        ext == "htm" || ext == "html"
                    })
                    .unwrap_or(false)
            })
            .map(|entry| entry.into_path())
            .collect()
    }

    /// Parse all discovered files and return the successfully extracted
    /// records, in completion order. Skips and failures surface only as
    /// trace events; the result count is invariant to the pool size.
    pub async fn parse_directory(&self) -> Result<Vec<TaxSection>> {
        let files = self.discover_files();
        if files.is_empty() {
            warn!("No HTML files found under {}", self.root.display());
            return Ok(Vec::new());
        }

        let workers = self.worker_count();
        let span = tracing::info_span!(
            "parse_directory",
            file_count = files.len() as u64,
            workers = workers as u64,
            parsed_count = tracing::field::Empty,
        );

        let sections = async {
            let outcomes: Vec<_> = stream::iter(files)
                .map(|path| tokio::task::spawn_blocking(move || parse_file(&path)))
                .buffer_unordered(workers)
                .collect()
                .await;

            let mut sections = Vec::new();
            for outcome in outcomes {
                match outcome {
                    Ok(ParseOutcome::Section(section)) => sections.push(*section),
                    Ok(ParseOutcome::Skipped { path, reason }) => match reason {
                        SkipReason::MissingStatute => {
                            debug!(file_path = %path.display(), "missing_statute")
                        }
                        other => {
                            warn!(file_path = %path.display(), error = %other, "parse_error")
                        }
                    },
                    // A worker fault is isolated to its own file
                    Err(join_err) => warn!(error = %join_err, "parse_error"),
                }
            }
            sections
        }
        .instrument(span.clone())
        .await;

        span.record("parsed_count", sections.len() as u64);
        info!(
            "Parsed {} sections from {}",
            sections.len(),
            self.root.display()
        );
        Ok(sections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SectionType;
    use chrono::{TimeZone, Utc};
    use std::fs;
    use tempfile::TempDir;

    const SECTION_162: &str = concat!(
        "<!-- documentid:26usc_162 usckey:26usc162 currentthrough:20230428 documentPDFPage:611 -->\n",
        "<html><head><title>26 USC 162</title></head><body>\n",
        "<!-- itempath:/26/Subtitle A/CHAPTER 1/Sec. 162 -->\n",
        "<!-- field-start:head -->\n",
        "<h3>§ 162. Trade or business expenses</h3>\n",
        "<!-- field-end:head -->\n",
        "<!-- field-start:statute -->\n",
        "<p>(a) In general</p>\n",
        "<p>There shall be allowed as a deduction all the ordinary and necessary expenses.</p>\n",
        "<!-- field-end:statute -->\n",
        "<!-- field-start:effectivedate-note -->\n",
        "<p>Effective 1986-10-22.</p>\n",
        "<!-- field-end:effectivedate-note -->\n",
        "</body></html>\n",
    );

    const CHAPTER_FRONT: &str = concat!(
        "<!-- documentid:26usc_ch1 usckey:26uscch1 currentthrough:20230428 documentPDFPage:1 -->\n",
        "<html><body>\n",
        "<!-- itempath:/26/Subtitle A/CHAPTER 1 -->\n",
        "<!-- field-start:head -->\n",
        "<h2>CHAPTER 1 - NORMAL TAXES AND SURTAXES</h2>\n",
        "<!-- field-end:head -->\n",
        "</body></html>\n",
    );

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_parse_file_full_section() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "Sec_162.htm", SECTION_162);

        let ParseOutcome::Section(section) = parse_file(&path) else {
            panic!("expected a section");
        };

        assert_eq!(section.section_number, "26 U.S.C. § 162");
        assert_eq!(section.title, "§ 162. Trade or business expenses");
        assert_eq!(
            section.hierarchy,
            vec!["Title 26", "Subtitle A", "Chapter 1", "Section 162"]
        );
        assert_eq!(section.section_type, SectionType::Section);
        assert!(section.content.contains("ordinary and necessary expenses"));
        assert!(!section.subsections.is_empty());
        assert_eq!(
            section.effective_date,
            Some(Utc.with_ymd_and_hms(1986, 10, 22, 0, 0, 0).unwrap())
        );
        assert_eq!(
            section.metadata.get("documentid").map(String::as_str),
            Some("26usc_162")
        );
        assert!(section.validate().is_ok());
    }

    #[test]
    fn test_parse_file_missing_statute_is_skip() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "ch1.htm", CHAPTER_FRONT);

        match parse_file(&path) {
            ParseOutcome::Skipped { reason, .. } => {
                assert_eq!(reason, SkipReason::MissingStatute);
                assert_eq!(reason.to_string(), "missing_statute");
            }
            ParseOutcome::Section(_) => panic!("expected a skip"),
        }
    }

    #[test]
    fn test_parse_file_blank_statute_is_skip() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "blank.htm",
            "<!-- itempath:/26/Sec. 1 -->\n<!-- field-start:statute -->   \n",
        );
        match parse_file(&path) {
            ParseOutcome::Skipped { reason, .. } => assert_eq!(reason, SkipReason::MissingStatute),
            ParseOutcome::Section(_) => panic!("expected a skip"),
        }
    }

    #[test]
    fn test_parse_file_unreadable_is_parse_error() {
        let outcome = parse_file(Path::new("/nonexistent/file.htm"));
        match outcome {
            ParseOutcome::Skipped { reason, .. } => {
                assert!(reason.to_string().starts_with("parse_error: "))
            }
            ParseOutcome::Section(_) => panic!("expected a skip"),
        }
    }

    #[test]
    fn test_parse_file_invalid_utf8_is_tolerated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latin1.htm");
        let mut bytes = SECTION_162.as_bytes().to_vec();
        bytes.extend_from_slice(&[0xFF, 0xFE, 0xFD]);
        fs::write(&path, bytes).unwrap();

        assert!(matches!(parse_file(&path), ParseOutcome::Section(_)));
    }

    #[tokio::test]
    async fn test_parse_directory_counts_successes_only() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        write_file(&dir, "Sec_162.htm", SECTION_162);
        write_file(&dir, "ch1.HTML", CHAPTER_FRONT);
        let nested = dir.path().join("nested").join("Sec_163.html");
        fs::write(&nested, SECTION_162.replace("162", "163")).unwrap();
        // Non-HTML files are never discovered
        write_file(&dir, "notes.txt", "ignore me");

        let parser = StatuteParser::new(dir.path());
        let sections = parser.parse_directory().await.unwrap();
        assert_eq!(sections.len(), 2);
    }

    #[tokio::test]
    async fn test_parse_directory_result_invariant_to_worker_count() {
        let dir = TempDir::new().unwrap();
        for i in 0..6 {
            write_file(
                &dir,
                &format!("sec_{i}.htm"),
                &SECTION_162.replace("162", &format!("16{i}")),
            );
        }
        write_file(&dir, "front.htm", CHAPTER_FRONT);

        for workers in [1, 4] {
            let parser = StatuteParser::new(dir.path()).with_max_workers(Some(workers));
            let sections = parser.parse_directory().await.unwrap();
            assert_eq!(sections.len(), 6, "workers = {workers}");
        }
    }

    #[tokio::test]
    async fn test_parse_directory_empty_root() {
        let dir = TempDir::new().unwrap();
        let parser = StatuteParser::new(dir.path());
        let sections = parser.parse_directory().await.unwrap();
        assert!(sections.is_empty());
    }
}
