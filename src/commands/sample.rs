//! Sample command: copy a smoke-test subset of the corpus
//!
//! Takes the first files in sorted order for determinism plus a random draw
//! of the rest for coverage. Used to build small fixture trees for smoke
//! testing the full ingest path.

use crate::error::{Error, Result};
use crate::parser::StatuteParser;
use std::path::Path;
use tracing::info;

/// Copy `count` HTML files from `root` into `target`.
///
/// Fatal when `root` is missing or holds fewer than `count` HTML files.
/// Returns the number of files copied.
pub fn cmd_sample(root: &Path, target: &Path, count: usize) -> Result<usize> {
    if !root.is_dir() {
        return Err(Error::InvalidPath(format!(
            "source directory not found: {}",
            root.display()
        )));
    }

    let mut files = StatuteParser::new(root).discover_files();
    files.sort();

    if files.len() < count {
        return Err(Error::Config(format!(
            "not enough HTML files: found {}, need {}",
            files.len(),
            count
        )));
    }

    let first_count = count.div_ceil(2);
    let mut selected: Vec<_> = files[..first_count].to_vec();

    let remaining = &files[first_count..];
    let draw = count - first_count;
    let mut rng = rand::rng();
    for index in rand::seq::index::sample(&mut rng, remaining.len(), draw) {
        selected.push(remaining[index].clone());
    }

    std::fs::create_dir_all(target)?;

    for path in &selected {
        let file_name = path
            .file_name()
            .ok_or_else(|| Error::InvalidPath(path.display().to_string()))?;
        std::fs::copy(path, target.join(file_name))?;
    }

    info!(
        "Copied {}/{} files to {}",
        selected.len(),
        count,
        target.display()
    );
    Ok(selected.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn seed_corpus(dir: &TempDir, n: usize) {
        for i in 0..n {
            fs::write(
                dir.path().join(format!("sec_{i:03}.htm")),
                format!("<!-- itempath:/26/Sec. {i} -->"),
            )
            .unwrap();
        }
    }

    #[test]
    fn test_sample_copies_requested_count() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        seed_corpus(&source, 20);

        let copied = cmd_sample(source.path(), &target.path().join("subset"), 10).unwrap();
        assert_eq!(copied, 10);

        let names: Vec<_> = fs::read_dir(target.path().join("subset"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names.len(), 10);
        // The deterministic half is always the sorted head of the corpus
        for i in 0..5 {
            assert!(names.contains(&format!("sec_{i:03}.htm")), "missing head file {i}");
        }
    }

    #[test]
    fn test_sample_insufficient_files_is_fatal() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        seed_corpus(&source, 3);

        let err = cmd_sample(source.path(), target.path(), 10).unwrap_err();
        match err {
            Error::Config(message) => assert!(message.contains("not enough HTML files")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_sample_missing_root_is_fatal() {
        let target = TempDir::new().unwrap();
        assert!(cmd_sample(Path::new("/nonexistent"), target.path(), 10).is_err());
    }
}
