//! Directory listing

use crate::io::error::WriteError;
use crate::io::path_guard::normalize_path;
use globset::{GlobBuilder, GlobMatcher};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from [`list_directory`]
#[derive(Error, Debug)]
pub enum ListError {
    /// The directory path could not be normalized
    #[error(transparent)]
    Path(#[from] WriteError),

    /// The filter is not a valid glob
    #[error("invalid glob pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: globset::Error,
    },

    /// Reading the directory failed
    #[error("I/O error listing {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// List the entry names in `path`, sorted, optionally filtered by a glob.
///
/// An empty `path` lists the current directory. The pattern is matched
/// against each entry's file name only, and `*` never crosses a separator.
pub fn list_directory(
    path: impl AsRef<Path>,
    pattern: Option<&str>,
) -> Result<Vec<String>, ListError> {
    let path = path.as_ref();
    let dir = if path.as_os_str().is_empty() {
        normalize_path(".")?
    } else {
        normalize_path(path)?
    };

    let matcher = pattern
        .filter(|p| !p.is_empty())
        .map(compile_pattern)
        .transpose()?;

    let entries = fs::read_dir(&dir).map_err(|e| ListError::Io {
        path: dir.clone(),
        source: e,
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ListError::Io {
            path: dir.clone(),
            source: e,
        })?;
        let name = entry.file_name();
        if let Some(matcher) = &matcher
            && !matcher.is_match(Path::new(&name))
        {
            continue;
        }
        names.push(name.to_string_lossy().into_owned());
    }
    names.sort();

    Ok(names)
}

fn compile_pattern(pattern: &str) -> Result<GlobMatcher, ListError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| ListError::Pattern {
            pattern: pattern.to_string(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn populate(dir: &Path) {
        fs::write(dir.join("b.txt"), b"b").unwrap();
        fs::write(dir.join("a.txt"), b"a").unwrap();
        fs::write(dir.join("notes.md"), b"n").unwrap();
        fs::create_dir(dir.join("sub")).unwrap();
    }

    #[test]
    fn test_lists_sorted_names() {
        let temp_dir = TempDir::new().unwrap();
        populate(temp_dir.path());

        let names = list_directory(temp_dir.path(), None).unwrap();
        assert_eq!(names, vec!["a.txt", "b.txt", "notes.md", "sub"]);
    }

    #[test]
    fn test_pattern_filters_names() {
        let temp_dir = TempDir::new().unwrap();
        populate(temp_dir.path());

        let names = list_directory(temp_dir.path(), Some("*.txt")).unwrap();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_empty_pattern_matches_everything() {
        let temp_dir = TempDir::new().unwrap();
        populate(temp_dir.path());

        assert_eq!(list_directory(temp_dir.path(), Some("")).unwrap().len(), 4);
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let temp_dir = TempDir::new().unwrap();

        let err = list_directory(temp_dir.path(), Some("[unclosed")).unwrap_err();
        assert!(matches!(err, ListError::Pattern { .. }));
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let temp_dir = TempDir::new().unwrap();

        let err = list_directory(temp_dir.path().join("nope"), None).unwrap_err();
        assert!(matches!(err, ListError::Io { .. }));
    }

    #[test]
    fn test_empty_path_lists_current_directory() {
        let expected = list_directory(std::env::current_dir().unwrap(), None).unwrap();
        assert_eq!(list_directory("", None).unwrap(), expected);
    }
}
