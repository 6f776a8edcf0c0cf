//! Recursive artifact discovery by file-name pattern.

use crate::error::IngestError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Shell-style wildcard match on a whole string: `*` matches any run of
/// characters, `?` exactly one. No character classes.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0, 0);
    // Position of the last `*` and the name index it was tried at.
    let mut backtrack: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ni));
            pi += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ni = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

/// Regular files under `dir` (recursive) whose file name matches `pattern`,
/// sorted by path.
pub fn collect_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, IngestError> {
    if !dir.is_dir() {
        return Err(IngestError::InvalidArgument(format!(
            "path '{}' does not exist or is not a directory",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            IngestError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| wildcard_match(pattern, name));
        if matches {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn wildcard_semantics() {
        assert!(wildcard_match("*.parquet", "stock_price.parquet"));
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("chunk_?.json", "chunk_7.json"));
        assert!(!wildcard_match("chunk_?.json", "chunk_12.json"));
        assert!(wildcard_match("*_*.json", "fx_chunks.json"));
        assert!(wildcard_match("a*b*c", "axxbyybzc"));
        assert!(!wildcard_match("*.json", "tickers.json.bak"));
        assert!(!wildcard_match("tickers.json", "ticker_status.json"));
    }

    #[test]
    fn collects_recursively_by_file_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("AAPL")).unwrap();
        fs::create_dir_all(dir.path().join("MSFT")).unwrap();
        fs::write(dir.path().join("AAPL/stock_price.parquet"), b"x").unwrap();
        fs::write(dir.path().join("MSFT/dividends.parquet"), b"x").unwrap();
        fs::write(dir.path().join("error.log"), b"x").unwrap();

        let files = collect_files(dir.path(), "*.parquet").unwrap();
        assert_eq!(
            files,
            vec![
                dir.path().join("AAPL/stock_price.parquet"),
                dir.path().join("MSFT/dividends.parquet"),
            ]
        );
    }

    #[test]
    fn missing_directory_is_invalid_argument() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_files(&dir.path().join("nope"), "*").unwrap_err();
        assert!(matches!(err, IngestError::InvalidArgument(_)));
    }
}
