//! Deduplicating chunk splitter.
//!
//! Turns a reference list into `chunk_<n>.json` files plus a `<mode>_chunks.json`
//! manifest listing `1..=K`. The chunk count never exceeds `max_chunks`: when
//! the preferred size would produce too many chunks, the chunk size grows.

use crate::identifier::{FxPair, Mode, Ticker};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default upper bound on the number of chunk files.
pub const DEFAULT_MAX_CHUNKS: usize = 256;

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("input file {} does not exist", .0.display())]
    MissingInput(PathBuf),

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// In-memory result of partitioning a list.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPlan<T> {
    pub chunks: Vec<Vec<T>>,
    /// Effective chunk size (may exceed the preferred size when capped).
    pub chunk_size: usize,
    pub unique_count: usize,
    /// True when the preferred size was raised to respect `max_chunks`.
    pub capped: bool,
}

impl<T> ChunkPlan<T> {
    /// Manifest contents: 1-based chunk indices.
    pub fn manifest(&self) -> Vec<usize> {
        (1..=self.chunks.len()).collect()
    }
}

/// Remove duplicates, keeping the first occurrence of each value.
pub fn dedup_preserving_order<T>(items: impl IntoIterator<Item = T>) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Partition `items` into contiguous chunks of at most the computed size.
pub fn plan_chunks<T>(
    items: impl IntoIterator<Item = T>,
    preferred_chunk_size: usize,
    max_chunks: usize,
) -> Result<ChunkPlan<T>, SplitError>
where
    T: Eq + Hash + Clone,
{
    if preferred_chunk_size == 0 {
        return Err(SplitError::InvalidArgument(
            "chunk size must be a positive integer".into(),
        ));
    }
    if max_chunks == 0 {
        return Err(SplitError::InvalidArgument(
            "max chunks must be a positive integer".into(),
        ));
    }

    let unique = dedup_preserving_order(items);
    let total = unique.len();

    let mut chunk_size = preferred_chunk_size;
    let mut num_chunks = total.div_ceil(chunk_size);
    let mut capped = false;

    if num_chunks > max_chunks {
        let requested = num_chunks;
        chunk_size = total.div_ceil(max_chunks);
        num_chunks = total.div_ceil(chunk_size);
        capped = true;
        warn!(
            requested,
            preferred_chunk_size,
            chunk_size,
            max_chunks,
            "too many chunks ({requested}) for preferred chunk size {preferred_chunk_size}; \
             increasing chunk size to {chunk_size} to keep chunks <= {max_chunks}"
        );
    }

    let chunks: Vec<Vec<T>> = unique.chunks(chunk_size).map(<[T]>::to_vec).collect();
    debug_assert_eq!(chunks.len(), num_chunks);

    Ok(ChunkPlan {
        chunks,
        chunk_size,
        unique_count: total,
        capped,
    })
}

/// Files produced by [`Splitter::split_file`].
#[derive(Debug, Clone)]
pub struct SplitOutput {
    pub output_dir: PathBuf,
    pub chunk_files: Vec<PathBuf>,
    pub manifest_path: PathBuf,
    pub chunk_size: usize,
    pub unique_count: usize,
    pub capped: bool,
}

/// Splits a reference list file into chunk files on disk.
#[derive(Debug, Clone)]
pub struct Splitter {
    mode: Mode,
    output_dir: PathBuf,
    preferred_chunk_size: usize,
    max_chunks: usize,
}

impl Splitter {
    pub fn new(mode: Mode, output_dir: impl Into<PathBuf>, preferred_chunk_size: usize) -> Self {
        Self {
            mode,
            output_dir: output_dir.into(),
            preferred_chunk_size,
            max_chunks: DEFAULT_MAX_CHUNKS,
        }
    }

    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Manifest file name for this mode, e.g. `stock_chunks.json`.
    pub fn manifest_name(&self) -> String {
        format!("{}_chunks.json", self.mode)
    }

    /// Read a JSON array of identifiers and write it back out as chunks.
    pub fn split_file(&self, input: &Path) -> Result<SplitOutput, SplitError> {
        match self.mode {
            Mode::Stock => self.split_items(read_json_list::<Ticker>(input)?),
            Mode::Fx => self.split_items(read_json_list::<FxPair>(input)?),
        }
    }

    /// Partition and persist already-parsed identifiers.
    pub fn split_items<T>(&self, items: Vec<T>) -> Result<SplitOutput, SplitError>
    where
        T: Eq + Hash + Clone + Serialize,
    {
        let plan = plan_chunks(items, self.preferred_chunk_size, self.max_chunks)?;

        fs::create_dir_all(&self.output_dir).map_err(|source| SplitError::Io {
            path: self.output_dir.clone(),
            source,
        })?;
        remove_stale_chunks(&self.output_dir)?;

        let mut chunk_files = Vec::with_capacity(plan.chunks.len());
        for (idx, chunk) in plan.chunks.iter().enumerate() {
            let path = self.output_dir.join(format!("chunk_{}.json", idx + 1));
            write_json(&path, chunk)?;
            info!(
                chunk = idx + 1,
                items = chunk.len(),
                path = %path.display(),
                "saved chunk"
            );
            chunk_files.push(path);
        }

        let manifest_path = self.output_dir.join(self.manifest_name());
        write_json(&manifest_path, &plan.manifest())?;
        info!(
            mode = %self.mode,
            chunks = plan.chunks.len(),
            unique = plan.unique_count,
            "processed all identifiers"
        );

        Ok(SplitOutput {
            output_dir: self.output_dir.clone(),
            chunk_files,
            manifest_path,
            chunk_size: plan.chunk_size,
            unique_count: plan.unique_count,
            capped: plan.capped,
        })
    }
}

/// Read a JSON array file into typed values.
pub fn read_json_list<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, SplitError> {
    if !path.exists() {
        return Err(SplitError::MissingInput(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|source| SplitError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| SplitError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Delete `chunk_*.json` left by an earlier split so the directory only holds
/// the chunks named in the new manifest.
fn remove_stale_chunks(dir: &Path) -> Result<(), SplitError> {
    let io_err = |path: &Path, source: std::io::Error| SplitError::Io {
        path: path.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let path = entry.map_err(|e| io_err(dir, e))?.path();
        let is_chunk = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("chunk_") && name.ends_with(".json"));
        if is_chunk && path.is_file() {
            fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
            debug!(path = %path.display(), "removed stale chunk");
        }
    }
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), SplitError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| SplitError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| SplitError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tickers(symbols: &[&str]) -> Vec<Ticker> {
        symbols.iter().map(|s| Ticker::from(*s)).collect()
    }

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let unique = dedup_preserving_order(vec!["b", "a", "b", "c", "a"]);
        assert_eq!(unique, vec!["b", "a", "c"]);
    }

    #[test]
    fn splits_deduplicated_list_into_chunks() {
        let plan = plan_chunks(
            tickers(&["AAPL", "MSFT", "AAPL", "GOOG", "TSLA"]),
            2,
            DEFAULT_MAX_CHUNKS,
        )
        .unwrap();

        assert_eq!(
            plan.chunks,
            vec![tickers(&["AAPL", "MSFT"]), tickers(&["GOOG", "TSLA"])]
        );
        assert_eq!(plan.manifest(), vec![1, 2]);
        assert!(!plan.capped);
    }

    #[test]
    fn last_chunk_may_be_shorter() {
        let plan = plan_chunks(1..=7, 3, DEFAULT_MAX_CHUNKS).unwrap();
        let sizes: Vec<usize> = plan.chunks.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn caps_chunk_count_by_growing_chunk_size() {
        let plan = plan_chunks(0..600, 1, 10).unwrap();
        assert!(plan.chunks.len() <= 10);
        assert_eq!(plan.chunk_size, 60);
        assert!(plan.capped);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let plan = plan_chunks(Vec::<Ticker>::new(), 5, DEFAULT_MAX_CHUNKS).unwrap();
        assert!(plan.chunks.is_empty());
        assert!(plan.manifest().is_empty());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = plan_chunks(tickers(&["AAPL"]), 0, DEFAULT_MAX_CHUNKS).unwrap_err();
        assert!(matches!(err, SplitError::InvalidArgument(_)));
    }

    #[test]
    fn split_file_writes_chunks_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("tickers.json");
        fs::write(&input, r#"["AAPL","MSFT","AAPL","GOOG","TSLA"]"#).unwrap();

        let out_dir = dir.path().join("chunks");
        let output = Splitter::new(Mode::Stock, &out_dir, 2)
            .split_file(&input)
            .unwrap();

        assert_eq!(output.chunk_files.len(), 2);
        let first: Vec<Ticker> = read_json_list(&out_dir.join("chunk_1.json")).unwrap();
        let second: Vec<Ticker> = read_json_list(&out_dir.join("chunk_2.json")).unwrap();
        assert_eq!(first, tickers(&["AAPL", "MSFT"]));
        assert_eq!(second, tickers(&["GOOG", "TSLA"]));

        let manifest: Vec<usize> = read_json_list(&out_dir.join("stock_chunks.json")).unwrap();
        assert_eq!(manifest, vec![1, 2]);
    }

    #[test]
    fn resplit_into_same_dir_drops_old_chunks() {
        let dir = tempfile::tempdir().unwrap();
        Splitter::new(Mode::Stock, dir.path(), 1)
            .split_items(tickers(&["A", "B", "C", "D"]))
            .unwrap();
        let output = Splitter::new(Mode::Stock, dir.path(), 1)
            .split_items(tickers(&["E", "F"]))
            .unwrap();

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, ["chunk_1.json", "chunk_2.json", "stock_chunks.json"]);
        assert_eq!(output.chunk_files.len(), 2);
        let manifest: Vec<usize> = read_json_list(&output.manifest_path).unwrap();
        assert_eq!(manifest, vec![1, 2]);
    }

    #[test]
    fn split_file_handles_fx_objects() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("fxpairs.json");
        fs::write(
            &input,
            r#"[{"from":"USD","to":"GBP"},"USD/GBP",{"from":"GBP","to":"CHF"}]"#,
        )
        .unwrap();

        let output = Splitter::new(Mode::Fx, dir.path().join("out"), 10)
            .split_file(&input)
            .unwrap();

        assert_eq!(output.unique_count, 2);
        let chunk: Vec<FxPair> = read_json_list(&output.chunk_files[0]).unwrap();
        assert_eq!(chunk, vec![FxPair::new("USD", "GBP"), FxPair::new("GBP", "CHF")]);
        assert!(output.manifest_path.ends_with("fx_chunks.json"));
    }

    #[test]
    fn missing_input_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = Splitter::new(Mode::Stock, dir.path(), 2)
            .split_file(&dir.path().join("nope.json"))
            .unwrap_err();
        assert!(matches!(err, SplitError::MissingInput(_)));
    }
}
