//! Persisted flat vector index.
//!
//! An index is a directory holding `chunks.jsonl` (one [`EmbeddedChunk`] per
//! line) and `manifest.json`. The manifest is written last, atomically, so its
//! presence marks a complete index. Search is an exhaustive cosine scan, which
//! is plenty for a catalog-sized corpus.

use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::chunker::Chunk;
use crate::embeddings::EmbeddedChunk;
use crate::error::StoreError;

/// Manifest file name inside an index directory.
pub const MANIFEST_FILE: &str = "manifest.json";
/// Record file name inside an index directory.
pub const CHUNKS_FILE: &str = "chunks.jsonl";
/// On-disk layout version.
pub const FORMAT_VERSION: u32 = 1;

/// Summary of a persisted index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// On-disk layout version.
    pub format_version: u32,
    /// Embedding model that produced the vectors.
    pub embedding_model: String,
    /// Vector width; 0 for an empty index.
    pub dimensions: usize,
    /// Number of records in `chunks.jsonl`.
    pub chunk_count: usize,
    /// Build time (ms since epoch).
    pub built_epoch_ms: u64,
}

/// Search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// Matched chunk.
    pub chunk: Chunk,
    /// Cosine similarity with the query.
    pub score: f32,
}

/// Read-only handle over a persisted index.
#[derive(Debug)]
pub struct VectorIndex {
    location: PathBuf,
    manifest: IndexManifest,
    records: Vec<EmbeddedChunk>,
}

impl VectorIndex {
    /// Writes `records` as a fresh index at `location`, replacing whatever was
    /// there. The files are synced to disk before this returns.
    pub fn build(
        location: impl AsRef<Path>,
        embedding_model: &str,
        records: Vec<EmbeddedChunk>,
    ) -> Result<Self, StoreError> {
        let location = location.as_ref().to_path_buf();
        let dimensions = records.first().map(|r| r.embedding.len()).unwrap_or(0);
        if let Some(bad) = records.iter().find(|r| r.embedding.len() != dimensions) {
            return Err(StoreError::DimensionMismatch {
                expected: dimensions,
                actual: bad.embedding.len(),
            });
        }

        fs::create_dir_all(&location).map_err(|source| io_error(&location, source))?;
        let manifest_path = location.join(MANIFEST_FILE);
        match fs::remove_file(&manifest_path) {
            Ok(()) => debug!(path = %manifest_path.display(), "replacing existing index"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(io_error(&manifest_path, err)),
        }

        write_atomically(&location, &location.join(CHUNKS_FILE), |writer| {
            for record in &records {
                serde_json::to_writer(&mut *writer, record)?;
                writer.write_all(b"\n").map_err(serde_json::Error::io)?;
            }
            Ok(())
        })?;

        let manifest = IndexManifest {
            format_version: FORMAT_VERSION,
            embedding_model: embedding_model.to_string(),
            dimensions,
            chunk_count: records.len(),
            built_epoch_ms: now_epoch_ms(),
        };
        write_atomically(&location, &manifest_path, |writer| {
            serde_json::to_writer_pretty(&mut *writer, &manifest)
        })?;
        sync_dir(&location)?;

        info!(
            location = %location.display(),
            chunks = manifest.chunk_count,
            dimensions,
            model = %manifest.embedding_model,
            "vector index persisted"
        );
        Ok(Self {
            location,
            manifest,
            records,
        })
    }

    /// Opens a previously built index.
    pub fn open(location: impl AsRef<Path>) -> Result<Self, StoreError> {
        let location = location.as_ref().to_path_buf();
        let manifest_path = location.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(StoreError::Missing(location));
        }
        let raw = fs::read_to_string(&manifest_path).map_err(|err| io_error(&manifest_path, err))?;
        let manifest: IndexManifest =
            serde_json::from_str(&raw).map_err(|err| corrupt(&manifest_path, err.to_string()))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(corrupt(
                &manifest_path,
                format!("unsupported format version {}", manifest.format_version),
            ));
        }

        let chunks_path = location.join(CHUNKS_FILE);
        let file = File::open(&chunks_path).map_err(|err| io_error(&chunks_path, err))?;
        let mut records = Vec::with_capacity(manifest.chunk_count);
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|err| io_error(&chunks_path, err))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: EmbeddedChunk = serde_json::from_str(&line)
                .map_err(|err| corrupt(&chunks_path, format!("line {}: {err}", line_no + 1)))?;
            if record.embedding.len() != manifest.dimensions {
                return Err(corrupt(
                    &chunks_path,
                    format!(
                        "line {}: vector has {} dimensions, manifest says {}",
                        line_no + 1,
                        record.embedding.len(),
                        manifest.dimensions
                    ),
                ));
            }
            records.push(record);
        }
        if records.len() != manifest.chunk_count {
            return Err(corrupt(
                &chunks_path,
                format!(
                    "found {} records, manifest says {}",
                    records.len(),
                    manifest.chunk_count
                ),
            ));
        }

        debug!(location = %location.display(), chunks = records.len(), "vector index opened");
        Ok(Self {
            location,
            manifest,
            records,
        })
    }

    /// Index directory.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Manifest describing the index.
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    /// Stored records in insertion order.
    pub fn records(&self) -> &[EmbeddedChunk] {
        &self.records
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns up to `k` chunks by descending cosine similarity. Equal scores
    /// keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, StoreError> {
        if k == 0 || self.records.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.manifest.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.manifest.dimensions,
                actual: query.len(),
            });
        }
        let mut scored: Vec<(usize, f32)> = self
            .records
            .iter()
            .enumerate()
            .map(|(idx, record)| (idx, cosine_similarity(&record.embedding, query)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(idx, score)| ScoredChunk {
                chunk: self.records[idx].to_chunk(),
                score,
            })
            .collect())
    }
}

/// Cosine similarity of two equal-length vectors; 0.0 when either has zero norm
/// or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())) as f32
}

fn write_atomically<F>(dir: &Path, target: &Path, write: F) -> Result<(), StoreError>
where
    F: FnOnce(&mut BufWriter<&File>) -> Result<(), serde_json::Error>,
{
    let temp = NamedTempFile::new_in(dir).map_err(|err| io_error(dir, err))?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        write(&mut writer)?;
        writer.flush().map_err(|err| io_error(target, err))?;
    }
    temp.as_file()
        .sync_all()
        .map_err(|err| io_error(target, err))?;
    temp.persist(target)
        .map_err(|err| io_error(target, err.error))?;
    Ok(())
}

/// Flushes directory entries so the renames above survive a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), StoreError> {
    File::open(dir)
        .and_then(|handle| handle.sync_all())
        .map_err(|err| io_error(dir, err))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<(), StoreError> {
    Ok(())
}

fn io_error(path: &Path, source: io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn corrupt(path: &Path, reason: String) -> StoreError {
    StoreError::Corrupt {
        path: path.to_path_buf(),
        reason,
    }
}

fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|dur| dur.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkMetadata;
    use tempfile::tempdir;

    fn record(id: usize, text: &str, embedding: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk_id: id,
            text: text.to_string(),
            metadata: ChunkMetadata {
                source: "clean.csv".into(),
                row: id,
            },
            embedding,
        }
    }

    fn sample() -> Vec<EmbeddedChunk> {
        vec![
            record(0, "east", vec![1.0, 0.0]),
            record(1, "north-east", vec![0.7, 0.7]),
            record(2, "north", vec![0.0, 1.0]),
        ]
    }

    #[test]
    fn build_then_open_round_trips() {
        let dir = tempdir().unwrap();
        let built = VectorIndex::build(dir.path(), "test-model", sample()).unwrap();
        let opened = VectorIndex::open(dir.path()).unwrap();
        assert_eq!(opened.manifest(), built.manifest());
        assert_eq!(opened.records(), built.records());
        assert_eq!(opened.manifest().dimensions, 2);
    }

    #[test]
    fn search_orders_by_similarity_and_caps_k() {
        let dir = tempdir().unwrap();
        let index = VectorIndex::build(dir.path(), "test-model", sample()).unwrap();
        let hits = index.search(&[1.0, 0.1], 2).unwrap();
        let texts: Vec<&str> = hits.iter().map(|hit| hit.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["east", "north-east"]);
        assert!(hits[0].score >= hits[1].score);

        assert_eq!(index.search(&[1.0, 0.1], 50).unwrap().len(), 3);
        assert!(index.search(&[1.0, 0.1], 0).unwrap().is_empty());
    }

    #[test]
    fn empty_index_searches_cleanly() {
        let dir = tempdir().unwrap();
        VectorIndex::build(dir.path(), "test-model", Vec::new()).unwrap();
        let index = VectorIndex::open(dir.path()).unwrap();
        assert!(index.is_empty());
        assert!(index.search(&[0.3; 384], 10).unwrap().is_empty());
    }

    #[test]
    fn rebuild_replaces_previous_contents() {
        let dir = tempdir().unwrap();
        VectorIndex::build(dir.path(), "test-model", sample()).unwrap();
        VectorIndex::build(dir.path(), "test-model", vec![record(0, "only", vec![1.0])]).unwrap();
        let index = VectorIndex::open(dir.path()).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.records()[0].text, "only");
    }

    #[test]
    fn build_creates_nested_location_and_syncs_it() {
        let dir = tempdir().unwrap();
        let location = dir.path().join("data").join("gold");
        VectorIndex::build(&location, "test-model", sample()).unwrap();
        sync_dir(&location).unwrap();
        let mut names: Vec<String> = fs::read_dir(&location)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![CHUNKS_FILE.to_string(), MANIFEST_FILE.to_string()]);
        assert_eq!(VectorIndex::open(&location).unwrap().len(), 3);
    }

    #[test]
    fn missing_index_is_reported() {
        let dir = tempdir().unwrap();
        let err = VectorIndex::open(dir.path().join("gold")).unwrap_err();
        assert!(matches!(err, StoreError::Missing(_)));
    }

    #[test]
    fn query_dimension_must_match() {
        let dir = tempdir().unwrap();
        let index = VectorIndex::build(dir.path(), "test-model", sample()).unwrap();
        let err = index.search(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn ragged_records_are_rejected_at_build() {
        let dir = tempdir().unwrap();
        let records = vec![record(0, "a", vec![1.0, 0.0]), record(1, "b", vec![1.0])];
        assert!(matches!(
            VectorIndex::build(dir.path(), "test-model", records),
            Err(StoreError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn truncated_record_file_is_corrupt() {
        let dir = tempdir().unwrap();
        VectorIndex::build(dir.path(), "test-model", sample()).unwrap();
        fs::write(dir.path().join(CHUNKS_FILE), "{\"chunk_id\": 0,").unwrap();
        assert!(matches!(
            VectorIndex::open(dir.path()),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[2.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
