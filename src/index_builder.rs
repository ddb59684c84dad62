//! Offline index construction: cleaned table → chunks → embeddings → index.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::catalog::DOCUMENT_COLUMN;
use crate::chunker::{
    Chunk, ChunkMetadata, TextSplitter, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
};
use crate::embedder::Embedder;
use crate::embeddings::EmbeddedChunk;
use crate::error::{BuildError, EmbeddingError};
use crate::vector_store::VectorIndex;

/// Default number of chunks per embedding request.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Chunking and batching knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBuilderConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between neighbouring chunks.
    pub chunk_overlap: usize,
    /// Chunks sent per embedding request.
    pub batch_size: usize,
}

impl Default for IndexBuilderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Outcome of an index build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Documents read from the cleaned table.
    pub documents: usize,
    /// Chunks embedded and stored.
    pub chunks: usize,
    /// Vector width; 0 for an empty index.
    pub dimensions: usize,
    /// Index directory.
    pub location: PathBuf,
}

/// Builds a fresh vector index from the cleaned document table.
pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    splitter: TextSplitter,
    batch_size: usize,
}

impl IndexBuilder {
    /// Builder using `embedder` for every chunk.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        config: &IndexBuilderConfig,
    ) -> Result<Self, BuildError> {
        let splitter = TextSplitter::new(config.chunk_size, config.chunk_overlap)?;
        Ok(Self {
            embedder,
            splitter,
            batch_size: config.batch_size.max(1),
        })
    }

    /// Reads the cleaned table and splits every document into chunks.
    /// Returns the document count alongside the chunks.
    pub fn load_chunks(&self, processed_path: &Path) -> Result<(usize, Vec<Chunk>), BuildError> {
        let read_err = |source: csv::Error| BuildError::Read {
            path: processed_path.to_path_buf(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(processed_path)
            .map_err(read_err)?;
        let column = reader
            .headers()
            .map_err(read_err)?
            .iter()
            .position(|header| header == DOCUMENT_COLUMN)
            .ok_or_else(|| BuildError::MissingDocumentColumn(processed_path.to_path_buf()))?;

        let source = processed_path.display().to_string();
        let mut documents = 0usize;
        let mut chunks = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(read_err)?;
            let text = record.get(column).unwrap_or("");
            if text.trim().is_empty() {
                continue;
            }
            documents += 1;
            let metadata = ChunkMetadata {
                source: source.clone(),
                row,
            };
            chunks.extend(self.splitter.split_document(text, &metadata));
        }
        Ok((documents, chunks))
    }

    /// Chunks, embeds and persists the cleaned table at `persist_dir`,
    /// replacing any index already there.
    pub fn build_and_save_vectorstore(
        &self,
        processed_path: impl AsRef<Path>,
        persist_dir: impl AsRef<Path>,
    ) -> Result<BuildReport, BuildError> {
        let processed_path = processed_path.as_ref();
        let persist_dir = persist_dir.as_ref();
        let (documents, chunks) = self.load_chunks(processed_path)?;
        info!(
            documents,
            chunks = chunks.len(),
            chunk_size = self.splitter.chunk_size(),
            model = self.embedder.model_id(),
            "embedding catalog chunks"
        );

        let records = self.embed_chunks(chunks)?;
        let index = VectorIndex::build(persist_dir, self.embedder.model_id(), records)?;
        Ok(BuildReport {
            documents,
            chunks: index.len(),
            dimensions: index.manifest().dimensions,
            location: persist_dir.to_path_buf(),
        })
    }

    fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<EmbeddedChunk>, BuildError> {
        let total = chunks.len();
        let mut records = Vec::with_capacity(total);
        let mut pending = chunks.into_iter().peekable();
        while pending.peek().is_some() {
            let batch: Vec<Chunk> = pending.by_ref().take(self.batch_size).collect();
            let inputs: Vec<&str> = batch.iter().map(|chunk| chunk.text.as_str()).collect();
            let vectors = self.embedder.embed_batch(&inputs)?;
            if vectors.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: batch.len(),
                    got: vectors.len(),
                }
                .into());
            }
            for (chunk, vector) in batch.into_iter().zip(vectors) {
                let chunk_id = records.len();
                records.push(EmbeddedChunk::new(chunk_id, chunk, vector));
            }
            debug!(embedded = records.len(), total, "embedded batch");
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashingEmbedder;
    use crate::error::StoreError;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct CountingEmbedder {
        inner: HashingEmbedder,
        calls: AtomicUsize,
    }

    impl Embedder for CountingEmbedder {
        fn model_id(&self) -> &str {
            self.inner.model_id()
        }

        fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_batch(inputs)
        }
    }

    struct BrokenEmbedder;

    impl Embedder for BrokenEmbedder {
        fn model_id(&self) -> &str {
            "broken"
        }

        fn embed_batch(&self, _inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Decode("boom".into()))
        }
    }

    fn write_table(path: &Path, docs: &[&str]) {
        let mut writer = csv::Writer::from_path(path).unwrap();
        writer.write_record([DOCUMENT_COLUMN]).unwrap();
        for doc in docs {
            writer.write_record([*doc]).unwrap();
        }
        writer.flush().unwrap();
    }

    #[test]
    fn embeds_in_batches_and_persists() {
        let dir = tempdir().unwrap();
        let table = dir.path().join("clean.csv");
        let docs: Vec<String> = (0..5)
            .map(|i| format!("Title: Show {i}\nGenres: Action\nSynopsis: Episode {i}."))
            .collect();
        let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
        write_table(&table, &refs);

        let embedder = Arc::new(CountingEmbedder {
            inner: HashingEmbedder::new(16).unwrap(),
            calls: AtomicUsize::new(0),
        });
        let config = IndexBuilderConfig {
            batch_size: 2,
            ..IndexBuilderConfig::default()
        };
        let builder = IndexBuilder::new(embedder.clone(), &config).unwrap();
        let report = builder
            .build_and_save_vectorstore(&table, dir.path().join("gold"))
            .unwrap();

        assert_eq!(report.documents, 5);
        assert_eq!(report.chunks, 5);
        assert_eq!(report.dimensions, 16);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);

        let index = VectorIndex::open(dir.path().join("gold")).unwrap();
        assert_eq!(index.len(), 5);
        assert_eq!(index.records()[3].metadata.row, 3);
        assert_eq!(index.records()[3].chunk_id, 3);
    }

    #[test]
    fn long_documents_are_chunked_within_bound() {
        let dir = tempdir().unwrap();
        let table = dir.path().join("clean.csv");
        let long = format!("Title: Epic\nGenres: Drama\nSynopsis: {}", "saga ".repeat(400));
        write_table(&table, &[long.as_str()]);

        let builder = IndexBuilder::new(
            Arc::new(HashingEmbedder::default()),
            &IndexBuilderConfig::default(),
        )
        .unwrap();
        let (documents, chunks) = builder.load_chunks(&table).unwrap();
        assert_eq!(documents, 1);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|chunk| chunk.text.chars().count() <= 1000));
        assert!(chunks.iter().all(|chunk| chunk.metadata.row == 0));
    }

    #[test]
    fn empty_table_builds_an_empty_index() {
        let dir = tempdir().unwrap();
        let table = dir.path().join("clean.csv");
        write_table(&table, &[]);
        let builder = IndexBuilder::new(
            Arc::new(HashingEmbedder::default()),
            &IndexBuilderConfig::default(),
        )
        .unwrap();
        let report = builder
            .build_and_save_vectorstore(&table, dir.path().join("gold"))
            .unwrap();
        assert_eq!(report.chunks, 0);
        assert!(VectorIndex::open(dir.path().join("gold")).unwrap().is_empty());
    }

    #[test]
    fn table_without_document_column_is_rejected() {
        let dir = tempdir().unwrap();
        let table = dir.path().join("clean.csv");
        fs::write(&table, "text\nhello\n").unwrap();
        let builder = IndexBuilder::new(
            Arc::new(HashingEmbedder::default()),
            &IndexBuilderConfig::default(),
        )
        .unwrap();
        assert!(matches!(
            builder.build_and_save_vectorstore(&table, dir.path().join("gold")),
            Err(BuildError::MissingDocumentColumn(_))
        ));
    }

    #[test]
    fn embedding_failure_aborts_without_an_index() {
        let dir = tempdir().unwrap();
        let table = dir.path().join("clean.csv");
        write_table(&table, &["Title: Naruto\nGenres: Action\nSynopsis: Ninja."]);
        let builder =
            IndexBuilder::new(Arc::new(BrokenEmbedder), &IndexBuilderConfig::default()).unwrap();
        let err = builder
            .build_and_save_vectorstore(&table, dir.path().join("gold"))
            .unwrap_err();
        assert!(matches!(err, BuildError::Embedding(_)));
        assert!(matches!(
            VectorIndex::open(dir.path().join("gold")),
            Err(StoreError::Missing(_))
        ));
    }
}
