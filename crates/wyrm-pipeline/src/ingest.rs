//! Corpus ingestion.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use wyrm_chunk::{ChunkConfig, Chunker, WordChunker};
use wyrm_core::{
    Chunk, Document, Embedder, IndexEntry, Result, VectorIndex, WyrmConfig, WyrmError,
};

/// Ingestion settings.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Words per chunk.
    pub chunk_size: usize,

    /// Chunks per embedding call.
    pub batch_size: usize,

    /// Delete a document's previous entries before writing the new ones.
    pub replace_existing: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            batch_size: 32,
            replace_existing: true,
        }
    }
}

impl From<&WyrmConfig> for IngestOptions {
    fn from(config: &WyrmConfig) -> Self {
        Self {
            chunk_size: config.chunking.chunk_size,
            batch_size: config.embedding.batch_size,
            replace_existing: config.ingest.replace_existing,
        }
    }
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Absolute directory that was scanned.
    pub directory: PathBuf,

    /// Files whose chunks were written.
    pub files_indexed: usize,

    /// Files skipped, with the reason.
    pub files_failed: Vec<(String, String)>,

    /// Subdirectories skipped.
    pub directories_skipped: usize,

    /// Chunks written to the index.
    pub chunks_indexed: usize,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Indexed {} chunks from {} files in {} ({} failed, {} directories skipped)",
            self.chunks_indexed,
            self.files_indexed,
            self.directory.display(),
            self.files_failed.len(),
            self.directories_skipped
        )
    }
}

/// Reads every file of a directory into the index.
pub struct IngestPipeline<E, I> {
    embedder: Arc<E>,
    index: Arc<I>,
    chunker: WordChunker,
    options: IngestOptions,
}

impl<E, I> IngestPipeline<E, I>
where
    E: Embedder,
    I: VectorIndex,
{
    /// Create a new pipeline.
    pub fn new(embedder: Arc<E>, index: Arc<I>, options: IngestOptions) -> Result<Self> {
        if options.chunk_size == 0 {
            return Err(WyrmError::invalid_argument("chunk_size must be positive"));
        }
        if options.batch_size == 0 {
            return Err(WyrmError::invalid_argument("batch_size must be positive"));
        }

        Ok(Self {
            embedder,
            index,
            chunker: WordChunker::new(),
            options,
        })
    }

    /// Ingest every regular file directly inside `directory`.
    ///
    /// Files are processed in filename order. Subdirectories are skipped. A
    /// file that cannot be read or embedded is reported in
    /// [`IngestReport::files_failed`]; index write failures abort the run.
    pub async fn ingest(&self, directory: impl AsRef<Path>) -> Result<IngestReport> {
        let start = Instant::now();
        let directory = absolutize(directory.as_ref())?;

        if !directory.is_dir() {
            return Err(WyrmError::DirectoryNotFound { path: directory });
        }

        info!("Ingesting directory {}", directory.display());

        let mut entries: Vec<PathBuf> = fs::read_dir(&directory)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<_>>()?;
        entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let mut report = IngestReport {
            directory,
            ..Default::default()
        };

        for path in entries {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if path.is_dir() {
                debug!("Skipping subdirectory {}", name);
                report.directories_skipped += 1;
                continue;
            }

            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping {}: failed to read: {}", name, e);
                    report.files_failed.push((name, e.to_string()));
                    continue;
                }
            };

            match self.ingest_document(Document::new(&name, content)).await {
                Ok(count) => {
                    report.files_indexed += 1;
                    report.chunks_indexed += count;
                }
                Err(e) if is_per_file(&e) => {
                    warn!("Skipping {}: {}", name, e);
                    report.files_failed.push((name, e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        info!("{} in {}ms", report, start.elapsed().as_millis());

        Ok(report)
    }

    /// Chunk, embed and write one document. Returns the number of chunks.
    pub async fn ingest_document(&self, document: Document) -> Result<usize> {
        let texts: Vec<String> = self
            .chunker
            .chunk(
                &document.content,
                &ChunkConfig {
                    chunk_size: self.options.chunk_size,
                },
            )?
            .into_iter()
            .map(|c| c.content)
            .collect();

        let chunks = document.chunks(texts);
        let embeddings = self.embed_chunks(&chunks).await?;

        // Nothing is removed until every vector is known to fit the index.
        for embedding in &embeddings {
            self.index.check_dimension(embedding)?;
        }

        let entries: Vec<IndexEntry> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry::from_chunk(chunk, embedding))
            .collect();

        if self.options.replace_existing {
            let removed = self.index.replace_document(&document.id, &entries).await?;
            if removed > 0 {
                debug!("Replaced {} previous entries of {}", removed, document.id);
            }
        } else {
            self.index.upsert_batch(&entries).await?;
        }

        debug!("Indexed {} chunks of {}", entries.len(), document.id);
        Ok(entries.len())
    }

    /// Embed chunks in batches, preserving order.
    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(self.options.batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.content.as_str()).collect();
            let vectors = self.embedder.embed_documents(&texts).await?;

            if vectors.len() != batch.len() {
                return Err(WyrmError::embedding(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            embeddings.extend(vectors);
        }

        Ok(embeddings)
    }
}

/// Errors that skip the current file instead of ending the run.
fn is_per_file(error: &WyrmError) -> bool {
    matches!(
        error,
        WyrmError::Embedding { .. }
            | WyrmError::Timeout { .. }
            | WyrmError::DimensionMismatch { .. }
            | WyrmError::Io(_)
    )
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
