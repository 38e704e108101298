//! Configuration types for the wyrm pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, WyrmError};
use crate::policy::CallPolicy;

/// Main configuration for the wyrm pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WyrmConfig {
    /// Vector index configuration.
    #[serde(default)]
    pub index: IndexConfig,

    /// Embedding configuration.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking configuration.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retrieval configuration.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Generation configuration.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Ingestion configuration.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Session log configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Diagnostic log configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Vector index configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Path to the SQLite index file.
    #[serde(default = "default_index_path")]
    pub path: PathBuf,

    /// Embedding dimension stored in the index.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            dimension: default_dimension(),
        }
    }
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Path to the ONNX model file.
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Path to the tokenizer.json file.
    #[serde(default = "default_tokenizer_path")]
    pub tokenizer_path: PathBuf,

    /// Output dimension of the model.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Maximum tokens per input; longer inputs are truncated.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Batch size for embedding.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Number of threads for CPU inference.
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,

    /// Deadline for one embedding call in seconds.
    #[serde(default = "default_embed_timeout")]
    pub timeout_secs: u64,

    /// Retries after a failed embedding call.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Prepended to every document before embedding (e.g. `search_document: `).
    #[serde(default)]
    pub document_prefix: String,

    /// Prepended to every query before embedding (e.g. `search_query: `).
    #[serde(default)]
    pub query_prefix: String,

    /// Feed a `token_type_ids` input. Off for graphs without segment ids.
    #[serde(default = "default_true")]
    pub token_type_ids: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            tokenizer_path: default_tokenizer_path(),
            dimension: 384,
            max_tokens: 256,
            batch_size: 32,
            num_threads: 4,
            timeout_secs: 30,
            max_retries: 1,
            document_prefix: String::new(),
            query_prefix: String::new(),
            token_type_ids: true,
        }
    }
}

impl EmbeddingConfig {
    /// Call policy for embedding requests.
    pub fn policy(&self) -> CallPolicy {
        CallPolicy::new(self.timeout_secs, self.max_retries)
    }
}

/// Chunking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Words per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 100 }
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks fetched as context.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

/// Generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Ollama base URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Deadline for one generation call in seconds.
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Retries after a failed generation call.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            timeout_secs: 120,
            max_retries: 1,
        }
    }
}

impl GenerationConfig {
    /// Call policy for generation requests.
    pub fn policy(&self) -> CallPolicy {
        CallPolicy::new(self.timeout_secs, self.max_retries)
    }
}

/// Ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Default corpus directory.
    #[serde(default = "default_ingest_directory")]
    pub directory: PathBuf,

    /// Drop a document's previous chunks before re-indexing it.
    #[serde(default = "default_true")]
    pub replace_existing: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            directory: default_ingest_directory(),
            replace_existing: true,
        }
    }
}

/// Session log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Append-only history file.
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_path: default_history_path(),
        }
    }
}

/// Diagnostic log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Append-only diagnostic log file.
    #[serde(default = "default_log_path")]
    pub path: PathBuf,

    /// Default filter directive when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
            level: default_log_level(),
        }
    }
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_dimension() -> usize {
    384
}

fn default_max_tokens() -> usize {
    256
}

fn default_batch_size() -> usize {
    32
}

fn default_num_threads() -> usize {
    4
}

fn default_embed_timeout() -> u64 {
    30
}

fn default_generation_timeout() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    1
}

fn default_chunk_size() -> usize {
    100
}

fn default_top_k() -> usize {
    3
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "qwen2.5-coder:1.5b".to_string()
}

fn default_ingest_directory() -> PathBuf {
    PathBuf::from("manpages")
}

fn default_history_path() -> PathBuf {
    PathBuf::from("session_history.txt")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wyrm")
}

fn default_index_path() -> PathBuf {
    data_dir().join("index.sqlite")
}

fn default_model_path() -> PathBuf {
    data_dir()
        .join("models")
        .join("all-MiniLM-L6-v2")
        .join("model.onnx")
}

fn default_tokenizer_path() -> PathBuf {
    data_dir()
        .join("models")
        .join("all-MiniLM-L6-v2")
        .join("tokenizer.json")
}

fn default_log_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wyrmai.log")
}

impl WyrmConfig {
    /// Load configuration from file.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| WyrmError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("wyrm").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("wyrm.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(WyrmError::config("chunking.chunk_size must be positive"));
        }
        if self.retrieval.top_k == 0 {
            return Err(WyrmError::config("retrieval.top_k must be positive"));
        }
        if self.embedding.batch_size == 0 {
            return Err(WyrmError::config("embedding.batch_size must be positive"));
        }
        if self.index.dimension != self.embedding.dimension {
            return Err(WyrmError::config(format!(
                "index.dimension ({}) must equal embedding.dimension ({})",
                self.index.dimension, self.embedding.dimension
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = WyrmConfig::default();
        assert_eq!(config.chunking.chunk_size, 100);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.generation.model, "qwen2.5-coder:1.5b");
        assert!(config.ingest.replace_existing);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: WyrmConfig = toml::from_str(
            r#"
            [retrieval]
            top_k = 5

            [generation]
            model = "llama3.2:1b"
            "#,
        )
        .unwrap();

        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.generation.model, "llama3.2:1b");
        assert_eq!(config.generation.endpoint, "http://localhost:11434");
        assert_eq!(config.chunking.chunk_size, 100);
    }

    #[test]
    fn test_asymmetric_embedding_settings() {
        let config: WyrmConfig = toml::from_str(
            r#"
            [embedding]
            document_prefix = "search_document: "
            query_prefix = "search_query: "
            token_type_ids = false
            "#,
        )
        .unwrap();

        assert_eq!(config.embedding.document_prefix, "search_document: ");
        assert_eq!(config.embedding.query_prefix, "search_query: ");
        assert!(!config.embedding.token_type_ids);

        let defaults = EmbeddingConfig::default();
        assert!(defaults.document_prefix.is_empty());
        assert!(defaults.token_type_ids);
    }

    #[test]
    fn test_load_rejects_zero_chunk_size() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[chunking]\nchunk_size = 0").unwrap();

        let err = WyrmConfig::load(file.path()).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_load_rejects_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retrieval\ntop_k = ").unwrap();

        assert!(WyrmConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_dimension_agreement() {
        let mut config = WyrmConfig::default();
        config.index.dimension = 768;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_policies() {
        let config = WyrmConfig::default();
        assert_eq!(config.generation.policy().timeout.as_secs(), 120);
        assert_eq!(config.embedding.policy().max_retries, 1);
    }
}
