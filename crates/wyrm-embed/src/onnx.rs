//! ONNX-based embedding model implementation.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ndarray::ArrayViewD;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use wyrm_core::{Embedder, EmbeddingConfig, Result, WyrmError};

/// Loaded model state shared with the blocking pool.
struct OnnxModel {
    /// ONNX inference session (wrapped in Mutex for interior mutability).
    session: Mutex<Session>,

    /// Tokenizer for the model.
    tokenizer: Tokenizer,

    /// Maximum token count per input.
    max_tokens: usize,

    /// Whether the graph expects a `token_type_ids` input (BERT family).
    token_type_ids: bool,
}

/// ONNX-based embedder for all-MiniLM-L6-v2 or a compatible sentence model.
pub struct OnnxEmbedder {
    model: Arc<OnnxModel>,

    /// Embedding dimension.
    dimension: usize,

    /// Prefix prepended to documents (asymmetric models only).
    document_prefix: String,

    /// Prefix prepended to queries (asymmetric models only).
    query_prefix: String,
}

impl OnnxEmbedder {
    /// Load the model and tokenizer named by the configuration.
    ///
    /// Any load failure is reported as [`WyrmError::ModelUnavailable`].
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let embedder = Self::from_files(
            &config.model_path,
            &config.tokenizer_path,
            config.dimension,
            config.max_tokens,
            config.num_threads,
        )?
        .with_prefixes(&config.document_prefix, &config.query_prefix);

        Ok(if config.token_type_ids {
            embedder
        } else {
            embedder.without_token_type_ids()
        })
    }

    /// Create an embedder from model and tokenizer paths.
    pub fn from_files(
        model_path: impl AsRef<Path>,
        tokenizer_path: impl AsRef<Path>,
        dimension: usize,
        max_tokens: usize,
        num_threads: usize,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let tokenizer_path = tokenizer_path.as_ref();

        if !model_path.exists() {
            return Err(WyrmError::model_unavailable(format!(
                "model file not found: {}",
                model_path.display()
            )));
        }

        info!("Loading ONNX model from {:?}", model_path);

        let session = Session::builder()
            .map_err(|e| {
                WyrmError::model_unavailable(format!("Failed to create session builder: {}", e))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                WyrmError::model_unavailable(format!("Failed to set optimization level: {}", e))
            })?
            .with_intra_threads(num_threads)
            .map_err(|e| {
                WyrmError::model_unavailable(format!("Failed to set thread count: {}", e))
            })?
            .commit_from_file(model_path)
            .map_err(|e| WyrmError::model_unavailable(format!("Failed to load model: {}", e)))?;

        info!("Loading tokenizer from {:?}", tokenizer_path);

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| WyrmError::model_unavailable(format!("Failed to load tokenizer: {}", e)))?;

        info!(
            "Embedder initialized: dim={}, max_tokens={}",
            dimension, max_tokens
        );

        Ok(Self {
            model: Arc::new(OnnxModel {
                session: Mutex::new(session),
                tokenizer,
                max_tokens,
                token_type_ids: true,
            }),
            dimension,
            document_prefix: String::new(),
            query_prefix: String::new(),
        })
    }

    /// Set asymmetric retrieval prefixes (e.g. `search_document: `).
    pub fn with_prefixes(mut self, document: &str, query: &str) -> Self {
        self.document_prefix = document.to_string();
        self.query_prefix = query.to_string();
        self
    }

    /// Feed only `input_ids` and `attention_mask` (models without segment ids).
    pub fn without_token_type_ids(mut self) -> Self {
        if let Some(model) = Arc::get_mut(&mut self.model) {
            model.token_type_ids = false;
        }
        self
    }

    /// Run a prefixed batch on the blocking pool.
    async fn embed_prefixed(&self, texts: &[&str], prefix: &str) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prefixed = with_prefix(texts, prefix);
        let model = Arc::clone(&self.model);

        let embeddings = tokio::task::spawn_blocking(move || model.embed_batch(&prefixed))
            .await
            .map_err(|e| WyrmError::embedding(format!("Embedding task failed: {}", e)))??;

        if let Some(first) = embeddings.first() {
            if first.len() != self.dimension {
                return Err(WyrmError::DimensionMismatch {
                    expected: self.dimension,
                    actual: first.len(),
                });
            }
        }

        Ok(embeddings)
    }
}

impl OnnxModel {
    /// Embed a batch of texts.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();

        let encodings = self
            .tokenizer
            .encode_batch(refs, true)
            .map_err(|e| WyrmError::embedding(format!("Tokenization failed: {}", e)))?;

        // Get max length for padding
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(self.max_tokens);

        let batch_size = encodings.len();

        debug!("Embedding batch: size={}, max_len={}", batch_size, max_len);

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let len = ids.len().min(max_len);

            for j in 0..len {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
            }
        }

        let input_ids_tensor = Tensor::from_array((vec![batch_size, max_len], input_ids))
            .map_err(|e| WyrmError::embedding(format!("Failed to create input tensor: {}", e)))?;

        let attention_mask_tensor = Tensor::from_array((vec![batch_size, max_len], attention_mask))
            .map_err(|e| WyrmError::embedding(format!("Failed to create mask tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| WyrmError::embedding(format!("Failed to lock session: {}", e)))?;

        let outputs = (if self.token_type_ids {
            let token_type_tensor =
                Tensor::from_array((vec![batch_size, max_len], vec![0i64; batch_size * max_len]))
                    .map_err(|e| {
                        WyrmError::embedding(format!("Failed to create token type tensor: {}", e))
                    })?;
            session.run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_tensor
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor
            ])
        })
        .map_err(|e| WyrmError::embedding(format!("Inference failed: {}", e)))?;

        // First output is the token embeddings (batch, seq, hidden) or pooled (batch, hidden)
        let (_, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| WyrmError::embedding("No output tensor found"))?;

        let view = output
            .try_extract_array::<f32>()
            .map_err(|e| WyrmError::embedding(format!("Failed to extract tensor: {}", e)))?;

        let shape_dims: Vec<usize> = view.shape().to_vec();
        debug!("Output shape: {:?}", shape_dims);

        match shape_dims.len() {
            3 => Ok(mean_pool(&view, &encodings, max_len)),
            2 => {
                let hidden_dim = shape_dims[1];
                Ok((0..batch_size)
                    .map(|i| l2_normalize((0..hidden_dim).map(|j| view[[i, j]]).collect()))
                    .collect())
            }
            _ => Err(WyrmError::embedding(format!(
                "Unexpected output shape: {:?}",
                shape_dims
            ))),
        }
    }
}

fn with_prefix(texts: &[&str], prefix: &str) -> Vec<String> {
    texts.iter().map(|t| format!("{}{}", prefix, t)).collect()
}

/// Mean pooling over the sequence dimension, weighted by the attention mask.
fn mean_pool(
    tensor: &ArrayViewD<'_, f32>,
    encodings: &[tokenizers::Encoding],
    max_len: usize,
) -> Vec<Vec<f32>> {
    let shape = tensor.shape();
    let seq_len = shape[1];
    let hidden_dim = shape[2];

    encodings
        .iter()
        .enumerate()
        .map(|(i, encoding)| {
            let mask = encoding.get_attention_mask();
            let limit = mask.len().min(max_len).min(seq_len);

            let mut sum = vec![0.0f32; hidden_dim];
            let mut valid = 0usize;
            for j in (0..limit).filter(|&j| mask[j] == 1) {
                valid += 1;
                for (k, s) in sum.iter_mut().enumerate() {
                    *s += tensor[[i, j, k]];
                }
            }

            if valid == 0 {
                return sum;
            }

            l2_normalize(sum.into_iter().map(|s| s / valid as f32).collect())
        })
        .collect()
}

/// L2 normalize a vector.
pub(crate) fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.embed_prefixed(texts, &self.document_prefix).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_prefixed(&[text], &self.query_prefix)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| WyrmError::embedding("No embedding returned"))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
