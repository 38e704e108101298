//! Timeout and retry around an embedding model.

use async_trait::async_trait;

use wyrm_core::{CallPolicy, Embedder, Result};

/// Wraps an [`Embedder`] so every call runs under a [`CallPolicy`].
pub struct GuardedEmbedder<E> {
    inner: E,
    policy: CallPolicy,
}

impl<E: Embedder> GuardedEmbedder<E> {
    pub fn new(inner: E, policy: CallPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped embedder.
    pub fn inner(&self) -> &E {
        &self.inner
    }
}

#[async_trait]
impl<E: Embedder> Embedder for GuardedEmbedder<E> {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.policy
            .run("embed_documents", || self.inner.embed_documents(texts))
            .await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.policy
            .run("embed_query", || self.inner.embed_query(text))
            .await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}
