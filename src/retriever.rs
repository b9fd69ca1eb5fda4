use crate::corpus::{DocumentStore, StoreError};
use crate::embedder::{EmbedError, Encoder};
use crate::vector_db::{IndexError, VectorDB};

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Embedding(#[from] EmbedError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("document store has {docs} chunks but the index holds {vectors} vectors")]
    Misaligned { docs: usize, vectors: usize },
}

/// A chunk selected for a query, nearest first.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk<'a> {
    pub index: usize,
    /// Squared L2 distance from the query embedding.
    pub distance: f32,
    pub text: &'a str,
}

pub struct Retriever {
    store: DocumentStore,
    index: VectorDB,
    encoder: Box<dyn Encoder>,
}

impl Retriever {
    /// Fails if the store and index disagree on size, or if the encoder's
    /// output would not fit the index.
    pub fn new(
        store: DocumentStore,
        index: VectorDB,
        encoder: Box<dyn Encoder>,
    ) -> Result<Self, RetrievalError> {
        if store.len() != index.len() {
            return Err(RetrievalError::Misaligned {
                docs: store.len(),
                vectors: index.len(),
            });
        }
        if encoder.dimensions() != index.dimensions() {
            return Err(IndexError::DimensionMismatch {
                expected: index.dimensions(),
                actual: encoder.dimensions(),
            }
            .into());
        }

        Ok(Retriever {
            store,
            index,
            encoder,
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn dimensions(&self) -> usize {
        self.index.dimensions()
    }

    pub fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk<'_>>, RetrievalError> {
        let embedding = self.encoder.encode(query)?;
        let neighbors = self.index.search(&embedding, top_k)?;

        tracing::debug!(
            hits = ?neighbors.iter().map(|n| (n.index, n.distance)).collect::<Vec<_>>(),
            "retrieved chunks"
        );

        let mut chunks = Vec::with_capacity(neighbors.len());
        for n in neighbors {
            chunks.push(RetrievedChunk {
                index: n.index,
                distance: n.distance,
                text: self.store.get(n.index)?,
            });
        }
        Ok(chunks)
    }
}

/// Joins chunk texts in retrieval order, separated by a blank line.
///
/// No size cap is applied; large `k` or long chunks can exceed the
/// generation model's input window.
pub fn assemble_context(chunks: &[RetrievedChunk<'_>]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text)
        .collect::<Vec<_>>()
        .join("\n\n")
}
