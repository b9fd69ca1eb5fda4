use ndarray::Array2;
use std::path::{Path, PathBuf};

use crate::utils;

/// Startup failures while reading or aligning the static corpus.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid .npy data: {0}")]
    Npy(String),

    #[error("embedding row {row} has {actual} values, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("corpus has {docs} chunks but {rows} embedding rows")]
    Misaligned { docs: usize, rows: usize },

    #[error("corpus is empty")]
    Empty,

    #[error("embeddings have zero dimensions")]
    ZeroDimension,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("chunk index {index} out of range for corpus of {len} chunks")]
    OutOfRange { index: usize, len: usize },
}

/// Ordered chunk texts, addressed by the same position as their embedding row.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    chunks: Vec<String>,
}

impl DocumentStore {
    pub fn new(chunks: Vec<String>) -> Self {
        DocumentStore { chunks }
    }

    pub fn get(&self, index: usize) -> Result<&str, StoreError> {
        self.chunks
            .get(index)
            .map(String::as_str)
            .ok_or(StoreError::OutOfRange {
                index,
                len: self.chunks.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }
}

/// Chunk texts paired positionally with an N x D embedding matrix.
#[derive(Debug)]
pub struct Corpus {
    documents: DocumentStore,
    embeddings: Array2<f32>,
}

impl Corpus {
    pub fn new(chunks: Vec<String>, embeddings: Array2<f32>) -> Result<Self, CorpusError> {
        let (rows, cols) = embeddings.dim();
        if chunks.len() != rows {
            return Err(CorpusError::Misaligned {
                docs: chunks.len(),
                rows,
            });
        }
        if rows == 0 {
            return Err(CorpusError::Empty);
        }
        if cols == 0 {
            return Err(CorpusError::ZeroDimension);
        }

        Ok(Corpus {
            documents: DocumentStore::new(chunks),
            embeddings,
        })
    }

    /// Reads the chunk list and the embedding matrix and checks they line up.
    pub fn load(docs_path: &Path, embeddings_path: &Path) -> Result<Self, CorpusError> {
        let chunks = utils::load_docs_json(docs_path)?;
        let embeddings = utils::load_embeddings(embeddings_path)?;
        Self::new(chunks, embeddings)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn dimensions(&self) -> usize {
        self.embeddings.ncols()
    }

    pub fn into_parts(self) -> (DocumentStore, Array2<f32>) {
        (self.documents, self.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_store_lookup() {
        let store = DocumentStore::new(vec!["Section 302".to_string(), "Section 420".to_string()]);
        assert_eq!(store.get(1), Ok("Section 420"));
        assert_eq!(
            store.get(2),
            Err(StoreError::OutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_misaligned_corpus_is_rejected() {
        let err = Corpus::new(vec!["only one".to_string()], array![[0.0, 1.0], [1.0, 0.0]])
            .unwrap_err();
        assert!(matches!(err, CorpusError::Misaligned { docs: 1, rows: 2 }));
    }

    #[test]
    fn test_empty_corpus_is_rejected() {
        let err = Corpus::new(Vec::new(), Array2::zeros((0, 4))).unwrap_err();
        assert!(matches!(err, CorpusError::Empty));
    }

    #[test]
    fn test_zero_dimension_is_rejected() {
        let err = Corpus::new(vec!["a".to_string()], Array2::zeros((1, 0))).unwrap_err();
        assert!(matches!(err, CorpusError::ZeroDimension));
    }

    #[test]
    fn test_load_from_disk() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let docs = dir.path().join("docs.json");
        let embeddings = dir.path().join("embeddings.json");
        fs::write(&docs, r#"["FIR under Section 154 CrPC", "Bail under Section 436"]"#)?;
        fs::write(&embeddings, "[[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]")?;

        let corpus = Corpus::load(&docs, &embeddings)?;
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.dimensions(), 3);

        let (store, matrix) = corpus.into_parts();
        assert_eq!(store.get(0)?, "FIR under Section 154 CrPC");
        assert_eq!(matrix[[1, 2]], 0.6);
        Ok(())
    }

    #[test]
    fn test_load_npy_embeddings() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let docs = dir.path().join("docs.json");
        let embeddings = dir.path().join("embeddings.npy");
        fs::write(
            &docs,
            r#"["Right to Information Act, 2005", "Motor Vehicles Act, 1988", "Section 125 CrPC"]"#,
        )?;
        fs::write(
            &embeddings,
            utils::tests::npy_f32(3, 2, &[1.0, 0.0, 0.0, 1.0, 0.5, 0.5]),
        )?;

        let corpus = Corpus::load(&docs, &embeddings)?;
        assert_eq!((corpus.len(), corpus.dimensions()), (3, 2));
        Ok(())
    }

    #[test]
    fn test_npy_row_count_must_match_docs() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let docs = dir.path().join("docs.json");
        let embeddings = dir.path().join("embeddings.npy");
        fs::write(&docs, r#"["one", "two"]"#)?;
        fs::write(&embeddings, utils::tests::npy_f32(3, 1, &[1.0, 2.0, 3.0]))?;

        let err = Corpus::load(&docs, &embeddings).unwrap_err();
        assert!(matches!(err, CorpusError::Misaligned { docs: 2, rows: 3 }));
        Ok(())
    }

    #[test]
    fn test_missing_docs_file() {
        let dir = tempdir().unwrap();
        let err = Corpus::load(&dir.path().join("docs.json"), &dir.path().join("e.json"))
            .unwrap_err();
        assert!(matches!(err, CorpusError::Io { .. }));
    }
}
