use lazy_static::lazy_static;
use ndarray::Array2;
use regex::Regex;
use std::fs::{self, DirBuilder};
use std::path::Path;

use crate::corpus::CorpusError;

const NPY_MAGIC: &[u8] = b"\x93NUMPY";

/// Creates a directory if it doesn't exist
pub fn ensure_dir(path: impl AsRef<Path>) -> std::io::Result<()> {
    DirBuilder::new().recursive(true).create(path)
}

/// Loads the chunk list: a JSON array of strings
pub fn load_docs_json(path: &Path) -> Result<Vec<String>, CorpusError> {
    let bytes = read_file(path)?;
    serde_json::from_slice(&bytes).map_err(|source| CorpusError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads the embedding matrix from a `.npy` file or a JSON array of rows.
///
/// NumPy files are recognised by their magic bytes, so the extension is
/// only a hint.
pub fn load_embeddings(path: &Path) -> Result<Array2<f32>, CorpusError> {
    let bytes = read_file(path)?;
    if bytes.starts_with(NPY_MAGIC) {
        parse_npy(&bytes)
    } else {
        parse_json_matrix(&bytes).map_err(|err| match err {
            JsonMatrixError::Json(source) => CorpusError::Json {
                path: path.to_path_buf(),
                source,
            },
            JsonMatrixError::Corpus(err) => err,
        })
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, CorpusError> {
    fs::read(path).map_err(|source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    })
}

enum JsonMatrixError {
    Json(serde_json::Error),
    Corpus(CorpusError),
}

fn parse_json_matrix(bytes: &[u8]) -> Result<Array2<f32>, JsonMatrixError> {
    let rows: Vec<Vec<f32>> = serde_json::from_slice(bytes).map_err(JsonMatrixError::Json)?;
    let cols = rows.first().map_or(0, Vec::len);

    let mut flat = Vec::with_capacity(rows.len() * cols);
    for (row, values) in rows.iter().enumerate() {
        if values.len() != cols {
            return Err(JsonMatrixError::Corpus(CorpusError::Ragged {
                row,
                expected: cols,
                actual: values.len(),
            }));
        }
        flat.extend_from_slice(values);
    }

    Array2::from_shape_vec((rows.len(), cols), flat)
        .map_err(|e| JsonMatrixError::Corpus(CorpusError::Npy(e.to_string())))
}

/// Parses a 2-D, C-ordered `.npy` array of `f4` or `f8` values.
pub fn parse_npy(bytes: &[u8]) -> Result<Array2<f32>, CorpusError> {
    lazy_static! {
        static ref DESCR: Regex = Regex::new(r"'descr'\s*:\s*'([^']*)'").unwrap();
        static ref FORTRAN: Regex = Regex::new(r"'fortran_order'\s*:\s*(True|False)").unwrap();
        static ref SHAPE: Regex = Regex::new(r"'shape'\s*:\s*\(([^)]*)\)").unwrap();
    }

    let bad = |msg: &str| CorpusError::Npy(msg.to_string());

    if !bytes.starts_with(NPY_MAGIC) || bytes.len() < 10 {
        return Err(bad("missing NUMPY magic"));
    }
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            let raw = bytes.get(8..12).ok_or_else(|| bad("truncated header length"))?;
            (u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize, 12)
        }
        other => return Err(CorpusError::Npy(format!("unsupported format version {other}"))),
    };

    let header_end = header_start + header_len;
    let header = bytes
        .get(header_start..header_end)
        .ok_or_else(|| bad("truncated header"))?;
    let header = String::from_utf8_lossy(header);

    let descr = DESCR
        .captures(&header)
        .map(|c| c[1].to_string())
        .ok_or_else(|| bad("header has no 'descr'"))?;
    if FORTRAN.captures(&header).is_some_and(|c| &c[1] == "True") {
        return Err(bad("Fortran-ordered arrays are not supported"));
    }
    let shape: Vec<usize> = SHAPE
        .captures(&header)
        .ok_or_else(|| bad("header has no 'shape'"))?[1]
        .split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| {
            dim.parse::<usize>()
                .map_err(|_| CorpusError::Npy(format!("invalid shape entry '{dim}'")))
        })
        .collect::<Result<_, _>>()?;
    let [rows, cols] = shape[..] else {
        return Err(CorpusError::Npy(format!(
            "expected a 2-D array, got shape {shape:?}"
        )));
    };

    let count = rows
        .checked_mul(cols)
        .ok_or_else(|| bad("shape overflows usize"))?;
    let data = &bytes[header_end..];
    let values: Vec<f32> = match descr.as_str() {
        "<f4" | "=f4" => decode::<4>(data, count, f32::from_le_bytes)?,
        ">f4" => decode::<4>(data, count, f32::from_be_bytes)?,
        "<f8" | "=f8" => decode::<8>(data, count, |b| f64::from_le_bytes(b) as f32)?,
        ">f8" => decode::<8>(data, count, |b| f64::from_be_bytes(b) as f32)?,
        other => return Err(CorpusError::Npy(format!("unsupported dtype '{other}'"))),
    };

    Array2::from_shape_vec((rows, cols), values).map_err(|e| CorpusError::Npy(e.to_string()))
}

fn decode<const N: usize>(
    data: &[u8],
    count: usize,
    convert: impl Fn([u8; N]) -> f32,
) -> Result<Vec<f32>, CorpusError> {
    let expected = count
        .checked_mul(N)
        .ok_or_else(|| CorpusError::Npy("shape overflows usize".to_string()))?;
    if data.len() < expected {
        return Err(CorpusError::Npy(format!(
            "expected {expected} data bytes, found {}",
            data.len()
        )));
    }

    Ok(data[..expected]
        .chunks_exact(N)
        .map(|chunk| {
            let mut raw = [0u8; N];
            raw.copy_from_slice(chunk);
            convert(raw)
        })
        .collect())
}
