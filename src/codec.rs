//! Binary codec for raw vector datasets (`.fvecs` layout).
//!
//! A payload is a sequence of records, each
//! `[dim: i32 LE][f32 LE * dim]`. Every record in one payload declares the
//! same `dim`; the decoder takes it from the first record and then walks the
//! rest of the stream in `(dim + 1) * 4` byte chunks.

use bytes::Bytes;

use crate::error::{Result, VectorLakeError};

/// File extension used for raw dataset artifacts.
pub const FVECS_EXTENSION: &str = "fvecs";

/// An immutable `N x D` float matrix, stored contiguously one vector per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    dim: usize,
    values: Vec<f32>,
}

impl Dataset {
    /// Build a dataset from a flat value buffer of `n * dim` floats.
    pub fn new(dim: usize, values: Vec<f32>) -> Result<Self> {
        if dim == 0 {
            if !values.is_empty() {
                return Err(VectorLakeError::Format(
                    "dimension must be > 0 for a non-empty dataset".into(),
                ));
            }
            return Ok(Self::empty());
        }
        if values.len() % dim != 0 {
            return Err(VectorLakeError::Format(format!(
                "{} values do not form whole vectors of dimension {dim}",
                values.len()
            )));
        }
        Ok(Self { dim, values })
    }

    /// Build a dataset from individual rows, which must share one length.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Ok(Self::empty());
        };
        let dim = first.as_ref().len();
        let mut values = Vec::with_capacity(rows.len() * dim);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != dim {
                return Err(VectorLakeError::Format(format!(
                    "row {i} has dimension {}, expected {dim}",
                    row.len()
                )));
            }
            values.extend_from_slice(row);
        }
        Self::new(dim, values)
    }

    pub fn empty() -> Self {
        Self {
            dim: 0,
            values: Vec::new(),
        }
    }

    /// Vector dimension `D` (0 only for the empty dataset).
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of vectors `N`.
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.values.len() / self.dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The `i`-th vector. Panics if `i >= len()`.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.values[i * self.dim..(i + 1) * self.dim]
    }

    /// Iterate over all vectors in order.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.values.chunks_exact(self.dim.max(1))
    }

    /// The underlying row-major value buffer.
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }
}

/// Parse a raw `.fvecs` payload.
pub fn decode(data: &[u8]) -> Result<Dataset> {
    if data.is_empty() {
        return Ok(Dataset::empty());
    }
    if data.len() < 4 {
        return Err(VectorLakeError::Format(format!(
            "payload of {} bytes is too short for a dimension header",
            data.len()
        )));
    }

    let declared = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    if declared <= 0 {
        return Err(VectorLakeError::Format(format!(
            "record dimension must be > 0, got {declared}"
        )));
    }
    let dim = declared as usize;
    let record_len = (dim + 1) * 4;
    if data.len() % record_len != 0 {
        return Err(VectorLakeError::Format(format!(
            "payload length {} is not a multiple of the record size {record_len} (dim {dim})",
            data.len()
        )));
    }

    let n = data.len() / record_len;
    let mut values = Vec::with_capacity(n * dim);
    for (i, record) in data.chunks_exact(record_len).enumerate() {
        let record_dim = i32::from_le_bytes([record[0], record[1], record[2], record[3]]);
        if record_dim != declared {
            return Err(VectorLakeError::Format(format!(
                "record {i} declares dimension {record_dim}, expected {declared}"
            )));
        }
        values.extend(
            record[4..]
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])),
        );
    }

    Dataset::new(dim, values)
}

/// Serialize a dataset to the `.fvecs` layout.
pub fn encode(dataset: &Dataset) -> Result<Bytes> {
    if dataset.is_empty() {
        return Ok(Bytes::new());
    }
    let dim = i32::try_from(dataset.dim()).map_err(|_| {
        VectorLakeError::Format(format!(
            "dimension {} does not fit in an i32 header",
            dataset.dim()
        ))
    })?;

    let mut buf = Vec::with_capacity(dataset.len() * (dataset.dim() + 1) * 4);
    for row in dataset.rows() {
        buf.extend_from_slice(&dim.to_le_bytes());
        for &val in row {
            buf.extend_from_slice(&val.to_le_bytes());
        }
    }
    Ok(Bytes::from(buf))
}
