// src/warehouse/batch.rs
use serde::Serialize;

/// Rows encoded as newline-delimited JSON, ready to upload as load data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowBatch {
    data: Vec<u8>,
    rows: usize,
}

impl RowBatch {
    pub fn from_rows<T: Serialize>(rows: &[T]) -> Result<Self, serde_json::Error> {
        let mut data = Vec::new();
        for row in rows {
            serde_json::to_writer(&mut data, row)?;
            data.push(b'\n');
        }

        Ok(Self {
            data,
            rows: rows.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        std::str::from_utf8(&self.data)
            .unwrap_or_default()
            .lines()
    }
}
