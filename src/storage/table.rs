//! CSV info table
//!
//! The evaluation set is described by a CSV with one row per image. The
//! image identifier column is required; every other column is carried
//! through to the output untouched.

use std::io;
use std::path::Path;

use tracing::debug;

use crate::engine::labels::CompositeLabel;
use crate::error::{CascadeError, Result};

#[derive(Debug, Clone)]
pub struct InfoTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    id_idx: usize,
}

impl InfoTable {
    pub fn read(path: &Path, id_column: &str) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            CascadeError::config(format!("cannot open info file {}: {}", path.display(), e))
        })?;
        let table = Self::from_reader(file, id_column)?;
        debug!("Read {} rows from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn from_reader<R: io::Read>(reader: R, id_column: &str) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();

        let id_idx = headers
            .iter()
            .position(|h| h == id_column)
            .ok_or_else(|| {
                CascadeError::config(format!(
                    "info table has no `{}` column (found: {})",
                    id_column,
                    headers.join(", ")
                ))
            })?;

        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(String::from).collect()))
            .collect::<std::result::Result<Vec<Vec<String>>, csv::Error>>()?;

        Ok(Self {
            headers,
            rows,
            id_idx,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Image identifiers in row order
    pub fn image_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |row| row[self.id_idx].as_str())
    }

    /// Cell value by row and column name
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.headers.iter().position(|h| h == column)?;
        self.rows.get(row).map(|r| r[col].as_str())
    }

    /// Replace or append a label column; `None` leaves the cell empty
    pub fn set_labels(&mut self, column: &str, labels: &[Option<CompositeLabel>]) -> Result<()> {
        if labels.len() != self.rows.len() {
            return Err(CascadeError::config(format!(
                "{} labels for {} rows",
                labels.len(),
                self.rows.len()
            )));
        }

        let col = match self.headers.iter().position(|h| h == column) {
            Some(col) => col,
            None => {
                self.headers.push(column.to_string());
                for row in &mut self.rows {
                    row.push(String::new());
                }
                self.headers.len() - 1
            }
        };

        for (row, label) in self.rows.iter_mut().zip(labels) {
            row[col] = label.map(|l| l.to_string()).unwrap_or_default();
        }
        Ok(())
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.to_writer(io::BufWriter::new(file))
    }

    pub fn to_writer<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}
