//! Record Table - raw tabular data as uploaded
//!
//! Cells are kept as strings; no coercion happens here. Extra columns
//! travel with the rows untouched and reappear in prediction output.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RecordTable {
    /// Build a table, rejecting rows whose width differs from the header
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> PipelineResult<Self> {
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != headers.len()) {
            return Err(PipelineError::data_format(format!(
                "row {} has {} fields, expected {}",
                idx + 1,
                row.len(),
                headers.len()
            )));
        }
        Ok(Self { headers, rows })
    }

    /// Parse CSV (first line is the header row)
    pub fn from_csv_reader<R: Read>(reader: R) -> PipelineResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| PipelineError::data_format(format!("unreadable header row: {}", e)))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (idx, record) in csv_reader.records().enumerate() {
            let record = record
                .map_err(|e| PipelineError::data_format(format!("row {}: {}", idx + 1, e)))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Self::new(headers, rows)
    }

    pub fn from_csv_bytes(bytes: &[u8]) -> PipelineResult<Self> {
        Self::from_csv_reader(bytes)
    }

    /// Serialize back to CSV with the header row first
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, csv::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.into_inner().map_err(|e| e.into_error().into())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Iterate over one column's cells
    pub fn column<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a str> + 'a> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| row[idx].as_str()))
    }

    /// Copy of this table with `name` set to `values`.
    ///
    /// An existing column of that name is overwritten in place and any
    /// later duplicates are dropped; otherwise the column is appended.
    pub fn with_column(&self, name: &str, values: Vec<String>) -> PipelineResult<Self> {
        if values.len() != self.rows.len() {
            return Err(PipelineError::Inference(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }

        let target = self.column_index(name);
        let keep: Vec<bool> = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| h != name || Some(i) == target)
            .collect();

        let mut headers = retain_cells(&self.headers, &keep);
        if target.is_none() {
            headers.push(name.to_string());
        }

        let rows = self
            .rows
            .iter()
            .zip(values)
            .map(|(row, value)| {
                let mut row = retain_cells(row, &keep);
                // Only later duplicates are dropped, so the target keeps its index
                match target {
                    Some(idx) => row[idx] = value,
                    None => row.push(value),
                }
                row
            })
            .collect();

        Ok(Self { headers, rows })
    }

    /// Copy of this table keeping rows for which `keep` returns true
    pub fn filter_rows<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&[String]) -> bool,
    {
        Self {
            headers: self.headers.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Stack tables vertically.
    ///
    /// Headers are unioned in first-seen order; cells a source table
    /// lacks are left empty.
    pub fn concat<'a, I>(tables: I) -> Self
    where
        I: IntoIterator<Item = &'a RecordTable>,
    {
        let tables: Vec<&RecordTable> = tables.into_iter().collect();

        let mut headers: Vec<String> = Vec::new();
        for table in &tables {
            for header in &table.headers {
                if !headers.contains(header) {
                    headers.push(header.clone());
                }
            }
        }

        let mut rows = Vec::new();
        for table in &tables {
            let mapping: Vec<Option<usize>> = headers
                .iter()
                .map(|h| table.column_index(h))
                .collect();

            for row in &table.rows {
                rows.push(
                    mapping
                        .iter()
                        .map(|idx| idx.map(|i| row[i].clone()).unwrap_or_default())
                        .collect(),
                );
            }
        }

        Self { headers, rows }
    }
}

fn retain_cells(cells: &[String], keep: &[bool]) -> Vec<String> {
    cells
        .iter()
        .zip(keep)
        .filter(|(_, keep)| **keep)
        .map(|(cell, _)| cell.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RecordTable {
        RecordTable::new(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_csv_keeps_extra_columns() {
        let csv = "Patient ID,Ward,Age\nP1,North,40\nP2,South,51\n";
        let t = RecordTable::from_csv_bytes(csv.as_bytes()).unwrap();

        assert_eq!(t.headers(), &["Patient ID", "Ward", "Age"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.column("Ward").unwrap().collect::<Vec<_>>(), vec!["North", "South"]);
    }

    #[test]
    fn test_ragged_csv_rejected() {
        let csv = "a,b\n1,2\n3\n";
        let err = RecordTable::from_csv_bytes(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, PipelineError::DataFormat { .. }));
    }

    #[test]
    fn test_with_column_appends_last() {
        let t = table(&["a"], &[&["1"], &["2"]]);
        let t = t.with_column("Prediction", vec!["x".into(), "y".into()]).unwrap();

        assert_eq!(t.headers().last().unwrap(), "Prediction");
        assert_eq!(t.rows()[1], vec!["2", "y"]);
    }

    #[test]
    fn test_with_column_overwrites_existing() {
        let t = table(
            &["a", "Prediction", "b", "Prediction"],
            &[&["1", "old", "x", "older"], &["2", "old", "y", "older"]],
        );
        let t = t.with_column("Prediction", vec!["p".into(), "q".into()]).unwrap();

        assert_eq!(t.headers(), &["a", "Prediction", "b"]);
        assert_eq!(t.rows()[0], vec!["1", "p", "x"]);
        assert_eq!(t.rows()[1], vec!["2", "q", "y"]);
    }

    #[test]
    fn test_with_column_length_mismatch() {
        let t = table(&["a"], &[&["1"], &["2"]]);
        assert!(t.with_column("Prediction", vec!["x".into()]).is_err());
    }

    #[test]
    fn test_concat_unions_headers() {
        let a = table(&["id", "label"], &[&["1", "A"]]);
        let b = table(&["id", "ward", "label"], &[&["2", "W", "B"]]);

        let c = RecordTable::concat([&a, &b]);
        assert_eq!(c.headers(), &["id", "label", "ward"]);
        assert_eq!(c.rows()[0], vec!["1", "A", ""]);
        assert_eq!(c.rows()[1], vec!["2", "B", "W"]);
    }

    #[test]
    fn test_csv_output_roundtrips_quoting() {
        let t = table(&["name", "note"], &[&["x", "has, comma"]]);
        let bytes = t.to_csv_bytes().unwrap();
        let back = RecordTable::from_csv_bytes(&bytes).unwrap();
        assert_eq!(back, t);
    }
}
