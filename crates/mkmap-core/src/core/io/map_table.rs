use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Row {row} has {found} {what} values, expected {expected}")]
    RowShape {
        row: usize,
        what: String,
        expected: usize,
        found: usize,
    },
}

/// A block of columns sharing a prefix, written as `prefix[label]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnGroup {
    pub prefix: String,
    pub labels: Vec<String>,
}

impl ColumnGroup {
    pub fn new<S: Into<String>>(prefix: &str, labels: impl IntoIterator<Item = S>) -> Self {
        Self {
            prefix: prefix.to_string(),
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }
}

/// One grid point of a finished map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapRow {
    pub coordinates: Vec<f64>,
    /// `converged`, `unconverged`, or `failed`.
    pub status: &'static str,
    pub method: Option<&'static str>,
    pub iterations: Option<usize>,
    pub residual_norm: Option<String>,
    /// Rendered cells, one list per column group of the table. A row without
    /// solution leaves this empty; an empty list blanks its group.
    pub values: Vec<Vec<String>>,
}

/// Full-grid table of a map, ready for CSV export.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapTable {
    pub descriptor_names: Vec<String>,
    pub groups: Vec<ColumnGroup>,
    pub rows: Vec<MapRow>,
}

impl MapTable {
    pub fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = self.descriptor_names.clone();
        header.extend(
            ["status", "method", "iterations", "residual_norm"]
                .iter()
                .map(|s| s.to_string()),
        );
        for group in &self.groups {
            header.extend(
                group
                    .labels
                    .iter()
                    .map(|label| format!("{}[{}]", group.prefix, label)),
            );
        }
        header
    }

    fn record(&self, idx: usize, row: &MapRow) -> Result<Vec<String>, ExportError> {
        let shape = |what: &str, expected: usize, found: usize| ExportError::RowShape {
            row: idx,
            what: what.to_string(),
            expected,
            found,
        };
        if row.coordinates.len() != self.descriptor_names.len() {
            return Err(shape("descriptor", self.descriptor_names.len(), row.coordinates.len()));
        }
        if !row.values.is_empty() && row.values.len() != self.groups.len() {
            return Err(shape("column group", self.groups.len(), row.values.len()));
        }

        let mut record: Vec<String> = row.coordinates.iter().map(|x| x.to_string()).collect();
        record.push(row.status.to_string());
        record.push(row.method.unwrap_or_default().to_string());
        record.push(row.iterations.map(|n| n.to_string()).unwrap_or_default());
        record.push(row.residual_norm.clone().unwrap_or_default());
        for (group_idx, group) in self.groups.iter().enumerate() {
            let expected = group.labels.len();
            match row.values.get(group_idx) {
                Some(values) if values.len() == expected => record.extend(values.iter().cloned()),
                Some(values) if !values.is_empty() => {
                    return Err(shape(&group.prefix, expected, values.len()));
                }
                _ => record.extend(std::iter::repeat_n(String::new(), expected)),
            }
        }
        Ok(record)
    }

    pub fn write_csv<W: Write>(&self, writer: W, origin: &str) -> Result<(), ExportError> {
        let csv_error = |source| ExportError::Csv {
            path: origin.to_string(),
            source,
        };
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(self.header()).map_err(csv_error)?;
        for (idx, row) in self.rows.iter().enumerate() {
            writer.write_record(self.record(idx, row)?).map_err(csv_error)?;
        }
        writer
            .flush()
            .map_err(|e| csv_error(csv::Error::from(e)))
    }

    pub fn save(&self, path: &Path) -> Result<(), ExportError> {
        let origin = path.to_string_lossy().to_string();
        let file = std::fs::File::create(path).map_err(|e| ExportError::Csv {
            path: origin.clone(),
            source: csv::Error::from(e),
        })?;
        self.write_csv(std::io::BufWriter::new(file), &origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn table() -> MapTable {
        MapTable {
            descriptor_names: vec!["O".into(), "CO".into()],
            groups: vec![
                ColumnGroup::new("theta", ["CO*"]),
                ColumnGroup::new("tof", ["CO2_g"]),
            ],
            rows: vec![
                MapRow {
                    coordinates: vec![0.5, -1.0],
                    status: "converged",
                    method: Some("direct"),
                    iterations: Some(4),
                    residual_norm: Some("1e-60".into()),
                    values: vec![vec!["2.5e-1".into()], vec!["2e0".into()]],
                },
                MapRow {
                    coordinates: vec![1.0, -1.0],
                    status: "failed",
                    method: None,
                    iterations: None,
                    residual_norm: None,
                    values: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn header_names_every_column() {
        assert_eq!(
            table().header(),
            vec![
                "O",
                "CO",
                "status",
                "method",
                "iterations",
                "residual_norm",
                "theta[CO*]",
                "tof[CO2_g]"
            ]
        );
    }

    #[test]
    fn write_csv_pads_rows_without_solution() {
        let mut buffer = Vec::new();
        table().write_csv(&mut buffer, "memory").unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "0.5,-1,converged,direct,4,1e-60,2.5e-1,2e0");
        assert_eq!(lines[2], "1,-1,failed,,,,,");
    }

    #[test]
    fn empty_group_is_written_blank() {
        let mut partial = table();
        partial.rows[0].values[1].clear();
        let mut buffer = Vec::new();
        partial.write_csv(&mut buffer, "memory").unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().nth(1).unwrap(), "0.5,-1,converged,direct,4,1e-60,2.5e-1,");
    }

    #[test]
    fn mismatched_row_is_rejected() {
        let mut bad = table();
        bad.rows[0].values[0].push("0.1".into());
        let err = bad.write_csv(Vec::new(), "memory").unwrap_err();
        assert!(matches!(err, ExportError::RowShape { row: 0, expected: 1, found: 2, .. }));

        let mut missing = table();
        missing.rows[0].values.pop();
        let err = missing.write_csv(Vec::new(), "memory").unwrap_err();
        assert!(matches!(err, ExportError::RowShape { row: 0, expected: 2, found: 1, .. }));
    }

    #[test]
    fn save_writes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.csv");
        table().save(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("O,CO,status"));
    }
}
