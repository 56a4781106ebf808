//! Labeled binary symptom dataset and its CSV form.

use crate::error::DiagnoError;
use crate::knowledge::SymptomKey;
use crate::persistence::atomic_write;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// Name of the label column; always the last column of the CSV form.
pub const LABEL_COLUMN: &str = "disease";

/// Leading CSV line listing the columns that already received injection.
const INJECTED_MARKER: &str = "# injected:";

/// One synthetic patient: a 0/1 value per column plus its disease label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRow {
    pub values: Vec<u8>,
    pub label: String,
}

/// Column-oriented view of a labeled dataset.
///
/// Column order is the order columns were added; the training schema sorts
/// them independently, so this order never leaks into feature encoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<SymptomKey>,
    index: HashMap<SymptomKey, usize>,
    rows: Vec<DatasetRow>,
    injected: BTreeSet<SymptomKey>,
}

impl Dataset {
    /// Create an empty dataset over `columns`.
    pub fn new(columns: Vec<SymptomKey>) -> Result<Self, DiagnoError> {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, col) in columns.iter().enumerate() {
            if col == LABEL_COLUMN {
                return Err(DiagnoError::dataset(format!(
                    "'{LABEL_COLUMN}' is reserved for the label column"
                )));
            }
            if index.insert(col.clone(), i).is_some() {
                return Err(DiagnoError::dataset(format!("duplicate column '{col}'")));
            }
        }
        Ok(Self {
            columns,
            index,
            rows: Vec::new(),
            injected: BTreeSet::new(),
        })
    }

    pub fn columns(&self) -> &[SymptomKey] {
        &self.columns
    }

    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Keys that already received extended-symptom injection.
    pub fn injected_columns(&self) -> &BTreeSet<SymptomKey> {
        &self.injected
    }

    pub(crate) fn mark_injected(&mut self, keys: impl IntoIterator<Item = SymptomKey>) {
        self.injected.extend(keys);
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [DatasetRow] {
        &mut self.rows
    }

    /// Append a zero-filled column, returning its index. Existing columns are
    /// returned unchanged.
    pub fn add_column(&mut self, key: &str) -> usize {
        if let Some(idx) = self.column_index(key) {
            return idx;
        }
        let idx = self.columns.len();
        self.columns.push(key.to_string());
        self.index.insert(key.to_string(), idx);
        for row in &mut self.rows {
            row.values.push(0);
        }
        idx
    }

    /// Append a row with the given columns set to 1.
    pub fn push_row<S: AsRef<str>>(&mut self, label: &str, active: &[S]) -> Result<(), DiagnoError> {
        let mut values = vec![0u8; self.columns.len()];
        for key in active {
            let key = key.as_ref();
            let idx = self
                .column_index(key)
                .ok_or_else(|| DiagnoError::dataset(format!("unknown column '{key}'")))?;
            values[idx] = 1;
        }
        self.rows.push(DatasetRow {
            values,
            label: label.to_string(),
        });
        Ok(())
    }

    /// Value of `key` in row `row`, if both exist.
    pub fn value(&self, row: usize, key: &str) -> Option<u8> {
        let idx = self.column_index(key)?;
        self.rows.get(row).map(|r| r.values[idx])
    }

    /// Keys set to 1 in row `row`.
    pub fn active_columns(&self, row: usize) -> Vec<&str> {
        self.rows
            .get(row)
            .map(|r| {
                r.values
                    .iter()
                    .zip(&self.columns)
                    .filter(|(v, _)| **v == 1)
                    .map(|(_, c)| c.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Row count per label.
    pub fn class_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row.label.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Render as CSV: symptom columns, then `disease`.
    ///
    /// An augmented dataset starts with a `# injected:` line naming the
    /// injected columns, so a reloaded dataset refuses the same table again.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        if !self.injected.is_empty() {
            out.push_str(INJECTED_MARKER);
            out.push(' ');
            let keys: Vec<&str> = self.injected.iter().map(String::as_str).collect();
            out.push_str(&keys.join(","));
            out.push('\n');
        }
        for col in &self.columns {
            out.push_str(col);
            out.push(',');
        }
        out.push_str(LABEL_COLUMN);
        out.push('\n');
        for row in &self.rows {
            for v in &row.values {
                out.push(if *v == 1 { '1' } else { '0' });
                out.push(',');
            }
            out.push_str(&quote_field(&row.label));
            out.push('\n');
        }
        out
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), DiagnoError> {
        atomic_write(path, self.to_csv().as_bytes())
    }

    /// Parse the CSV form. The label column may appear anywhere in the header.
    pub fn from_csv(content: &str) -> Result<Self, DiagnoError> {
        let mut lines = content.lines().peekable();
        let injected: Option<Vec<SymptomKey>> = lines
            .peek()
            .and_then(|first| first.strip_prefix(INJECTED_MARKER))
            .map(|rest| {
                rest.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect()
            });
        if injected.is_some() {
            lines.next();
        }
        // 1-based line number of the first data row
        let first_row_line = if injected.is_some() { 3 } else { 2 };
        let injected = injected.unwrap_or_default();
        let header: Vec<String> = lines
            .next()
            .ok_or_else(|| DiagnoError::dataset("Empty CSV file"))?
            .split(',')
            .map(|s| s.trim().trim_matches('"').to_string())
            .collect();
        let label_pos = header
            .iter()
            .position(|c| c == LABEL_COLUMN)
            .ok_or_else(|| DiagnoError::dataset(format!("missing '{LABEL_COLUMN}' column")))?;

        let columns: Vec<SymptomKey> = header
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != label_pos)
            .map(|(_, c)| c.clone())
            .collect();
        let mut dataset = Self::new(columns)?;
        if let Some(missing) = injected.iter().find(|k| dataset.column_index(k).is_none()) {
            return Err(DiagnoError::dataset(format!(
                "injected column '{missing}' is not in the header"
            )));
        }
        dataset.injected.extend(injected);

        for (line_no, line) in lines.enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let fields = split_csv_line(line);
            if fields.len() != header.len() {
                return Err(DiagnoError::dataset(format!(
                    "line {}: expected {} fields, found {}",
                    line_no + first_row_line,
                    header.len(),
                    fields.len()
                )));
            }
            let mut values = Vec::with_capacity(header.len() - 1);
            let mut label = String::new();
            for (i, field) in fields.into_iter().enumerate() {
                if i == label_pos {
                    label = field;
                    continue;
                }
                match field.trim() {
                    "0" => values.push(0),
                    "1" => values.push(1),
                    other => {
                        return Err(DiagnoError::dataset(format!(
                            "line {}: non-binary value '{other}' in column '{}'",
                            line_no + first_row_line,
                            header[i]
                        )));
                    }
                }
            }
            dataset.rows.push(DatasetRow { values, label });
        }
        Ok(dataset)
    }

    pub fn read_csv(path: &Path) -> Result<Self, DiagnoError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_csv(&content)
    }
}

fn quote_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}
