//! Named-Column Table Module
//!
//! Every stage of the reconciliation engine exchanges data as a [`Table`]:
//! an ordered list of column names plus rows of optional cells. A missing
//! cell (`None`) plays the role of NaN in the tool reports and is kept
//! distinct from an empty string only where a reader produced one.
//!
//! Column order is significant: views and merges preserve the order of
//! their inputs so that written reports are stable between runs.

use std::fmt;
use std::io::Write;

use crate::error::Result;

// ============================================================================
// Cell Values
// ============================================================================

/// A single table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Float(f64),
    Int(i64),
    Bool(bool),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the cell. Text cells are parsed, so raw report
    /// columns such as `"99.5"` read as numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Bool(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Float(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
        }
    }
}

/// One table row; cells line up with [`Table::columns`].
pub type Row = Vec<Option<Value>>;

// ============================================================================
// Table
// ============================================================================

/// Tabular data with named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Creates an empty table with the given schema.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Appends a row, padding or truncating it to the schema width.
    pub fn push_row(&mut self, mut row: Row) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    /// Appends a column filled with missing values and returns its index.
    /// An existing column of the same name is reused.
    pub fn add_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(None);
        }
        self.columns.len() - 1
    }

    pub fn drop_column(&mut self, name: &str) {
        if let Some(idx) = self.column_index(name) {
            self.columns.remove(idx);
            for row in &mut self.rows {
                row.remove(idx);
            }
        }
    }

    pub fn rename_column(&mut self, from: &str, to: &str) {
        if let Some(idx) = self.column_index(from) {
            self.columns[idx] = to.to_string();
        }
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_ref()
    }

    /// Text of a cell, `None` when missing, non-text or blank.
    pub fn text(&self, row: usize, column: &str) -> Option<&str> {
        self.get(row, column)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn set(&mut self, row: usize, column: &str, value: Option<Value>) {
        let idx = self.add_column(column);
        if let Some(r) = self.rows.get_mut(row) {
            r[idx] = value;
        }
    }

    /// Projects the table onto `columns`; unknown names become empty columns.
    pub fn select(&self, columns: &[&str]) -> Table {
        let indices: Vec<Option<usize>> = columns.iter().map(|c| self.column_index(c)).collect();
        let mut out = Table::new(columns.iter().copied());
        for row in &self.rows {
            out.rows.push(
                indices
                    .iter()
                    .map(|idx| idx.and_then(|i| row[i].clone()))
                    .collect(),
            );
        }
        out
    }

    /// Writes the table as delimited text with every field quoted.
    pub fn write_delimited<W: Write>(&self, writer: W, delimiter: u8) -> Result<()> {
        let mut out = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .quote_style(csv::QuoteStyle::Always)
            .from_writer(writer);

        out.write_record(&self.columns)?;
        for row in &self.rows {
            out.write_record(row.iter().map(|cell| match cell {
                Some(v) => v.to_string(),
                None => String::new(),
            }))?;
        }
        out.flush()?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut t = Table::new(["mo", "tier_ResFinder"]);
        t.push_row(vec![Some(Value::text("tem")), Some(Value::Int(0))]);
        t.push_row(vec![Some(Value::text("sul")), None]);
        t
    }

    #[test]
    fn test_push_row_pads_to_schema() {
        let mut t = Table::new(["a", "b", "c"]);
        t.push_row(vec![Some(Value::Int(1))]);
        assert_eq!(t.rows()[0].len(), 3);
        assert!(t.get(0, "c").is_none());
    }

    #[test]
    fn test_text_skips_blank_cells() {
        let mut t = Table::new(["a"]);
        t.push_row(vec![Some(Value::text("  "))]);
        assert_eq!(t.text(0, "a"), None);
    }

    #[test]
    fn test_value_numeric_parsing() {
        assert_eq!(Value::text("99.5").as_f64(), Some(99.5));
        assert_eq!(Value::Int(2).as_f64(), Some(2.0));
        assert_eq!(Value::text("n/a").as_f64(), None);
    }

    #[test]
    fn test_select_unknown_column_is_empty() {
        let t = sample().select(&["mo", "Class"]);
        assert_eq!(t.columns(), &["mo".to_string(), "Class".to_string()]);
        assert!(t.get(0, "Class").is_none());
        assert_eq!(t.text(1, "mo"), Some("sul"));
    }

    #[test]
    fn test_drop_and_rename_column() {
        let mut t = sample();
        t.rename_column("tier_ResFinder", "ResFinder");
        t.drop_column("mo");
        assert_eq!(t.columns(), &["ResFinder".to_string()]);
        assert_eq!(t.get(0, "ResFinder"), Some(&Value::Int(0)));
    }

    #[test]
    fn test_write_delimited_quotes_everything() {
        let mut buf = Vec::new();
        sample().write_delimited(&mut buf, b';').unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "\"mo\";\"tier_ResFinder\"");
        assert_eq!(lines[1], "\"tem\";\"0\"");
        assert_eq!(lines[2], "\"sul\";\"\"");
    }

    #[test]
    fn test_bool_display() {
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Bool(false).to_string(), "False");
    }
}
