//! Cross-Source Merger Module
//!
//! Joins normalized source tables on the gene key. Joins are sort-merge
//! joins over the key text, so the merged table is ordered by key and the
//! output does not depend on input row order. Rows whose key is missing
//! never match anything; outer and left joins keep them after the keyed
//! rows.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{CombineError, Result};
use crate::table::{Row, Table};

/// Which unmatched rows a join keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Keep unmatched rows of both sides.
    Outer,
    /// Keep unmatched rows of the left side only.
    Left,
}

fn key_index(table: &Table, on: &str) -> Result<usize> {
    table.column_index(on).ok_or_else(|| CombineError::MissingColumn {
        table: "merge input".to_string(),
        column: on.to_string(),
    })
}

fn key_text(row: &Row, idx: usize) -> Option<String> {
    row.get(idx)?
        .as_ref()
        .map(|v| v.to_string())
        .filter(|k| !k.is_empty())
}

/// Row indices grouped by key (sorted), plus rows without a key.
fn key_groups(table: &Table, idx: usize) -> (BTreeMap<String, Vec<usize>>, Vec<usize>) {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut missing = Vec::new();
    for (i, row) in table.rows().iter().enumerate() {
        match key_text(row, idx) {
            Some(key) => groups.entry(key).or_default().push(i),
            None => missing.push(i),
        }
    }
    (groups, missing)
}

/// Joins two tables on column `on`.
///
/// Output columns are the left columns in order followed by the right
/// non-key columns. Non-key names present on both sides get `suffixes.0`
/// (left) and `suffixes.1` (right) appended.
pub fn join(
    left: &Table,
    right: &Table,
    on: &str,
    kind: JoinKind,
    suffixes: (&str, &str),
) -> Result<Table> {
    let lk = key_index(left, on)?;
    let rk = key_index(right, on)?;

    let left_names: FxHashSet<&str> = left
        .columns()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != lk)
        .map(|(_, c)| c.as_str())
        .collect();
    let right_cols: Vec<usize> = (0..right.columns().len()).filter(|&i| i != rk).collect();
    let right_names: FxHashSet<&str> =
        right_cols.iter().map(|&i| right.columns()[i].as_str()).collect();

    let mut columns: Vec<String> = Vec::with_capacity(left.columns().len() + right_cols.len());
    for (i, c) in left.columns().iter().enumerate() {
        if i != lk && right_names.contains(c.as_str()) {
            columns.push(format!("{}{}", c, suffixes.0));
        } else {
            columns.push(c.clone());
        }
    }
    for &i in &right_cols {
        let c = &right.columns()[i];
        if left_names.contains(c.as_str()) {
            columns.push(format!("{}{}", c, suffixes.1));
        } else {
            columns.push(c.clone());
        }
    }

    let mut seen: FxHashSet<&str> = FxHashSet::default();
    for c in &columns {
        if !seen.insert(c.as_str()) {
            return Err(CombineError::DuplicateColumn(c.clone()));
        }
    }

    let left_width = left.columns().len();
    let emit = |l: Option<&Row>, r: Option<&Row>| -> Row {
        let mut row = Vec::with_capacity(columns.len());
        for i in 0..left_width {
            if i == lk {
                let key = l
                    .and_then(|l| l[lk].clone())
                    .or_else(|| r.and_then(|r| r[rk].clone()));
                row.push(key);
            } else {
                row.push(l.and_then(|l| l[i].clone()));
            }
        }
        for &i in &right_cols {
            row.push(r.and_then(|r| r[i].clone()));
        }
        row
    };

    let (left_groups, left_missing) = key_groups(left, lk);
    let (right_groups, right_missing) = key_groups(right, rk);

    let keys: BTreeSet<&String> = match kind {
        JoinKind::Outer => left_groups.keys().chain(right_groups.keys()).collect(),
        JoinKind::Left => left_groups.keys().collect(),
    };

    let mut out = Table::new(columns.iter().cloned());
    for key in keys {
        let l_rows = left_groups.get(key);
        let r_rows = right_groups.get(key);
        match (l_rows, r_rows) {
            (Some(ls), Some(rs)) => {
                for &li in ls {
                    for &ri in rs {
                        out.push_row(emit(Some(&left.rows()[li]), Some(&right.rows()[ri])));
                    }
                }
            }
            (Some(ls), None) => {
                for &li in ls {
                    out.push_row(emit(Some(&left.rows()[li]), None));
                }
            }
            (None, Some(rs)) => {
                for &ri in rs {
                    out.push_row(emit(None, Some(&right.rows()[ri])));
                }
            }
            (None, None) => {}
        }
    }

    for li in left_missing {
        out.push_row(emit(Some(&left.rows()[li]), None));
    }
    if kind == JoinKind::Outer {
        for ri in right_missing {
            out.push_row(emit(None, Some(&right.rows()[ri])));
        }
    }

    Ok(out)
}

/// Full outer join of labelled tables on `on`.
///
/// Non-key columns present in more than one input are renamed
/// `<column>_<label>` first, so no information is lost. With a single
/// input the table is returned ordered by key.
pub fn combine_tables(tables: &[(&str, &Table)], on: &str) -> Result<Table> {
    if tables.is_empty() {
        return Err(CombineError::NoSourceData);
    }

    let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
    for (_, table) in tables {
        for c in table.columns() {
            if c != on {
                *counts.entry(c.as_str()).or_default() += 1;
            }
        }
    }

    let renamed: Vec<Table> = tables
        .iter()
        .map(|(label, table)| {
            let mut t = (*table).clone();
            for c in table.columns() {
                if c != on && counts.get(c.as_str()).copied().unwrap_or(0) > 1 {
                    t.rename_column(c, &format!("{}_{}", c, label));
                }
            }
            t
        })
        .collect();

    let mut iter = renamed.into_iter();
    let Some(first) = iter.next() else {
        return Err(CombineError::NoSourceData);
    };
    // Joining against an empty keyed table orders a lone input by key.
    let mut merged = join(&first, &Table::new([on]), on, JoinKind::Outer, ("", ""))?;
    for next in iter {
        merged = join(&merged, &next, on, JoinKind::Outer, ("", ""))?;
    }
    Ok(merged)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    fn keyed(label: &str, rows: &[(&str, i64)]) -> Table {
        let mut t = Table::new(["mo", label]);
        for (key, v) in rows {
            t.push_row(vec![Some(Value::text(*key)), Some(Value::Int(*v))]);
        }
        t
    }

    fn keys(t: &Table) -> Vec<String> {
        (0..t.len()).map(|r| t.text(r, "mo").unwrap_or("").to_string()).collect()
    }

    #[test]
    fn test_outer_join_orders_by_key() {
        let a = keyed("a", &[("tem", 0), ("sul", 1)]);
        let b = keyed("b", &[("oxa", 2), ("tem", 1)]);
        let t = join(&a, &b, "mo", JoinKind::Outer, ("_x", "_y")).unwrap();
        assert_eq!(t.columns(), &["mo", "a", "b"]);
        assert_eq!(keys(&t), vec!["oxa", "sul", "tem"]);
        assert_eq!(t.get(0, "a"), None);
        assert_eq!(t.get(2, "a"), Some(&Value::Int(0)));
        assert_eq!(t.get(2, "b"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_left_join_keeps_left_rows_only() {
        let a = keyed("a", &[("tem", 0), ("sul", 1)]);
        let b = keyed("b", &[("oxa", 2), ("tem", 1)]);
        let t = join(&a, &b, "mo", JoinKind::Left, ("_x", "_y")).unwrap();
        assert_eq!(keys(&t), vec!["sul", "tem"]);
        assert_eq!(t.get(0, "b"), None);
    }

    #[test]
    fn test_join_suffixes_collisions() {
        let a = keyed("phenotype", &[("tem", 0)]);
        let b = keyed("phenotype", &[("tem", 5)]);
        let t = join(&a, &b, "mo", JoinKind::Left, ("_o", "")).unwrap();
        assert_eq!(t.columns(), &["mo", "phenotype_o", "phenotype"]);
        assert_eq!(t.get(0, "phenotype"), Some(&Value::Int(5)));

        assert!(matches!(
            join(&a, &b, "mo", JoinKind::Outer, ("", "")),
            Err(CombineError::DuplicateColumn(_))
        ));
    }

    #[test]
    fn test_missing_keys_never_match() {
        let mut a = keyed("a", &[("tem", 0)]);
        a.push_row(vec![None, Some(Value::Int(9))]);
        let mut b = keyed("b", &[("tem", 1)]);
        b.push_row(vec![None, Some(Value::Int(8))]);

        let t = join(&a, &b, "mo", JoinKind::Outer, ("", "")).unwrap();
        assert_eq!(t.len(), 3);
        assert_eq!(t.get(1, "a"), Some(&Value::Int(9)));
        assert_eq!(t.get(1, "b"), None);
        assert_eq!(t.get(2, "b"), Some(&Value::Int(8)));
    }

    #[test]
    fn test_combine_disjoint_sums_rows() {
        let a = keyed("a", &[("tem", 0), ("sul", 1)]);
        let b = keyed("b", &[("oxa", 2)]);
        let c = keyed("c", &[("qnrs", 0), ("aac(3)-ii", 1), ("mph", 2)]);
        let t = combine_tables(&[("A", &a), ("B", &b), ("C", &c)], "mo").unwrap();
        assert_eq!(t.len(), a.len() + b.len() + c.len());
        assert_eq!(t.columns(), &["mo", "a", "b", "c"]);
        assert_eq!(keys(&t), vec!["aac(3)-ii", "mph", "oxa", "qnrs", "sul", "tem"]);
    }

    #[test]
    fn test_combine_empty_tables_union_schema() {
        let a = Table::new(["antibiotic_A", "A", "mo", "tier_A"]);
        let b = Table::new(["antibiotic_B", "B", "mo", "tier_B"]);
        let c = Table::new(["antibiotic_C", "C", "mo", "identity"]);
        let t = combine_tables(&[("A", &a), ("B", &b), ("C", &c)], "mo").unwrap();
        assert!(t.is_empty());
        for col in ["antibiotic_A", "A", "mo", "tier_A", "antibiotic_B", "B", "tier_B", "identity"] {
            assert!(t.has_column(col), "{}", col);
        }
        assert_eq!(t.columns().len(), 10);
    }

    #[test]
    fn test_combine_renames_shared_columns() {
        let mut a = Table::new(["mo", "identity"]);
        a.push_row(vec![Some(Value::text("tem")), Some(Value::Float(100.0))]);
        let mut b = Table::new(["mo", "identity"]);
        b.push_row(vec![Some(Value::text("tem")), Some(Value::Float(99.0))]);
        let t = combine_tables(&[("NCBIAMRFinder", &a), ("ResFinder", &b)], "mo").unwrap();
        assert_eq!(t.columns(), &["mo", "identity_NCBIAMRFinder", "identity_ResFinder"]);
        assert_eq!(t.get(0, "identity_ResFinder"), Some(&Value::Float(99.0)));
    }

    #[test]
    fn test_self_join_keeps_row_count() {
        let a = keyed("a", &[("tem", 0), ("sul", 1)]);
        let b = keyed("b", &[("oxa", 2), ("tem", 1)]);
        let merged = combine_tables(&[("a", &a), ("b", &b)], "mo").unwrap();
        let joined = join(&merged, &merged, "mo", JoinKind::Outer, ("_l", "_r")).unwrap();
        assert_eq!(joined.len(), merged.len());
    }

    #[test]
    fn test_combine_nothing_is_error() {
        assert!(matches!(combine_tables(&[], "mo"), Err(CombineError::NoSourceData)));
    }

    #[test]
    fn test_combine_single_table_sorted() {
        let a = keyed("a", &[("tem", 0), ("oxa", 1)]);
        let t = combine_tables(&[("a", &a)], "mo").unwrap();
        assert_eq!(keys(&t), vec!["oxa", "tem"]);
        assert_eq!(t.columns(), a.columns());
    }
}
