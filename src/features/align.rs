use std::collections::HashMap;

use super::{FeatureMatrix, NumericRow};

/// Project `row` onto `expected` columns: same names, same order, nothing
/// extra. Columns the row lacks are filled with 0.
pub fn align<S: AsRef<str>>(row: &NumericRow, expected: &[S]) -> NumericRow {
    let values = expected
        .iter()
        .map(|col| row.get(col.as_ref()).unwrap_or(0.0))
        .collect();
    NumericRow {
        columns: expected.iter().map(|c| c.as_ref().to_string()).collect(),
        values,
    }
}

/// Column-wise [`align`] over a whole matrix.
pub fn align_matrix<S: AsRef<str>>(matrix: &FeatureMatrix, expected: &[S]) -> FeatureMatrix {
    let index: HashMap<&str, usize> = matrix
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();
    let picks: Vec<Option<usize>> = expected
        .iter()
        .map(|c| index.get(c.as_ref()).copied())
        .collect();

    let rows = matrix
        .rows
        .iter()
        .map(|r| {
            picks
                .iter()
                .map(|p| p.map(|i| r[i]).unwrap_or(0.0))
                .collect()
        })
        .collect();

    FeatureMatrix {
        columns: expected.iter().map(|c| c.as_ref().to_string()).collect(),
        rows,
    }
}
