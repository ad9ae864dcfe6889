use crate::{Error, Result};

const ERR_EMPTY: &str = "cost matrix has no rows";

/// Dense n x n travel costs, row-major. Entry (i, j) prices the directed
/// arc i -> j; the two directions of a pair may differ. Diagonal entries
/// are stored but never read, since no formulation creates self arcs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CostMatrix {
    n: usize,
    costs: Vec<i64>,
}

impl CostMatrix {
    pub fn from_rows(rows: Vec<Vec<i64>>) -> Result<Self> {
        let n = rows.len();
        if n == 0 {
            return Err(Error::invalid_input(ERR_EMPTY));
        }
        let mut costs = Vec::with_capacity(n * n);
        for (row_index, row) in rows.into_iter().enumerate() {
            if row.len() != n {
                return Err(Error::invalid_input(format!(
                    "cost matrix is not square: row {row_index} has {} entries, expected {n}",
                    row.len()
                )));
            }
            if let Some(value) = row.iter().find(|&&value| value < 0) {
                return Err(Error::invalid_input(format!(
                    "cost matrix row {row_index} contains a negative cost ({value})"
                )));
            }
            costs.extend(row);
        }
        Ok(Self { n, costs })
    }

    /// Number of cities.
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn cost(&self, from: usize, to: usize) -> i64 {
        self.costs[from * self.n + to]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rows_accepts_square_matrix() {
        let matrix = CostMatrix::from_rows(vec![vec![0, 3], vec![5, 0]])
            .expect("square matrix should parse");
        assert_eq!(matrix.n(), 2);
        assert_eq!(matrix.cost(0, 1), 3);
        assert_eq!(matrix.cost(1, 0), 5);
    }

    #[test]
    fn from_rows_rejects_empty() {
        assert!(CostMatrix::from_rows(Vec::new()).is_err());
    }

    #[test]
    fn from_rows_rejects_ragged_rows() {
        let result = CostMatrix::from_rows(vec![vec![0, 1], vec![2]]);
        let message = result.expect_err("ragged matrix should fail").to_string();
        assert!(message.contains("not square"), "unexpected message: {message}");
    }

    #[test]
    fn from_rows_rejects_negative_costs() {
        let result = CostMatrix::from_rows(vec![vec![0, -1], vec![2, 0]]);
        let message = result.expect_err("negative cost should fail").to_string();
        assert!(message.contains("negative"), "unexpected message: {message}");
    }
}
