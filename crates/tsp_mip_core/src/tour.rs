use tsp_mip_derive::New;

use crate::{
    Error, Result,
    engine::VarValues,
    matrix::CostMatrix,
    model::{ArcVars, DEPOT},
    separation::{ACTIVATION_THRESHOLD, walk_cycle},
};

/// Visiting order of a complete round trip: n + 1 entries, the depot
/// first and last.
#[derive(Clone, Debug, Eq, New, PartialEq)]
pub struct Tour {
    cities: Vec<usize>,
}

impl Tour {
    /// Reconstruct from an integral assignment over flat (i, j) arc
    /// variables.
    pub fn decode(vars: &ArcVars, values: &dyn VarValues) -> Result<Self> {
        Self::from_walk(vars, values, false)
    }

    /// Reconstruct from a layered assignment. Successor lookups follow
    /// the position index, so excluded slots are never consulted.
    pub fn decode_layered(vars: &ArcVars, values: &dyn VarValues) -> Result<Self> {
        Self::from_walk(vars, values, true)
    }

    fn from_walk(vars: &ArcVars, values: &dyn VarValues, layered: bool) -> Result<Self> {
        let n = vars.n();
        let walk = walk_cycle(n, |step, from| {
            let position = if layered { step } else { 0 };
            (0..n).find(|&to| {
                vars.arc_at(from, to, position)
                    .is_some_and(|var| values.value(var) >= ACTIVATION_THRESHOLD)
            })
        });
        if !walk.is_tour(n) {
            return Err(Error::invalid_data(format!(
                "assignment does not close into a {n}-city tour \
                 (walked {} arcs, closed: {})",
                walk.arc_count(),
                walk.closed
            )));
        }
        let mut cities = walk.order;
        cities.push(DEPOT);
        Ok(Self { cities })
    }

    pub fn cities(&self) -> &[usize] {
        &self.cities
    }

    /// Consecutive (from, to) pairs, depot back to depot.
    pub fn arcs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cities.windows(2).map(|pair| (pair[0], pair[1]))
    }

    pub fn cost(&self, matrix: &CostMatrix) -> i64 {
        self.arcs().map(|(from, to)| matrix.cost(from, to)).sum()
    }
}
