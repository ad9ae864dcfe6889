use std::sync::Arc;

use crate::{
    engine::MipEngine,
    matrix::CostMatrix,
    model::{ArcVars, BuiltModel, FormulationKind},
    separation::SubtourSeparator,
};

/// Degree constraints only. Integral candidates may still decompose
/// into disjoint cycles, so the subtour separator completes feasibility
/// reactively: lazily at integral candidates, and additionally at
/// fractional relaxation nodes when `fractional_cuts` is set.
pub(super) fn build(
    engine: &mut dyn MipEngine,
    matrix: &CostMatrix,
    fractional_cuts: bool,
) -> BuiltModel {
    let vars = Arc::new(ArcVars::complete(engine, matrix.n()));

    super::add_arc_objective(engine, matrix, &vars);
    super::add_degree_constraints(engine, &vars);

    let separator = SubtourSeparator::new(Arc::clone(&vars)).with_fractional_cuts(fractional_cuts);
    BuiltModel {
        kind: FormulationKind::SingleCommodityFlow,
        vars,
        separation: Some(Arc::new(separator)),
    }
}
