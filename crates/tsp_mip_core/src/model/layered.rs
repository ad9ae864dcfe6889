use std::sync::Arc;

use crate::{
    engine::{
        CallbackNode, Cut, LinExpr, MipEngine, Relation, SeparationHandler, SeparationResult,
        VarValues,
    },
    matrix::CostMatrix,
    model::{ArcVars, BuiltModel, DEPOT, FormulationKind},
};

const FLOW_EPSILON: f64 = 1e-6;

/// One binary per (arc, position). A solution is a chain of n arcs at
/// positions 0..n, so disjoint sub-cycles cannot appear and no
/// separation is required for correctness. `layer_cuts` registers the
/// optional relaxation-strengthening separator.
pub(super) fn build(
    engine: &mut dyn MipEngine,
    matrix: &CostMatrix,
    layer_cuts: bool,
) -> BuiltModel {
    let n = matrix.n();
    let vars = Arc::new(ArcVars::layered(engine, n));

    super::add_arc_objective(engine, matrix, &vars);

    // Exactly one arc per position.
    for k in 0..n {
        let mut layer = LinExpr::new();
        for i in 0..n {
            for j in 0..n {
                if let Some(var) = vars.arc_at(i, j, k) {
                    layer.add(var, 1.0);
                }
            }
        }
        engine.add_constraint(layer, Relation::Eq, 1.0, &format!("layer({k})"));
    }

    // Entering j at position k-1 must be matched by leaving j at k.
    for k in 1..n {
        for j in 1..n {
            let mut expr = LinExpr::new();
            for i in 0..n {
                if let Some(var) = vars.arc_at(i, j, k - 1) {
                    expr.add(var, 1.0);
                }
            }
            for l in 0..n {
                if let Some(var) = vars.arc_at(j, l, k) {
                    expr.add(var, -1.0);
                }
            }
            engine.add_constraint(expr, Relation::Eq, 0.0, &format!("continuity({j},{k})"));
        }
    }

    // Each city is left once and entered once across all positions.
    for city in 0..n {
        let mut outgoing = LinExpr::new();
        let mut incoming = LinExpr::new();
        for other in 0..n {
            for k in 0..n {
                if let Some(var) = vars.arc_at(city, other, k) {
                    outgoing.add(var, 1.0);
                }
                if let Some(var) = vars.arc_at(other, city, k) {
                    incoming.add(var, 1.0);
                }
            }
        }
        engine.add_constraint(outgoing, Relation::Eq, 1.0, &format!("city_out({city})"));
        engine.add_constraint(incoming, Relation::Eq, 1.0, &format!("city_in({city})"));
    }

    // Depot endpoints; positions 0 and n-1 admit only these arcs.
    let mut depart = LinExpr::new();
    for j in 1..n {
        if let Some(var) = vars.arc_at(DEPOT, j, 0) {
            depart.add(var, 1.0);
        }
    }
    engine.add_constraint(depart, Relation::Eq, 1.0, "depot_out");
    let mut finish = LinExpr::new();
    for i in 1..n {
        if let Some(var) = vars.arc_at(i, DEPOT, n - 1) {
            finish.add(var, 1.0);
        }
    }
    engine.add_constraint(finish, Relation::Eq, 1.0, "depot_in");

    let separation: Option<Arc<dyn SeparationHandler>> = if layer_cuts {
        Some(Arc::new(LayerFlowSeparator::new(Arc::clone(&vars))))
    } else {
        None
    };

    BuiltModel {
        kind: FormulationKind::TimeIndexedFlow,
        vars,
        separation,
    }
}

/// Relaxation strengthening: fractional mass on x(i,j,k) must be
/// covered by mass leaving j at position k+1 toward cities other than
/// i. Integral chains satisfy this already (the next arc never returns
/// to i), so the separator only answers at relaxation nodes, with the
/// first violated inequality it finds.
pub(crate) struct LayerFlowSeparator {
    vars: Arc<ArcVars>,
}

impl LayerFlowSeparator {
    pub(crate) fn new(vars: Arc<ArcVars>) -> Self {
        Self { vars }
    }

    fn first_violated_cut(&self, values: &dyn VarValues) -> Option<Cut> {
        let n = self.vars.n();
        for (i, j, k, var) in self.vars.iter() {
            // Positions n-2 and n-1 lead into the forced depot return;
            // the covering argument needs k + 1 <= n - 2.
            if k == 0 || k + 2 >= n {
                continue;
            }
            let arc_value = values.value(var);
            if arc_value <= FLOW_EPSILON {
                continue;
            }
            let mut expr = LinExpr::new();
            expr.add(var, 1.0);
            let mut onward_mass = 0.0;
            for l in 0..n {
                if l == i || l == j {
                    continue;
                }
                if let Some(next) = self.vars.arc_at(j, l, k + 1) {
                    expr.add(next, -1.0);
                    onward_mass += values.value(next);
                }
            }
            if arc_value > onward_mass + FLOW_EPSILON {
                log::debug!(
                    "separation: layer-flow violation at arc ({i},{j}) position {k}: \
                     {arc_value:.3} > {onward_mass:.3}"
                );
                return Some(Cut::new(expr, Relation::Le, 0.0));
            }
        }
        None
    }
}

impl SeparationHandler for LayerFlowSeparator {
    fn separate(&self, node: CallbackNode, values: &dyn VarValues) -> SeparationResult {
        if node != CallbackNode::Relaxation {
            return SeparationResult::NoCut;
        }
        match self.first_violated_cut(values) {
            Some(cut) => SeparationResult::Cut(cut),
            None => SeparationResult::NoCut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{SolutionValues, SolveParams, SolveStatus, exhaustive::ExhaustiveEngine};
    use crate::tour::Tour;

    fn scenario() -> CostMatrix {
        CostMatrix::from_rows(vec![
            vec![0, 10, 15, 20],
            vec![10, 0, 35, 25],
            vec![15, 35, 0, 30],
            vec![20, 25, 30, 0],
        ])
        .expect("scenario matrix is square")
    }

    #[test]
    fn solves_four_city_scenario_by_construction() {
        let mut engine = ExhaustiveEngine::new();
        let matrix = scenario();
        let model = build(&mut engine, &matrix, false);
        assert!(model.separation.is_none());
        assert_eq!(model.vars.count(), 18);

        let outcome = engine
            .optimize(&SolveParams::default())
            .expect("solve should succeed");
        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert_eq!(outcome.objective, Some(80.0));

        let values = outcome.solution.expect("optimal must carry values");
        let tour = Tour::decode_layered(&model.vars, &values).expect("assignment must decode");
        assert_eq!(tour.cost(&matrix), 80);
    }

    #[test]
    fn layer_cuts_flag_registers_the_separator() {
        let mut engine = ExhaustiveEngine::new();
        let matrix = scenario();
        let model = build(&mut engine, &matrix, true);
        let handler = model.separation.clone().expect("separator requested");
        engine.set_separation(handler);

        let outcome = engine
            .optimize(&SolveParams::default())
            .expect("solve should succeed");
        assert_eq!(outcome.objective, Some(80.0));
    }

    fn layered_vars(n: usize) -> Arc<ArcVars> {
        let mut engine = ExhaustiveEngine::new();
        Arc::new(ArcVars::layered(&mut engine, n))
    }

    fn values_with(vars: &ArcVars, entries: &[(usize, usize, usize, f64)]) -> SolutionValues {
        let mut values = vec![0.0; vars.count()];
        for &(i, j, k, value) in entries {
            let var = vars.arc_at(i, j, k).expect("slot must exist");
            values[var.index()] = value;
        }
        SolutionValues::new(values)
    }

    #[test]
    fn uncovered_fractional_mass_yields_a_cut() {
        let vars = layered_vars(5);
        let separator = LayerFlowSeparator::new(Arc::clone(&vars));
        let values = values_with(
            &vars,
            &[(1, 2, 1, 0.8), (2, 3, 2, 0.3), (2, 4, 2, 0.4)],
        );

        let SeparationResult::Cut(cut) = separator.separate(CallbackNode::Relaxation, &values)
        else {
            panic!("expected a layer-flow cut");
        };
        assert_eq!(cut.relation, Relation::Le);
        assert_eq!(cut.rhs, 0.0);
        // x(1,2,1) minus its onward arcs; the backtrack slot (2,1,2) is
        // not part of the cover.
        assert_eq!(cut.expr.len(), 3);
        assert!(cut.expr.value(&values) > 0.0);
    }

    #[test]
    fn covered_mass_needs_no_cut() {
        let vars = layered_vars(5);
        let separator = LayerFlowSeparator::new(Arc::clone(&vars));
        let values = values_with(
            &vars,
            &[
                (1, 2, 1, 0.8),
                (2, 3, 2, 0.5),
                (2, 4, 2, 0.4),
                (3, 4, 3, 0.5),
                (4, 1, 3, 0.4),
            ],
        );
        let result = separator.separate(CallbackNode::Relaxation, &values);
        assert!(matches!(result, SeparationResult::NoCut));
    }

    #[test]
    fn integral_candidates_are_left_alone() {
        let vars = layered_vars(5);
        let separator = LayerFlowSeparator::new(Arc::clone(&vars));
        let values = values_with(&vars, &[(1, 2, 1, 0.8)]);
        let result = separator.separate(CallbackNode::IntegralCandidate, &values);
        assert!(matches!(result, SeparationResult::NoCut));
    }

    #[test]
    fn too_few_positions_disable_the_sweep() {
        let vars = layered_vars(3);
        let separator = LayerFlowSeparator::new(Arc::clone(&vars));
        let values = values_with(&vars, &[(1, 2, 1, 0.9)]);
        let result = separator.separate(CallbackNode::Relaxation, &values);
        assert!(matches!(result, SeparationResult::NoCut));
    }
}
