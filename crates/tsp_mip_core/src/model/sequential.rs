use std::sync::Arc;

use crate::{
    engine::{LinExpr, MipEngine, Relation},
    matrix::CostMatrix,
    model::{ArcVars, BuiltModel, FormulationKind},
};

/// Arc binaries plus one integer ordering potential per non-depot city.
/// The potential rows force values to decrease along every selected arc
/// between non-depot cities, so a cycle that avoids the depot cannot be
/// ranked and the model needs no separation callback.
pub(super) fn build(engine: &mut dyn MipEngine, matrix: &CostMatrix) -> BuiltModel {
    let n = matrix.n();
    let vars = ArcVars::complete(engine, n);

    super::add_arc_objective(engine, matrix, &vars);
    super::add_degree_constraints(engine, &vars);

    // Potentials come after the binaries; engines that branch in
    // creation order settle the arcs first.
    let mut potentials = Vec::with_capacity(n - 1);
    for city in 1..n {
        potentials.push(engine.add_integer_var(0, n as i64, &format!("u({city})")));
    }

    // u(i) - u(j) + (n-1) x(j,i) <= n-2 for ordered non-depot pairs:
    // selecting arc j -> i forces u(i) <= u(j) - 1.
    for i in 1..n {
        for j in 1..n {
            if i == j {
                continue;
            }
            let Some(arc) = vars.arc(j, i) else {
                continue;
            };
            let mut expr = LinExpr::with_capacity(3);
            expr.add(potentials[i - 1], 1.0)
                .add(potentials[j - 1], -1.0)
                .add(arc, (n - 1) as f64);
            engine.add_constraint(expr, Relation::Le, (n - 2) as f64, &format!("order({j},{i})"));
        }
    }

    BuiltModel {
        kind: FormulationKind::Sequential,
        vars: Arc::new(vars),
        separation: None,
    }
}
