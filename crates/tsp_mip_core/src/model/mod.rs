use std::sync::Arc;

use tsp_mip_derive::CliValue;

use crate::{
    Error, Result,
    engine::{LinExpr, MipEngine, Relation, SeparationHandler, Sense},
    io::options::SolverOptions,
    matrix::CostMatrix,
};

mod flow;
mod layered;
mod sequential;
mod vars;

pub use vars::{ArcVars, DEPOT, layered_slot_allowed};

pub(crate) const MIN_CITIES: usize = 2;

const ERR_TOO_FEW_CITIES: &str = "need at least 2 cities (the depot plus one)";

/// TSP encoding handed to the engine.
#[derive(Clone, Copy, Debug, Eq, PartialEq, CliValue)]
#[cli_value(option = "formulation")]
pub enum FormulationKind {
    /// MTZ-style ordering potentials; subtour-free without callbacks.
    #[cli(alias = "mtz")]
    Sequential,
    /// Degree constraints plus reactive subtour separation.
    #[cli(alias = "flow")]
    SingleCommodityFlow,
    /// Arc-at-position binaries; subtour-free by construction.
    #[cli(alias = "layered")]
    TimeIndexedFlow,
}

/// What a formulation leaves behind after registering itself with the
/// engine: the variable arena for decoding and the separation policy to
/// attach, if any.
pub struct BuiltModel {
    pub kind: FormulationKind,
    pub vars: Arc<ArcVars>,
    pub separation: Option<Arc<dyn SeparationHandler>>,
}

/// Translate the cost matrix into variables, objective, and constraints
/// under the formulation the options select.
pub fn build_model(
    engine: &mut dyn MipEngine,
    matrix: &CostMatrix,
    options: &SolverOptions,
) -> Result<BuiltModel> {
    if matrix.n() < MIN_CITIES {
        return Err(Error::invalid_model(ERR_TOO_FEW_CITIES));
    }
    let model = match options.formulation {
        FormulationKind::Sequential => sequential::build(engine, matrix),
        FormulationKind::SingleCommodityFlow => {
            flow::build(engine, matrix, options.fractional_cuts)
        }
        FormulationKind::TimeIndexedFlow => layered::build(engine, matrix, options.layered_cuts),
    };
    log::debug!(
        "model: built formulation={} n={} vars={}",
        model.kind,
        matrix.n(),
        model.vars.count()
    );
    Ok(model)
}

/// Minimize total travel cost over every existing arc variable.
fn add_arc_objective(engine: &mut dyn MipEngine, matrix: &CostMatrix, vars: &ArcVars) {
    let mut objective = LinExpr::with_capacity(vars.count());
    for (from, to, _, var) in vars.iter() {
        objective.add(var, matrix.cost(from, to) as f64);
    }
    engine.set_objective(objective, Sense::Minimize);
}

/// Each city is left exactly once and entered exactly once.
fn add_degree_constraints(engine: &mut dyn MipEngine, vars: &ArcVars) {
    let n = vars.n();
    for city in 0..n {
        let mut outgoing = LinExpr::with_capacity(n - 1);
        let mut incoming = LinExpr::with_capacity(n - 1);
        for other in 0..n {
            if let Some(var) = vars.arc(city, other) {
                outgoing.add(var, 1.0);
            }
            if let Some(var) = vars.arc(other, city) {
                incoming.add(var, 1.0);
            }
        }
        engine.add_constraint(outgoing, Relation::Eq, 1.0, &format!("degree_out({city})"));
        engine.add_constraint(incoming, Relation::Eq, 1.0, &format!("degree_in({city})"));
    }
}
