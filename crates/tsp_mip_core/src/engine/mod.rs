use std::{fmt, sync::Arc, time::Duration};

use tsp_mip_derive::New;

use crate::Result;

pub mod exhaustive;

/// Handle to a variable registered with a [`MipEngine`]. Indices are
/// dense and follow creation order.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct VarId(pub(crate) usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Linear expression as (variable, coefficient) terms. Constant parts
/// always live on the constraint right-hand side.
#[derive(Clone, Debug, Default)]
pub struct LinExpr {
    terms: Vec<(VarId, f64)>,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            terms: Vec::with_capacity(capacity),
        }
    }

    pub fn add(&mut self, var: VarId, coeff: f64) -> &mut Self {
        self.terms.push((var, coeff));
        self
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluate against a variable assignment.
    pub fn value(&self, values: &dyn VarValues) -> f64 {
        self.terms
            .iter()
            .map(|&(var, coeff)| coeff * values.value(var))
            .sum()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Relation {
    Le,
    Eq,
    Ge,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Le => "<=",
            Self::Eq => "=",
            Self::Ge => ">=",
        };
        write!(f, "{symbol}")
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Sense {
    Minimize,
    Maximize,
}

/// A violated inequality produced by separation: `expr relation rhs`.
#[derive(Clone, Debug, New)]
pub struct Cut {
    pub expr: LinExpr,
    pub relation: Relation,
    pub rhs: f64,
}

/// Read access to a variable assignment, either a callback snapshot or
/// a final solution.
pub trait VarValues {
    fn value(&self, var: VarId) -> f64;
}

/// Dense assignment indexed by [`VarId`].
#[derive(Clone, Debug, New)]
pub struct SolutionValues {
    values: Vec<f64>,
}

impl VarValues for SolutionValues {
    fn value(&self, var: VarId) -> f64 {
        self.values[var.0]
    }
}

/// Where in the search a separation callback fired.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallbackNode {
    /// Fractional relaxation values; cuts become cutting planes.
    Relaxation,
    /// Integral candidate solution; cuts become lazy constraints.
    IntegralCandidate,
}

#[derive(Clone, Debug)]
pub enum SeparationResult {
    NoCut,
    Cut(Cut),
}

/// Inspects candidate assignments during the search and answers with at
/// most one violated inequality per invocation.
pub trait SeparationHandler: Send + Sync {
    fn separate(&self, node: CallbackNode, values: &dyn VarValues) -> SeparationResult;
}

#[derive(Clone, Copy, Debug)]
pub struct SolveParams {
    /// Wall-clock budget; `None` runs to completion.
    pub time_limit: Option<Duration>,
    /// Worker threads the engine may use. 1 keeps the search strictly
    /// sequential and deterministic.
    pub threads: usize,
}

impl Default for SolveParams {
    fn default() -> Self {
        Self {
            time_limit: None,
            threads: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SolveStatus {
    Optimal,
    TimeLimitFeasible,
    TimeLimitNoFeasible,
    Infeasible,
    EngineFailure,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Optimal => "optimal",
            Self::TimeLimitFeasible => "time-limit-feasible",
            Self::TimeLimitNoFeasible => "time-limit-no-feasible",
            Self::Infeasible => "infeasible",
            Self::EngineFailure => "engine-failure",
        };
        write!(f, "{tag}")
    }
}

/// Search counters reported alongside the outcome.
#[derive(Clone, Copy, Debug, Default)]
pub struct SolveStats {
    pub nodes_explored: u64,
    pub lazy_cuts: usize,
    pub cutting_planes: usize,
}

#[derive(Clone, Debug)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    /// Best objective value found, if any assignment was accepted.
    pub objective: Option<f64>,
    /// Assignment behind `objective`. Kept even on a time limit so the
    /// incumbent can still be decoded and reported.
    pub solution: Option<SolutionValues>,
    pub stats: SolveStats,
}

/// The narrow surface the formulations need from a MIP engine. One
/// engine instance carries one model; create a fresh engine per solve.
pub trait MipEngine {
    fn add_binary_var(&mut self, name: &str) -> VarId;
    fn add_integer_var(&mut self, lower: i64, upper: i64, name: &str) -> VarId;
    fn set_objective(&mut self, expr: LinExpr, sense: Sense);
    fn add_constraint(&mut self, expr: LinExpr, relation: Relation, rhs: f64, name: &str);
    /// Register a globally valid inequality discovered outside the row
    /// set; it stays enforced for the rest of the solve.
    fn add_lazy_constraint(&mut self, cut: Cut);
    /// Register a strengthening inequality found at a relaxation node.
    fn add_cutting_plane(&mut self, cut: Cut);
    fn set_separation(&mut self, handler: Arc<dyn SeparationHandler>);
    fn optimize(&mut self, params: &SolveParams) -> Result<SolveOutcome>;
}
