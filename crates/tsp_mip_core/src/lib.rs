//! Exact TSP solving over asymmetric cost matrices: three
//! integer-programming formulations (sequential ordering, single
//! commodity flow, time-indexed flow), callback-driven subtour
//! separation, and a narrow engine trait with an exhaustive reference
//! engine behind it.

mod engine;
mod error;
mod io;
pub mod logging;
mod matrix;
mod model;
mod report;
mod separation;
mod solver;
mod tour;

pub use engine::{
    CallbackNode, Cut, LinExpr, MipEngine, Relation, SeparationHandler, SeparationResult, Sense,
    SolveOutcome, SolveParams, SolveStats, SolveStatus, SolutionValues, VarId, VarValues,
    exhaustive::ExhaustiveEngine,
};
pub use error::{Error, Result};
pub use io::input::TspInstance;
pub use io::options::{LogFormat, LogLevel, SolverOptions};
pub use matrix::CostMatrix;
pub use model::{ArcVars, BuiltModel, DEPOT, FormulationKind, build_model, layered_slot_allowed};
pub use report::RunReport;
pub use separation::{ACTIVATION_THRESHOLD, CycleWalk, SubtourSeparator, subtour_cut, walk_cycle};
pub use solver::solve_instance;
pub use tour::Tour;
