use std::{
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use rayon::prelude::*;

use crate::{
    Error, Result,
    engine::{
        CallbackNode, Cut, LinExpr, MipEngine, Relation, SeparationHandler, SeparationResult,
        Sense, SolveOutcome, SolveParams, SolveStats, SolveStatus, SolutionValues, VarId,
        VarValues,
    },
};

const FEASIBILITY_EPSILON: f64 = 1e-6;
const DEADLINE_CHECK_INTERVAL: u64 = 128;

const ERR_NO_VARIABLES: &str = "model has no variables";
const ERR_NO_OBJECTIVE: &str = "objective was never set";

#[derive(Clone, Copy, Debug)]
struct VarSpec {
    lower: i64,
    upper: i64,
}

#[derive(Clone, Debug)]
struct Row {
    expr: LinExpr,
    relation: Relation,
    rhs: f64,
}

/// One variable's contribution to one row, precomputed so fixing a
/// value updates the row state in O(1).
#[derive(Clone, Copy, Debug)]
struct Term {
    row: usize,
    coeff: f64,
    bound_min: f64,
    bound_max: f64,
}

/// Running view of a row: activity over fixed variables plus the
/// extreme contributions still reachable from the unfixed ones.
#[derive(Clone, Copy, Debug)]
struct RowState {
    activity: f64,
    unfixed_min: f64,
    unfixed_max: f64,
}

struct Incumbent {
    objective: f64,
    values: Vec<i64>,
}

/// Exact reference engine: depth-first enumeration over the integer
/// domains in creation order, pruned by running row-activity bounds and
/// the incumbent objective. Separation runs at every integral leaf and
/// accepted cuts join a permanent pool, so formulations that rely on
/// lazy constraints solve to true optimality.
///
/// Sized for the small instances the test suite uses; large solves
/// belong to an industrial engine behind the same trait.
#[derive(Default)]
pub struct ExhaustiveEngine {
    vars: Vec<VarSpec>,
    rows: Vec<Row>,
    objective: Option<(LinExpr, Sense)>,
    seeded_cuts: Vec<Cut>,
    separation: Option<Arc<dyn SeparationHandler>>,
}

impl ExhaustiveEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MipEngine for ExhaustiveEngine {
    fn add_binary_var(&mut self, name: &str) -> VarId {
        self.add_integer_var(0, 1, name)
    }

    fn add_integer_var(&mut self, lower: i64, upper: i64, _name: &str) -> VarId {
        let id = VarId(self.vars.len());
        self.vars.push(VarSpec { lower, upper });
        id
    }

    fn set_objective(&mut self, expr: LinExpr, sense: Sense) {
        self.objective = Some((expr, sense));
    }

    fn add_constraint(&mut self, expr: LinExpr, relation: Relation, rhs: f64, _name: &str) {
        self.rows.push(Row {
            expr,
            relation,
            rhs,
        });
    }

    fn add_lazy_constraint(&mut self, cut: Cut) {
        self.seeded_cuts.push(cut);
    }

    // Planes join the same permanent pool as lazy constraints. The cut
    // families produced in this crate are globally valid, so enforcing
    // them everywhere keeps the search exact.
    fn add_cutting_plane(&mut self, cut: Cut) {
        self.seeded_cuts.push(cut);
    }

    fn set_separation(&mut self, handler: Arc<dyn SeparationHandler>) {
        self.separation = Some(handler);
    }

    fn optimize(&mut self, params: &SolveParams) -> Result<SolveOutcome> {
        if self.vars.is_empty() {
            return Err(Error::engine(ERR_NO_VARIABLES));
        }
        let Some((objective, sense)) = self.objective.as_ref() else {
            return Err(Error::engine(ERR_NO_OBJECTIVE));
        };
        let sense = *sense;

        for row in &self.rows {
            if row.expr.is_empty() && violated(0.0, row.relation, row.rhs) {
                return Ok(outcome(SolveStatus::Infeasible, None, SolveStats::default()));
            }
        }

        let prepared = Prepared::build(&self.vars, &self.rows, objective);
        let deadline = params.time_limit.map(saturating_deadline);
        let shared = Shared {
            prepared: &prepared,
            sense,
            separation: self.separation.as_deref(),
            deadline,
            stopped: AtomicBool::new(false),
            incumbent: Mutex::new(None),
            pool: Mutex::new(self.seeded_cuts.clone()),
            nodes: AtomicU64::new(0),
            lazy_added: AtomicUsize::new(0),
        };

        if let Some(deadline) = shared.deadline
            && Instant::now() >= deadline
        {
            return Ok(outcome(
                SolveStatus::TimeLimitNoFeasible,
                None,
                SolveStats::default(),
            ));
        }

        let threads = params.threads.max(1);
        if threads == 1 {
            Worker::new(&shared).search_from(0);
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| Error::engine(format!("worker pool setup failed: {e}")))?;
            let root = self.vars[0];
            pool.install(|| {
                (root.lower..=root.upper)
                    .collect::<Vec<i64>>()
                    .into_par_iter()
                    .for_each(|value| Worker::new(&shared).run_root(value));
            });
        }

        let stats = SolveStats {
            nodes_explored: shared.nodes.load(Ordering::Relaxed),
            lazy_cuts: shared.lazy_added.load(Ordering::Relaxed),
            cutting_planes: 0,
        };
        let stopped = shared.stopped.load(Ordering::Relaxed);
        let incumbent = lock(&shared.incumbent).take();
        log::debug!(
            "engine: search done nodes={} lazy_cuts={} stopped={stopped}",
            stats.nodes_explored,
            stats.lazy_cuts
        );

        let status = match (stopped, incumbent.is_some()) {
            (false, true) => SolveStatus::Optimal,
            (true, true) => SolveStatus::TimeLimitFeasible,
            (false, false) => SolveStatus::Infeasible,
            (true, false) => SolveStatus::TimeLimitNoFeasible,
        };
        Ok(outcome(status, incumbent, stats))
    }
}

fn outcome(status: SolveStatus, incumbent: Option<Incumbent>, stats: SolveStats) -> SolveOutcome {
    let (objective, solution) = match incumbent {
        Some(incumbent) => (
            Some(incumbent.objective),
            Some(SolutionValues::new(
                incumbent.values.iter().map(|&v| v as f64).collect(),
            )),
        ),
        None => (None, None),
    };
    SolveOutcome {
        status,
        objective,
        solution,
        stats,
    }
}

fn saturating_deadline(limit: Duration) -> Instant {
    Instant::now()
        .checked_add(limit)
        .unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400 * 365))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn violated(lhs: f64, relation: Relation, rhs: f64) -> bool {
    match relation {
        Relation::Le => lhs > rhs + FEASIBILITY_EPSILON,
        Relation::Ge => lhs < rhs - FEASIBILITY_EPSILON,
        Relation::Eq => (lhs - rhs).abs() > FEASIBILITY_EPSILON,
    }
}

fn cut_violated(cut: &Cut, assignment: &[i64]) -> bool {
    let lhs: f64 = cut
        .expr
        .terms()
        .iter()
        .map(|&(var, coeff)| coeff * assignment[var.index()] as f64)
        .sum();
    violated(lhs, cut.relation, cut.rhs)
}

/// Immutable per-solve tables: per-variable row terms and objective
/// contribution bounds.
struct Prepared<'a> {
    vars: &'a [VarSpec],
    rows: &'a [Row],
    var_terms: Vec<Vec<Term>>,
    obj_coeff: Vec<f64>,
    obj_bounds: Vec<(f64, f64)>,
    row_init: Vec<RowState>,
    obj_init: (f64, f64),
}

impl<'a> Prepared<'a> {
    fn build(vars: &'a [VarSpec], rows: &'a [Row], objective: &LinExpr) -> Self {
        let mut var_terms: Vec<Vec<Term>> = vec![Vec::new(); vars.len()];
        let mut row_init = Vec::with_capacity(rows.len());
        for (row_index, row) in rows.iter().enumerate() {
            let mut unfixed_min = 0.0;
            let mut unfixed_max = 0.0;
            for &(var, coeff) in row.expr.terms() {
                let (bound_min, bound_max) = contribution_bounds(coeff, vars[var.index()]);
                unfixed_min += bound_min;
                unfixed_max += bound_max;
                var_terms[var.index()].push(Term {
                    row: row_index,
                    coeff,
                    bound_min,
                    bound_max,
                });
            }
            row_init.push(RowState {
                activity: 0.0,
                unfixed_min,
                unfixed_max,
            });
        }

        let mut obj_coeff = vec![0.0; vars.len()];
        for &(var, coeff) in objective.terms() {
            obj_coeff[var.index()] += coeff;
        }
        let mut obj_bounds = Vec::with_capacity(vars.len());
        let mut obj_init = (0.0, 0.0);
        for (index, &spec) in vars.iter().enumerate() {
            let bounds = contribution_bounds(obj_coeff[index], spec);
            obj_init.0 += bounds.0;
            obj_init.1 += bounds.1;
            obj_bounds.push(bounds);
        }

        Self {
            vars,
            rows,
            var_terms,
            obj_coeff,
            obj_bounds,
            row_init,
            obj_init,
        }
    }
}

fn contribution_bounds(coeff: f64, spec: VarSpec) -> (f64, f64) {
    let a = coeff * spec.lower as f64;
    let b = coeff * spec.upper as f64;
    if a <= b { (a, b) } else { (b, a) }
}

struct Shared<'a> {
    prepared: &'a Prepared<'a>,
    sense: Sense,
    separation: Option<&'a dyn SeparationHandler>,
    deadline: Option<Instant>,
    stopped: AtomicBool,
    incumbent: Mutex<Option<Incumbent>>,
    pool: Mutex<Vec<Cut>>,
    nodes: AtomicU64,
    lazy_added: AtomicUsize,
}

struct CandidateValues<'a> {
    assignment: &'a [i64],
}

impl VarValues for CandidateValues<'_> {
    fn value(&self, var: VarId) -> f64 {
        self.assignment[var.index()] as f64
    }
}

/// One depth-first searcher. Every worker owns its assignment and row
/// states; incumbent and cut pool are shared through `Shared`.
struct Worker<'a> {
    shared: &'a Shared<'a>,
    assignment: Vec<i64>,
    row_states: Vec<RowState>,
    obj_activity: f64,
    obj_unfixed_min: f64,
    obj_unfixed_max: f64,
    since_deadline_check: u64,
}

impl<'a> Worker<'a> {
    fn new(shared: &'a Shared<'a>) -> Self {
        Self {
            shared,
            assignment: vec![0; shared.prepared.vars.len()],
            row_states: shared.prepared.row_init.clone(),
            obj_activity: 0.0,
            obj_unfixed_min: shared.prepared.obj_init.0,
            obj_unfixed_max: shared.prepared.obj_init.1,
            since_deadline_check: 0,
        }
    }

    /// Entry point for parallel root splitting: fixes the first
    /// variable and explores the remaining depths.
    fn run_root(&mut self, value: i64) {
        self.fix(0, value);
        if self.rows_feasible(0) && self.objective_can_improve() {
            self.search_from(1);
        }
    }

    fn search_from(&mut self, depth: usize) {
        if self.shared.stopped.load(Ordering::Relaxed) || self.deadline_hit() {
            return;
        }
        self.shared.nodes.fetch_add(1, Ordering::Relaxed);
        if depth == self.shared.prepared.vars.len() {
            self.on_leaf();
            return;
        }
        let spec = self.shared.prepared.vars[depth];
        for value in spec.lower..=spec.upper {
            self.fix(depth, value);
            if self.rows_feasible(depth) && self.objective_can_improve() {
                self.search_from(depth + 1);
            }
            self.unfix(depth, value);
        }
    }

    fn fix(&mut self, var: usize, value: i64) {
        self.assignment[var] = value;
        let v = value as f64;
        for term in &self.shared.prepared.var_terms[var] {
            let state = &mut self.row_states[term.row];
            state.activity += term.coeff * v;
            state.unfixed_min -= term.bound_min;
            state.unfixed_max -= term.bound_max;
        }
        let (bound_min, bound_max) = self.shared.prepared.obj_bounds[var];
        self.obj_activity += self.shared.prepared.obj_coeff[var] * v;
        self.obj_unfixed_min -= bound_min;
        self.obj_unfixed_max -= bound_max;
    }

    fn unfix(&mut self, var: usize, value: i64) {
        let v = value as f64;
        for term in &self.shared.prepared.var_terms[var] {
            let state = &mut self.row_states[term.row];
            state.activity -= term.coeff * v;
            state.unfixed_min += term.bound_min;
            state.unfixed_max += term.bound_max;
        }
        let (bound_min, bound_max) = self.shared.prepared.obj_bounds[var];
        self.obj_activity -= self.shared.prepared.obj_coeff[var] * v;
        self.obj_unfixed_min += bound_min;
        self.obj_unfixed_max += bound_max;
    }

    /// Rows untouched by `var` kept their state, so checking the
    /// touched ones preserves feasibility of the whole row set.
    fn rows_feasible(&self, var: usize) -> bool {
        self.shared.prepared.var_terms[var].iter().all(|term| {
            let state = &self.row_states[term.row];
            let row = &self.shared.prepared.rows[term.row];
            match row.relation {
                Relation::Le => {
                    state.activity + state.unfixed_min <= row.rhs + FEASIBILITY_EPSILON
                }
                Relation::Ge => {
                    state.activity + state.unfixed_max >= row.rhs - FEASIBILITY_EPSILON
                }
                Relation::Eq => {
                    state.activity + state.unfixed_min <= row.rhs + FEASIBILITY_EPSILON
                        && state.activity + state.unfixed_max >= row.rhs - FEASIBILITY_EPSILON
                }
            }
        })
    }

    fn objective_can_improve(&self) -> bool {
        let incumbent = lock(&self.shared.incumbent);
        let Some(best) = incumbent.as_ref().map(|existing| existing.objective) else {
            return true;
        };
        match self.shared.sense {
            Sense::Minimize => self.obj_activity + self.obj_unfixed_min < best - FEASIBILITY_EPSILON,
            Sense::Maximize => self.obj_activity + self.obj_unfixed_max > best + FEASIBILITY_EPSILON,
        }
    }

    fn deadline_hit(&mut self) -> bool {
        let Some(deadline) = self.shared.deadline else {
            return false;
        };
        self.since_deadline_check += 1;
        if self.since_deadline_check < DEADLINE_CHECK_INTERVAL {
            return false;
        }
        self.since_deadline_check = 0;
        if Instant::now() >= deadline {
            self.shared.stopped.store(true, Ordering::Relaxed);
            return true;
        }
        false
    }

    /// Full assignment: the standing bound checks made every row exact,
    /// so only the cut pool and the separation callback remain.
    fn on_leaf(&mut self) {
        if let Some(deadline) = self.shared.deadline
            && Instant::now() >= deadline
        {
            self.shared.stopped.store(true, Ordering::Relaxed);
            return;
        }
        if self.pool_rejects() || self.separation_rejects() {
            return;
        }
        self.try_update_incumbent();
    }

    fn pool_rejects(&self) -> bool {
        let pool = lock(&self.shared.pool);
        pool.iter().any(|cut| cut_violated(cut, &self.assignment))
    }

    /// Runs the separation callback on this candidate. A returned cut
    /// always joins the pool; the candidate survives only when the cut
    /// does not touch it.
    fn separation_rejects(&mut self) -> bool {
        let Some(handler) = self.shared.separation else {
            return false;
        };
        let candidate = CandidateValues {
            assignment: &self.assignment,
        };
        match handler.separate(CallbackNode::IntegralCandidate, &candidate) {
            SeparationResult::NoCut => false,
            SeparationResult::Cut(cut) => {
                let rejects = cut_violated(&cut, &self.assignment);
                lock(&self.shared.pool).push(cut);
                self.shared.lazy_added.fetch_add(1, Ordering::Relaxed);
                rejects
            }
        }
    }

    fn try_update_incumbent(&self) {
        let mut incumbent = lock(&self.shared.incumbent);
        let improves = match incumbent.as_ref() {
            None => true,
            Some(existing) => match self.shared.sense {
                Sense::Minimize => self.obj_activity < existing.objective - FEASIBILITY_EPSILON,
                Sense::Maximize => self.obj_activity > existing.objective + FEASIBILITY_EPSILON,
            },
        };
        if improves {
            *incumbent = Some(Incumbent {
                objective: self.obj_activity,
                values: self.assignment.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimize(engine: &mut ExhaustiveEngine, terms: &[(VarId, f64)]) {
        let mut objective = LinExpr::new();
        for &(var, coeff) in terms {
            objective.add(var, coeff);
        }
        engine.set_objective(objective, Sense::Minimize);
    }

    fn ge_one(engine: &mut ExhaustiveEngine, vars: &[VarId]) {
        let mut expr = LinExpr::new();
        for &var in vars {
            expr.add(var, 1.0);
        }
        engine.add_constraint(expr, Relation::Ge, 1.0, "cover");
    }

    #[test]
    fn minimizes_over_binaries() {
        let mut engine = ExhaustiveEngine::new();
        let x = engine.add_binary_var("x");
        let y = engine.add_binary_var("y");
        minimize(&mut engine, &[(x, 1.0), (y, 2.0)]);
        ge_one(&mut engine, &[x, y]);

        let outcome = engine
            .optimize(&SolveParams::default())
            .expect("solve should succeed");
        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert_eq!(outcome.objective, Some(1.0));
        let solution = outcome.solution.expect("optimal must carry values");
        assert_eq!(solution.value(x), 1.0);
        assert_eq!(solution.value(y), 0.0);
        assert!(outcome.stats.nodes_explored > 0);
    }

    #[test]
    fn maximizes_under_le_constraint() {
        let mut engine = ExhaustiveEngine::new();
        let x = engine.add_binary_var("x");
        let y = engine.add_binary_var("y");
        let mut objective = LinExpr::new();
        objective.add(x, 1.0).add(y, 2.0);
        engine.set_objective(objective, Sense::Maximize);
        let mut budget = LinExpr::new();
        budget.add(x, 1.0).add(y, 1.0);
        engine.add_constraint(budget, Relation::Le, 1.0, "budget");

        let outcome = engine
            .optimize(&SolveParams::default())
            .expect("solve should succeed");
        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert_eq!(outcome.objective, Some(2.0));
    }

    #[test]
    fn equality_fixes_integer_variable() {
        let mut engine = ExhaustiveEngine::new();
        let x = engine.add_integer_var(0, 5, "x");
        minimize(&mut engine, &[(x, 1.0)]);
        let mut pin = LinExpr::new();
        pin.add(x, 1.0);
        engine.add_constraint(pin, Relation::Eq, 3.0, "pin");

        let outcome = engine
            .optimize(&SolveParams::default())
            .expect("solve should succeed");
        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert_eq!(outcome.objective, Some(3.0));
    }

    #[test]
    fn reports_infeasible_when_no_assignment_fits() {
        let mut engine = ExhaustiveEngine::new();
        let x = engine.add_binary_var("x");
        minimize(&mut engine, &[(x, 1.0)]);
        let mut expr = LinExpr::new();
        expr.add(x, 1.0);
        engine.add_constraint(expr, Relation::Ge, 2.0, "impossible");

        let outcome = engine
            .optimize(&SolveParams::default())
            .expect("solve should succeed");
        assert_eq!(outcome.status, SolveStatus::Infeasible);
        assert!(outcome.objective.is_none());
        assert!(outcome.solution.is_none());
    }

    #[test]
    fn zero_time_limit_reports_no_feasible() {
        let mut engine = ExhaustiveEngine::new();
        let x = engine.add_binary_var("x");
        minimize(&mut engine, &[(x, 1.0)]);

        let params = SolveParams {
            time_limit: Some(Duration::ZERO),
            threads: 1,
        };
        let outcome = engine.optimize(&params).expect("solve should succeed");
        assert_eq!(outcome.status, SolveStatus::TimeLimitNoFeasible);
        assert!(outcome.solution.is_none());
    }

    #[test]
    fn seeded_lazy_constraint_redirects_the_optimum() {
        let mut engine = ExhaustiveEngine::new();
        let x = engine.add_binary_var("x");
        let y = engine.add_binary_var("y");
        minimize(&mut engine, &[(x, 1.0), (y, 2.0)]);
        ge_one(&mut engine, &[x, y]);
        let mut forbid = LinExpr::new();
        forbid.add(x, 1.0);
        engine.add_lazy_constraint(Cut::new(forbid, Relation::Le, 0.0));

        let outcome = engine
            .optimize(&SolveParams::default())
            .expect("solve should succeed");
        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert_eq!(outcome.objective, Some(2.0));
    }

    struct ForbidVarOne {
        var: VarId,
    }

    impl SeparationHandler for ForbidVarOne {
        fn separate(&self, _node: CallbackNode, values: &dyn VarValues) -> SeparationResult {
            if values.value(self.var) >= 0.5 {
                let mut expr = LinExpr::new();
                expr.add(self.var, 1.0);
                SeparationResult::Cut(Cut::new(expr, Relation::Le, 0.0))
            } else {
                SeparationResult::NoCut
            }
        }
    }

    #[test]
    fn separation_rejects_candidates_and_counts_cuts() {
        let mut engine = ExhaustiveEngine::new();
        let x = engine.add_binary_var("x");
        let y = engine.add_binary_var("y");
        minimize(&mut engine, &[(x, 1.0), (y, 2.0)]);
        ge_one(&mut engine, &[x, y]);
        engine.set_separation(Arc::new(ForbidVarOne { var: x }));

        let outcome = engine
            .optimize(&SolveParams::default())
            .expect("solve should succeed");
        // The cheap candidate x=1 is cut away, leaving y=1.
        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert_eq!(outcome.objective, Some(2.0));
        assert_eq!(outcome.stats.lazy_cuts, 1);
    }

    #[test]
    fn parallel_search_matches_sequential_objective() {
        let build = || {
            let mut engine = ExhaustiveEngine::new();
            let vars: Vec<VarId> = (0..6)
                .map(|index| engine.add_binary_var(&format!("x{index}")))
                .collect();
            let terms: Vec<(VarId, f64)> = vars
                .iter()
                .enumerate()
                .map(|(index, &var)| (var, (index + 1) as f64))
                .collect();
            minimize(&mut engine, &terms);
            let mut expr = LinExpr::new();
            for &var in &vars {
                expr.add(var, 1.0);
            }
            engine.add_constraint(expr, Relation::Ge, 3.0, "pick_three");
            engine
        };

        let sequential = build()
            .optimize(&SolveParams::default())
            .expect("solve should succeed");
        let parallel = build()
            .optimize(&SolveParams {
                time_limit: None,
                threads: 2,
            })
            .expect("solve should succeed");
        assert_eq!(sequential.objective, Some(6.0));
        assert_eq!(parallel.objective, sequential.objective);
        assert_eq!(parallel.status, SolveStatus::Optimal);
    }

    #[test]
    fn optimize_without_variables_is_an_engine_error() {
        let mut engine = ExhaustiveEngine::new();
        let result = engine.optimize(&SolveParams::default());
        assert!(matches!(result, Err(Error::Engine(_))));
    }

    #[test]
    fn optimize_without_objective_is_an_engine_error() {
        let mut engine = ExhaustiveEngine::new();
        engine.add_binary_var("x");
        let result = engine.optimize(&SolveParams::default());
        assert!(matches!(result, Err(Error::Engine(_))));
    }
}
