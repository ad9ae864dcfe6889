use std::sync::Arc;

use crate::{
    engine::{CallbackNode, Cut, LinExpr, Relation, SeparationHandler, SeparationResult, VarValues},
    model::{ArcVars, DEPOT},
};

/// Arc values at or above this count as selected when walking an
/// assignment. One threshold everywhere: integral candidates, fractional
/// relaxations, and tour decoding all read arcs the same way.
pub const ACTIVATION_THRESHOLD: f64 = 0.5;

/// Result of following selected arcs from the depot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CycleWalk {
    /// Cities in traversal order, the depot first. The closing depot
    /// entry is not repeated.
    pub order: Vec<usize>,
    /// Whether the walk returned to the depot.
    pub closed: bool,
}

impl CycleWalk {
    pub fn arc_count(&self) -> usize {
        if self.closed {
            self.order.len()
        } else {
            self.order.len().saturating_sub(1)
        }
    }

    /// A closed walk covering all n cities is a complete tour.
    pub fn is_tour(&self, n: usize) -> bool {
        self.closed && self.order.len() == n
    }
}

/// Follow selected arcs from the depot for at most n steps.
/// `next_active(step, city)` resolves the successor of `city` when
/// leaving it as step number `step`; layered walks index their position
/// layer with the step, flat walks ignore it. Stops when the depot is
/// reached again or no successor exists.
pub fn walk_cycle<F>(n: usize, mut next_active: F) -> CycleWalk
where
    F: FnMut(usize, usize) -> Option<usize>,
{
    let mut order = vec![DEPOT];
    let mut current = DEPOT;
    for step in 0..n {
        let Some(next) = next_active(step, current) else {
            return CycleWalk {
                order,
                closed: false,
            };
        };
        if next == DEPOT {
            return CycleWalk {
                order,
                closed: true,
            };
        }
        order.push(next);
        current = next;
    }
    CycleWalk {
        order,
        closed: false,
    }
}

/// All-pairs subtour inequality over `members`:
/// sum of every existing arc with both endpoints inside <= |S| - 1.
/// A complete tour enters and leaves the set, so it satisfies the bound;
/// any cycle confined to the set does not.
pub fn subtour_cut(vars: &ArcVars, members: &[usize]) -> Cut {
    let mut expr = LinExpr::with_capacity(members.len() * members.len());
    for &i in members {
        for &j in members {
            if let Some(var) = vars.arc(i, j) {
                expr.add(var, 1.0);
            }
        }
    }
    Cut::new(expr, Relation::Le, (members.len() - 1) as f64)
}

/// Detects sub-cycles in assignments over flat (i, j) arc variables.
/// Walks the selected arcs from the depot: a short closed walk yields a
/// subtour cut, an open walk abstains, a complete tour needs nothing.
pub struct SubtourSeparator {
    vars: Arc<ArcVars>,
    cut_fractional: bool,
}

impl SubtourSeparator {
    pub fn new(vars: Arc<ArcVars>) -> Self {
        Self {
            vars,
            cut_fractional: false,
        }
    }

    /// Also separate at fractional relaxation nodes. Off by default;
    /// integral candidates are always separated.
    pub fn with_fractional_cuts(mut self, enabled: bool) -> Self {
        self.cut_fractional = enabled;
        self
    }

    fn next_active_arc(&self, from: usize, values: &dyn VarValues) -> Option<usize> {
        (0..self.vars.n()).find(|&to| {
            self.vars
                .arc(from, to)
                .is_some_and(|var| values.value(var) >= ACTIVATION_THRESHOLD)
        })
    }
}

impl SeparationHandler for SubtourSeparator {
    fn separate(&self, node: CallbackNode, values: &dyn VarValues) -> SeparationResult {
        if node == CallbackNode::Relaxation && !self.cut_fractional {
            return SeparationResult::NoCut;
        }
        let n = self.vars.n();
        let walk = walk_cycle(n, |_, from| self.next_active_arc(from, values));
        if !walk.closed {
            log::debug!(
                "separation: open walk after {} arcs, abstaining",
                walk.arc_count()
            );
            return SeparationResult::NoCut;
        }
        if walk.is_tour(n) {
            return SeparationResult::NoCut;
        }
        log::debug!("separation: sub-cycle of {} cities, cutting", walk.order.len());
        SeparationResult::Cut(subtour_cut(&self.vars, &walk.order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{SolutionValues, exhaustive::ExhaustiveEngine};

    fn complete_vars(n: usize) -> Arc<ArcVars> {
        let mut engine = ExhaustiveEngine::new();
        Arc::new(ArcVars::complete(&mut engine, n))
    }

    fn assignment(vars: &ArcVars, arcs: &[(usize, usize)]) -> SolutionValues {
        let mut values = vec![0.0; vars.count()];
        for &(from, to) in arcs {
            let var = vars.arc(from, to).expect("arc variable must exist");
            values[var.index()] = 1.0;
        }
        SolutionValues::new(values)
    }

    #[test]
    fn walk_closes_on_full_tour() {
        let successors = [1, 2, 3, 0];
        let walk = walk_cycle(4, |_, city| Some(successors[city]));
        assert!(walk.closed);
        assert_eq!(walk.order, vec![0, 1, 2, 3]);
        assert!(walk.is_tour(4));
        assert_eq!(walk.arc_count(), 4);
    }

    #[test]
    fn walk_detects_short_cycle() {
        // 0 -> 1 -> 0 while 2 and 3 cycle separately.
        let successors = [1, 0, 3, 2];
        let walk = walk_cycle(4, |_, city| Some(successors[city]));
        assert!(walk.closed);
        assert_eq!(walk.order, vec![0, 1]);
        assert!(!walk.is_tour(4));
        assert_eq!(walk.arc_count(), 2);
    }

    #[test]
    fn walk_reports_dead_end_as_open() {
        let walk = walk_cycle(4, |_, city| if city == 0 { Some(2) } else { None });
        assert!(!walk.closed);
        assert_eq!(walk.order, vec![0, 2]);
        assert_eq!(walk.arc_count(), 1);
    }

    #[test]
    fn walk_is_idempotent_on_an_unchanged_assignment() {
        let vars = complete_vars(4);
        let values = assignment(&vars, &[(0, 1), (1, 0), (2, 3), (3, 2)]);
        let separator = SubtourSeparator::new(Arc::clone(&vars));
        let first = walk_cycle(vars.n(), |_, from| separator.next_active_arc(from, &values));
        let second = walk_cycle(vars.n(), |_, from| separator.next_active_arc(from, &values));
        assert_eq!(first, second);
        assert_eq!(first.order, vec![0, 1]);
    }

    #[test]
    fn complete_tour_needs_no_cut() {
        let vars = complete_vars(4);
        let values = assignment(&vars, &[(0, 2), (2, 1), (1, 3), (3, 0)]);
        let separator = SubtourSeparator::new(Arc::clone(&vars));
        let result = separator.separate(CallbackNode::IntegralCandidate, &values);
        assert!(matches!(result, SeparationResult::NoCut));
    }

    #[test]
    fn split_cycles_produce_a_subtour_cut() {
        let vars = complete_vars(4);
        let values = assignment(&vars, &[(0, 1), (1, 0), (2, 3), (3, 2)]);
        let separator = SubtourSeparator::new(Arc::clone(&vars));
        let result = separator.separate(CallbackNode::IntegralCandidate, &values);
        let SeparationResult::Cut(cut) = result else {
            panic!("expected a cut for split cycles");
        };
        assert_eq!(cut.relation, Relation::Le);
        assert_eq!(cut.rhs, 1.0);
        // Both directions inside {0, 1}.
        assert_eq!(cut.expr.len(), 2);
        assert!(cut.expr.value(&values) > cut.rhs);
    }

    #[test]
    fn open_walk_abstains() {
        let vars = complete_vars(4);
        let values = assignment(&vars, &[(0, 1), (1, 2)]);
        let separator = SubtourSeparator::new(Arc::clone(&vars));
        let result = separator.separate(CallbackNode::IntegralCandidate, &values);
        assert!(matches!(result, SeparationResult::NoCut));
    }

    #[test]
    fn relaxation_nodes_are_skipped_unless_enabled() {
        let vars = complete_vars(4);
        let values = assignment(&vars, &[(0, 1), (1, 0), (2, 3), (3, 2)]);

        let quiet = SubtourSeparator::new(Arc::clone(&vars));
        let result = quiet.separate(CallbackNode::Relaxation, &values);
        assert!(matches!(result, SeparationResult::NoCut));

        let cutting = SubtourSeparator::new(Arc::clone(&vars)).with_fractional_cuts(true);
        let result = cutting.separate(CallbackNode::Relaxation, &values);
        assert!(matches!(result, SeparationResult::Cut(_)));
    }

    #[test]
    fn fractional_values_below_threshold_stay_inactive() {
        let vars = complete_vars(3);
        let mut values = vec![0.0; vars.count()];
        values[vars.arc(0, 1).expect("arc").index()] = 0.4;
        values[vars.arc(0, 2).expect("arc").index()] = 0.6;
        values[vars.arc(2, 0).expect("arc").index()] = 0.6;
        let values = SolutionValues::new(values);

        let separator = SubtourSeparator::new(Arc::clone(&vars)).with_fractional_cuts(true);
        // Walk takes 0 -> 2 -> 0, a 2-cycle below the full length.
        let SeparationResult::Cut(cut) = separator.separate(CallbackNode::Relaxation, &values)
        else {
            panic!("expected a cut");
        };
        assert_eq!(cut.rhs, 1.0);
    }

    #[test]
    fn subtour_cut_counts_internal_arcs_only() {
        let vars = complete_vars(4);
        let cut = subtour_cut(&vars, &[2, 3]);
        assert_eq!(cut.expr.len(), 2);
        assert_eq!(cut.rhs, 1.0);
        let tour = assignment(&vars, &[(0, 2), (2, 3), (3, 1), (1, 0)]);
        // A full tour uses one arc inside {2, 3} and satisfies the bound.
        assert!(cut.expr.value(&tour) <= cut.rhs);
    }
}
