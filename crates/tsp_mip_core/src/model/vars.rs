use crate::engine::{MipEngine, VarId};

/// Cities are numbered 0..n; the tour starts and ends here.
pub const DEPOT: usize = 0;

/// Whether the layered scheme keeps a variable for arc (i, j) at
/// position k: no self arcs, the depot is left at position 0 and only
/// there, and entered at position n-1 and only there.
pub fn layered_slot_allowed(n: usize, i: usize, j: usize, k: usize) -> bool {
    i != j && (i == DEPOT) == (k == 0) && (j == DEPOT) == (k == n - 1)
}

/// Flat arena of arc-variable handles. Slots the structural rules
/// exclude (the diagonal always; most (i, j, k) combinations in the
/// layered scheme) stay `None`, so lookups need no caller-side index
/// discipline and excluded arcs can never leak into a constraint.
#[derive(Clone, Debug)]
pub struct ArcVars {
    n: usize,
    positions: usize,
    slots: Vec<Option<VarId>>,
    count: usize,
}

impl ArcVars {
    /// One binary per ordered pair (i, j), i != j.
    pub fn complete(engine: &mut dyn MipEngine, n: usize) -> Self {
        let mut vars = Self::empty(n, 1);
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let var = engine.add_binary_var(&format!("x({i},{j})"));
                vars.set(i, j, 0, var);
            }
        }
        vars
    }

    /// One binary per (i, j, k) combination the layered position rules
    /// allow.
    pub fn layered(engine: &mut dyn MipEngine, n: usize) -> Self {
        let mut vars = Self::empty(n, n);
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    if !layered_slot_allowed(n, i, j, k) {
                        continue;
                    }
                    let var = engine.add_binary_var(&format!("x({i},{j},{k})"));
                    vars.set(i, j, k, var);
                }
            }
        }
        vars
    }

    fn empty(n: usize, positions: usize) -> Self {
        Self {
            n,
            positions,
            slots: vec![None; n * n * positions],
            count: 0,
        }
    }

    fn slot(&self, from: usize, to: usize, position: usize) -> usize {
        (from * self.n + to) * self.positions + position
    }

    fn set(&mut self, from: usize, to: usize, position: usize, var: VarId) {
        let slot = self.slot(from, to, position);
        debug_assert!(self.slots[slot].is_none());
        self.slots[slot] = Some(var);
        self.count += 1;
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn positions(&self) -> usize {
        self.positions
    }

    /// Number of variables actually created.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Flat lookup; equivalent to `arc_at(from, to, 0)`.
    pub fn arc(&self, from: usize, to: usize) -> Option<VarId> {
        self.arc_at(from, to, 0)
    }

    pub fn arc_at(&self, from: usize, to: usize, position: usize) -> Option<VarId> {
        if from >= self.n || to >= self.n || position >= self.positions {
            return None;
        }
        self.slots[self.slot(from, to, position)]
    }

    /// Existing variables as (from, to, position, var), in creation
    /// order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, usize, VarId)> + '_ {
        let n = self.n;
        let positions = self.positions;
        self.slots.iter().enumerate().filter_map(move |(slot, var)| {
            var.map(|var| {
                let position = slot % positions;
                let to = (slot / positions) % n;
                let from = slot / (positions * n);
                (from, to, position, var)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::exhaustive::ExhaustiveEngine;

    #[test]
    fn complete_arena_skips_the_diagonal() {
        let mut engine = ExhaustiveEngine::new();
        let vars = ArcVars::complete(&mut engine, 4);
        assert_eq!(vars.count(), 12);
        assert!(vars.arc(0, 0).is_none());
        assert!(vars.arc(2, 2).is_none());
        assert!(vars.arc(0, 3).is_some());
        assert!(vars.arc(3, 0).is_some());
    }

    #[test]
    fn layered_arena_applies_position_rules() {
        let mut engine = ExhaustiveEngine::new();
        let n = 4;
        let vars = ArcVars::layered(&mut engine, n);
        // Layer 0: depot departures. Layer n-1: depot returns. Interior
        // layers: all non-depot ordered pairs.
        assert_eq!(vars.count(), 3 + 6 + 6 + 3);
        assert!(vars.arc_at(0, 1, 0).is_some());
        assert!(vars.arc_at(0, 1, 1).is_none());
        assert!(vars.arc_at(1, 2, 1).is_some());
        assert!(vars.arc_at(1, 0, 1).is_none());
        assert!(vars.arc_at(1, 0, n - 1).is_some());
        assert!(vars.arc_at(1, 1, 2).is_none());
    }

    #[test]
    fn lookups_outside_range_yield_none() {
        let mut engine = ExhaustiveEngine::new();
        let vars = ArcVars::complete(&mut engine, 3);
        assert!(vars.arc(0, 7).is_none());
        assert!(vars.arc_at(0, 1, 5).is_none());
    }

    #[test]
    fn iter_reports_every_created_slot() {
        let mut engine = ExhaustiveEngine::new();
        let vars = ArcVars::layered(&mut engine, 3);
        let collected: Vec<_> = vars.iter().collect();
        assert_eq!(collected.len(), vars.count());
        for (from, to, position, _) in collected {
            assert!(layered_slot_allowed(3, from, to, position));
        }
    }
}
