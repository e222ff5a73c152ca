use super::{Lookahead, Value};
use crate::cnf::Lit;

/// Entry in `watches[l]`: a clause containing `!l`, visited when `l` becomes true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Watch {
    /// The two other literals of a ternary clause.
    Ternary(Lit, Lit),
    /// A long clause with a cached literal that satisfies it when true.
    Long { blocker: Lit, clause: usize },
}

impl Lookahead {
    pub(super) fn attach_ternary(&mut self, [a, b, c]: [Lit; 3]) {
        self.watches[(!a).index()].push(Watch::Ternary(b, c));
        self.watches[(!b).index()].push(Watch::Ternary(a, c));
        self.watches[(!c).index()].push(Watch::Ternary(a, b));
        self.ternary.push([a, b, c]);
    }

    pub(super) fn attach_clause(&mut self, lits: Vec<Lit>) {
        debug_assert!(lits.len() > 3);
        let clause = self.clauses.len();
        self.watches[(!lits[0]).index()].push(Watch::Long {
            blocker: lits[1],
            clause,
        });
        self.watches[(!lits[1]).index()].push(Watch::Long {
            blocker: lits[0],
            clause,
        });
        self.clauses.push(lits);
    }

    pub(super) fn is_fixed(&self, lit: Lit) -> bool {
        self.value(lit) != Value::Undef
    }

    pub(super) fn is_true(&self, lit: Lit) -> bool {
        self.value(lit) == Value::True
    }

    pub(super) fn set_conflict(&mut self) {
        self.inconsistent = true;
    }

    /// Makes `lit` true; assigning a false literal flags a conflict instead.
    pub(super) fn assign(&mut self, lit: Lit) {
        match self.value(lit) {
            Value::True => {}
            Value::False => self.set_conflict(),
            Value::Undef => {
                self.assignment[lit.index()] = Value::True;
                self.assignment[(!lit).index()] = Value::False;
                self.trail.push(lit);
                self.free_vars.swap_remove(&lit.var());
            }
        }
    }

    fn unassign(&mut self, lit: Lit) {
        self.assignment[lit.index()] = Value::Undef;
        self.assignment[(!lit).index()] = Value::Undef;
        self.free_vars.insert(lit.var());
    }

    /// Assignment made by a clause rather than a decision or a binary implication.
    fn assign_windfall(&mut self, lit: Lit) {
        self.stats.propagations += 1;
        if self.config.local_learning && !self.trail_lim.is_empty() && !self.is_fixed(lit) {
            self.windfalls.push(lit);
        }
        self.assign(lit);
    }

    pub(super) fn propagate(&mut self) {
        while self.qhead < self.trail.len() && !self.inconsistent {
            let lit = self.trail[self.qhead];
            self.qhead += 1;
            self.propagate_binary(lit);
            self.propagate_clauses(lit);
        }
    }

    fn propagate_binary(&mut self, lit: Lit) {
        let idx = lit.index();
        let mut i = 0;
        while i < self.binary[idx].len() && !self.inconsistent {
            let w = self.binary[idx][i];
            i += 1;
            if !self.is_true(w) {
                self.stats.propagations += 1;
                self.assign(w);
            }
        }
    }

    fn propagate_clauses(&mut self, lit: Lit) {
        if self.inconsistent {
            return;
        }
        let false_lit = !lit;
        let mut watches = std::mem::take(&mut self.watches[lit.index()]);
        let mut j = 0;
        for i in 0..watches.len() {
            let watch = watches[i];
            if self.inconsistent {
                watches[j] = watch;
                j += 1;
                continue;
            }
            match watch {
                Watch::Ternary(a, b) => {
                    match (self.value(a), self.value(b)) {
                        (Value::False, Value::Undef) => self.assign_windfall(b),
                        (Value::Undef, Value::False) => self.assign_windfall(a),
                        (Value::False, Value::False) => self.set_conflict(),
                        _ => {}
                    }
                    watches[j] = watch;
                    j += 1;
                }
                Watch::Long { blocker, clause } => {
                    if self.is_true(blocker) {
                        watches[j] = watch;
                        j += 1;
                        continue;
                    }
                    if self.clauses[clause][0] == false_lit {
                        self.clauses[clause].swap(0, 1);
                    }
                    debug_assert_eq!(self.clauses[clause][1], false_lit);
                    let first = self.clauses[clause][0];
                    if self.is_true(first) {
                        watches[j] = Watch::Long {
                            blocker: first,
                            clause,
                        };
                        j += 1;
                        continue;
                    }
                    let len = self.clauses[clause].len();
                    let replacement =
                        (2..len).find(|&k| self.value(self.clauses[clause][k]) != Value::False);
                    if let Some(k) = replacement {
                        self.clauses[clause].swap(1, k);
                        let watched = self.clauses[clause][1];
                        self.watches[(!watched).index()].push(Watch::Long {
                            blocker: first,
                            clause,
                        });
                        continue;
                    }
                    watches[j] = watch;
                    j += 1;
                    match self.value(first) {
                        Value::False => self.set_conflict(),
                        Value::Undef => self.assign_windfall(first),
                        Value::True => {}
                    }
                }
            }
        }
        watches.truncate(j);
        debug_assert!(self.watches[lit.index()].is_empty());
        self.watches[lit.index()] = watches;
    }

    pub(super) fn push_scope(&mut self, lit: Lit) {
        self.binary_trail_lim.push(self.binary_trail.len());
        self.windfalls_lim.push(self.windfalls.len());
        self.trail_lim.push(self.trail.len());
        self.qhead_lim.push((self.qhead, self.inconsistent));
        self.assign(lit);
        self.propagate();
    }

    pub(super) fn pop_scope(&mut self) {
        let Some((qhead, inconsistent)) = self.qhead_lim.pop() else {
            debug_assert!(false, "pop_scope without push_scope");
            return;
        };
        // the limit stacks are pushed together in push_scope
        let binary_lim = self.binary_trail_lim.pop().unwrap_or(0);
        let windfalls_lim = self.windfalls_lim.pop().unwrap_or(0);
        let trail_lim = self.trail_lim.pop().unwrap_or(0);
        while self.binary_trail.len() > binary_lim {
            if let Some((a, b)) = self.binary_trail.pop() {
                self.del_binary(a, b);
            }
        }
        self.windfalls.truncate(windfalls_lim);
        while self.trail.len() > trail_lim {
            if let Some(lit) = self.trail.pop() {
                self.unassign(lit);
            }
        }
        self.qhead = qhead;
        self.inconsistent = inconsistent;
    }

    /// Pops a probe of `lit`; with `learn`, each windfall `w` of the probe
    /// becomes a candidate binary `!lit | w` in the enclosing scope.
    pub(super) fn pop_probe(&mut self, lit: Lit, learn: bool) {
        let start = self.windfalls_lim.last().copied().unwrap_or(0);
        let found = if learn && self.config.local_learning {
            self.windfalls[start..].to_vec()
        } else {
            Vec::new()
        };
        self.pop_scope();
        for w in found {
            if self.inconsistent || self.is_fixed(lit) {
                break;
            }
            if !self.is_fixed(w) {
                self.try_add_binary_unchecked(!lit, w);
            }
        }
        self.propagate();
    }

    /// Asserts a literal proven by probing and propagates it in the current scope.
    pub(super) fn force(&mut self, lit: Lit) {
        tracing::trace!(?lit, level = self.scope_level(), "forced unit");
        self.stats.failed_literals += 1;
        self.assign(lit);
        self.propagate();
    }

    /// Number of literals assigned since the innermost push.
    pub(super) fn diff(&self) -> usize {
        self.trail.len() - self.trail_lim.last().copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use crate::cnf::Lit;
    use crate::lookahead::{Lookahead, LookaheadConfig, Snapshot, Value};

    fn lit(d: i64) -> Lit {
        Lit::from_dimacs(d).expect("lit")
    }

    fn engine(num_vars: u32, clauses: &[&[i64]]) -> Lookahead {
        let mut snap = Snapshot::new(num_vars);
        for c in clauses {
            snap.add_clause(c.iter().map(|&d| lit(d)).collect(), false);
        }
        Lookahead::new(&snap, LookaheadConfig::default()).expect("init")
    }

    fn assert_symmetric(la: &Lookahead) {
        for v in 0..la.num_vars() {
            let pos = la.value(Lit::positive(v));
            let neg = la.value(Lit::negative(v));
            match pos {
                Value::True => assert_eq!(neg, Value::False),
                Value::False => assert_eq!(neg, Value::True),
                Value::Undef => assert_eq!(neg, Value::Undef),
            }
            assert_eq!(la.free_vars().contains(&v), pos == Value::Undef);
        }
    }

    #[test]
    fn long_clause_propagates_last_literal() {
        let mut la = engine(5, &[&[1, 2, 3, 4, 5]]);
        for d in [-1, -2, -3] {
            la.push(lit(d)).expect("push");
            assert_eq!(la.value(lit(5)), Value::Undef);
        }
        la.push(lit(-4)).expect("push");
        assert_eq!(la.value(lit(5)), Value::True);
        assert_symmetric(&la);
        la.pop().expect("pop");
        assert_eq!(la.value(lit(5)), Value::Undef);
        // watches moved on, the clause still propagates through a new path
        la.push(lit(-5)).expect("push");
        assert_eq!(la.value(lit(4)), Value::True);
    }

    #[test]
    fn ternary_conflict_sets_flag_until_pop() {
        let mut la = engine(3, &[&[1, 2, 3], &[-3, 1]]);
        la.push(lit(-1)).expect("push");
        assert_eq!(la.value(lit(-3)), Value::True);
        assert_eq!(la.value(lit(2)), Value::True);
        la.push(lit(-2)).expect("push");
        assert!(la.inconsistent());
        la.pop().expect("pop");
        assert!(!la.inconsistent());
        assert_eq!(la.value(lit(2)), Value::True);
        assert_symmetric(&la);
    }

    #[test]
    fn assign_of_false_literal_flags_conflict() {
        let mut la = engine(2, &[&[-1, 2]]);
        la.push(lit(1)).expect("push");
        assert_eq!(la.value(lit(2)), Value::True);
        la.push(lit(-2)).expect("push");
        assert!(la.inconsistent());
        assert_eq!(la.value(lit(2)), Value::True);
    }

    #[test]
    fn push_pop_restores_everything() {
        let mut la = engine(
            6,
            &[&[1, 2, 3], &[-1, 4, 5], &[-4, 6], &[2, -5, -6, 3], &[-2, -3]],
        );
        let before_assignment = (0..12)
            .map(|i| la.value(Lit::from_index(i)))
            .collect::<Vec<_>>();
        let before_binary = (0..12)
            .map(|i| la.implied(Lit::from_index(i)).to_vec())
            .collect::<Vec<_>>();
        let before_free = la.free_vars().clone();

        la.push(lit(1)).expect("push");
        la.try_add_binary(lit(2), lit(6)).expect("learn");
        la.push(lit(-4)).expect("push");
        la.try_add_binary(lit(3), lit(-6)).expect("learn");
        assert_symmetric(&la);
        la.pop().expect("pop");
        la.pop().expect("pop");

        for i in 0..12 {
            let l = Lit::from_index(i);
            assert_eq!(la.value(l), before_assignment[i]);
            assert_eq!(la.implied(l), before_binary[i].as_slice());
        }
        assert_eq!(la.free_vars(), &before_free);
        assert!(la.trail().is_empty());
    }

    #[test]
    fn nested_pop_keeps_outer_scope() {
        let mut la = engine(
            6,
            &[&[1, 2, 3], &[-1, 4, 5], &[-4, 6], &[2, -5, -6, 3], &[-2, -3]],
        );
        la.push(lit(1)).expect("push");
        let outer = la.trail().to_vec();
        la.push(lit(-4)).expect("push");
        assert!(la.trail().len() > outer.len());
        la.pop().expect("pop");
        assert_eq!(la.scope_level(), 1);
        assert_eq!(la.trail(), outer.as_slice());
        assert_eq!(la.value(lit(1)), Value::True);
        assert_eq!(la.value(lit(4)), Value::Undef);
        la.pop().expect("pop");
        assert_eq!(la.scope_level(), 0);
        assert!(la.pop().is_err());
    }
}
