use super::{Lookahead, LookaheadError};
use crate::cnf::Lit;

/// Per-literal timestamps; a literal is stamped when its stamp equals the current id.
#[derive(Debug, Clone)]
pub(crate) struct Stamps {
    stamps: Vec<u32>,
    id: u32,
}

impl Stamps {
    pub(crate) fn new(num_lits: usize) -> Self {
        Self {
            stamps: vec![0; num_lits],
            id: 0,
        }
    }

    /// Starts a fresh generation; on wraparound every stale stamp is cleared.
    pub(crate) fn inc(&mut self) {
        self.id = self.id.wrapping_add(1);
        if self.id == 0 {
            self.id = 1;
            self.stamps.fill(0);
        }
    }

    pub(crate) fn set(&mut self, lit: Lit) {
        self.stamps[lit.index()] = self.id;
    }

    pub(crate) fn is_stamped(&self, lit: Lit) -> bool {
        self.stamps[lit.index()] == self.id
    }
}

impl Lookahead {
    /// Records clause `a | b` as the implications `!a -> b` and `!b -> a`.
    pub(super) fn add_binary(&mut self, a: Lit, b: Lit) {
        debug_assert_ne!(a, b);
        debug_assert_ne!(a, !b);
        self.binary[(!a).index()].push(b);
        self.binary[(!b).index()].push(a);
        self.binary_trail.push((a, b));
    }

    pub(super) fn del_binary(&mut self, a: Lit, b: Lit) {
        let popped_b = self.binary[(!a).index()].pop();
        let popped_a = self.binary[(!b).index()].pop();
        debug_assert_eq!(popped_b, Some(b));
        debug_assert_eq!(popped_a, Some(a));
    }

    /// Stamps `lit` and everything it implies in one step.
    fn set_bstamps(&mut self, lit: Lit) {
        self.stamps.inc();
        self.stamps.set(lit);
        for &w in &self.binary[lit.index()] {
            self.stamps.set(w);
        }
    }

    /// Adds the one-step closure `u | w` for every `v -> w`, given `u | v`.
    /// Returns false when `u` turns out to be a unit.
    ///
    /// Requires the implications of `!u` to be stamped.
    fn add_tc1(&mut self, u: Lit, v: Lit) -> bool {
        let idx = v.index();
        let mut i = 0;
        while i < self.binary[idx].len() {
            let w = self.binary[idx][i];
            i += 1;
            if w == !u || w.var() == v.var() || self.is_fixed(w) {
                continue;
            }
            if self.stamps.is_stamped(!w) {
                // u | v, !v | w, u | !w
                self.learn_unit(u);
                return false;
            }
            if !self.stamps.is_stamped(w) {
                self.add_binary(u, w);
                self.stats.learned_binaries += 1;
                self.stamps.set(w);
            }
        }
        true
    }

    /// Adds `u | v` unless it is already implied in one step; may instead
    /// discover that `u` or `v` is a unit and assign it.
    pub(super) fn try_add_binary_unchecked(&mut self, u: Lit, v: Lit) {
        debug_assert_ne!(u.var(), v.var());
        self.set_bstamps(!u);
        if self.stamps.is_stamped(!v) {
            // u | !v together with u | v
            self.learn_unit(u);
        } else if !self.stamps.is_stamped(v) && self.add_tc1(u, v) {
            self.set_bstamps(!v);
            if self.stamps.is_stamped(!u) {
                self.learn_unit(v);
            } else if self.add_tc1(v, u) {
                tracing::trace!(?u, ?v, "learned binary");
                self.add_binary(u, v);
                self.stats.learned_binaries += 1;
            }
        }
    }

    /// Public entry point; forced units are propagated before returning.
    pub fn try_add_binary(&mut self, u: Lit, v: Lit) -> Result<(), LookaheadError> {
        self.check_lit(u)?;
        self.check_lit(v)?;
        if u.var() == v.var() {
            return Err(LookaheadError::SameVar(u, v));
        }
        if self.is_fixed(u) || self.is_fixed(v) {
            return Ok(());
        }
        self.try_add_binary_unchecked(u, v);
        self.propagate();
        Ok(())
    }

    fn learn_unit(&mut self, lit: Lit) {
        tracing::trace!(?lit, "unit from binary closure");
        self.stats.learned_units += 1;
        self.assign(lit);
    }
}

#[cfg(test)]
mod tests {
    use super::Stamps;
    use crate::cancel::Never;
    use crate::cnf::Lit;
    use crate::lookahead::{Lookahead, LookaheadConfig, Outcome, Snapshot, Value};

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

    #[test]
    fn stamps_reset_on_wraparound() {
        let mut s = Stamps::new(4);
        s.id = u32::MAX - 1;
        s.inc();
        s.set(lit(1));
        assert!(s.is_stamped(lit(1)));
        s.inc();
        assert_eq!(s.id, 1);
        assert!(!s.is_stamped(lit(1)));
        assert!(s.stamps.iter().all(|&x| x == 0));
    }

    #[test]
    fn complementary_binary_forces_unit() {
        // 1 | -2 is known; adding 1 | 2 forces 1
        let mut la = engine(2, &[&[1, -2]]);
        la.try_add_binary(lit(1), lit(2)).expect("add");
        assert_eq!(la.value(lit(1)), Value::True);
        assert!(!la.inconsistent());
    }

    #[test]
    fn one_step_closure_forces_unit() {
        // 2 -> 3 and -1 -> -3, so 1 | 2 resolves to 1 | 3 against 1 | -3
        let mut la = engine(3, &[&[-2, 3], &[1, -3]]);
        la.try_add_binary(lit(1), lit(2)).expect("add");
        assert_eq!(la.value(lit(1)), Value::True);
    }

    #[test]
    fn implied_binary_is_not_duplicated() {
        let mut la = engine(2, &[&[1, 2]]);
        la.try_add_binary(lit(1), lit(2)).expect("add");
        la.try_add_binary(lit(2), lit(1)).expect("add");
        assert_eq!(la.implied(lit(-1)), &[lit(2)]);
        assert_eq!(la.implied(lit(-2)), &[lit(1)]);
    }

    #[test]
    fn fresh_binary_and_its_closure_are_added_once() {
        let mut la = engine(4, &[&[-2, 3], &[-2, 4]]);
        la.try_add_binary(lit(1), lit(2)).expect("add");
        // 1 | 2 plus closure 1 | 3 and 1 | 4
        let mut from_neg1 = la.implied(lit(-1)).to_vec();
        from_neg1.sort();
        assert_eq!(from_neg1, vec![lit(2), lit(3), lit(4)]);
        la.try_add_binary(lit(1), lit(3)).expect("add");
        assert_eq!(la.implied(lit(-1)).len(), 3);
        assert_eq!(la.check(&Never), Outcome::Sat);
    }

    #[test]
    fn same_var_is_rejected() {
        let mut la = engine(1, &[]);
        assert!(la.try_add_binary(lit(1), lit(-1)).is_err());
    }
}
