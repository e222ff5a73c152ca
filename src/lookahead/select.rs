use super::{Lookahead, Value};
use crate::cnf::{Lit, Var};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub var: Var,
    pub rating: f32,
}

impl Lookahead {
    /// Rates every free variable and keeps the best ones in `self.candidates`.
    /// Returns false when there is nothing left to decide.
    pub(super) fn select(&mut self, level: usize) -> bool {
        self.init_pre_selection(level);
        let max_num_cand = if level == 0 {
            self.free_vars.len()
        } else {
            self.config.level_cand / level
        };
        let max_num_cand = max_num_cand.max(self.config.min_cutoff).max(1);

        let mut sum = self.init_candidates(false);
        if self.candidates.is_empty() {
            sum = self.init_candidates(true);
        }
        if self.candidates.is_empty() {
            debug_assert!(self.is_sat());
            return false;
        }

        // mean filter down to fewer than 2 * max_num_cand
        let mut progress = true;
        while progress && self.candidates.len() >= 2 * max_num_cand {
            progress = false;
            let mean = sum / (self.candidates.len() as f32 + 0.0001);
            sum = 0.0;
            let mut i = 0;
            while i < self.candidates.len() {
                if self.candidates[i].rating >= mean {
                    sum += self.candidates[i].rating;
                    i += 1;
                } else {
                    self.candidates.swap_remove(i);
                    progress = true;
                }
            }
        }

        // then drop the lowest rated through a min-heap
        if self.candidates.len() > max_num_cand {
            for j in (0..self.candidates.len() / 2).rev() {
                self.sift_down(j);
            }
            loop {
                self.candidates.swap_remove(0);
                if self.candidates.len() == max_num_cand {
                    break;
                }
                self.sift_down(0);
            }
        }
        debug_assert!(!self.candidates.is_empty() && self.candidates.len() <= max_num_cand);
        true
    }

    fn sift_down(&mut self, j: usize) {
        let c = self.candidates[j];
        let len = self.candidates.len();
        let mut i = j;
        let mut k = 2 * j + 1;
        while k < len {
            if k + 1 < len && self.candidates[k + 1].rating < self.candidates[k].rating {
                k += 1;
            }
            if c.rating <= self.candidates[k].rating {
                break;
            }
            self.candidates[i] = self.candidates[k];
            i = k;
            k = 2 * k + 1;
        }
        self.candidates[i] = c;
    }

    /// `newbies` would relax a prefix-based filter; no such filter is applied
    /// so both passes admit every free variable.
    fn init_candidates(&mut self, _newbies: bool) -> f32 {
        self.candidates.clear();
        let mut sum = 0.0;
        for &x in &self.free_vars {
            let rating = self.rating[x as usize];
            self.candidates.push(Candidate { var: x, rating });
            sum += rating;
        }
        sum
    }

    /// True when every clause is satisfied by the literals already true.
    pub fn is_sat(&self) -> bool {
        for &v in &self.free_vars {
            for l in [Lit::positive(v), Lit::negative(v)] {
                if !self.binary[l.index()].iter().all(|&w| self.is_true(w)) {
                    return false;
                }
            }
        }
        let satisfied = |c: &[Lit]| c.iter().any(|&l| self.is_true(l));
        self.ternary.iter().all(|t| satisfied(&t[..]))
            && self.clauses.iter().all(|c| satisfied(c.as_slice()))
    }

    fn init_pre_selection(&mut self, level: usize) {
        let max_level = self.config.max_hlevel.max(2);
        if level <= 1 {
            self.ensure_h(2);
            self.h[0].fill(1.0);
            self.h_scores(0, 1);
            for _ in 0..2 {
                for i in 0..2 {
                    self.h_scores(i + 1, (i + 2) % 3);
                }
            }
        } else if level < max_level {
            self.ensure_h(level);
            self.h_scores(level - 1, level);
        } else {
            self.ensure_h(max_level);
            self.h_scores(max_level - 1, max_level);
        }
    }

    fn ensure_h(&mut self, level: usize) {
        let lits = 2 * self.num_vars as usize;
        while self.h.len() <= level {
            self.h.push(vec![1.0; lits]);
        }
    }

    /// One relaxation sweep from `self.h[from]` into `self.h[to]`; also refreshes `rating`.
    fn h_scores(&mut self, from: usize, to: usize) {
        debug_assert_ne!(from, to);
        let mut hp = std::mem::take(&mut self.h[to]);
        let mut rating = std::mem::take(&mut self.rating);
        let h = &self.h[from];

        let sum: f32 = self
            .free_vars
            .iter()
            .map(|&v| h[Lit::positive(v).index()] + h[Lit::negative(v).index()])
            .sum();
        let factor = if sum > 0.0 && sum.is_finite() {
            2.0 * self.free_vars.len() as f32 / sum
        } else {
            1.0
        };
        let afactor = factor * self.config.alpha;

        for &v in &self.free_vars {
            let l = Lit::positive(v);
            let pos = self.l_score(l, h, afactor);
            let neg = self.l_score(!l, h, afactor);
            hp[l.index()] = pos;
            hp[(!l).index()] = neg;
            rating[v as usize] = pos * neg;
        }

        self.h[to] = hp;
        self.rating = rating;
    }

    /// Binary-implication score of `l`; ternary clauses do not contribute.
    fn l_score(&self, l: Lit, h: &[f32], afactor: f32) -> f32 {
        let sum: f32 = self.binary[l.index()]
            .iter()
            .filter(|&&w| self.value(w) == Value::Undef)
            .map(|w| h[w.index()])
            .sum();
        (0.1 + afactor * sum).min(self.config.max_score)
    }

    /// Runs rating and candidate reduction at the current level without probing.
    pub fn preselect(&mut self) -> Vec<Candidate> {
        if self.inconsistent || !self.select(self.scope_level()) {
            return Vec::new();
        }
        self.candidates.clone()
    }
}

#[cfg(test)]
mod tests {
    use crate::cnf::Lit;
    use crate::cnf::random::random_ksat;
    use crate::lookahead::{Lookahead, LookaheadConfig, Snapshot};

    fn lit(d: i64) -> Lit {
        Lit::from_dimacs(d).expect("lit")
    }

    #[test]
    fn rating_is_idempotent() {
        let cnf = random_ksat(60, 50, 2, 3).expect("gen");
        let mut la = Lookahead::from_cnf(&cnf, LookaheadConfig::default()).expect("init");
        let a = la.preselect();
        let b = la.preselect();
        assert!(!a.is_empty());
        assert_eq!(a, b);

        la.push(Lit::positive(0)).expect("push");
        la.push(Lit::positive(1)).expect("push");
        la.push(Lit::positive(2)).expect("push");
        if !la.inconsistent() {
            let c = la.preselect();
            let d = la.preselect();
            assert_eq!(c, d);
        }
    }

    #[test]
    fn central_variable_rates_highest() {
        // variable 1 implies or is implied by everything else
        let mut snap = Snapshot::new(6);
        for d in 2..=6 {
            snap.add_clause(vec![lit(1), lit(d)], false);
            snap.add_clause(vec![lit(-1), lit(-d)], false);
        }
        let mut la = Lookahead::new(&snap, LookaheadConfig::default()).expect("init");
        let cands = la.preselect();
        let best = cands
            .iter()
            .max_by(|a, b| a.rating.total_cmp(&b.rating))
            .expect("candidate");
        assert_eq!(best.var, 0);
    }

    #[test]
    fn candidate_set_is_bounded() {
        let cnf = random_ksat(200, 150, 2, 11).expect("gen");
        let cfg = LookaheadConfig {
            min_cutoff: 10,
            level_cand: 40,
            ..LookaheadConfig::default()
        };
        let mut la = Lookahead::from_cnf(&cnf, cfg).expect("init");
        // level 0 keeps every free variable
        let free = la.num_free();
        assert_eq!(la.preselect().len(), free);

        let mut pushed = 0;
        for v in 0..200 {
            let l = Lit::positive(v);
            if la.value(l) == crate::lookahead::Value::Undef {
                la.push(l).expect("push");
                if la.inconsistent() {
                    la.pop().expect("pop");
                    continue;
                }
                pushed += 1;
                if pushed == 2 {
                    break;
                }
            }
        }
        assert_eq!(la.scope_level(), 2);
        let cands = la.preselect();
        assert!(!cands.is_empty());
        assert!(cands.len() <= 20);
        let mut vars = cands.iter().map(|c| c.var).collect::<Vec<_>>();
        vars.sort_unstable();
        vars.dedup();
        assert_eq!(vars.len(), cands.len());
    }
}
