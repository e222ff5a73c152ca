use rand::Rng;

use super::{Lookahead, Value, initial_delta_trigger};
use crate::cnf::Lit;

enum Step {
    Branch(Lit),
    /// Nothing left to decide, or the current scope is inconsistent.
    Finished,
    /// Probing fixed enough literals that pre-selection has to run again.
    Retry,
}

/// Joint reduction score; both polarities shrinking the problem beats one.
fn mix_diff(l: usize, r: usize) -> u64 {
    let (l, r) = (l as u64, r as u64);
    l + r + 1024 * l * r
}

impl Lookahead {
    /// Picks the next decision literal. `None` means either that no free
    /// variable is left or that probing exposed a conflict; the caller
    /// tells the two apart through `inconsistent()`.
    pub fn choose(&mut self) -> Option<Lit> {
        loop {
            if self.inconsistent {
                return None;
            }
            match self.choose1() {
                Step::Branch(lit) => return Some(lit),
                Step::Finished => return None,
                Step::Retry => {
                    tracing::trace!(free = self.num_free(), "probing fixed literals, reselecting");
                }
            }
        }
    }

    fn choose1(&mut self) -> Step {
        let probes = self.pre_select();
        if probes.is_empty() {
            return Step::Finished;
        }
        let mut best: Option<(Lit, u64)> = None;
        let mut count = 1u32;

        for &lit in &probes {
            if self.is_fixed(lit) {
                continue;
            }

            self.stats.probes += 1;
            self.push_scope(lit);
            if self.do_double() {
                self.double_look(&probes);
            }
            if self.inconsistent {
                self.pop_probe(lit, false);
                self.force(!lit);
                if self.do_double() {
                    self.double_look(&probes);
                }
                if self.inconsistent {
                    return Step::Finished;
                }
                continue;
            }
            let diff1 = self.diff();
            self.pop_probe(lit, true);
            if self.inconsistent {
                return Step::Finished;
            }
            if self.is_fixed(lit) {
                continue;
            }

            self.stats.probes += 1;
            self.push_scope(!lit);
            if self.do_double() {
                self.double_look(&probes);
            }
            let unsat2 = self.inconsistent;
            let diff2 = self.diff();
            self.pop_probe(!lit, !unsat2);
            if self.inconsistent {
                return Step::Finished;
            }
            if unsat2 {
                self.force(lit);
                if self.inconsistent {
                    return Step::Finished;
                }
                continue;
            }
            if self.is_fixed(lit) {
                continue;
            }

            let mixd = mix_diff(diff1, diff2);
            let take = match best {
                None => true,
                Some((_, h)) if mixd > h => {
                    count = 1;
                    true
                }
                Some((_, h)) if mixd == h => {
                    count += 1;
                    self.rng.random_range(0..count) == 0
                }
                Some(_) => false,
            };
            if take {
                let polarity = if diff1 < diff2 { lit } else { !lit };
                best = Some((polarity, mixd));
            }
        }

        match best {
            Some((lit, score)) if self.value(lit) == Value::Undef => {
                tracing::trace!(?lit, score, level = self.scope_level(), "branch");
                Step::Branch(lit)
            }
            _ => Step::Retry,
        }
    }

    fn do_double(&self) -> bool {
        self.config.double_lookahead
            && !self.inconsistent
            && self.diff() as f64 > self.delta_trigger
    }

    /// Probes every free literal of `probes` one level below the current
    /// scope and asserts the failed ones.
    fn double_look(&mut self, probes: &[Lit]) {
        self.stats.double_lookaheads += 1;
        for &lit in probes {
            if self.inconsistent {
                break;
            }
            if self.is_fixed(lit) {
                continue;
            }
            self.stats.probes += 1;
            self.push_scope(lit);
            let unsat = self.inconsistent;
            self.pop_probe(lit, false);
            if unsat {
                self.force(!lit);
                continue;
            }

            self.stats.probes += 1;
            self.push_scope(!lit);
            let unsat = self.inconsistent;
            self.pop_probe(!lit, false);
            if unsat {
                self.force(lit);
            }
        }
        self.update_delta_trigger();
    }

    fn update_delta_trigger(&mut self) {
        if self.inconsistent {
            let dl = self.config.dl_success;
            self.delta_trigger = (self.delta_trigger - (1.0 - dl) / dl).max(0.0);
        } else {
            self.delta_trigger += 1.0;
        }
        if self.delta_trigger >= f64::from(self.num_vars) {
            self.delta_trigger = initial_delta_trigger(self.num_vars);
        }
    }
}
