use std::sync::Arc;

use crate::cancel::{Cancel, Never};
use crate::cnf::{Cnf, Lit};
use crate::lookahead::{Lookahead, LookaheadConfig, Outcome, Snapshot};
use crate::solver::{IncrementalSolver, SolveResult, SolverStats};

/// Rebuilds a lookahead engine from the stored clauses on every `solve`;
/// assumptions enter as snapshot units.
pub struct LookaheadSolver {
    cnf: Cnf,
    config: LookaheadConfig,
    cancel: Arc<dyn Cancel + Send + Sync>,
    last_model: Option<Vec<bool>>,
    stats: SolverStats,
}

impl LookaheadSolver {
    pub fn new(config: LookaheadConfig) -> Self {
        Self {
            cnf: Cnf::new(0),
            config,
            cancel: Arc::new(Never),
            last_model: None,
            stats: SolverStats::default(),
        }
    }

    pub fn with_cancel(mut self, cancel: Arc<dyn Cancel + Send + Sync>) -> Self {
        self.cancel = cancel;
        self
    }
}

impl Default for LookaheadSolver {
    fn default() -> Self {
        Self::new(LookaheadConfig::default())
    }
}

impl IncrementalSolver for LookaheadSolver {
    fn new_var(&mut self) -> u32 {
        self.cnf.fresh_var()
    }

    fn add_clause(&mut self, clause: Vec<Lit>) {
        self.cnf.add_clause(clause);
    }

    fn solve(&mut self, assumptions: &[Lit]) -> SolveResult {
        self.stats.solve_calls += 1;
        self.last_model = None;
        let mut snap = Snapshot::from_cnf(&self.cnf);
        for &a in assumptions {
            snap.num_vars = snap.num_vars.max(a.var() + 1);
            snap.add_unit(a);
        }
        let mut engine = match Lookahead::new(&snap, self.config) {
            Ok(engine) => engine,
            Err(e) => {
                tracing::warn!(error = %e, "lookahead rejected the formula");
                return SolveResult::Unknown;
            }
        };
        let outcome = engine.check(&*self.cancel);
        let st = engine.stats();
        self.stats.decisions += st.decisions as usize;
        self.stats.conflicts += st.backtracks as usize;
        match outcome {
            Outcome::Sat => {
                self.last_model = engine.model().map(<[bool]>::to_vec);
                SolveResult::Sat
            }
            Outcome::Unsat => SolveResult::Unsat,
            Outcome::Unknown => SolveResult::Unknown,
        }
    }

    fn model_value(&self, var: u32) -> Option<bool> {
        self.last_model.as_ref()?.get(var as usize).copied()
    }

    fn stats(&self) -> SolverStats {
        self.stats
    }

    fn backend_name(&self) -> &'static str {
        "lookahead"
    }
}
