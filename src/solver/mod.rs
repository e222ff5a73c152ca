pub mod lookahead_backend;
pub mod varisat;

use anyhow::{Result, bail};

use crate::cnf::{Cnf, Lit};
use crate::lookahead::LookaheadConfig;

pub use lookahead_backend::LookaheadSolver;
pub use self::varisat::VarisatSolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveResult {
    Sat,
    Unsat,
    /// Interrupted or out of budget.
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolverStats {
    pub solve_calls: usize,
    pub decisions: usize,
    pub conflicts: usize,
}

/// Clause-level interface shared by the lookahead engine and the CDCL reference.
/// Variables are 0-based, as in `Lit`.
pub trait IncrementalSolver {
    fn new_var(&mut self) -> u32;
    fn add_clause(&mut self, clause: Vec<Lit>);
    fn solve(&mut self, assumptions: &[Lit]) -> SolveResult;
    fn model_value(&self, var: u32) -> Option<bool>;
    fn stats(&self) -> SolverStats;
    fn backend_name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Lookahead,
    Varisat,
}

impl Backend {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "lookahead" => Ok(Backend::Lookahead),
            "varisat" => Ok(Backend::Varisat),
            _ => bail!("unknown backend '{}', expected lookahead|varisat", s),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Backend::Lookahead => "lookahead",
            Backend::Varisat => "varisat",
        }
    }

    /// Whether a running solve stops when its cancel flag is raised.
    /// `varisat` runs to completion once started.
    pub fn cancellable(self) -> bool {
        match self {
            Backend::Lookahead => true,
            Backend::Varisat => false,
        }
    }

    /// Builds a solver of this kind loaded with every clause of `cnf`.
    pub fn load(self, cnf: &Cnf, config: LookaheadConfig) -> Box<dyn IncrementalSolver> {
        let mut solver: Box<dyn IncrementalSolver> = match self {
            Backend::Lookahead => Box::new(LookaheadSolver::new(config)),
            Backend::Varisat => Box::new(VarisatSolver::new()),
        };
        for _ in 0..cnf.num_vars {
            solver.new_var();
        }
        for clause in &cnf.clauses {
            solver.add_clause(clause.clone());
        }
        solver
    }
}
