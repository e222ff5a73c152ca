//! Lookahead SAT engine in the style of march: unit propagation over a
//! dynamic binary implication table, h-score pre-selection, SCC compression
//! of the candidate implication graph, and failed-literal probing with
//! optional double lookahead.

mod binary;
mod choose;
pub mod config;
mod propagate;
mod scc;
mod select;
pub mod snapshot;

use std::collections::HashSet;

use indexmap::IndexSet;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::cancel::Cancel;
use crate::cnf::{Cnf, Lit, Var};

use binary::Stamps;
pub use config::LookaheadConfig;
use propagate::Watch;
pub use scc::{Contradiction, LiteralOffset};
use scc::Forest;
pub use select::Candidate;
use snapshot::{Normalized, normalize};
pub use snapshot::{Snapshot, SnapshotClause};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    True,
    False,
    Undef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Sat,
    Unsat,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookaheadError {
    #[error("literal {lit} refers to variable {var} but only {num_vars} variables exist")]
    VarOutOfRange { lit: Lit, var: Var, num_vars: u32 },
    #[error("binary clause over a single variable: {0} {1}")]
    SameVar(Lit, Lit),
    #[error("pop without a matching push")]
    EmptyScope,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub propagations: u64,
    pub decisions: u64,
    pub backtracks: u64,
    pub probes: u64,
    pub failed_literals: u64,
    pub double_lookaheads: u64,
    pub learned_binaries: u64,
    pub learned_units: u64,
    pub sccs: u64,
    pub scc_conflicts: u64,
}

pub struct Lookahead {
    config: LookaheadConfig,
    num_vars: u32,
    delta_trigger: f64,

    // literal -> value, kept symmetric for l and !l
    assignment: Vec<Value>,
    trail: Vec<Lit>,
    trail_lim: Vec<usize>,
    qhead: usize,
    // qhead and conflict flag at each push
    qhead_lim: Vec<(usize, bool)>,
    free_vars: IndexSet<Var>,
    inconsistent: bool,

    // literals derived through ternary/long clauses while probing
    windfalls: Vec<Lit>,
    windfalls_lim: Vec<usize>,

    // literal -> literals it implies
    binary: Vec<Vec<Lit>>,
    binary_trail: Vec<(Lit, Lit)>,
    binary_trail_lim: Vec<usize>,
    stamps: Stamps,

    ternary: Vec<[Lit; 3]>,
    clauses: Vec<Vec<Lit>>,
    watches: Vec<Vec<Watch>>,

    h: Vec<Vec<f32>>,
    rating: Vec<f32>,
    candidates: Vec<Candidate>,
    forest: Forest,

    model: Option<Vec<bool>>,
    rng: ChaCha8Rng,
    stats: Stats,
}

impl Lookahead {
    pub fn new(snapshot: &Snapshot, config: LookaheadConfig) -> Result<Self, LookaheadError> {
        let n = snapshot.num_vars;
        let lits = 2 * n as usize;
        let mut la = Self {
            config,
            num_vars: n,
            delta_trigger: initial_delta_trigger(n),
            assignment: vec![Value::Undef; lits],
            trail: Vec::new(),
            trail_lim: Vec::new(),
            qhead: 0,
            qhead_lim: Vec::new(),
            free_vars: (0..n).collect(),
            inconsistent: false,
            windfalls: Vec::new(),
            windfalls_lim: Vec::new(),
            binary: vec![Vec::new(); lits],
            binary_trail: Vec::new(),
            binary_trail_lim: Vec::new(),
            stamps: Stamps::new(lits),
            ternary: Vec::new(),
            clauses: Vec::new(),
            watches: vec![Vec::new(); lits],
            h: Vec::new(),
            rating: vec![0.0; n as usize],
            candidates: Vec::new(),
            forest: Forest::new(lits),
            model: None,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            stats: Stats::default(),
        };

        let mut units = Vec::new();
        let mut seen_binary = HashSet::new();
        for clause in &snapshot.clauses {
            for &lit in &clause.lits {
                la.check_lit(lit)?;
            }
            match normalize(&clause.lits) {
                Normalized::Tautology => {}
                Normalized::Empty => la.set_conflict(),
                Normalized::Unit(l) => units.push(l),
                Normalized::Binary(a, b) => {
                    // learned binaries stay with the CDCL side
                    if !clause.learned && seen_binary.insert((a, b)) {
                        la.add_binary(a, b);
                    }
                }
                Normalized::Ternary(t) => la.attach_ternary(t),
                Normalized::Long(c) => la.attach_clause(c),
            }
        }
        for &lit in &snapshot.units {
            la.check_lit(lit)?;
            units.push(lit);
        }
        for lit in units {
            la.assign(lit);
        }
        la.propagate();
        tracing::debug!(
            vars = n,
            binary = la.binary_trail.len(),
            ternary = la.ternary.len(),
            long = la.clauses.len(),
            fixed = la.trail.len(),
            inconsistent = la.inconsistent,
            "lookahead initialized"
        );
        Ok(la)
    }

    pub fn from_cnf(cnf: &Cnf, config: LookaheadConfig) -> Result<Self, LookaheadError> {
        Self::new(&Snapshot::from_cnf(cnf), config)
    }

    fn check_lit(&self, lit: Lit) -> Result<(), LookaheadError> {
        if lit.var() >= self.num_vars {
            return Err(LookaheadError::VarOutOfRange {
                lit,
                var: lit.var(),
                num_vars: self.num_vars,
            });
        }
        Ok(())
    }

    pub fn config(&self) -> &LookaheadConfig {
        &self.config
    }

    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn value(&self, lit: Lit) -> Value {
        self.assignment[lit.index()]
    }

    pub fn inconsistent(&self) -> bool {
        self.inconsistent
    }

    pub fn num_free(&self) -> usize {
        self.free_vars.len()
    }

    pub fn free_vars(&self) -> &IndexSet<Var> {
        &self.free_vars
    }

    pub fn scope_level(&self) -> usize {
        self.trail_lim.len()
    }

    pub fn trail(&self) -> &[Lit] {
        &self.trail
    }

    /// Literals directly implied by `lit` through binary clauses.
    pub fn implied(&self, lit: Lit) -> &[Lit] {
        &self.binary[lit.index()]
    }

    /// Literals fixed outside of any scope.
    pub fn root_units(&self) -> &[Lit] {
        let end = self.trail_lim.first().copied().unwrap_or(self.trail.len());
        &self.trail[..end]
    }

    /// Satisfying assignment indexed by variable, available after `Outcome::Sat`.
    pub fn model(&self) -> Option<&[bool]> {
        self.model.as_deref()
    }

    /// Opens a scope, asserts `lit` and propagates.
    pub fn push(&mut self, lit: Lit) -> Result<(), LookaheadError> {
        self.check_lit(lit)?;
        self.push_scope(lit);
        Ok(())
    }

    /// Undoes everything since the matching `push`, including learned binaries.
    pub fn pop(&mut self) -> Result<(), LookaheadError> {
        if self.trail_lim.is_empty() {
            return Err(LookaheadError::EmptyScope);
        }
        self.pop_scope();
        Ok(())
    }

    /// Runs the search from the current scope and returns to it afterwards.
    pub fn check(&mut self, cancel: &dyn Cancel) -> Outcome {
        self.model = None;
        if self.inconsistent {
            tracing::debug!(level = self.scope_level(), "UNSAT before search");
            return Outcome::Unsat;
        }
        let base = self.trail_lim.len();
        let outcome = self.search(cancel);
        if outcome == Outcome::Sat {
            self.model = Some(self.current_model());
        }
        while self.trail_lim.len() > base {
            self.pop_scope();
        }
        outcome
    }

    fn search(&mut self, cancel: &dyn Cancel) -> Outcome {
        let mut decisions = Vec::<Lit>::new();
        loop {
            if cancel.is_cancelled() {
                tracing::debug!(decisions = self.stats.decisions, "interrupted");
                return Outcome::Unknown;
            }
            if self
                .config
                .max_decisions
                .is_some_and(|max| self.stats.decisions >= max)
            {
                tracing::debug!(decisions = self.stats.decisions, "decision limit reached");
                return Outcome::Unknown;
            }
            let choice = self.choose();
            if self.inconsistent {
                if !self.backtrack(&mut decisions) {
                    tracing::debug!("UNSAT");
                    return Outcome::Unsat;
                }
                continue;
            }
            let Some(lit) = choice else {
                tracing::debug!("SAT");
                return Outcome::Sat;
            };
            self.stats.decisions += 1;
            tracing::trace!(?lit, level = decisions.len(), "decision");
            self.push_scope(lit);
            decisions.push(lit);
        }
    }

    fn backtrack(&mut self, decisions: &mut Vec<Lit>) -> bool {
        let Some(lit) = decisions.pop() else {
            return false;
        };
        self.stats.backtracks += 1;
        self.pop_scope();
        tracing::trace!(?lit, level = decisions.len(), "backtrack");
        self.assign(!lit);
        self.propagate();
        true
    }

    fn current_model(&self) -> Vec<bool> {
        (0..self.num_vars)
            .map(|v| self.value(Lit::positive(v)) == Value::True)
            .collect()
    }
}

fn initial_delta_trigger(num_vars: u32) -> f64 {
    f64::from(num_vars) / 10.0
}
