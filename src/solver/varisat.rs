use varisat::ExtendFormula;

use crate::cnf::Lit;
use crate::solver::{IncrementalSolver, SolveResult, SolverStats};

/// CDCL reference backend.
pub struct VarisatSolver {
    inner: varisat::Solver<'static>,
    vars: Vec<varisat::Var>,
    last_model: Option<Vec<varisat::Lit>>,
    stats: SolverStats,
}

impl VarisatSolver {
    pub fn new() -> Self {
        Self {
            inner: varisat::Solver::new(),
            vars: Vec::new(),
            last_model: None,
            stats: SolverStats::default(),
        }
    }

    fn to_var(&mut self, v: u32) -> varisat::Var {
        while self.vars.len() <= v as usize {
            self.new_var();
        }
        self.vars[v as usize]
    }

    fn to_lit(&mut self, lit: Lit) -> varisat::Lit {
        let var = self.to_var(lit.var());
        varisat::Lit::from_var(var, lit.is_positive())
    }
}

impl Default for VarisatSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl IncrementalSolver for VarisatSolver {
    fn new_var(&mut self) -> u32 {
        let v = self.inner.new_var();
        self.vars.push(v);
        self.vars.len() as u32 - 1
    }

    fn add_clause(&mut self, clause: Vec<Lit>) {
        let lits = clause
            .into_iter()
            .map(|x| self.to_lit(x))
            .collect::<Vec<_>>();
        self.inner.add_clause(&lits);
    }

    fn solve(&mut self, assumptions: &[Lit]) -> SolveResult {
        self.stats.solve_calls += 1;
        let assumps = assumptions
            .iter()
            .map(|&x| self.to_lit(x))
            .collect::<Vec<_>>();
        self.inner.assume(&assumps);
        match self.inner.solve() {
            Ok(true) => {
                self.last_model = self.inner.model();
                SolveResult::Sat
            }
            Ok(false) => {
                self.last_model = None;
                SolveResult::Unsat
            }
            Err(e) => {
                tracing::warn!(error = ?e, "varisat gave up");
                self.last_model = None;
                SolveResult::Unknown
            }
        }
    }

    fn model_value(&self, var: u32) -> Option<bool> {
        let v = *self.vars.get(var as usize)?;
        let model = self.last_model.as_ref()?;
        if model.contains(&v.lit(true)) {
            Some(true)
        } else if model.contains(&v.lit(false)) {
            Some(false)
        } else {
            None
        }
    }

    fn stats(&self) -> SolverStats {
        self.stats
    }

    fn backend_name(&self) -> &'static str {
        "varisat"
    }
}
