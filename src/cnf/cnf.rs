use std::fmt;
use std::ops::Not;

pub type Var = u32;

/// A literal packed as `2 * var + negated`, so `index(!l) == index(l) ^ 1`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lit(u32);

impl Lit {
    /// Largest variable that still fits the packed encoding.
    pub const MAX_VAR: Var = u32::MAX >> 1;

    pub fn new(var: Var, positive: bool) -> Self {
        debug_assert!(var <= Self::MAX_VAR, "variable {var} does not fit a packed literal");
        Self(var << 1 | u32::from(!positive))
    }

    pub fn positive(var: Var) -> Self {
        Self::new(var, true)
    }

    pub fn negative(var: Var) -> Self {
        Self::new(var, false)
    }

    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// DIMACS literals are 1-based and signed; 0 and variables past
    /// `MAX_VAR` are rejected.
    pub fn from_dimacs(lit: i64) -> Option<Self> {
        if lit == 0 {
            return None;
        }
        let var = u32::try_from(lit.unsigned_abs() - 1).ok()?;
        if var > Self::MAX_VAR {
            return None;
        }
        Some(Self::new(var, lit > 0))
    }

    pub fn to_dimacs(self) -> i64 {
        let v = i64::from(self.var()) + 1;
        if self.is_positive() { v } else { -v }
    }

    pub fn var(self) -> Var {
        self.0 >> 1
    }

    pub fn is_positive(self) -> bool {
        self.0 & 1 == 0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Not for Lit {
    type Output = Lit;

    fn not(self) -> Lit {
        Lit(self.0 ^ 1)
    }
}

impl fmt::Debug for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_dimacs())
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_dimacs())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cnf {
    pub num_vars: u32,
    pub clauses: Vec<Vec<Lit>>,
}

impl Cnf {
    pub fn new(num_vars: u32) -> Self {
        Self {
            num_vars,
            clauses: Vec::new(),
        }
    }

    pub fn add_clause(&mut self, clause: Vec<Lit>) {
        for &lit in &clause {
            self.num_vars = self.num_vars.max(lit.var() + 1);
        }
        self.clauses.push(clause);
    }

    pub fn fresh_var(&mut self) -> Var {
        let v = self.num_vars;
        self.num_vars = self.num_vars.saturating_add(1);
        v
    }

    pub fn max_clause_width(&self) -> usize {
        self.clauses.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Evaluates under a total model indexed by variable.
    pub fn eval(&self, model: &[bool]) -> bool {
        self.clauses.iter().all(|clause| {
            clause.iter().any(|&lit| {
                model
                    .get(lit.var() as usize)
                    .is_some_and(|&v| v == lit.is_positive())
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Cnf, Lit};

    #[test]
    fn negation_flips_lowest_index_bit() {
        for var in 0..8 {
            let pos = Lit::positive(var);
            assert_eq!((!pos).index(), pos.index() ^ 1);
            assert_eq!(!!pos, pos);
            assert_eq!(pos.var(), (!pos).var());
            assert!(pos.is_positive());
            assert!(!(!pos).is_positive());
        }
    }

    #[test]
    fn dimacs_numbering_is_one_based() {
        let l = Lit::from_dimacs(-3).expect("lit");
        assert_eq!(l.var(), 2);
        assert!(!l.is_positive());
        assert_eq!(l.to_dimacs(), -3);
        assert!(Lit::from_dimacs(0).is_none());
    }

    #[test]
    fn wide_dimacs_literals_do_not_wrap() {
        assert!(Lit::from_dimacs(2_147_483_649).is_none());
        assert!(Lit::from_dimacs(-2_147_483_649).is_none());
        assert!(Lit::from_dimacs(i64::MIN).is_none());
        let top = Lit::from_dimacs(2_147_483_648).expect("lit");
        assert_eq!(top.var(), Lit::MAX_VAR);
        assert_eq!(top.to_dimacs(), 2_147_483_648);
    }

    #[test]
    fn total_eval_reads_model_by_variable() {
        let mut cnf = Cnf::new(0);
        cnf.add_clause(vec![Lit::positive(0), Lit::negative(1)]);
        assert_eq!(cnf.num_vars, 2);
        assert!(cnf.eval(&[true, true]));
        assert!(cnf.eval(&[false, false]));
        assert!(!cnf.eval(&[false, true]));
        // missing variables never satisfy a literal
        assert!(!cnf.eval(&[]));
    }
}
