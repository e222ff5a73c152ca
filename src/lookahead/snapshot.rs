use crate::cnf::{Cnf, Lit};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotClause {
    pub lits: Vec<Lit>,
    pub learned: bool,
}

/// One-time copy of the clause database handed over by the CDCL side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub num_vars: u32,
    /// Literals fixed at the top level of the owning solver.
    pub units: Vec<Lit>,
    pub clauses: Vec<SnapshotClause>,
}

impl Snapshot {
    pub fn new(num_vars: u32) -> Self {
        Self {
            num_vars,
            ..Self::default()
        }
    }

    pub fn from_cnf(cnf: &Cnf) -> Self {
        let mut snap = Self::new(cnf.num_vars);
        for clause in &cnf.clauses {
            snap.add_clause(clause.clone(), false);
        }
        snap
    }

    pub fn add_clause(&mut self, lits: Vec<Lit>, learned: bool) {
        self.clauses.push(SnapshotClause { lits, learned });
    }

    pub fn add_unit(&mut self, lit: Lit) {
        self.units.push(lit);
    }
}

/// Shape of a clause after duplicate removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Normalized {
    Tautology,
    Empty,
    Unit(Lit),
    Binary(Lit, Lit),
    Ternary([Lit; 3]),
    Long(Vec<Lit>),
}

pub(crate) fn normalize(lits: &[Lit]) -> Normalized {
    let mut sorted = lits.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    // l and !l are adjacent after sorting
    if sorted.windows(2).any(|w| w[0] == !w[1]) {
        return Normalized::Tautology;
    }
    match sorted.as_slice() {
        [] => Normalized::Empty,
        [a] => Normalized::Unit(*a),
        [a, b] => Normalized::Binary(*a, *b),
        [a, b, c] => Normalized::Ternary([*a, *b, *c]),
        _ => Normalized::Long(sorted),
    }
}
