//! Strongly connected components of the candidate implication graph and the
//! lookahead forest built on top of them (Knuth, SAT11 §§103-121).
//!
//! Arcs point against the implications: for `l -> u` there are arcs `u -> l`
//! and `!l -> !u`. Every record lives in one array indexed by literal.

use indexmap::IndexMap;

use super::binary::Stamps;
use super::select::Candidate;
use super::{Lookahead, Value};
use crate::cnf::Lit;

const SETTLED: u32 = u32::MAX;

/// A literal equivalent to its own negation under the binary clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contradiction(pub Lit);

/// Probe-table entry: the class representative, its offset, and the
/// representative of its parent in the forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralOffset {
    pub lit: Lit,
    pub offset: u32,
    pub parent: Option<Lit>,
}

#[derive(Debug, Clone, Default)]
struct DfsInfo {
    rank: u32,
    height: u32,
    parent: Option<Lit>,
    next: Vec<Lit>,
    nextp: usize,
    link: Option<Lit>,
    min: Option<Lit>,
    vcomp: Option<Lit>,
    child: Option<Lit>,
    sibling: Option<Lit>,
}

impl DfsInfo {
    fn reset(&mut self) {
        self.rank = 0;
        self.height = 0;
        self.parent = None;
        self.next.clear();
        self.nextp = 0;
        self.link = None;
        self.min = None;
        self.vcomp = None;
        self.child = None;
        self.sibling = None;
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Forest {
    dfs: Vec<DfsInfo>,
    rank: u32,
    active: Option<Lit>,
    settled: Option<Lit>,
    root_child: Option<Lit>,
    table: Vec<LiteralOffset>,
    components: usize,
}

impl Forest {
    pub(crate) fn new(num_lits: usize) -> Self {
        Self {
            dfs: vec![DfsInfo::default(); num_lits],
            rank: 0,
            active: None,
            settled: None,
            root_child: None,
            table: Vec::new(),
            components: 0,
        }
    }

    fn info(&self, l: Lit) -> &DfsInfo {
        &self.dfs[l.index()]
    }

    fn info_mut(&mut self, l: Lit) -> &mut DfsInfo {
        &mut self.dfs[l.index()]
    }

    fn rank_of(&self, l: Lit) -> u32 {
        self.info(l).rank
    }

    /// Component representative of a settled literal.
    fn parent_of(&self, l: Lit) -> Lit {
        self.info(l).parent.unwrap_or(l)
    }

    fn vcomp_of(&self, l: Lit) -> Lit {
        self.info(l).vcomp.unwrap_or(l)
    }

    fn child_of(&self, u: Option<Lit>) -> Option<Lit> {
        match u {
            None => self.root_child,
            Some(u) => self.info(u).child,
        }
    }

    fn set_child(&mut self, u: Option<Lit>, c: Option<Lit>) {
        match u {
            None => self.root_child = c,
            Some(u) => self.info_mut(u).child = c,
        }
    }

    fn pop_arc(&mut self, u: Lit) -> Option<Lit> {
        let info = self.info_mut(u);
        let arc = info.next.get(info.nextp).copied();
        if arc.is_some() {
            info.nextp += 1;
        }
        arc
    }

    /// Resets the records of both polarities of each candidate and builds
    /// the arcs among them. Candidate literals must be stamped.
    fn init(&mut self, candidates: &[Candidate], binary: &[Vec<Lit>], stamps: &Stamps) {
        for c in candidates {
            let l = Lit::positive(c.var);
            self.info_mut(l).reset();
            self.info_mut(!l).reset();
        }
        for c in candidates {
            let l = Lit::positive(c.var);
            self.init_arcs(l, binary, stamps);
            self.init_arcs(!l, binary, stamps);
        }
        self.rank = 0;
        self.active = None;
        self.settled = None;
        self.components = 0;
    }

    fn init_arcs(&mut self, l: Lit, binary: &[Vec<Lit>], stamps: &Stamps) {
        for &u in &binary[l.index()] {
            debug_assert_ne!(u, l);
            // each clause shows up twice in the table; the index test keeps one copy
            if u.index() > l.index() && stamps.is_stamped(u) {
                self.info_mut(!l).next.push(!u);
                self.info_mut(u).next.push(l);
            }
        }
    }

    fn get_scc(&mut self, candidates: &[Candidate], rating: &[f32]) -> Result<(), Contradiction> {
        for c in candidates {
            let l = Lit::positive(c.var);
            if self.rank_of(l) == 0 {
                self.scc_from(l, rating)?;
            }
            if self.rank_of(!l) == 0 {
                self.scc_from(!l, rating)?;
            }
        }
        Ok(())
    }

    fn activate(&mut self, l: Lit) {
        debug_assert_eq!(self.rank_of(l), 0);
        self.rank += 1;
        let rank = self.rank;
        let active = self.active;
        let info = self.info_mut(l);
        info.rank = rank;
        info.link = active;
        info.min = Some(l);
        self.active = Some(l);
    }

    /// Depth-first search without recursion; the tree parent doubles as the return stack.
    fn scc_from(&mut self, root: Lit, rating: &[f32]) -> Result<(), Contradiction> {
        self.info_mut(root).parent = None;
        self.activate(root);
        let mut cur = Some(root);
        while let Some(v) = cur {
            let ll = self.info(v).min.unwrap_or(v);
            match self.pop_arc(v) {
                Some(u) => {
                    let r = self.rank_of(u);
                    if r > 0 {
                        if r < self.rank_of(ll) {
                            self.info_mut(v).min = Some(u);
                        }
                    } else {
                        self.info_mut(u).parent = Some(v);
                        self.activate(u);
                        cur = Some(u);
                    }
                }
                None => {
                    let u = self.info(v).parent;
                    if v == ll {
                        self.found_scc(v, rating)?;
                    } else if let Some(u) = u {
                        let umin = self.info(u).min.unwrap_or(u);
                        if self.rank_of(ll) < self.rank_of(umin) {
                            self.info_mut(u).min = Some(ll);
                        }
                    }
                    cur = u;
                }
            }
        }
        Ok(())
    }

    /// Settles the component rooted at `v`; its best rated member becomes `vcomp`.
    fn found_scc(&mut self, v: Lit, rating: &[f32]) -> Result<(), Contradiction> {
        let top = self.active;
        self.active = self.info(v).link;
        let mut best = v;
        let mut best_rating = rating[v.var() as usize];
        self.info_mut(v).rank = SETTLED;
        let mut t = top;
        while let Some(x) = t {
            if x == v {
                break;
            }
            if x == !v {
                return Err(Contradiction(v));
            }
            let info = self.info_mut(x);
            info.rank = SETTLED;
            info.parent = Some(v);
            let r = rating[x.var() as usize];
            if r > best_rating {
                best = x;
                best_rating = r;
            }
            t = self.info(x).link;
        }
        self.info_mut(v).parent = Some(v);
        self.info_mut(v).vcomp = Some(best);
        if self.rank_of(!v) == SETTLED {
            // the complementary class is settled already; mirror its choice
            let mirrored = !self.vcomp_of(self.parent_of(!v));
            self.info_mut(v).vcomp = Some(mirrored);
        }
        self.info_mut(v).link = self.settled;
        self.settled = top;
        self.components += 1;
        Ok(())
    }

    /// Hangs every class under the tallest class it implies.
    fn find_heights(&mut self) {
        self.root_child = None;
        let mut pp: Option<Lit> = None;
        let mut h = 0;
        let mut w: Option<Lit> = None;
        let mut cur = self.settled;
        while let Some(u) = cur {
            cur = self.info(u).link;
            let p = self.parent_of(u);
            if pp != Some(p) {
                h = 0;
                w = None;
                pp = Some(p);
            }
            let nu = !u;
            for j in 0..self.info(nu).next.len() {
                let v = !self.info(nu).next[j];
                let pv = self.parent_of(v);
                if pv == p {
                    continue;
                }
                let hh = self.info(pv).height;
                if hh >= h {
                    h = hh + 1;
                    w = Some(pv);
                }
            }
            if p == u {
                let sibling = self.child_of(w);
                let info = self.info_mut(u);
                info.height = h;
                info.child = None;
                info.sibling = sibling;
                self.set_child(w, Some(u));
            }
        }
    }

    /// Preorder walk of the forest; offsets are handed out in postorder, two per entry.
    fn construct_lookahead_table(&mut self) {
        self.table.clear();
        let mut u = self.child_of(None);
        let mut v: Option<Lit> = None;
        let mut offset = 0u32;
        while let Some(x) = u {
            self.info_mut(x).rank = self.table.len() as u32;
            let parent = v.map(|p| self.vcomp_of(p));
            self.table.push(LiteralOffset {
                lit: self.vcomp_of(x),
                offset: 0,
                parent,
            });
            if let Some(c) = self.info(x).child {
                self.info_mut(x).parent = v;
                v = Some(x);
                u = Some(c);
                continue;
            }
            let mut x = x;
            loop {
                let pos = self.rank_of(x) as usize;
                self.table[pos].offset = offset;
                offset += 2;
                let sibling = self.info(x).sibling;
                match (sibling, v) {
                    (None, Some(up)) => {
                        x = up;
                        v = self.info(up).parent;
                    }
                    _ => {
                        u = sibling;
                        break;
                    }
                }
            }
        }
        debug_assert_eq!(2 * self.table.len() as u32, offset);
    }

    /// Members of every settled class, keyed by representative.
    fn classes(&self, candidates: &[Candidate]) -> Vec<Vec<Lit>> {
        let mut by_rep: IndexMap<Lit, Vec<Lit>> = IndexMap::new();
        for c in candidates {
            for l in [Lit::positive(c.var), Lit::negative(c.var)] {
                by_rep.entry(self.parent_of(l)).or_default().push(l);
            }
        }
        by_rep.into_values().collect()
    }
}

impl Lookahead {
    /// SCCs over the current candidates; flags a conflict on `v == !v`.
    fn get_scc(&mut self) -> Result<(), Contradiction> {
        self.stamps.inc();
        for c in &self.candidates {
            self.stamps.set(Lit::positive(c.var));
            self.stamps.set(Lit::negative(c.var));
        }
        self.forest.init(&self.candidates, &self.binary, &self.stamps);
        let result = self.forest.get_scc(&self.candidates, &self.rating);
        self.stats.sccs += self.forest.components as u64;
        if let Err(Contradiction(lit)) = result {
            tracing::trace!(?lit, "literal equivalent to its negation");
            self.stats.scc_conflicts += 1;
            self.set_conflict();
        }
        result
    }

    /// Candidate selection, SCC compression and forest ordering. Returns the
    /// literals to probe, one per equivalence class and variable.
    pub(super) fn pre_select(&mut self) -> Vec<Lit> {
        if !self.select(self.scope_level()) {
            return Vec::new();
        }
        if self.get_scc().is_err() {
            return Vec::new();
        }
        self.forest.find_heights();
        self.forest.construct_lookahead_table();

        self.stamps.inc();
        let mut probes = Vec::with_capacity(self.forest.table.len());
        for i in 0..self.forest.table.len() {
            let l = self.forest.table[i].lit;
            let var_lit = Lit::positive(l.var());
            if self.value(l) == Value::Undef && !self.stamps.is_stamped(var_lit) {
                self.stamps.set(var_lit);
                probes.push(l);
            }
        }
        probes
    }

    /// Equivalence classes among the current candidates.
    pub fn equivalence_classes(&mut self) -> Result<Vec<Vec<Lit>>, Contradiction> {
        if self.inconsistent || !self.select(self.scope_level()) {
            return Ok(Vec::new());
        }
        self.get_scc()?;
        Ok(self.forest.classes(&self.candidates))
    }

    /// Runs pre-selection at the current level and returns the probe table.
    pub fn lookahead_table(&mut self) -> Result<&[LiteralOffset], Contradiction> {
        self.forest.table.clear();
        if !self.inconsistent && self.select(self.scope_level()) {
            self.get_scc()?;
            self.forest.find_heights();
            self.forest.construct_lookahead_table();
        }
        Ok(&self.forest.table)
    }
}

#[cfg(test)]
mod tests {
    use crate::cnf::Lit;
    use crate::lookahead::{Contradiction, Lookahead, LookaheadConfig, Snapshot};

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
    fn implication_cycle_is_one_class() {
        // 1 -> 2 -> 3 -> 1, 4 free-standing
        let mut la = engine(4, &[&[-1, 2], &[-2, 3], &[-3, 1], &[3, 4]]);
        let classes = la.equivalence_classes().expect("no contradiction");
        let class_of = |l: Lit| {
            classes
                .iter()
                .find(|c| c.contains(&l))
                .cloned()
                .expect("class")
        };
        let mut pos = class_of(lit(1));
        pos.sort();
        assert_eq!(pos, vec![lit(1), lit(2), lit(3)]);
        let mut neg = class_of(lit(-2));
        neg.sort();
        assert_eq!(neg, vec![lit(-1), lit(-2), lit(-3)]);
        assert_eq!(class_of(lit(4)), vec![lit(4)]);
    }

    #[test]
    fn literal_equivalent_to_negation_is_reported() {
        let mut la = engine(2, &[&[-1, 2], &[-2, 1], &[-1, -2], &[1, 2]]);
        let r = la.equivalence_classes();
        assert!(matches!(r, Err(Contradiction(_))));
        assert!(la.inconsistent());
        assert_eq!(la.stats().scc_conflicts, 1);
    }

    #[test]
    fn table_offsets_step_by_two() {
        let mut la = engine(
            6,
            &[&[-1, 2], &[-2, 3], &[-4, 3], &[-5, 6], &[-6, 5], &[1, 4]],
        );
        let table = la.lookahead_table().expect("table").to_vec();
        assert!(!table.is_empty());
        let mut offsets = table.iter().map(|e| e.offset).collect::<Vec<_>>();
        offsets.sort_unstable();
        let expected = (0..table.len() as u32).map(|i| 2 * i).collect::<Vec<_>>();
        assert_eq!(offsets, expected);
        // 5 and 6 are equivalent: one entry per polarity of that class
        let five_six = table
            .iter()
            .filter(|e| e.lit.var() == 4 || e.lit.var() == 5)
            .count();
        assert_eq!(five_six, 2);
    }

    #[test]
    fn forest_parent_is_implied() {
        let mut la = engine(4, &[&[-1, 2], &[-2, 3], &[-3, 4]]);
        let table = la.lookahead_table().expect("table").to_vec();
        for e in &table {
            if let Some(p) = e.parent {
                assert!(
                    la.implied(e.lit).contains(&p),
                    "{} should imply its forest parent {}",
                    e.lit,
                    p
                );
            }
        }
        assert!(table.iter().any(|e| e.parent.is_some()));
    }
}
