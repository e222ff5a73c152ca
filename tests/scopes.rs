use std::collections::HashSet;

use proptest::prelude::*;

use lookahead::cnf::{Cnf, Lit};
use lookahead::lookahead::{Contradiction, Lookahead, LookaheadConfig, Value};

fn formula() -> impl Strategy<Value = Cnf> {
    (2u32..=10).prop_flat_map(|n| {
        let lit = (0..n, any::<bool>()).prop_map(|(v, pos)| Lit::new(v, pos));
        let clause = prop::collection::vec(lit, 2..=5);
        prop::collection::vec(clause, 0..30).prop_map(move |clauses| {
            let mut cnf = Cnf::new(n);
            for c in clauses {
                cnf.add_clause(c);
            }
            cnf
        })
    })
}

#[derive(Debug, Clone)]
enum Op {
    Push(Lit),
    Learn(Lit, Lit),
}

fn ops(n: u32) -> impl Strategy<Value = Vec<Op>> {
    let lit = (0..n, any::<bool>()).prop_map(|(v, pos)| Lit::new(v, pos));
    let op = prop_oneof![
        lit.clone().prop_map(Op::Push),
        (lit.clone(), lit).prop_map(|(a, b)| Op::Learn(a, b)),
    ];
    prop::collection::vec(op, 0..12)
}

fn snapshot(la: &Lookahead) -> (Vec<Value>, Vec<Vec<Lit>>, Vec<u32>, bool) {
    let lits = 2 * la.num_vars() as usize;
    let values = (0..lits).map(|i| la.value(Lit::from_index(i))).collect();
    let binary = (0..lits)
        .map(|i| la.implied(Lit::from_index(i)).to_vec())
        .collect();
    let mut free = la.free_vars().iter().copied().collect::<Vec<_>>();
    free.sort_unstable();
    (values, binary, free, la.inconsistent())
}

fn assert_consistent(la: &Lookahead) {
    for v in 0..la.num_vars() {
        let pos = la.value(Lit::positive(v));
        let neg = la.value(Lit::negative(v));
        let expect = match pos {
            Value::True => Value::False,
            Value::False => Value::True,
            Value::Undef => Value::Undef,
        };
        assert_eq!(neg, expect, "var {v}");
        assert_eq!(la.free_vars().contains(&v), pos == Value::Undef, "var {v}");
    }
}

fn assert_no_duplicate_edges(la: &Lookahead) {
    for i in 0..2 * la.num_vars() as usize {
        let l = Lit::from_index(i);
        let implied = la.implied(l);
        let unique = implied.iter().collect::<HashSet<_>>();
        assert_eq!(unique.len(), implied.len(), "duplicate edge out of {l}");
        assert!(!implied.contains(&l), "self loop on {l}");
    }
}

fn holds(model: &[bool], l: Lit) -> bool {
    model[l.var() as usize] == l.is_positive()
}

/// Every total assignment over `num_vars` that satisfies `cnf` and `units`.
fn models(cnf: &Cnf, num_vars: u32, units: &[Lit]) -> Vec<Vec<bool>> {
    (0..1u32 << num_vars)
        .map(|m| (0..num_vars).map(|v| m >> v & 1 == 1).collect::<Vec<_>>())
        .filter(|a| cnf.eval(a) && units.iter().all(|&u| holds(a, u)))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn push_pop_round_trip((cnf, script) in formula().prop_flat_map(|c| {
        let n = c.num_vars;
        (Just(c), ops(n))
    })) {
        let mut la = Lookahead::from_cnf(&cnf, LookaheadConfig::default()).expect("init");
        let mut history = Vec::new();
        for op in &script {
            match *op {
                Op::Push(l) => {
                    history.push(snapshot(&la));
                    la.push(l).expect("push");
                }
                Op::Learn(a, b) if a.var() != b.var() && !la.inconsistent() => {
                    la.try_add_binary(a, b).expect("learn");
                }
                Op::Learn(..) => {}
            }
            assert_consistent(&la);
        }
        while la.scope_level() > 0 {
            la.pop().expect("pop");
            let expected = history.pop().expect("history");
            prop_assert_eq!(&snapshot(&la), &expected);
        }
        prop_assert!(history.is_empty());
    }

    #[test]
    fn learned_binaries_never_duplicate(cnf in formula(), picks in prop::collection::vec((0u32..10, any::<bool>(), 0u32..10, any::<bool>()), 0..40)) {
        let mut la = Lookahead::from_cnf(&cnf, LookaheadConfig::default()).expect("init");
        let n = la.num_vars();
        for (a, pa, b, pb) in picks {
            let (a, b) = (a % n, b % n);
            if a == b || la.inconsistent() {
                continue;
            }
            la.try_add_binary(Lit::new(a, pa), Lit::new(b, pb)).expect("learn");
            assert_consistent(&la);
        }
        assert_no_duplicate_edges(&la);
    }

    #[test]
    fn preselect_is_idempotent(cnf in formula()) {
        let mut la = Lookahead::from_cnf(&cnf, LookaheadConfig::default()).expect("init");
        let a = la.preselect();
        let b = la.preselect();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn learned_binaries_are_implied(cnf in formula()) {
        let mut la = Lookahead::from_cnf(&cnf, LookaheadConfig::default()).expect("init");
        let n = la.num_vars();
        la.choose();
        let all = models(&cnf, n, &[]);
        if la.inconsistent() {
            prop_assert!(all.is_empty(), "root conflict on a satisfiable formula");
            return Ok(());
        }
        prop_assert_eq!(la.scope_level(), 0);
        let constrained = models(&cnf, n, la.root_units());
        prop_assert_eq!(constrained.len(), all.len(), "root units cut off models");
        for i in 0..2 * n as usize {
            let l = Lit::from_index(i);
            for &w in la.implied(l) {
                prop_assert!(
                    constrained.iter().all(|m| !holds(m, l) || holds(m, w)),
                    "{} -> {} is not implied", l, w
                );
            }
        }
    }

    #[test]
    fn equivalence_classes_are_closed(cnf in formula()) {
        let mut la = Lookahead::from_cnf(&cnf, LookaheadConfig::default()).expect("init");
        let n = la.num_vars();
        let all = models(&cnf, n, &[]);
        match la.equivalence_classes() {
            Ok(classes) => {
                for class in &classes {
                    for &a in class {
                        for &b in class {
                            prop_assert!(
                                all.iter().all(|m| holds(m, a) == holds(m, b)),
                                "{} and {} are not equivalent", a, b
                            );
                        }
                    }
                }
            }
            Err(Contradiction(l)) => {
                prop_assert!(all.is_empty(), "{} equivalent to its negation on a satisfiable formula", l);
            }
        }
    }
}
