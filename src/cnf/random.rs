use anyhow::{Result, bail};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::cnf::{Cnf, Lit};

/// Uniform random k-SAT: each clause picks `k` distinct variables and random signs.
pub fn random_ksat(num_vars: u32, num_clauses: usize, k: usize, seed: u64) -> Result<Cnf> {
    if k == 0 {
        bail!("k must be >= 1");
    }
    if (num_vars as usize) < k {
        bail!("need at least k={} vars, got {}", k, num_vars);
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut cnf = Cnf::new(num_vars);
    for _ in 0..num_clauses {
        let picked = rand::seq::index::sample(&mut rng, num_vars as usize, k);
        let clause = picked
            .iter()
            .map(|v| Lit::new(v as u32, rng.random::<bool>()))
            .collect::<Vec<_>>();
        cnf.add_clause(clause);
    }
    Ok(cnf)
}
