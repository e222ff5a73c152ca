use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result, bail};

use super::cnf::{Cnf, Lit};

pub fn to_dimacs(cnf: &Cnf) -> String {
    let mut out = String::new();
    out.push_str(&format!("p cnf {} {}\n", cnf.num_vars, cnf.clauses.len()));
    for clause in &cnf.clauses {
        for &lit in clause {
            out.push_str(&format!("{} ", lit.to_dimacs()));
        }
        out.push_str("0\n");
    }
    out
}

pub fn load_cnf<P: AsRef<Path>>(path: P) -> Result<Cnf> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    parse_dimacs_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse {}", path.display()))
}

pub fn parse_dimacs_str(s: &str) -> Result<Cnf> {
    parse_dimacs_reader(std::io::Cursor::new(s.as_bytes()))
}

pub fn parse_dimacs_reader<R: BufRead>(r: R) -> Result<Cnf> {
    let mut header: Option<(u32, usize)> = None;
    let mut cnf = Cnf::new(0);
    let mut current = Vec::<Lit>::new();

    for (i, line) in r.lines().enumerate() {
        let line = line.context("failed to read dimacs input")?;
        let line = line.trim();
        if line.starts_with('%') {
            break;
        }
        if line.is_empty() || line.starts_with('c') {
            continue;
        }
        if line.starts_with('p') {
            if header.is_some() {
                bail!("duplicate header on line {}", i + 1);
            }
            let parts = line.split_whitespace().collect::<Vec<_>>();
            if parts.len() != 4 || parts[1] != "cnf" {
                bail!("invalid header on line {}, expected: p cnf V C", i + 1);
            }
            let vars = parts[2]
                .parse::<u32>()
                .with_context(|| format!("invalid variable count '{}'", parts[2]))?;
            if vars > Lit::MAX_VAR {
                bail!("variable count {} on line {} is too large", vars, i + 1);
            }
            let clauses = parts[3]
                .parse::<usize>()
                .with_context(|| format!("invalid clause count '{}'", parts[3]))?;
            header = Some((vars, clauses));
            cnf.num_vars = vars;
            continue;
        }
        let Some((vars, _)) = header else {
            bail!("clause before header on line {}", i + 1);
        };
        for tok in line.split_whitespace() {
            let n = tok
                .parse::<i64>()
                .with_context(|| format!("invalid literal '{}' on line {}", tok, i + 1))?;
            if n == 0 {
                cnf.clauses.push(std::mem::take(&mut current));
                continue;
            }
            if n.unsigned_abs() > u64::from(vars) {
                bail!("literal {} on line {} exceeds declared {} vars", n, i + 1, vars);
            }
            let Some(lit) = Lit::from_dimacs(n) else {
                bail!("literal {} on line {} is out of range", n, i + 1);
            };
            current.push(lit);
        }
    }

    let Some((_, declared)) = header else {
        bail!("missing header");
    };
    // tolerate a final clause without its terminating 0
    if !current.is_empty() {
        cnf.clauses.push(current);
    }
    if cnf.clauses.len() != declared {
        tracing::debug!(
            declared,
            found = cnf.clauses.len(),
            "clause count differs from header"
        );
    }
    Ok(cnf)
}

#[cfg(test)]
mod tests {
    use super::{parse_dimacs_str, to_dimacs};

    #[test]
    fn parse_with_comments_and_split_clauses() {
        let src = "\
c tiny
p cnf 3 2
1 -2
 0 2 3 0
";
        let cnf = match parse_dimacs_str(src) {
            Ok(v) => v,
            Err(e) => panic!("parse failed: {e}"),
        };
        assert_eq!(cnf.num_vars, 3);
        assert_eq!(cnf.clauses.len(), 2);
        assert_eq!(cnf.clauses[0][1].to_dimacs(), -2);
        assert_eq!(to_dimacs(&cnf), "p cnf 3 2\n1 -2 0\n2 3 0\n");
    }

    #[test]
    fn rejects_out_of_range_literal() {
        assert!(parse_dimacs_str("p cnf 2 1\n1 3 0\n").is_err());
        assert!(parse_dimacs_str("1 2 0\n").is_err());
        assert!(parse_dimacs_str("p cnf x 1\n").is_err());
        assert!(parse_dimacs_str("p cnf 3 1\n2147483649 0\n").is_err());
        assert!(parse_dimacs_str("p cnf 3 1\n-2147483649 0\n").is_err());
        assert!(parse_dimacs_str("p cnf 4294967295 1\n1 0\n").is_err());
    }
}
