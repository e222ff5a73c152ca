use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::cnf::Cnf;
use crate::cnf::dimacs::load_cnf;
use crate::lookahead::{Lookahead, LookaheadConfig, Outcome};
use crate::solver::{Backend, SolveResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchConfig {
    pub backend: Backend,
    pub lookahead: LookaheadConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchRow {
    pub path: String,
    pub status: String,
    pub backend: String,
    pub result: String,
    pub wall_ms: Option<u128>,
    pub vars: Option<u32>,
    pub clauses: Option<usize>,
    pub decisions: Option<u64>,
    pub propagations: Option<u64>,
    pub failed_literals: Option<u64>,
    pub learned_binaries: Option<u64>,
}

impl BenchRow {
    fn new(path: &Path, backend: Backend, status: &str) -> Self {
        Self {
            path: path.to_string_lossy().to_string(),
            status: status.to_string(),
            backend: backend.name().to_string(),
            result: String::new(),
            wall_ms: None,
            vars: None,
            clauses: None,
            decisions: None,
            propagations: None,
            failed_literals: None,
            learned_binaries: None,
        }
    }

    pub fn csv_header() -> &'static str {
        "path,status,backend,result,wall_ms,vars,clauses,decisions,propagations,failed_literals,learned_binaries"
    }

    pub fn to_csv_line(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{}",
            esc_csv(&self.path),
            self.status,
            self.backend,
            self.result,
            opt(self.wall_ms),
            opt(self.vars),
            opt(self.clauses),
            opt(self.decisions),
            opt(self.propagations),
            opt(self.failed_literals),
            opt(self.learned_binaries),
        )
    }
}

/// Solves one DIMACS file on a worker thread. On timeout the worker is asked
/// to stop through its cancel flag and the row is reported as `timeout`, or
/// `timeout_detached` when the backend cannot be interrupted.
pub fn run_one(path: &Path, cfg: BenchConfig, timeout: Duration) -> BenchRow {
    let start = Instant::now();
    let p = path.to_path_buf();
    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        let row = run_one_inner(&p, cfg, worker_cancel);
        let _ = tx.send(row);
    });

    match rx.recv_timeout(timeout) {
        Ok(mut row) => {
            row.wall_ms = Some(start.elapsed().as_millis());
            row
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            // varisat ignores the flag; its worker keeps running detached
            // until the solve finishes and the send fails
            cancel.store(true, Ordering::Relaxed);
            let status = timeout_status(cfg.backend);
            tracing::debug!(path = %path.display(), status, "timed out");
            let mut row = BenchRow::new(path, cfg.backend, status);
            row.wall_ms = Some(start.elapsed().as_millis());
            row
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            let mut row = BenchRow::new(path, cfg.backend, "internal_error");
            row.wall_ms = Some(start.elapsed().as_millis());
            row
        }
    }
}

fn timeout_status(backend: Backend) -> &'static str {
    if backend.cancellable() {
        "timeout"
    } else {
        "timeout_detached"
    }
}

pub fn run_dataset(
    dir: &Path,
    cfg: BenchConfig,
    timeout: Duration,
    csv_path: &Path,
    progress: bool,
) -> std::io::Result<Vec<BenchRow>> {
    let paths = discover_paths(dir)?;
    let mut csv = File::create(csv_path)?;
    writeln!(csv, "{}", BenchRow::csv_header())?;
    csv.flush()?;

    let mut rows = Vec::new();
    for path in paths {
        let row = run_one(&path, cfg, timeout);
        if progress {
            println!(
                "path={} status={} wall_ms={} result={}",
                row.path,
                row.status,
                row.wall_ms.unwrap_or_default(),
                row.result
            );
        }
        writeln!(csv, "{}", row.to_csv_line())?;
        csv.flush()?;
        rows.push(row);
    }

    Ok(rows)
}

fn run_one_inner(path: &Path, cfg: BenchConfig, cancel: Arc<AtomicBool>) -> BenchRow {
    let mut row = BenchRow::new(path, cfg.backend, "ok");
    let cnf = match load_cnf(path) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "parse error");
            row.status = "parse_error".to_string();
            return row;
        }
    };
    row.vars = Some(cnf.num_vars);
    row.clauses = Some(cnf.clauses.len());

    match cfg.backend {
        Backend::Lookahead => solve_lookahead(&cnf, cfg.lookahead, cancel, &mut row),
        Backend::Varisat => {
            let mut solver = cfg.backend.load(&cnf, cfg.lookahead);
            let result = solver.solve(&[]);
            row.result = result_name(result).to_string();
            if result == SolveResult::Sat && !model_checks(&cnf, |v| solver.model_value(v)) {
                row.status = "wrong_model".to_string();
            }
        }
    }
    row
}

fn solve_lookahead(cnf: &Cnf, config: LookaheadConfig, cancel: Arc<AtomicBool>, row: &mut BenchRow) {
    let mut engine = match Lookahead::from_cnf(cnf, config) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "engine rejected formula");
            row.status = "internal_error".to_string();
            return;
        }
    };
    let outcome = engine.check(&cancel);
    let st = engine.stats();
    row.result = match outcome {
        Outcome::Sat => "sat",
        Outcome::Unsat => "unsat",
        Outcome::Unknown => "unknown",
    }
    .to_string();
    row.decisions = Some(st.decisions);
    row.propagations = Some(st.propagations);
    row.failed_literals = Some(st.failed_literals);
    row.learned_binaries = Some(st.learned_binaries);
    if outcome == Outcome::Sat {
        let ok = engine.model().is_some_and(|m| cnf.eval(m));
        if !ok {
            row.status = "wrong_model".to_string();
        }
    }
}

fn model_checks(cnf: &Cnf, value: impl Fn(u32) -> Option<bool>) -> bool {
    let model = (0..cnf.num_vars)
        .map(|v| value(v).unwrap_or(false))
        .collect::<Vec<_>>();
    cnf.eval(&model)
}

fn result_name(r: SolveResult) -> &'static str {
    match r {
        SolveResult::Sat => "sat",
        SolveResult::Unsat => "unsat",
        SolveResult::Unknown => "unknown",
    }
}

fn discover_paths(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::<PathBuf>::new();
    collect_paths(dir, &mut out)?;
    out.sort();
    Ok(out)
}

fn collect_paths(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let p = entry.path();
        if p.is_dir() {
            collect_paths(&p, out)?;
            continue;
        }
        let ext = p.extension().and_then(|x| x.to_str()).unwrap_or("");
        if ext == "cnf" || ext == "dimacs" {
            out.push(p);
        }
    }
    Ok(())
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

fn esc_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::timeout_status;
    use crate::solver::Backend;

    #[test]
    fn uninterruptible_timeout_is_reported_detached() {
        assert_eq!(timeout_status(Backend::Lookahead), "timeout");
        assert_eq!(timeout_status(Backend::Varisat), "timeout_detached");
    }
}
