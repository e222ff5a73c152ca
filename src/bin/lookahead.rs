use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lookahead::cancel::{Cancel, Deadline, Never};
use lookahead::cnf::Cnf;
use lookahead::cnf::dimacs::{load_cnf, to_dimacs};
use lookahead::cnf::random::random_ksat;
use lookahead::lookahead::{Lookahead, LookaheadConfig, Outcome};
use lookahead::solver::{Backend, SolveResult};

#[derive(Debug, Parser)]
#[command(name = "lookahead")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    Solve {
        path: String,
        #[arg(long, default_value = "lookahead")]
        backend: String,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long = "timeout-ms")]
        timeout_ms: Option<u64>,
        #[arg(long = "max-hlevel", default_value_t = 50)]
        max_hlevel: usize,
        #[arg(long = "no-double", default_value_t = false)]
        no_double: bool,
        #[arg(long, default_value_t = false)]
        model: bool,
    },
    Gen {
        #[arg(long)]
        vars: u32,
        #[arg(long)]
        clauses: usize,
        #[arg(long, default_value_t = 3)]
        k: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long)]
        emit: String,
    },
    Stats {
        path: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Cmd::Solve {
            path,
            backend,
            seed,
            timeout_ms,
            max_hlevel,
            no_double,
            model,
        } => {
            let config = LookaheadConfig {
                seed,
                max_hlevel,
                double_lookahead: !no_double,
                ..LookaheadConfig::default()
            };
            solve_cmd(&path, &backend, config, timeout_ms, model)?
        }
        Cmd::Gen {
            vars,
            clauses,
            k,
            seed,
            emit,
        } => gen_cmd(vars, clauses, k, seed, &emit)?,
        Cmd::Stats { path } => stats_cmd(&path)?,
    }
    Ok(())
}

fn solve_cmd(
    path: &str,
    backend: &str,
    config: LookaheadConfig,
    timeout_ms: Option<u64>,
    print_model: bool,
) -> Result<()> {
    let cnf = load_cnf(path)?;
    let backend = Backend::parse(backend)?;
    println!("c vars={} clauses={} backend={}", cnf.num_vars, cnf.clauses.len(), backend.name());

    if timeout_ms.is_some() && !backend.cancellable() {
        tracing::warn!(backend = backend.name(), "timeout is ignored by this backend");
    }
    let cancel: Arc<dyn Cancel + Send + Sync> = match timeout_ms {
        Some(ms) => Arc::new(Deadline::after(Duration::from_millis(ms))),
        None => Arc::new(Never),
    };

    let (result, model) = match backend {
        Backend::Lookahead => {
            let mut engine = Lookahead::from_cnf(&cnf, config)?;
            let outcome = engine.check(&*cancel);
            let st = engine.stats();
            println!(
                "c decisions={} backtracks={} probes={} failed_literals={} learned_binaries={}",
                st.decisions, st.backtracks, st.probes, st.failed_literals, st.learned_binaries
            );
            let result = match outcome {
                Outcome::Sat => SolveResult::Sat,
                Outcome::Unsat => SolveResult::Unsat,
                Outcome::Unknown => SolveResult::Unknown,
            };
            (result, engine.model().map(<[bool]>::to_vec))
        }
        Backend::Varisat => {
            let mut solver = backend.load(&cnf, config);
            let result = solver.solve(&[]);
            let model = (result == SolveResult::Sat).then(|| {
                (0..cnf.num_vars)
                    .map(|v| solver.model_value(v).unwrap_or(false))
                    .collect::<Vec<_>>()
            });
            (result, model)
        }
    };

    match result {
        SolveResult::Sat => {
            println!("s SATISFIABLE");
            let Some(model) = model else {
                bail!("solver reported SAT without a model");
            };
            if !cnf.eval(&model) {
                bail!("model does not satisfy the formula");
            }
            if print_model {
                println!("v {} 0", model_line(&model));
            }
        }
        SolveResult::Unsat => println!("s UNSATISFIABLE"),
        SolveResult::Unknown => println!("s UNKNOWN"),
    }
    Ok(())
}

fn model_line(model: &[bool]) -> String {
    model
        .iter()
        .enumerate()
        .map(|(v, &b)| {
            let d = v as i64 + 1;
            if b { d.to_string() } else { (-d).to_string() }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn gen_cmd(vars: u32, clauses: usize, k: usize, seed: u64, emit: &str) -> Result<()> {
    let cnf = random_ksat(vars, clauses, k, seed)?;
    std::fs::write(emit, to_dimacs(&cnf))?;
    println!("vars={} clauses={} k={} seed={}", cnf.num_vars, cnf.clauses.len(), k, seed);
    Ok(())
}

fn stats_cmd(path: &str) -> Result<()> {
    let cnf = load_cnf(path)?;
    let (binary, ternary, long) = clause_shape(&cnf);
    println!(
        "vars={} clauses={} binary={} ternary={} long={} max_width={}",
        cnf.num_vars,
        cnf.clauses.len(),
        binary,
        ternary,
        long,
        cnf.max_clause_width()
    );

    let mut engine = Lookahead::from_cnf(&cnf, LookaheadConfig::default())?;
    let root_units = engine.root_units().len();
    let candidates = engine.preselect().len();
    let classes = match engine.equivalence_classes() {
        Ok(c) => c.len().to_string(),
        Err(c) => format!("contradiction({})", c.0),
    };
    println!(
        "root_units={} inconsistent={} free={} candidates={} classes={}",
        root_units,
        engine.inconsistent(),
        engine.num_free(),
        candidates,
        classes
    );
    Ok(())
}

fn clause_shape(cnf: &Cnf) -> (usize, usize, usize) {
    let mut shape = (0, 0, 0);
    for c in &cnf.clauses {
        match c.len() {
            0 | 1 => {}
            2 => shape.0 += 1,
            3 => shape.1 += 1,
            _ => shape.2 += 1,
        }
    }
    shape
}
