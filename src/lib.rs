pub mod bench;
pub mod cancel;
pub mod cnf;
pub mod lookahead;
pub mod solver;
