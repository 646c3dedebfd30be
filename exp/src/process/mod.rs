//! External process execution.

mod exec;

pub use exec::{run, run_ok, Exec};
