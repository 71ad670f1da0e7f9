//! Command implementations.

mod collect;
mod run;
mod validate;

pub use collect::run_collect;
pub use run::run_recorder;
pub use validate::run_validate;
