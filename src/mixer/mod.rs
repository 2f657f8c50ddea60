//! Stateless combinators over vectors and oracles.
//!
//! | Function | Produces |
//! |----------|----------|
//! | [`mix`] | Unique crossover hybrids of two parents |
//! | [`migrate`] | Points walked across several oracles with Metropolis-like moves |
//! | [`jitter`] | Small random perturbations of one point |
//!
//! All of them return synchronously. [`migrate`] runs its rejection searches
//! on the calling thread.

mod crossover;
mod jitter;
mod migration;

pub use crossover::{
    ACTIVE_REL_TOL, MixConfig, MixOutcome, MixResult, active_dimensions, mix, mix_with_rng,
};
pub use jitter::{jitter, jitter_scored};
pub use migration::{MigratedPoint, MigrationConfig, migrate};
