//! Search tasks that explore the neighborhood of a base point.
//!
//! Every sampler here implements [`SearchTask`](crate::SearchTask). The
//! rejection and Metropolis samplers report accepted points plus one
//! [`AcceptanceLogEntry`](crate::AcceptanceLogEntry) per proposal; the
//! bootstrap sampler emits every proposal it makes.

pub mod bootstrap;
pub(crate) mod common;
pub mod metropolis;
pub mod rejection;
