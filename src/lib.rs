//! Distributional Formal Semantics (DFS) core library.
//!
//! This crate sits between a logic backend that knows a world specification
//! and numeric consumers that want vectors. It defines:
//! - [`World`]: a handle to a loaded world specification on a [`QueryExecutor`].
//! - [`Sampler`]: draws models of a world, one at a time, in bulk or in parallel.
//! - [`index`] and the [`codec`]: the proposition dimensions of a model set and
//!   the lossless model ↔ vector conversion.
//! - [`Evaluator`]: formula truth vectors and the proposition vector space.
//! - [`Vectorizer`]: sentence-semantics corpus → truth vectors.
//!
//! Backends are reached through [`QueryExecutor`]; [`IpcExecutor`] talks to a
//! backend process over a local socket, [`CachedExecutor`] memoises evaluation.
//!
//! ```no_run
//! use std::sync::Arc;
//! use dfs_core::{Evaluator, Formula, IpcExecutor, Sampler, World};
//!
//! # fn main() -> dfs_core::Result<()> {
//! let world = World::load(Arc::new(IpcExecutor::new(dfs_core::DFS_IPC_NAME)), "worlds/cafe.pl")?;
//! let models = Sampler::new(world.clone()).sample_many(100)?;
//! let vector = Evaluator::new(world).truth_vector(&Formula::parse("enter(john) & order(john)")?, &models)?;
//! assert_eq!(vector.len(), 100);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod index;
pub mod ipc;
pub mod model;
pub mod sampler;
pub mod sentences;
pub mod term;

#[cfg(test)]
mod testing;

// Re-export for downstream crates so callers can open a cache DB or use the
// dense exports without declaring direct dependencies.
pub use nalgebra;
pub use sled;

pub use backend::{Bindings, Query, QueryExecutor, QueryKind, World};
pub use cache::CachedExecutor;
pub use codec::{matrix_to_models, model_to_vector, models_to_matrix, vector_to_model};
pub use config::DfsConfig;
pub use error::{DfsError, Result};
pub use evaluator::{Evaluator, Formula, PropositionSpace, TruthVector};
pub use index::index;
pub use ipc::{IpcExecutor, IpcServer};
pub use model::{AtomicProposition, Model, ModelMatrix, ModelSet, ModelVector, State};
pub use sampler::Sampler;
pub use sentences::{Sentence, SentenceSemantics, SentenceVector, Vectorizer};
pub use term::Term;

/// Default IPC channel name (local socket / pipe) of an out-of-process backend.
///
/// On Unix we use a filesystem-backed socket in `/tmp` so separate processes can discover it.
#[cfg(unix)]
pub const DFS_IPC_NAME: &str = "/tmp/dfs_backend.sock";

/// Default IPC channel name (non-Unix platforms).
#[cfg(not(unix))]
pub const DFS_IPC_NAME: &str = "dfs_backend.sock";
