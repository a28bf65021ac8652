//! The logic backend capability and the world-specification handle.
//!
//! The backend is anything that can answer a named [`Query`] with bound
//! inputs by returning bound outputs: an embedded interpreter, an
//! out-of-process service reached over [`crate::ipc`], a cache in front of
//! either. All client operations in this crate go through [`QueryExecutor`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{DfsError, Result};

/// Binding names used in queries and answers.
pub mod binding {
    pub const WORLD: &str = "World";
    pub const SPEC: &str = "Spec";
    pub const MODEL: &str = "Model";
    pub const MODELS: &str = "Models";
    pub const NUM_MODELS: &str = "NumModels";
    pub const FORMULA: &str = "Formula";
    pub const VECTOR: &str = "Vector";
    pub const MAPPINGS: &str = "Mappings";
}

/// The queries a backend must answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryKind {
    /// `Spec` → (nothing). Loads a world specification.
    #[serde(rename = "dfs_load_world")]
    LoadWorld,
    /// `World` → `Model`.
    #[serde(rename = "dfs_sample_model")]
    SampleModel,
    /// `World`, `NumModels` → `Models`.
    #[serde(rename = "dfs_sample_models")]
    SampleModels,
    /// `World`, `Formula`, `Models` → `Vector`.
    #[serde(rename = "dfs_vector")]
    Vector,
    /// `World` → `Mappings`.
    #[serde(rename = "dfs_sentences")]
    Sentences,
}

impl QueryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::LoadWorld => "dfs_load_world",
            QueryKind::SampleModel => "dfs_sample_model",
            QueryKind::SampleModels => "dfs_sample_models",
            QueryKind::Vector => "dfs_vector",
            QueryKind::Sentences => "dfs_sentences",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named textual terms passed into or returned from a query.
pub type Bindings = BTreeMap<String, String>;

/// A query with its input bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub query: QueryKind,
    pub inputs: Bindings,
}

impl Query {
    pub fn new(query: QueryKind) -> Self {
        Self {
            query,
            inputs: Bindings::new(),
        }
    }

    pub fn bind(mut self, name: &str, value: impl Into<String>) -> Self {
        self.inputs.insert(name.to_string(), value.into());
        self
    }

    /// Looks up an input binding; a missing input is a failed query.
    pub fn input(&self, name: &str) -> Result<&str> {
        self.inputs.get(name).map(String::as_str).ok_or_else(|| {
            DfsError::query_failed(self.query, format!("missing input binding `{name}`"))
        })
    }
}

/// Looks up an output binding of an answer to `query`.
pub fn output<'a>(outputs: &'a Bindings, query: QueryKind, name: &str) -> Result<&'a str> {
    outputs
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| DfsError::malformed("", format!("{query} returned no `{name}` binding")))
}

/// The backend capability: execute a named query, return its output bindings.
///
/// Implementations block until the backend answers. A query that raises or has
/// no solution is [`DfsError::BackendQueryFailed`], never an empty answer.
pub trait QueryExecutor: Send + Sync {
    fn execute(&self, query: &Query) -> Result<Bindings>;
}

impl<E: QueryExecutor + ?Sized> QueryExecutor for Arc<E> {
    fn execute(&self, query: &Query) -> Result<Bindings> {
        (**self).execute(query)
    }
}

impl<E: QueryExecutor + ?Sized> QueryExecutor for Box<E> {
    fn execute(&self, query: &Query) -> Result<Bindings> {
        (**self).execute(query)
    }
}

/// Handle to a loaded world specification.
///
/// Obtained from [`World::load`]; sampling and evaluation clients are created
/// from it, and every query they issue names this world, so several worlds can
/// be loaded side by side on the same backend.
#[derive(Clone)]
pub struct World {
    spec: String,
    executor: Arc<dyn QueryExecutor>,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World").field("spec", &self.spec).finish()
    }
}

impl World {
    /// Loads the specification identified by `spec` (usually a file path).
    #[tracing::instrument(skip(executor))]
    pub fn load(executor: Arc<dyn QueryExecutor>, spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(DfsError::InvalidArgument(
                "world specification identifier is empty".to_string(),
            ));
        }

        executor.execute(&Query::new(QueryKind::LoadWorld).bind(binding::SPEC, spec))?;
        tracing::info!(spec, "world specification loaded");

        Ok(Self {
            spec: spec.to_string(),
            executor,
        })
    }

    /// The specification identifier this world was loaded from.
    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn executor(&self) -> &Arc<dyn QueryExecutor> {
        &self.executor
    }

    /// Starts a query bound to this world.
    pub(crate) fn query(&self, kind: QueryKind) -> Query {
        Query::new(kind).bind(binding::WORLD, self.spec.as_str())
    }

    /// Runs a query bound to this world.
    pub(crate) fn run(&self, query: &Query) -> Result<Bindings> {
        tracing::debug!(query = %query.query, world = %self.spec, "executing backend query");
        self.executor.execute(query)
    }
}
