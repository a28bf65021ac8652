//! Evaluation result cache backed by sled.
//!
//! Truth-vector queries are deterministic for a given world, formula and
//! model set, and `models_to_proposition_vectors` issues one per dimension,
//! so their answers are worth keeping. Sampling and world loading always go
//! to the backend. Keys start with the world identifier, and a successful
//! load of a world drops every entry cached for it.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::{binding, Bindings, Query, QueryExecutor, QueryKind};
use crate::config::DfsConfig;
use crate::error::Result;

const CACHE_TREE: &str = "dfs_vectors";

/// `<world>\0`: world identifiers are path-like and never contain NUL.
fn world_prefix(world: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(world.len() + 1);
    prefix.extend_from_slice(world.as_bytes());
    prefix.push(0);
    prefix
}

/// Wraps an executor and memoises its `dfs_vector` answers.
pub struct CachedExecutor<E> {
    inner: E,
    tree: sled::Tree,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<E> std::fmt::Debug for CachedExecutor<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedExecutor")
            .field("entries", &self.tree.len())
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}

impl<E> Drop for CachedExecutor<E> {
    fn drop(&mut self) {
        if let Err(e) = self.tree.flush() {
            tracing::warn!(error = %e, "failed to flush evaluation cache");
        }
    }
}

impl<E: QueryExecutor> CachedExecutor<E> {
    /// Caches into an already-open database.
    pub fn new(inner: E, db: &sled::Db) -> Result<Self> {
        Ok(Self {
            inner,
            tree: db.open_tree(CACHE_TREE)?,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Opens the database at `config.cache_path`, or a temporary one.
    pub fn open(inner: E, config: &DfsConfig) -> Result<Self> {
        let db = match &config.cache_path {
            Some(path) => sled::open(path)?,
            None => sled::Config::new().temporary(true).open()?,
        };
        Self::new(inner, &db)
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Drops every cached answer.
    pub fn clear(&self) -> Result<()> {
        self.tree.clear()?;
        Ok(())
    }

    /// Drops the answers cached for one world; returns how many were removed.
    pub fn invalidate(&self, world: &str) -> Result<usize> {
        let mut removed = 0;
        for entry in self.tree.scan_prefix(world_prefix(world)) {
            let (key, _) = entry?;
            self.tree.remove(key)?;
            removed += 1;
        }
        if removed > 0 {
            tracing::debug!(world, removed, "invalidated cached truth vectors");
        }
        Ok(removed)
    }
}

impl<E: QueryExecutor> QueryExecutor for CachedExecutor<E> {
    fn execute(&self, query: &Query) -> Result<Bindings> {
        match query.query {
            QueryKind::Vector => {}
            QueryKind::LoadWorld => {
                let outputs = self.inner.execute(query)?;
                if let Some(spec) = query.inputs.get(binding::SPEC) {
                    self.invalidate(spec.trim())?;
                }
                return Ok(outputs);
            }
            _ => return self.inner.execute(query),
        }

        // Bindings are a BTreeMap, so the encoding is canonical.
        let world = query.inputs.get(binding::WORLD).map_or("", String::as_str);
        let mut key = world_prefix(world);
        key.extend(serde_json::to_vec(query)?);
        if let Some(cached) = self.tree.get(&key)? {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(serde_json::from_slice(&cached)?);
        }

        let outputs = self.inner.execute(query)?;
        self.tree.insert(key, serde_json::to_vec(&outputs)?)?;
        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(entries = self.tree.len(), "cached truth vector");
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::World;
    use crate::evaluator::{Evaluator, Formula};
    use crate::model::Model;
    use crate::sampler::Sampler;
    use crate::testing::ScriptedBackend;
    use crate::DfsError;

    fn cached() -> (Arc<ScriptedBackend>, Arc<CachedExecutor<Arc<ScriptedBackend>>>) {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .expect("failed to open temporary sled db");
        let backend = Arc::new(ScriptedBackend::two_propositions());
        let cache = Arc::new(CachedExecutor::new(backend.clone(), &db).unwrap());
        (backend, cache)
    }

    fn pq() -> Vec<Model> {
        vec![
            "model(([p],[]))".parse().unwrap(),
            "model(([q],[]))".parse().unwrap(),
        ]
    }

    #[test]
    fn repeated_evaluation_hits_the_cache() {
        let (backend, cache) = cached();
        let world = World::load(cache.clone(), "worlds/pq.pl").unwrap();
        let evaluator = Evaluator::new(world);
        let formula = Formula::parse("p | q").unwrap();

        let first = evaluator.truth_vector(&formula, &pq()).unwrap();
        let calls = backend.calls();
        let second = evaluator.truth_vector(&formula, &pq()).unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.calls(), calls);
        assert_eq!((cache.hits(), cache.misses()), (1, 1));

        evaluator
            .truth_vector(&Formula::parse("p & q").unwrap(), &pq())
            .unwrap();
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn sampling_is_never_cached() {
        let (backend, cache) = cached();
        let world = World::load(cache.clone(), "worlds/pq.pl").unwrap();
        let sampler = Sampler::new(world);

        let first = sampler.sample_one().unwrap();
        let second = sampler.sample_one().unwrap();
        assert_ne!(first, second);
        assert_eq!(backend.calls(), 3);
        assert_eq!(cache.hits() + cache.misses(), 0);
    }

    #[test]
    fn failures_are_not_cached() {
        let (backend, cache) = cached();
        let world = World::load(cache.clone(), "worlds/pq.pl").unwrap();
        let evaluator = Evaluator::new(world);
        let unknown = Formula::parse("r").unwrap();

        for _ in 0..2 {
            assert!(matches!(
                evaluator.truth_vector(&unknown, &pq()),
                Err(DfsError::BackendQueryFailed { .. })
            ));
        }
        assert_eq!(backend.calls(), 3);
        assert_eq!(cache.misses(), 0);
    }

    #[test]
    fn clear_forgets_answers() {
        let (_, cache) = cached();
        let world = World::load(cache.clone(), "worlds/pq.pl").unwrap();
        let evaluator = Evaluator::new(world);
        let formula = Formula::parse("p").unwrap();

        evaluator.truth_vector(&formula, &pq()).unwrap();
        cache.clear().unwrap();
        evaluator.truth_vector(&formula, &pq()).unwrap();
        assert_eq!((cache.hits(), cache.misses()), (0, 2));
    }

    #[test]
    fn reloading_a_world_drops_its_answers() {
        let (backend, cache) = cached();
        let formula = Formula::parse("p | q").unwrap();

        let world = World::load(cache.clone(), "worlds/pq.pl").unwrap();
        let other = World::load(cache.clone(), "worlds/other.pl").unwrap();
        Evaluator::new(world).truth_vector(&formula, &pq()).unwrap();
        Evaluator::new(other.clone()).truth_vector(&formula, &pq()).unwrap();
        assert_eq!(cache.misses(), 2);

        let reloaded = World::load(cache.clone(), "worlds/pq.pl").unwrap();
        let calls = backend.calls();
        Evaluator::new(reloaded).truth_vector(&formula, &pq()).unwrap();
        assert_eq!(backend.calls(), calls + 1);
        assert_eq!((cache.hits(), cache.misses()), (0, 3));

        Evaluator::new(other).truth_vector(&formula, &pq()).unwrap();
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn debug_reports_counters() {
        let cache = CachedExecutor::open(ScriptedBackend::two_propositions(), &DfsConfig::default())
            .unwrap();
        let shown = format!("{cache:?}");
        assert!(shown.contains("hits: 0"));
        assert!(shown.contains("misses: 0"));
    }

    #[test]
    fn open_with_default_config_is_temporary() {
        let cache = CachedExecutor::open(ScriptedBackend::two_propositions(), &DfsConfig::default())
            .unwrap();
        assert_eq!(cache.hits(), 0);
        assert_eq!(cache.inner().calls(), 0);
    }
}
