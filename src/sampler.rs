//! Model sampling client.

use tokio::task::JoinSet;

use crate::backend::{binding, output, QueryKind, World};
use crate::config::{DfsConfig, DEFAULT_MAX_PARALLEL_WORKERS};
use crate::error::{DfsError, Result};
use crate::model::{models_from_text, Model, ModelSet};

/// Requests models of a loaded world from the backend.
#[derive(Debug, Clone)]
pub struct Sampler {
    world: World,
    max_workers: usize,
}

impl Sampler {
    pub fn new(world: World) -> Self {
        Self {
            world,
            max_workers: DEFAULT_MAX_PARALLEL_WORKERS,
        }
    }

    pub fn with_config(world: World, config: &DfsConfig) -> Self {
        Self {
            world,
            max_workers: config.max_parallel_workers,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Samples a single model.
    #[tracing::instrument(skip(self), fields(world = %self.world.spec()))]
    pub fn sample_one(&self) -> Result<Model> {
        let query = self.world.query(QueryKind::SampleModel);
        let outputs = self.world.run(&query)?;
        output(&outputs, query.query, binding::MODEL)?.parse()
    }

    /// Samples `count` models in one backend request. Duplicates are kept.
    #[tracing::instrument(skip(self), fields(world = %self.world.spec()))]
    pub fn sample_many(&self, count: usize) -> Result<ModelSet> {
        if count == 0 {
            return Err(DfsError::InvalidArgument(
                "number of models to sample must be positive".to_string(),
            ));
        }

        let query = self
            .world
            .query(QueryKind::SampleModels)
            .bind(binding::NUM_MODELS, count.to_string());
        let outputs = self.world.run(&query)?;
        let text = output(&outputs, query.query, binding::MODELS)?;
        let models = models_from_text(text)?;
        if models.len() != count {
            return Err(DfsError::malformed(
                text,
                format!("expected {count} models, backend returned {}", models.len()),
            ));
        }

        tracing::debug!(count, "sampled models");
        Ok(models)
    }

    /// Samples `per_worker_count` models on each of `worker_count` workers and
    /// concatenates the batches in worker order.
    ///
    /// All workers are joined before returning; if any failed, the failure of
    /// the lowest-numbered failing worker is returned. Must not be called from
    /// inside an async runtime.
    #[tracing::instrument(skip(self), fields(world = %self.world.spec()))]
    pub fn sample_many_parallel(
        &self,
        worker_count: usize,
        per_worker_count: usize,
    ) -> Result<ModelSet> {
        if worker_count == 0 || per_worker_count == 0 {
            return Err(DfsError::InvalidArgument(
                "worker count and models per worker must be positive".to_string(),
            ));
        }
        let total = worker_count.checked_mul(per_worker_count).ok_or_else(|| {
            DfsError::InvalidArgument(format!(
                "{worker_count} workers × {per_worker_count} models overflows"
            ))
        })?;
        if worker_count > self.max_workers {
            return Err(DfsError::InvalidArgument(format!(
                "{worker_count} workers requested, at most {} allowed",
                self.max_workers
            )));
        }
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(DfsError::InvalidArgument(
                "parallel sampling blocks and cannot run inside an async runtime".to_string(),
            ));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .max_blocking_threads(worker_count)
            .build()
            .map_err(|e| {
                DfsError::BackendUnavailable(format!("failed to start sampling workers: {e}"))
            })?;

        let mut batches = runtime.block_on(async {
            let mut workers = JoinSet::new();
            for worker in 0..worker_count {
                let sampler = self.clone();
                workers.spawn_blocking(move || (worker, sampler.sample_many(per_worker_count)));
            }

            let mut batches = Vec::with_capacity(worker_count);
            while let Some(joined) = workers.join_next().await {
                batches.push(joined.unwrap_or_else(|e| {
                    (
                        usize::MAX,
                        Err(DfsError::query_failed(
                            QueryKind::SampleModels,
                            format!("sampling worker did not finish: {e}"),
                        )),
                    )
                }));
            }
            batches
        });
        batches.sort_by_key(|(worker, _)| *worker);

        let mut models = Vec::with_capacity(total);
        for (worker, batch) in batches {
            match batch {
                Ok(batch) => models.extend(batch),
                Err(e) => {
                    tracing::warn!(worker, error = %e, "sampling worker failed");
                    return Err(e);
                }
            }
        }

        tracing::info!(worker_count, total = models.len(), "parallel sampling finished");
        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::{Bindings, Query, QueryExecutor};
    use crate::testing::ScriptedBackend;

    fn sampler(backend: ScriptedBackend) -> (Arc<ScriptedBackend>, Sampler) {
        let backend = Arc::new(backend);
        let world = World::load(backend.clone(), "worlds/test.pl").unwrap();
        (backend, Sampler::new(world))
    }

    fn p() -> Model {
        "model(([p],[]))".parse().unwrap()
    }

    fn q() -> Model {
        "model(([q],[]))".parse().unwrap()
    }

    #[test]
    fn sample_one_returns_a_model() {
        let (_, sampler) = sampler(ScriptedBackend::two_propositions());
        assert_eq!(sampler.sample_one().unwrap(), p());
        assert_eq!(sampler.sample_one().unwrap(), q());
    }

    #[test]
    fn sample_many_keeps_duplicates_in_order() {
        let (_, sampler) = sampler(ScriptedBackend::two_propositions());
        let models = sampler.sample_many(3).unwrap();
        assert_eq!(models, vec![p(), q(), p()]);
    }

    #[test]
    fn zero_count_fails_fast() {
        let (backend, sampler) = sampler(ScriptedBackend::two_propositions());
        let before = backend.calls();
        assert!(matches!(
            sampler.sample_many(0),
            Err(DfsError::InvalidArgument(_))
        ));
        assert_eq!(backend.calls(), before);
    }

    #[test]
    fn unsatisfiable_world_fails_the_query() {
        let (_, sampler) = sampler(ScriptedBackend::new(Vec::new(), Vec::new()));
        assert!(matches!(
            sampler.sample_one(),
            Err(DfsError::BackendQueryFailed { .. })
        ));
        assert!(matches!(
            sampler.sample_many(2),
            Err(DfsError::BackendQueryFailed { .. })
        ));
    }

    struct ShortBackend;

    impl QueryExecutor for ShortBackend {
        fn execute(&self, _query: &Query) -> Result<Bindings> {
            let mut outputs = Bindings::new();
            outputs.insert(binding::MODELS.into(), "[model(([p],[]))]".into());
            Ok(outputs)
        }
    }

    #[test]
    fn short_answer_is_malformed() {
        let world = World::load(Arc::new(ShortBackend), "worlds/test.pl").unwrap();
        let sampler = Sampler::new(world);
        assert!(matches!(
            sampler.sample_many(2),
            Err(DfsError::MalformedTerm { .. })
        ));
        assert!(matches!(
            sampler.sample_one(),
            Err(DfsError::MalformedTerm { .. })
        ));
    }

    #[test]
    fn parallel_sampling_concatenates_all_workers() {
        let (_, sampler) = sampler(ScriptedBackend::two_propositions());
        let models = sampler.sample_many_parallel(3, 2).unwrap();
        assert_eq!(models.len(), 6);
        assert_eq!(models.iter().filter(|m| **m == p()).count(), 3);
        assert_eq!(models.iter().filter(|m| **m == q()).count(), 3);
    }

    #[test]
    fn parallel_sampling_validates_arguments() {
        let (backend, sampler) = sampler(ScriptedBackend::two_propositions());
        let before = backend.calls();
        for (workers, per_worker) in [
            (0, 2),
            (2, 0),
            (DEFAULT_MAX_PARALLEL_WORKERS + 1, 1),
            (2, usize::MAX),
        ] {
            assert!(matches!(
                sampler.sample_many_parallel(workers, per_worker),
                Err(DfsError::InvalidArgument(_))
            ));
        }
        assert_eq!(backend.calls(), before);
    }

    #[test]
    fn parallel_sampling_reports_worker_failure() {
        let (_, sampler) = sampler(ScriptedBackend::new(Vec::new(), Vec::new()));
        assert!(matches!(
            sampler.sample_many_parallel(2, 2),
            Err(DfsError::BackendQueryFailed { .. })
        ));
    }

    #[tokio::test]
    async fn parallel_sampling_refuses_async_context() {
        let (_, sampler) = sampler(ScriptedBackend::two_propositions());
        assert!(matches!(
            sampler.sample_many_parallel(2, 1),
            Err(DfsError::InvalidArgument(_))
        ));
    }
}
