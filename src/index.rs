//! Atomic proposition index: the dimensions of a model set's vector space.

use std::collections::BTreeSet;

use crate::model::{AtomicProposition, Model};

/// All atomic propositions true in at least one of `models`, deduplicated and
/// in standard term order.
///
/// The order depends only on which propositions occur, not on the order or
/// multiplicity of the models, so the same model set always indexes the same way.
pub fn index(models: &[Model]) -> Vec<AtomicProposition> {
    models
        .iter()
        .flat_map(|m| m.facts().iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
