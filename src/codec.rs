//! Conversion between models and proposition-state vectors.
//!
//! A model's vector lists every ground atom it can decide: for each predicate
//! with at least one fact, all argument tuples over the model's individuals,
//! with state 1 exactly for the facts. Turning that vector back into a model
//! recovers the same facts and individuals. A model with no facts decides
//! nothing and encodes to the empty vector, which decodes to a fact-less model.

use std::collections::BTreeMap;

use crate::error::{DfsError, Result};
use crate::index::index;
use crate::model::{AtomicProposition, Model, ModelMatrix, ModelVector, State};

/// All `arity`-tuples over `individuals`, in lexicographic order.
fn tuples(individuals: &[String], arity: usize) -> Vec<Vec<String>> {
    let mut out: Vec<Vec<String>> = vec![Vec::new()];
    for _ in 0..arity {
        out = out
            .into_iter()
            .flat_map(|prefix| {
                individuals.iter().map(move |i| {
                    let mut tuple = prefix.clone();
                    tuple.push(i.clone());
                    tuple
                })
            })
            .collect();
    }
    out
}

fn states(model: &Model) -> BTreeMap<AtomicProposition, State> {
    let individuals: Vec<String> = model.individuals().iter().cloned().collect();
    let mut states = BTreeMap::new();
    for (name, arity) in model.predicates() {
        for args in tuples(&individuals, arity) {
            let proposition = AtomicProposition::ground(&name, &args);
            let state = State::from(model.holds(&proposition));
            states.insert(proposition, state);
        }
    }
    states
}

/// Every atomic proposition meaningful to `model`, with its truth state.
pub fn model_to_vector(model: &Model) -> ModelVector {
    ModelVector::from_states(states(model))
}

/// Rebuilds a model from its vector: facts are the state-1 propositions,
/// individuals are every constant the vector mentions.
pub fn vector_to_model(vector: &ModelVector) -> Result<Model> {
    let facts = vector
        .entries()
        .iter()
        .filter(|(_, state)| state.is_true())
        .map(|(p, _)| p.clone());
    let individuals = vector
        .entries()
        .iter()
        .flat_map(|(p, _)| p.individuals().map(str::to_string));

    Model::new(facts, individuals).map_err(|e| DfsError::MalformedVector(e.to_string()))
}

/// One vector per model, in order. Each row also lists every proposition of
/// the set's [`index`] (at state 0 where the model lacks it), so all rows share
/// the set's dimensions.
#[tracing::instrument(skip_all, fields(models = models.len()))]
pub fn models_to_matrix(models: &[Model]) -> ModelMatrix {
    let dimensions = index(models);
    let rows = models
        .iter()
        .map(|model| {
            let mut row = states(model);
            for proposition in &dimensions {
                row.entry(proposition.clone())
                    .or_insert_with(|| State::from(model.holds(proposition)));
            }
            ModelVector::from_states(row)
        })
        .collect();
    tracing::debug!(dimensions = dimensions.len(), "built model matrix");
    ModelMatrix::new(rows)
}

/// Inverse of [`models_to_matrix`]: one model per row, in order.
pub fn matrix_to_models(matrix: &ModelMatrix) -> Result<Vec<Model>> {
    matrix.rows().iter().map(vector_to_model).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(text: &str) -> Model {
        text.parse().unwrap()
    }

    #[test]
    fn vector_enumerates_false_atoms_of_known_predicates() {
        let m = model("model(([love(john,mary)],[john,mary]))");
        assert_eq!(
            model_to_vector(&m).to_string(),
            "[(love(john,john),0),(love(john,mary),1),(love(mary,john),0),(love(mary,mary),0)]"
        );
    }

    #[test]
    fn scenario_matrix_for_two_propositions() {
        let ms = vec![model("model(([p],[]))"), model("model(([q],[]))")];
        let matrix = models_to_matrix(&ms);
        assert_eq!(matrix.to_string(), "[[(p,1),(q,0)],[(p,0),(q,1)]]");
        assert_eq!(matrix.len(), 2);
    }

    #[test]
    fn model_round_trip() {
        for text in [
            "model(([p],[]))",
            "model(([love(john,mary),sleep(mary)],[john,mary]))",
            "model(([give(a,b,c)],[a,b,c]))",
        ] {
            let m = model(text);
            let back = vector_to_model(&model_to_vector(&m)).unwrap();
            assert_eq!(back, m);
            assert!(back.equivalent(&m));
        }
    }

    #[test]
    fn matrix_round_trip_preserves_order_and_length() {
        let ms = vec![
            model("model(([love(john,mary),sleep(mary)],[john,mary]))"),
            model("model(([love(mary,john)],[john,mary]))"),
            model("model(([love(mary,john)],[john,mary]))"),
            model("model(([sleep(john),sleep(mary)],[john,mary]))"),
        ];
        let back = matrix_to_models(&models_to_matrix(&ms)).unwrap();
        assert_eq!(back, ms);
    }

    #[test]
    fn empty_inputs() {
        assert!(models_to_matrix(&[]).is_empty());
        assert!(matrix_to_models(&ModelMatrix::default()).unwrap().is_empty());
        assert_eq!(
            vector_to_model(&ModelVector::default()).unwrap(),
            model("model(([],[]))")
        );
    }

    #[test]
    fn model_without_facts_round_trips() {
        let m = model("model(([],[john,mary]))");
        let vector = model_to_vector(&m);
        assert!(vector.is_empty());

        let back = vector_to_model(&vector).unwrap();
        assert!(back.equivalent(&m));
        assert!(back.facts().is_empty());
    }

    #[test]
    fn matrix_of_fact_less_models_round_trips() {
        let ms = vec![
            model("model(([],[]))"),
            model("model(([],[john]))"),
            model("model(([],[]))"),
        ];
        let matrix = models_to_matrix(&ms);
        assert_eq!(matrix.len(), 3);

        let back = matrix_to_models(&matrix).unwrap();
        assert_eq!(back.len(), ms.len());
        assert!(back.iter().zip(&ms).all(|(b, m)| b.equivalent(m)));
    }

    #[test]
    fn ill_formed_vector_entry_is_malformed() {
        assert!(matches!(
            "[(p,1),(p,0)]".parse::<ModelVector>(),
            Err(DfsError::MalformedVector(_))
        ));
    }

    #[test]
    fn vector_text_from_backend_decodes() {
        let vector: ModelVector = "[(sleep(john),0),(sleep(mary),1)]".parse().unwrap();
        let m = vector_to_model(&vector).unwrap();
        assert_eq!(m.to_string(), "model(([sleep(mary)],[john,mary]))");
    }
}
