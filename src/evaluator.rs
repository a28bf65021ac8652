//! Formula evaluation client and the proposition-indexed vector space.
//!
//! A formula is true in a model iff it is satisfied under every variable
//! assignment; the backend decides this, this module keeps the answers
//! aligned with the model set.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::backend::{binding, output, QueryKind, World};
use crate::codec::matrix_to_models;
use crate::error::{DfsError, Result};
use crate::index::index;
use crate::model::{models_to_text, AtomicProposition, Model, ModelMatrix};
use crate::term::Term;

/// A first-order formula over the world's signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Formula(Term);

impl Formula {
    /// Parses and structurally validates caller-supplied formula text.
    pub fn parse(text: &str) -> Result<Self> {
        let term = Term::parse(text)
            .map_err(|e| DfsError::InvalidArgument(format!("ill-formed formula: {e}")))?;
        Self::from_term(term)
    }

    pub fn from_term(term: Term) -> Result<Self> {
        match term {
            Term::Atom(_) | Term::Compound { .. } => Ok(Self(term)),
            other => Err(DfsError::InvalidArgument(format!(
                "`{other}` is not a formula"
            ))),
        }
    }

    pub fn term(&self) -> &Term {
        &self.0
    }
}

impl From<AtomicProposition> for Formula {
    fn from(p: AtomicProposition) -> Self {
        Self(p.term().clone())
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Formula {
    type Err = DfsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Formula {
    type Error = DfsError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Formula> for String {
    fn from(f: Formula) -> Self {
        f.to_string()
    }
}

/// Satisfaction of one formula across a model set: entry `i` is 1 iff the
/// formula holds in model `i`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TruthVector(Vec<u8>);

impl TruthVector {
    pub fn from_bools(bits: impl IntoIterator<Item = bool>) -> Self {
        Self(bits.into_iter().map(u8::from).collect())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the formula holds in model `i`.
    pub fn holds_in(&self, i: usize) -> Option<bool> {
        self.0.get(i).map(|b| *b == 1)
    }

    pub fn to_dvector(&self) -> DVector<f32> {
        DVector::from_iterator(self.0.len(), self.0.iter().map(|b| f32::from(*b)))
    }

    /// Parses a backend answer `[1,0,...]`; anything but 0/1 integers is rejected.
    pub fn from_text(text: &str) -> Result<Self> {
        let Term::List(items) = Term::parse(text)? else {
            return Err(DfsError::malformed(text, "expected a list of 0/1"));
        };
        items
            .iter()
            .map(|item| match item {
                Term::Int(0) => Ok(0),
                Term::Int(1) => Ok(1),
                other => Err(DfsError::malformed(
                    text,
                    format!("`{other}` is not a truth value"),
                )),
            })
            .collect::<Result<Vec<u8>>>()
            .map(Self)
    }
}

impl fmt::Display for TruthVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Term::List(self.0.iter().map(|b| Term::Int(i64::from(*b))).collect()).fmt(f)
    }
}

/// Every atomic proposition of a model set with its own truth vector.
///
/// Keys are exactly the set's [`index`], iterated in index order; every vector
/// has one entry per model.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PropositionSpace {
    vectors: BTreeMap<AtomicProposition, TruthVector>,
    model_count: usize,
}

impl PropositionSpace {
    pub fn propositions(&self) -> impl Iterator<Item = &AtomicProposition> {
        self.vectors.keys()
    }

    pub fn get(&self, proposition: &AtomicProposition) -> Option<&TruthVector> {
        self.vectors.get(proposition)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AtomicProposition, &TruthVector)> {
        self.vectors.iter()
    }

    /// Number of dimensions (propositions).
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn model_count(&self) -> usize {
        self.model_count
    }

    /// Dense models × propositions matrix, columns in index order. Entries a
    /// vector does not cover (only possible for a deserialized space) are 0.
    pub fn to_dense(&self) -> DMatrix<f32> {
        let columns: Vec<&TruthVector> = self.vectors.values().collect();
        DMatrix::from_fn(self.model_count, columns.len(), |i, j| {
            f32::from(columns[j].as_slice().get(i).copied().unwrap_or(0))
        })
    }
}

/// Asks the backend for formula truth vectors over model sets of a world.
#[derive(Debug, Clone)]
pub struct Evaluator {
    world: World,
}

impl Evaluator {
    pub fn new(world: World) -> Self {
        Self { world }
    }

    /// Truth vector of `formula` over `models`, positions aligned with `models`.
    /// An empty model set gives an empty vector without a backend call.
    #[tracing::instrument(skip_all, fields(formula = %formula, models = models.len()))]
    pub fn truth_vector(&self, formula: &Formula, models: &[Model]) -> Result<TruthVector> {
        if models.is_empty() {
            return Ok(TruthVector::default());
        }

        let query = self
            .world
            .query(QueryKind::Vector)
            .bind(binding::FORMULA, formula.to_string())
            .bind(binding::MODELS, models_to_text(models));
        let outputs = self.world.run(&query)?;
        let text = output(&outputs, query.query, binding::VECTOR)?;
        let vector = TruthVector::from_text(text)?;
        if vector.len() != models.len() {
            return Err(DfsError::malformed(
                text,
                format!(
                    "truth vector has {} entries for {} models",
                    vector.len(),
                    models.len()
                ),
            ));
        }
        Ok(vector)
    }

    /// Same as `truth_vector(formula, matrix_to_models(matrix))`.
    pub fn truth_vector_from_matrix(
        &self,
        formula: &Formula,
        matrix: &ModelMatrix,
    ) -> Result<TruthVector> {
        let models = matrix_to_models(matrix)?;
        self.truth_vector(formula, &models)
    }

    /// Evaluates every proposition of `index(models)` as a formula of its own.
    #[tracing::instrument(skip_all, fields(models = models.len()))]
    pub fn models_to_proposition_vectors(&self, models: &[Model]) -> Result<PropositionSpace> {
        let mut vectors = BTreeMap::new();
        for proposition in index(models) {
            let vector = self.truth_vector(&Formula::from(proposition.clone()), models)?;
            vectors.insert(proposition, vector);
        }
        tracing::debug!(dimensions = vectors.len(), "built proposition space");
        Ok(PropositionSpace {
            vectors,
            model_count: models.len(),
        })
    }
}
