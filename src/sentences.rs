//! Sentence-semantics corpus and its vectorisation over a model set.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::{binding, output, QueryKind, World};
use crate::error::{DfsError, Result};
use crate::evaluator::{Evaluator, Formula, TruthVector};
use crate::model::Model;
use crate::term::Term;

/// A sentence as its sequence of words.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Sentence(pub Vec<String>);

impl Sentence {
    pub fn words(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

/// One corpus entry. A sentence may occur with several semantics and vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SentenceSemantics {
    pub sentence: Sentence,
    pub semantics: Formula,
}

impl SentenceSemantics {
    /// Decodes `mapping([Word,...],Semantics)`.
    fn from_term(term: &Term) -> Result<Self> {
        let shape_error = || {
            DfsError::malformed(&term.to_string(), "expected mapping([Word,...],Semantics)")
        };
        let Term::Compound { functor, args } = term else {
            return Err(shape_error());
        };
        let ("mapping", [Term::List(words), semantics]) = (functor.as_str(), args.as_slice())
        else {
            return Err(shape_error());
        };

        let words = words
            .iter()
            .map(|w| w.as_atom().map(str::to_string).ok_or_else(shape_error))
            .collect::<Result<Vec<_>>>()?;
        let semantics = Formula::from_term(semantics.clone())
            .map_err(|e| DfsError::malformed(&term.to_string(), e.to_string()))?;

        Ok(Self {
            sentence: Sentence(words),
            semantics,
        })
    }
}

/// A corpus entry with the truth vector of its semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceVector {
    pub sentence: Sentence,
    pub semantics: Formula,
    pub truth: TruthVector,
}

/// Pairs the backend's sentence corpus with truth vectors over model sets.
#[derive(Debug, Clone)]
pub struct Vectorizer {
    world: World,
    evaluator: Evaluator,
}

impl Vectorizer {
    pub fn new(world: World) -> Self {
        let evaluator = Evaluator::new(world.clone());
        Self { world, evaluator }
    }

    /// Every sentence-semantics mapping the world's grammar generates.
    #[tracing::instrument(skip(self), fields(world = %self.world.spec()))]
    pub fn load_corpus(&self) -> Result<Vec<SentenceSemantics>> {
        let query = self.world.query(QueryKind::Sentences);
        let outputs = self.world.run(&query)?;
        let text = output(&outputs, query.query, binding::MAPPINGS)?;

        let Term::List(items) = Term::parse(text)? else {
            return Err(DfsError::malformed(text, "expected a list of mappings"));
        };
        let corpus = items
            .iter()
            .map(SentenceSemantics::from_term)
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(mappings = corpus.len(), "loaded sentence corpus");
        Ok(corpus)
    }

    /// One `(sentence, semantics, truth vector)` triple per mapping, in order.
    ///
    /// Stops at the first mapping whose semantics cannot be evaluated, since a
    /// partial result could not keep every vector aligned with `models`.
    #[tracing::instrument(skip_all, fields(mappings = mappings.len(), models = models.len()))]
    pub fn vectorize(
        &self,
        mappings: &[SentenceSemantics],
        models: &[Model],
    ) -> Result<Vec<SentenceVector>> {
        mappings
            .iter()
            .map(|mapping| {
                let truth = self
                    .evaluator
                    .truth_vector(&mapping.semantics, models)
                    .inspect_err(|e| {
                        tracing::warn!(sentence = %mapping.sentence, error = %e, "vectorisation aborted");
                    })?;
                Ok(SentenceVector {
                    sentence: mapping.sentence.clone(),
                    semantics: mapping.semantics.clone(),
                    truth,
                })
            })
            .collect()
    }

    /// [`Vectorizer::vectorize`] over the full corpus.
    pub fn vectorize_corpus(&self, models: &[Model]) -> Result<Vec<SentenceVector>> {
        let corpus = self.load_corpus()?;
        self.vectorize(&corpus, models)
    }
}
