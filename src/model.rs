//! Model, proposition and vector-space value types.
//!
//! These are the values exchanged between the sampler, the codec and the
//! evaluator. They are immutable once built and validate their shape on
//! construction, so a `Model` in hand is always well-formed.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{DfsError, Result};
use crate::term::Term;

/// Functor wrapping a model on the backend boundary: `model((Facts,Individuals))`.
const MODEL_FUNCTOR: &str = "model";

/// A ground predicate applied to individuals, e.g. `love(john,mary)` or `p`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AtomicProposition(Term);

impl AtomicProposition {
    /// Accepts an atom, or a compound whose arguments are all atoms.
    pub fn new(term: Term) -> Result<Self> {
        let valid = match &term {
            Term::Atom(_) => true,
            Term::Compound { args, .. } => args.iter().all(|a| a.as_atom().is_some()),
            _ => false,
        };
        if valid {
            Ok(Self(term))
        } else {
            Err(DfsError::malformed(
                &term.to_string(),
                "not an atomic proposition",
            ))
        }
    }

    /// Builds `name(individual, ...)`, or the bare atom `name` when there are none.
    pub(crate) fn ground(name: &str, individuals: &[String]) -> Self {
        if individuals.is_empty() {
            Self(Term::atom(name))
        } else {
            Self(Term::compound(
                name,
                individuals.iter().cloned().map(Term::Atom).collect(),
            ))
        }
    }

    pub fn term(&self) -> &Term {
        &self.0
    }

    /// Predicate name and arity.
    pub fn predicate(&self) -> (&str, usize) {
        match &self.0 {
            Term::Atom(a) => (a, 0),
            Term::Compound { functor, args } => (functor, args.len()),
            _ => unreachable!("validated in AtomicProposition::new"),
        }
    }

    /// The individuals this proposition is about.
    pub fn individuals(&self) -> impl Iterator<Item = &str> {
        let args: &[Term] = match &self.0 {
            Term::Compound { args, .. } => args,
            _ => &[],
        };
        args.iter().filter_map(Term::as_atom)
    }
}

impl fmt::Display for AtomicProposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for AtomicProposition {
    type Err = DfsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(Term::parse(s)?)
    }
}

impl TryFrom<String> for AtomicProposition {
    type Error = DfsError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<AtomicProposition> for String {
    fn from(p: AtomicProposition) -> Self {
        p.to_string()
    }
}

/// Truth state of a proposition in one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum State {
    False,
    True,
}

impl State {
    pub fn as_u8(self) -> u8 {
        match self {
            State::False => 0,
            State::True => 1,
        }
    }

    pub fn is_true(self) -> bool {
        self == State::True
    }
}

impl From<bool> for State {
    fn from(b: bool) -> Self {
        if b {
            State::True
        } else {
            State::False
        }
    }
}

impl From<State> for u8 {
    fn from(s: State) -> Self {
        s.as_u8()
    }
}

impl TryFrom<u8> for State {
    type Error = DfsError;

    fn try_from(n: u8) -> Result<Self> {
        match n {
            0 => Ok(State::False),
            1 => Ok(State::True),
            other => Err(DfsError::MalformedVector(format!(
                "state must be 0 or 1, got {other}"
            ))),
        }
    }
}

/// One possible world: the individuals of its domain and the facts true in it.
///
/// Every individual mentioned by a fact belongs to the domain. Facts and
/// individuals are kept sorted, so equal worlds compare and print equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Model {
    facts: BTreeSet<AtomicProposition>,
    individuals: BTreeSet<String>,
}

impl Model {
    pub fn new(
        facts: impl IntoIterator<Item = AtomicProposition>,
        individuals: impl IntoIterator<Item = String>,
    ) -> Result<Self> {
        let model = Self {
            facts: facts.into_iter().collect(),
            individuals: individuals.into_iter().collect(),
        };
        for fact in &model.facts {
            if let Some(stranger) = fact.individuals().find(|i| !model.individuals.contains(*i)) {
                return Err(DfsError::malformed(
                    &fact.to_string(),
                    format!("individual `{stranger}` is not in the model's domain"),
                ));
            }
        }
        Ok(model)
    }

    pub fn facts(&self) -> &BTreeSet<AtomicProposition> {
        &self.facts
    }

    pub fn individuals(&self) -> &BTreeSet<String> {
        &self.individuals
    }

    /// True if `proposition` is a fact of this model.
    pub fn holds(&self, proposition: &AtomicProposition) -> bool {
        self.facts.contains(proposition)
    }

    /// Predicate symbols (name, arity) with at least one fact.
    pub fn predicates(&self) -> BTreeSet<(String, usize)> {
        self.facts
            .iter()
            .map(|f| {
                let (name, arity) = f.predicate();
                (name.to_string(), arity)
            })
            .collect()
    }

    /// Same truth value for every atomic proposition.
    pub fn equivalent(&self, other: &Model) -> bool {
        self.facts == other.facts
    }

    pub fn to_term(&self) -> Term {
        let facts = self.facts.iter().map(|f| f.term().clone()).collect();
        let individuals = self.individuals.iter().cloned().map(Term::Atom).collect();
        Term::compound(
            MODEL_FUNCTOR,
            vec![Term::Tuple(vec![Term::List(facts), Term::List(individuals)])],
        )
    }

    pub fn from_term(term: &Term) -> Result<Self> {
        let shape_error = || {
            DfsError::malformed(
                &term.to_string(),
                "expected model(([Facts],[Individuals]))",
            )
        };
        let Term::Compound { functor, args } = term else {
            return Err(shape_error());
        };
        let [Term::Tuple(parts)] = args.as_slice() else {
            return Err(shape_error());
        };
        let (MODEL_FUNCTOR, [Term::List(facts), Term::List(individuals)]) =
            (functor.as_str(), parts.as_slice())
        else {
            return Err(shape_error());
        };

        let facts = facts
            .iter()
            .cloned()
            .map(AtomicProposition::new)
            .collect::<Result<Vec<_>>>()?;
        let individuals = individuals
            .iter()
            .map(|i| {
                i.as_atom()
                    .map(str::to_string)
                    .ok_or_else(|| DfsError::malformed(&i.to_string(), "individual must be an atom"))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(facts, individuals)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_term().fmt(f)
    }
}

impl FromStr for Model {
    type Err = DfsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_term(&Term::parse(s)?)
    }
}

impl TryFrom<String> for Model {
    type Error = DfsError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Model> for String {
    fn from(m: Model) -> Self {
        m.to_string()
    }
}

/// An ordered sequence of models; positions index every derived vector.
pub type ModelSet = Vec<Model>;

/// Serializes a model set as a list term: `[model(...),model(...)]`.
pub fn models_to_text(models: &[Model]) -> String {
    Term::List(models.iter().map(Model::to_term).collect()).to_string()
}

/// Parses a list of model terms, rejecting anything else.
pub fn models_from_text(text: &str) -> Result<ModelSet> {
    match Term::parse(text)? {
        Term::List(items) => items.iter().map(Model::from_term).collect(),
        other => Err(DfsError::malformed(
            &other.to_string(),
            "expected a list of models",
        )),
    }
}

/// `(proposition, state)` pairs describing one model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelVector(Vec<(AtomicProposition, State)>);

impl ModelVector {
    /// Fails with [`DfsError::MalformedVector`] if a proposition is listed twice.
    pub fn new(entries: Vec<(AtomicProposition, State)>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for (proposition, _) in &entries {
            if !seen.insert(proposition) {
                return Err(DfsError::MalformedVector(format!(
                    "proposition `{proposition}` is listed more than once"
                )));
            }
        }
        Ok(Self(entries))
    }

    /// Entries in proposition order; keys are unique by construction.
    pub(crate) fn from_states(states: BTreeMap<AtomicProposition, State>) -> Self {
        Self(states.into_iter().collect())
    }

    pub fn entries(&self) -> &[(AtomicProposition, State)] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// State of `proposition`; propositions not listed are false.
    pub fn state_of(&self, proposition: &AtomicProposition) -> State {
        self.0
            .iter()
            .find(|(p, _)| p == proposition)
            .map_or(State::False, |(_, s)| *s)
    }

    pub fn to_term(&self) -> Term {
        Term::List(
            self.0
                .iter()
                .map(|(p, s)| Term::Tuple(vec![p.term().clone(), Term::Int(s.as_u8().into())]))
                .collect(),
        )
    }

    pub fn from_term(term: &Term) -> Result<Self> {
        let Term::List(items) = term else {
            return Err(DfsError::MalformedVector(format!(
                "expected a list of (Proposition,State) pairs, got `{term}`"
            )));
        };
        let entries = items
            .iter()
            .map(|item| match item {
                Term::Tuple(pair) => match pair.as_slice() {
                    [proposition, Term::Int(state)] => {
                        let proposition = AtomicProposition::new(proposition.clone())
                            .map_err(|e| DfsError::MalformedVector(e.to_string()))?;
                        let state = u8::try_from(*state)
                            .map_err(|_| {
                                DfsError::MalformedVector(format!("state out of range: {state}"))
                            })
                            .and_then(State::try_from)?;
                        Ok((proposition, state))
                    }
                    _ => Err(DfsError::MalformedVector(format!(
                        "expected (Proposition,State), got `{item}`"
                    ))),
                },
                other => Err(DfsError::MalformedVector(format!(
                    "expected (Proposition,State), got `{other}`"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(entries)
    }
}

impl fmt::Display for ModelVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_term().fmt(f)
    }
}

impl FromStr for ModelVector {
    type Err = DfsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_term(&Term::parse(s)?)
    }
}

impl TryFrom<String> for ModelVector {
    type Error = DfsError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ModelVector> for String {
    fn from(v: ModelVector) -> Self {
        v.to_string()
    }
}

/// One [`ModelVector`] per model of a model set, in order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelMatrix(Vec<ModelVector>);

impl ModelMatrix {
    pub fn new(rows: Vec<ModelVector>) -> Self {
        Self(rows)
    }

    pub fn rows(&self) -> &[ModelVector] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorted union of the propositions listed by any row.
    pub fn propositions(&self) -> Vec<AtomicProposition> {
        self.0
            .iter()
            .flat_map(|row| row.entries().iter().map(|(p, _)| p.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Dense 0/1 matrix: one row per model, one column per entry of
    /// [`ModelMatrix::propositions`]. Unlisted propositions are 0.
    pub fn to_dense(&self) -> DMatrix<f32> {
        let columns = self.propositions();
        DMatrix::from_fn(self.0.len(), columns.len(), |i, j| {
            f32::from(self.0[i].state_of(&columns[j]).as_u8())
        })
    }
}

impl fmt::Display for ModelMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Term::List(self.0.iter().map(ModelVector::to_term).collect()).fmt(f)
    }
}

impl FromStr for ModelMatrix {
    type Err = DfsError;

    fn from_str(s: &str) -> Result<Self> {
        match Term::parse(s)? {
            Term::List(rows) => Ok(Self(
                rows.iter()
                    .map(ModelVector::from_term)
                    .collect::<Result<Vec<_>>>()?,
            )),
            other => Err(DfsError::MalformedVector(format!(
                "expected a list of model vectors, got `{other}`"
            ))),
        }
    }
}
