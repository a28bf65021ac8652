//! In-process scripted backend for unit tests.
//!
//! Samples from a fixed list of models in round-robin order and evaluates
//! formulas built from atomic propositions, the `&`, `|`, `->`, `<->` and `neg`
//! connectives, and `exists(X,F)` / `forall(X,F)` over a model's individuals.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::backend::{binding, Bindings, Query, QueryExecutor, QueryKind};
use crate::error::{DfsError, Result};
use crate::model::{models_from_text, models_to_text, AtomicProposition, Model};
use crate::term::{Connective, Term, NEG};

pub struct ScriptedBackend {
    models: Vec<Model>,
    corpus: Vec<(Vec<String>, String)>,
    loaded: Mutex<BTreeSet<String>>,
    next_model: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(models: Vec<Model>, corpus: Vec<(&str, &str)>) -> Self {
        Self {
            models,
            corpus: corpus
                .into_iter()
                .map(|(sentence, semantics)| {
                    (
                        sentence.split_whitespace().map(str::to_string).collect(),
                        semantics.to_string(),
                    )
                })
                .collect(),
            loaded: Mutex::new(BTreeSet::new()),
            next_model: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// World with propositions `p` and `q`, sampling `{p}` then `{q}` alternately.
    pub fn two_propositions() -> Self {
        Self::new(
            vec![
                "model(([p],[]))".parse().unwrap(),
                "model(([q],[]))".parse().unwrap(),
            ],
            vec![("p holds", "p"), ("p or q", "p | q"), ("p and q", "p & q")],
        )
    }

    /// World about john and mary.
    pub fn lovers() -> Self {
        Self::new(
            vec![
                "model(([love(john,mary),sleep(mary)],[john,mary]))".parse().unwrap(),
                "model(([love(mary,john)],[john,mary]))".parse().unwrap(),
                "model(([sleep(john),sleep(mary)],[john,mary]))".parse().unwrap(),
            ],
            vec![
                ("john loves mary", "love(john,mary)"),
                ("someone sleeps", "exists(X,sleep(X))"),
                ("everyone sleeps", "forall(X,sleep(X))"),
            ],
        )
    }

    /// Number of queries executed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check_world(&self, query: &Query) -> Result<()> {
        let world = query.input(binding::WORLD)?;
        let loaded = self.loaded.lock().unwrap();
        if loaded.contains(world) {
            Ok(())
        } else {
            Err(DfsError::SpecificationNotLoaded(world.to_string()))
        }
    }

    fn sample(&self) -> Result<Model> {
        if self.models.is_empty() {
            return Err(DfsError::query_failed(
                QueryKind::SampleModel,
                "world has no models",
            ));
        }
        let i = self.next_model.fetch_add(1, Ordering::SeqCst);
        Ok(self.models[i % self.models.len()].clone())
    }

    fn signature(&self) -> BTreeSet<(String, usize)> {
        self.models.iter().flat_map(Model::predicates).collect()
    }

    fn eval(&self, formula: &Term, model: &Model) -> Result<bool> {
        if let Term::Compound { functor, args } = formula {
            if let (Some(op), [lhs, rhs]) = (Connective::from_functor(functor), args.as_slice()) {
                let (l, r) = (self.eval(lhs, model)?, self.eval(rhs, model)?);
                return Ok(match op {
                    Connective::And => l && r,
                    Connective::Or => l || r,
                    Connective::Implies => !l || r,
                    Connective::Iff => l == r,
                });
            }
            match (functor.as_str(), args.as_slice()) {
                (NEG, [operand]) => return Ok(!self.eval(operand, model)?),
                ("exists" | "forall", [Term::Var(var), body]) => {
                    let mut results = model.individuals().iter().map(|individual| {
                        self.eval(&substitute(body, var, individual), model)
                    });
                    return if functor == "exists" {
                        results.try_fold(false, |acc, r| r.map(|b| acc || b))
                    } else {
                        results.try_fold(true, |acc, r| r.map(|b| acc && b))
                    };
                }
                _ => {}
            }
        }

        let proposition = AtomicProposition::new(formula.clone())
            .map_err(|e| DfsError::query_failed(QueryKind::Vector, e.to_string()))?;
        let (name, arity) = proposition.predicate();
        if !self.signature().contains(&(name.to_string(), arity)) {
            return Err(DfsError::query_failed(
                QueryKind::Vector,
                format!("unknown predicate {name}/{arity}"),
            ));
        }
        Ok(model.holds(&proposition))
    }
}

fn substitute(term: &Term, var: &str, individual: &str) -> Term {
    match term {
        Term::Var(v) if v == var => Term::atom(individual),
        Term::Compound { functor, args } => Term::compound(
            functor.clone(),
            args.iter().map(|a| substitute(a, var, individual)).collect(),
        ),
        Term::List(items) => Term::List(items.iter().map(|a| substitute(a, var, individual)).collect()),
        Term::Tuple(items) => {
            Term::Tuple(items.iter().map(|a| substitute(a, var, individual)).collect())
        }
        other => other.clone(),
    }
}

impl QueryExecutor for ScriptedBackend {
    fn execute(&self, query: &Query) -> Result<Bindings> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut outputs = Bindings::new();
        match query.query {
            QueryKind::LoadWorld => {
                let spec = query.input(binding::SPEC)?;
                self.loaded.lock().unwrap().insert(spec.to_string());
            }
            QueryKind::SampleModel => {
                self.check_world(query)?;
                outputs.insert(binding::MODEL.into(), self.sample()?.to_string());
            }
            QueryKind::SampleModels => {
                self.check_world(query)?;
                let count: usize = query
                    .input(binding::NUM_MODELS)?
                    .parse()
                    .map_err(|_| DfsError::query_failed(query.query, "NumModels is not a count"))?;
                let models = (0..count).map(|_| self.sample()).collect::<Result<Vec<_>>>()?;
                outputs.insert(binding::MODELS.into(), models_to_text(&models));
            }
            QueryKind::Vector => {
                self.check_world(query)?;
                let formula = Term::parse(query.input(binding::FORMULA)?)
                    .map_err(|e| DfsError::query_failed(query.query, e.to_string()))?;
                let models = models_from_text(query.input(binding::MODELS)?)?;
                let bits = models
                    .iter()
                    .map(|m| self.eval(&formula, m).map(|b| Term::Int(b as i64)))
                    .collect::<Result<Vec<_>>>()?;
                outputs.insert(binding::VECTOR.into(), Term::List(bits).to_string());
            }
            QueryKind::Sentences => {
                self.check_world(query)?;
                let mappings = self
                    .corpus
                    .iter()
                    .map(|(words, semantics)| {
                        let sentence = Term::List(words.iter().map(Term::atom).collect());
                        format!("mapping({sentence},{semantics})")
                    })
                    .collect::<Vec<_>>();
                outputs.insert(binding::MAPPINGS.into(), format!("[{}]", mappings.join(",")));
            }
        }
        Ok(outputs)
    }
}
