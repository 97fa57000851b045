//! Evaluating actions typed into the console.
//!
//! The console's dispatcher sends either expression text or a creator picked
//! from the catalog this instance advertised. Expressions are one of:
//!
//! ```text
//! {"type": "ADD", "amount": 5}     JSON object literal, decoded as the action
//! add(5)                           call to a catalog creator
//! counter.add(5, {"silent": true}) namespaced creator, JSON literal arguments
//! ```
//!
//! Nothing is compiled. Only creators registered in code can be called.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::recognize,
    multi::{many0_count, separated_list1},
    sequence::{pair, preceded, terminated},
    IResult,
};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::core::Action;
use crate::error::EvalError;
use crate::messages::ActionPayload;

type CreatorFn<A> = dyn Fn(&[Value]) -> anyhow::Result<A> + Send + Sync;

/// A named factory the console can call to build an action.
pub struct ActionCreator<A> {
    name: String,
    args: Vec<String>,
    func: Arc<CreatorFn<A>>,
}

impl<A> ActionCreator<A> {
    /// Create a creator with no declared arguments.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<A> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            args: Vec::new(),
            func: Arc::new(func),
        }
    }

    /// Declare argument names, shown by the console's dispatcher form.
    pub fn with_args(mut self, args: &[&str]) -> Self {
        self.args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    /// The creator's own name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Call the creator.
    pub fn call(&self, args: &[Value]) -> anyhow::Result<A> {
        (self.func)(args)
    }
}

impl<A> Clone for ActionCreator<A> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            args: self.args.clone(),
            func: Arc::clone(&self.func),
        }
    }
}

impl<A> fmt::Debug for ActionCreator<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionCreator")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// Action creators as configured: a flat list or a keyed tree.
#[derive(Clone, Debug)]
pub enum ActionCreators<A> {
    /// Creators listed under their own names.
    List(Vec<ActionCreator<A>>),
    /// Creators keyed by name; nested maps become dotted namespaces.
    Map(BTreeMap<String, CreatorNode<A>>),
}

/// A node in a keyed creator tree.
#[derive(Clone, Debug)]
pub enum CreatorNode<A> {
    /// A creator, called by its key.
    Creator(ActionCreator<A>),
    /// A namespace of further creators.
    Namespace(BTreeMap<String, CreatorNode<A>>),
}

impl<A> From<ActionCreator<A>> for CreatorNode<A> {
    fn from(creator: ActionCreator<A>) -> Self {
        CreatorNode::Creator(creator)
    }
}

/// What the console sees of one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatorDescription {
    /// Dotted name used in expressions.
    pub name: String,
    /// Declared argument names.
    pub args: Vec<String>,
}

/// Flattened, ordered catalog of callable creators.
#[derive(Debug)]
pub struct ActionCatalog<A> {
    entries: Vec<(String, ActionCreator<A>)>,
}

impl<A> ActionCatalog<A> {
    /// Flatten configured creators into a catalog.
    pub fn build(creators: &ActionCreators<A>) -> Self {
        let mut entries = Vec::new();
        creators.visit(&mut |name: String, creator: &ActionCreator<A>| {
            entries.push((name, creator.clone()))
        });
        Self { entries }
    }

    /// An empty catalog.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Look a creator up by dotted name.
    pub fn get(&self, name: &str) -> Option<&ActionCreator<A>> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, creator)| creator)
    }

    /// Look a creator up by catalog position.
    pub fn get_index(&self, index: usize) -> Option<(&str, &ActionCreator<A>)> {
        self.entries
            .get(index)
            .map(|(name, creator)| (name.as_str(), creator))
    }

    /// Names and arguments in catalog order.
    pub fn describe(&self) -> Vec<CreatorDescription> {
        self.entries
            .iter()
            .map(|(name, creator)| CreatorDescription {
                name: name.clone(),
                args: creator.args.clone(),
            })
            .collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<A> ActionCreators<A> {
    /// Names and arguments in catalog order, without building a catalog.
    pub fn describe(&self) -> Vec<CreatorDescription> {
        let mut out = Vec::new();
        self.visit(&mut |name: String, creator: &ActionCreator<A>| {
            out.push(CreatorDescription {
                name,
                args: creator.args.clone(),
            })
        });
        out
    }

    fn visit<F>(&self, f: &mut F)
    where
        F: FnMut(String, &ActionCreator<A>),
    {
        match self {
            ActionCreators::List(list) => {
                for creator in list {
                    f(creator.name.clone(), creator);
                }
            }
            ActionCreators::Map(map) => visit_tree(map, "", f),
        }
    }
}

fn visit_tree<A, F>(map: &BTreeMap<String, CreatorNode<A>>, namespace: &str, f: &mut F)
where
    F: FnMut(String, &ActionCreator<A>),
{
    for (key, node) in map {
        match node {
            CreatorNode::Creator(creator) => {
                let key = if key.is_empty() { &creator.name } else { key };
                f(format!("{}{}", namespace, key), creator);
            }
            CreatorNode::Namespace(children) => {
                visit_tree(children, &format!("{}{}.", namespace, key), f);
            }
        }
    }
}

/// Evaluates console actions against a cached catalog.
#[derive(Debug)]
pub struct Evaluator<A> {
    cache: HashMap<String, Arc<ActionCatalog<A>>>,
    builds: usize,
}

impl<A: Action> Evaluator<A> {
    /// Create an evaluator with an empty cache.
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            builds: 0,
        }
    }

    /// The catalog for `creators`, built once per distinct set of names.
    pub fn catalog(&mut self, creators: Option<&ActionCreators<A>>) -> Arc<ActionCatalog<A>> {
        let Some(creators) = creators else {
            return Arc::new(ActionCatalog::empty());
        };

        let key = serde_json::to_string(&creators.describe()).unwrap_or_default();
        let builds = &mut self.builds;
        self.cache
            .entry(key)
            .or_insert_with(|| {
                let catalog = ActionCatalog::build(creators);
                *builds += 1;
                debug!(creators = catalog.len(), "built action catalog");
                Arc::new(catalog)
            })
            .clone()
    }

    /// Number of cached catalogs.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Number of catalogs built so far.
    pub fn builds(&self) -> usize {
        self.builds
    }

    /// Turn a console `ACTION` payload into a domain action.
    pub fn evaluate(
        &mut self,
        payload: &ActionPayload,
        creators: Option<&ActionCreators<A>>,
    ) -> Result<A, EvalError> {
        let catalog = self.catalog(creators);
        match payload {
            ActionPayload::Expression(source) => evaluate(source, &catalog),
            ActionPayload::Selected {
                selected,
                args,
                rest,
            } => evaluate_selected(*selected, args, rest.as_deref(), &catalog),
        }
    }
}

impl<A: Action> Default for Evaluator<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluate expression text against `catalog`.
pub fn evaluate<A: Action>(source: &str, catalog: &ActionCatalog<A>) -> Result<A, EvalError> {
    let source = source.trim();

    if source.starts_with('{') {
        let value: Value = serde_json::from_str(source).map_err(|e| EvalError::Parse {
            input: source.to_string(),
            message: e.to_string(),
        })?;
        return A::from_data(value).map_err(EvalError::Literal);
    }

    let (rest, name) = call_head(source).map_err(|e| EvalError::Parse {
        input: source.to_string(),
        message: e.to_string(),
    })?;
    let inner = rest
        .trim_end()
        .strip_suffix(')')
        .ok_or_else(|| EvalError::Parse {
            input: source.to_string(),
            message: "missing closing parenthesis".to_string(),
        })?;

    let args: Vec<Value> =
        serde_json::from_str(&format!("[{}]", inner)).map_err(|source| EvalError::Arguments {
            name: name.to_string(),
            source,
        })?;

    call(catalog, name, &args)
}

fn evaluate_selected<A: Action>(
    selected: usize,
    args: &[String],
    rest: Option<&str>,
    catalog: &ActionCatalog<A>,
) -> Result<A, EvalError> {
    let (name, _) = catalog
        .get_index(selected)
        .ok_or_else(|| EvalError::UnknownCreator {
            name: format!("#{}", selected),
        })?;

    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        let value = if arg.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(arg).map_err(|source| EvalError::Arguments {
                name: name.to_string(),
                source,
            })?
        };
        values.push(value);
    }
    if let Some(rest) = rest.map(str::trim).filter(|r| !r.is_empty()) {
        let spread: Vec<Value> =
            serde_json::from_str(rest).map_err(|source| EvalError::Arguments {
                name: name.to_string(),
                source,
            })?;
        values.extend(spread);
    }

    call(catalog, name, &values)
}

fn call<A>(catalog: &ActionCatalog<A>, name: &str, args: &[Value]) -> Result<A, EvalError> {
    let creator = catalog.get(name).ok_or_else(|| EvalError::UnknownCreator {
        name: name.to_string(),
    })?;
    creator.call(args).map_err(|source| EvalError::Creator {
        name: name.to_string(),
        source,
    })
}

// =============================================================================
// Expression grammar
// =============================================================================

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"), tag("$"))),
        many0_count(alt((alphanumeric1, tag("_"), tag("$")))),
    ))(input)
}

fn creator_path(input: &str) -> IResult<&str, &str> {
    recognize(separated_list1(char('.'), identifier))(input)
}

/// `name(` with optional whitespace; returns the name and what follows `(`.
fn call_head(input: &str) -> IResult<&str, &str> {
    terminated(
        preceded(multispace0, creator_path),
        pair(multispace0, char('(')),
    )(input)
}
