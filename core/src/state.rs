use std::collections::BTreeMap;
use std::fmt;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::node::NodeId;

pub type TokenId = u64;

/// A script-visible value. Lists only appear as distribution parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Num(f64),
    Bool(bool),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    pub fn truthy(&self) -> bool {
        match self {
            Value::Num(n) => *n != 0.0,
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
        }
    }

    /// Numeric view; booleans coerce to 0/1 like the script language does.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Bool(b) => Some(*b as u8 as f64),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Num(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
            Value::List(_) => "list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Per-node timing record carried by a token. `completions` doubles as the
/// synchronization counter for And-joins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub arrived: Option<f64>,
    pub begun: Option<f64>,
    pub ended: Option<f64>,
    pub completions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub attrs: BTreeMap<String, Value>,
    pub visits: BTreeMap<NodeId, Visit>,
}

impl Token {
    fn new(id: TokenId) -> Self {
        Self {
            id,
            attrs: BTreeMap::new(),
            visits: BTreeMap::new(),
        }
    }

    pub fn visit(&self, node: NodeId) -> Option<&Visit> {
        self.visits.get(&node)
    }

    pub fn visit_mut(&mut self, node: NodeId) -> &mut Visit {
        self.visits.entry(node).or_default()
    }
}

/// All mutable run state that is not owned by a node: the token arena, the
/// run-global scenario map and the seeded RNG. Owned by the caller and passed
/// by reference into the scheduler and node operations; `reset` prepares the
/// next repetition while the RNG stream continues.
pub struct SimContext {
    tokens: Vec<Token>,
    pub scenario: BTreeMap<String, Value>,
    pub rng: ChaCha8Rng,
}

impl SimContext {
    pub fn new(seed: u64) -> Self {
        Self {
            tokens: Vec::new(),
            scenario: BTreeMap::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Clears tokens and scenario state for a fresh repetition. The RNG is
    /// deliberately left alone so a batch consumes one reproducible stream.
    pub fn reset(&mut self) {
        self.tokens.clear();
        self.scenario.clear();
    }

    pub fn new_token(&mut self) -> TokenId {
        let id = self.tokens.len() as TokenId + 1;
        self.tokens.push(Token::new(id));
        id
    }

    pub fn token(&self, id: TokenId) -> &Token {
        &self.tokens[(id - 1) as usize]
    }

    pub fn token_mut(&mut self, id: TokenId) -> &mut Token {
        &mut self.tokens[(id - 1) as usize]
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter()
    }
}
