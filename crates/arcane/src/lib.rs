//! Tree-walking interpreter over an automatically reference-counted graph of
//! composites.
//!
//! The interpreter consumes a lexed token list and a parsed syntax tree and
//! produces the resulting composite store and the reports of the run.

pub mod arc;
pub mod ast;
pub mod builtins;
pub mod call;
pub mod composite;
pub mod context;
pub mod control;
pub mod eval;
pub mod graph;
pub mod preferences;
pub mod report;
pub mod resolve;
pub mod snapshot;
pub mod types;
pub mod value;

use serde::{Deserialize, Serialize};

pub use ast::{Node, NodeKind};
pub use composite::{Composite, CompositeId, Store};
pub use context::Interpreter;
pub use preferences::Preferences;
pub use report::{Level, Location, Report, Token};
pub use value::Value;

/// Result of one run.
#[derive(Debug, Serialize)]
pub struct Interpretation {
    pub composites: Store,
    pub reports: Vec<Report>,
}

/// Runs `tree` with `tokens` for locations. A store from an earlier run
/// seeds the interpreter and its global namespace is reused.
pub fn interpret(tokens: Vec<Token>, tree: &Node, composites: Option<Store>, preferences: Preferences) -> Interpretation {
    let mut interpreter = Interpreter::with_store(composites.unwrap_or_default(), preferences);
    interpreter.tokens = tokens;
    interpreter.run_module(tree);
    let (composites, reports) = interpreter.into_parts();
    Interpretation { composites, reports }
}

/// Lexer and parser output of one program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub tokens: Vec<Token>,
    pub tree: Node,
}

impl Program {
    pub fn from_json(json: &str) -> Result<Self, InputError> {
        let program: Program = serde_json::from_str(json)?;
        if !matches!(program.tree.kind, NodeKind::Module { .. }) {
            return Err(InputError::NotAModule(program.tree.type_name()));
        }
        Ok(program)
    }

    pub fn interpret(&self, composites: Option<Store>, preferences: Preferences) -> Interpretation {
        interpret(self.tokens.clone(), &self.tree, composites, preferences)
    }
}

#[derive(Debug)]
pub enum InputError {
    Json(serde_json::Error),
    NotAModule(&'static str),
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputError::Json(error) => write!(f, "Malformed program: {error}"),
            InputError::NotAModule(found) => write!(f, "Program tree must be a module, found {found}"),
        }
    }
}

impl std::error::Error for InputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InputError::Json(error) => Some(error),
            InputError::NotAModule(_) => None,
        }
    }
}

impl From<serde_json::Error> for InputError {
    fn from(error: serde_json::Error) -> Self {
        InputError::Json(error)
    }
}
