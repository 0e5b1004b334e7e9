//! Errors raised while validating a grammar or generating its parser tables.
//!
//! Every failure here is a generation-time failure: if any of these fire, no
//! tables are produced. Conflict errors carry a fully rendered explanation,
//! including the symbol sequence that leads to the conflicting state.

use std::fmt::Display;

/// Types of errors that can happen during grammar validation and table
/// generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A production references a nonterminal that has no grammar entry.
    UnknownNonterminal {
        /// The name that could not be resolved
        name: String,
        /// The production containing the reference
        production: String,
    },
    /// A goal nonterminal is missing, or names a parameterized definition.
    BadGoal {
        /// The offending goal name
        name: String,
    },
    /// An `Optional` wraps something other than a terminal or nonterminal.
    MalformedOptional {
        /// The production containing the bad element
        production: String,
    },
    /// A `Var` appears where no parameter binds it.
    UnboundVar {
        /// The variable name
        name: String,
        /// The production containing the variable
        production: String,
    },
    /// An `Apply` disagrees with the parameterized nonterminal it names.
    BadApply {
        /// The applied nonterminal name
        name: String,
        /// The production containing the application
        production: String,
    },
    /// A reduction expression captures an index past the end of its body.
    BadActionIndex {
        /// The out-of-range index
        index: usize,
        /// The production whose action is broken
        production: String,
    },
    /// A nonterminal can derive itself through a cycle of productions.
    Cycle {
        /// The self-deriving nonterminal
        name: String,
    },
    /// A lookahead restriction is trailing: every element after it can match
    /// the empty string, so there is no upcoming token to restrict.
    TrailingLookahead {
        /// The offending production
        production: String,
    },
    /// A lookahead restriction was still unresolved when a production was
    /// reduced during state analysis.
    LookaheadAtReduce {
        /// The offending production
        production: String,
    },
    /// Two productions are both candidates to reduce on the same terminal in
    /// the same state.
    ReduceReduce {
        /// Rendered explanation of the conflict
        message: String,
    },
    /// A terminal admits both a shift and a reduce action in the same state.
    ShiftReduce {
        /// Rendered explanation of the conflict
        message: String,
    },
    /// An internal invariant of the generator was violated. This indicates a
    /// bug in the generator, not in the grammar.
    Internal {
        /// What went wrong
        message: String,
    },
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            Self::UnknownNonterminal { name, production } => {
                format!("unknown nonterminal {} in production: {}", name, production)
            }
            Self::BadGoal { name } => {
                format!("goal {} is not a plain nonterminal of the grammar", name)
            }
            Self::MalformedOptional { production } => {
                format!(
                    "optional elements may wrap only terminals and nonterminals: {}",
                    production
                )
            }
            Self::UnboundVar { name, production } => {
                format!("unbound variable {} in production: {}", name, production)
            }
            Self::BadApply { name, production } => {
                format!(
                    "arguments do not match the parameters of {} in production: {}",
                    name, production
                )
            }
            Self::BadActionIndex { index, production } => {
                format!(
                    "reduction expression captures element {} which is not in production: {}",
                    index, production
                )
            }
            Self::Cycle { name } => {
                format!("invalid grammar: nonterminal {} can produce itself", name)
            }
            Self::TrailingLookahead { production } => {
                format!(
                    "invalid grammar: lookahead restriction at end of production: {}",
                    production
                )
            }
            Self::LookaheadAtReduce { production } => {
                format!(
                    "invalid grammar: lookahead restriction still active at end of production: {}",
                    production
                )
            }
            Self::ReduceReduce { message } | Self::ShiftReduce { message } => message.clone(),
            Self::Internal { message } => format!("internal error: {}", message),
        };

        write!(f, "{}", str)
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Shorthand for an [`Error::Internal`] with the given message.
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
