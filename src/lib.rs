//! LALR(1) parser-table generator for extended context-free grammars.
//!
//! Grammars may use optional elements, zero-width lookahead restrictions on
//! the next token, and parameterized nonterminals with conditional
//! right-hand sides; reduction behavior travels with each production as
//! data. The generator lowers all of that away, computes FIRST and FOLLOW
//! sets, and builds the shift/reduce/accept action tables and goto tables of
//! a deterministic bottom-up parser, merging states LALR-style. Conflicts
//! are reported with a traceback of how the conflicting state is reached.
//!
//! Build a [`grammar::Grammar`] in memory and hand it to
//! [`lalr::generate_tables`]; serialize the result with a back end
//! implementing [`lalr::Emitter`].

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

mod compute;
mod expand;
mod path;
mod validate;

pub mod error;
pub mod grammar;
pub mod lalr;
pub mod lower;
pub mod ordered;
pub mod state;

#[cfg(test)]
mod test {
    /// shared grammar builders and a table-driven parse helper
    mod support;

    /// ordered-set semantics
    mod ordered;
    /// lowering: optional expansion, epsilon elimination, validators
    mod lower;
    /// FIRST, FOLLOW, and the suffix cache
    mod analysis;
    /// end-to-end table generation, conflicts, and parsing
    mod tables;
}
