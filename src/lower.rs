//! Lower a specialized grammar to flat productions.
//!
//! Optional elements are expanded away (one production per subset of the
//! optional slots, with reduction expressions reindexed to match), and empty
//! productions are eliminated in two steps around that expansion: first every
//! use of a nullable nonterminal is wrapped in `Optional`, then empty bodies
//! are dropped everywhere except at the goals.
//!
//! Flat productions keep enough provenance to tie the generated tables back
//! to the source grammar: the owning nonterminal, the index of the source
//! production within it, and which optional slots were dropped.

use std::{fmt::Debug, hash::Hash};

use indexmap::IndexMap;

use crate::{
    compute::nullable_set,
    grammar::{Grammar, NtDef, NtName, Production, ReduceExpr, Symbol},
};

/// A fully lowered production.
///
/// Many flat productions can share the same `nt` and `index` when they were
/// expanded from one source production with optional elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prod<T: Eq + Hash + Clone> {
    /// The nonterminal this production belongs to
    pub nt: NtName,
    /// Index of the source production within `nt`'s production list
    pub index: usize,
    /// The lowered right-hand side: terminals, nonterminals, and lookahead
    /// restrictions only
    pub rhs: Vec<Symbol<T>>,
    /// Ascending positions in the source body whose optional slots were
    /// dropped here
    pub removals: Vec<usize>,
    /// The reduction expression, reindexed for this expansion
    pub action: ReduceExpr,
}

/// Expand a body that may contain optional elements into bodies that do not.
///
/// Yields every body obtained by replacing each optional element with either
/// its inner symbol or nothing, paired with the ascending list of dropped
/// positions. For a body with no optional elements, yields the body itself
/// and no removals.
pub fn expand_optional_symbols_in_rhs<T: Eq + Hash + Clone>(
    rhs: &[Symbol<T>],
) -> Vec<(Vec<Symbol<T>>, Vec<usize>)> {
    expand_from(rhs, 0)
}

/// Expansion of `rhs[start..]`, prefixing removals with positions in `rhs`.
fn expand_from<T: Eq + Hash + Clone>(
    rhs: &[Symbol<T>],
    start: usize,
) -> Vec<(Vec<Symbol<T>>, Vec<usize>)> {
    let i = match (start..rhs.len()).find(|&i| matches!(rhs[i], Symbol::Optional(_))) {
        None => return vec![(rhs[start..].to_vec(), vec![])],
        Some(i) => i,
    };
    let inner = match &rhs[i] {
        Symbol::Optional(inner) => inner.as_ref(),
        _ => unreachable!(),
    };

    let mut out = Vec::new();
    for (expanded, removals) in expand_from(rhs, i + 1) {
        // without rhs[i]
        let mut dropped: Vec<Symbol<T>> = rhs[start..i].to_vec();
        dropped.extend(expanded.iter().cloned());
        let mut dropped_removals = vec![i];
        dropped_removals.extend(removals.iter().cloned());
        out.push((dropped, dropped_removals));
        // with rhs[i]
        let mut kept: Vec<Symbol<T>> = rhs[start..i].to_vec();
        kept.push(inner.clone());
        kept.extend(expanded.iter().cloned());
        out.push((kept, removals));
    }
    out
}

/// Rewrite a reduction expression for one optional expansion.
///
/// An index into a removed slot becomes `None`; an index into a kept
/// optional slot is shifted left past the removals and wrapped in `Some`; an
/// index into a kept plain slot is just shifted.
fn adjust_reduce_expr<T: Eq + Hash + Clone>(
    expr: &ReduceExpr,
    removals: &[usize],
    body: &[Symbol<T>],
) -> ReduceExpr {
    match expr {
        ReduceExpr::Child(i) => {
            if removals.contains(i) {
                return ReduceExpr::None;
            }
            let was_optional = matches!(body[*i], Symbol::Optional(_));
            let shifted = i - removals.iter().filter(|r| **r < *i).count();
            if was_optional {
                ReduceExpr::Some(Box::new(ReduceExpr::Child(shifted)))
            } else {
                ReduceExpr::Child(shifted)
            }
        }
        ReduceExpr::None => ReduceExpr::None,
        ReduceExpr::Some(inner) => {
            ReduceExpr::Some(Box::new(adjust_reduce_expr(inner, removals, body)))
        }
        ReduceExpr::CallMethod { method, args } => ReduceExpr::CallMethod {
            method: method.clone(),
            args: args
                .iter()
                .map(|arg| adjust_reduce_expr(arg, removals, body))
                .collect(),
        },
        // Never turned into code downstream, so nothing to adjust.
        ReduceExpr::Accept => ReduceExpr::Accept,
    }
}

/// Expand every optional element in the grammar.
///
/// Returns the expanded grammar together with the flat production list (the
/// position of each [`Prod`] in it is its global index, used in the action
/// tables) and a map from nonterminal to its `(index, rhs)` pairs for fast
/// lookup during closure.
#[allow(clippy::type_complexity)]
pub fn expand_optionals<T: Eq + Hash + Clone + Debug>(
    grammar: &Grammar<T>,
) -> (
    Grammar<T>,
    Vec<Prod<T>>,
    IndexMap<NtName, Vec<(usize, Vec<Symbol<T>>)>>,
) {
    let mut expanded: IndexMap<NtName, NtDef<T>> = IndexMap::new();
    let mut prods: Vec<Prod<T>> = Vec::new();
    let mut prods_by_nt: IndexMap<NtName, Vec<(usize, Vec<Symbol<T>>)>> = IndexMap::new();

    for (nt, def) in grammar.nonterminals() {
        let plist = match def {
            NtDef::Rules(plist) => plist,
            NtDef::Parameterized(_) => continue,
        };
        let mut new_list = Vec::new();
        for (prod_index, p) in plist.iter().enumerate() {
            for (expanded_rhs, removals) in expand_optional_symbols_in_rhs(&p.body) {
                let action = adjust_reduce_expr(&p.action, &removals, &p.body);
                new_list.push(Production::new(expanded_rhs.clone(), action.clone()));
                prods.push(Prod {
                    nt: nt.clone(),
                    index: prod_index,
                    rhs: expanded_rhs.clone(),
                    removals,
                    action,
                });
                prods_by_nt
                    .entry(nt.clone())
                    .or_default()
                    .push((prods.len() - 1, expanded_rhs));
            }
        }
        expanded.insert(nt.clone(), NtDef::Rules(new_list));
    }

    (grammar.with_nonterminals(expanded), prods, prods_by_nt)
}

/// Epsilon elimination, step 1: wrap every use of a nullable nonterminal in
/// `Optional`, so that after optional expansion a production either consumes
/// every remaining element or is truly empty.
///
/// The grammar must already be cycle-free.
pub fn wrap_nullable_uses<T: Eq + Hash + Clone + Debug>(grammar: &Grammar<T>) -> Grammar<T> {
    let empties = nullable_set(grammar);

    let wrapped = grammar
        .nonterminals()
        .iter()
        .map(|(nt, def)| {
            let def = match def {
                NtDef::Rules(plist) => NtDef::Rules(
                    plist
                        .iter()
                        .map(|p| {
                            p.with_body(
                                p.body
                                    .iter()
                                    .map(|e| match e {
                                        Symbol::Nonterminal(n) if empties.contains(n) => {
                                            Symbol::opt(e.clone())
                                        }
                                        _ => e.clone(),
                                    })
                                    .collect(),
                            )
                        })
                        .collect(),
                ),
                other => other.clone(),
            };
            (nt.clone(), def)
        })
        .collect();
    grammar.with_nonterminals(wrapped)
}

/// Epsilon elimination, step 2: drop every production with an empty body,
/// except on goal nonterminals, which are allowed to accept the empty input.
pub fn drop_empty_productions<T: Eq + Hash + Clone + Debug>(grammar: &Grammar<T>) -> Grammar<T> {
    let filtered = grammar
        .nonterminals()
        .iter()
        .map(|(nt, def)| {
            let keep_empty = matches!(nt, NtName::Plain(name) if grammar.goals().contains(name));
            let def = match def {
                NtDef::Rules(plist) => NtDef::Rules(
                    plist
                        .iter()
                        .filter(|p| !p.body.is_empty() || keep_empty)
                        .cloned()
                        .collect(),
                ),
                other => other.clone(),
            };
            (nt.clone(), def)
        })
        .collect();
    grammar.with_nonterminals(filtered)
}
