//! Compute the nullable set, FIRST sets, and FOLLOW sets of a lowered
//! grammar.
//!
//! Set elements are `Option<T>` with two marker conventions, both documented
//! on the functions that produce them:
//!
//! - in FIRST-flavored sets, `None` means EMPTY: the sequence can derive the
//!   empty string;
//! - in FOLLOW-flavored sets, `None` means END: the end of the input can
//!   appear here.

use std::{fmt::Debug, hash::Hash};

use indexmap::IndexMap;

use crate::{
    grammar::{Grammar, NtDef, NtName, Symbol},
    lower::Prod,
    ordered::{OrderedFrozenSet, OrderedSet},
};

/// Compute a fixed point of `f`, the hard way, starting from `start`.
///
/// Termination depends on `f` being monotone, which callers ensure.
pub fn fix<X: PartialEq, F: Fn(&X) -> X>(f: F, start: X) -> X {
    let mut prev = start;
    loop {
        let current = f(&prev);
        if current == prev {
            return current;
        }
        prev = current;
    }
}

/// The set of nonterminals that can derive the empty string.
///
/// A nonterminal is nullable iff it has some production whose every body
/// element is a lookahead restriction, an optional element, or a nullable
/// nonterminal.
pub fn nullable_set<T: Eq + Hash + Clone + Debug>(grammar: &Grammar<T>) -> OrderedSet<NtName> {
    fix(
        |empties: &OrderedSet<NtName>| {
            let mut next = OrderedSet::new();
            for (nt, def) in grammar.nonterminals() {
                let plist = match def {
                    NtDef::Rules(plist) => plist,
                    NtDef::Parameterized(_) => continue,
                };
                let nullable = plist.iter().any(|p| {
                    p.body.iter().all(|e| match e {
                        Symbol::Lookahead(_) | Symbol::Optional(_) => true,
                        Symbol::Nonterminal(n) => empties.contains(n),
                        _ => false,
                    })
                });
                if nullable {
                    next.insert(nt.clone());
                }
            }
            next
        },
        OrderedSet::new(),
    )
}

/// Compute the FIRST set of every nonterminal: the terminals a match may
/// start with, plus `None` (EMPTY) if it can match the empty string.
///
/// The definition is circular, so the smallest solution is found by
/// ratcheting up to a fixed point.
pub fn first_sets<T: Eq + Hash + Clone + Debug>(
    grammar: &Grammar<T>,
) -> IndexMap<NtName, OrderedFrozenSet<Option<T>>> {
    let mut first: IndexMap<NtName, OrderedFrozenSet<Option<T>>> = grammar
        .nonterminals()
        .keys()
        .map(|nt| (nt.clone(), OrderedFrozenSet::new()))
        .collect();

    let mut done = false;
    while !done {
        done = true;
        for (nt, def) in grammar.nonterminals() {
            let plist = match def {
                NtDef::Rules(plist) => plist,
                NtDef::Parameterized(_) => continue,
            };
            let nt_first: OrderedFrozenSet<Option<T>> = plist
                .iter()
                .flat_map(|p| seq_first(&first, &p.body).into_iter())
                .collect();
            if &nt_first != first.get(nt).unwrap() {
                first.insert(nt.clone(), nt_first);
                done = false;
            }
        }
    }

    first
}

/// The FIRST set of a sequence of lowered elements.
///
/// Walks left to right, accumulating terminals and nonterminal FIRST sets,
/// and stops once an element cannot match the empty string. A lookahead
/// restriction constrains the FIRST set of the rest of the sequence.
pub fn seq_first<T: Eq + Hash + Clone + Debug>(
    first: &IndexMap<NtName, OrderedFrozenSet<Option<T>>>,
    seq: &[Symbol<T>],
) -> OrderedFrozenSet<Option<T>> {
    let mut s: OrderedSet<Option<T>> = [None].into_iter().collect();
    for (i, e) in seq.iter().enumerate() {
        if !s.contains(&None) {
            // preceding elements never match the empty string
            break;
        }
        s.remove(&None);
        match e {
            Symbol::Terminal(t) => {
                s.insert(Some(t.clone()));
            }
            Symbol::Nonterminal(nt) => {
                s.extend(first.get(nt).unwrap().iter().cloned());
            }
            Symbol::Lookahead(rule) => {
                let future = seq_first(first, &seq[i + 1..]);
                return future
                    .iter()
                    .filter(|x| match x {
                        Some(t) => rule.set.contains(t) == rule.positive,
                        None => !rule.positive,
                    })
                    .cloned()
                    .collect();
            }
            _ => unreachable!("sequence contains an unlowered element"),
        }
    }
    s.freeze()
}

/// Compute FIRST sets for every suffix of every flat production.
///
/// Returns `cache` such that `cache[p][i]` is the FIRST set of
/// `prods[p].rhs[i..]`. The table is consulted many times per state during
/// closure, so it is built eagerly, right to left.
pub fn first_suffix_cache<T: Eq + Hash + Clone + Debug>(
    prods: &[Prod<T>],
    first: &IndexMap<NtName, OrderedFrozenSet<Option<T>>>,
) -> Vec<Vec<OrderedFrozenSet<Option<T>>>> {
    prods
        .iter()
        .map(|prod| {
            let mut sets: Vec<OrderedFrozenSet<Option<T>>> =
                vec![[None].into_iter().collect()];
            for e in prod.rhs.iter().rev() {
                let s = match e {
                    Symbol::Terminal(t) => [Some(t.clone())].into_iter().collect(),
                    Symbol::Nonterminal(nt) => {
                        let nt_first = first.get(nt).unwrap();
                        if nt_first.contains(&None) {
                            nt_first.without(&None).union(sets.last().unwrap())
                        } else {
                            nt_first.clone()
                        }
                    }
                    Symbol::Lookahead(rule) => sets
                        .last()
                        .unwrap()
                        .iter()
                        .filter(|x| match x {
                            Some(t) => rule.set.contains(t) == rule.positive,
                            None => !rule.positive,
                        })
                        .cloned()
                        .collect(),
                    _ => unreachable!("production contains an unlowered element"),
                };
                sets.push(s);
            }
            sets.reverse();
            sets
        })
        .collect()
}

/// Compute the FOLLOW set of every nonterminal reachable from a goal: the
/// terminals that can appear immediately after it in some sentential form,
/// plus `None` (END) where the end of input can.
///
/// Walks reachable nonterminals depth-first from the init nonterminals. For
/// a nonterminal occurrence at position `i` of production `p`, the suffix
/// FIRST set `cache[p][i + 1]` (minus EMPTY) joins its FOLLOW set; if that
/// suffix can be empty, the occurrence's FOLLOW subsumes the producing
/// nonterminal's FOLLOW, and the subsume relation is iterated to a fixed
/// point afterwards. Nonterminals not reachable from a goal have no entry.
pub fn follow_sets<T: Eq + Hash + Clone + Debug>(
    grammar: &Grammar<T>,
    prods_by_nt: &IndexMap<NtName, Vec<(usize, Vec<Symbol<T>>)>>,
    cache: &[Vec<OrderedFrozenSet<Option<T>>>],
) -> IndexMap<NtName, OrderedSet<Option<T>>> {
    let mut visited: OrderedSet<NtName> = OrderedSet::new();
    let mut follow: IndexMap<NtName, OrderedSet<Option<T>>> = IndexMap::new();
    // If (x, y) is in the relation, x can end a production of y, so
    // follow[x] must include follow[y].
    let mut subsumes: OrderedSet<(NtName, NtName)> = OrderedSet::new();

    for init_nt in grammar.init_nts() {
        follow.entry(init_nt).or_default().insert(None);
    }
    for init_nt in grammar.init_nts() {
        visit(
            &init_nt,
            prods_by_nt,
            cache,
            &mut visited,
            &mut follow,
            &mut subsumes,
        );
    }

    loop {
        let mut changed = false;
        for (target, source) in subsumes.iter() {
            let extra: Vec<Option<T>> = match follow.get(source) {
                None => vec![],
                Some(source_set) => {
                    let target_set = follow.get(target);
                    source_set
                        .iter()
                        .filter(|t| target_set.map_or(true, |ts| !ts.contains(t)))
                        .cloned()
                        .collect()
                }
            };
            if !extra.is_empty() {
                follow.entry(target.clone()).or_default().extend(extra);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    follow
}

/// Depth-first FOLLOW accumulation for one nonterminal.
fn visit<T: Eq + Hash + Clone + Debug>(
    nt: &NtName,
    prods_by_nt: &IndexMap<NtName, Vec<(usize, Vec<Symbol<T>>)>>,
    cache: &[Vec<OrderedFrozenSet<Option<T>>>],
    visited: &mut OrderedSet<NtName>,
    follow: &mut IndexMap<NtName, OrderedSet<Option<T>>>,
    subsumes: &mut OrderedSet<(NtName, NtName)>,
) {
    if visited.contains(nt) {
        return;
    }
    visited.insert(nt.clone());
    let plist = match prods_by_nt.get(nt) {
        Some(plist) => plist,
        None => return,
    };
    for (prod_index, rhs) in plist {
        for (i, symbol) in rhs.iter().enumerate() {
            if let Symbol::Nonterminal(x) = symbol {
                visit(x, prods_by_nt, cache, visited, follow, subsumes);
                let after = &cache[*prod_index][i + 1];
                let target = follow.entry(x.clone()).or_default();
                if after.contains(&None) {
                    target.extend(after.iter().filter(|t| t.is_some()).cloned());
                    subsumes.insert((x.clone(), nt.clone()));
                } else {
                    target.extend(after.iter().cloned());
                }
            }
        }
    }
}
