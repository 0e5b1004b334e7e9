//! Structural validation of a specialized grammar.
//!
//! Two checks run after parameterized nonterminals have been expanded and
//! before the grammar is lowered any further: no nonterminal may derive
//! itself, and no lookahead restriction may sit at the end of a production.

use std::{fmt::Debug, hash::Hash};

use indexmap::IndexMap;

use crate::{
    compute::{fix, nullable_set},
    error::Error,
    grammar::{Grammar, NtDef, NtName, Symbol},
    lower::expand_optional_symbols_in_rhs,
    ordered::OrderedSet,
};

/// Check that no nonterminal produces itself via a cycle of one or more
/// productions.
///
/// For each nonterminal, collect the nonterminals it can derive in one step
/// once nullable and optional elements are erased, close the relation
/// transitively, and fail on any nonterminal that reaches itself.
pub fn check_cycle_free<T: Eq + Hash + Clone + Debug>(grammar: &Grammar<T>) -> Result<(), Error> {
    let empties = nullable_set(grammar);

    let mut direct: IndexMap<NtName, OrderedSet<NtName>> = IndexMap::new();
    for (orig, def) in grammar.nonterminals() {
        let mut produced = OrderedSet::new();
        let plist = match def {
            NtDef::Rules(plist) => plist,
            NtDef::Parameterized(_) => continue,
        };
        for p in plist {
            'expansion: for (rhs, _removals) in expand_optional_symbols_in_rhs(&p.body) {
                // Which single nonterminals can this body collapse to?
                let mut result: Vec<NtName> = Vec::new();
                let mut all_possibly_empty_so_far = true;
                for e in &rhs {
                    match e {
                        Symbol::Terminal(_) => continue 'expansion,
                        Symbol::Nonterminal(n) => {
                            if empties.contains(n) {
                                if all_possibly_empty_so_far {
                                    result.push(n.clone());
                                }
                            } else {
                                if !all_possibly_empty_so_far {
                                    // two elements that cannot both vanish
                                    continue 'expansion;
                                }
                                all_possibly_empty_so_far = false;
                                result = vec![n.clone()];
                            }
                        }
                        // Ignoring the restriction loses a little precision.
                        Symbol::Lookahead(_) => {}
                        _ => unreachable!("optional expansion leaves only lowered elements"),
                    }
                }
                produced.extend(result);
            }
        }
        direct.insert(orig.clone(), produced);
    }

    let produces = fix(
        |produces: &IndexMap<NtName, OrderedSet<NtName>>| {
            produces
                .iter()
                .map(|(orig, dest)| {
                    let mut closed = dest.clone();
                    for a in dest.iter() {
                        if let Some(more) = produces.get(a) {
                            closed.extend(more.iter().cloned());
                        }
                    }
                    (orig.clone(), closed)
                })
                .collect()
        },
        direct,
    );

    for (nt, dest) in &produces {
        if dest.contains(nt) {
            return Err(Error::Cycle {
                name: nt.to_string(),
            });
        }
    }
    Ok(())
}

/// Check that no lookahead restriction is trailing.
///
/// A restriction constrains the next token of the production it sits in, so
/// nothing after it may be allowed to match the empty string. Every optional
/// expansion of every body is checked: a restriction followed only by
/// nullable nonterminals (or further restrictions) fails.
pub fn check_lookahead_rules<T: Eq + Hash + Clone + Debug>(
    grammar: &Grammar<T>,
) -> Result<(), Error> {
    let empties = nullable_set(grammar);

    for (nt, def) in grammar.nonterminals() {
        let plist = match def {
            NtDef::Rules(plist) => plist,
            NtDef::Parameterized(_) => continue,
        };
        for p in plist {
            for (rhs, _removals) in expand_optional_symbols_in_rhs(&p.body) {
                for (i, e) in rhs.iter().enumerate() {
                    if !matches!(e, Symbol::Lookahead(_)) {
                        continue;
                    }
                    let rest_can_be_empty = rhs[i + 1..].iter().all(|x| match x {
                        Symbol::Lookahead(_) => true,
                        Symbol::Nonterminal(n) => empties.contains(n),
                        _ => false,
                    });
                    if rest_can_be_empty {
                        return Err(Error::TrailingLookahead {
                            production: grammar.production_to_str(nt, &p.body),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}
