use pretty_assertions::assert_eq;

use super::support::*;
use crate::{
    compute::{first_sets, first_suffix_cache, follow_sets, nullable_set, seq_first},
    grammar::{NtName, ReduceExpr},
    lower::expand_optionals,
    ordered::{OrderedFrozenSet, OrderedSet},
};

/// FIRST-flavored set from a list of terminals, without the EMPTY marker.
fn first_of(terminals: &[&'static str]) -> OrderedFrozenSet<Option<&'static str>> {
    terminals.iter().map(|t| Some(*t)).collect()
}

#[test]
fn first_sets_of_the_arithmetic_grammar() {
    let g = arith_grammar();
    let first = first_sets(&g);

    let leading = first_of(&["LP", "NUM"]);
    assert_eq!(first[&NtName::plain("E")], leading);
    assert_eq!(first[&NtName::plain("T")], leading);
    assert_eq!(first[&NtName::plain("F")], leading);
    // The init nonterminal starts where its goal starts.
    assert_eq!(first[&NtName::Init("E".to_string())], leading);
}

#[test]
fn nullable_nonterminals_carry_the_empty_marker() {
    // X matches the empty string; S does not because of the trailing "y".
    let g = grammar(
        vec![
            (
                "S",
                rules(vec![prod(
                    vec![nt("X"), t("y")],
                    call("s", vec![child(0), child(1)]),
                )]),
            ),
            (
                "X",
                rules(vec![
                    prod(vec![], ReduceExpr::None),
                    prod(vec![t("x")], child(0)),
                ]),
            ),
        ],
        &["S"],
    );

    let nullable = nullable_set(&g);
    assert!(nullable.contains(&NtName::plain("X")));
    assert!(!nullable.contains(&NtName::plain("S")));

    let first = first_sets(&g);
    let x_first: OrderedFrozenSet<Option<&str>> = [None, Some("x")].into_iter().collect();
    assert_eq!(first[&NtName::plain("X")], x_first);
    // X can vanish, so S can start with either x or y, but never with nothing.
    assert_eq!(first[&NtName::plain("S")], first_of(&["x", "y"]));
}

#[test]
fn suffix_cache_agrees_with_direct_first_computation() {
    let g = arith_grammar();
    let (lowered, prods, _) = expand_optionals(&g);
    let first = first_sets(&lowered);
    let cache = first_suffix_cache(&prods, &first);

    assert_eq!(cache.len(), prods.len());
    for (p, prod) in prods.iter().enumerate() {
        assert_eq!(cache[p].len(), prod.rhs.len() + 1);
        for i in 0..=prod.rhs.len() {
            assert_eq!(cache[p][i], seq_first(&first, &prod.rhs[i..]));
        }
    }
}

#[test]
fn follow_sets_of_the_arithmetic_grammar() {
    let g = arith_grammar();
    let (lowered, prods, prods_by_nt) = expand_optionals(&g);
    let first = first_sets(&lowered);
    let cache = first_suffix_cache(&prods, &first);
    let follow = follow_sets(&lowered, &prods_by_nt, &cache);

    // END seeds the init nonterminal and reaches E through subsumption.
    let init_follow: OrderedSet<Option<&str>> = [None].into_iter().collect();
    assert_eq!(follow[&NtName::Init("E".to_string())], init_follow);

    let e_follow: OrderedSet<Option<&str>> =
        [Some("PLUS"), Some("RP"), None].into_iter().collect();
    assert_eq!(follow[&NtName::plain("E")], e_follow);

    let t_follow: OrderedSet<Option<&str>> = [Some("STAR"), Some("PLUS"), Some("RP"), None]
        .into_iter()
        .collect();
    assert_eq!(follow[&NtName::plain("T")], t_follow);
    assert_eq!(follow[&NtName::plain("F")], t_follow);
}

#[test]
fn follow_is_empty_for_unreachable_nonterminals() {
    // Orphan is never used from the goal.
    let g = grammar(
        vec![
            ("S", rules(vec![prod(vec![t("s")], child(0))])),
            ("Orphan", rules(vec![prod(vec![t("o")], child(0))])),
        ],
        &["S"],
    );
    let (lowered, prods, prods_by_nt) = expand_optionals(&g);
    let first = first_sets(&lowered);
    let cache = first_suffix_cache(&prods, &first);
    let follow = follow_sets(&lowered, &prods_by_nt, &cache);

    assert!(follow.get(&NtName::plain("Orphan")).is_none());
    assert!(follow.get(&NtName::plain("S")).is_some());
}
