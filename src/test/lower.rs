use pretty_assertions::assert_eq;

use super::support::*;
use crate::{
    error::Error,
    expand::expand_parameterized,
    grammar::{ArgExpr, ArgValue, NtDef, NtName, Parameterized, ReduceExpr, RhsEntry, Symbol},
    lower::{drop_empty_productions, expand_optionals, wrap_nullable_uses},
    validate::{check_cycle_free, check_lookahead_rules},
};

#[test]
fn optional_expansion_yields_every_subset_with_adjusted_actions() {
    env_logger::try_init().ok();

    // S → A? B?, capturing both children.
    let g = grammar(
        vec![
            (
                "S",
                rules(vec![prod(
                    vec![opt(nt("A")), opt(nt("B"))],
                    call("s", vec![child(0), child(1)]),
                )]),
            ),
            ("A", rules(vec![prod(vec![t("a")], child(0))])),
            ("B", rules(vec![prod(vec![t("b")], child(0))])),
        ],
        &["S"],
    );

    let (_, prods, _) = expand_optionals(&g);
    let s_prods: Vec<_> = prods
        .iter()
        .filter(|p| p.nt == NtName::plain("S"))
        .collect();
    assert_eq!(s_prods.len(), 4);

    let some0 = ReduceExpr::Some(Box::new(child(0)));
    let some1 = ReduceExpr::Some(Box::new(child(1)));
    let none = ReduceExpr::None;

    assert_eq!(s_prods[0].rhs, Vec::<Sym>::new());
    assert_eq!(s_prods[0].removals, vec![0, 1]);
    assert_eq!(s_prods[0].action, call("s", vec![none.clone(), none.clone()]));

    assert_eq!(s_prods[1].rhs, vec![nt("A")]);
    assert_eq!(s_prods[1].removals, vec![1]);
    assert_eq!(s_prods[1].action, call("s", vec![some0.clone(), none.clone()]));

    assert_eq!(s_prods[2].rhs, vec![nt("B")]);
    assert_eq!(s_prods[2].removals, vec![0]);
    assert_eq!(s_prods[2].action, call("s", vec![none, some0.clone()]));

    assert_eq!(s_prods[3].rhs, vec![nt("A"), nt("B")]);
    assert_eq!(s_prods[3].removals, Vec::<usize>::new());
    assert_eq!(s_prods[3].action, call("s", vec![some0, some1]));
}

#[test]
fn flat_productions_account_for_every_source_position() {
    let g = grammar(
        vec![
            (
                "S",
                rules(vec![prod(
                    vec![t("head"), opt(t("mid")), nt("A"), opt(t("tail"))],
                    call("s", vec![child(0), child(1), child(2), child(3)]),
                )]),
            ),
            ("A", rules(vec![prod(vec![t("a")], child(0))])),
        ],
        &["S"],
    );

    let (_, prods, _) = expand_optionals(&g);
    for p in prods.iter().filter(|p| p.nt == NtName::plain("S")) {
        let source = &g.rules(&p.nt).unwrap()[p.index];
        assert_eq!(source.body.len(), p.rhs.len() + p.removals.len());
        // removals are strictly ascending and name optional slots
        assert!(p.removals.windows(2).all(|w| w[0] < w[1]));
        for r in &p.removals {
            assert!(matches!(source.body[*r], Symbol::Optional(_)));
        }
    }
}

#[test]
fn empty_productions_survive_only_at_goals() {
    // S → A x?, with A matching the empty string. S is the goal.
    let g = grammar(
        vec![
            (
                "S",
                rules(vec![prod(
                    vec![nt("A"), opt(t("x"))],
                    call("s", vec![child(0), child(1)]),
                )]),
            ),
            ("A", rules(vec![prod(vec![], ReduceExpr::None)])),
        ],
        &["S"],
    );

    // Step 1 wraps the nullable use of A in Optional.
    let wrapped = wrap_nullable_uses(&g);
    let s_rules = wrapped.rules(&NtName::plain("S")).unwrap();
    assert!(matches!(&s_rules[0].body[0], Symbol::Optional(_)));

    let (lowered, prods, _) = expand_optionals(&wrapped);
    let lowered = drop_empty_productions(&lowered);

    // The goal keeps its fully-elided expansion; A's empty production goes.
    assert!(lowered
        .rules(&NtName::plain("S"))
        .unwrap()
        .iter()
        .any(|p| p.body.is_empty()));
    assert!(lowered.rules(&NtName::plain("A")).unwrap().is_empty());

    // The flat list is built before step 2 and keeps its indices.
    assert!(prods
        .iter()
        .any(|p| p.nt == NtName::plain("A") && p.rhs.is_empty()));
}

#[test]
fn parameterized_nonterminals_specialize_by_argument() {
    let apply = |name: &str, arg: ArgExpr| Symbol::Apply {
        name: name.to_string(),
        args: vec![("In".to_string(), arg)],
    };
    let yield_value = ArgValue::Name("yield".to_string());

    let g = grammar(
        vec![
            (
                "Start",
                rules(vec![prod(
                    vec![apply("Expr", ArgExpr::Value(yield_value.clone()))],
                    child(0),
                )]),
            ),
            (
                "Expr",
                NtDef::Parameterized(Parameterized {
                    params: vec!["In".to_string()],
                    body: vec![
                        RhsEntry::Always(prod(
                            vec![apply("Assign", ArgExpr::Var("In".to_string()))],
                            child(0),
                        )),
                        RhsEntry::Always(prod(
                            vec![apply("Conditional", ArgExpr::Var("In".to_string()))],
                            child(0),
                        )),
                    ],
                }),
            ),
            (
                "Assign",
                NtDef::Parameterized(Parameterized {
                    params: vec!["In".to_string()],
                    body: vec![
                        RhsEntry::Always(prod(
                            vec![t("ID"), t("EQ"), t("ID")],
                            call("assign", vec![child(0), child(2)]),
                        )),
                        RhsEntry::Conditional {
                            param: "In".to_string(),
                            value: yield_value.clone(),
                            rhs: prod(vec![t("YIELD")], child(0)),
                        },
                        RhsEntry::Conditional {
                            param: "In".to_string(),
                            value: ArgValue::Name("await".to_string()),
                            rhs: prod(vec![t("AWAIT")], child(0)),
                        },
                    ],
                }),
            ),
            (
                "Conditional",
                NtDef::Parameterized(Parameterized {
                    params: vec!["In".to_string()],
                    body: vec![RhsEntry::Always(prod(vec![t("COND")], child(0)))],
                }),
            ),
            // Never referenced; must disappear with the rest.
            ("Dead", rules(vec![prod(vec![t("z")], child(0))])),
        ],
        &["Start"],
    );

    let expanded = expand_parameterized(&g).unwrap();

    let specialized = |name: &str| NtName::Apply {
        name: name.to_string(),
        args: vec![("In".to_string(), yield_value.clone())],
    };
    assert!(expanded.rules(&specialized("Expr")).is_some());
    assert!(expanded.rules(&specialized("Conditional")).is_some());

    // The matching conditional was kept, the other dropped.
    let assign = expanded.rules(&specialized("Assign")).unwrap();
    assert_eq!(assign.len(), 2);
    assert_eq!(assign[1].body, vec![t("YIELD")]);

    // Parameterized templates and unreachable entries are gone.
    assert!(expanded.nonterminals().get(&NtName::plain("Expr")).is_none());
    assert!(expanded.nonterminals().get(&NtName::plain("Dead")).is_none());

    // Nothing unlowered is left in any body.
    for (_, def) in expanded.nonterminals() {
        let plist = match def {
            NtDef::Rules(plist) => plist,
            NtDef::Parameterized(_) => panic!("parameterized entry survived expansion"),
        };
        for p in plist {
            for e in &p.body {
                assert!(
                    !matches!(e, Symbol::Var(_) | Symbol::Apply { .. }),
                    "unlowered element survived expansion"
                );
            }
        }
    }
}

#[test]
fn trailing_lookahead_is_rejected() {
    // Asi → Stmt [lookahead not in {SEMI}]
    let g = grammar(
        vec![
            (
                "Asi",
                rules(vec![prod(vec![nt("Stmt"), la_not_in(&["SEMI"])], child(0))]),
            ),
            ("Stmt", rules(vec![prod(vec![t("X")], child(0))])),
        ],
        &["Asi"],
    );

    let err = check_lookahead_rules(&g).unwrap_err();
    assert!(matches!(err, Error::TrailingLookahead { .. }));

    // A restriction as the sole body element fails the same way.
    let sole = grammar(
        vec![(
            "S",
            rules(vec![prod(vec![la_not_in(&["SEMI"])], ReduceExpr::None)]),
        )],
        &["S"],
    );
    assert!(matches!(
        check_lookahead_rules(&sole).unwrap_err(),
        Error::TrailingLookahead { .. }
    ));
}

#[test]
fn lookahead_followed_only_by_nullable_elements_is_rejected() {
    // The restriction is only followed by Opt, which can match nothing.
    let g = grammar(
        vec![
            (
                "S",
                rules(vec![prod(
                    vec![t("GO"), la_not_in(&["X"]), nt("Opt")],
                    call("s", vec![child(0), child(2)]),
                )]),
            ),
            (
                "Opt",
                rules(vec![
                    prod(vec![], ReduceExpr::None),
                    prod(vec![t("Y")], child(0)),
                ]),
            ),
        ],
        &["S"],
    );

    let err = check_lookahead_rules(&g).unwrap_err();
    assert!(matches!(err, Error::TrailingLookahead { .. }));
}

#[test]
fn leading_lookahead_is_allowed() {
    let g = grammar(
        vec![(
            "S",
            rules(vec![prod(vec![la_not_in(&["X"]), t("Y")], child(1))]),
        )],
        &["S"],
    );

    assert!(check_lookahead_rules(&g).is_ok());
}

#[test]
fn self_cycle_through_nullable_padding_is_rejected() {
    // A → Pad A, where Pad can match the empty string.
    let g = grammar(
        vec![
            (
                "A",
                rules(vec![prod(vec![nt("Pad"), nt("A")], child(1))]),
            ),
            (
                "Pad",
                rules(vec![
                    prod(vec![], ReduceExpr::None),
                    prod(vec![t("p")], child(0)),
                ]),
            ),
        ],
        &["A"],
    );

    let err = check_cycle_free(&g).unwrap_err();
    assert_eq!(
        err,
        Error::Cycle {
            name: "A".to_string()
        }
    );
}

#[test]
fn mutual_cycle_is_rejected() {
    let g = grammar(
        vec![
            ("A", rules(vec![prod(vec![nt("B")], child(0))])),
            (
                "B",
                rules(vec![
                    prod(vec![nt("A")], child(0)),
                    prod(vec![t("b")], child(0)),
                ]),
            ),
        ],
        &["A"],
    );

    assert!(matches!(
        check_cycle_free(&g).unwrap_err(),
        Error::Cycle { .. }
    ));
}

#[test]
fn acyclic_grammar_passes_both_checks() {
    let g = arith_grammar();
    assert!(check_cycle_free(&g).is_ok());
    assert!(check_lookahead_rules(&g).is_ok());
}
