#![allow(dead_code)]

//! Helpers shared by the test modules: shorthand grammar builders over
//! string terminals, and a small table-driven parser that interprets
//! generated tables so round trips can be checked end to end.

use indexmap::IndexMap;

use crate::{
    grammar::{Grammar, LookaheadRule, NtDef, NtName, Production, ReduceExpr, Symbol},
    lalr::{ParserTables, ACCEPT},
};

/// Terminals in tests are plain strings.
pub type Sym = Symbol<&'static str>;

/// A terminal symbol.
pub fn t(kind: &'static str) -> Sym {
    Symbol::Terminal(kind)
}

/// A nonterminal reference.
pub fn nt(name: &str) -> Sym {
    Symbol::nt(name)
}

/// An optional element.
pub fn opt(inner: Sym) -> Sym {
    Symbol::opt(inner)
}

/// A negative lookahead restriction: the next token must not be in `set`.
pub fn la_not_in(set: &[&'static str]) -> Sym {
    Symbol::Lookahead(LookaheadRule {
        set: set.iter().copied().collect(),
        positive: false,
    })
}

/// A production with an explicit action.
pub fn prod(body: Vec<Sym>, action: ReduceExpr) -> Production<&'static str> {
    Production::new(body, action)
}

/// Capture the child at `i`.
pub fn child(i: usize) -> ReduceExpr {
    ReduceExpr::Child(i)
}

/// Call a builder method.
pub fn call(method: &str, args: Vec<ReduceExpr>) -> ReduceExpr {
    ReduceExpr::CallMethod {
        method: method.to_string(),
        args,
    }
}

/// A plain production list.
pub fn rules(plist: Vec<Production<&'static str>>) -> NtDef<&'static str> {
    NtDef::Rules(plist)
}

/// Assemble and validate a grammar from `(name, definition)` entries.
pub fn grammar(entries: Vec<(&str, NtDef<&'static str>)>, goals: &[&str]) -> Grammar<&'static str> {
    let nonterminals: IndexMap<NtName, NtDef<&'static str>> = entries
        .into_iter()
        .map(|(name, def)| (NtName::plain(name), def))
        .collect();
    Grammar::new(nonterminals, goals.iter().map(|g| g.to_string()).collect()).unwrap()
}

/// The arithmetic grammar of the precedence scenario:
/// sums over products over parenthesized atoms.
pub fn arith_grammar() -> Grammar<&'static str> {
    arith_grammar_with_goals(&["E"])
}

/// The arithmetic grammar with a caller-chosen goal list.
pub fn arith_grammar_with_goals(goals: &[&str]) -> Grammar<&'static str> {
    grammar(
        vec![
            (
                "E",
                rules(vec![
                    prod(
                        vec![nt("E"), t("PLUS"), nt("T")],
                        call("add", vec![child(0), child(2)]),
                    ),
                    prod(vec![nt("T")], child(0)),
                ]),
            ),
            (
                "T",
                rules(vec![
                    prod(
                        vec![nt("T"), t("STAR"), nt("F")],
                        call("mul", vec![child(0), child(2)]),
                    ),
                    prod(vec![nt("F")], child(0)),
                ]),
            ),
            (
                "F",
                rules(vec![
                    prod(vec![t("LP"), nt("E"), t("RP")], child(1)),
                    prod(vec![t("NUM")], child(0)),
                ]),
            ),
        ],
        goals,
    )
}

/// The value tree a parse run builds by interpreting reduction expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseValue {
    /// A shifted token
    Token(&'static str),
    /// An absent optional child
    None,
    /// A present optional child
    Some(Box<ParseValue>),
    /// A builder-method call
    Call(String, Vec<ParseValue>),
}

/// Shorthand for [`ParseValue::Some`].
pub fn some_value(inner: ParseValue) -> ParseValue {
    ParseValue::Some(Box::new(inner))
}

/// Shorthand for a [`ParseValue::Call`].
pub fn call_value(method: &str, args: Vec<ParseValue>) -> ParseValue {
    ParseValue::Call(method.to_string(), args)
}

/// Map each body position to its slot on the value stack. Lookahead
/// restrictions are zero-width and get no slot.
fn stack_slots(rhs: &[Sym]) -> Vec<Option<usize>> {
    let mut slots = Vec::with_capacity(rhs.len());
    let mut next = 0;
    for e in rhs {
        if e.is_concrete() {
            slots.push(Some(next));
            next += 1;
        } else {
            slots.push(None);
        }
    }
    slots
}

/// Evaluate a reduction expression against the popped child values.
fn eval(expr: &ReduceExpr, children: &[ParseValue], slots: &[Option<usize>]) -> ParseValue {
    match expr {
        ReduceExpr::Child(i) => children[slots[*i].expect("captured a zero-width element")].clone(),
        ReduceExpr::None => ParseValue::None,
        ReduceExpr::Some(inner) => some_value(eval(inner, children, slots)),
        ReduceExpr::CallMethod { method, args } => ParseValue::Call(
            method.clone(),
            args.iter().map(|arg| eval(arg, children, slots)).collect(),
        ),
        ReduceExpr::Accept => unreachable!("accept never evaluates"),
    }
}

/// Drive generated tables over an input sentence, building the value tree
/// the grammar's actions describe.
pub fn parse(
    tables: &ParserTables<&'static str>,
    goal: &str,
    input: &[&'static str],
) -> Result<ParseValue, String> {
    let mut pos = 0;
    let mut state_stack: Vec<usize> = vec![*tables
        .init_state_map
        .get(goal)
        .unwrap_or_else(|| panic!("no init state for goal {goal}"))];
    let mut value_stack: Vec<ParseValue> = Vec::new();

    loop {
        let state = &tables.states[*state_stack.last().unwrap()];
        let next = input.get(pos).copied();
        let code = match state.action_row.get(&next) {
            Some(code) => *code,
            None => return Err(format!("syntax error at token {pos}")),
        };
        if code == ACCEPT {
            return Ok(value_stack.pop().expect("accept with an empty stack"));
        } else if code >= 0 {
            state_stack.push(code as usize);
            value_stack.push(ParseValue::Token(next.unwrap()));
            pos += 1;
        } else {
            let prod_index = (-code - 1) as usize;
            let prod = &tables.prods[prod_index];
            let slots = stack_slots(&prod.rhs);
            let arity = prod.rhs.iter().filter(|e| e.is_concrete()).count();
            let children = value_stack.split_off(value_stack.len() - arity);
            state_stack.truncate(state_stack.len() - arity);
            let value = eval(&prod.action, &children, &slots);
            let state = &tables.states[*state_stack.last().unwrap()];
            let successor = match state.goto_row.get(&prod.nt) {
                Some(successor) => *successor,
                None => return Err(format!("no goto for {} at token {pos}", prod.nt)),
            };
            state_stack.push(successor);
            value_stack.push(value);
        }
    }
}
