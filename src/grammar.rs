//! The grammar model: an extended context-free grammar over caller-supplied
//! terminal kinds.
//!
//! Beyond plain productions, bodies may contain optional elements, zero-width
//! lookahead restrictions on the next token, and references to parameterized
//! nonterminals with concrete or variable arguments. Reduction behavior is
//! carried as data (a [`ReduceExpr`] per production) rather than code, so a
//! back end can turn it into whatever its target language needs.
//!
//! A grammar is validated once at construction and treated as immutable
//! afterwards; the lowering stages produce modified copies through
//! [`Grammar::with_nonterminals`].

use std::{
    fmt::{Debug, Display},
    hash::Hash,
};

use indexmap::IndexMap;

use crate::{error::Error, ordered::OrderedFrozenSet};

/// A concrete value bound to a nonterminal parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgValue {
    /// A boolean flag parameter
    Flag(bool),
    /// A named value, e.g. a nonterminal name
    Name(String),
}

impl Display for ArgValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flag(b) => write!(f, "{}", b),
            Self::Name(s) => write!(f, "{}", s),
        }
    }
}

/// An argument expression at an `Apply` site: either a concrete value or a
/// reference to a parameter of the enclosing parameterized nonterminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgExpr {
    /// A concrete value
    Value(ArgValue),
    /// Pass through the enclosing definition's binding for this parameter
    Var(String),
}

/// The name of a nonterminal.
///
/// Most names are plain strings. Specializing a parameterized nonterminal
/// produces an `Apply` name carrying the concrete bindings, and every goal
/// gets a synthetic `Init` nonterminal holding its init production.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NtName {
    /// An ordinary named nonterminal
    Plain(String),
    /// A specialization of a parameterized nonterminal
    Apply {
        /// The parameterized nonterminal's name
        name: String,
        /// Parameter bindings, in declaration order of the apply site
        args: Vec<(String, ArgValue)>,
    },
    /// The synthetic init nonterminal of a goal
    Init(String),
}

impl NtName {
    /// Shorthand for a plain name.
    pub fn plain(name: impl Into<String>) -> Self {
        Self::Plain(name.into())
    }
}

impl Display for NtName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(name) => write!(f, "{}", name),
            Self::Apply { name, args } => {
                let args: Vec<String> = args.iter().map(|(p, v)| format!("{}={}", p, v)).collect();
                write!(f, "{}[{}]", name, args.join(", "))
            }
            Self::Init(goal) => write!(f, "{}'", goal),
        }
    }
}

/// A zero-width restriction on the immediately next token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookaheadRule<T: Eq + Hash + Clone> {
    /// The terminals the rule names
    pub set: OrderedFrozenSet<T>,
    /// True for "next token must be in the set", false for "must not be"
    pub positive: bool,
}

impl<T: Eq + Hash + Clone> LookaheadRule<T> {
    /// Whether the rule admits `t` as the next token.
    pub fn contains(&self, t: &T) -> bool {
        self.set.contains(t) == self.positive
    }

    /// Combine an optional restriction with a further one, producing the
    /// restriction that enforces both.
    pub fn intersect(a: Option<&Self>, b: &Self) -> Self {
        let a = match a {
            None => return b.clone(),
            Some(a) => a,
        };
        match (a.positive, b.positive) {
            (true, true) => Self {
                set: a.set.intersection(&b.set),
                positive: true,
            },
            (true, false) => Self {
                set: a.set.difference(&b.set),
                positive: true,
            },
            (false, true) => Self {
                set: b.set.difference(&a.set),
                positive: true,
            },
            (false, false) => Self {
                set: a.set.union(&b.set),
                positive: false,
            },
        }
    }
}

/// Whether an optional restriction admits `t`. No restriction admits
/// everything.
pub fn lookahead_contains<T: Eq + Hash + Clone>(rule: Option<&LookaheadRule<T>>, t: &T) -> bool {
    match rule {
        None => true,
        Some(rule) => rule.contains(t),
    }
}

/// A single element of a production body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol<T: Eq + Hash + Clone> {
    /// A terminal symbol, i.e. a token kind supplied by the caller
    Terminal(T),
    /// A reference to a nonterminal of the grammar
    Nonterminal(NtName),
    /// An element that may be absent
    Optional(Box<Symbol<T>>),
    /// A zero-width restriction on the next token
    Lookahead(LookaheadRule<T>),
    /// A parameter reference, valid only inside a parameterized definition
    Var(String),
    /// A reference to a parameterized nonterminal with arguments
    Apply {
        /// The parameterized nonterminal's name
        name: String,
        /// One argument expression per parameter
        args: Vec<(String, ArgExpr)>,
    },
}

impl<T: Eq + Hash + Clone> Symbol<T> {
    /// Shorthand for a nonterminal reference by plain name.
    pub fn nt(name: impl Into<String>) -> Self {
        Self::Nonterminal(NtName::plain(name))
    }

    /// Shorthand for wrapping a symbol in `Optional`.
    pub fn opt(inner: Symbol<T>) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// Whether this is a terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }

    /// Whether this is a (plain, applied, or init) nonterminal reference.
    pub fn is_nonterminal(&self) -> bool {
        matches!(self, Self::Nonterminal(_))
    }

    /// Whether this element consumes a slot on the parser's value stack.
    /// Lookahead restrictions are zero-width and do not.
    pub fn is_concrete(&self) -> bool {
        !matches!(self, Self::Lookahead(_))
    }
}

/// Expression describing how to build a value when a production is reduced.
///
/// The generator rewrites these while lowering the grammar (dropped optional
/// slots become `None`, kept ones are reindexed); a back end turns the final
/// expressions into target-language code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReduceExpr {
    /// The value captured at this index of the production body
    Child(usize),
    /// No value
    None,
    /// The inner expression's value, wrapped as present
    Some(Box<ReduceExpr>),
    /// Call a builder method with the given arguments
    CallMethod {
        /// The method name
        method: String,
        /// Argument expressions
        args: Vec<ReduceExpr>,
    },
    /// Sentinel action of init productions; never turned into code
    Accept,
}

/// A production: a body of symbols plus the reduction expression run when the
/// body has been matched. The owning nonterminal is the map key it is stored
/// under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production<T: Eq + Hash + Clone> {
    /// The right-hand side
    pub body: Vec<Symbol<T>>,
    /// What to build when this production is reduced
    pub action: ReduceExpr,
}

impl<T: Eq + Hash + Clone> Production<T> {
    /// Construct a production.
    pub fn new(body: Vec<Symbol<T>>, action: ReduceExpr) -> Self {
        Self { body, action }
    }

    /// A copy of this production with a different body and the same action.
    pub fn with_body(&self, body: Vec<Symbol<T>>) -> Self {
        Self {
            body,
            action: self.action.clone(),
        }
    }
}

/// One entry in a parameterized nonterminal's body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RhsEntry<T: Eq + Hash + Clone> {
    /// A production present for every specialization
    Always(Production<T>),
    /// A production present only when `param` is bound to `value`
    Conditional {
        /// The parameter tested
        param: String,
        /// The value it must be bound to
        value: ArgValue,
        /// The production to include when the test passes
        rhs: Production<T>,
    },
}

/// A parameterized nonterminal: a production template over named parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameterized<T: Eq + Hash + Clone> {
    /// Parameter names, in order
    pub params: Vec<String>,
    /// The production templates
    pub body: Vec<RhsEntry<T>>,
}

/// The definition bound to a nonterminal name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NtDef<T: Eq + Hash + Clone> {
    /// An ordinary list of productions
    Rules(Vec<Production<T>>),
    /// A parameterized definition, specialized away by the first lowering
    /// stage
    Parameterized(Parameterized<T>),
}

/// An extended context-free grammar.
///
/// Holds an insertion-ordered mapping from nonterminal name to definition
/// plus the list of goal nonterminals. For every goal `G` the constructor
/// inserts the synthetic init production `G' -> G` with action
/// [`ReduceExpr::Accept`].
#[derive(Debug, Clone)]
pub struct Grammar<T: Eq + Hash + Clone> {
    /// Nonterminal definitions, in declaration order
    nonterminals: IndexMap<NtName, NtDef<T>>,
    /// Goal nonterminal names
    goals: Vec<String>,
}

impl<T: Eq + Hash + Clone + Debug> Grammar<T> {
    /// Construct and validate a grammar.
    ///
    /// # Errors
    ///
    /// Fails if a body references an unknown nonterminal, applies arguments
    /// that do not match a definition's parameters, uses a variable with no
    /// binding, wraps a non-symbol in `Optional`, captures an out-of-range
    /// body index in a reduction expression, or names a goal that is missing
    /// or parameterized.
    pub fn new(
        nonterminals: IndexMap<NtName, NtDef<T>>,
        goals: Vec<String>,
    ) -> Result<Self, Error> {
        let mut grammar = Self {
            nonterminals,
            goals,
        };
        grammar.ensure_init_entries();
        grammar.validate()?;
        Ok(grammar)
    }

    /// A shallowly modified copy with a new nonterminal map and the same
    /// goals. Init entries are re-inserted if the new map lacks them. The
    /// lowering stages use this; no re-validation happens.
    pub fn with_nonterminals(&self, nonterminals: IndexMap<NtName, NtDef<T>>) -> Self {
        let mut grammar = Self {
            nonterminals,
            goals: self.goals.clone(),
        };
        grammar.ensure_init_entries();
        grammar
    }

    /// Append the `G' -> G` init entry for each goal missing one.
    fn ensure_init_entries(&mut self) {
        for goal in self.goals.clone() {
            let key = NtName::Init(goal.clone());
            if !self.nonterminals.contains_key(&key) {
                let init = Production::new(vec![Symbol::nt(goal)], ReduceExpr::Accept);
                self.nonterminals.insert(key, NtDef::Rules(vec![init]));
            }
        }
    }

    /// The nonterminal definitions, in declaration order.
    pub fn nonterminals(&self) -> &IndexMap<NtName, NtDef<T>> {
        &self.nonterminals
    }

    /// The goal nonterminal names.
    pub fn goals(&self) -> &[String] {
        &self.goals
    }

    /// The synthetic init nonterminal names, one per goal.
    pub fn init_nts(&self) -> Vec<NtName> {
        self.goals.iter().map(|g| NtName::Init(g.clone())).collect()
    }

    /// The production list of a non-parameterized nonterminal.
    pub fn rules(&self, nt: &NtName) -> Option<&[Production<T>]> {
        match self.nonterminals.get(nt) {
            Some(NtDef::Rules(plist)) => Some(plist),
            _ => None,
        }
    }

    /* Validation */

    /// Check every definition against the rules listed on [`Grammar::new`].
    fn validate(&self) -> Result<(), Error> {
        for goal in &self.goals {
            match self.nonterminals.get(&NtName::plain(goal.clone())) {
                Some(NtDef::Rules(_)) => {}
                _ => return Err(Error::BadGoal { name: goal.clone() }),
            }
        }
        for (nt, def) in &self.nonterminals {
            match def {
                NtDef::Rules(plist) => {
                    for p in plist {
                        self.validate_production(nt, p, None)?;
                    }
                }
                NtDef::Parameterized(param) => {
                    for entry in &param.body {
                        let p = match entry {
                            RhsEntry::Always(p) => p,
                            RhsEntry::Conditional { param: name, rhs, .. } => {
                                if !param.params.contains(name) {
                                    return Err(Error::UnboundVar {
                                        name: name.clone(),
                                        production: self.production_to_str(nt, &rhs.body),
                                    });
                                }
                                rhs
                            }
                        };
                        self.validate_production(nt, p, Some(&param.params))?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Validate one production's body and action.
    fn validate_production(
        &self,
        nt: &NtName,
        p: &Production<T>,
        params: Option<&Vec<String>>,
    ) -> Result<(), Error> {
        let production = self.production_to_str(nt, &p.body);
        for e in &p.body {
            self.validate_element(e, params, &production)?;
        }
        check_action(&p.action, p.body.len(), &production)
    }

    /// Validate one body element.
    fn validate_element(
        &self,
        e: &Symbol<T>,
        params: Option<&Vec<String>>,
        production: &str,
    ) -> Result<(), Error> {
        match e {
            Symbol::Terminal(_) | Symbol::Lookahead(_) => Ok(()),
            Symbol::Nonterminal(name) => match self.nonterminals.get(name) {
                Some(NtDef::Rules(_)) => Ok(()),
                Some(NtDef::Parameterized(_)) => Err(Error::BadApply {
                    name: name.to_string(),
                    production: production.to_string(),
                }),
                None => Err(Error::UnknownNonterminal {
                    name: name.to_string(),
                    production: production.to_string(),
                }),
            },
            Symbol::Optional(inner) => match inner.as_ref() {
                // Optional wraps a symbol reference, never a restriction and
                // never another Optional.
                Symbol::Optional(_) | Symbol::Lookahead(_) => Err(Error::MalformedOptional {
                    production: production.to_string(),
                }),
                _ => self.validate_element(inner, params, production),
            },
            Symbol::Var(name) => match params {
                Some(params) if params.contains(name) => Ok(()),
                _ => Err(Error::UnboundVar {
                    name: name.clone(),
                    production: production.to_string(),
                }),
            },
            Symbol::Apply { name, args } => {
                let def = self.nonterminals.get(&NtName::plain(name.clone()));
                let target = match def {
                    Some(NtDef::Parameterized(param)) => param,
                    Some(NtDef::Rules(_)) => {
                        return Err(Error::BadApply {
                            name: name.clone(),
                            production: production.to_string(),
                        })
                    }
                    None => {
                        return Err(Error::UnknownNonterminal {
                            name: name.clone(),
                            production: production.to_string(),
                        })
                    }
                };
                let mut given: Vec<&String> = args.iter().map(|(n, _)| n).collect();
                let mut expected: Vec<&String> = target.params.iter().collect();
                given.sort();
                expected.sort();
                if given != expected {
                    return Err(Error::BadApply {
                        name: name.clone(),
                        production: production.to_string(),
                    });
                }
                for (_, arg) in args {
                    if let ArgExpr::Var(v) = arg {
                        match params {
                            Some(params) if params.contains(v) => {}
                            _ => {
                                return Err(Error::UnboundVar {
                                    name: v.clone(),
                                    production: production.to_string(),
                                })
                            }
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /* Pretty-printing, used by diagnostics */

    /// Render one body element.
    pub fn element_to_str(&self, e: &Symbol<T>) -> String {
        match e {
            Symbol::Terminal(t) => format!("{:?}", t),
            Symbol::Nonterminal(name) => name.to_string(),
            Symbol::Optional(inner) => format!("{}?", self.element_to_str(inner)),
            Symbol::Lookahead(rule) => {
                let items: Vec<String> = rule.set.iter().map(|t| format!("{:?}", t)).collect();
                format!(
                    "[lookahead {} {{{}}}]",
                    if rule.positive { "in" } else { "not in" },
                    items.join(", ")
                )
            }
            Symbol::Var(name) => name.clone(),
            Symbol::Apply { name, args } => {
                let args: Vec<String> = args
                    .iter()
                    .map(|(p, a)| match a {
                        ArgExpr::Value(v) => format!("{}={}", p, v),
                        ArgExpr::Var(v) => format!("{}={}", p, v),
                    })
                    .collect();
                format!("{}[{}]", name, args.join(", "))
            }
        }
    }

    /// Render a sequence of symbols separated by spaces.
    pub fn symbols_to_str<'a>(&self, symbols: impl IntoIterator<Item = &'a Symbol<T>>) -> String
    where
        T: 'a,
    {
        let parts: Vec<String> = symbols
            .into_iter()
            .map(|e| self.element_to_str(e))
            .collect();
        parts.join(" ")
    }

    /// Render a production as `nt ::= body`.
    pub fn production_to_str(&self, nt: &NtName, body: &[Symbol<T>]) -> String {
        let rhs = if body.is_empty() {
            "(empty)".to_string()
        } else {
            self.symbols_to_str(body)
        };
        format!("{} ::= {}", nt, rhs)
    }
}

/// Check that a reduction expression captures only indices inside the body.
fn check_action(expr: &ReduceExpr, body_len: usize, production: &str) -> Result<(), Error> {
    match expr {
        ReduceExpr::Child(i) => {
            if *i < body_len {
                Ok(())
            } else {
                Err(Error::BadActionIndex {
                    index: *i,
                    production: production.to_string(),
                })
            }
        }
        ReduceExpr::None | ReduceExpr::Accept => Ok(()),
        ReduceExpr::Some(inner) => check_action(inner, body_len, production),
        ReduceExpr::CallMethod { args, .. } => {
            for arg in args {
                check_action(arg, body_len, production)?;
            }
            Ok(())
        }
    }
}
