//! Specialize parameterized nonterminals into plain production lists.
//!
//! Every `(nonterminal, arguments)` pair reachable from a goal is assigned a
//! derived name and expanded: `Apply` references become derived nonterminal
//! names, variables are resolved against the current bindings, and
//! conditional right-hand sides are kept or discarded per the bindings. The
//! result contains no `Var`, `Apply`, conditional entry, or parameterized
//! definition, and no unreachable entries.

use std::{
    collections::{HashMap, VecDeque},
    fmt::Debug,
    hash::Hash,
};

use indexmap::IndexMap;
use log::debug;

use crate::{
    error::Error,
    grammar::{ArgExpr, ArgValue, Grammar, NtDef, NtName, Production, RhsEntry, Symbol},
};

/// Arguments identifying one specialization: absent for plain nonterminals.
type Args = Option<Vec<(String, ArgValue)>>;

/// Walk state for the specialization pass.
struct Expansion<'g, T: Eq + Hash + Clone> {
    /// The grammar being expanded
    grammar: &'g Grammar<T>,
    /// Derived name for each `(name, args)` pair seen so far
    assigned: HashMap<(String, Args), NtName>,
    /// Pairs waiting to be expanded
    todo: VecDeque<(String, Args)>,
    /// Expanded production lists; `None` marks a name not yet (or never)
    /// expanded
    result: IndexMap<NtName, Option<Vec<Production<T>>>>,
}

impl<T: Eq + Hash + Clone + Debug> Expansion<'_, T> {
    /// The derived name for `(name, args)`, queueing the pair the first time
    /// it is seen.
    fn derived_name(&mut self, name: &str, args: Args) -> NtName {
        let key = (name.to_string(), args);
        if let Some(derived) = self.assigned.get(&key) {
            return derived.clone();
        }
        let derived = match &key.1 {
            None => NtName::plain(name),
            Some(args) => NtName::Apply {
                name: name.to_string(),
                args: args.clone(),
            },
        };
        self.assigned.insert(key.clone(), derived.clone());
        self.result.entry(derived.clone()).or_insert(None);
        self.todo.push_back(key);
        derived
    }

    /// Expand one body element under the given parameter bindings.
    fn expand_element(
        &mut self,
        e: &Symbol<T>,
        binding: Option<&HashMap<String, ArgValue>>,
        production: &str,
    ) -> Result<Symbol<T>, Error> {
        match e {
            Symbol::Terminal(_) | Symbol::Lookahead(_) => Ok(e.clone()),
            Symbol::Nonterminal(NtName::Plain(name)) => {
                Ok(Symbol::Nonterminal(self.derived_name(name, None)))
            }
            Symbol::Nonterminal(other) => Ok(Symbol::Nonterminal(other.clone())),
            Symbol::Optional(inner) => Ok(Symbol::opt(self.expand_element(
                inner,
                binding,
                production,
            )?)),
            Symbol::Var(name) => {
                // A parameter used directly as a symbol must be bound to a
                // nonterminal name.
                match binding.and_then(|b| b.get(name)) {
                    Some(ArgValue::Name(target)) => {
                        let target = target.clone();
                        Ok(Symbol::Nonterminal(self.derived_name(&target, None)))
                    }
                    _ => Err(Error::UnboundVar {
                        name: name.clone(),
                        production: production.to_string(),
                    }),
                }
            }
            Symbol::Apply { name, args } => {
                let mut resolved = Vec::with_capacity(args.len());
                for (param, arg) in args {
                    let value = match arg {
                        ArgExpr::Value(v) => v.clone(),
                        ArgExpr::Var(v) => binding
                            .and_then(|b| b.get(v))
                            .cloned()
                            .ok_or_else(|| Error::UnboundVar {
                                name: v.clone(),
                                production: production.to_string(),
                            })?,
                    };
                    resolved.push((param.clone(), value));
                }
                Ok(Symbol::Nonterminal(self.derived_name(name, Some(resolved))))
            }
        }
    }

    /// Expand one production's body under the given bindings.
    fn expand_production(
        &mut self,
        nt: &NtName,
        p: &Production<T>,
        binding: Option<&HashMap<String, ArgValue>>,
    ) -> Result<Production<T>, Error> {
        let production = self.grammar.production_to_str(nt, &p.body);
        let mut body = Vec::with_capacity(p.body.len());
        for e in &p.body {
            body.push(self.expand_element(e, binding, &production)?);
        }
        Ok(p.with_body(body))
    }

    /// The expansion of `name` specialized with `args`.
    fn expand(&mut self, name: &str, args: &Args) -> Result<Vec<Production<T>>, Error> {
        let key = NtName::plain(name);
        let def = self
            .grammar
            .nonterminals()
            .get(&key)
            .ok_or_else(|| Error::internal(format!("no definition for {}", name)))?;
        match (def, args) {
            (NtDef::Rules(plist), None) => plist
                .iter()
                .map(|p| self.expand_production(&key, p, None))
                .collect(),
            (NtDef::Parameterized(param), Some(args)) => {
                if args.len() != param.params.len() {
                    return Err(Error::internal(format!(
                        "argument count mismatch applying {}",
                        name
                    )));
                }
                let binding: HashMap<String, ArgValue> = args.iter().cloned().collect();
                let mut out = Vec::new();
                for entry in &param.body {
                    match entry {
                        RhsEntry::Always(p) => {
                            out.push(self.expand_production(&key, p, Some(&binding))?);
                        }
                        RhsEntry::Conditional { param, value, rhs } => {
                            if binding.get(param) == Some(value) {
                                out.push(self.expand_production(&key, rhs, Some(&binding))?);
                            }
                        }
                    }
                }
                Ok(out)
            }
            (NtDef::Rules(_), Some(_)) | (NtDef::Parameterized(_), None) => Err(Error::internal(
                format!("arguments do not fit the definition of {}", name),
            )),
        }
    }
}

/// Replace parameterized nonterminals with plain production lists, starting
/// from the goals. Unreachable entries are removed.
pub fn expand_parameterized<T: Eq + Hash + Clone + Debug>(
    grammar: &Grammar<T>,
) -> Result<Grammar<T>, Error> {
    let mut expansion = Expansion {
        grammar,
        assigned: HashMap::new(),
        todo: VecDeque::new(),
        // Seed with the declared names so the output preserves declaration
        // order; derived names are appended as they are discovered.
        result: grammar
            .nonterminals()
            .keys()
            .filter(|nt| !matches!(nt, NtName::Init(_)))
            .map(|nt| (nt.clone(), None))
            .collect(),
    };

    for goal in grammar.goals() {
        expansion
            .assigned
            .insert((goal.clone(), None), NtName::plain(goal.clone()));
        expansion.todo.push_back((goal.clone(), None));
    }

    while let Some((name, args)) = expansion.todo.pop_front() {
        let derived = expansion.assigned[&(name.clone(), args.clone())].clone();
        let unexpanded = matches!(expansion.result.get(&derived), Some(None));
        if unexpanded {
            let plist = expansion.expand(&name, &args)?;
            expansion.result.insert(derived, Some(plist));
        }
    }

    let reachable: IndexMap<NtName, NtDef<T>> = expansion
        .result
        .into_iter()
        .filter_map(|(nt, plist)| plist.map(|plist| (nt, NtDef::Rules(plist))))
        .collect();
    debug!("specialized grammar has {} nonterminals", reachable.len());
    Ok(grammar.with_nonterminals(reachable))
}
