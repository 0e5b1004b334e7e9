//! The state-graph builder and the table-generation entry points.
//!
//! [`generate_tables`] runs the whole pipeline: parameterized-nonterminal
//! expansion, cycle and lookahead validation, epsilon elimination around
//! optional expansion, FIRST/FOLLOW analysis, and finally the worklist
//! algorithm here that numbers states and fills in their action and goto
//! rows. The resulting [`ParserTables`] are handed to a back end.
//!
//! Action codes are bit-exact as emitted:
//!
//! - a nonnegative code `s` means "shift to state `s`";
//! - a negative code `-(k + 1)` means "reduce using flat production `k`";
//! - the sentinel [`ACCEPT`] means "accept the input".

use std::{
    collections::{HashMap, VecDeque},
    fmt::Debug,
    hash::Hash,
};

use indexmap::IndexMap;
use log::{debug, trace};

use crate::{
    compute::{first_sets, first_suffix_cache, follow_sets},
    error::Error,
    expand::expand_parameterized,
    grammar::{lookahead_contains, Grammar, NtName, Symbol},
    lower::{drop_empty_productions, expand_optionals, wrap_nullable_uses, Prod},
    ordered::{OrderedFrozenSet, OrderedSet},
    state::{token_to_str, ItemKey, LRItem, PgenContext, State},
    validate::{check_cycle_free, check_lookahead_rules},
};

/// The accept action code. Reserved: distinct from every state id and every
/// reduce encoding.
pub const ACCEPT: i64 = i64::MIN;

/// Everything a back end needs to serialize a parser.
#[derive(Debug)]
pub struct ParserTables<T: Eq + Hash + Clone> {
    /// The fully lowered grammar
    pub grammar: Grammar<T>,
    /// The flat productions; reduce codes index into this list
    pub prods: Vec<Prod<T>>,
    /// The states, with action and goto rows filled in; position is state id
    pub states: Vec<State<T>>,
    /// Goal name to initial state id
    pub init_state_map: IndexMap<String, usize>,
}

/// A back end that serializes generated tables into a target language.
pub trait Emitter<T: Eq + Hash + Clone> {
    /// What the back end produces
    type Output;

    /// Serialize the tables.
    fn emit(&mut self, tables: &ParserTables<T>) -> Self::Output;
}

/// Generate tables for `grammar` and hand them to `emitter`.
///
/// # Errors
///
/// Fails if the grammar does not lower cleanly or its tables have conflicts;
/// see [`Error`]. The emitter is not called when generation fails.
pub fn generate_parser<T, E>(grammar: &Grammar<T>, emitter: &mut E) -> Result<E::Output, Error>
where
    T: Eq + Hash + Clone + Debug,
    E: Emitter<T>,
{
    let tables = generate_tables(grammar)?;
    Ok(emitter.emit(&tables))
}

/// Check `grammar`, lower it step by step to a more primitive form, and run
/// the LALR(1) state construction on the result.
///
/// # Errors
///
/// Fails on a grammar cycle, a trailing lookahead restriction, a lookahead
/// restriction unresolved at a reduce, or a reduce-reduce or shift-reduce
/// conflict. No tables are produced when any error fires.
pub fn generate_tables<T: Eq + Hash + Clone + Debug>(
    grammar: &Grammar<T>,
) -> Result<ParserTables<T>, Error> {
    let grammar = expand_parameterized(grammar)?;
    check_cycle_free(&grammar)?;
    check_lookahead_rules(&grammar)?;
    let grammar = wrap_nullable_uses(&grammar);
    let (grammar, prods, prods_by_nt) = expand_optionals(&grammar);
    let grammar = drop_empty_productions(&grammar);
    debug!("lowered grammar: {} flat productions", prods.len());

    let first = first_sets(&grammar);
    let first_cache = first_suffix_cache(&prods, &first);
    let follow = follow_sets(&grammar, &prods_by_nt, &first_cache);

    let context = PgenContext {
        grammar,
        prods,
        prods_by_nt,
        first_cache,
        follow,
    };
    let (states, init_state_map) = build_states(&context)?;
    debug!("built {} states", states.len());

    let PgenContext { grammar, prods, .. } = context;
    Ok(ParserTables {
        grammar,
        prods,
        states,
        init_state_map,
    })
}

/// The worklist algorithm: number every reachable state and fill in its
/// action and goto rows.
///
/// # Errors
///
/// Fails on conflicts and on internal invariant violations; see
/// [`generate_tables`].
pub fn build_states<T: Eq + Hash + Clone + Debug>(
    context: &PgenContext<T>,
) -> Result<(Vec<State<T>>, IndexMap<String, usize>), Error> {
    let mut graph = StateGraph {
        context,
        states: Vec::new(),
        states_by_key: HashMap::new(),
        todo: VecDeque::new(),
    };

    // One initial state per goal, seeded from the init production with END
    // as the only follow terminal.
    let mut init_state_map = IndexMap::new();
    for goal in context.grammar.goals() {
        let init_nt = NtName::Init(goal.clone());
        let goal_symbol = Symbol::nt(goal.clone());
        let init_prod_index = context
            .prods
            .iter()
            .position(|p| p.nt == init_nt && p.rhs.len() == 1 && p.rhs[0] == goal_symbol)
            .ok_or_else(|| Error::internal(format!("missing init production for goal {}", goal)))?;
        let start_item =
            context.make_lr_item(init_prod_index, 0, None, [None].into_iter().collect());
        let init_state = State::new(context, [start_item], None)?;
        let index = graph.get_state_index(init_state)?;
        init_state_map.insert(goal.clone(), index);
    }

    // Turn the crank.
    while let Some(index) = graph.todo.pop_front() {
        graph.analyze_state(index)?;
    }

    Ok((graph.states, init_state_map))
}

/// The growing graph of states, keyed for LALR merging.
struct StateGraph<'a, T: Eq + Hash + Clone> {
    /// Shared grammar data
    context: &'a PgenContext<T>,
    /// Registered states; position is state id
    states: Vec<State<T>>,
    /// Merge key to state id
    states_by_key: HashMap<OrderedFrozenSet<ItemKey<T>>, usize>,
    /// States whose rows must be (re)computed
    todo: VecDeque<usize>,
}

impl<T: Eq + Hash + Clone + Debug> StateGraph<'_, T> {
    /// The id for a state, registering or merging as needed. A merge that
    /// grows any follow set re-enqueues the state for reprocessing.
    fn get_state_index(&mut self, candidate: State<T>) -> Result<usize, Error> {
        match self.states_by_key.get(candidate.key()) {
            Some(&index) => {
                if self.states[index].update(&candidate)? {
                    self.todo.push_back(index);
                }
                Ok(index)
            }
            None => {
                let index = self.states.len();
                let mut candidate = candidate;
                candidate.id = index;
                self.states_by_key.insert(candidate.key().clone(), index);
                self.states.push(candidate);
                self.todo.push_back(index);
                Ok(index)
            }
        }
    }

    /// Compute the action row and goto row of one state.
    ///
    /// Successor states are created (or merged) on the fly through
    /// [`StateGraph::get_state_index`].
    fn analyze_state(&mut self, index: usize) -> Result<(), Error> {
        let context = self.context;
        let closure = self.states[index].closure(context);
        trace!("state {}:", index);
        for item in closure.iter() {
            trace!("    {}", context.lr_item_to_str(item));
        }

        // Step 1: what does each item want to do with each possible next
        // token? An item either steps over a terminal, steps over a
        // nonterminal, or reduces at the end of its production.
        let mut shift_items: IndexMap<T, OrderedSet<LRItem<T>>> = IndexMap::new();
        let mut goto_items: IndexMap<NtName, OrderedSet<LRItem<T>>> = IndexMap::new();
        let mut reduce_prods: IndexMap<Option<T>, usize> = IndexMap::new();

        for item in closure.iter() {
            let prod = &context.prods[item.prod_index];
            if item.offset < prod.rhs.len() {
                match &prod.rhs[item.offset] {
                    Symbol::Terminal(t) => {
                        if lookahead_contains(item.lookahead.as_ref(), t) {
                            let next = context.make_lr_item(
                                item.prod_index,
                                item.offset + 1,
                                None,
                                item.followed_by.clone(),
                            );
                            shift_items.entry(t.clone()).or_default().insert(next);
                        }
                    }
                    Symbol::Nonterminal(nt) => {
                        // A reduce never happens with a restriction still
                        // active, so the successor item carries none.
                        let next = context.make_lr_item(
                            item.prod_index,
                            item.offset + 1,
                            None,
                            item.followed_by.clone(),
                        );
                        goto_items.entry(nt.clone()).or_default().insert(next);
                    }
                    _ => {
                        return Err(Error::internal(
                            "item cursor stopped on a lookahead restriction",
                        ))
                    }
                }
            } else {
                if item.lookahead.is_some() {
                    return Err(Error::LookaheadAtReduce {
                        production: context.grammar.production_to_str(&prod.nt, &prod.rhs),
                    });
                }
                for t in item.followed_by.iter() {
                    let in_follow = context
                        .follow
                        .get(&prod.nt)
                        .map_or(false, |s| s.contains(t));
                    if in_follow {
                        if let Some(&existing) = reduce_prods.get(t) {
                            return Err(self.reduce_reduce_error(
                                index,
                                t,
                                existing,
                                item.prod_index,
                            ));
                        }
                        reduce_prods.insert(t.clone(), item.prod_index);
                    }
                }
            }
        }

        // Step 2: encode the rows.
        let mut action_row: IndexMap<Option<T>, i64> = IndexMap::new();
        for (t, items) in &shift_items {
            let successor = State::new(context, items.iter().cloned(), Some(index))?;
            let successor_id = self.get_state_index(successor)?;
            action_row.insert(Some(t.clone()), successor_id as i64);
        }
        for (t, &prod_index) in &reduce_prods {
            let prod = &context.prods[prod_index];
            if action_row.contains_key(t) {
                let shift_set = match t {
                    Some(term) => shift_items.get(term),
                    None => None,
                };
                return Err(self.shift_reduce_error(index, t, shift_set, prod));
            }
            let code = if matches!(prod.nt, NtName::Init(_)) {
                ACCEPT
            } else {
                // Negative zero is the same as zero, hence the "- 1".
                -(prod_index as i64) - 1
            };
            action_row.insert(t.clone(), code);
        }
        let mut goto_row: IndexMap<NtName, usize> = IndexMap::new();
        for (nt, items) in &goto_items {
            let successor = State::new(context, items.iter().cloned(), Some(index))?;
            goto_row.insert(nt.clone(), self.get_state_index(successor)?);
        }

        self.states[index].action_row = action_row;
        self.states[index].goto_row = goto_row;
        Ok(())
    }

    /// The terminals and nonterminals that lead from an initial state to
    /// this one, rendered for an error message.
    fn traceback(&self, index: usize) -> String {
        let mut chain: Vec<usize> = Vec::new();
        let mut current = Some(index);
        while let Some(i) = current {
            chain.push(i);
            current = self.states[i].parent;
        }
        // The initial state contributes no symbol.
        chain.pop();
        chain.reverse();

        let mut scenario: Vec<&Symbol<T>> = Vec::new();
        for i in chain {
            let item = match self.states[i].items().iter().next() {
                Some(item) => item,
                None => continue,
            };
            if item.offset == 0 {
                continue;
            }
            scenario.push(&self.context.prods[item.prod_index].rhs[item.offset - 1]);
        }
        self.context.grammar.symbols_to_str(scenario)
    }

    /// Build the error for two productions reducing on the same terminal.
    fn reduce_reduce_error(
        &self,
        index: usize,
        t: &Option<T>,
        first_prod: usize,
        second_prod: usize,
    ) -> Error {
        let context = self.context;
        let p1 = &context.prods[first_prod];
        let p2 = &context.prods[second_prod];
        Error::ReduceReduce {
            message: format!(
                "reduce-reduce conflict when looking at {} followed by {}\n\
                 can't decide whether to reduce with:\n\
                 \x20   {}\n\
                 or with:\n\
                 \x20   {}\n",
                self.traceback(index),
                token_to_str(t),
                context.grammar.production_to_str(&p1.nt, &p1.rhs),
                context.grammar.production_to_str(&p2.nt, &p2.rhs),
            ),
        }
    }

    /// Build the error for a terminal admitting both a shift and a reduce,
    /// including the production chain that shows why the terminal can follow
    /// the reduced nonterminal.
    fn shift_reduce_error(
        &self,
        index: usize,
        t: &Option<T>,
        shift_set: Option<&OrderedSet<LRItem<T>>>,
        prod: &Prod<T>,
    ) -> Error {
        let context = self.context;
        let t_str = token_to_str(t);
        let shift_str = shift_set
            .and_then(|items| items.iter().next())
            .map(|item| context.lr_item_to_str(item))
            .unwrap_or_else(|| "(unknown)".to_string());
        let why: String = context
            .why_follow(&prod.nt, t)
            .iter()
            .map(|(nt, rhs)| format!("    {}\n", context.grammar.production_to_str(nt, rhs)))
            .collect();
        Error::ShiftReduce {
            message: format!(
                "shift-reduce conflict when looking at {} followed by {}\n\
                 can't decide whether to shift into:\n\
                 \x20   {}\n\
                 or reduce using:\n\
                 \x20   {}\n\
                 \n\
                 These productions show how {} can appear after {} (if we reduce):\n\
                 {}",
                self.traceback(index),
                t_str,
                shift_str,
                context.grammar.production_to_str(&prod.nt, &prod.rhs),
                t_str,
                prod.nt,
                why,
            ),
        }
    }
}
