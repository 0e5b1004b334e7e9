//! LR items, parser states, and the closure computation.
//!
//! An item is a snapshot of progress through one flat production. It carries
//! two unrelated kinds of lookahead:
//!
//! - `lookahead` is the in-grammar restriction, if any, on the immediately
//!   upcoming token. Items are constructed through
//!   [`PgenContext::make_lr_item`], which advances the cursor past any
//!   lookahead restrictions in the body and folds them into this field, so
//!   the element at the cursor is never a restriction.
//! - `followed_by` is the table-generation lookahead: the set of terminals
//!   that may follow the whole production. `None` in this set means the end
//!   of the input.
//!
//! A state is a frozen set of items. Its merge key covers only
//! `(production, offset, lookahead)`, deliberately leaving `followed_by`
//! out: states whose items differ only in follow sets are merged by unioning
//! those sets, which is what makes the generator LALR rather than canonical
//! LR.

use std::{
    collections::{HashMap, VecDeque},
    fmt::Debug,
    hash::Hash,
};

use indexmap::IndexMap;

use crate::{
    error::Error,
    grammar::{Grammar, LookaheadRule, NtName, Symbol},
    lower::Prod,
    ordered::{OrderedFrozenSet, OrderedSet},
    path::find_path,
};

/// The merge-relevant projection of an item.
pub type ItemKey<T> = (usize, usize, Option<LookaheadRule<T>>);

/// A snapshot of progress through a single flat production.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LRItem<T: Eq + Hash + Clone> {
    /// Index of the production in the flat production list
    pub prod_index: usize,
    /// Cursor position within the production's body
    pub offset: usize,
    /// The in-grammar restriction on the next token, if one is active
    pub lookahead: Option<LookaheadRule<T>>,
    /// Terminals that may follow the whole production; `None` means END
    pub followed_by: OrderedFrozenSet<Option<T>>,
}

impl<T: Eq + Hash + Clone> LRItem<T> {
    /// The projection used for state identity.
    pub fn key(&self) -> ItemKey<T> {
        (self.prod_index, self.offset, self.lookahead.clone())
    }
}

/// The immutable bundle of data shared by the whole table-generation run.
pub struct PgenContext<T: Eq + Hash + Clone> {
    /// The fully lowered grammar
    pub grammar: Grammar<T>,
    /// The flat production list; positions are the global indices
    pub prods: Vec<Prod<T>>,
    /// `(index, rhs)` of each nonterminal's flat productions
    pub prods_by_nt: IndexMap<NtName, Vec<(usize, Vec<Symbol<T>>)>>,
    /// `first_cache[p][i]` is the FIRST set of `prods[p].rhs[i..]`
    pub first_cache: Vec<Vec<OrderedFrozenSet<Option<T>>>>,
    /// FOLLOW set of every reachable nonterminal; `None` means END
    pub follow: IndexMap<NtName, OrderedSet<Option<T>>>,
}

impl<T: Eq + Hash + Clone + Debug> PgenContext<T> {
    /// Create an item, advancing the cursor past any lookahead restrictions.
    ///
    /// Restrictions passed over are folded into the item's `lookahead`
    /// field, so the element at the cursor is never a restriction.
    pub fn make_lr_item(
        &self,
        prod_index: usize,
        offset: usize,
        lookahead: Option<LookaheadRule<T>>,
        followed_by: OrderedFrozenSet<Option<T>>,
    ) -> LRItem<T> {
        let rhs = &self.prods[prod_index].rhs;
        let mut offset = offset;
        let mut lookahead = lookahead;
        while offset < rhs.len() {
            match &rhs[offset] {
                Symbol::Lookahead(rule) => {
                    lookahead = Some(LookaheadRule::intersect(lookahead.as_ref(), rule));
                    offset += 1;
                }
                _ => break,
            }
        }
        LRItem {
            prod_index,
            offset,
            lookahead,
            followed_by,
        }
    }

    /// The terminals that can appear after `rhs[offset]` of a production,
    /// given that `followed_by` can appear after the whole production.
    pub fn specific_follow(
        &self,
        prod_index: usize,
        offset: usize,
        followed_by: &OrderedFrozenSet<Option<T>>,
    ) -> OrderedFrozenSet<Option<T>> {
        let after = &self.first_cache[prod_index][offset + 1];
        if after.contains(&None) {
            // The rest of the body can be empty, so the production's own
            // follow terminals can appear here too.
            after.without(&None).union(followed_by)
        } else {
            after.clone()
        }
    }

    /// Render an item for diagnostics.
    pub fn lr_item_to_str(&self, item: &LRItem<T>) -> String {
        let prod = &self.prods[item.prod_index];
        let before = self.grammar.symbols_to_str(prod.rhs[..item.offset].iter());
        let after = self.grammar.symbols_to_str(prod.rhs[item.offset..].iter());
        let lookahead = match &item.lookahead {
            Some(rule) => format!(
                " {}",
                self.grammar.element_to_str(&Symbol::Lookahead(rule.clone()))
            ),
            None => String::new(),
        };
        let follow: Vec<String> = item.followed_by.iter().map(token_to_str).collect();
        format!(
            "{} ::= {} ·{} {} {{{}}}",
            prod.nt,
            before,
            lookahead,
            after,
            follow.join(", ")
        )
    }

    /// A chain of productions showing why `t` is in the FIRST set of
    /// `prods[prod_index].rhs[offset..]`. Best-effort: an empty chain means
    /// the search found nothing to show.
    pub fn why_start(
        &self,
        t: &Option<T>,
        prod_index: usize,
        offset: usize,
    ) -> Vec<(NtName, Vec<Symbol<T>>)> {
        let successors = |&(pi, off): &(usize, usize)| -> Vec<(usize, (usize, usize))> {
            let nt = match self.prods[pi].rhs.get(off) {
                Some(Symbol::Nonterminal(nt)) => nt,
                _ => return vec![],
            };
            match self.prods_by_nt.get(nt) {
                Some(list) => list
                    .iter()
                    .filter(|(callee, _)| self.first_cache[*callee][0].contains(t))
                    .map(|(callee, _)| (*callee, (*callee, 0)))
                    .collect(),
                None => vec![],
            }
        };
        let arrived = |&(pi, off): &(usize, usize)| -> bool {
            match self.prods[pi].rhs.get(off) {
                Some(Symbol::Terminal(x)) => Some(x) == t.as_ref(),
                _ => false,
            }
        };

        match find_path([(prod_index, offset)], successors, arrived) {
            Some(path) => path
                .edges
                .iter()
                .map(|&pi| (self.prods[pi].nt.clone(), self.prods[pi].rhs.clone()))
                .collect(),
            None => vec![],
        }
    }

    /// A chain of productions showing why `t` is in `nt`'s FOLLOW set.
    /// Best-effort, like [`PgenContext::why_start`].
    pub fn why_follow(&self, nt: &NtName, t: &Option<T>) -> Vec<(NtName, Vec<Symbol<T>>)> {
        // Occurrences directly followed by something that can start with t.
        let mut start_points: IndexMap<NtName, (usize, usize)> = IndexMap::new();
        for (prod_index, prod) in self.prods.iter().enumerate() {
            if prod.rhs.is_empty() {
                continue;
            }
            for i in 0..prod.rhs.len() - 1 {
                if let Symbol::Nonterminal(x) = &prod.rhs[i] {
                    if self.first_cache[prod_index][i + 1].contains(t) {
                        start_points.insert(x.clone(), (prod_index, i + 1));
                    }
                }
            }
        }

        let successors = |n: &NtName| -> Vec<(usize, NtName)> {
            match self.prods_by_nt.get(n) {
                Some(list) => list
                    .iter()
                    .filter_map(|(pi, rhs)| match rhs.last() {
                        Some(Symbol::Nonterminal(last)) => Some((*pi, last.clone())),
                        _ => None,
                    })
                    .collect(),
                None => vec![],
            }
        };

        let path = match find_path(
            start_points.keys().cloned(),
            successors,
            |point: &NtName| point == nt,
        ) {
            Some(path) => path,
            None => return vec![],
        };

        let mut chain = Vec::new();
        // How to produce nt in a context where t can follow it.
        let (prod_index, offset) = match start_points.get(&path.nodes[0]) {
            Some(point) => *point,
            None => return vec![],
        };
        chain.push((
            self.prods[prod_index].nt.clone(),
            self.prods[prod_index].rhs.clone(),
        ));
        for pi in &path.edges {
            chain.push((self.prods[*pi].nt.clone(), self.prods[*pi].rhs.clone()));
        }
        // How what comes next can expand into something starting with t.
        chain.extend(self.why_start(t, prod_index, offset));
        chain
    }
}

/// Render a follow-set element: a terminal, or `$` for the end of input.
pub(crate) fn token_to_str<T: Debug>(t: &Option<T>) -> String {
    match t {
        Some(t) => format!("{:?}", t),
        None => "$".to_string(),
    }
}

/// A parser state: a frozen set of items, the merge key derived from them,
/// and (once analyzed) the action and goto rows of the parser tables.
#[derive(Debug, Clone)]
pub struct State<T: Eq + Hash + Clone> {
    /// The items, consolidated so no two share a merge key
    items: OrderedFrozenSet<LRItem<T>>,
    /// Projection of the items used for LALR merging
    key: OrderedFrozenSet<ItemKey<T>>,
    /// Small unique id, assigned when the state is registered
    pub id: usize,
    /// The state this one was first reached from, for tracebacks
    pub(crate) parent: Option<usize>,
    /// terminal (or END) to action code
    pub action_row: IndexMap<Option<T>, i64>,
    /// nonterminal to successor state id
    pub goto_row: IndexMap<NtName, usize>,
}

impl<T: Eq + Hash + Clone + Debug> State<T> {
    /// Build a state from items.
    ///
    /// Items that agree on `(production, offset, lookahead)` are merged up
    /// front by unioning their follow sets, so equivalent states end up with
    /// equal item sets.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Internal`] if the items do not share a consistent
    /// symbol history; that would mean the state graph is corrupt.
    pub fn new(
        context: &PgenContext<T>,
        items: impl IntoIterator<Item = LRItem<T>>,
        parent: Option<usize>,
    ) -> Result<Self, Error> {
        let mut merged: IndexMap<ItemKey<T>, OrderedSet<Option<T>>> = IndexMap::new();
        for item in items {
            merged
                .entry(item.key())
                .or_default()
                .extend(item.followed_by.iter().cloned());
        }
        let items: OrderedFrozenSet<LRItem<T>> = merged
            .into_iter()
            .map(|((prod_index, offset, lookahead), followed_by)| LRItem {
                prod_index,
                offset,
                lookahead,
                followed_by: followed_by.freeze(),
            })
            .collect();
        let key: OrderedFrozenSet<ItemKey<T>> = items.iter().map(LRItem::key).collect();

        check_items_compatible(context, &items)?;

        Ok(Self {
            items,
            key,
            id: usize::MAX,
            parent,
            action_row: IndexMap::new(),
            goto_row: IndexMap::new(),
        })
    }

    /// The consolidated items.
    pub fn items(&self) -> &OrderedFrozenSet<LRItem<T>> {
        &self.items
    }

    /// The LALR merge key.
    pub fn key(&self) -> &OrderedFrozenSet<ItemKey<T>> {
        &self.key
    }

    /// Merge a freshly built state with the same key into this one.
    ///
    /// Follow sets are unioned item-wise. Returns true if anything grew, in
    /// which case the caller must reprocess this state.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Internal`] if the two states do not actually
    /// share a key.
    pub fn update(&mut self, new_state: &State<T>) -> Result<bool, Error> {
        if self.key != new_state.key {
            return Err(Error::internal("state merge with mismatched keys"));
        }
        let new_followed_by: HashMap<ItemKey<T>, &OrderedFrozenSet<Option<T>>> = new_state
            .items
            .iter()
            .map(|item| (item.key(), &item.followed_by))
            .collect();

        // If no new item brings new follow terminals, there is nothing to do.
        let mut changed = false;
        for item in self.items.iter() {
            match new_followed_by.get(&item.key()) {
                Some(new) if !new.is_subset(&item.followed_by) => {
                    changed = true;
                    break;
                }
                Some(_) => {}
                None => return Err(Error::internal("state merge with mismatched items")),
            }
        }
        if !changed {
            return Ok(false);
        }

        let mut merged: Vec<LRItem<T>> = Vec::with_capacity(self.items.len());
        for item in self.items.iter() {
            let new = new_followed_by
                .get(&item.key())
                .ok_or_else(|| Error::internal("state merge with mismatched items"))?;
            merged.push(LRItem {
                followed_by: item.followed_by.union(new),
                ..item.clone()
            });
        }
        self.items = merged.into_iter().collect();
        Ok(true)
    }

    /// The transitive closure of this state under left-calls: every item
    /// reachable by stepping into nonterminals without consuming input.
    ///
    /// This is the only place that creates items with an active lookahead
    /// restriction, by stepping into a production while one applies.
    pub fn closure(&self, context: &PgenContext<T>) -> OrderedSet<LRItem<T>> {
        let mut closure: OrderedSet<LRItem<T>> = self.items.iter().cloned().collect();
        let mut todo: VecDeque<LRItem<T>> = self.items.iter().cloned().collect();

        while let Some(item) = todo.pop_front() {
            let rhs = &context.prods[item.prod_index].rhs;
            if item.offset >= rhs.len() {
                continue;
            }
            let next_symbol = match &rhs[item.offset] {
                Symbol::Nonterminal(nt) => nt,
                _ => continue,
            };
            let callees = match context.prods_by_nt.get(next_symbol) {
                Some(callees) => callees,
                None => continue,
            };
            for (callee_index, callee_rhs) in callees {
                // The flat production list predates the removal of empty
                // productions, so check the grammar still has this one.
                if callee_rhs.is_empty() {
                    let still_present = context
                        .grammar
                        .rules(next_symbol)
                        .map_or(false, |plist| plist.iter().any(|p| p.body.is_empty()));
                    if !still_present {
                        continue;
                    }
                }
                let followers =
                    context.specific_follow(item.prod_index, item.offset, &item.followed_by);
                let new_item =
                    context.make_lr_item(*callee_index, 0, item.lookahead.clone(), followers);
                if closure.insert(new_item.clone()) {
                    todo.push_back(new_item);
                }
            }
        }
        closure
    }
}

/// Check that all items of a state share a consistent history: every item's
/// consumed symbols must be a suffix of the longest item's, lookahead
/// restrictions excluded.
fn check_items_compatible<T: Eq + Hash + Clone + Debug>(
    context: &PgenContext<T>,
    items: &OrderedFrozenSet<LRItem<T>>,
) -> Result<(), Error> {
    let histories: Vec<(&LRItem<T>, Vec<&Symbol<T>>)> = items
        .iter()
        .map(|item| {
            let history = context.prods[item.prod_index].rhs[..item.offset]
                .iter()
                .filter(|e| !matches!(e, Symbol::Lookahead(_)))
                .collect();
            (item, history)
        })
        .collect();
    let (longest_item, longest) = match histories.iter().max_by_key(|(_, h)| h.len()) {
        Some((item, history)) => (*item, history.clone()),
        None => return Ok(()),
    };

    for (item, history) in &histories {
        let compatible = longest.len() >= history.len()
            && longest[longest.len() - history.len()..] == history[..];
        if !compatible {
            return Err(Error::internal(format!(
                "incompatible LR items:\n    {}\n    {}",
                context.lr_item_to_str(longest_item),
                context.lr_item_to_str(item)
            )));
        }
    }
    Ok(())
}
