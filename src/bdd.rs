//! The decision-diagram manager.
//!
//! [`Bdd`] owns every node. Functions are handed out as [`Ref`] values, which
//! are plain copyable handles: they never own memory and are only meaningful
//! together with the manager that created them. Nodes are reclaimed only by an
//! explicit [`Bdd::collect_garbage`] or by dropping the manager.
//!
//! Nodes are *reduced* (no node with equal children), *hash-consed* (equal
//! nodes share one slot) and use *complement edges* (the high edge of a stored
//! node is never negated). Hence two `Ref`s denote the same function iff they
//! are equal.
//!
//! Feature variables are declared once, in a caller-supplied order. Internally
//! nodes store their 1-based level; the public API speaks in [`Var`]s and
//! [`Lit`]s.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Debug;

use log::debug;

use crate::cache::Cache;
use crate::error::Result;
use crate::node::Node;
use crate::order::VariableOrder;
use crate::reference::Ref;
use crate::table::Table;
use crate::types::{Level, Lit, Var};
use crate::utils::{pairing3, MyHash};

/// Level stored in terminal "nodes"; larger than any real level.
const TERMINAL_LEVEL: u32 = u32::MAX;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum OpKey {
    Ite(Ref, Ref, Ref),
}

impl MyHash for OpKey {
    fn hash(&self) -> u64 {
        match self {
            OpKey::Ite(f, g, h) => pairing3(f.raw() as u64, g.raw() as u64, h.raw() as u64),
        }
    }
}

/// Sizing of a [`Bdd`] manager.
#[derive(Debug, Clone)]
pub struct BddConfig {
    /// Maximal number of live decision nodes.
    pub max_nodes: usize,
    /// The operation cache has `2^cache_bits` slots.
    pub cache_bits: usize,
    /// The unique table starts with `2^bucket_bits` buckets.
    pub bucket_bits: usize,
}

impl Default for BddConfig {
    fn default() -> Self {
        Self {
            max_nodes: 1 << 26,
            cache_bits: 18,
            bucket_bits: 16,
        }
    }
}

impl BddConfig {
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    /// Capacity of `2^bits` nodes, or `None` if that does not fit in a `usize`.
    pub fn with_max_nodes_bits(self, bits: usize) -> Option<Self> {
        let max_nodes = u32::try_from(bits).ok().and_then(|bits| 1usize.checked_shl(bits))?;
        Some(self.with_max_nodes(max_nodes))
    }

    pub fn with_cache_bits(mut self, cache_bits: usize) -> Self {
        self.cache_bits = cache_bits;
        self
    }
}

pub struct Bdd {
    storage: RefCell<Table<Node>>,
    cache: RefCell<Cache<OpKey, Ref>>,
    order: VariableOrder,
    one: Ref,
    zero: Ref,
}

impl Bdd {
    /// Create a manager declaring `order.len()` variables, placed top to
    /// bottom in the given order.
    pub fn new(order: &VariableOrder, config: BddConfig) -> Self {
        // The sentinel slot 0 doubles as the single terminal node.
        let one = Ref::positive(0);

        Self {
            storage: RefCell::new(Table::new(config.bucket_bits, config.max_nodes)),
            cache: RefCell::new(Cache::new(config.cache_bits)),
            order: order.clone(),
            one,
            zero: -one,
        }
    }

    /// Manager over variables `1..=n` in their natural order.
    pub fn with_num_vars(n: usize) -> Self {
        Bdd::new(&VariableOrder::identity(n), BddConfig::default())
    }
}

impl Debug for Bdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let storage = self.storage.borrow();
        f.debug_struct("Bdd")
            .field("num_vars", &self.num_vars())
            .field("capacity", &storage.capacity())
            .field("live_nodes", &storage.real_size())
            .finish()
    }
}

impl Bdd {
    pub fn one(&self) -> Ref {
        self.one
    }
    pub fn zero(&self) -> Ref {
        self.zero
    }

    pub fn is_zero(&self, node: Ref) -> bool {
        node == self.zero
    }
    pub fn is_one(&self, node: Ref) -> bool {
        node == self.one
    }
    pub fn is_terminal(&self, node: Ref) -> bool {
        node.index() == 0
    }

    pub fn num_vars(&self) -> usize {
        self.order.len()
    }

    pub fn order(&self) -> &VariableOrder {
        &self.order
    }

    /// Number of live decision nodes plus the terminal.
    pub fn live_nodes(&self) -> usize {
        self.storage.borrow().real_size() + 1
    }

    /// `(hits, misses)` of the operation cache.
    pub fn cache_stats(&self) -> (usize, usize) {
        let cache = self.cache.borrow();
        (cache.hits(), cache.misses())
    }

    fn node(&self, node: Ref) -> Node {
        *self.storage.borrow().value(node.index() as usize)
    }

    /// 1-based level of the variable tested at the root of `node`.
    fn top_level(&self, node: Ref) -> u32 {
        if self.is_terminal(node) {
            TERMINAL_LEVEL
        } else {
            self.node(node).level
        }
    }

    fn var_level(&self, var: Var) -> u32 {
        assert!(
            var.index() < self.num_vars(),
            "Variable {} is not declared (num_vars = {})",
            var,
            self.num_vars()
        );
        self.order.level_of(var).index() as u32 + 1
    }

    fn level_var(&self, level: u32) -> Var {
        self.order.var_at(Level::new(level as usize - 1))
    }

    /// The variable tested at the root of `node`, or `None` for a terminal.
    pub fn variable(&self, node: Ref) -> Option<Var> {
        if self.is_terminal(node) {
            None
        } else {
            Some(self.level_var(self.node(node).level))
        }
    }

    pub fn low_node(&self, node: Ref) -> Ref {
        let low = self.node(node).low;
        if node.is_negated() {
            -low
        } else {
            low
        }
    }

    pub fn high_node(&self, node: Ref) -> Ref {
        let high = self.node(node).high;
        if node.is_negated() {
            -high
        } else {
            high
        }
    }

    fn mk_node(&self, level: u32, low: Ref, high: Ref) -> Result<Ref> {
        debug_assert_ne!(level, 0, "Level should not be zero");
        debug_assert!(level < self.top_level(low) && level < self.top_level(high));

        if low == high {
            return Ok(low);
        }
        if high.is_negated() {
            return Ok(-self.mk_node(level, -low, -high)?);
        }

        let i = self.storage.borrow_mut().put(Node { level, low, high })?;
        Ok(Ref::positive(i as u32))
    }

    pub fn mk_var(&self, var: Var) -> Result<Ref> {
        self.mk_node(self.var_level(var), self.zero, self.one)
    }

    pub fn mk_lit(&self, lit: Lit) -> Result<Ref> {
        let x = self.mk_var(lit.var())?;
        Ok(if lit.is_positive() { x } else { -x })
    }

    /// Sort literals bottom-up, dropping duplicates. Returns `None` if both
    /// polarities of some variable occur.
    fn sorted_levels(&self, literals: &[Lit]) -> Option<Vec<(u32, bool)>> {
        let mut levels: Vec<(u32, bool)> = literals
            .iter()
            .map(|lit| (self.var_level(lit.var()), lit.is_positive()))
            .collect();
        levels.sort_unstable_by(|a, b| b.cmp(a));
        levels.dedup();
        if levels.windows(2).any(|w| w[0].0 == w[1].0) {
            return None;
        }
        Some(levels)
    }

    /// Disjunction of the literals, built directly as one chain of nodes.
    pub fn clause(&self, literals: &[Lit]) -> Result<Ref> {
        debug!("clause(literals = {:?})", literals);
        let Some(levels) = self.sorted_levels(literals) else {
            return Ok(self.one); // x ∨ ¬x
        };
        let mut current = self.zero;
        for (level, positive) in levels {
            current = if positive {
                self.mk_node(level, current, self.one)?
            } else {
                self.mk_node(level, self.one, current)?
            };
        }
        Ok(current)
    }

    /// Conjunction of the literals, built directly as one chain of nodes.
    pub fn cube(&self, literals: &[Lit]) -> Result<Ref> {
        debug!("cube(literals = {:?})", literals);
        let Some(levels) = self.sorted_levels(literals) else {
            return Ok(self.zero); // x ∧ ¬x
        };
        let mut current = self.one;
        for (level, positive) in levels {
            current = if positive {
                self.mk_node(level, self.zero, current)?
            } else {
                self.mk_node(level, current, self.zero)?
            };
        }
        Ok(current)
    }

    fn top_cofactors(&self, node: Ref, level: u32) -> (Ref, Ref) {
        if self.top_level(node) != level {
            return (node, node);
        }
        (self.low_node(node), self.high_node(node))
    }

    /// Apply the ITE operation to the arguments.
    ///
    /// ```text
    /// ITE(f, g, h) = (f ∧ g) ∨ (¬f ∧ h)
    /// ```
    pub fn apply_ite(&self, f: Ref, g: Ref, h: Ref) -> Result<Ref> {
        debug!("apply_ite(f = {}, g = {}, h = {})", f, g, h);

        // Base cases:
        //   ite(1,G,H) => G
        //   ite(0,G,H) => H
        //   ite(F,G,G) => G
        //   ite(F,1,0) => F
        //   ite(F,0,1) => ~F
        if self.is_one(f) {
            return Ok(g);
        }
        if self.is_zero(f) {
            return Ok(h);
        }
        if g == h {
            return Ok(g);
        }
        if self.is_one(g) && self.is_zero(h) {
            return Ok(f);
        }
        if self.is_zero(g) && self.is_one(h) {
            return Ok(-f);
        }

        // Standard triples:
        //   ite(F,F,H) => ite(F,1,H)
        //   ite(F,~F,H) => ite(F,0,H)
        //   ite(F,G,F) => ite(F,G,0)
        //   ite(F,G,~F) => ite(F,G,1)
        if g == f {
            return self.apply_ite(f, self.one, h);
        }
        if g == -f {
            return self.apply_ite(f, self.zero, h);
        }
        if h == f {
            return self.apply_ite(f, g, self.zero);
        }
        if h == -f {
            return self.apply_ite(f, g, self.one);
        }

        let i = self.top_level(f);
        let j = self.top_level(g);
        let k = self.top_level(h);

        // Equivalent pairs (choose the one with the topmost first argument):
        //   ite(F,1,H) == ite(H,1,F)
        //   ite(F,G,0) == ite(G,F,0)
        //   ite(F,G,1) == ite(~G,~F,1)
        //   ite(F,0,H) == ite(~H,0,~F)
        //   ite(F,G,~G) == ite(G,F,~F)
        if self.is_one(g) && k < i {
            return self.apply_ite(h, self.one, f);
        }
        if self.is_zero(h) && j < i {
            return self.apply_ite(g, f, self.zero);
        }
        if self.is_one(h) && j < i {
            return self.apply_ite(-g, -f, self.one);
        }
        if self.is_zero(g) && k < i {
            return self.apply_ite(-h, self.zero, -f);
        }
        if g == -h && j < i {
            return self.apply_ite(g, f, -f);
        }

        // Make the first two arguments regular:
        //   ite(~F,G,H) => ite(F,H,G)
        //   ite(F,~G,H) => ~ite(F,G,~H)
        let (mut f, mut g, mut h) = (f, g, h);
        if f.is_negated() {
            f = -f;
            std::mem::swap(&mut g, &mut h);
        }
        let negate = g.is_negated();
        if negate {
            g = -g;
            h = -h;
        }

        let key = OpKey::Ite(f, g, h);
        let cached = self.cache.borrow().get(&key).copied();
        let res = match cached {
            Some(res) => res,
            None => {
                let m = i.min(j).min(k);
                let (f0, f1) = self.top_cofactors(f, m);
                let (g0, g1) = self.top_cofactors(g, m);
                let (h0, h1) = self.top_cofactors(h, m);

                let e = self.apply_ite(f0, g0, h0)?;
                let t = self.apply_ite(f1, g1, h1)?;
                let res = self.mk_node(m, e, t)?;
                self.cache.borrow_mut().insert(key, res);
                res
            }
        };

        Ok(if negate { -res } else { res })
    }

    pub fn apply_not(&self, f: Ref) -> Ref {
        -f
    }

    pub fn apply_and(&self, u: Ref, v: Ref) -> Result<Ref> {
        self.apply_ite(u, v, self.zero)
    }

    pub fn apply_or(&self, u: Ref, v: Ref) -> Result<Ref> {
        self.apply_ite(u, self.one, v)
    }

    pub fn apply_xor(&self, u: Ref, v: Ref) -> Result<Ref> {
        self.apply_ite(u, -v, v)
    }

    /// Cofactor `f|lit`: the function obtained by fixing `lit` to true.
    pub fn restrict(&self, f: Ref, lit: Lit) -> Result<Ref> {
        self.restrict_cube(f, &[lit])
    }

    /// Cofactor by several literals at once. An inconsistent cube yields 0.
    pub fn restrict_cube(&self, f: Ref, literals: &[Lit]) -> Result<Ref> {
        let Some(levels) = self.sorted_levels(literals) else {
            return Ok(self.zero);
        };
        let Some(&(deepest, _)) = levels.first() else {
            return Ok(f);
        };
        let values: HashMap<u32, bool> = levels.into_iter().collect();
        let mut cache = HashMap::new();
        self.restrict_(f, &values, deepest, &mut cache)
    }

    fn restrict_(
        &self,
        f: Ref,
        values: &HashMap<u32, bool>,
        deepest: u32,
        cache: &mut HashMap<Ref, Ref>,
    ) -> Result<Ref> {
        let level = self.top_level(f);
        if level > deepest {
            // Also covers terminals.
            return Ok(f);
        }
        if let Some(&res) = cache.get(&f) {
            return Ok(res);
        }

        let res = match values.get(&level) {
            Some(true) => self.restrict_(self.high_node(f), values, deepest, cache)?,
            Some(false) => self.restrict_(self.low_node(f), values, deepest, cache)?,
            None => {
                let low = self.restrict_(self.low_node(f), values, deepest, cache)?;
                let high = self.restrict_(self.high_node(f), values, deepest, cache)?;
                self.mk_node(level, low, high)?
            }
        };
        cache.insert(f, res);
        Ok(res)
    }

    /// Existential quantification `∃ vars. f`.
    pub fn exists(&self, f: Ref, vars: &[Var]) -> Result<Ref> {
        let levels: HashSet<u32> = vars.iter().map(|&v| self.var_level(v)).collect();
        let Some(&deepest) = levels.iter().max() else {
            return Ok(f);
        };
        let mut cache = HashMap::new();
        self.exists_(f, &levels, deepest, &mut cache)
    }

    fn exists_(
        &self,
        f: Ref,
        levels: &HashSet<u32>,
        deepest: u32,
        cache: &mut HashMap<Ref, Ref>,
    ) -> Result<Ref> {
        let level = self.top_level(f);
        if level > deepest {
            return Ok(f);
        }
        if let Some(&res) = cache.get(&f) {
            return Ok(res);
        }

        let low = self.exists_(self.low_node(f), levels, deepest, cache)?;
        let high = self.exists_(self.high_node(f), levels, deepest, cache)?;
        let res = if levels.contains(&level) {
            self.apply_or(low, high)?
        } else {
            self.mk_node(level, low, high)?
        };
        cache.insert(f, res);
        Ok(res)
    }

    /// Slot indices of all nodes reachable from `nodes`, terminal included.
    pub fn descendants(&self, nodes: impl IntoIterator<Item = Ref>) -> HashSet<u32> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from_iter(nodes);

        while let Some(node) = queue.pop_front() {
            let i = node.index();
            if visited.insert(i) && i != 0 {
                let Node { low, high, .. } = self.node(node);
                queue.push_back(low);
                queue.push_back(high);
            }
        }

        visited
    }

    /// Number of nodes in the diagram of `f`, terminal included.
    pub fn size(&self, f: Ref) -> u64 {
        self.descendants([f]).len() as u64
    }

    /// Release every node not reachable from `roots` and clear the operation
    /// cache. Returns the number of released nodes.
    ///
    /// Any `Ref` not reachable from `roots` is dangling afterwards.
    pub fn collect_garbage(&self, roots: &[Ref]) -> usize {
        debug!("Collecting garbage...");
        self.cache.borrow_mut().clear();
        let alive = self.descendants(roots.iter().copied());
        let dropped = self
            .storage
            .borrow_mut()
            .retain(|index| alive.contains(&(index as u32)));
        debug!("Released {} nodes, {} alive", dropped, alive.len());
        dropped
    }

    pub fn to_bracket_string(&self, node: Ref) -> String {
        if self.is_zero(node) {
            return "(0)".to_string();
        } else if self.is_one(node) {
            return "(1)".to_string();
        }

        let v = self.level_var(self.node(node).level);
        format!(
            "{}:({}, {}, {})",
            node,
            v,
            self.to_bracket_string(self.high_node(node)),
            self.to_bracket_string(self.low_node(node))
        )
    }
}
