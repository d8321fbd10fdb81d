use std::collections::HashMap;

use num_bigint::BigUint;

use crate::bdd::Bdd;
use crate::order::VariableOrder;
use crate::reference::Ref;
use crate::types::{Level, Lit, Var};

impl Bdd {
    pub fn is_satisfiable(&self, node: Ref) -> bool {
        !self.is_zero(node)
    }

    /// Returns one satisfying assignment for the BDD, if any exists.
    ///
    /// The assignment only mentions the variables on the chosen path, top to
    /// bottom. Returns `None` for the constant false function.
    pub fn one_sat(&self, node: Ref) -> Option<Vec<Lit>> {
        if self.is_zero(node) {
            return None;
        }

        let mut path = Vec::new();
        let mut current = node;

        while let Some(var) = self.variable(current) {
            let high = self.high_node(current);
            if !self.is_zero(high) {
                path.push(var.pos());
                current = high;
            } else {
                path.push(var.neg());
                current = self.low_node(current);
            }
        }

        Some(path)
    }

    /// Evaluate `node` under a total assignment (`assignment[v - 1]` is the
    /// value of variable `v`).
    pub fn eval(&self, node: Ref, assignment: &[bool]) -> bool {
        let mut current = node;
        while let Some(var) = self.variable(current) {
            current = if assignment[var.index()] {
                self.high_node(current)
            } else {
                self.low_node(current)
            };
        }
        self.is_one(current)
    }

    /// Whether `node ∧ lits` has a model.
    ///
    /// Walks the existing diagram without building the conjunction, so no
    /// node is allocated.
    pub fn is_satisfiable_under(&self, node: Ref, lits: &[Lit]) -> bool {
        match Assumptions::new(self, lits) {
            Some(assumptions) => self.satisfiable_under(node, &assumptions, &mut HashMap::new()),
            None => false,
        }
    }

    fn satisfiable_under(&self, node: Ref, assumptions: &Assumptions, memo: &mut HashMap<Ref, bool>) -> bool {
        if self.is_zero(node) {
            return false;
        }
        let Some(var) = self.variable(node) else {
            return true;
        };
        // Any model of a non-zero node below the assumptions can take them.
        if assumptions.is_below(self.order(), var) {
            return true;
        }
        if let Some(&result) = memo.get(&node) {
            return result;
        }

        let result = match assumptions.get(var) {
            Some(true) => self.satisfiable_under(self.high_node(node), assumptions, memo),
            Some(false) => self.satisfiable_under(self.low_node(node), assumptions, memo),
            None => {
                self.satisfiable_under(self.low_node(node), assumptions, memo)
                    || self.satisfiable_under(self.high_node(node), assumptions, memo)
            }
        };

        memo.insert(node, result);
        result
    }

    /// Number of assignments to `num_vars` variables that satisfy `node`.
    pub fn sat_count(&self, node: Ref, num_vars: usize) -> BigUint {
        ModelCounter::with_num_vars(self, num_vars).count(node)
    }
}

/// A consistent set of literals that queries hold fixed.
#[derive(Debug, Clone)]
pub struct Assumptions {
    values: Vec<(Var, bool)>,
    /// Level of the deepest assumed variable.
    deepest: Option<Level>,
}

impl Assumptions {
    /// Returns `None` if `lits` contradict each other or mention a variable
    /// the manager does not declare.
    pub fn new(bdd: &Bdd, lits: &[Lit]) -> Option<Self> {
        let mut values: Vec<(Var, bool)> = Vec::with_capacity(lits.len());
        let mut deepest = None;
        for &lit in lits {
            let var = lit.var();
            if var.index() >= bdd.num_vars() {
                return None;
            }
            match values.iter().find(|&&(v, _)| v == var) {
                Some(&(_, value)) if value != lit.is_positive() => return None,
                Some(_) => {}
                None => {
                    values.push((var, lit.is_positive()));
                    deepest = deepest.max(Some(bdd.order().level_of(var)));
                }
            }
        }
        Some(Self { values, deepest })
    }

    /// Number of distinct assumed variables.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, var: Var) -> Option<bool> {
        self.values.iter().find(|&&(v, _)| v == var).map(|&(_, value)| value)
    }

    pub fn literals(&self) -> impl Iterator<Item = Lit> + '_ {
        self.values.iter().map(|&(var, value)| var.lit(value))
    }

    /// Whether `var` sits below every assumed variable, so that a node
    /// testing it depends on none of them.
    fn is_below(&self, order: &VariableOrder, var: Var) -> bool {
        match self.deepest {
            Some(deepest) => order.level_of(var) > deepest,
            None => true,
        }
    }
}

/// Memoized model counting over the full space of a manager's variables.
///
/// The count of a node is taken over *all* declared variables, so it does not
/// depend on which root the node was reached from. One counter can therefore
/// be shared by every function of the same manager.
pub struct ModelCounter<'a> {
    bdd: &'a Bdd,
    max: BigUint,
    cache: HashMap<Ref, BigUint>,
}

impl<'a> ModelCounter<'a> {
    pub fn new(bdd: &'a Bdd) -> Self {
        Self::with_num_vars(bdd, bdd.num_vars())
    }

    fn with_num_vars(bdd: &'a Bdd, num_vars: usize) -> Self {
        Self {
            bdd,
            max: BigUint::from(1u32) << num_vars,
            cache: HashMap::new(),
        }
    }

    /// Size of the whole space, `2^num_vars`.
    pub fn space(&self) -> &BigUint {
        &self.max
    }

    pub fn count(&mut self, node: Ref) -> BigUint {
        if self.bdd.is_zero(node) {
            return BigUint::ZERO;
        }
        if self.bdd.is_one(node) {
            return self.max.clone();
        }
        if let Some(count) = self.cache.get(&node) {
            return count.clone();
        }

        // Children do not depend on this node's variable: each full-space
        // count covers both of its values, hence the halving.
        let count_low = self.count(self.bdd.low_node(node));
        let count_high = self.count(self.bdd.high_node(node));
        let count: BigUint = (count_low + count_high) >> 1;

        self.cache.insert(node, count.clone());
        count
    }

    /// Number of assignments satisfying `node` and every assumed literal.
    pub fn count_under(&mut self, node: Ref, assumptions: &Assumptions) -> BigUint {
        self.count_under_with(node, assumptions, &mut HashMap::new())
    }

    /// Like [`count_under`](Self::count_under), with a caller-held memo that
    /// is only valid for one set of assumptions.
    pub(crate) fn count_under_with(
        &mut self,
        node: Ref,
        assumptions: &Assumptions,
        memo: &mut HashMap<Ref, BigUint>,
    ) -> BigUint {
        if self.bdd.is_zero(node) {
            return BigUint::ZERO;
        }
        let Some(var) = self.bdd.variable(node) else {
            return &self.max >> assumptions.len();
        };
        // Below the assumptions, each assumed variable halves the space.
        if assumptions.is_below(self.bdd.order(), var) {
            return self.count(node) >> assumptions.len();
        }
        if let Some(count) = memo.get(&node) {
            return count.clone();
        }

        let low = self.bdd.low_node(node);
        let high = self.bdd.high_node(node);
        let count = match assumptions.get(var) {
            Some(true) => self.count_under_with(high, assumptions, memo),
            Some(false) => self.count_under_with(low, assumptions, memo),
            None => {
                let count_low = self.count_under_with(low, assumptions, memo);
                let count_high = self.count_under_with(high, assumptions, memo);
                (count_low + count_high) >> 1
            }
        };

        memo.insert(node, count.clone());
        count
    }
}
