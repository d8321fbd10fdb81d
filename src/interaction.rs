//! Feasible pairwise interactions among the most frequent variables.

use std::collections::BTreeSet;
use std::fmt;

use log::info;

use crate::bdd::Bdd;
use crate::dimacs::Cnf;
use crate::order::{FrequencyOrder, OrderingHeuristic};
use crate::reference::Ref;
use crate::sampler::Configuration;
use crate::types::{Lit, Var};

pub const DEFAULT_INTERACTION_LIMIT: usize = 50;

/// One pairwise feature-value combination, `var_a = val_a ∧ var_b = val_b`,
/// with `var_a < var_b`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Obligation {
    pub var_a: Var,
    pub val_a: bool,
    pub var_b: Var,
    pub val_b: bool,
}

impl Obligation {
    pub fn new(var_a: Var, val_a: bool, var_b: Var, val_b: bool) -> Self {
        assert!(var_a < var_b, "Obligation variables must be ordered: {} < {}", var_a, var_b);
        Self {
            var_a,
            val_a,
            var_b,
            val_b,
        }
    }

    pub fn lit_a(&self) -> Lit {
        self.var_a.lit(self.val_a)
    }

    pub fn lit_b(&self) -> Lit {
        self.var_b.lit(self.val_b)
    }

    pub fn is_satisfied_by(&self, config: &Configuration) -> bool {
        config.satisfies(self.lit_a()) && config.satisfies(self.lit_b())
    }
}

impl fmt::Display for Obligation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lit_a(), self.lit_b())
    }
}

/// The `min(N, limit)` most frequent variables (ties by ascending id),
/// sorted by id.
pub fn top_variables(cnf: &Cnf, limit: usize) -> Vec<Var> {
    let mut vars: Vec<Var> = FrequencyOrder
        .plan(cnf)
        .vars()
        .iter()
        .copied()
        .take(limit)
        .collect();
    vars.sort_unstable();
    vars
}

/// All jointly satisfiable pairwise literal combinations over a set of
/// variables: the coverage universe.
#[derive(Debug, Clone, Default)]
pub struct InteractionUniverse {
    vars: Vec<Var>,
    obligations: BTreeSet<Obligation>,
}

impl InteractionUniverse {
    /// Test every pair `a < b` of `vars` in all four polarities against
    /// `root`. An unsatisfiable root gives the empty universe.
    ///
    /// Each test walks the diagram under the two literals, so the manager
    /// gains no nodes however many pairs there are.
    pub fn compute(bdd: &Bdd, root: Ref, vars: &[Var]) -> Self {
        let mut vars = vars.to_vec();
        vars.sort_unstable();
        vars.dedup();

        let mut obligations = BTreeSet::new();
        if bdd.is_zero(root) {
            return Self { vars, obligations };
        }

        for (i, &a) in vars.iter().enumerate() {
            let values_a: Vec<bool> = [false, true]
                .into_iter()
                .filter(|&val_a| bdd.is_satisfiable_under(root, &[a.lit(val_a)]))
                .collect();
            for &b in &vars[i + 1..] {
                for &val_a in &values_a {
                    for val_b in [false, true] {
                        if bdd.is_satisfiable_under(root, &[a.lit(val_a), b.lit(val_b)]) {
                            obligations.insert(Obligation::new(a, val_a, b, val_b));
                        }
                    }
                }
            }
        }

        info!(
            "{} feasible pairwise interactions among {} variables",
            obligations.len(),
            vars.len()
        );
        Self { vars, obligations }
    }

    /// The pairwise interaction count.
    pub fn count(&self) -> usize {
        self.obligations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obligations.is_empty()
    }

    pub fn vars(&self) -> &[Var] {
        &self.vars
    }

    pub fn contains(&self, obligation: &Obligation) -> bool {
        self.obligations.contains(obligation)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Obligation> {
        self.obligations.iter()
    }

    pub fn into_obligations(self) -> BTreeSet<Obligation> {
        self.obligations
    }
}
