//! Variable ordering heuristics.
//!
//! # Why ordering matters
//!
//! The size of a decision diagram is highly sensitive to the order in which
//! variables are tested. For `(x₁ ∧ y₁) ∨ ... ∨ (xₙ ∧ yₙ)` the interleaved
//! order `x₁, y₁, ..., xₙ, yₙ` gives O(n) nodes, while `x₁, ..., xₙ, y₁, ..., yₙ`
//! gives O(2ⁿ). Finding the optimal order is NP-complete, so a *static* order
//! is planned from the clause structure before any node is built.
//!
//! # Heuristics
//!
//! - [`NaturalOrder`]: variables in DIMACS numbering. Baseline.
//! - [`FrequencyOrder`]: most frequently occurring variables first. Variables
//!   that constrain many clauses sit near the root where their decisions
//!   prune the most.
//! - [`ForceDirectedOrder`]: the FORCE heuristic. Clauses act as springs that
//!   pull their variables together: every round, each clause computes its
//!   *center of gravity* (mean position of its variables), then each variable
//!   moves to the mean center of gravity of the clauses it occurs in. The
//!   variables are re-ranked by their new positions, and the ranking after
//!   the last round is the order. The *total span* (the sum over clauses of
//!   the distance between their first and last variable) measures how well
//!   an order keeps clauses together.
//! - [`SuggestedOrder`]: an order supplied in the input file (`c order ...`).
//!
//! # References
//!
//! - F. A. Aloul, I. L. Markov, K. A. Sakallah. "FORCE: A Fast and Easy-To-
//!   Implement Variable-Ordering Heuristic." GLSVLSI 2003.

use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::dimacs::Cnf;
use crate::error::{Error, Result};
use crate::types::{Level, Var};

/// A permutation of the variables `1..=n`: the variable at each level and the
/// level of each variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableOrder {
    vars: Vec<Var>,
    levels: Vec<Level>,
}

impl VariableOrder {
    /// Order placing `vars[0]` at the root.
    ///
    /// # Panics
    ///
    /// Panics if `vars` is not a permutation of `1..=vars.len()`.
    pub fn new(vars: Vec<Var>) -> Self {
        let n = vars.len();
        let mut levels = vec![None; n];
        for (i, &var) in vars.iter().enumerate() {
            assert!(var.index() < n, "Variable {} is out of range 1..={}", var, n);
            assert!(levels[var.index()].is_none(), "Variable {} occurs twice", var);
            levels[var.index()] = Some(Level::new(i));
        }
        let levels = levels.into_iter().flatten().collect();
        Self { vars, levels }
    }

    pub fn identity(n: usize) -> Self {
        Self::new((0..n).map(Var::from_index).collect())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn var_at(&self, level: Level) -> Var {
        self.vars[level.index()]
    }

    pub fn level_of(&self, var: Var) -> Level {
        self.levels[var.index()]
    }

    /// Variables from the root downwards.
    pub fn vars(&self) -> &[Var] {
        &self.vars
    }

    /// Sum over clauses of the level distance between their outermost
    /// variables.
    pub fn total_span(&self, cnf: &Cnf) -> usize {
        cnf.clauses
            .iter()
            .filter_map(|clause| {
                let levels = clause.iter().map(|lit| self.level_of(lit.var()).index());
                let min = levels.clone().min()?;
                let max = levels.max()?;
                Some(max - min)
            })
            .sum()
    }
}

impl fmt::Display for VariableOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, var) in self.vars.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", var)?;
        }
        write!(f, "]")
    }
}

/// A strategy producing a variable order for a formula.
pub trait OrderingHeuristic {
    fn name(&self) -> &'static str;

    fn plan(&self, cnf: &Cnf) -> VariableOrder;
}

#[derive(Debug, Copy, Clone, Default)]
pub struct NaturalOrder;

impl OrderingHeuristic for NaturalOrder {
    fn name(&self) -> &'static str {
        "natural"
    }

    fn plan(&self, cnf: &Cnf) -> VariableOrder {
        VariableOrder::identity(cnf.num_vars)
    }
}

/// Descending occurrence count; ties broken by ascending variable id.
#[derive(Debug, Copy, Clone, Default)]
pub struct FrequencyOrder;

impl FrequencyOrder {
    fn ranking(cnf: &Cnf) -> Vec<Var> {
        let mut vars: Vec<Var> = cnf.vars().collect();
        vars.sort_by_key(|&v| (Reverse(cnf.frequency(v)), v));
        vars
    }
}

impl OrderingHeuristic for FrequencyOrder {
    fn name(&self) -> &'static str {
        "frequency"
    }

    fn plan(&self, cnf: &Cnf) -> VariableOrder {
        VariableOrder::new(Self::ranking(cnf))
    }
}

/// The FORCE heuristic, seeded with the frequency order.
#[derive(Debug, Copy, Clone)]
pub struct ForceDirectedOrder {
    pub rounds: usize,
}

impl Default for ForceDirectedOrder {
    fn default() -> Self {
        Self { rounds: 100 }
    }
}

impl OrderingHeuristic for ForceDirectedOrder {
    fn name(&self) -> &'static str {
        "force"
    }

    fn plan(&self, cnf: &Cnf) -> VariableOrder {
        let n = cnf.num_vars;

        // Distinct variable indices of each non-empty clause.
        let hyperedges: Vec<Vec<usize>> = cnf
            .clauses
            .iter()
            .map(|clause| {
                let mut vars: Vec<usize> = clause.iter().map(|lit| lit.var().index()).collect();
                vars.sort_unstable();
                vars.dedup();
                vars
            })
            .filter(|vars| !vars.is_empty())
            .collect();

        let mut ranking = FrequencyOrder::ranking(cnf);

        for round in 0..self.rounds {
            let mut position = vec![0.0f64; n];
            for (i, var) in ranking.iter().enumerate() {
                position[var.index()] = i as f64;
            }

            let mut sum = vec![0.0f64; n];
            let mut degree = vec![0usize; n];
            for edge in &hyperedges {
                let cog = edge.iter().map(|&v| position[v]).sum::<f64>() / edge.len() as f64;
                for &v in edge {
                    sum[v] += cog;
                    degree[v] += 1;
                }
            }

            // Ties keep the previous relative order.
            let mut next: Vec<(f64, usize, Var)> = ranking
                .iter()
                .enumerate()
                .map(|(rank, &var)| {
                    let v = var.index();
                    let target = if degree[v] > 0 {
                        sum[v] / degree[v] as f64
                    } else {
                        position[v]
                    };
                    (target, rank, var)
                })
                .collect();
            next.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            let next: Vec<Var> = next.into_iter().map(|(_, _, var)| var).collect();

            if next == ranking {
                debug!("FORCE reached a fixed point after {} rounds", round);
                break;
            }
            ranking = next;
        }

        let order = VariableOrder::new(ranking);
        debug!("FORCE total span: {}", order.total_span(cnf));
        order
    }
}

/// The order given by `c order` comments, completed with the remaining
/// variables in frequency order. Falls back to the frequency order when the
/// input carries no suggestion.
#[derive(Debug, Copy, Clone, Default)]
pub struct SuggestedOrder;

impl OrderingHeuristic for SuggestedOrder {
    fn name(&self) -> &'static str {
        "suggested"
    }

    fn plan(&self, cnf: &Cnf) -> VariableOrder {
        let Some(suggested) = &cnf.suggested_order else {
            debug!("No suggested order, using frequency order");
            return FrequencyOrder.plan(cnf);
        };

        let mut placed = vec![false; cnf.num_vars];
        let mut vars = Vec::with_capacity(cnf.num_vars);
        for &var in suggested.iter().chain(FrequencyOrder::ranking(cnf).iter()) {
            if var.index() < cnf.num_vars && !placed[var.index()] {
                placed[var.index()] = true;
                vars.push(var);
            }
        }
        VariableOrder::new(vars)
    }
}

/// Selectable ordering heuristic.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OrderStrategy {
    Natural,
    Frequency,
    ForceDirected { rounds: usize },
    Suggested,
}

impl Default for OrderStrategy {
    fn default() -> Self {
        OrderStrategy::Frequency
    }
}

impl OrderingHeuristic for OrderStrategy {
    fn name(&self) -> &'static str {
        match self {
            OrderStrategy::Natural => NaturalOrder.name(),
            OrderStrategy::Frequency => FrequencyOrder.name(),
            OrderStrategy::ForceDirected { .. } => ForceDirectedOrder::default().name(),
            OrderStrategy::Suggested => SuggestedOrder.name(),
        }
    }

    fn plan(&self, cnf: &Cnf) -> VariableOrder {
        match *self {
            OrderStrategy::Natural => NaturalOrder.plan(cnf),
            OrderStrategy::Frequency => FrequencyOrder.plan(cnf),
            OrderStrategy::ForceDirected { rounds } => ForceDirectedOrder { rounds }.plan(cnf),
            OrderStrategy::Suggested => SuggestedOrder.plan(cnf),
        }
    }
}

impl fmt::Display for OrderStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStrategy::ForceDirected { rounds } => write!(f, "force:{}", rounds),
            other => write!(f, "{}", other.name()),
        }
    }
}

impl FromStr for OrderStrategy {
    type Err = Error;

    /// Accepts `natural`, `frequency`, `suggested`, `force` and `force:<rounds>`.
    fn from_str(s: &str) -> Result<Self> {
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s, None),
        };
        match (name.to_ascii_lowercase().as_str(), arg) {
            ("natural", None) => Ok(OrderStrategy::Natural),
            ("frequency", None) => Ok(OrderStrategy::Frequency),
            ("suggested", None) => Ok(OrderStrategy::Suggested),
            ("force", None) => Ok(OrderStrategy::ForceDirected {
                rounds: ForceDirectedOrder::default().rounds,
            }),
            ("force", Some(rounds)) => rounds
                .parse()
                .map(|rounds| OrderStrategy::ForceDirected { rounds })
                .map_err(|_| Error::parse(format!("invalid number of rounds '{}'", rounds))),
            _ => Err(Error::parse(format!("unknown order strategy '{}'", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn vars(ids: &[u32]) -> Vec<Var> {
        ids.iter().copied().map(Var::new).collect()
    }

    #[test]
    fn test_variable_order() {
        let order = VariableOrder::new(vars(&[3, 1, 2]));
        assert_eq!(order.len(), 3);
        assert_eq!(order.var_at(Level::new(0)), Var::new(3));
        assert_eq!(order.level_of(Var::new(3)), Level::new(0));
        assert_eq!(order.level_of(Var::new(2)), Level::new(2));
        assert_eq!(order.to_string(), "[x3, x1, x2]");
        assert!(VariableOrder::identity(0).is_empty());
    }

    #[test]
    #[should_panic(expected = "occurs twice")]
    fn test_not_a_permutation() {
        VariableOrder::new(vars(&[1, 1, 2]));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range() {
        VariableOrder::new(vars(&[1, 4, 2]));
    }

    #[test]
    fn test_natural_order() {
        let cnf = Cnf::from_clauses(3, vec![vec![3, 2]]);
        assert_eq!(NaturalOrder.plan(&cnf).vars(), vars(&[1, 2, 3]).as_slice());
    }

    #[test]
    fn test_frequency_order() {
        // x3: 3 occurrences, x1: 2, x2 and x4: 1 each, x5: none.
        let cnf = Cnf::from_clauses(5, vec![vec![3, 1], vec![-3, 4], vec![3, -1, 2]]);
        let order = FrequencyOrder.plan(&cnf);
        assert_eq!(order.vars(), vars(&[3, 1, 2, 4, 5]).as_slice());
    }

    #[test]
    fn test_force_reduces_span() {
        // Chain x1-x5, x5-x2, x2-x4, x4-x3: natural order has span 3+3+2+1 = 9.
        let cnf = Cnf::from_clauses(5, vec![vec![1, 5], vec![5, 2], vec![2, 4], vec![4, 3]]);
        let natural = NaturalOrder.plan(&cnf);
        let force = ForceDirectedOrder::default().plan(&cnf);
        assert_eq!(natural.total_span(&cnf), 9);
        assert!(force.total_span(&cnf) <= FrequencyOrder.plan(&cnf).total_span(&cnf));
        assert!(force.total_span(&cnf) < natural.total_span(&cnf));
        assert_eq!(force.len(), 5);
    }

    #[test]
    fn test_force_single_round() {
        // Frequency order [x3, x1, x2] puts x3 at 0, x1 at 1, x2 at 2.
        // Centers of gravity: (x1 x3) = 0.5, (x3 x2) = 1.0.
        // New positions: x1 = 0.5, x3 = 0.75, x2 = 1.0.
        let cnf = Cnf::from_clauses(3, vec![vec![1, 3], vec![3, 2]]);
        assert_eq!(FrequencyOrder.plan(&cnf).vars(), vars(&[3, 1, 2]).as_slice());

        let order = ForceDirectedOrder { rounds: 1 }.plan(&cnf);
        assert_eq!(order.vars(), vars(&[1, 3, 2]).as_slice());

        // Second round: centers 0.5 and 1.5 give x1 = 0.5, x3 = 1.0, x2 = 1.5,
        // the same ranking, so more rounds change nothing.
        let order = ForceDirectedOrder::default().plan(&cnf);
        assert_eq!(order.vars(), vars(&[1, 3, 2]).as_slice());
    }

    #[test]
    fn test_force_returns_last_round_even_if_wider() {
        let cnf = Cnf::from_clauses(5, vec![vec![3, 1], vec![4, 5], vec![3, 4], vec![2, 1, 5]]);
        let seed = FrequencyOrder.plan(&cnf);
        assert_eq!(seed.vars(), vars(&[1, 3, 4, 5, 2]).as_slice());
        assert_eq!(seed.total_span(&cnf), 7);

        // Centers of gravity: (x3 x1) = 0.5, (x4 x5) = 2.5, (x3 x4) = 1.5,
        // (x2 x1 x5) = 7/3. New positions: x3 = 1.0, x1 = 17/12, x4 = 2.0,
        // x2 = 7/3, x5 = 29/12.
        let order = ForceDirectedOrder { rounds: 1 }.plan(&cnf);
        assert_eq!(order.vars(), vars(&[3, 1, 4, 2, 5]).as_slice());
        assert_eq!(order.total_span(&cnf), 8);
    }

    #[test]
    fn test_force_without_rounds_is_frequency() {
        let cnf = Cnf::from_clauses(4, vec![vec![4, 1], vec![4, -2], vec![3, 1]]);
        let order = ForceDirectedOrder { rounds: 0 }.plan(&cnf);
        assert_eq!(order, FrequencyOrder.plan(&cnf));
    }

    #[test]
    fn test_suggested_order() {
        let mut cnf = Cnf::from_clauses(4, vec![vec![1, 2], vec![2, 3]]);
        assert_eq!(SuggestedOrder.plan(&cnf), FrequencyOrder.plan(&cnf));

        cnf.suggested_order = Some(vars(&[4, 1, 4]));
        let order = SuggestedOrder.plan(&cnf);
        assert_eq!(order.vars(), vars(&[4, 1, 2, 3]).as_slice());
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("natural".parse::<OrderStrategy>().unwrap(), OrderStrategy::Natural);
        assert_eq!("Frequency".parse::<OrderStrategy>().unwrap(), OrderStrategy::Frequency);
        assert_eq!(
            "force".parse::<OrderStrategy>().unwrap(),
            OrderStrategy::ForceDirected { rounds: 100 }
        );
        assert_eq!(
            "force:7".parse::<OrderStrategy>().unwrap(),
            OrderStrategy::ForceDirected { rounds: 7 }
        );
        assert!("force:many".parse::<OrderStrategy>().is_err());
        assert!("random".parse::<OrderStrategy>().is_err());
        assert_eq!(OrderStrategy::ForceDirected { rounds: 7 }.to_string(), "force:7");
        assert_eq!(OrderStrategy::Suggested.to_string(), "suggested");
    }
}
