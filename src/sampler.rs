//! Uniform random sampling of valid configurations.
//!
//! A path from the root to the `1` terminal fixes only the variables it tests;
//! every other variable is a *don't-care*. Picking branches 50/50 would make
//! short paths (many don't-cares, many configurations) as likely as long ones.
//! Instead, at each node the high branch is taken with probability
//!
//! ```text
//! count(high) / (count(low) + count(high))
//! ```
//!
//! where `count` is the number of full assignments satisfying a node, and
//! don't-cares get independent fair bits. Every valid configuration is then
//! drawn with probability exactly `1 / count(root)`. The coin is exact: the
//! draw is a uniform big integer below the sum, not a floating-point ratio.
//!
//! [`Sampler::sample_under`] conditions on a few forced literals without
//! building `root ∧ lits`: the descent follows the forced branch at an assumed
//! variable and weighs the other branches by counts under the assumptions.

use std::collections::{HashMap, HashSet};
use std::fmt;

use log::{debug, warn};
use num_bigint::{BigUint, RandBigInt};
use rand::Rng;
use serde::{Serialize, Serializer};

use crate::bdd::Bdd;
use crate::reference::Ref;
use crate::sat::{Assumptions, ModelCounter};
use crate::types::{Lit, Var};

/// A total assignment: `values[v - 1]` is the value of variable `v`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Configuration(Vec<bool>);

impl Configuration {
    pub fn new(values: Vec<bool>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value of `var`, or `None` if it is beyond this configuration.
    pub fn get(&self, var: Var) -> Option<bool> {
        self.0.get(var.index()).copied()
    }

    pub fn satisfies(&self, lit: Lit) -> bool {
        self.get(lit.var()) == Some(lit.is_positive())
    }

    pub fn values(&self) -> &[bool] {
        &self.0
    }

    /// All variables as literals, in variable order.
    pub fn literals(&self) -> impl Iterator<Item = Lit> + '_ {
        self.0
            .iter()
            .enumerate()
            .map(|(i, &value)| Var::from_index(i).lit(value))
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &value in &self.0 {
            write!(f, "{}", if value { '1' } else { '0' })?;
        }
        Ok(())
    }
}

/// Default attempt budget for collecting `k` distinct samples.
pub fn default_budget(k: usize) -> usize {
    20 * k + 100
}

/// Result of [`Sampler::sample_distinct`].
#[derive(Debug, Clone)]
pub struct SampleSet {
    pub requested: usize,
    pub attempts: usize,
    /// Distinct configurations, in the order they were drawn.
    pub samples: Vec<Configuration>,
}

impl SampleSet {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.samples.len() >= self.requested
    }
}

pub struct Sampler<'a, R> {
    bdd: &'a Bdd,
    counter: ModelCounter<'a>,
    rng: R,
}

impl<'a, R: Rng> Sampler<'a, R> {
    pub fn new(bdd: &'a Bdd, rng: R) -> Self {
        Self {
            bdd,
            counter: ModelCounter::new(bdd),
            rng,
        }
    }

    pub fn bdd(&self) -> &'a Bdd {
        self.bdd
    }

    /// Number of valid configurations of `node` (memoized).
    pub fn count(&mut self, node: Ref) -> BigUint {
        self.counter.count(node)
    }

    /// Draw one configuration uniformly from the models of `root`.
    ///
    /// Returns `None` if `root` is unsatisfiable.
    pub fn sample(&mut self, root: Ref) -> Option<Configuration> {
        self.sample_under(root, &[])
    }

    /// Draw one configuration uniformly from the models of `root ∧ lits`.
    ///
    /// Allocates no nodes. Returns `None` if there is no such model, which
    /// includes contradictory `lits`.
    pub fn sample_under(&mut self, root: Ref, lits: &[Lit]) -> Option<Configuration> {
        let assumptions = Assumptions::new(self.bdd, lits)?;
        let mut memo = HashMap::new();
        if self.counter.count_under_with(root, &assumptions, &mut memo) == BigUint::ZERO {
            return None;
        }

        // Don't-cares keep these fair bits.
        let mut values: Vec<bool> = (0..self.bdd.num_vars()).map(|_| self.rng.gen()).collect();
        for lit in assumptions.literals() {
            values[lit.var().index()] = lit.is_positive();
        }

        let mut current = root;
        while let Some(var) = self.bdd.variable(current) {
            let low = self.bdd.low_node(current);
            let high = self.bdd.high_node(current);

            let pick_high = match assumptions.get(var) {
                Some(value) => value,
                None => {
                    let count_low = self.counter.count_under_with(low, &assumptions, &mut memo);
                    let count_high = self.counter.count_under_with(high, &assumptions, &mut memo);
                    let total = &count_low + &count_high;
                    self.rng.gen_biguint_below(&total) < count_high
                }
            };
            values[var.index()] = pick_high;
            current = if pick_high { high } else { low };
        }
        debug_assert!(self.bdd.is_one(current));

        Some(Configuration(values))
    }

    /// Draw until `k` distinct configurations are collected or `budget`
    /// attempts are spent.
    ///
    /// Stops early once every model of `root` has been seen.
    pub fn sample_distinct(&mut self, root: Ref, k: usize, budget: usize) -> SampleSet {
        let available = self.count(root);
        let target = usize::try_from(&available).map_or(k, |n| n.min(k));

        let mut seen = HashSet::with_capacity(target);
        let mut samples = Vec::with_capacity(target);
        let mut attempts = 0;

        while samples.len() < target && attempts < budget {
            attempts += 1;
            let Some(config) = self.sample(root) else {
                break;
            };
            if seen.insert(config.clone()) {
                samples.push(config);
            }
        }

        if samples.len() < k {
            warn!(
                "Collected {} of {} requested samples in {} attempts",
                samples.len(),
                k,
                attempts
            );
        } else {
            debug!("Collected {} samples in {} attempts", samples.len(), attempts);
        }

        SampleSet {
            requested: k,
            attempts,
            samples,
        }
    }
}

/// How often a designated variable is true among samples: `k1/k0`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SampleRatio {
    Ratio { ones: usize, zeros: usize },
    /// No sample had the variable false.
    Infinite { ones: usize },
    /// The variable is out of range, or there are no samples.
    NotApplicable,
}

impl SampleRatio {
    pub fn from_samples(samples: &[Configuration], var: Var) -> Self {
        if samples.is_empty() || samples.iter().any(|c| var.index() >= c.len()) {
            return SampleRatio::NotApplicable;
        }
        let ones = samples.iter().filter(|c| c.get(var) == Some(true)).count();
        let zeros = samples.len() - ones;
        if zeros == 0 {
            SampleRatio::Infinite { ones }
        } else {
            SampleRatio::Ratio { ones, zeros }
        }
    }

    pub fn value(&self) -> Option<f64> {
        match *self {
            SampleRatio::Ratio { ones, zeros } => Some(ones as f64 / zeros as f64),
            SampleRatio::Infinite { .. } => Some(f64::INFINITY),
            SampleRatio::NotApplicable => None,
        }
    }
}

impl fmt::Display for SampleRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleRatio::Ratio { ones, zeros } => write!(f, "{}/{}", ones, zeros),
            SampleRatio::Infinite { ones } => write!(f, "{}/0 (inf)", ones),
            SampleRatio::NotApplicable => write!(f, "N/A"),
        }
    }
}

impl Serialize for SampleRatio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use test_log::test;

    use super::*;

    fn lits(values: &[i32]) -> Vec<Lit> {
        values.iter().copied().map(Lit::from_dimacs).collect()
    }

    fn sampler(bdd: &Bdd) -> Sampler<'_, ChaCha8Rng> {
        Sampler::new(bdd, ChaCha8Rng::seed_from_u64(42))
    }

    #[test]
    fn test_sample_unsat() {
        let bdd = Bdd::with_num_vars(3);
        let mut sampler = sampler(&bdd);
        assert_eq!(sampler.sample(bdd.zero()), None);

        let set = sampler.sample_distinct(bdd.zero(), 5, default_budget(5));
        assert!(set.is_empty());
        assert!(!set.is_complete());
        assert_eq!(set.attempts, 0);
    }

    #[test]
    fn test_samples_are_models() {
        let bdd = Bdd::with_num_vars(5);
        let a = bdd.clause(&lits(&[1, -2, 3])).unwrap();
        let b = bdd.clause(&lits(&[-1, 4])).unwrap();
        let c = bdd.clause(&lits(&[-4, -5])).unwrap();
        let f = bdd.apply_and(bdd.apply_and(a, b).unwrap(), c).unwrap();

        let mut sampler = sampler(&bdd);
        for _ in 0..200 {
            let config = sampler.sample(f).unwrap();
            assert_eq!(config.len(), 5);
            assert!(bdd.eval(f, config.values()), "{} is not a model", config);
        }
    }

    #[test]
    fn test_sample_distinct_all_models() {
        let bdd = Bdd::with_num_vars(3);
        let f = bdd.clause(&lits(&[1, 2])).unwrap();
        let mut sampler = sampler(&bdd);

        // 6 models over 3 variables; asking for more stops once all are seen.
        let set = sampler.sample_distinct(f, 10, default_budget(10));
        assert_eq!(set.len(), 6);
        assert_eq!(set.requested, 10);
        assert!(!set.is_complete());
        assert!(set.attempts <= default_budget(10));

        let unique: HashSet<_> = set.samples.iter().cloned().collect();
        assert_eq!(unique.len(), 6);
    }

    #[test]
    fn test_sample_distinct_budget() {
        let bdd = Bdd::with_num_vars(8);
        let mut sampler = sampler(&bdd);

        let set = sampler.sample_distinct(bdd.one(), 50, 3);
        assert_eq!(set.attempts, 3);
        assert!(set.len() <= 3);
        assert!(!set.is_complete());

        let set = sampler.sample_distinct(bdd.one(), 5, default_budget(5));
        assert!(set.is_complete());
        assert_eq!(set.len(), 5);
    }

    #[test]
    fn test_uniformity() {
        // x1 ∨ (x2 ∧ x3): 5 of 8 assignments. A 50/50 descent would pick the
        // x1 = 1 half with probability 1/2 instead of 4/5.
        let bdd = Bdd::with_num_vars(3);
        let x1 = bdd.mk_var(Var::new(1)).unwrap();
        let x23 = bdd.cube(&lits(&[2, 3])).unwrap();
        let f = bdd.apply_or(x1, x23).unwrap();

        let mut sampler = sampler(&bdd);
        let draws = 100_000;
        let mut freq: HashMap<Configuration, usize> = HashMap::new();
        for _ in 0..draws {
            *freq.entry(sampler.sample(f).unwrap()).or_default() += 1;
        }

        assert_eq!(freq.len(), 5);
        let expected = draws as f64 / 5.0;
        for (config, &n) in &freq {
            let deviation = (n as f64 - expected).abs() / expected;
            assert!(deviation < 0.03, "{} drawn {} times, expected ~{}", config, n, expected);
        }
    }

    #[test]
    fn test_uniformity_without_dont_cares() {
        // x1 ≡ x2 ∧ x3 ≡ x4: exactly 4 models, every variable tested on every path.
        let bdd = Bdd::with_num_vars(4);
        let x: Vec<Ref> = (1..=4).map(|i| bdd.mk_var(Var::new(i)).unwrap()).collect();
        let e1 = -bdd.apply_xor(x[0], x[1]).unwrap();
        let e2 = -bdd.apply_xor(x[2], x[3]).unwrap();
        let f = bdd.apply_and(e1, e2).unwrap();

        let mut sampler = sampler(&bdd);
        let draws = 100_000;
        let mut freq: HashMap<Configuration, usize> = HashMap::new();
        for _ in 0..draws {
            *freq.entry(sampler.sample(f).unwrap()).or_default() += 1;
        }

        assert_eq!(freq.len(), 4);
        for &n in freq.values() {
            let p = n as f64 / draws as f64;
            assert!((p - 0.25).abs() < 0.01, "p = {}", p);
        }
    }

    #[test]
    fn test_sample_under() {
        // (x1 ∨ x2) ∧ (¬x2 ∨ x3) ∧ (x4 ∨ ¬x1)
        let bdd = Bdd::with_num_vars(5);
        let a = bdd.clause(&lits(&[1, 2])).unwrap();
        let b = bdd.clause(&lits(&[-2, 3])).unwrap();
        let c = bdd.clause(&lits(&[4, -1])).unwrap();
        let f = bdd.apply_and(bdd.apply_and(a, b).unwrap(), c).unwrap();
        let before = bdd.live_nodes();

        let mut sampler = sampler(&bdd);
        for assumed in [lits(&[2, 5]), lits(&[1, -3]), lits(&[4, -2]), lits(&[3])] {
            for _ in 0..50 {
                let config = sampler.sample_under(f, &assumed).unwrap();
                assert!(bdd.eval(f, config.values()), "{} is not a model", config);
                assert!(assumed.iter().all(|&lit| config.satisfies(lit)), "{}", config);
            }
        }

        // ¬x1 forces x2, which forces x3.
        assert_eq!(sampler.sample_under(f, &lits(&[-1, -2])), None);
        assert_eq!(sampler.sample_under(f, &lits(&[-1, -3])), None);
        assert_eq!(sampler.sample_under(f, &lits(&[3, -3])), None);
        assert_eq!(sampler.sample_under(bdd.zero(), &lits(&[1])), None);
        assert_eq!(bdd.live_nodes(), before);
    }

    #[test]
    fn test_sample_under_is_uniform() {
        // x1 ∨ (x2 ∧ x3) under x3: the models are 101, 111 and 011.
        let bdd = Bdd::with_num_vars(3);
        let x1 = bdd.mk_var(Var::new(1)).unwrap();
        let x23 = bdd.cube(&lits(&[2, 3])).unwrap();
        let f = bdd.apply_or(x1, x23).unwrap();

        let mut sampler = sampler(&bdd);
        let draws = 60_000;
        let mut freq: HashMap<Configuration, usize> = HashMap::new();
        for _ in 0..draws {
            *freq.entry(sampler.sample_under(f, &lits(&[3])).unwrap()).or_default() += 1;
        }

        assert_eq!(freq.len(), 3);
        for (config, &n) in &freq {
            let p = n as f64 / draws as f64;
            assert!((p - 1.0 / 3.0).abs() < 0.015, "{}: p = {}", config, p);
        }
    }

    #[test]
    fn test_sample_ratio() {
        let configs = |rows: &[&[bool]]| -> Vec<Configuration> {
            rows.iter().map(|r| Configuration::new(r.to_vec())).collect()
        };

        let samples = configs(&[&[true, false], &[true, true], &[false, true]]);
        let ratio = SampleRatio::from_samples(&samples, Var::new(1));
        assert_eq!(ratio, SampleRatio::Ratio { ones: 2, zeros: 1 });
        assert_eq!(ratio.to_string(), "2/1");
        assert_eq!(ratio.value(), Some(2.0));

        let ratio = SampleRatio::from_samples(&samples[1..], Var::new(2));
        assert_eq!(ratio.to_string(), "2/0 (inf)");

        let ratio = SampleRatio::from_samples(&samples, Var::new(42));
        assert_eq!(ratio.to_string(), "N/A");
        assert_eq!(SampleRatio::from_samples(&[], Var::new(1)), SampleRatio::NotApplicable);
    }

    #[test]
    fn test_configuration() {
        let config = Configuration::new(vec![true, false, true]);
        assert_eq!(config.to_string(), "101");
        assert!(config.satisfies(Lit::from_dimacs(-2)));
        assert!(!config.satisfies(Lit::from_dimacs(2)));
        assert!(!config.satisfies(Lit::from_dimacs(4)));
        assert_eq!(config.literals().collect::<Vec<_>>(), lits(&[1, -2, 3]));
    }
}
