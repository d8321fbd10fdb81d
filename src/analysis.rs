//! End-to-end analysis of one feature model.

use std::path::Path;
use std::time::Instant;

use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::bdd::{Bdd, BddConfig};
use crate::builder::{BuildStats, DiagramBuilder, DEFAULT_BATCH_SIZE};
use crate::cover::CoverBuilder;
use crate::dimacs::{load_dimacs, Cnf, LoaderOptions};
use crate::error::Result;
use crate::interaction::{top_variables, InteractionUniverse, DEFAULT_INTERACTION_LIMIT};
use crate::metrics::{Metrics, ModelCount};
use crate::order::{OrderStrategy, OrderingHeuristic};
use crate::sampler::{default_budget, SampleRatio, Sampler};
use crate::types::Var;

/// Knobs of the whole pipeline.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub loader: LoaderOptions,
    pub bdd: BddConfig,
    pub order: OrderStrategy,
    pub batch_size: usize,
    /// Number of distinct samples to draw.
    pub sample_count: usize,
    /// Attempt budget for sampling; `20 * sample_count + 100` if unset.
    pub sample_budget: Option<usize>,
    /// Variable whose `k1/k0` ratio is reported.
    pub designated_var: Var,
    pub interaction_limit: usize,
    /// Seed for sampling; drawn from the OS if unset.
    pub seed: Option<u64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            loader: LoaderOptions::default(),
            bdd: BddConfig::default(),
            order: OrderStrategy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            sample_count: 10_000,
            sample_budget: None,
            designated_var: Var::new(42),
            interaction_limit: DEFAULT_INTERACTION_LIMIT,
            seed: None,
        }
    }
}

impl AnalysisConfig {
    pub fn with_order(mut self, order: OrderStrategy) -> Self {
        self.order = order;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_sample_count(mut self, sample_count: usize) -> Self {
        self.sample_count = sample_count;
        self
    }

    pub fn with_sample_budget(mut self, budget: usize) -> Self {
        self.sample_budget = Some(budget);
        self
    }

    pub fn with_designated_var(mut self, var: Var) -> Self {
        self.designated_var = var;
        self
    }

    pub fn with_interaction_limit(mut self, limit: usize) -> Self {
        self.interaction_limit = limit;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_bdd(mut self, bdd: BddConfig) -> Self {
        self.bdd = bdd;
        self
    }

    pub fn with_loader(mut self, loader: LoaderOptions) -> Self {
        self.loader = loader;
        self
    }
}

/// Wall-clock seconds spent in each stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTimings {
    pub order: f64,
    pub build: f64,
    pub metrics: f64,
    pub sampling: f64,
    pub interactions: f64,
    pub cover: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub file: Option<String>,
    pub num_vars: usize,
    pub num_clauses: usize,
    pub diagnostics: usize,
    pub order: String,
    pub node_count: u64,
    pub valid_configuration_count: ModelCount,
    pub sample_ratio: SampleRatio,
    pub samples_obtained: usize,
    pub samples_requested: usize,
    pub pairwise_interaction_count: usize,
    pub cover_set_size: usize,
    pub build: BuildStats,
    pub timings: StageTimings,
}

impl AnalysisReport {
    pub fn is_unsat(&self) -> bool {
        self.valid_configuration_count.is_zero()
    }
}

fn lap(clock: &mut Instant) -> f64 {
    let secs = clock.elapsed().as_secs_f64();
    *clock = Instant::now();
    secs
}

/// Run the full pipeline on a loaded formula.
///
/// A fresh manager is created for the formula and dropped on return, so
/// nothing carries over between inputs.
pub fn analyze(cnf: &Cnf, config: &AnalysisConfig) -> Result<AnalysisReport> {
    let start = Instant::now();
    let mut clock = Instant::now();
    let mut timings = StageTimings::default();

    let order = config.order.plan(cnf);
    timings.order = lap(&mut clock);
    info!("Planned {} order over {} variables", config.order, order.len());

    let bdd = Bdd::new(&order, config.bdd.clone());
    let built = DiagramBuilder::new(&bdd)
        .with_batch_size(config.batch_size)
        .build(cnf)?;
    let root = built.root;
    timings.build = lap(&mut clock);

    let metrics = Metrics::compute(&bdd, root);
    timings.metrics = lap(&mut clock);
    info!(
        "node_count = {}, valid_configuration_count = {}",
        metrics.node_count,
        metrics.model_count.to_scientific(6)
    );

    let rng = match config.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    let mut sampler = Sampler::new(&bdd, rng);
    let budget = config
        .sample_budget
        .unwrap_or_else(|| default_budget(config.sample_count));
    let samples = sampler.sample_distinct(root, config.sample_count, budget);
    let sample_ratio = SampleRatio::from_samples(&samples.samples, config.designated_var);
    timings.sampling = lap(&mut clock);
    info!(
        "Sampled {}/{} configurations, ratio k1/k0 for {} = {}",
        samples.len(),
        samples.requested,
        config.designated_var,
        sample_ratio
    );

    let vars = top_variables(cnf, config.interaction_limit);
    let universe = InteractionUniverse::compute(&bdd, root, &vars);
    let pairwise_interaction_count = universe.count();
    timings.interactions = lap(&mut clock);

    let cover = CoverBuilder::new(&bdd, &mut sampler).build(root, universe);
    timings.cover = lap(&mut clock);
    timings.total = start.elapsed().as_secs_f64();

    Ok(AnalysisReport {
        file: None,
        num_vars: cnf.num_vars,
        num_clauses: cnf.num_clauses(),
        diagnostics: cnf.diagnostics.len(),
        order: config.order.to_string(),
        node_count: metrics.node_count,
        valid_configuration_count: metrics.model_count,
        sample_ratio,
        samples_obtained: samples.len(),
        samples_requested: samples.requested,
        pairwise_interaction_count,
        cover_set_size: cover.len(),
        build: built.stats,
        timings,
    })
}

/// Load a DIMACS file and analyze it.
pub fn analyze_file(path: impl AsRef<Path>, config: &AnalysisConfig) -> Result<AnalysisReport> {
    let path = path.as_ref();
    info!("Analyzing {}", path.display());
    let cnf = load_dimacs(path, &config.loader)?;
    let mut report = analyze(&cnf, config)?;
    report.file = Some(path.display().to_string());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::error::Error;

    fn config() -> AnalysisConfig {
        AnalysisConfig::default()
            .with_sample_count(20)
            .with_designated_var(Var::new(1))
            .with_seed(42)
    }

    #[test]
    fn test_worked_example() {
        let cnf = Cnf::from_clauses(2, vec![vec![1, 2], vec![-1, -2]]);
        let report = analyze(&cnf, &config()).unwrap();

        assert_eq!(report.valid_configuration_count.to_string(), "2");
        assert_eq!(report.pairwise_interaction_count, 2);
        assert_eq!(report.cover_set_size, 2);
        assert!(report.node_count > 0);
        assert_eq!(report.samples_obtained, 2);
        assert_eq!(report.samples_requested, 20);
        assert_eq!(report.sample_ratio, SampleRatio::Ratio { ones: 1, zeros: 1 });
        assert!(!report.is_unsat());
    }

    #[test]
    fn test_unsat_is_vacuous() {
        let cnf = Cnf::from_clauses(3, vec![vec![1, 2], vec![-1], vec![-2]]);
        let report = analyze(&cnf, &config()).unwrap();

        assert!(report.is_unsat());
        assert_eq!(report.node_count, 1);
        assert_eq!(report.samples_obtained, 0);
        assert_eq!(report.sample_ratio, SampleRatio::NotApplicable);
        assert_eq!(report.pairwise_interaction_count, 0);
        assert_eq!(report.cover_set_size, 0);
    }

    #[test]
    fn test_designated_var_out_of_range() {
        let cnf = Cnf::from_clauses(3, vec![vec![1, 2, 3]]);
        let config = config().with_designated_var(Var::new(42));
        let report = analyze(&cnf, &config).unwrap();
        assert_eq!(report.sample_ratio.to_string(), "N/A");
        assert_eq!(report.samples_obtained, 7);
    }

    #[test]
    fn test_resource_exhausted() {
        let clauses = (1..30).map(|i| vec![i, -(i + 1), i + 2]).collect::<Vec<_>>();
        let cnf = Cnf::from_clauses(31, clauses);
        let config = config().with_bdd(BddConfig::default().with_max_nodes(10));
        assert!(matches!(
            analyze(&cnf, &config),
            Err(Error::ResourceExhausted { capacity: 10 })
        ));
    }

    #[test]
    fn test_missing_file() {
        let res = analyze_file("/nonexistent/model.dimacs", &config());
        assert!(matches!(res, Err(Error::Io(_))));
    }

    #[test]
    fn test_report_json() {
        let cnf = Cnf::from_clauses(2, vec![vec![1, 2], vec![-1, -2]]);
        let report = analyze(&cnf, &config()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["valid_configuration_count"], "2");
        assert_eq!(json["sample_ratio"], "1/1");
        assert_eq!(json["order"], "frequency");
        assert_eq!(json["build"]["clauses"], 2);
    }
}
