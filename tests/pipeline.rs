use std::io::Write;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use test_log::test;

use confspace::analysis::{analyze, analyze_file, AnalysisConfig};
use confspace::bdd::{Bdd, BddConfig};
use confspace::builder::DiagramBuilder;
use confspace::cover::CoverBuilder;
use confspace::dimacs::{parse_dimacs_str, Cnf, LoaderOptions};
use confspace::interaction::{top_variables, InteractionUniverse};
use confspace::metrics::Metrics;
use confspace::order::{
    ForceDirectedOrder, FrequencyOrder, NaturalOrder, OrderStrategy, OrderingHeuristic,
    SuggestedOrder,
};
use confspace::sampler::Sampler;
use confspace::types::Var;

/// A small product line: a root, an alternative group, an or-group and a few
/// cross-tree constraints.
const PRODUCT_LINE: &str = r#"
c feature 1 Root
c feature 2 Engine
c feature 3 Electric
c feature 4 Diesel
c feature 5 Hybrid
c feature 6 Extras
c feature 7 Radio
c feature 8 Navigation
c feature 9 Camera
c feature 10 Towbar
c order 1 2 3 4 5 6 7 8 9 10
p cnf 10 16
1 0
-2 1 0
2 0
-2 3 4 5 0
-3 -4 0
-3 -5 0
-4 -5 0
-6 1 0
-7 6 0
-8 6 0
-9 6 0
-6 7 8 9 0
-8 7 0
-9 -4 0
-10 -3 0
-10 1 0
"#;

fn load(input: &str) -> Cnf {
    parse_dimacs_str(input, &LoaderOptions::default()).unwrap()
}

fn config() -> AnalysisConfig {
    AnalysisConfig::default()
        .with_sample_count(50)
        .with_designated_var(Var::new(3))
        .with_seed(7)
}

/// Count models by enumerating all assignments.
fn brute_force_count(cnf: &Cnf) -> u64 {
    let n = cnf.num_vars;
    (0u64..1 << n)
        .filter(|bits| {
            cnf.clauses.iter().all(|clause| {
                clause
                    .iter()
                    .any(|lit| ((bits >> lit.var().index()) & 1 == 1) == lit.is_positive())
            })
        })
        .count() as u64
}

#[test]
fn test_worked_example() {
    let cnf = load("p cnf 2 2\n1 2 0\n-1 -2 0\n");
    let report = analyze(&cnf, &config().with_designated_var(Var::new(1))).unwrap();

    assert_eq!(report.valid_configuration_count.to_string(), "2");
    assert_eq!(report.pairwise_interaction_count, 2);
    assert_eq!(report.cover_set_size, 2);
    assert!(report.node_count > 0);
}

#[test]
fn test_count_matches_brute_force() {
    let cnf = load(PRODUCT_LINE);
    let report = analyze(&cnf, &config()).unwrap();
    assert_eq!(
        report.valid_configuration_count.to_string(),
        brute_force_count(&cnf).to_string()
    );
}

#[test]
fn test_count_is_order_invariant() {
    let cnf = load(PRODUCT_LINE);
    let heuristics: Vec<Box<dyn OrderingHeuristic>> = vec![
        Box::new(NaturalOrder),
        Box::new(FrequencyOrder),
        Box::new(ForceDirectedOrder::default()),
        Box::new(SuggestedOrder),
    ];

    let mut counts = Vec::new();
    for heuristic in &heuristics {
        let order = heuristic.plan(&cnf);
        assert_eq!(order.len(), cnf.num_vars, "{}", heuristic.name());
        let bdd = Bdd::new(&order, BddConfig::default());
        let built = DiagramBuilder::new(&bdd).build(&cnf).unwrap();
        counts.push(Metrics::compute(&bdd, built.root).model_count);
    }
    assert!(counts.windows(2).all(|w| w[0] == w[1]), "{:?}", counts);
}

#[test]
fn test_metrics_are_repeatable() {
    let cnf = load(PRODUCT_LINE);
    let order = OrderStrategy::ForceDirected { rounds: 20 }.plan(&cnf);
    let bdd = Bdd::new(&order, BddConfig::default());
    let built = DiagramBuilder::new(&bdd).with_batch_size(4).build(&cnf).unwrap();

    let first = Metrics::compute(&bdd, built.root);
    let second = Metrics::compute(&bdd, built.root);
    assert_eq!(first, second);
    assert_eq!(first.node_count, built.stats.final_node_count);
}

#[test]
fn test_unsat_is_vacuous_everywhere() {
    let input = format!("{}\n3 0\n4 0\n", PRODUCT_LINE.replace("p cnf 10 16", "p cnf 10 18"));
    let cnf = load(&input);
    let report = analyze(&cnf, &config()).unwrap();

    assert!(report.is_unsat());
    assert_eq!(report.valid_configuration_count.to_string(), "0");
    assert_eq!(report.pairwise_interaction_count, 0);
    assert_eq!(report.cover_set_size, 0);
    assert_eq!(report.samples_obtained, 0);
    assert_eq!(report.sample_ratio.to_string(), "N/A");
}

#[test]
fn test_cover_is_complete() {
    let cnf = load(PRODUCT_LINE);
    let bdd = Bdd::new(&FrequencyOrder.plan(&cnf), BddConfig::default());
    let root = DiagramBuilder::new(&bdd).build(&cnf).unwrap().root;

    let universe = InteractionUniverse::compute(&bdd, root, &top_variables(&cnf, 50));
    let mut sampler = Sampler::new(&bdd, ChaCha8Rng::seed_from_u64(11));
    let cover = CoverBuilder::new(&bdd, &mut sampler).build(root, universe.clone());

    assert!(cover.covers(&universe));
    assert!(cover.dropped.is_empty());
    for config in &cover.configurations {
        assert!(bdd.eval(root, config.values()));
    }
}

#[test]
fn test_out_of_range_literal_is_tolerated() {
    let options = LoaderOptions {
        widen_to_observed: false,
        ..LoaderOptions::default()
    };
    let cnf = parse_dimacs_str("p cnf 2 2\n1 2 9 0\n-1 -2 0\n", &options).unwrap();
    assert_eq!(cnf.dropped_literals(), 1);

    let report = analyze(&cnf, &config().with_designated_var(Var::new(1))).unwrap();
    assert_eq!(report.valid_configuration_count.to_string(), "2");
    assert_eq!(report.build.dropped_literals, 1);
}

#[test]
fn test_analyze_file() {
    let path = std::env::temp_dir().join(format!("confspace-{}.dimacs", std::process::id()));
    {
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(PRODUCT_LINE.as_bytes()).unwrap();
    }

    let report = analyze_file(&path, &config()).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(report.file.as_deref(), Some(path.display().to_string().as_str()));
    assert_eq!(report.num_vars, 10);
    assert_eq!(report.num_clauses, 16);
    assert!(report.samples_obtained > 0);
    assert!(report.cover_set_size > 0);
}
