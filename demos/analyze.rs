use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;

use confspace::analysis::{analyze_file, AnalysisConfig, AnalysisReport};
use confspace::bdd::BddConfig;
use confspace::dimacs::{LoaderOptions, DEFAULT_MAX_VARS};
use confspace::order::OrderStrategy;
use confspace::types::Var;

#[derive(Debug, Parser)]
#[command(author, version, about = "Configuration-space analysis of DIMACS feature models")]
struct Cli {
    /// Input files or directories (searched for *.cnf and *.dimacs)
    #[arg(value_name = "PATH", required = true)]
    inputs: Vec<PathBuf>,

    /// Variable order: natural, frequency, force[:<rounds>] or suggested
    #[arg(short, long, default_value = "frequency")]
    order: OrderStrategy,

    /// Clauses conjoined per batch
    #[arg(long, value_name = "INT", default_value = "100")]
    batch_size: usize,

    /// Number of distinct samples to draw
    #[arg(short = 'n', long, value_name = "INT", default_value = "10000")]
    samples: usize,

    /// Sampling attempt budget (default: 20 * samples + 100)
    #[arg(long, value_name = "INT")]
    budget: Option<usize>,

    /// Variable whose k1/k0 ratio is reported
    #[arg(long, value_name = "VAR", default_value = "42")]
    var: u32,

    /// Number of most frequent variables for pairwise interactions
    #[arg(long, value_name = "INT", default_value = "50")]
    pairs_limit: usize,

    /// Seed for the sampler
    #[arg(long, value_name = "INT")]
    seed: Option<u64>,

    /// Node table capacity (in bits, so the actual capacity is `2^size` nodes)
    #[arg(long, value_name = "INT", default_value = "26")]
    size: usize,

    /// Trust the header's variable count and drop literals beyond it
    #[arg(long)]
    trust_header: bool,

    /// Largest accepted variable count; literals beyond it are dropped
    #[arg(long, value_name = "INT", default_value_t = DEFAULT_MAX_VARS)]
    max_vars: usize,

    /// Print one JSON report per line instead of text
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn config(&self) -> Result<AnalysisConfig> {
        if self.var == 0 || self.var > Var::MAX_ID {
            bail!("Variable IDs must be in 1..={}", Var::MAX_ID);
        }
        let Some(bdd) = BddConfig::default().with_max_nodes_bits(self.size) else {
            bail!("--size {} is too large, the capacity 2^size must fit in a usize", self.size);
        };
        let mut config = AnalysisConfig::default()
            .with_order(self.order)
            .with_batch_size(self.batch_size)
            .with_sample_count(self.samples)
            .with_designated_var(Var::new(self.var))
            .with_interaction_limit(self.pairs_limit)
            .with_bdd(bdd)
            .with_loader(LoaderOptions {
                widen_to_observed: !self.trust_header,
                max_vars: self.max_vars,
            });
        if let Some(budget) = self.budget {
            config = config.with_sample_budget(budget);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        Ok(config)
    }
}

fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found = Vec::new();
            for entry in fs::read_dir(input).wrap_err_with(|| format!("reading {:?}", input))? {
                let path = entry?.path();
                if matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("cnf" | "dimacs")
                ) {
                    found.push(path);
                }
            }
            found.sort();
            if found.is_empty() {
                log::warn!("No DIMACS files found in {:?}", input);
            }
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

fn print_report(report: &AnalysisReport) {
    println!("File: {}", report.file.as_deref().unwrap_or("-"));
    println!(
        "  variables = {}, clauses = {}, diagnostics = {}, order = {}",
        report.num_vars, report.num_clauses, report.diagnostics, report.order
    );
    println!("(i)   BDD nodes: {}", report.node_count);
    println!("(ii)  |V|: {}", report.valid_configuration_count);
    println!("      ~ {}", report.valid_configuration_count.to_scientific(6));
    println!(
        "(iii) Ratio k1/k0: {} ({} of {} samples)",
        report.sample_ratio, report.samples_obtained, report.samples_requested
    );
    println!("(iv)  Pairwise interactions: {}", report.pairwise_interaction_count);
    println!("(v)   |B|: {}", report.cover_set_size);
    println!(
        "  build: {} batches, peak {} live nodes",
        report.build.batches, report.build.peak_live_nodes
    );
    println!(
        "  time: order {:.2}s, build {:.2}s, metrics {:.2}s, sampling {:.2}s, interactions {:.2}s, cover {:.2}s, total {:.2}s",
        report.timings.order,
        report.timings.build,
        report.timings.metrics,
        report.timings.sampling,
        report.timings.interactions,
        report.timings.cover,
        report.timings.total
    );
    println!("---");
}

fn run(path: &Path, config: &AnalysisConfig, json: bool) -> Result<()> {
    let report = analyze_file(path, config).wrap_err_with(|| format!("analyzing {:?}", path))?;
    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;

    let cli = Cli::parse();
    let config = cli.config()?;
    log::info!("config = {:?}", config);

    let files = collect_inputs(&cli.inputs)?;
    let mut failed = 0;
    for path in &files {
        // One bad input must not stop the batch.
        if let Err(e) = run(path, &config, cli.json) {
            failed += 1;
            log::error!("{:?}", e);
        }
    }

    if failed > 0 {
        bail!("{} of {} inputs failed", failed, files.len());
    }
    Ok(())
}
