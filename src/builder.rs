//! Folding a CNF formula into a single decision diagram.
//!
//! Conjoining thousands of clauses one after another lets intermediate results
//! grow far beyond the size of the final diagram. The builder instead conjoins
//! clauses in fixed-size batches, each batch on its own, and only then merges
//! the batch result into the running total.

use log::{debug, info};
use serde::Serialize;

use crate::bdd::Bdd;
use crate::dimacs::Cnf;
use crate::error::Result;
use crate::reference::Ref;
use crate::types::Lit;

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Counters collected while building.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    /// Clauses conjoined into the result.
    pub clauses: usize,
    pub batches: usize,
    /// Literals dropped by the loader or skipped because they referenced an
    /// undeclared variable.
    pub dropped_literals: usize,
    /// Largest number of live nodes observed after a batch.
    pub peak_live_nodes: usize,
    pub final_node_count: u64,
}

#[derive(Debug, Clone)]
pub struct Built {
    pub root: Ref,
    /// Index of the batch after which the result became false, if it did.
    pub unsat_at_batch: Option<usize>,
    pub stats: BuildStats,
}

impl Built {
    pub fn is_unsat(&self) -> bool {
        self.unsat_at_batch.is_some()
    }
}

pub struct DiagramBuilder<'a> {
    bdd: &'a Bdd,
    batch_size: usize,
}

impl<'a> DiagramBuilder<'a> {
    pub fn new(bdd: &'a Bdd) -> Self {
        Self {
            bdd,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Clauses per batch; values below 1 are treated as 1.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn build(&self, cnf: &Cnf) -> Result<Built> {
        let bdd = self.bdd;
        let mut stats = BuildStats {
            dropped_literals: cnf.dropped_literals(),
            peak_live_nodes: bdd.live_nodes(),
            ..BuildStats::default()
        };
        let mut total = bdd.one();
        let mut unsat_at_batch = None;

        for (index, batch) in cnf.clauses.chunks(self.batch_size).enumerate() {
            let mut part = bdd.one();
            for clause in batch {
                let literals: Vec<Lit> = clause
                    .iter()
                    .copied()
                    .filter(|lit| lit.var().index() < bdd.num_vars())
                    .collect();
                stats.dropped_literals += clause.len() - literals.len();

                let c = bdd.clause(&literals)?;
                part = bdd.apply_and(part, c)?;
                stats.clauses += 1;
                if bdd.is_zero(part) {
                    break;
                }
            }

            total = bdd.apply_and(total, part)?;
            stats.batches += 1;
            stats.peak_live_nodes = stats.peak_live_nodes.max(bdd.live_nodes());
            debug!(
                "batch {}: {} clauses, size = {}, live = {}",
                index,
                batch.len(),
                bdd.size(total),
                bdd.live_nodes()
            );

            if bdd.is_zero(total) {
                info!("Formula is unsatisfiable (detected at batch {})", index);
                unsat_at_batch = Some(index);
                break;
            }
        }

        stats.final_node_count = bdd.size(total);
        info!(
            "Built diagram of {} nodes from {} clauses in {} batches (peak {} live nodes)",
            stats.final_node_count, stats.clauses, stats.batches, stats.peak_live_nodes
        );

        Ok(Built {
            root: total,
            unsat_at_batch,
            stats,
        })
    }
}
