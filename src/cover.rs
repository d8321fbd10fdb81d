//! Greedy pairwise cover by sample-and-sweep.
//!
//! Each round takes the smallest uncovered obligation, samples a concrete
//! configuration in which it holds, and removes every obligation that this
//! configuration satisfies. Witnesses are drawn with the two literals forced
//! during the descent, so building a cover allocates no nodes. A random witness usually covers many other pairs
//! as a side effect, which keeps the cover small. There is no optimality
//! guarantee.

use std::collections::BTreeSet;

use log::{debug, info, warn};
use rand::Rng;

use crate::bdd::Bdd;
use crate::interaction::{InteractionUniverse, Obligation};
use crate::reference::Ref;
use crate::sampler::{Configuration, Sampler};

#[derive(Debug, Clone, Default)]
pub struct CoverSet {
    /// Witness configurations, in the order they were chosen.
    pub configurations: Vec<Configuration>,
    /// Obligations for which no witness could be sampled.
    pub dropped: Vec<Obligation>,
}

impl CoverSet {
    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    /// Whether every obligation of `universe` holds in some configuration.
    pub fn covers(&self, universe: &InteractionUniverse) -> bool {
        universe
            .iter()
            .all(|o| self.configurations.iter().any(|c| o.is_satisfied_by(c)))
    }
}

pub struct CoverBuilder<'a, 's, R> {
    bdd: &'a Bdd,
    sampler: &'s mut Sampler<'a, R>,
}

impl<'a, 's, R: Rng> CoverBuilder<'a, 's, R> {
    pub fn new(bdd: &'a Bdd, sampler: &'s mut Sampler<'a, R>) -> Self {
        Self { bdd, sampler }
    }

    /// Cover every obligation of `universe` with models of `root`.
    pub fn build(self, root: Ref, universe: InteractionUniverse) -> CoverSet {
        let mut uncovered: BTreeSet<Obligation> = universe.into_obligations();
        let mut cover = CoverSet::default();

        while let Some(obligation) = uncovered.pop_first() {
            let lits = [obligation.lit_a(), obligation.lit_b()];
            let Some(witness) = self.sampler.sample_under(root, &lits) else {
                warn!("No witness for {}, dropping it", obligation);
                cover.dropped.push(obligation);
                continue;
            };
            debug_assert!(obligation.is_satisfied_by(&witness));
            debug_assert!(self.bdd.eval(root, witness.values()));

            let before = uncovered.len();
            uncovered.retain(|o| !o.is_satisfied_by(&witness));
            debug!(
                "Witness #{} for {} also covers {} others, {} left",
                cover.len() + 1,
                obligation,
                before - uncovered.len(),
                uncovered.len()
            );
            cover.configurations.push(witness);
        }

        info!(
            "Pairwise cover of size {} ({} dropped)",
            cover.len(),
            cover.dropped.len()
        );
        cover
    }
}
