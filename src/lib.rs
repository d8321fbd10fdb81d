//! # confspace: configuration-space analysis of feature models
//!
//! A feature model with N features is a CNF formula over N Boolean variables.
//! Its valid configurations are the formula's models. `confspace` compiles the
//! formula into a reduced, ordered **Binary Decision Diagram** and answers:
//!
//! - how large the diagram is (`node_count`);
//! - how many valid configurations exist, exactly (`valid_configuration_count`);
//! - what a uniform random sample of valid configurations looks like;
//! - how many pairwise feature-value combinations are feasible;
//! - which small set of configurations covers all of those pairs.
//!
//! ## Pipeline
//!
//! ```text
//! dimacs → order → builder → { metrics, sampler, interaction } → cover
//! ```
//!
//! [`analysis::analyze`] runs all stages and returns an
//! [`AnalysisReport`][analysis::AnalysisReport].
//!
//! ## Basic Usage
//!
//! ```rust
//! use confspace::analysis::{analyze, AnalysisConfig};
//! use confspace::dimacs::{parse_dimacs_str, LoaderOptions};
//!
//! // Exactly one of x1, x2.
//! let cnf = parse_dimacs_str("p cnf 2 2\n1 2 0\n-1 -2 0\n", &LoaderOptions::default()).unwrap();
//! let report = analyze(&cnf, &AnalysisConfig::default().with_seed(1)).unwrap();
//!
//! assert_eq!(report.valid_configuration_count.to_string(), "2");
//! assert_eq!(report.pairwise_interaction_count, 2);
//! assert_eq!(report.cover_set_size, 2);
//! ```
//!
//! ## The decision-diagram manager
//!
//! All diagram operations go through the [`Bdd`][crate::bdd::Bdd] manager,
//! which owns every node. Nodes are hash-consed and use complement edges, so
//! two [`Ref`][crate::reference::Ref] handles denote the same function iff
//! they are equal. Variables are 1-indexed as in DIMACS and are placed at
//! levels according to a [`VariableOrder`][crate::order::VariableOrder] fixed
//! when the manager is created.

pub mod analysis;
pub mod bdd;
pub mod builder;
pub mod cache;
pub mod cover;
pub mod dimacs;
pub mod error;
pub mod interaction;
pub mod metrics;
pub mod node;
pub mod order;
pub mod reference;
pub mod sampler;
pub mod sat;
pub mod table;
pub mod types;
pub mod utils;
