//! Evo Search - Evolutionary search engine for coverage-driven test generation.
//!
//! This crate evolves a population of candidate solutions toward a set of
//! coverage goals, keeps the best solution found for every goal, and decides
//! when to stop. Several structurally different strategies share one core:
//! dominance ranking, goal archiving, neighbourhood-constrained mating, bloat
//! control, and secondary-objective tie-breaking.
//!
//! # Architecture
//!
//! The crate is split into three modules:
//!
//! - `schema`: Configuration, progress and statistics types
//! - `search`: The engine, its strategies and the shared ranking machinery
//! - `bitcover`: A self-contained bit-pattern coverage problem
//!
//! # Example
//!
//! ```rust,no_run
//! use evo_search::{
//!     bitcover::BitCoverageProblem,
//!     schema::{SearchConfig, StrategyConfig},
//!     search::SearchEngine,
//! };
//!
//! // Create configuration
//! let config = SearchConfig {
//!     strategy: StrategyConfig::MuPlusLambda { lambda: 20 },
//!     ..Default::default()
//! };
//!
//! // Describe the problem: patterns that must appear at given offsets
//! let problem = BitCoverageProblem::new(32).with_target(4, "110011");
//!
//! // Create engine and run search
//! let mut engine = SearchEngine::new(config, problem.build()).unwrap();
//! let result = engine.run().unwrap();
//!
//! println!("Stopped: {:?}, covered {}/{}",
//!     result.stats.stop_reason, result.stats.covered_goals, result.stats.total_goals);
//! ```

pub mod bitcover;
pub mod schema;
pub mod search;

// Re-export commonly used types
pub use schema::{SearchConfig, SearchProgress, SearchStats, StopReason};
pub use search::{SearchEngine, SearchError, SearchProblem, SearchResult};
