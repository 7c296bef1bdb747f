//! Search configuration types.
//!
//! Everything the engine needs to know about a run that is not the problem
//! itself: which strategy to use, how large the population is, how parents are
//! selected, when to stop, and how aggressively to fight bloat.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level configuration for a search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Evolutionary strategy to run.
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Population settings.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Parent selection operator.
    #[serde(default)]
    pub selection: SelectionMethod,
    /// Bloat control settings.
    #[serde(default)]
    pub bloat: BloatConfig,
    /// Tie-breaking chain applied when primary fitness is equal.
    #[serde(default = "default_secondary_objectives")]
    pub secondary_objectives: Vec<SecondaryObjectiveKind>,
    /// Stopping conditions; the search stops when any of them holds.
    #[serde(default = "default_stopping")]
    pub stopping: Vec<StoppingConditionConfig>,
    /// Neighbourhood shape used by spatially constrained strategies.
    #[serde(default)]
    pub neighbourhood: NeighbourhoodShape,
    /// Retry budget for a single crossover or mutation.
    #[serde(default = "default_max_operator_attempts")]
    pub max_operator_attempts: usize,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyConfig::default(),
            population: PopulationConfig::default(),
            selection: SelectionMethod::default(),
            bloat: BloatConfig::default(),
            secondary_objectives: default_secondary_objectives(),
            stopping: default_stopping(),
            neighbourhood: NeighbourhoodShape::default(),
            max_operator_attempts: default_max_operator_attempts(),
            random_seed: None,
        }
    }
}

fn default_secondary_objectives() -> Vec<SecondaryObjectiveKind> {
    vec![SecondaryObjectiveKind::TotalLength]
}
fn default_stopping() -> Vec<StoppingConditionConfig> {
    vec![
        StoppingConditionConfig::MaxGenerations {
            limit: default_max_generations(),
        },
        StoppingConditionConfig::ZeroFitness,
    ]
}
fn default_max_generations() -> usize {
    100
}
fn default_max_operator_attempts() -> usize {
    100
}

/// Strategy selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StrategyConfig {
    /// (μ,λ): offspring replace the parents entirely.
    MuCommaLambda {
        #[serde(default = "default_lambda")]
        lambda: usize,
    },
    /// (μ+λ): parents compete with their offspring.
    MuPlusLambda {
        #[serde(default = "default_lambda")]
        lambda: usize,
    },
    /// 1+(λ,λ): single parent, mutation phase followed by crossover phase.
    OnePlusLambdaLambda {
        #[serde(default = "default_lambda")]
        lambda: usize,
    },
    /// Novelty search with a self-adapting archive threshold.
    NoveltySearch(NoveltySearchConfig),
    /// Elitist generational genetic algorithm.
    StandardGa(GeneticAlgorithmConfig),
    /// Genetic algorithm with neighbourhood-constrained mating.
    CellularGa(CellularConfig),
    /// Dominance-ranked search treating every uncovered goal as an objective.
    ManyObjective(ManyObjectiveConfig),
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::StandardGa(GeneticAlgorithmConfig::default())
    }
}

impl StrategyConfig {
    /// Short human readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MuCommaLambda { .. } => "(mu,lambda)",
            Self::MuPlusLambda { .. } => "(mu+lambda)",
            Self::OnePlusLambdaLambda { .. } => "1+(lambda,lambda)",
            Self::NoveltySearch(_) => "novelty-search",
            Self::StandardGa(_) => "standard-ga",
            Self::CellularGa(_) => "cellular-ga",
            Self::ManyObjective(_) => "many-objective",
        }
    }
}

fn default_lambda() -> usize {
    10
}

/// Genetic algorithm configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneticAlgorithmConfig {
    /// Crossover probability (0.0-1.0).
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    /// Number of best individuals carried over unchanged.
    #[serde(default = "default_elitism")]
    pub elitism: usize,
}

impl Default for GeneticAlgorithmConfig {
    fn default() -> Self {
        Self {
            crossover_rate: default_crossover_rate(),
            elitism: default_elitism(),
        }
    }
}

fn default_crossover_rate() -> f64 {
    0.75
}
fn default_elitism() -> usize {
    1
}

/// Cellular genetic algorithm configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellularConfig {
    /// Crossover probability (0.0-1.0).
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
}

impl Default for CellularConfig {
    fn default() -> Self {
        Self {
            crossover_rate: default_crossover_rate(),
        }
    }
}

/// Many-objective configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManyObjectiveConfig {
    /// Crossover probability (0.0-1.0).
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
}

impl Default for ManyObjectiveConfig {
    fn default() -> Self {
        Self {
            crossover_rate: default_crossover_rate(),
        }
    }
}

/// Novelty search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoveltySearchConfig {
    /// Initial archive admission threshold (`P_min`).
    #[serde(default = "default_novelty_threshold")]
    pub novelty_threshold: f64,
    /// Crossover probability (0.0-1.0).
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    /// Maximum novelty archive size.
    #[serde(default = "default_novelty_archive_size")]
    pub max_archive_size: usize,
}

impl Default for NoveltySearchConfig {
    fn default() -> Self {
        Self {
            novelty_threshold: default_novelty_threshold(),
            crossover_rate: default_crossover_rate(),
            max_archive_size: default_novelty_archive_size(),
        }
    }
}

fn default_novelty_threshold() -> f64 {
    0.1
}
fn default_novelty_archive_size() -> usize {
    1000
}

/// Population settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of individuals (μ). Ignored by 1+(λ,λ), which always uses 1.
    #[serde(default = "default_population_size")]
    pub size: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
        }
    }
}

fn default_population_size() -> usize {
    50
}

/// Parent selection method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method")]
pub enum SelectionMethod {
    /// Tournament selection with configurable size.
    Tournament {
        #[serde(default = "default_tournament_size")]
        size: usize,
    },
    /// Linear rank selection with a bias in [1, 2].
    RankBased {
        #[serde(default = "default_rank_bias")]
        bias: f64,
    },
    /// Roulette wheel over fitness levels: the k-th best level weighs 1/(1+k).
    RouletteWheel,
}

impl Default for SelectionMethod {
    fn default() -> Self {
        Self::Tournament {
            size: default_tournament_size(),
        }
    }
}

fn default_tournament_size() -> usize {
    2
}
fn default_rank_bias() -> f64 {
    1.7
}

/// Bloat control settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloatConfig {
    /// Whether oversized offspring are rejected.
    #[serde(default = "default_bloat_enabled")]
    pub enabled: bool,
    /// Offspring larger than `factor` times the current best size are too long.
    #[serde(default = "default_bloat_factor")]
    pub factor: f64,
}

impl Default for BloatConfig {
    fn default() -> Self {
        Self {
            enabled: default_bloat_enabled(),
            factor: default_bloat_factor(),
        }
    }
}

fn default_bloat_enabled() -> bool {
    true
}
fn default_bloat_factor() -> f64 {
    2.0
}

/// Secondary objectives used to break ties on primary fitness.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SecondaryObjectiveKind {
    /// Total size of the solution.
    TotalLength,
    /// Number of units (e.g. tests) in the solution.
    SolutionCount,
    /// Number of exceptions raised when the solution last ran.
    ExceptionCount,
    /// Length of the longest unit in the solution.
    MaxLength,
}

/// Stopping condition settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum StoppingConditionConfig {
    /// Wall-clock budget.
    MaxTime { seconds: f64 },
    /// Number of oracle evaluations.
    MaxEvaluations { limit: u64 },
    /// Number of tests executed by the oracle.
    MaxTests { limit: u64 },
    /// Number of statements executed by the oracle.
    MaxStatements { limit: u64 },
    /// Best aggregated fitness reached zero.
    ZeroFitness,
    /// Number of completed generations.
    MaxGenerations { limit: usize },
}

/// Neighbourhood shapes for cellular mating.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum NeighbourhoodShape {
    /// Left, self and right in population order.
    Ring,
    /// North, south, east, west and self.
    #[default]
    LinearFive,
    /// Linear five plus the four diagonals.
    CompactNine,
    /// Compact nine plus the second-order cardinal neighbours.
    CompactThirteen,
}

// ============================================================================
// Validation
// ============================================================================

/// Search configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be at least 1")]
    PopulationTooSmall,
    #[error("Lambda must be at least 1")]
    LambdaTooSmall,
    #[error("(mu,lambda) requires lambda >= mu, got lambda={lambda} mu={mu}")]
    LambdaBelowMu { lambda: usize, mu: usize },
    #[error("Elitism {elitism} exceeds population size {size}")]
    ElitismTooLarge { elitism: usize, size: usize },
    #[error("Invalid rate for {name}: {value}")]
    InvalidRate { name: &'static str, value: f64 },
    #[error("Bloat factor must be positive, got {0}")]
    InvalidBloatFactor(f64),
    #[error("Tournament size must be at least 1")]
    InvalidTournamentSize,
    #[error("Rank bias must be in [1, 2], got {0}")]
    InvalidRankBias(f64),
    #[error("Novelty threshold must be non-negative, got {0}")]
    InvalidNoveltyThreshold(f64),
    #[error("Novelty archive size must be at least 1")]
    InvalidNoveltyArchive,
    #[error("Invalid stopping condition: {0}")]
    InvalidStoppingCondition(String),
    #[error("At least one stopping condition is required")]
    NoStoppingCondition,
    #[error("Operator attempt budget must be at least 1")]
    InvalidMaxAttempts,
    #[error("Problem defines no objectives")]
    NoObjectives,
    #[error("Novelty search requires a novelty metric")]
    MissingNoveltyMetric,
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl SearchConfig {
    /// Parse a configuration from JSON and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file and validate it.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Validate search configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mu = self.population.size;
        if mu == 0 {
            return Err(ConfigError::PopulationTooSmall);
        }

        let check_rate = |value: f64, name: &'static str| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::InvalidRate { name, value })
            }
        };

        match &self.strategy {
            StrategyConfig::MuCommaLambda { lambda } => {
                if *lambda == 0 {
                    return Err(ConfigError::LambdaTooSmall);
                }
                if *lambda < mu {
                    return Err(ConfigError::LambdaBelowMu {
                        lambda: *lambda,
                        mu,
                    });
                }
            }
            StrategyConfig::MuPlusLambda { lambda }
            | StrategyConfig::OnePlusLambdaLambda { lambda } => {
                if *lambda == 0 {
                    return Err(ConfigError::LambdaTooSmall);
                }
            }
            StrategyConfig::NoveltySearch(novelty) => {
                if !(novelty.novelty_threshold >= 0.0) {
                    return Err(ConfigError::InvalidNoveltyThreshold(
                        novelty.novelty_threshold,
                    ));
                }
                if novelty.max_archive_size == 0 {
                    return Err(ConfigError::InvalidNoveltyArchive);
                }
                check_rate(novelty.crossover_rate, "crossover_rate")?;
            }
            StrategyConfig::StandardGa(ga) => {
                check_rate(ga.crossover_rate, "crossover_rate")?;
                if ga.elitism > mu {
                    return Err(ConfigError::ElitismTooLarge {
                        elitism: ga.elitism,
                        size: mu,
                    });
                }
            }
            StrategyConfig::CellularGa(cellular) => {
                check_rate(cellular.crossover_rate, "crossover_rate")?;
            }
            StrategyConfig::ManyObjective(many) => {
                check_rate(many.crossover_rate, "crossover_rate")?;
            }
        }

        match self.selection {
            SelectionMethod::Tournament { size } if size == 0 => {
                return Err(ConfigError::InvalidTournamentSize);
            }
            SelectionMethod::RankBased { bias } if !(1.0..=2.0).contains(&bias) => {
                return Err(ConfigError::InvalidRankBias(bias));
            }
            _ => {}
        }

        if self.bloat.enabled && !(self.bloat.factor > 0.0) {
            return Err(ConfigError::InvalidBloatFactor(self.bloat.factor));
        }

        if self.stopping.is_empty() {
            return Err(ConfigError::NoStoppingCondition);
        }
        for condition in &self.stopping {
            if let StoppingConditionConfig::MaxTime { seconds } = condition
                && std::time::Duration::try_from_secs_f64(*seconds).is_err()
            {
                return Err(ConfigError::InvalidStoppingCondition(format!(
                    "MaxTime seconds must be a representable non-negative duration, got {seconds}"
                )));
            }
        }

        if self.max_operator_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_valid() {
        let config = SearchConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_comma_strategy_requires_lambda_at_least_mu() {
        let config = SearchConfig {
            strategy: StrategyConfig::MuCommaLambda { lambda: 5 },
            population: PopulationConfig { size: 10 },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LambdaBelowMu { lambda: 5, mu: 10 })
        ));
    }

    #[test]
    fn test_zero_population_rejected() {
        let config = SearchConfig {
            population: PopulationConfig { size: 0 },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PopulationTooSmall)
        ));
    }

    #[test]
    fn test_rank_bias_bounds() {
        let config = SearchConfig {
            selection: SelectionMethod::RankBased { bias: 2.5 },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRankBias(_))
        ));
    }

    #[test]
    fn test_empty_stopping_rejected() {
        let config = SearchConfig {
            stopping: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NoStoppingCondition)
        ));
    }

    #[test]
    fn test_unrepresentable_time_budget_rejected() {
        for seconds in [1e20, -1.0, f64::NAN, f64::INFINITY] {
            let config = SearchConfig {
                stopping: vec![StoppingConditionConfig::MaxTime { seconds }],
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidStoppingCondition(_))
            ));
        }
    }

    #[test]
    fn test_serialization() {
        let config = SearchConfig {
            strategy: StrategyConfig::OnePlusLambdaLambda { lambda: 4 },
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SearchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.population.size, config.population.size);
        assert!(matches!(
            parsed.strategy,
            StrategyConfig::OnePlusLambdaLambda { lambda: 4 }
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "strategy": { "type": "MuPlusLambda", "lambda": 20 } }"#;
        let config = SearchConfig::from_json_str(json).unwrap();
        assert_eq!(config.population.size, 50);
        assert_eq!(config.bloat.factor, 2.0);
        assert_eq!(config.neighbourhood, NeighbourhoodShape::LinearFive);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "population": {{ "size": 8 }}, "stopping": [{{ "type": "MaxEvaluations", "limit": 500 }}] }}"#
        )
        .unwrap();

        let config = SearchConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.population.size, 8);
        assert_eq!(
            config.stopping,
            vec![StoppingConditionConfig::MaxEvaluations { limit: 500 }]
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = SearchConfig::from_json_file(dir.path().join("missing.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
