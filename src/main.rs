//! Evo Search CLI - Run a bit-pattern coverage search from JSON configuration.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use evo_search::{
    bitcover::BitCoverageProblem,
    schema::SearchConfig,
    search::SearchEngine,
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json>", args[0]);
        eprintln!();
        eprintln!("Run an evolutionary coverage search from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to search configuration file");
        eprintln!();
        eprintln!("The problem is read from <config>.problem.json when present.");
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);

    // Load configuration
    let config = SearchConfig::from_json_file(&config_path).unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    });

    // Load or create problem
    let problem_path = config_path.with_extension("problem.json");
    let problem: BitCoverageProblem = if problem_path.exists() {
        let problem_str = fs::read_to_string(&problem_path).unwrap_or_else(|e| {
            eprintln!("Error reading problem file: {}", e);
            std::process::exit(1);
        });
        serde_json::from_str(&problem_str).unwrap_or_else(|e| {
            eprintln!("Error parsing problem: {}", e);
            std::process::exit(1);
        })
    } else {
        BitCoverageProblem::default()
    };

    println!("Evolutionary Coverage Search");
    println!("============================");
    println!("Strategy: {}", config.strategy.name());
    println!("Population: {}", config.population.size);
    println!(
        "Targets: {} (bit vectors of {}..={} bits)",
        problem.targets.len(),
        problem.min_length,
        problem.max_length
    );
    println!();

    let mut engine = SearchEngine::new(config, problem.build()).unwrap_or_else(|e| {
        eprintln!("Error creating search: {}", e);
        std::process::exit(1);
    });

    println!("Running search...");
    let start = Instant::now();

    let result = engine
        .run_with_callback(|progress| {
            if progress.generation % 10 == 0 {
                println!(
                    "  Generation {}: best={:.4}, avg={:.4}, goals={}/{}, evaluations={}",
                    progress.generation,
                    progress.best_fitness,
                    progress.avg_fitness,
                    progress.covered_goals,
                    progress.total_goals,
                    progress.evaluations
                );
            }
        })
        .unwrap_or_else(|e| {
            eprintln!("Search failed: {}", e);
            std::process::exit(1);
        });

    let stats = &result.stats;
    println!();
    println!("Stopped: {:?}", stats.stop_reason);
    println!("  Generations: {}", stats.generations);
    println!(
        "  Evaluations: {} ({} failed)",
        stats.total_evaluations, stats.oracle_failures
    );
    println!("  Statements executed: {}", stats.statements_executed);
    println!("  Goals covered: {}/{}", stats.covered_goals, stats.total_goals);
    println!("  Suite ambiguity: {:.4}", engine.suite_ambiguity());
    println!();

    println!("Archive:");
    for (goal, solution) in &result.archive {
        println!("  {}: {}", goal, solution.genome);
    }
    println!();
    println!(
        "Time: {:.2}s ({:.1} generations/s)",
        start.elapsed().as_secs_f32(),
        stats.generations as f32 / start.elapsed().as_secs_f32()
    );
}

fn print_example_config() {
    let config = SearchConfig::default();
    let problem = BitCoverageProblem::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
    println!();
    println!("Example problem (config.problem.json):");
    match serde_json::to_string_pretty(&problem) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing problem: {}", e),
    }
}
