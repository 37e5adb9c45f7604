//! Imposter Headless Simulation Harness
//!
//! Validates the game engine, genome codec and rule search in-process, and
//! exposes single runs and full evolutionary searches from the command line.
//!
//! Usage:
//!   cargo run -p imposter-simtest
//!   cargo run -p imposter-simtest -- --verbose
//!   cargo run -p imposter-simtest -- simulate [--seed N] [--config FILE]
//!   cargo run -p imposter-simtest -- evolve [--seed N] [--generations G] [--iterations I]
//!       [--population P] [--poor-variants FILE] [--history FILE]
//!   cargo run -p imposter-simtest -- --help

use clap::{Parser, Subcommand};
use imposter_logic::config::RuleConfiguration;
use imposter_logic::evolution::{EvolutionConfig, EvolutionController};
use imposter_logic::fitness::{fitness_transform, scenario, Phenotype};
use imposter_logic::genome::{self, DuplicateRoomStrategy, Genome};
use imposter_logic::roster::{Position, Role};
use imposter_logic::simulation::{RunResult, Simulation, Winner};
use imposter_logic::store::{
    FilePoorVariantStore, JsonlRunHistory, MemoryPoorVariantStore, MemoryRunHistory,
    PoorVariantStore, RunHistory,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Headless harness for the Imposter simulator.
///
/// Without a subcommand, runs the validation sweep and exits 1 on any failure.
#[derive(Parser, Debug)]
#[command(name = "imposter-simtest")]
#[command(about = "Validate, play and tune the Imposter board game", long_about = None)]
struct Cli {
    /// Log at debug level and print per-check details
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a single game and print the outcome.
    Simulate {
        /// Run seed (overrides the config file)
        #[arg(long)]
        seed: Option<u64>,

        /// JSON rule configuration; missing keys take defaults
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Search for balanced rule sets with the genetic algorithm.
    Evolve {
        /// Seed for the whole search
        #[arg(long)]
        seed: Option<u64>,

        /// Number of generations
        #[arg(long)]
        generations: Option<usize>,

        /// Games played per fitness evaluation
        #[arg(long)]
        iterations: Option<usize>,

        /// Initial population size
        #[arg(long)]
        population: Option<usize>,

        /// Poor variant file, read at start and appended to
        #[arg(long, default_value = "poor_variants.out")]
        poor_variants: PathBuf,

        /// JSON-lines file for the per-generation top variant
        #[arg(long)]
        history: Option<PathBuf>,
    },
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match cli.command {
        None => run_validation(cli.verbose),
        Some(Commands::Simulate { seed, config }) => run_simulate(seed, config),
        Some(Commands::Evolve {
            seed,
            generations,
            iterations,
            population,
            poor_variants,
            history,
        }) => {
            let mut config = EvolutionConfig {
                seed,
                ..Default::default()
            };
            if let Some(generations) = generations {
                config.generations = generations;
            }
            if let Some(iterations) = iterations {
                config.iterations = iterations;
            }
            if let Some(population) = population {
                config.population_size = population;
            }
            run_evolve(config, poor_variants, history)
        }
    };

    std::process::exit(code);
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// ── simulate ────────────────────────────────────────────────────────────

fn load_rule_config(path: &Path) -> Result<RuleConfiguration, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("bad config {}: {}", path.display(), e))
}

fn run_simulate(seed: Option<u64>, config_path: Option<PathBuf>) -> i32 {
    let mut config = match config_path.as_deref().map(load_rule_config).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(message) => {
            eprintln!("error: {}", message);
            return 2;
        }
    };
    if seed.is_some() {
        config.seed = seed;
    }

    let mut sim = match Simulation::new(config) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("error: {}", e);
            return 2;
        }
    };
    let result = sim.run();

    println!("=== Imposter Simulation ===\n");
    println!("  seed:    {}", sim.seed());
    println!("  turns:   {}", result.turn_count);
    println!("  winner:  {}", result.winner);
    println!("  cards:   {}", sim.card_log().len());
    for player in sim.players() {
        println!("  {}", player);
    }
    for ghost in sim.ghosts() {
        println!("  ghost: {}", ghost.name);
    }
    0
}

// ── evolve ──────────────────────────────────────────────────────────────

fn run_evolve(config: EvolutionConfig, poor_path: PathBuf, history_path: Option<PathBuf>) -> i32 {
    let store = FilePoorVariantStore::new(poor_path);
    log::info!("Poor variants file: {}", store.path().display());

    match history_path {
        Some(path) => match JsonlRunHistory::create(&path) {
            Ok(history) => evolve_with(config, store, history),
            Err(e) => {
                eprintln!("error: cannot open {}: {}", path.display(), e);
                2
            }
        },
        None => evolve_with(config, store, MemoryRunHistory::new()),
    }
}

fn evolve_with<P: PoorVariantStore, H: RunHistory>(
    config: EvolutionConfig,
    store: P,
    history: H,
) -> i32 {
    let mut controller = EvolutionController::new(config, store, history);
    let scored = match controller.run() {
        Ok(scored) => scored,
        Err(e) => {
            eprintln!("error: {}", e);
            return 1;
        }
    };

    println!("\n=== Final population ===");
    for entry in &scored {
        println!("  {:.5}  {}", entry.fitness, entry.genome);
    }
    if let Some(best) = controller.best() {
        println!("\nBest fitness {:.5}: {}", best.raw_fitness, best.genome);
        println!("{:#?}", genome::decode(&best.genome));
    }
    0
}

// ── Validation sweep ────────────────────────────────────────────────────

fn run_validation(verbose: bool) -> i32 {
    println!("=== Imposter Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Genome codec
    results.extend(validate_genome_codec(verbose));

    // 2. Scripted games
    results.extend(validate_scripted_games(verbose));

    // 3. Seeded default games
    results.extend(validate_default_games(verbose));

    // 4. Fitness oracle
    results.extend(validate_fitness(verbose));

    // 5. Short evolutionary run
    results.extend(validate_evolution(verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        1
    } else {
        0
    }
}

// ── 1. Genome Codec ─────────────────────────────────────────────────────

fn validate_genome_codec(verbose: bool) -> Vec<TestResult> {
    println!("--- Genome Codec ---");
    let mut results = Vec::new();

    let baseline = genome::decode(&Genome::baseline());
    results.push(TestResult {
        name: "baseline_decodes_to_board_game".into(),
        passed: baseline.player_count == 4
            && baseline.imposter_count == 1
            && baseline.body_count == 1
            && baseline.room_type_count == 7
            && baseline.cards_per_room_type == 5
            && baseline.duplicate_room_count == 2
            && baseline.duplicate_room_strategy == DuplicateRoomStrategy::Ladder
            && baseline.duplicate_room_intensity == 2
            && baseline.imposter_chances == 5,
        detail: format!(
            "{} players, {} imposter, {} room types",
            baseline.player_count, baseline.imposter_count, baseline.room_type_count
        ),
    });

    let extremes_valid = genome::is_valid(&Genome::zeros()) && genome::is_valid(&Genome::ones());
    results.push(TestResult {
        name: "extremes_are_valid".into(),
        passed: extremes_valid,
        detail: "all-zero and all-one genomes".into(),
    });

    // Sweep random genomes: every valid one must satisfy the rule invariants
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let mut valid = 0;
    let mut broken = 0;
    for _ in 0..5000 {
        let genome = Genome::random(&mut rng);
        if let Ok(traits) = genome::validate(&genome) {
            valid += 1;
            if traits.imposter_count >= traits.player_count
                || traits.body_count > traits.room_type_count
                || traits.duplicate_room_count > traits.room_type_count
            {
                broken += 1;
            }
            if genome::encode(&traits).map(|g| genome::decode(&g)) != Ok(traits) {
                broken += 1;
            }
        }
    }
    results.push(TestResult {
        name: "random_genome_sweep".into(),
        passed: broken == 0 && valid > 0,
        detail: format!("{} of 5000 valid, {} broken", valid, broken),
    });

    if verbose {
        println!("  baseline: {}", Genome::baseline());
    }

    results
}

// ── 2. Scripted Games ───────────────────────────────────────────────────

fn labels(cards: &[&str]) -> Vec<String> {
    cards.iter().map(|s| s.to_string()).collect()
}

fn validate_scripted_games(verbose: bool) -> Vec<TestResult> {
    println!("--- Scripted Games ---");
    let mut results = Vec::new();

    let single_room = RuleConfiguration {
        seed: Some(3208357999),
        deck: Some(labels(&["Room1", "Room1", "Room1", "Room1"])),
        body_locations: Some(labels(&["Bedroom"])),
        ..Default::default()
    };
    results.push(scripted("single_room_imposter_win", single_room, Winner::Imposter, verbose));

    let ejection = RuleConfiguration {
        seed: Some(1),
        assignments: Some(vec![Role::Imposter, Role::Crew, Role::Crew, Role::Crew]),
        deck: Some(labels(&[
            "Kitchen", "Kitchen", "Office", "Garage", "Attic", "Cellar", "Loft", "Hall",
        ])),
        body_locations: Some(labels(&["Office"])),
        ..Default::default()
    };
    results.push(scripted("body_found_ejects_imposter", ejection, Winner::Crew, verbose));

    let timeout = RuleConfiguration {
        seed: Some(1),
        assignments: Some(vec![
            Role::Imposter,
            Role::Crew,
            Role::Crew,
            Role::Crew,
            Role::Crew,
        ]),
        deck: Some(labels(&[
            "Kitchen", "Kitchen", "Office", "Garage", "Attic", "Cellar", "Loft", "Hall", "Den",
            "Porch",
        ])),
        body_locations: Some(labels(&["Library"])),
        imposter_chances: 1,
        ..Default::default()
    };
    results.push(scripted("reveal_turn_timeout", timeout, Winner::CrewByTimeout, verbose));

    results
}

fn scripted(name: &str, config: RuleConfiguration, expected: Winner, verbose: bool) -> TestResult {
    match Simulation::new(config) {
        Ok(mut sim) => {
            let result = sim.run();
            if verbose {
                println!("  {}: {:?} {:?}", name, result, sim.card_log());
            }
            TestResult {
                name: name.into(),
                passed: result.winner == expected,
                detail: format!("{} after {} turns", result.winner, result.turn_count),
            }
        }
        Err(e) => TestResult {
            name: name.into(),
            passed: false,
            detail: format!("setup failed: {}", e),
        },
    }
}

// ── 3. Seeded Default Games ─────────────────────────────────────────────

fn validate_default_games(verbose: bool) -> Vec<TestResult> {
    println!("--- Default Games ---");
    let mut results = Vec::new();

    let mut graves_mismatch = 0;
    let mut nondeterministic = 0;
    let mut winners = [0u32; 4];
    let seeds = (1..=300u64).chain(std::iter::once(31316319423));
    let mut played = 0;

    for seed in seeds {
        let (Ok(mut a), Ok(mut b)) = (
            Simulation::new(RuleConfiguration::seeded(seed)),
            Simulation::new(RuleConfiguration::seeded(seed)),
        ) else {
            nondeterministic += 1;
            continue;
        };
        let result = a.run();
        if b.run() != result || a.card_log() != b.card_log() {
            nondeterministic += 1;
        }

        let graves = a
            .players()
            .iter()
            .filter(|p| p.position == Position::Grave)
            .count();
        if graves != a.ghosts().len() {
            graves_mismatch += 1;
        }

        winners[match result.winner {
            Winner::Crew => 0,
            Winner::CrewByTimeout => 1,
            Winner::Imposter => 2,
            Winner::NoWinner => 3,
        }] += 1;
        played += 1;
    }

    results.push(TestResult {
        name: "graves_match_ghosts".into(),
        passed: graves_mismatch == 0,
        detail: format!("{} of {} games mismatched", graves_mismatch, played),
    });
    results.push(TestResult {
        name: "seeded_games_deterministic".into(),
        passed: nondeterministic == 0,
        detail: format!("{} of {} games diverged", nondeterministic, played),
    });

    let known = [
        (31316319423, RunResult { turn_count: 4, winner: Winner::Imposter }),
        (1, RunResult { turn_count: 16, winner: Winner::Crew }),
    ];
    for (seed, expected) in known {
        let outcome = Simulation::new(RuleConfiguration::seeded(seed)).map(|mut sim| sim.run());
        results.push(TestResult {
            name: format!("seed_{}_outcome", seed),
            passed: outcome.as_ref().ok() == Some(&expected),
            detail: match outcome {
                Ok(result) => format!("{} after {} turns", result.winner, result.turn_count),
                Err(e) => format!("setup failed: {}", e),
            },
        });
    }

    if verbose {
        println!(
            "  winners: crew {}, crew by timeout {}, imposter {}, none {}",
            winners[0], winners[1], winners[2], winners[3]
        );
    }

    results
}

// ── 4. Fitness Oracle ───────────────────────────────────────────────────

fn validate_fitness(verbose: bool) -> Vec<TestResult> {
    println!("--- Fitness ---");
    let mut results = Vec::new();

    results.push(TestResult {
        name: "balanced_score_is_fittest".into(),
        passed: fitness_transform(1.0) == 1.0 && fitness_transform(3.0) < fitness_transform(1.5),
        detail: format!(
            "f(1)={} f(1.5)={} f(3)={}",
            fitness_transform(1.0),
            fitness_transform(1.5),
            fitness_transform(3.0)
        ),
    });

    let tally = Phenotype::new(Genome::baseline(), 1, 200)
        .map_err(|e| e.to_string())
        .and_then(|p| p.tally().map_err(|e| e.to_string()));
    match tally {
        Ok(tally) => {
            if verbose {
                println!("  baseline tally: {:?}", tally);
            }
            results.push(TestResult {
                name: "baseline_tally".into(),
                passed: tally.total() == 200,
                detail: format!(
                    "crew {} imposter {} none {} → fitness {}",
                    tally.crew_wins(),
                    tally.imposter,
                    tally.no_winner,
                    fitness_transform(tally.score())
                ),
            });
        }
        Err(message) => results.push(TestResult {
            name: "baseline_tally".into(),
            passed: false,
            detail: message,
        }),
    }

    // Every scenario of a valid genome must build a legal game
    let traits = genome::decode(&Genome::ones());
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let setup_failures = (0..50)
        .filter(|_| Simulation::new(scenario(&traits, &mut rng)).is_err())
        .count();
    results.push(TestResult {
        name: "scenarios_build_legal_games".into(),
        passed: setup_failures == 0,
        detail: format!("{} of 50 scenarios failed setup", setup_failures),
    });

    results
}

// ── 5. Evolution ────────────────────────────────────────────────────────

fn validate_evolution(verbose: bool) -> Vec<TestResult> {
    println!("--- Evolution ---");
    let mut results = Vec::new();

    let config = EvolutionConfig {
        population_size: 4,
        offspring_count: 4,
        generations: 3,
        iterations: 10,
        mutation_rate: 0.1,
        seed: Some(42),
    };
    let mut controller =
        EvolutionController::new(config, MemoryPoorVariantStore::new(), MemoryRunHistory::new());

    match controller.run() {
        Ok(scored) => {
            let all_valid = scored.iter().all(|s| genome::is_valid(&s.genome));
            let (store, history) = controller.into_parts();
            if verbose {
                for record in &history.records {
                    println!("  gen {} {:.5} {}", record.generation, record.fitness, record.genome);
                }
            }
            results.push(TestResult {
                name: "evolution_population_valid".into(),
                passed: all_valid && scored.len() >= 2,
                detail: format!("{} genomes in final population", scored.len()),
            });
            results.push(TestResult {
                name: "evolution_history_complete".into(),
                passed: history.records.len() == 4,
                detail: format!(
                    "{} generations recorded, {} poor variants",
                    history.records.len(),
                    store.len()
                ),
            });
        }
        Err(e) => results.push(TestResult {
            name: "evolution_run".into(),
            passed: false,
            detail: e.to_string(),
        }),
    }

    results
}
