//! Integration tests for the full rule search pipeline.
//!
//! Exercises: Genome → GenomeTraits → scenario → Simulation → WinTally
//! → fitness → EvolutionController
//!
//! All tests are pure logic apart from the file-backed stores, which write
//! into temporary directories.

use imposter_logic::config::RuleConfiguration;
use imposter_logic::evolution::{EvolutionConfig, EvolutionController};
use imposter_logic::fitness::{calc_fitness, scenario, Phenotype};
use imposter_logic::genome::{decode, encode, is_valid, validate, Genome};
use imposter_logic::roster::{Position, Role};
use imposter_logic::simulation::{Simulation, Winner};
use imposter_logic::store::{
    FilePoorVariantStore, JsonlRunHistory, MemoryPoorVariantStore, MemoryRunHistory,
    PoorVariantStore, TopVariantRecord,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// ── Helpers ────────────────────────────────────────────────────────────

fn labels(cards: &[&str]) -> Vec<String> {
    cards.iter().map(|s| s.to_string()).collect()
}

fn tiny_evolution(seed: u64) -> EvolutionConfig {
    EvolutionConfig {
        population_size: 3,
        offspring_count: 3,
        generations: 2,
        iterations: 4,
        mutation_rate: 0.2,
        seed: Some(seed),
    }
}

// ── Genome → game ──────────────────────────────────────────────────────

#[test]
fn baseline_genome_plays_complete_games() {
    let traits = validate(&Genome::baseline()).expect("baseline is valid");
    let mut rng = ChaCha8Rng::seed_from_u64(2024);

    for _ in 0..25 {
        let config = scenario(&traits, &mut rng);
        let mut sim = Simulation::new(config).expect("scenario builds a legal game");
        let result = sim.run();

        let graves = sim
            .players()
            .iter()
            .filter(|p| p.position == Position::Grave)
            .count();
        assert_eq!(graves, sim.ghosts().len());
        assert_eq!(sim.bodies().len(), 1);
        if result.winner == Winner::Imposter {
            assert_eq!(sim.ghosts().len() + 1, sim.players().len());
        }
    }
}

#[test]
fn every_decoded_scenario_matches_its_traits() {
    let mut rng = ChaCha8Rng::seed_from_u64(77);
    let mut checked = 0;
    while checked < 30 {
        let genome = Genome::random(&mut rng);
        let Ok(traits) = validate(&genome) else {
            continue;
        };
        checked += 1;

        let config = scenario(&traits, &mut rng);
        let assignments = config.assignments.as_ref().expect("assignments set");
        assert_eq!(assignments.len() as u32, traits.player_count);
        assert_eq!(
            assignments.iter().filter(|r| **r == Role::Imposter).count() as u32,
            traits.imposter_count
        );
        assert_eq!(
            config.deck.as_ref().map(Vec::len),
            Some((traits.room_type_count * traits.cards_per_room_type) as usize)
        );
        assert_eq!(
            config.potential_rooms.len() as u32,
            traits.duplicate_room_count
        );

        let mut sim = Simulation::new(config).expect("valid genome builds a legal game");
        sim.run();
    }
}

#[test]
fn encode_decode_agree_on_random_valid_genomes() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    for _ in 0..200 {
        let genome = Genome::random(&mut rng);
        let traits = decode(&genome);
        let encoded = encode(&traits).expect("decoded traits are in range");
        assert_eq!(decode(&encoded), traits);
        assert_eq!(is_valid(&encoded), is_valid(&genome));
    }
}

// ── Explicit-deck games ────────────────────────────────────────────────

#[test]
fn single_room_deck_is_an_imposter_win() {
    let config = RuleConfiguration {
        seed: Some(3208357999),
        deck: Some(labels(&["Room1", "Room1", "Room1", "Room1"])),
        body_locations: Some(labels(&["Bedroom"])),
        ..Default::default()
    };
    let mut sim = Simulation::new(config).unwrap();
    assert_eq!(sim.run().winner, Winner::Imposter);
}

#[test]
fn json_configuration_drives_a_game() {
    let json = r#"{
        "seed": 1,
        "assignments": ["Imposter", "Crew", "Crew", "Crew"],
        "deck": ["Kitchen", "Kitchen", "Office", "Garage", "Attic", "Cellar", "Loft", "Hall"],
        "body_locations": ["Office"]
    }"#;
    let config: RuleConfiguration = serde_json::from_str(json).unwrap();
    let mut sim = Simulation::new(config).unwrap();
    let result = sim.run();
    assert_eq!(result.winner, Winner::Crew);
    assert_eq!(result.turn_count, 1);
}

// ── Fitness ────────────────────────────────────────────────────────────

#[test]
fn fitness_is_reproducible_and_bounded() {
    let first = calc_fitness(&Genome::baseline(), 99, 30).unwrap();
    let second = calc_fitness(&Genome::baseline(), 99, 30).unwrap();
    assert_eq!(first, second);
    assert!((0.0..=1.0).contains(&first));

    let tally = Phenotype::new(Genome::baseline(), 99, 30)
        .unwrap()
        .tally()
        .unwrap();
    assert_eq!(tally.total(), 30);
}

// ── Evolution ──────────────────────────────────────────────────────────

#[test]
fn evolution_writes_history_and_poor_variants_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let poor_path = dir.path().join("poor_variants.out");
    let history_path = dir.path().join("history.jsonl");

    let store = FilePoorVariantStore::new(&poor_path);
    let history = JsonlRunHistory::create(&history_path).unwrap();
    let mut controller = EvolutionController::new(tiny_evolution(21), store, history);
    let final_population = controller.run().unwrap();
    assert!(final_population.len() >= 2);
    drop(controller);

    let text = std::fs::read_to_string(&history_path).unwrap();
    let records: Vec<TopVariantRecord> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(
        records.iter().map(|r| r.generation).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert!(records.iter().all(|r| is_valid(&r.genome)));

    // Reloading sees every zero-fitness genome that was written
    let reloaded = FilePoorVariantStore::new(&poor_path).load();
    assert!(reloaded.iter().all(is_valid));
}

#[test]
fn evolution_with_seed_is_reproducible() {
    let run = || {
        let mut controller = EvolutionController::new(
            tiny_evolution(5),
            MemoryPoorVariantStore::new(),
            MemoryRunHistory::new(),
        );
        let scored = controller.run().unwrap();
        let (store, history) = controller.into_parts();
        (scored, store.load(), history.records)
    };
    let (scored_a, poor_a, history_a) = run();
    let (scored_b, poor_b, history_b) = run();
    assert_eq!(scored_a, scored_b);
    assert_eq!(poor_a, poor_b);
    assert_eq!(history_a, history_b);
}
