//! Genetic search over rule genomes.
//!
//! # Generation loop
//!
//! 1. Evaluate every genome (fitness seeds drawn in order, games played in
//!    parallel) and normalize the fitnesses to sum 1.
//! 2. Store zero-fitness genomes as poor variants, record the top genome.
//! 3. Pick two parents fitness-proportionately, breed children by one-point
//!    crossover plus occasional head/tail mutation, skipping poor variants.
//! 4. Children and both parents become the next population.
//!
//! After the last generation the final population is evaluated and recorded
//! once more.

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::constants::{DEFAULT_ITERATIONS, GENOME_LEN, MAX_SIMULATION_SEED, SELECTION_EPSILON};
use crate::fitness::{calc_fitness, FitnessError};
use crate::genome::{is_valid, Genome, ValidationError};
use crate::simulation::SetupError;
use crate::store::{PoorVariantStore, RunHistory, StoreError, TopVariantRecord};

/// Random redraws before a mutation gives up and keeps the crossover child.
const MAX_MUTATION_ATTEMPTS: usize = 1000;
/// Crossover rounds per requested child before breeding stops.
const ATTEMPTS_PER_CHILD: usize = 100;

/// Optimizer settings. Missing JSON keys take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Random genomes in the first generation (the baseline is added on top).
    pub population_size: usize,
    /// Children bred per generation.
    pub offspring_count: usize,
    pub generations: usize,
    /// Games per fitness evaluation.
    pub iterations: usize,
    /// Chance that a crossover child is mutated.
    pub mutation_rate: f64,
    /// `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 10,
            offspring_count: 10,
            generations: 100,
            iterations: DEFAULT_ITERATIONS,
            mutation_rate: 0.1,
            seed: None,
        }
    }
}

/// A population member after evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredGenome {
    pub genome: Genome,
    /// Share of the population's total fitness.
    pub fitness: f64,
    /// Fitness before normalization.
    pub raw_fitness: f64,
}

/// Errors that can stop an evolutionary run
#[derive(Debug)]
pub enum EvolutionError {
    Validation(ValidationError),
    Setup(SetupError),
    Store(StoreError),
}

impl From<FitnessError> for EvolutionError {
    fn from(e: FitnessError) -> Self {
        match e {
            FitnessError::Validation(e) => EvolutionError::Validation(e),
            FitnessError::Setup(e) => EvolutionError::Setup(e),
        }
    }
}

impl From<ValidationError> for EvolutionError {
    fn from(e: ValidationError) -> Self {
        EvolutionError::Validation(e)
    }
}

impl From<StoreError> for EvolutionError {
    fn from(e: StoreError) -> Self {
        EvolutionError::Store(e)
    }
}

impl fmt::Display for EvolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvolutionError::Validation(e) => write!(f, "{}", e),
            EvolutionError::Setup(e) => write!(f, "Setup error: {}", e),
            EvolutionError::Store(e) => write!(f, "Store error: {}", e),
        }
    }
}

impl std::error::Error for EvolutionError {}

/// `size` random valid genomes followed by the baseline.
pub fn create_random_population(size: usize, rng: &mut impl Rng) -> Vec<Genome> {
    let mut population = Vec::with_capacity(size + 1);
    while population.len() < size {
        let genome = Genome::random(rng);
        if is_valid(&genome) {
            population.push(genome);
        }
    }
    population.push(Genome::baseline());
    population
}

/// Score every genome, normalizing fitness to sum 1 when any is positive.
pub fn evaluate_population(
    population: &[Genome],
    iterations: usize,
    rng: &mut impl Rng,
) -> Result<Vec<ScoredGenome>, FitnessError> {
    let seeds: Vec<u64> = population
        .iter()
        .map(|_| rng.gen_range(1..=MAX_SIMULATION_SEED))
        .collect();

    let raw = population
        .par_iter()
        .zip(seeds.par_iter())
        .map(|(genome, seed)| calc_fitness(genome, *seed, iterations))
        .collect::<Result<Vec<f64>, FitnessError>>()?;

    let total: f64 = raw.iter().sum();
    Ok(population
        .iter()
        .zip(raw)
        .map(|(genome, raw_fitness)| ScoredGenome {
            genome: *genome,
            fitness: if total > 0.0 {
                raw_fitness / total
            } else {
                raw_fitness
            },
            raw_fitness,
        })
        .collect())
}

/// Highest fitness; the first one wins ties.
pub fn top_genome(scored: &[ScoredGenome]) -> Option<&ScoredGenome> {
    let mut best: Option<&ScoredGenome> = None;
    for entry in scored {
        if best.map_or(true, |b| entry.fitness > b.fitness) {
            best = Some(entry);
        }
    }
    best
}

/// Two distinct entries drawn fitness-proportionately, without replacement.
pub fn select_parents(scored: &[ScoredGenome], rng: &mut impl Rng) -> Option<[Genome; 2]> {
    if scored.len() < 2 {
        return None;
    }

    let mut weights: Vec<f64> = scored.iter().map(|s| s.fitness + SELECTION_EPSILON).collect();
    let first = WeightedIndex::new(&weights).ok()?.sample(rng);
    weights[first] = 0.0;
    let second = WeightedIndex::new(&weights).ok()?.sample(rng);

    Some([scored[first].genome, scored[second].genome])
}

/// One-point crossover. Split points in `[1, GENOME_LEN - 1)` are tried in
/// random order; the first giving two valid children is used.
pub fn crossover(parents: &[Genome; 2], rng: &mut impl Rng) -> Option<(Genome, Genome, usize)> {
    let [mother, father] = parents;
    let mut points: Vec<usize> = (1..GENOME_LEN - 1).collect();
    points.shuffle(rng);

    points.into_iter().find_map(|point| {
        let first = mother.splice(father, point);
        let second = father.splice(mother, point);
        (is_valid(&first) && is_valid(&second)).then_some((first, second, point))
    })
}

/// Redraw the head (`[0, point)`) or tail (`[point, len)`) until the result is
/// valid. Gives back `offspring` unchanged if no valid redraw turns up.
pub fn mutate(offspring: Genome, point: usize, head: bool, rng: &mut impl Rng) -> Genome {
    for _ in 0..MAX_MUTATION_ATTEMPTS {
        let alleles = Genome::random(rng);
        let mutant = if head {
            alleles.splice(&offspring, point)
        } else {
            offspring.splice(&alleles, point)
        };
        if is_valid(&mutant) {
            return mutant;
        }
    }
    log::debug!("No valid mutation of [{offspring}] at {point}");
    offspring
}

/// Children of one generation plus the parents that bred them.
#[derive(Debug, Clone, PartialEq)]
pub struct Offspring {
    pub children: Vec<Genome>,
    pub parents: [Genome; 2],
}

impl Offspring {
    /// Children followed by both parents.
    pub fn into_population(self) -> Vec<Genome> {
        let mut population = self.children;
        population.extend(self.parents);
        population
    }
}

/// Breed up to `size` distinct children that are not poor variants.
/// `None` when there are no parents or they admit no valid crossover.
pub fn create_offspring(
    scored: &[ScoredGenome],
    size: usize,
    mutation_rate: f64,
    poor_variants: &HashSet<Genome>,
    rng: &mut impl Rng,
) -> Option<Offspring> {
    let parents = select_parents(scored, rng)?;

    let mut children: Vec<Genome> = Vec::with_capacity(size);
    let max_attempts = size.max(1) * ATTEMPTS_PER_CHILD;
    let mut attempts = 0;

    while children.len() < size && attempts < max_attempts {
        attempts += 1;
        let (first, second, point) = crossover(&parents, rng)?;

        let first = if rng.gen::<f64>() < mutation_rate {
            mutate(first, point, true, rng)
        } else {
            first
        };
        let second = if rng.gen::<f64>() < mutation_rate {
            mutate(second, point, false, rng)
        } else {
            second
        };

        for child in [first, second] {
            if children.len() < size && !poor_variants.contains(&child) && !children.contains(&child)
            {
                children.push(child);
            }
        }
    }

    if children.len() < size {
        log::debug!(
            "Bred {} of {} children after {} attempts",
            children.len(),
            size,
            attempts
        );
    }

    Some(Offspring { children, parents })
}

/// Drives the generation loop against a poor-variant store and a history sink.
pub struct EvolutionController<P: PoorVariantStore, H: RunHistory> {
    config: EvolutionConfig,
    rng: ChaCha8Rng,
    store: P,
    history: H,
    population: Vec<Genome>,
    generation: usize,
    best: Option<ScoredGenome>,
}

impl<P: PoorVariantStore, H: RunHistory> EvolutionController<P, H> {
    pub fn new(config: EvolutionConfig, store: P, history: H) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        log::info!(
            "Simple genetic algorithm run. Seed:{}, Generations:{}, Iterations:{}",
            seed,
            config.generations,
            config.iterations
        );
        log::info!("Loading {} poor variants.", store.load().len());

        let population = create_random_population(config.population_size, &mut rng);

        Self {
            config,
            rng,
            store,
            history,
            population,
            generation: 0,
            best: None,
        }
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn population(&self) -> &[Genome] {
        &self.population
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Best genome by raw fitness over every evaluated generation.
    pub fn best(&self) -> Option<&ScoredGenome> {
        self.best.as_ref()
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn into_parts(self) -> (P, H) {
        (self.store, self.history)
    }

    /// Evaluate the current population, store poor variants and record the top genome.
    /// Returns the scores plus the poor-variant set including this generation's additions.
    fn evaluate_and_record(
        &mut self,
    ) -> Result<(Vec<ScoredGenome>, HashSet<Genome>), EvolutionError> {
        let mut poor_variants = self.store.load();
        let scored = evaluate_population(&self.population, self.config.iterations, &mut self.rng)?;

        let mut new_poor: Vec<Genome> = Vec::new();
        for entry in &scored {
            if entry.raw_fitness == 0.0
                && !poor_variants.contains(&entry.genome)
                && !new_poor.contains(&entry.genome)
            {
                new_poor.push(entry.genome);
            }
        }
        self.store.append(&new_poor)?;
        poor_variants.extend(new_poor);

        if let Some(top) = top_genome(&scored) {
            log::info!("Gen-{}, {:.5}, {}", self.generation, top.fitness, top.genome);
            self.history.record(&TopVariantRecord {
                generation: self.generation,
                fitness: top.fitness,
                genome: top.genome,
            })?;
        }

        for entry in &scored {
            if self.best.map_or(true, |b| entry.raw_fitness > b.raw_fitness) {
                self.best = Some(*entry);
            }
        }

        Ok((scored, poor_variants))
    }

    /// Run one generation and breed the next population.
    pub fn step(&mut self) -> Result<Vec<ScoredGenome>, EvolutionError> {
        let (scored, poor_variants) = self.evaluate_and_record()?;

        match create_offspring(
            &scored,
            self.config.offspring_count,
            self.config.mutation_rate,
            &poor_variants,
            &mut self.rng,
        ) {
            Some(offspring) => self.population = offspring.into_population(),
            None => log::warn!(
                "Generation {} has no viable parents, carrying the population forward",
                self.generation
            ),
        }

        self.generation += 1;
        Ok(scored)
    }

    /// Run every configured generation, then score the final population.
    pub fn run(&mut self) -> Result<Vec<ScoredGenome>, EvolutionError> {
        while self.generation < self.config.generations {
            self.step()?;
        }
        let (scored, _) = self.evaluate_and_record()?;
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryPoorVariantStore, MemoryRunHistory};

    fn rng(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }

    fn scored(genome: Genome, fitness: f64) -> ScoredGenome {
        ScoredGenome {
            genome,
            fitness,
            raw_fitness: fitness,
        }
    }

    /// 3 players with 4 imposters whatever the tail holds.
    fn hopeless(tail: Genome) -> Genome {
        let mut bits = tail.bits();
        bits[..7].copy_from_slice(&[0, 0, 0, 0, 1, 1, 0]);
        Genome::from_bits(&bits).unwrap()
    }

    fn small_config(seed: u64) -> EvolutionConfig {
        EvolutionConfig {
            population_size: 4,
            offspring_count: 4,
            generations: 2,
            iterations: 5,
            mutation_rate: 0.1,
            seed: Some(seed),
        }
    }

    #[test]
    fn test_default_config() {
        let config = EvolutionConfig::default();
        assert_eq!(config.population_size, 10);
        assert_eq!(config.offspring_count, 10);
        assert_eq!(config.generations, 100);
        assert_eq!(config.iterations, 1000);
        assert_eq!(config.mutation_rate, 0.1);

        let parsed: EvolutionConfig = serde_json::from_str(r#"{"generations": 3}"#).unwrap();
        assert_eq!(parsed.generations, 3);
        assert_eq!(parsed.population_size, 10);
    }

    #[test]
    fn test_random_population_is_valid_and_ends_with_baseline() {
        let population = create_random_population(10, &mut rng(1));
        assert_eq!(population.len(), 11);
        assert!(population.iter().all(is_valid));
        assert_eq!(population.last(), Some(&Genome::baseline()));
    }

    #[test]
    fn test_select_parents_needs_two_entries() {
        assert!(select_parents(&[], &mut rng(1)).is_none());
        assert!(select_parents(&[scored(Genome::baseline(), 1.0)], &mut rng(1)).is_none());
    }

    #[test]
    fn test_select_parents_without_replacement() {
        let entries = [
            scored(Genome::baseline(), 0.98),
            scored(Genome::zeros(), 0.01),
            scored(Genome::ones(), 0.01),
        ];
        let mut r = rng(4);
        for _ in 0..50 {
            let [a, b] = select_parents(&entries, &mut r).unwrap();
            assert_ne!(a, b);
        }
    }

    #[test]
    fn test_select_parents_prefers_fit_genomes() {
        let entries = [
            scored(Genome::baseline(), 1.0),
            scored(Genome::zeros(), 0.0),
            scored(Genome::ones(), 0.0),
        ];
        let mut r = rng(2);
        let picked = (0..100)
            .filter(|_| select_parents(&entries, &mut r).unwrap().contains(&Genome::baseline()))
            .count();
        assert!(picked > 95, "baseline picked only {picked} times");
    }

    #[test]
    fn test_crossover_splices_parents() {
        let parents = [Genome::baseline(), Genome::ones()];
        let (first, second, point) = crossover(&parents, &mut rng(3)).unwrap();
        assert!((1..GENOME_LEN - 1).contains(&point));
        assert!(is_valid(&first) && is_valid(&second));
        assert_eq!(&first.bits()[..point], &parents[0].bits()[..point]);
        assert_eq!(&first.bits()[point..], &parents[1].bits()[point..]);
        assert_eq!(&second.bits()[..point], &parents[1].bits()[..point]);
        assert_eq!(&second.bits()[point..], &parents[0].bits()[point..]);
    }

    #[test]
    fn test_crossover_without_valid_point() {
        let parents = [hopeless(Genome::zeros()), hopeless(Genome::ones())];
        assert!(crossover(&parents, &mut rng(1)).is_none());
    }

    #[test]
    fn test_mutate_head_keeps_tail() {
        let mut r = rng(8);
        for _ in 0..20 {
            let mutant = mutate(Genome::baseline(), 20, true, &mut r);
            assert!(is_valid(&mutant));
            assert_eq!(&mutant.bits()[20..], &Genome::baseline().bits()[20..]);
        }
    }

    #[test]
    fn test_mutate_tail_keeps_head() {
        let mut r = rng(9);
        let mutant = mutate(Genome::baseline(), 10, false, &mut r);
        assert!(is_valid(&mutant));
        assert_eq!(&mutant.bits()[..10], &Genome::baseline().bits()[..10]);
    }

    #[test]
    fn test_mutate_falls_back_when_unfixable() {
        let broken = hopeless(Genome::zeros());
        assert_eq!(mutate(broken, 10, false, &mut rng(1)), broken);
    }

    #[test]
    fn test_offspring_are_distinct_valid_and_not_poor() {
        let entries = [
            scored(Genome::baseline(), 0.5),
            scored(Genome::ones(), 0.3),
            scored(Genome::zeros(), 0.2),
        ];
        let mut poor = HashSet::new();
        poor.insert(Genome::zeros());

        let offspring = create_offspring(&entries, 10, 0.5, &poor, &mut rng(6)).unwrap();
        assert!(offspring.children.len() <= 10);
        assert!(offspring.children.iter().all(is_valid));
        assert!(offspring.children.iter().all(|c| !poor.contains(c)));
        let unique: HashSet<&Genome> = offspring.children.iter().collect();
        assert_eq!(unique.len(), offspring.children.len());

        let population = offspring.clone().into_population();
        assert_eq!(population.len(), offspring.children.len() + 2);
    }

    #[test]
    fn test_identical_parents_terminate() {
        let entries = [
            scored(Genome::baseline(), 0.5),
            scored(Genome::baseline(), 0.5),
        ];
        let offspring = create_offspring(&entries, 10, 0.0, &HashSet::new(), &mut rng(1)).unwrap();
        assert_eq!(offspring.children, vec![Genome::baseline()]);
    }

    #[test]
    fn test_evaluate_population_normalizes() {
        let population = create_random_population(3, &mut rng(5));
        let scored = evaluate_population(&population, 5, &mut rng(5)).unwrap();
        assert_eq!(scored.len(), 4);
        let total: f64 = scored.iter().map(|s| s.fitness).sum();
        let raw_total: f64 = scored.iter().map(|s| s.raw_fitness).sum();
        if raw_total > 0.0 {
            assert!((total - 1.0).abs() < 1e-9);
        } else {
            assert_eq!(total, 0.0);
        }
    }

    #[test]
    fn test_controller_records_every_generation() {
        let mut controller = EvolutionController::new(
            small_config(7),
            MemoryPoorVariantStore::new(),
            MemoryRunHistory::new(),
        );
        let final_population = controller.run().unwrap();

        assert!(final_population.len() >= 2);
        assert!(final_population.iter().all(|s| is_valid(&s.genome)));
        assert_eq!(controller.generation(), 2);
        assert!(controller.best().is_some());

        let (store, history) = controller.into_parts();
        let generations: Vec<usize> = history.records.iter().map(|r| r.generation).collect();
        assert_eq!(generations, vec![0, 1, 2]);
        assert!(store.load().iter().all(is_valid));
    }

    #[test]
    fn test_controller_is_deterministic() {
        let run = |seed| {
            let mut controller = EvolutionController::new(
                small_config(seed),
                MemoryPoorVariantStore::new(),
                MemoryRunHistory::new(),
            );
            controller.run().unwrap();
            controller.into_parts().1.records
        };
        assert_eq!(run(11), run(11));
    }

    #[test]
    fn test_poor_variants_are_never_bred() {
        let mut store = MemoryPoorVariantStore::new();
        store.append(&[Genome::ones()]).unwrap();
        let mut controller = EvolutionController::new(small_config(3), store, MemoryRunHistory::new());
        controller.step().unwrap();
        assert!(!controller.population().contains(&Genome::ones()));
        assert_eq!(controller.generation(), 1);
    }
}
