//! NSGA-II search over induction sets and running orders
//!
//! Individuals are (subset, order) pairs over the eligible trainsets.
//! Selection uses constrained dominance (feasible beats infeasible), fast
//! non-dominated sorting, and crowding distance; variation is uniform subset
//! crossover plus add/remove/reorder mutation. Given a seed, parameters, and
//! context the search is fully reproducible.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::defaults::{OVERSIZE_PENALTY, TOURNAMENT_SIZE, UNDERSIZE_PENALTY};
use crate::types::{ObjectiveScores, OptimizationParameters, PopulationStats};

use super::objectives::EvaluationCache;

// ============================================================================
// Individual
// ============================================================================

/// One candidate solution in the population.
#[derive(Debug, Clone)]
pub struct Individual {
    /// Indices into the cache's feature table, in running order
    pub subset: Vec<usize>,
    pub objectives: ObjectiveScores,
    /// Weighted scalar fitness (0 for critically infeasible individuals)
    pub fitness: f64,
    /// 0 when feasible; negative penalty sum otherwise
    pub constraint_score: f64,
    pub violations: Vec<String>,
    /// Non-domination front index (0 = Pareto front)
    pub rank: usize,
    /// Crowding distance within the front
    pub crowding: f64,
}

impl Individual {
    pub fn is_feasible(&self) -> bool {
        self.constraint_score >= 0.0 && self.violations.is_empty()
    }
}

/// Evaluate a subset into a scored individual.
pub fn evaluate(
    cache: &EvaluationCache,
    params: &OptimizationParameters,
    subset: Vec<usize>,
) -> Individual {
    let objectives = cache.score(&subset);
    let mut constraint_score = 0.0;
    let mut violations = Vec::new();
    let mut critical = false;

    if subset.len() < params.min_trainsets {
        constraint_score += UNDERSIZE_PENALTY;
        violations.push(format!(
            "selection of {} is below the service minimum of {}",
            subset.len(),
            params.min_trainsets
        ));
    }
    if subset.len() > params.max_trainsets {
        constraint_score += OVERSIZE_PENALTY;
        violations.push(format!(
            "selection of {} exceeds the service maximum of {}",
            subset.len(),
            params.max_trainsets
        ));
    }
    for &idx in &subset {
        if !cache.features[idx].eligible {
            critical = true;
            violations.push(format!(
                "trainset {} fails certificate or work-order eligibility",
                cache.features[idx].number
            ));
        }
    }

    let fitness = if critical {
        0.0
    } else {
        (objectives.weighted(&params.weights) + constraint_score).max(0.0)
    };

    Individual {
        subset,
        objectives,
        fitness,
        constraint_score,
        violations,
        rank: usize::MAX,
        crowding: 0.0,
    }
}

// ============================================================================
// Dominance, sorting, crowding
// ============================================================================

/// Constrained dominance: feasibility first, then Pareto dominance.
fn dominates(a: &Individual, b: &Individual) -> bool {
    match (a.is_feasible(), b.is_feasible()) {
        (true, false) => true,
        (false, true) => false,
        (false, false) => a.constraint_score > b.constraint_score,
        (true, true) => a.objectives.dominates(&b.objectives),
    }
}

/// Fast non-dominated sort. Assigns `rank` and returns the fronts as index
/// lists into `population`.
pub fn non_dominated_sort(population: &mut [Individual]) -> Vec<Vec<usize>> {
    let n = population.len();
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut domination_count = vec![0usize; n];
    let mut fronts: Vec<Vec<usize>> = vec![Vec::new()];

    for i in 0..n {
        for j in (i + 1)..n {
            if dominates(&population[i], &population[j]) {
                dominated_by[i].push(j);
                domination_count[j] += 1;
            } else if dominates(&population[j], &population[i]) {
                dominated_by[j].push(i);
                domination_count[i] += 1;
            }
        }
    }
    for i in 0..n {
        if domination_count[i] == 0 {
            population[i].rank = 0;
            fronts[0].push(i);
        }
    }

    let mut current = 0;
    while !fronts[current].is_empty() {
        let mut next = Vec::new();
        for &i in &fronts[current] {
            for &j in &dominated_by[i] {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    population[j].rank = current + 1;
                    next.push(j);
                }
            }
        }
        current += 1;
        fronts.push(next);
    }
    fronts.pop(); // trailing empty front
    fronts
}

/// Crowding distance within one front, over all five objectives.
pub fn crowding_distance(population: &mut [Individual], front: &[usize]) {
    for &i in front {
        population[i].crowding = 0.0;
    }
    if front.len() <= 2 {
        for &i in front {
            population[i].crowding = f64::INFINITY;
        }
        return;
    }

    for obj in 0..5 {
        let mut order: Vec<usize> = front.to_vec();
        order.sort_by(|&a, &b| {
            population[a].objectives.as_array()[obj]
                .partial_cmp(&population[b].objectives.as_array()[obj])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let lo = population[order[0]].objectives.as_array()[obj];
        let hi = population[order[order.len() - 1]].objectives.as_array()[obj];
        let span = (hi - lo).abs();
        population[order[0]].crowding = f64::INFINITY;
        population[order[order.len() - 1]].crowding = f64::INFINITY;
        if span <= f64::EPSILON {
            continue;
        }
        for w in 1..order.len() - 1 {
            let prev = population[order[w - 1]].objectives.as_array()[obj];
            let next = population[order[w + 1]].objectives.as_array()[obj];
            population[order[w]].crowding += (next - prev) / span;
        }
    }
}

/// Tournament selection biased by (front rank, crowding distance).
fn tournament_select<'a>(population: &'a [Individual], rng: &mut StdRng) -> &'a Individual {
    let mut best: Option<&Individual> = None;
    for _ in 0..TOURNAMENT_SIZE {
        let candidate = &population[rng.gen_range(0..population.len())];
        best = Some(match best {
            None => candidate,
            Some(current) => {
                if candidate.rank < current.rank
                    || (candidate.rank == current.rank && candidate.crowding > current.crowding)
                {
                    candidate
                } else {
                    current
                }
            }
        });
    }
    best.unwrap_or(&population[0])
}

// ============================================================================
// Variation
// ============================================================================

/// Uniform subset crossover: shared genes kept, exclusive genes coin-flipped,
/// then the child is repaired into the size bounds.
fn crossover(
    a: &Individual,
    b: &Individual,
    cache: &EvaluationCache,
    params: &OptimizationParameters,
    rng: &mut StdRng,
) -> Vec<usize> {
    let in_b: std::collections::HashSet<usize> = b.subset.iter().copied().collect();
    let in_a: std::collections::HashSet<usize> = a.subset.iter().copied().collect();

    let mut child: Vec<usize> = Vec::new();
    for &gene in &a.subset {
        if in_b.contains(&gene) || rng.gen_bool(0.5) {
            child.push(gene);
        }
    }
    for &gene in &b.subset {
        if !in_a.contains(&gene) && rng.gen_bool(0.5) {
            child.push(gene);
        }
    }

    repair(&mut child, cache, params, rng);
    child
}

/// Mutation: add or remove one eligible trainset within bounds, and
/// occasionally swap two positions in the running order.
fn mutate(
    subset: &mut Vec<usize>,
    cache: &EvaluationCache,
    params: &OptimizationParameters,
    rng: &mut StdRng,
) {
    let add = rng.gen_bool(0.5);
    if add && subset.len() < params.max_trainsets {
        let present: std::collections::HashSet<usize> = subset.iter().copied().collect();
        let candidates: Vec<usize> = cache
            .eligible
            .iter()
            .copied()
            .filter(|i| !present.contains(i))
            .collect();
        if let Some(&pick) = candidates.as_slice().choose(rng) {
            subset.push(pick);
        }
    } else if !add && subset.len() > params.min_trainsets {
        let victim = rng.gen_range(0..subset.len());
        subset.remove(victim);
    }

    if subset.len() >= 2 && rng.gen_bool(0.5) {
        let x = rng.gen_range(0..subset.len());
        let y = rng.gen_range(0..subset.len());
        subset.swap(x, y);
    }
}

/// Bring a subset back into `[min, max]` using random eligible additions and
/// random removals.
fn repair(
    subset: &mut Vec<usize>,
    cache: &EvaluationCache,
    params: &OptimizationParameters,
    rng: &mut StdRng,
) {
    let max_reachable = cache.eligible.len();
    while subset.len() < params.min_trainsets.min(max_reachable) {
        let present: std::collections::HashSet<usize> = subset.iter().copied().collect();
        let candidates: Vec<usize> = cache
            .eligible
            .iter()
            .copied()
            .filter(|i| !present.contains(i))
            .collect();
        match candidates.as_slice().choose(rng) {
            Some(&pick) => subset.push(pick),
            None => break,
        }
    }
    while subset.len() > params.max_trainsets {
        let victim = rng.gen_range(0..subset.len());
        subset.remove(victim);
    }
}

/// Random initial subset within the size bounds.
fn random_subset(
    cache: &EvaluationCache,
    params: &OptimizationParameters,
    rng: &mut StdRng,
) -> Vec<usize> {
    let upper = params.max_trainsets.min(cache.eligible.len());
    let lower = params.min_trainsets.min(upper);
    let size = if lower >= upper {
        upper
    } else {
        rng.gen_range(lower..=upper)
    };
    let mut pool = cache.eligible.clone();
    pool.shuffle(rng);
    pool.truncate(size);
    pool
}

// ============================================================================
// Search loop
// ============================================================================

/// Why the search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Completed,
    Cancelled,
    TimedOut,
}

/// Per-generation snapshot handed to the progress callback.
#[derive(Debug, Clone)]
pub struct GenerationSnapshot {
    pub generation: usize,
    pub max_generations: usize,
    pub stats: PopulationStats,
    /// Current first front, cloned for observers
    pub pareto_front: Vec<Individual>,
    pub best: Option<Individual>,
}

/// Final search outcome with the last population preserved.
#[derive(Debug)]
pub struct SearchOutcome {
    pub pareto_front: Vec<Individual>,
    pub best: Option<Individual>,
    pub population: Vec<Individual>,
    pub generations_completed: usize,
    pub stats: PopulationStats,
    pub stop: StopReason,
}

/// Run the evolutionary search.
///
/// Cancellation is honored at generation boundaries and inside the offspring
/// loop; `deadline` turns the whole run into a TIMED_OUT outcome while
/// preserving partial state.
pub fn run_search(
    cache: &EvaluationCache,
    params: &OptimizationParameters,
    deadline: Option<Instant>,
    cancel: &CancellationToken,
    mut on_generation: impl FnMut(&GenerationSnapshot),
) -> SearchOutcome {
    let mut rng = StdRng::seed_from_u64(params.seed);

    // Initial population
    let subsets: Vec<Vec<usize>> = (0..params.population_size)
        .map(|_| random_subset(cache, params, &mut rng))
        .collect();
    let mut population: Vec<Individual> = subsets
        .into_par_iter()
        .map(|s| evaluate(cache, params, s))
        .collect();

    let mut stop = StopReason::Completed;
    let mut generations_completed = 0;

    // Soft per-generation budget; overruns are logged, the hard deadline
    // is what actually stops the run.
    const GENERATION_SOFT_BUDGET: std::time::Duration = std::time::Duration::from_secs(2);

    for generation in 0..params.max_generations {
        if cancel.is_cancelled() {
            stop = StopReason::Cancelled;
            break;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            stop = StopReason::TimedOut;
            break;
        }
        let generation_started = Instant::now();

        // Rank the current population
        let fronts = non_dominated_sort(&mut population);
        for front in &fronts {
            crowding_distance(&mut population, front);
        }

        // Elites carry over unchanged
        let elite_count =
            ((params.population_size as f64 * params.elitism).round() as usize).max(1);
        let mut order: Vec<usize> = (0..population.len()).collect();
        order.sort_by(|&x, &y| {
            population[x]
                .rank
                .cmp(&population[y].rank)
                .then_with(|| {
                    population[y]
                        .crowding
                        .partial_cmp(&population[x].crowding)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        let mut offspring: Vec<Vec<usize>> = Vec::with_capacity(params.population_size);
        let elites: Vec<Individual> = order
            .iter()
            .take(elite_count)
            .map(|&i| population[i].clone())
            .collect();

        // Fill the rest with crossover + mutation
        let mut since_check = 0usize;
        while elites.len() + offspring.len() < params.population_size {
            since_check += 1;
            if since_check % 16 == 0 && cancel.is_cancelled() {
                break;
            }
            let parent_a = tournament_select(&population, &mut rng);
            let parent_b = tournament_select(&population, &mut rng);
            let mut child = if rng.gen_bool(params.crossover_rate) {
                crossover(parent_a, parent_b, cache, params, &mut rng)
            } else {
                parent_a.subset.clone()
            };
            if rng.gen_bool(params.mutation_rate) {
                mutate(&mut child, cache, params, &mut rng);
            }
            offspring.push(child);
        }

        let mut next: Vec<Individual> = offspring
            .into_par_iter()
            .map(|s| evaluate(cache, params, s))
            .collect();
        let mut merged = elites;
        merged.append(&mut next);
        population = merged;
        generations_completed = generation + 1;

        // Re-rank for observation
        let fronts = non_dominated_sort(&mut population);
        for front in &fronts {
            crowding_distance(&mut population, front);
        }
        let snapshot = snapshot_of(&population, &fronts, generation + 1, params.max_generations);
        debug!(
            generation = generation + 1,
            best = snapshot.stats.best_fitness,
            pareto = snapshot.stats.pareto_front_size,
            "Generation evolved"
        );
        if generation_started.elapsed() > GENERATION_SOFT_BUDGET {
            warn!(
                generation = generation + 1,
                elapsed_ms = generation_started.elapsed().as_millis() as u64,
                "Generation exceeded its soft budget"
            );
        }
        on_generation(&snapshot);
    }

    // Final ranking for the outcome
    let fronts = non_dominated_sort(&mut population);
    for front in &fronts {
        crowding_distance(&mut population, front);
    }
    let snapshot = snapshot_of(&population, &fronts, generations_completed, params.max_generations);

    SearchOutcome {
        pareto_front: snapshot.pareto_front,
        best: snapshot.best,
        population,
        generations_completed,
        stats: snapshot.stats,
        stop,
    }
}

fn snapshot_of(
    population: &[Individual],
    fronts: &[Vec<usize>],
    generation: usize,
    max_generations: usize,
) -> GenerationSnapshot {
    let pareto_front: Vec<Individual> = fronts
        .first()
        .map(|front| front.iter().map(|&i| population[i].clone()).collect())
        .unwrap_or_default();
    let best = population
        .iter()
        .max_by(|a, b| a.fitness.partial_cmp(&b.fitness).unwrap_or(std::cmp::Ordering::Equal))
        .cloned();

    let fitnesses: Vec<f64> = population.iter().map(|i| i.fitness).collect();
    let mean = statrs::statistics::Statistics::mean(fitnesses.iter().copied());
    let std_dev = if fitnesses.len() > 1 {
        statrs::statistics::Statistics::std_dev(fitnesses.iter().copied())
    } else {
        0.0
    };

    GenerationSnapshot {
        generation,
        max_generations,
        stats: PopulationStats {
            generation,
            best_fitness: best.as_ref().map_or(0.0, |b| b.fitness),
            mean_fitness: mean,
            fitness_std_dev: std_dev,
            feasible_count: population.iter().filter(|i| i.is_feasible()).count(),
            pareto_front_size: pareto_front.len(),
        },
        pareto_front,
        best,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::fixtures::{make_context, make_trainset};
    use crate::types::{CertificateStatus, FitnessCertificate};
    use chrono::Duration;

    fn cache_of(n: usize) -> EvaluationCache {
        let trainsets = (0..n)
            .map(|i| {
                let mut t = make_trainset(&format!("ts-{i:03}"));
                t.current_mileage = 900.0 + (i as f64) * 10.0;
                t.year_built = 2015 + (i as i32 % 8);
                t
            })
            .collect();
        let mut ctx = make_context(trainsets);
        let now = ctx.taken_at;
        for i in 0..n {
            ctx.certificates.push(FitnessCertificate {
                id: format!("fc-{i}"),
                trainset_id: format!("ts-{i:03}"),
                issued_at: now - Duration::days(100),
                expires_at: now + Duration::days(100),
                status: CertificateStatus::Valid,
                issuing_authority: "CMRS".to_string(),
            });
        }
        EvaluationCache::build(&ctx)
    }

    fn small_params() -> OptimizationParameters {
        OptimizationParameters {
            population_size: 20,
            max_generations: 10,
            min_trainsets: 5,
            max_trainsets: 10,
            seed: 42,
            ..OptimizationParameters::default()
        }
    }

    #[test]
    fn undersized_subset_is_penalized() {
        let cache = cache_of(20);
        let params = small_params();
        let individual = evaluate(&cache, &params, vec![0, 1]);
        assert_eq!(individual.constraint_score, UNDERSIZE_PENALTY);
        assert!(!individual.is_feasible());
    }

    #[test]
    fn oversized_subset_gets_smaller_penalty() {
        let cache = cache_of(20);
        let params = small_params();
        let individual = evaluate(&cache, &params, (0..12).collect());
        assert_eq!(individual.constraint_score, OVERSIZE_PENALTY);
    }

    #[test]
    fn ineligible_member_zeroes_fitness() {
        let trainsets = vec![make_trainset("ts-000"), make_trainset("ts-001")];
        let ctx = make_context(trainsets); // no certificates at all
        let cache = EvaluationCache::build(&ctx);
        let params = OptimizationParameters {
            min_trainsets: 1,
            max_trainsets: 2,
            ..small_params()
        };
        let individual = evaluate(&cache, &params, vec![0]);
        assert_eq!(individual.fitness, 0.0);
        assert!(!individual.violations.is_empty());
    }

    #[test]
    fn non_dominated_sort_layers_fronts() {
        let cache = cache_of(20);
        let params = small_params();
        let mut population: Vec<Individual> = (0..10)
            .map(|i| evaluate(&cache, &params, (i..i + 6).collect()))
            .collect();
        let fronts = non_dominated_sort(&mut population);
        assert!(!fronts.is_empty());
        let total: usize = fronts.iter().map(Vec::len).sum();
        assert_eq!(total, population.len());
        // Front ranks are consistent
        for (rank, front) in fronts.iter().enumerate() {
            for &i in front {
                assert_eq!(population[i].rank, rank);
            }
        }
    }

    #[test]
    fn search_completes_within_bounds() {
        let cache = cache_of(20);
        let params = small_params();
        let cancel = CancellationToken::new();
        let outcome = run_search(&cache, &params, None, &cancel, |_| {});

        assert_eq!(outcome.stop, StopReason::Completed);
        assert_eq!(outcome.generations_completed, 10);
        assert!(!outcome.pareto_front.is_empty());
        let best = outcome.best.unwrap();
        assert!(best.subset.len() >= 5 && best.subset.len() <= 10);
        assert!(best.is_feasible());
    }

    #[test]
    fn search_is_reproducible_for_a_seed() {
        let cache = cache_of(20);
        let params = small_params();
        let cancel = CancellationToken::new();
        let a = run_search(&cache, &params, None, &cancel, |_| {});
        let b = run_search(&cache, &params, None, &cancel, |_| {});

        let best_a = a.best.unwrap();
        let best_b = b.best.unwrap();
        assert_eq!(best_a.subset, best_b.subset);
        assert_eq!(best_a.fitness, best_b.fitness);
        assert_eq!(a.stats.mean_fitness, b.stats.mean_fitness);
    }

    #[test]
    fn cancellation_stops_the_search_with_partial_state() {
        let cache = cache_of(20);
        let mut params = small_params();
        params.max_generations = 10_000;
        let cancel = CancellationToken::new();
        let mut seen = 0usize;
        let outcome = run_search(&cache, &params, None, &cancel, |snapshot| {
            seen = snapshot.generation;
            if snapshot.generation >= 3 {
                cancel.cancel();
            }
        });

        assert_eq!(outcome.stop, StopReason::Cancelled);
        assert!(outcome.generations_completed >= 3);
        assert!(outcome.generations_completed < 10_000);
        assert!(!outcome.pareto_front.is_empty());
    }

    #[test]
    fn deadline_times_the_search_out() {
        let cache = cache_of(20);
        let mut params = small_params();
        params.max_generations = 1_000_000;
        let cancel = CancellationToken::new();
        let deadline = Instant::now() + std::time::Duration::from_millis(50);
        let outcome = run_search(&cache, &params, Some(deadline), &cancel, |_| {});

        assert_eq!(outcome.stop, StopReason::TimedOut);
        assert!(outcome.generations_completed < 1_000_000);
    }
}
