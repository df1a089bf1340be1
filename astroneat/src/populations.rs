//! The population pool: speciation, global ranking, staleness pruning and
//! the generation step.

mod species;

pub use species::Species;

use crate::genomics::{Genome, InnovationCounter, MutationCtx};
use crate::params::{OUTPUTS, POPULATION};
use crate::rng::PoolRng;
use crate::Innovation;

/// A population of genomes grouped into species, evolved one generation at
/// a time.
///
/// The pool owns everything below it: species own their genomes, genomes
/// own their genes. Operators that need randomness or innovation allocation
/// borrow those two fields through a [`MutationCtx`], so no back-references
/// exist anywhere and deserialization needs no fixup pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Pool {
    pub species: Vec<Species>,
    pub generation: u32,
    pub max_fitness: i32,
    /// Sensor grid width, in cells.
    pub board_w: usize,
    /// Sensor grid height, in cells.
    pub board_h: usize,
    /// Sensor vector arity: `board_w * board_h`.
    pub input_size: usize,
    /// Evaluation cursor: index of the species currently playing.
    pub current_species: usize,
    /// Evaluation cursor: index of the genome currently playing.
    pub current_genome: usize,
    /// Frame counter within the current episode.
    pub current_frame: u32,
    pub(crate) innovation: InnovationCounter,
    pub(crate) rng: PoolRng,
}

impl Pool {
    /// Creates an empty pool for the given sensor grid. The innovation
    /// counter starts just past the output ids.
    pub fn new(board_w: usize, board_h: usize, rng: PoolRng) -> Pool {
        Pool {
            species: Vec::new(),
            generation: 0,
            max_fitness: 0,
            board_w,
            board_h,
            input_size: board_w * board_h,
            current_species: 0,
            current_genome: 0,
            current_frame: 0,
            innovation: InnovationCounter::starting_at(OUTPUTS),
            rng,
        }
    }

    /// Seeds the initial population: [`POPULATION`] empty genomes, each
    /// mutated once and placed into a compatible species.
    pub fn init(&mut self) {
        for _ in 0..POPULATION {
            let mut genome = Genome::basic(self.input_size);
            let mut ctx = MutationCtx {
                rng: &mut self.rng,
                innovation: &mut self.innovation,
                input_size: self.input_size,
            };
            genome.mutate(&mut ctx);
            self.add_to_species(genome);
        }
        log::info!(
            "seeded {} genomes into {} species",
            POPULATION,
            self.species.len()
        );
    }

    /// Borrows the mutation context off the pool. Useful for driving
    /// genome operators outside the generation step.
    pub fn mutation_ctx(&mut self) -> MutationCtx<'_> {
        MutationCtx {
            rng: &mut self.rng,
            innovation: &mut self.innovation,
            input_size: self.input_size,
        }
    }

    /// Most recently allocated innovation number.
    pub fn innovation(&self) -> Innovation {
        self.innovation.latest()
    }

    /// The genome the evaluation cursor points at.
    pub fn current(&self) -> &Genome {
        &self.species[self.current_species].genomes[self.current_genome]
    }

    /// Mutable access to the genome the evaluation cursor points at.
    pub fn current_mut(&mut self) -> &mut Genome {
        &mut self.species[self.current_species].genomes[self.current_genome]
    }

    /// Assigns every genome its rank in the fitness-sorted population:
    /// 0 for the worst, `n - 1` for the best.
    pub fn rank_globally(&mut self) {
        let mut global: Vec<&mut Genome> = self
            .species
            .iter_mut()
            .flat_map(|s| s.genomes.iter_mut())
            .collect();
        global.sort_by_key(|g| g.fitness);

        for (rank, genome) in global.iter_mut().enumerate() {
            genome.global_rank = rank as i32;
        }
    }

    /// Sum of the species' reproductive weights.
    pub fn total_average_fitness(&self) -> i32 {
        self.species.iter().map(|s| s.average_fitness).sum()
    }

    /// Sorts each species best-first and drops its weaker half, or all but
    /// the champion when `cut_to_one` is set.
    pub fn cull_species(&mut self, cut_to_one: bool) {
        for spec in &mut self.species {
            spec.sort_by_descending_fitness();

            let remaining = if cut_to_one {
                1
            } else {
                (spec.genomes.len() as f32 / 2.0).ceil() as usize
            };
            spec.genomes.truncate(remaining);
        }
    }

    /// Updates each species' staleness against its current champion and
    /// evicts the ones that have gone [`STALE_SPECIES`] generations without
    /// improvement. The species holding the population record is always
    /// protected.
    ///
    /// [`STALE_SPECIES`]: crate::params::STALE_SPECIES
    pub fn remove_stale_species(&mut self) {
        let max_fitness = self.max_fitness;
        self.species.retain_mut(|spec| {
            if spec.genomes.is_empty() {
                spec.staleness += 1;
            } else {
                spec.sort_by_descending_fitness();
                if spec.genomes[0].fitness > spec.top_fitness {
                    spec.top_fitness = spec.genomes[0].fitness;
                    spec.staleness = 0;
                } else {
                    spec.staleness += 1;
                }
            }

            let keep = !spec.is_stale() || spec.top_fitness >= max_fitness;
            if !keep {
                log::debug!(
                    "evicting species stale for {} generations (top fitness {})",
                    spec.staleness,
                    spec.top_fitness
                );
            }
            keep
        });
    }

    /// Drops every species whose proportional share of the next generation
    /// rounds down to zero offspring.
    pub fn remove_weak_species(&mut self) {
        let sum = self.total_average_fitness();
        self.species.retain(|spec| {
            let breed = if sum == 0 {
                0
            } else {
                (spec.average_fitness as f32 / sum as f32 * POPULATION as f32).floor() as i32
            };
            let keep = breed >= 1;
            if !keep {
                log::debug!(
                    "evicting weak species (average fitness {} of {})",
                    spec.average_fitness,
                    sum
                );
            }
            keep
        });
    }

    /// Places a child into the first species whose representative (the
    /// cohort's first genome) is compatible, founding a new species when
    /// none is.
    pub fn add_to_species(&mut self, child: Genome) {
        for spec in &mut self.species {
            if let Some(representative) = spec.genomes.first() {
                if Species::same_species(&child, representative) {
                    spec.genomes.push(child);
                    return;
                }
            }
        }
        self.species.push(Species::from_founder(child));
    }

    /// Runs one full generation step: culling, ranking, staleness and
    /// weakness pruning, reproduction proportional to shared fitness, and
    /// re-speciation of the offspring. Every genome must carry a fitness
    /// before this is called; afterwards the population again holds exactly
    /// [`POPULATION`] genomes, one measured champion per surviving species
    /// and the rest fresh children.
    pub fn new_generation(&mut self) {
        // Cull the bottom half of each species.
        self.cull_species(false);
        self.rank_globally();
        self.remove_stale_species();
        self.rank_globally();
        for spec in &mut self.species {
            spec.calculate_average_fitness();
        }
        self.remove_weak_species();

        let sum = self.total_average_fitness();
        let mut children: Vec<Genome> = Vec::new();
        {
            let Pool {
                species,
                rng,
                innovation,
                input_size,
                ..
            } = self;
            let mut ctx = MutationCtx {
                rng,
                innovation,
                input_size: *input_size,
            };
            for spec in species.iter() {
                let breed =
                    (spec.average_fitness as f32 / sum as f32 * POPULATION as f32).floor() as i32
                        - 1;
                for _ in 0..breed {
                    children.push(spec.breed_child(&mut ctx));
                }
            }
        }

        // Cull all but the top member of each species.
        self.cull_species(true);

        {
            let Pool {
                species,
                rng,
                innovation,
                input_size,
                ..
            } = self;
            let mut ctx = MutationCtx {
                rng,
                innovation,
                input_size: *input_size,
            };
            while children.len() + species.len() < POPULATION {
                let spec = &species[ctx.rng.index(species.len())];
                children.push(spec.breed_child(&mut ctx));
            }
        }

        for child in children {
            self.add_to_species(child);
        }

        self.generation += 1;
        log::info!(
            "generation {}: {} species, max fitness {}",
            self.generation,
            self.species.len(),
            self.max_fitness
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::genomics::Gene;
    use crate::params::{MAX_NODES, STALE_SPECIES};

    fn test_pool() -> Pool {
        Pool::new(2, 2, PoolRng::from_seed(42))
    }

    fn genome_with_fitness(fitness: i32) -> Genome {
        let mut genome = Genome::basic(4);
        genome.fitness = fitness;
        genome
    }

    fn total_genomes(pool: &Pool) -> usize {
        pool.species.iter().map(|s| s.genomes.len()).sum()
    }

    #[test]
    fn init_seeds_a_full_population() {
        let mut pool = test_pool();
        pool.init();

        assert_eq!(total_genomes(&pool), POPULATION);
        assert!(!pool.species.is_empty());
        assert!(pool.species.len() <= POPULATION);
        assert!(pool.current_species < pool.species.len());
    }

    #[test]
    fn init_is_deterministic_for_a_fixed_seed() {
        let mut a = Pool::new(8, 8, PoolRng::from_seed(42));
        let mut b = Pool::new(8, 8, PoolRng::from_seed(42));
        a.init();
        b.init();

        assert_eq!(a, b);
    }

    #[test]
    fn new_generation_restores_the_population_size() {
        let mut pool = test_pool();
        pool.init();

        pool.new_generation();
        assert_eq!(total_genomes(&pool), POPULATION);
        assert_eq!(pool.generation, 1);

        pool.new_generation();
        assert_eq!(total_genomes(&pool), POPULATION);
        assert_eq!(pool.generation, 2);
    }

    #[test]
    fn rank_globally_orders_by_ascending_fitness() {
        let mut pool = test_pool();
        pool.species.push(Species::from_founder(genome_with_fitness(30)));
        pool.species[0].genomes.push(genome_with_fitness(-1));
        pool.species.push(Species::from_founder(genome_with_fitness(12)));

        pool.rank_globally();

        let rank_of = |fitness: i32| {
            pool.species
                .iter()
                .flat_map(|s| &s.genomes)
                .find(|g| g.fitness == fitness)
                .unwrap()
                .global_rank
        };
        assert_eq!(rank_of(-1), 0);
        assert_eq!(rank_of(12), 1);
        assert_eq!(rank_of(30), 2);
    }

    #[test]
    fn cull_keeps_the_better_half_rounded_up() {
        let mut pool = test_pool();
        let mut spec = Species::default();
        for fitness in [5, 1, 4, 2, 3] {
            spec.genomes.push(genome_with_fitness(fitness));
        }
        pool.species.push(spec);

        pool.cull_species(false);
        let fitnesses: Vec<i32> = pool.species[0].genomes.iter().map(|g| g.fitness).collect();
        assert_eq!(fitnesses, vec![5, 4, 3]);

        pool.cull_species(true);
        let fitnesses: Vec<i32> = pool.species[0].genomes.iter().map(|g| g.fitness).collect();
        assert_eq!(fitnesses, vec![5]);
    }

    #[test]
    fn stale_species_are_evicted_unless_they_hold_the_record() {
        let mut pool = test_pool();
        pool.max_fitness = 100;

        let mut stale = Species::from_founder(genome_with_fitness(10));
        stale.top_fitness = 50;
        stale.staleness = STALE_SPECIES - 1;
        pool.species.push(stale);

        let mut record_holder = Species::from_founder(genome_with_fitness(10));
        record_holder.top_fitness = 100;
        record_holder.staleness = STALE_SPECIES - 1;
        pool.species.push(record_holder);

        // Neither improves, so both cross the staleness threshold.
        pool.remove_stale_species();

        assert_eq!(pool.species.len(), 1);
        assert_eq!(pool.species[0].top_fitness, 100);
    }

    #[test]
    fn improving_species_reset_their_staleness() {
        let mut pool = test_pool();
        let mut spec = Species::from_founder(genome_with_fitness(60));
        spec.top_fitness = 50;
        spec.staleness = STALE_SPECIES - 1;
        pool.species.push(spec);

        pool.remove_stale_species();

        assert_eq!(pool.species.len(), 1);
        assert_eq!(pool.species[0].staleness, 0);
        assert_eq!(pool.species[0].top_fitness, 60);
    }

    #[test]
    fn weak_species_lose_their_slot() {
        let mut pool = test_pool();

        let mut strong = Species::from_founder(genome_with_fitness(0));
        strong.average_fitness = 299;
        pool.species.push(strong);

        let mut weak = Species::from_founder(genome_with_fitness(0));
        weak.average_fitness = 0;
        pool.species.push(weak);

        pool.remove_weak_species();

        assert_eq!(pool.species.len(), 1);
        assert_eq!(pool.species[0].average_fitness, 299);
    }

    #[test]
    fn add_to_species_reuses_compatible_cohorts() {
        let mut pool = test_pool();

        let mut founder = Genome::basic(4);
        founder.genes.push(Gene::link(0, MAX_NODES, 1.0, 5));
        pool.add_to_species(founder.replicate());

        // A structural twin joins the existing cohort.
        pool.add_to_species(founder.replicate());
        assert_eq!(pool.species.len(), 1);
        assert_eq!(pool.species[0].genomes.len(), 2);

        // A fully disjoint genome founds a new one.
        let mut alien = Genome::basic(4);
        alien.genes.push(Gene::link(1, MAX_NODES + 1, 1.0, 6));
        alien.genes.push(Gene::link(2, MAX_NODES + 2, 1.0, 7));
        pool.add_to_species(alien);
        assert_eq!(pool.species.len(), 2);
    }

    #[test]
    fn generation_step_with_measured_fitnesses_keeps_species_champions() {
        let mut pool = test_pool();
        pool.init();

        // Hand out distinct fitnesses.
        let mut fitness = 0;
        for spec in &mut pool.species {
            for genome in &mut spec.genomes {
                fitness += 1;
                genome.fitness = fitness;
            }
        }
        pool.max_fitness = fitness;

        pool.new_generation();

        assert_eq!(total_genomes(&pool), POPULATION);
        // Each surviving species kept exactly its champion; everything else
        // is an unmeasured child.
        let measured = pool
            .species
            .iter()
            .flat_map(|s| &s.genomes)
            .filter(|g| g.fitness != 0)
            .count();
        assert!(measured >= 1);
        assert!(measured <= pool.species.len());
    }
}
