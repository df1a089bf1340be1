//! Species are cohorts of reproductively compatible genomes. Membership is
//! decided against the cohort's first genome, and reproductive share is
//! settled by the globally ranked fitness of the members (fitness sharing
//! by rank rather than raw score).

use crate::genomics::{Gene, Genome, MutationCtx};
use crate::params::{
    CROSSOVER_CHANCE, DELTA_DISJOINT, DELTA_THRESHOLD, DELTA_WEIGHTS, STALE_SPECIES,
};
use crate::Innovation;

use ahash::RandomState;

use std::collections::{HashMap, HashSet};

/// A cohort of compatible genomes competing internally for reproductive
/// share.
///
/// `top_fitness` tracks the best score the cohort has ever produced;
/// [`staleness`] counts the consecutive generations without improving it.
///
/// [`staleness`]: crate::params::STALE_SPECIES
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Species {
    pub genomes: Vec<Genome>,
    pub top_fitness: i32,
    pub staleness: u32,
    pub average_fitness: i32,
}

impl Species {
    /// Creates a new species housing its founding genome.
    pub fn from_founder(genome: Genome) -> Species {
        Species {
            genomes: vec![genome],
            ..Species::default()
        }
    }

    /// Fraction of genes carried by exactly one of the two genomes,
    /// normalized by the larger gene count. Both treated empty gives 0.
    ///
    /// # Examples
    /// ```
    /// use astroneat::{Gene, Genome, Species};
    ///
    /// let mut g1 = Genome::new();
    /// let mut g2 = Genome::new();
    /// for innovation in [1, 2] {
    ///     g1.genes.push(Gene::link(0, 1_000_000, 0.0, innovation));
    /// }
    /// for innovation in [2, 3] {
    ///     g2.genes.push(Gene::link(0, 1_000_000, 0.0, innovation));
    /// }
    ///
    /// // Innovations 1 and 3 are unmatched: 2 mismatches over max(2, 2).
    /// assert_eq!(Species::disjoint(&g1, &g2), 1.0);
    /// ```
    pub fn disjoint(g1: &Genome, g2: &Genome) -> f32 {
        let i1: HashSet<Innovation, RandomState> =
            g1.genes.iter().map(|g| g.innovation).collect();
        let i2: HashSet<Innovation, RandomState> =
            g2.genes.iter().map(|g| g.innovation).collect();

        let mut mismatched = 0usize;
        for gene in &g1.genes {
            if !i2.contains(&gene.innovation) {
                mismatched += 1;
            }
        }
        for gene in &g2.genes {
            if !i1.contains(&gene.innovation) {
                mismatched += 1;
            }
        }

        let n = g1.genes.len().max(g2.genes.len());
        if n == 0 {
            0.0
        } else {
            mismatched as f32 / n as f32
        }
    }

    /// Mean absolute weight difference across coincident innovations.
    /// Genomes with no coincident genes compare as 0.
    pub fn weights(g1: &Genome, g2: &Genome) -> f32 {
        let lookup: HashMap<Innovation, f32, RandomState> = g2
            .genes
            .iter()
            .map(|g| (g.innovation, g.weight))
            .collect();

        let mut sum = 0.0;
        let mut coincident = 0usize;
        for gene in &g1.genes {
            if let Some(other) = lookup.get(&gene.innovation) {
                sum += (gene.weight - other).abs();
                coincident += 1;
            }
        }

        if coincident == 0 {
            0.0
        } else {
            sum / coincident as f32
        }
    }

    /// Whether two genomes fall within the compatibility threshold.
    pub fn same_species(g1: &Genome, g2: &Genome) -> bool {
        let dd = DELTA_DISJOINT * Species::disjoint(g1, g2);
        let dw = DELTA_WEIGHTS * Species::weights(g1, g2);
        dd + dw < DELTA_THRESHOLD
    }

    /// Mates two genomes, aligning their genes by innovation number.
    ///
    /// The fitter parent dominates: the child carries one gene per gene of
    /// the dominant parent, taking the other parent's version on a coin
    /// flip when a matching enabled gene exists. On a fitness tie the
    /// argument order decides dominance. The child inherits the dominant
    /// parent's mutation rates and the larger `max_neuron`.
    pub fn crossover(g1: &Genome, g2: &Genome, ctx: &mut MutationCtx) -> Genome {
        // Make sure g1 is the higher-fitness genome.
        let (g1, g2) = if g2.fitness > g1.fitness {
            (g2, g1)
        } else {
            (g1, g2)
        };

        let lookup: HashMap<Innovation, &Gene, RandomState> =
            g2.genes.iter().map(|g| (g.innovation, g)).collect();

        let mut child = Genome::new();
        for gene in &g1.genes {
            let mut pick = gene.clone();
            if let Some(other) = lookup.get(&gene.innovation) {
                if ctx.rng.next_u8() % 2 == 0 && other.enabled {
                    pick = (*other).clone();
                }
            }
            child.genes.push(pick);
        }

        child.max_neuron = g1.max_neuron.max(g2.max_neuron);
        child.rates = g1.rates.clone();

        child
    }

    /// Breeds one child: a crossover of two members picked with
    /// replacement, or a structural clone of a single member, followed by
    /// mutation.
    ///
    /// # Panics
    /// Panics when called on an empty species; culling never leaves a
    /// species empty, so this is a programmer error.
    pub fn breed_child(&self, ctx: &mut MutationCtx) -> Genome {
        assert!(!self.genomes.is_empty(), "breed_child on an empty species");

        let mut child = if ctx.rng.next_f32() < CROSSOVER_CHANCE {
            let g1 = &self.genomes[ctx.rng.index(self.genomes.len())];
            let g2 = &self.genomes[ctx.rng.index(self.genomes.len())];
            Species::crossover(g1, g2, ctx)
        } else {
            self.genomes[ctx.rng.index(self.genomes.len())].replicate()
        };

        child.mutate(ctx);
        child
    }

    /// Recomputes the cohort's reproductive weight as the mean global rank
    /// of its members (ranks are already fitness-normalized).
    pub fn calculate_average_fitness(&mut self) {
        let total: i32 = self.genomes.iter().map(|g| g.global_rank).sum();
        self.average_fitness = if self.genomes.is_empty() {
            0
        } else {
            total / self.genomes.len() as i32
        };
    }

    /// Sorts members best-first.
    pub fn sort_by_descending_fitness(&mut self) {
        self.genomes.sort_by(|a, b| b.fitness.cmp(&a.fitness));
    }

    /// Whether the species has gone [`STALE_SPECIES`] generations without
    /// improvement.
    pub fn is_stale(&self) -> bool {
        self.staleness >= STALE_SPECIES
    }
}
