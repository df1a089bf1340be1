//! Genomes are the focus of evolution. Each one is a flat list of edge
//! [`Gene`]s plus a per-genome table of mutation rates, and can be
//! instantiated as a [`Network`] phenotype. Five mutation operators
//! progressively grow and rewire the encoded topology.

mod genes;

pub use genes::Gene;

use crate::networks::Network;
use crate::params::{
    BIAS_MUTATION_CHANCE, DISABLE_MUTATION_CHANCE, ENABLE_MUTATION_CHANCE, LINK_MUTATION_CHANCE,
    MAX_NODES, MUTATE_CONNECTIONS_CHANCE, NODE_MUTATION_CHANCE, OUTPUTS, PERTURB_CHANCE, STEP_SIZE,
};
use crate::rng::PoolRng;
use crate::{Innovation, NeuronId};

use serde::{Deserialize, Serialize};

use std::collections::BTreeSet;

/// Monotonic allocator for historical markings.
///
/// Every structural mutation burns a fresh number, even when it recreates a
/// topology some other genome already has: markings are per-event, not
/// per-structure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InnovationCounter(Innovation);

impl InnovationCounter {
    /// Returns a counter whose first allocated number is `start + 1`.
    pub fn starting_at(start: Innovation) -> InnovationCounter {
        InnovationCounter(start)
    }

    /// Allocates and returns the next innovation number.
    pub fn allocate(&mut self) -> Innovation {
        self.0 += 1;
        self.0
    }

    /// Returns the most recently allocated number.
    pub fn latest(&self) -> Innovation {
        self.0
    }
}

/// Split borrow of the pool handed to the mutation and breeding operators.
///
/// The pool owns the run's random source and innovation counter; operators
/// working on a genome inside the pool borrow exactly these two fields,
/// which keeps the species list free for simultaneous traversal.
pub struct MutationCtx<'a> {
    pub rng: &'a mut PoolRng,
    pub innovation: &'a mut InnovationCounter,
    pub input_size: usize,
}

/// Per-genome mutation rates, inherited by children and jittered on every
/// `mutate` call. Serializes as a flat name-to-rate map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MutationRates {
    pub connections: f32,
    pub link: f32,
    pub bias: f32,
    pub node: f32,
    pub enable: f32,
    pub disable: f32,
    pub step: f32,
}

impl Default for MutationRates {
    fn default() -> MutationRates {
        MutationRates {
            connections: MUTATE_CONNECTIONS_CHANCE,
            link: LINK_MUTATION_CHANCE,
            bias: BIAS_MUTATION_CHANCE,
            node: NODE_MUTATION_CHANCE,
            enable: ENABLE_MUTATION_CHANCE,
            disable: DISABLE_MUTATION_CHANCE,
            step: STEP_SIZE,
        }
    }
}

impl MutationRates {
    /// Nudges every rate up or down on a coin flip. Rates are visited in
    /// declaration order so the random sequence is stable across runs.
    fn jitter(&mut self, rng: &mut PoolRng) {
        for rate in [
            &mut self.connections,
            &mut self.link,
            &mut self.bias,
            &mut self.node,
            &mut self.enable,
            &mut self.disable,
            &mut self.step,
        ] {
            if rng.next_u32() % 2 == 0 {
                *rate *= 0.95;
            } else {
                *rate *= 1.05263;
            }
        }
    }
}

/// A mutable collection of edge genes, the fitness measured for it, and the
/// phenotype most recently built from it.
///
/// A fitness of 0 means "not yet measured": the driver coerces a genuinely
/// zero episode score to -1 so the two cases stay distinguishable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Genome {
    pub genes: Vec<Gene>,
    pub fitness: i32,
    pub adjusted_fitness: i32,
    pub global_rank: i32,
    /// Highest hidden neuron id allocated so far; the next node mutation
    /// claims `max_neuron + 1`.
    pub max_neuron: NeuronId,
    pub rates: MutationRates,
    pub network: Network,
}

impl Genome {
    /// Returns an empty genome with default mutation rates.
    pub fn new() -> Genome {
        Genome::default()
    }

    /// Returns an empty genome ready for seeding into a pool with the given
    /// input arity. Hidden ids start right above the bias input.
    pub fn basic(input_size: usize) -> Genome {
        Genome {
            max_neuron: input_size,
            ..Genome::default()
        }
    }

    /// Structural clone used for asexual reproduction: copies genes,
    /// `max_neuron` and rates, and leaves fitness and ranks unmeasured.
    pub fn replicate(&self) -> Genome {
        Genome {
            genes: self.genes.clone(),
            max_neuron: self.max_neuron,
            rates: self.rates.clone(),
            ..Genome::default()
        }
    }

    /// Whether a gene with the given endpoints already exists.
    pub fn contains_link(&self, into: NeuronId, out: NeuronId) -> bool {
        self.genes.iter().any(|g| g.into == into && g.out == out)
    }

    /// Picks a uniformly random neuron id referenced by this genome.
    ///
    /// The candidate set always holds the output ids, plus the input ids
    /// when `non_input` is false, plus every gene endpoint (endpoints at or
    /// below the bias id are filtered out when `non_input` is true).
    /// Candidates collect into an ordered set, so the pick is deterministic
    /// for a given random sequence. An empty candidate set yields id 0.
    pub fn random_neuron(&self, non_input: bool, ctx: &mut MutationCtx) -> NeuronId {
        let mut candidates: BTreeSet<NeuronId> = BTreeSet::new();

        if !non_input {
            for i in 0..ctx.input_size {
                candidates.insert(i);
            }
        }

        for o in 0..OUTPUTS {
            candidates.insert(MAX_NODES + o);
        }

        for gene in &self.genes {
            if !non_input || gene.into > ctx.input_size {
                candidates.insert(gene.into);
            }
            if !non_input || gene.out > ctx.input_size {
                candidates.insert(gene.out);
            }
        }

        if candidates.is_empty() {
            return 0;
        }

        let n = ctx.rng.index(candidates.len());
        candidates.into_iter().nth(n).unwrap_or(0)
    }

    /// Point mutation: perturbs every weight by up to the genome's step
    /// size, or replaces it with a fresh value in `[-2, 2]`.
    pub fn point_mutate(&mut self, ctx: &mut MutationCtx) {
        let step = self.rates.step;

        for gene in &mut self.genes {
            if ctx.rng.next_f32() < PERTURB_CHANCE {
                gene.weight += ctx.rng.next_f32() * step * 2.0 - step;
            } else {
                gene.weight = ctx.rng.next_f32() * 4.0 - 2.0;
            }
        }
    }

    /// Link mutation: connects two referenced neurons with a new gene.
    ///
    /// Aborts when both picks land on inputs, when the pair is already
    /// connected, or when the picks coincide. If the sink pick is an input,
    /// the endpoints swap so the edge always feeds forward out of the input
    /// layer. `force_bias` reroutes the source to the bias input. An aborted
    /// mutation burns no innovation number.
    pub fn link_mutate(&mut self, force_bias: bool, ctx: &mut MutationCtx) {
        let n1 = self.random_neuron(false, ctx);
        let n2 = self.random_neuron(true, ctx);

        if n1 <= ctx.input_size && n2 <= ctx.input_size {
            // both input nodes
            return;
        }

        let (mut into, out) = if n2 <= ctx.input_size {
            (n2, n1)
        } else {
            (n1, n2)
        };
        if force_bias {
            into = ctx.input_size;
        }

        if into == out || self.contains_link(into, out) {
            return;
        }

        let innovation = ctx.innovation.allocate();
        let weight = ctx.rng.next_f32() * 4.0 - 2.0;
        self.genes.push(Gene::link(into, out, weight, innovation));
    }

    /// Node mutation: splits a random enabled gene in two, routing it
    /// through a freshly allocated hidden neuron.
    ///
    /// The incoming half gets weight 1.0, the outgoing half keeps the
    /// original weight, and the split gene is disabled. The hidden id is
    /// claimed before the gene pick; a pick that lands on a disabled gene
    /// aborts with the id already spent.
    pub fn node_mutate(&mut self, ctx: &mut MutationCtx) {
        if self.genes.is_empty() {
            return;
        }

        self.max_neuron += 1;

        let picked = ctx.rng.index(self.genes.len());
        if !self.genes[picked].enabled {
            return;
        }
        self.genes[picked].enabled = false;
        let gene = self.genes[picked].clone();

        let front = Gene {
            out: self.max_neuron,
            weight: 1.0,
            enabled: true,
            innovation: ctx.innovation.allocate(),
            ..gene.clone()
        };
        self.genes.push(front);

        let back = Gene {
            into: self.max_neuron,
            enabled: true,
            innovation: ctx.innovation.allocate(),
            ..gene
        };
        self.genes.push(back);
    }

    /// Flips the enabled bit on one uniformly chosen gene whose state
    /// differs from `enable`. No-op when no such gene exists.
    pub fn enable_disable_mutate(&mut self, enable: bool, ctx: &mut MutationCtx) {
        let candidates: Vec<usize> = self
            .genes
            .iter()
            .enumerate()
            .filter(|(_, g)| g.enabled != enable)
            .map(|(i, _)| i)
            .collect();

        if candidates.is_empty() {
            return;
        }

        let picked = candidates[ctx.rng.index(candidates.len())];
        self.genes[picked].enabled = !self.genes[picked].enabled;
    }

    /// Top-level mutation: jitters the rate table, then applies each
    /// operator a stochastic number of times.
    ///
    /// A rate above 1 acts as an expected count: its integer part gives
    /// guaranteed attempts and the fractional remainder a final Bernoulli
    /// trial.
    pub fn mutate(&mut self, ctx: &mut MutationCtx) {
        self.rates.jitter(ctx.rng);

        if ctx.rng.next_f32() < self.rates.connections {
            self.point_mutate(ctx);
        }

        let mut p = self.rates.link;
        while p > 0.0 {
            if ctx.rng.next_f32() < p {
                self.link_mutate(false, ctx);
            }
            p -= 1.0;
        }

        let mut p = self.rates.bias;
        while p > 0.0 {
            if ctx.rng.next_f32() < p {
                self.link_mutate(true, ctx);
            }
            p -= 1.0;
        }

        let mut p = self.rates.node;
        while p > 0.0 {
            if ctx.rng.next_f32() < p {
                self.node_mutate(ctx);
            }
            p -= 1.0;
        }

        let mut p = self.rates.enable;
        while p > 0.0 {
            if ctx.rng.next_f32() < p {
                self.enable_disable_mutate(true, ctx);
            }
            p -= 1.0;
        }

        let mut p = self.rates.disable;
        while p > 0.0 {
            if ctx.rng.next_f32() < p {
                self.enable_disable_mutate(false, ctx);
            }
            p -= 1.0;
        }
    }

    /// Rebuilds the phenotype from the current gene list.
    ///
    /// Genes sort ascending by sink id first, so synapse order within a
    /// neuron is reproducible.
    pub fn build_network(&mut self, input_size: usize) {
        self.genes.sort_by_key(|g| g.out);
        self.network = Network::assemble(&self.genes, input_size);
    }

    /// Runs one forward pass over the phenotype. A sensor vector of the
    /// wrong arity yields an empty output vector, never a partial one.
    pub fn evaluate_network(&mut self, inputs: &[i32]) -> Vec<bool> {
        match self.network.evaluate(inputs) {
            Ok(outputs) => outputs,
            Err(e) => {
                log::warn!("{}", e);
                Vec::new()
            }
        }
    }
}
