//! Design-level constants for the evolutionary run.
//!
//! These are deliberately not runtime-tunable: per-genome mutation rates
//! start from the values below and then drift generation to generation
//! (see [`MutationRates`]).
//!
//! [`MutationRates`]: crate::genomics::MutationRates

/// Number of output neurons, one per controller button.
pub const OUTPUTS: usize = 4;

/// Reserved gap separating hidden neuron ids from output neuron ids.
/// Output `o` lives at id `MAX_NODES + o`; hidden ids must stay below this.
pub const MAX_NODES: usize = 1_000_000;

/// Target population size, restored after every generation step.
pub const POPULATION: usize = 300;

/// Side length of a sensor grid cell, in world units. The game tiles its
/// board on this grid when producing the sensor vector.
pub const BOX_RADIUS: u32 = 100;

/// Weight of the disjoint-gene term in the compatibility distance.
pub const DELTA_DISJOINT: f32 = 2.0;
/// Weight of the mean-weight-difference term in the compatibility distance.
pub const DELTA_WEIGHTS: f32 = 0.4;
/// Compatibility cut-off: below this, two genomes share a species.
pub const DELTA_THRESHOLD: f32 = 1.0;

/// Generations without improvement before a species is evicted.
pub const STALE_SPECIES: u32 = 15;

/// Chance that a bred child is a crossover rather than a clone.
pub const CROSSOVER_CHANCE: f32 = 0.75;
/// Chance that a point mutation perturbs a weight instead of replacing it.
pub const PERTURB_CHANCE: f32 = 0.90;

/// Initial chance of a point mutation pass over all weights.
pub const MUTATE_CONNECTIONS_CHANCE: f32 = 0.25;
/// Initial expected number of link mutations per `mutate` call.
pub const LINK_MUTATION_CHANCE: f32 = 2.0;
/// Initial expected number of node-split mutations per `mutate` call.
pub const NODE_MUTATION_CHANCE: f32 = 0.50;
/// Initial expected number of bias-link mutations per `mutate` call.
pub const BIAS_MUTATION_CHANCE: f32 = 0.40;
/// Initial expected number of gene re-enables per `mutate` call.
pub const ENABLE_MUTATION_CHANCE: f32 = 0.2;
/// Initial expected number of gene disables per `mutate` call.
pub const DISABLE_MUTATION_CHANCE: f32 = 0.4;
/// Initial perturbation scale for point mutations.
pub const STEP_SIZE: f32 = 0.1;

/// Frames of player inactivity before an episode is cut off.
pub const TIMEOUT_CONSTANT: i32 = 20;
