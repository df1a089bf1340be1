//! An implementation of NeuroEvolution of Augmenting Topologies that evolves
//! sparse feed-forward controllers for a 2D arcade shooter.
//!
//! The engine maintains a [`Pool`] of 300 genomes partitioned into species by
//! genetic compatibility. Each genome is a flat list of weighted, historically
//! marked edge genes from which a [`Network`] phenotype is rebuilt at the
//! start of every episode. A [`Driver`] walks the population one genome at a
//! time, feeding the game's sensor grid through the network every few frames
//! and translating the four output neurons into button presses. When an
//! episode times out, the measured fitness is stored on the genome and the
//! cursor advances; once every genome has been measured, the pool breeds the
//! next generation.
//!
//! The game itself is an external collaborator behind the [`GameInterface`]
//! trait: the engine only ever sees an opaque sensor vector and hands back a
//! [`ControllerOutput`].
//!
//! # Example usage: evolving a population without a game
//! ```
//! use astroneat::{Pool, PoolRng, POPULATION};
//!
//! let mut pool = Pool::new(8, 8, PoolRng::from_seed(42));
//! pool.init();
//!
//! let total: usize = pool.species.iter().map(|s| s.genomes.len()).sum();
//! assert_eq!(total, POPULATION);
//!
//! // Breeding a new generation keeps the population size fixed.
//! pool.new_generation();
//! let total: usize = pool.species.iter().map(|s| s.genomes.len()).sum();
//! assert_eq!(total, POPULATION);
//! ```

pub mod driver;
pub mod genomics;
pub mod networks;
pub mod params;
pub mod populations;
pub mod rng;
pub mod snapshot;

pub use driver::{ControllerOutput, Driver, GameInterface, PlayerStatus};
pub use genomics::{Gene, Genome, InnovationCounter, MutationCtx, MutationRates};
pub use networks::{sigmoid, InputArityMismatch, Network, Neuron};
pub use params::{BOX_RADIUS, MAX_NODES, OUTPUTS, POPULATION};
pub use populations::{Pool, Species};
pub use rng::PoolRng;
pub use snapshot::{PoolSnapshot, SnapshotError};

/// Identifier of a neuron within a genome's id space.
///
/// Ids partition by role: `0..input_size` are the sensor inputs, `input_size`
/// is the bias input, `(input_size, MAX_NODES)` are hidden neurons allocated
/// by node mutations, and `MAX_NODES + o` is output `o`.
pub type NeuronId = usize;

/// Identifier type used to designate historically unique structural
/// mutations, for the purposes of genome alignment during crossover
/// and compatibility computation.
pub type Innovation = usize;
