//! Versioned JSON snapshots of the evolutionary state.
//!
//! Snapshots use a stable schema, decoupled from the in-memory types: every
//! element carries a `version` tag, names are camelCase, and phenotype
//! caches, ranks and cursors are deliberately absent. Loading validates the
//! whole document before anything is built, so a malformed file can never
//! leave a half-mutated pool behind.
//!
//! The pool's random generator state rides along in an optional `rng` field;
//! snapshots written by other tooling may omit it, in which case the loaded
//! pool reseeds from entropy.

use crate::genomics::{Gene, Genome, InnovationCounter, MutationRates};
use crate::params::OUTPUTS;
use crate::populations::{Pool, Species};
use crate::rng::PoolRng;
use crate::NeuronId;

use serde::{Deserialize, Serialize};

use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// Schema version written into (and required of) every snapshot element.
pub const SCHEMA_VERSION: i32 = 0;

/// Canonical save file name.
pub const POOL_FILE: &str = "pool.json";
/// Diagnostic dump written right after initial seeding.
pub const TEMP_FILE: &str = "temp.json";

/// Name of the backup written after the given generation.
pub fn backup_file(generation: u32) -> String {
    format!("backup{}.json", generation)
}

/// An error encountered while writing or reading a snapshot.
#[derive(Debug)]
pub enum SnapshotError {
    /// The file could not be read or written.
    Io(io::Error),
    /// The file is not valid JSON for the snapshot schema.
    Parse(serde_json::Error),
    /// An element declared a schema version this build does not understand.
    VersionMismatch {
        element: &'static str,
        found: i32,
    },
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::Io(e) => write!(f, "snapshot io error: {}", e),
            SnapshotError::Parse(e) => write!(f, "malformed snapshot: {}", e),
            SnapshotError::VersionMismatch { element, found } => write!(
                f,
                "malformed snapshot: {} has version {}, expected {}",
                element, found, SCHEMA_VERSION
            ),
        }
    }
}

impl Error for SnapshotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SnapshotError::Io(e) => Some(e),
            SnapshotError::Parse(e) => Some(e),
            SnapshotError::VersionMismatch { .. } => None,
        }
    }
}

impl From<io::Error> for SnapshotError {
    fn from(e: io::Error) -> SnapshotError {
        SnapshotError::Io(e)
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(e: serde_json::Error) -> SnapshotError {
        SnapshotError::Parse(e)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneSnapshot {
    pub version: i32,
    pub into: i32,
    pub out: i32,
    pub weight: f32,
    pub innovation: i32,
    pub enabled: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenomeSnapshot {
    pub version: i32,
    pub fitness: i32,
    pub max_neuron: i32,
    pub mutation_rates: MutationRates,
    pub genes: Vec<GeneSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesSnapshot {
    pub version: i32,
    pub top_fitness: i32,
    pub staleness: i32,
    pub genomes: Vec<GenomeSnapshot>,
}

/// Root of the snapshot document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    pub version: i32,
    pub generation: i32,
    pub max_fitness: i32,
    pub species: Vec<SpeciesSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng: Option<PoolRng>,
}

impl GeneSnapshot {
    fn capture(gene: &Gene) -> GeneSnapshot {
        GeneSnapshot {
            version: SCHEMA_VERSION,
            into: gene.into as i32,
            out: gene.out as i32,
            weight: gene.weight,
            innovation: gene.innovation as i32,
            enabled: gene.enabled,
        }
    }

    fn restore(&self) -> Result<Gene, SnapshotError> {
        check_version("gene", self.version)?;
        Ok(Gene {
            into: self.into as NeuronId,
            out: self.out as NeuronId,
            weight: self.weight,
            enabled: self.enabled,
            innovation: self.innovation as usize,
        })
    }
}

impl GenomeSnapshot {
    fn capture(genome: &Genome) -> GenomeSnapshot {
        GenomeSnapshot {
            version: SCHEMA_VERSION,
            fitness: genome.fitness,
            max_neuron: genome.max_neuron as i32,
            mutation_rates: genome.rates.clone(),
            genes: genome.genes.iter().map(GeneSnapshot::capture).collect(),
        }
    }

    fn restore(&self) -> Result<Genome, SnapshotError> {
        check_version("genome", self.version)?;
        let genes = self
            .genes
            .iter()
            .map(GeneSnapshot::restore)
            .collect::<Result<Vec<Gene>, SnapshotError>>()?;
        Ok(Genome {
            genes,
            fitness: self.fitness,
            max_neuron: self.max_neuron as NeuronId,
            rates: self.mutation_rates.clone(),
            ..Genome::default()
        })
    }
}

impl SpeciesSnapshot {
    fn capture(species: &Species) -> SpeciesSnapshot {
        SpeciesSnapshot {
            version: SCHEMA_VERSION,
            top_fitness: species.top_fitness,
            staleness: species.staleness as i32,
            genomes: species.genomes.iter().map(GenomeSnapshot::capture).collect(),
        }
    }

    fn restore(&self) -> Result<Species, SnapshotError> {
        check_version("species", self.version)?;
        let genomes = self
            .genomes
            .iter()
            .map(GenomeSnapshot::restore)
            .collect::<Result<Vec<Genome>, SnapshotError>>()?;
        Ok(Species {
            genomes,
            top_fitness: self.top_fitness,
            staleness: self.staleness as u32,
            average_fitness: 0,
        })
    }
}

impl PoolSnapshot {
    /// Captures the serializable state of a pool. Cursors, ranks and
    /// phenotypes are transient and stay behind.
    pub fn capture(pool: &Pool) -> PoolSnapshot {
        PoolSnapshot {
            version: SCHEMA_VERSION,
            generation: pool.generation as i32,
            max_fitness: pool.max_fitness,
            species: pool.species.iter().map(SpeciesSnapshot::capture).collect(),
            rng: Some(pool.rng.clone()),
        }
    }

    /// Rebuilds a pool for the given sensor grid.
    ///
    /// Cursors reset to the start of the population and the innovation
    /// counter restarts just past the output ids. The whole document is
    /// validated before any piece of the pool is constructed.
    ///
    /// # Errors
    /// Fails on any element whose `version` differs from
    /// [`SCHEMA_VERSION`].
    pub fn into_pool(self, board_w: usize, board_h: usize) -> Result<Pool, SnapshotError> {
        check_version("pool", self.version)?;
        let species = self
            .species
            .iter()
            .map(SpeciesSnapshot::restore)
            .collect::<Result<Vec<Species>, SnapshotError>>()?;

        let mut pool = Pool::new(board_w, board_h, self.rng.unwrap_or_else(PoolRng::from_entropy));
        pool.species = species;
        pool.generation = self.generation as u32;
        pool.max_fitness = self.max_fitness;
        pool.innovation = InnovationCounter::starting_at(OUTPUTS);
        Ok(pool)
    }
}

fn check_version(element: &'static str, found: i32) -> Result<(), SnapshotError> {
    if found == SCHEMA_VERSION {
        Ok(())
    } else {
        Err(SnapshotError::VersionMismatch { element, found })
    }
}

/// Serializes the pool to a JSON file.
pub fn write_pool(path: &Path, pool: &Pool) -> Result<(), SnapshotError> {
    let snapshot = PoolSnapshot::capture(pool);
    let json = serde_json::to_string_pretty(&snapshot)?;
    fs::write(path, json)?;
    Ok(())
}

/// Reads a snapshot document from a JSON file.
pub fn read_pool(path: &Path) -> Result<PoolSnapshot, SnapshotError> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}
