use crate::{Innovation, NeuronId};

use std::fmt;

/// Genes are the principal components of genomes. Each one is a directed,
/// weighted, optionally disabled edge between two neuron ids, tagged with
/// the innovation number allocated when the edge first appeared.
///
/// Disabled genes are skipped during phenotype assembly but still
/// participate in crossover and compatibility computation.
#[derive(Clone, Debug, PartialEq)]
pub struct Gene {
    /// Source neuron id.
    pub into: NeuronId,
    /// Sink neuron id.
    pub out: NeuronId,
    /// Connection weight. Freshly assigned weights fall in `[-2, 2]`;
    /// repeated perturbation can push them outside that range.
    pub weight: f32,
    /// Whether the edge is expressed in the phenotype.
    pub enabled: bool,
    /// Historical marking, unique per structural novelty within a run.
    pub innovation: Innovation,
}

impl Gene {
    /// Returns a new enabled gene with the specified endpoints.
    ///
    /// # Examples
    /// ```
    /// use astroneat::Gene;
    ///
    /// let gene = Gene::link(3, 9, 2.0, 42);
    ///
    /// assert_eq!(gene.into, 3);
    /// assert_eq!(gene.out, 9);
    /// assert_eq!(gene.weight, 2.0);
    /// assert!(gene.enabled);
    /// assert_eq!(gene.innovation, 42);
    /// ```
    pub fn link(into: NeuronId, out: NeuronId, weight: f32, innovation: Innovation) -> Gene {
        Gene {
            into,
            out,
            weight,
            enabled: true,
            innovation,
        }
    }
}

impl fmt::Display for Gene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}[{}->{}, {:.3}]{}",
            if self.enabled { "" } else { "(" },
            self.innovation,
            self.into,
            self.out,
            self.weight,
            if self.enabled { "" } else { ")" },
        )
    }
}
