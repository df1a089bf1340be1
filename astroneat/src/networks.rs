//! Network phenotypes built from genomes.
//!
//! A [`Network`] is a sparse map from neuron id to [`Neuron`], where each
//! neuron lists its incoming synapses. Evaluation is a **single pass** over
//! the neuron map in ascending id order — inputs first, then the bias and
//! hidden neurons, then the outputs parked at `MAX_NODES + o`. The encoded
//! graph is not guaranteed acyclic; no fixpoint is sought, so the network's
//! effective depth per frame equals that one pass. Neuron values persist
//! between passes, which gives back-edges a one-frame delay. Both quirks are
//! part of the phenotype contract and evaluation stays deterministic for a
//! given genome.

use crate::genomics::Gene;
use crate::params::{MAX_NODES, OUTPUTS};
use crate::NeuronId;

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

/// Steepened sigmoid squashed into `(-1, 1)`, with `sigmoid(0) == 0`.
///
/// # Examples
/// ```
/// use astroneat::sigmoid;
///
/// assert_eq!(sigmoid(0.0), 0.0);
/// assert!(sigmoid(1.0) > 0.98);
/// assert!(sigmoid(-1.0) < -0.98);
/// ```
pub fn sigmoid(x: f32) -> f32 {
    2.0 / (1.0 + (-4.9 * x).exp()) - 1.0
}

/// A weighted incoming edge, copied from an enabled gene during assembly.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Synapse {
    pub source: NeuronId,
    pub weight: f32,
}

/// A single phenotype neuron: its incoming synapses and current activation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Neuron {
    pub(crate) incoming: Vec<Synapse>,
    pub value: f32,
}

/// The sensor vector handed to [`Network::evaluate`] did not match the
/// network's input arity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputArityMismatch {
    pub expected: usize,
    pub got: usize,
}

impl fmt::Display for InputArityMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "incorrect number of neural network inputs: expected {}, got {}",
            self.expected, self.got
        )
    }
}

impl Error for InputArityMismatch {}

/// Executable phenotype derived from a genome's gene list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Network {
    neurons: BTreeMap<NeuronId, Neuron>,
    input_size: usize,
}

impl Network {
    /// Assembles a phenotype from a gene list sorted ascending by sink id.
    ///
    /// Neurons exist for every input and output id, plus every endpoint of
    /// an enabled gene. Each enabled gene lands in its sink's incoming list.
    pub(crate) fn assemble(genes: &[Gene], input_size: usize) -> Network {
        let mut neurons: BTreeMap<NeuronId, Neuron> = BTreeMap::new();

        for i in 0..input_size {
            neurons.insert(i, Neuron::default());
        }
        for o in 0..OUTPUTS {
            neurons.insert(MAX_NODES + o, Neuron::default());
        }

        for gene in genes.iter().filter(|g| g.enabled) {
            neurons.entry(gene.out).or_default().incoming.push(Synapse {
                source: gene.into,
                weight: gene.weight,
            });
            neurons.entry(gene.into).or_default();
        }

        Network {
            neurons,
            input_size,
        }
    }

    /// Runs one forward pass and thresholds the output neurons.
    ///
    /// Input neurons take the sensor values verbatim; every neuron with at
    /// least one incoming synapse is then re-activated, in ascending id
    /// order, as the sigmoid of its weighted input sum. Output `o` reads
    /// `true` iff its activation is strictly positive.
    ///
    /// # Errors
    /// Fails without touching any neuron when the sensor vector's length
    /// differs from the network's input arity.
    pub fn evaluate(&mut self, inputs: &[i32]) -> Result<Vec<bool>, InputArityMismatch> {
        if inputs.len() != self.input_size {
            return Err(InputArityMismatch {
                expected: self.input_size,
                got: inputs.len(),
            });
        }

        for (i, value) in inputs.iter().enumerate() {
            if let Some(neuron) = self.neurons.get_mut(&i) {
                neuron.value = *value as f32;
            }
        }

        let ids: Vec<NeuronId> = self.neurons.keys().copied().collect();
        for id in ids {
            let neuron = &self.neurons[&id];
            if neuron.incoming.is_empty() {
                continue;
            }
            let sum: f32 = neuron
                .incoming
                .iter()
                .map(|synapse| {
                    synapse.weight * self.neurons.get(&synapse.source).map_or(0.0, |n| n.value)
                })
                .sum();
            if let Some(neuron) = self.neurons.get_mut(&id) {
                neuron.value = sigmoid(sum);
            }
        }

        let mut outputs = Vec::with_capacity(OUTPUTS);
        for o in 0..OUTPUTS {
            let value = self.neurons.get(&(MAX_NODES + o)).map_or(0.0, |n| n.value);
            outputs.push(value > 0.0);
        }

        Ok(outputs)
    }

    /// Returns the neuron with the given id, if present.
    pub fn neuron(&self, id: NeuronId) -> Option<&Neuron> {
        self.neurons.get(&id)
    }

    /// Number of neurons in the phenotype.
    pub fn len(&self) -> usize {
        self.neurons.len()
    }

    /// Whether the phenotype holds no neurons.
    pub fn is_empty(&self) -> bool {
        self.neurons.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gene(into: NeuronId, out: NeuronId, weight: f32, innovation: usize) -> Gene {
        Gene::link(into, out, weight, innovation)
    }

    #[test]
    fn sigmoid_values() {
        assert_eq!(sigmoid(0.0), 0.0);
        assert!((sigmoid(1.0) - 0.98522).abs() < 1e-3);
        assert!((sigmoid(-1.0) + 0.98522).abs() < 1e-3);
        assert!((sigmoid(1.0) + sigmoid(-1.0)).abs() < 1e-6);
    }

    #[test]
    fn assemble_creates_io_neurons_and_indexes_enabled_genes() {
        let genes = vec![
            gene(0, MAX_NODES, 0.5, 5),
            gene(1, MAX_NODES, -0.5, 6),
            gene(2, MAX_NODES + 1, 1.0, 7),
        ];
        let network = Network::assemble(&genes, 4);

        // 4 inputs + 4 outputs; all gene endpoints already exist.
        assert_eq!(network.len(), 4 + OUTPUTS);
        assert_eq!(network.neuron(MAX_NODES).unwrap().incoming.len(), 2);
        assert_eq!(network.neuron(MAX_NODES + 1).unwrap().incoming.len(), 1);
        assert_eq!(network.neuron(MAX_NODES + 2).unwrap().incoming.len(), 0);
    }

    #[test]
    fn assemble_indexes_the_first_gene() {
        // A single enabled gene must not be dropped by assembly.
        let genes = vec![gene(0, MAX_NODES, 1.0, 5)];
        let network = Network::assemble(&genes, 2);
        assert_eq!(network.neuron(MAX_NODES).unwrap().incoming.len(), 1);
    }

    #[test]
    fn assemble_skips_disabled_genes_but_keeps_hidden_endpoints_of_enabled_ones() {
        let mut disabled = gene(0, MAX_NODES, 1.0, 5);
        disabled.enabled = false;
        let genes = vec![disabled, gene(5, MAX_NODES + 1, 1.0, 6)];
        let network = Network::assemble(&genes, 4);

        assert_eq!(network.neuron(MAX_NODES).unwrap().incoming.len(), 0);
        // Hidden neuron 5 exists because an enabled gene references it.
        assert!(network.neuron(5).is_some());
    }

    #[test]
    fn evaluate_rejects_wrong_arity_without_partial_output() {
        let mut network = Network::assemble(&[gene(0, MAX_NODES, 1.0, 5)], 4);
        let result = network.evaluate(&[1, 0]);
        assert_eq!(
            result,
            Err(InputArityMismatch {
                expected: 4,
                got: 2
            })
        );
    }

    #[test]
    fn evaluate_thresholds_outputs_on_strict_positivity() {
        let genes = vec![gene(0, MAX_NODES, 1.0, 5), gene(1, MAX_NODES + 1, 1.0, 6)];
        let mut network = Network::assemble(&genes, 2);

        let outputs = network.evaluate(&[1, -1]).unwrap();
        assert_eq!(outputs, vec![true, false, false, false]);

        // A zero input drives the fed output to sigmoid(0) == 0, which is
        // not strictly positive.
        let outputs = network.evaluate(&[0, 0]).unwrap();
        assert_eq!(outputs, vec![false, false, false, false]);
    }

    #[test]
    fn evaluate_resolves_a_forward_chain_in_one_pass() {
        // input 0 -> hidden 3 -> output 0, with input_size 2 (bias id 2).
        let genes = vec![gene(0, 3, 1.0, 5), gene(3, MAX_NODES, 1.0, 6)];
        let mut network = Network::assemble(&genes, 2);

        let outputs = network.evaluate(&[1, 0]).unwrap();
        // Ascending-id order computes hidden 3 before the output, so the
        // signal crosses both edges within a single pass.
        let hidden = network.neuron(3).unwrap().value;
        assert!((hidden - sigmoid(1.0)).abs() < 1e-6);
        let out = network.neuron(MAX_NODES).unwrap().value;
        assert!((out - sigmoid(hidden)).abs() < 1e-6);
        assert_eq!(outputs[0], true);
    }

    #[test]
    fn neuron_values_persist_between_passes() {
        // Back-edge: hidden 5 is fed by an output, i.e. by a higher id.
        // Within one pass it can only see the output's previous activation.
        let genes = vec![gene(0, MAX_NODES, 1.0, 5), gene(MAX_NODES, 5, 1.0, 6)];
        let mut network = Network::assemble(&genes, 2);

        network.evaluate(&[1, 0]).unwrap();
        let first = network.neuron(5).unwrap().value;

        network.evaluate(&[1, 0]).unwrap();
        let second = network.neuron(5).unwrap().value;

        // First frame the output had not activated yet when the hidden
        // neuron summed its inputs; the second frame sees it.
        assert_eq!(first, 0.0);
        assert!(second > 0.9);
    }
}
