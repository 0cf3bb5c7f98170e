//! Small fully connected value network trained with per-sample SGD.
//!
//! Architecture: input -> 64 ReLU -> 32 ReLU -> linear output, one output
//! per action, squared-error loss on the targeted entries.

use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

const HIDDEN1: usize = 64;
const HIDDEN2: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Layer {
    /// Row-major: `weights[out][in]`.
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
}

impl Layer {
    fn new(inputs: usize, outputs: usize, rng: &mut StdRng) -> Self {
        // Xavier-style uniform init.
        let bound = (6.0 / (inputs + outputs) as f64).sqrt();
        Layer {
            weights: (0..outputs)
                .map(|_| (0..inputs).map(|_| rng.gen_range(-bound..=bound)).collect())
                .collect(),
            biases: vec![0.0; outputs],
        }
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(row, bias)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + bias)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QNetwork {
    input_dim: usize,
    output_dim: usize,
    layers: [Layer; 3],
}

impl QNetwork {
    pub fn new(input_dim: usize, output_dim: usize, rng: &mut StdRng) -> Self {
        QNetwork {
            input_dim,
            output_dim,
            layers: [
                Layer::new(input_dim, HIDDEN1, rng),
                Layer::new(HIDDEN1, HIDDEN2, rng),
                Layer::new(HIDDEN2, output_dim, rng),
            ],
        }
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    /// Predicted action values for a state.
    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        let h1 = relu(self.layers[0].forward(input));
        let h2 = relu(self.layers[1].forward(&h1));
        self.layers[2].forward(&h2)
    }

    /// One SGD step toward `target` for a single sample. Returns the
    /// squared-error loss before the update.
    pub fn train(&mut self, input: &[f64], target: &[f64], learning_rate: f64) -> f64 {
        let z1 = self.layers[0].forward(input);
        let a1 = relu(z1.clone());
        let z2 = self.layers[1].forward(&a1);
        let a2 = relu(z2.clone());
        let out = self.layers[2].forward(&a2);

        let loss = out
            .iter()
            .zip(target)
            .map(|(o, t)| (o - t).powi(2))
            .sum::<f64>();

        // Output layer is linear, so dL/dz = 2 (out - target).
        let delta_out: Vec<f64> = out.iter().zip(target).map(|(o, t)| 2.0 * (o - t)).collect();
        let delta2 = backprop_delta(&self.layers[2], &delta_out, &z2);
        let delta1 = backprop_delta(&self.layers[1], &delta2, &z1);

        apply_gradient(&mut self.layers[2], &delta_out, &a2, learning_rate);
        apply_gradient(&mut self.layers[1], &delta2, &a1, learning_rate);
        apply_gradient(&mut self.layers[0], &delta1, input, learning_rate);
        loss
    }
}

fn relu(mut values: Vec<f64>) -> Vec<f64> {
    for v in &mut values {
        if *v < 0.0 {
            *v = 0.0;
        }
    }
    values
}

/// Propagate deltas through `layer` into its input, gated by the ReLU
/// derivative of the input's pre-activations.
fn backprop_delta(layer: &Layer, delta: &[f64], pre_activation: &[f64]) -> Vec<f64> {
    (0..pre_activation.len())
        .map(|i| {
            if pre_activation[i] <= 0.0 {
                return 0.0;
            }
            layer
                .weights
                .iter()
                .zip(delta)
                .map(|(row, d)| row[i] * d)
                .sum()
        })
        .collect()
}

fn apply_gradient(layer: &mut Layer, delta: &[f64], input: &[f64], learning_rate: f64) {
    for (row, (bias, d)) in layer
        .weights
        .iter_mut()
        .zip(layer.biases.iter_mut().zip(delta))
    {
        for (w, x) in row.iter_mut().zip(input) {
            *w -= learning_rate * d * x;
        }
        *bias -= learning_rate * d;
    }
}
