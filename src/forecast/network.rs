//! Dense feed-forward network trained with Adam on mean squared error.
//!
//! Fixed architecture: input -> Dense(64, ReLU) -> Dropout -> Dense(32, ReLU)
//! -> linear output. Dropout is active only during training, with inverted
//! scaling so inference needs no correction.

use anyhow::{Result, ensure};
use ndarray::{Array1, Array2, Axis, Dimension};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

const HIDDEN_1: usize = 64;
const HIDDEN_2: usize = 32;

/// Training hyperparameters.
#[derive(Debug, Clone)]
pub struct TrainParams {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            epochs: 500,
            batch_size: 4,
            learning_rate: 0.001,
        }
    }
}

/// Mean loss of the first and last training epoch.
#[derive(Debug, Clone, Copy)]
pub struct TrainingSummary {
    pub first_epoch_loss: f64,
    pub final_loss: f64,
}

struct DenseLayer {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl DenseLayer {
    fn new(input: usize, output: usize, rng: &mut impl Rng) -> Self {
        // Glorot uniform initialization.
        let limit = (6.0 / (input + output) as f64).sqrt();
        Self {
            weights: Array2::from_shape_fn((input, output), |_| rng.gen_range(-limit..limit)),
            bias: Array1::zeros(output),
        }
    }
}

struct LayerGrads {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

/// Feed-forward network predicting one output vector per input row.
pub struct Mlp {
    layers: Vec<DenseLayer>,
    dropout: f64,
}

impl Mlp {
    /// Builds the network with randomly initialized weights. `dropout` is the
    /// drop probability applied after the first hidden layer during training.
    pub fn new(input_dim: usize, output_dim: usize, dropout: f64) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            layers: vec![
                DenseLayer::new(input_dim, HIDDEN_1, &mut rng),
                DenseLayer::new(HIDDEN_1, HIDDEN_2, &mut rng),
                DenseLayer::new(HIDDEN_2, output_dim, &mut rng),
            ],
            dropout,
        }
    }

    /// Inference forward pass; dropout is inactive.
    pub fn predict(&self, x: &Array2<f64>) -> Array2<f64> {
        let l = &self.layers;
        let a0 = relu(&(x.dot(&l[0].weights) + &l[0].bias));
        let a1 = relu(&(a0.dot(&l[1].weights) + &l[1].bias));
        a1.dot(&l[2].weights) + &l[2].bias
    }

    /// Trains on `(x, y)` row pairs by mini-batch gradient descent with Adam,
    /// shuffling the rows each epoch.
    pub fn train(
        &mut self,
        x: &Array2<f64>,
        y: &Array2<f64>,
        params: &TrainParams,
    ) -> Result<TrainingSummary> {
        ensure!(x.nrows() > 0, "cannot train on an empty training set");
        ensure!(
            x.nrows() == y.nrows(),
            "training inputs have {} rows but targets have {}",
            x.nrows(),
            y.nrows()
        );
        ensure!(params.batch_size > 0, "batch size must be positive");

        let mut rng = rand::thread_rng();
        let mut adam = Adam::new(params.learning_rate, &self.layers);
        let mut indices: Vec<usize> = (0..x.nrows()).collect();

        let mut first_epoch_loss = 0.0;
        let mut final_loss = 0.0;

        for epoch in 0..params.epochs {
            indices.shuffle(&mut rng);

            let mut epoch_loss = 0.0;
            let mut batches = 0;
            for batch in indices.chunks(params.batch_size) {
                let xb = x.select(Axis(0), batch);
                let yb = y.select(Axis(0), batch);

                let (loss, grads) = self.backward(&xb, &yb, &mut rng);
                adam.step(&mut self.layers, &grads);

                epoch_loss += loss;
                batches += 1;
            }

            let avg = epoch_loss / batches as f64;
            if epoch == 0 {
                first_epoch_loss = avg;
            }
            final_loss = avg;

            if (epoch + 1) % 100 == 0 {
                debug!(epoch = epoch + 1, loss = avg, "training progress");
            }
        }

        Ok(TrainingSummary {
            first_epoch_loss,
            final_loss,
        })
    }

    /// One forward/backward pass over a batch. Returns the batch MSE and the
    /// parameter gradients.
    fn backward(
        &self,
        x: &Array2<f64>,
        y: &Array2<f64>,
        rng: &mut impl Rng,
    ) -> (f64, Vec<LayerGrads>) {
        let l = &self.layers;

        let z0 = x.dot(&l[0].weights) + &l[0].bias;
        let a0 = relu(&z0);
        let mask = self.dropout_mask(a0.nrows(), a0.ncols(), rng);
        let a0d = &a0 * &mask;
        let z1 = a0d.dot(&l[1].weights) + &l[1].bias;
        let a1 = relu(&z1);
        let out = a1.dot(&l[2].weights) + &l[2].bias;

        let diff = &out - y;
        let n = out.len() as f64;
        let loss = diff.mapv(|v| v * v).sum() / n;

        let d_out = &diff * (2.0 / n);

        let g_w2 = a1.t().dot(&d_out);
        let g_b2 = d_out.sum_axis(Axis(0));

        let d_z1 = d_out.dot(&l[2].weights.t()) * relu_grad(&z1);
        let g_w1 = a0d.t().dot(&d_z1);
        let g_b1 = d_z1.sum_axis(Axis(0));

        let d_z0 = d_z1.dot(&l[1].weights.t()) * &mask * relu_grad(&z0);
        let g_w0 = x.t().dot(&d_z0);
        let g_b0 = d_z0.sum_axis(Axis(0));

        let grads = vec![
            LayerGrads {
                weights: g_w0,
                bias: g_b0,
            },
            LayerGrads {
                weights: g_w1,
                bias: g_b1,
            },
            LayerGrads {
                weights: g_w2,
                bias: g_b2,
            },
        ];
        (loss, grads)
    }

    /// Inverted dropout mask: kept units are scaled by 1/keep so the expected
    /// activation matches inference.
    fn dropout_mask(&self, rows: usize, cols: usize, rng: &mut impl Rng) -> Array2<f64> {
        if self.dropout <= 0.0 {
            return Array2::ones((rows, cols));
        }
        let keep = 1.0 - self.dropout;
        Array2::from_shape_fn((rows, cols), |_| {
            if rng.gen_bool(keep) { 1.0 / keep } else { 0.0 }
        })
    }
}

fn relu(z: &Array2<f64>) -> Array2<f64> {
    z.mapv(|v| v.max(0.0))
}

fn relu_grad(z: &Array2<f64>) -> Array2<f64> {
    z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 })
}

/// Adam optimizer state: first and second moment estimates per parameter,
/// with bias correction.
struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    t: i32,
    m_w: Vec<Array2<f64>>,
    v_w: Vec<Array2<f64>>,
    m_b: Vec<Array1<f64>>,
    v_b: Vec<Array1<f64>>,
}

impl Adam {
    fn new(lr: f64, layers: &[DenseLayer]) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            t: 0,
            m_w: layers
                .iter()
                .map(|l| Array2::zeros(l.weights.raw_dim()))
                .collect(),
            v_w: layers
                .iter()
                .map(|l| Array2::zeros(l.weights.raw_dim()))
                .collect(),
            m_b: layers
                .iter()
                .map(|l| Array1::zeros(l.bias.raw_dim()))
                .collect(),
            v_b: layers
                .iter()
                .map(|l| Array1::zeros(l.bias.raw_dim()))
                .collect(),
        }
    }

    fn step(&mut self, layers: &mut [DenseLayer], grads: &[LayerGrads]) {
        self.t += 1;
        let bc1 = 1.0 - self.beta1.powi(self.t);
        let bc2 = 1.0 - self.beta2.powi(self.t);

        for (i, (layer, grad)) in layers.iter_mut().zip(grads).enumerate() {
            update_param(
                &mut layer.weights,
                &mut self.m_w[i],
                &mut self.v_w[i],
                &grad.weights,
                self.lr,
                self.beta1,
                self.beta2,
                self.eps,
                bc1,
                bc2,
            );
            update_param(
                &mut layer.bias,
                &mut self.m_b[i],
                &mut self.v_b[i],
                &grad.bias,
                self.lr,
                self.beta1,
                self.beta2,
                self.eps,
                bc1,
                bc2,
            );
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn update_param<D: Dimension>(
    param: &mut ndarray::Array<f64, D>,
    m: &mut ndarray::Array<f64, D>,
    v: &mut ndarray::Array<f64, D>,
    grad: &ndarray::Array<f64, D>,
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    bc1: f64,
    bc2: f64,
) {
    *m = &*m * beta1 + grad * (1.0 - beta1);
    *v = &*v * beta2 + grad.mapv(|g| g * g) * (1.0 - beta2);
    let m_hat = &*m / bc1;
    let v_hat = &*v / bc2;
    *param = &*param - (m_hat * lr) / (v_hat.mapv(f64::sqrt) + eps);
}
