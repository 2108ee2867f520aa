//! Dense projection, dropout and activation helpers shared by the recurrent stacks.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::distributions::{Distribution, Uniform};
use rand::{Rng, RngCore};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Affine map `y = W x + b` with `W: [out, in]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Linear {
    pub weight: Array2<f64>,
    pub bias: Array1<f64>,
}

impl Linear {
    /// Uniform init in ±1/√in.
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, rng: &mut R) -> Self {
        let limit = 1.0 / (input_size.max(1) as f64).sqrt();
        Self {
            weight: uniform((output_size, input_size), limit, rng),
            bias: uniform_vec(output_size, limit, rng),
        }
    }

    pub fn input_size(&self) -> usize {
        self.weight.ncols()
    }

    pub fn output_size(&self) -> usize {
        self.weight.nrows()
    }

    pub fn forward(&self, x: ArrayView1<'_, f64>) -> Array1<f64> {
        self.weight.dot(&x) + &self.bias
    }

    /// Applies the projection to every row of `[steps, in]`.
    pub fn forward_rows(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        x.dot(&self.weight.t()) + &self.bias
    }

    pub(crate) fn check(&self, input_size: usize, output_size: usize) -> bool {
        self.weight.dim() == (output_size, input_size) && self.bias.len() == output_size
    }
}

/// Randomness and train/eval switch for one forward pass. The RNG is borrowed for the call
/// only, so concurrent passes never share mutable state.
pub struct ForwardPass<'a> {
    training: bool,
    rng: Option<&'a mut dyn RngCore>,
}

impl<'a> ForwardPass<'a> {
    /// Deterministic evaluation: no dropout, variational noise fixed at zero.
    pub fn inference() -> Self {
        Self {
            training: false,
            rng: None,
        }
    }

    /// Evaluation with a variational draw from `rng`; dropout stays off.
    pub fn sampled(rng: &'a mut dyn RngCore) -> Self {
        Self {
            training: false,
            rng: Some(rng),
        }
    }

    /// Dropout active, variational draw from `rng`.
    pub fn training(rng: &'a mut dyn RngCore) -> Self {
        Self {
            training: true,
            rng: Some(rng),
        }
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Inverted dropout: zero each element with probability `p`, scale survivors by 1/(1-p).
    pub fn dropout(&mut self, x: &mut Array2<f64>, p: f64) {
        if !self.training || p <= 0.0 {
            return;
        }
        let Some(rng) = self.rng.as_deref_mut() else {
            return;
        };
        if p >= 1.0 {
            x.fill(0.0);
            return;
        }
        let keep = 1.0 - p;
        x.mapv_inplace(|v| if rng.gen::<f64>() < p { 0.0 } else { v / keep });
    }

    /// Standard normal noise of length `n`, or zeros without an RNG.
    pub fn noise(&mut self, n: usize) -> Array1<f64> {
        match self.rng.as_deref_mut() {
            Some(rng) => Array1::from_shape_fn(n, |_| -> f64 { StandardNormal.sample(&mut *rng) }),
            None => Array1::zeros(n),
        }
    }
}

pub(crate) fn sigmoid(v: f64) -> f64 {
    if v >= 0.0 {
        1.0 / (1.0 + (-v).exp())
    } else {
        let e = v.exp();
        e / (1.0 + e)
    }
}

pub(crate) fn uniform<R: Rng + ?Sized>(shape: (usize, usize), limit: f64, rng: &mut R) -> Array2<f64> {
    let dist = Uniform::new_inclusive(-limit, limit);
    Array2::from_shape_fn(shape, |_| dist.sample(&mut *rng))
}

pub(crate) fn uniform_vec<R: Rng + ?Sized>(n: usize, limit: f64, rng: &mut R) -> Array1<f64> {
    let dist = Uniform::new_inclusive(-limit, limit);
    Array1::from_shape_fn(n, |_| dist.sample(&mut *rng))
}
