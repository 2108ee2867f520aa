//! Stacked LSTM over a single `[steps, features]` sequence.
//!
//! Gate weights are stacked row-wise in (input, forget, cell, output) order, with separate
//! input and recurrent biases, matching the layout common training frameworks export.

use super::layers::{sigmoid, uniform, uniform_vec, ForwardPass};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One recurrent layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmLayer {
    /// `[4H, in]`
    pub weight_ih: Array2<f64>,
    /// `[4H, H]`
    pub weight_hh: Array2<f64>,
    pub bias_ih: Array1<f64>,
    pub bias_hh: Array1<f64>,
}

impl LstmLayer {
    pub fn new<R: Rng + ?Sized>(input_size: usize, hidden_size: usize, rng: &mut R) -> Self {
        let limit = 1.0 / (hidden_size.max(1) as f64).sqrt();
        let gates = 4 * hidden_size;
        Self {
            weight_ih: uniform((gates, input_size), limit, rng),
            weight_hh: uniform((gates, hidden_size), limit, rng),
            bias_ih: uniform_vec(gates, limit, rng),
            bias_hh: uniform_vec(gates, limit, rng),
        }
    }

    pub fn input_size(&self) -> usize {
        self.weight_ih.ncols()
    }

    pub fn hidden_size(&self) -> usize {
        self.weight_hh.ncols()
    }

    /// One timestep: returns `(h_next, c_next)`.
    pub fn step(
        &self,
        x: ArrayView1<'_, f64>,
        h_prev: &Array1<f64>,
        c_prev: &Array1<f64>,
    ) -> (Array1<f64>, Array1<f64>) {
        let hs = self.hidden_size();
        let gates = self.weight_ih.dot(&x) + self.weight_hh.dot(h_prev) + &self.bias_ih + &self.bias_hh;

        let i = gates.slice(s![0..hs]).mapv(sigmoid);
        let f = gates.slice(s![hs..2 * hs]).mapv(sigmoid);
        let g = gates.slice(s![2 * hs..3 * hs]).mapv(f64::tanh);
        let o = gates.slice(s![3 * hs..4 * hs]).mapv(sigmoid);

        let c_next = &f * c_prev + &i * &g;
        let h_next = &o * &c_next.mapv(f64::tanh);
        (h_next, c_next)
    }

    pub(crate) fn check(&self, input_size: usize, hidden_size: usize) -> bool {
        let gates = 4 * hidden_size;
        self.weight_ih.dim() == (gates, input_size)
            && self.weight_hh.dim() == (gates, hidden_size)
            && self.bias_ih.len() == gates
            && self.bias_hh.len() == gates
    }
}

/// Final `(h, c)` of every layer after a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct LstmState {
    pub h: Vec<Array1<f64>>,
    pub c: Vec<Array1<f64>>,
}

impl LstmState {
    pub fn zeros(num_layers: usize, hidden_size: usize) -> Self {
        Self {
            h: vec![Array1::zeros(hidden_size); num_layers],
            c: vec![Array1::zeros(hidden_size); num_layers],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackedLstm {
    pub layers: Vec<LstmLayer>,
}

impl StackedLstm {
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        hidden_size: usize,
        num_layers: usize,
        rng: &mut R,
    ) -> Self {
        let layers = (0..num_layers)
            .map(|i| {
                let in_size = if i == 0 { input_size } else { hidden_size };
                LstmLayer::new(in_size, hidden_size, rng)
            })
            .collect();
        Self { layers }
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn hidden_size(&self) -> usize {
        self.layers.first().map(LstmLayer::hidden_size).unwrap_or(0)
    }

    /// Runs every layer over the whole sequence, starting from `init` (zeros when `None`).
    /// `dropout` is applied to the output of each layer except the last, in training passes.
    ///
    /// Returns the top layer's hidden sequence `[steps, H]` and the final state.
    pub fn forward(
        &self,
        input: ArrayView2<'_, f64>,
        init: Option<&LstmState>,
        dropout: f64,
        pass: &mut ForwardPass<'_>,
    ) -> (Array2<f64>, LstmState) {
        let steps = input.nrows();
        let hidden = self.hidden_size();
        let mut state = match init {
            Some(s) => s.clone(),
            None => LstmState::zeros(self.num_layers(), hidden),
        };

        let mut seq = input.to_owned();
        let last = self.layers.len().saturating_sub(1);
        for (li, layer) in self.layers.iter().enumerate() {
            let mut out = Array2::zeros((steps, hidden));
            let (mut h, mut c) = (state.h[li].clone(), state.c[li].clone());
            for t in 0..steps {
                let (h_next, c_next) = layer.step(seq.row(t), &h, &c);
                out.row_mut(t).assign(&h_next);
                h = h_next;
                c = c_next;
            }
            state.h[li] = h;
            state.c[li] = c;
            if li < last {
                pass.dropout(&mut out, dropout);
            }
            seq = out;
        }
        (seq, state)
    }

    pub(crate) fn check(&self, input_size: usize, hidden_size: usize, num_layers: usize) -> bool {
        self.layers.len() == num_layers
            && self.layers.iter().enumerate().all(|(i, l)| {
                let in_size = if i == 0 { input_size } else { hidden_size };
                l.check(in_size, hidden_size)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn layer_step_shapes() {
        let mut rng = StdRng::seed_from_u64(3);
        let layer = LstmLayer::new(5, 8, &mut rng);
        let state = LstmState::zeros(1, 8);
        let x = Array1::zeros(5);
        let (h, c) = layer.step(x.view(), &state.h[0], &state.c[0]);
        assert_eq!(h.len(), 8);
        assert_eq!(c.len(), 8);
        assert!(h.iter().all(|v| v.abs() < 1.0));
    }

    #[test]
    fn stacked_forward_keeps_sequence_length() {
        let mut rng = StdRng::seed_from_u64(3);
        let lstm = StackedLstm::new(5, 6, 2, &mut rng);
        assert!(lstm.check(5, 6, 2));
        let input = Array2::from_elem((12, 5), 0.3);
        let (seq, state) = lstm.forward(input.view(), None, 0.2, &mut ForwardPass::inference());
        assert_eq!(seq.dim(), (12, 6));
        assert_eq!(state.h.len(), 2);
        assert_eq!(seq.row(11), state.h[1].view());
    }
}
