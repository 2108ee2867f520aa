//! Encoder–decoder LSTM that reconstructs its own input window.

use super::layers::{ForwardPass, Linear};
use super::lstm::StackedLstm;
use crate::error::{EngineError, Result};
use crate::features::SequenceWindow;
use ndarray::{Array1, Array2, ArrayView2};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Architecture of a trained model; persisted with the weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub input_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub dropout: f64,
    pub sequence_length: usize,
    /// Present only for the variational variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latent_size: Option<usize>,
}

impl Hyperparameters {
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(EngineError::Configuration(msg));
        if self.input_size == 0 {
            return fail("input_size must be > 0".into());
        }
        if self.hidden_size == 0 {
            return fail("hidden_size must be > 0".into());
        }
        if self.num_layers == 0 {
            return fail("num_layers must be > 0".into());
        }
        if self.sequence_length == 0 {
            return fail("sequence_length must be > 0".into());
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return fail(format!("dropout must be in [0, 1), got {}", self.dropout));
        }
        if self.latent_size == Some(0) {
            return fail("latent_size must be > 0 when set".into());
        }
        Ok(())
    }

    /// Dropout between stacked recurrent layers only applies with more than one layer.
    fn recurrent_dropout(&self) -> f64 {
        if self.num_layers > 1 {
            self.dropout
        } else {
            0.0
        }
    }
}

/// Final-step projection to a Gaussian posterior and back to decoder width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariationalHead {
    pub mean: Linear,
    pub logvar: Linear,
    pub decoder_input: Linear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoencoderWeights {
    pub encoder: StackedLstm,
    pub decoder: StackedLstm,
    pub output: Linear,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variational: Option<VariationalHead>,
}

/// Posterior parameters and the latent draw of a variational pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Posterior {
    pub mean: Array1<f64>,
    pub logvar: Array1<f64>,
    pub z: Array1<f64>,
}

/// Output of one forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    /// `[L, F]`
    pub reconstructed: Array2<f64>,
    /// `[L, H]`: encoder hidden sequence, or the broadcast decoder input for the
    /// variational variant.
    pub latent: Array2<f64>,
    pub posterior: Option<Posterior>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceAutoencoder {
    hparams: Hyperparameters,
    weights: AutoencoderWeights,
}

impl SequenceAutoencoder {
    /// Fresh model with uniformly initialised weights drawn from `rng`.
    pub fn new<R: Rng + ?Sized>(hparams: Hyperparameters, rng: &mut R) -> Result<Self> {
        hparams.validate()?;
        let h = hparams.hidden_size;
        let encoder = StackedLstm::new(hparams.input_size, h, hparams.num_layers, rng);
        let variational = hparams.latent_size.map(|z| VariationalHead {
            mean: Linear::new(h, z, rng),
            logvar: Linear::new(h, z, rng),
            decoder_input: Linear::new(z, h, rng),
        });
        let decoder = StackedLstm::new(h, h, hparams.num_layers, rng);
        let output = Linear::new(h, hparams.input_size, rng);
        Ok(Self {
            hparams,
            weights: AutoencoderWeights {
                encoder,
                decoder,
                output,
                variational,
            },
        })
    }

    /// Rebuild from persisted parts, checking every weight shape against the hyperparameters.
    pub fn from_parts(hparams: Hyperparameters, weights: AutoencoderWeights) -> Result<Self> {
        hparams.validate()?;
        let (f, h, n) = (hparams.input_size, hparams.hidden_size, hparams.num_layers);
        if !weights.encoder.check(f, h, n) {
            return Err(EngineError::Configuration(
                "encoder weights do not match hyperparameters".into(),
            ));
        }
        if !weights.decoder.check(h, h, n) {
            return Err(EngineError::Configuration(
                "decoder weights do not match hyperparameters".into(),
            ));
        }
        if !weights.output.check(h, f) {
            return Err(EngineError::Configuration(
                "output projection does not match hyperparameters".into(),
            ));
        }
        match (&weights.variational, hparams.latent_size) {
            (None, None) => {}
            (Some(head), Some(z)) => {
                if !(head.mean.check(h, z) && head.logvar.check(h, z) && head.decoder_input.check(z, h)) {
                    return Err(EngineError::Configuration(
                        "variational head does not match latent_size".into(),
                    ));
                }
            }
            (Some(_), None) => {
                return Err(EngineError::Configuration(
                    "variational weights present but latent_size unset".into(),
                ))
            }
            (None, Some(_)) => {
                return Err(EngineError::Configuration(
                    "latent_size set but variational weights missing".into(),
                ))
            }
        }
        Ok(Self { hparams, weights })
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hparams
    }

    pub fn weights(&self) -> &AutoencoderWeights {
        &self.weights
    }

    pub fn is_variational(&self) -> bool {
        self.weights.variational.is_some()
    }

    /// Deterministic reconstruction. The variational variant decodes its posterior mean.
    pub fn reconstruct(&self, window: &SequenceWindow) -> Result<Reconstruction> {
        self.forward(window.view(), &mut ForwardPass::inference())
    }

    /// Reconstruction with the variational latent drawn from `rng`. Identical to
    /// [`reconstruct`](Self::reconstruct) for the deterministic variant.
    pub fn reconstruct_sampled(
        &self,
        window: &SequenceWindow,
        rng: &mut dyn RngCore,
    ) -> Result<Reconstruction> {
        self.forward(window.view(), &mut ForwardPass::sampled(rng))
    }

    pub fn forward(&self, x: ArrayView2<'_, f64>, pass: &mut ForwardPass<'_>) -> Result<Reconstruction> {
        self.check_window(x)?;
        let dropout = self.hparams.dropout;
        let recurrent_dropout = self.hparams.recurrent_dropout();

        let (mut encoded, enc_state) = self.weights.encoder.forward(x, None, recurrent_dropout, pass);

        let (decoder_input, posterior) = match &self.weights.variational {
            None => {
                pass.dropout(&mut encoded, dropout);
                (encoded, None)
            }
            Some(head) => {
                let last = encoded.row(encoded.nrows() - 1);
                let mean = head.mean.forward(last);
                let logvar = head.logvar.forward(last);
                let eps = pass.noise(mean.len());
                let z = &mean + &(logvar.mapv(|v| (0.5 * v).exp()) * &eps);
                let step = head.decoder_input.forward(z.view());
                let mut broadcast = Array2::zeros((x.nrows(), step.len()));
                for mut row in broadcast.rows_mut() {
                    row.assign(&step);
                }
                (broadcast, Some(Posterior { mean, logvar, z }))
            }
        };

        let (mut decoded, _) =
            self.weights
                .decoder
                .forward(decoder_input.view(), Some(&enc_state), recurrent_dropout, pass);
        pass.dropout(&mut decoded, dropout);
        let reconstructed = self.weights.output.forward_rows(decoded.view());

        Ok(Reconstruction {
            reconstructed,
            latent: decoder_input,
            posterior,
        })
    }

    /// Encoder hidden sequence only (feature extraction).
    pub fn encode(&self, window: &SequenceWindow) -> Result<Array2<f64>> {
        self.check_window(window.view())?;
        let (encoded, _) =
            self.weights
                .encoder
                .forward(window.view(), None, 0.0, &mut ForwardPass::inference());
        Ok(encoded)
    }

    fn check_window(&self, x: ArrayView2<'_, f64>) -> Result<()> {
        if x.nrows() != self.hparams.sequence_length {
            return Err(EngineError::shape(
                "window length",
                self.hparams.sequence_length,
                x.nrows(),
            ));
        }
        if x.ncols() != self.hparams.input_size {
            return Err(EngineError::shape(
                "window channels",
                self.hparams.input_size,
                x.ncols(),
            ));
        }
        Ok(())
    }
}

/// Mean squared error over both time and feature axes: one scalar per window.
pub fn reconstruction_error(
    original: ArrayView2<'_, f64>,
    reconstructed: ArrayView2<'_, f64>,
) -> Result<f64> {
    if original.dim() != reconstructed.dim() {
        return Err(EngineError::shape(
            "reconstruction",
            format!("{:?}", original.dim()),
            format!("{:?}", reconstructed.dim()),
        ));
    }
    let diff = &original - &reconstructed;
    Ok(diff.mapv(|d| d * d).mean().unwrap_or(0.0))
}
