//! Sequence-to-sequence reconstruction model and its persisted bundle.

mod autoencoder;
mod bundle;
mod layers;
mod lstm;

pub use autoencoder::{
    reconstruction_error, AutoencoderWeights, Hyperparameters, Posterior, Reconstruction,
    SequenceAutoencoder, VariationalHead,
};
pub use bundle::ModelBundle;
pub use layers::{ForwardPass, Linear};
pub use lstm::{LstmLayer, LstmState, StackedLstm};
