//! Fixed-length sequence windows over a `[rows, channels]` stream.

use crate::error::{EngineError, Result};
use ndarray::{s, Array2, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;

/// Exactly `L` time-ordered rows of `F` channels. Construction checks the length; nothing in
/// the engine pads a short window.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceWindow {
    data: Array2<f64>,
}

impl SequenceWindow {
    pub fn new(data: Array2<f64>, sequence_length: usize) -> Result<Self> {
        if data.nrows() != sequence_length {
            return Err(EngineError::shape(
                "sequence window length",
                sequence_length,
                data.nrows(),
            ));
        }
        Ok(Self { data })
    }

    /// Window of `len` copies of one row.
    pub fn constant(row: &[f64], len: usize) -> Self {
        let mut data = Array2::zeros((len, row.len()));
        for mut r in data.rows_mut() {
            r.iter_mut().zip(row).for_each(|(d, s)| *d = *s);
        }
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    pub fn channels(&self) -> usize {
        self.data.ncols()
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn into_inner(self) -> Array2<f64> {
        self.data
    }
}

/// Stride-1 windows for autoencoder training: `T - L` windows, each its own target.
///
/// Mirrors the training loop convention where the last full slice starting at `T - L` is not
/// emitted, so a stream of exactly `L` rows yields no windows.
pub fn create_training_windows(data: ArrayView2<'_, f64>, len: usize) -> Result<Vec<SequenceWindow>> {
    if len == 0 {
        return Err(EngineError::Configuration("sequence_length must be > 0".into()));
    }
    let total = data.nrows();
    let count = total.saturating_sub(len);
    Ok((0..count)
        .map(|start| SequenceWindow {
            data: data.slice(s![start..start + len, ..]).to_owned(),
        })
        .collect())
}

/// The most recent `len` rows. Short histories are rejected; pad them first.
pub fn latest_window(data: ArrayView2<'_, f64>, len: usize) -> Result<SequenceWindow> {
    let total = data.nrows();
    if total < len {
        return Err(EngineError::shape("history length", format!(">= {}", len), total));
    }
    Ok(SequenceWindow {
        data: data.slice(s![total - len.., ..]).to_owned(),
    })
}

/// Caller-side padding policy: repeat the last known row until `len` rows exist, keeping
/// only the most recent `len` when the history is longer.
pub fn pad_repeat_last(data: ArrayView2<'_, f64>, len: usize) -> Result<Array2<f64>> {
    let total = data.nrows();
    if total == 0 {
        return Err(EngineError::InsufficientData(
            "cannot pad an empty history".into(),
        ));
    }
    if total >= len {
        return Ok(data.slice(s![total - len.., ..]).to_owned());
    }
    let mut out = Array2::zeros((len, data.ncols()));
    out.slice_mut(s![..total, ..]).assign(&data);
    let last = data.row(total - 1);
    for mut row in out.axis_iter_mut(Axis(0)).skip(total) {
        row.assign(&last);
    }
    Ok(out)
}

/// Shuffled train / validation / test partition of windows.
#[derive(Debug, Clone, Default)]
pub struct DatasetSplit {
    pub train: Vec<SequenceWindow>,
    pub validation: Vec<SequenceWindow>,
    pub test: Vec<SequenceWindow>,
}

/// Shuffle then carve off `test_size` of all windows, then `validation_size` (as a share of
/// the full set) from the remainder.
pub fn split_windows<R: Rng + ?Sized>(
    mut windows: Vec<SequenceWindow>,
    test_size: f64,
    validation_size: f64,
    rng: &mut R,
) -> Result<DatasetSplit> {
    if !(0.0..1.0).contains(&test_size)
        || !(0.0..1.0).contains(&validation_size)
        || test_size + validation_size >= 1.0
    {
        return Err(EngineError::Configuration(format!(
            "invalid split fractions: test={} validation={}",
            test_size, validation_size
        )));
    }
    windows.shuffle(rng);

    let n = windows.len();
    let n_test = (n as f64 * test_size).ceil() as usize;
    let remaining = n - n_test.min(n);
    let val_share = validation_size / (1.0 - test_size);
    let n_val = ((remaining as f64) * val_share).ceil() as usize;

    let test = windows.split_off(n - n_test.min(n));
    let validation = windows.split_off(remaining - n_val.min(remaining));
    Ok(DatasetSplit {
        train: windows,
        validation,
        test,
    })
}
