//! Calibrated waveforms and the raw-to-physical scaling transform.

use crate::{
    error::{Error, Result},
    scpi::EventStatusByte,
};

pub mod archive;

pub use self::archive::WaveformArchive;

/// Signed integer samples exactly as transferred by the instrument.
pub type RawSamples = Vec<i16>;

/// Per-acquisition constants converting raw samples to volts and seconds.
///
/// Read from the instrument after every transfer; the instrument may rescale between
/// acquisitions so these are never reused for another curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationScalars {
    pub y_mult: f64,
    pub y_zero: f64,
    pub x_incr: f64,
    pub x_zero: f64,
    /// Index of the trigger point inside the record, in samples.
    pub pre_trigger_offset: i64,
}

impl CalibrationScalars {
    pub fn check(&self) -> Result<()> {
        if !(self.x_incr.is_finite() && self.x_incr > 0.0) {
            return Err(Error::invalid_response(
                "WFMOutpre:XINcr?",
                self.x_incr.to_string(),
            ));
        }
        for (command, value) in [
            ("WFMOutpre:YMUlt?", self.y_mult),
            ("WFMOutpre:YZEro?", self.y_zero),
            ("WFMOutpre:XZEro?", self.x_zero),
        ] {
            if !value.is_finite() {
                return Err(Error::invalid_response(command, value.to_string()));
            }
        }
        Ok(())
    }

    /// Time of the first sample.
    pub fn t_start(&self) -> f64 {
        -(self.pre_trigger_offset as f64) * self.x_incr + self.x_zero
    }
}

/// A waveform in physical units. Owned by whoever requested it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledWaveform {
    sample_interval: f64,
    samples: Vec<f64>,
    time: Vec<f64>,
}

impl ScaledWaveform {
    /// Builds a waveform whose time axis starts at `t_start` and advances by
    /// `sample_interval` per sample.
    pub fn from_uniform(sample_interval: f64, samples: Vec<f64>, t_start: f64) -> Self {
        let time = (0..samples.len())
            .map(|i| t_start + i as f64 * sample_interval)
            .collect();
        Self {
            sample_interval,
            samples,
            time,
        }
    }

    /// Seconds between samples.
    pub fn sample_interval(&self) -> f64 {
        self.sample_interval
    }
    /// Volts.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }
    /// Seconds, relative to the trigger.
    pub fn time(&self) -> &[f64] {
        &self.time
    }
    pub fn len(&self) -> usize {
        self.samples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Smallest and largest voltage, `None` for an empty waveform.
    pub fn voltage_range(&self) -> Option<(f64, f64)> {
        self.samples.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

/// Converts raw samples to volts and builds the matching time axis.
///
/// `voltage[i] = raw[i] * y_mult + y_zero`; the vertical offset of this instrument family
/// is always folded into `y_zero`. The time axis runs from
/// `-pre_trigger_offset * x_incr + x_zero` in steps of `x_incr`.
pub fn scale(raw: &[i16], scalars: &CalibrationScalars) -> ScaledWaveform {
    let samples = raw
        .iter()
        .map(|&r| f64::from(r) * scalars.y_mult + scalars.y_zero)
        .collect();
    ScaledWaveform::from_uniform(scalars.x_incr, samples, scalars.t_start())
}

/// Fails with [`Error::DataTransfer`] when the event status register read after a curve
/// transfer has any of the query, device, execution or command error bits set.
pub fn verify_transfer_status(status: EventStatusByte) -> Result<()> {
    if status.has_errors() {
        Err(Error::DataTransfer(status))
    } else {
        Ok(())
    }
}
