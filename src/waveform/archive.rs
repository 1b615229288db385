//! Saved captures.
//!
//! An archive keeps the sample period and the scaled voltages only. Loading rebuilds the
//! time axis from zero, so the pre-trigger offset and `x_zero` of the live capture are
//! not restored: a loaded waveform starts at `t = 0`, a live one at
//! `-pre_trigger_offset * x_incr + x_zero`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::ScaledWaveform;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformArchive {
    pub sample_period: f64,
    pub data: Vec<f64>,
}

impl WaveformArchive {
    pub fn from_waveform(waveform: &ScaledWaveform) -> Self {
        Self {
            sample_period: waveform.sample_interval(),
            data: waveform.samples().to_vec(),
        }
    }

    /// Rebuilds a waveform with its time axis rebased to zero.
    pub fn to_waveform(&self) -> ScaledWaveform {
        ScaledWaveform::from_uniform(self.sample_period, self.data.clone(), 0.0)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::Archive(format!("Failed to serialize archive: {}", e)))
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let archive: Self = serde_json::from_str(s)
            .map_err(|e| Error::Archive(format!("Failed to parse archive: {}", e)))?;
        if !(archive.sample_period.is_finite() && archive.sample_period > 0.0) {
            return Err(Error::Archive(format!(
                "invalid sample period {}",
                archive.sample_period
            )));
        }
        Ok(archive)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), points = self.data.len(), "waveform saved");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let archive = Self::from_json(&content)?;
        info!(path = %path.display(), points = archive.data.len(), "waveform loaded");
        Ok(archive)
    }
}
