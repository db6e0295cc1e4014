//! Waveform Rendering and WAV Output
//!
//! Turns a captured flux-transition sequence into a square waveform and
//! writes it as a mono float WAV file, so an emitted swipe can be inspected
//! in any audio editor. Host-side tooling only; the firmware path never
//! renders.

use std::path::Path;

use crate::flux::HALF_PERIOD_US;
use crate::{FluxError, Result};

/// Waveform rendering configuration
#[derive(Debug, Clone, Copy)]
pub struct ExportConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Peak amplitude of the rendered square wave
    pub amplitude: f32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            sample_rate: 48_000,
            amplitude: 0.8,
        }
    }
}

/// Render flux transitions into a square waveform
///
/// The level starts low (coil at rest) and toggles at every transition
/// timestamp; one extra bit period of tail is appended after the last
/// transition. Returns an empty buffer for an empty capture.
pub fn render_waveform(transitions: &[u64], config: ExportConfig) -> Vec<f32> {
    let Some(&last) = transitions.last() else {
        return Vec::new();
    };

    let total_us = last + 2 * u64::from(HALF_PERIOD_US);
    let total_samples = (total_us * u64::from(config.sample_rate)).div_ceil(1_000_000) as usize;

    let mut samples = Vec::with_capacity(total_samples);
    let mut level = -config.amplitude;
    let mut next = 0;
    for n in 0..total_samples {
        let t_us = n as u64 * 1_000_000 / u64::from(config.sample_rate);
        while next < transitions.len() && transitions[next] <= t_us {
            level = -level;
            next += 1;
        }
        samples.push(level);
    }
    samples
}

/// Render a capture and write it as a mono 32-bit float WAV file
pub fn export_to_wav<P: AsRef<Path>>(
    transitions: &[u64],
    config: ExportConfig,
    output_path: P,
) -> Result<()> {
    let samples = render_waveform(transitions, config);
    if samples.is_empty() {
        return Err(FluxError::Export("nothing captured to export".into()));
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: config.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(output_path, spec)
        .map_err(|e| FluxError::Export(e.to_string()))?;
    for sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| FluxError::Export(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| FluxError::Export(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_level_toggles_at_each_transition() {
        let config = ExportConfig {
            sample_rate: 1_000_000, // one sample per microsecond
            amplitude: 1.0,
        };
        let samples = render_waveform(&[0, 200], config);

        assert_relative_eq!(samples[0], 1.0); // first transition at t=0
        assert_relative_eq!(samples[100], 1.0);
        assert_relative_eq!(samples[250], -1.0); // after second transition
    }

    #[test]
    fn test_empty_capture_renders_nothing() {
        assert!(render_waveform(&[], ExportConfig::default()).is_empty());
    }

    #[test]
    fn test_tail_appended_after_last_transition() {
        let config = ExportConfig {
            sample_rate: 1_000_000,
            amplitude: 1.0,
        };
        let samples = render_waveform(&[0], config);
        assert_eq!(samples.len(), 2 * HALF_PERIOD_US as usize);
    }

    #[test]
    fn test_wav_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swipe.wav");
        let config = ExportConfig::default();
        export_to_wav(&[0, 200, 400, 800], config, &path).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, config.sample_rate);
        let first: f32 = reader.samples::<f32>().next().unwrap().unwrap();
        assert_relative_eq!(first, config.amplitude);
    }

    #[test]
    fn test_export_of_empty_capture_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        assert!(export_to_wav(&[], ExportConfig::default(), &path).is_err());
    }
}
