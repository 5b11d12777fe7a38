// Signal generator - Deterministic synthetic telemetry per machine, tier and state
use crate::domain::machine::{MachineState, Tier};
use crate::domain::telemetry::{TelemetrySample, TelemetrySeries};
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Distribution;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use sha2::{Digest, Sha256};
use statrs::distribution::Normal;
use std::f64::consts::PI;
use thiserror::Error;

pub const DEFAULT_WINDOW_MINUTES: u32 = 240;
pub const DEFAULT_STEP_SECONDS: u32 = 30;
/// Largest series a single generation may produce.
pub const MAX_SAMPLES: u64 = 100_000;

const VIBRATION_RANGE: (f64, f64) = (0.0, 20.0);
const TEMPERATURE_RANGE: (f64, f64) = (0.0, 130.0);
const CURRENT_RANGE: (f64, f64) = (0.0, 1.2);

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("window_minutes must be greater than 0")]
    EmptyWindow,
    #[error("step_seconds must be greater than 0")]
    ZeroStep,
    #[error("window of {count} samples exceeds the limit of 100000")]
    TooManySamples { count: u64 },
    #[error("invalid noise distribution: {0}")]
    Noise(String),
}

/// Baseline curve value of each channel at one instant.
struct Baseline {
    vibration: f64,
    temperature: f64,
    current: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalGenerator {
    window_minutes: u32,
    step_seconds: u32,
}

impl Default for SignalGenerator {
    fn default() -> Self {
        Self {
            window_minutes: DEFAULT_WINDOW_MINUTES,
            step_seconds: DEFAULT_STEP_SECONDS,
        }
    }
}

impl SignalGenerator {
    pub fn new(window_minutes: u32, step_seconds: u32) -> Result<Self, SimulationError> {
        if window_minutes == 0 {
            return Err(SimulationError::EmptyWindow);
        }
        if step_seconds == 0 {
            return Err(SimulationError::ZeroStep);
        }
        let count = window_sample_count(window_minutes, step_seconds);
        if count > MAX_SAMPLES {
            return Err(SimulationError::TooManySamples { count });
        }
        Ok(Self {
            window_minutes,
            step_seconds,
        })
    }

    pub fn window_minutes(&self) -> u32 {
        self.window_minutes
    }

    pub fn step_seconds(&self) -> u32 {
        self.step_seconds
    }

    /// Samples in the window, both ends included.
    pub fn sample_count(&self) -> usize {
        window_sample_count(self.window_minutes, self.step_seconds) as usize
    }

    /// Generate the series for the window ending at `end`.
    ///
    /// Values depend only on `(machine_id, tier, state)` and the window shape;
    /// `end` only positions the timestamps.
    pub fn generate(
        &self,
        machine_id: &str,
        tier: Tier,
        state: MachineState,
        end: DateTime<Utc>,
    ) -> Result<TelemetrySeries, SimulationError> {
        let timestamps = self.timeline(end);
        let n = timestamps.len();

        let noise_scale = match state {
            MachineState::Run => 0.35,
            MachineState::Idle => 0.10,
            MachineState::Down => {
                // Equipment is disconnected, nothing to read.
                let samples = timestamps.into_iter().map(TelemetrySample::missing).collect();
                return Ok(TelemetrySeries::new(samples));
            }
        };

        let mut rng = ChaCha12Rng::seed_from_u64(seed_for(machine_id, tier));

        let spikes = if state == MachineState::Run {
            let drawn = draw_spikes(&mut rng, n, tier.spike_count());
            spike_train(&drawn, n)
        } else {
            vec![0.0; n]
        };

        let vibration_noise = gaussian_noise(&mut rng, noise_scale, n)?;
        let temperature_noise = gaussian_noise(&mut rng, noise_scale * 1.8, n)?;
        let current_noise = gaussian_noise(&mut rng, noise_scale * 0.12, n)?;

        let samples = timestamps
            .into_iter()
            .enumerate()
            .map(|(i, timestamp)| {
                let base = baseline(state, linspace_at(i, n, 1.0));
                let spike = spikes[i];

                let vibration = (base.vibration + spike + vibration_noise[i])
                    .clamp(VIBRATION_RANGE.0, VIBRATION_RANGE.1);
                let temperature = (base.temperature + 0.6 * spike + temperature_noise[i])
                    .clamp(TEMPERATURE_RANGE.0, TEMPERATURE_RANGE.1);
                let current = (base.current + 0.08 * (spike / 4.0) + current_noise[i])
                    .clamp(CURRENT_RANGE.0, CURRENT_RANGE.1);

                TelemetrySample::new(
                    timestamp,
                    round_to(vibration, 2),
                    round_to(temperature, 1),
                    round_to(current, 2),
                )
            })
            .collect();

        tracing::debug!(
            "Generated {} samples for {} ({}, {})",
            n,
            machine_id,
            tier,
            state
        );

        Ok(TelemetrySeries::new(samples))
    }

    fn timeline(&self, end: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let start = end - Duration::minutes(i64::from(self.window_minutes));
        let step = i64::from(self.step_seconds);
        (0..self.sample_count())
            .map(|i| start + Duration::seconds(step * i as i64))
            .collect()
    }
}

/// Samples in a window of `window_minutes`, both ends included.
pub fn window_sample_count(window_minutes: u32, step_seconds: u32) -> u64 {
    u64::from(window_minutes) * 60 / u64::from(step_seconds.max(1)) + 1
}

/// Stable seed for a machine on a given tier, independent of process and state.
pub fn seed_for(machine_id: &str, tier: Tier) -> u64 {
    let digest = Sha256::digest(format!("{}::{}", machine_id, tier.as_str()).as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

fn baseline(state: MachineState, t: f64) -> Baseline {
    match state {
        MachineState::Run => Baseline {
            vibration: 6.0 + 1.2 * (2.0 * PI * 2.0 * t).sin(),
            temperature: 72.0 + 6.0 * t,
            current: 0.75 + 0.08 * (2.0 * PI * 1.5 * t).sin(),
        },
        // Stopped: cooling from ~55 towards ~40 with the spindle off.
        MachineState::Idle | MachineState::Down => Baseline {
            vibration: 0.4,
            temperature: 40.0 + (55.0 - 40.0) * (-4.0 * t).exp(),
            current: 0.03,
        },
    }
}

/// A transient bump injected into a running machine's vibration.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Spike {
    start: usize,
    width: usize,
    height: f64,
}

/// Distinct spike starts inside the 15%..95% band, each with its own shape.
fn draw_spikes(rng: &mut ChaCha12Rng, n: usize, count: usize) -> Vec<Spike> {
    let lower = (n as f64 * 0.15) as usize;
    let upper = (n as f64 * 0.95) as usize;
    let band = upper.saturating_sub(lower);
    let amount = count.min(band);
    if amount == 0 {
        return Vec::new();
    }

    index::sample(rng, band, amount)
        .into_iter()
        .map(|offset| Spike {
            start: lower + offset,
            width: rng.gen_range(10..25),
            height: rng.gen_range(1.5..4.0),
        })
        .collect()
}

/// Exponentially decaying profile of the spikes; overlapping bumps add up.
fn spike_train(spikes: &[Spike], n: usize) -> Vec<f64> {
    let mut train = vec![0.0; n];
    for spike in spikes {
        let stop = n.min(spike.start + spike.width);
        let len = stop - spike.start;
        for (k, slot) in train[spike.start..stop].iter_mut().enumerate() {
            *slot += spike.height * (-linspace_at(k, len, 2.0)).exp();
        }
    }
    train
}

fn gaussian_noise(rng: &mut ChaCha12Rng, std_dev: f64, n: usize) -> Result<Vec<f64>, SimulationError> {
    let normal =
        Normal::new(0.0, std_dev).map_err(|e| SimulationError::Noise(e.to_string()))?;
    Ok((0..n).map(|_| normal.sample(rng)).collect())
}

/// k-th of `len` evenly spaced points over [0, end].
fn linspace_at(k: usize, len: usize, end: f64) -> f64 {
    if len <= 1 {
        0.0
    } else {
        end * k as f64 / (len - 1) as f64
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}
