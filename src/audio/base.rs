//! Building blocks for splash detection: RMS, the amplitude history ring
//! buffer and the drop-oldest capture queue

use std::collections::VecDeque;

use crossbeam_channel::{Receiver, Sender, TrySendError};

/// One block of mono samples from the capture stream.
pub type AudioBlock = Vec<f32>;

/// Root-mean-square amplitude of a block.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Fixed-capacity history of RMS values. Pushing past capacity evicts the
/// oldest entry, so the eviction invariant holds by construction.
#[derive(Debug, Clone)]
pub struct AmplitudeHistory {
    values: VecDeque<f32>,
    capacity: usize,
}

impl AmplitudeHistory {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be nonzero");
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f32) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Mean of every entry except the newest, the rolling baseline a peak
    /// is compared against. `None` until at least three entries exist, so
    /// the first blocks after a reset never count as peaks.
    pub fn baseline(&self) -> Option<f32> {
        if self.values.len() < 3 {
            return None;
        }
        let n = self.values.len() - 1;
        let sum: f32 = self.values.iter().take(n).sum();
        Some(sum / n as f32)
    }
}

/// Push a block into a bounded channel, dropping the oldest queued block
/// when full. Recency beats completeness here: stale audio is useless for
/// peak detection. Never blocks.
pub fn push_drop_oldest<T>(tx: &Sender<T>, rx: &Receiver<T>, value: T) {
    match tx.try_send(value) {
        Ok(()) => {}
        Err(TrySendError::Full(value)) => {
            let _ = rx.try_recv();
            let _ = tx.try_send(value);
        }
        Err(TrySendError::Disconnected(_)) => {}
    }
}

/// Result of an ambient-noise calibration run.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationReport {
    pub mean: f32,
    pub max: f32,
    pub std_dev: f32,
    pub recommended_threshold: f32,
}

impl CalibrationReport {
    /// Summarize a series of RMS amplitudes. The recommended threshold is
    /// 5x the loudest ambient block.
    pub fn from_samples(amplitudes: &[f32]) -> Option<Self> {
        if amplitudes.is_empty() {
            return None;
        }

        let n = amplitudes.len() as f32;
        let mean = amplitudes.iter().sum::<f32>() / n;
        let max = amplitudes.iter().cloned().fold(0.0f32, f32::max);
        let variance = amplitudes.iter().map(|a| (a - mean) * (a - mean)).sum::<f32>() / n;

        Some(Self {
            mean,
            max,
            std_dev: variance.sqrt(),
            recommended_threshold: max * 5.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(rms(&[0.0, 0.0]), 0.0);
        // constant amplitude: RMS equals the amplitude
        assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut history = AmplitudeHistory::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            history.push(v);
        }
        assert_eq!(history.len(), 3);
        // 1.0 was evicted: baseline is mean of [2.0, 3.0]
        assert!((history.baseline().unwrap() - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_baseline_needs_three_samples() {
        let mut history = AmplitudeHistory::new(10);
        history.push(0.1);
        assert!(history.baseline().is_none());
        history.push(0.1);
        assert!(history.baseline().is_none());
        history.push(0.9);
        // baseline excludes the newest value
        assert!((history.baseline().unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_queue_drops_oldest_never_blocks() {
        let (tx, rx) = bounded::<u32>(3);
        for i in 1..=4 {
            push_drop_oldest(&tx, &rx, i);
        }
        // newest 3 survive
        assert_eq!(rx.try_recv(), Ok(2));
        assert_eq!(rx.try_recv(), Ok(3));
        assert_eq!(rx.try_recv(), Ok(4));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_calibration_recommends_5x_max() {
        let samples = vec![0.0001f32; 100];
        let report = CalibrationReport::from_samples(&samples).unwrap();
        assert!((report.mean - 0.0001).abs() < 1e-7);
        assert!((report.max - 0.0001).abs() < 1e-7);
        assert!(report.std_dev.abs() < 1e-6);
        assert!((report.recommended_threshold - 0.0005).abs() < 1e-7);
    }

    #[test]
    fn test_calibration_empty() {
        assert!(CalibrationReport::from_samples(&[]).is_none());
    }
}
