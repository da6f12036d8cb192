//! Splash detection over the system audio output.
//!
//! A background thread owns the capture stream and feeds fixed-size mono
//! blocks into a bounded drop-oldest queue. The foreground polls the queue,
//! computes RMS per block and declares a bite on a loud peak that clearly
//! rises above the rolling baseline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use crossbeam_channel::{bounded, Receiver, Sender};

use super::base::{push_drop_oldest, rms, AmplitudeHistory, AudioBlock};
use super::error::AudioError;
use crate::utils::settings::AudioSettings;

/// Decides whether one RMS value is a splash peak.
///
/// A peak must clear the absolute threshold, exceed the rolling baseline by
/// `min_ratio`, and land outside the cooldown window since the last peak so
/// one physical splash never fires twice.
struct PeakDetector {
    history: AmplitudeHistory,
    threshold: f32,
    min_ratio: f32,
    cooldown: Duration,
    last_detection: Option<Instant>,
}

impl PeakDetector {
    fn new(settings: &AudioSettings) -> Self {
        Self {
            history: AmplitudeHistory::new(settings.history_size),
            threshold: settings.rms_threshold,
            min_ratio: settings.peak_ratio,
            cooldown: settings.cooldown(),
            last_detection: None,
        }
    }

    /// Record an amplitude without running detection (used during the
    /// post-cast ignore window so the baseline stays warm).
    fn track(&mut self, amplitude: f32) {
        self.history.push(amplitude);
    }

    fn observe(&mut self, amplitude: f32, now: Instant) -> bool {
        self.history.push(amplitude);

        let Some(baseline) = self.history.baseline() else {
            return false;
        };
        let ratio = amplitude / (baseline + 1e-6);

        let cooled_down = self
            .last_detection
            .map(|t| now.duration_since(t) >= self.cooldown)
            .unwrap_or(true);

        if amplitude > self.threshold && ratio > self.min_ratio && cooled_down {
            self.last_detection = Some(now);
            tracing::debug!(
                "[AUDIO] Peak: rms {:.6}, {:.1}x baseline",
                amplitude,
                ratio
            );
            return true;
        }

        false
    }

    /// Drop the history for a fresh cycle. The cooldown clock survives so
    /// debounce also holds across cycle boundaries.
    fn reset(&mut self) {
        self.history.clear();
    }
}

/// Audio bite detector over system-output (loopback) capture.
pub struct SoundDetector {
    settings: AudioSettings,
    tx: Sender<AudioBlock>,
    rx: Receiver<AudioBlock>,
    stop_flag: Arc<AtomicBool>,
    capture_thread: Option<JoinHandle<()>>,
    listening: bool,
    peak: PeakDetector,
    listen_started: Instant,
}

impl SoundDetector {
    pub fn new(settings: AudioSettings) -> Self {
        let (tx, rx) = bounded(settings.queue_capacity);
        Self {
            peak: PeakDetector::new(&settings),
            settings,
            tx,
            rx,
            stop_flag: Arc::new(AtomicBool::new(false)),
            capture_thread: None,
            listening: false,
            listen_started: Instant::now(),
        }
    }

    /// Spawn the capture thread. Idempotent. Returns an error if no output
    /// device exists or the stream cannot be opened - both fatal at
    /// startup.
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.listening {
            return Ok(());
        }

        self.stop_flag.store(false, Ordering::SeqCst);

        let (ready_tx, ready_rx) = bounded::<Result<u32, AudioError>>(1);
        let tx = self.tx.clone();
        let rx = self.rx.clone();
        let stop = self.stop_flag.clone();
        let chunk_size = self.settings.chunk_size;

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || capture_loop(tx, rx, stop, chunk_size, ready_tx))
            .expect("failed to spawn audio capture thread");

        self.capture_thread = Some(handle);

        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(sample_rate)) => {
                self.listening = true;
                tracing::info!("[AUDIO] Loopback capture started at {} Hz", sample_rate);
                Ok(())
            }
            Ok(Err(e)) => {
                self.join_capture_thread();
                Err(e)
            }
            Err(_) => {
                self.stop_flag.store(true, Ordering::SeqCst);
                self.join_capture_thread();
                Err(AudioError::StartTimeout)
            }
        }
    }

    /// Stop the capture thread. Idempotent.
    pub fn stop(&mut self) {
        if !self.listening {
            return;
        }
        self.stop_flag.store(true, Ordering::SeqCst);
        self.join_capture_thread();
        self.listening = false;
        tracing::info!("[AUDIO] Loopback capture stopped");
    }

    fn join_capture_thread(&mut self) {
        if let Some(handle) = self.capture_thread.take() {
            let _ = handle.join();
        }
    }

    /// One detection tick: pop a block and check for a peak. An empty
    /// queue is "no detection", not an error.
    fn detect_splash(&mut self) -> bool {
        if !self.listening {
            return false;
        }

        let block = match self.rx.recv_timeout(self.settings.block_poll()) {
            Ok(block) => block,
            Err(_) => return false,
        };

        let amplitude = rms(&block);
        let now = Instant::now();

        // Right after casting, the rod's own splash would trigger a false
        // positive. Keep feeding the baseline but suppress detection.
        if now.duration_since(self.listen_started) < self.settings.ignore_after_cast() {
            self.peak.track(amplitude);
            return false;
        }

        if self.peak.observe(amplitude, now) {
            println!("Splash detected! (rms {:.6})", amplitude);
            return true;
        }

        false
    }

    /// Poll for a splash until `timeout`. Stale blocks from the previous
    /// cycle are flushed first and the history is reset, so one cycle
    /// never contaminates the next.
    pub fn wait_for_bite(&mut self, timeout: Duration) -> bool {
        if !self.listening {
            if let Err(e) = self.start() {
                tracing::error!("[AUDIO] Cannot wait for bite: {}", e);
                return false;
            }
            // give the stream a moment to deliver its first blocks
            thread::sleep(Duration::from_millis(500));
        }

        while self.rx.try_recv().is_ok() {}
        self.peak.reset();
        self.listen_started = Instant::now();

        tracing::debug!(
            "[AUDIO] Waiting for splash (timeout {:.0}s, ignoring first {:.1}s)",
            timeout.as_secs_f64(),
            self.settings.ignore_after_cast_secs
        );

        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.detect_splash() {
                return true;
            }
            thread::sleep(self.settings.poll_interval());
        }

        tracing::debug!("[AUDIO] No splash within the timeout");
        false
    }

    /// Measure ambient noise for `duration` and recommend a threshold.
    pub fn calibrate(&mut self, duration: Duration) -> Result<super::base::CalibrationReport, AudioError> {
        self.start()?;
        while self.rx.try_recv().is_ok() {}

        let mut amplitudes = Vec::new();
        let started = Instant::now();
        while started.elapsed() < duration {
            if let Ok(block) = self.rx.recv_timeout(self.settings.block_poll()) {
                amplitudes.push(rms(&block));
            }
        }

        super::base::CalibrationReport::from_samples(&amplitudes).ok_or(AudioError::NoData)
    }

    /// Live detection test: print every splash detected for `duration`.
    pub fn test_detection(&mut self, duration: Duration) -> Result<u32, AudioError> {
        self.start()?;
        while self.rx.try_recv().is_ok() {}
        self.peak.reset();
        // no cast happened, so skip the ignore window entirely
        self.listen_started = Instant::now() - self.settings.ignore_after_cast();

        let mut detections = 0;
        let started = Instant::now();
        while started.elapsed() < duration {
            if self.detect_splash() {
                detections += 1;
                println!("[{:.1}s] Detection #{}", started.elapsed().as_secs_f64(), detections);
            }
            thread::sleep(Duration::from_millis(10));
        }

        Ok(detections)
    }
}

impl crate::bot::BiteDetector for SoundDetector {
    fn start(&mut self) -> anyhow::Result<()> {
        SoundDetector::start(self)?;
        Ok(())
    }

    fn stop(&mut self) {
        SoundDetector::stop(self);
    }

    fn wait_for_bite(&mut self, timeout: Duration) -> bool {
        SoundDetector::wait_for_bite(self, timeout)
    }
}

impl Drop for SoundDetector {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Body of the capture thread. The cpal stream is built and owned here
/// because streams cannot move between threads; the init outcome goes back
/// through `ready_tx`.
fn capture_loop(
    tx: Sender<AudioBlock>,
    rx: Receiver<AudioBlock>,
    stop: Arc<AtomicBool>,
    chunk_size: usize,
    ready_tx: Sender<Result<u32, AudioError>>,
) {
    let host = cpal::default_host();

    // Opening the default output device for input gives a WASAPI loopback
    // stream of everything the system plays. Fall back to the default
    // input device on hosts without loopback support.
    let device = match host.default_output_device().or_else(|| host.default_input_device()) {
        Some(d) => d,
        None => {
            let _ = ready_tx.send(Err(AudioError::NoOutputDevice));
            return;
        }
    };

    let supported = match device
        .default_output_config()
        .or_else(|_| device.default_input_config())
    {
        Ok(c) => c,
        Err(e) => {
            let _ = ready_tx.send(Err(e.into()));
            return;
        }
    };

    let sample_format = supported.sample_format();
    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    let config: cpal::StreamConfig = supported.into();

    let mut chunker = Chunker {
        pending: Vec::with_capacity(chunk_size),
        chunk_size,
        channels: channels.max(1),
        tx,
        rx,
    };

    let err_fn = |err| tracing::warn!("[AUDIO] Capture stream error: {}", err);

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                chunker.feed(data.iter().copied());
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                chunker.feed(data.iter().map(|s| *s as f32 / i16::MAX as f32));
            },
            err_fn,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                chunker.feed(data.iter().map(|s| (*s as f32 - 32768.0) / 32768.0));
            },
            err_fn,
            None,
        ),
        other => {
            let _ = ready_tx.send(Err(AudioError::UnsupportedFormat(other)));
            return;
        }
    };

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(e.into()));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(e.into()));
        return;
    }

    let _ = ready_tx.send(Ok(sample_rate));

    while !stop.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(50));
    }
    // the stream stops when dropped here
}

/// Downmixes interleaved frames to mono and emits fixed-size blocks.
struct Chunker {
    pending: Vec<f32>,
    chunk_size: usize,
    channels: usize,
    tx: Sender<AudioBlock>,
    rx: Receiver<AudioBlock>,
}

impl Chunker {
    fn feed(&mut self, samples: impl Iterator<Item = f32>) {
        let mut frame = Vec::with_capacity(self.channels);
        for sample in samples {
            frame.push(sample);
            if frame.len() == self.channels {
                let mono = frame.iter().sum::<f32>() / self.channels as f32;
                frame.clear();
                self.pending.push(mono);
                if self.pending.len() >= self.chunk_size {
                    let block =
                        std::mem::replace(&mut self.pending, Vec::with_capacity(self.chunk_size));
                    push_drop_oldest(&self.tx, &self.rx, block);
                }
            }
        }
    }
}
