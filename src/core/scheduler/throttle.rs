//! Load-driven tuning of worker count and batch size.
//!
//! A background thread samples CPU and memory usage at a fixed interval and
//! nudges the tuning up or down. The scheduler reads the current tuning
//! only between batches, so a change never affects work already running.

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use sysinfo::System;
use tracing::{debug, warn};

pub const MIN_THREADS: usize = 1;
pub const MAX_THREADS: usize = 32;
pub const MIN_BATCH_SIZE: usize = 10;
pub const MAX_BATCH_SIZE: usize = 1000;

/// One reading of system load, in percent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSample {
    pub cpu_percent: f32,
    pub memory_percent: f32,
}

impl ResourceSample {
    /// Either reading strictly above `threshold`
    pub fn is_high(&self, threshold: f32) -> bool {
        self.cpu_percent > threshold || self.memory_percent > threshold
    }
}

/// Source of load readings.
///
/// Runs on the throttle thread, never on the scheduler thread.
pub trait ResourceMonitor: Send {
    fn sample(&mut self) -> ResourceSample;
}

/// Reads whole-system load through sysinfo
pub struct SystemResourceMonitor {
    system: System,
}

impl SystemResourceMonitor {
    pub fn new() -> Self {
        let mut system = System::new();
        // CPU usage is a delta, so prime it once
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self { system }
    }
}

impl Default for SystemResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceMonitor for SystemResourceMonitor {
    fn sample(&mut self) -> ResourceSample {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        let total = self.system.total_memory();
        let memory_percent = if total > 0 {
            (self.system.used_memory() as f64 / total as f64 * 100.0) as f32
        } else {
            0.0
        };

        ResourceSample {
            cpu_percent: self.system.global_cpu_usage(),
            memory_percent,
        }
    }
}

/// Worker count and batch size for the next batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuning {
    pub num_threads: usize,
    pub batch_size: usize,
}

impl Tuning {
    /// Build a tuning clamped to the supported ranges
    pub fn new(num_threads: usize, batch_size: usize) -> Self {
        Self {
            num_threads: num_threads.clamp(MIN_THREADS, MAX_THREADS),
            batch_size: batch_size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE),
        }
    }

    /// Back off under load, grow otherwise.
    ///
    /// Threads move by one; batches halve or double.
    pub fn adjusted(self, sample: ResourceSample, high_water: f32) -> Self {
        if sample.is_high(high_water) {
            Self::new(self.num_threads.saturating_sub(1), self.batch_size / 2)
        } else {
            Self::new(
                self.num_threads.saturating_add(1),
                self.batch_size.saturating_mul(2),
            )
        }
    }
}

/// Holds the current tuning and, when adaptive, the sampling thread
pub struct AdaptiveThrottle {
    tuning: Arc<Mutex<Tuning>>,
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl AdaptiveThrottle {
    /// A throttle that never changes its tuning
    pub fn fixed(tuning: Tuning) -> Self {
        Self {
            tuning: Arc::new(Mutex::new(tuning)),
            shutdown: None,
            handle: None,
        }
    }

    /// Start sampling `monitor` every `interval`
    pub fn spawn(
        mut monitor: Box<dyn ResourceMonitor>,
        initial: Tuning,
        high_water: f32,
        interval: Duration,
    ) -> io::Result<Self> {
        let tuning = Arc::new(Mutex::new(initial));
        let (shutdown, signal) = bounded::<()>(1);

        let shared = Arc::clone(&tuning);
        let handle = thread::Builder::new()
            .name("resource-monitor".to_string())
            .spawn(move || loop {
                match signal.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    // Shutdown requested or the throttle was dropped
                    _ => break,
                }

                let sample = monitor.sample();
                debug!(
                    cpu_percent = sample.cpu_percent,
                    memory_percent = sample.memory_percent,
                    "Resource usage"
                );
                if sample.is_high(high_water) {
                    warn!(
                        cpu = sample.cpu_percent,
                        memory = sample.memory_percent,
                        threshold = high_water,
                        "High resource usage detected"
                    );
                }

                let mut current = shared.lock().unwrap_or_else(PoisonError::into_inner);
                let next = current.adjusted(sample, high_water);
                if next != *current {
                    debug!(
                        threads = next.num_threads,
                        batch_size = next.batch_size,
                        "Retuned for next batch"
                    );
                    *current = next;
                }
            })?;

        Ok(Self {
            tuning,
            shutdown: Some(shutdown),
            handle: Some(handle),
        })
    }

    /// Tuning to use for the next batch
    pub fn current(&self) -> Tuning {
        *self.tuning.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_adaptive(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop the sampling thread and wait for it
    pub fn shutdown(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Resource monitor thread panicked");
            }
        }
    }
}

impl Drop for AdaptiveThrottle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
