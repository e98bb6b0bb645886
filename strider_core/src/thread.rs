//! Managed background threads.
//!
//! Every long-running worker the library spawns registers a cooperative stop
//! flag in a process-wide registry so shutdown can bring them all down in
//! one call. The registry is the only global state in the crate and is
//! touched rarely, so a single mutex is enough.

use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::hal::{BusHandle, MotorBus, ServoBus};

static REGISTRY: Lazy<Mutex<Vec<Weak<AtomicBool>>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Handle to a background worker with a cooperative stop flag.
pub struct ManagedThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ManagedThread {
    /// Ask the worker to stop and wait for it to finish.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("managed thread panicked before joining");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some() && !self.stop.load(Ordering::Relaxed)
    }
}

impl Drop for ManagedThread {
    fn drop(&mut self) {
        // Signal without joining; a blocking drop could deadlock a worker
        // that is waiting on the dropper's thread.
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Spawn a worker that polls the supplied stop flag.
///
/// The closure must return promptly once the flag is set.
pub fn spawn_managed<F>(name: &str, body: F) -> ManagedThread
where
    F: FnOnce(Arc<AtomicBool>) + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    {
        let mut registry = REGISTRY.lock();
        registry.retain(|flag| flag.strong_count() > 0);
        registry.push(Arc::downgrade(&stop));
    }

    let flag = stop.clone();
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || body(flag))
        .expect("failed to spawn managed thread");
    debug!("spawned managed thread '{name}'");

    ManagedThread {
        stop,
        handle: Some(handle),
    }
}

/// Signal every live managed thread to stop.
pub fn stop_all_threads() {
    warn!("stopping all managed threads");
    let mut registry = REGISTRY.lock();
    for flag in registry.drain(..) {
        if let Some(flag) = flag.upgrade() {
            flag.store(true, Ordering::Relaxed);
        }
    }
}

/// Arm a hard shutdown: after `delay`, stop all managed threads, cut motor
/// power, disable servos and exit the process.
pub fn shutdown_in(delay: Duration, bus: BusHandle) {
    debug!("shutting down in {} ms", delay.as_millis());
    thread::spawn(move || {
        thread::sleep(delay);
        info!("shutting down now");
        stop_all_threads();
        bus.all_off();
        bus.disable_servos();
        process::exit(0);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_worker_stops_on_flag() {
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = ticks.clone();
        let mut worker = spawn_managed("test-worker", move |stop| {
            while !stop.load(Ordering::Relaxed) {
                counter.fetch_add(1, Ordering::Relaxed);
                thread::sleep(Duration::from_millis(1));
            }
        });

        thread::sleep(Duration::from_millis(20));
        worker.stop();
        let after_stop = ticks.load(Ordering::Relaxed);
        assert!(after_stop > 0);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(ticks.load(Ordering::Relaxed), after_stop);
    }

    #[test]
    fn test_stop_all_signals_registered_workers() {
        let mut worker = spawn_managed("test-stop-all", |stop| {
            while !stop.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(1));
            }
        });
        stop_all_threads();
        thread::sleep(Duration::from_millis(10));
        assert!(!worker.is_running());
        worker.stop();
    }
}
