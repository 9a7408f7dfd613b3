/*
 *  widgets/poller.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Widget-owned polling thread: ticker, stop channel, reinit, panic guard
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use log::{debug, error, info, warn};

use crate::sensors::SensorError;
use crate::timebase::Timebase;
use super::autohide::AutoHide;

pub const STALE_AFTER: u32 = 3;
pub const REINIT_COOLDOWN: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub enum SensorHealth {
    Ok,
    /// consecutive failures reached the stale threshold
    Stale,
    /// (re)initialisation failed or the thread panicked
    Fatal(String),
}

/// Work run on a polling thread. The task is built on that thread and
/// never leaves it, so thread-affine sensor handles may live inside.
pub trait PollTask {
    /// Create or recreate the sensor handle
    fn init(&mut self) -> Result<(), SensorError>;

    fn poll(&mut self, now: Instant) -> Result<(), SensorError>;

    fn needs_reinitialize(&self) -> bool {
        false
    }

    /// Fires when the platform default device changes
    fn device_changes(&mut self) -> Option<Receiver<()>> {
        None
    }

    fn on_health(&mut self, _health: SensorHealth) {}
}

/// What a polled widget should draw this frame
#[derive(Debug, Clone, PartialEq)]
pub enum PolledFrame<T> {
    Stopped,
    /// sensor fatal since the given instant, flash the error frame
    Fatal(Instant),
    Hidden,
    Pending,
    Ready(T),
}

/// State shared between a polled widget and its polling thread, always
/// behind the widget's `RwLock`
#[derive(Debug)]
pub struct PolledState<T> {
    pub reading: Option<T>,
    pub health: SensorHealth,
    pub fatal_since: Option<Instant>,
    pub autohide: AutoHide,
    pub stopped: bool,
}

impl<T: Clone> PolledState<T> {
    pub fn new(autohide: AutoHide) -> Self {
        Self {
            reading: None,
            health: SensorHealth::Ok,
            fatal_since: None,
            autohide,
            stopped: false,
        }
    }

    pub fn record_health(&mut self, health: SensorHealth, now: Instant) {
        match health {
            SensorHealth::Fatal(_) => {
                self.fatal_since.get_or_insert(now);
            }
            SensorHealth::Ok => self.fatal_since = None,
            SensorHealth::Stale => {}
        }
        self.health = health;
    }

    /// Fatal wins over auto-hide so a dead sensor is never silently hidden
    pub fn frame(&self, now: Instant) -> PolledFrame<T> {
        if self.stopped {
            return PolledFrame::Stopped;
        }
        if let Some(since) = self.fatal_since {
            return PolledFrame::Fatal(since);
        }
        if self.autohide.should_hide(now) {
            return PolledFrame::Hidden;
        }
        match &self.reading {
            Some(r) => PolledFrame::Ready(r.clone()),
            None => PolledFrame::Pending,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub name: String,
    pub interval: Duration,
    pub stale_after: u32,
    pub reinit_cooldown: Duration,
}

impl PollerConfig {
    pub fn new(name: &str, interval: Duration) -> Self {
        Self {
            name: name.to_string(),
            interval,
            stale_after: STALE_AFTER,
            reinit_cooldown: REINIT_COOLDOWN,
        }
    }
}

pub struct Poller {
    name: String,
    stop_tx: Mutex<Option<Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Poller {
    /// Spawn the thread; `make` runs on it to build the task
    pub fn spawn<T, F>(cfg: PollerConfig, timebase: Arc<dyn Timebase>, make: F) -> std::io::Result<Self>
    where
        T: PollTask + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let name = cfg.name.clone();
        let handle = thread::Builder::new()
            .name(format!("poll-{}", cfg.name))
            .spawn(move || {
                info!("{}: polling thread started", cfg.name);
                let mut task: Option<T> = None;
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    let task = task.insert(make());
                    run(task, &cfg, &stop_rx, timebase.as_ref());
                }));
                if let Err(payload) = outcome {
                    let message = panic_message(payload.as_ref());
                    error!(
                        "{}: polling thread panicked: {}\n{}",
                        cfg.name,
                        message,
                        Backtrace::force_capture()
                    );
                    if let Some(task) = task.as_mut() {
                        task.on_health(SensorHealth::Fatal(format!("panic: {}", message)));
                    }
                }
                info!("{}: polling thread stopped", cfg.name);
            })?;
        Ok(Self {
            name,
            stop_tx: Mutex::new(Some(stop_tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Close the stop channel and join. Idempotent.
    pub fn stop(&self) {
        // dropping the sender disconnects the receiver
        drop(self.stop_tx.lock().unwrap_or_else(|e| e.into_inner()).take());
        let handle = self.handle.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("{}: polling thread did not exit cleanly", self.name);
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn try_init<T: PollTask>(task: &mut T, name: &str) -> bool {
    match task.init() {
        Ok(()) => {
            task.on_health(SensorHealth::Ok);
            true
        }
        Err(e) => {
            error!("{}: sensor initialisation failed: {}", name, e);
            task.on_health(SensorHealth::Fatal(e.to_string()));
            false
        }
    }
}

fn run<T: PollTask>(task: &mut T, cfg: &PollerConfig, stop_rx: &Receiver<()>, timebase: &dyn Timebase) {
    let mut ready = try_init(task, &cfg.name);
    let mut last_init = timebase.now();
    let mut device_rx = if ready { task.device_changes() } else { None };
    let mut errors: u32 = 0;
    let mut first = true;

    loop {
        // poll straight after a successful start, then on the ticker
        if !first {
            match stop_rx.recv_timeout(cfg.interval) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        first = false;
        let now = timebase.now();

        let device_changed = device_rx
            .as_ref()
            .is_some_and(|rx| rx.try_iter().count() > 0);
        let cooled = now.saturating_duration_since(last_init) >= cfg.reinit_cooldown;
        let wants_reinit = !ready || errors >= cfg.stale_after || task.needs_reinitialize();

        if device_changed || (wants_reinit && cooled) {
            if device_changed {
                info!("{}: default device changed, reinitialising", cfg.name);
            } else {
                warn!("{}: reinitialising sensor after {} errors", cfg.name, errors);
            }
            last_init = now;
            ready = try_init(task, &cfg.name);
            errors = 0;
            device_rx = if ready { task.device_changes() } else { None };
        }
        if !ready {
            continue;
        }

        match task.poll(now) {
            Ok(()) => {
                if errors >= cfg.stale_after {
                    info!("{}: sensor recovered", cfg.name);
                    task.on_health(SensorHealth::Ok);
                }
                errors = 0;
            }
            Err(e) => {
                errors = errors.saturating_add(1);
                debug!("{}: poll failed ({} in a row): {}", cfg.name, errors, e);
                if errors == cfg.stale_after {
                    warn!("{}: sensor stale after {} consecutive errors", cfg.name, errors);
                    task.on_health(SensorHealth::Stale);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timebase::SystemTimebase;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Log {
        inits: AtomicUsize,
        polls: AtomicUsize,
        health: Mutex<Vec<SensorHealth>>,
    }

    struct Scripted {
        log: Arc<Log>,
        fail_polls: bool,
        fail_reinit: bool,
    }

    impl PollTask for Scripted {
        fn init(&mut self) -> Result<(), SensorError> {
            let n = self.log.inits.fetch_add(1, Ordering::SeqCst);
            if n > 0 && self.fail_reinit {
                return Err(SensorError::Unavailable("gone".into()));
            }
            Ok(())
        }

        fn poll(&mut self, _now: Instant) -> Result<(), SensorError> {
            self.log.polls.fetch_add(1, Ordering::SeqCst);
            if self.fail_polls {
                return Err(SensorError::Unavailable("flaky".into()));
            }
            Ok(())
        }

        fn on_health(&mut self, health: SensorHealth) {
            self.log.health.lock().unwrap().push(health);
        }
    }

    fn config(interval_ms: u64, cooldown_ms: u64) -> PollerConfig {
        PollerConfig {
            name: "test".into(),
            interval: Duration::from_millis(interval_ms),
            stale_after: 3,
            reinit_cooldown: Duration::from_millis(cooldown_ms),
        }
    }

    fn wait_for(pred: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !pred() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_polls_immediately_and_stop_is_idempotent() {
        let log = Arc::new(Log::default());
        let l = log.clone();
        let poller = Poller::spawn(config(10_000, 0), Arc::new(SystemTimebase), move || Scripted {
            log: l,
            fail_polls: false,
            fail_reinit: false,
        })
        .unwrap();
        wait_for(|| log.polls.load(Ordering::SeqCst) >= 1);
        assert_eq!(log.polls.load(Ordering::SeqCst), 1);
        let started = Instant::now();
        poller.stop();
        // the 10 s ticker is interrupted by the closed channel
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!poller.is_running());
        poller.stop();
    }

    #[test]
    fn test_stale_then_fatal_reinit() {
        let log = Arc::new(Log::default());
        let l = log.clone();
        let poller = Poller::spawn(config(2, 0), Arc::new(SystemTimebase), move || Scripted {
            log: l,
            fail_polls: true,
            fail_reinit: true,
        })
        .unwrap();
        wait_for(|| log.health.lock().unwrap().iter().any(|h| matches!(h, SensorHealth::Fatal(_))));
        poller.stop();
        let health = log.health.lock().unwrap().clone();
        assert_eq!(health[0], SensorHealth::Ok);
        assert_eq!(health[1], SensorHealth::Stale);
        assert!(matches!(health[2], SensorHealth::Fatal(_)));
        assert!(log.polls.load(Ordering::SeqCst) >= 3);
        assert!(log.inits.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn test_cooldown_blocks_reinit() {
        let log = Arc::new(Log::default());
        let l = log.clone();
        let poller = Poller::spawn(config(2, 60_000), Arc::new(SystemTimebase), move || Scripted {
            log: l,
            fail_polls: true,
            fail_reinit: false,
        })
        .unwrap();
        wait_for(|| log.polls.load(Ordering::SeqCst) >= 10);
        poller.stop();
        assert_eq!(log.inits.load(Ordering::SeqCst), 1);
    }

    /// Hands out a fresh device-change channel on every init
    struct Rewired {
        log: Arc<Log>,
        notify: Arc<Mutex<Option<Sender<()>>>>,
    }

    impl PollTask for Rewired {
        fn init(&mut self) -> Result<(), SensorError> {
            self.log.inits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn poll(&mut self, _now: Instant) -> Result<(), SensorError> {
            self.log.polls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn device_changes(&mut self) -> Option<Receiver<()>> {
            let (tx, rx) = mpsc::channel();
            *self.notify.lock().unwrap() = Some(tx);
            Some(rx)
        }
    }

    #[test]
    fn test_device_change_bypasses_cooldown() {
        let log = Arc::new(Log::default());
        let notify = Arc::new(Mutex::new(None));
        let (l, n) = (log.clone(), notify.clone());
        let poller = Poller::spawn(config(2, 60_000), Arc::new(SystemTimebase), move || Rewired { log: l, notify: n })
            .unwrap();
        wait_for(|| notify.lock().unwrap().is_some());
        assert_eq!(log.inits.load(Ordering::SeqCst), 1);

        notify.lock().unwrap().take().unwrap().send(()).unwrap();
        wait_for(|| log.inits.load(Ordering::SeqCst) >= 2);
        assert_eq!(log.inits.load(Ordering::SeqCst), 2);

        // the reinit subscribed again, the next change is seen too
        wait_for(|| notify.lock().unwrap().is_some());
        notify.lock().unwrap().take().unwrap().send(()).unwrap();
        wait_for(|| log.inits.load(Ordering::SeqCst) >= 3);
        let polls = log.polls.load(Ordering::SeqCst);
        wait_for(|| log.polls.load(Ordering::SeqCst) >= polls + 5);
        poller.stop();
        assert_eq!(log.inits.load(Ordering::SeqCst), 3);
    }

    struct Panics(Arc<Log>);

    impl PollTask for Panics {
        fn init(&mut self) -> Result<(), SensorError> {
            Ok(())
        }

        fn poll(&mut self, _now: Instant) -> Result<(), SensorError> {
            panic!("sensor exploded");
        }

        fn on_health(&mut self, health: SensorHealth) {
            self.0.health.lock().unwrap().push(health);
        }
    }

    #[test]
    fn test_panic_is_contained() {
        let log = Arc::new(Log::default());
        let l = log.clone();
        let poller = Poller::spawn(config(5, 0), Arc::new(SystemTimebase), move || Panics(l)).unwrap();
        wait_for(|| !poller.is_running());
        poller.stop();
        let health = log.health.lock().unwrap().clone();
        assert!(matches!(health.last(), Some(SensorHealth::Fatal(m)) if m.contains("sensor exploded")));
    }

    #[test]
    fn test_polled_state_frames() {
        use crate::timebase::ManualTimebase;
        use crate::widgets::helper::AutoHideSettings;

        let tb = ManualTimebase::new();
        let settings = AutoHideSettings { enabled: true, timeout: Duration::from_secs(1) };
        let mut state: PolledState<u32> = PolledState::new(AutoHide::new(settings, true, tb.at(0.0)));
        assert_eq!(state.frame(tb.at(0.5)), PolledFrame::Pending);
        state.reading = Some(7);
        assert_eq!(state.frame(tb.at(0.5)), PolledFrame::Ready(7));
        assert_eq!(state.frame(tb.at(1.5)), PolledFrame::Hidden);

        state.record_health(SensorHealth::Fatal("gone".into()), tb.at(2.0));
        state.record_health(SensorHealth::Fatal("still gone".into()), tb.at(3.0));
        assert_eq!(state.frame(tb.at(3.0)), PolledFrame::Fatal(tb.at(2.0)));
        state.record_health(SensorHealth::Ok, tb.at(4.0));
        assert_eq!(state.frame(tb.at(4.0)), PolledFrame::Hidden);

        state.stopped = true;
        assert_eq!(state.frame(tb.at(4.0)), PolledFrame::Stopped);
    }
}
