//! Simulated driver
//!
//! Runs a single worker thread that "plays" each request for a fixed
//! duration and then reports it finished. Durations and forced failures
//! come from the `[driver]` config table, keyed by `event.id`.
//!
//! **Architecture:**
//! - Scheduled completions held in a deadline-ordered heap
//! - Worker sleeps on a condvar until the earliest deadline or new work
//! - Notifications are sent with the queue lock released

use super::{has_sound_source, Driver, DriverFactory, DriverResult, Notifier, Ticket};
use evsound_common::config::DriverConfig;
use evsound_common::props::keys;
use evsound_common::{ErrorCode, PropertyBag};
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Simulated driver settings
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    pub default_duration: Duration,
    pub durations: HashMap<String, Duration>,
    pub failures: HashMap<String, ErrorCode>,
    pub cache_supported: bool,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        SimulatedConfig::from(&DriverConfig::default())
    }
}

impl From<&DriverConfig> for SimulatedConfig {
    fn from(config: &DriverConfig) -> Self {
        Self {
            default_duration: Duration::from_millis(config.default_duration_ms),
            durations: config
                .durations
                .iter()
                .map(|(k, ms)| (k.clone(), Duration::from_millis(*ms)))
                .collect(),
            failures: config
                .failures
                .iter()
                .map(|(k, code)| (k.clone(), *code))
                .collect(),
            cache_supported: config.cache_supported,
        }
    }
}

impl SimulatedConfig {
    pub fn with_default_duration(mut self, duration: Duration) -> Self {
        self.default_duration = duration;
        self
    }

    pub fn with_duration(mut self, event_id: impl Into<String>, duration: Duration) -> Self {
        self.durations.insert(event_id.into(), duration);
        self
    }

    pub fn with_failure(mut self, event_id: impl Into<String>, code: ErrorCode) -> Self {
        self.failures.insert(event_id.into(), code);
        self
    }

    pub fn with_cache_supported(mut self, supported: bool) -> Self {
        self.cache_supported = supported;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedDriverFactory {
    config: SimulatedConfig,
}

impl SimulatedDriverFactory {
    pub fn new(config: SimulatedConfig) -> Self {
        Self { config }
    }
}

impl DriverFactory for SimulatedDriverFactory {
    fn open(&self, props: &PropertyBag, notifier: Notifier) -> DriverResult<Box<dyn Driver>> {
        Ok(Box::new(SimulatedDriver::start(
            self.config.clone(),
            props.clone(),
            notifier,
        )?))
    }
}

/// One scheduled completion
#[derive(Debug)]
struct Scheduled {
    deadline: Instant,
    ticket: Ticket,
    code: ErrorCode,
}

/// Earliest deadline first in a max-heap
impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.ticket.serial.cmp(&self.ticket.serial))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.ticket == other.ticket
    }
}

impl Eq for Scheduled {}

/// Shared state between driver handle and worker thread
struct SharedWorkerState {
    queue: Mutex<BinaryHeap<Scheduled>>,
    condvar: Condvar,
    stop_flag: AtomicBool,
}

impl SharedWorkerState {
    fn lock_queue(&self) -> MutexGuard<'_, BinaryHeap<Scheduled>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct SimulatedDriver {
    config: SimulatedConfig,
    state: Arc<SharedWorkerState>,
    thread: Option<JoinHandle<()>>,
    props: Mutex<PropertyBag>,
    cached: Mutex<HashSet<String>>,
}

impl SimulatedDriver {
    fn start(config: SimulatedConfig, props: PropertyBag, notifier: Notifier) -> DriverResult<Self> {
        let state = Arc::new(SharedWorkerState {
            queue: Mutex::new(BinaryHeap::new()),
            condvar: Condvar::new(),
            stop_flag: AtomicBool::new(false),
        });

        let state_clone = Arc::clone(&state);
        let handle = thread::Builder::new()
            .name("evsound-simulated".to_string())
            .spawn(move || Self::worker_loop(state_clone, notifier))
            .map_err(|e| {
                warn!("Failed to spawn simulated driver thread: {}", e);
                ErrorCode::System
            })?;

        info!(
            "Simulated driver started (default duration {:?}, cache {})",
            config.default_duration,
            if config.cache_supported { "on" } else { "off" }
        );

        Ok(Self {
            config,
            state,
            thread: Some(handle),
            props: Mutex::new(props),
            cached: Mutex::new(HashSet::new()),
        })
    }

    fn worker_loop(state: Arc<SharedWorkerState>, notifier: Notifier) {
        debug!("Simulated driver worker started");

        loop {
            let due = {
                let mut queue = state.lock_queue();

                loop {
                    if state.stop_flag.load(Ordering::Acquire) {
                        debug!(
                            "Simulated driver worker stopping ({} scheduled dropped)",
                            queue.len()
                        );
                        return;
                    }

                    let now = Instant::now();
                    match queue.peek().map(|next| next.deadline) {
                        None => {
                            queue = state
                                .condvar
                                .wait(queue)
                                .unwrap_or_else(PoisonError::into_inner);
                        }
                        Some(deadline) if deadline <= now => break,
                        Some(deadline) => {
                            let timeout = deadline - now;
                            queue = state
                                .condvar
                                .wait_timeout(queue, timeout)
                                .unwrap_or_else(PoisonError::into_inner)
                                .0;
                        }
                    }
                }

                let now = Instant::now();
                let mut due = Vec::new();
                while queue.peek().is_some_and(|next| next.deadline <= now) {
                    if let Some(entry) = queue.pop() {
                        due.push(entry);
                    }
                }
                due
            };

            for entry in due {
                debug!("Simulated playback {} finished: {:?}", entry.ticket, entry.code);
                notifier.notify(entry.ticket, entry.code);
            }
        }
    }

    fn duration_for(&self, props: &PropertyBag) -> Duration {
        props
            .event_id()
            .and_then(|id| self.config.durations.get(id))
            .copied()
            .unwrap_or(self.config.default_duration)
    }

    fn schedule(&self, entry: Scheduled) {
        self.state.lock_queue().push(entry);
        self.state.condvar.notify_one();
    }
}

impl Driver for SimulatedDriver {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn play(&self, ticket: Ticket, props: &PropertyBag) -> DriverResult<()> {
        if !has_sound_source(props) {
            return Err(ErrorCode::Invalid);
        }

        if props.event_id().is_none() {
            if let Some(path) = props.get_str(keys::MEDIA_FILENAME) {
                if !Path::new(path).exists() {
                    return Err(ErrorCode::NotFound);
                }
            }
        }

        let code = props
            .event_id()
            .and_then(|id| self.config.failures.get(id))
            .copied()
            .unwrap_or(ErrorCode::Success);
        let duration = self.duration_for(props);

        debug!(
            "Simulated playback {} for {:?} ({:?})",
            ticket,
            props.event_id().unwrap_or("<file>"),
            duration
        );

        self.schedule(Scheduled {
            deadline: Instant::now() + duration,
            ticket,
            code,
        });
        Ok(())
    }

    fn cancel(&self, ticket: Ticket) {
        let mut queue = self.state.lock_queue();
        let before = queue.len();
        queue.retain(|entry| entry.ticket != ticket);
        if queue.len() != before {
            debug!("Simulated playback {} stopped", ticket);
        }
    }

    fn cache(&self, props: &PropertyBag) -> DriverResult<()> {
        if !self.config.cache_supported {
            return Err(ErrorCode::NotSupported);
        }
        let event_id = props.event_id().ok_or(ErrorCode::Invalid)?;
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event_id.to_string());
        debug!("Simulated driver cached '{}'", event_id);
        Ok(())
    }

    fn change_props(&self, props: &PropertyBag) -> DriverResult<()> {
        let mut current = self.props.lock().unwrap_or_else(PoisonError::into_inner);
        *current = current.merged(props);
        Ok(())
    }

    fn teardown(mut self: Box<Self>) {
        self.state.stop_flag.store(true, Ordering::Release);
        self.state.condvar.notify_all();

        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("Simulated driver worker panicked");
            }
        }
        info!("Simulated driver torn down");
    }
}

impl Drop for SimulatedDriver {
    fn drop(&mut self) {
        // Teardown normally joined already; make sure the worker exits anyway
        self.state.stop_flag.store(true, Ordering::Release);
        self.state.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NotificationSink;
    use std::sync::mpsc;

    struct ChannelSink(Mutex<mpsc::Sender<(Ticket, ErrorCode)>>);

    impl NotificationSink for ChannelSink {
        fn on_backend_event(&self, ticket: Ticket, code: ErrorCode) -> bool {
            let _ = self.0.lock().unwrap().send((ticket, code));
            true
        }
    }

    fn open(config: SimulatedConfig) -> (Box<dyn Driver>, Arc<ChannelSink>, mpsc::Receiver<(Ticket, ErrorCode)>) {
        let (tx, rx) = mpsc::channel();
        let sink = Arc::new(ChannelSink(Mutex::new(tx)));
        let weak = Arc::downgrade(&sink);
        let weak: std::sync::Weak<dyn NotificationSink> = weak;
        let driver = SimulatedDriverFactory::new(config)
            .open(&PropertyBag::new(), Notifier::new(weak))
            .unwrap();
        (driver, sink, rx)
    }

    fn event(id: &str) -> PropertyBag {
        PropertyBag::builder().event_id(id).build().unwrap()
    }

    #[test]
    fn test_config_from_driver_table() {
        let mut table = DriverConfig::default();
        table.default_duration_ms = 25;
        table.durations.insert("bell".to_string(), 300);
        table.failures.insert("dialog-error".to_string(), ErrorCode::NotFound);

        let config = SimulatedConfig::from(&table);
        assert_eq!(config.default_duration, Duration::from_millis(25));
        assert_eq!(config.durations.get("bell"), Some(&Duration::from_millis(300)));
        assert_eq!(config.failures.get("dialog-error"), Some(&ErrorCode::NotFound));
        assert!(!config.cache_supported);
    }

    #[test]
    fn test_failure_from_driver_table_reported() {
        let mut table = DriverConfig::default();
        table.default_duration_ms = 5;
        table.failures.insert("dialog-error".to_string(), ErrorCode::NotFound);
        let (driver, _sink, rx) = open(SimulatedConfig::from(&table));

        let ticket = Ticket { id: 4, serial: 1 };
        driver.play(ticket, &event("dialog-error")).unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            (ticket, ErrorCode::NotFound)
        );
        driver.teardown();
    }

    #[test]
    fn test_completes_in_deadline_order() {
        let config = SimulatedConfig::default()
            .with_duration("slow", Duration::from_millis(80))
            .with_duration("fast", Duration::from_millis(10));
        let (driver, _sink, rx) = open(config);

        let slow = Ticket { id: 1, serial: 1 };
        let fast = Ticket { id: 2, serial: 2 };
        driver.play(slow, &event("slow")).unwrap();
        driver.play(fast, &event("fast")).unwrap();

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first, (fast, ErrorCode::Success));
        assert_eq!(second, (slow, ErrorCode::Success));

        driver.teardown();
    }

    #[test]
    fn test_forced_failure_code() {
        let config = SimulatedConfig::default()
            .with_default_duration(Duration::from_millis(5))
            .with_failure("broken", ErrorCode::Corrupt);
        let (driver, _sink, rx) = open(config);

        let ticket = Ticket { id: 7, serial: 1 };
        driver.play(ticket, &event("broken")).unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            (ticket, ErrorCode::Corrupt)
        );
        driver.teardown();
    }

    #[test]
    fn test_cancel_suppresses_notification() {
        let config = SimulatedConfig::default().with_default_duration(Duration::from_millis(50));
        let (driver, _sink, rx) = open(config);

        let ticket = Ticket { id: 3, serial: 1 };
        driver.play(ticket, &event("bell")).unwrap();
        driver.cancel(ticket);

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        driver.teardown();
    }

    #[test]
    fn test_play_validation() {
        let (driver, _sink, _rx) = open(SimulatedConfig::default());

        let empty = PropertyBag::new();
        assert_eq!(driver.play(Ticket { id: 1, serial: 1 }, &empty), Err(ErrorCode::Invalid));

        let missing_file = PropertyBag::builder()
            .media_filename("/nonexistent/evsound/test.oga")
            .build()
            .unwrap();
        assert_eq!(
            driver.play(Ticket { id: 1, serial: 2 }, &missing_file),
            Err(ErrorCode::NotFound)
        );
        driver.teardown();
    }

    #[test]
    fn test_cache_support_flag() {
        let (driver, _sink, _rx) = open(SimulatedConfig::default());
        assert_eq!(driver.cache(&event("bell")), Err(ErrorCode::NotSupported));
        driver.teardown();

        let (driver, _sink, _rx) = open(SimulatedConfig::default().with_cache_supported(true));
        assert_eq!(driver.cache(&event("bell")), Ok(()));
        assert_eq!(driver.cache(&PropertyBag::new()), Err(ErrorCode::Invalid));
        driver.teardown();
    }

    #[test]
    fn test_teardown_drops_scheduled() {
        let config = SimulatedConfig::default().with_default_duration(Duration::from_secs(30));
        let (driver, _sink, rx) = open(config);

        driver.play(Ticket { id: 1, serial: 1 }, &event("long")).unwrap();
        driver.teardown();

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
