//! Test helpers for evsound integration tests
//!
//! Provides a scripted driver: it records every submission and lets the
//! test decide when (and from which thread) each request finishes.

#![allow(dead_code)]

use evsound::backend::{Driver, DriverFactory, DriverResult, Notifier, RequestId, Ticket};
use evsound::{ErrorCode, PropertyBag};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Shared record of what the driver saw, plus the notifier to drive it
#[derive(Default)]
pub struct Script {
    notifier: Mutex<Option<Notifier>>,
    submitted: Mutex<Vec<Ticket>>,
    canceled: Mutex<Vec<Ticket>>,
    cached: Mutex<Vec<PropertyBag>>,
    torn_down: AtomicBool,
    play_error: Mutex<Option<ErrorCode>>,
    cache_error: Mutex<Option<ErrorCode>>,
}

impl Script {
    /// Latest ticket submitted for `id`
    pub fn ticket_for(&self, id: RequestId) -> Option<Ticket> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|t| t.id == id)
            .copied()
    }

    pub fn submitted(&self) -> Vec<Ticket> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn canceled(&self) -> Vec<Ticket> {
        self.canceled.lock().unwrap().clone()
    }

    pub fn cached(&self) -> Vec<PropertyBag> {
        self.cached.lock().unwrap().clone()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Make the next play calls fail synchronously
    pub fn fail_plays_with(&self, code: Option<ErrorCode>) {
        *self.play_error.lock().unwrap() = code;
    }

    pub fn fail_cache_with(&self, code: Option<ErrorCode>) {
        *self.cache_error.lock().unwrap() = code;
    }

    /// Deliver a terminal notification for `ticket`
    pub fn notify(&self, ticket: Ticket, code: ErrorCode) -> bool {
        let notifier = self
            .notifier
            .lock()
            .unwrap()
            .clone()
            .expect("driver not opened");
        notifier.notify(ticket, code)
    }

    /// Finish the latest submission for `id` successfully
    pub fn finish(&self, id: RequestId) -> bool {
        let ticket = self.ticket_for(id).expect("no submission for id");
        self.notify(ticket, ErrorCode::Success)
    }

    /// Fail the latest submission for `id`
    pub fn fail(&self, id: RequestId, code: ErrorCode) -> bool {
        let ticket = self.ticket_for(id).expect("no submission for id");
        self.notify(ticket, code)
    }
}

pub struct ScriptedFactory {
    script: Arc<Script>,
    open_error: Option<ErrorCode>,
}

impl ScriptedFactory {
    pub fn new() -> (Self, Arc<Script>) {
        let script = Arc::new(Script::default());
        (
            Self {
                script: Arc::clone(&script),
                open_error: None,
            },
            script,
        )
    }

    /// Factory whose open always fails with `code`
    pub fn failing(code: ErrorCode) -> Self {
        Self {
            script: Arc::new(Script::default()),
            open_error: Some(code),
        }
    }
}

impl DriverFactory for ScriptedFactory {
    fn open(&self, _props: &PropertyBag, notifier: Notifier) -> DriverResult<Box<dyn Driver>> {
        if let Some(code) = self.open_error {
            return Err(code);
        }
        *self.script.notifier.lock().unwrap() = Some(notifier);
        Ok(Box::new(ScriptedDriver {
            script: Arc::clone(&self.script),
        }))
    }
}

struct ScriptedDriver {
    script: Arc<Script>,
}

impl Driver for ScriptedDriver {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn play(&self, ticket: Ticket, _props: &PropertyBag) -> DriverResult<()> {
        if let Some(code) = *self.script.play_error.lock().unwrap() {
            return Err(code);
        }
        self.script.submitted.lock().unwrap().push(ticket);
        Ok(())
    }

    fn cancel(&self, ticket: Ticket) {
        self.script.canceled.lock().unwrap().push(ticket);
    }

    fn cache(&self, props: &PropertyBag) -> DriverResult<()> {
        if let Some(code) = *self.script.cache_error.lock().unwrap() {
            return Err(code);
        }
        self.script.cached.lock().unwrap().push(props.clone());
        Ok(())
    }

    fn change_props(&self, _props: &PropertyBag) -> DriverResult<()> {
        Ok(())
    }

    fn teardown(self: Box<Self>) {
        self.script.torn_down.store(true, Ordering::SeqCst);
    }
}

/// Event properties for `event.id`
pub fn event(id: &str) -> PropertyBag {
    PropertyBag::builder().event_id(id).build().unwrap()
}

/// Application properties with `application.name`
pub fn app(name: &str) -> PropertyBag {
    PropertyBag::builder().application_name(name).build().unwrap()
}
