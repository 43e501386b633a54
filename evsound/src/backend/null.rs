//! Null driver
//!
//! Accepts every play request and reports it finished right away. Caching
//! is not supported. Useful headless and in tests.

use super::{Driver, DriverFactory, DriverResult, Notifier, Ticket};
use evsound_common::{ErrorCode, PropertyBag};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct NullDriverFactory;

impl DriverFactory for NullDriverFactory {
    fn open(&self, _props: &PropertyBag, notifier: Notifier) -> DriverResult<Box<dyn Driver>> {
        debug!("Opening null driver");
        Ok(Box::new(NullDriver { notifier }))
    }
}

#[derive(Debug)]
pub struct NullDriver {
    notifier: Notifier,
}

impl Driver for NullDriver {
    fn name(&self) -> &'static str {
        "null"
    }

    fn play(&self, ticket: Ticket, _props: &PropertyBag) -> DriverResult<()> {
        self.notifier.notify(ticket, ErrorCode::Success);
        Ok(())
    }

    fn cancel(&self, _ticket: Ticket) {}

    fn cache(&self, _props: &PropertyBag) -> DriverResult<()> {
        Err(ErrorCode::NotSupported)
    }

    fn change_props(&self, _props: &PropertyBag) -> DriverResult<()> {
        Ok(())
    }

    fn teardown(self: Box<Self>) {
        debug!("Null driver torn down");
    }
}
