// Wall-clock source for the expiry sweep.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Source of "now" for operations whose effect depends on the time of the
/// call. Only `delete_expired_sessions` reads it.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Shared clock handle held by adapters.
pub type SharedClock = Arc<dyn Clock>;

pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}
