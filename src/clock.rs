use chrono::{DateTime, Duration, Local};
use std::cell::RefCell;

/// Source of "now" for session timing and dwell-time bookkeeping.
/// Injected so timer behaviour is deterministic under test.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

// A shared reference ticks like the clock it borrows, so one test clock
// can drive several sessions.
impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Local> {
        (**self).now()
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Test clock advanced by hand. Interior mutability lets the owner of a
/// session move time forward through a shared reference.
#[derive(Debug)]
pub struct ManualClock {
    current: RefCell<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            current: RefCell::new(start),
        }
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut t = self.current.borrow_mut();
        *t += Duration::seconds(secs);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Local::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.current.borrow()
    }
}
