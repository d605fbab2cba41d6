//! Safety context shared by the step tick and the main loop.
//!
//! ## Ownership
//!
//! | Field           | Writer | Reader     |
//! |-----------------|--------|------------|
//! | `run_safely`    | main   | tick, main |
//! | `run_mode`      | main   | tick, main |
//! | `cleared_count` | main   | tick, main |
//! | `fault_count`   | tick   | tick, main |
//! | `fault_cart`    | tick   | main       |
//! | `fault_class`   | tick   | main       |
//!
//! `has_failed` is not stored: it is `fault_count != cleared_count`. The
//! tick raises it by bumping its counter; the main loop lowers it by
//! acknowledging the count it observed. Neither side ever writes the
//! other's fields, so no write-write race exists and no lock is needed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use static_assertions::assert_not_impl_any;
use tracing::debug;

use crate::axis::SafetyClass;

/// Stepping primitive selected by the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum RunMode {
    /// Positioned moves (`run`).
    #[default]
    Regular = 0,
    /// Constant-speed stepping (`run_speed`).
    ConstantSpeed = 1,
}

impl RunMode {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::ConstantSpeed,
            _ => Self::Regular,
        }
    }
}

/// Detail of the latched fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyFault {
    pub cart_id: u8,
    pub class: SafetyClass,
}

#[derive(Debug, Default)]
struct MainOwned {
    run_safely: AtomicBool,
    run_mode: AtomicU8,
    cleared_count: AtomicU32,
}

#[derive(Debug, Default)]
struct TickOwned {
    fault_count: AtomicU32,
    fault_cart: AtomicU8,
    fault_class: AtomicU8,
}

#[derive(Debug, Default)]
struct Shared {
    main: MainOwned,
    tick: TickOwned,
}

impl Shared {
    #[inline]
    fn has_failed(&self) -> bool {
        self.tick.fault_count.load(Ordering::Acquire)
            != self.main.cleared_count.load(Ordering::Acquire)
    }

    #[inline]
    fn run_safely(&self) -> bool {
        self.main.run_safely.load(Ordering::Acquire)
    }

    #[inline]
    fn run_mode(&self) -> RunMode {
        RunMode::from_u8(self.main.run_mode.load(Ordering::Acquire))
    }
}

/// Process-wide safety context. Only exists to be split.
pub struct SafetyContext;

impl SafetyContext {
    /// Create the context and hand out its two single-writer handles.
    ///
    /// Starts with `run_safely = false`, `Regular` mode and no fault.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (MainHandle, TickHandle) {
        let shared = Arc::new(Shared::default());
        (
            MainHandle {
                shared: Arc::clone(&shared),
            },
            TickHandle { shared },
        )
    }
}

// ─── Main-loop side ─────────────────────────────────────────────────

/// Main-loop handle. Writes `run_safely`, `run_mode` and the fault
/// acknowledgement.
#[derive(Debug)]
pub struct MainHandle {
    shared: Arc<Shared>,
}

assert_not_impl_any!(MainHandle: Clone);

impl MainHandle {
    pub fn set_run_safely(&self, run_safely: bool) {
        self.shared.main.run_safely.store(run_safely, Ordering::Release);
    }

    #[inline]
    pub fn run_safely(&self) -> bool {
        self.shared.run_safely()
    }

    pub fn set_run_mode(&self, mode: RunMode) {
        self.shared.main.run_mode.store(mode as u8, Ordering::Release);
    }

    #[inline]
    pub fn run_mode(&self) -> RunMode {
        self.shared.run_mode()
    }

    #[inline]
    pub fn has_failed(&self) -> bool {
        self.shared.has_failed()
    }

    /// Detail of the unacknowledged fault, if any.
    pub fn fault(&self) -> Option<SafetyFault> {
        if !self.has_failed() {
            return None;
        }
        Some(SafetyFault {
            cart_id: self.shared.tick.fault_cart.load(Ordering::Acquire),
            class: SafetyClass::from_u8(self.shared.tick.fault_class.load(Ordering::Acquire)),
        })
    }

    /// Acknowledge every fault reported so far.
    ///
    /// Called after a successful re-home or limit check.
    pub fn clear_fault(&self) {
        let observed = self.shared.tick.fault_count.load(Ordering::Acquire);
        if self.shared.main.cleared_count.swap(observed, Ordering::AcqRel) != observed {
            debug!(fault_count = observed, "safety fault cleared");
        }
    }

    /// Number of fault episodes reported since startup.
    #[inline]
    pub fn fault_episodes(&self) -> u32 {
        self.shared.tick.fault_count.load(Ordering::Acquire)
    }
}

// ─── Tick side ──────────────────────────────────────────────────────

/// Step-tick handle. Writes the fault counter and its detail.
#[derive(Debug)]
pub struct TickHandle {
    shared: Arc<Shared>,
}

assert_not_impl_any!(TickHandle: Clone);

impl TickHandle {
    #[inline]
    pub fn run_safely(&self) -> bool {
        self.shared.run_safely()
    }

    #[inline]
    pub fn run_mode(&self) -> RunMode {
        self.shared.run_mode()
    }

    #[inline]
    pub fn has_failed(&self) -> bool {
        self.shared.has_failed()
    }

    /// Latch a fault. Ignored while a fault is already latched, so one
    /// episode raises the flag exactly once.
    pub fn report_fault(&self, cart_id: u8, class: SafetyClass) {
        if self.has_failed() {
            return;
        }
        self.shared.tick.fault_cart.store(cart_id, Ordering::Relaxed);
        self.shared.tick.fault_class.store(class.as_u8(), Ordering::Relaxed);
        // Release publishes the detail together with the new count.
        self.shared.tick.fault_count.fetch_add(1, Ordering::Release);
    }
}
