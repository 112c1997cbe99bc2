//! # Critical Section Guard
//!
//! Nesting-depth counter gating the timer interrupt that drives
//! preemption. Any code path that reads or writes scheduler-shared state
//! outside the tick handler must be bracketed by matched `enter` / `leave`
//! calls; the preemption source stays masked for as long as at least one
//! critical section is open.
//!
//! Both operations run with the global interrupt-enable flag saved and
//! cleared around the counter update, so the guard is safe to invoke from
//! ordinary interruptible process context as well as from nested critical
//! regions.

use crate::arch::Platform;

/// Nested critical-section bookkeeping. One instance per kernel; the
/// counter is deliberately unsigned with explicit underflow detection —
/// leaving more sections than were entered is a protocol violation, not a
/// wrap.
pub struct CriticalGuard {
    depth: u8,
}

impl CriticalGuard {
    pub const fn new() -> Self {
        Self { depth: 0 }
    }

    /// Current nesting depth.
    #[inline]
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Whether preemption is currently suppressed by an open section.
    #[inline]
    pub fn active(&self) -> bool {
        self.depth > 0
    }

    /// Enter a critical section: bump the nesting depth and mask the
    /// scheduler's interrupt source. Supports up to 255 nested sections;
    /// one more is reported as fatal and ignored.
    pub fn enter<P: Platform>(&mut self, platform: &mut P) {
        platform.interrupts_masked(|p| {
            match self.depth.checked_add(1) {
                Some(depth) => self.depth = depth,
                None => {
                    p.fatal("entered critical section too often");
                    return;
                }
            }
            // Masking is idempotent, so every entry masks unconditionally
            // rather than only the outermost one.
            p.mask_preemption_source();
        });
    }

    /// Leave a critical section: drop the nesting depth and unmask the
    /// scheduler's interrupt source once the outermost section closes.
    ///
    /// Leaving more often than entering is fatal — reported exactly once
    /// per excess call, with the counter held at zero instead of wrapping.
    pub fn leave<P: Platform>(&mut self, platform: &mut P) {
        platform.interrupts_masked(|p| {
            match self.depth.checked_sub(1) {
                Some(depth) => self.depth = depth,
                None => {
                    p.fatal("left critical section too often");
                    return;
                }
            }
            if self.depth == 0 {
                p.unmask_preemption_source();
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
