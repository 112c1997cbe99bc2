//! # octOS Configuration
//!
//! Compile-time constants governing the scheduler and system behavior.
//! All limits are fixed at compile time — no dynamic allocation.

use crate::process::Priority;

/// Maximum number of process slots the scheduler can manage simultaneously.
/// This bounds the static process table and the stack arena. Slot 0 always
/// holds the idle process once the scheduler has been started.
pub const MAX_PROCESSES: usize = 8;

/// Maximum number of registrable programs. Program id 0 is reserved for the
/// implicitly registered idle program. The autostart bitmask is a `u16`, so
/// this must not exceed 16.
pub const MAX_PROGRAMS: usize = 16;

/// Per-process stack size in bytes. Must be a multiple of 8 so that every
/// region of the stack arena keeps AAPCS 8-byte alignment, and large enough
/// for the deepest call chain plus one full context frame
/// (`stack::CONTEXT_FRAME_BYTES`).
pub const STACK_SIZE: usize = 512;

/// Priority assigned to processes launched through the autostart mechanism
/// at scheduler-init time.
pub const DEFAULT_PRIORITY: Priority = 1;

/// SysTick frequency in Hz. Determines scheduler tick granularity: every
/// tick the running process is preempted and the strategy re-selects.
pub const TICK_HZ: u32 = 1000;

/// System clock frequency in Hz (STM32F4 at 16 MHz HSI).
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;
