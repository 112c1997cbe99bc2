//! # octOS
//!
//! A minimal preemptive operating-system scheduler core for small
//! single-core microcontrollers. A fixed pool of processes is multiplexed
//! onto one CPU by a periodic timer interrupt, manual stack-based context
//! switching and a pluggable scheduling strategy.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   Application Programs                  │
//! ├─────────────────────────────────────────────────────────┤
//! │                Kernel API (kernel.rs)                   │
//! │   init() · register_program() · exec() · start()        │
//! ├───────────────┬─────────────────────┬───────────────────┤
//! │  Scheduler    │  Strategies         │  Critical Guard   │
//! │  scheduler.rs │  strategy.rs        │  sync.rs          │
//! │  ─ dispatch() │  ─ Even/Random      │  ─ enter()/leave()│
//! │  ─ exec()     │  ─ RoundRobin       │    (nested,       │
//! │  ─ kill()     │  ─ InactiveAging    │     tick-gating)  │
//! │               │  ─ RunToCompletion  │                   │
//! ├───────────────┴─────────────────────┴───────────────────┤
//! │  Process table (process.rs) · Programs (program.rs)     │
//! │  Stack arena + frame contract (stack.rs)                │
//! │  Buttons (input.rs)                                     │
//! ├─────────────────────────────────────────────────────────┤
//! │        Platform boundary (arch/) — Cortex-M4 port       │
//! │   SysTick tick · PendSV context switch · first launch   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Execution model
//!
//! Process code runs with interrupts enabled and is preempted at every
//! tick of the scheduler timer. The tick handler saves the full register
//! state onto the interrupted process's own stack, demotes it to ready,
//! samples the button peripheral, asks the active strategy for the next
//! process, and restores that process's saved state. A brand-new process
//! carries a synthesized frame that makes its first "resume" begin at its
//! program's entry point.
//!
//! Code outside the tick handler that touches scheduler-shared state must
//! hold a critical section; the guard counts nesting and keeps the tick
//! source masked until the outermost section closes.
//!
//! ## Memory model
//!
//! - **No heap, no `alloc`**: every structure is statically sized
//! - **Fixed process table**: `[Process; MAX_PROCESSES]`
//! - **Per-process stacks**: non-overlapping regions in a static arena,
//!   addressed by process id and tracked as byte-offset cursors

#![no_std]

pub mod arch;
pub mod config;
pub mod input;
pub mod kernel;
pub mod process;
pub mod program;
pub mod scheduler;
pub mod stack;
pub mod strategy;
pub mod sync;
