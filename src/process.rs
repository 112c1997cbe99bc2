//! # Process Model
//!
//! Defines the process control block and its lifecycle state machine.
//! A process is a schedulable instance of a registered program; the
//! scheduler keeps a fixed-capacity array of these slots and multiplexes
//! them onto the single core at every timer tick.

use crate::program::ProgramId;
use crate::stack::StackCursor;

/// Index of a process slot in the scheduler's process table.
pub type ProcessId = usize;

/// Advisory scheduling priority, 0 (least favorable) to 255. Strategies
/// may ignore it entirely.
pub type Priority = u8;

/// Process slot reserved for the idle process.
pub const IDLE_PROCESS: ProcessId = 0;

// ---------------------------------------------------------------------------
// Process state machine
// ---------------------------------------------------------------------------

/// Lifecycle state of a process slot.
///
/// ```text
///   ┌──────────┐      exec()        ┌─────────┐
///   │  Unused  │ ─────────────────► │  Ready  │
///   └──────────┘                    └─────────┘
///        ▲                           │      ▲
///        │ kill / exit      dispatch │      │ tick preemption
///        │                           ▼      │
///        │                          ┌─────────┐
///        └───────────────────────── │ Running │
///                                   └─────────┘
/// ```
///
/// `Ready ↔ Running` transitions are driven exclusively by the dispatch
/// path at each tick. Outside the dispatcher's non-preemptible window,
/// exactly one slot is `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Free slot. `program` and `cursor` carry no meaning.
    Unused,
    /// Runnable, waiting to be selected by the scheduling strategy.
    Ready,
    /// Currently executing on the CPU.
    Running,
    /// Waiting for an event. Reserved for future blocking primitives;
    /// strategies never select a blocked process.
    Blocked,
}

// ---------------------------------------------------------------------------
// Process control block
// ---------------------------------------------------------------------------

/// One entry of the process table. Plain data: the stack memory itself
/// lives in the `StackArena`, addressed by the slot's index.
#[derive(Debug, Clone, Copy)]
pub struct Process {
    /// Current lifecycle state.
    pub state: ProcessState,
    /// Advisory priority stored at `exec` time.
    pub priority: Priority,
    /// Program this process executes. Meaningless while `state` is `Unused`.
    pub program: ProgramId,
    /// Saved position within this process's stack region. Updated on every
    /// preemption, consumed when the process is dispatched again.
    pub cursor: StackCursor,
}

impl Process {
    /// An unused slot, the initial content of the whole process table.
    pub const EMPTY: Process = Process {
        state: ProcessState::Unused,
        priority: 0,
        program: 0,
        cursor: StackCursor::EMPTY,
    };

    /// Whether this slot currently holds a process (any state but `Unused`).
    #[inline]
    pub fn in_use(&self) -> bool {
        self.state != ProcessState::Unused
    }
}

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Failures surfaced by the scheduler core. Every failure is immediate and
/// terminal to the calling operation; there are no retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// No `Unused` slot left in the process table.
    ProcessTableFull,
    /// No free slot left in the program registry.
    ProgramTableFull,
    /// The given program id is out of range or not registered.
    UnknownProgram,
    /// The given process id is out of range or its slot is `Unused`.
    NoSuchProcess,
    /// The idle process cannot be killed.
    IdleUntouchable,
}
