//! # Scheduler Core
//!
//! Owns the process table, the program registry, the stack arena and the
//! dispatch state machine. Everything here is target-independent and
//! driven from two directions:
//!
//! - the tick handler calls [`Scheduler::dispatch`] once per preemption,
//!   inside the hardware's non-reentrant interrupt window;
//! - process code calls the mutating operations (`exec`, `kill`,
//!   `set_strategy`) through the [`crate::kernel::Kernel`] facade, which
//!   brackets them in a critical section.
//!
//! Exactly one process is `Running` outside the dispatcher's window; slot
//! 0 belongs to the idle process from init on.

use crate::config::{DEFAULT_PRIORITY, MAX_PROCESSES, MAX_PROGRAMS};
use crate::input::Buttons;
use crate::process::{KernelError, Priority, Process, ProcessId, ProcessState, IDLE_PROCESS};
use crate::program::{ProgramEntry, ProgramId, ProgramRegistry};
use crate::stack::{seed_initial_frame, StackArena, StackCursor};
use crate::strategy::{self, SchedulingStrategy, StrategyState};

/// The central scheduler state. Held by the kernel facade; no ambient
/// globals besides the single kernel instance in `kernel.rs`.
pub struct Scheduler {
    /// Fixed-size process table. Slot 0 is the idle process.
    pub processes: [Process; MAX_PROCESSES],
    /// Registered programs and their autostart bits.
    pub registry: ProgramRegistry,
    /// Per-process stack regions.
    pub stacks: StackArena,
    /// Slot of the process currently executing (default: idle).
    current: ProcessId,
    /// Active scheduling strategy, read by the dispatcher each tick.
    strategy: SchedulingStrategy,
    /// Bookkeeping private to the active strategy.
    strategy_state: StrategyState,
    /// Most recent button sample, taken once per tick.
    last_input: Buttons,
    /// Hook seeded as the return address of every initial frame.
    exit_hook: ProgramEntry,
}

impl Scheduler {
    /// Create an empty scheduler. `exit_hook` becomes the return address
    /// of every process that falls off the end of its program.
    pub const fn new(exit_hook: ProgramEntry) -> Self {
        Self {
            processes: [Process::EMPTY; MAX_PROCESSES],
            registry: ProgramRegistry::new(),
            stacks: StackArena::new(),
            current: IDLE_PROCESS,
            strategy: SchedulingStrategy::Even,
            strategy_state: StrategyState::new(),
            last_input: Buttons::empty(),
            exit_hook,
        }
    }

    // -----------------------------------------------------------------------
    // Boot
    // -----------------------------------------------------------------------

    /// Reset every slot to `Unused`, then launch one process for every
    /// registered program whose autostart bit is set (the idle program
    /// among them). Runs before interrupts are enabled.
    pub fn init(&mut self) {
        for slot in self.processes.iter_mut() {
            *slot = Process::EMPTY;
        }
        self.current = IDLE_PROCESS;

        for id in 0..MAX_PROGRAMS {
            if self.registry.autostart(id) {
                // With more autostart programs than process slots, the
                // surplus is silently dropped.
                let _ = self.exec(id, DEFAULT_PRIORITY);
            }
        }
    }

    /// Promote the idle process to `Running` and hand out the machine
    /// address of its seeded frame. The port layer performs the one-time
    /// context restore from that address and never returns here.
    pub fn prepare_start(&mut self) -> *mut u32 {
        self.current = IDLE_PROCESS;
        self.processes[IDLE_PROCESS].state = ProcessState::Running;
        let cursor = self.processes[IDLE_PROCESS].cursor;
        self.stacks.resume_ptr(IDLE_PROCESS, cursor)
    }

    // -----------------------------------------------------------------------
    // Process launch and termination
    // -----------------------------------------------------------------------

    /// Allocate a free slot for an instance of `program` and seed its
    /// initial stack frame so the first dispatch starts it at the
    /// program's entry point.
    ///
    /// Mutates state shared with the tick handler; callers outside the
    /// handler must hold a critical section (the kernel facade does).
    pub fn exec(&mut self, program: ProgramId, priority: Priority) -> Result<ProcessId, KernelError> {
        // Resolve first: an unresolvable program must not consume a slot.
        let entry = self.registry.entry(program).ok_or(KernelError::UnknownProgram)?;

        let pid = self
            .processes
            .iter()
            .position(|slot| slot.state == ProcessState::Unused)
            .ok_or(KernelError::ProcessTableFull)?;

        let cursor = seed_initial_frame(self.stacks.region_mut(pid), entry, self.exit_hook);
        self.processes[pid] = Process {
            state: ProcessState::Ready,
            priority,
            program,
            cursor,
        };
        Ok(pid)
    }

    /// Tear a process down: its slot becomes `Unused` and will not be
    /// selected again. Stack memory is reclaimed lazily — the next `exec`
    /// of the slot overwrites it. The idle process is untouchable.
    pub fn kill(&mut self, pid: ProcessId) -> Result<(), KernelError> {
        if pid == IDLE_PROCESS {
            return Err(KernelError::IdleUntouchable);
        }
        match self.processes.get_mut(pid) {
            Some(slot) if slot.in_use() => {
                slot.state = ProcessState::Unused;
                Ok(())
            }
            _ => Err(KernelError::NoSuchProcess),
        }
    }

    // -----------------------------------------------------------------------
    // Dispatch (tick handler core)
    // -----------------------------------------------------------------------

    /// Persist the preempted process's stack position, as reported by the
    /// context-save primitive.
    pub fn record_preempted_cursor(&mut self, cursor: StackCursor) {
        self.processes[self.current].cursor = cursor;
    }

    /// One scheduling decision. Runs inside the tick handler after the
    /// outgoing context has been saved:
    ///
    /// 1. demote the interrupted process `Running` → `Ready`,
    /// 2. stash the peripheral input sample taken this tick,
    /// 3. let the active strategy pick the next process,
    /// 4. promote it `Ready` → `Running`.
    ///
    /// Returns the chosen process id; the caller restores its context.
    pub fn dispatch(&mut self, input: Buttons) -> ProcessId {
        if self.processes[self.current].state == ProcessState::Running {
            self.processes[self.current].state = ProcessState::Ready;
        }

        self.last_input = input;

        let next = strategy::select(
            self.strategy,
            &mut self.strategy_state,
            &self.processes,
            self.current,
        );
        debug_assert_eq!(self.processes[next].state, ProcessState::Ready);

        self.processes[next].state = ProcessState::Running;
        self.current = next;
        next
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Slot of the currently executing process.
    #[inline]
    pub fn current_process(&self) -> ProcessId {
        self.current
    }

    /// Borrow the slot of process `pid`. `None` on an out-of-range id.
    pub fn process(&self, pid: ProcessId) -> Option<&Process> {
        self.processes.get(pid)
    }

    /// Mutably borrow the slot of process `pid`.
    pub fn process_mut(&mut self, pid: ProcessId) -> Option<&mut Process> {
        self.processes.get_mut(pid)
    }

    /// Number of slots currently holding a process (any non-`Unused` state).
    pub fn active_process_count(&self) -> usize {
        self.processes.iter().filter(|slot| slot.in_use()).count()
    }

    /// The active scheduling strategy.
    #[inline]
    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }

    /// Swap the active scheduling strategy. Takes effect at the next
    /// tick's selection — never mid-tick, because the dispatcher reads the
    /// selector exactly once per tick. Strategy-private bookkeeping is
    /// reset so the new strategy starts cleanly.
    pub fn set_strategy(&mut self, strategy: SchedulingStrategy) {
        self.strategy = strategy;
        self.strategy_state.reset();
    }

    /// Button state sampled at the most recent tick.
    #[inline]
    pub fn last_input(&self) -> Buttons {
        self.last_input
    }

    /// XOR checksum over the live stack bytes of process `pid`, for
    /// corruption and overflow detection. Diagnostic read only; an
    /// out-of-range id reads as an empty stack (0).
    pub fn stack_checksum(&self, pid: ProcessId) -> u8 {
        match self.processes.get(pid) {
            Some(slot) => self.stacks.checksum(pid, slot.cursor),
            None => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::CONTEXT_FRAME_BYTES;
    use crate::config::STACK_SIZE;

    extern "C" fn program_stub() -> ! {
        loop {}
    }

    extern "C" fn other_stub() -> ! {
        loop {}
    }

    extern "C" fn exit_stub() -> ! {
        loop {}
    }

    fn booted() -> Scheduler {
        let mut sched = Scheduler::new(exit_stub);
        sched.init();
        sched
    }

    #[test]
    fn init_autostarts_the_idle_process() {
        let sched = booted();
        assert_eq!(sched.active_process_count(), 1);
        assert_eq!(sched.process(IDLE_PROCESS).unwrap().state, ProcessState::Ready);
        assert_eq!(sched.current_process(), IDLE_PROCESS);
    }

    #[test]
    fn init_autostarts_exactly_the_flagged_programs() {
        let mut sched = Scheduler::new(exit_stub);
        // Idle occupies program id 0 with its autostart bit set; register
        // three more with bit 2 set -> expect processes for programs 0 and 2.
        assert_eq!(sched.registry.register(program_stub, false), Ok(1));
        assert_eq!(sched.registry.register(other_stub, true), Ok(2));
        assert_eq!(sched.registry.register(exit_stub, false), Ok(3));
        sched.init();

        assert_eq!(sched.active_process_count(), 2);
        let programs: [ProgramId; 2] = [
            sched.process(0).unwrap().program,
            sched.process(1).unwrap().program,
        ];
        assert_eq!(programs, [0, 2]);
        assert_eq!(sched.process(0).unwrap().state, ProcessState::Ready);
        assert_eq!(sched.process(1).unwrap().state, ProcessState::Ready);
        assert_eq!(sched.process(1).unwrap().priority, DEFAULT_PRIORITY);
        assert_eq!(sched.process(2).unwrap().state, ProcessState::Unused);
    }

    #[test]
    fn exec_allocates_the_first_unused_slot() {
        let mut sched = booted();
        let program = sched.registry.register(program_stub, false).unwrap();

        let pid = sched.exec(program, 42).unwrap();
        assert_eq!(pid, 1);
        let slot = sched.process(pid).unwrap();
        assert_eq!(slot.state, ProcessState::Ready);
        assert_eq!(slot.priority, 42);
        assert_eq!(slot.program, program);
        assert_eq!(slot.cursor.offset(), STACK_SIZE - CONTEXT_FRAME_BYTES);
    }

    #[test]
    fn exec_fails_once_the_table_is_full() {
        let mut sched = booted();
        let program = sched.registry.register(program_stub, false).unwrap();

        let mut launched = 0;
        for _ in 0..MAX_PROCESSES + 3 {
            if sched.exec(program, 1).is_ok() {
                launched += 1;
            }
        }
        // Idle holds one slot; every further exec must fail.
        assert_eq!(launched, MAX_PROCESSES - 1);
        assert_eq!(sched.exec(program, 1), Err(KernelError::ProcessTableFull));
        assert_eq!(sched.active_process_count(), MAX_PROCESSES);
    }

    #[test]
    fn exec_of_an_unregistered_program_consumes_no_slot() {
        let mut sched = booted();
        let before = sched.active_process_count();

        assert_eq!(sched.exec(7, 1), Err(KernelError::UnknownProgram));
        assert_eq!(sched.exec(MAX_PROGRAMS + 1, 1), Err(KernelError::UnknownProgram));
        assert_eq!(sched.active_process_count(), before);
    }

    #[test]
    fn dispatch_keeps_exactly_one_process_running() {
        let mut sched = booted();
        let program = sched.registry.register(program_stub, false).unwrap();
        sched.exec(program, 1).unwrap();
        sched.exec(program, 1).unwrap();
        sched.prepare_start();

        for _ in 0..10 {
            let next = sched.dispatch(Buttons::empty());
            assert_eq!(sched.current_process(), next);
            let running = sched
                .processes
                .iter()
                .filter(|p| p.state == ProcessState::Running)
                .count();
            assert_eq!(running, 1);
            assert!(sched.process(next).unwrap().in_use());
        }
    }

    #[test]
    fn dispatch_demotes_the_preempted_process() {
        let mut sched = booted();
        let program = sched.registry.register(program_stub, false).unwrap();
        sched.exec(program, 1).unwrap();
        sched.prepare_start();

        let next = sched.dispatch(Buttons::empty());
        assert_eq!(next, 1);
        assert_eq!(sched.process(IDLE_PROCESS).unwrap().state, ProcessState::Ready);
        assert_eq!(sched.process(1).unwrap().state, ProcessState::Running);
    }

    #[test]
    fn dispatch_stashes_the_input_sample() {
        let mut sched = booted();
        sched.prepare_start();
        sched.dispatch(Buttons::ESC | Buttons::DOWN);
        assert_eq!(sched.last_input(), Buttons::ESC | Buttons::DOWN);
    }

    #[test]
    fn strategy_swap_takes_effect_on_the_next_dispatch() {
        let mut sched = booted();
        let program = sched.registry.register(program_stub, false).unwrap();
        sched.exec(program, 1).unwrap();
        sched.exec(program, 1).unwrap();
        sched.prepare_start();

        assert_eq!(sched.dispatch(Buttons::empty()), 1);
        sched.set_strategy(SchedulingStrategy::RunToCompletion);
        assert_eq!(sched.strategy(), SchedulingStrategy::RunToCompletion);
        // Under Even this would have advanced to process 2.
        assert_eq!(sched.dispatch(Buttons::empty()), 1);
        assert_eq!(sched.dispatch(Buttons::empty()), 1);
    }

    #[test]
    fn kill_frees_the_slot_for_reuse() {
        let mut sched = booted();
        let program = sched.registry.register(program_stub, false).unwrap();
        let pid = sched.exec(program, 9).unwrap();

        sched.kill(pid).unwrap();
        assert_eq!(sched.process(pid).unwrap().state, ProcessState::Unused);
        assert_eq!(sched.kill(pid), Err(KernelError::NoSuchProcess));

        // Lazy reclamation: the next exec reuses and reseeds the slot.
        assert_eq!(sched.exec(program, 3), Ok(pid));
        assert_eq!(sched.process(pid).unwrap().priority, 3);
    }

    #[test]
    fn kill_spares_the_idle_process() {
        let mut sched = booted();
        assert_eq!(sched.kill(IDLE_PROCESS), Err(KernelError::IdleUntouchable));
        assert_eq!(sched.kill(MAX_PROCESSES), Err(KernelError::NoSuchProcess));
    }

    #[test]
    fn dispatch_skips_a_killed_current_process() {
        let mut sched = booted();
        let program = sched.registry.register(program_stub, false).unwrap();
        let pid = sched.exec(program, 1).unwrap();
        sched.prepare_start();
        assert_eq!(sched.dispatch(Buttons::empty()), pid);

        sched.kill(pid).unwrap();
        // Current slot is Unused now; dispatch must pick someone else.
        let next = sched.dispatch(Buttons::empty());
        assert_eq!(next, IDLE_PROCESS);
    }

    #[test]
    fn checksum_is_stable_until_the_stack_changes() {
        let mut sched = booted();
        let program = sched.registry.register(program_stub, false).unwrap();
        let pid = sched.exec(program, 1).unwrap();

        let sum = sched.stack_checksum(pid);
        assert_eq!(sched.stack_checksum(pid), sum);

        sched.stacks.region_mut(pid)[STACK_SIZE - 2] ^= 0xFF;
        assert_ne!(sched.stack_checksum(pid), sum);
    }

    #[test]
    fn checksum_of_an_out_of_range_pid_reads_as_empty() {
        let sched = booted();
        assert_eq!(sched.stack_checksum(MAX_PROCESSES), 0);
        assert_eq!(sched.stack_checksum(MAX_PROCESSES + 1), 0);
    }

    #[test]
    fn seeded_frames_differ_per_program_entry() {
        let mut sched = booted();
        let a = sched.registry.register(program_stub, false).unwrap();
        let b = sched.registry.register(other_stub, false).unwrap();
        let pa = sched.exec(a, 1).unwrap();
        let pb = sched.exec(b, 1).unwrap();

        let pc_off = STACK_SIZE - CONTEXT_FRAME_BYTES + 14 * 4;
        let pc_a = &sched.stacks.region(pa)[pc_off..pc_off + 4];
        let pc_b = &sched.stacks.region(pb)[pc_off..pc_off + 4];
        assert_ne!(pc_a, pc_b);
    }
}
