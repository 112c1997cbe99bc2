//! # Kernel
//!
//! Top-level facade tying the scheduler core to a concrete platform, plus
//! the single global instance the interrupt handlers dispatch through.
//!
//! Every mutating operation invoked from process context (`exec`, `kill`,
//! strategy swaps) is bracketed in a critical section here, so the
//! scheduler core itself stays free of masking concerns. The tick path
//! enters through [`Kernel::tick_from_isr`], called by the port layer with
//! the preempted process's saved stack pointer.
//!
//! ## Startup sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::init()               ← publish instance, input pins
//!         ├─► kernel::register_program()   ← one call per program
//!         ├─► kernel::init_scheduler()     ← autostart process set
//!         └─► kernel::start()              ← tick timer on, idle process
//!                                            dispatched, never returns
//! ```

use crate::arch::cortex_m4::CortexM4;
use crate::arch::Platform;
use crate::input::{self, Buttons};
use crate::process::{KernelError, Priority, ProcessId};
use crate::program::{ProgramEntry, ProgramId};
use crate::scheduler::Scheduler;
use crate::strategy::SchedulingStrategy;
use crate::sync::CriticalGuard;

// ---------------------------------------------------------------------------
// Kernel facade
// ---------------------------------------------------------------------------

/// Scheduler core plus the platform it runs on. Generic so tests can
/// substitute a mock platform; firmware uses the single `Kernel<CortexM4>`
/// below.
pub struct Kernel<P: Platform> {
    pub scheduler: Scheduler,
    pub critical: CriticalGuard,
    pub platform: P,
}

impl<P: Platform> Kernel<P> {
    /// Create a kernel around `platform`. `exit_hook` is seeded as the
    /// return address of every launched process.
    pub const fn new(platform: P, exit_hook: ProgramEntry) -> Self {
        Self {
            scheduler: Scheduler::new(exit_hook),
            critical: CriticalGuard::new(),
            platform,
        }
    }

    /// Configure the input pins and build the initial process set: every
    /// registered program with its autostart bit set becomes a `Ready`
    /// process before the first tick.
    pub fn init(&mut self) {
        self.platform.configure_button_pins();
        self.scheduler.init();
    }

    /// Register a program entry point. Must happen before `init` for the
    /// autostart bit to be honored.
    pub fn register_program(
        &mut self,
        entry: ProgramEntry,
        autostart: bool,
    ) -> Result<ProgramId, KernelError> {
        self.critical.enter(&mut self.platform);
        let result = self.scheduler.registry.register(entry, autostart);
        self.critical.leave(&mut self.platform);
        result
    }

    /// Launch a process executing `program`. Runs inside a critical
    /// section: the process table is shared with the tick handler.
    pub fn exec(&mut self, program: ProgramId, priority: Priority) -> Result<ProcessId, KernelError> {
        self.critical.enter(&mut self.platform);
        let result = self.scheduler.exec(program, priority);
        self.critical.leave(&mut self.platform);
        result
    }

    /// Terminate process `pid`.
    pub fn kill(&mut self, pid: ProcessId) -> Result<(), KernelError> {
        self.critical.enter(&mut self.platform);
        let result = self.scheduler.kill(pid);
        self.critical.leave(&mut self.platform);
        result
    }

    /// Swap the scheduling strategy; effective from the next tick on.
    pub fn set_scheduling_strategy(&mut self, strategy: SchedulingStrategy) {
        self.critical.enter(&mut self.platform);
        self.scheduler.set_strategy(strategy);
        self.critical.leave(&mut self.platform);
    }

    /// Enter a critical section (nesting-aware; preemption stays off until
    /// the matching leave).
    pub fn enter_critical_section(&mut self) {
        self.critical.enter(&mut self.platform);
    }

    /// Leave a critical section.
    pub fn leave_critical_section(&mut self) {
        self.critical.leave(&mut self.platform);
    }

    /// Sample the buttons. Plain peripheral read, no critical section
    /// required.
    pub fn input(&mut self) -> Buttons {
        input::read(&mut self.platform)
    }

    /// Complete tick handler body, invoked by the context-switch primitive
    /// with the preempted process's stack pointer after its registers have
    /// been pushed. Returns the stack pointer to restore from.
    ///
    /// Order per the scheduler contract: persist the outgoing cursor, scan
    /// the input peripheral, let the strategy pick, hand back the incoming
    /// frame address. The hardware keeps the tick source disabled for the
    /// duration, so this never re-enters.
    pub fn tick_from_isr(&mut self, preempted_sp: *mut u32) -> *mut u32 {
        let current = self.scheduler.current_process();
        let cursor = self.scheduler.stacks.cursor_of(current, preempted_sp as *const u32);
        self.scheduler.record_preempted_cursor(cursor);

        let sample = input::read(&mut self.platform);
        let next = self.scheduler.dispatch(sample);

        let cursor = self.scheduler.processes[next].cursor;
        self.scheduler.stacks.resume_ptr(next, cursor)
    }
}

// ---------------------------------------------------------------------------
// Global instance and firmware API
// ---------------------------------------------------------------------------

/// The one kernel instance of the firmware.
///
/// # Safety
/// Accessed through `KERNEL_PTR`, set once during [`init`]. Process-level
/// accessors wrap themselves in critical sections; the ISR path runs with
/// its own interrupt source disabled by construction.
static mut KERNEL: Kernel<CortexM4> = Kernel::new(CortexM4::new(), process_exit);

/// Raw pointer to the global kernel for the port-layer handlers, which
/// cannot take references. Null until [`init`] has run.
pub static mut KERNEL_PTR: *mut Kernel<CortexM4> = core::ptr::null_mut();

/// Return address seeded into every initial stack frame. A program that
/// falls off its entry function lands here and its slot is retired.
extern "C" fn process_exit() -> ! {
    unsafe {
        let kernel = &mut *KERNEL_PTR;
        kernel.enter_critical_section();
        let current = kernel.scheduler.current_process();
        let _ = kernel.scheduler.kill(current);
        kernel.leave_critical_section();
    }
    // The slot is Unused now; the next tick dispatches someone else and
    // this stack is never resumed.
    loop {
        cortex_m::asm::wfi();
    }
}

/// Initialize the global kernel: publish the instance pointer and
/// configure the input peripheral. Must be called exactly once, before
/// any program registration.
pub fn init() {
    unsafe {
        KERNEL_PTR = core::ptr::addr_of_mut!(KERNEL);
        (*KERNEL_PTR).platform.configure_button_pins();
    }
}

/// Build the initial process set: every registered program with its
/// autostart bit set becomes a `Ready` process. Call after the last
/// program registration, before `start`.
pub fn init_scheduler() {
    unsafe { (*KERNEL_PTR).scheduler.init() }
}

/// Register a program with the global kernel.
pub fn register_program(entry: ProgramEntry, autostart: bool) -> Result<ProgramId, KernelError> {
    unsafe { (*KERNEL_PTR).register_program(entry, autostart) }
}

/// Launch a process executing `program` on the global kernel.
pub fn exec(program: ProgramId, priority: Priority) -> Result<ProcessId, KernelError> {
    unsafe { (*KERNEL_PTR).exec(program, priority) }
}

/// Terminate process `pid` on the global kernel.
pub fn kill(pid: ProcessId) -> Result<(), KernelError> {
    unsafe { (*KERNEL_PTR).kill(pid) }
}

/// Swap the global scheduling strategy.
pub fn set_scheduling_strategy(strategy: SchedulingStrategy) {
    unsafe { (*KERNEL_PTR).set_scheduling_strategy(strategy) }
}

/// The global scheduling strategy.
pub fn scheduling_strategy() -> SchedulingStrategy {
    unsafe { (*KERNEL_PTR).scheduler.strategy() }
}

/// Id of the currently running process.
pub fn current_process() -> ProcessId {
    unsafe { (*KERNEL_PTR).scheduler.current_process() }
}

/// Stack checksum of process `pid`, for corruption detection. Reads as 0
/// (an empty stack) for an out-of-range id.
pub fn stack_checksum(pid: ProcessId) -> u8 {
    unsafe { (*KERNEL_PTR).scheduler.stack_checksum(pid) }
}

/// Suppress preemption until the matching [`leave_critical_section`].
pub fn enter_critical_section() {
    unsafe { (*KERNEL_PTR).enter_critical_section() }
}

/// Re-allow preemption once the outermost section closes.
pub fn leave_critical_section() {
    unsafe { (*KERNEL_PTR).leave_critical_section() }
}

/// Current logical button state.
pub fn get_input() -> Buttons {
    unsafe { (*KERNEL_PTR).input() }
}

/// Busy-poll until at least one button is pressed.
pub fn wait_for_input() {
    unsafe { input::wait_for_input(&mut (*KERNEL_PTR).platform) }
}

/// Busy-poll until no button is pressed.
pub fn wait_for_no_input() {
    unsafe { input::wait_for_no_input(&mut (*KERNEL_PTR).platform) }
}

/// Start scheduling: arm the tick timer, dispatch the idle process and
/// hand the CPU over. **Does not return.**
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub fn start(mut core_peripherals: cortex_m::Peripherals) -> ! {
    use crate::arch::cortex_m4;

    cortex_m4::configure_systick(&mut core_peripherals.SYST);
    cortex_m4::set_interrupt_priorities();

    unsafe {
        let first_sp = (*KERNEL_PTR).scheduler.prepare_start();
        cortex_m4::start_first_process(first_sp);
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::MockPlatform;
    use crate::process::{ProcessState, IDLE_PROCESS};

    extern "C" fn program_stub() -> ! {
        loop {}
    }

    extern "C" fn exit_stub() -> ! {
        loop {}
    }

    fn booted() -> Kernel<MockPlatform> {
        let mut kernel = Kernel::new(MockPlatform::new(), exit_stub);
        kernel.init();
        kernel
    }

    #[test]
    fn init_configures_pins_and_autostarts_idle() {
        let kernel = booted();
        assert!(kernel.platform.pins_configured);
        assert_eq!(kernel.scheduler.active_process_count(), 1);
    }

    #[test]
    fn exec_runs_inside_a_balanced_critical_section() {
        let mut kernel = booted();
        let program = kernel.register_program(program_stub, false).unwrap();
        kernel.exec(program, 1).unwrap();

        assert!(!kernel.critical.active());
        assert!(!kernel.platform.preemption_masked);
        assert_eq!(kernel.platform.mask_calls, kernel.platform.unmask_calls);
        assert!(kernel.platform.mask_calls >= 2);
    }

    #[test]
    fn tick_round_trip_dispatches_a_fresh_process() {
        let mut kernel = booted();
        let program = kernel.register_program(program_stub, false).unwrap();
        let pid = kernel.exec(program, 1).unwrap();

        // Hand the CPU to idle, then simulate its first preemption with
        // the stack pointer the context save would report.
        let idle_sp = kernel.scheduler.prepare_start();
        let next_sp = kernel.tick_from_isr(idle_sp);

        assert_eq!(kernel.scheduler.current_process(), pid);
        assert_eq!(
            kernel.scheduler.process(pid).unwrap().state,
            ProcessState::Running
        );
        assert_eq!(
            kernel.scheduler.process(IDLE_PROCESS).unwrap().state,
            ProcessState::Ready
        );
        // The restore address is the seeded frame of the new process.
        let cursor = kernel.scheduler.processes[pid].cursor;
        assert_eq!(next_sp, kernel.scheduler.stacks.resume_ptr(pid, cursor));
    }

    #[test]
    fn tick_persists_the_preempted_cursor() {
        let mut kernel = booted();
        let idle_sp = kernel.scheduler.prepare_start();
        let idle_cursor_before = kernel.scheduler.processes[IDLE_PROCESS].cursor;

        // Pretend idle pushed one more word before being preempted.
        let preempted_sp = unsafe { idle_sp.sub(1) };
        kernel.tick_from_isr(preempted_sp);

        let saved = kernel.scheduler.processes[IDLE_PROCESS].cursor;
        assert_eq!(saved.offset(), idle_cursor_before.offset() - 4);
    }

    #[test]
    fn tick_samples_the_buttons() {
        let mut kernel = booted();
        kernel.platform.raw_buttons = 0b0111_1111; // Esc pressed
        let idle_sp = kernel.scheduler.prepare_start();
        kernel.tick_from_isr(idle_sp);
        assert_eq!(kernel.scheduler.last_input(), Buttons::ESC);
    }

    #[test]
    fn critical_section_api_balances_through_the_facade() {
        let mut kernel = booted();
        kernel.enter_critical_section();
        kernel.enter_critical_section();
        assert!(kernel.platform.preemption_masked);
        kernel.leave_critical_section();
        assert!(kernel.platform.preemption_masked);
        kernel.leave_critical_section();
        assert!(!kernel.platform.preemption_masked);
        assert_eq!(kernel.platform.fatal_count, 0);
    }
}
