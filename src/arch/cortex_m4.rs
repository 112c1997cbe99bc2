//! # Cortex-M4 Port
//!
//! Hardware side of the platform boundary for ARM Cortex-M4 (Thumb-2)
//! parts, wired for an STM32F4 with the four board buttons on GPIOC pins
//! 0, 1, 6 and 7 (active-low, pulled up).
//!
//! ## Context switch mechanism
//!
//! The scheduler tick is SysTick; the actual save/restore happens in
//! PendSV, the standard Cortex-M deferred context-switch exception:
//!
//! 1. Exception entry hardware stacks R0–R3, R12, LR, PC, xPSR onto the
//!    running process's stack (PSP).
//! 2. PendSV pushes R4–R11 below that, completing the frame described in
//!    `crate::stack`, and calls into the kernel with the resulting PSP.
//! 3. The kernel persists the cursor, dispatches, and returns the next
//!    process's frame address.
//! 4. PendSV pops R4–R11 from the new frame and exception return consumes
//!    the rest, resuming the process where it was preempted — or, for a
//!    freshly seeded frame, at its program entry point.
//!
//! Handlers run on the main stack (MSP), which is the dedicated interrupt
//! stack distinct from every process stack. Both PendSV and SysTick sit at
//! the lowest interrupt priority; the tick source cannot re-enter its own
//! handler, while unrelated higher-priority interrupts still preempt
//! process code normally.

use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::{interrupt, register};

use crate::arch::Platform;
use crate::config::{SYSTEM_CLOCK_HZ, TICK_HZ};

// ---------------------------------------------------------------------------
// Register map
// ---------------------------------------------------------------------------

/// SysTick control/status register; bit 1 is TICKINT, the scheduler's
/// preemption interrupt source.
const SYST_CSR: *mut u32 = 0xE000_E010 as *mut u32;
const SYST_CSR_TICKINT: u32 = 1 << 1;

/// Interrupt control and state register; bit 28 pends PendSV.
const ICSR: *mut u32 = 0xE000_ED04 as *mut u32;
const ICSR_PENDSVSET: u32 = 1 << 28;

/// System handler priority register 3: PendSV priority in bits 23:16,
/// SysTick priority in bits 31:24.
const SHPR3: *mut u32 = 0xE000_ED20 as *mut u32;

/// GPIOC register block (STM32F4) and the RCC clock-enable bit for it.
const GPIOC_MODER: *mut u32 = 0x4002_0800 as *mut u32;
const GPIOC_PUPDR: *mut u32 = 0x4002_080C as *mut u32;
const GPIOC_IDR: *const u32 = 0x4002_0810 as *const u32;
const RCC_AHB1ENR: *mut u32 = 0x4002_3830 as *mut u32;
const RCC_GPIOCEN: u32 = 1 << 2;

/// Pin mask for the button lines (pins 0, 1, 6, 7), two bits per pin in
/// MODER/PUPDR.
const BUTTON_PINS_2BIT_MASK: u32 = 0b1111_0000_0000_1111;
const BUTTON_PINS_PULL_UP: u32 = 0b0101_0000_0000_0101;

// ---------------------------------------------------------------------------
// Platform implementation
// ---------------------------------------------------------------------------

/// The Cortex-M4 platform. Zero-sized: all state is in hardware registers.
pub struct CortexM4;

impl CortexM4 {
    pub const fn new() -> Self {
        CortexM4
    }
}

impl Platform for CortexM4 {
    fn mask_preemption_source(&mut self) {
        unsafe {
            let csr = core::ptr::read_volatile(SYST_CSR);
            core::ptr::write_volatile(SYST_CSR, csr & !SYST_CSR_TICKINT);
        }
    }

    fn unmask_preemption_source(&mut self) {
        unsafe {
            let csr = core::ptr::read_volatile(SYST_CSR);
            core::ptr::write_volatile(SYST_CSR, csr | SYST_CSR_TICKINT);
        }
    }

    fn interrupts_masked<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let was_enabled = register::primask::read().is_active();
        interrupt::disable();
        let result = f(self);
        if was_enabled {
            unsafe { interrupt::enable() };
        }
        result
    }

    fn configure_button_pins(&mut self) {
        unsafe {
            let enr = core::ptr::read_volatile(RCC_AHB1ENR);
            core::ptr::write_volatile(RCC_AHB1ENR, enr | RCC_GPIOCEN);

            // Button pins as inputs (MODER = 00) with pull-ups (PUPDR = 01);
            // other pins of the port are left untouched.
            let moder = core::ptr::read_volatile(GPIOC_MODER);
            core::ptr::write_volatile(GPIOC_MODER, moder & !BUTTON_PINS_2BIT_MASK);
            let pupdr = core::ptr::read_volatile(GPIOC_PUPDR);
            core::ptr::write_volatile(
                GPIOC_PUPDR,
                (pupdr & !BUTTON_PINS_2BIT_MASK) | BUTTON_PINS_PULL_UP,
            );
        }
    }

    fn read_raw_buttons(&mut self) -> u8 {
        unsafe { core::ptr::read_volatile(GPIOC_IDR) as u8 }
    }

    fn fatal(&mut self, msg: &str) {
        interrupt::disable();
        panic!("{}", msg);
    }
}

// ---------------------------------------------------------------------------
// Tick timer and priorities
// ---------------------------------------------------------------------------

/// Arm SysTick at `TICK_HZ` from the core clock. Every tick pends PendSV,
/// which performs one full scheduling round.
pub fn configure_systick(syst: &mut cortex_m::peripheral::SYST) {
    let reload = SYSTEM_CLOCK_HZ / TICK_HZ - 1;
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
}

/// Put PendSV and SysTick at the lowest priority so the context switch
/// never preempts another handler mid-flight.
pub fn set_interrupt_priorities() {
    unsafe {
        let val = core::ptr::read_volatile(SHPR3);
        core::ptr::write_volatile(SHPR3, val | (0xFF << 16) | (0xFF << 24));
    }
}

/// Pend a PendSV exception: request one scheduling round at the next
/// opportunity.
#[inline]
pub fn trigger_pendsv() {
    unsafe {
        core::ptr::write_volatile(ICSR, ICSR_PENDSVSET);
    }
}

// ---------------------------------------------------------------------------
// Exception handlers and first launch (embedded target only)
// ---------------------------------------------------------------------------

/// Hand the CPU to the first process. Switches Thread mode onto the
/// process stack, consumes the seeded frame by hand (there is no exception
/// to return from yet) and branches to the entry point. Never returns.
///
/// # Safety
/// `sp` must point at a freshly seeded context frame, and must only be
/// called once, with the tick timer already armed.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub unsafe fn start_first_process(sp: *mut u32) -> ! {
    core::arch::asm!(
        "adds r0, #32",       // skip the zeroed software block (R4-R11)
        "msr psp, r0",        // process stack pointer -> seeded HW frame
        "movs r0, #2",
        "msr control, r0",    // Thread mode uses PSP from here on
        "isb",
        "pop {{r0-r3, r12}}", // discard the zeroed argument registers
        "pop {{r4}}",         // LR slot (exit hook; entry never returns)
        "pop {{r5}}",         // PC slot: the program entry point
        "pop {{r6}}",         // xPSR slot (hardware sets it on the branch)
        "cpsie i",
        "bx r5",
        in("r0") sp,
        options(noreturn)
    );
}

/// SysTick handler: the scheduler tick. Defers the actual switch to
/// PendSV so it tail-chains after any other active handler.
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[no_mangle]
pub unsafe extern "C" fn SysTick() {
    trigger_pendsv();
}

/// PendSV handler: the context-switch primitive. Saves the outgoing
/// software frame, runs one scheduling round through the kernel, restores
/// the incoming frame. See the module docs for the full sequence.
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[unsafe(naked)]
#[no_mangle]
pub unsafe extern "C" fn PendSV() {
    core::arch::naked_asm!(
        "mrs r0, psp",           // outgoing process stack
        "stmdb r0!, {{r4-r11}}", // push the software block; frame complete
        "bl {switch}",           // r0: saved SP in, next frame address out
        "ldmia r0!, {{r4-r11}}", // pop the incoming software block
        "msr psp, r0",
        "ldr r0, =0xFFFFFFFD",   // exception return: Thread mode, PSP
        "bx r0",
        switch = sym switch_context,
    );
}

/// One scheduling round, called from PendSV with the outgoing process's
/// saved stack pointer. Returns the incoming process's frame address.
#[cfg(all(target_arch = "arm", target_os = "none"))]
unsafe extern "C" fn switch_context(preempted_sp: *mut u32) -> *mut u32 {
    let kernel = &mut *crate::kernel::KERNEL_PTR;
    kernel.tick_from_isr(preempted_sp)
}
