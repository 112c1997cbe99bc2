//! # octOS Demo Firmware
//!
//! Registers three small programs next to the implicit idle program and
//! lets the round-robin strategy multiplex them:
//!
//! | Program | Autostart | Behavior |
//! |---------|-----------|----------|
//! | `counter_program` | yes | busy-counts, preempted at every tick |
//! | `button_watcher`  | yes | waits for a button, reacts, waits for release |
//! | `one_shot_program`| no  | launched by the watcher on Enter, then exits |
//!
//! The watcher also demonstrates the critical-section discipline: it
//! relaunches `one_shot_program` through `kernel::exec`, which serializes
//! against the scheduler tick internally.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod firmware {
    use octos::input::Buttons;
    use octos::kernel;
    use octos::strategy::SchedulingStrategy;
    use panic_halt as _;

    /// Id under which `one_shot_program` is registered, for the watcher.
    static mut ONE_SHOT: usize = 0;

    // -----------------------------------------------------------------------
    // Programs
    // -----------------------------------------------------------------------

    /// Burns CPU until preempted. Stands in for a compute-bound workload.
    extern "C" fn counter_program() -> ! {
        let mut count: u32 = 0;
        loop {
            count = count.wrapping_add(1);
        }
    }

    /// Busy-polls the buttons (yielding only through preemption) and
    /// launches a one-shot worker whenever Enter is pressed.
    extern "C" fn button_watcher() -> ! {
        loop {
            kernel::wait_for_input();
            if kernel::get_input().contains(Buttons::ENTER) {
                let _ = kernel::exec(unsafe { ONE_SHOT }, 4);
            }
            kernel::wait_for_no_input();
        }
    }

    /// Does a bounded chunk of work and retires itself; the freed slot is
    /// reused by the next launch.
    extern "C" fn one_shot_program() -> ! {
        let mut acc: u32 = 0;
        for i in 0..50_000u32 {
            acc = acc.wrapping_add(i);
        }
        let _ = kernel::kill(kernel::current_process());
        // The slot is gone; the next tick dispatches someone else for good.
        loop {
            cortex_m::asm::wfi();
        }
    }

    // -----------------------------------------------------------------------
    // Entry point
    // -----------------------------------------------------------------------

    #[cortex_m_rt::entry]
    fn main() -> ! {
        let core_peripherals = cortex_m::Peripherals::take().unwrap();

        kernel::init();

        kernel::register_program(counter_program, true).unwrap();
        kernel::register_program(button_watcher, true).unwrap();
        let one_shot = kernel::register_program(one_shot_program, false).unwrap();
        unsafe { ONE_SHOT = one_shot };

        kernel::init_scheduler();
        kernel::set_scheduling_strategy(SchedulingStrategy::RoundRobin);

        kernel::start(core_peripherals)
    }
}

#[cfg(not(target_os = "none"))]
fn main() {}
