//! # Platform Abstraction Layer
//!
//! Boundary between the portable scheduler core and the hardware. The core
//! never touches registers directly; everything machine-specific — masking
//! the preemption interrupt source, the global interrupt-enable flag, the
//! button pins, the fatal-error surface — is injected through the
//! [`Platform`] trait. The Cortex-M4 port implements it against real
//! registers; tests substitute [`MockPlatform`].
//!
//! The context save/restore primitive itself (PendSV and the first-launch
//! trampoline) lives in the port module and is only compiled for the
//! embedded target; its stack-frame contract is defined in `crate::stack`.

pub mod cortex_m4;

/// Hardware capabilities required by the scheduler core.
pub trait Platform {
    /// Mask the interrupt source that drives preemption (the scheduler
    /// tick). Idempotent: masking an already masked source is a no-op.
    fn mask_preemption_source(&mut self);

    /// Unmask the preemption interrupt source.
    fn unmask_preemption_source(&mut self);

    /// Run `f` with the global interrupt-enable flag cleared, restoring the
    /// flag's previous value afterwards. This is what makes the critical
    /// section guard itself interrupt-safe even when invoked from ordinary
    /// interruptible process context.
    fn interrupts_masked<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R;

    /// Configure the button lines as pulled-up inputs. Called once at boot.
    fn configure_button_pins(&mut self);

    /// Read the raw button port. Active-low: a pressed button reads as 0.
    /// Decoding into the logical layout happens in `crate::input`.
    fn read_raw_buttons(&mut self) -> u8;

    /// Report a fatal, unrecoverable protocol violation. On hardware this
    /// does not return; the mock records the message so tests can assert
    /// the error path fired.
    fn fatal(&mut self, msg: &str);
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------

/// Platform stand-in used by the host-side unit tests. Records every
/// masking transition and fatal report, and serves a settable raw button
/// register value.
#[cfg(test)]
#[derive(Debug)]
pub struct MockPlatform {
    /// Current state of the preemption source mask.
    pub preemption_masked: bool,
    /// Number of mask / unmask calls observed.
    pub mask_calls: u32,
    pub unmask_calls: u32,
    /// Depth of `interrupts_masked` nesting currently active.
    pub interrupt_mask_depth: u32,
    /// Simulated raw (active-low) button register.
    pub raw_buttons: u8,
    /// Whether `configure_button_pins` ran.
    pub pins_configured: bool,
    /// Number of fatal reports received.
    pub fatal_count: u32,
}

#[cfg(test)]
impl MockPlatform {
    pub fn new() -> Self {
        Self {
            preemption_masked: false,
            mask_calls: 0,
            unmask_calls: 0,
            interrupt_mask_depth: 0,
            raw_buttons: 0xFF, // all released (active-low)
            pins_configured: false,
            fatal_count: 0,
        }
    }
}

#[cfg(test)]
impl Platform for MockPlatform {
    fn mask_preemption_source(&mut self) {
        self.preemption_masked = true;
        self.mask_calls += 1;
    }

    fn unmask_preemption_source(&mut self) {
        self.preemption_masked = false;
        self.unmask_calls += 1;
    }

    fn interrupts_masked<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.interrupt_mask_depth += 1;
        let result = f(self);
        self.interrupt_mask_depth -= 1;
        result
    }

    fn configure_button_pins(&mut self) {
        self.pins_configured = true;
    }

    fn read_raw_buttons(&mut self) -> u8 {
        self.raw_buttons
    }

    fn fatal(&mut self, _msg: &str) {
        self.fatal_count += 1;
    }
}
