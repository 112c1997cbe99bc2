//! # Program Registry
//!
//! Fixed-capacity mapping from a program id to its entry-point function,
//! plus the autostart bitmask consulted at scheduler init. The registry is
//! append-only: programs are registered once before scheduling starts and
//! never removed.
//!
//! Program id 0 is reserved for the idle program, which is registered
//! implicitly when the registry is created and always carries the
//! autostart bit, so an idle process exists from the first tick on.

use crate::config::MAX_PROGRAMS;
use crate::process::KernelError;

/// Index of a program slot in the registry.
pub type ProgramId = usize;

/// Entry point of a program. Programs never return; a process leaves the
/// system through the exit hook seeded into its initial stack frame.
pub type ProgramEntry = extern "C" fn() -> !;

/// Program slot reserved for the idle program.
pub const IDLE_PROGRAM: ProgramId = 0;

/// The idle program. It owns all the processor time no other process
/// wants to have.
pub extern "C" fn idle_program() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Append-only table of registered programs and their autostart bits.
pub struct ProgramRegistry {
    /// Entry points, indexed by program id. `None` marks a free slot.
    slots: [Option<ProgramEntry>; MAX_PROGRAMS],
    /// Bit `i` set means program `i` is launched automatically at
    /// scheduler init.
    autostart: u16,
}

impl ProgramRegistry {
    /// Create a registry holding only the idle program (id 0, autostart).
    pub const fn new() -> Self {
        let mut slots: [Option<ProgramEntry>; MAX_PROGRAMS] = [None; MAX_PROGRAMS];
        slots[IDLE_PROGRAM] = Some(idle_program as ProgramEntry);
        Self {
            slots,
            autostart: 1 << IDLE_PROGRAM,
        }
    }

    /// Register `entry` in the first free slot and return its program id.
    ///
    /// Registering an entry point that is already present returns the
    /// existing id (and additionally sets its autostart bit if requested).
    /// Fails with `ProgramTableFull` if no slot is free.
    pub fn register(
        &mut self,
        entry: ProgramEntry,
        autostart: bool,
    ) -> Result<ProgramId, KernelError> {
        let mut slot = 0;
        while slot < MAX_PROGRAMS {
            match self.slots[slot] {
                Some(existing) if existing as usize == entry as usize => break,
                Some(_) => slot += 1,
                None => break,
            }
        }
        if slot >= MAX_PROGRAMS {
            return Err(KernelError::ProgramTableFull);
        }

        self.slots[slot] = Some(entry);
        if autostart {
            self.autostart |= 1 << slot;
        }
        Ok(slot)
    }

    /// Look up the entry point of program `id`. `None` on an out-of-range
    /// or unregistered id.
    pub fn entry(&self, id: ProgramId) -> Option<ProgramEntry> {
        if id >= MAX_PROGRAMS {
            return None;
        }
        self.slots[id]
    }

    /// Look up the id under which `entry` is registered (linear scan).
    pub fn id_of(&self, entry: ProgramEntry) -> Option<ProgramId> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Some(e) if *e as usize == entry as usize))
    }

    /// Mutable access to the raw slot of program `id`.
    pub fn slot_mut(&mut self, id: ProgramId) -> Option<&mut Option<ProgramEntry>> {
        self.slots.get_mut(id)
    }

    /// Whether program `id` is to be launched automatically at init.
    pub fn autostart(&self, id: ProgramId) -> bool {
        id < MAX_PROGRAMS && self.autostart & (1 << id) != 0
    }

    /// Number of currently registered programs. Works as a plain count
    /// because programs cannot be unregistered.
    pub fn registered_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn prog_a() -> ! {
        loop {}
    }

    extern "C" fn prog_b() -> ! {
        loop {}
    }

    #[test]
    fn idle_is_preregistered_with_autostart() {
        let reg = ProgramRegistry::new();
        assert_eq!(reg.registered_count(), 1);
        assert!(reg.entry(IDLE_PROGRAM).is_some());
        assert!(reg.autostart(IDLE_PROGRAM));
        assert_eq!(reg.id_of(idle_program), Some(IDLE_PROGRAM));
    }

    #[test]
    fn register_fills_slots_in_order() {
        let mut reg = ProgramRegistry::new();
        assert_eq!(reg.register(prog_a, false), Ok(1));
        assert_eq!(reg.register(prog_b, true), Ok(2));
        assert_eq!(reg.registered_count(), 3);
        assert!(!reg.autostart(1));
        assert!(reg.autostart(2));
    }

    #[test]
    fn register_is_idempotent_per_entry() {
        let mut reg = ProgramRegistry::new();
        let id = reg.register(prog_a, false).unwrap();
        assert_eq!(reg.register(prog_a, false), Ok(id));
        assert_eq!(reg.registered_count(), 2);
    }

    #[test]
    fn register_fails_when_full() {
        let mut reg = ProgramRegistry::new();
        for id in 1..MAX_PROGRAMS {
            *reg.slot_mut(id).unwrap() = Some(prog_a as ProgramEntry);
        }
        assert_eq!(reg.register(prog_b, false), Err(KernelError::ProgramTableFull));
        assert_eq!(reg.registered_count(), MAX_PROGRAMS);
    }

    #[test]
    fn lookup_fails_silently_out_of_range() {
        let reg = ProgramRegistry::new();
        assert!(reg.entry(MAX_PROGRAMS).is_none());
        assert!(reg.entry(MAX_PROGRAMS + 7).is_none());
        assert!(!reg.autostart(MAX_PROGRAMS));
        assert_eq!(reg.id_of(prog_b), None);
    }
}
