//! # Stack Arena
//!
//! Every process owns a statically reserved, non-overlapping stack region,
//! addressed by its process id. Saved stack positions are byte offsets
//! (`StackCursor`) into the owning region rather than raw addresses, so the
//! whole arena can be manipulated and checked from safe code; only the port
//! layer converts a cursor to a machine stack pointer.
//!
//! ## Context frame contract
//!
//! This module owns the byte layout shared between `exec` (which seeds the
//! frame) and the context-switch primitive (which consumes it). A full
//! context frame is `CONTEXT_FRAME_BYTES` long, little-endian u32 words,
//! ascending from the cursor:
//!
//! ```text
//! +0   R4..R11  = 0              (software block, popped by PendSV)
//! +32  R0..R3   = 0              (hardware exception frame)
//! +48  R12      = 0
//! +52  LR       = exit hook
//! +56  PC       = program entry point
//! +60  xPSR     = 0x0100_0000    (Thumb bit)
//! ```
//!
//! A freshly seeded frame is byte-for-byte what a save of a process about
//! to begin execution would have produced: the entry point as the resume
//! address and zeroed placeholders for every register the restore pops.

use crate::config::{MAX_PROCESSES, STACK_SIZE};
use crate::process::ProcessId;
use crate::program::ProgramEntry;

/// Words saved by software on context switch (R4–R11).
pub const SOFTWARE_FRAME_WORDS: usize = 8;
/// Words stacked by exception-entry hardware (R0–R3, R12, LR, PC, xPSR).
pub const HARDWARE_FRAME_WORDS: usize = 8;
/// Total size of one saved context frame in bytes.
pub const CONTEXT_FRAME_BYTES: usize = (SOFTWARE_FRAME_WORDS + HARDWARE_FRAME_WORDS) * 4;

/// xPSR value for a never-yet-run process: only the Thumb bit set.
const XPSR_INITIAL: u32 = 0x0100_0000;

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Saved stack position: the byte offset of the lowest occupied byte of a
/// region. The live part of the stack is `region[cursor..STACK_SIZE]`; a
/// cursor of `STACK_SIZE` marks an empty stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackCursor(pub u16);

impl StackCursor {
    /// Cursor of an empty stack region.
    pub const EMPTY: StackCursor = StackCursor(STACK_SIZE as u16);

    /// Byte offset into the owning region.
    #[inline]
    pub fn offset(self) -> usize {
        self.0 as usize
    }
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// One process stack. Aligned to 8 bytes as required by AAPCS; keeping
/// `STACK_SIZE` a multiple of 8 preserves the alignment across the arena.
#[repr(align(8))]
pub struct StackRegion(pub [u8; STACK_SIZE]);

/// Fixed pool of per-process stack regions, indexed by process id.
pub struct StackArena {
    regions: [StackRegion; MAX_PROCESSES],
}

impl StackArena {
    /// Create a zero-filled arena.
    pub const fn new() -> Self {
        const EMPTY_REGION: StackRegion = StackRegion([0; STACK_SIZE]);
        Self {
            regions: [EMPTY_REGION; MAX_PROCESSES],
        }
    }

    /// Borrow the stack region owned by `pid`.
    pub fn region(&self, pid: ProcessId) -> &[u8; STACK_SIZE] {
        &self.regions[pid].0
    }

    /// Mutably borrow the stack region owned by `pid`.
    pub fn region_mut(&mut self, pid: ProcessId) -> &mut [u8; STACK_SIZE] {
        &mut self.regions[pid].0
    }

    /// XOR-fold every byte from the bottom of `pid`'s region down to (and
    /// including) the byte at `cursor`. Purely diagnostic: no side effects,
    /// and a momentarily stale cursor merely yields a stale checksum, so
    /// this is safe to call outside a critical section. An empty stack
    /// checksums to 0.
    pub fn checksum(&self, pid: ProcessId, cursor: StackCursor) -> u8 {
        let start = cursor.offset().min(STACK_SIZE);
        self.regions[pid].0[start..]
            .iter()
            .fold(0, |sum, byte| sum ^ byte)
    }

    /// Machine address of the saved frame for `pid` at `cursor`. Port-layer
    /// use only: this is what gets loaded into the stack-pointer register
    /// before the restore.
    pub fn resume_ptr(&mut self, pid: ProcessId, cursor: StackCursor) -> *mut u32 {
        debug_assert!(cursor.offset() <= STACK_SIZE);
        unsafe { self.regions[pid].0.as_mut_ptr().add(cursor.offset()) as *mut u32 }
    }

    /// Convert a machine stack pointer inside `pid`'s region back into a
    /// cursor. Inverse of `resume_ptr`, used when the preempted process's
    /// stack position is persisted into its table slot.
    pub fn cursor_of(&self, pid: ProcessId, sp: *const u32) -> StackCursor {
        let base = self.regions[pid].0.as_ptr() as usize;
        let offset = (sp as usize).wrapping_sub(base);
        debug_assert!(offset <= STACK_SIZE, "stack pointer outside region");
        StackCursor(offset as u16)
    }
}

// ---------------------------------------------------------------------------
// Initial frame seeding
// ---------------------------------------------------------------------------

/// Write the initial context frame for a never-yet-run process at the top
/// of `region` and return the resulting cursor.
///
/// On first dispatch the restore path pops this frame exactly as if the
/// process had been preempted at its entry point with a zeroed register
/// file: PendSV pops the zeroed R4–R11 block, exception return consumes
/// the hardware frame and resumes at `entry`. If the program ever returns,
/// control falls into `exit_hook`.
pub fn seed_initial_frame(
    region: &mut [u8; STACK_SIZE],
    entry: ProgramEntry,
    exit_hook: ProgramEntry,
) -> StackCursor {
    let base = STACK_SIZE - CONTEXT_FRAME_BYTES;

    // Zeroed placeholders for R4-R11, R0-R3 and R12.
    for word in 0..13 {
        put_word(region, base + word * 4, 0);
    }
    put_word(region, base + 13 * 4, exit_hook as usize as u32); // LR
    put_word(region, base + 14 * 4, entry as usize as u32); // PC
    put_word(region, base + 15 * 4, XPSR_INITIAL); // xPSR

    StackCursor(base as u16)
}

#[inline]
fn put_word(region: &mut [u8; STACK_SIZE], offset: usize, value: u32) {
    region[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
fn get_word(region: &[u8; STACK_SIZE], offset: usize) -> u32 {
    u32::from_le_bytes(region[offset..offset + 4].try_into().unwrap())
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
