//! # Button Input
//!
//! Reads the four board buttons in a clean logical format. The hardware
//! wires the buttons to bits 0, 1, 6 and 7 of the port, active-low, with
//! the middle bits taken by the debug interface. The decoder inverts the
//! raw value and compacts the two high buttons down into bits 2 and 3, so
//! callers see a contiguous four-bit mask.
//!
//! ```text
//! port bit:   7    6    5..2    1     0
//! button:    Esc   Up   (n/c)  Down  Enter
//! logical:  bit 3 bit 2        bit 1 bit 0
//! ```

use crate::arch::Platform;

bitflags::bitflags! {
    /// Logical button state, one bit per button, 1 = pressed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Buttons: u8 {
        const ENTER = 1 << 0;
        const DOWN  = 1 << 1;
        const UP    = 1 << 2;
        const ESC   = 1 << 3;
    }
}

/// Decode a raw active-low port value into the logical button mask.
pub fn decode(raw: u8) -> Buttons {
    // Pressed = 0 in the port register, so flip everything and drop the
    // four middle pins, which are not connected to buttons.
    let pressed = !raw & 0b1100_0011;
    // Compact the two high buttons (Up, Esc) into bits 2 and 3.
    let high = (pressed & 0b1100_0000) >> 4;
    Buttons::from_bits_truncate((pressed & 0b0000_0011) | high)
}

/// Sample the button port and return the logical button state.
pub fn read<P: Platform>(platform: &mut P) -> Buttons {
    decode(platform.read_raw_buttons())
}

/// Busy-poll until no button is pressed. Yields to the scheduler only via
/// the preemption tick, never explicitly.
pub fn wait_for_no_input<P: Platform>(platform: &mut P) {
    while !read(platform).is_empty() {}
}

/// Busy-poll until at least one button is pressed.
pub fn wait_for_input<P: Platform>(platform: &mut P) {
    while read(platform).is_empty() {}
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
