//! # Status Display Interface
//!
//! Operator feedback only. Nothing in the control software depends on a display succeeding, so
//! the methods cannot fail.

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait StatusDisplay {
    /// Replace the whole display with the given text.
    fn print_status(&mut self, text: &str);

    /// Write text into a region of the display starting at the given column and row, leaving the
    /// rest of the display untouched.
    fn print_variable_region(&mut self, text: &str, col: u8, row: u8);
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A display which discards everything written to it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl StatusDisplay for NullDisplay {
    fn print_status(&mut self, _text: &str) {}

    fn print_variable_region(&mut self, _text: &str, _col: u8, _row: u8) {}
}
