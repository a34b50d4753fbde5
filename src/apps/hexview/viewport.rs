// Scroll position in 16-byte rows.
//
// first_row stays in 0..=max(0, total_rows - rows_per_screen) and moves by
// exactly one per accepted command. Commands past either end are absorbed.

use crate::apps::Nav;
use crate::drivers::source::{ROW_BYTES, row_count};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    first_row: u32,
    rows_per_screen: u32,
    total_rows: u32,
}

impl Viewport {
    pub fn new(len: u32, rows_per_screen: u32) -> Self {
        Self {
            first_row: 0,
            rows_per_screen: rows_per_screen.max(1),
            total_rows: row_count(len),
        }
    }

    #[inline]
    pub fn first_row(&self) -> u32 {
        self.first_row
    }

    #[inline]
    pub fn rows_per_screen(&self) -> u32 {
        self.rows_per_screen
    }

    #[inline]
    pub fn total_rows(&self) -> u32 {
        self.total_rows
    }

    pub fn max_first_row(&self) -> u32 {
        self.total_rows.saturating_sub(self.rows_per_screen)
    }

    // byte address of the top visible row
    #[inline]
    pub fn address(&self) -> u32 {
        self.first_row.saturating_mul(ROW_BYTES as u32)
    }

    /// Apply one command; `Some` only when the window actually moved.
    pub fn apply(&mut self, nav: Nav) -> Option<Direction> {
        match nav {
            Nav::Next if self.first_row + self.rows_per_screen < self.total_rows => {
                self.first_row += 1;
                Some(Direction::Forward)
            }
            Nav::Prev if self.first_row > 0 => {
                self.first_row -= 1;
                Some(Direction::Backward)
            }
            _ => None,
        }
    }
}
