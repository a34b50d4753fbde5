// Row formatting and the two redraw strategies.
//
// Row layout (x in px, 6x9 font, row drawn at y, text at y + 1):
//   0..222    16 hex cells, 14 px pitch ("41" + 2 px gap)
//   110, 222  separator lines (after byte 7, after byte 15)
//   224..320  16 glyph cells, 6 px pitch
//
// A row draw fully determines its slot (tail cleared, separators redrawn,
// cells painted with background), so incremental and full redraw agree
// pixel for pixel.
//
// Incremental mode: content row r lives in frame-memory slot
// r % rows_per_screen; the scroll pointer sits on the slot of first_row.

use core::fmt::Write;

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::MonoTextStyleBuilder;
use embedded_graphics::mono_font::iso_8859_1::FONT_6X9;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};
use log::{info, warn};

use super::viewport::Direction;
use super::{RedrawMode, ViewerConfig};
use crate::drivers::source::{ByteSource, ROW_BYTES, RowBuf};
use crate::ui::{Screen, StackFmt, stack_fmt};

pub const HEX_PITCH: i32 = 14;
pub const GLYPH_X: i32 = 224;
pub const GLYPH_PITCH: i32 = 6;
pub const SEPARATOR_X: [i32; 2] = [110, 222];
pub const SEPARATOR_COLOR: Rgb565 = Rgb565::new(16, 32, 16);

const TEXT_DY: i32 = 1;
const CELL_W: u32 = 6;
const CELL_H: u32 = 9;

// bytes at or below space get a blank glyph cell
const GLYPH_THRESHOLD: u8 = 0x20;
// DEL and the C1 controls have no glyph in the Latin-1 font
const NO_GLYPH: core::ops::RangeInclusive<u8> = 0x7F..=0x9F;

pub(crate) fn text_style() -> MonoTextStyle<'static, Rgb565> {
    MonoTextStyleBuilder::new()
        .font(&FONT_6X9)
        .text_color(Rgb565::WHITE)
        .background_color(Rgb565::BLACK)
        .build()
}

/// The valid bytes of one row and how they print.
pub struct RowCells<'a> {
    bytes: &'a RowBuf,
    n: usize,
}

impl<'a> RowCells<'a> {
    pub fn new(bytes: &'a RowBuf, n: usize) -> Self {
        Self {
            bytes,
            n: n.min(ROW_BYTES),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn hex(&self, i: usize) -> Option<StackFmt<2>> {
        let b = *self.bytes[..self.n].get(i)?;
        Some(stack_fmt(|w| {
            let _ = write!(w, "{:02X}", b);
        }))
    }

    // Latin-1 glyph, None for blanked cells and the unwritten tail
    pub fn glyph(&self, i: usize) -> Option<char> {
        let b = *self.bytes[..self.n].get(i)?;
        (b > GLYPH_THRESHOLD && !NO_GLYPH.contains(&b)).then(|| char::from(b))
    }
}

/// Paint one formatted row with its top edge at frame-memory line `y`.
pub fn draw_cells<D: Screen>(screen: &mut D, y: i32, row_h: u16, cells: &RowCells) -> Result<(), D::Error> {
    let n = cells.len() as i32;
    let width = screen.width() as i32;

    if cells.len() < ROW_BYTES {
        let x = n * HEX_PITCH;
        screen.fill_solid(
            &Rectangle::new(
                Point::new(x, y),
                Size::new((width - x).max(0) as u32, row_h as u32),
            ),
            Rgb565::BLACK,
        )?;
    }

    let sep = PrimitiveStyle::with_stroke(SEPARATOR_COLOR, 1);
    for x in SEPARATOR_X {
        Line::new(Point::new(x, y), Point::new(x, y + row_h as i32 - 1))
            .into_styled(sep)
            .draw(screen)?;
    }

    let style = text_style();
    let mut glyph = [0u8; 4];
    for i in 0..cells.len() {
        if let Some(hex) = cells.hex(i) {
            Text::with_baseline(
                hex.as_str(),
                Point::new(i as i32 * HEX_PITCH, y + TEXT_DY),
                style,
                Baseline::Top,
            )
            .draw(screen)?;
        }

        let at = Point::new(GLYPH_X + i as i32 * GLYPH_PITCH, y + TEXT_DY);
        match cells.glyph(i) {
            Some(c) => {
                Text::with_baseline(c.encode_utf8(&mut glyph), at, style, Baseline::Top)
                    .draw(screen)?;
            }
            None => {
                screen.fill_solid(&Rectangle::new(at, Size::new(CELL_W, CELL_H)), Rgb565::BLACK)?;
            }
        }
    }
    Ok(())
}

/// Draws the row window; owns only the scroll-engaged flag.
pub struct LineRenderer {
    rows: u32,
    row_h: u16,
    header_h: u16,
    footer_h: u16,
    incremental: bool,
}

impl LineRenderer {
    pub fn new(cfg: &ViewerConfig) -> Self {
        Self {
            rows: cfg.rows_per_screen.max(1),
            row_h: cfg.row_height,
            header_h: cfg.header_height,
            footer_h: cfg.footer_height,
            incremental: false,
        }
    }

    #[inline]
    pub fn is_incremental(&self) -> bool {
        self.incremental
    }

    /// Pick the redraw strategy and program the scroll band if it is used.
    pub fn engage<D: Screen>(&mut self, screen: &mut D, mode: RedrawMode) -> Result<(), D::Error> {
        let band = screen
            .height()
            .saturating_sub(self.header_h.saturating_add(self.footer_h));
        let window = self.rows * self.row_h as u32;

        self.incremental = false;
        if mode == RedrawMode::Auto && screen.has_vertical_scroll() {
            if window == band as u32 {
                self.incremental = true;
            } else {
                warn!(
                    "hexview: scroll band {} px != {} rows x {} px, full repaint",
                    band, self.rows, self.row_h
                );
            }
        }

        if self.incremental {
            screen.set_scroll_band(self.header_h, self.footer_h)?;
            screen.set_scroll_start(self.header_h)?;
        }
        info!(
            "hexview: {} redraw",
            if self.incremental { "incremental" } else { "full" }
        );
        Ok(())
    }

    // frame-memory slot holding content row `row` while `first` is on top
    #[inline]
    fn slot(&self, row: u32, first: u32) -> u32 {
        if self.incremental {
            row % self.rows
        } else {
            row - first
        }
    }

    #[inline]
    fn slot_y(&self, slot: u32) -> i32 {
        self.header_h as i32 + (slot * self.row_h as u32) as i32
    }

    fn scroll_pointer(&self, first: u32) -> u16 {
        self.header_h + ((first % self.rows) * self.row_h as u32) as u16
    }

    pub fn draw_row<D, S>(&self, screen: &mut D, source: &mut S, row: u32, first: u32) -> Result<(), D::Error>
    where
        D: Screen,
        S: ByteSource + ?Sized,
    {
        let mut buf: RowBuf = [0u8; ROW_BYTES];
        let n = match row.checked_mul(ROW_BYTES as u32) {
            Some(address) => source.read(address, &mut buf),
            None => 0,
        };
        let y = self.slot_y(self.slot(row, first));
        draw_cells(screen, y, self.row_h, &RowCells::new(&buf, n))
    }

    /// Redraw every visible row for `first`.
    pub fn repaint<D, S>(&self, screen: &mut D, source: &mut S, first: u32) -> Result<(), D::Error>
    where
        D: Screen,
        S: ByteSource + ?Sized,
    {
        if self.incremental {
            screen.set_scroll_start(self.scroll_pointer(first))?;
        }
        for i in 0..self.rows {
            self.draw_row(screen, source, first + i, first)?;
        }
        Ok(())
    }

    /// The window moved by one row to `first`.
    pub fn scroll<D, S>(
        &self,
        screen: &mut D,
        source: &mut S,
        first: u32,
        dir: Direction,
    ) -> Result<(), D::Error>
    where
        D: Screen,
        S: ByteSource + ?Sized,
    {
        if !self.incremental {
            return self.repaint(screen, source, first);
        }

        screen.set_scroll_start(self.scroll_pointer(first))?;
        // leading edge in the direction of motion
        let exposed = match dir {
            Direction::Forward => first + self.rows - 1,
            Direction::Backward => first,
        };
        self.draw_row(screen, source, exposed, first)
    }

    /// Back to a neutral, whole-screen scroll state.
    pub fn disengage<D: Screen>(&mut self, screen: &mut D) -> Result<(), D::Error> {
        if screen.has_vertical_scroll() {
            screen.reset_scroll()?;
        }
        self.incremental = false;
        Ok(())
    }
}
