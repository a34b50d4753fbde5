// Viewer header: accent stripe with title, source line, then the address
// and size line just above the row window.

use core::fmt::{self, Write};

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::MonoTextStyleBuilder;
use embedded_graphics::mono_font::iso_8859_1::{FONT_6X9, FONT_7X13_BOLD};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle};
use embedded_graphics::text::{Baseline, Text};
use embedded_storage::ReadStorage;

use super::render::text_style;
use crate::drivers::flash::PartitionByteSource;
use crate::drivers::storage::{FileByteSource, FileHandle, Medium};
use crate::ui::{Region, Screen, StackFmt, stack_fmt};

pub const STRIPE_TOP: i32 = 10;
pub const STRIPE_LINES: u8 = 15;
pub const TITLE_POS: Point = Point::new(10, 10);
pub const SUBTITLE_POS: Point = Point::new(0, 30);
pub const ADDRESS_POS: Point = Point::new(0, 40);
pub const SIZE_POS: Point = Point::new(224, 40);

const SUBTITLE_LINE: Region = Region::new(0, 30, 320, 10);

/// Stripe color family, one per origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accent {
    Blue,
    Green,
    Amber,
}

impl Accent {
    // stripe line `i` (1..=15) brightens toward the bottom
    pub fn shade(self, i: u8) -> Rgb565 {
        let v = i.saturating_mul(2);
        match self {
            Accent::Blue => Rgb565::new(0, 0, v),
            Accent::Green => Rgb565::new(0, v, 0),
            Accent::Amber => Rgb565::new(v, v, 0),
        }
    }
}

/// What the header says about the open source.
pub trait Banner {
    /// Short origin tag for the title, e.g. "SDCard".
    fn origin(&self) -> &'static str;

    fn accent(&self) -> Accent;

    /// One-line description under the title.
    fn describe(&self, out: &mut dyn Write) -> fmt::Result;
}

impl<F: FileHandle> Banner for FileByteSource<F> {
    fn origin(&self) -> &'static str {
        self.medium().label()
    }

    fn accent(&self) -> Accent {
        match self.medium() {
            Medium::SdCard => Accent::Blue,
            Medium::InternalFlash => Accent::Green,
        }
    }

    fn describe(&self, out: &mut dyn Write) -> fmt::Result {
        out.write_str(self.path())
    }
}

impl<S: ReadStorage> Banner for PartitionByteSource<'_, S> {
    fn origin(&self) -> &'static str {
        "FLASH"
    }

    fn accent(&self) -> Accent {
        Accent::Amber
    }

    fn describe(&self, out: &mut dyn Write) -> fmt::Result {
        let p = self.partition();
        write!(out, "0x{:x}:{}", p.offset, p.label())?;
        if p.encrypted {
            out.write_str(" encrypted")?;
        }
        Ok(())
    }
}

pub fn title_text<B: Banner + ?Sized>(banner: &B) -> StackFmt<40> {
    stack_fmt(|w| {
        let _ = write!(w, "Binary Viewer ({})", banner.origin());
    })
}

pub fn subtitle_text<B: Banner + ?Sized>(banner: &B) -> StackFmt<64> {
    stack_fmt(|w| {
        let _ = banner.describe(w);
    })
}

fn title_style() -> MonoTextStyle<'static, Rgb565> {
    MonoTextStyleBuilder::new()
        .font(&FONT_7X13_BOLD)
        .text_color(Rgb565::WHITE)
        .build()
}

pub fn draw_banner<D, B>(screen: &mut D, banner: &B) -> Result<(), D::Error>
where
    D: Screen,
    B: Banner + ?Sized,
{
    let right = screen.width() as i32 - 1;
    let accent = banner.accent();
    for i in 1..=STRIPE_LINES {
        let y = STRIPE_TOP + i as i32;
        Line::new(Point::new(0, y), Point::new(right, y))
            .into_styled(PrimitiveStyle::with_stroke(accent.shade(i), 1))
            .draw(screen)?;
    }

    Text::with_baseline(
        title_text(banner).as_str(),
        TITLE_POS,
        title_style(),
        Baseline::Top,
    )
    .draw(screen)?;

    screen.fill_solid(&SUBTITLE_LINE.to_rect(), Rgb565::BLACK)?;
    Text::with_baseline(
        subtitle_text(banner).as_str(),
        SUBTITLE_POS,
        text_style(),
        Baseline::Top,
    )
    .draw(screen)?;
    Ok(())
}

pub fn draw_address<D: Screen>(screen: &mut D, address: u32) -> Result<(), D::Error> {
    let text: StackFmt<10> = stack_fmt(|w| {
        let _ = write!(w, "0x{:08X}", address);
    });
    let style = MonoTextStyleBuilder::new()
        .font(&FONT_6X9)
        .text_color(Rgb565::YELLOW)
        .background_color(Rgb565::BLACK)
        .build();
    Text::with_baseline(text.as_str(), ADDRESS_POS, style, Baseline::Top).draw(screen)?;
    Ok(())
}

pub fn draw_size<D: Screen>(screen: &mut D, len: u32) -> Result<(), D::Error> {
    let text: StackFmt<16> = stack_fmt(|w| {
        let _ = write!(w, "size:{:>9}", len);
    });
    Text::with_baseline(text.as_str(), SIZE_POS, text_style(), Baseline::Top).draw(screen)?;
    Ok(())
}
