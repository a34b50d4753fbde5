// ILI9342C TFT driver (320x240, native landscape, RGB565)
// The controller keeps its own frame memory; fills are streamed into an
// address window. Vertical scroll works on frame-memory lines: the panel
// shows a fixed top band, a rotating middle band starting at VSCRSADD,
// and a fixed bottom band. Drawing always addresses frame memory, so a
// scrolled band shows memory line `start + i` on screen line `top + i`.

use core::convert::Infallible;

use embedded_graphics_core::Pixel;
use embedded_graphics_core::draw_target::DrawTarget;
use embedded_graphics_core::geometry::{Dimensions, OriginDimensions, Size};
use embedded_graphics_core::pixelcolor::Rgb565;
use embedded_graphics_core::pixelcolor::raw::{RawData, RawU16};
use embedded_graphics_core::primitives::{PointsIter, Rectangle};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;

use crate::ui::Screen;

pub const WIDTH: u16 = 320;
pub const HEIGHT: u16 = 240;

// pixels per SPI burst
const CHUNK_PIXELS: usize = 64;

mod cmd {
    pub const SW_RESET: u8 = 0x01;
    pub const SLEEP_OUT: u8 = 0x11;
    pub const INVERT_ON: u8 = 0x21;
    pub const DISPLAY_ON: u8 = 0x29;
    pub const COLUMN_ADDR: u8 = 0x2A;
    pub const PAGE_ADDR: u8 = 0x2B;
    pub const MEMORY_WRITE: u8 = 0x2C;
    pub const SCROLL_DEFINE: u8 = 0x33; // VSCRDEF
    pub const MEMORY_ACCESS: u8 = 0x36; // MADCTL
    pub const SCROLL_START: u8 = 0x37; // VSCRSADD
    pub const PIXEL_FORMAT: u8 = 0x3A; // COLMOD
}

// MADCTL: BGR panel order, no rotation (the ILI9342C is landscape native)
const MADCTL_BGR: u8 = 0x08;
// COLMOD: 16 bits per pixel on the MCU interface
const COLMOD_RGB565: u8 = 0x55;

pub struct Ili9342<SPI, DC, RST> {
    spi: SPI,
    dc: DC,
    rst: RST,
    invert: bool,
}

impl<SPI, DC, RST> Ili9342<SPI, DC, RST>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
{
    pub fn new(spi: SPI, dc: DC, rst: RST) -> Self {
        Self {
            spi,
            dc,
            rst,
            invert: true,
        }
    }

    // M5Stack-style IPS panels need inversion on; plain TN panels do not
    pub fn with_inversion(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn reset<D: DelayNs>(&mut self, delay: &mut D) {
        let _ = self.rst.set_high();
        delay.delay_ms(5);
        let _ = self.rst.set_low();
        delay.delay_ms(20);
        let _ = self.rst.set_high();
        delay.delay_ms(150);
    }

    pub fn init<D: DelayNs>(&mut self, delay: &mut D) {
        self.reset(delay);

        self.send_command(cmd::SW_RESET);
        delay.delay_ms(120);

        self.send_command(cmd::SLEEP_OUT);
        delay.delay_ms(120);

        self.send_command(cmd::PIXEL_FORMAT);
        self.send_data(&[COLMOD_RGB565]);

        self.send_command(cmd::MEMORY_ACCESS);
        self.send_data(&[MADCTL_BGR]);

        if self.invert {
            self.send_command(cmd::INVERT_ON);
        }

        self.define_scroll(0, HEIGHT, 0);
        self.scroll_to(0);

        self.send_command(cmd::DISPLAY_ON);
        delay.delay_ms(20);
    }

    // ── Scroll registers ────────────────────────────────────

    fn define_scroll(&mut self, top_fixed: u16, scroll_lines: u16, bottom_fixed: u16) {
        self.send_command(cmd::SCROLL_DEFINE);
        self.send_data(&[
            (top_fixed >> 8) as u8,
            top_fixed as u8,
            (scroll_lines >> 8) as u8,
            scroll_lines as u8,
            (bottom_fixed >> 8) as u8,
            bottom_fixed as u8,
        ]);
    }

    fn scroll_to(&mut self, line: u16) {
        self.send_command(cmd::SCROLL_START);
        self.send_data(&[(line >> 8) as u8, line as u8]);
    }

    // ── Window streaming ────────────────────────────────────

    // inclusive frame-memory window, then RAMWR
    fn set_window(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) {
        self.send_command(cmd::COLUMN_ADDR);
        self.send_data(&[(x0 >> 8) as u8, x0 as u8, (x1 >> 8) as u8, x1 as u8]);
        self.send_command(cmd::PAGE_ADDR);
        self.send_data(&[(y0 >> 8) as u8, y0 as u8, (y1 >> 8) as u8, y1 as u8]);
        self.send_command(cmd::MEMORY_WRITE);
    }

    fn stream_pixels<I>(&mut self, colors: I)
    where
        I: IntoIterator<Item = Rgb565>,
    {
        let mut buf = [0u8; CHUNK_PIXELS * 2];
        let mut n = 0;
        for color in colors {
            let raw = RawU16::from(color).into_inner();
            buf[n] = (raw >> 8) as u8;
            buf[n + 1] = raw as u8;
            n += 2;
            if n == buf.len() {
                self.send_data(&buf);
                n = 0;
            }
        }
        if n > 0 {
            self.send_data(&buf[..n]);
        }
    }

    // area clipped to the panel; None when nothing is visible
    fn clip(&self, area: &Rectangle) -> Option<(u16, u16, u16, u16)> {
        let clipped = area.intersection(&self.bounding_box());
        let br = clipped.bottom_right()?;
        Some((
            clipped.top_left.x as u16,
            clipped.top_left.y as u16,
            br.x as u16,
            br.y as u16,
        ))
    }

    // ── Low-level SPI ───────────────────────────────────────

    fn send_command(&mut self, cmd: u8) {
        let _ = self.dc.set_low();
        let _ = self.spi.write(&[cmd]);
        let _ = self.dc.set_high();
    }

    fn send_data(&mut self, data: &[u8]) {
        let _ = self.dc.set_high();
        let _ = self.spi.write(data);
    }
}

impl<SPI, DC, RST> OriginDimensions for Ili9342<SPI, DC, RST> {
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, HEIGHT as u32)
    }
}

impl<SPI, DC, RST> DrawTarget for Ili9342<SPI, DC, RST>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
{
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let bounds = self.bounding_box();
        for Pixel(point, color) in pixels {
            if !bounds.contains(point) {
                continue;
            }
            let (x, y) = (point.x as u16, point.y as u16);
            self.set_window(x, y, x, y);
            self.stream_pixels([color]);
        }
        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        if area.intersection(&self.bounding_box()) != *area {
            // partially off-panel: fall back to per-pixel clipping
            return self.draw_iter(
                area.points()
                    .zip(colors)
                    .map(|(point, color)| Pixel(point, color)),
            );
        }

        if let Some((x0, y0, x1, y1)) = self.clip(area) {
            self.set_window(x0, y0, x1, y1);
            let count = area.size.width as usize * area.size.height as usize;
            self.stream_pixels(colors.into_iter().take(count));
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        if let Some((x0, y0, x1, y1)) = self.clip(area) {
            self.set_window(x0, y0, x1, y1);
            let count = (x1 - x0 + 1) as usize * (y1 - y0 + 1) as usize;
            self.stream_pixels(core::iter::repeat_n(color, count));
        }
        Ok(())
    }
}

impl<SPI, DC, RST> Screen for Ili9342<SPI, DC, RST>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
{
    fn has_vertical_scroll(&self) -> bool {
        true
    }

    fn set_scroll_band(&mut self, top_fixed: u16, bottom_fixed: u16) -> Result<(), Self::Error> {
        let top = top_fixed.min(HEIGHT);
        let bottom = bottom_fixed.min(HEIGHT - top);
        self.define_scroll(top, HEIGHT - top - bottom, bottom);
        Ok(())
    }

    fn set_scroll_start(&mut self, line: u16) -> Result<(), Self::Error> {
        self.scroll_to(line.min(HEIGHT - 1));
        Ok(())
    }
}
