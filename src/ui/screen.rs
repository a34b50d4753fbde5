// Display capability seam.
//
// Everything the viewer draws goes through embedded-graphics; the only
// extra is the optional hardware vertical-scroll band found on MIPI-DCS
// TFT controllers (VSCRDEF / VSCRSADD). Panels without it keep the
// defaults and get full repaints.

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;

pub trait Screen: DrawTarget<Color = Rgb565> {
    fn has_vertical_scroll(&self) -> bool {
        false
    }

    /// Split the panel into a fixed top band, a scrolling middle band and
    /// a fixed bottom band (heights in pixel lines).
    fn set_scroll_band(&mut self, _top_fixed: u16, _bottom_fixed: u16) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Frame-memory line shown at the top of the scrolling band.
    fn set_scroll_start(&mut self, _line: u16) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Back to an unscrolled, whole-screen band so later screens draw
    /// where they expect to.
    fn reset_scroll(&mut self) -> Result<(), Self::Error> {
        self.set_scroll_band(0, 0)?;
        self.set_scroll_start(0)
    }

    fn height(&self) -> u16 {
        self.bounding_box().size.height as u16
    }

    fn width(&self) -> u16 {
        self.bounding_box().size.width as u16
    }
}
