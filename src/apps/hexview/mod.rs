// Binary viewer: a 16-byte-per-row hex + glyph window over a ByteSource,
// scrolled one row per command.
//
// Lifecycle: construct over an opened source (the fallible part), `setup`
// once, `step` per loop iteration, `close` to restore the panel. The
// source is owned by the viewer and released when it is closed or dropped.

pub mod banner;
pub mod render;
pub mod viewport;

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_hal::delay::DelayNs;
use embedded_storage::ReadStorage;
use log::info;

use crate::apps::{Nav, Step};
use crate::drivers::flash::PartitionByteSource;
use crate::drivers::partition::{FlashLayout, ResolveError, Selector};
use crate::drivers::source::ByteSource;
use crate::drivers::storage::{FileByteSource, FileHandle, Filesystem, OpenError};
use crate::ui::Screen;

pub use banner::{Accent, Banner};
pub use render::{LineRenderer, RowCells};
pub use viewport::{Direction, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawMode {
    /// Incremental when the panel has a matching scroll band.
    Auto,
    FullRepaint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerConfig {
    pub rows_per_screen: u32,
    pub row_height: u16,
    pub header_height: u16,
    pub footer_height: u16,
    pub redraw: RedrawMode,
    /// Yield on the no-command path.
    pub idle_ms: u32,
}

impl Default for ViewerConfig {
    // 320x240: 50 px header, 17 rows of 10 px, 20 px footer
    fn default() -> Self {
        Self {
            rows_per_screen: 17,
            row_height: 10,
            header_height: 50,
            footer_height: 20,
            redraw: RedrawMode::Auto,
            idle_ms: 10,
        }
    }
}

pub struct BinaryViewer<S> {
    source: S,
    viewport: Viewport,
    renderer: LineRenderer,
    config: ViewerConfig,
}

impl<F: FileHandle> BinaryViewer<FileByteSource<F>> {
    pub fn open_file<FS>(fs: &FS, path: &str, config: ViewerConfig) -> Result<Self, OpenError>
    where
        FS: Filesystem<File = F>,
    {
        Ok(Self::new(FileByteSource::open(fs, path)?, config))
    }
}

impl<'a, S: ReadStorage> BinaryViewer<PartitionByteSource<'a, S>> {
    pub fn open_partition(
        flash: &'a mut S,
        selector: Selector,
        layout: &FlashLayout,
        config: ViewerConfig,
    ) -> Result<Self, ResolveError> {
        Ok(Self::new(
            PartitionByteSource::open(flash, selector, layout)?,
            config,
        ))
    }
}

impl<S: ByteSource + Banner> BinaryViewer<S> {
    pub fn new(source: S, config: ViewerConfig) -> Self {
        Self {
            viewport: Viewport::new(source.len(), config.rows_per_screen),
            renderer: LineRenderer::new(&config),
            source,
            config,
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn is_incremental(&self) -> bool {
        self.renderer.is_incremental()
    }

    /// Choose the redraw mode and paint header, window and address.
    pub fn setup<D: Screen>(&mut self, screen: &mut D) -> Result<(), D::Error> {
        self.renderer.engage(screen, self.config.redraw)?;
        screen.clear(Rgb565::BLACK)?;
        banner::draw_banner(screen, &self.source)?;
        self.renderer
            .repaint(screen, &mut self.source, self.viewport.first_row())?;
        banner::draw_address(screen, self.viewport.address())?;
        banner::draw_size(screen, self.source.len())?;
        info!(
            "hexview: {} bytes, {} rows",
            self.source.len(),
            self.viewport.total_rows()
        );
        Ok(())
    }

    /// Apply one command. Absorbed commands and `Nav::None` idle for
    /// `idle_ms` and draw nothing.
    pub fn step<D, T>(&mut self, nav: Nav, screen: &mut D, delay: &mut T) -> Result<Step, D::Error>
    where
        D: Screen,
        T: DelayNs,
    {
        let Some(dir) = self.viewport.apply(nav) else {
            delay.delay_ms(self.config.idle_ms);
            return Ok(Step::Idle);
        };

        self.renderer
            .scroll(screen, &mut self.source, self.viewport.first_row(), dir)?;
        banner::draw_address(screen, self.viewport.address())?;
        Ok(Step::Scrolled)
    }

    /// Reset the scroll hardware and release the source.
    pub fn close<D: Screen>(mut self, screen: &mut D) -> Result<(), D::Error> {
        self.renderer.disengage(screen)?;
        info!("hexview: closed at 0x{:08X}", self.viewport.address());
        Ok(())
    }
}
