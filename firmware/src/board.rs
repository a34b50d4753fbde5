//! ESP32-C3 + ILI9342C 320x240 TFT + microSD + three push buttons
//!
//! All pin assignments and bus clocks live here; the rest of the
//! firmware only sees named subsystems.
//!
//! Pin Map:
//! GPIO |     Function    |      Notes
//! -----+-----------------+----------------------------------
//!  0   | Button A        | Active LOW, internal pullup
//!  1   | Button B        | Active LOW, internal pullup
//!  2   | SD CS           | SD card chip select
//!  3   | Button C        | Active LOW, internal pullup
//!  4   | SPI2 SCK        | Shared SPI clock
//!  5   | SPI2 MISO       | SD card data out (panel is write-only)
//!  6   | SPI2 MOSI       | Shared SPI data out
//! 10   | LCD RST         | Reset (active low)
//! 20   | LCD CS          | Panel chip select
//! 21   | LCD DC          | Data/Command select

use core::cell::RefCell;

use embedded_hal_bus::spi::RefCellDevice;
use embedded_sdmmc::{SdCard, VolumeManager};
use esp_hal::{
    Blocking,
    delay::Delay,
    gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull},
    peripherals::Peripherals,
    spi,
    time::Rate,
};
use esp_storage::FlashStorage;
use log::{info, warn};
use static_cell::StaticCell;

use hexpeek::drivers::ili9342::Ili9342;
use hexpeek::drivers::input::Button;
use hexpeek::drivers::partition::FlashLayout;
use hexpeek::drivers::sdcard::{DummyTimeSource, Volumes};

// SD cards must be brought up at <= 400 kHz
pub const SD_INIT_FREQ_KHZ: u32 = 400;
// shared by panel and card once the card is in SPI mode
pub const BUS_FREQ_MHZ: u32 = 20;

pub const FLASH_LAYOUT: FlashLayout = FlashLayout::ESP32C3;

pub type SpiBus = spi::master::Spi<'static, Blocking>;
pub type SharedSpi = RefCellDevice<'static, SpiBus, Output<'static>, Delay>;

pub type Lcd = Ili9342<SharedSpi, Output<'static>, Output<'static>>;
pub type SdVolumes = Volumes<SdCard<SharedSpi, Delay>, DummyTimeSource>;

static SPI_BUS: StaticCell<RefCell<SpiBus>> = StaticCell::new();

pub struct Buttons {
    a: Input<'static>,
    b: Input<'static>,
    c: Input<'static>,
}

impl Buttons {
    pub fn read(&self) -> Option<Button> {
        Button::from_levels(self.a.is_low(), self.b.is_low(), self.c.is_low())
    }
}

pub struct Board {
    pub lcd: Lcd,
    pub sd: SdVolumes,
    pub flash: FlashStorage<'static>,
    pub buttons: Buttons,
}

impl Board {
    pub fn init(p: Peripherals) -> Self {
        let buttons = Buttons {
            a: Input::new(p.GPIO0, InputConfig::default().with_pull(Pull::Up)),
            b: Input::new(p.GPIO1, InputConfig::default().with_pull(Pull::Up)),
            c: Input::new(p.GPIO3, InputConfig::default().with_pull(Pull::Up)),
        };

        let lcd_cs = Output::new(p.GPIO20, Level::High, OutputConfig::default());
        let lcd_dc = Output::new(p.GPIO21, Level::High, OutputConfig::default());
        let lcd_rst = Output::new(p.GPIO10, Level::High, OutputConfig::default());
        let sd_cs = Output::new(p.GPIO2, Level::High, OutputConfig::default());

        let init_cfg =
            spi::master::Config::default().with_frequency(Rate::from_khz(SD_INIT_FREQ_KHZ));
        let spi_bus = spi::master::Spi::new(p.SPI2, init_cfg)
            .unwrap()
            .with_sck(p.GPIO4)
            .with_miso(p.GPIO5)
            .with_mosi(p.GPIO6);
        let bus: &'static RefCell<SpiBus> = SPI_BUS.init(RefCell::new(spi_bus));

        let sd_dev = RefCellDevice::new(bus, sd_cs, Delay::new()).unwrap();
        let lcd_dev = RefCellDevice::new(bus, lcd_cs, Delay::new()).unwrap();

        // probe before the clock goes up (CMD0, CMD8, ACMD41)
        let sdcard = SdCard::new(sd_dev, Delay::new());
        match sdcard.num_bytes() {
            Ok(bytes) => info!("SD card: {} bytes ({} MB)", bytes, bytes / 1024 / 1024),
            Err(e) => warn!("SD card probe failed: {:?}", e),
        }

        let run_cfg =
            spi::master::Config::default().with_frequency(Rate::from_mhz(BUS_FREQ_MHZ));
        if let Err(e) = bus.borrow_mut().apply_config(&run_cfg) {
            warn!("spi: keeping init clock: {:?}", e);
        }

        Board {
            lcd: Ili9342::new(lcd_dev, lcd_dc, lcd_rst),
            sd: VolumeManager::new(sdcard, DummyTimeSource),
            flash: FlashStorage::new(p.FLASH),
            buttons,
        }
    }
}
