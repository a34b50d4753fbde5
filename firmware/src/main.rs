// hexpeek entry point and main loop
//
// Boot sequence: hardware -> panel -> launcher list (flash + SD root)
// Main loop: poll buttons -> debounce -> Action -> launcher or viewer
//
// The viewer runs in its own loop until Back; its source borrows the
// SD volume or the flash chip only for that run. A source that fails to
// open leaves a message on the launcher instead.

#![no_std]
#![no_main]

mod board;

use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::time::Instant;
use log::{info, warn};

use hexpeek::apps::hexview::{Banner, BinaryViewer, ViewerConfig};
use hexpeek::apps::launcher::{Launch, Launcher};
use hexpeek::apps::{Action, Nav};
use hexpeek::drivers::input::Debouncer;
use hexpeek::drivers::sdcard::{DirEntry, SdFilesystem, list_root};
use hexpeek::drivers::source::ByteSource;

use board::{Board, Buttons, FLASH_LAYOUT, Lcd};

esp_bootloader_esp_idf::esp_app_desc!();

const POLL_MS: u32 = 10;
const ROOT_ENTRIES: usize = 24;

fn now_ms() -> u64 {
    Instant::now().duration_since_epoch().as_millis()
}

fn poll_action(buttons: &Buttons, input: &mut Debouncer) -> Option<Action> {
    input
        .poll(buttons.read(), now_ms())
        .and_then(Action::from_event)
}

// until Back; the source is released when the viewer is closed
fn run_viewer<S: ByteSource + Banner>(
    mut viewer: BinaryViewer<S>,
    lcd: &mut Lcd,
    buttons: &Buttons,
    input: &mut Debouncer,
    delay: &mut Delay,
) {
    let Ok(()) = viewer.setup(lcd);
    loop {
        let nav = match poll_action(buttons, input) {
            Some(Action::Back) => break,
            Some(action) => action.nav(),
            None => Nav::None,
        };
        let Ok(_) = viewer.step(nav, lcd, delay);
    }
    let Ok(()) = viewer.close(lcd);
}

#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger_from_env();
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    info!("booting...");

    let mut board = Board::init(peripherals);
    let mut delay = Delay::new();
    board.lcd.init(&mut delay);
    info!("hardware initialized.");

    let mut launcher = Launcher::new();
    if let Err(e) = launcher.load_flash(&mut board.flash, &FLASH_LAYOUT) {
        warn!("partition table: {}", e);
        launcher.set_message(format_args!("flash: {}", e));
    }

    let sd = SdFilesystem::new(&board.sd);
    if sd.is_mounted() {
        let mut entries = [DirEntry::EMPTY; ROOT_ENTRIES];
        match list_root(&board.sd, &mut entries) {
            Ok(n) => launcher.add_files(&entries[..n]),
            Err(e) => warn!("sd: {}", e),
        }
    } else {
        info!("no SD volume");
    }

    let mut input = Debouncer::new();
    let Ok(()) = launcher.draw(&mut board.lcd);
    info!("ui ready.");

    loop {
        let Some(action) = poll_action(&board.buttons, &mut input) else {
            delay.delay_millis(POLL_MS);
            continue;
        };

        match launcher.handle(action) {
            None => {}
            Some(Launch::Flash(selector)) => {
                match BinaryViewer::open_partition(
                    &mut board.flash,
                    selector,
                    &FLASH_LAYOUT,
                    ViewerConfig::default(),
                ) {
                    Ok(viewer) => {
                        run_viewer(viewer, &mut board.lcd, &board.buttons, &mut input, &mut delay)
                    }
                    Err(e) => launcher.set_message(format_args!("flash: {}", e)),
                }
            }
            Some(Launch::File(item)) => {
                match BinaryViewer::open_file(&sd, item.label(), ViewerConfig::default()) {
                    Ok(viewer) => {
                        run_viewer(viewer, &mut board.lcd, &board.buttons, &mut input, &mut delay)
                    }
                    Err(e) => launcher.set_message(format_args!("{}: {}", item.label(), e)),
                }
            }
        }

        let Ok(()) = launcher.draw(&mut board.lcd);
    }
}
