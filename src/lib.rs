// hexpeek: a hex + glyph byte viewer for SD files and raw flash regions
// on a 320x240 SPI TFT (ESP32-C3 board in firmware/).
//
// Everything here is board-independent and builds on the host for tests;
// the firmware crate supplies the panel, SD card, flash and buttons.

#![cfg_attr(not(test), no_std)]

pub mod apps;
pub mod drivers;
pub mod ui;

#[cfg(test)]
mod testutil;
