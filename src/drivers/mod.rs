// Hardware drivers and data sources, board-independent.
//
// Chip drivers are generic over embedded-hal traits; pin assignments
// and bus wiring live in the firmware crate.

pub mod flash;
pub mod ili9342;
pub mod input;
pub mod partition;
pub mod sdcard;
pub mod source;
pub mod storage;
