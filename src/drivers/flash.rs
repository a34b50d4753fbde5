// Raw flash byte source over one resolved partition.
// Reads go straight to the flash chip; encrypted partitions come back
// as stored (no decryption here).

use embedded_storage::ReadStorage;
use log::{info, warn};

use super::partition::{self, FlashLayout, Partition, ResolveError, Selector};
use super::source::{ByteSource, RowBuf, clamp_read};

pub struct PartitionByteSource<'a, S: ReadStorage> {
    flash: &'a mut S,
    partition: Partition,
}

impl<'a, S: ReadStorage> PartitionByteSource<'a, S> {
    pub fn open(
        flash: &'a mut S,
        selector: Selector,
        layout: &FlashLayout,
    ) -> Result<Self, ResolveError> {
        let partition = partition::resolve(flash, selector, layout)?;
        info!(
            "flash region {} @ 0x{:08x}, {} bytes{}",
            partition.label(),
            partition.offset,
            partition.size,
            if partition.encrypted { " (encrypted)" } else { "" }
        );
        Ok(Self { flash, partition })
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }
}

impl<S: ReadStorage> ByteSource for PartitionByteSource<'_, S> {
    fn len(&self) -> u32 {
        self.partition.size
    }

    fn read(&mut self, address: u32, buf: &mut RowBuf) -> usize {
        let n = clamp_read(address, self.partition.size);
        if n == 0 {
            return 0;
        }
        let Some(at) = self.partition.offset.checked_add(address) else {
            return 0;
        };
        match self.flash.read(at, &mut buf[..n]) {
            Ok(()) => n,
            Err(_) => {
                warn!("flash read at 0x{:08x} failed", at);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::source::ROW_BYTES;
    use crate::testutil::{RamFlash, table_entry};

    fn flash() -> RamFlash {
        let mut flash = RamFlash::erased(0x20000);
        flash.write(0x8000, &table_entry(0x01, 0x81, 0x10000, 40, "data", 1));
        for i in 0..64u32 {
            flash.write(0x10000 + i as usize, &[i as u8]);
        }
        flash
    }

    #[test]
    fn reads_relative_to_partition_base() {
        let mut flash = flash();
        let mut src = PartitionByteSource::open(
            &mut flash,
            Selector::Lookup { kind: 0x01, subtype: 0x81 },
            &FlashLayout::ESP32C3,
        )
        .unwrap();
        assert_eq!(src.len(), 40);
        assert!(src.partition().encrypted);

        let mut buf = [0u8; ROW_BYTES];
        assert_eq!(src.read(16, &mut buf), 16);
        assert_eq!(buf[0], 16);
        assert_eq!(buf[15], 31);
    }

    #[test]
    fn tail_is_short_and_past_end_is_empty() {
        let mut flash = flash();
        let mut src = PartitionByteSource::open(
            &mut flash,
            Selector::Lookup { kind: 0x01, subtype: 0x81 },
            &FlashLayout::ESP32C3,
        )
        .unwrap();
        let mut buf = [0u8; ROW_BYTES];
        assert_eq!(src.read(32, &mut buf), 8);
        assert_eq!(&buf[..8], &[32, 33, 34, 35, 36, 37, 38, 39]);
        assert_eq!(src.read(40, &mut buf), 0);
        assert_eq!(src.read(u32::MAX, &mut buf), 0);
    }

    #[test]
    fn missing_partition_fails_open() {
        let mut flash = flash();
        let res = PartitionByteSource::open(
            &mut flash,
            Selector::Lookup { kind: 0x00, subtype: 0x20 },
            &FlashLayout::ESP32C3,
        );
        assert_eq!(res.err(), Some(ResolveError::NotFound));
    }

    #[test]
    fn device_error_reads_as_empty() {
        // bootloader region claims 0x8000 bytes but the chip is smaller
        let mut flash = RamFlash::erased(0x100);
        let mut src =
            PartitionByteSource::open(&mut flash, Selector::Bootloader, &FlashLayout::ESP32C3)
                .unwrap();
        let mut buf = [0u8; ROW_BYTES];
        assert_eq!(src.read(0, &mut buf), 16);
        assert_eq!(src.read(0x200, &mut buf), 0);
    }
}
