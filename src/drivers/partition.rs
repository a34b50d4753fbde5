// ESP-IDF flash layout and partition table.
//
// Binary table format (one 32-byte record per partition):
//   [0..2]   magic AA 50
//   [2]      type     (0x00 app, 0x01 data, ...)
//   [3]      subtype
//   [4..8]   offset   u32 LE
//   [8..12]  size     u32 LE
//   [12..28] label    NUL padded
//   [28..32] flags    u32 LE, bit 0 = encrypted
// The table ends at the first record without the magic (the MD5 record
// EB EB or erased FF FF). At most 0xC00 bytes are scanned.

use core::fmt;

use embedded_storage::ReadStorage;
use log::{debug, info};

pub const ENTRY_SIZE: usize = 32;
pub const LABEL_LEN: usize = 16;
pub const TABLE_MAX_LEN: u32 = 0xC00;
pub const MAX_ENTRIES: usize = TABLE_MAX_LEN as usize / ENTRY_SIZE;

// the table sector; what the viewer shows for "partition table"
pub const TABLE_REGION_LEN: u32 = 0x1000;

pub const SUBTYPE_ANY: u8 = 0xFF;

const ENTRY_MAGIC: [u8; 2] = [0xAA, 0x50];
const FLAG_ENCRYPTED: u32 = 1 << 0;

/// Where the second-stage bootloader and the partition table sit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashLayout {
    pub bootloader_offset: u32,
    pub partition_table_offset: u32,
}

impl FlashLayout {
    pub const ESP32: Self = Self {
        bootloader_offset: 0x1000,
        partition_table_offset: 0x8000,
    };

    pub const ESP32C3: Self = Self {
        bootloader_offset: 0x0,
        partition_table_offset: 0x8000,
    };
}

impl Default for FlashLayout {
    fn default() -> Self {
        Self::ESP32C3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Bootloader,
    PartitionTable,
    Lookup { kind: u8, subtype: u8 },
}

impl Selector {
    // menu tags: 0 and 1 are the fixed regions, anything else packs
    // (type << 8) | subtype
    pub const fn from_tag(tag: u16) -> Self {
        match tag {
            0 => Selector::Bootloader,
            1 => Selector::PartitionTable,
            t => Selector::Lookup {
                kind: (t >> 8) as u8,
                subtype: (t & 0xFF) as u8,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    NotFound,
    TableUnreadable,
}

impl ResolveError {
    pub const fn as_str(self) -> &'static str {
        match self {
            ResolveError::NotFound => "partition not found",
            ResolveError::TableUnreadable => "partition table unreadable",
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub offset: u32,
    pub size: u32,
    label: [u8; LABEL_LEN],
    pub encrypted: bool,
}

impl Partition {
    pub const EMPTY: Self = Self {
        offset: 0,
        size: 0,
        label: [0u8; LABEL_LEN],
        encrypted: false,
    };

    pub fn synthetic(offset: u32, size: u32, label: &str) -> Self {
        let mut buf = [0u8; LABEL_LEN];
        let n = label.len().min(LABEL_LEN);
        buf[..n].copy_from_slice(&label.as_bytes()[..n]);
        Self {
            offset,
            size,
            label: buf,
            encrypted: false,
        }
    }

    pub fn label(&self) -> &str {
        let end = self.label.iter().position(|&b| b == 0).unwrap_or(LABEL_LEN);
        core::str::from_utf8(&self.label[..end]).unwrap_or("?")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableEntry {
    pub kind: u8,
    pub subtype: u8,
    pub partition: Partition,
}

impl TableEntry {
    pub const EMPTY: Self = Self {
        kind: 0,
        subtype: 0,
        partition: Partition::EMPTY,
    };

    pub fn parse(raw: &[u8; ENTRY_SIZE]) -> Option<Self> {
        if raw[..2] != ENTRY_MAGIC {
            return None;
        }
        let word = |at: usize| u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);

        let mut label = [0u8; LABEL_LEN];
        label.copy_from_slice(&raw[12..12 + LABEL_LEN]);

        Some(Self {
            kind: raw[2],
            subtype: raw[3],
            partition: Partition {
                offset: word(4),
                size: word(8),
                label,
                encrypted: word(28) & FLAG_ENCRYPTED != 0,
            },
        })
    }

    pub fn matches(&self, kind: u8, subtype: u8) -> bool {
        self.kind == kind && (subtype == SUBTYPE_ANY || self.subtype == subtype)
    }
}

// walk the table in flash order; stops at the end marker or when
// `visit` returns false
fn scan_table<S, V>(flash: &mut S, layout: &FlashLayout, mut visit: V) -> Result<(), ResolveError>
where
    S: ReadStorage,
    V: FnMut(&TableEntry) -> bool,
{
    let mut raw = [0u8; ENTRY_SIZE];
    for i in 0..MAX_ENTRIES {
        let at = layout.partition_table_offset + (i * ENTRY_SIZE) as u32;
        flash
            .read(at, &mut raw)
            .map_err(|_| ResolveError::TableUnreadable)?;
        let Some(entry) = TableEntry::parse(&raw) else {
            debug!("partition table: {} entries", i);
            return Ok(());
        };
        if !visit(&entry) {
            return Ok(());
        }
    }
    Ok(())
}

/// First partition matching `kind`/`subtype` in table order.
pub fn find_first<S: ReadStorage>(
    flash: &mut S,
    layout: &FlashLayout,
    kind: u8,
    subtype: u8,
) -> Result<Partition, ResolveError> {
    let mut found = None;
    scan_table(flash, layout, |entry| {
        if entry.matches(kind, subtype) {
            found = Some(entry.partition);
            false
        } else {
            true
        }
    })?;
    found.ok_or(ResolveError::NotFound)
}

/// Copy table entries into `out`; returns how many were stored.
pub fn read_table<S: ReadStorage>(
    flash: &mut S,
    layout: &FlashLayout,
    out: &mut [TableEntry],
) -> Result<usize, ResolveError> {
    let mut count = 0;
    scan_table(flash, layout, |entry| {
        if count < out.len() {
            out[count] = *entry;
            count += 1;
        }
        count < out.len()
    })?;
    Ok(count)
}

pub fn resolve<S: ReadStorage>(
    flash: &mut S,
    selector: Selector,
    layout: &FlashLayout,
) -> Result<Partition, ResolveError> {
    let partition = match selector {
        Selector::Bootloader => Partition::synthetic(
            layout.bootloader_offset,
            layout
                .partition_table_offset
                .saturating_sub(layout.bootloader_offset),
            "2nd boot loader",
        ),
        Selector::PartitionTable => Partition::synthetic(
            layout.partition_table_offset,
            TABLE_REGION_LEN,
            "partition table",
        ),
        Selector::Lookup { kind, subtype } => find_first(flash, layout, kind, subtype)
            .inspect_err(|e| info!("partition {:02x}/{:02x}: {}", kind, subtype, e))?,
    };
    Ok(partition)
}
