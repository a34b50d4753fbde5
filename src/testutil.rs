// Host-side fakes for unit tests: an in-memory filesystem, a FAT16 RAM
// disk, a RAM flash chip, a scroll-aware framebuffer and a recording delay.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::rc::Rc;

use core::convert::Infallible;

use embedded_graphics::Pixel;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_hal::delay::DelayNs;
use embedded_sdmmc::{Block, BlockCount, BlockDevice, BlockIdx};
use embedded_storage::ReadStorage;

use crate::drivers::partition::ENTRY_SIZE;
use crate::drivers::storage::{FileHandle, Filesystem, Medium, OpenError};
use crate::ui::Screen;

// ── In-memory filesystem ────────────────────────────────────

#[derive(Default)]
struct Counters {
    opens: Cell<usize>,
    reads: Cell<usize>,
    closes: Cell<usize>,
}

pub struct MemFs {
    medium: Medium,
    files: BTreeMap<String, Rc<Vec<u8>>>,
    dirs: BTreeSet<String>,
    max_chunk: usize,
    counters: Rc<Counters>,
}

pub struct MemFile {
    data: Rc<Vec<u8>>,
    max_chunk: usize,
    counters: Rc<Counters>,
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

impl MemFs {
    pub fn new(medium: Medium) -> Self {
        Self {
            medium,
            files: BTreeMap::new(),
            dirs: BTreeSet::new(),
            max_chunk: usize::MAX,
            counters: Rc::new(Counters::default()),
        }
    }

    pub fn add_file(&mut self, path: &str, data: &[u8]) {
        self.files
            .insert(normalize(path).to_string(), Rc::new(data.to_vec()));
    }

    pub fn add_dir(&mut self, path: &str) {
        self.dirs.insert(normalize(path).to_string());
    }

    // device returns at most `n` bytes per read call
    pub fn set_max_chunk(&mut self, n: usize) {
        self.max_chunk = n;
    }

    pub fn open_calls(&self) -> usize {
        self.counters.opens.get()
    }

    pub fn read_calls(&self) -> usize {
        self.counters.reads.get()
    }

    pub fn closes(&self) -> usize {
        self.counters.closes.get()
    }
}

impl Filesystem for MemFs {
    type File = MemFile;

    fn medium(&self) -> Medium {
        self.medium
    }

    fn open(&self, path: &str) -> Result<MemFile, OpenError> {
        self.counters.opens.set(self.counters.opens.get() + 1);
        let key = normalize(path);
        if key.is_empty() || self.dirs.contains(key) {
            return Err(OpenError::IsDirectory);
        }
        let data = self.files.get(key).ok_or(OpenError::NotFound)?;
        Ok(MemFile {
            data: data.clone(),
            max_chunk: self.max_chunk,
            counters: self.counters.clone(),
        })
    }
}

impl FileHandle for MemFile {
    fn length(&self) -> u32 {
        self.data.len() as u32
    }

    fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, &'static str> {
        self.counters.reads.set(self.counters.reads.get() + 1);
        let start = (offset as usize).min(self.data.len());
        let n = buf.len().min(self.max_chunk).min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }
}

impl Drop for MemFile {
    fn drop(&mut self) {
        self.counters.closes.set(self.counters.closes.get() + 1);
    }
}

// ── FAT16 RAM disk ──────────────────────────────────────────

/// Sparse block device; blocks never written read back as zeros.
pub struct RamDisk {
    blocks: BTreeMap<u32, [u8; Block::LEN]>,
    num_blocks: u32,
}

impl RamDisk {
    fn block_mut(&mut self, idx: u32) -> &mut [u8; Block::LEN] {
        self.blocks.entry(idx).or_insert([0u8; Block::LEN])
    }

    fn put(&mut self, idx: u32, at: usize, bytes: &[u8]) {
        self.block_mut(idx)[at..at + bytes.len()].copy_from_slice(bytes);
    }

    /// MBR with one FAT16 partition at LBA 1, one block per cluster:
    ///
    ///   DUMP.BIN     600 bytes (clusters 2 -> 3), byte i = i % 251
    ///   LOGS/        cluster 4
    ///   LOGS/A.BIN   "hello" (cluster 5)
    pub fn fat16() -> Self {
        const PART_LBA: u32 = 1;
        const PART_BLOCKS: u32 = 4200;
        const FAT_BLOCKS: u16 = 17;
        const ROOT_DIR: u32 = PART_LBA + 1 + FAT_BLOCKS as u32;
        const DATA: u32 = ROOT_DIR + 1;

        let mut disk = Self {
            blocks: BTreeMap::new(),
            num_blocks: PART_LBA + PART_BLOCKS,
        };

        // MBR: partition 1 = FAT16 (0x06), non-bootable
        disk.put(0, 446 + 4, &[0x06]);
        disk.put(0, 446 + 8, &PART_LBA.to_le_bytes());
        disk.put(0, 446 + 12, &PART_BLOCKS.to_le_bytes());
        disk.put(0, 510, &[0x55, 0xAA]);

        // BPB
        disk.put(PART_LBA, 0, &[0xEB, 0x3C, 0x90]);
        disk.put(PART_LBA, 11, &512u16.to_le_bytes());
        disk.put(PART_LBA, 13, &[1]);
        disk.put(PART_LBA, 14, &1u16.to_le_bytes());
        disk.put(PART_LBA, 16, &[1]);
        disk.put(PART_LBA, 17, &16u16.to_le_bytes());
        disk.put(PART_LBA, 19, &(PART_BLOCKS as u16).to_le_bytes());
        disk.put(PART_LBA, 21, &[0xF8]);
        disk.put(PART_LBA, 22, &FAT_BLOCKS.to_le_bytes());
        disk.put(PART_LBA, 510, &[0x55, 0xAA]);

        // FAT: media, reserved, DUMP.BIN chain 2 -> 3, LOGS, A.BIN
        let fat: [u16; 6] = [0xFFF8, 0xFFFF, 3, 0xFFFF, 0xFFFF, 0xFFFF];
        for (i, e) in fat.iter().enumerate() {
            disk.put(PART_LBA + 1, i * 2, &e.to_le_bytes());
        }

        disk.put(ROOT_DIR, 0, &dir_entry(b"DUMP    BIN", 0x20, 2, 600));
        disk.put(ROOT_DIR, 32, &dir_entry(b"LOGS       ", 0x10, 4, 0));
        disk.put(DATA + 2, 0, &dir_entry(b"A       BIN", 0x20, 5, 5));

        let dump: Vec<u8> = (0..600u32).map(|i| (i % 251) as u8).collect();
        disk.put(DATA, 0, &dump[..512]);
        disk.put(DATA + 1, 0, &dump[512..]);
        disk.put(DATA + 3, 0, b"hello");
        disk
    }
}

fn dir_entry(name: &[u8; 11], attr: u8, cluster: u16, size: u32) -> [u8; 32] {
    let mut raw = [0u8; 32];
    raw[..11].copy_from_slice(name);
    raw[11] = attr;
    raw[26..28].copy_from_slice(&cluster.to_le_bytes());
    raw[28..32].copy_from_slice(&size.to_le_bytes());
    raw
}

impl BlockDevice for RamDisk {
    type Error = &'static str;

    fn read(&self, blocks: &mut [Block], start_block_idx: BlockIdx) -> Result<(), Self::Error> {
        for (i, block) in blocks.iter_mut().enumerate() {
            let idx = start_block_idx.0 + i as u32;
            if idx >= self.num_blocks {
                return Err("out of range");
            }
            block.contents = self
                .blocks
                .get(&idx)
                .copied()
                .unwrap_or([0u8; Block::LEN]);
        }
        Ok(())
    }

    fn write(&self, _blocks: &[Block], _start_block_idx: BlockIdx) -> Result<(), Self::Error> {
        Err("read-only")
    }

    fn num_blocks(&self) -> Result<BlockCount, Self::Error> {
        Ok(BlockCount(self.num_blocks))
    }
}

// ── RAM flash ───────────────────────────────────────────────

pub struct RamFlash {
    data: Vec<u8>,
}

impl RamFlash {
    pub fn erased(size: usize) -> Self {
        Self {
            data: vec![0xFF; size],
        }
    }

    pub fn write(&mut self, at: usize, bytes: &[u8]) {
        self.data[at..at + bytes.len()].copy_from_slice(bytes);
    }
}

impl ReadStorage for RamFlash {
    type Error = &'static str;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let end = start.checked_add(bytes.len()).ok_or("out of range")?;
        if end > self.data.len() {
            return Err("out of range");
        }
        bytes.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

/// One raw ESP-IDF partition table record.
pub fn table_entry(
    kind: u8,
    subtype: u8,
    offset: u32,
    size: u32,
    label: &str,
    flags: u32,
) -> [u8; ENTRY_SIZE] {
    let mut raw = [0u8; ENTRY_SIZE];
    raw[0] = 0xAA;
    raw[1] = 0x50;
    raw[2] = kind;
    raw[3] = subtype;
    raw[4..8].copy_from_slice(&offset.to_le_bytes());
    raw[8..12].copy_from_slice(&size.to_le_bytes());
    let label = &label.as_bytes()[..label.len().min(16)];
    raw[12..12 + label.len()].copy_from_slice(label);
    raw[28..32].copy_from_slice(&flags.to_le_bytes());
    raw
}

// ── Framebuffer with a vertical-scroll band ─────────────────

/// Frame memory plus the VSCRDEF / VSCRSADD state of a MIPI-DCS panel.
/// `visible` resolves what the glass shows after the scroll transform.
pub struct FrameBuffer {
    width: u32,
    height: u32,
    mem: Vec<Rgb565>,
    can_scroll: bool,
    top_fixed: u16,
    bottom_fixed: u16,
    start: u16,
    touched: BTreeSet<u32>,
    pub band_calls: usize,
    pub start_calls: usize,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32, can_scroll: bool) -> Self {
        Self {
            width,
            height,
            // power-on garbage, so unpainted areas show up in comparisons
            mem: vec![Rgb565::MAGENTA; (width * height) as usize],
            can_scroll,
            top_fixed: 0,
            bottom_fixed: 0,
            start: 0,
            touched: BTreeSet::new(),
            band_calls: 0,
            start_calls: 0,
        }
    }

    pub fn lcd(can_scroll: bool) -> Self {
        Self::new(320, 240, can_scroll)
    }

    pub fn scroll_state(&self) -> (u16, u16, u16) {
        (self.top_fixed, self.bottom_fixed, self.start)
    }

    // frame-memory line shown on glass line `y`
    fn memory_line(&self, y: u32) -> u32 {
        let top = self.top_fixed as u32;
        let bottom = self.height.saturating_sub(self.bottom_fixed as u32);
        if y < top || y >= bottom {
            return y;
        }
        let lines = bottom - top;
        let offset = (self.start as u32).saturating_sub(top);
        top + ((y - top) + offset) % lines
    }

    pub fn visible(&self) -> Vec<Rgb565> {
        let mut out = Vec::with_capacity(self.mem.len());
        for y in 0..self.height {
            let row = (self.memory_line(y) * self.width) as usize;
            out.extend_from_slice(&self.mem[row..row + self.width as usize]);
        }
        out
    }

    pub fn visible_pixel(&self, x: u32, y: u32) -> Rgb565 {
        self.mem[(self.memory_line(y) * self.width + x) as usize]
    }

    /// Frame-memory lines written since the last call.
    pub fn take_touched(&mut self) -> BTreeSet<u32> {
        core::mem::take(&mut self.touched)
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Infallible>
    where
        I: IntoIterator<Item = Pixel<Rgb565>>,
    {
        for Pixel(p, color) in pixels {
            if p.x < 0 || p.y < 0 || p.x as u32 >= self.width || p.y as u32 >= self.height {
                continue;
            }
            self.mem[(p.y as u32 * self.width + p.x as u32) as usize] = color;
            self.touched.insert(p.y as u32);
        }
        Ok(())
    }
}

impl Screen for FrameBuffer {
    fn has_vertical_scroll(&self) -> bool {
        self.can_scroll
    }

    fn set_scroll_band(&mut self, top_fixed: u16, bottom_fixed: u16) -> Result<(), Infallible> {
        if self.can_scroll {
            self.band_calls += 1;
            self.top_fixed = top_fixed;
            self.bottom_fixed = bottom_fixed;
        }
        Ok(())
    }

    fn set_scroll_start(&mut self, line: u16) -> Result<(), Infallible> {
        if self.can_scroll {
            self.start_calls += 1;
            self.start = line;
        }
        Ok(())
    }
}

// ── Delay ───────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingDelay {
    pub total_ns: u64,
    pub calls: usize,
}

impl RecordingDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        self.total_ns += ns as u64;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.calls += 1;
        self.total_ns += ms as u64 * 1_000_000;
    }
}
