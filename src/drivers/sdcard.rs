// FAT volume on the SD card as a viewer filesystem.
//
// An open SdFile holds raw embedded-sdmmc handles for the file and its
// volume; both are closed when it drops (file first, then volume).
// Directories walked on the way are closed before open returns.
// Names are 8.3; paths are '/'-separated from the volume root.
// No RTC on board; timestamps are fixed to 2025-01-01.

use embedded_sdmmc::{
    BlockDevice, Error, Mode, RawDirectory, RawFile, RawVolume, ShortFileName, TimeSource,
    Timestamp, VolumeIdx, VolumeManager,
};
use log::{debug, warn};

use super::storage::{FileHandle, Filesystem, Medium, OpenError};

pub const MAX_DIRS: usize = 4;
pub const MAX_FILES: usize = 4;
pub const MAX_VOLUMES: usize = 1;

pub type Volumes<D, T> = VolumeManager<D, T, MAX_DIRS, MAX_FILES, MAX_VOLUMES>;

#[derive(Default, Clone, Copy)]
pub struct DummyTimeSource;

impl TimeSource for DummyTimeSource {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 55,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

pub struct SdFilesystem<'a, D: BlockDevice, T: TimeSource> {
    volume_mgr: &'a Volumes<D, T>,
}

impl<'a, D: BlockDevice, T: TimeSource> SdFilesystem<'a, D, T> {
    pub fn new(volume_mgr: &'a Volumes<D, T>) -> Self {
        Self { volume_mgr }
    }

    pub fn is_mounted(&self) -> bool {
        self.volume_mgr.open_volume(VolumeIdx(0)).is_ok()
    }

    // walk to `path` from the root of `volume`; every directory opened
    // here is closed again whatever the outcome
    fn open_in(&self, volume: RawVolume, path: &str) -> Result<RawFile, OpenError> {
        let mgr = self.volume_mgr;
        let mut dir = mgr
            .open_root_dir(volume)
            .map_err(|_| OpenError::Unavailable)?;

        let mut parts = path.split('/').filter(|p| !p.is_empty());
        // the volume root itself
        let Some(mut name) = parts.next() else {
            close_dir(mgr, dir);
            return Err(OpenError::IsDirectory);
        };
        for next in parts {
            let child = mgr.open_dir(dir, name);
            close_dir(mgr, dir);
            dir = child.map_err(map_open_err)?;
            name = next;
        }

        let file = mgr.open_file_in_dir(dir, name, Mode::ReadOnly);
        close_dir(mgr, dir);
        file.map_err(map_open_err)
    }
}

fn close_dir<D: BlockDevice, T: TimeSource>(mgr: &Volumes<D, T>, dir: RawDirectory) {
    if let Err(e) = mgr.close_dir(dir) {
        warn!("sd: close dir: {:?}", e);
    }
}

pub struct SdFile<'a, D: BlockDevice, T: TimeSource> {
    volume_mgr: &'a Volumes<D, T>,
    volume: RawVolume,
    file: RawFile,
    length: u32,
}

impl<D: BlockDevice, T: TimeSource> FileHandle for SdFile<'_, D, T> {
    fn length(&self) -> u32 {
        self.length
    }

    fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, &'static str> {
        self.volume_mgr
            .file_seek_from_start(self.file, offset)
            .map_err(|_| "seek failed")?;
        self.volume_mgr
            .read(self.file, buf)
            .map_err(|_| "read failed")
    }
}

impl<D: BlockDevice, T: TimeSource> Drop for SdFile<'_, D, T> {
    fn drop(&mut self) {
        if let Err(e) = self.volume_mgr.close_file(self.file) {
            warn!("sd: close file: {:?}", e);
        }
        if let Err(e) = self.volume_mgr.close_volume(self.volume) {
            warn!("sd: close volume: {:?}", e);
        }
    }
}

fn map_open_err<E: core::fmt::Debug>(e: Error<E>) -> OpenError {
    match e {
        Error::OpenedDirAsFile => OpenError::IsDirectory,
        Error::NotFound | Error::OpenedFileAsDir | Error::FilenameError(_) => OpenError::NotFound,
        other => {
            debug!("sd open: {:?}", other);
            OpenError::Io
        }
    }
}

impl<'a, D: BlockDevice, T: TimeSource> Filesystem for SdFilesystem<'a, D, T> {
    type File = SdFile<'a, D, T>;

    fn medium(&self) -> Medium {
        Medium::SdCard
    }

    fn open(&self, path: &str) -> Result<Self::File, OpenError> {
        let mgr = self.volume_mgr;
        let volume = mgr
            .open_raw_volume(VolumeIdx(0))
            .map_err(|_| OpenError::Unavailable)?;

        let opened = self
            .open_in(volume, path)
            .and_then(|file| match mgr.file_length(file) {
                Ok(length) => Ok((file, length)),
                Err(e) => {
                    if let Err(err) = mgr.close_file(file) {
                        warn!("sd: close file: {:?}", err);
                    }
                    Err(map_open_err(e))
                }
            });

        match opened {
            Ok((file, length)) => Ok(SdFile {
                volume_mgr: mgr,
                volume,
                file,
                length,
            }),
            Err(e) => {
                if let Err(err) = mgr.close_volume(volume) {
                    warn!("sd: close volume: {:?}", err);
                }
                Err(e)
            }
        }
    }
}

// root directory listing for the launcher

pub const NAME_CAP: usize = 13;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: [u8; NAME_CAP],
    pub name_len: u8,
    pub is_dir: bool,
    pub size: u32,
}

impl DirEntry {
    pub const EMPTY: Self = Self {
        name: [0u8; NAME_CAP],
        name_len: 0,
        is_dir: false,
        size: 0,
    };

    pub fn name_str(&self) -> &str {
        core::str::from_utf8(&self.name[..self.name_len as usize]).unwrap_or("?")
    }
}

/// Read the root directory into `out`, directories first, names
/// case-insensitive. Hidden (`.`) and system (`_`) entries are skipped.
pub fn list_root<D: BlockDevice, T: TimeSource>(
    volume_mgr: &Volumes<D, T>,
    out: &mut [DirEntry],
) -> Result<usize, &'static str> {
    let volume = volume_mgr
        .open_volume(VolumeIdx(0))
        .map_err(|_| "open volume failed")?;
    let root = volume.open_root_dir().map_err(|_| "open root dir failed")?;

    let mut count = 0usize;
    root.iterate_dir(|entry| {
        if matches!(entry.name.base_name()[0], b'.' | b'_') {
            return;
        }
        if entry.attributes.is_volume() {
            return;
        }
        if count < out.len() {
            let mut name = [0u8; NAME_CAP];
            let name_len = format_83_name(&entry.name, &mut name);
            out[count] = DirEntry {
                name,
                name_len: name_len as u8,
                is_dir: entry.attributes.is_directory(),
                size: entry.size,
            };
            count += 1;
        }
    })
    .map_err(|_| "iterate dir failed")?;

    sort_entries(&mut out[..count]);
    Ok(count)
}

// insertion sort: dirs first, then filenames case-insensitive
fn sort_entries(entries: &mut [DirEntry]) {
    for i in 1..entries.len() {
        let key = entries[i];
        let mut j = i;
        while j > 0 && entry_gt(&entries[j - 1], &key) {
            entries[j] = entries[j - 1];
            j -= 1;
        }
        entries[j] = key;
    }
}

fn entry_gt(a: &DirEntry, b: &DirEntry) -> bool {
    if a.is_dir != b.is_dir {
        return !a.is_dir;
    }
    let an = &a.name[..a.name_len as usize];
    let bn = &b.name[..b.name_len as usize];
    for (&ab, &bb) in an.iter().zip(bn.iter()) {
        match ab.to_ascii_lowercase().cmp(&bb.to_ascii_lowercase()) {
            core::cmp::Ordering::Less => return false,
            core::cmp::Ordering::Greater => return true,
            core::cmp::Ordering::Equal => {}
        }
    }
    an.len() > bn.len()
}

fn format_83_name(sfn: &ShortFileName, out: &mut [u8; NAME_CAP]) -> usize {
    let mut pos = 0;
    for &b in sfn.base_name() {
        if b == b' ' {
            break;
        }
        out[pos] = b;
        pos += 1;
    }

    let ext = sfn.extension();
    let ext = &ext[..ext.iter().position(|&b| b == b' ').unwrap_or(ext.len())];
    if !ext.is_empty() {
        out[pos] = b'.';
        pos += 1;
        for &b in ext {
            out[pos] = b;
            pos += 1;
        }
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::source::ByteSource;
    use crate::drivers::storage::FileByteSource;
    use crate::testutil::RamDisk;

    fn card() -> Volumes<RamDisk, DummyTimeSource> {
        VolumeManager::new(RamDisk::fat16(), DummyTimeSource)
    }

    fn entry(name: &str, is_dir: bool) -> DirEntry {
        let mut e = DirEntry::EMPTY;
        e.name[..name.len()].copy_from_slice(name.as_bytes());
        e.name_len = name.len() as u8;
        e.is_dir = is_dir;
        e
    }

    #[test]
    fn short_names_render_with_dot() {
        let mut out = [0u8; NAME_CAP];
        let sfn = ShortFileName::create_from_str("DUMP.BIN").unwrap();
        let n = format_83_name(&sfn, &mut out);
        assert_eq!(&out[..n], b"DUMP.BIN");

        let sfn = ShortFileName::create_from_str("LOGS").unwrap();
        let n = format_83_name(&sfn, &mut out);
        assert_eq!(&out[..n], b"LOGS");
    }

    #[test]
    fn directories_sort_first() {
        let mut list = [
            entry("b.bin", false),
            entry("ZDIR", true),
            entry("A.BIN", false),
            entry("adir", true),
        ];
        sort_entries(&mut list);
        let names: std::vec::Vec<&str> = list.iter().map(|e| e.name_str()).collect();
        assert_eq!(names, ["adir", "ZDIR", "A.BIN", "b.bin"]);
    }

    #[test]
    fn file_reads_across_clusters_and_closes_on_drop() {
        let mgr = card();
        let fs = SdFilesystem::new(&mgr);
        assert!(fs.is_mounted());

        let mut src = FileByteSource::open(&fs, "DUMP.BIN").unwrap();
        assert_eq!(src.len(), 600);
        assert_eq!(src.medium(), Medium::SdCard);

        let mut row = [0u8; 16];
        // straddles the cluster 2 -> 3 boundary at byte 512
        assert_eq!(src.read(504, &mut row), 16);
        let want: std::vec::Vec<u8> = (504..520u32).map(|i| (i % 251) as u8).collect();
        assert_eq!(&row[..], &want[..]);

        // backwards after a forward read, then the short tail
        assert_eq!(src.read(0, &mut row), 16);
        assert_eq!(row[1], 1);
        assert_eq!(src.read(592, &mut row), 8);
        assert_eq!(src.read(600, &mut row), 0);
        assert!(mgr.has_open_handles());

        drop(src);
        assert!(!mgr.has_open_handles());
    }

    #[test]
    fn nested_path_opens_and_reopens() {
        let mgr = card();
        let fs = SdFilesystem::new(&mgr);
        for _ in 0..2 {
            let mut file = fs.open("/logs/a.bin").unwrap();
            assert_eq!(file.length(), 5);
            let mut buf = [0u8; 16];
            assert_eq!(file.read_at(0, &mut buf).unwrap(), 5);
            assert_eq!(&buf[..5], b"hello");
        }
        assert!(!mgr.has_open_handles());
    }

    #[test]
    fn failed_opens_release_every_handle() {
        let mgr = card();
        let fs = SdFilesystem::new(&mgr);
        assert_eq!(fs.open("LOGS").err(), Some(OpenError::IsDirectory));
        assert_eq!(fs.open("/").err(), Some(OpenError::IsDirectory));
        assert_eq!(fs.open("NOPE.BIN").err(), Some(OpenError::NotFound));
        assert_eq!(fs.open("NOPE/A.BIN").err(), Some(OpenError::NotFound));
        assert_eq!(fs.open("DUMP.BIN/A.BIN").err(), Some(OpenError::NotFound));
        assert!(!mgr.has_open_handles());
        // the volume was closed each time, so a real open still works
        assert!(fs.open("DUMP.BIN").is_ok());
    }

    #[test]
    fn root_listing_puts_directories_first() {
        let mgr = card();
        let mut out = [DirEntry::EMPTY; 8];
        let n = list_root(&mgr, &mut out).unwrap();
        let names: std::vec::Vec<&str> = out[..n].iter().map(|e| e.name_str()).collect();
        assert_eq!(names, ["LOGS", "DUMP.BIN"]);
        assert!(out[0].is_dir);
        assert_eq!(out[1].size, 600);
        assert!(!mgr.has_open_handles());
    }
}
