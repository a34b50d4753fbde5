// File-backed byte source.
//
// The filesystem is a trait so the same source works over the SD card
// (drivers::sdcard) and any other mounted volume. The file handle lives
// exactly as long as the source; dropping the source closes it.

use core::fmt;

use log::{info, warn};

use super::source::{ByteSource, ROW_BYTES, RowBuf, clamp_read};

// longest path kept for the banner; longer paths are cut
pub const PATH_CAP: usize = 64;

/// Which storage medium a file came from; only changes header styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Medium {
    SdCard,
    InternalFlash,
}

impl Medium {
    pub const fn label(self) -> &'static str {
        match self {
            Medium::SdCard => "SDCard",
            Medium::InternalFlash => "FlashFS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenError {
    EmptyPath,
    NotFound,
    IsDirectory,
    Unavailable,
    Io,
}

impl OpenError {
    pub const fn as_str(self) -> &'static str {
        match self {
            OpenError::EmptyPath => "no file selected",
            OpenError::NotFound => "file not found",
            OpenError::IsDirectory => "is a directory",
            OpenError::Unavailable => "volume unavailable",
            OpenError::Io => "open failed",
        }
    }
}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait FileHandle {
    fn length(&self) -> u32;
    fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, &'static str>;
}

pub trait Filesystem {
    type File: FileHandle;

    fn medium(&self) -> Medium;

    /// Open `path` read-only. Must reject directories with
    /// `OpenError::IsDirectory`.
    fn open(&self, path: &str) -> Result<Self::File, OpenError>;
}

pub struct FileByteSource<F: FileHandle> {
    file: F,
    len: u32,
    medium: Medium,
    path: [u8; PATH_CAP],
    path_len: usize,
}

impl<F: FileHandle> FileByteSource<F> {
    pub fn open<FS>(fs: &FS, path: &str) -> Result<Self, OpenError>
    where
        FS: Filesystem<File = F>,
    {
        if path.is_empty() {
            return Err(OpenError::EmptyPath);
        }

        let file = fs.open(path).inspect_err(|e| {
            info!("open {}: {}", path, e);
        })?;
        let len = file.length();

        let mut stored = [0u8; PATH_CAP];
        let path_len = truncate_at_char(path, PATH_CAP);
        stored[..path_len].copy_from_slice(&path.as_bytes()[..path_len]);

        info!("opened {} ({} bytes, {})", path, len, fs.medium().label());

        Ok(Self {
            file,
            len,
            medium: fs.medium(),
            path: stored,
            path_len,
        })
    }

    pub fn medium(&self) -> Medium {
        self.medium
    }

    pub fn path(&self) -> &str {
        core::str::from_utf8(&self.path[..self.path_len]).unwrap_or("?")
    }
}

impl<F: FileHandle> ByteSource for FileByteSource<F> {
    fn len(&self) -> u32 {
        self.len
    }

    fn read(&mut self, address: u32, buf: &mut RowBuf) -> usize {
        let want = clamp_read(address, self.len);
        if want == 0 {
            return 0;
        }

        let mut total = 0;
        while total < want {
            match self.file.read_at(address + total as u32, &mut buf[total..want]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) => {
                    warn!("read at 0x{:08X} failed: {}", address, e);
                    break;
                }
            }
        }
        total.min(ROW_BYTES)
    }
}

// largest prefix of `s` no longer than `cap` that ends on a char boundary
fn truncate_at_char(s: &str, cap: usize) -> usize {
    if s.len() <= cap {
        return s.len();
    }
    let mut end = cap;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}
