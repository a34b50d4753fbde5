// Row-granular byte access shared by every backing store.
//
// A row is 16 bytes. Callers always pass an absolute address; sources
// never rely on a sequential cursor because the viewer moves backward.
// A short count is the only end-of-content signal.

pub const ROW_BYTES: usize = 16;

pub type RowBuf = [u8; ROW_BYTES];

pub trait ByteSource {
    /// Total content size in bytes, fixed once the source is open.
    fn len(&self) -> u32;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `buf` with up to 16 bytes starting at `address`.
    ///
    /// Returns how many leading bytes of `buf` are valid. Addresses at or
    /// past `len()` return 0; bytes past the returned count are garbage.
    fn read(&mut self, address: u32, buf: &mut RowBuf) -> usize;
}

// rows needed to cover `len` bytes, last one possibly partial
#[inline]
pub fn row_count(len: u32) -> u32 {
    len.div_ceil(ROW_BYTES as u32)
}

// bytes a read at `address` may return without crossing `len`
#[inline]
pub fn clamp_read(address: u32, len: u32) -> usize {
    if address >= len {
        0
    } else {
        ((len - address) as usize).min(ROW_BYTES)
    }
}
