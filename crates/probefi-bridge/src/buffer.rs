//! Owned memory handed back across the bridge.

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;
use std::slice;

use tracing::trace;

/// A block allocated by the C allocator on the callee's side, now owned by
/// the caller.
///
/// Dropping the buffer releases the block with the C library's `free`,
/// exactly once. Nothing reads the block afterwards.
pub struct OwnedBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

// The block is exclusively owned; no other party keeps a reference to it.
unsafe impl Send for OwnedBuffer {}
unsafe impl Sync for OwnedBuffer {}

impl OwnedBuffer {
    /// Take ownership of `len` bytes at `ptr`. Returns `None` for null.
    ///
    /// # Safety
    ///
    /// `ptr` must come from the C allocator (`malloc` and friends), be valid
    /// for reads of `len` bytes, and not be owned or released by anyone else.
    pub unsafe fn from_raw(ptr: *mut c_void, len: usize) -> Option<Self> {
        NonNull::new(ptr as *mut u8).map(|ptr| OwnedBuffer { ptr, len })
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy the contents out and release the block.
    pub fn into_vec(self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl Drop for OwnedBuffer {
    fn drop(&mut self) {
        trace!(address = ?self.ptr, len = self.len, "releasing owned buffer");
        unsafe { libc::free(self.ptr.as_ptr() as *mut libc::c_void) }
    }
}

impl fmt::Debug for OwnedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

impl AsRef<[u8]> for OwnedBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c_alloc(bytes: &[u8]) -> *mut c_void {
        unsafe {
            let p = libc::malloc(bytes.len().max(1));
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), p as *mut u8, bytes.len());
            p
        }
    }

    #[test]
    fn null_is_not_owned() {
        assert!(unsafe { OwnedBuffer::from_raw(std::ptr::null_mut(), 4) }.is_none());
    }

    #[test]
    fn exposes_and_releases_contents() {
        let buf = unsafe { OwnedBuffer::from_raw(c_alloc(b"abc"), 3) }.unwrap();
        assert_eq!(buf.as_bytes(), b"abc");
        assert_eq!(buf.len(), 3);
        assert!(!buf.is_empty());
        assert_eq!(buf.into_vec(), b"abc".to_vec());
    }

    #[test]
    fn empty_buffer() {
        let buf = unsafe { OwnedBuffer::from_raw(c_alloc(b""), 0) }.unwrap();
        assert!(buf.is_empty());
        assert_eq!(buf.as_bytes(), b"");
    }
}
