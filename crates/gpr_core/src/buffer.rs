//! Owning handles for codec-allocated memory.
//!
//! A [`NativeBuffer`] is a move-only handle over one allocator-owned
//! block with a single release point in `Drop`. At any instant a block
//! has exactly one owner: the handle, a raw `gpr_buffer` produced by
//! [`NativeBuffer::into_raw_parts`], or a pixel view that the handle
//! was transferred into. Double frees are unrepresentable.

use crate::alloc::Allocator;
use crate::error::{GprError, GprResult};
use gpr_sys::gpr_buffer;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::ptr::NonNull;

/// An owned, contiguous block of allocator memory.
pub struct NativeBuffer {
    ptr: NonNull<u8>,
    len: usize,
    allocator: Allocator,
}

// Safety: the handle exclusively owns its block and exposes no
// interior mutability.
unsafe impl Send for NativeBuffer {}
unsafe impl Sync for NativeBuffer {}

impl std::fmt::Debug for NativeBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBuffer")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl NativeBuffer {
    /// Allocates an uninitialized block of `size` bytes.
    ///
    /// # Errors
    ///
    /// Propagates the allocator contract: parameter error for zero
    /// size, memory error for a null return.
    pub fn allocate(allocator: Allocator, size: usize) -> GprResult<Self> {
        let ptr = allocator.allocate(size)?;
        Ok(Self {
            ptr,
            len: size,
            allocator,
        })
    }

    /// Allocates a block and fills it with a copy of `bytes`.
    pub fn copy_from_slice(allocator: Allocator, bytes: &[u8]) -> GprResult<Self> {
        let buf = Self::allocate(allocator, bytes.len())?;
        // Safety: the block was just allocated with exactly this length.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf.ptr.as_ptr(), bytes.len());
        }
        Ok(buf)
    }

    /// Reads a whole file into allocator-owned memory.
    ///
    /// # Errors
    ///
    /// Missing files map to the not-found code, access failures to the
    /// permission code, empty files to the corrupted code, and any
    /// other read failure to the generic I/O code.
    pub fn from_file(path: &Path, allocator: Allocator) -> GprResult<Self> {
        let bytes = fs::read(path).map_err(|e| GprError::from_io(path, "read", e))?;
        if bytes.is_empty() {
            return Err(GprError::corrupted(path, "file is empty"));
        }
        Self::copy_from_slice(allocator, &bytes)
    }

    /// Adopts a codec output buffer, taking ownership of the block.
    ///
    /// Returns `None` for a null buffer so failed codec calls that
    /// left the out-parameter untouched produce no handle.
    ///
    /// # Safety
    ///
    /// A non-null `raw.buffer` must point to `raw.size` bytes
    /// allocated by `allocator` and owned by no one else.
    pub unsafe fn from_raw(raw: gpr_buffer, allocator: Allocator) -> Option<Self> {
        NonNull::new(raw.buffer.cast::<u8>()).map(|ptr| Self {
            ptr,
            len: raw.size,
            allocator,
        })
    }

    /// Length of the block in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the block is zero-sized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The block contents.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        // Safety: ptr/len describe the owned allocation.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Start of the block.
    #[must_use]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// A borrowed raw descriptor for passing into codec calls.
    ///
    /// Ownership stays with the handle; the descriptor must not
    /// outlive it and must not be freed.
    #[must_use]
    pub fn as_raw(&self) -> gpr_buffer {
        gpr_buffer {
            buffer: self.ptr.as_ptr().cast(),
            size: self.len,
        }
    }

    /// Transfers ownership out of Rust, returning the raw descriptor.
    ///
    /// The caller becomes responsible for releasing the block through
    /// the same allocator pair. `Drop` no longer runs.
    #[must_use]
    pub fn into_raw_parts(self) -> gpr_buffer {
        let raw = self.as_raw();
        std::mem::forget(self);
        raw
    }

    /// Writes the block to `path` atomically.
    ///
    /// The contents go to a temporary file in the destination
    /// directory which is renamed over `path` only after a complete
    /// write, so a failure mid-write never leaves a truncated file at
    /// the destination.
    pub fn write_to_file(&self, path: &Path) -> GprResult<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| GprError::from_io(path, "write", e))?;
        tmp.write_all(self.as_slice())
            .map_err(|e| GprError::from_io(path, "write", e))?;
        tmp.persist(path)
            .map_err(|e| GprError::from_io(path, "write", e.error))?;
        Ok(())
    }
}

impl Drop for NativeBuffer {
    fn drop(&mut self) {
        // Safety: sole owner; the pointer was produced by this pair.
        unsafe { self.allocator.free(self.ptr.as_ptr()) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpr_sys::gpr_allocator;
    use std::ffi::c_void;
    use std::sync::atomic::{AtomicU64, Ordering};

    // Private counting pair; the global counters are shared with every
    // other test in this binary.
    static DROP_ALLOCS: AtomicU64 = AtomicU64::new(0);
    static DROP_FREES: AtomicU64 = AtomicU64::new(0);

    unsafe extern "C" fn counting_alloc(size: usize) -> *mut c_void {
        DROP_ALLOCS.fetch_add(1, Ordering::Relaxed);
        libc::malloc(size)
    }

    unsafe extern "C" fn counting_free(p: *mut c_void) {
        DROP_FREES.fetch_add(1, Ordering::Relaxed);
        libc::free(p);
    }

    #[test]
    fn copy_round_trips_contents() {
        let buf = NativeBuffer::copy_from_slice(Allocator::global(), b"raw pixels").unwrap();
        assert_eq!(buf.as_slice(), b"raw pixels");
        assert_eq!(buf.len(), 10);
    }

    #[test]
    fn drop_releases_exactly_once() {
        let alloc = Allocator::from_raw(gpr_allocator {
            Alloc: counting_alloc,
            Free: counting_free,
        });
        {
            let _buf = NativeBuffer::allocate(alloc, 256).unwrap();
        }
        assert_eq!(
            DROP_ALLOCS.load(Ordering::Relaxed),
            DROP_FREES.load(Ordering::Relaxed)
        );
    }

    #[test]
    fn raw_round_trip_preserves_ownership() {
        let alloc = Allocator::global();
        let buf = NativeBuffer::copy_from_slice(alloc, &[1, 2, 3]).unwrap();
        let raw = buf.into_raw_parts();
        assert!(!raw.is_null());

        let recovered = unsafe { NativeBuffer::from_raw(raw, alloc) }.unwrap();
        assert_eq!(recovered.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn from_raw_null_is_none() {
        let adopted = unsafe { NativeBuffer::from_raw(gpr_buffer::empty(), Allocator::global()) };
        assert!(adopted.is_none());
    }

    #[test]
    fn from_file_maps_missing_and_empty() {
        let alloc = Allocator::global();
        let err = NativeBuffer::from_file(Path::new("/no/such/input.gpr"), alloc).unwrap_err();
        assert_eq!(err.code(), Some(-2));

        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.gpr");
        fs::write(&empty, b"").unwrap();
        let err = NativeBuffer::from_file(&empty, alloc).unwrap_err();
        assert_eq!(err.code(), Some(-4));
    }

    #[test]
    fn write_to_file_is_atomic_on_contents() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.dng");
        fs::write(&dest, b"previous contents").unwrap();

        let buf = NativeBuffer::copy_from_slice(Allocator::global(), b"new contents").unwrap();
        buf.write_to_file(&dest).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"new contents");
        // No stray temporary left behind.
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
