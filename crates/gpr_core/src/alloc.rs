//! Allocator abstraction for codec-owned memory.
//!
//! Every operation uses one matched allocate/free pair for all of its
//! buffers. The global allocator mirrors the native
//! `gpr_global_malloc`/`gpr_global_free` pair (plain `malloc`/`free`)
//! and keeps running allocation counters so leak checks can verify
//! that every operation releases exactly what it acquired.

use crate::error::{GprError, GprResult};
use gpr_sys::gpr_allocator;
use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

static ALLOCATIONS: AtomicU64 = AtomicU64::new(0);
static FREES: AtomicU64 = AtomicU64::new(0);

unsafe extern "C" fn global_alloc(size: usize) -> *mut c_void {
    let p = libc::malloc(size);
    if !p.is_null() {
        ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
    }
    p
}

unsafe extern "C" fn global_free(p: *mut c_void) {
    if !p.is_null() {
        FREES.fetch_add(1, Ordering::Relaxed);
        libc::free(p);
    }
}

/// Snapshot of the global allocator's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationStats {
    /// Successful allocations since process start.
    pub allocations: u64,
    /// Releases since process start.
    pub frees: u64,
}

impl AllocationStats {
    /// Takes a snapshot of the counters.
    #[must_use]
    pub fn snapshot() -> Self {
        Self {
            allocations: ALLOCATIONS.load(Ordering::Relaxed),
            frees: FREES.load(Ordering::Relaxed),
        }
    }

    /// Number of blocks currently held (allocations minus frees).
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.allocations - self.frees
    }

    /// Counter deltas relative to an earlier snapshot.
    #[must_use]
    pub fn since(&self, earlier: &Self) -> Self {
        Self {
            allocations: self.allocations - earlier.allocations,
            frees: self.frees - earlier.frees,
        }
    }
}

/// A matched allocate/free function-pointer pair.
///
/// Copies of an `Allocator` share the same pair, so a buffer may be
/// released through any copy of the allocator that created it. Mixing
/// distinct pairs across one buffer is undefined.
#[derive(Clone, Copy)]
pub struct Allocator {
    raw: gpr_allocator,
}

impl std::fmt::Debug for Allocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Allocator")
            .field("alloc", &(self.raw.Alloc as usize as *const ()))
            .field("free", &(self.raw.Free as usize as *const ()))
            .finish()
    }
}

impl Allocator {
    /// The process-wide allocator, equivalent of the native
    /// `gpr_global_malloc`/`gpr_global_free` pair.
    ///
    /// Allocations through this pair are tracked by
    /// [`AllocationStats`]; custom pairs from [`Allocator::from_raw`]
    /// are not.
    #[must_use]
    pub fn global() -> Self {
        Self {
            raw: gpr_allocator {
                Alloc: global_alloc,
                Free: global_free,
            },
        }
    }

    /// Wraps a caller-supplied native allocator pair.
    #[must_use]
    pub fn from_raw(raw: gpr_allocator) -> Self {
        Self { raw }
    }

    /// The raw pair, for handing to codec entry points.
    #[must_use]
    pub fn as_raw(&self) -> &gpr_allocator {
        &self.raw
    }

    /// Allocates `size` bytes.
    ///
    /// # Errors
    ///
    /// `size == 0` fails with a parameter error on `buffer_size`; a
    /// null return from the pair fails with a memory error carrying
    /// the requested size.
    pub fn allocate(&self, size: usize) -> GprResult<NonNull<u8>> {
        if size == 0 {
            return Err(GprError::parameter(
                "buffer_size",
                "buffer size must be greater than zero",
            ));
        }
        // Safety: the pair contract is alloc(size) -> valid block or null.
        let p = unsafe { (self.raw.Alloc)(size) };
        NonNull::new(p.cast::<u8>()).ok_or(GprError::Memory {
            requested_size: size,
        })
    }

    /// Releases a block previously returned by this pair.
    ///
    /// # Safety
    ///
    /// `ptr` must have been allocated by this allocator pair and must
    /// not be released again afterwards.
    pub unsafe fn free(&self, ptr: *mut u8) {
        (self.raw.Free)(ptr.cast::<c_void>());
    }

    /// Releases a raw codec buffer and nulls it.
    ///
    /// A no-op when the buffer pointer is already null, so release
    /// sites on error paths never double-free.
    ///
    /// # Safety
    ///
    /// A non-null `buf.buffer` must have been allocated by this pair
    /// and must not be referenced after the call.
    pub unsafe fn release_raw(&self, buf: &mut gpr_sys::gpr_buffer) {
        if !buf.buffer.is_null() {
            (self.raw.Free)(buf.buffer);
            buf.buffer = std::ptr::null_mut();
            buf.size = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_size_allocation_is_a_parameter_error() {
        let err = Allocator::global().allocate(0).unwrap_err();
        match err {
            GprError::Parameter { name, .. } => assert_eq!(name, "buffer_size"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    // The global counters are shared with every other test in this
    // binary, so balance checks here run through a private pair.
    static TEST_ALLOCS: AtomicU64 = AtomicU64::new(0);
    static TEST_FREES: AtomicU64 = AtomicU64::new(0);

    unsafe extern "C" fn counting_alloc(size: usize) -> *mut c_void {
        TEST_ALLOCS.fetch_add(1, Ordering::Relaxed);
        libc::malloc(size)
    }

    unsafe extern "C" fn counting_free(p: *mut c_void) {
        TEST_FREES.fetch_add(1, Ordering::Relaxed);
        libc::free(p);
    }

    fn counting_allocator() -> Allocator {
        Allocator::from_raw(gpr_allocator {
            Alloc: counting_alloc,
            Free: counting_free,
        })
    }

    fn counting_delta() -> (u64, u64) {
        (
            TEST_ALLOCS.load(Ordering::Relaxed),
            TEST_FREES.load(Ordering::Relaxed),
        )
    }

    #[test]
    fn allocate_and_free_balance_counters() {
        let alloc = counting_allocator();
        let (allocs_before, frees_before) = counting_delta();

        let p = alloc.allocate(128).unwrap();
        unsafe { alloc.free(p.as_ptr()) };

        let (allocs, frees) = counting_delta();
        assert!(allocs > allocs_before);
        assert_eq!(allocs - allocs_before, frees - frees_before);
    }

    #[test]
    fn release_raw_is_idempotent() {
        let alloc = Allocator::global();
        let p = alloc.allocate(16).unwrap();
        let mut raw = gpr_sys::gpr_buffer {
            buffer: p.as_ptr().cast(),
            size: 16,
        };

        unsafe {
            alloc.release_raw(&mut raw);
            assert!(raw.is_null());
            // Second release must be a no-op, never a fault.
            alloc.release_raw(&mut raw);
        }
        assert!(raw.is_null());
    }
}
