//! Raw storage acquisition, kept separate from object lifetime.
//!
//! An [`Allocator`] hands out and takes back untyped blocks. [`RawBuf`] is the typed allocation
//! record built on top of it: a `(pointer, capacity)` pair that owns the block but never the
//! objects inside it. Constructing and destroying those objects is the job of
//! [`construct`](crate::construct) and [`uninit`](crate::uninit).

use core::alloc::Layout;
use core::cell::Cell;
use core::marker::PhantomData;
use core::mem;
use core::ptr::NonNull;
use std::alloc as sys;

use crate::error::{AllocError, Error};

/// The allocate/deallocate half of the allocator contract. Any type implementing it can back the
/// storage of a container.
pub trait Allocator {
    /// Requests a block fitting `layout`. `layout` never has size zero.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Returns a block.
    ///
    /// # Safety
    /// `ptr` must come from `allocate` on this allocator with the same `layout`, and must not be
    /// returned twice.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

impl<A: Allocator + ?Sized> Allocator for &A {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: Forwarded verbatim, the caller upholds the contract.
        unsafe { (**self).deallocate(ptr, layout) }
    }
}

/// The process-wide global allocator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Global;

impl Allocator for Global {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        debug_assert!(layout.size() != 0);
        // SAFETY: Zero-sized layouts are never requested.
        NonNull::new(unsafe { sys::alloc(layout) }).ok_or(AllocError { layout })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: The caller guarantees ptr was allocated here with this layout.
        unsafe { sys::dealloc(ptr.as_ptr(), layout) }
    }
}

/// Allocator that counts outstanding blocks and can be armed to start failing.
///
/// Used to check that every allocation is released exactly once and that containers survive
/// allocation failure mid-operation.
#[derive(Debug, Default)]
pub struct Tracking {
    live: Cell<usize>,
    total: Cell<usize>,
    fail_after: Cell<Option<usize>>,
}

impl Tracking {
    pub const fn new() -> Tracking {
        Tracking {
            live: Cell::new(0),
            total: Cell::new(0),
            fail_after: Cell::new(None),
        }
    }

    /// Blocks handed out and not yet returned.
    pub fn live(&self) -> usize {
        self.live.get()
    }

    /// Successful allocations over the allocator's lifetime.
    pub fn total(&self) -> usize {
        self.total.get()
    }

    /// Lets `n` more allocations succeed, then fails every request until [`Tracking::disarm`].
    pub fn fail_after(&self, n: usize) {
        self.fail_after.set(Some(n));
    }

    pub fn disarm(&self) {
        self.fail_after.set(None);
    }
}

impl Allocator for Tracking {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        match self.fail_after.get() {
            Some(0) => return Err(AllocError { layout }),
            Some(n) => self.fail_after.set(Some(n - 1)),
            None => {}
        }
        let ptr = Global.allocate(layout)?;
        self.live.set(self.live.get() + 1);
        self.total.set(self.total.get() + 1);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        let live = self.live.get();
        assert!(live > 0, "Tracking allocator: deallocate without matching allocate");
        self.live.set(live - 1);
        // SAFETY: Every block handed out by this allocator came from Global.
        unsafe { Global.deallocate(ptr, layout) }
    }
}

/// The largest element count a single block of `T` can hold.
pub const fn max_len<T>() -> usize {
    match mem::size_of::<T>() {
        0 => usize::MAX,
        size => isize::MAX as usize / size,
    }
}

/// An allocation record: exclusive ownership of raw storage for `cap` values of `T`.
///
/// The record never reads, drops or otherwise touches the slots it owns. Whoever constructs values
/// inside must destroy them before the record is dropped. Dropping deallocates exactly once.
pub struct RawBuf<T, A: Allocator = Global> {
    ptr: NonNull<T>,
    cap: usize,
    alloc: A,
    _owns: PhantomData<T>,
}

// SAFETY: The record owns its block exclusively, like Vec.
unsafe impl<T: Send, A: Allocator + Send> Send for RawBuf<T, A> {}
// SAFETY: Shared access only hands out shared views of the slots.
unsafe impl<T: Sync, A: Allocator + Sync> Sync for RawBuf<T, A> {}

impl<T> RawBuf<T> {
    pub fn with_capacity(cap: usize) -> Result<RawBuf<T>, Error> {
        RawBuf::try_new_in(cap, Global)
    }
}

impl<T, A: Allocator> RawBuf<T, A> {
    /// An empty record. Performs no allocation.
    pub const fn new_in(alloc: A) -> RawBuf<T, A> {
        RawBuf {
            ptr: NonNull::dangling(),
            cap: 0,
            alloc,
            _owns: PhantomData,
        }
    }

    /// Allocates uninitialized storage for `cap` values.
    ///
    /// # Errors
    /// [`Error::Length`] if `cap` exceeds [`max_len`], checked before anything is requested from
    /// the allocator; [`Error::Alloc`] if the allocator refuses.
    pub fn try_new_in(cap: usize, alloc: A) -> Result<RawBuf<T, A>, Error> {
        if cap == 0 || mem::size_of::<T>() == 0 {
            return Ok(RawBuf {
                ptr: NonNull::dangling(),
                cap: if mem::size_of::<T>() == 0 { cap } else { 0 },
                alloc,
                _owns: PhantomData,
            });
        }
        let layout = Self::layout_for(cap)?;
        let ptr = alloc.allocate(layout).inspect_err(|e| {
            log::warn!("{e}");
        })?;
        Ok(RawBuf {
            ptr: ptr.cast(),
            cap,
            alloc,
            _owns: PhantomData,
        })
    }

    fn layout_for(cap: usize) -> Result<Layout, Error> {
        Layout::array::<T>(cap).map_err(|_| Error::Length {
            requested: cap,
            max: max_len::<T>(),
        })
    }

    pub const fn capacity(&self) -> usize {
        self.cap
    }

    pub const fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// The whole block viewed as uninitialized slots.
    pub fn slots_mut(&mut self) -> &mut [mem::MaybeUninit<T>] {
        // SAFETY: The block holds `cap` properly aligned slots owned exclusively by self, and
        // MaybeUninit<T> imposes no validity requirement on the contents.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr().cast(), self.cap) }
    }

    /// Views the first `len` slots as initialized values.
    ///
    /// # Safety
    /// The first `len` slots must hold live values.
    pub unsafe fn as_slice(&self, len: usize) -> &[T] {
        debug_assert!(len <= self.cap);
        // SAFETY: Guaranteed by the caller.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), len) }
    }

    /// Mutable form of [`RawBuf::as_slice`].
    ///
    /// # Safety
    /// The first `len` slots must hold live values.
    pub unsafe fn as_mut_slice(&mut self, len: usize) -> &mut [T] {
        debug_assert!(len <= self.cap);
        // SAFETY: Guaranteed by the caller.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), len) }
    }
}

impl<T, A: Allocator + Default> RawBuf<T, A> {
    /// Moves the allocation out, leaving an empty record in its place.
    pub fn take(&mut self) -> RawBuf<T, A> {
        mem::replace(self, RawBuf::new_in(A::default()))
    }
}

impl<T, A: Allocator> Drop for RawBuf<T, A> {
    fn drop(&mut self) {
        if self.cap == 0 || mem::size_of::<T>() == 0 {
            return;
        }
        // Same computation that succeeded in try_new_in.
        if let Ok(layout) = Self::layout_for(self.cap) {
            // SAFETY: ptr was allocated by self.alloc with exactly this layout and is released
            // only here.
            unsafe { self.alloc.deallocate(self.ptr.cast(), layout) }
        }
    }
}

impl<T, A: Allocator> core::fmt::Debug for RawBuf<T, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RawBuf")
            .field("ptr", &self.ptr)
            .field("cap", &self.cap)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_length_request_does_not_allocate() {
        let alloc = Tracking::new();
        let buf = RawBuf::<u64, _>::try_new_in(0, &alloc).unwrap();
        assert_eq!(buf.capacity(), 0);
        assert_eq!(alloc.total(), 0);
        drop(buf);
        assert_eq!(alloc.live(), 0);
    }

    #[test]
    fn zero_sized_types_never_allocate() {
        let alloc = Tracking::new();
        let buf = RawBuf::<(), _>::try_new_in(1_000, &alloc).unwrap();
        assert_eq!(buf.capacity(), 1_000);
        assert_eq!(alloc.total(), 0);
    }

    #[test]
    fn deallocates_exactly_once() {
        let alloc = Tracking::new();
        {
            let a = RawBuf::<u32, _>::try_new_in(16, &alloc).unwrap();
            let moved = a;
            assert_eq!(alloc.live(), 1);
            assert_eq!(moved.capacity(), 16);
        }
        assert_eq!(alloc.live(), 0);
        assert_eq!(alloc.total(), 1);
    }

    #[test]
    fn oversize_request_is_a_length_error_before_allocating() {
        let alloc = Tracking::new();
        let err = RawBuf::<u64, _>::try_new_in(usize::MAX / 2, &alloc).unwrap_err();
        assert!(err.is_length(), "{err:?}");
        assert_eq!(alloc.total(), 0);
    }

    #[test]
    fn armed_allocator_fails_after_budget() {
        let alloc = Tracking::new();
        alloc.fail_after(1);
        let first = RawBuf::<u8, _>::try_new_in(8, &alloc);
        assert!(first.is_ok());
        let second = RawBuf::<u8, _>::try_new_in(8, &alloc).unwrap_err();
        assert!(second.is_alloc());
        alloc.disarm();
        assert!(RawBuf::<u8, _>::try_new_in(8, &alloc).is_ok());
    }

    #[test]
    fn take_leaves_empty_record() {
        let mut buf: RawBuf<u16> = RawBuf::with_capacity(4).unwrap();
        let taken = buf.take();
        assert_eq!(buf.capacity(), 0);
        assert_eq!(taken.capacity(), 4);
    }

    #[test]
    fn max_len_accounts_for_element_size() {
        assert_eq!(max_len::<u8>(), isize::MAX as usize);
        assert_eq!(max_len::<u64>(), isize::MAX as usize / 8);
        assert_eq!(max_len::<()>(), usize::MAX);
    }
}
