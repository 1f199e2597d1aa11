//! Object lifetime inside raw storage: construct in place, destroy in place.
//!
//! None of these functions allocate or free memory.

use core::mem;
use core::ptr::{self, NonNull};

/// Moves `value` into the uninitialized slot at `ptr`.
///
/// # Safety
/// `ptr` must be valid for writes, aligned, and must not hold a live value (it would be leaked).
#[inline]
pub unsafe fn construct<T>(ptr: NonNull<T>, value: T) {
    // SAFETY: Guaranteed by the caller.
    unsafe { ptr.as_ptr().write(value) }
}

/// Builds a value with `make` and writes it at `ptr`. If `make` panics, the slot stays
/// uninitialized.
///
/// # Safety
/// Same as [`construct`].
#[inline]
pub unsafe fn construct_with<T>(ptr: NonNull<T>, make: impl FnOnce() -> T) {
    let value = make();
    // SAFETY: Guaranteed by the caller.
    unsafe { construct(ptr, value) }
}

/// Fallible form of [`construct_with`]. On `Err` the slot stays uninitialized.
///
/// # Safety
/// Same as [`construct`].
#[inline]
pub unsafe fn try_construct_with<T, E>(
    ptr: NonNull<T>,
    make: impl FnOnce() -> Result<T, E>,
) -> Result<(), E> {
    let value = make()?;
    // SAFETY: Guaranteed by the caller.
    unsafe { construct(ptr, value) };
    Ok(())
}

/// Runs the destructor of the value at `ptr`, leaving the slot uninitialized.
///
/// # Safety
/// `ptr` must hold a live value that nothing else will drop.
#[inline]
pub unsafe fn destroy<T>(ptr: NonNull<T>) {
    if mem::needs_drop::<T>() {
        // SAFETY: Guaranteed by the caller.
        unsafe { ptr::drop_in_place(ptr.as_ptr()) }
    }
}

/// Destroys the `len` consecutive values starting at `first`.
///
/// # Safety
/// All `len` slots must hold live values that nothing else will drop.
#[inline]
pub unsafe fn destroy_range<T>(first: NonNull<T>, len: usize) {
    if mem::needs_drop::<T>() {
        // SAFETY: Guaranteed by the caller; drop_in_place on a slice drops every element even if
        // one of the destructors panics.
        unsafe { ptr::drop_in_place(ptr::slice_from_raw_parts_mut(first.as_ptr(), len)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::RawBuf;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counted(Rc<Cell<usize>>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn slot<T>(buf: &RawBuf<T>, i: usize) -> NonNull<T> {
        assert!(i < buf.capacity());
        // SAFETY: In bounds of a live allocation.
        unsafe { NonNull::new_unchecked(buf.as_ptr().add(i)) }
    }

    #[test]
    fn construct_then_destroy_runs_drop_once() {
        let drops = Rc::new(Cell::new(0));
        let buf: RawBuf<Counted> = RawBuf::with_capacity(1).unwrap();
        let p = slot(&buf, 0);
        unsafe {
            construct(p, Counted(drops.clone()));
            assert_eq!(drops.get(), 0);
            destroy(p);
        }
        assert_eq!(drops.get(), 1);
        drop(buf);
        assert_eq!(drops.get(), 1, "the record itself never drops values");
    }

    #[test]
    fn failed_construction_leaves_slot_empty() {
        let buf: RawBuf<String> = RawBuf::with_capacity(1).unwrap();
        let p = slot(&buf, 0);
        let r: Result<(), &str> = unsafe { try_construct_with(p, || Err("no")) };
        assert_eq!(r, Err("no"));
        unsafe {
            try_construct_with::<_, ()>(p, || Ok(String::from("ok"))).unwrap();
            assert_eq!(&*p.as_ptr(), "ok");
            destroy(p);
        }
    }

    #[test]
    fn destroy_range_drops_every_value() {
        let drops = Rc::new(Cell::new(0));
        let buf: RawBuf<Counted> = RawBuf::with_capacity(4).unwrap();
        for i in 0..4 {
            unsafe { construct_with(slot(&buf, i), || Counted(drops.clone())) };
        }
        unsafe { destroy_range(slot(&buf, 0), 4) };
        assert_eq!(drops.get(), 4);
    }
}
