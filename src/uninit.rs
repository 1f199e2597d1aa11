//! Bulk construction into raw storage with all-or-nothing semantics.
//!
//! Every function writes into a slice of uninitialized slots and returns the initialized prefix.
//! If producing element `k` fails, by `Err` or by panic, the `k` elements already written are
//! destroyed before the failure propagates and the destination is left uninitialized.
//!
//! Moves in Rust are always bitwise, so the `move` variants cannot fail on the write itself; they
//! can only fail while pulling the next item from the source iterator.

use core::convert::Infallible;
use core::mem::MaybeUninit;
use core::ptr::{self, NonNull};

use scopeguard::{guard, ScopeGuard};

use crate::construct::destroy_range;

/// Writes each item of `values` into the next slot of `dest` and returns the written prefix.
/// On an `Err` item, a panic, or more items than slots, the values written so far are destroyed.
fn init_prefix<T, E>(
    dest: &mut [MaybeUninit<T>],
    values: impl Iterator<Item = Result<T, E>>,
) -> Result<&mut [T], E> {
    let mut built = guard((dest, 0usize), |(dest, len)| {
        let first = NonNull::from(&mut *dest).cast::<T>();
        // SAFETY: Exactly the first `len` slots hold live values, and nothing else owns them.
        unsafe { destroy_range(first, len) }
    });
    for value in values {
        let value = value?;
        let (dest, len) = &mut *built;
        assert!(*len < dest.len(), "destination too small: holds {} elements", dest.len());
        dest[*len].write(value);
        *len += 1;
    }
    let (dest, len) = ScopeGuard::into_inner(built);
    // SAFETY: The first `len` slots were written above.
    Ok(unsafe { core::slice::from_raw_parts_mut(dest.as_mut_ptr().cast::<T>(), len) })
}

#[inline]
fn into_ok<T>(r: Result<T, Infallible>) -> T {
    match r {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

#[track_caller]
fn check_room(n: usize, room: usize) {
    assert!(n <= room, "cannot construct {n} elements into {room} slots");
}

/// Constructs `n` elements with `make(i)` into the front of `dest`.
///
/// # Errors
/// The first error returned by `make`; everything built before it has been dropped.
///
/// # Panics
/// If `n > dest.len()`, or if `make` panics (after rolling back).
pub fn try_uninitialized_fill_with<T, E>(
    dest: &mut [MaybeUninit<T>],
    n: usize,
    make: impl FnMut(usize) -> Result<T, E>,
) -> Result<&mut [T], E> {
    check_room(n, dest.len());
    init_prefix(&mut dest[..n], (0..n).map(make))
}

/// Clones all of `src` into the front of `dest`.
pub fn uninitialized_copy<'a, T: Clone>(src: &[T], dest: &'a mut [MaybeUninit<T>]) -> &'a mut [T] {
    uninitialized_copy_n(src, src.len(), dest)
}

/// Clones the first `n` elements of `src` into the front of `dest`.
pub fn uninitialized_copy_n<'a, T: Clone>(
    src: &[T],
    n: usize,
    dest: &'a mut [MaybeUninit<T>],
) -> &'a mut [T] {
    check_room(n, src.len());
    into_ok(try_uninitialized_fill_with(dest, n, |i| Ok(src[i].clone())))
}

/// Flat copy for `Copy` types; observably identical to [`uninitialized_copy`].
pub fn uninitialized_copy_bitwise<'a, T: Copy>(
    src: &[T],
    dest: &'a mut [MaybeUninit<T>],
) -> &'a mut [T] {
    let n = src.len();
    check_room(n, dest.len());
    // SAFETY: A shared and a unique borrow never overlap; T: Copy has no drop glue to roll back.
    unsafe {
        ptr::copy_nonoverlapping(src.as_ptr(), dest.as_mut_ptr().cast::<T>(), n);
        core::slice::from_raw_parts_mut(dest.as_mut_ptr().cast::<T>(), n)
    }
}

/// Moves `n` live values from `src` into uninitialized storage at `dest`. Afterwards the source
/// slots are logically uninitialized.
///
/// # Safety
/// `src` must hold `n` live values, `dest` must be valid for `n` writes, and the two ranges must
/// not overlap (checked in debug builds).
pub unsafe fn relocate<T>(src: *const T, dest: *mut T, n: usize) {
    debug_assert!(
        {
            let size = core::mem::size_of::<T>() * n;
            let (s, d) = (src as usize, dest as usize);
            size == 0 || s + size <= d || d + size <= s
        },
        "relocate: source and destination overlap"
    );
    // SAFETY: Guaranteed by the caller.
    unsafe { ptr::copy_nonoverlapping(src, dest, n) }
}

/// Moves every item of `src` into the front of `dest`.
///
/// # Panics
/// If `src` yields more items than `dest` holds (after rolling back).
pub fn uninitialized_move<T, I>(src: I, dest: &mut [MaybeUninit<T>]) -> &mut [T]
where
    I: IntoIterator<Item = T>,
{
    into_ok(init_prefix(dest, src.into_iter().map(Ok)))
}

/// Moves exactly `n` items of `src` into the front of `dest`.
///
/// # Panics
/// If `src` runs out before `n` items or `n > dest.len()` (after rolling back).
pub fn uninitialized_move_n<T, I>(src: I, n: usize, dest: &mut [MaybeUninit<T>]) -> &mut [T]
where
    I: IntoIterator<Item = T>,
{
    let mut it = src.into_iter();
    into_ok(try_uninitialized_fill_with(dest, n, |i| {
        Ok(it
            .next()
            .unwrap_or_else(|| panic!("source exhausted after {i} of {n} elements")))
    }))
}

/// Fills every slot of `dest` with a clone of `value`.
pub fn uninitialized_fill<'a, T: Clone>(dest: &'a mut [MaybeUninit<T>], value: &T) -> &'a mut [T] {
    let n = dest.len();
    uninitialized_fill_n(dest, n, value)
}

/// Fills the first `n` slots of `dest` with clones of `value`.
pub fn uninitialized_fill_n<'a, T: Clone>(
    dest: &'a mut [MaybeUninit<T>],
    n: usize,
    value: &T,
) -> &'a mut [T] {
    into_ok(try_uninitialized_fill_with(dest, n, |_| Ok(value.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::ManuallyDrop;
    use std::cell::Cell;
    use std::panic::{self, AssertUnwindSafe};
    use std::rc::Rc;

    /// Clone fails (panics) on the `fail_at`-th clone overall; every drop is counted.
    struct Flaky {
        id: usize,
        clones: Rc<Cell<usize>>,
        drops: Rc<Cell<usize>>,
        fail_at: usize,
    }

    impl Clone for Flaky {
        fn clone(&self) -> Self {
            let n = self.clones.get() + 1;
            self.clones.set(n);
            if n == self.fail_at {
                panic!("clone #{n} failed");
            }
            Flaky {
                id: self.id,
                clones: self.clones.clone(),
                drops: self.drops.clone(),
                fail_at: self.fail_at,
            }
        }
    }

    impl Drop for Flaky {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    fn flaky_source(n: usize, fail_at: usize) -> (Vec<Flaky>, Rc<Cell<usize>>) {
        let clones = Rc::new(Cell::new(0));
        let drops = Rc::new(Cell::new(0));
        let src = (0..n)
            .map(|id| Flaky {
                id,
                clones: clones.clone(),
                drops: drops.clone(),
                fail_at,
            })
            .collect();
        (src, drops)
    }

    /// Invariant: a panic on the k-th clone destroys exactly the k-1 clones already made.
    #[test]
    fn copy_rolls_back_on_panicking_clone() {
        let (src, drops) = flaky_source(6, 4);
        let mut dest: Vec<MaybeUninit<Flaky>> = (0..6).map(|_| MaybeUninit::uninit()).collect();
        let res = panic::catch_unwind(AssertUnwindSafe(|| {
            uninitialized_copy(&src, &mut dest);
        }));
        assert!(res.is_err());
        assert_eq!(drops.get(), 3);
        drop(src);
        assert_eq!(drops.get(), 9);
    }

    /// Invariant: an `Err` from the k-th constructor call destroys exactly k-1 values and the
    /// error reaches the caller unchanged.
    #[test]
    fn fill_with_rolls_back_on_error() {
        let drops = Rc::new(Cell::new(0));
        struct D(Rc<Cell<usize>>);
        impl Drop for D {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }
        let mut dest: Vec<MaybeUninit<D>> = (0..10).map(|_| MaybeUninit::uninit()).collect();
        let res = try_uninitialized_fill_with(&mut dest, 10, |i| {
            if i == 6 {
                Err(format!("ctor {i}"))
            } else {
                Ok(D(drops.clone()))
            }
        });
        assert_eq!(res.err().as_deref(), Some("ctor 6"));
        assert_eq!(drops.get(), 6);
    }

    #[test]
    fn copy_n_and_fill_n_construct_prefix_only() {
        let src = vec![String::from("a"), String::from("b"), String::from("c")];
        let mut dest: Vec<MaybeUninit<String>> = (0..5).map(|_| MaybeUninit::uninit()).collect();
        let done = uninitialized_copy_n(&src, 2, &mut dest);
        assert_eq!(done, ["a", "b"]);
        unsafe { ptr::drop_in_place(done as *mut [String]) };

        let filled = uninitialized_fill_n(&mut dest, 3, &String::from("x"));
        assert_eq!(filled, ["x", "x", "x"]);
        unsafe { ptr::drop_in_place(filled as *mut [String]) };
    }

    #[test]
    fn fill_covers_whole_destination() {
        let mut dest = [MaybeUninit::<u8>::uninit(); 4];
        assert_eq!(uninitialized_fill(&mut dest, &7), [7, 7, 7, 7]);
    }

    #[test]
    fn bitwise_copy_matches_clone_path() {
        let src = [1u32, 2, 3, 4];
        let mut a = [MaybeUninit::<u32>::uninit(); 4];
        let mut b = [MaybeUninit::<u32>::uninit(); 4];
        let slow = uninitialized_copy(&src, &mut a).to_vec();
        let fast = uninitialized_copy_bitwise(&src, &mut b).to_vec();
        assert_eq!(slow, fast);
    }

    #[test]
    fn move_consumes_source_iterator() {
        let src = vec![String::from("p"), String::from("q")];
        let mut dest: Vec<MaybeUninit<String>> = (0..3).map(|_| MaybeUninit::uninit()).collect();
        let moved = uninitialized_move(src, &mut dest);
        assert_eq!(moved, ["p", "q"]);
        unsafe { ptr::drop_in_place(moved as *mut [String]) };
    }

    #[test]
    fn move_n_rolls_back_when_source_runs_dry() {
        let drops = Rc::new(Cell::new(0));
        struct D(Rc<Cell<usize>>);
        impl Drop for D {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }
        let src: Vec<D> = (0..2).map(|_| D(drops.clone())).collect();
        let mut dest: Vec<MaybeUninit<D>> = (0..4).map(|_| MaybeUninit::uninit()).collect();
        let res = panic::catch_unwind(AssertUnwindSafe(|| {
            uninitialized_move_n(src, 4, &mut dest);
        }));
        assert!(res.is_err());
        assert_eq!(drops.get(), 2, "moved values are destroyed exactly once");
    }

    #[test]
    fn move_rolls_back_when_source_overflows() {
        let (src, drops) = flaky_source(4, usize::MAX);
        let mut dest: Vec<MaybeUninit<Flaky>> = (0..3).map(|_| MaybeUninit::uninit()).collect();
        let res = panic::catch_unwind(AssertUnwindSafe(|| {
            uninitialized_move(src, &mut dest);
        }));
        assert!(res.is_err());
        assert_eq!(drops.get(), 4, "three written values and the rejected one");
    }

    #[test]
    #[should_panic(expected = "cannot construct 3 elements into 2 slots")]
    fn oversized_request_panics() {
        let mut dest = [MaybeUninit::<u8>::uninit(); 2];
        uninitialized_fill_n(&mut dest, 3, &0);
    }

    #[test]
    fn relocate_moves_live_values() {
        let mut src = ManuallyDrop::new(vec![String::from("m"), String::from("n")]);
        let mut dest: Vec<MaybeUninit<String>> = (0..2).map(|_| MaybeUninit::uninit()).collect();
        unsafe {
            relocate(src.as_ptr(), dest.as_mut_ptr().cast::<String>(), 2);
            src.set_len(0);
            ManuallyDrop::drop(&mut src);
            let moved = core::slice::from_raw_parts_mut(dest.as_mut_ptr().cast::<String>(), 2);
            assert_eq!(moved, ["m", "n"]);
            ptr::drop_in_place(moved as *mut [String]);
        }
    }
}
