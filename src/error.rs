//! Error taxonomy shared by the allocation layer, the engines and the containers.
//!
//! Allocation and length failures are resource errors; out-of-range errors are programmer errors
//! surfaced through checked accessors. Duplicate-key rejection is not an error here: unique
//! inserts hand the value back in a [`Rejected`].

use core::alloc::Layout;
use core::fmt;

/// A raw storage request could not be satisfied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("memory allocation of {} bytes (align {}) failed", .layout.size(), .layout.align())]
pub struct AllocError {
    pub layout: Layout,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Alloc(#[from] AllocError),

    #[error("requested length {requested} exceeds the maximum of {max}")]
    Length { requested: usize, max: usize },

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("key not found")]
    KeyNotFound,

    #[error("invalid max load factor {0}")]
    InvalidLoadFactor(f32),
}

impl Error {
    pub fn is_alloc(&self) -> bool {
        matches!(self, Error::Alloc(_))
    }

    pub fn is_length(&self) -> bool {
        matches!(self, Error::Length { .. })
    }

    /// Out-of-range covers bad indices, missing keys on checked lookups and invalid arguments.
    pub fn is_out_of_range(&self) -> bool {
        matches!(
            self,
            Error::IndexOutOfRange { .. } | Error::KeyNotFound | Error::InvalidLoadFactor(_)
        )
    }
}

/// A unique insert found an equivalent entry. Carries the position of the entry already present
/// and the value that was not inserted.
pub struct Rejected<H, T> {
    pub existing: H,
    pub value: T,
}

impl<H: fmt::Debug, T> fmt::Debug for Rejected<H, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("existing", &self.existing)
            .finish_non_exhaustive()
    }
}

pub(crate) trait ResultExt<T> {
    /// Unwraps, panicking with the error's own message.
    fn throw(self) -> T;
}

impl<T> ResultExt<T> for Result<T, Error> {
    #[track_caller]
    fn throw(self) -> T {
        match self {
            Ok(value) => value,
            Err(error) => panic!("{}", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_disjoint() {
        let alloc = Error::from(AllocError {
            layout: Layout::new::<u64>(),
        });
        let length = Error::Length {
            requested: 10,
            max: 5,
        };
        let range = Error::IndexOutOfRange { index: 3, len: 3 };

        assert!(alloc.is_alloc() && !alloc.is_length() && !alloc.is_out_of_range());
        assert!(length.is_length() && !length.is_alloc() && !length.is_out_of_range());
        assert!(range.is_out_of_range() && !range.is_alloc() && !range.is_length());
        assert!(Error::KeyNotFound.is_out_of_range());
        assert!(Error::InvalidLoadFactor(-1.0).is_out_of_range());
    }

    #[test]
    fn messages_name_the_failure() {
        let e = Error::IndexOutOfRange { index: 7, len: 2 };
        assert_eq!(e.to_string(), "index 7 out of range for length 2");
        let e = Error::from(AllocError {
            layout: Layout::array::<u32>(4).unwrap(),
        });
        assert_eq!(e.to_string(), "memory allocation of 16 bytes (align 4) failed");
    }

    #[test]
    #[should_panic(expected = "key not found")]
    fn throw_panics_with_message() {
        let r: Result<(), Error> = Err(Error::KeyNotFound);
        r.throw();
    }
}
