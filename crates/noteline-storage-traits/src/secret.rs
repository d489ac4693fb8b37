use std::fmt;
use std::ops::Deref;

use zeroize::ZeroizeOnDrop;

/// Key material that is wiped from memory when dropped.
///
/// Used for contact pre-shared secrets, derived ratchet keys and identity
/// seeds. The `Debug` output never contains the wrapped value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret<T: zeroize::Zeroize>(T);

impl<T> Secret<T>
where
    T: zeroize::Zeroize,
{
    /// Wrap a value
    pub fn new(value: T) -> Self {
        Self(value)
    }
}

impl Secret<Vec<u8>> {
    /// Copy a byte slice into a new secret
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// Length of the wrapped bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the wrapped byte vector is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> AsRef<T> for Secret<T>
where
    T: zeroize::Zeroize,
{
    fn as_ref(&self) -> &T {
        &self.0
    }
}

impl<T> Deref for Secret<T>
where
    T: zeroize::Zeroize,
{
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> Drop for Secret<T>
where
    T: zeroize::Zeroize,
{
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T> ZeroizeOnDrop for Secret<T> where T: zeroize::Zeroize {}

impl<T> fmt::Debug for Secret<T>
where
    T: zeroize::Zeroize,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

pub use zeroize::Zeroize;
