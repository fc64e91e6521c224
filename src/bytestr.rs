use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// An immutable, cheaply-cloneable byte string.
///
/// Header names and values, parsed line components, hostnames and paths are
/// all carried as `ByteStr`s. Cloning shares the underlying storage; the
/// bytes are released when the last clone is dropped. Process-wide constants
/// are built with [`ByteStr::from_static`] and never allocate.
#[derive(Clone)]
pub struct ByteStr {
    inner: Inner,
}

#[derive(Clone)]
enum Inner {
    Static(&'static [u8]),
    Shared(Arc<[u8]>),
}

/// The process-wide empty byte string.
pub const EMPTY: ByteStr = ByteStr::from_static(b"");

impl ByteStr {
    /// Wrap a static byte slice without allocating.
    pub const fn from_static(bytes: &'static [u8]) -> Self {
        Self {
            inner: Inner::Static(bytes),
        }
    }

    /// Copy `bytes` into shared storage.
    pub fn copy_from(bytes: &[u8]) -> Self {
        Self {
            inner: Inner::Shared(Arc::from(bytes)),
        }
    }

    pub fn empty() -> Self {
        EMPTY
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.inner {
            Inner::Static(bytes) => bytes,
            Inner::Shared(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Lossy UTF-8 view, for diagnostics and logging.
    pub fn to_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    /// ASCII case-insensitive equality.
    pub fn eq_nocase(&self, other: &[u8]) -> bool {
        self.as_bytes().eq_ignore_ascii_case(other)
    }

    /// ASCII case-insensitive suffix test.
    pub fn ends_with_nocase(&self, suffix: &[u8]) -> bool {
        let bytes = self.as_bytes();
        if suffix.len() > bytes.len() {
            return false;
        }
        bytes[bytes.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
    }

    /// ASCII case-insensitive prefix test.
    pub fn starts_with_nocase(&self, prefix: &[u8]) -> bool {
        let bytes = self.as_bytes();
        if prefix.len() > bytes.len() {
            return false;
        }
        bytes[..prefix.len()].eq_ignore_ascii_case(prefix)
    }

    /// Byte-exact prefix test.
    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.as_bytes().starts_with(prefix)
    }
}

impl Deref for ByteStr {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for ByteStr {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl From<&[u8]> for ByteStr {
    fn from(bytes: &[u8]) -> Self {
        Self::copy_from(bytes)
    }
}

impl From<&str> for ByteStr {
    fn from(s: &str) -> Self {
        Self::copy_from(s.as_bytes())
    }
}

impl From<String> for ByteStr {
    fn from(s: String) -> Self {
        Self::copy_from(s.as_bytes())
    }
}

impl From<Vec<u8>> for ByteStr {
    fn from(bytes: Vec<u8>) -> Self {
        Self {
            inner: Inner::Shared(Arc::from(bytes.into_boxed_slice())),
        }
    }
}

impl PartialEq for ByteStr {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for ByteStr {}

impl PartialEq<[u8]> for ByteStr {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl PartialEq<&str> for ByteStr {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Hash for ByteStr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl fmt::Debug for ByteStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{:?}", self.to_str_lossy())
    }
}

impl fmt::Display for ByteStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str_lossy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_bytestr_does_not_allocate_per_clone() {
        let a = ByteStr::from_static(b"Host");
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn nocase_comparisons() {
        let host = ByteStr::from("WWW.Example.COM");
        assert!(host.eq_nocase(b"www.example.com"));
        assert!(host.ends_with_nocase(b"example.com"));
        assert!(host.starts_with_nocase(b"www."));
        assert!(!host.ends_with_nocase(b"example.org"));
    }

    #[test]
    fn suffix_longer_than_value_does_not_match() {
        let host = ByteStr::from("a.com");
        assert!(!host.ends_with_nocase(b"wwww.a.com"));
    }

    #[test]
    fn empty_sentinel_is_shared() {
        assert!(EMPTY.is_empty());
        assert_eq!(ByteStr::empty(), EMPTY);
    }
}
