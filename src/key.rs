//! Request-shape keys and their 64-bit hash.

use std::hash::Hasher;

use fnv::FnvHasher;

/// Identity of a class of requests whose sampling decisions are shared:
/// HTTP method, route template, and response status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SamplingKey<'a> {
    pub method: &'a str,
    pub route: &'a str,
    /// Expected in `100..=599`; only the low 16 bits take part in the hash.
    pub status_code: u16,
}

impl<'a> SamplingKey<'a> {
    pub fn new(method: &'a str, route: &'a str, status_code: u16) -> Self {
        SamplingKey {
            method,
            route,
            status_code,
        }
    }

    /// Folds the key into 64 bits with FNV-1a.
    ///
    /// Each string field is followed by a 0 byte so that, for example,
    /// `("GET", "/a")` and `("GE", "T/a")` hash differently. The status code
    /// is written little-endian, so the hash is the same on every platform and
    /// for the whole process lifetime.
    pub fn hash(&self) -> u64 {
        let mut hasher = FnvHasher::default();
        hasher.write(self.method.as_bytes());
        hasher.write_u8(0);
        hasher.write(self.route.as_bytes());
        hasher.write_u8(0);
        hasher.write(&self.status_code.to_le_bytes());
        hasher.finish()
    }
}
