//! Cache key generation.
//!
//! Keys are digests over the canonical byte form of a parameter set (see
//! [`Params::canonical_bytes`]), so logically identical requests map to the
//! same key regardless of how their parameters were assembled. The digest
//! algorithm is a type parameter.

use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;
use sha2::{Digest, Sha256, Sha512};

use crate::params::Params;

// =============================================================================
// Cache Key
// =============================================================================

/// Opaque digest identifying a cacheable result.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Bytes);

impl CacheKey {
    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex rendering, for logs and file names.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", self.to_hex())
    }
}

// =============================================================================
// Key Generators
// =============================================================================

/// Maps a parameter set to a cache key.
pub trait KeyGenerator: Send + Sync {
    fn generate(&self, params: &Params) -> CacheKey;
}

/// Hashes the canonical form of a parameter set with digest `D`.
///
/// # Example
///
/// ```
/// use pixserve::cache::{KeyGenerator, ParamsHashKeyGenerator};
/// use pixserve::params::Params;
/// use sha2::Sha512;
///
/// let keys = ParamsHashKeyGenerator::<Sha512>::new();
/// let a = keys.generate(&Params::from([("w", 10), ("h", 20)]));
/// let b = keys.generate(&Params::from([("h", 20), ("w", 10)]));
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 64);
/// ```
pub struct ParamsHashKeyGenerator<D> {
    namespace: Option<String>,
    _digest: PhantomData<fn() -> D>,
}

/// SHA-256 key generator.
pub type Sha256KeyGenerator = ParamsHashKeyGenerator<Sha256>;

/// SHA-512 key generator.
pub type Sha512KeyGenerator = ParamsHashKeyGenerator<Sha512>;

impl<D: Digest> ParamsHashKeyGenerator<D> {
    pub fn new() -> Self {
        Self {
            namespace: None,
            _digest: PhantomData,
        }
    }

    /// Hash a namespace in front of every key.
    ///
    /// Pipelines sharing one cache but producing different results for the
    /// same parameters must use distinct namespaces.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

impl<D: Digest> Default for ParamsHashKeyGenerator<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Digest> KeyGenerator for ParamsHashKeyGenerator<D> {
    fn generate(&self, params: &Params) -> CacheKey {
        let mut hasher = D::new();
        if let Some(ref namespace) = self.namespace {
            // Tagged and length-prefixed; no canonical form starts with 'N'
            hasher.update(b"N");
            hasher.update((namespace.len() as u64).to_be_bytes());
            hasher.update(namespace.as_bytes());
        }
        hasher.update(params.canonical_bytes());
        CacheKey(Bytes::from(hasher.finalize().to_vec()))
    }
}

/// Key generator backed by a closure.
pub struct KeyGeneratorFn<F>(pub F);

impl<F> KeyGenerator for KeyGeneratorFn<F>
where
    F: Fn(&Params) -> CacheKey + Send + Sync,
{
    fn generate(&self, params: &Params) -> CacheKey {
        (self.0)(params)
    }
}
