//! Content-addressed cache key generation.

use sha2::{Digest, Sha256};

/// Compute a content-addressed cache key for a query.
///
/// The digest covers the query bytes exactly as given. No whitespace or
/// case normalization is applied, so textually different queries never
/// share a key.
pub fn compute_cache_key(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    hex::encode(hasher.finalize())
}
