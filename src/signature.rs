use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

/// Request signature as computed by the platform: SHA-1 over the
/// lexicographically sorted token, timestamp and nonce, hex encoded.
pub fn generate(timestamp: &str, nonce: &str, token: &str) -> String {
    let mut parts = [token, timestamp, nonce];
    parts.sort_unstable();

    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Compare a supplied signature against the expected one in constant time.
pub fn verify(timestamp: &str, nonce: &str, token: &str, signature: &str) -> bool {
    let expected = generate(timestamp, nonce, token);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}
