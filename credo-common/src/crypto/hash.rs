//! Content addressing used by every component.
//!
//! The proof digest is a placeholder for a pluggable proof verifier: it is a
//! SHA-256 over the credential's identifying fields, hex encoded (64 chars).

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::types::CredentialClass;

/// Length of every hex digest produced by this module.
pub const DIGEST_HEX_LEN: usize = 64;

/// Computes the SHA-256 digest of the given data and returns it as a hex string.
pub fn digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Renders a JSON value with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Computes the proof digest of a credential.
///
/// The hash covers, in order:
/// - subject identifier
/// - credential class
/// - canonicalized metadata
/// - issuance time (milliseconds)
///
/// Fields are separated by `|` so that adjacent values cannot run together.
pub fn compute_proof_hash(
    subject_id: &str,
    class: CredentialClass,
    metadata: &Value,
    issued_at: u64,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(subject_id.as_bytes());
    hasher.update(b"|");
    hasher.update(class.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(canonical_json(metadata).as_bytes());
    hasher.update(b"|");
    hasher.update(issued_at.to_le_bytes());
    hex::encode(hasher.finalize())
}

/// Derives an IPFS-style content identifier (`Qm` + base58 SHA-256) for any
/// serializable record.
pub fn derive_cid<T: Serialize>(record: &T) -> Result<String> {
    let value = serde_json::to_value(record)?;
    let bytes = canonical_json(&value).into_bytes();
    let hash = Sha256::digest(&bytes);
    Ok(format!("Qm{}", bs58::encode(hash).into_string()))
}

/// Returns `true` if `value` looks like a digest produced by [`digest`].
pub fn is_digest(value: &str) -> bool {
    value.len() == DIGEST_HEX_LEN && value.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_digest() {
        let hash = digest(b"hello world");
        assert_eq!(hash, "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9");
        assert!(is_digest(&hash));
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let a = json!({"b": 1, "a": {"z": true, "y": [3, {"k": 1, "j": 2}]}});
        assert_eq!(canonical_json(&a), r#"{"a":{"y":[3,{"j":2,"k":1}],"z":true},"b":1}"#);
    }

    #[test]
    fn test_proof_hash_is_pure() {
        let meta = json!({"level": "advanced", "country": "BR"});
        let reordered = json!({"country": "BR", "level": "advanced"});

        let h1 = compute_proof_hash("did:credo:alice", CredentialClass::Identity, &meta, 1_000);
        let h2 = compute_proof_hash("did:credo:alice", CredentialClass::Identity, &reordered, 1_000);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), DIGEST_HEX_LEN);
    }

    #[test]
    fn test_proof_hash_depends_on_time_and_class() {
        let meta = json!({});
        let base = compute_proof_hash("did:credo:alice", CredentialClass::Role, &meta, 1_000);
        let later = compute_proof_hash("did:credo:alice", CredentialClass::Role, &meta, 1_001);
        let other = compute_proof_hash("did:credo:alice", CredentialClass::Vault, &meta, 1_000);
        assert_ne!(base, later);
        assert_ne!(base, other);
    }

    #[test]
    fn test_derive_cid_is_stable() {
        let cid1 = derive_cid(&json!({"b": 2, "a": 1})).unwrap();
        let cid2 = derive_cid(&json!({"a": 1, "b": 2})).unwrap();
        assert_eq!(cid1, cid2);
        assert!(cid1.starts_with("Qm"));
    }
}
