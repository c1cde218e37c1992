pub mod hash;

pub use hash::{canonical_json, compute_proof_hash, derive_cid, digest};
