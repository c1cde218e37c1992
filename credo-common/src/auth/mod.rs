pub mod ed25519;

pub use ed25519::BundleSigner;
