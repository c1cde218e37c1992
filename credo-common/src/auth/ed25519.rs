use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

/// Signs bundle content identifiers on behalf of an export gateway.
pub struct BundleSigner {
    keypair: SigningKey,
}

impl std::fmt::Debug for BundleSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleSigner")
            .field("public_key", &self.public_key_hex())
            .finish()
    }
}

impl BundleSigner {
    pub fn new(keypair: SigningKey) -> Self {
        Self { keypair }
    }

    pub fn generate() -> Self {
        let mut csprng = OsRng;
        Self::new(SigningKey::generate(&mut csprng))
    }

    /// Deterministic key, used when the engine runs with a fixed seed.
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&seed.to_le_bytes());
        Self::new(SigningKey::from_bytes(&bytes))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        let keypair = SigningKey::from_bytes(bytes.try_into().map_err(|_| "Invalid key length")?);
        Ok(Self { keypair })
    }

    /// Signs `message` and returns the hex encoded signature.
    pub fn sign(&self, message: &[u8]) -> String {
        hex::encode(self.keypair.sign(message).to_bytes())
    }

    pub fn verify(&self, message: &[u8], signature_hex: &str) -> bool {
        verify_with_key(message, signature_hex, &self.keypair.verifying_key().to_bytes())
    }

    pub fn public_key(&self) -> Vec<u8> {
        self.keypair.verifying_key().to_bytes().to_vec()
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key())
    }
}

/// Verifies a hex encoded signature against a raw 32 byte public key.
pub fn verify_with_key(message: &[u8], signature_hex: &str, public_key: &[u8]) -> bool {
    let Ok(key_bytes) = <[u8; 32]>::try_from(public_key) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&sig_bytes) else {
        return false;
    };
    verifying_key.verify(message, &signature).is_ok()
}
