use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;
use std::str::FromStr;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// Represents a wallet address (public key in hex format)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Address(pub String);

impl Address {
    /// Creates a new address from a public key
    pub fn from_public_key(public_key: &VerifyingKey) -> Self {
        Address(hex::encode(public_key.as_bytes()))
    }

    /// Converts the address to a public key
    pub fn to_public_key(&self) -> Result<VerifyingKey, CryptoError> {
        let bytes = hex::decode(&self.0).map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidPublicKey("Invalid public key length".to_string())
        })?;

        VerifyingKey::from_bytes(&bytes).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    /// Parses a hex public key, normalising it to lowercase
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let public_key = Address(s.to_ascii_lowercase()).to_public_key()?;
        Ok(Address::from_public_key(&public_key))
    }
}

/// Represents a digital signature (hex encoded)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DigitalSignature(pub String);

impl DigitalSignature {
    /// Creates a new digital signature from a signature
    pub fn from_signature(signature: &Signature) -> Self {
        DigitalSignature(hex::encode(signature.to_bytes()))
    }

    /// Converts the digital signature to a signature
    pub fn to_signature(&self) -> Result<Signature, CryptoError> {
        let bytes = hex::decode(&self.0).map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        let signature_bytes: [u8; 64] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidSignature("Invalid signature length".to_string())
        })?;

        Ok(Signature::from_bytes(&signature_bytes))
    }
}

/// Private-key handle used to sign transactions
#[derive(Debug, Clone)]
pub struct Wallet {
    signing_key: SigningKey,
    address: Address,
}

impl Wallet {
    /// Creates a new wallet with a random keypair
    pub fn new() -> Self {
        let mut csprng = OsRng;
        Self::from_signing_key(SigningKey::generate(&mut csprng))
    }

    /// Creates a wallet from an existing secret key
    pub fn from_secret_key(secret_key_bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes_array: [u8; 32] = secret_key_bytes.try_into().map_err(|_| {
            CryptoError::InvalidPrivateKey("Invalid private key length".to_string())
        })?;

        Ok(Self::from_signing_key(SigningKey::from_bytes(&bytes_array)))
    }

    /// Creates a wallet from a hex encoded secret key
    pub fn from_secret_key_hex(secret_key_hex: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(secret_key_hex.trim())
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        Self::from_secret_key(&bytes)
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = Address::from_public_key(&signing_key.verifying_key());
        Wallet {
            signing_key,
            address,
        }
    }

    /// Gets the wallet's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Exports the wallet's secret key as hex
    pub fn export_secret_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

/// Signs a digest with the wallet's private key
pub fn sign(wallet: &Wallet, digest_hex: &str) -> DigitalSignature {
    let signature = wallet.signing_key.sign(digest_hex.as_bytes());
    DigitalSignature::from_signature(&signature)
}

/// Verifies a signature over a digest against a hex public key.
///
/// A well-formed signature that does not match yields `Ok(false)`; malformed
/// keys or signature encodings are errors.
pub fn verify(public_key_hex: &str, digest_hex: &str, signature_hex: &str) -> Result<bool, CryptoError> {
    let public_key = Address(public_key_hex.to_string()).to_public_key()?;
    let signature = DigitalSignature(signature_hex.to_string()).to_signature()?;

    Ok(public_key.verify(digest_hex.as_bytes(), &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_creation() {
        let wallet = Wallet::new();
        assert_eq!(wallet.address().as_str().len(), 64);
        assert!(wallet.address().as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signing_and_verification() {
        let wallet = Wallet::new();
        let digest = "abc123";

        let signature = sign(&wallet, digest);
        assert!(verify(wallet.address().as_str(), digest, &signature.0).unwrap());

        // Verify with wrong digest
        assert!(!verify(wallet.address().as_str(), "abc124", &signature.0).unwrap());

        // Verify with wrong key
        let other = Wallet::new();
        assert!(!verify(other.address().as_str(), digest, &signature.0).unwrap());
    }

    #[test]
    fn test_malformed_inputs_are_errors() {
        let wallet = Wallet::new();
        let signature = sign(&wallet, "digest");

        assert!(matches!(
            verify("not-hex", "digest", &signature.0),
            Err(CryptoError::DecodingError(_))
        ));
        assert!(matches!(
            verify("abcd", "digest", &signature.0),
            Err(CryptoError::InvalidPublicKey(_))
        ));
        assert!(matches!(
            verify(wallet.address().as_str(), "digest", "00ff"),
            Err(CryptoError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_secret_key_round_trip() {
        let wallet = Wallet::new();
        let restored = Wallet::from_secret_key_hex(&wallet.export_secret_key_hex()).unwrap();
        assert_eq!(restored.address(), wallet.address());

        assert!(matches!(
            Wallet::from_secret_key(&[1, 2, 3]),
            Err(CryptoError::InvalidPrivateKey(_))
        ));
    }

    #[test]
    fn test_address_conversion() {
        let wallet = Wallet::new();
        let public_key = wallet.address().to_public_key().unwrap();
        assert_eq!(Address::from_public_key(&public_key), *wallet.address());

        let upper = wallet.address().as_str().to_ascii_uppercase();
        assert_eq!(upper.parse::<Address>().unwrap(), *wallet.address());
    }
}
