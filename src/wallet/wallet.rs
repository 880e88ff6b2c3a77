use crate::error::Result;
use crate::utils::{ecdsa_p256_sha256_sign_digest, new_key_pair, public_key_from_pkcs8};
use data_encoding::HEXLOWER;

/// An ECDSA P-256 key pair. Outputs are owned directly by the public key.
#[derive(Clone)]
pub struct Wallet {
    pkcs8: Vec<u8>,
    public_key: Vec<u8>,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let pkcs8 = new_key_pair()?;
        Self::from_pkcs8(pkcs8)
    }

    pub fn from_pkcs8(pkcs8: Vec<u8>) -> Result<Wallet> {
        let public_key = public_key_from_pkcs8(&pkcs8)?;
        Ok(Wallet { pkcs8, public_key })
    }

    pub fn get_public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    pub fn get_pkcs8(&self) -> &[u8] {
        self.pkcs8.as_slice()
    }

    /// Short printable form of the public key for log lines
    pub fn fingerprint(&self) -> String {
        let hex = HEXLOWER.encode(&self.public_key);
        hex.chars().skip(2).take(16).collect()
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        ecdsa_p256_sha256_sign_digest(&self.pkcs8, message)
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print the private key
        f.debug_struct("Wallet")
            .field("public_key", &HEXLOWER.encode(&self.public_key))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ecdsa_p256_sha256_sign_verify;

    #[test]
    fn test_wallet_signs_for_its_public_key() {
        let wallet = Wallet::new().unwrap();
        let signature = wallet.sign(b"digest").unwrap();
        assert!(ecdsa_p256_sha256_sign_verify(
            wallet.get_public_key(),
            &signature,
            b"digest"
        ));
    }

    #[test]
    fn test_wallet_round_trips_pkcs8() {
        let wallet = Wallet::new().unwrap();
        let restored = Wallet::from_pkcs8(wallet.get_pkcs8().to_vec()).unwrap();
        assert_eq!(wallet.get_public_key(), restored.get_public_key());
        assert_eq!(wallet.fingerprint().len(), 16);
    }

    #[test]
    fn test_debug_hides_private_key() {
        let wallet = Wallet::new().unwrap();
        let printed = format!("{wallet:?}");
        assert!(printed.contains("public_key"));
        assert!(!printed.contains("pkcs8"));
    }
}
