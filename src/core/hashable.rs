use crate::utils::sha256_digest;
use data_encoding::HEXLOWER;

/// Anything that can be committed to by its content digest.
///
/// Transactions, blocks and Merkle nodes all implement this; the Merkle
/// commitment only ever talks to items through it.
pub trait Hashable {
    /// SHA-256 digest of the item's canonical content
    fn content_hash(&self) -> Vec<u8>;

    fn content_hash_hex(&self) -> String {
        HEXLOWER.encode(&self.content_hash())
    }
}

impl<T: Hashable + ?Sized> Hashable for &T {
    fn content_hash(&self) -> Vec<u8> {
        (**self).content_hash()
    }
}

impl Hashable for [u8] {
    fn content_hash(&self) -> Vec<u8> {
        sha256_digest(self)
    }
}

impl Hashable for Vec<u8> {
    fn content_hash(&self) -> Vec<u8> {
        sha256_digest(self)
    }
}

impl Hashable for str {
    fn content_hash(&self) -> Vec<u8> {
        sha256_digest(self.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_and_str_digests_agree() {
        assert_eq!("abc".content_hash(), b"abc".to_vec().content_hash());
        assert_eq!(
            "abc".content_hash_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_reference_forwards() {
        let item = b"leaf".to_vec();
        let by_ref: &Vec<u8> = &item;
        assert_eq!(by_ref.content_hash(), item.content_hash());
    }
}
