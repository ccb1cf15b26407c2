//! Digests used to sign gateway requests and verify callbacks

/// Trait for generating a digest of a message
pub trait GenerateDigest {
    /// takes a message and creates a digest for it
    fn generate_digest(&self, message: &[u8]) -> Vec<u8>;
}

/// MD5 hash function
#[derive(Debug, Clone, Copy)]
pub struct Md5;

impl GenerateDigest for Md5 {
    fn generate_digest(&self, message: &[u8]) -> Vec<u8> {
        md5::compute(message).0.to_vec()
    }
}

/// Secure Hash Algorithm 256
#[derive(Debug, Clone, Copy)]
pub struct Sha256;

impl GenerateDigest for Sha256 {
    fn generate_digest(&self, message: &[u8]) -> Vec<u8> {
        let digest = ring::digest::digest(&ring::digest::SHA256, message);
        digest.as_ref().to_vec()
    }
}

/// Lowercase hex digest.
pub fn hex_digest(algorithm: impl GenerateDigest, message: &[u8]) -> String {
    hex::encode(algorithm.generate_digest(message))
}

/// Uppercase hex digest.
pub fn upper_hex_digest(algorithm: impl GenerateDigest, message: &[u8]) -> String {
    hex::encode_upper(algorithm.generate_digest(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_digest() {
        let message = "abcdefghijklmnopqrstuvwxyz".as_bytes();
        assert_eq!(hex_digest(Md5, message), "c3fcd3d76192e4007dfb496cca67e13b");
        assert_eq!(
            upper_hex_digest(Md5, message),
            "C3FCD3D76192E4007DFB496CCA67E13B"
        );
    }

    #[test]
    fn test_sha256_digest() {
        assert_eq!(
            hex_digest(Sha256, b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
