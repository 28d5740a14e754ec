use core::fmt;

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use rand::RngCore;
use sha1::Sha1;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{Error, Result};

/// A minimal secret container that zeroizes its contents on drop.
///
/// This is intentionally small and avoids exposing secrets via `Debug`.
#[derive(Clone)]
pub(crate) struct SecretBytes(Vec<u8>);

impl SecretBytes {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Truncate or zero-pad the secret into a fixed-size key.
    ///
    /// IPMI implementations commonly treat user keys as fixed-size arrays
    /// where the provided secret is truncated and the remainder zero-padded.
    pub(crate) fn to_key(&self, len: usize) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(vec![0u8; len]);
        let n = self.0.len().min(len);
        out[..n].copy_from_slice(&self.0[..n]);
        out
    }

    /// The 16-byte padded form used by v1.5 session authentication.
    pub(crate) fn to_password16(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        let n = self.0.len().min(16);
        out[..n].copy_from_slice(&self.0[..n]);
        out
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<secret>")
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

type HmacSha1 = Hmac<Sha1>;
type HmacMd5 = Hmac<Md5>;

/// Keyed-hash algorithm selector for RAKP authentication codes and the
/// session integrity trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyedHash {
    /// Pass-through: produces an empty code.
    None,
    /// HMAC-SHA1 (20-byte digest).
    Sha1,
    /// HMAC-MD5 (16-byte digest).
    Md5,
}

impl KeyedHash {
    pub(crate) fn digest_len(self) -> usize {
        match self {
            KeyedHash::None => 0,
            KeyedHash::Sha1 => 20,
            KeyedHash::Md5 => 16,
        }
    }
}

/// Compute a keyed authentication code.
///
/// Truncation (12 bytes for per-packet integrity, full digest for RAKP
/// codes) is the caller's responsibility.
pub(crate) fn auth_code(alg: KeyedHash, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    match alg {
        KeyedHash::None => Ok(Vec::new()),
        KeyedHash::Sha1 => {
            let mut mac = <HmacSha1 as Mac>::new_from_slice(key)
                .map_err(|_| Error::Crypto("invalid HMAC key"))?;
            mac.update(data);
            Ok(mac.finalize().into_bytes().to_vec())
        }
        KeyedHash::Md5 => {
            let mut mac = <HmacMd5 as Mac>::new_from_slice(key)
                .map_err(|_| Error::Crypto("invalid HMAC key"))?;
            mac.update(data);
            Ok(mac.finalize().into_bytes().to_vec())
        }
    }
}

/// The v1.5 multi-session MD5 authcode:
/// `MD5(password ‖ session_id ‖ message ‖ outbound_seq ‖ password)`.
pub(crate) fn session_digest_md5(
    password: &[u8; 16],
    session_id: u32,
    message: &[u8],
    outbound_seq: u32,
) -> [u8; 16] {
    let mut h = Md5::new();
    h.update(password);
    h.update(session_id.to_le_bytes());
    h.update(message);
    h.update(outbound_seq.to_le_bytes());
    h.update(password);
    h.finalize().into()
}

pub(crate) fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Cryptographically strong random bytes (console randoms, IVs).
pub(crate) fn fill_random(buf: &mut [u8]) {
    rand::rng().fill_bytes(buf);
}

pub(crate) fn random_u32() -> u32 {
    rand::rng().next_u32()
}

/// AES-128-CBC encryption without padding.
///
/// The caller must ensure `plaintext.len()` is a non-zero multiple of 16.
pub(crate) fn aes128_cbc_encrypt(
    key: &[u8; 16],
    iv: &[u8; 16],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    if plaintext.is_empty() || !plaintext.len().is_multiple_of(16) {
        return Err(Error::Crypto(
            "AES-CBC plaintext length must be a non-zero multiple of 16",
        ));
    }

    let cipher = Aes128::new_from_slice(key).map_err(|_| Error::Crypto("invalid AES-128 key"))?;

    let mut out = Vec::with_capacity(plaintext.len());
    let mut prev = *iv;

    for block in plaintext.chunks(16) {
        let mut xored = [0u8; 16];
        for (i, b) in xored.iter_mut().enumerate() {
            *b = block[i] ^ prev[i];
        }

        let mut ga = GenericArray::clone_from_slice(&xored);
        cipher.encrypt_block(&mut ga);

        prev.copy_from_slice(&ga);
        out.extend_from_slice(&prev);
    }

    Ok(out)
}

/// AES-128-CBC decryption without padding.
///
/// The caller must ensure `ciphertext.len()` is a non-zero multiple of 16.
pub(crate) fn aes128_cbc_decrypt(
    key: &[u8; 16],
    iv: &[u8; 16],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || !ciphertext.len().is_multiple_of(16) {
        return Err(Error::Crypto(
            "AES-CBC ciphertext length must be a non-zero multiple of 16",
        ));
    }

    let cipher = Aes128::new_from_slice(key).map_err(|_| Error::Crypto("invalid AES-128 key"))?;

    let mut out = Vec::with_capacity(ciphertext.len());
    let mut prev = *iv;

    for block in ciphertext.chunks(16) {
        let mut ga = GenericArray::clone_from_slice(block);
        cipher.decrypt_block(&mut ga);

        let mut pt = [0u8; 16];
        for (i, b) in pt.iter_mut().enumerate() {
            *b = ga[i] ^ prev[i];
        }
        out.extend_from_slice(&pt);

        prev.copy_from_slice(block);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_sha1_vector() {
        let code = auth_code(
            KeyedHash::Sha1,
            b"key",
            b"The quick brown fox jumps over the lazy dog",
        )
        .expect("hmac");
        assert_eq!(
            code,
            [
                0xDE, 0x7C, 0x9B, 0x85, 0xB8, 0xB7, 0x8A, 0xA6, 0xBC, 0x8A, 0x7A, 0x36, 0xF7, 0x0A,
                0x90, 0x70, 0x1C, 0x9D, 0xB4, 0xD9,
            ]
        );
    }

    #[test]
    fn hmac_md5_vector() {
        let code = auth_code(
            KeyedHash::Md5,
            b"key",
            b"The quick brown fox jumps over the lazy dog",
        )
        .expect("hmac");
        assert_eq!(
            code,
            [
                0x80, 0x07, 0x07, 0x13, 0x46, 0x3E, 0x77, 0x49, 0xB9, 0x0C, 0x2D, 0xC2, 0x49, 0x11,
                0xE2, 0x75,
            ]
        );
    }

    #[test]
    fn none_code_is_empty() {
        let code = auth_code(KeyedHash::None, b"key", b"data").expect("none");
        assert!(code.is_empty());
    }

    #[test]
    fn session_digest_is_deterministic() {
        let password = SecretBytes::new(b"admin".to_vec()).to_password16();
        let a = session_digest_md5(&password, 0x11223344, &[0x20, 0x18, 0xC8], 7);
        let b = session_digest_md5(&password, 0x11223344, &[0x20, 0x18, 0xC8], 7);
        assert_eq!(a, b);

        let c = session_digest_md5(&password, 0x11223344, &[0x20, 0x18, 0xC8], 8);
        assert_ne!(a, c);
    }

    #[test]
    fn aes128_cbc_vectors() {
        let key: [u8; 16] = [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D,
            0x0E, 0x0F,
        ];
        let iv: [u8; 16] = [
            0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C, 0x1D,
            0x1E, 0x1F,
        ];
        let plaintext = b"0123456789abcdef";

        let ciphertext = aes128_cbc_encrypt(&key, &iv, plaintext).expect("encrypt");
        assert_eq!(
            ciphertext,
            [
                0xEB, 0x9E, 0x5B, 0xA4, 0x1B, 0x90, 0x2D, 0xB8, 0x25, 0x29, 0x82, 0xAA, 0x1A, 0x23,
                0xF4, 0xBE,
            ]
        );

        let decrypted = aes128_cbc_decrypt(&key, &iv, &ciphertext).expect("decrypt");
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn aes128_cbc_rejects_non_block_multiple() {
        let key = [0u8; 16];
        let iv = [0u8; 16];
        let err = aes128_cbc_encrypt(&key, &iv, b"not16").unwrap_err();
        assert!(matches!(err, Error::Crypto(_)));
    }

    #[test]
    fn secret_key_padding() {
        let secret = SecretBytes::new(b"pw".to_vec());
        let key = secret.to_key(20);
        assert_eq!(&key[..2], b"pw");
        assert!(key[2..].iter().all(|&b| b == 0));
        assert_eq!(key.len(), 20);
    }
}
