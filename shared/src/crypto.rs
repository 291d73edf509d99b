// Crypto Module
// Key derivation from the hardware identifier and AES-128-CBC password sealing
// Stored blobs are base64(IV || ciphertext) with PKCS#7 padding

// Import the RustCrypto block cipher stack
use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes128;

// Import base64 for the printable storage encoding
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

// Import the RNG traits used for IV generation
use rand_core::{CryptoRng, RngCore};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CipherError;

/// AES block size in bytes, also the IV length
pub const BLOCK_SIZE: usize = 16;

/// Symmetric key length in bytes (AES-128)
pub const KEY_SIZE: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// 128-bit key derived from the device identifier. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl core::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// SHA-256 of the hardware identifier truncated to 16 bytes.
///
/// The same identifier always yields the same key, which is what lets a
/// password sealed on one boot be opened on the next.
pub fn derive_key(hardware_id: &[u8]) -> SymmetricKey {
    let digest = Sha256::digest(hardware_id);
    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&digest[..KEY_SIZE]);
    SymmetricKey(key)
}

/// Printable encrypted password as stored in the profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedBlob(String);

impl EncryptedBlob {
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the decoded blob into IV and ciphertext
    fn decode(&self) -> Result<([u8; BLOCK_SIZE], Vec<u8>), CipherError> {
        let raw = STANDARD
            .decode(self.0.trim())
            .map_err(|e| CipherError::MalformedBlob(format!("base64: {}", e)))?;

        if raw.len() < 2 * BLOCK_SIZE {
            return Err(CipherError::MalformedBlob(format!(
                "blob too short: {} bytes",
                raw.len()
            )));
        }

        let (iv_bytes, ciphertext) = raw.split_at(BLOCK_SIZE);
        if ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(CipherError::MalformedBlob(format!(
                "ciphertext length {} is not a multiple of {}",
                ciphertext.len(),
                BLOCK_SIZE
            )));
        }

        let mut iv = [0u8; BLOCK_SIZE];
        iv.copy_from_slice(iv_bytes);
        Ok((iv, ciphertext.to_vec()))
    }
}

/// Encrypt a password under `key` with a fresh random IV
pub fn encrypt_password<R>(plaintext: &str, key: &SymmetricKey, rng: &mut R) -> EncryptedBlob
where
    R: RngCore + CryptoRng,
{
    let mut iv = [0u8; BLOCK_SIZE];
    rng.fill_bytes(&mut iv);

    let ciphertext = Aes128CbcEnc::new(key.as_bytes().into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    let mut sealed = Vec::with_capacity(BLOCK_SIZE + ciphertext.len());
    sealed.extend_from_slice(&iv);
    sealed.extend_from_slice(&ciphertext);

    EncryptedBlob(STANDARD.encode(sealed))
}

/// Decrypt a stored blob, rejecting anything whose padding does not verify
pub fn decrypt_password(blob: &EncryptedBlob, key: &SymmetricKey) -> Result<String, CipherError> {
    let (iv, ciphertext) = blob.decode()?;

    let mut padded = Aes128CbcDec::new(key.as_bytes().into(), &iv.into())
        .decrypt_padded_vec_mut::<NoPadding>(&ciphertext)
        .map_err(|_| CipherError::MalformedBlob("ciphertext is not block aligned".to_string()))?;

    let pad_len = strip_padding(&padded)?;
    padded.truncate(padded.len() - pad_len);

    String::from_utf8(padded).map_err(|_| CipherError::InvalidUtf8)
}

/// Validate PKCS#7 padding and return the pad length
fn strip_padding(padded: &[u8]) -> Result<usize, CipherError> {
    let pad_len = match padded.last() {
        Some(&last) => last as usize,
        None => return Err(CipherError::InvalidPadding),
    };

    if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > padded.len() {
        return Err(CipherError::InvalidPadding);
    }

    let tail = &padded[padded.len() - pad_len..];
    if tail.iter().any(|&b| b as usize != pad_len) {
        return Err(CipherError::InvalidPadding);
    }

    Ok(pad_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0x5eed)
    }

    fn decoded_len(blob: &EncryptedBlob) -> usize {
        STANDARD.decode(blob.as_str()).unwrap().len()
    }

    #[test]
    fn derive_key_is_deterministic() {
        let id = [0xE6, 0x61, 0x38, 0x52, 0x83, 0x5D, 0x2A, 0x21];
        assert_eq!(derive_key(&id), derive_key(&id));
        assert_ne!(derive_key(&id), derive_key(&[0u8; 8]));
    }

    #[test]
    fn derive_key_is_truncated_sha256() {
        let digest = Sha256::digest(b"device-42");
        assert_eq!(derive_key(b"device-42").as_bytes()[..], digest[..16]);
    }

    #[test]
    fn round_trip_across_lengths() {
        let key = derive_key(b"board-a");
        let mut rng = rng();
        for len in [0usize, 1, 15, 16, 17, 31, 32, 63, 64, 255, 1000, 10_000] {
            let password: String = "p".repeat(len);
            let blob = encrypt_password(&password, &key, &mut rng);
            assert_eq!(decrypt_password(&blob, &key).unwrap(), password, "len {}", len);
        }
    }

    #[test]
    fn round_trip_multibyte_utf8() {
        let key = derive_key(b"board-a");
        let password = "パスワード-ü-🔑";
        let blob = encrypt_password(password, &key, &mut rng());
        assert_eq!(decrypt_password(&blob, &key).unwrap(), password);
    }

    #[test]
    fn ciphertext_is_padded_to_next_block() {
        let key = derive_key(b"board-a");
        let mut rng = rng();

        // A full block of plaintext gains a whole block of padding
        let blob = encrypt_password(&"x".repeat(16), &key, &mut rng);
        assert_eq!(decoded_len(&blob), BLOCK_SIZE + 32);

        let blob = encrypt_password("secret123", &key, &mut rng);
        assert_eq!(decoded_len(&blob), BLOCK_SIZE + 16);

        let blob = encrypt_password("", &key, &mut rng);
        assert_eq!(decoded_len(&blob), BLOCK_SIZE + 16);
    }

    #[test]
    fn fresh_iv_per_encryption() {
        let key = derive_key(b"board-a");
        let mut rng = rng();
        let first = encrypt_password("secret123", &key, &mut rng);
        let second = encrypt_password("secret123", &key, &mut rng);
        assert_ne!(first, second);
    }

    #[test]
    fn wrong_key_never_yields_plaintext() {
        let right = derive_key(b"board-a");
        let mut rng = rng();
        for i in 0..200u32 {
            let wrong = derive_key(&i.to_le_bytes());
            let blob = encrypt_password("secret123", &right, &mut rng);
            match decrypt_password(&blob, &wrong) {
                Ok(text) => assert_ne!(text, "secret123"),
                Err(e) => assert!(matches!(
                    e,
                    CipherError::InvalidPadding | CipherError::InvalidUtf8
                )),
            }
        }
    }

    #[test]
    fn rejects_bad_padding_values() {
        assert_eq!(strip_padding(&[b'a'; 16]), Err(CipherError::InvalidPadding));

        let mut zero = [b'a'; 16];
        zero[15] = 0;
        assert_eq!(strip_padding(&zero), Err(CipherError::InvalidPadding));

        let mut too_big = [17u8; 16];
        too_big[0] = b'a';
        assert_eq!(strip_padding(&too_big), Err(CipherError::InvalidPadding));

        let mut inconsistent = [b'a'; 16];
        inconsistent[14] = 1;
        inconsistent[15] = 2;
        assert_eq!(strip_padding(&inconsistent), Err(CipherError::InvalidPadding));

        assert_eq!(strip_padding(&[16u8; 16]), Ok(16));
    }

    #[test]
    fn rejects_malformed_blobs() {
        let key = derive_key(b"board-a");

        let not_base64 = EncryptedBlob::from_encoded("%%%");
        assert!(matches!(
            decrypt_password(&not_base64, &key),
            Err(CipherError::MalformedBlob(_))
        ));

        let iv_only = EncryptedBlob::from_encoded(STANDARD.encode([0u8; 16]));
        assert!(matches!(
            decrypt_password(&iv_only, &key),
            Err(CipherError::MalformedBlob(_))
        ));

        let ragged = EncryptedBlob::from_encoded(STANDARD.encode([0u8; 40]));
        assert!(matches!(
            decrypt_password(&ragged, &key),
            Err(CipherError::MalformedBlob(_))
        ));
    }

    #[test]
    fn key_debug_does_not_leak_bytes() {
        let key = derive_key(b"board-a");
        assert_eq!(format!("{:?}", key), "SymmetricKey(..)");
    }
}
