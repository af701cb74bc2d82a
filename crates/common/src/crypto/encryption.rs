//! Segmented AES-256-GCM stream encryption.
//!
//! [`SegmentedCipher`] encrypts an arbitrary-length byte stream as a
//! sequence of independently authenticated segments, so archives of any
//! size can be sealed and opened without holding them in memory.
//!
//! ## Format
//!
//! ```text
//! header  = magic "ETBK" | version u8 | salt [32] | nonce_prefix [7]
//! segment = AES-256-GCM(plaintext[..4080]) -> ciphertext[..4096]
//! nonce   = nonce_prefix | segment index u32 BE | last flag u8
//! ```
//!
//! The segment key is derived per stream with HKDF-SHA256 from the master
//! key and the header salt. Every segment authenticates the header as
//! associated data. The final segment is always present (it is empty for
//! empty input) and carries the last flag, so truncation at a segment
//! boundary is detected.
//!
//! ## Usage
//!
//! ```rust
//! use eventtracker_common::crypto::SegmentedCipher;
//!
//! let cipher = SegmentedCipher::new(SegmentedCipher::generate_key());
//!
//! let mut sealed = Vec::new();
//! cipher.encrypt(&b"sensitive data"[..], &mut sealed)?;
//!
//! let mut opened = Vec::new();
//! cipher.decrypt(sealed.as_slice(), &mut opened)?;
//! assert_eq!(opened, b"sensitive data");
//! # Ok::<(), eventtracker_common::error::CommonError>(())
//! ```

use std::io::{self, Read, Write};

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::error::{CommonError, CommonResult};

/// Stream magic bytes.
pub const STREAM_MAGIC: &[u8; 4] = b"ETBK";
/// Current format version.
pub const STREAM_VERSION: u8 = 1;
/// Length of the per-stream HKDF salt.
pub const SALT_LEN: usize = 32;
/// Length of the random nonce prefix.
pub const NONCE_PREFIX_LEN: usize = 7;
/// Full header length.
pub const HEADER_LEN: usize = STREAM_MAGIC.len() + 1 + SALT_LEN + NONCE_PREFIX_LEN;
/// Ciphertext bytes per segment, tag included.
pub const CIPHERTEXT_SEGMENT_LEN: usize = 4096;
/// AES-GCM authentication tag length.
pub const TAG_LEN: usize = 16;
/// Plaintext bytes per segment.
pub const PLAINTEXT_SEGMENT_LEN: usize = CIPHERTEXT_SEGMENT_LEN - TAG_LEN;
/// Master key length.
pub const KEY_LEN: usize = 32;

const HKDF_INFO: &[u8] = b"eventtracker-backup-v1";

/// AES-256-GCM stream cipher keyed by a long-lived master key.
pub struct SegmentedCipher {
    master_key: [u8; KEY_LEN],
}

impl std::fmt::Debug for SegmentedCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentedCipher").field("master_key", &"[REDACTED]").finish()
    }
}

impl SegmentedCipher {
    pub fn new(master_key: [u8; KEY_LEN]) -> Self {
        Self { master_key }
    }

    /// Generate a random master key.
    pub fn generate_key() -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    /// Encrypt everything `reader` yields into `writer`.
    ///
    /// Returns the number of plaintext bytes consumed.
    ///
    /// # Errors
    /// Returns `Persistence` on I/O failure and `Crypto` if a segment cannot
    /// be sealed.
    pub fn encrypt<R: Read, W: Write>(&self, mut reader: R, mut writer: W) -> CommonResult<u64> {
        let mut header = [0u8; HEADER_LEN];
        header[..4].copy_from_slice(STREAM_MAGIC);
        header[4] = STREAM_VERSION;
        OsRng.fill_bytes(&mut header[5..]);

        let cipher = self.segment_cipher(&header)?;
        writer.write_all(&header)?;

        let mut current = vec![0u8; PLAINTEXT_SEGMENT_LEN];
        let mut next = vec![0u8; PLAINTEXT_SEGMENT_LEN];
        let mut len = read_full(&mut reader, &mut current)?;
        let mut index: u32 = 0;
        let mut total: u64 = 0;

        loop {
            let next_len =
                if len == PLAINTEXT_SEGMENT_LEN { read_full(&mut reader, &mut next)? } else { 0 };
            let last = next_len == 0;

            let nonce = segment_nonce(&header, index, last);
            let sealed = cipher
                .encrypt(Nonce::from_slice(&nonce), Payload { msg: &current[..len], aad: &header })
                .map_err(|e| CommonError::crypto("encrypt_segment", e.to_string()))?;
            writer.write_all(&sealed)?;
            total += len as u64;

            if last {
                break;
            }
            std::mem::swap(&mut current, &mut next);
            len = next_len;
            index = next_index(index)?;
        }

        writer.flush()?;
        Ok(total)
    }

    /// Decrypt a stream produced by [`encrypt`](Self::encrypt).
    ///
    /// Plaintext is written segment by segment as each one authenticates;
    /// callers must discard `writer` output when this returns an error.
    ///
    /// # Errors
    /// Returns `Validation` for a foreign or unsupported header, and
    /// `Crypto` when a segment fails authentication or the stream is
    /// truncated.
    pub fn decrypt<R: Read, W: Write>(&self, mut reader: R, mut writer: W) -> CommonResult<u64> {
        let mut header = [0u8; HEADER_LEN];
        if read_full(&mut reader, &mut header)? < HEADER_LEN {
            return Err(CommonError::validation("header", "stream is shorter than its header"));
        }
        if &header[..4] != STREAM_MAGIC {
            return Err(CommonError::validation("header", "not an encrypted backup stream"));
        }
        if header[4] != STREAM_VERSION {
            return Err(CommonError::validation(
                "header",
                format!("unsupported stream version {}", header[4]),
            ));
        }

        let cipher = self.segment_cipher(&header)?;

        let mut current = vec![0u8; CIPHERTEXT_SEGMENT_LEN];
        let mut next = vec![0u8; CIPHERTEXT_SEGMENT_LEN];
        let mut len = read_full(&mut reader, &mut current)?;
        let mut index: u32 = 0;
        let mut total: u64 = 0;

        loop {
            if len < TAG_LEN {
                return Err(CommonError::crypto("decrypt_segment", "stream is truncated"));
            }
            let next_len =
                if len == CIPHERTEXT_SEGMENT_LEN { read_full(&mut reader, &mut next)? } else { 0 };
            let last = next_len == 0;

            let nonce = segment_nonce(&header, index, last);
            let plain = cipher
                .decrypt(Nonce::from_slice(&nonce), Payload { msg: &current[..len], aad: &header })
                .map_err(|_| {
                    CommonError::crypto(
                        "decrypt_segment",
                        format!("segment {index} failed authentication"),
                    )
                })?;
            writer.write_all(&plain)?;
            total += plain.len() as u64;

            if last {
                break;
            }
            std::mem::swap(&mut current, &mut next);
            len = next_len;
            index = next_index(index)?;
        }

        writer.flush()?;
        Ok(total)
    }

    fn segment_cipher(&self, header: &[u8; HEADER_LEN]) -> CommonResult<Aes256Gcm> {
        let salt = &header[5..5 + SALT_LEN];
        let hkdf = Hkdf::<Sha256>::new(Some(salt), &self.master_key);
        let mut okm = [0u8; KEY_LEN];
        hkdf.expand(HKDF_INFO, &mut okm)
            .map_err(|e| CommonError::crypto("derive_key", e.to_string()))?;
        Aes256Gcm::new_from_slice(&okm)
            .map_err(|e| CommonError::crypto("derive_key", e.to_string()))
    }
}

fn segment_nonce(header: &[u8; HEADER_LEN], index: u32, last: bool) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[..NONCE_PREFIX_LEN].copy_from_slice(&header[HEADER_LEN - NONCE_PREFIX_LEN..]);
    nonce[NONCE_PREFIX_LEN..NONCE_PREFIX_LEN + 4].copy_from_slice(&index.to_be_bytes());
    nonce[11] = u8::from(last);
    nonce
}

fn next_index(index: u32) -> CommonResult<u32> {
    index
        .checked_add(1)
        .ok_or_else(|| CommonError::crypto("next_segment", "segment counter overflow"))
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
