//! Envelope codec
//!
//! Wire format, carried in the note field of one ledger transaction:
//!
//! ```text
//! version:1B | counter:LEB128 (1..=10B) | ephemeralPublicKey:32B | ciphertext | tag:16B
//! ```
//!
//! Each envelope gets its own AEAD key and nonce:
//! `HKDF-SHA256(ikm, salt = ephemeralPublicKey)`, where `ikm` is the ratchet
//! key for PSK envelopes and the X25519 shared secret for direct envelopes.
//! The version, counter and ephemeral key are bound as associated data, so any
//! modified byte fails authentication. PSK envelopes also bind the address of
//! the transaction sender, so a note copied into another account's
//! transaction does not open.

use std::fmt;

use chacha20poly1305::aead::{AeadInPlace, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce, Tag};
use hkdf::Hkdf;
use noteline_storage_traits::Secret;
use rand::rngs::OsRng;
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::constant::{
    ENVELOPE_VERSION_DIRECT, ENVELOPE_VERSION_PSK, EPHEMERAL_KEY_LEN, MAX_VARINT_LEN,
    MESSAGE_KEY_INFO, MESSAGE_NONCE_INFO, MIN_ENVELOPE_LEN, NONCE_LEN, TAG_LEN,
};
use crate::error::Error;
use crate::ratchet;

/// Envelope decoding error.
///
/// Callers treat every variant exactly like an authentication failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Input shorter than the smallest valid envelope
    #[error("Envelope too short: {0} bytes")]
    TooShort(usize),
    /// Unknown version byte
    #[error("Unknown envelope version: {0:#04x}")]
    UnknownVersion(u8),
    /// Counter varint runs past the end of the input or past 10 bytes
    #[error("Malformed counter")]
    MalformedCounter,
    /// Counter does not fit in 64 bits
    #[error("Counter overflows u64")]
    CounterOverflow,
}

/// Which key path sealed an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    /// Sealed with a ratchet key derived from a pre-shared secret
    Psk,
    /// Sealed to the recipient's X25519 public key
    Direct,
}

impl EnvelopeKind {
    /// Version byte on the wire
    pub fn version(&self) -> u8 {
        match self {
            Self::Psk => ENVELOPE_VERSION_PSK,
            Self::Direct => ENVELOPE_VERSION_DIRECT,
        }
    }

    /// Parse a version byte
    pub fn from_version(version: u8) -> Result<Self, DecodeError> {
        match version {
            ENVELOPE_VERSION_PSK => Ok(Self::Psk),
            ENVELOPE_VERSION_DIRECT => Ok(Self::Direct),
            other => Err(DecodeError::UnknownVersion(other)),
        }
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Psk => write!(f, "psk"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

/// One encrypted message unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Sealing path
    pub kind: EnvelopeKind,
    /// Ratchet counter for PSK envelopes, part index for direct envelopes
    pub counter: u64,
    /// Sender's ephemeral X25519 public key
    pub ephemeral_public: [u8; EPHEMERAL_KEY_LEN],
    /// Encrypted payload
    pub ciphertext: Vec<u8>,
    /// Poly1305 authentication tag
    pub tag: [u8; TAG_LEN],
}

impl Envelope {
    /// Assemble an envelope from its parts
    pub fn new(
        kind: EnvelopeKind,
        counter: u64,
        ciphertext: Vec<u8>,
        tag: [u8; TAG_LEN],
        ephemeral_public: [u8; EPHEMERAL_KEY_LEN],
    ) -> Self {
        Self {
            kind,
            counter,
            ephemeral_public,
            ciphertext,
            tag,
        }
    }

    /// Encoded length in bytes
    pub fn encoded_len(&self) -> usize {
        1 + varint_len(self.counter) + EPHEMERAL_KEY_LEN + self.ciphertext.len() + TAG_LEN
    }

    /// Serialize to the wire format
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&self.header());
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }

    /// Parse the wire format.
    ///
    /// Never panics on arbitrary input.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < MIN_ENVELOPE_LEN {
            return Err(DecodeError::TooShort(bytes.len()));
        }

        let kind = EnvelopeKind::from_version(bytes[0])?;
        let (counter, counter_len) = read_varint(&bytes[1..])?;

        let key_start = 1 + counter_len;
        let body_start = key_start + EPHEMERAL_KEY_LEN;
        if bytes.len() < body_start + TAG_LEN {
            return Err(DecodeError::TooShort(bytes.len()));
        }
        let tag_start = bytes.len() - TAG_LEN;

        let mut ephemeral_public = [0u8; EPHEMERAL_KEY_LEN];
        ephemeral_public.copy_from_slice(&bytes[key_start..body_start]);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&bytes[tag_start..]);

        Ok(Self {
            kind,
            counter,
            ephemeral_public,
            ciphertext: bytes[body_start..tag_start].to_vec(),
            tag,
        })
    }

    /// `version || varint(counter) || ephemeral key`
    fn header(&self) -> Vec<u8> {
        let mut header = Vec::with_capacity(1 + MAX_VARINT_LEN + EPHEMERAL_KEY_LEN);
        header.push(self.kind.version());
        write_varint(self.counter, &mut header);
        header.extend_from_slice(&self.ephemeral_public);
        header
    }

    /// Header followed by `bound`, which is not transmitted
    fn associated_data(&self, bound: &[u8]) -> Vec<u8> {
        let mut aad = self.header();
        aad.extend_from_slice(bound);
        aad
    }

    fn expect_kind(&self, expected: EnvelopeKind) -> Result<(), Error> {
        if self.kind != expected {
            return Err(Error::WrongEnvelopeVersion {
                expected: expected.version(),
                actual: self.kind.version(),
            });
        }
        Ok(())
    }
}

/// Seal `plaintext` with the ratchet key for `counter`, for a transaction
/// submitted by `sender`.
///
/// A fresh ephemeral public key is generated for every envelope so the AEAD
/// nonce stays unique even if a counter were ever reused.
pub fn seal_psk(
    secret: &[u8],
    sender: &str,
    counter: u64,
    plaintext: &[u8],
) -> Result<Envelope, Error> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral).to_bytes();
    let ratchet_key = ratchet::derive_key(secret, counter)?;

    seal(
        EnvelopeKind::Psk,
        ratchet_key.as_ref(),
        counter,
        ephemeral_public,
        sender.as_bytes(),
        plaintext,
    )
}

/// Open a PSK envelope with a contact's pre-shared secret.
///
/// `sender` is the address that submitted the carrying transaction. The
/// counter is taken from the envelope itself.
pub fn open_psk(secret: &[u8], sender: &str, envelope: &Envelope) -> Result<Vec<u8>, Error> {
    envelope.expect_kind(EnvelopeKind::Psk)?;
    let ratchet_key = ratchet::derive_key(secret, envelope.counter)?;
    open(ratchet_key.as_ref(), sender.as_bytes(), envelope)
}

/// Seal `plaintext` to a recipient's X25519 public key
pub fn seal_direct(
    recipient_public: &[u8; 32],
    counter: u64,
    plaintext: &[u8],
) -> Result<Envelope, Error> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral).to_bytes();
    let shared = ephemeral.diffie_hellman(&PublicKey::from(*recipient_public));
    if !shared.was_contributory() {
        return Err(Error::WeakKeyExchange);
    }

    seal(
        EnvelopeKind::Direct,
        shared.as_bytes(),
        counter,
        ephemeral_public,
        &[],
        plaintext,
    )
}

/// Open a direct envelope with the recipient's static secret
pub fn open_direct(recipient: &StaticSecret, envelope: &Envelope) -> Result<Vec<u8>, Error> {
    envelope.expect_kind(EnvelopeKind::Direct)?;
    let shared = recipient.diffie_hellman(&PublicKey::from(envelope.ephemeral_public));
    if !shared.was_contributory() {
        return Err(Error::WeakKeyExchange);
    }
    open(shared.as_bytes(), &[], envelope)
}

fn seal(
    kind: EnvelopeKind,
    ikm: &[u8],
    counter: u64,
    ephemeral_public: [u8; EPHEMERAL_KEY_LEN],
    bound: &[u8],
    plaintext: &[u8],
) -> Result<Envelope, Error> {
    let mut envelope = Envelope::new(
        kind,
        counter,
        plaintext.to_vec(),
        [0u8; TAG_LEN],
        ephemeral_public,
    );
    let (key, nonce) = message_keys(ikm, &ephemeral_public)?;
    let cipher = ChaCha20Poly1305::new_from_slice(key.as_ref())
        .map_err(|e| Error::Encryption(format!("Failed to create cipher: {e}")))?;

    let aad = envelope.associated_data(bound);
    let tag = cipher
        .encrypt_in_place_detached(
            Nonce::from_slice(nonce.as_ref()),
            &aad,
            &mut envelope.ciphertext,
        )
        .map_err(|e| Error::Encryption(e.to_string()))?;
    envelope.tag.copy_from_slice(&tag);

    Ok(envelope)
}

fn open(ikm: &[u8], bound: &[u8], envelope: &Envelope) -> Result<Vec<u8>, Error> {
    let (key, nonce) = message_keys(ikm, &envelope.ephemeral_public)?;
    let cipher =
        ChaCha20Poly1305::new_from_slice(key.as_ref()).map_err(|_| Error::Authentication)?;

    let aad = envelope.associated_data(bound);
    let mut buffer = envelope.ciphertext.clone();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(nonce.as_ref()),
            &aad,
            &mut buffer,
            Tag::from_slice(&envelope.tag),
        )
        .map_err(|_| Error::Authentication)?;

    Ok(buffer)
}

/// Per-envelope AEAD key and nonce
fn message_keys(
    ikm: &[u8],
    salt: &[u8; EPHEMERAL_KEY_LEN],
) -> Result<(Secret<[u8; 32]>, Secret<[u8; NONCE_LEN]>), Error> {
    let hk = Hkdf::<Sha256>::new(Some(salt.as_slice()), ikm);

    let mut key = [0u8; 32];
    hk.expand(MESSAGE_KEY_INFO, &mut key)
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;

    let mut nonce = [0u8; NONCE_LEN];
    hk.expand(MESSAGE_NONCE_INFO, &mut nonce)
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;

    Ok((Secret::new(key), Secret::new(nonce)))
}

/// Bytes needed to LEB128-encode `value`
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

fn write_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Returns the value and the number of bytes consumed
fn read_varint(bytes: &[u8]) -> Result<(u64, usize), DecodeError> {
    let mut value: u64 = 0;
    for (i, byte) in bytes.iter().take(MAX_VARINT_LEN).enumerate() {
        let payload = u64::from(byte & 0x7f);
        // The tenth byte may only contribute the top bit
        if i == MAX_VARINT_LEN - 1 && payload > 1 {
            return Err(DecodeError::CounterOverflow);
        }
        value |= payload << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(DecodeError::MalformedCounter)
}
