//! Noteline constants

/// Envelope version byte for messages sealed with a contact's pre-shared secret
pub const ENVELOPE_VERSION_PSK: u8 = 0x01;

/// Envelope version byte for messages sealed to a recipient's public key
pub const ENVELOPE_VERSION_DIRECT: u8 = 0x02;

/// X25519 public key length
pub const EPHEMERAL_KEY_LEN: usize = 32;

/// Poly1305 tag length
pub const TAG_LEN: usize = 16;

/// ChaCha20-Poly1305 nonce length
pub const NONCE_LEN: usize = 12;

/// Longest LEB128 encoding of a `u64`
pub const MAX_VARINT_LEN: usize = 10;

/// Smallest possible envelope: version, one counter byte, key, empty ciphertext, tag
pub const MIN_ENVELOPE_LEN: usize = 1 + 1 + EPHEMERAL_KEY_LEN + TAG_LEN;

/// HKDF salt for the key ratchet
pub(crate) const RATCHET_SALT: &[u8] = b"noteline/ratchet/v1";

/// HKDF info prefix for the key ratchet; the counter follows as 8 big-endian bytes
pub(crate) const RATCHET_INFO: &[u8] = b"noteline/ratchet/v1/counter";

/// HKDF info for the per-envelope AEAD key
pub(crate) const MESSAGE_KEY_INFO: &[u8] = b"noteline/envelope/v1/key";

/// HKDF info for the per-envelope AEAD nonce
pub(crate) const MESSAGE_NONCE_INFO: &[u8] = b"noteline/envelope/v1/nonce";

/// Appended to content cut down for a single fallback transmission
pub const TRUNCATION_MARKER: &str = "…[truncated]";

/// Number of recent counters remembered per contact for replay rejection
pub const REPLAY_WINDOW: u64 = 200;

/// Dead-letter log target
pub const DEAD_LETTER_TARGET: &str = "noteline::dead_letter";

/// Stored cursor for inbound routing of matched contacts and direct envelopes
pub const INBOUND_CURSOR: &str = "inbound";

/// Stored cursor for the discovery poller
pub const DISCOVERY_CURSOR: &str = "discovery";
