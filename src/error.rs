//! Error kinds for the engram core (see spec §7).

use thiserror::Error;

/// All fallible operations in the engram core return this error.
#[derive(Error, Debug)]
pub enum EngramError {
    /// Requested episode/id does not exist. Callers recover locally
    /// (`forget` returns `false`, `recall` omits the id).
    #[error("not found: {0}")]
    NotFound(String),

    /// Unreadable JSON on an individual episode or index file. A single
    /// corrupt episode file must not poison the whole store; callers
    /// that hit this for an episode skip it, for an index treat it as
    /// absent and trigger a full rebuild.
    #[error("malformed data: {0}")]
    Malformed(String),

    /// AEAD tag mismatch, Merkle proof failure, or snapshot root
    /// mismatch. Never silently coerced into a different result.
    #[error("integrity failure: {0}")]
    IntegrityFailure(String),

    /// Encryption demanded but no key resolvable, or a key of the wrong
    /// length. Surfaced at `init`.
    #[error("policy error: {0}")]
    PolicyError(String),

    /// Storage I/O failure. Propagated without retry.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Invalid caller-supplied parameters (e.g. weights outside
    /// `[0, 1]`). Empty query tokens are NOT an error (§7); that case
    /// returns an empty result instead.
    #[error("usage error: {0}")]
    UsageError(String),
}

pub type Result<T> = std::result::Result<T, EngramError>;
