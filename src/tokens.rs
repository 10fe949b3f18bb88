//! Random secret tokens and public identifiers.
//!
//! Every token kind has a fixed length and the same case-sensitive
//! alphanumeric alphabet. The kind is carried as data so validation and
//! generation can never disagree about a length.

use rand::Rng;

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Attempts at generating a random identifier before giving up. The id
/// space (62^10 and up) makes collisions negligible but not impossible.
pub(crate) const GENERATE_ATTEMPTS: u32 = 5;

/// Every kind of random secret or public identifier the system issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Confirms a freshly created account.
    Creation,
    /// Confirms account deletion.
    Deletion,
    /// Authorizes a password reset.
    Recovery,
    /// Backup code held by the user; only its hash is stored.
    Backup,
    /// Authenticated session.
    Session,
    /// Confirms an email-address change.
    Email,
    /// Random part of a post's storage filename.
    PostId,
    /// Public handle for an uploaded image.
    ImageId,
}

impl TokenKind {
    pub const fn length(self) -> usize {
        match self {
            TokenKind::Creation
            | TokenKind::Deletion
            | TokenKind::Recovery
            | TokenKind::Backup
            | TokenKind::Session
            | TokenKind::Email => 30,
            TokenKind::PostId | TokenKind::ImageId => 10,
        }
    }

    /// Tag stored in the tokens table `type` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            TokenKind::Creation => "creation",
            TokenKind::Deletion => "deletion",
            TokenKind::Recovery => "recovery",
            TokenKind::Backup => "backup",
            TokenKind::Session => "session",
            TokenKind::Email => "email",
            TokenKind::PostId => "postid",
            TokenKind::ImageId => "imgid",
        }
    }
}

/// Generate a random alphanumeric token of the kind's fixed length.
pub fn generate(kind: TokenKind) -> String {
    let mut rng = rand::thread_rng();
    (0..kind.length())
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}
