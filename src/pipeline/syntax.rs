//! Stage 1: syntactic validation.
//!
//! Pure functions, no side effects. Each input is checked against its fixed
//! rule and the first violation aborts the request with the error named for
//! the rule, before any later stage runs. Secrets (passwords, backup codes)
//! are hashed here so the raw value never travels further down the pipeline.

use sha2::{Digest, Sha256};

use crate::error::{AppError, AppResult};
use crate::limits::*;
use crate::tokens::TokenKind;

/// SHA-256 hex digest.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

fn length_between(s: &str, lower: usize, upper: usize) -> bool {
    let len = s.chars().count();
    len >= lower && len <= upper
}

/// Structurally valid address: non-empty local and domain parts around a
/// single `@`, no whitespace.
pub fn validate_email(email: &str) -> AppResult<()> {
    let mut parts = email.split('@');
    let (local, domain) = (parts.next().unwrap_or(""), parts.next().unwrap_or(""));
    let ok = parts.next().is_none()
        && !local.is_empty()
        && !domain.is_empty()
        && !email.chars().any(|c| c.is_whitespace());
    if ok {
        Ok(())
    } else {
        Err(AppError::InvalidEmail)
    }
}

pub fn validate_username(username: &str) -> AppResult<()> {
    if length_between(username, USERNAME_MIN_LENGTH, USERNAME_MAX_LENGTH) {
        Ok(())
    } else {
        Err(AppError::InvalidUsername)
    }
}

/// Validate a raw password and return its digest; the raw password stops here.
pub fn hash_password(password: &str) -> AppResult<String> {
    if !length_between(password, PASSWORD_MIN_LENGTH, PASSWORD_MAX_LENGTH) {
        return Err(AppError::InvalidPassword);
    }
    Ok(sha256_hex(password))
}

/// Exact length for the kind, alphanumeric only.
pub fn validate_token(token: &str, kind: TokenKind) -> AppResult<()> {
    if token.len() == kind.length() && token.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(AppError::InvalidToken)
    }
}

/// A backup code validates like any token but is forwarded as its hash,
/// for comparison against the stored recovery hash.
pub fn hash_backup_code(code: &str) -> AppResult<String> {
    validate_token(code, TokenKind::Backup)?;
    Ok(sha256_hex(code))
}

pub fn validate_status(status: &str) -> AppResult<()> {
    if length_between(status, STATUS_MIN_LENGTH, STATUS_MAX_LENGTH) {
        Ok(())
    } else {
        Err(AppError::InvalidStatus)
    }
}

pub fn validate_post_body(content: &str) -> AppResult<()> {
    if length_between(content, 0, POST_MAX_LENGTH) {
        Ok(())
    } else {
        Err(AppError::InvalidPost)
    }
}

pub fn validate_post_title(title: &str) -> AppResult<()> {
    if length_between(title, POST_TITLE_MIN_LENGTH, POST_TITLE_MAX_LENGTH) {
        Ok(())
    } else {
        Err(AppError::InvalidTitle)
    }
}

/// Image titles carry the upload's extension: there must be a `.` and the
/// lowercased suffix must be an allowed image type. The extension is
/// returned separately; the title keeps its original form.
pub fn validate_image_title(title: &str) -> AppResult<String> {
    if !length_between(title, IMG_TITLE_MIN_LENGTH, IMG_TITLE_MAX_LENGTH) {
        return Err(AppError::InvalidTitle);
    }
    let (_, extension) = title.rsplit_once('.').ok_or(AppError::InvalidTitle)?;
    let extension = extension.to_lowercase();
    if USER_IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(AppError::InvalidTitle)
    }
}

pub fn validate_image_payload(bytes: &[u8]) -> AppResult<()> {
    if bytes.len() <= IMG_MAX_SIZE_BYTES {
        Ok(())
    } else {
        Err(AppError::BadImage)
    }
}

pub fn validate_comment(content: &str) -> AppResult<()> {
    if length_between(content, COMMENT_MIN_LENGTH, COMMENT_MAX_LENGTH) {
        Ok(())
    } else {
        Err(AppError::InvalidComment)
    }
}

pub fn validate_report(content: &str) -> AppResult<()> {
    if length_between(content, BUG_REPORT_MIN_LENGTH, BUG_REPORT_MAX_LENGTH) {
        Ok(())
    } else {
        Err(AppError::InvalidReport)
    }
}

pub fn validate_query(query: &str) -> AppResult<()> {
    if length_between(query, 0, QUERY_MAX_LENGTH) {
        Ok(())
    } else {
        Err(AppError::InvalidQuery)
    }
}

/// An id that overflows i64 cannot name a real row, so it gets the same
/// not-found error as any other malformed id.
fn parse_digits(raw: &str, err: AppError) -> AppResult<i64> {
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(id) = raw.parse() {
            return Ok(id);
        }
    }
    Err(err)
}

pub fn parse_user_id(raw: &str) -> AppResult<i64> {
    parse_digits(raw, AppError::NoSuchUser)
}

pub fn parse_post_id(raw: &str) -> AppResult<i64> {
    parse_digits(raw, AppError::NoSuchPost)
}

pub fn parse_comment_id(raw: &str) -> AppResult<i64> {
    parse_digits(raw, AppError::InvalidComment)
}

/// Public image handles are opaque alphanumeric strings.
pub fn validate_image_id(raw: &str) -> AppResult<()> {
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(AppError::NoSuchImage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens;

    #[test]
    fn email_needs_local_and_domain() {
        assert!(validate_email("a@b.com").is_ok());
        assert!(validate_email("@b.com").is_err());
        assert!(validate_email("a@").is_err());
        assert!(validate_email("nobody").is_err());
        assert!(validate_email("a b@c.com").is_err());
        assert!(validate_email("a@b@c.com").is_err());
    }

    #[test]
    fn username_bounds() {
        assert!(validate_username("a").is_ok());
        assert!(validate_username(&"x".repeat(30)).is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username(&"x".repeat(31)).is_err());
    }

    #[test]
    fn password_hashing_is_deterministic() {
        let p = "correct-horse-battery";
        assert_eq!(hash_password(p).unwrap(), hash_password(p).unwrap());
    }

    #[test]
    fn distinct_passwords_hash_differently() {
        let digests: Vec<String> = ["aaaaaaaaaaaaaaaa", "bbbbbbbbbbbbbbbb", "cccccccccccccccc"]
            .iter()
            .map(|p| hash_password(p).unwrap())
            .collect();
        assert_ne!(digests[0], digests[1]);
        assert_ne!(digests[1], digests[2]);
        assert_ne!(digests[0], digests[2]);
    }

    #[test]
    fn password_length_bounds() {
        assert!(hash_password(&"p".repeat(14)).is_err());
        assert!(hash_password(&"p".repeat(15)).is_ok());
        assert!(hash_password(&"p".repeat(50)).is_ok());
        assert!(hash_password(&"p".repeat(51)).is_err());
    }

    #[test]
    fn password_digest_is_sha256_hex() {
        let digest = hash_password("passwordpassword").unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fresh_tokens_always_validate() {
        for kind in [TokenKind::Session, TokenKind::Creation, TokenKind::ImageId] {
            let token = tokens::generate(kind);
            assert!(validate_token(&token, kind).is_ok());
        }
    }

    #[test]
    fn token_length_must_match_kind() {
        let session = tokens::generate(TokenKind::Session);
        assert!(validate_token(&session, TokenKind::PostId).is_err());
        assert!(validate_token(&session[..29], TokenKind::Session).is_err());
    }

    #[test]
    fn token_must_be_alphanumeric() {
        let mut token = tokens::generate(TokenKind::Session);
        token.replace_range(0..1, "!");
        assert!(validate_token(&token, TokenKind::Session).is_err());
    }

    #[test]
    fn image_title_extension_rules() {
        assert_eq!(validate_image_title("pic.PNG").unwrap(), "png");
        assert_eq!(validate_image_title("holiday.photo.jpeg").unwrap(), "jpeg");
        assert!(validate_image_title("pic.GIF").is_err());
        assert!(validate_image_title("noextension").is_err());
        assert!(validate_image_title("").is_err());
    }

    #[test]
    fn image_payload_size_cap() {
        assert!(validate_image_payload(&vec![0u8; 1_000_000]).is_ok());
        assert!(validate_image_payload(&vec![0u8; 1_000_001]).is_err());
    }

    #[test]
    fn numeric_ids_must_be_digits() {
        assert_eq!(parse_user_id("42").unwrap(), 42);
        assert!(parse_user_id("4x2").is_err());
        assert!(parse_user_id("-1").is_err());
        assert!(parse_user_id("").is_err());
        assert!(matches!(parse_post_id("abc"), Err(AppError::NoSuchPost)));
    }

    #[test]
    fn overflowing_ids_read_as_not_found() {
        // 20 digits: all of them valid, none of them a representable id.
        assert!(matches!(
            parse_user_id("99999999999999999999"),
            Err(AppError::NoSuchUser)
        ));
        assert!(matches!(
            parse_post_id("99999999999999999999"),
            Err(AppError::NoSuchPost)
        ));
        assert!(matches!(
            parse_comment_id("99999999999999999999"),
            Err(AppError::InvalidComment)
        ));
    }

    #[test]
    fn report_length_bounds() {
        assert!(validate_report(&"r".repeat(99)).is_err());
        assert!(validate_report(&"r".repeat(100)).is_ok());
        assert!(validate_report(&"r".repeat(5000)).is_ok());
        assert!(validate_report(&"r".repeat(5001)).is_err());
    }
}
