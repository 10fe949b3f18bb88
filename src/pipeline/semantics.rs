//! Stage 2: semantic and authorization checks.
//!
//! Everything here reads but never mutates (the one exception: lazily
//! sweeping an expired session token that would otherwise linger). A
//! failure aborts the request before the interpretation stage runs.

use super::Pipeline;
use crate::error::{AppError, AppResult};
use crate::limits::*;
use crate::tokens::TokenKind;

impl Pipeline {
    /// Resolve a session token to its owner. Expiry is judged here from the
    /// token's age, not by the store: a stale row is still rejected (and
    /// swept). Suspended owners are rejected outright.
    pub(crate) fn resolve_session(&self, token: &str) -> AppResult<i64> {
        let row = self
            .db
            .token_lookup(token, TokenKind::Session)?
            .ok_or(AppError::InvalidToken)?;

        if row.age_minutes >= SESSION_MAX_DURATION_MINS {
            self.db.expire_token(token)?;
            return Err(AppError::InvalidToken);
        }

        let flags = self
            .db
            .user_flags(row.owner)?
            .ok_or(AppError::InvalidToken)?;
        if flags.suspended {
            return Err(AppError::AccountSuspended);
        }

        Ok(row.owner)
    }

    pub(crate) fn require_user(&self, uid: i64) -> AppResult<()> {
        if self.db.user_exists(uid)? {
            Ok(())
        } else {
            Err(AppError::NoSuchUser)
        }
    }

    pub(crate) fn require_admin(&self, uid: i64) -> AppResult<()> {
        let flags = self.db.user_flags(uid)?.ok_or(AppError::NoSuchUser)?;
        if flags.admin {
            Ok(())
        } else {
            Err(AppError::NotAuthorized)
        }
    }

    /// Post mutations are allowed to the owner, or to an admin when
    /// `admin_override` is set (moderation).
    pub(crate) fn require_post_owner(
        &self,
        uid: i64,
        pid: i64,
        admin_override: bool,
    ) -> AppResult<()> {
        let owner = self.db.post_owner(pid)?.ok_or(AppError::NoSuchPost)?;
        if owner == uid || (admin_override && self.is_admin(uid)?) {
            Ok(())
        } else {
            Err(AppError::NotAuthorized)
        }
    }

    pub(crate) fn require_comment_owner(&self, uid: i64, cid: i64) -> AppResult<()> {
        let owner = self
            .db
            .comment_owner(cid)?
            .ok_or(AppError::InvalidComment)?;
        if owner == uid || self.is_admin(uid)? {
            Ok(())
        } else {
            Err(AppError::NotAuthorized)
        }
    }

    pub(crate) fn require_image_owner(&self, uid: i64, accessid: &str) -> AppResult<()> {
        let owner = self
            .db
            .image_owner(accessid)?
            .ok_or(AppError::NoSuchImage)?;
        if owner == uid {
            Ok(())
        } else {
            Err(AppError::NotAuthorized)
        }
    }

    fn is_admin(&self, uid: i64) -> AppResult<bool> {
        Ok(self.db.user_flags(uid)?.map(|f| f.admin).unwrap_or(false))
    }

    // ----- quotas -----------------------------------------------------------

    pub(crate) fn check_post_quota(&self, uid: i64) -> AppResult<()> {
        if self.db.count_posts(uid)? >= USER_MAX_POSTS
            || self.db.count_posts_today(uid)? >= USER_MAX_POSTS_PER_DAY
        {
            Err(AppError::RateLimitExceeded)
        } else {
            Ok(())
        }
    }

    pub(crate) fn check_comment_quota(&self, uid: i64) -> AppResult<()> {
        if self.db.count_comments_today(uid)? >= USER_MAX_COMMENTS_PER_DAY {
            Err(AppError::RateLimitExceeded)
        } else {
            Ok(())
        }
    }

    pub(crate) fn check_friend_request_quota(&self, uid: i64) -> AppResult<()> {
        if self.db.count_friend_requests_today(uid)? >= FRIEND_REQUESTS_MAX_PER_DAY {
            Err(AppError::RateLimitExceeded)
        } else {
            Ok(())
        }
    }

    pub(crate) fn check_image_quota(&self, uid: i64) -> AppResult<()> {
        if self.db.count_images(uid)? >= USER_MAX_IMAGES {
            Err(AppError::RateLimitExceeded)
        } else {
            Ok(())
        }
    }
}
