//! The request pipeline. Every public operation runs its three stages in
//! fixed order: syntactic validation (`syntax`), semantic/authorization
//! checks (`semantics`), then side-effecting interpretation (`interpret`).
//! A failure at any stage aborts before the next one runs, so no side
//! effect can precede a validation failure.

pub mod interpret;
pub mod semantics;
pub mod syntax;

use std::path::PathBuf;
use std::sync::Arc;

use crate::db::models::{
    FriendLink, ImageSummary, PostDetail, PostHit, PrivateProfile, PublicProfile, UserHit,
};
use crate::db::Database;
use crate::email::Mailer;
use crate::error::{AppError, AppResult};
use crate::files::FileStore;
use crate::limits::SEARCH_PAGE_SIZE;
use crate::tokens::TokenKind;

/// The model entry point. Collaborator ports are injected at construction;
/// the pipeline itself is stateless between requests.
pub struct Pipeline {
    pub(crate) db: Database,
    pub(crate) mailer: Arc<dyn Mailer>,
    pub(crate) files: Arc<dyn FileStore>,
    pub(crate) public_url: String,
}

impl Pipeline {
    pub fn new(
        db: Database,
        mailer: Arc<dyn Mailer>,
        files: Arc<dyn FileStore>,
        public_url: String,
    ) -> Self {
        Self {
            db,
            mailer,
            files,
            public_url,
        }
    }

    // ----- account creation & sessions ---------------------------------------

    /// Create an account. An unconfirmed account squatting on the email is
    /// purged first, acceptable or not; a confirmed holder is never touched.
    /// Returns the one-time backup code when an account was created.
    pub fn create_account(
        &self,
        email: &str,
        username: &str,
        password: &str,
        acceptable: bool,
    ) -> AppResult<Option<String>> {
        syntax::validate_email(email)?;
        syntax::validate_username(username)?;
        let hpassword = syntax::hash_password(password)?;

        // The purge of an abandoned signup happens even when the request is
        // not acceptable; only a confirmed holder blocks the address. On the
        // accepted path the purge is part of the creation transaction.
        match self.db.email_owner(email)? {
            Some((_, true)) => return Err(AppError::InvalidEmail),
            Some((old_uid, false)) if !acceptable => {
                self.do_delete_user(old_uid)?;
                return Ok(None);
            }
            _ => {}
        }
        if !acceptable {
            return Ok(None);
        }
        if self.db.username_owner(username)?.is_some() {
            return Err(AppError::InvalidUsername);
        }

        self.do_create_account(email, username, &hpassword).map(Some)
    }

    pub fn confirm_create(&self, token: &str) -> AppResult<()> {
        syntax::validate_token(token, TokenKind::Creation)?;
        self.do_confirm_create(token)
    }

    /// Issue a session. Sessions are multi-valued: logging in never
    /// invalidates other sessions.
    pub fn login(&self, username: &str, password: &str) -> AppResult<String> {
        syntax::validate_username(username)?;
        let hpassword = syntax::hash_password(password)?;

        let uid = self
            .db
            .password_correct(username, &hpassword)?
            .ok_or(AppError::NoSuchUser)?;
        let flags = self.db.user_flags(uid)?.ok_or(AppError::NoSuchUser)?;
        if flags.suspended {
            return Err(AppError::AccountSuspended);
        }
        if !flags.confirmed {
            return Err(AppError::NotAuthorized);
        }

        self.do_login(uid)
    }

    pub fn logout(&self, session: &str) -> AppResult<()> {
        syntax::validate_token(session, TokenKind::Session)?;
        self.do_logout(session)
    }

    // ----- deletion, recovery, email change -----------------------------------

    pub fn delete_account(&self, session: &str, password: &str) -> AppResult<()> {
        syntax::validate_token(session, TokenKind::Session)?;
        let hpassword = syntax::hash_password(password)?;

        let uid = self.resolve_session(session)?;
        if !self.db.password_matches(uid, &hpassword)? {
            return Err(AppError::NotAuthorized);
        }
        let email = self.db.user_email(uid)?.ok_or(AppError::NoSuchUser)?;

        self.do_request_deletion(uid, &email)
    }

    pub fn confirm_delete(&self, token: &str) -> AppResult<()> {
        syntax::validate_token(token, TokenKind::Deletion)?;
        self.do_confirm_delete(token)
    }

    /// Start email-link recovery. Unknown or unconfirmed addresses succeed
    /// silently so the operation discloses nothing.
    pub fn recover_account(&self, email: &str) -> AppResult<()> {
        syntax::validate_email(email)?;

        if let Some((uid, confirmed)) = self.db.email_owner(email)? {
            if confirmed {
                return self.do_request_recovery(uid, email);
            }
        }
        Ok(())
    }

    /// Recovery via backup code. The raw code never leaves the syntactic
    /// stage; its hash is compared against the stored recovery hash.
    pub fn backup_recover(&self, backup_code: &str, email: &str) -> AppResult<()> {
        let hcode = syntax::hash_backup_code(backup_code)?;
        syntax::validate_email(email)?;

        let uid = self
            .db
            .recovery_owner(&hcode)?
            .ok_or(AppError::NoSuchUser)?;
        match self.db.user_email(uid)? {
            Some(stored) if stored == email => {}
            _ => return Err(AppError::NoSuchUser),
        }

        self.do_backup_recover(uid, email)
    }

    pub fn confirm_recover(&self, token: &str, new_password: &str) -> AppResult<()> {
        syntax::validate_token(token, TokenKind::Recovery)?;
        let hpassword = syntax::hash_password(new_password)?;
        self.do_confirm_recover(token, &hpassword)
    }

    pub fn change_email(&self, session: &str, new_email: &str) -> AppResult<()> {
        syntax::validate_token(session, TokenKind::Session)?;
        syntax::validate_email(new_email)?;

        let uid = self.resolve_session(session)?;
        if let Some((holder, _)) = self.db.email_owner(new_email)? {
            if holder != uid {
                return Err(AppError::InvalidEmail);
            }
        }

        self.do_request_email_change(uid, new_email)
    }

    pub fn confirm_email(&self, token: &str) -> AppResult<()> {
        syntax::validate_token(token, TokenKind::Email)?;
        self.do_confirm_email(token)
    }

    // ----- profile -------------------------------------------------------------

    pub fn get_my_user(&self, session: &str, concise: bool) -> AppResult<PrivateProfile> {
        syntax::validate_token(session, TokenKind::Session)?;
        let uid = self.resolve_session(session)?;
        self.db
            .get_private_user(uid, concise)?
            .ok_or(AppError::NoSuchUser)
    }

    pub fn change_status(&self, session: &str, status: &str) -> AppResult<()> {
        syntax::validate_token(session, TokenKind::Session)?;
        syntax::validate_status(status)?;
        let uid = self.resolve_session(session)?;
        self.db.set_status(uid, status)
    }

    pub fn change_picture(&self, session: &str, accessid: &str) -> AppResult<()> {
        syntax::validate_token(session, TokenKind::Session)?;
        syntax::validate_image_id(accessid)?;
        let uid = self.resolve_session(session)?;
        self.require_image_owner(uid, accessid)?;
        self.db.set_picture(uid, accessid)
    }

    pub fn change_username(&self, session: &str, username: &str) -> AppResult<()> {
        syntax::validate_token(session, TokenKind::Session)?;
        syntax::validate_username(username)?;
        let uid = self.resolve_session(session)?;

        match self.db.username_owner(username)? {
            Some(holder) if holder != uid => return Err(AppError::InvalidUsername),
            _ => {}
        }
        if !self.db.set_username(uid, username)? {
            return Err(AppError::InvalidUsername);
        }
        Ok(())
    }

    // ----- public reads ---------------------------------------------------------

    pub fn get_user(&self, uid: &str) -> AppResult<PublicProfile> {
        let uid = syntax::parse_user_id(uid)?;
        self.db.get_public_user(uid)?.ok_or(AppError::NoSuchUser)
    }

    pub fn get_post(&self, pid: &str) -> AppResult<PostDetail> {
        let pid = syntax::parse_post_id(pid)?;
        let mut post = self.db.get_post_info(pid)?.ok_or(AppError::NoSuchPost)?;
        post.content = self.files.read_post(&post.filename)?;
        Ok(post)
    }

    /// Resolve a public image handle to the path it is served from.
    pub fn get_image(&self, accessid: &str) -> AppResult<PathBuf> {
        syntax::validate_image_id(accessid)?;
        let filename = self
            .db
            .image_filename(accessid)?
            .ok_or(AppError::NoSuchImage)?;
        Ok(self.files.image_path(&filename))
    }

    pub fn search_users(&self, query: &str, page: i64) -> AppResult<Vec<UserHit>> {
        syntax::validate_query(query)?;
        let page = page.max(0);
        self.db
            .search_users(query, SEARCH_PAGE_SIZE, page * SEARCH_PAGE_SIZE)
    }

    pub fn search_posts(&self, query: &str, page: i64) -> AppResult<Vec<PostHit>> {
        syntax::validate_query(query)?;
        let page = page.max(0);
        self.db
            .search_posts(query, SEARCH_PAGE_SIZE, page * SEARCH_PAGE_SIZE)
    }

    // ----- posts ----------------------------------------------------------------

    pub fn write_post(&self, session: &str, title: &str, content: &str) -> AppResult<i64> {
        syntax::validate_token(session, TokenKind::Session)?;
        syntax::validate_post_title(title)?;
        syntax::validate_post_body(content)?;

        let uid = self.resolve_session(session)?;
        self.check_post_quota(uid)?;

        self.do_write_post(uid, title, content)
    }

    pub fn edit_post(&self, session: &str, pid: &str, title: &str, content: &str) -> AppResult<()> {
        syntax::validate_token(session, TokenKind::Session)?;
        let pid = syntax::parse_post_id(pid)?;
        syntax::validate_post_title(title)?;
        syntax::validate_post_body(content)?;

        let uid = self.resolve_session(session)?;
        self.require_post_owner(uid, pid, false)?;

        self.do_edit_post(pid, title, content)
    }

    pub fn delete_post(&self, session: &str, pid: &str) -> AppResult<()> {
        syntax::validate_token(session, TokenKind::Session)?;
        let pid = syntax::parse_post_id(pid)?;

        let uid = self.resolve_session(session)?;
        self.require_post_owner(uid, pid, true)?;

        self.do_delete_post(pid)
    }

    // ----- images ----------------------------------------------------------------

    pub fn upload_image(&self, session: &str, title: &str, bytes: &[u8]) -> AppResult<String> {
        syntax::validate_token(session, TokenKind::Session)?;
        let extension = syntax::validate_image_title(title)?;
        syntax::validate_image_payload(bytes)?;

        let uid = self.resolve_session(session)?;
        self.check_image_quota(uid)?;

        self.do_upload_image(uid, title, &extension, bytes)
    }

    pub fn delete_image(&self, session: &str, accessid: &str) -> AppResult<()> {
        syntax::validate_token(session, TokenKind::Session)?;
        syntax::validate_image_id(accessid)?;

        let uid = self.resolve_session(session)?;
        self.require_image_owner(uid, accessid)?;

        self.do_delete_image(accessid)
    }

    pub fn list_images(&self, session: &str) -> AppResult<Vec<ImageSummary>> {
        syntax::validate_token(session, TokenKind::Session)?;
        let uid = self.resolve_session(session)?;
        self.db.list_images(uid)
    }

    // ----- friendships -------------------------------------------------------------

    pub fn friend_request(&self, session: &str, other: &str) -> AppResult<()> {
        syntax::validate_token(session, TokenKind::Session)?;
        let other = syntax::parse_user_id(other)?;

        let uid = self.resolve_session(session)?;
        self.require_user(other)?;
        if uid == other {
            return Err(AppError::NotAuthorized);
        }
        self.check_friend_request_quota(uid)?;

        self.db.friend_request(uid, other)
    }

    pub fn accept_friend_req(&self, session: &str, other: &str) -> AppResult<()> {
        syntax::validate_token(session, TokenKind::Session)?;
        let other = syntax::parse_user_id(other)?;

        let uid = self.resolve_session(session)?;
        self.require_user(other)?;
        if uid == other {
            return Err(AppError::NotAuthorized);
        }

        self.db.accept_friend_request(uid, other)
    }

    pub fn unfriend(&self, session: &str, other: &str) -> AppResult<()> {
        syntax::validate_token(session, TokenKind::Session)?;
        let other = syntax::parse_user_id(other)?;

        let uid = self.resolve_session(session)?;
        self.require_user(other)?;

        self.db.unfriend(uid, other)
    }

    pub fn view_friend_reqs(&self, session: &str) -> AppResult<Vec<FriendLink>> {
        syntax::validate_token(session, TokenKind::Session)?;
        let uid = self.resolve_session(session)?;
        self.db.pending_requests_for(uid)
    }

    // ----- comments, votes, reports ---------------------------------------------------

    pub fn comment(&self, session: &str, pid: &str, content: &str) -> AppResult<i64> {
        syntax::validate_token(session, TokenKind::Session)?;
        let pid = syntax::parse_post_id(pid)?;
        syntax::validate_comment(content)?;

        let uid = self.resolve_session(session)?;
        if self.db.post_owner(pid)?.is_none() {
            return Err(AppError::NoSuchPost);
        }
        self.check_comment_quota(uid)?;

        self.db.insert_comment(uid, pid, content)
    }

    pub fn delete_comment(&self, session: &str, cid: &str) -> AppResult<()> {
        syntax::validate_token(session, TokenKind::Session)?;
        let cid = syntax::parse_comment_id(cid)?;

        let uid = self.resolve_session(session)?;
        self.require_comment_owner(uid, cid)?;

        self.db.delete_comment(cid)
    }

    pub fn like(&self, session: &str, pid: &str) -> AppResult<()> {
        self.vote(session, pid, Some(true))
    }

    pub fn dislike(&self, session: &str, pid: &str) -> AppResult<()> {
        self.vote(session, pid, Some(false))
    }

    pub fn unlike(&self, session: &str, pid: &str) -> AppResult<()> {
        self.vote(session, pid, None)
    }

    fn vote(&self, session: &str, pid: &str, like: Option<bool>) -> AppResult<()> {
        syntax::validate_token(session, TokenKind::Session)?;
        let pid = syntax::parse_post_id(pid)?;

        let uid = self.resolve_session(session)?;
        if self.db.post_owner(pid)?.is_none() {
            return Err(AppError::NoSuchPost);
        }

        match like {
            Some(like) => self.db.set_vote(uid, pid, like),
            None => self.db.clear_vote(uid, pid),
        }
    }

    pub fn bug_report(&self, session: &str, content: &str) -> AppResult<()> {
        syntax::validate_token(session, TokenKind::Session)?;
        syntax::validate_report(content)?;

        let uid = self.resolve_session(session)?;
        self.db.insert_report(uid, content)
    }

    // ----- moderation -----------------------------------------------------------------

    pub fn admin_get_user(&self, session: &str, target: &str) -> AppResult<PrivateProfile> {
        syntax::validate_token(session, TokenKind::Session)?;
        let target = syntax::parse_user_id(target)?;

        let uid = self.resolve_session(session)?;
        self.require_admin(uid)?;

        self.db
            .get_private_user(target, false)?
            .ok_or(AppError::NoSuchUser)
    }

    pub fn admin_suspend(&self, session: &str, target: &str) -> AppResult<()> {
        syntax::validate_token(session, TokenKind::Session)?;
        let target = syntax::parse_user_id(target)?;

        let uid = self.resolve_session(session)?;
        self.require_admin(uid)?;
        self.require_user(target)?;

        self.db.suspend_user(target)
    }

    pub fn admin_unsuspend(&self, session: &str, target: &str) -> AppResult<()> {
        syntax::validate_token(session, TokenKind::Session)?;
        let target = syntax::parse_user_id(target)?;

        let uid = self.resolve_session(session)?;
        self.require_admin(uid)?;
        self.require_user(target)?;

        self.db.unsuspend_user(target)
    }

    /// Destructive enough that the admin re-enters their own password.
    pub fn admin_delete(&self, session: &str, target: &str, password: &str) -> AppResult<()> {
        syntax::validate_token(session, TokenKind::Session)?;
        let target = syntax::parse_user_id(target)?;
        let hpassword = syntax::hash_password(password)?;

        let uid = self.resolve_session(session)?;
        self.require_admin(uid)?;
        if !self.db.password_matches(uid, &hpassword)? {
            return Err(AppError::NotAuthorized);
        }
        self.require_user(target)?;

        self.do_delete_user(target)
    }
}
