//! Stage 3: interpretation. Every side effect of the system happens in this
//! file: token issuance, state mutation, blob writes, notification
//! dispatch. By the time control reaches a `do_*` method, the inputs are
//! validated and the acting user is authorized.

use super::Pipeline;
use crate::db::models::EmailChange;
use crate::email::Template;
use crate::error::{AppError, AppResult};
use crate::pipeline::syntax::sha256_hex;
use crate::tokens::{self, TokenKind};

impl Pipeline {
    // ----- shared helpers ----------------------------------------------------

    /// Issue a fresh single-use token, retrying on a value collision.
    pub(crate) fn issue_token(
        &self,
        owner: i64,
        kind: TokenKind,
        data: Option<&str>,
    ) -> AppResult<String> {
        for _ in 0..tokens::GENERATE_ATTEMPTS {
            let value = tokens::generate(kind);
            if self.db.create_token(owner, &value, kind, data)? {
                return Ok(value);
            }
        }
        Err(AppError::Internal("token generation kept colliding".into()))
    }

    fn action_url(&self, path: &str, token: &str) -> String {
        format!("{}/{}/{}", self.public_url, path, token)
    }

    /// Replace the user's backup code and mail them the fresh one. Called on
    /// every successful backup-code use; confirmed email changes rotate the
    /// code inside their own transaction.
    fn rotate_backup_code(&self, uid: i64, email: &str) -> AppResult<String> {
        let code = tokens::generate(TokenKind::Backup);
        self.db.set_recovery(uid, &sha256_hex(&code))?;
        self.mailer.send(email, Template::NewRecoveryToken, &code);
        Ok(code)
    }

    // ----- account lifecycle --------------------------------------------------

    /// Create an unconfirmed account. The user row, its creation token and
    /// the purge of any unconfirmed squatter on the address land in a single
    /// writer transaction, so a concurrent signup can never strand one
    /// without the other. Returns the plaintext backup code, shown to the
    /// user exactly once.
    pub(crate) fn do_create_account(
        &self,
        email: &str,
        username: &str,
        hpassword: &str,
    ) -> AppResult<String> {
        let backup_code = tokens::generate(TokenKind::Backup);
        let account = self
            .db
            .register_user(email, username, hpassword, &sha256_hex(&backup_code))?
            .ok_or(AppError::InvalidUsername)?;
        self.sweep_blobs(&account.purged_posts, &account.purged_images);

        self.mailer.send(
            email,
            Template::ConfirmAccount,
            &self.action_url("confirm", &account.confirm_token),
        );

        tracing::info!("account created: uid={} username={}", account.uid, username);
        Ok(backup_code)
    }

    pub(crate) fn do_confirm_create(&self, token: &str) -> AppResult<()> {
        let uid = self.db.confirm_user(token)?.ok_or(AppError::InvalidToken)?;
        tracing::info!("account confirmed: uid={}", uid);
        Ok(())
    }

    pub(crate) fn do_login(&self, uid: i64) -> AppResult<String> {
        self.issue_token(uid, TokenKind::Session, None)
    }

    pub(crate) fn do_logout(&self, token: &str) -> AppResult<()> {
        // Expires exactly this session; the user's other sessions live on.
        self.db.expire_token(token)?;
        Ok(())
    }

    pub(crate) fn do_request_deletion(&self, uid: i64, email: &str) -> AppResult<()> {
        let token = self.issue_token(uid, TokenKind::Deletion, None)?;
        self.mailer.send(
            email,
            Template::DeleteAccount,
            &self.action_url("confirmdelete", &token),
        );
        Ok(())
    }

    pub(crate) fn do_confirm_delete(&self, token: &str) -> AppResult<()> {
        let (uid, posts, images) = self
            .db
            .delete_user_by_token(token)?
            .ok_or(AppError::InvalidToken)?;
        self.sweep_blobs(&posts, &images);
        tracing::info!("user deleted: uid={}", uid);
        Ok(())
    }

    /// Cascade-delete a user, then best-effort clean their blobs.
    pub(crate) fn do_delete_user(&self, uid: i64) -> AppResult<()> {
        let (post_files, image_files) = self.db.delete_user(uid)?;
        self.sweep_blobs(&post_files, &image_files);
        tracing::info!("user deleted: uid={}", uid);
        Ok(())
    }

    /// Rows go first, blobs second: a leaked blob beats a dangling row.
    fn sweep_blobs(&self, posts: &[String], images: &[String]) {
        for filename in posts {
            if let Err(e) = self.files.delete_post(filename) {
                tracing::warn!("leaked post blob {}: {}", filename, e);
            }
        }
        for filename in images {
            if let Err(e) = self.files.delete_image(filename) {
                tracing::warn!("leaked image blob {}: {}", filename, e);
            }
        }
    }

    pub(crate) fn do_request_recovery(&self, uid: i64, email: &str) -> AppResult<()> {
        let token = self.issue_token(uid, TokenKind::Recovery, None)?;
        self.mailer.send(
            email,
            Template::RecoverAccount,
            &self.action_url("confirmrecover", &token),
        );
        Ok(())
    }

    /// Backup-code recovery: the code already matched the stored hash. The
    /// code is rotated before anything else so it can never be replayed,
    /// then a recovery link goes out like any other recovery.
    pub(crate) fn do_backup_recover(&self, uid: i64, email: &str) -> AppResult<()> {
        self.rotate_backup_code(uid, email)?;
        self.do_request_recovery(uid, email)
    }

    /// The token consumption, password update and session sweep run in one
    /// writer transaction; a recovered account never leaves older sessions
    /// usable, even briefly.
    pub(crate) fn do_confirm_recover(&self, token: &str, hpassword: &str) -> AppResult<()> {
        let uid = self
            .db
            .reset_password(token, hpassword)?
            .ok_or(AppError::InvalidToken)?;
        tracing::info!("password recovered: uid={}", uid);
        Ok(())
    }

    pub(crate) fn do_request_email_change(&self, uid: i64, new_email: &str) -> AppResult<()> {
        let token = self.issue_token(uid, TokenKind::Email, Some(new_email))?;
        // The link goes to the address being claimed, proving control of it.
        self.mailer.send(
            new_email,
            Template::ChangeEmail,
            &self.action_url("confirmemail", &token),
        );
        Ok(())
    }

    /// Apply a confirmed email change. The new address may have been claimed
    /// by someone else since the link went out; that surfaces as
    /// invalid-email, with the link spent either way. A successful change
    /// rotates the backup code and mails the fresh one to the new address.
    pub(crate) fn do_confirm_email(&self, token: &str) -> AppResult<()> {
        let code = tokens::generate(TokenKind::Backup);
        match self.db.apply_email_change(token, &sha256_hex(&code))? {
            EmailChange::Applied { uid, email } => {
                self.mailer.send(&email, Template::NewRecoveryToken, &code);
                tracing::info!("email changed: uid={}", uid);
                Ok(())
            }
            EmailChange::Taken => Err(AppError::InvalidEmail),
            EmailChange::UnknownToken => Err(AppError::InvalidToken),
        }
    }

    // ----- content -------------------------------------------------------------

    /// Insert the post row, then write the body. Filenames are never reused;
    /// a uniqueness violation regenerates the random id.
    pub(crate) fn do_write_post(&self, uid: i64, title: &str, content: &str) -> AppResult<i64> {
        for _ in 0..tokens::GENERATE_ATTEMPTS {
            let filename = format!("post{}.md", tokens::generate(TokenKind::PostId));
            if let Some(pid) = self.db.insert_post(uid, title, &filename)? {
                self.files.write_post(&filename, content)?;
                return Ok(pid);
            }
        }
        Err(AppError::Internal("post id generation kept colliding".into()))
    }

    pub(crate) fn do_edit_post(&self, pid: i64, title: &str, content: &str) -> AppResult<()> {
        let detail = self.db.get_post_info(pid)?.ok_or(AppError::NoSuchPost)?;
        self.db.update_post_title(pid, title)?;
        self.files.write_post(&detail.filename, content)?;
        Ok(())
    }

    pub(crate) fn do_delete_post(&self, pid: i64) -> AppResult<()> {
        let filename = self.db.delete_post(pid)?.ok_or(AppError::NoSuchPost)?;
        // Row first, blob second: a leaked blob beats a dangling row.
        if let Err(e) = self.files.delete_post(&filename) {
            tracing::warn!("leaked post blob {}: {}", filename, e);
        }
        Ok(())
    }

    pub(crate) fn do_upload_image(
        &self,
        uid: i64,
        title: &str,
        extension: &str,
        bytes: &[u8],
    ) -> AppResult<String> {
        for _ in 0..tokens::GENERATE_ATTEMPTS {
            let accessid = tokens::generate(TokenKind::ImageId);
            let filename = format!("img{}.{}", accessid, extension);
            if self.db.insert_image(uid, title, &filename, &accessid)? {
                self.files.save_image(&filename, bytes)?;
                return Ok(accessid);
            }
        }
        Err(AppError::Internal("image id generation kept colliding".into()))
    }

    pub(crate) fn do_delete_image(&self, accessid: &str) -> AppResult<()> {
        let filename = self
            .db
            .delete_image(accessid)?
            .ok_or(AppError::NoSuchImage)?;
        if let Err(e) = self.files.delete_image(&filename) {
            tracing::warn!("leaked image blob {}: {}", filename, e);
        }
        Ok(())
    }
}
