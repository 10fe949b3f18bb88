//! Query-level contract of the persistence gateway.
//!
//! Lookups return `Option`; absence is not an error at this layer, the
//! calling stage decides. All mutations go through the single writer
//! connection; compound mutations hold it for their whole statement
//! sequence inside one transaction.

use rusqlite::{params, Connection, OptionalExtension};

use super::models::*;
use super::Database;
use crate::error::{AppError, AppResult};
use crate::tokens::{self, TokenKind};

/// True when an INSERT failed a uniqueness constraint (callers regenerate
/// random identifiers and retry).
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl Database {
    // ----- existence checks -------------------------------------------------

    pub fn username_owner(&self, username: &str) -> AppResult<Option<i64>> {
        let conn = self.read()?;
        let uid = conn
            .query_row(
                "SELECT uid FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;
        Ok(uid)
    }

    /// Resolve an email address to `(uid, confirmed)`.
    pub fn email_owner(&self, email: &str) -> AppResult<Option<(i64, bool)>> {
        let conn = self.read()?;
        let row = conn
            .query_row(
                "SELECT uid, confirmed FROM users WHERE email = ?1",
                params![email],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row)
    }

    pub fn password_correct(&self, username: &str, hpassword: &str) -> AppResult<Option<i64>> {
        let conn = self.read()?;
        let uid = conn
            .query_row(
                "SELECT uid FROM users WHERE username = ?1 AND hpassword = ?2",
                params![username, hpassword],
                |row| row.get(0),
            )
            .optional()?;
        Ok(uid)
    }

    pub fn password_matches(&self, uid: i64, hpassword: &str) -> AppResult<bool> {
        let conn = self.read()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT uid FROM users WHERE uid = ?1 AND hpassword = ?2",
                params![uid, hpassword],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Resolve a hashed backup code to its owner.
    pub fn recovery_owner(&self, hrecovery: &str) -> AppResult<Option<i64>> {
        let conn = self.read()?;
        let uid = conn
            .query_row(
                "SELECT uid FROM users WHERE hrecovery = ?1",
                params![hrecovery],
                |row| row.get(0),
            )
            .optional()?;
        Ok(uid)
    }

    pub fn user_exists(&self, uid: i64) -> AppResult<bool> {
        let conn = self.read()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT uid FROM users WHERE uid = ?1",
                params![uid],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn user_flags(&self, uid: i64) -> AppResult<Option<UserFlags>> {
        let conn = self.read()?;
        let flags = conn
            .query_row(
                "SELECT confirmed, suspended, admin FROM users WHERE uid = ?1",
                params![uid],
                |row| {
                    Ok(UserFlags {
                        confirmed: row.get(0)?,
                        suspended: row.get(1)?,
                        admin: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(flags)
    }

    pub fn user_email(&self, uid: i64) -> AppResult<Option<String>> {
        let conn = self.read()?;
        let email = conn
            .query_row(
                "SELECT email FROM users WHERE uid = ?1",
                params![uid],
                |row| row.get(0),
            )
            .optional()?;
        Ok(email)
    }

    pub fn post_owner(&self, pid: i64) -> AppResult<Option<i64>> {
        let conn = self.read()?;
        let owner = conn
            .query_row(
                "SELECT owner FROM posts WHERE pid = ?1",
                params![pid],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner)
    }

    pub fn comment_owner(&self, cid: i64) -> AppResult<Option<i64>> {
        let conn = self.read()?;
        let owner = conn
            .query_row(
                "SELECT owner FROM comments WHERE cid = ?1",
                params![cid],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner)
    }

    pub fn image_owner(&self, accessid: &str) -> AppResult<Option<i64>> {
        let conn = self.read()?;
        let owner = conn
            .query_row(
                "SELECT owner FROM images WHERE accessid = ?1",
                params![accessid],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner)
    }

    pub fn image_filename(&self, accessid: &str) -> AppResult<Option<String>> {
        let conn = self.read()?;
        let filename = conn
            .query_row(
                "SELECT filename FROM images WHERE accessid = ?1",
                params![accessid],
                |row| row.get(0),
            )
            .optional()?;
        Ok(filename)
    }

    /// Look up a token without consuming it. Age is computed in the query so
    /// the consuming stage can reject expired-but-not-yet-swept tokens.
    pub fn token_lookup(&self, value: &str, kind: TokenKind) -> AppResult<Option<TokenRow>> {
        let conn = self.read()?;
        let row = conn
            .query_row(
                "SELECT owner, data,
                        CAST((julianday('now') - julianday(created_at)) * 1440 AS INTEGER)
                 FROM tokens WHERE value = ?1 AND type = ?2",
                params![value, kind.as_str()],
                |row| {
                    Ok(TokenRow {
                        owner: row.get(0)?,
                        data: row.get(1)?,
                        age_minutes: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    // ----- aggregate reads --------------------------------------------------

    pub fn get_public_user(&self, uid: i64) -> AppResult<Option<PublicProfile>> {
        let conn = self.read()?;

        let base = conn
            .query_row(
                "SELECT uid, username, pfp, status, suspended FROM users WHERE uid = ?1",
                params![uid],
                |row| {
                    Ok(PublicProfile {
                        uid: row.get(0)?,
                        username: row.get(1)?,
                        pfp: row.get(2)?,
                        status: row.get(3)?,
                        suspended: row.get(4)?,
                        posts: Vec::new(),
                        friends: Vec::new(),
                    })
                },
            )
            .optional()?;

        let Some(mut profile) = base else {
            return Ok(None);
        };
        profile.posts = posts_of(&conn, uid)?;
        profile.friends = friends_of(&conn, uid)?;
        Ok(Some(profile))
    }

    pub fn get_private_user(&self, uid: i64, concise: bool) -> AppResult<Option<PrivateProfile>> {
        let conn = self.read()?;

        let base = conn
            .query_row(
                "SELECT uid, username, email, pfp, status, suspended, admin
                 FROM users WHERE uid = ?1",
                params![uid],
                |row| {
                    Ok(PrivateProfile {
                        uid: row.get(0)?,
                        username: row.get(1)?,
                        email: row.get(2)?,
                        pfp: row.get(3)?,
                        status: row.get(4)?,
                        suspended: row.get(5)?,
                        admin: row.get(6)?,
                        posts: Vec::new(),
                        friends: Vec::new(),
                        from_you: Vec::new(),
                        for_you: Vec::new(),
                        images: Vec::new(),
                    })
                },
            )
            .optional()?;

        let Some(mut profile) = base else {
            return Ok(None);
        };
        if concise {
            return Ok(Some(profile));
        }

        profile.posts = posts_of(&conn, uid)?;
        profile.friends = friends_of(&conn, uid)?;
        profile.from_you = pending_links(
            &conn,
            "SELECT F.user2, U.username FROM friendships F
             JOIN users U ON U.uid = F.user2
             WHERE F.user1 = ?1 AND F.accepted = 0",
            uid,
        )?;
        profile.for_you = pending_links(
            &conn,
            "SELECT F.user1, U.username FROM friendships F
             JOIN users U ON U.uid = F.user1
             WHERE F.user2 = ?1 AND F.accepted = 0",
            uid,
        )?;
        profile.images = {
            let mut stmt = conn
                .prepare("SELECT accessid, title FROM images WHERE owner = ?1 ORDER BY created_at")?;
            let rows = stmt.query_map(params![uid], |row| {
                Ok(ImageSummary {
                    accessid: row.get(0)?,
                    title: row.get(1)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        Ok(Some(profile))
    }

    /// Post detail with author, signed vote sum and comments. The body is
    /// filled in from the blob store by the interpretation stage.
    pub fn get_post_info(&self, pid: i64) -> AppResult<Option<PostDetail>> {
        let conn = self.read()?;

        let base = conn
            .query_row(
                "SELECT P.pid, P.owner, U.username, P.title, P.timestamp, P.filename
                 FROM posts P JOIN users U ON P.owner = U.uid
                 WHERE P.pid = ?1",
                params![pid],
                |row| {
                    Ok(PostDetail {
                        pid: row.get(0)?,
                        owner: row.get(1)?,
                        username: row.get(2)?,
                        title: row.get(3)?,
                        timestamp: row.get(4)?,
                        votes: 0,
                        comments: Vec::new(),
                        content: String::new(),
                        filename: row.get(5)?,
                    })
                },
            )
            .optional()?;

        let Some(mut post) = base else {
            return Ok(None);
        };

        post.votes = conn.query_row(
            "SELECT COALESCE(SUM(2 * likes - 1), 0) FROM votes WHERE postid = ?1",
            params![pid],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT C.cid, U.uid, U.username, C.content, C.timestamp
             FROM comments C JOIN users U ON C.owner = U.uid
             WHERE C.post = ?1 ORDER BY C.timestamp",
        )?;
        let rows = stmt.query_map(params![pid], |row| {
            Ok(CommentView {
                cid: row.get(0)?,
                uid: row.get(1)?,
                username: row.get(2)?,
                content: row.get(3)?,
                timestamp: row.get(4)?,
            })
        })?;
        post.comments = rows.collect::<Result<Vec<_>, _>>()?;

        Ok(Some(post))
    }

    pub fn list_images(&self, uid: i64) -> AppResult<Vec<ImageSummary>> {
        let conn = self.read()?;
        let mut stmt =
            conn.prepare("SELECT accessid, title FROM images WHERE owner = ?1 ORDER BY created_at")?;
        let rows = stmt.query_map(params![uid], |row| {
            Ok(ImageSummary {
                accessid: row.get(0)?,
                title: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Pending friend requests awaiting `uid`'s answer.
    pub fn pending_requests_for(&self, uid: i64) -> AppResult<Vec<FriendLink>> {
        let conn = self.read()?;
        pending_links(
            &conn,
            "SELECT F.user1, U.username FROM friendships F
             JOIN users U ON U.uid = F.user1
             WHERE F.user2 = ?1 AND F.accepted = 0",
            uid,
        )
    }

    pub fn search_users(&self, query: &str, limit: i64, offset: i64) -> AppResult<Vec<UserHit>> {
        let conn = self.read()?;
        let mut stmt = conn.prepare(
            "SELECT uid, username FROM users
             WHERE username LIKE '%' || ?1 || '%'
             ORDER BY uid LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt.query_map(params![query, limit, offset], |row| {
            Ok(UserHit {
                uid: row.get(0)?,
                username: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn search_posts(&self, query: &str, limit: i64, offset: i64) -> AppResult<Vec<PostHit>> {
        let conn = self.read()?;
        let mut stmt = conn.prepare(
            "SELECT pid, title FROM posts
             WHERE title LIKE '%' || ?1 || '%'
             ORDER BY timestamp DESC LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt.query_map(params![query, limit, offset], |row| {
            Ok(PostHit {
                pid: row.get(0)?,
                title: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ----- quota counters ---------------------------------------------------

    pub fn count_posts(&self, uid: i64) -> AppResult<i64> {
        self.count("SELECT COUNT(*) FROM posts WHERE owner = ?1", uid)
    }

    pub fn count_posts_today(&self, uid: i64) -> AppResult<i64> {
        self.count(
            "SELECT COUNT(*) FROM posts
             WHERE owner = ?1 AND timestamp > datetime('now', '-1 day')",
            uid,
        )
    }

    pub fn count_comments_today(&self, uid: i64) -> AppResult<i64> {
        self.count(
            "SELECT COUNT(*) FROM comments
             WHERE owner = ?1 AND timestamp > datetime('now', '-1 day')",
            uid,
        )
    }

    pub fn count_friend_requests_today(&self, uid: i64) -> AppResult<i64> {
        self.count(
            "SELECT COUNT(*) FROM friendships
             WHERE user1 = ?1 AND created_at > datetime('now', '-1 day')",
            uid,
        )
    }

    pub fn count_images(&self, uid: i64) -> AppResult<i64> {
        self.count("SELECT COUNT(*) FROM images WHERE owner = ?1", uid)
    }

    fn count(&self, sql: &str, uid: i64) -> AppResult<i64> {
        let conn = self.read()?;
        Ok(conn.query_row(sql, params![uid], |row| row.get(0))?)
    }

    // ----- user mutations ---------------------------------------------------

    /// Account creation as one writer transaction: an unconfirmed holder of
    /// the address is purged, the user row inserted and its creation token
    /// stored, with no other request's write interleaved. Returns `None`
    /// when the email or username lost a uniqueness race.
    pub fn register_user(
        &self,
        email: &str,
        username: &str,
        hpassword: &str,
        hrecovery: &str,
    ) -> AppResult<Option<NewAccount>> {
        let mut conn = self.write()?;
        let tx = conn.transaction()?;

        let squatter: Option<i64> = tx
            .query_row(
                "SELECT uid FROM users WHERE email = ?1 AND confirmed = 0",
                params![email],
                |row| row.get(0),
            )
            .optional()?;
        let (purged_posts, purged_images) = match squatter {
            Some(old_uid) => purge_user(&tx, old_uid)?,
            None => (Vec::new(), Vec::new()),
        };

        let res = tx.execute(
            "INSERT INTO users (email, username, hpassword, hrecovery) VALUES (?1, ?2, ?3, ?4)",
            params![email, username, hpassword, hrecovery],
        );
        match res {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let uid = tx.last_insert_rowid();
        let confirm_token = insert_fresh_token(&tx, uid, TokenKind::Creation, None)?;

        tx.commit()?;
        Ok(Some(NewAccount {
            uid,
            confirm_token,
            purged_posts,
            purged_images,
        }))
    }

    /// Consume a creation token and flip its owner to confirmed, as one
    /// writer transaction.
    pub fn confirm_user(&self, token: &str) -> AppResult<Option<i64>> {
        let mut conn = self.write()?;
        let tx = conn.transaction()?;
        let Some(row) = take_token(&tx, token, TokenKind::Creation)? else {
            return Ok(None);
        };
        tx.execute(
            "UPDATE users SET confirmed = 1 WHERE uid = ?1",
            params![row.owner],
        )?;
        tx.commit()?;
        Ok(Some(row.owner))
    }

    /// Consume a deletion token and cascade-delete its owner in the same
    /// transaction. Returns the owner and the blob filenames to clean up.
    pub fn delete_user_by_token(
        &self,
        token: &str,
    ) -> AppResult<Option<(i64, Vec<String>, Vec<String>)>> {
        let mut conn = self.write()?;
        let tx = conn.transaction()?;
        let Some(row) = take_token(&tx, token, TokenKind::Deletion)? else {
            return Ok(None);
        };
        let (posts, images) = purge_user(&tx, row.owner)?;
        tx.commit()?;
        Ok(Some((row.owner, posts, images)))
    }

    /// Consume a recovery token, set the new password and drop every open
    /// session of the owner, as one writer transaction.
    pub fn reset_password(&self, token: &str, hpassword: &str) -> AppResult<Option<i64>> {
        let mut conn = self.write()?;
        let tx = conn.transaction()?;
        let Some(row) = take_token(&tx, token, TokenKind::Recovery)? else {
            return Ok(None);
        };
        tx.execute(
            "UPDATE users SET hpassword = ?1 WHERE uid = ?2",
            params![hpassword, row.owner],
        )?;
        tx.execute(
            "DELETE FROM tokens WHERE owner = ?1 AND type = ?2",
            params![row.owner, TokenKind::Session.as_str()],
        )?;
        tx.commit()?;
        Ok(Some(row.owner))
    }

    /// Consume an email-change token and apply the address it carries,
    /// rotating the recovery hash with it. The token is spent even when the
    /// address gained another holder in the meantime.
    pub fn apply_email_change(&self, token: &str, hrecovery: &str) -> AppResult<EmailChange> {
        let mut conn = self.write()?;
        let tx = conn.transaction()?;
        let Some(row) = take_token(&tx, token, TokenKind::Email)? else {
            return Ok(EmailChange::UnknownToken);
        };
        let Some(email) = row.data else {
            tx.commit()?;
            return Ok(EmailChange::UnknownToken);
        };

        let res = tx.execute(
            "UPDATE users SET email = ?1, hrecovery = ?2 WHERE uid = ?3",
            params![email, hrecovery, row.owner],
        );
        match res {
            Ok(_) => {
                tx.commit()?;
                Ok(EmailChange::Applied {
                    uid: row.owner,
                    email,
                })
            }
            Err(e) if is_unique_violation(&e) => {
                tx.commit()?;
                Ok(EmailChange::Taken)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn suspend_user(&self, uid: i64) -> AppResult<()> {
        self.exec("UPDATE users SET suspended = 1 WHERE uid = ?1", uid)
    }

    pub fn unsuspend_user(&self, uid: i64) -> AppResult<()> {
        self.exec("UPDATE users SET suspended = 0 WHERE uid = ?1", uid)
    }

    pub fn set_recovery(&self, uid: i64, hrecovery: &str) -> AppResult<()> {
        let conn = self.write()?;
        conn.execute(
            "UPDATE users SET hrecovery = ?1 WHERE uid = ?2",
            params![hrecovery, uid],
        )?;
        Ok(())
    }

    pub fn set_status(&self, uid: i64, status: &str) -> AppResult<()> {
        let conn = self.write()?;
        conn.execute(
            "UPDATE users SET status = ?1 WHERE uid = ?2",
            params![status, uid],
        )?;
        Ok(())
    }

    pub fn set_picture(&self, uid: i64, accessid: &str) -> AppResult<()> {
        let conn = self.write()?;
        conn.execute(
            "UPDATE users SET pfp = ?1 WHERE uid = ?2",
            params![accessid, uid],
        )?;
        Ok(())
    }

    /// Returns false when the username is already taken.
    pub fn set_username(&self, uid: i64, username: &str) -> AppResult<bool> {
        let conn = self.write()?;
        let res = conn.execute(
            "UPDATE users SET username = ?1 WHERE uid = ?2",
            params![username, uid],
        );
        match res {
            Ok(_) => Ok(true),
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Cascade-delete a user and every row referencing them, as one write
    /// transaction. Returns the post and image filenames whose blobs the
    /// caller should clean up afterwards.
    pub fn delete_user(&self, uid: i64) -> AppResult<(Vec<String>, Vec<String>)> {
        let mut conn = self.write()?;
        let tx = conn.transaction()?;
        let files = purge_user(&tx, uid)?;
        tx.commit()?;
        Ok(files)
    }

    // ----- tokens -----------------------------------------------------------

    /// Returns false when the token value collided with an existing one.
    pub fn create_token(
        &self,
        owner: i64,
        value: &str,
        kind: TokenKind,
        data: Option<&str>,
    ) -> AppResult<bool> {
        let conn = self.write()?;
        let res = conn.execute(
            "INSERT INTO tokens (owner, value, type, data) VALUES (?1, ?2, ?3, ?4)",
            params![owner, value, kind.as_str(), data],
        );
        match res {
            Ok(_) => Ok(true),
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn expire_token(&self, value: &str) -> AppResult<()> {
        let conn = self.write()?;
        conn.execute("DELETE FROM tokens WHERE value = ?1", params![value])?;
        Ok(())
    }

    // ----- content mutations ------------------------------------------------

    /// Returns the new pid, or `None` when the derived filename collided.
    pub fn insert_post(&self, owner: i64, title: &str, filename: &str) -> AppResult<Option<i64>> {
        let conn = self.write()?;
        let res = conn.execute(
            "INSERT INTO posts (owner, title, filename) VALUES (?1, ?2, ?3)",
            params![owner, title, filename],
        );
        match res {
            Ok(_) => Ok(Some(conn.last_insert_rowid())),
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn update_post_title(&self, pid: i64, title: &str) -> AppResult<()> {
        let conn = self.write()?;
        conn.execute(
            "UPDATE posts SET title = ?1 WHERE pid = ?2",
            params![title, pid],
        )?;
        Ok(())
    }

    /// Delete a post and cascade its comments and votes in one transaction.
    /// Returns the filename for blob cleanup, or `None` if the post is gone.
    pub fn delete_post(&self, pid: i64) -> AppResult<Option<String>> {
        let mut conn = self.write()?;
        let tx = conn.transaction()?;

        let filename: Option<String> = tx
            .query_row(
                "SELECT filename FROM posts WHERE pid = ?1",
                params![pid],
                |row| row.get(0),
            )
            .optional()?;
        if filename.is_none() {
            return Ok(None);
        }

        tx.execute("DELETE FROM comments WHERE post = ?1", params![pid])?;
        tx.execute("DELETE FROM votes WHERE postid = ?1", params![pid])?;
        tx.execute("DELETE FROM posts WHERE pid = ?1", params![pid])?;
        tx.commit()?;

        Ok(filename)
    }

    /// Returns false when the access id collided.
    pub fn insert_image(
        &self,
        owner: i64,
        title: &str,
        filename: &str,
        accessid: &str,
    ) -> AppResult<bool> {
        let conn = self.write()?;
        let res = conn.execute(
            "INSERT INTO images (owner, title, filename, accessid) VALUES (?1, ?2, ?3, ?4)",
            params![owner, title, filename, accessid],
        );
        match res {
            Ok(_) => Ok(true),
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the image row first so a dangling row is never observable;
    /// blob cleanup happens after, from the returned filename.
    pub fn delete_image(&self, accessid: &str) -> AppResult<Option<String>> {
        let conn = self.write()?;
        let filename: Option<String> = conn
            .query_row(
                "SELECT filename FROM images WHERE accessid = ?1",
                params![accessid],
                |row| row.get(0),
            )
            .optional()?;
        if filename.is_some() {
            conn.execute("DELETE FROM images WHERE accessid = ?1", params![accessid])?;
        }
        Ok(filename)
    }

    pub fn insert_comment(&self, owner: i64, pid: i64, content: &str) -> AppResult<i64> {
        let conn = self.write()?;
        conn.execute(
            "INSERT INTO comments (owner, post, content) VALUES (?1, ?2, ?3)",
            params![owner, pid, content],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn delete_comment(&self, cid: i64) -> AppResult<()> {
        let conn = self.write()?;
        conn.execute("DELETE FROM comments WHERE cid = ?1", params![cid])?;
        Ok(())
    }

    pub fn insert_report(&self, owner: i64, content: &str) -> AppResult<()> {
        let conn = self.write()?;
        conn.execute(
            "INSERT INTO reports (owner, content) VALUES (?1, ?2)",
            params![owner, content],
        )?;
        Ok(())
    }

    // ----- votes ------------------------------------------------------------

    pub fn set_vote(&self, owner: i64, pid: i64, like: bool) -> AppResult<()> {
        let conn = self.write()?;
        conn.execute(
            "INSERT INTO votes (owner, postid, likes) VALUES (?1, ?2, ?3)
             ON CONFLICT(owner, postid) DO UPDATE SET likes = excluded.likes",
            params![owner, pid, like],
        )?;
        Ok(())
    }

    pub fn clear_vote(&self, owner: i64, pid: i64) -> AppResult<()> {
        let conn = self.write()?;
        conn.execute(
            "DELETE FROM votes WHERE owner = ?1 AND postid = ?2",
            params![owner, pid],
        )?;
        Ok(())
    }

    // ----- friendships ------------------------------------------------------

    /// Record a friend request from `uid` to `other`. A pending request in
    /// the opposite direction is accepted instead (mutual request); an
    /// existing row in either direction makes this a no-op.
    pub fn friend_request(&self, uid: i64, other: i64) -> AppResult<()> {
        let mut conn = self.write()?;
        let tx = conn.transaction()?;

        let flipped = tx.execute(
            "UPDATE friendships SET accepted = 1
             WHERE user1 = ?2 AND user2 = ?1 AND accepted = 0",
            params![uid, other],
        )?;
        if flipped == 0 {
            let exists: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM friendships
                     WHERE (user1 = ?1 AND user2 = ?2) OR (user1 = ?2 AND user2 = ?1)",
                    params![uid, other],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                tx.execute(
                    "INSERT INTO friendships (user1, user2) VALUES (?1, ?2)",
                    params![uid, other],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Accept a request from `other`. Flips the pending row when it exists;
    /// otherwise records an already-accepted row (symmetric confirm).
    pub fn accept_friend_request(&self, uid: i64, other: i64) -> AppResult<()> {
        let mut conn = self.write()?;
        let tx = conn.transaction()?;

        let flipped = tx.execute(
            "UPDATE friendships SET accepted = 1
             WHERE user1 = ?2 AND user2 = ?1 AND accepted = 0",
            params![uid, other],
        )?;
        if flipped == 0 {
            let updated = tx.execute(
                "UPDATE friendships SET accepted = 1 WHERE user1 = ?1 AND user2 = ?2",
                params![uid, other],
            )?;
            if updated == 0 {
                tx.execute(
                    "INSERT INTO friendships (user1, user2, accepted) VALUES (?1, ?2, 1)",
                    params![uid, other],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Remove any friendship or pending request between the pair.
    pub fn unfriend(&self, uid: i64, other: i64) -> AppResult<()> {
        let conn = self.write()?;
        conn.execute(
            "DELETE FROM friendships
             WHERE (user1 = ?1 AND user2 = ?2) OR (user1 = ?2 AND user2 = ?1)",
            params![uid, other],
        )?;
        Ok(())
    }

    fn exec(&self, sql: &str, uid: i64) -> AppResult<()> {
        let conn = self.write()?;
        conn.execute(sql, params![uid])?;
        Ok(())
    }
}

/// Consume a token exactly once: the lookup and the delete run on the
/// single writer connection, so a replay observes the deleted row.
fn take_token(conn: &Connection, value: &str, kind: TokenKind) -> AppResult<Option<TokenRow>> {
    let row = conn
        .query_row(
            "SELECT owner, data,
                    CAST((julianday('now') - julianday(created_at)) * 1440 AS INTEGER)
             FROM tokens WHERE value = ?1 AND type = ?2",
            params![value, kind.as_str()],
            |row| {
                Ok(TokenRow {
                    owner: row.get(0)?,
                    data: row.get(1)?,
                    age_minutes: row.get(2)?,
                })
            },
        )
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };

    conn.execute("DELETE FROM tokens WHERE value = ?1", params![value])?;
    Ok(Some(row))
}

/// Insert a fresh token row, regenerating the value on a collision.
fn insert_fresh_token(
    conn: &Connection,
    owner: i64,
    kind: TokenKind,
    data: Option<&str>,
) -> AppResult<String> {
    for _ in 0..tokens::GENERATE_ATTEMPTS {
        let value = tokens::generate(kind);
        let res = conn.execute(
            "INSERT INTO tokens (owner, value, type, data) VALUES (?1, ?2, ?3, ?4)",
            params![owner, value, kind.as_str(), data],
        );
        match res {
            Ok(_) => return Ok(value),
            Err(e) if is_unique_violation(&e) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(AppError::Internal("token generation kept colliding".into()))
}

/// The seven-table user cascade. Runs inside the caller's transaction and
/// returns the post and image filenames whose blobs must go too.
fn purge_user(conn: &Connection, uid: i64) -> AppResult<(Vec<String>, Vec<String>)> {
    let post_files = collect_strings(conn, "SELECT filename FROM posts WHERE owner = ?1", uid)?;
    let image_files = collect_strings(conn, "SELECT filename FROM images WHERE owner = ?1", uid)?;

    conn.execute("DELETE FROM users WHERE uid = ?1", params![uid])?;
    conn.execute("DELETE FROM tokens WHERE owner = ?1", params![uid])?;
    conn.execute(
        "DELETE FROM comments WHERE post IN (SELECT pid FROM posts WHERE owner = ?1)",
        params![uid],
    )?;
    conn.execute(
        "DELETE FROM votes WHERE postid IN (SELECT pid FROM posts WHERE owner = ?1)",
        params![uid],
    )?;
    conn.execute("DELETE FROM posts WHERE owner = ?1", params![uid])?;
    conn.execute("DELETE FROM comments WHERE owner = ?1", params![uid])?;
    conn.execute("DELETE FROM images WHERE owner = ?1", params![uid])?;
    conn.execute("DELETE FROM reports WHERE owner = ?1", params![uid])?;
    conn.execute(
        "DELETE FROM friendships WHERE user1 = ?1 OR user2 = ?1",
        params![uid],
    )?;
    conn.execute("DELETE FROM votes WHERE owner = ?1", params![uid])?;

    Ok((post_files, image_files))
}

fn posts_of(conn: &Connection, uid: i64) -> AppResult<Vec<PostSummary>> {
    let mut stmt =
        conn.prepare("SELECT pid, title FROM posts WHERE owner = ?1 ORDER BY timestamp DESC")?;
    let rows = stmt.query_map(params![uid], |row| {
        Ok(PostSummary {
            pid: row.get(0)?,
            title: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn friends_of(conn: &Connection, uid: i64) -> AppResult<Vec<FriendLink>> {
    let mut stmt = conn.prepare(
        "SELECT F.user1, F.user2, U1.username, U2.username
         FROM friendships F
         JOIN users U1 ON U1.uid = F.user1
         JOIN users U2 ON U2.uid = F.user2
         WHERE (F.user1 = ?1 OR F.user2 = ?1) AND F.accepted = 1",
    )?;
    let rows = stmt.query_map(params![uid], |row| {
        let user1: i64 = row.get(0)?;
        let user2: i64 = row.get(1)?;
        let name1: String = row.get(2)?;
        let name2: String = row.get(3)?;
        Ok(if user1 == uid {
            FriendLink {
                uid: user2,
                username: name2,
            }
        } else {
            FriendLink {
                uid: user1,
                username: name1,
            }
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn pending_links(conn: &Connection, sql: &str, uid: i64) -> AppResult<Vec<FriendLink>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![uid], |row| {
        Ok(FriendLink {
            uid: row.get(0)?,
            username: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn collect_strings(conn: &Connection, sql: &str, uid: i64) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![uid], |row| row.get(0))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
