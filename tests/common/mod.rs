#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use agora::db::Database;
use agora::email::{MemoryMailer, Template};
use agora::files::LocalFiles;
use agora::pipeline::Pipeline;

pub const PASSWORD: &str = "correct-horse-battery";
pub const NEW_PASSWORD: &str = "staple-battery-horse";

/// A full pipeline over a temp directory, with a recording mailer so tests
/// can fish confirmation tokens out of "sent" email.
pub struct TestApp {
    pub pipeline: Pipeline,
    pub mailer: Arc<MemoryMailer>,
    db_path: PathBuf,
    _tmp: tempfile::TempDir,
}

pub fn app() -> TestApp {
    let tmp = tempfile::tempdir().unwrap();
    let db_path = tmp.path().join("agora.db");

    let db = Database::open(&db_path).unwrap();
    let files =
        LocalFiles::new(&tmp.path().join("posts"), &tmp.path().join("images")).unwrap();
    let mailer = Arc::new(MemoryMailer::new());

    let pipeline = Pipeline::new(
        db,
        mailer.clone(),
        Arc::new(files),
        "http://agora.test".to_string(),
    );

    TestApp {
        pipeline,
        mailer,
        db_path,
        _tmp: tmp,
    }
}

impl TestApp {
    /// Direct connection to the underlying file, for seeding and assertions
    /// the public surface does not expose.
    pub fn conn(&self) -> rusqlite::Connection {
        rusqlite::Connection::open(&self.db_path).unwrap()
    }

    /// The token carried by the most recent email of the given template
    /// (the last path segment of its confirmation link).
    pub fn mailed_token(&self, template: Template) -> String {
        let sent = self.mailer.sent();
        let mail = sent
            .iter()
            .rev()
            .find(|m| m.template == template)
            .expect("no such email was sent");
        mail.param.rsplit('/').next().unwrap().to_string()
    }

    /// Create an unconfirmed account; returns its backup code.
    pub fn join(&self, email: &str, username: &str) -> String {
        self.pipeline
            .create_account(email, username, PASSWORD, true)
            .unwrap()
            .expect("account should have been created")
    }

    /// Create, confirm and log in; returns a session token.
    pub fn member(&self, email: &str, username: &str) -> String {
        self.join(email, username);
        let token = self.mailed_token(Template::ConfirmAccount);
        self.pipeline.confirm_create(&token).unwrap();
        self.pipeline.login(username, PASSWORD).unwrap()
    }

    pub fn uid_of(&self, username: &str) -> i64 {
        self.conn()
            .query_row(
                "SELECT uid FROM users WHERE username = ?1",
                [username],
                |row| row.get(0),
            )
            .unwrap()
    }

    pub fn make_admin(&self, username: &str) {
        self.conn()
            .execute("UPDATE users SET admin = 1 WHERE username = ?1", [username])
            .unwrap();
    }

    /// Backdate every token so session-expiry behavior can be observed.
    pub fn age_tokens(&self, minutes: i64) {
        self.conn()
            .execute(
                "UPDATE tokens SET created_at =
                     datetime('now', '-' || ?1 || ' minutes')",
                [minutes],
            )
            .unwrap();
    }

    pub fn count(&self, sql: &str) -> i64 {
        self.conn().query_row(sql, [], |row| row.get(0)).unwrap()
    }
}
