mod common;

use agora::email::Template;
use agora::error::AppError;
use common::{app, PASSWORD};

#[test]
fn join_confirm_login_round_trip() {
    let t = app();

    let backup = t
        .pipeline
        .create_account("alice@example.com", "alice", PASSWORD, true)
        .unwrap()
        .unwrap();
    assert_eq!(backup.len(), 30);

    // Pending state: one unconfirmed row, one stored creation token, one
    // notification out.
    assert_eq!(t.count("SELECT COUNT(*) FROM users WHERE confirmed = 0"), 1);
    assert_eq!(t.count("SELECT COUNT(*) FROM tokens WHERE type = 'creation'"), 1);
    assert_eq!(t.mailer.sent().len(), 1);

    let token = t.mailed_token(Template::ConfirmAccount);
    t.pipeline.confirm_create(&token).unwrap();
    assert_eq!(t.count("SELECT COUNT(*) FROM users WHERE confirmed = 1"), 1);

    let session = t.pipeline.login("alice", PASSWORD).unwrap();
    let me = t.pipeline.get_my_user(&session, false).unwrap();
    assert_eq!(me.username, "alice");
    assert_eq!(me.email, "alice@example.com");
    assert!(!me.admin);
}

#[test]
fn login_requires_confirmation() {
    let t = app();
    t.join("alice@example.com", "alice");
    assert!(matches!(
        t.pipeline.login("alice", PASSWORD),
        Err(AppError::NotAuthorized)
    ));
}

#[test]
fn confirmation_token_is_single_use() {
    let t = app();
    t.join("alice@example.com", "alice");
    let token = t.mailed_token(Template::ConfirmAccount);

    t.pipeline.confirm_create(&token).unwrap();
    assert!(matches!(
        t.pipeline.confirm_create(&token),
        Err(AppError::InvalidToken)
    ));
}

#[test]
fn wrong_password_is_indistinguishable_from_no_user() {
    let t = app();
    t.member("alice@example.com", "alice");
    assert!(matches!(
        t.pipeline.login("alice", "not-her-password!"),
        Err(AppError::NoSuchUser)
    ));
    assert!(matches!(
        t.pipeline.login("nobody", PASSWORD),
        Err(AppError::NoSuchUser)
    ));
}

#[test]
fn confirmed_email_cannot_be_reused() {
    let t = app();
    t.member("alice@example.com", "alice");
    assert!(matches!(
        t.pipeline
            .create_account("alice@example.com", "alice2", PASSWORD, true),
        Err(AppError::InvalidEmail)
    ));
}

#[test]
fn unconfirmed_squatter_is_purged_on_rejoin() {
    let t = app();
    t.join("alice@example.com", "squatter");

    // Same address, new signup: the unconfirmed holder gives way.
    t.join("alice@example.com", "alice");
    assert_eq!(t.count("SELECT COUNT(*) FROM users WHERE username = 'squatter'"), 0);
    assert_eq!(t.count("SELECT COUNT(*) FROM users WHERE username = 'alice'"), 1);
}

#[test]
fn unacceptable_join_validates_but_persists_nothing() {
    let t = app();
    let created = t
        .pipeline
        .create_account("alice@example.com", "alice", PASSWORD, false)
        .unwrap();
    assert!(created.is_none());
    assert_eq!(t.count("SELECT COUNT(*) FROM users"), 0);
    assert!(t.mailer.sent().is_empty());

    // Invalid input still fails first, acceptable or not.
    assert!(matches!(
        t.pipeline.create_account("not-an-email", "alice", PASSWORD, false),
        Err(AppError::InvalidEmail)
    ));

    // An abandoned signup on the address is purged even by a refused join.
    t.join("bob@example.com", "squatter");
    t.pipeline
        .create_account("bob@example.com", "bob", PASSWORD, false)
        .unwrap();
    assert_eq!(t.count("SELECT COUNT(*) FROM users"), 0);
}

#[test]
fn concurrent_joins_on_one_address_leave_no_orphans() {
    let t = app();

    // Each join purges any unconfirmed holder of the address and creates
    // its own user row plus creation token. Whatever order the writer
    // serializes them in, a purge must never split another join's row from
    // its token.
    std::thread::scope(|s| {
        for i in 0..8 {
            let t = &t;
            s.spawn(move || {
                t.pipeline
                    .create_account("race@example.com", &format!("racer{i}"), PASSWORD, true)
                    .unwrap();
            });
        }
    });

    assert_eq!(
        t.count("SELECT COUNT(*) FROM users WHERE email = 'race@example.com'"),
        1
    );
    assert_eq!(t.count("SELECT COUNT(*) FROM tokens WHERE type = 'creation'"), 1);
    assert_eq!(
        t.count(
            "SELECT COUNT(*) FROM tokens t
             WHERE NOT EXISTS (SELECT 1 FROM users u WHERE u.uid = t.owner)"
        ),
        0
    );

    // The surviving signup is still confirmable with its stored token.
    let token: String = t
        .conn()
        .query_row("SELECT value FROM tokens WHERE type = 'creation'", [], |row| {
            row.get(0)
        })
        .unwrap();
    t.pipeline.confirm_create(&token).unwrap();
    assert_eq!(t.count("SELECT COUNT(*) FROM users WHERE confirmed = 1"), 1);
}

#[test]
fn taken_username_is_rejected() {
    let t = app();
    t.member("alice@example.com", "alice");
    assert!(matches!(
        t.pipeline
            .create_account("bob@example.com", "alice", PASSWORD, true),
        Err(AppError::InvalidUsername)
    ));
}

#[test]
fn logout_expires_only_that_session() {
    let t = app();
    let first = t.member("alice@example.com", "alice");
    let second = t.pipeline.login("alice", PASSWORD).unwrap();

    t.pipeline.logout(&first).unwrap();
    assert!(matches!(
        t.pipeline.get_my_user(&first, true),
        Err(AppError::InvalidToken)
    ));
    assert!(t.pipeline.get_my_user(&second, true).is_ok());
}

#[test]
fn sessions_expire_after_two_hours() {
    let t = app();
    let session = t.member("alice@example.com", "alice");

    t.age_tokens(119);
    assert!(t.pipeline.get_my_user(&session, true).is_ok());

    t.age_tokens(121);
    assert!(matches!(
        t.pipeline.get_my_user(&session, true),
        Err(AppError::InvalidToken)
    ));
    // The stale row was swept, not just rejected.
    assert_eq!(t.count("SELECT COUNT(*) FROM tokens WHERE type = 'session'"), 0);
}

#[test]
fn account_deletion_requires_password_and_confirmation() {
    let t = app();
    let session = t.member("alice@example.com", "alice");

    assert!(matches!(
        t.pipeline.delete_account(&session, "guessed-password!"),
        Err(AppError::NotAuthorized)
    ));

    t.pipeline.delete_account(&session, PASSWORD).unwrap();
    // Nothing deleted until the emailed link is followed.
    assert_eq!(t.count("SELECT COUNT(*) FROM users"), 1);

    let token = t.mailed_token(Template::DeleteAccount);
    t.pipeline.confirm_delete(&token).unwrap();
    assert_eq!(t.count("SELECT COUNT(*) FROM users"), 0);
    assert!(matches!(
        t.pipeline.get_my_user(&session, true),
        Err(AppError::InvalidToken)
    ));
}

#[test]
fn profile_edits_apply_and_validate() {
    let t = app();
    let session = t.member("alice@example.com", "alice");
    t.member("bob@example.com", "bob");

    t.pipeline
        .change_status(&session, "gone fishing")
        .unwrap();
    t.pipeline.change_username(&session, "alicia").unwrap();

    let me = t.pipeline.get_my_user(&session, true).unwrap();
    assert_eq!(me.status, "gone fishing");
    assert_eq!(me.username, "alicia");

    assert!(matches!(
        t.pipeline.change_username(&session, "bob"),
        Err(AppError::InvalidUsername)
    ));
    assert!(matches!(
        t.pipeline.change_status(&session, &"s".repeat(201)),
        Err(AppError::InvalidStatus)
    ));
}

#[test]
fn search_matches_substrings_and_paginates() {
    let t = app();
    let session = t.member("alice@example.com", "alice");
    t.member("bob@example.com", "bob");
    t.pipeline.write_post(&session, "Spring recipes", "x").unwrap();
    t.pipeline.write_post(&session, "Offspring", "y").unwrap();

    let users = t.pipeline.search_users("lic", 0).unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].username, "alice");
    assert!(t.pipeline.search_users("lic", 1).unwrap().is_empty());

    let posts = t.pipeline.search_posts("spring", 0).unwrap();
    assert_eq!(posts.len(), 2);
    assert!(t.pipeline.search_users("zzz", 0).unwrap().is_empty());
}

#[test]
fn suspension_blocks_login_and_live_sessions() {
    let t = app();
    let session = t.member("alice@example.com", "alice");
    let admin = t.member("root@example.com", "root");
    t.make_admin("root");
    let alice = t.uid_of("alice");

    t.pipeline.admin_suspend(&admin, &alice.to_string()).unwrap();
    assert!(matches!(
        t.pipeline.get_my_user(&session, true),
        Err(AppError::AccountSuspended)
    ));
    assert!(matches!(
        t.pipeline.login("alice", PASSWORD),
        Err(AppError::AccountSuspended)
    ));

    t.pipeline.admin_unsuspend(&admin, &alice.to_string()).unwrap();
    assert!(t.pipeline.login("alice", PASSWORD).is_ok());
}
