mod common;

use agora::email::Template;
use agora::error::AppError;
use common::{app, NEW_PASSWORD, PASSWORD};

#[test]
fn email_recovery_resets_password_and_sessions() {
    let t = app();
    let session = t.member("alice@example.com", "alice");

    t.pipeline.recover_account("alice@example.com").unwrap();
    let token = t.mailed_token(Template::RecoverAccount);
    t.pipeline.confirm_recover(&token, NEW_PASSWORD).unwrap();

    assert!(matches!(
        t.pipeline.login("alice", PASSWORD),
        Err(AppError::NoSuchUser)
    ));
    assert!(t.pipeline.login("alice", NEW_PASSWORD).is_ok());
    // Recovery revokes sessions issued under the old password.
    assert!(matches!(
        t.pipeline.get_my_user(&session, true),
        Err(AppError::InvalidToken)
    ));
}

#[test]
fn recovery_discloses_nothing_about_unknown_addresses() {
    let t = app();
    t.pipeline.recover_account("nobody@example.com").unwrap();
    assert!(t.mailer.sent().is_empty());

    // Unconfirmed accounts are treated the same as unknown ones.
    t.join("bob@example.com", "bob");
    let before = t.mailer.sent().len();
    t.pipeline.recover_account("bob@example.com").unwrap();
    assert_eq!(t.mailer.sent().len(), before);
}

#[test]
fn recovery_token_is_single_use() {
    let t = app();
    t.member("alice@example.com", "alice");

    t.pipeline.recover_account("alice@example.com").unwrap();
    let token = t.mailed_token(Template::RecoverAccount);
    t.pipeline.confirm_recover(&token, NEW_PASSWORD).unwrap();
    assert!(matches!(
        t.pipeline.confirm_recover(&token, "yet-another-password"),
        Err(AppError::InvalidToken)
    ));
}

#[test]
fn backup_code_recovers_and_rotates() {
    let t = app();
    let backup = t
        .pipeline
        .create_account("alice@example.com", "alice", PASSWORD, true)
        .unwrap()
        .unwrap();
    let confirm = t.mailed_token(Template::ConfirmAccount);
    t.pipeline.confirm_create(&confirm).unwrap();

    t.pipeline
        .backup_recover(&backup, "alice@example.com")
        .unwrap();

    // A recovery link went out, and a replacement code with it.
    let token = t.mailed_token(Template::RecoverAccount);
    let new_code = t.mailed_token(Template::NewRecoveryToken);
    t.pipeline.confirm_recover(&token, NEW_PASSWORD).unwrap();

    // The used code is dead; the replacement works.
    assert!(matches!(
        t.pipeline.backup_recover(&backup, "alice@example.com"),
        Err(AppError::NoSuchUser)
    ));
    t.pipeline
        .backup_recover(&new_code, "alice@example.com")
        .unwrap();
}

#[test]
fn backup_code_must_match_the_account_email() {
    let t = app();
    let backup = t
        .pipeline
        .create_account("alice@example.com", "alice", PASSWORD, true)
        .unwrap()
        .unwrap();
    let confirm = t.mailed_token(Template::ConfirmAccount);
    t.pipeline.confirm_create(&confirm).unwrap();

    assert!(matches!(
        t.pipeline.backup_recover(&backup, "mallory@example.com"),
        Err(AppError::NoSuchUser)
    ));
}

#[test]
fn email_change_is_confirmed_from_the_new_address() {
    let t = app();
    let session = t.member("alice@example.com", "alice");

    t.pipeline
        .change_email(&session, "alice@new.example.com")
        .unwrap();
    // Unconfirmed, nothing changed yet.
    let me = t.pipeline.get_my_user(&session, true).unwrap();
    assert_eq!(me.email, "alice@example.com");

    let sent = t.mailer.sent();
    let mail = sent.last().unwrap();
    assert_eq!(mail.template, Template::ChangeEmail);
    assert_eq!(mail.to, "alice@new.example.com");

    let token = t.mailed_token(Template::ChangeEmail);
    t.pipeline.confirm_email(&token).unwrap();

    let me = t.pipeline.get_my_user(&session, true).unwrap();
    assert_eq!(me.email, "alice@new.example.com");
    // The backup code rotates with the address.
    let sent = t.mailer.sent();
    let rotation = sent.last().unwrap();
    assert_eq!(rotation.template, Template::NewRecoveryToken);
    assert_eq!(rotation.to, "alice@new.example.com");
}

#[test]
fn email_change_to_a_taken_address_is_rejected() {
    let t = app();
    let session = t.member("alice@example.com", "alice");
    t.member("bob@example.com", "bob");

    assert!(matches!(
        t.pipeline.change_email(&session, "bob@example.com"),
        Err(AppError::InvalidEmail)
    ));
}

#[test]
fn email_change_loses_to_a_faster_claimant() {
    let t = app();
    let session = t.member("alice@example.com", "alice");
    t.member("bob@example.com", "bob");

    t.pipeline
        .change_email(&session, "shared@example.com")
        .unwrap();
    // Bob claims the address while alice's link is still in flight.
    t.conn()
        .execute(
            "UPDATE users SET email = 'shared@example.com' WHERE username = 'bob'",
            [],
        )
        .unwrap();

    let token = t.mailed_token(Template::ChangeEmail);
    assert!(matches!(
        t.pipeline.confirm_email(&token),
        Err(AppError::InvalidEmail)
    ));
    // The link is spent either way.
    assert!(matches!(
        t.pipeline.confirm_email(&token),
        Err(AppError::InvalidToken)
    ));

    let me = t.pipeline.get_my_user(&session, true).unwrap();
    assert_eq!(me.email, "alice@example.com");
}
