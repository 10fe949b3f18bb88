mod common;

use agora::error::AppError;
use agora::limits::{USER_MAX_POSTS_PER_DAY, USER_MAX_COMMENTS_PER_DAY};
use common::app;

#[test]
fn post_round_trip() {
    let t = app();
    let session = t.member("alice@example.com", "alice");

    let pid = t
        .pipeline
        .write_post(&session, "Hello", "# My first post")
        .unwrap();

    let post = t.pipeline.get_post(&pid.to_string()).unwrap();
    assert_eq!(post.title, "Hello");
    assert_eq!(post.content, "# My first post");
    assert_eq!(post.username, "alice");
    assert_eq!(post.votes, 0);
    assert!(post.comments.is_empty());
}

#[test]
fn edit_is_owner_only() {
    let t = app();
    let alice = t.member("alice@example.com", "alice");
    let bob = t.member("bob@example.com", "bob");

    let pid = t.pipeline.write_post(&alice, "v1", "original").unwrap();
    let pid = pid.to_string();

    assert!(matches!(
        t.pipeline.edit_post(&bob, &pid, "hacked", "rewritten"),
        Err(AppError::NotAuthorized)
    ));

    t.pipeline.edit_post(&alice, &pid, "v2", "updated").unwrap();
    let post = t.pipeline.get_post(&pid).unwrap();
    assert_eq!(post.title, "v2");
    assert_eq!(post.content, "updated");
}

#[test]
fn deleting_a_post_takes_its_comments_and_votes() {
    let t = app();
    let alice = t.member("alice@example.com", "alice");
    let bob = t.member("bob@example.com", "bob");

    let pid = t.pipeline.write_post(&alice, "Hello", "body").unwrap();
    let pid = pid.to_string();
    t.pipeline.comment(&bob, &pid, "nice one").unwrap();
    t.pipeline.like(&bob, &pid).unwrap();

    t.pipeline.delete_post(&alice, &pid).unwrap();
    assert!(matches!(
        t.pipeline.get_post(&pid),
        Err(AppError::NoSuchPost)
    ));
    assert_eq!(t.count("SELECT COUNT(*) FROM comments"), 0);
    assert_eq!(t.count("SELECT COUNT(*) FROM votes"), 0);
}

#[test]
fn admins_may_delete_but_not_edit_others_posts() {
    let t = app();
    let alice = t.member("alice@example.com", "alice");
    let admin = t.member("root@example.com", "root");
    t.make_admin("root");

    let pid = t.pipeline.write_post(&alice, "Hello", "body").unwrap();
    let pid = pid.to_string();

    assert!(matches!(
        t.pipeline.edit_post(&admin, &pid, "edited", "body"),
        Err(AppError::NotAuthorized)
    ));
    t.pipeline.delete_post(&admin, &pid).unwrap();
    assert!(matches!(t.pipeline.get_post(&pid), Err(AppError::NoSuchPost)));
}

#[test]
fn daily_post_quota_is_enforced() {
    let t = app();
    let session = t.member("alice@example.com", "alice");

    for i in 0..USER_MAX_POSTS_PER_DAY {
        t.pipeline
            .write_post(&session, &format!("post {}", i), "body")
            .unwrap();
    }
    assert!(matches!(
        t.pipeline.write_post(&session, "one too many", "body"),
        Err(AppError::RateLimitExceeded)
    ));
}

#[test]
fn votes_aggregate_signed() {
    let t = app();
    let alice = t.member("alice@example.com", "alice");
    let bob = t.member("bob@example.com", "bob");
    let carol = t.member("carol@example.com", "carol");

    let pid = t.pipeline.write_post(&alice, "Hello", "body").unwrap();
    let pid = pid.to_string();

    t.pipeline.like(&alice, &pid).unwrap();
    t.pipeline.like(&bob, &pid).unwrap();
    t.pipeline.dislike(&carol, &pid).unwrap();
    assert_eq!(t.pipeline.get_post(&pid).unwrap().votes, 1);

    // A vote is one row per user; changing it replaces, not stacks.
    t.pipeline.dislike(&bob, &pid).unwrap();
    assert_eq!(t.pipeline.get_post(&pid).unwrap().votes, -1);

    t.pipeline.unlike(&carol, &pid).unwrap();
    t.pipeline.unlike(&bob, &pid).unwrap();
    assert_eq!(t.pipeline.get_post(&pid).unwrap().votes, 1);
}

#[test]
fn comments_require_an_existing_post() {
    let t = app();
    let session = t.member("alice@example.com", "alice");
    assert!(matches!(
        t.pipeline.comment(&session, "9999", "hello?"),
        Err(AppError::NoSuchPost)
    ));
}

#[test]
fn daily_comment_quota_is_enforced() {
    let t = app();
    let session = t.member("alice@example.com", "alice");
    let pid = t.pipeline.write_post(&session, "Hello", "body").unwrap();
    let pid = pid.to_string();

    for i in 0..USER_MAX_COMMENTS_PER_DAY {
        t.pipeline
            .comment(&session, &pid, &format!("comment {}", i))
            .unwrap();
    }
    assert!(matches!(
        t.pipeline.comment(&session, &pid, "one too many"),
        Err(AppError::RateLimitExceeded)
    ));
}

#[test]
fn comment_deletion_is_owner_or_admin() {
    let t = app();
    let alice = t.member("alice@example.com", "alice");
    let bob = t.member("bob@example.com", "bob");
    let admin = t.member("root@example.com", "root");
    t.make_admin("root");

    let pid = t.pipeline.write_post(&alice, "Hello", "body").unwrap();
    let pid = pid.to_string();
    let first = t.pipeline.comment(&bob, &pid, "first").unwrap();
    let second = t.pipeline.comment(&bob, &pid, "second").unwrap();

    assert!(matches!(
        t.pipeline.delete_comment(&alice, &first.to_string()),
        Err(AppError::NotAuthorized)
    ));
    t.pipeline.delete_comment(&bob, &first.to_string()).unwrap();
    t.pipeline.delete_comment(&admin, &second.to_string()).unwrap();
    assert!(t.pipeline.get_post(&pid).unwrap().comments.is_empty());
}

#[test]
fn image_upload_serve_and_delete() {
    let t = app();
    let session = t.member("alice@example.com", "alice");

    let accessid = t
        .pipeline
        .upload_image(&session, "pic.PNG", &[0x89, 0x50, 0x4e, 0x47])
        .unwrap();
    assert_eq!(accessid.len(), 10);

    let path = t.pipeline.get_image(&accessid).unwrap();
    assert!(path.exists());
    // Extension is normalized from the title.
    assert!(path.to_string_lossy().ends_with(".png"));

    let images = t.pipeline.list_images(&session).unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].title, "pic.PNG");

    t.pipeline.change_picture(&session, &accessid).unwrap();
    let me = t.pipeline.get_my_user(&session, true).unwrap();
    assert_eq!(me.pfp.as_deref(), Some(accessid.as_str()));

    t.pipeline.delete_image(&session, &accessid).unwrap();
    assert!(matches!(
        t.pipeline.get_image(&accessid),
        Err(AppError::NoSuchImage)
    ));
    assert!(!path.exists());
}

#[test]
fn image_uploads_are_validated() {
    let t = app();
    let session = t.member("alice@example.com", "alice");

    assert!(matches!(
        t.pipeline.upload_image(&session, "pic.GIF", &[0u8; 4]),
        Err(AppError::InvalidTitle)
    ));
    assert!(matches!(
        t.pipeline.upload_image(&session, "noextension", &[0u8; 4]),
        Err(AppError::InvalidTitle)
    ));
    assert!(matches!(
        t.pipeline
            .upload_image(&session, "big.png", &vec![0u8; 1_000_001]),
        Err(AppError::BadImage)
    ));
}

#[test]
fn images_belong_to_their_uploader() {
    let t = app();
    let alice = t.member("alice@example.com", "alice");
    let bob = t.member("bob@example.com", "bob");

    let accessid = t
        .pipeline
        .upload_image(&alice, "pic.png", &[1, 2, 3])
        .unwrap();

    assert!(matches!(
        t.pipeline.delete_image(&bob, &accessid),
        Err(AppError::NotAuthorized)
    ));
    assert!(matches!(
        t.pipeline.change_picture(&bob, &accessid),
        Err(AppError::NotAuthorized)
    ));
}
