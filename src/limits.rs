//! Numeric limits enforced by the request pipeline.

pub const USERNAME_MIN_LENGTH: usize = 1;
pub const USERNAME_MAX_LENGTH: usize = 30;

pub const PASSWORD_MIN_LENGTH: usize = 15;
pub const PASSWORD_MAX_LENGTH: usize = 50;

pub const STATUS_MIN_LENGTH: usize = 0;
pub const STATUS_MAX_LENGTH: usize = 200;

pub const POST_MAX_LENGTH: usize = 10_000;

pub const POST_TITLE_MIN_LENGTH: usize = 1;
pub const POST_TITLE_MAX_LENGTH: usize = 100;

pub const IMG_TITLE_MIN_LENGTH: usize = 1;
pub const IMG_TITLE_MAX_LENGTH: usize = 100;
pub const IMG_MAX_SIZE_BYTES: usize = 1_000_000;
pub const USER_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

pub const COMMENT_MIN_LENGTH: usize = 1;
pub const COMMENT_MAX_LENGTH: usize = 200;

pub const BUG_REPORT_MIN_LENGTH: usize = 100;
pub const BUG_REPORT_MAX_LENGTH: usize = 5_000;

pub const QUERY_MAX_LENGTH: usize = 100;

pub const SESSION_MAX_DURATION_MINS: i64 = 120;

pub const USER_MAX_POSTS: i64 = 200;
pub const USER_MAX_POSTS_PER_DAY: i64 = 5;
pub const USER_MAX_IMAGES: i64 = 50;
pub const USER_MAX_COMMENTS_PER_DAY: i64 = 50;
pub const FRIEND_REQUESTS_MAX_PER_DAY: i64 = 20;

/// Default page size for search results.
pub const SEARCH_PAGE_SIZE: i64 = 50;
