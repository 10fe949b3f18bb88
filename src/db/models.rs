use serde::Serialize;

/// Confirmation/suspension/admin flags for one user.
#[derive(Debug, Clone, Copy)]
pub struct UserFlags {
    pub confirmed: bool,
    pub suspended: bool,
    pub admin: bool,
}

/// A stored token row, with its age precomputed by the query so expiry can
/// be judged at validation time rather than by the store.
#[derive(Debug, Clone)]
pub struct TokenRow {
    pub owner: i64,
    pub data: Option<String>,
    pub age_minutes: i64,
}

/// A freshly registered account, with the leftovers of any unconfirmed
/// squatter that was purged in the same transaction.
#[derive(Debug)]
pub struct NewAccount {
    pub uid: i64,
    pub confirm_token: String,
    pub purged_posts: Vec<String>,
    pub purged_images: Vec<String>,
}

/// Outcome of applying an email-change token.
#[derive(Debug)]
pub enum EmailChange {
    Applied { uid: i64, email: String },
    /// The address gained another holder after the link was issued. The
    /// token is spent regardless.
    Taken,
    UnknownToken,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    pub pid: i64,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FriendLink {
    pub uid: i64,
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageSummary {
    pub accessid: String,
    pub title: String,
}

/// What anyone may see of a user.
#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
    pub uid: i64,
    pub username: String,
    pub pfp: Option<String>,
    pub status: String,
    pub suspended: bool,
    pub posts: Vec<PostSummary>,
    pub friends: Vec<FriendLink>,
}

/// What the account owner (or an admin) sees. The relational fields are
/// left empty when the profile is fetched in concise mode.
#[derive(Debug, Clone, Serialize)]
pub struct PrivateProfile {
    pub uid: i64,
    pub username: String,
    pub email: String,
    pub pfp: Option<String>,
    pub status: String,
    pub suspended: bool,
    pub admin: bool,
    pub posts: Vec<PostSummary>,
    pub friends: Vec<FriendLink>,
    /// Pending requests this user has sent.
    pub from_you: Vec<FriendLink>,
    /// Pending requests awaiting this user's answer.
    pub for_you: Vec<FriendLink>,
    pub images: Vec<ImageSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub cid: i64,
    pub uid: i64,
    pub username: String,
    pub content: String,
    pub timestamp: String,
}

/// A post with its author, vote score and comments. `content` is filled in
/// by the pipeline from the blob store; `filename` never leaves the server.
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    pub pid: i64,
    pub owner: i64,
    pub username: String,
    pub title: String,
    pub timestamp: String,
    pub votes: i64,
    pub comments: Vec<CommentView>,
    pub content: String,
    #[serde(skip)]
    pub filename: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserHit {
    pub uid: i64,
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostHit {
    pub pid: i64,
    pub title: String,
}
