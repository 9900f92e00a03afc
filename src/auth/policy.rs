//! Authorization rules shared by the post and comment handlers.
//!
//! Both checks are pure: callers turn a refusal into a flash message and a
//! redirect rather than an error response.

use crate::extractors::CurrentUser;

/// The actor is logged in.
pub fn is_authenticated(user: Option<&CurrentUser>) -> bool {
    user.is_some()
}

/// The actor is logged in and wrote the resource.
pub fn is_author(user: Option<&CurrentUser>, author: &str) -> bool {
    matches!(user, Some(u) if u.username == author)
}
