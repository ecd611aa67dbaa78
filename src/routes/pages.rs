//! SPA page routes and the navigation guard.
//!
//! Every page path serves the same `index.html` shell from `WEBSITE_DIR`
//! (or a minimal built-in shell when the file is missing). Before serving,
//! the guard may redirect based on who is asking:
//!
//! | caller                  | paths                              | redirect     |
//! |-------------------------|------------------------------------|--------------|
//! | anonymous               | `/dashboard`, `/booking`           | `/login`     |
//! | signed in with profile  | `/`, `/login`, `/register`, `/signup` | `/dashboard` |
//! | signed in, no profile   | `/dashboard`                       | `/`          |

use axum::extract::State;
use axum::http::Uri;
use axum::response::{Html, IntoResponse, Redirect, Response};
use tracing::debug;

use super::auth::MaybeAuthUser;
use crate::state::AppState;

pub const PAGE_PATHS: &[&str] = &[
    "/",
    "/login",
    "/register",
    "/signup",
    "/dashboard",
    "/booking",
    "/payment/success",
    "/about",
    "/services",
    "/contact",
];

const FALLBACK_SHELL: &str = "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>MindBridge</title></head>\n<body><div id=\"root\"></div></body>\n</html>\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visitor {
    Anonymous,
    /// Session is valid but the profile could not be resolved.
    NoProfile,
    SignedIn,
}

impl Visitor {
    fn of(caller: &MaybeAuthUser) -> Self {
        match &caller.0 {
            None => Self::Anonymous,
            Some(user) if user.profile.is_none() => Self::NoProfile,
            Some(_) => Self::SignedIn,
        }
    }
}

/// Redirect target for `visitor` on `path`, if any.
#[must_use]
pub fn guard(path: &str, visitor: Visitor) -> Option<&'static str> {
    match (visitor, path) {
        (Visitor::Anonymous, "/dashboard" | "/booking") => Some("/login"),
        (Visitor::SignedIn, "/" | "/login" | "/register" | "/signup") => Some("/dashboard"),
        (Visitor::NoProfile, "/dashboard") => Some("/"),
        _ => None,
    }
}

/// Serve the SPA shell for any page path, after the guard.
pub async fn page(State(state): State<AppState>, caller: MaybeAuthUser, uri: Uri) -> Response {
    let visitor = Visitor::of(&caller);
    if let Some(target) = guard(uri.path(), visitor) {
        debug!(path = uri.path(), ?visitor, target, "page guard redirect");
        return Redirect::temporary(target).into_response();
    }
    let index = state.config.website_dir.join("index.html");
    match tokio::fs::read_to_string(&index).await {
        Ok(html) => Html(html).into_response(),
        Err(_) => Html(FALLBACK_SHELL).into_response(),
    }
}

#[cfg(test)]
#[path = "pages_test.rs"]
mod tests;
