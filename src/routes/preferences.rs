//! Accessibility preferences, kept per browser in the `a11y_prefs` cookie.
//! Nothing is stored server-side. A missing or invalid cookie reads as the
//! defaults.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::error::ApiError;
use crate::services::auth::{bytes_to_hex, hex_to_bytes};
use crate::state::AppState;

pub const PREFS_COOKIE: &str = "a11y_prefs";
pub const FONT_SCALE_MIN: u16 = 50;
pub const FONT_SCALE_MAX: u16 = 200;
const PREFS_TTL: Duration = Duration::days(365);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessibilityPrefs {
    /// Percent of the base font size.
    pub font_scale: u16,
    pub high_contrast: bool,
    pub reduce_motion: bool,
    pub screen_reader: bool,
}

impl Default for AccessibilityPrefs {
    fn default() -> Self {
        Self { font_scale: 100, high_contrast: false, reduce_motion: false, screen_reader: false }
    }
}

impl AccessibilityPrefs {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (FONT_SCALE_MIN..=FONT_SCALE_MAX).contains(&self.font_scale)
    }

    /// Decode a cookie value, falling back to defaults.
    #[must_use]
    pub fn from_cookie(raw: Option<&str>) -> Self {
        raw.and_then(hex_to_bytes)
            .and_then(|bytes| serde_json::from_slice::<Self>(&bytes).ok())
            .filter(Self::is_valid)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn to_cookie_value(&self) -> String {
        serde_json::to_vec(self).map(|json| bytes_to_hex(&json)).unwrap_or_default()
    }
}

/// `GET /api/preferences/accessibility`
pub async fn get_prefs(jar: CookieJar) -> Json<AccessibilityPrefs> {
    Json(AccessibilityPrefs::from_cookie(jar.get(PREFS_COOKIE).map(Cookie::value)))
}

/// `PUT /api/preferences/accessibility`
pub async fn put_prefs(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(prefs): Json<AccessibilityPrefs>,
) -> Result<impl IntoResponse, ApiError> {
    if !prefs.is_valid() {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "E_VALIDATION",
            format!("font_scale must be between {FONT_SCALE_MIN} and {FONT_SCALE_MAX}"),
        ));
    }
    let cookie = Cookie::build((PREFS_COOKIE, prefs.to_cookie_value()))
        .path("/")
        .same_site(SameSite::Lax)
        .secure(state.config.cookie_secure)
        .max_age(PREFS_TTL)
        .build();
    Ok((jar.add(cookie), Json(prefs)))
}

#[cfg(test)]
#[path = "preferences_test.rs"]
mod tests;
