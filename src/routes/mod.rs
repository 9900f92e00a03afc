pub mod assets;
pub mod auth;
pub mod home;
pub mod posts;

use askama::Template;
use axum::http::{header, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::{NaiveDateTime, Utc};
use tower_http::trace::TraceLayer;

use crate::auth::session::session_layer;
use crate::auth::{Flash, Session};
use crate::extractors::CurrentUser;
use crate::state::AppState;

/// Build the full application with the session middleware installed.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .route("/assets/{*path}", get(assets::serve))
        .merge(posts::router())
        .merge(auth::router())
        .layer(middleware::from_fn_with_state(state.clone(), session_layer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// Data every page hands to `base.html`: the navigation state and the
/// flashes queued by earlier requests.
pub struct Layout {
    pub logged_in: bool,
    pub username: String,
    pub flashes: Vec<Flash>,
}

impl Layout {
    /// Consumes the session's pending flashes.
    pub async fn new(session: &Session, user: Option<&CurrentUser>) -> Self {
        Self {
            logged_in: user.is_some(),
            username: user.map(|u| u.username.clone()).unwrap_or_default(),
            flashes: session.take_flashes().await,
        }
    }
}

// --- Time formatting ---

pub fn parse_and_format_time(db_time: &str) -> String {
    NaiveDateTime::parse_from_str(db_time, "%Y-%m-%d %H:%M:%S%.f")
        .map(|dt| format_relative_time(&dt))
        .unwrap_or_else(|_| db_time.to_string())
}

pub fn format_relative_time(dt: &NaiveDateTime) -> String {
    let now = Utc::now().naive_utc();
    let diff = now.signed_duration_since(*dt);

    let seconds = diff.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }

    let days = diff.num_days();
    if days < 7 {
        return format!("{}d ago", days);
    }

    dt.format("%b %-d, %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::SessionData;
    use crate::auth::FlashCategory;
    use chrono::NaiveDate;

    #[test]
    fn format_relative_time_just_now() {
        let now = Utc::now().naive_utc();
        assert_eq!(format_relative_time(&now), "just now");
    }

    #[test]
    fn format_relative_time_minutes() {
        let dt = Utc::now().naive_utc() - chrono::Duration::minutes(5);
        assert_eq!(format_relative_time(&dt), "5m ago");
    }

    #[test]
    fn format_relative_time_hours() {
        let dt = Utc::now().naive_utc() - chrono::Duration::hours(3);
        assert_eq!(format_relative_time(&dt), "3h ago");
    }

    #[test]
    fn format_relative_time_days() {
        let dt = Utc::now().naive_utc() - chrono::Duration::days(2);
        assert_eq!(format_relative_time(&dt), "2d ago");
    }

    #[test]
    fn format_relative_time_old_date() {
        let dt = NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(format_relative_time(&dt), "Jan 15, 2025");
    }

    #[test]
    fn parse_and_format_accepts_whole_and_fractional_seconds() {
        assert_eq!(parse_and_format_time("2025-01-15 12:00:00"), "Jan 15, 2025");
        assert_eq!(
            parse_and_format_time("2025-01-15 12:00:00.123456"),
            "Jan 15, 2025"
        );
    }

    #[test]
    fn parse_and_format_bad_input_returns_raw() {
        assert_eq!(parse_and_format_time("not-a-date"), "not-a-date");
    }

    #[tokio::test]
    async fn layout_takes_pending_flashes() {
        let session = Session::new(SessionData::default());
        session.flash(FlashCategory::Success, "saved").await;
        let user = CurrentUser {
            username: "alice".to_string(),
        };

        let layout = Layout::new(&session, Some(&user)).await;
        assert!(layout.logged_in);
        assert_eq!(layout.username, "alice");
        assert_eq!(layout.flashes.len(), 1);
        assert!(session.take_flashes().await.is_empty());
    }
}
