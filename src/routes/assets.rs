use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use rust_embed::Embed;

/// Stylesheets compiled into the binary.
#[derive(Embed)]
#[folder = "assets/"]
struct StaticFiles;

/// GET /assets/{*path}
pub async fn serve(Path(path): Path<String>) -> Response {
    let Some(file) = StaticFiles::get(&path) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    (
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
        ],
        file.data.into_owned(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stylesheet_is_served_as_css() {
        let response = serve(Path("css/style.css".to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/css"
        );
    }

    #[tokio::test]
    async fn unknown_asset_is_404() {
        let response = serve(Path("css/nope.css".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
