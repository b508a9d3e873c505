//! Rendered comic download

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /comics/:file
///
/// Serves `<working_dir>/comics/<file>` with the renderer's fixed content
/// type. Only bare file names are accepted.
pub async fn download_comic(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> ApiResult<impl IntoResponse> {
    if !is_plain_file_name(&file) {
        return Err(ApiError::BadRequest(format!("Invalid comic name: {}", file)));
    }

    let path = state.comics.comics_dir().join(&file);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(format!("Comic {}", file)));
        }
        Err(e) => return Err(ApiError::Internal(format!("Read {} failed: {}", file, e))),
    };

    Ok((
        [
            (header::CONTENT_TYPE, state.comics.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", file),
            ),
        ],
        bytes,
    ))
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

pub fn comic_routes() -> Router<AppState> {
    Router::new().route("/comics/:file", get(download_comic))
}
