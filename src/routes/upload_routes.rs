// src/routes/upload_routes.rs

use axum::{
    Json, Router,
    extract::{Multipart, State},
    routing::post,
};
use serde::Serialize;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState},
    upload::FileStore,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/uploads/profile-image", post(upload_profile_image))
}

#[derive(Debug, Serialize)]
pub struct UploadData {
    pub image_path: String,
}

/// Multipart form with a single `image` part. The stored path replaces the
/// account's previous avatar; the old file is removed afterwards.
pub async fn upload_profile_image(
    State(state): State<AppState>,
    auth: AuthContext,
    mut multipart: Multipart,
) -> Result<Json<ApiOk<UploadData>>, ApiError> {
    let store = FileStore::new(&state.upload_dir, state.max_upload_bytes);

    let mut image_path: Option<String> = None;
    while let Some(field) = multipart.next_field().await.map_err(|_| {
        ApiError::BadRequest("VALIDATION_ERROR", "malformed multipart body".into())
    })? {
        if field.name() != Some("image") {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|_| {
            ApiError::BadRequest("VALIDATION_ERROR", "malformed multipart body".into())
        })?;
        image_path = Some(store.save_image(content_type.as_deref(), &bytes).await?);
    }

    let Some(image_path) = image_path else {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "an image part is required".into(),
        ));
    };

    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    let previous: Option<String> = sqlx::query_scalar(
        r#"
        SELECT avatar_path
        FROM account
        WHERE account_id = $1
        "#,
    )
    .bind(auth.account_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    sqlx::query(
        r#"
        UPDATE account
        SET avatar_path = $1
        WHERE account_id = $2
        "#,
    )
    .bind(&image_path)
    .bind(auth.account_id)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    tx.commit().await.map_err(ApiError::db)?;

    if let Some(old) = previous {
        if old != image_path {
            store.remove(&old).await;
        }
    }

    Ok(Json(ApiOk {
        data: UploadData { image_path },
    }))
}
