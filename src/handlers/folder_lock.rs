use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::error::DriveError;
use crate::handlers::drive::required;
use crate::middleware::session::DriveSession;
use crate::router::DriveState;
use crate::service::folder_lock::UnlockOutcome;
use crate::types::drive::normalize_parent;
use crate::views;

#[derive(Debug, Deserialize)]
pub struct FolderQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RemovePasswordParams {
    #[serde(rename = "folderID")]
    pub folder_id: Option<String>,
}

/// Folder id for a lock operation. The root listing is never gated, so
/// any spelling of root is refused.
fn lockable_folder(raw: Option<&str>) -> Result<&str, DriveError> {
    let folder_id = required(raw, "Folder ID")?;
    normalize_parent(Some(folder_id)).ok_or_else(|| {
        DriveError::BadRequest("The root folder cannot be password protected".to_string())
    })
}

async fn render_listing(
    state: &DriveState,
    session: &DriveSession,
    folder_id: Option<&str>,
) -> Result<Response, DriveError> {
    let items = state
        .drive
        .list_children(&session.access_token, folder_id)
        .await?;
    Ok(Html(views::listing_page(&items, folder_id)).into_response())
}

/// GET /folder?id= -> unlock form for locked folders, listing otherwise.
pub async fn folder_view(
    State(state): State<DriveState>,
    session: DriveSession,
    Query(query): Query<FolderQuery>,
) -> Result<Response, DriveError> {
    let Some(folder_id) = normalize_parent(query.id.as_deref()) else {
        return render_listing(&state, &session, None).await;
    };
    if state.locks.is_locked(folder_id).await? {
        return Ok(Html(views::unlock_form_page(folder_id)).into_response());
    }
    render_listing(&state, &session, Some(folder_id)).await
}

/// POST /folder?id= (form `password`) -> listing on a correct password.
pub async fn folder_unlock(
    State(state): State<DriveState>,
    session: DriveSession,
    Query(query): Query<FolderQuery>,
    Form(form): Form<PasswordForm>,
) -> Result<Response, DriveError> {
    let Some(folder_id) = normalize_parent(query.id.as_deref()) else {
        return render_listing(&state, &session, None).await;
    };
    match state.locks.unlock(folder_id, &form.password).await? {
        UnlockOutcome::Granted | UnlockOutcome::NotLocked => {
            render_listing(&state, &session, Some(folder_id)).await
        }
        UnlockOutcome::Denied => Ok((
            StatusCode::UNAUTHORIZED,
            Html(views::incorrect_password_page(folder_id)),
        )
            .into_response()),
        UnlockOutcome::Throttled => Ok((
            StatusCode::TOO_MANY_REQUESTS,
            Html(views::throttled_page(folder_id)),
        )
            .into_response()),
    }
}

/// GET /setPassword?id= -> the set-password form.
pub async fn set_password_form(
    State(state): State<DriveState>,
    _session: DriveSession,
    Query(query): Query<FolderQuery>,
) -> Result<Html<String>, DriveError> {
    let folder_id = lockable_folder(query.id.as_deref())?;
    let is_locked = state.locks.is_locked(folder_id).await?;
    Ok(Html(views::set_password_page(folder_id, is_locked)))
}

/// POST /setPassword?id= (form `password`) -> create or replace the lock.
pub async fn set_password(
    State(state): State<DriveState>,
    _session: DriveSession,
    Query(query): Query<FolderQuery>,
    Form(form): Form<PasswordForm>,
) -> Result<Html<String>, DriveError> {
    let folder_id = lockable_folder(query.id.as_deref())?;
    state.locks.set_password(folder_id, &form.password).await?;
    Ok(Html(views::password_set_page()))
}

/// GET /removePassword?folderID=
pub async fn remove_password_query(
    State(state): State<DriveState>,
    _session: DriveSession,
    Query(params): Query<RemovePasswordParams>,
) -> Result<Redirect, DriveError> {
    remove_password(&state, params).await
}

/// POST /removePassword (form `folderID`)
pub async fn remove_password_form(
    State(state): State<DriveState>,
    _session: DriveSession,
    Form(params): Form<RemovePasswordParams>,
) -> Result<Redirect, DriveError> {
    remove_password(&state, params).await
}

async fn remove_password(
    state: &DriveState,
    params: RemovePasswordParams,
) -> Result<Redirect, DriveError> {
    let folder_id = lockable_folder(params.folder_id.as_deref())?;
    state.locks.remove(folder_id).await?;
    Ok(Redirect::to("/"))
}
