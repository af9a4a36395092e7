use axum::{
    Json,
    body::Body,
    extract::{Multipart, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::info;

use crate::error::DriveError;
use crate::middleware::session::{ApiSession, DriveSession};
use crate::router::DriveState;
use crate::types::drive::{DriveItem, normalize_parent};
use crate::views;

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ParentQuery {
    pub parent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameQuery {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MoveQuery {
    pub id: Option<String>,
    #[serde(rename = "parentID")]
    pub parent_id: Option<String>,
}

/// Non-empty query value or a 400 naming what is missing.
pub(crate) fn required<'a>(value: Option<&'a str>, what: &str) -> Result<&'a str, DriveError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(DriveError::BadRequest(format!("{what} not provided"))),
    }
}

/// GET / -> "My Drive" root listing.
pub async fn root_listing(
    State(state): State<DriveState>,
    session: DriveSession,
) -> Result<Html<String>, DriveError> {
    let items = state
        .drive
        .list_children(&session.access_token, None)
        .await?;
    Ok(Html(views::listing_page(&items, None)))
}

/// GET /files?parent= -> JSON listing for the page script. Locked folders are refused.
pub async fn list_files_json(
    State(state): State<DriveState>,
    session: ApiSession,
    Query(query): Query<ParentQuery>,
) -> Result<Json<Vec<DriveItem>>, DriveError> {
    let parent = normalize_parent(query.parent.as_deref());
    if let Some(folder_id) = parent
        && state.locks.is_locked(folder_id).await?
    {
        return Err(DriveError::FolderLocked(folder_id.to_string()));
    }
    let items = state
        .drive
        .list_children(&session.access_token, parent)
        .await?;
    Ok(Json(items))
}

/// POST /upload (multipart `file`, `folderID`).
pub async fn upload(
    State(state): State<DriveState>,
    session: DriveSession,
    mut multipart: Multipart,
) -> Result<Redirect, DriveError> {
    let mut folder_field: Option<String> = None;
    let mut file: Option<(String, Option<String>, axum::body::Bytes)> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("folderID") => {
                folder_field = Some(field.text().await?);
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                file = Some((file_name, content_type, data));
            }
            _ => {}
        }
    }

    let Some((file_name, content_type, data)) = file.filter(|(name, _, _)| !name.is_empty())
    else {
        return Err(DriveError::BadRequest("file not provided".to_string()));
    };
    let mime_type = upload_mime(&file_name, content_type.as_deref());
    let parent = normalize_parent(folder_field.as_deref());

    let created = state
        .drive
        .upload(&session.access_token, &file_name, &mime_type, &data, parent)
        .await?;
    info!(id = %created.id, name = %created.name, bytes = data.len(), "file uploaded");

    Ok(match parent {
        Some(folder_id) => Redirect::to(&format!(
            "/folder?id={}",
            urlencoding::encode(folder_id)
        )),
        None => Redirect::to("/"),
    })
}

/// GET /download?id= -> streams the file body through.
pub async fn download(
    State(state): State<DriveState>,
    session: DriveSession,
    Query(query): Query<IdQuery>,
) -> Result<Response, DriveError> {
    let file_id = required(query.id.as_deref(), "File ID")?;

    let meta = state.drive.metadata(&session.access_token, file_id).await?;
    let upstream = state.drive.download(&session.access_token, file_id).await?;

    let content_type = upstream
        .headers()
        .get(CONTENT_TYPE)
        .cloned()
        .map(Ok)
        .unwrap_or_else(|| HeaderValue::from_str(&meta.mime_type))?;
    let disposition = HeaderValue::from_str(&content_disposition_header(&meta.name))?;
    let length = upstream.content_length();

    info!(id = %meta.id, name = %meta.name, "streaming download");

    let mut response = (
        StatusCode::OK,
        [(CONTENT_TYPE, content_type), (CONTENT_DISPOSITION, disposition)],
        Body::from_stream(upstream.bytes_stream()),
    )
        .into_response();
    if let Some(len) = length {
        response
            .headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from(len));
    }
    Ok(response)
}

/// GET /rename?id=&name=
pub async fn rename(
    State(state): State<DriveState>,
    session: ApiSession,
    Query(query): Query<RenameQuery>,
) -> Result<Json<DriveItem>, DriveError> {
    let file_id = required(query.id.as_deref(), "File ID")?;
    let new_name = required(query.name.as_deref(), "New name")?;
    let item = state
        .drive
        .rename(&session.access_token, file_id, new_name)
        .await?;
    info!(id = %item.id, name = %item.name, "file renamed");
    Ok(Json(item))
}

/// GET /move?id=&parentID=
pub async fn move_file(
    State(state): State<DriveState>,
    session: ApiSession,
    Query(query): Query<MoveQuery>,
) -> Result<Json<DriveItem>, DriveError> {
    let file_id = required(query.id.as_deref(), "File ID")?;
    let new_parent = required(query.parent_id.as_deref(), "Parent folder ID")?;
    let item = state
        .drive
        .move_to(&session.access_token, file_id, new_parent)
        .await?;
    info!(id = %item.id, parent = new_parent, "file moved");
    Ok(Json(item))
}

/// DELETE /delete?id=
pub async fn delete_file(
    State(state): State<DriveState>,
    session: ApiSession,
    Query(query): Query<IdQuery>,
) -> Result<StatusCode, DriveError> {
    let file_id = required(query.id.as_deref(), "File ID")?;
    state.drive.delete(&session.access_token, file_id).await?;
    info!(id = file_id, "file deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Browser-supplied type unless it is missing or generic; then guess from the name.
fn upload_mime(file_name: &str, content_type: Option<&str>) -> String {
    match content_type {
        Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => ct.to_string(),
        _ => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .to_string(),
    }
}

/// Safe `Content-Disposition` for a Drive file name.
///
/// Control characters are dropped, quotes and backslashes replaced, and
/// non-ASCII names get an ASCII fallback plus an RFC 5987 `filename*`.
fn content_disposition_header(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            c if !c.is_ascii() => '_',
            c => c,
        })
        .collect();

    if filename.is_ascii() && fallback == filename {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let clean: String = filename.chars().filter(|c| !c.is_control()).collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(&clean)
    )
}
