use crate::config::GoogleConfig;
use crate::error::DriveError;
use crate::types::drive::{
    DriveFileList, DriveItem, DriveItemPatch, ITEM_FIELDS, ROOT_FOLDER,
};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, warn};

const PAGE_SIZE: &str = "1000";

/// Build the shared outbound HTTP client.
pub fn build_http_client(cfg: &GoogleConfig) -> Result<reqwest::Client, DriveError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("securedrive/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        // OAuth token endpoints must not be followed through redirects.
        .redirect(reqwest::redirect::Policy::none());
    if let Some(proxy_url) = cfg.proxy.as_ref() {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
    }
    Ok(builder.build()?)
}

/// Stateless Drive v3 calls; every call carries the caller's access token.
#[derive(Clone)]
pub struct DriveApi {
    client: reqwest::Client,
    api_base: String,
    upload_base: String,
}

impl DriveApi {
    pub fn new(client: reqwest::Client, cfg: &GoogleConfig) -> Self {
        Self {
            client,
            api_base: cfg.drive_api_base.as_str().trim_end_matches('/').to_string(),
            upload_base: cfg
                .drive_upload_base
                .as_str()
                .trim_end_matches('/')
                .to_string(),
        }
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.api_base)
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/files/{}", self.api_base, urlencoding::encode(file_id))
    }

    /// All non-trashed children of `parent` (root when `None`), every page.
    pub async fn list_children(
        &self,
        token: &str,
        parent: Option<&str>,
    ) -> Result<Vec<DriveItem>, DriveError> {
        let q = children_query(parent.unwrap_or(ROOT_FOLDER));
        let fields = format!("nextPageToken,files({ITEM_FIELDS})");
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> = vec![
                ("q", q.as_str()),
                ("fields", fields.as_str()),
                ("pageSize", PAGE_SIZE),
                ("orderBy", "folder,name"),
            ];
            if let Some(tok) = page_token.as_deref() {
                query.push(("pageToken", tok));
            }

            let resp = self
                .client
                .get(self.files_url())
                .bearer_auth(token)
                .query(&query)
                .send()
                .await?;
            let page: DriveFileList = check_status(resp).await?.json().await?;
            items.extend(page.files);

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        debug!(parent = parent.unwrap_or(ROOT_FOLDER), count = items.len(), "listed folder");
        Ok(items)
    }

    pub async fn metadata(&self, token: &str, file_id: &str) -> Result<DriveItem, DriveError> {
        let resp = self
            .client
            .get(self.file_url(file_id))
            .bearer_auth(token)
            .query(&[("fields", ITEM_FIELDS)])
            .send()
            .await?;
        Ok(check_status(resp).await?.json().await?)
    }

    /// Start a content download; the body is left unread for streaming.
    pub async fn download(&self, token: &str, file_id: &str) -> Result<reqwest::Response, DriveError> {
        let resp = self
            .client
            .get(self.file_url(file_id))
            .bearer_auth(token)
            .query(&[("alt", "media")])
            .send()
            .await?;
        check_status(resp).await
    }

    /// Multipart/related upload of metadata plus content in one request.
    pub async fn upload(
        &self,
        token: &str,
        name: &str,
        mime_type: &str,
        data: &[u8],
        parent: Option<&str>,
    ) -> Result<DriveItem, DriveError> {
        let metadata = DriveItemPatch {
            name: Some(name.to_string()),
            mime_type: Some(mime_type.to_string()),
            parents: parent.map(|p| vec![p.to_string()]).unwrap_or_default(),
        };
        let metadata_json = serde_json::to_vec(&metadata)?;
        let boundary = multipart_boundary();
        let body = multipart_related_body(&boundary, &metadata_json, mime_type, data);

        let resp = self
            .client
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(token)
            .query(&[("uploadType", "multipart"), ("fields", ITEM_FIELDS)])
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await?;
        Ok(check_status(resp).await?.json().await?)
    }

    pub async fn rename(
        &self,
        token: &str,
        file_id: &str,
        new_name: &str,
    ) -> Result<DriveItem, DriveError> {
        let patch = DriveItemPatch {
            name: Some(new_name.to_string()),
            ..Default::default()
        };
        let resp = self
            .client
            .patch(self.file_url(file_id))
            .bearer_auth(token)
            .query(&[("fields", ITEM_FIELDS)])
            .json(&patch)
            .send()
            .await?;
        Ok(check_status(resp).await?.json().await?)
    }

    /// Re-parent a file under `new_parent`, detaching it from its current parents.
    pub async fn move_to(
        &self,
        token: &str,
        file_id: &str,
        new_parent: &str,
    ) -> Result<DriveItem, DriveError> {
        let current = self.metadata(token, file_id).await?;
        let remove_parents = current.parents.join(",");

        let mut query = vec![("addParents", new_parent), ("fields", ITEM_FIELDS)];
        if !remove_parents.is_empty() {
            query.push(("removeParents", remove_parents.as_str()));
        }
        let resp = self
            .client
            .patch(self.file_url(file_id))
            .bearer_auth(token)
            .query(&query)
            .json(&DriveItemPatch::default())
            .send()
            .await?;
        Ok(check_status(resp).await?.json().await?)
    }

    pub async fn delete(&self, token: &str, file_id: &str) -> Result<(), DriveError> {
        let resp = self
            .client
            .delete(self.file_url(file_id))
            .bearer_auth(token)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }
}

/// Drive query selecting live children of `parent`.
fn children_query(parent: &str) -> String {
    let escaped = parent.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}' in parents and trashed = false")
}

fn multipart_boundary() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("securedrive_{nanos:x}")
}

fn multipart_related_body(boundary: &str, metadata_json: &[u8], mime_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + metadata_json.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata_json);
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {mime_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--").as_bytes());
    body
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, DriveError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = resp.url().path().to_string();
    let body = resp.text().await.unwrap_or_default();
    warn!(%status, path = %url, body = %body, "Drive API error");
    Err(DriveError::UpstreamStatus(status))
}
