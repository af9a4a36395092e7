use serde::{Deserialize, Serialize};

pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
pub const SHORTCUT_MIME: &str = "application/vnd.google-apps.shortcut";

/// Folder id Drive uses for "My Drive".
pub const ROOT_FOLDER: &str = "root";

/// Fields requested for every item.
pub const ITEM_FIELDS: &str = "id,name,mimeType,parents,size";

/// A file or folder as returned by Drive v3.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl DriveItem {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME
    }

    pub fn is_shortcut(&self) -> bool {
        self.mime_type == SHORTCUT_MIME
    }
}

/// One page of `files.list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFileList {
    #[serde(default)]
    pub files: Vec<DriveItem>,
    pub next_page_token: Option<String>,
}

/// Metadata part of a multipart upload / body of a PATCH.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

/// Map the several spellings of "top level" the UI sends to `None`.
pub fn normalize_parent(raw: Option<&str>) -> Option<&str> {
    match raw.map(str::trim) {
        None | Some("") | Some("._.") | Some(ROOT_FOLDER) => None,
        Some(id) => Some(id),
    }
}
