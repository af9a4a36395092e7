//! Server-rendered pages. Markup only; styling and behaviour live in `static/`.

use crate::types::drive::DriveItem;
use std::fmt::Write;

const BRAND: &str = "SecureDrive";

/// Escape text for HTML element content and double-quoted attributes.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape a value that will sit inside a query string of an attribute.
fn query_value(raw: &str) -> String {
    escape_html(&urlencoding::encode(raw))
}

fn folder_href(folder_id: &str) -> String {
    format!("/folder?id={}", query_value(folder_id))
}

/// Page shell. `folder_id` marks a folder view and enables the lock buttons.
fn layout(title: &str, head_extra: &str, folder_id: Option<&str>, content: &str) -> String {
    let (body_attrs, nav_end) = match folder_id {
        Some(id) => (
            format!(r#" data-folder-id="{}""#, escape_html(id)),
            r#"<div class="end"><button class="btn" id="setPasswordBtn">set password</button><button class="btn" id="removePasswordBtn">remove password</button></div>"#,
        ),
        None => (String::new(), ""),
    };
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<link rel="stylesheet" href="/static/styles.css">
<script src="/static/scripts.js" defer></script>
{head_extra}
</head>
<body{body_attrs}>
<div class="navbar"><div class="start"><a href="/" class="brand">{BRAND}</a></div>{nav_end}</div>
{content}
</body>
</html>
"#,
        title = escape_html(title),
    )
}

/// Message page that bounces to `target` after a second.
fn notice_page(title: &str, heading: &str, target: &str) -> String {
    let head = format!(
        r#"<meta http-equiv="refresh" content="1;url={}">"#,
        escape_html(target)
    );
    let content = format!(
        r#"<div class="container2"><h1>{}</h1></div>"#,
        escape_html(heading)
    );
    layout(title, &head, None, &content)
}

/// Folder view: sub-folders first, then files. Shortcuts are not shown.
pub fn listing_page(items: &[DriveItem], folder_id: Option<&str>) -> String {
    let current = folder_id.unwrap_or("");

    let mut folders = String::new();
    for item in items.iter().filter(|i| i.is_folder()) {
        let _ = writeln!(
            folders,
            r#"<li><a href="{}">{}</a></li>"#,
            folder_href(&item.id),
            escape_html(&item.name)
        );
    }

    let mut files = String::new();
    for item in items.iter().filter(|i| !i.is_folder() && !i.is_shortcut()) {
        let _ = writeln!(
            files,
            r#"<li class="list-item" data-file-id="{id_attr}"><div class="container"><div class="setFile">{name}</div><div class="list-item-action"><a class="btn-i" href="https://drive.google.com/file/d/{id_q}/view">view</a> <a class="btn-i" href="/download?id={id_q}">download</a></div></div></li>"#,
            id_attr = escape_html(&item.id),
            id_q = query_value(&item.id),
            name = escape_html(&item.name),
        );
    }

    let content = format!(
        r#"<div class="upload">
<form id="signOutForm" method="POST" action="/signout"><button class="btn-i" type="submit">sign out</button></form>
<form id="uploadForm" method="POST" action="/upload" enctype="multipart/form-data">
<input type="hidden" name="folderID" value="{current}">
<input id="fileInput" type="file" name="file">
<button type="submit"><b>SUBMIT</b></button>
</form>
</div>
<div class="main">
<div class="container1"><h1 class="title">Folders in Google Drive</h1><ul id="folderList" class="scrollable">
{folders}</ul></div>
<div class="container1"><h1 class="title">Files in Google Drive</h1><ul id="fileList" class="scrollable">
{files}</ul></div>
</div>"#,
        current = escape_html(current),
    );
    layout(BRAND, "", folder_id.filter(|id| !id.is_empty()), &content)
}

pub fn unlock_form_page(folder_id: &str) -> String {
    let content = format!(
        r#"<div class="container2"><form method="POST" action="{action}">
<label for="password"><h1>Enter password to unlock folder:</h1></label><br>
<input type="password" id="password" name="password" autofocus><br>
<input type="submit" value="Submit">
</form></div>"#,
        action = folder_href(folder_id)
    );
    layout("Unlock Folder", "", None, &content)
}

pub fn incorrect_password_page(folder_id: &str) -> String {
    notice_page("Incorrect Password", "Incorrect password", &folder_href(folder_id))
}

pub fn throttled_page(folder_id: &str) -> String {
    notice_page(
        "Too Many Attempts",
        "Too many attempts, try again in a minute",
        &folder_href(folder_id),
    )
}

/// Set-password form. When the folder is already locked the form carries
/// `data-locked` so the page script asks before overwriting.
pub fn set_password_page(folder_id: &str, is_locked: bool) -> String {
    let content = format!(
        r#"<div class="container2"><h1>Set Password</h1><br>
<form method="POST" action="/setPassword?id={id_q}" id="passwordForm" data-locked="{is_locked}" data-cancel-href="{cancel}">
<label for="password"><h1>Enter your Password:</h1></label><br>
<input type="password" id="password" name="password"><br>
<input type="submit" value="Set Password">
</form></div>"#,
        id_q = query_value(folder_id),
        cancel = folder_href(folder_id),
    );
    layout("Set Password for Folder", "", None, &content)
}

pub fn password_set_page() -> String {
    notice_page("Password Set", "Password set successfully", "/")
}

pub fn signed_out_page() -> String {
    let content = r#"<div class="container2"><h1>Signed out</h1><p><a href="/">Sign in again</a></p></div>"#;
    layout("Signed Out", "", None, content)
}
