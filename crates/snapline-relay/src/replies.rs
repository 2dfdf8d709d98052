// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User-facing message copy.
//!
//! Pure string builders so the dispatcher and aggregator stay free of
//! formatting concerns and the exact wording is pinned by tests.

/// How many file names a batch summary lists before truncating.
const SUMMARY_FULL_LIST_MAX: usize = 6;
/// Names shown from each end of a truncated list.
const SUMMARY_EDGE_COUNT: usize = 3;

/// Guidance for a sender with no account yet, with a pre-filled signup link.
pub fn link_account(frontend_url: &str, line_user_id: &str) -> String {
    format!(
        "Welcome! To save your photos to Google Drive, link your account first:\n\
         {frontend_url}?line_user_id={line_user_id}"
    )
}

/// Guidance when the account exists but Google Drive was never connected.
pub fn connect_google(frontend_url: &str) -> String {
    format!(
        "Your account isn't connected to Google Drive yet. \
         Connect it here to start uploading:\n{frontend_url}"
    )
}

/// Guidance when a previously working Google authorization was revoked.
pub fn reauthorize(frontend_url: &str) -> String {
    format!(
        "Your Google Drive connection has expired or was revoked. \
         Please sign in again to continue uploading:\n{frontend_url}"
    )
}

/// Guidance when no destination folder is selected.
pub fn choose_folder(frontend_url: &str) -> String {
    format!(
        "You haven't picked a destination folder yet. \
         Choose one here before sending photos:\n{frontend_url}"
    )
}

/// Notice that the bound folder no longer exists on Drive.
pub fn folder_missing(frontend_url: &str) -> String {
    format!(
        "Your destination folder was deleted or is no longer accessible. \
         Please choose a new folder:\n{frontend_url}"
    )
}

/// Notice that the Drive permission grant is insufficient.
pub fn permission_denied(frontend_url: &str) -> String {
    format!(
        "Snapline no longer has permission to write to your Google Drive. \
         Please reconnect and grant Drive access:\n{frontend_url}"
    )
}

/// Rejection when the upload quota is exhausted.
pub fn quota_exhausted(used: i64, limit: i64) -> String {
    format!(
        "Upload limit reached: {used} of {limit} photos used. \
         Upgrade your package to keep uploading."
    )
}

/// Acknowledgement sent once per batch, on the first upload of a session.
pub fn batch_started() -> String {
    "Got it! Uploading your photos to Google Drive. \
     I'll send a summary once you're done sending."
        .to_string()
}

/// Notice that an upload failed and was queued for an automatic retry.
pub fn upload_queued() -> String {
    "That photo didn't upload on the first try. \
     I've queued it and will retry automatically in a moment."
        .to_string()
}

/// Generic failure reply when the image never reached the upload stage.
pub fn upload_failed() -> String {
    "Sorry, something went wrong handling that photo. Please try sending it again.".to_string()
}

/// Status reply for the `status` keyword.
///
/// The last line mirrors the binding state so a user whose uploads would
/// be refused sees why, not a folder they cannot reach.
pub fn status(used: i64, limit: i64, connected: bool, folder_name: Option<&str>) -> String {
    let remaining = (limit - used).max(0);
    let binding = if !connected {
        "Google Drive: not connected. Link it to start uploading.".to_string()
    } else {
        match folder_name {
            Some(name) => format!("Destination folder: {name}"),
            None => "Destination folder: not selected yet".to_string(),
        }
    };
    format!(
        "Snapline status\n\
         Photos uploaded: {used} / {limit} ({remaining} remaining)\n\
         {binding}"
    )
}

/// Web link to a Drive folder, or to My Drive when no folder is bound.
pub fn folder_link(folder_id: Option<&str>) -> String {
    match folder_id {
        Some(id) => format!("https://drive.google.com/drive/folders/{id}"),
        None => "https://drive.google.com/drive/my-drive".to_string(),
    }
}

/// Human-readable session duration, e.g. `45s` or `4m 10s`.
fn format_elapsed(secs: u64) -> String {
    if secs < 60 {
        format!("{secs}s")
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// The end-of-batch summary.
///
/// Short batches list every file. Longer ones keep the first and last
/// three names with their original numbering and elide the middle, so the
/// message stays readable for hundred-photo batches.
pub fn batch_summary(
    file_names: &[String],
    elapsed_secs: u64,
    folder_name: Option<&str>,
    folder_id: Option<&str>,
) -> String {
    let total = file_names.len();
    let folder = folder_name.unwrap_or("My Drive");

    let mut lines = Vec::new();
    lines.push(format!(
        "Upload complete! {total} photo{} saved to \"{folder}\".",
        if total == 1 { "" } else { "s" }
    ));
    lines.push(format!("Total time: {}", format_elapsed(elapsed_secs)));
    lines.push(String::new());

    if total <= SUMMARY_FULL_LIST_MAX {
        for (i, name) in file_names.iter().enumerate() {
            lines.push(format!("{}. {name}", i + 1));
        }
    } else {
        for (i, name) in file_names.iter().take(SUMMARY_EDGE_COUNT).enumerate() {
            lines.push(format!("{}. {name}", i + 1));
        }
        lines.push(format!(
            "... and {} more files",
            total - 2 * SUMMARY_EDGE_COUNT
        ));
        for (i, name) in file_names
            .iter()
            .enumerate()
            .skip(total - SUMMARY_EDGE_COUNT)
        {
            lines.push(format!("{}. {name}", i + 1));
        }
    }

    lines.push(String::new());
    lines.push(format!("View them here:\n{}", folder_link(folder_id)));
    lines.join("\n")
}
