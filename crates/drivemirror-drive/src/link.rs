//! Shared-link folder-id extraction
//!
//! Users link a folder by pasting a Drive share URL. Two shapes are
//! accepted: the path form `https://drive.google.com/drive/folders/<id>`
//! and the legacy query form `...?id=<id>`.

use url::Url;

use drivemirror_core::domain::ExternalId;

/// Extracts the folder id from a Drive share link
///
/// Returns `None` for unparseable URLs and for URLs carrying neither a
/// `/folders/<id>` path segment nor an `id` query parameter.
pub fn extract_folder_id(link: &str) -> Option<ExternalId> {
    let parsed = Url::parse(link).ok()?;

    // Path form: /drive/folders/<id> (possibly followed by more segments)
    if let Some(mut segments) = parsed.path_segments() {
        while let Some(segment) = segments.next() {
            if segment == "folders" {
                if let Some(id) = segments.next() {
                    if let Ok(external_id) = ExternalId::new(id.to_string()) {
                        return Some(external_id);
                    }
                }
                break;
            }
        }
    }

    // Query form: ?id=<id>
    parsed
        .query_pairs()
        .find(|(key, _)| key == "id")
        .and_then(|(_, value)| ExternalId::new(value.into_owned()).ok())
}
