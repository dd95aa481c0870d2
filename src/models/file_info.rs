//! Metadata record describing a stored file.

use serde::{Deserialize, Serialize};

/// Descriptive attributes of a stored object, persisted as `<key>.info`.
///
/// Field names follow the wire format existing clients already speak, which is
/// why `Extension` and `Url` are capitalized. Every field has a default so a
/// partially filled registration request still deserializes.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct FileInfo {
    /// Identifier assigned by the relational mirror, if the client knows one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Logical file name.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// File extension without any further interpretation.
    #[serde(
        rename = "Extension",
        alias = "extension",
        skip_serializing_if = "String::is_empty"
    )]
    pub extension: String,

    /// External grouping key.
    pub box_key: String,

    /// Filename as it was on the uploader's machine.
    pub original_name: String,

    /// Client-side upload time, fractional seconds since the epoch.
    pub upload_datetime: f64,

    /// Identifier of the uploading user.
    pub uploaded_user_id: i64,

    /// Retrieval URL. Computed when responding, never persisted.
    #[serde(rename = "Url", alias = "url", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Server-assigned registration time, whole seconds since the epoch.
    pub created_at: i64,
}
