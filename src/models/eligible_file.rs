use serde::{Deserialize, Deserializer, Serialize};

/// A file the metadata store has marked as due for deletion.
///
/// Only `file_id` is used to drive deletion; the remaining fields are kept
/// for logging, so they accept `null` and timestamps stay as the store
/// rendered them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibleFile {
    /// Unique identifier understood by the deletion executor
    pub file_id: String,
    /// Original file name
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_name: String,
    /// MIME type reported at upload
    #[serde(default, deserialize_with = "null_as_default")]
    pub mime_type: String,
    /// Size in bytes
    #[serde(default, deserialize_with = "null_as_default")]
    pub size: u64,
    #[serde(default)]
    pub description: Option<String>,
    /// Owning user, if the upload was authenticated
    #[serde(default)]
    pub user_id: Option<String>,
    /// Storage server holding the file data
    #[serde(default, deserialize_with = "null_as_default")]
    pub server_id: String,
    #[serde(default)]
    pub uploaded_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub download_count: u64,
    #[serde(default)]
    pub last_access: Option<String>,
    /// Scheduled deletion time, if any
    #[serde(default)]
    pub delete_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_temporary: bool,
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl EligibleFile {
    /// Create a record carrying only an identifier.
    pub fn with_id(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            file_name: String::new(),
            mime_type: String::new(),
            size: 0,
            description: None,
            user_id: None,
            server_id: String::new(),
            uploaded_at: None,
            download_count: 0,
            last_access: None,
            delete_at: None,
            is_temporary: false,
        }
    }
}
