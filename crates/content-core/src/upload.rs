use serde_json::Value;

use crate::error::UploadError;

/// Field names the upload endpoint has used for the stored file's URL,
/// in the order they are checked.
pub const UPLOAD_URL_FIELDS: [&str; 3] = ["file_url", "url", "image_url"];

/// Extracts the uploaded image URL from a raw upload response body.
pub fn decode_upload_url(body: &str) -> Result<String, UploadError> {
    let value: Value = serde_json::from_str(body)?;
    upload_url_from_value(&value)
}

pub fn upload_url_from_value(value: &Value) -> Result<String, UploadError> {
    UPLOAD_URL_FIELDS
        .iter()
        .filter_map(|field| value.get(field).and_then(Value::as_str))
        .map(str::trim)
        .find(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or(UploadError::MissingUrl)
}
