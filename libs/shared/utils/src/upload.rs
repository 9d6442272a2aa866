use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

/// File sent by a form as a base64 string, optionally as a full
/// `data:<mime>;base64,<payload>` URL.
#[derive(Debug, Clone, Deserialize)]
pub struct FileUpload {
    pub file_data: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFile {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub extension: &'static str,
}

impl DecodedFile {
    /// `<prefix>/<uuid>.<ext>`, unique per upload.
    pub fn object_path(&self, prefix: &str) -> String {
        format!("{}/{}.{}", prefix.trim_end_matches('/'), Uuid::new_v4(), self.extension)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("Uploaded file is empty")]
    Empty,
    #[error("Uploaded file is not valid base64")]
    Encoding,
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
}

const ALLOWED_TYPES: [(&str, &str); 4] = [
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
    ("application/pdf", "pdf"),
];

pub fn decode_upload(upload: &FileUpload) -> Result<DecodedFile, UploadError> {
    let (header, payload) = match upload.file_data.split_once(',') {
        Some((header, payload)) if header.starts_with("data:") => (Some(header), payload),
        _ => (None, upload.file_data.as_str()),
    };

    let content_type = header
        .and_then(|h| h.trim_start_matches("data:").split(';').next())
        .filter(|mime| !mime.is_empty())
        .map(str::to_string)
        .or_else(|| upload.content_type.clone())
        .unwrap_or_else(|| "image/png".to_string())
        .to_ascii_lowercase();

    let extension = ALLOWED_TYPES
        .iter()
        .find(|(mime, _)| *mime == content_type)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| UploadError::UnsupportedType(content_type.clone()))?;

    let bytes = BASE64.decode(payload.trim()).map_err(|_| UploadError::Encoding)?;
    if bytes.is_empty() {
        return Err(UploadError::Empty);
    }

    Ok(DecodedFile {
        bytes,
        content_type,
        extension,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn upload(data: &str, content_type: Option<&str>) -> FileUpload {
        FileUpload {
            file_data: data.to_string(),
            content_type: content_type.map(str::to_string),
        }
    }

    #[test]
    fn data_url_header_decides_the_type() {
        let decoded = decode_upload(&upload("data:image/jpeg;base64,aGVsbG8=", None)).unwrap();
        assert_eq!(decoded.bytes, b"hello");
        assert_eq!(decoded.content_type, "image/jpeg");
        assert_eq!(decoded.extension, "jpg");
        assert!(decoded.object_path("licenses/7/").starts_with("licenses/7/"));
        assert!(decoded.object_path("licenses/7").ends_with(".jpg"));
    }

    #[test]
    fn bare_payload_uses_declared_type() {
        let decoded = decode_upload(&upload("aGVsbG8=", Some("application/pdf"))).unwrap();
        assert_eq!(decoded.extension, "pdf");
    }

    #[test]
    fn rejects_bad_input() {
        assert_matches!(decode_upload(&upload("%%%", None)), Err(UploadError::Encoding));
        assert_matches!(decode_upload(&upload("", None)), Err(UploadError::Empty));
        assert_matches!(
            decode_upload(&upload("data:text/html;base64,aGVsbG8=", None)),
            Err(UploadError::UnsupportedType(_))
        );
    }
}
