//! multipart/form-data decoding for uploads
//!
//! Bodies are already collected and size-capped by the server, so the whole
//! payload is handed to `multer` as a single chunk.

use bytes::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::Request;
use std::collections::HashMap;
use std::convert::Infallible;

use crate::services::UploadedFile;
use crate::types::{PortalError, Result};

/// Decoded form: text fields and file parts by field name
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl FormData {
    /// Trimmed text value, `None` when absent or blank
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Required text value
    pub fn require(&self, name: &str) -> Result<&str> {
        self.text(name)
            .ok_or_else(|| PortalError::Validation(format!("Field '{}' is required", name)))
    }

    /// Take a file part out of the form
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

/// Decode a multipart request body
pub async fn parse_form(req: &Request<Bytes>) -> Result<FormData> {
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| PortalError::Validation("Expected a multipart/form-data body".into()))?;
    let boundary = multer::parse_boundary(content_type)
        .map_err(|_| PortalError::Validation("Expected a multipart/form-data body".into()))?;

    let body = req.body().clone();
    let stream = futures_util::stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut form = FormData::default();
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(|m| m.to_string());
        let bytes = field.bytes().await.map_err(malformed)?;

        match file_name {
            // A zero-byte file part counts as no file
            Some(_) if bytes.is_empty() => {}
            Some(file_name) => {
                form.files.insert(
                    name,
                    UploadedFile {
                        file_name: Some(file_name),
                        content_type,
                        bytes,
                    },
                );
            }
            None => {
                let value = String::from_utf8(bytes.to_vec()).map_err(|_| {
                    PortalError::Validation(format!("Field '{}' is not valid UTF-8", name))
                })?;
                form.fields.insert(name, value);
            }
        }
    }

    Ok(form)
}

fn malformed(e: multer::Error) -> PortalError {
    PortalError::Validation(format!("Malformed multipart body: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "X-GRIEVANCE-BOUNDARY";

    fn request(body: &str) -> Request<Bytes> {
        let mut req = Request::new(Bytes::from(body.replace('\n', "\r\n")));
        req.headers_mut().insert(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY).parse().unwrap(),
        );
        req
    }

    #[tokio::test]
    async fn test_fields_and_file() {
        let req = request(
            "--X-GRIEVANCE-BOUNDARY
Content-Disposition: form-data; name=\"nstatus\"

resolved
--X-GRIEVANCE-BOUNDARY
Content-Disposition: form-data; name=\"notes\"

  fixed the pipe
--X-GRIEVANCE-BOUNDARY
Content-Disposition: form-data; name=\"file\"; filename=\"after.png\"
Content-Type: image/png

PNGDATA
--X-GRIEVANCE-BOUNDARY--
",
        );

        let mut form = parse_form(&req).await.unwrap();
        assert_eq!(form.require("nstatus").unwrap(), "resolved");
        assert_eq!(form.text("notes"), Some("fixed the pipe"));
        let file = form.take_file("file").unwrap();
        assert_eq!(file.file_name.as_deref(), Some("after.png"));
        assert_eq!(file.content_type.as_deref(), Some("image/png"));
        assert_eq!(&file.bytes[..], b"PNGDATA");
        assert!(form.take_file("file").is_none());
    }

    #[tokio::test]
    async fn test_empty_file_input_is_absent() {
        let req = request(
            "--X-GRIEVANCE-BOUNDARY
Content-Disposition: form-data; name=\"file\"; filename=\"\"
Content-Type: application/octet-stream


--X-GRIEVANCE-BOUNDARY--
",
        );
        let mut form = parse_form(&req).await.unwrap();
        assert!(form.take_file("file").is_none());
        assert!(matches!(form.require("notes"), Err(PortalError::Validation(_))));
    }

    #[tokio::test]
    async fn test_named_zero_byte_file_is_absent() {
        let req = request(
            "--X-GRIEVANCE-BOUNDARY
Content-Disposition: form-data; name=\"nstatus\"

resolved
--X-GRIEVANCE-BOUNDARY
Content-Disposition: form-data; name=\"file\"; filename=\"after.jpg\"
Content-Type: image/jpeg


--X-GRIEVANCE-BOUNDARY--
",
        );
        let mut form = parse_form(&req).await.unwrap();
        assert_eq!(form.text("nstatus"), Some("resolved"));
        assert!(form.take_file("file").is_none());
    }

    #[tokio::test]
    async fn test_non_multipart_body_rejected() {
        let mut req = Request::new(Bytes::from_static(b"{}"));
        req.headers_mut()
            .insert(CONTENT_TYPE, "application/json".parse().unwrap());
        assert!(matches!(parse_form(&req).await, Err(PortalError::Validation(_))));
    }
}
