//! The editor's side of the page service: lookup, image fetch, save, clear.
//!
//! Calls are blocking and are meant to run on a [`crate::task::Latest`] worker,
//! never on the UI thread.

use std::path::PathBuf;
use std::time::Duration;

use image::DynamicImage;
use reqwest::blocking::{Client, Response};
use serde_json::Value;

use crate::contract::{ClearRequest, ErrorResponse, SaveRequest, SaveResponse};
use crate::error::ServiceError;
use crate::record::PageRecord;

pub trait PageService: Send + Sync {
    fn load_page(&self, page_id: &str) -> Result<PageRecord, ServiceError>;

    fn load_image(&self, image_ref: &str) -> Result<DynamicImage, ServiceError>;

    /// Returns the fingerprint the store now holds.
    fn save(&self, request: &SaveRequest) -> Result<Value, ServiceError>;

    fn clear(&self, request: &ClearRequest) -> Result<(), ServiceError>;
}

pub struct HttpPageService {
    base_url: String,
    image_root: PathBuf,
    client: Client,
}

impl HttpPageService {
    pub fn new(base_url: &str, image_root: impl Into<PathBuf>, timeout: Duration) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            image_root: image_root.into(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Turn a non-2xx response into [`ServiceError::Rejected`], keeping the server's
/// own message when the body is an `{ok:false, error}` object.
fn check(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&text)
        .map(|e| e.error)
        .unwrap_or_else(|_| match text.trim() {
            "" => status.canonical_reason().unwrap_or("request failed").to_string(),
            body => body.to_string(),
        });
    Err(ServiceError::Rejected {
        status: status.as_u16(),
        message,
    })
}

fn is_remote(image_ref: &str) -> bool {
    image_ref.starts_with("http://") || image_ref.starts_with("https://")
}

impl PageService for HttpPageService {
    fn load_page(&self, page_id: &str) -> Result<PageRecord, ServiceError> {
        let response = self.client.get(self.url(&format!("/api/pages/{page_id}"))).send()?;
        Ok(check(response)?.json()?)
    }

    fn load_image(&self, image_ref: &str) -> Result<DynamicImage, ServiceError> {
        let bytes = if is_remote(image_ref) {
            check(self.client.get(image_ref).send()?)?.bytes()?.to_vec()
        } else {
            let path = self.image_root.join(image_ref.trim_start_matches('/'));
            std::fs::read(&path).map_err(|source| ServiceError::ImageRead {
                path: path.display().to_string(),
                source,
            })?
        };
        Ok(image::load_from_memory(&bytes)?)
    }

    fn save(&self, request: &SaveRequest) -> Result<Value, ServiceError> {
        // never send what the server would reject anyway
        request.validate()?;
        let response = self.client.post(self.url("/api/titleblock")).json(request).send()?;
        let body: SaveResponse = check(response)?.json()?;
        Ok(body.fingerprint)
    }

    fn clear(&self, request: &ClearRequest) -> Result<(), ServiceError> {
        request.validate()?;
        let response = self.client.delete(self.url("/api/titleblock")).json(request).send()?;
        check(response)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::TitleblockPayload;
    use assert_matches::assert_matches;
    use image::{ImageFormat, Rgba, RgbaImage};

    // Port 9 (discard) on localhost: if validation let the request through, the
    // error would be Transport, not Validation.
    fn offline() -> HttpPageService {
        HttpPageService::new("http://127.0.0.1:9/", ".", Duration::from_millis(200)).unwrap()
    }

    #[test]
    fn invalid_save_never_hits_the_network() {
        let request = SaveRequest {
            page_id: "p1".into(),
            titleblock: TitleblockPayload {
                x: 640.0,
                y: 0.1,
                width: 0.2,
                height: 0.2,
            },
            areas: Vec::new(),
        };
        assert_matches!(offline().save(&request), Err(ServiceError::Validation(_)));
        assert_matches!(
            offline().clear(&ClearRequest { page_id: String::new() }),
            Err(ServiceError::Validation(_))
        );
    }

    #[test]
    fn base_url_is_normalized() {
        assert_eq!(offline().url("/api/titleblock"), "http://127.0.0.1:9/api/titleblock");
    }

    #[test]
    fn local_image_refs_resolve_under_the_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("renders")).unwrap();
        RgbaImage::from_pixel(4, 3, Rgba([0, 0, 0, 255]))
            .save_with_format(dir.path().join("renders/p1.png"), ImageFormat::Png)
            .unwrap();

        let service = HttpPageService::new("http://127.0.0.1:9", dir.path(), Duration::from_millis(200)).unwrap();
        let img = service.load_image("/renders/p1.png").unwrap();
        assert_eq!((img.width(), img.height()), (4, 3));
        assert_matches!(service.load_image("renders/missing.png"), Err(ServiceError::ImageRead { .. }));
    }
}
