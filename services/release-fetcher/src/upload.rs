//!
//! src/upload.rs
//!
//! Posts one request to the media catalog as a multipart form with
//! bearer authorization
//!

use std::path::Path;

use reqwest::{Client, multipart};
use tracing::{debug, info};
use url::Url;

use crate::config::{HttpConfig, IdentityConfig, MediaConfig};
use crate::errors::IngestError;
use crate::fetch::plain_client;
use crate::types::Request;

/// Form part carrying the cover art
pub const IMAGE_FIELD: &str = "image";

/// Counters and type tag every new media entry starts with
const FIXED_FIELDS: [(&str, &str); 5] = [
    ("average", "0"),
    ("wants", "0"),
    ("ratings", "0"),
    ("doings", "0"),
    ("type", "Music"),
];

/// Scalar form fields of `request`, in wire order
pub fn form_fields(request: &Request) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("title", request.title.clone()),
        ("genre", request.genre.clone()),
        ("additional", request.additional.clone()),
        ("description", request.description.clone()),
        ("releaseDate", request.release_date.clone()),
        ("imageUrl", request.image_url.clone()),
    ];
    fields.extend(FIXED_FIELDS.iter().map(|(k, v)| (*k, v.to_string())));
    fields.push(("authorId", request.author_id.to_string()));
    fields
}

#[derive(Clone, Debug)]
pub struct MediaClient {
    http: Client,
    upload_url: Url,
    fs_timeout: std::time::Duration
}

impl MediaClient {
    pub fn new(
        http_cfg: &HttpConfig,
        identity: &IdentityConfig,
        cfg: &MediaConfig,
        fs_timeout: std::time::Duration
    ) -> Result<Self, IngestError> {
        let http = plain_client(http_cfg, identity)?;
        Ok( Self { http, upload_url: cfg.upload_url.clone(), fs_timeout } )
    }

    async fn image_part(&self, image: &str) -> Result<multipart::Part, IngestError> {
        let path = Path::new(image);
        let bytes = tokio::time::timeout(self.fs_timeout, tokio::fs::read(path))
            .await
            .map_err(|_| IngestError::Filesystem(
                format!("read {}: timed out after {:?}", path.display(), self.fs_timeout)
            ))?
            .map_err(|e| IngestError::Filesystem(format!("read {}: {e}", path.display())))?;

        let file_name = path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| image.to_string());

        multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/jpeg")
            .map_err(|e| IngestError::Config(format!("image mime: {e}")))
    }

    pub async fn form(&self, request: &Request) -> Result<multipart::Form, IngestError> {
        let mut form = multipart::Form::new();
        if !request.image.is_empty() {
            form = form.part(IMAGE_FIELD, self.image_part(&request.image).await?);
        }
        for (name, value) in form_fields(request) {
            form = form.text(name, value);
        }
        Ok(form)
    }

    /// POST {upload_url}. 401/403 come back as `Auth`
    pub async fn upload(&self, request: &Request, bearer: &str) -> Result<(), IngestError> {
        let form = self.form(request).await?;
        debug!(title = %request.title, with_image = !request.image.is_empty(), "upload.send");

        let response = self.http
            .post(self.upload_url.clone())
            .bearer_auth(bearer)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::from_media_status(status, self.upload_url.as_str()));
        }

        info!(title = %request.title, status = status.as_u16(), "upload.done");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FailureKind;
    use crate::test_utils::{StubServer, COVER_BYTES, GOOD_TOKEN};
    use tempfile::TempDir;

    fn request(image: &str) -> Request {
        Request {
            title: "Daydream Nation".to_string(),
            genre: "Alternative Rock".to_string(),
            additional: "Teen Age Riot\nSilver Rocket".to_string(),
            description: "Classic.".to_string(),
            release_date: "1988-01-01".to_string(),
            image_url: "placeHolder".to_string(),
            author_id: 12,
            image: image.to_string()
        }
    }

    fn media_for(server: &StubServer, path: &str) -> MediaClient {
        let cfg = MediaConfig { upload_url: Url::parse(&server.url(path)).unwrap() };
        MediaClient::new(
            &HttpConfig::default(),
            &IdentityConfig::default(),
            &cfg,
            std::time::Duration::from_secs(5)
        ).unwrap()
    }

    #[test]
    fn form_fields_include_fixed_counters() {
        let fields = form_fields(&request(""));
        let names: Vec<&str> = fields.iter().map(|(k, _)| *k).collect();
        assert_eq!(names, vec![
            "title", "genre", "additional", "description", "releaseDate", "imageUrl",
            "average", "wants", "ratings", "doings", "type", "authorId"
        ]);
        assert!(fields.contains(&("authorId", "12".to_string())));
        assert!(fields.contains(&("type", "Music".to_string())));
    }

    #[tokio::test]
    async fn upload_sends_fields_image_and_bearer() {
        let server = StubServer::start().await;
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("Daydream Nation.jpeg");
        std::fs::write(&image, COVER_BYTES).unwrap();

        media_for(&server, "medias")
            .upload(&request(&image.to_string_lossy()), GOOD_TOKEN)
            .await
            .unwrap();

        let uploads = server.uploads();
        assert_eq!(uploads.len(), 1);
        let form = &uploads[0];
        assert_eq!(form.fields["title"], "Daydream Nation");
        assert_eq!(form.fields["additional"], "Teen Age Riot\nSilver Rocket");
        assert_eq!(form.fields["releaseDate"], "1988-01-01");
        assert_eq!(form.fields["authorId"], "12");
        assert_eq!(form.image_name.as_deref(), Some("Daydream Nation.jpeg"));
        assert_eq!(form.image.as_deref(), Some(COVER_BYTES));
    }

    #[tokio::test]
    async fn upload_without_image_has_no_file_part() {
        let server = StubServer::start().await;
        media_for(&server, "medias").upload(&request(""), GOOD_TOKEN).await.unwrap();

        let uploads = server.uploads();
        assert_eq!(uploads.len(), 1);
        assert!(uploads[0].image.is_none());
    }

    #[tokio::test]
    async fn rejected_token_is_an_auth_error() {
        let server = StubServer::start().await;
        let err = media_for(&server, "medias")
            .upload(&request(""), "expired")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Auth { status: 401 }));
        assert!(server.uploads().is_empty());
    }

    #[tokio::test]
    async fn other_statuses_are_upstream_errors() {
        let server = StubServer::start().await;
        let err = media_for(&server, "medias-broken")
            .upload(&request(""), GOOD_TOKEN)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::UpstreamStatus { status: 500, .. }));
    }

    #[tokio::test]
    async fn unreadable_image_fails_before_sending() {
        let server = StubServer::start().await;
        let err = media_for(&server, "medias")
            .upload(&request("/definitely/not/here.jpeg"), GOOD_TOKEN)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Filesystem);
        assert!(server.uploads().is_empty());
    }
}
