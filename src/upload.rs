//! Concurrent upload of the app binary and the XCUITest package.

use std::path::Path;

use tracing::{error, info};

use crate::{
    client::{BrowserStackClient, string_field},
    error::Result,
    multipart::MultipartUpload,
};

/// The two artifacts a build needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    App,
    TestSuite,
}

impl ArtifactKind {
    pub fn endpoint(self) -> &'static str {
        match self {
            ArtifactKind::App => "app-automate/upload",
            ArtifactKind::TestSuite => "app-automate/xcuitest/test-suite",
        }
    }

    /// Response field carrying the uploaded artifact's locator.
    pub fn url_field(self) -> &'static str {
        match self {
            ArtifactKind::App => "app_url",
            ArtifactKind::TestSuite => "test_url",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::App => "app",
            ArtifactKind::TestSuite => "test suite",
        }
    }
}

/// Locators returned for both uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedArtifacts {
    pub app_url: String,
    pub test_suite_url: String,
}

/// Encodes `path` and uploads it to the endpoint for `kind`.
pub async fn upload_artifact(
    client: &BrowserStackClient,
    kind: ArtifactKind,
    path: &Path,
) -> Result<String> {
    info!(artifact = kind.label(), path = %path.display(), "uploading");
    let upload = MultipartUpload::from_file(path).await?;
    let url = client.endpoint(kind.endpoint())?;
    let response = client.post_multipart(kind.endpoint(), upload).await?;
    let locator = string_field(&response, kind.url_field(), &url)?;
    info!(artifact = kind.label(), locator = %locator, "uploaded");
    Ok(locator)
}

/// Uploads both artifacts at the same time.
///
/// Always waits for both uploads. When both fail the app error is returned
/// and the test-suite error is only logged.
pub async fn upload_artifacts(
    client: &BrowserStackClient,
    app_path: &Path,
    test_suite_path: &Path,
) -> Result<UploadedArtifacts> {
    let (app, test_suite) = tokio::join!(
        upload_artifact(client, ArtifactKind::App, app_path),
        upload_artifact(client, ArtifactKind::TestSuite, test_suite_path),
    );

    match (app, test_suite) {
        (Ok(app_url), Ok(test_suite_url)) => Ok(UploadedArtifacts {
            app_url,
            test_suite_url,
        }),
        (Err(app_err), Err(suite_err)) => {
            error!(error = %suite_err, "test suite upload failed too");
            Err(app_err)
        }
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
    }
}
