//! Upload an iOS app and its XCUITest package to BrowserStack App Automate,
//! start a build and wait for it to finish.

pub mod build;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod multipart;
pub mod pipeline;
pub mod publish;
pub mod upload;

pub use build::{BuildId, BuildOutcome, BuildRequest, BuildStatus, poll_build_status, trigger_build};
pub use client::BrowserStackClient;
pub use config::{Config, Credentials};
pub use error::{Error, Result};
pub use multipart::MultipartUpload;
pub use publish::{EnvmanPublisher, Publisher};
pub use upload::{ArtifactKind, UploadedArtifacts, upload_artifacts};
