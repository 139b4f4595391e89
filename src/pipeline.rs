//! Upload, trigger, poll, publish.

use tracing::info;

use crate::{
    build::{BuildId, BuildOutcome, BuildRequest, poll_build_status, trigger_build},
    client::BrowserStackClient,
    config::Config,
    error::Result,
    publish::Publisher,
    upload::{UploadedArtifacts, upload_artifacts},
};

/// Hooks for reporting progress between steps.
pub trait Observer {
    fn uploading(&self) {}
    fn uploaded(&self, _artifacts: &UploadedArtifacts) {}
    fn build_started(&self, _id: &BuildId) {}
    fn build_finished(&self, _outcome: BuildOutcome) {}
}

impl Observer for () {}

/// Runs one build end to end. The first error aborts the remaining steps.
pub async fn run(
    client: &BrowserStackClient,
    config: &Config,
    publisher: &impl Publisher,
    observer: &impl Observer,
) -> Result<BuildOutcome> {
    info!(
        app = %config.app_path.display(),
        test_suite = %config.test_suite_path.display(),
        "starting run"
    );

    observer.uploading();
    let artifacts = upload_artifacts(client, &config.app_path, &config.test_suite_path).await?;
    observer.uploaded(&artifacts);

    let request = BuildRequest::new(artifacts, config.devices.clone(), config.device_logs)?;
    let build_id = trigger_build(client, &request).await?;
    observer.build_started(&build_id);

    let outcome = poll_build_status(client, &build_id, config.poll_interval).await?;
    observer.build_finished(outcome);

    publisher.publish(&config.output_key, build_id.as_str()).await?;
    Ok(outcome)
}
