//! Shared state handed to every handler.

use std::path::PathBuf;
use std::sync::Arc;

use tally_auth::{LinkSigner, SharedSecret};
use tally_infra::jobs::{InMemoryJobRegistry, JobExecutor, JobExecutorConfig};

use crate::config::AppConfig;

pub struct AppServices {
    pub executor: JobExecutor<InMemoryJobRegistry>,
    pub signer: LinkSigner,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub api_key: Option<SharedSecret>,
}

pub fn build_services(config: &AppConfig) -> AppServices {
    let signer = LinkSigner::from_secret(config.download_secret.as_deref());
    if !signer.is_signing() {
        tracing::warn!("DOWNLOAD_SECRET not set; download links are issued unsigned");
    }

    let executor_config = JobExecutorConfig::default()
        .with_output_dir(config.output_dir.clone())
        .with_link_ttl(config.link_ttl_secs)
        .with_header_policy(config.header_policy)
        .with_name("csv-jobs");
    let executor = JobExecutor::new(InMemoryJobRegistry::arc(), signer.clone(), executor_config);

    AppServices {
        executor,
        signer,
        upload_dir: config.upload_dir.clone(),
        output_dir: config.output_dir.clone(),
        api_key: config.api_key.clone(),
    }
}

pub type SharedServices = Arc<AppServices>;
