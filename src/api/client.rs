use futures::future::BoxFuture;
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::models::{ApiConfig, DiskImageManifest, ManifestEntry};
use crate::application::{ByteStream, LinkResolver, Transport};
use crate::domain::{DiskImageAsset, DownloadLink, ResolutionError, TransferError};
use crate::utils::get_timestamp;

pub const IMAGE_FILE_NAME: &str = "DeveloperDiskImage.dmg";
pub const SIGNATURE_FILE_NAME: &str = "DeveloperDiskImage.dmg.signature";

/// Resolves the current download links for a disk image pair from the
/// published JSON manifest. Falls back to configured URL templates when the
/// manifest is unreachable, so a resolution failure never strands the run.
#[derive(Clone)]
pub struct ManifestClient {
    config: ApiConfig,
}

impl ManifestClient {
    pub fn new(config: ApiConfig) -> Self {
        Self { config }
    }

    async fn fetch_manifest(&self) -> Result<DiskImageManifest, ResolutionError> {
        let timestamp = get_timestamp();
        let url = format!("{}?t={}", self.config.manifest_url, timestamp);

        let response = Client::new()
            .get(&url)
            .send()
            .await
            .map_err(|e| ResolutionError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| ResolutionError::Request(format!("Manifest request failed: {}", e)))?;

        response
            .json::<DiskImageManifest>()
            .await
            .map_err(|e| ResolutionError::InvalidManifest(format!("JSON decode error: {}", e)))
    }

    fn links_for(entry: &ManifestEntry) -> Result<Vec<DownloadLink>, ResolutionError> {
        let parse = |raw: &str, label: &str, file_name: &str| {
            Url::parse(raw)
                .map(|url| DownloadLink {
                    label: label.to_string(),
                    url,
                    file_name: file_name.to_string(),
                })
                .map_err(|e| ResolutionError::InvalidManifest(format!("{}: {}", raw, e)))
        };
        Ok(vec![
            parse(&entry.image_url, "Developer disk image", IMAGE_FILE_NAME)?,
            parse(&entry.signature_url, "Image signature", SIGNATURE_FILE_NAME)?,
        ])
    }

    fn render_template(template: &str, asset: &DiskImageAsset) -> String {
        template
            .replace("{os}", &asset.os)
            .replace("{version}", &asset.version)
    }
}

impl LinkResolver for ManifestClient {
    fn resolve_links<'a>(
        &'a self,
        asset: &'a DiskImageAsset,
    ) -> BoxFuture<'a, Result<Vec<DownloadLink>, ResolutionError>> {
        Box::pin(async move {
            let manifest = self.fetch_manifest().await?;
            let entry = manifest
                .get(&asset.os)
                .and_then(|versions| versions.get(&asset.version))
                .ok_or_else(|| ResolutionError::MissingEntry {
                    os: asset.os.clone(),
                    version: asset.version.clone(),
                })?;
            debug!(os = %asset.os, version = %asset.version, "manifest entry found");
            Self::links_for(entry)
        })
    }

    fn fallback_links(&self, asset: &DiskImageAsset) -> Vec<DownloadLink> {
        let templates = [
            (
                &self.config.image_fallback_template,
                "Developer disk image",
                IMAGE_FILE_NAME,
            ),
            (
                &self.config.signature_fallback_template,
                "Image signature",
                SIGNATURE_FILE_NAME,
            ),
        ];
        templates
            .iter()
            .filter_map(|(template, label, file_name)| {
                let rendered = Self::render_template(template, asset);
                Url::parse(&rendered).ok().map(|url| DownloadLink {
                    label: label.to_string(),
                    url,
                    file_name: file_name.to_string(),
                })
            })
            .collect()
    }
}

/// Streaming HTTP transport for the actual byte transfer, one request per
/// unit. Returns the content length when the server reports one.
#[derive(Clone, Default)]
pub struct HttpTransport;

impl Transport for HttpTransport {
    fn open<'a>(
        &'a self,
        url: &'a Url,
    ) -> BoxFuture<'a, Result<(Option<u64>, ByteStream), TransferError>> {
        Box::pin(async move {
            let response = Client::new()
                .get(url.clone())
                .send()
                .await
                .map_err(|e| TransferError::Request(e.to_string()))?
                .error_for_status()
                .map_err(|e| TransferError::Request(format!("Download request failed: {}", e)))?;

            let total_size = response.content_length();
            let stream = response
                .bytes_stream()
                .map_err(|e| TransferError::Request(e.to_string()))
                .boxed();

            Ok((total_size, stream))
        })
    }
}
