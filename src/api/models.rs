use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One manifest entry: the download URLs for a disk image pair.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManifestEntry {
    #[serde(rename = "image")]
    pub image_url: String,
    #[serde(rename = "signature")]
    pub signature_url: String,
}

/// The published manifest: OS name -> OS version -> entry.
pub type DiskImageManifest = HashMap<String, HashMap<String, ManifestEntry>>;

/// Configuration for the manifest client. The fallback templates take
/// `{os}` and `{version}` placeholders and produce the best-effort links
/// used when the manifest cannot be fetched.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub manifest_url: String,
    pub image_fallback_template: String,
    pub signature_fallback_template: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            manifest_url:
                "https://raw.githubusercontent.com/devdisk-mirror/manifest/main/DeveloperDiskImages.json"
                    .to_string(),
            image_fallback_template:
                "https://github.com/mspvirajpatel/Xcode_Developer_Disk_Images/releases/download/{version}/DeveloperDiskImage.dmg"
                    .to_string(),
            signature_fallback_template:
                "https://github.com/mspvirajpatel/Xcode_Developer_Disk_Images/releases/download/{version}/DeveloperDiskImage.dmg.signature"
                    .to_string(),
        }
    }
}
