use std::collections::HashSet;
use std::path::PathBuf;

use futures::future::BoxFuture;
use tracing::debug;

use super::unit::DownloadUnit;
use super::Preparer;
use crate::domain::{DiskImageAsset, DownloadLink, PreparationError};
use crate::utils::sanitize_filename;

/// Prepares `<root>/<os>/<version>/` as the destination directory and turns
/// resolved links into download units. Validation happens here, before any
/// bytes move: the directory must be creatable and writable, and no two
/// links may collide on the same destination file.
pub struct DiskPreparer {
    root: PathBuf,
}

impl DiskPreparer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn with_default_root() -> Self {
        Self::new(crate::utils::support_directory())
    }

    async fn validate_writable(dir: &PathBuf) -> Result<(), PreparationError> {
        let probe = dir.join(".write-probe");
        tokio::fs::write(&probe, b"")
            .await
            .map_err(|e| PreparationError::Destination(format!("{}: {}", dir.display(), e)))?;
        let _ = tokio::fs::remove_file(&probe).await;
        Ok(())
    }
}

impl Preparer for DiskPreparer {
    fn prepare<'a>(
        &'a self,
        asset: &'a DiskImageAsset,
        links: &'a [DownloadLink],
    ) -> BoxFuture<'a, Result<Vec<DownloadUnit>, PreparationError>> {
        Box::pin(async move {
            if links.is_empty() {
                return Err(PreparationError::NoUnits);
            }

            let dir = self.root.join(&asset.os).join(&asset.version);
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| PreparationError::Destination(format!("{}: {}", dir.display(), e)))?;
            Self::validate_writable(&dir).await?;

            let mut seen = HashSet::new();
            let mut units = Vec::with_capacity(links.len());
            for (id, link) in links.iter().enumerate() {
                let destination = dir.join(sanitize_filename(&link.file_name));
                if !seen.insert(destination.clone()) {
                    return Err(PreparationError::DuplicateDestination(
                        destination.display().to_string(),
                    ));
                }
                units.push(DownloadUnit::new(
                    id,
                    link.label.clone(),
                    link.url.clone(),
                    destination,
                ));
            }
            debug!(dir = %dir.display(), units = units.len(), "destinations prepared");
            Ok(units)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::link;

    fn asset() -> DiskImageAsset {
        DiskImageAsset::new("iOS", "17.0")
    }

    #[tokio::test]
    async fn creates_versioned_directory_and_units() {
        let root = tempfile::tempdir().unwrap();
        let preparer = DiskPreparer::new(root.path().to_path_buf());
        let links = vec![
            link("image", "https://dl.test/DeveloperDiskImage.dmg"),
            link("signature", "https://dl.test/DeveloperDiskImage.dmg.signature"),
        ];

        let units = preparer.prepare(&asset(), &links).await.unwrap();

        assert_eq!(units.len(), 2);
        let expected_dir = root.path().join("iOS").join("17.0");
        assert!(expected_dir.is_dir());
        assert_eq!(
            units[0].destination(),
            &expected_dir.join("DeveloperDiskImage.dmg")
        );
    }

    #[tokio::test]
    async fn rejects_empty_link_set() {
        let root = tempfile::tempdir().unwrap();
        let preparer = DiskPreparer::new(root.path().to_path_buf());
        let result = preparer.prepare(&asset(), &[]).await;
        assert!(matches!(result, Err(PreparationError::NoUnits)));
    }

    #[tokio::test]
    async fn rejects_colliding_destinations() {
        let root = tempfile::tempdir().unwrap();
        let preparer = DiskPreparer::new(root.path().to_path_buf());
        let links = vec![
            link("image", "https://a.test/DeveloperDiskImage.dmg"),
            link("mirror", "https://b.test/DeveloperDiskImage.dmg"),
        ];
        let result = preparer.prepare(&asset(), &links).await;
        assert!(matches!(
            result,
            Err(PreparationError::DuplicateDestination(_))
        ));
    }

    #[tokio::test]
    async fn sanitizes_hostile_file_names() {
        let root = tempfile::tempdir().unwrap();
        let preparer = DiskPreparer::new(root.path().to_path_buf());
        let mut hostile = link("image", "https://dl.test/DeveloperDiskImage.dmg");
        hostile.file_name = "..\\evil?.dmg".to_string();

        let units = preparer.prepare(&asset(), &[hostile]).await.unwrap();
        let name = units[0].destination().file_name().unwrap().to_string_lossy();
        assert_eq!(name, ".._evil_.dmg");
    }
}
