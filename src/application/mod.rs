pub mod controller;
pub mod gateway;
pub mod prepare;
pub mod progress;
pub mod runner;
pub mod surface;
pub mod unit;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use url::Url;

use crate::domain::{
    DiskImageAsset, DownloadLink, PreparationError, ResolutionError, TransferError,
};
use unit::DownloadUnit;

pub use controller::OrchestrationController;
pub use gateway::ModalGateway;
pub use prepare::DiskPreparer;
pub use progress::{ProgressSnapshot, ProgressTracker, UnitId, UnitSnapshot};
pub use runner::WorkflowPhaseRunner;
pub use surface::{ChannelSurface, ModalSurface, SurfaceEvent};

/// Chunked body of one download, as handed out by the transport.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransferError>>;

/// Resolves the current download links for an asset. Resolution is allowed to
/// fail; callers then fall back to `fallback_links` and continue degraded.
pub trait LinkResolver: Send + Sync {
    fn resolve_links<'a>(
        &'a self,
        asset: &'a DiskImageAsset,
    ) -> BoxFuture<'a, Result<Vec<DownloadLink>, ResolutionError>>;

    /// Best-effort default links used when resolution fails.
    fn fallback_links(&self, asset: &DiskImageAsset) -> Vec<DownloadLink>;
}

/// Validates destinations and turns resolved links into download units,
/// before any bytes move.
pub trait Preparer: Send + Sync {
    fn prepare<'a>(
        &'a self,
        asset: &'a DiskImageAsset,
        links: &'a [DownloadLink],
    ) -> BoxFuture<'a, Result<Vec<DownloadUnit>, PreparationError>>;
}

/// Performs the byte transfer for one unit. Returns the expected size when
/// the remote reports one, plus the chunk stream.
pub trait Transport: Send + Sync {
    fn open<'a>(
        &'a self,
        url: &'a Url,
    ) -> BoxFuture<'a, Result<(Option<u64>, ByteStream), TransferError>>;
}
