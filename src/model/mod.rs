//! Model descriptors and the acquisition pipeline

mod acquisition;
mod catalog;

pub use acquisition::{DownloadError, DownloadState, DownloadStream, ModelFetcher};
pub use catalog::ModelDescriptor;
