//! File services: upload, download and metadata queries.

pub mod download;
pub mod service;
pub mod sniff;
pub mod upload;


pub use download::{ChunkStream, DownloadResult, DownloadService};
pub use service::FileService;
pub use sniff::sniff_content_type;
pub use upload::{UploadFrame, UploadMetadata, UploadResult, UploadService};
