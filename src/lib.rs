//! Service-order reports and photo normalisation for the repair counter.
//!
//! [`ReportComposer`] turns a [`ServiceOrderReport`] into a paginated A4 PDF:
//! header, summary table, problem description, accessories, checklists,
//! technician observation, a photo grid and page footers. [`Normalizer`]
//! re-encodes photos into the upload size window before they leave the
//! workstation.

pub mod composer;
pub mod compression;
pub mod config;
pub mod fonts;
pub mod layout;
pub mod model;
pub mod photos;
pub mod render;
pub mod text;

#[cfg(feature = "bookmarks")]
pub mod bookmarks;

pub use composer::{RenderedReport, ReportComposer, ReportError};
pub use compression::{
    CompressionError, CompressionOptions, CompressionPolicy, Compressor, ImageFile,
    JpegCompressor, Normalizer,
};
pub use config::{ConfigError, ReportConfig};
pub use layout::ReportLayout;
pub use model::{
    Accessories, ChecklistItem, Customer, ItemStatus, OrderStatus, ServiceOrderReport, Technician,
};
pub use photos::{ImageLoader, LoadError, SourceLoader};
pub use render::RenderError;
