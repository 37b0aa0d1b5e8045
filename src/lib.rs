//! Zinefold Core - Zine Imposition Engine
//!
//! Maps the pages of a document onto folding-template grids, renders them
//! into revocable image resources under a fixed concurrency budget, and
//! composes the rotated cell sequence that print/export backends consume.
//!
//! # Guarantees
//! 1. A rendered resource has exactly one owning slot.
//! 2. Every resource leaving a slot is revoked exactly once.
//! 3. Blank slots share one resource per session.
//! 4. No more than `batch_size` pages render at once.
//! 5. Shrinking a grid never drops a rendered page.

pub mod compose;
pub mod config;
pub mod hashing;
pub mod layout;
pub mod pipeline;
pub mod print;
pub mod resource;
pub mod session;
pub mod store;
pub mod templates;
pub mod validation;

pub use compose::{compose, ComposedCell, Composition, ExportBackend, ExportManifest};
pub use config::{ConfigError, EngineConfig};
pub use layout::{resolve_layout, resolve_with_template, LayoutPlan, MAX_GRID_DIM};
pub use pipeline::{PageRenderer, PipelineError, RenderPipeline, RenderReport};
pub use print::{page_dimensions, Orientation, PageDimensions, PaperSize};
pub use resource::{BoxError, MemoryBackend, PageResource, ResourceBackend, ResourceError, ResourceHandle};
pub use session::Session;
pub use store::{ResourceStore, Slot, StoreError};
pub use templates::{get_template, Template, TemplateError, TemplateId};
pub use validation::{DocumentInput, ValidationResult, Validator};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
