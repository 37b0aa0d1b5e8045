//! Page Resources
//!
//! A rendered page lives behind an opaque, revocable [`ResourceHandle`].
//! [`PageResource`] is the single owner of a rendered handle: it is not
//! `Clone`, so a rendered page can sit in at most one slot. The shared
//! blank page is the one exception and is marked as such.

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use log::{debug, error};
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use uuid::Uuid;

pub type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Failed to encode raster: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Unknown resource handle: {0}")]
    UnknownHandle(ResourceHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceHandle(Uuid);

impl ResourceHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ResourceHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res:{}", self.0)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct PageResource {
    handle: ResourceHandle,
    shared_blank: bool,
}

impl PageResource {
    /// Take ownership of a freshly encoded page.
    pub fn rendered(handle: ResourceHandle) -> Self {
        Self { handle, shared_blank: false }
    }

    pub(crate) fn shared_blank(handle: ResourceHandle) -> Self {
        Self { handle, shared_blank: true }
    }

    pub fn handle(&self) -> ResourceHandle {
        self.handle
    }

    pub fn is_shared_blank(&self) -> bool {
        self.shared_blank
    }
}

/// Encoding and revocation capability behind every resource handle.
///
/// `encode` runs on render workers, hence `Send + Sync`.
pub trait ResourceBackend: Send + Sync {
    fn encode(&self, raster: &RgbImage, quality: u8) -> Result<ResourceHandle, ResourceError>;
    fn revoke(&self, handle: ResourceHandle);
}

/// White page used for every slot that has no source page.
pub fn blank_page_raster(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width.max(1), height.max(1), image::Rgb([255, 255, 255]))
}

#[derive(Default)]
struct MemoryState {
    live: HashMap<ResourceHandle, Vec<u8>>,
    revocations: HashMap<ResourceHandle, u32>,
    encoded: usize,
}

/// In-process backend: JPEG bytes keyed by handle.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn bytes(&self, handle: ResourceHandle) -> Result<Vec<u8>, ResourceError> {
        self.lock()
            .live
            .get(&handle)
            .cloned()
            .ok_or(ResourceError::UnknownHandle(handle))
    }

    pub fn data_url(&self, handle: ResourceHandle) -> Result<String, ResourceError> {
        let bytes = self.bytes(handle)?;
        Ok(format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        ))
    }

    pub fn is_live(&self, handle: ResourceHandle) -> bool {
        self.lock().live.contains_key(&handle)
    }

    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    pub fn encoded_count(&self) -> usize {
        self.lock().encoded
    }

    /// How many times `revoke` was called for `handle`.
    pub fn revocation_count(&self, handle: ResourceHandle) -> u32 {
        self.lock().revocations.get(&handle).copied().unwrap_or(0)
    }
}

impl ResourceBackend for MemoryBackend {
    fn encode(&self, raster: &RgbImage, quality: u8) -> Result<ResourceHandle, ResourceError> {
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(raster)?;

        let handle = ResourceHandle::new();
        let mut state = self.lock();
        state.live.insert(handle, buf);
        state.encoded += 1;
        debug!("encoded {} ({}x{})", handle, raster.width(), raster.height());
        Ok(handle)
    }

    fn revoke(&self, handle: ResourceHandle) {
        let mut state = self.lock();
        let count = state.revocations.entry(handle).or_insert(0);
        *count += 1;
        if *count > 1 {
            error!("{} revoked {} times", handle, count);
        }
        state.live.remove(&handle);
    }
}
