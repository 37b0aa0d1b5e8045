//! Resource Store
//!
//! Owns the per-slot page resources, their flip flags and the shared blank
//! page. Every resource that leaves a slot (replacement, teardown) is
//! revoked here and nowhere else.
//!
//! All mutations take `&mut self`, so each operation is atomic with respect
//! to the others. Callers that share a store across threads wrap it in a
//! `Mutex` (or share the owning [`crate::Session`] that way).

use log::{debug, error};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

use crate::layout::LayoutPlan;
use crate::resource::{PageResource, ResourceBackend, ResourceError, ResourceHandle};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Slot {index} out of range (store holds {len} slots)")]
    SlotOutOfRange { index: usize, len: usize },

    #[error("Resource {handle} is already owned by slot {slot}")]
    AlreadyOwned { handle: ResourceHandle, slot: usize },

    #[error("Resource {0} is the shared blank page and cannot be owned by a slot")]
    SharedBlank(ResourceHandle),

    #[error("Resource {0} revoked twice")]
    DoubleRevoke(ResourceHandle),

    #[error("Slot {slot} references revoked resource {handle}")]
    DanglingReference { handle: ResourceHandle, slot: usize },
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Slot {
    resource: Option<PageResource>,
    flipped: bool,
}

impl Slot {
    pub fn resource(&self) -> Option<&PageResource> {
        self.resource.as_ref()
    }

    pub fn handle(&self) -> Option<ResourceHandle> {
        self.resource.as_ref().map(PageResource::handle)
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    pub fn is_empty(&self) -> bool {
        self.resource.is_none()
    }
}

pub struct ResourceStore {
    slots: Vec<Slot>,
    blank: Option<ResourceHandle>,
    revoked: HashSet<ResourceHandle>,
    backend: Arc<dyn ResourceBackend>,
}

impl ResourceStore {
    pub fn new(backend: Arc<dyn ResourceBackend>, len: usize) -> Self {
        let mut slots = Vec::with_capacity(len);
        slots.resize_with(len, Slot::default);
        Self {
            slots,
            blank: None,
            revoked: HashSet::new(),
            backend,
        }
    }

    pub fn backend(&self) -> Arc<dyn ResourceBackend> {
        Arc::clone(&self.backend)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> impl Iterator<Item = &Slot> + '_ {
        self.slots.iter()
    }

    /// Handle of the shared blank page, if one exists this session.
    pub fn blank_handle(&self) -> Option<ResourceHandle> {
        self.blank
    }

    /// Grow to at least `len` empty slots. Never shrinks.
    pub fn ensure_len(&mut self, len: usize) {
        if len > self.slots.len() {
            self.slots.resize_with(len, Slot::default);
        }
    }

    fn check_index(&self, index: usize) -> Result<(), StoreError> {
        if index < self.slots.len() {
            Ok(())
        } else {
            Err(StoreError::SlotOutOfRange { index, len: self.slots.len() })
        }
    }

    /// The shared blank page, created through `create` on first demand and
    /// reused (same handle) until the session is reset.
    pub fn shared_blank<F>(&mut self, create: F) -> Result<PageResource, ResourceError>
    where
        F: FnOnce() -> Result<ResourceHandle, ResourceError>,
    {
        let handle = match self.blank {
            Some(handle) => handle,
            None => {
                let handle = create()?;
                debug!("created shared blank {}", handle);
                self.blank = Some(handle);
                handle
            }
        };
        Ok(PageResource::shared_blank(handle))
    }

    /// Install `resource` at `index`, revoking whatever it replaces.
    /// The slot's flip flag is left untouched. Re-installing the handle a
    /// slot already holds is a no-op.
    pub fn set_slot(&mut self, index: usize, resource: PageResource) -> Result<(), StoreError> {
        self.check_index(index)?;

        let handle = resource.handle();
        if self.slots[index].handle() == Some(handle) {
            return Ok(());
        }

        if !resource.is_shared_blank() {
            if self.blank == Some(handle) {
                return Err(StoreError::SharedBlank(handle));
            }
            if self.revoked.contains(&handle) {
                return Err(StoreError::DanglingReference { handle, slot: index });
            }
            if let Some(owner) =
                (0..self.slots.len()).find(|&i| i != index && self.slots[i].handle() == Some(handle))
            {
                return Err(StoreError::AlreadyOwned { handle, slot: owner });
            }
        }

        if let Some(previous) = self.slots[index].resource.replace(resource) {
            self.release(previous);
        }
        Ok(())
    }

    /// Exchange resources and flip flags of two slots. Nothing is revoked.
    pub fn swap(&mut self, i: usize, j: usize) -> Result<(), StoreError> {
        self.check_index(i)?;
        self.check_index(j)?;
        self.slots.swap(i, j);
        Ok(())
    }

    /// Invert the flip flag of a slot, returning the new value.
    pub fn toggle_flip(&mut self, index: usize) -> Result<bool, StoreError> {
        self.check_index(index)?;
        let slot = &mut self.slots[index];
        slot.flipped = !slot.flipped;
        Ok(slot.flipped)
    }

    /// Switch to a manual `rows × cols` grid.
    ///
    /// Slots past the new grid that still hold a resource (or a flip) stay
    /// in the store as overflow and reappear at their own index when the
    /// grid grows again; only trailing empty slots are dropped.
    pub fn resize(&mut self, rows: usize, cols: usize) -> LayoutPlan {
        let extent = self
            .slots
            .iter()
            .rposition(|s| !s.is_empty() || s.flipped)
            .map_or(0, |i| i + 1);
        let plan = LayoutPlan::manual(rows, cols, extent);
        self.slots.resize_with(plan.total_slots, Slot::default);
        debug!(
            "resized to {}x{} ({} slots, {} overflow)",
            plan.rows,
            plan.cols,
            plan.total_slots,
            plan.overflow_slots()
        );
        plan
    }

    /// Revoke every owned resource and empty all slots. The shared blank
    /// survives.
    pub fn clear_all(&mut self) {
        let mut released = 0;
        for index in 0..self.slots.len() {
            let slot = &mut self.slots[index];
            slot.flipped = false;
            if let Some(resource) = slot.resource.take() {
                if !resource.is_shared_blank() {
                    released += 1;
                }
                self.release(resource);
            }
        }
        debug!("cleared store ({} resources revoked)", released);
    }

    /// End of a document session: clear everything, then drop the shared
    /// blank so the next session creates its own.
    pub fn reset(&mut self) {
        self.clear_all();
        if let Some(blank) = self.blank.take() {
            self.revoke_handle(blank);
        }
        self.revoked.clear();
    }

    /// [`reset`](Self::reset), then size the store to exactly `len` empty
    /// slots for the next document.
    pub fn reset_to(&mut self, len: usize) {
        self.reset();
        self.slots.truncate(len);
        self.slots.resize_with(len, Slot::default);
    }

    fn release(&mut self, resource: PageResource) {
        if resource.is_shared_blank() {
            return;
        }
        self.revoke_handle(resource.handle());
    }

    fn revoke_handle(&mut self, handle: ResourceHandle) {
        if !self.revoked.insert(handle) {
            error!("{}", StoreError::DoubleRevoke(handle));
            return;
        }
        self.backend.revoke(handle);
    }

    /// Verify that no owned handle is shared between slots and that no
    /// slot points at a revoked handle.
    pub fn check_invariants(&self) -> Result<(), StoreError> {
        let mut owners = HashMap::new();
        for (slot, s) in self.slots.iter().enumerate() {
            let Some(resource) = s.resource() else { continue };
            let handle = resource.handle();
            if self.revoked.contains(&handle) {
                return Err(StoreError::DanglingReference { handle, slot });
            }
            if resource.is_shared_blank() {
                continue;
            }
            if let Some(&owner) = owners.get(&handle) {
                return Err(StoreError::AlreadyOwned { handle, slot: owner });
            }
            owners.insert(handle, slot);
        }
        Ok(())
    }
}

impl Drop for ResourceStore {
    fn drop(&mut self) {
        self.reset();
    }
}
