//! Composer
//!
//! Projects the store through a template (or a plain row-major grid) into
//! the ordered, rotation-annotated cell sequence the export backends
//! consume. Nothing is cached: the store may change between compositions.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::hashing::LayoutFingerprint;
use crate::layout::LayoutPlan;
use crate::print::{page_dimensions, Orientation, PageDimensions, PaperSize};
use crate::resource::{BoxError, ResourceHandle};
use crate::store::ResourceStore;
use crate::templates::{Template, TemplateId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedCell {
    pub sheet: usize,
    /// Row-major position within the sheet.
    pub cell_index: usize,
    /// Store slot shown in this cell (logical page − 1).
    pub slot: usize,
    pub resource: Option<ResourceHandle>,
    pub rotation_degrees: u16,
}

/// Lazy, restartable cell sequence; clone it to iterate again.
#[derive(Clone)]
pub struct Composition<'a> {
    store: &'a ResourceStore,
    template: Option<&'a Template>,
    cells_per_sheet: usize,
    total: usize,
    position: usize,
}

pub fn compose<'a>(
    store: &'a ResourceStore,
    plan: &LayoutPlan,
    template: Option<&'a Template>,
) -> Composition<'a> {
    let (cells_per_sheet, total) = match template {
        Some(t) => (t.grid.cells(), t.grid.cells() * t.sheets),
        None => (plan.rows * plan.cols, plan.rows * plan.cols),
    };
    Composition {
        store,
        template,
        cells_per_sheet,
        total,
        position: 0,
    }
}

impl Composition<'_> {
    fn cell(&self, position: usize) -> Option<ComposedCell> {
        let sheet = position / self.cells_per_sheet.max(1);
        let cell_index = position % self.cells_per_sheet.max(1);

        let (slot, baseline_upside_down) = match self.template {
            Some(t) => {
                let mapping = t.cell_at(sheet, cell_index)?;
                (mapping.page - 1, mapping.upside_down)
            }
            None => (position, false),
        };

        let stored = self.store.slot(slot);
        let flipped = stored.is_some_and(|s| s.is_flipped());
        Some(ComposedCell {
            sheet,
            cell_index,
            slot,
            resource: stored.and_then(|s| s.handle()),
            rotation_degrees: if baseline_upside_down ^ flipped { 180 } else { 0 },
        })
    }
}

impl Iterator for Composition<'_> {
    type Item = ComposedCell;

    fn next(&mut self) -> Option<ComposedCell> {
        if self.position >= self.total {
            return None;
        }
        let cell = self.cell(self.position);
        self.position += 1;
        cell
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.position;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Composition<'_> {}

/// Turns composed cells into a printable or downloadable document.
pub trait ExportBackend {
    type Output;

    fn compose_export(
        &self,
        cells: &[ComposedCell],
        dimensions: PageDimensions,
    ) -> Result<Self::Output, BoxError>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportManifest {
    pub template_id: Option<TemplateId>,
    pub rows: usize,
    pub cols: usize,
    pub sheets: usize,
    pub paper: PaperSize,
    pub orientation: Orientation,
    pub dimensions: PageDimensions,
    pub created_at: DateTime<Utc>,
    pub cells: Vec<ComposedCell>,
    /// SHA-256 of the grid and cells; excludes `created_at`.
    pub layout_digest: String,
}

impl ExportManifest {
    pub fn build(
        store: &ResourceStore,
        plan: &LayoutPlan,
        template: Option<&Template>,
        paper: PaperSize,
        orientation: Orientation,
    ) -> Result<Self, serde_json::Error> {
        let cells: Vec<_> = compose(store, plan, template).collect();
        let dimensions = page_dimensions(paper, orientation);
        let (rows, cols, sheets) = match template {
            Some(t) => (t.grid.rows, t.grid.cols, t.sheets),
            None => (plan.rows, plan.cols, 1),
        };
        let template_id = template.map(|t| t.id);

        let layout_digest = LayoutFingerprint {
            template_id,
            rows,
            cols,
            sheets,
            dimensions,
            cells: &cells,
        }
        .digest()?;

        Ok(Self {
            template_id,
            rows,
            cols,
            sheets,
            paper,
            orientation,
            dimensions,
            created_at: Utc::now(),
            cells,
            layout_digest,
        })
    }

    pub fn export<B: ExportBackend>(&self, backend: &B) -> Result<B::Output, BoxError> {
        backend.compose_export(&self.cells, self.dimensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::resolve_layout;
    use crate::resource::{blank_page_raster, MemoryBackend, PageResource, ResourceBackend};
    use crate::templates::get_template;
    use std::sync::Arc;

    fn filled_store(len: usize) -> ResourceStore {
        let backend = Arc::new(MemoryBackend::new());
        let mut store = ResourceStore::new(backend.clone(), len);
        for i in 0..len {
            let handle = backend.encode(&blank_page_raster(2, 2), 80).unwrap();
            store.set_slot(i, PageResource::rendered(handle)).unwrap();
        }
        store
    }

    #[test]
    fn test_accordion_rotation_baseline() {
        let store = filled_store(16);
        let plan = resolve_layout(16);
        let cells: Vec<_> = compose(&store, &plan, plan.template()).collect();

        assert_eq!(cells.len(), 16);
        assert_eq!(cells[0].slot, 3);
        assert_eq!(cells[0].rotation_degrees, 180);
        assert_eq!(cells[4].slot, 4);
        assert_eq!(cells[4].rotation_degrees, 0);
        assert_eq!(cells[0].resource, store.slot(3).unwrap().handle());
    }

    #[test]
    fn test_flip_toggles_relative_to_template() {
        let mut store = filled_store(16);
        let plan = resolve_layout(16);
        store.toggle_flip(3).unwrap();
        store.toggle_flip(4).unwrap();

        let cells: Vec<_> = compose(&store, &plan, plan.template()).collect();
        assert_eq!(cells[0].rotation_degrees, 0);
        assert_eq!(cells[4].rotation_degrees, 180);
    }

    #[test]
    fn test_manual_grid_is_row_major() {
        let mut store = filled_store(6);
        let plan = store.resize(2, 3);
        store.toggle_flip(5).unwrap();

        let cells: Vec<_> = compose(&store, &plan, None).collect();
        let slots: Vec<_> = cells.iter().map(|c| c.slot).collect();
        assert_eq!(slots, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(cells[5].rotation_degrees, 180);
        assert!(cells[..5].iter().all(|c| c.rotation_degrees == 0));
    }

    #[test]
    fn test_missing_slots_compose_empty() {
        let store = filled_store(2);
        let plan = resolve_layout(2);
        let cells: Vec<_> = compose(&store, &plan, None).collect();
        assert_eq!(cells.len(), 8);
        assert!(cells[2..].iter().all(|c| c.resource.is_none()));
    }

    #[test]
    fn test_dual_sheets_carry_sheet_index() {
        let store = filled_store(16);
        let template = get_template("dual-16").unwrap();
        let plan = crate::layout::resolve_with_template(16, Some("dual-16"));
        let cells: Vec<_> = compose(&store, &plan, Some(template)).collect();

        assert_eq!(cells.len(), 16);
        assert_eq!((cells[8].sheet, cells[8].cell_index, cells[8].slot), (1, 0, 12));
        assert_eq!(cells[9].rotation_degrees, 180);
    }

    #[test]
    fn test_mini_8_rotates_page_five() {
        let store = filled_store(8);
        let plan = crate::layout::resolve_with_template(8, Some("mini-8"));
        let cells: Vec<_> = compose(&store, &plan, plan.template()).collect();

        let upside_down: Vec<_> = cells
            .iter()
            .filter(|c| c.rotation_degrees == 180)
            .map(|c| c.slot + 1)
            .collect();
        assert_eq!(upside_down, vec![5, 4, 3, 2]);
        assert_eq!((cells[0].slot, cells[0].rotation_degrees), (4, 180));
    }

    #[test]
    fn test_dual_sheets_rotate_first_page_of_each_half() {
        let store = filled_store(16);
        let plan = crate::layout::resolve_with_template(16, Some("dual-16"));
        let cells: Vec<_> = compose(&store, &plan, plan.template()).collect();

        let rotation_of = |page: usize| cells.iter().find(|c| c.slot == page - 1).unwrap().rotation_degrees;
        assert_eq!(rotation_of(5), 180);
        assert_eq!(rotation_of(13), 180);
        assert_eq!(rotation_of(1), 0);
        assert_eq!(rotation_of(9), 0);
    }

    #[test]
    fn test_composition_is_restartable() {
        let store = filled_store(8);
        let plan = resolve_layout(8);
        let composition = compose(&store, &plan, None);
        assert_eq!(composition.len(), 8);
        let first: Vec<_> = composition.clone().collect();
        let second: Vec<_> = composition.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_manifest_digest_is_stable() {
        let store = filled_store(8);
        let plan = resolve_layout(8);
        let a = ExportManifest::build(&store, &plan, None, PaperSize::A4, Orientation::Landscape).unwrap();
        let b = ExportManifest::build(&store, &plan, None, PaperSize::A4, Orientation::Landscape).unwrap();
        assert_eq!(a.layout_digest, b.layout_digest);

        let c = ExportManifest::build(&store, &plan, None, PaperSize::A3, Orientation::Landscape).unwrap();
        assert_ne!(a.layout_digest, c.layout_digest);
    }

    #[test]
    fn test_manifest_digest_tracks_flips() {
        let mut store = filled_store(8);
        let plan = resolve_layout(8);
        let before = ExportManifest::build(&store, &plan, None, PaperSize::A4, Orientation::Landscape).unwrap();
        store.toggle_flip(2).unwrap();
        let after = ExportManifest::build(&store, &plan, None, PaperSize::A4, Orientation::Landscape).unwrap();
        assert_ne!(before.layout_digest, after.layout_digest);
    }

    struct CountingExport;

    impl ExportBackend for CountingExport {
        type Output = (usize, u16);

        fn compose_export(&self, cells: &[ComposedCell], dimensions: PageDimensions) -> Result<Self::Output, BoxError> {
            Ok((cells.len(), dimensions.width_mm as u16))
        }
    }

    #[test]
    fn test_export_hands_cells_to_backend() {
        let store = filled_store(8);
        let plan = resolve_layout(8);
        let manifest = ExportManifest::build(&store, &plan, None, PaperSize::A4, Orientation::Landscape).unwrap();
        assert_eq!(manifest.export(&CountingExport).unwrap(), (8, 297));
    }
}
