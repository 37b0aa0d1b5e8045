//! Layout Resolver
//!
//! Turns a page count (and optionally a template id) into a grid plan.
//! Plans are derived values: recompute them whenever the page count or
//! the grid dimensions change.

use log::warn;
use serde::Serialize;

use crate::templates::{get_template, template_for, Template, TemplateId};

/// Largest row or column count accepted for a grid.
pub const MAX_GRID_DIM: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutPlan {
    pub rows: usize,
    pub cols: usize,
    /// Sheets of `rows × cols` cells; only multi-sheet templates use more than one.
    pub sheets: usize,
    /// Always `>= rows * cols * sheets`; the excess is the overflow bucket.
    pub total_slots: usize,
    pub template_id: Option<TemplateId>,
}

impl LayoutPlan {
    /// Manual grid mode. Slots already holding resources are kept even when
    /// the new grid is smaller, so shrinking never discards a page.
    pub fn manual(rows: usize, cols: usize, existing_slots: usize) -> Self {
        let rows = rows.clamp(1, MAX_GRID_DIM);
        let cols = cols.clamp(1, MAX_GRID_DIM);
        Self {
            rows,
            cols,
            sheets: 1,
            total_slots: (rows * cols).max(existing_slots),
            template_id: None,
        }
    }

    fn from_template(template: &Template, page_count: usize) -> Self {
        let cells = template.grid.cells() * template.sheets;
        Self {
            rows: template.grid.rows,
            cols: template.grid.cols,
            sheets: template.sheets,
            total_slots: cells.max(template.pages).max(page_count),
            template_id: Some(template.id),
        }
    }

    pub fn template(&self) -> Option<&'static Template> {
        self.template_id.map(template_for)
    }

    /// Number of visible grid cells across all sheets.
    pub fn cells(&self) -> usize {
        self.rows * self.cols * self.sheets
    }

    pub fn overflow_slots(&self) -> usize {
        self.total_slots.saturating_sub(self.cells())
    }

    /// Slot index shown by each cell, in cell order (sheet by sheet, row-major).
    pub fn canonical_order(&self) -> Vec<usize> {
        match self.template() {
            Some(template) => (0..template.sheets)
                .flat_map(|sheet| template.sheet_cells(sheet))
                .map(|c| c.page - 1)
                .collect(),
            None => (0..self.cells()).collect(),
        }
    }
}

/// Pick a grid for `page_count` pages.
///
/// Sixteen pages select the accordion template; up to eight pages use a
/// 2×4 grid; anything else gets a square-ish grid capped at
/// [`MAX_GRID_DIM`] per side. `page_count` must be at least 1.
pub fn resolve_layout(page_count: usize) -> LayoutPlan {
    if page_count == 16 {
        return LayoutPlan::from_template(template_for(TemplateId::Accordion16), page_count);
    }

    let (rows, cols) = if page_count <= 8 {
        (2, 4)
    } else {
        let side = ceil_sqrt(page_count);
        let rows = if side > 2 { side } else { 2 };
        (rows, page_count.div_ceil(rows))
    };
    let rows = rows.min(MAX_GRID_DIM);
    let cols = cols.min(MAX_GRID_DIM);

    LayoutPlan {
        rows,
        cols,
        sheets: 1,
        total_slots: (rows * cols).max(page_count),
        template_id: None,
    }
}

/// Like [`resolve_layout`], but honours an explicitly requested template.
/// An unknown id falls back to the automatic grid.
pub fn resolve_with_template(page_count: usize, template_id: Option<&str>) -> LayoutPlan {
    match template_id.map(get_template) {
        Some(Ok(template)) => LayoutPlan::from_template(template, page_count),
        Some(Err(e)) => {
            warn!("{}; falling back to automatic grid", e);
            resolve_layout(page_count)
        }
        None => resolve_layout(page_count),
    }
}

fn ceil_sqrt(n: usize) -> usize {
    let mut root = (n as f64).sqrt() as usize;
    while root * root < n {
        root += 1;
    }
    while root > 0 && (root - 1) * (root - 1) >= n {
        root -= 1;
    }
    root
}
