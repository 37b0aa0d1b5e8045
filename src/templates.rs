//! Template Registry - Folding Schemes
//!
//! Templates are static, read-only contracts: each one fixes how logical
//! pages land on the grid cells of a sheet and which of them print
//! upside down so the folded zine reads correctly.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TemplateId {
    #[serde(rename = "mini-8")]
    Mini8,
    #[serde(rename = "accordion-16")]
    Accordion16,
    #[serde(rename = "dual-16")]
    Dual16,
}

impl TemplateId {
    pub const ALL: [TemplateId; 3] = [TemplateId::Mini8, TemplateId::Accordion16, TemplateId::Dual16];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateId::Mini8 => "mini-8",
            TemplateId::Accordion16 => "accordion-16",
            TemplateId::Dual16 => "dual-16",
        }
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateId {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TemplateId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| TemplateError::UnknownTemplate(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridShape {
    pub rows: usize,
    pub cols: usize,
}

impl GridShape {
    pub const fn cells(&self) -> usize {
        self.rows * self.cols
    }
}

/// One grid cell of a template, in row-major order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellMapping {
    /// 1-based logical page number
    pub page: usize,
    pub upside_down: bool,
}

const fn cell(page: usize, upside_down: bool) -> CellMapping {
    CellMapping { page, upside_down }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum CutLine {
    /// Full-width cut between `after_row` and the next row.
    Horizontal {
        #[serde(rename = "afterRow")]
        after_row: usize,
    },
    /// Cut along the left sheet edge through the listed rows.
    LeftEdge { rows: &'static [usize] },
    RightEdge { rows: &'static [usize] },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: TemplateId,
    pub label: &'static str,
    pub description: &'static str,
    pub pages: usize,
    pub sheets: usize,
    pub grid: GridShape,
    /// Empty for multi-sheet templates that reuse `base` per sheet.
    pub layout: &'static [CellMapping],
    pub cut_lines: &'static [CutLine],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<TemplateId>,
}

impl Template {
    pub fn is_multi_sheet(&self) -> bool {
        self.sheets > 1
    }

    /// Cell mappings for one sheet, with page numbers offset into the
    /// document for every sheet after the first.
    pub fn sheet_cells(&self, sheet: usize) -> impl Iterator<Item = CellMapping> + Clone + 'static {
        let (layout, per_sheet): (&'static [CellMapping], usize) = match self.base {
            Some(base) => {
                let base = template_for(base);
                (base.layout, base.pages)
            }
            None => (self.layout, self.pages),
        };
        let offset = if sheet < self.sheets { sheet * per_sheet } else { 0 };
        let layout: &'static [CellMapping] = if sheet < self.sheets { layout } else { &[] };
        layout.iter().map(move |c| cell(c.page + offset, c.upside_down))
    }

    /// Mapping of one cell; `index` counts row-major within the sheet.
    pub fn cell_at(&self, sheet: usize, index: usize) -> Option<CellMapping> {
        self.sheet_cells(sheet).nth(index)
    }

    /// Whether the template prints `page` (1-based, document-wide) rotated.
    pub fn is_upside_down(&self, page: usize) -> bool {
        (0..self.sheets)
            .flat_map(|sheet| self.sheet_cells(sheet))
            .any(|c| c.page == page && c.upside_down)
    }

    pub fn upside_down_pages(&self) -> Vec<usize> {
        let mut pages: Vec<usize> = (0..self.sheets)
            .flat_map(|sheet| self.sheet_cells(sheet))
            .filter(|c| c.upside_down)
            .map(|c| c.page)
            .collect();
        pages.sort_unstable();
        pages
    }
}

static MINI_8_LAYOUT: [CellMapping; 8] = [
    cell(5, true), cell(4, true), cell(3, true), cell(2, true),
    cell(6, false), cell(7, false), cell(8, false), cell(1, false),
];

static ACCORDION_16_LAYOUT: [CellMapping; 16] = [
    cell(4, true), cell(3, true), cell(2, true), cell(1, true),
    cell(5, false), cell(6, false), cell(7, false), cell(8, false),
    cell(12, true), cell(11, true), cell(10, true), cell(9, true),
    cell(13, false), cell(14, false), cell(15, false), cell(16, false),
];

static MINI_8: Template = Template {
    id: TemplateId::Mini8,
    label: "8-Page Mini-Zine",
    description: "1 sheet, 2×4 grid. Cut the centre line and fold.",
    pages: 8,
    sheets: 1,
    grid: GridShape { rows: 2, cols: 4 },
    layout: &MINI_8_LAYOUT,
    cut_lines: &[CutLine::Horizontal { after_row: 1 }],
    base: None,
};

static ACCORDION_16: Template = Template {
    id: TemplateId::Accordion16,
    label: "16-Page Accordion",
    description: "1 sheet, 4×4 grid. Cut along edges then fold accordion-style.",
    pages: 16,
    sheets: 1,
    grid: GridShape { rows: 4, cols: 4 },
    layout: &ACCORDION_16_LAYOUT,
    cut_lines: &[
        CutLine::LeftEdge { rows: &[0, 1, 2] },
        CutLine::RightEdge { rows: &[0, 1, 2] },
    ],
    base: None,
};

static DUAL_16: Template = Template {
    id: TemplateId::Dual16,
    label: "16-Page Dual Sheets",
    description: "2 sheets, each folded like an 8-page zine.",
    pages: 16,
    sheets: 2,
    grid: GridShape { rows: 2, cols: 4 },
    layout: &[],
    cut_lines: &[CutLine::Horizontal { after_row: 1 }],
    base: Some(TemplateId::Mini8),
};

pub fn template_for(id: TemplateId) -> &'static Template {
    match id {
        TemplateId::Mini8 => &MINI_8,
        TemplateId::Accordion16 => &ACCORDION_16,
        TemplateId::Dual16 => &DUAL_16,
    }
}

/// Look up a template by its symbolic id.
pub fn get_template(id: &str) -> Result<&'static Template, TemplateError> {
    id.parse::<TemplateId>().map(template_for)
}

pub fn list_templates() -> Vec<&'static Template> {
    TemplateId::ALL.into_iter().map(template_for).collect()
}
