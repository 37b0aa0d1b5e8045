//! Document Session
//!
//! One `Session` holds everything that belongs to the document currently
//! on the table: its store, layout plan and active template. Loading a new
//! document supersedes the previous one and reclaims all of its resources
//! before anything new is rendered.

use log::info;
use std::sync::Arc;

use crate::compose::{compose, Composition, ExportBackend, ExportManifest};
use crate::config::EngineConfig;
use crate::layout::{resolve_with_template, LayoutPlan};
use crate::pipeline::{PageRenderer, PipelineError, RenderPipeline, RenderReport};
use crate::print::{Orientation, PaperSize};
use crate::resource::{BoxError, ResourceBackend, ResourceHandle};
use crate::store::{ResourceStore, StoreError};
use crate::templates::Template;
use crate::validation::{DocumentInput, ValidationResult, Validator};

pub struct Session {
    config: EngineConfig,
    store: ResourceStore,
    plan: LayoutPlan,
    page_count: usize,
    pipeline: RenderPipeline,
    validator: Validator,
}

impl Session {
    pub fn new(config: EngineConfig, backend: Arc<dyn ResourceBackend>) -> Result<Self, PipelineError> {
        let pipeline = RenderPipeline::new(&config)?;
        let validator = Validator::new(config.max_document_bytes);
        Ok(Self {
            store: ResourceStore::new(backend, 0),
            plan: LayoutPlan::manual(2, 4, 0),
            page_count: 0,
            config,
            pipeline,
            validator,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    pub fn plan(&self) -> &LayoutPlan {
        &self.plan
    }

    pub fn template(&self) -> Option<&'static Template> {
        self.plan.template()
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn validate_document(&self, input: &DocumentInput<'_>) -> ValidationResult {
        self.validator.validate(input)
    }

    /// Replace the current document with the one behind `renderer`.
    ///
    /// The previous document's resources, including its blank page, are
    /// revoked first and the store is emptied, so it ends up sized to the
    /// new plan. `template_id` selects a folding template; unknown ids fall
    /// back to the automatic grid.
    pub fn load<R, F>(
        &mut self,
        renderer: &R,
        template_id: Option<&str>,
        on_progress: F,
    ) -> Result<RenderReport, PipelineError>
    where
        R: PageRenderer + ?Sized,
        F: FnMut(u8),
    {
        self.store.reset_to(0);
        self.page_count = 0;

        let page_count = renderer.page_count();
        if page_count == 0 {
            return Err(PipelineError::EmptyDocument);
        }

        self.plan = resolve_with_template(page_count, template_id);
        self.page_count = page_count;
        info!(
            "loading {} pages into {}x{} grid ({})",
            page_count,
            self.plan.rows,
            self.plan.cols,
            self.plan.template_id.map_or("no template", |id| id.as_str())
        );
        self.pipeline.render(&mut self.store, renderer, &self.plan, on_progress)
    }

    /// Re-render one page, e.g. the page a failed load reported.
    pub fn retry_page<R>(&mut self, renderer: &R, page: usize) -> Result<ResourceHandle, PipelineError>
    where
        R: PageRenderer + ?Sized,
    {
        self.pipeline.render_page_into(&mut self.store, renderer, page)
    }

    pub fn swap(&mut self, i: usize, j: usize) -> Result<(), StoreError> {
        self.store.swap(i, j)
    }

    pub fn toggle_flip(&mut self, index: usize) -> Result<bool, StoreError> {
        self.store.toggle_flip(index)
    }

    /// Switch to a manual grid; the active template is dropped.
    pub fn resize_grid(&mut self, rows: usize, cols: usize) -> &LayoutPlan {
        self.plan = self.store.resize(rows, cols);
        &self.plan
    }

    pub fn compose(&self) -> Composition<'_> {
        compose(&self.store, &self.plan, self.plan.template())
    }

    pub fn manifest(&self, paper: PaperSize, orientation: Orientation) -> Result<ExportManifest, serde_json::Error> {
        ExportManifest::build(&self.store, &self.plan, self.plan.template(), paper, orientation)
    }

    /// Export with the configured paper size and orientation.
    pub fn export<B: ExportBackend>(&self, backend: &B) -> Result<B::Output, BoxError> {
        let manifest = self.manifest(self.config.paper, self.config.orientation)?;
        manifest.export(backend)
    }

    /// Revoke everything this session still owns.
    pub fn close(&mut self) {
        self.store.reset_to(0);
        self.page_count = 0;
    }
}
