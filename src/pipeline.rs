//! Render Pipeline - Bounded Page Rendering
//!
//! Pages are rendered in order `1..=page_count`, in batches of at most
//! `batch_size` concurrent render+encode calls. A batch settles completely
//! before the next one starts, which caps the number of raster surfaces
//! alive at once. Store writes and progress callbacks happen on the
//! caller's thread once a batch has settled.

use image::RgbImage;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::config::{BlankConfig, EngineConfig, RenderConfig};
use crate::layout::LayoutPlan;
use crate::resource::{blank_page_raster, BoxError, PageResource, ResourceBackend, ResourceError, ResourceHandle};
use crate::store::{ResourceStore, StoreError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Document has no pages")]
    EmptyDocument,

    #[error("Failed to render page {page}: {source}")]
    PageRenderFailed {
        page: usize,
        #[source]
        source: BoxError,
    },

    #[error("Page {page} is outside the document (1..={page_count})")]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Failed to start render workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Rasterizes pages of an already loaded document.
pub trait PageRenderer: Sync {
    fn page_count(&self) -> usize;

    /// Render 1-based `page` at `scale`.
    fn render_page(&self, page: usize, scale: f32) -> Result<RgbImage, BoxError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderReport {
    pub pages_rendered: usize,
    pub blank_slots: usize,
    pub blank_handle: Option<ResourceHandle>,
}

pub struct RenderPipeline {
    render: RenderConfig,
    blank: BlankConfig,
    pool: rayon::ThreadPool,
}

impl RenderPipeline {
    pub fn new(config: &EngineConfig) -> Result<Self, PipelineError> {
        let batch_size = config.render.batch_size.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(batch_size)
            .thread_name(|i| format!("zinefold-render-{}", i))
            .build()?;
        Ok(Self {
            render: RenderConfig { batch_size, ..config.render.clone() },
            blank: config.blank.clone(),
            pool,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.render.batch_size
    }

    /// Render every page of `renderer` into `store`, then fill the rest of
    /// the plan's slots with the shared blank page.
    ///
    /// `on_progress` receives the rounded completion percentage after each
    /// page. On a page failure the current batch still settles and its
    /// successes are kept; later batches are not started.
    pub fn render<R, F>(
        &self,
        store: &mut ResourceStore,
        renderer: &R,
        plan: &LayoutPlan,
        mut on_progress: F,
    ) -> Result<RenderReport, PipelineError>
    where
        R: PageRenderer + ?Sized,
        F: FnMut(u8),
    {
        let page_count = renderer.page_count();
        if page_count == 0 {
            return Err(PipelineError::EmptyDocument);
        }

        let total_slots = plan.total_slots.max(page_count);
        store.ensure_len(total_slots);
        let backend = store.backend();
        let pages: Vec<usize> = (1..=page_count).collect();
        let mut completed = 0;

        for (batch_index, batch) in pages.chunks(self.render.batch_size).enumerate() {
            debug!("render batch {} pages {:?}", batch_index, batch);
            let results: Vec<(usize, Result<ResourceHandle, PipelineError>)> = self.pool.install(|| {
                batch
                    .par_iter()
                    .map(|&page| (page, self.render_one(renderer, backend.as_ref(), page)))
                    .collect()
            });

            let mut failure = None;
            for (page, result) in results {
                match result {
                    Ok(handle) => {
                        store.set_slot(page - 1, PageResource::rendered(handle))?;
                        completed += 1;
                        on_progress(percent(completed, page_count));
                    }
                    Err(e) => {
                        warn!("{}", e);
                        failure.get_or_insert(e);
                    }
                }
            }
            if let Some(e) = failure {
                warn!("aborting render after {} of {} pages", completed, page_count);
                return Err(e);
            }
        }

        let blank_slots = total_slots - page_count;
        for index in page_count..total_slots {
            let blank = store.shared_blank(|| {
                let raster = blank_page_raster(self.blank.width, self.blank.height);
                backend.encode(&raster, self.render.jpeg_quality)
            })?;
            store.set_slot(index, blank)?;
        }

        info!("rendered {} pages, {} blank slots", completed, blank_slots);
        Ok(RenderReport {
            pages_rendered: completed,
            blank_slots,
            blank_handle: if blank_slots > 0 { store.blank_handle() } else { None },
        })
    }

    /// Re-render a single page into its slot, e.g. after a failed batch.
    pub fn render_page_into<R>(
        &self,
        store: &mut ResourceStore,
        renderer: &R,
        page: usize,
    ) -> Result<ResourceHandle, PipelineError>
    where
        R: PageRenderer + ?Sized,
    {
        let page_count = renderer.page_count();
        if page == 0 || page > page_count {
            return Err(PipelineError::PageOutOfRange { page, page_count });
        }
        store.ensure_len(page);
        let backend = store.backend();
        let handle = self.render_one(renderer, backend.as_ref(), page)?;
        store.set_slot(page - 1, PageResource::rendered(handle))?;
        Ok(handle)
    }

    fn render_one<R>(&self, renderer: &R, backend: &dyn ResourceBackend, page: usize) -> Result<ResourceHandle, PipelineError>
    where
        R: PageRenderer + ?Sized,
    {
        let raster = renderer
            .render_page(page, self.render.scale)
            .map_err(|source| PipelineError::PageRenderFailed { page, source })?;
        debug!("rendered page {} ({}x{})", page, raster.width(), raster.height());
        backend
            .encode(&raster, self.render.jpeg_quality)
            .map_err(|e| PipelineError::PageRenderFailed { page, source: Box::new(e) })
    }
}

fn percent(completed: usize, total: usize) -> u8 {
    ((completed * 100 + total / 2) / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::resolve_layout;
    use crate::resource::MemoryBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Start(usize),
        End(usize),
    }

    struct Recorder {
        pages: usize,
        fail_on: Option<usize>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        events: Mutex<Vec<Event>>,
    }

    impl Recorder {
        fn new(pages: usize, fail_on: Option<usize>) -> Self {
            Self {
                pages,
                fail_on,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                events: Mutex::new(vec![]),
            }
        }

        fn position(&self, event: Event) -> Option<usize> {
            self.events.lock().unwrap().iter().position(|e| *e == event)
        }
    }

    impl PageRenderer for Recorder {
        fn page_count(&self) -> usize {
            self.pages
        }

        fn render_page(&self, page: usize, _scale: f32) -> Result<RgbImage, BoxError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.events.lock().unwrap().push(Event::Start(page));
            thread::sleep(Duration::from_millis(10));
            self.events.lock().unwrap().push(Event::End(page));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_on == Some(page) {
                return Err(format!("corrupt page stream on page {}", page).into());
            }
            Ok(RgbImage::from_pixel(4, 4, image::Rgb([page as u8, 0, 0])))
        }
    }

    fn setup() -> (Arc<MemoryBackend>, ResourceStore, RenderPipeline) {
        let backend = Arc::new(MemoryBackend::new());
        let store = ResourceStore::new(backend.clone(), 0);
        let pipeline = RenderPipeline::new(&EngineConfig::default()).unwrap();
        (backend, store, pipeline)
    }

    #[test]
    fn test_progress_is_rounded_percentage() {
        let (_backend, mut store, pipeline) = setup();
        let renderer = Recorder::new(3, None);
        let mut progress = vec![];
        pipeline
            .render(&mut store, &renderer, &resolve_layout(3), |p| progress.push(p))
            .unwrap();
        assert_eq!(progress, vec![33, 67, 100]);
    }

    #[test]
    fn test_batches_never_overlap() {
        let (_backend, mut store, pipeline) = setup();
        let renderer = Recorder::new(5, None);
        pipeline.render(&mut store, &renderer, &resolve_layout(5), |_| {}).unwrap();

        assert!(renderer.peak.load(Ordering::SeqCst) <= 2);
        let batches: [&[usize]; 3] = [&[1, 2], &[3, 4], &[5]];
        for pair in batches.windows(2) {
            let last_end = pair[0]
                .iter()
                .map(|&p| renderer.position(Event::End(p)).unwrap())
                .max()
                .unwrap();
            let first_start = pair[1]
                .iter()
                .map(|&p| renderer.position(Event::Start(p)).unwrap())
                .min()
                .unwrap();
            assert!(last_end < first_start, "batch {:?} started before {:?} settled", pair[1], pair[0]);
        }
    }

    #[test]
    fn test_empty_document_is_rejected() {
        let (backend, mut store, pipeline) = setup();
        let result = pipeline.render(&mut store, &Recorder::new(0, None), &resolve_layout(1), |_| {});
        assert!(matches!(result, Err(PipelineError::EmptyDocument)));
        assert_eq!(backend.encoded_count(), 0);
    }

    #[test]
    fn test_failure_keeps_partial_results() {
        let (_backend, mut store, pipeline) = setup();
        let renderer = Recorder::new(5, Some(3));
        let err = pipeline
            .render(&mut store, &renderer, &resolve_layout(5), |_| {})
            .unwrap_err();

        assert!(matches!(err, PipelineError::PageRenderFailed { page: 3, .. }));
        assert!(err.to_string().contains("page 3"));
        for index in [0, 1, 3] {
            assert!(!store.slot(index).unwrap().is_empty(), "slot {}", index);
        }
        assert!(store.slot(2).unwrap().is_empty());
        assert!(store.slot(4).unwrap().is_empty());
        assert_eq!(renderer.position(Event::Start(5)), None);

        let retry = Recorder::new(5, None);
        pipeline.render_page_into(&mut store, &retry, 3).unwrap();
        assert!(!store.slot(2).unwrap().is_empty());
    }

    #[test]
    fn test_rerender_revokes_previous_page() {
        let (backend, mut store, pipeline) = setup();
        let renderer = Recorder::new(1, None);
        let first = pipeline.render_page_into(&mut store, &renderer, 1).unwrap();
        pipeline.render_page_into(&mut store, &renderer, 1).unwrap();
        assert_eq!(backend.revocation_count(first), 1);
        assert!(matches!(
            pipeline.render_page_into(&mut store, &renderer, 2),
            Err(PipelineError::PageOutOfRange { page: 2, page_count: 1 })
        ));
    }

    #[test]
    fn test_percent_rounding() {
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(8, 8), 100);
        assert_eq!(percent(1, 3), 33);
    }
}
