use std::collections::{HashMap, VecDeque};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use folio_core::geometry::surface_size;
use folio_core::{CacheKey, Invalidation, PageRasterizer, RasterRequest, RenderImage, SessionEvent};
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use tracing::{debug, instrument, trace};

pub const DEFAULT_CACHE_CAPACITY: usize = 32;

const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);
const EDGE: Rgba<u8> = Rgba([200, 200, 200, 255]);

/// Rendered page surfaces keyed by [`CacheKey`]. Shared between the host and any
/// rasterizer workers, hence the lock.
pub struct PageCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, RenderImage>,
    order: VecDeque<CacheKey>,
}

impl PageCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<RenderImage> {
        self.state.lock().entries.get(key).cloned()
    }

    /// Stores a surface, evicting the oldest insertion once over capacity.
    pub fn insert(&self, key: CacheKey, image: RenderImage) {
        let mut state = self.state.lock();
        if state.entries.insert(key, image).is_none() {
            state.order.push_back(key);
        }
        while state.entries.len() > self.capacity {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            state.entries.remove(&oldest);
            trace!(page = %oldest.page, "evicted cached surface");
        }
    }

    pub fn invalidate(&self, invalidation: &Invalidation) -> usize {
        let mut state = self.state.lock();
        let before = state.entries.len();
        state.entries.retain(|key, _| !invalidation.covers(key));
        state.order.retain(|key| !invalidation.covers(key));
        let dropped = before - state.entries.len();
        debug!(?invalidation, dropped, "cache invalidated");
        dropped
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

/// Stand-in rasterizer: a paper-colored surface of the rotated page size with a
/// one-pixel edge. Dark mode inverts it.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainRasterizer;

impl PageRasterizer for PlainRasterizer {
    #[instrument(skip(self))]
    fn rasterize(&self, request: &RasterRequest) -> Result<RenderImage> {
        let (width, height) = surface_size(
            request.page_width,
            request.page_height,
            request.scale,
            request.key.rotation,
        );
        let width = pixel_extent(width)
            .ok_or_else(|| anyhow!("surface width {width} is not drawable"))?;
        let height = pixel_extent(height)
            .ok_or_else(|| anyhow!("surface height {height} is not drawable"))?;

        let mut image = RgbaImage::from_pixel(width, height, PAPER);
        for x in 0..width {
            image.put_pixel(x, 0, EDGE);
            image.put_pixel(x, height - 1, EDGE);
        }
        for y in 0..height {
            image.put_pixel(0, y, EDGE);
            image.put_pixel(width - 1, y, EDGE);
        }

        let mut pixels = image.into_raw();
        if request.key.dark_mode {
            invert_pixels(&mut pixels);
        }
        Ok(RenderImage {
            width,
            height,
            pixels,
        })
    }
}

fn pixel_extent(value: f64) -> Option<u32> {
    let rounded = value.ceil();
    (rounded.is_finite() && rounded >= 1.0 && rounded <= f64::from(u32::MAX)).then_some(rounded as u32)
}

fn invert_pixels(pixels: &mut [u8]) {
    for chunk in pixels.chunks_exact_mut(4) {
        chunk[0] = 255 - chunk[0];
        chunk[1] = 255 - chunk[1];
        chunk[2] = 255 - chunk[2];
    }
}

/// Cache in front of a rasterizer.
pub struct Renderer<R: PageRasterizer> {
    rasterizer: R,
    cache: PageCache,
}

impl<R: PageRasterizer> Renderer<R> {
    pub fn new(rasterizer: R, capacity: usize) -> Self {
        Self {
            rasterizer,
            cache: PageCache::new(capacity),
        }
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    #[instrument(skip(self), fields(page = %request.key.page))]
    pub fn render(&self, request: &RasterRequest) -> Result<RenderImage> {
        if let Some(image) = self.cache.get(&request.key) {
            trace!("cache hit");
            return Ok(image);
        }
        let image = self.rasterizer.rasterize(request)?;
        self.cache.insert(request.key, image.clone());
        Ok(image)
    }

    /// Applies every cache invalidation found in a batch of session events.
    pub fn handle_events(&self, events: &[SessionEvent]) {
        for event in events {
            if let SessionEvent::InvalidateCache(invalidation) = event {
                self.cache.invalidate(invalidation);
            }
        }
    }
}

pub fn save_png(image: &RenderImage, path: &Path) -> Result<()> {
    let buffer = RgbaImage::from_raw(image.width, image.height, image.pixels.clone())
        .ok_or_else(|| anyhow!("pixel buffer does not match {}x{}", image.width, image.height))?;
    buffer
        .save(path)
        .with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}
