//! The editing session: one document plus everything needed to edit it undoably.
//!
//! Every user-facing operation goes through [`Session`]. It performs the mutation on the
//! document, records the matching [`Edit`], updates the selection, and queues events and
//! redraws for the host. Unknown pages or annotations make an operation a quiet no-op.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::cache::{CacheKey, Invalidation};
use crate::config::EditorConfig;
use crate::document::{Document, IndexedPage};
use crate::geometry::{Point, Rect, Rotation};
use crate::gesture::{Drag, Tool};
use crate::history::{Applied, Edit, Focus, History, RotationChange};
use crate::hit::{ApproxTextMeasure, Hit};
use crate::model::{
    Annotation, Color, HighlightAnnotation, Page, PageSource, ShapeAnnotation, ShapeKind,
    TextAnnotation,
};
use crate::notice::{NoticeKind, SessionEvent};
use crate::persist::{PersistedDocumentState, StateStore};
use crate::redraw::{RedrawRequest, RedrawScheduler};
use crate::store::{clamp_font_size, ShapeStyle, Size, TextContent};
use crate::{AnnotationId, DocumentInfo, DocumentProvider, PageId, RasterRequest};

/// Offset applied to pasted annotations so they do not sit exactly on the original.
pub const PASTE_OFFSET: f64 = 10.0;

/// Scriptable operations. Pages are addressed by index, annotations by id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    SelectPage { page: usize },
    AddBlankPage,
    AddImagePage { name: String, width: f64, height: f64 },
    DuplicatePage { page: usize },
    DeletePage { page: usize },
    RotatePage { page: usize, degrees: i32 },
    RotatePages { pages: Vec<usize>, degrees: i32 },
    DuplicatePages { pages: Vec<usize> },
    DeletePages { pages: Vec<usize> },
    MovePages { pages: Vec<usize>, destination: usize },
    AddText { page: usize, x: f64, y: f64, text: Option<String> },
    AddHighlight { page: usize, x1: f64, y1: f64, x2: f64, y2: f64 },
    AddShape {
        page: usize,
        shape: ShapeKind,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        #[serde(default)]
        path: Option<Vec<Point>>,
    },
    MoveAnnotation { page: usize, id: AnnotationId, dx: f64, dy: f64 },
    ResizeText { page: usize, id: AnnotationId, font_size: f64 },
    ResizeHighlight { page: usize, id: AnnotationId, width: f64, height: f64 },
    RotateText { page: usize, id: AnnotationId, degrees: f64 },
    UpdateText { page: usize, id: AnnotationId, content: TextContent },
    RecolorHighlight { page: usize, id: AnnotationId, color: Color },
    RestyleShape { page: usize, id: AnnotationId, style: ShapeStyle },
    DeleteAnnotation { page: usize, id: AnnotationId },
    CopyAnnotation { page: usize, id: AnnotationId },
    PasteAnnotation { page: usize },
    SetTool { tool: Tool },
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp { x: f64, y: f64 },
    SetScale { scale: f64 },
    ToggleDarkMode,
    Undo,
    Redo,
}

pub struct Session {
    pub(crate) document: Document,
    pub(crate) history: History,
    pub(crate) selected_page: Option<PageId>,
    pub(crate) selected_annotation: Option<Hit>,
    pub(crate) scale: f64,
    pub(crate) dark_mode: bool,
    pub(crate) config: EditorConfig,
    pub(crate) measure: ApproxTextMeasure,
    pub(crate) tool: Tool,
    pub(crate) drag: Option<Drag>,
    pub(crate) redraw: RedrawScheduler,
    clipboard: Option<Annotation>,
    events: Vec<SessionEvent>,
    store: Arc<dyn StateStore>,
    info: Option<DocumentInfo>,
}

impl Session {
    pub fn new(store: Arc<dyn StateStore>, config: EditorConfig) -> Self {
        Self {
            document: Document::new(),
            history: History::new(config.history.capacity),
            selected_page: None,
            selected_annotation: None,
            scale: config.view.scale,
            dark_mode: config.view.dark_mode,
            measure: ApproxTextMeasure {
                char_width_ratio: config.text.char_width_ratio,
            },
            config,
            tool: Tool::default(),
            drag: None,
            redraw: RedrawScheduler::new(),
            clipboard: None,
            events: Vec::new(),
            store,
            info: None,
        }
    }

    /// Starts editing `document` with an empty history; the first page is selected.
    pub fn with_document(store: Arc<dyn StateStore>, config: EditorConfig, document: Document) -> Self {
        let mut session = Self::new(store, config);
        session.selected_page = document.page_at(0).map(|page| page.id);
        session.document = document;
        session
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn info(&self) -> Option<&DocumentInfo> {
        self.info.as_ref()
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    pub fn selected_page(&self) -> Option<PageId> {
        self.selected_page
    }

    pub fn selected_annotation(&self) -> Option<Hit> {
        self.selected_annotation
    }

    pub fn clipboard(&self) -> Option<&Annotation> {
        self.clipboard.as_ref()
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn take_redraw(&mut self) -> Option<RedrawRequest> {
        self.redraw.take()
    }

    pub fn redraw_scheduler(&self) -> &RedrawScheduler {
        &self.redraw
    }

    #[instrument(skip(self, provider))]
    pub async fn open_with<P: DocumentProvider>(&mut self, provider: &P, path: &Path) -> Result<()> {
        let (info, document) = provider.open(path).await?;
        let state = self.store.load(&info)?.unwrap_or_default();
        debug!(id = %info.id, pages = document.len(), "document opened");

        self.document = document;
        self.history = History::new(self.config.history.capacity);
        self.drag = None;
        self.scale = self.clamp_scale(state.scale);
        self.dark_mode = state.dark_mode;
        let selected = state
            .selected_page
            .filter(|id| self.document.page_index(*id).is_some())
            .or_else(|| self.document.page_at(0).map(|page| page.id));
        self.set_selection(selected, None);
        self.events.push(SessionEvent::DocumentOpened(info.id));
        self.events.push(SessionEvent::InvalidateCache(Invalidation::All));
        self.info = Some(info);
        self.redraw.request(None);
        Ok(())
    }

    /// Saves the view state of the open document, if it came from a provider.
    pub fn persist(&self) -> Result<()> {
        let Some(info) = &self.info else {
            return Ok(());
        };
        let state = PersistedDocumentState {
            selected_page: self.selected_page,
            scale: self.scale,
            dark_mode: self.dark_mode,
        };
        self.store.save(info, &state)
    }

    pub fn cache_key(&self, page: PageId) -> Option<CacheKey> {
        let rotation = self.document.page(page)?.rotation;
        Some(CacheKey::new(page, self.scale, rotation, self.dark_mode))
    }

    pub fn raster_request(&self, page: PageId) -> Option<RasterRequest> {
        let target = self.document.page(page)?;
        Some(RasterRequest {
            key: CacheKey::new(page, self.scale, target.rotation, self.dark_mode),
            page_width: target.width,
            page_height: target.height,
            scale: self.scale,
        })
    }

    // Selection and view

    pub fn select_page(&mut self, page: Option<PageId>) {
        let page = page.filter(|id| self.document.page_index(*id).is_some());
        let annotation = self.selected_annotation.filter(|_| page == self.selected_page);
        self.set_selection(page, annotation);
    }

    pub fn select_annotation(&mut self, page: PageId, id: AnnotationId) -> bool {
        let Some(annotation) = self.document.annotation(page, id) else {
            return false;
        };
        self.set_selection(
            Some(page),
            Some(Hit {
                kind: annotation.kind(),
                id,
            }),
        );
        self.redraw.request(Some(page));
        true
    }

    pub fn clear_annotation_selection(&mut self) {
        if self.selected_annotation.is_some() {
            self.set_selection(self.selected_page, None);
            self.redraw.request(self.selected_page);
        }
    }

    pub fn set_scale(&mut self, scale: f64) {
        let scale = self.clamp_scale(scale);
        if (self.scale - scale).abs() > f64::EPSILON {
            self.scale = scale;
            self.redraw.request(None);
        }
    }

    pub fn toggle_dark_mode(&mut self) {
        self.dark_mode = !self.dark_mode;
        self.events.push(SessionEvent::InvalidateCache(Invalidation::All));
        self.redraw.request(None);
    }

    // Annotations

    pub fn add_text(&mut self, page: PageId, at: Point, text: Option<&str>) -> Option<AnnotationId> {
        let defaults = &self.config.text;
        let annotation = TextAnnotation {
            id: Uuid::new_v4(),
            text: text
                .map(str::to_string)
                .unwrap_or_else(|| defaults.placeholder.clone()),
            x: at.x,
            y: at.y,
            font_size: clamp_font_size(defaults.font_size),
            color: defaults.color,
            rotation: 0.0,
        };
        self.insert_new(page, Annotation::Text(annotation))
    }

    /// Adds a highlight spanning two opposite corners. Rectangles smaller than the
    /// configured minimum in either direction are discarded.
    pub fn add_highlight(&mut self, page: PageId, from: Point, to: Point) -> Option<AnnotationId> {
        let rect = Rect::from_corners(from, to);
        let min = self.config.highlight.min_size;
        if rect.width() < min || rect.height() < min {
            debug!(width = rect.width(), height = rect.height(), "highlight too small, discarded");
            return None;
        }
        let annotation = HighlightAnnotation {
            id: Uuid::new_v4(),
            x: rect.min_x,
            y: rect.max_y,
            width: rect.width(),
            height: rect.height(),
            color: self.config.highlight.color,
        };
        self.insert_new(page, Annotation::Highlight(annotation))
    }

    /// Adds a shape from `from` to `to`. Freehand shapes take their extent from `path`,
    /// which needs at least two points.
    pub fn add_shape(
        &mut self,
        page: PageId,
        kind: ShapeKind,
        from: Point,
        to: Point,
        path: Option<Vec<Point>>,
    ) -> Option<AnnotationId> {
        let (start, end, path) = if kind == ShapeKind::Freehand {
            let path = path.filter(|points| points.len() >= 2)?;
            let mut bounds = Rect::from_corners(path[0], path[0]);
            for point in &path[1..] {
                bounds.include(*point);
            }
            (
                Point::new(bounds.min_x, bounds.min_y),
                Point::new(bounds.max_x, bounds.max_y),
                Some(path),
            )
        } else {
            if from.distance_to(to) <= f64::EPSILON {
                return None;
            }
            (from, to, None)
        };
        let style = &self.config.shape;
        let annotation = ShapeAnnotation {
            id: Uuid::new_v4(),
            kind,
            x1: start.x,
            y1: start.y,
            x2: end.x,
            y2: end.y,
            stroke_color: style.stroke_color,
            stroke_width: style.stroke_width,
            fill_color: style.fill_color,
            path,
        };
        self.insert_new(page, Annotation::Shape(annotation))
    }

    pub fn move_annotation(&mut self, page: PageId, id: AnnotationId, dx: f64, dy: f64) -> bool {
        self.translate(page, id, dx, dy, false)
    }

    /// Like [`Session::move_annotation`], but repeated nudges of the same annotation
    /// fold into one undo step.
    pub fn nudge_annotation(&mut self, page: PageId, id: AnnotationId, dx: f64, dy: f64) -> bool {
        self.translate(page, id, dx, dy, true)
    }

    fn translate(&mut self, page: PageId, id: AnnotationId, dx: f64, dy: f64, coalesce: bool) -> bool {
        if dx == 0.0 && dy == 0.0 {
            return false;
        }
        let Some(before) = self.document.move_annotation(page, id, dx, dy) else {
            return false;
        };
        let Some(after) = self.document.placement(page, id) else {
            return false;
        };
        let edit = Edit::MoveAnnotation {
            page,
            id,
            before,
            after,
        };
        if coalesce {
            self.record_coalescing(edit);
        } else {
            self.record(edit);
        }
        self.redraw.request(Some(page));
        true
    }

    pub fn resize_text(&mut self, page: PageId, id: AnnotationId, font_size: f64) -> bool {
        let Some(before) = self.document.resize_text(page, id, font_size) else {
            return false;
        };
        let after = clamp_font_size(font_size);
        self.record_change(
            before != after,
            Edit::ResizeText {
                page,
                id,
                before,
                after,
            },
        )
    }

    pub fn resize_highlight(&mut self, page: PageId, id: AnnotationId, width: f64, height: f64) -> bool {
        let after = self.committed_highlight_size(width, height);
        let Some(before) = self
            .document
            .resize_highlight(page, id, after.width, after.height)
        else {
            return false;
        };
        self.record_change(
            before != after,
            Edit::ResizeHighlight {
                page,
                id,
                before,
                after,
            },
        )
    }

    pub fn rotate_text(&mut self, page: PageId, id: AnnotationId, degrees: f64) -> bool {
        let Some(before) = self.document.rotate_text(page, id, degrees) else {
            return false;
        };
        self.record_change(
            before != degrees,
            Edit::RotateText {
                page,
                id,
                before,
                after: degrees,
            },
        )
    }

    /// Replaces text, color and size together. Consecutive updates of the same
    /// annotation coalesce, so typing undoes as one step.
    pub fn update_text(&mut self, page: PageId, id: AnnotationId, content: TextContent) -> bool {
        let Some(before) = self.document.update_text_content(page, id, content) else {
            return false;
        };
        let Some(after) = self.document.text_content(page, id) else {
            return false;
        };
        if before == after {
            return false;
        }
        self.record_coalescing(Edit::UpdateText {
            page,
            id,
            before,
            after,
        });
        self.redraw.request(Some(page));
        true
    }

    pub fn recolor_highlight(&mut self, page: PageId, id: AnnotationId, color: Color) -> bool {
        let Some(before) = self.document.recolor_highlight(page, id, color) else {
            return false;
        };
        self.record_change(
            before != color,
            Edit::RecolorHighlight {
                page,
                id,
                before,
                after: color,
            },
        )
    }

    pub fn restyle_shape(&mut self, page: PageId, id: AnnotationId, style: ShapeStyle) -> bool {
        let Some(before) = self.document.restyle_shape(page, id, style) else {
            return false;
        };
        let after = ShapeStyle {
            stroke_width: style.stroke_width.max(0.0),
            ..style
        };
        self.record_change(
            before != after,
            Edit::RestyleShape {
                page,
                id,
                before,
                after,
            },
        )
    }

    pub fn delete_annotation(&mut self, page: PageId, id: AnnotationId) -> bool {
        self.cancel_drag();
        let Some((index, annotation)) = self.document.delete_annotation(page, id) else {
            return false;
        };
        self.record(Edit::DeleteAnnotation {
            page,
            index,
            annotation,
        });
        if self.selected_annotation.map(|hit| hit.id) == Some(id) {
            self.set_selection(self.selected_page, None);
        }
        self.notify(NoticeKind::AnnotationDeleted);
        self.redraw.request(Some(page));
        true
    }

    pub fn delete_selected_annotation(&mut self) -> bool {
        match (self.selected_page, self.selected_annotation) {
            (Some(page), Some(hit)) => self.delete_annotation(page, hit.id),
            _ => false,
        }
    }

    pub fn copy_annotation(&mut self, page: PageId, id: AnnotationId) -> bool {
        let Some(annotation) = self.document.annotation(page, id) else {
            return false;
        };
        self.clipboard = Some(annotation);
        self.notify(NoticeKind::CopiedToClipboard);
        true
    }

    /// Pastes a copy of the clipboard onto `page`, under a fresh id and slightly offset.
    pub fn paste_annotation(&mut self, page: PageId) -> Option<AnnotationId> {
        let Some(copy) = self.clipboard.as_ref().map(Annotation::with_new_id) else {
            self.notify(NoticeKind::ClipboardEmpty);
            return None;
        };
        let id = copy.id();
        let kind = copy.kind();
        let index = self.document.add_annotation(page, copy)?;
        self.document.move_annotation(page, id, PASTE_OFFSET, -PASTE_OFFSET);
        let annotation = self.document.annotation(page, id)?;
        self.record(Edit::AddAnnotation {
            page,
            index,
            annotation,
        });
        self.set_selection(Some(page), Some(Hit { kind, id }));
        self.redraw.request(Some(page));
        Some(id)
    }

    fn insert_new(&mut self, page: PageId, annotation: Annotation) -> Option<AnnotationId> {
        let id = annotation.id();
        let kind = annotation.kind();
        let index = self.document.add_annotation(page, annotation.clone())?;
        self.record(Edit::AddAnnotation {
            page,
            index,
            annotation,
        });
        self.set_selection(Some(page), Some(Hit { kind, id }));
        self.redraw.request(Some(page));
        Some(id)
    }

    // Pages

    /// Inserts a blank page after the selected one, sized like it.
    pub fn add_blank_page(&mut self) -> PageId {
        let (width, height) = self
            .selected_page
            .and_then(|id| self.document.page(id))
            .map(|page| (page.width, page.height))
            .unwrap_or(self.config.view.blank_page_size);
        let page = Page::blank(width, height);
        self.insert_page(page, false)
    }

    /// Inserts a page showing an external image of the given size in page points.
    pub fn add_image_page(&mut self, name: &str, width: f64, height: f64) -> PageId {
        let page = Page::new(
            width,
            height,
            PageSource::Image {
                name: name.to_string(),
            },
        );
        self.insert_page(page, true)
    }

    fn insert_page(&mut self, page: Page, image: bool) -> PageId {
        self.cancel_drag();
        let id = page.id;
        let index = self.document.insert_page(self.insertion_index(), page.clone());
        let entry = IndexedPage { index, page };
        self.record(if image {
            Edit::AddImage(entry)
        } else {
            Edit::AddPage(entry)
        });
        self.set_selection(Some(id), None);
        self.redraw.request(None);
        id
    }

    fn insertion_index(&self) -> usize {
        self.selected_page
            .and_then(|id| self.document.page_index(id))
            .map(|index| index + 1)
            .unwrap_or(self.document.len())
    }

    pub fn duplicate_page(&mut self, page: PageId) -> Option<PageId> {
        self.cancel_drag();
        let index = self.document.page_index(page)?;
        let copy = self.document.page(page)?.duplicate();
        let id = copy.id;
        let index = self.document.insert_page(index + 1, copy.clone());
        self.record(Edit::DuplicatePage {
            source: page,
            inserted: IndexedPage { index, page: copy },
        });
        self.set_selection(Some(id), None);
        self.notify(NoticeKind::PageDuplicated);
        self.redraw.request(None);
        Some(id)
    }

    pub fn delete_page(&mut self, page: PageId) -> bool {
        self.cancel_drag();
        let Some(removed) = self.document.remove_page(page) else {
            return false;
        };
        let neighbor = self.clamp_index(removed.index);
        self.record(Edit::DeletePage(removed));
        self.events
            .push(SessionEvent::InvalidateCache(Invalidation::Page(page)));
        self.select_index(neighbor);
        self.notify(NoticeKind::PageDeleted {
            remaining: self.document.len(),
        });
        self.redraw.request(None);
        true
    }

    /// Rotates by `degrees`, rounded to quarter turns. Returns `false` when nothing changed.
    pub fn rotate_page(&mut self, page: PageId, degrees: i32) -> bool {
        self.cancel_drag();
        let Some(before) = self.document.page(page).map(|target| target.rotation) else {
            return false;
        };
        let after = before.rotate_by(degrees);
        if after == before {
            return false;
        }
        self.document.set_rotation(page, after);
        self.record(Edit::RotatePage(RotationChange {
            page,
            before,
            after,
        }));
        self.events
            .push(SessionEvent::InvalidateCache(Invalidation::Page(page)));
        self.redraw.request(Some(page));
        true
    }

    /// Rotates every listed page as one undo step. Returns how many pages turned.
    pub fn rotate_pages(&mut self, pages: &[PageId], degrees: i32) -> usize {
        self.cancel_drag();
        let mut changes: Vec<RotationChange> = Vec::new();
        for &page in pages {
            if changes.iter().any(|change| change.page == page) {
                continue;
            }
            let Some(before) = self.document.page(page).map(|target| target.rotation) else {
                continue;
            };
            let after = before.rotate_by(degrees);
            if after != before {
                self.document.set_rotation(page, after);
                changes.push(RotationChange {
                    page,
                    before,
                    after,
                });
            }
        }
        if changes.is_empty() {
            return 0;
        }
        for change in &changes {
            self.events
                .push(SessionEvent::InvalidateCache(Invalidation::Page(change.page)));
        }
        let count = changes.len();
        self.record(Edit::BatchRotate { changes });
        self.redraw.request(None);
        count
    }

    /// Duplicates each listed page right after itself, as one undo step.
    pub fn duplicate_pages(&mut self, pages: &[PageId]) -> Vec<PageId> {
        self.cancel_drag();
        let mut sources: Vec<(usize, PageId)> = pages
            .iter()
            .filter_map(|id| self.document.page_index(*id).map(|index| (index, *id)))
            .collect();
        sources.sort_unstable_by_key(|(index, _)| *index);
        sources.dedup();

        let mut copies: Vec<Page> = Vec::with_capacity(sources.len());
        for (_, id) in sources.iter().rev() {
            let (Some(index), Some(source)) = (self.document.page_index(*id), self.document.page(*id))
            else {
                continue;
            };
            let copy = source.duplicate();
            self.document.insert_page(index + 1, copy.clone());
            copies.push(copy);
        }
        if copies.is_empty() {
            return Vec::new();
        }

        let mut inserted: Vec<IndexedPage> = copies
            .into_iter()
            .filter_map(|page| {
                self.document
                    .page_index(page.id)
                    .map(|index| IndexedPage { index, page })
            })
            .collect();
        inserted.sort_by_key(|entry| entry.index);
        let ids: Vec<PageId> = inserted.iter().map(|entry| entry.page.id).collect();
        self.record(Edit::BatchDuplicate { inserted });
        self.set_selection(ids.first().copied(), None);
        self.redraw.request(None);
        ids
    }

    /// Deletes every listed page as one undo step. Returns how many were removed.
    pub fn delete_pages(&mut self, pages: &[PageId]) -> usize {
        self.cancel_drag();
        let removed = self.document.remove_pages(pages);
        let Some(lowest) = removed.first().map(|entry| entry.index) else {
            return 0;
        };
        let count = removed.len();
        for entry in &removed {
            self.events
                .push(SessionEvent::InvalidateCache(Invalidation::Page(entry.page.id)));
        }
        self.record(Edit::BatchDelete { removed });
        self.select_index(self.clamp_index(lowest));
        self.notify(NoticeKind::PagesDeleted { count });
        self.redraw.request(None);
        count
    }

    /// Moves the listed pages as a block to `destination`, counted with the moved
    /// pages taken out. A move that leaves the order unchanged records nothing.
    pub fn move_pages(&mut self, pages: &[PageId], destination: usize) -> bool {
        self.cancel_drag();
        let before = self.document.page_ids();
        let moved = self.document.move_pages(pages, destination);
        if moved.is_empty() || self.document.page_ids() == before {
            return false;
        }
        let count = moved.len();
        self.record(Edit::BatchMove { moved, destination });
        self.notify(NoticeKind::PagesMoved { count });
        self.redraw.request(None);
        true
    }

    // History

    #[instrument(skip(self))]
    pub fn undo(&mut self) -> bool {
        self.cancel_drag();
        let Some(edit) = self.history.take_undo() else {
            self.notify(NoticeKind::NothingToUndo);
            return false;
        };
        match edit.revert(&mut self.document) {
            Some(applied) => self.settle(applied),
            None => debug!(edit = edit.label(), "undo target is gone"),
        }
        self.notify(NoticeKind::Undone { label: edit.label() });
        self.history.push_redo(edit);
        self.redraw.request(None);
        true
    }

    #[instrument(skip(self))]
    pub fn redo(&mut self) -> bool {
        self.cancel_drag();
        let Some(edit) = self.history.take_redo() else {
            self.notify(NoticeKind::NothingToRedo);
            return false;
        };
        match edit.reapply(&mut self.document) {
            Some(applied) => self.settle(applied),
            None => debug!(edit = edit.label(), "redo target is gone"),
        }
        self.notify(NoticeKind::Redone { label: edit.label() });
        self.history.push_undo(edit);
        self.redraw.request(None);
        true
    }

    fn settle(&mut self, applied: Applied) {
        for page in applied.invalidated {
            self.events
                .push(SessionEvent::InvalidateCache(Invalidation::Page(page)));
        }
        match applied.focus {
            Focus::Unchanged => self.repair_selection(),
            Focus::Page(index) => self.select_index(index),
            Focus::Annotation { page, id } => {
                if !self.select_annotation(page, id) {
                    self.repair_selection();
                }
            }
            Focus::ClearAnnotation => {
                self.set_selection(self.selected_page, None);
                self.repair_selection();
            }
        }
    }

    /// Drops selection entries that point at pages or annotations that no longer exist.
    fn repair_selection(&mut self) {
        let page = self
            .selected_page
            .filter(|id| self.document.page_index(*id).is_some());
        let annotation = self.selected_annotation.filter(|hit| {
            page.and_then(|id| self.document.page(id))
                .is_some_and(|target| target.contains_annotation(hit.id))
        });
        self.set_selection(page, annotation);
    }

    /// Applies one scripted command.
    #[instrument(skip(self))]
    pub fn apply(&mut self, command: Command) -> Result<()> {
        match command {
            Command::SelectPage { page } => {
                if let Some(id) = self.page_id(page) {
                    self.select_page(Some(id));
                }
            }
            Command::AddBlankPage => {
                self.add_blank_page();
            }
            Command::AddImagePage {
                name,
                width,
                height,
            } => {
                self.add_image_page(&name, width, height);
            }
            Command::DuplicatePage { page } => {
                if let Some(id) = self.page_id(page) {
                    self.duplicate_page(id);
                }
            }
            Command::DeletePage { page } => {
                if let Some(id) = self.page_id(page) {
                    self.delete_page(id);
                }
            }
            Command::RotatePage { page, degrees } => {
                if let Some(id) = self.page_id(page) {
                    self.rotate_page(id, degrees);
                }
            }
            Command::RotatePages { pages, degrees } => {
                let ids = self.page_ids(&pages);
                self.rotate_pages(&ids, degrees);
            }
            Command::DuplicatePages { pages } => {
                let ids = self.page_ids(&pages);
                self.duplicate_pages(&ids);
            }
            Command::DeletePages { pages } => {
                let ids = self.page_ids(&pages);
                self.delete_pages(&ids);
            }
            Command::MovePages { pages, destination } => {
                let ids = self.page_ids(&pages);
                self.move_pages(&ids, destination);
            }
            Command::AddText { page, x, y, text } => {
                if let Some(id) = self.page_id(page) {
                    self.add_text(id, Point::new(x, y), text.as_deref());
                }
            }
            Command::AddHighlight { page, x1, y1, x2, y2 } => {
                if let Some(id) = self.page_id(page) {
                    self.add_highlight(id, Point::new(x1, y1), Point::new(x2, y2));
                }
            }
            Command::AddShape {
                page,
                shape,
                x1,
                y1,
                x2,
                y2,
                path,
            } => {
                if let Some(id) = self.page_id(page) {
                    self.add_shape(id, shape, Point::new(x1, y1), Point::new(x2, y2), path);
                }
            }
            Command::MoveAnnotation { page, id, dx, dy } => {
                if let Some(page) = self.page_id(page) {
                    self.move_annotation(page, id, dx, dy);
                }
            }
            Command::ResizeText { page, id, font_size } => {
                if let Some(page) = self.page_id(page) {
                    self.resize_text(page, id, font_size);
                }
            }
            Command::ResizeHighlight {
                page,
                id,
                width,
                height,
            } => {
                if let Some(page) = self.page_id(page) {
                    self.resize_highlight(page, id, width, height);
                }
            }
            Command::RotateText { page, id, degrees } => {
                if let Some(page) = self.page_id(page) {
                    self.rotate_text(page, id, degrees);
                }
            }
            Command::UpdateText { page, id, content } => {
                if let Some(page) = self.page_id(page) {
                    self.update_text(page, id, content);
                }
            }
            Command::RecolorHighlight { page, id, color } => {
                if let Some(page) = self.page_id(page) {
                    self.recolor_highlight(page, id, color);
                }
            }
            Command::RestyleShape { page, id, style } => {
                if let Some(page) = self.page_id(page) {
                    self.restyle_shape(page, id, style);
                }
            }
            Command::DeleteAnnotation { page, id } => {
                if let Some(page) = self.page_id(page) {
                    self.delete_annotation(page, id);
                }
            }
            Command::CopyAnnotation { page, id } => {
                if let Some(page) = self.page_id(page) {
                    self.copy_annotation(page, id);
                }
            }
            Command::PasteAnnotation { page } => {
                if let Some(page) = self.page_id(page) {
                    self.paste_annotation(page);
                }
            }
            Command::SetTool { tool } => self.set_tool(tool),
            Command::PointerDown { x, y } => {
                self.pointer_down(Point::new(x, y));
            }
            Command::PointerMove { x, y } => self.pointer_move(Point::new(x, y)),
            Command::PointerUp { x, y } => {
                self.pointer_up(Point::new(x, y));
            }
            Command::SetScale { scale } => self.set_scale(scale),
            Command::ToggleDarkMode => self.toggle_dark_mode(),
            Command::Undo => {
                self.undo();
            }
            Command::Redo => {
                self.redo();
            }
        }
        Ok(())
    }

    fn page_id(&self, index: usize) -> Option<PageId> {
        let id = self.document.page_at(index).map(|page| page.id);
        if id.is_none() {
            debug!(index, pages = self.document.len(), "page index out of range");
        }
        id
    }

    fn page_ids(&self, indices: &[usize]) -> Vec<PageId> {
        indices.iter().filter_map(|index| self.page_id(*index)).collect()
    }

    // Bookkeeping

    pub(crate) fn record(&mut self, edit: Edit) {
        debug!(edit = edit.label(), depth = self.history.undo_len() + 1, "edit recorded");
        self.history.record(edit);
    }

    fn record_coalescing(&mut self, edit: Edit) {
        let label = edit.label();
        if self.history.record_coalescing(edit) {
            debug!(edit = label, "edit folded into previous step");
        } else {
            debug!(edit = label, depth = self.history.undo_len(), "edit recorded");
        }
    }

    fn record_change(&mut self, changed: bool, edit: Edit) -> bool {
        if !changed {
            return false;
        }
        let page = match &edit {
            Edit::ResizeText { page, .. }
            | Edit::ResizeHighlight { page, .. }
            | Edit::RotateText { page, .. }
            | Edit::RecolorHighlight { page, .. }
            | Edit::RestyleShape { page, .. } => Some(*page),
            _ => None,
        };
        self.record(edit);
        self.redraw.request(page);
        true
    }

    pub(crate) fn set_selection(&mut self, page: Option<PageId>, annotation: Option<Hit>) {
        if self.selected_page == page && self.selected_annotation == annotation {
            return;
        }
        self.selected_page = page;
        self.selected_annotation = annotation;
        self.events.push(SessionEvent::SelectionChanged {
            page,
            annotation: annotation.map(|hit| hit.id),
        });
    }

    fn select_index(&mut self, index: Option<usize>) {
        let page = index.and_then(|index| self.document.page_at(index)).map(|page| page.id);
        self.set_selection(page, None);
    }

    fn clamp_index(&self, index: usize) -> Option<usize> {
        if self.document.is_empty() {
            None
        } else {
            Some(index.min(self.document.len() - 1))
        }
    }

    /// Committed highlights never go below the configured minimum on either side.
    pub(crate) fn committed_highlight_size(&self, width: f64, height: f64) -> Size {
        let min = self.config.highlight.min_size;
        Size {
            width: width.max(min),
            height: height.max(min),
        }
    }

    fn clamp_scale(&self, scale: f64) -> f64 {
        let view = &self.config.view;
        if scale.is_finite() {
            scale.clamp(view.min_scale, view.max_scale)
        } else {
            view.scale
        }
    }

    pub(crate) fn notify(&mut self, kind: NoticeKind) {
        self.events.push(SessionEvent::Notice(kind.into()));
    }

    pub(crate) fn page_geometry(&self, page: PageId) -> Option<(f64, f64, Rotation)> {
        self.document
            .page(page)
            .map(|target| (target.width, target.height, target.rotation))
    }
}
