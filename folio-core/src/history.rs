//! Undo/redo records and the bounded stacks that hold them.
//!
//! An [`Edit`] carries just enough to go both ways: literal before/after values for
//! field mutations (looked up by id), or full entity copies plus indices for structural
//! changes. Applying a record in either direction is best-effort; a target that has
//! gone missing in the meantime turns that step into a no-op.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::document::{Document, IndexedPage, MovedPage};
use crate::geometry::Rotation;
use crate::model::{Annotation, Color};
use crate::store::{Placement, ShapeStyle, Size, TextContent};
use crate::{AnnotationId, PageId};

pub const DEFAULT_CAPACITY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationChange {
    pub page: PageId,
    pub before: Rotation,
    pub after: Rotation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Edit {
    AddAnnotation {
        page: PageId,
        index: usize,
        annotation: Annotation,
    },
    DeleteAnnotation {
        page: PageId,
        index: usize,
        annotation: Annotation,
    },
    MoveAnnotation {
        page: PageId,
        id: AnnotationId,
        before: Placement,
        after: Placement,
    },
    ResizeText {
        page: PageId,
        id: AnnotationId,
        before: f64,
        after: f64,
    },
    ResizeHighlight {
        page: PageId,
        id: AnnotationId,
        before: Size,
        after: Size,
    },
    RotateText {
        page: PageId,
        id: AnnotationId,
        before: f64,
        after: f64,
    },
    UpdateText {
        page: PageId,
        id: AnnotationId,
        before: TextContent,
        after: TextContent,
    },
    RecolorHighlight {
        page: PageId,
        id: AnnotationId,
        before: Color,
        after: Color,
    },
    RestyleShape {
        page: PageId,
        id: AnnotationId,
        before: ShapeStyle,
        after: ShapeStyle,
    },
    RotatePage(RotationChange),
    AddPage(IndexedPage),
    AddImage(IndexedPage),
    DuplicatePage {
        source: PageId,
        inserted: IndexedPage,
    },
    DeletePage(IndexedPage),
    BatchRotate {
        changes: Vec<RotationChange>,
    },
    BatchDuplicate {
        inserted: Vec<IndexedPage>,
    },
    BatchDelete {
        removed: Vec<IndexedPage>,
    },
    BatchMove {
        moved: Vec<MovedPage>,
        destination: usize,
    },
}

/// What the host should select once a record has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Unchanged,
    /// Select the page at this index, or nothing when `None`.
    Page(Option<usize>),
    Annotation { page: PageId, id: AnnotationId },
    ClearAnnotation,
}

/// Side effects of applying a record, for selection and cache invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub focus: Focus,
    /// Pages whose rendered bitmaps are stale (rotation changed or page removed).
    pub invalidated: Vec<PageId>,
}

impl Applied {
    fn focus(focus: Focus) -> Self {
        Self {
            focus,
            invalidated: Vec::new(),
        }
    }

    fn invalidating(focus: Focus, pages: Vec<PageId>) -> Self {
        Self {
            focus,
            invalidated: pages,
        }
    }
}

impl Edit {
    pub fn label(&self) -> &'static str {
        match self {
            Edit::AddAnnotation { .. } => "add annotation",
            Edit::DeleteAnnotation { .. } => "delete annotation",
            Edit::MoveAnnotation { .. } => "move annotation",
            Edit::ResizeText { .. } => "resize text",
            Edit::ResizeHighlight { .. } => "resize highlight",
            Edit::RotateText { .. } => "rotate text",
            Edit::UpdateText { .. } => "edit text",
            Edit::RecolorHighlight { .. } => "recolor highlight",
            Edit::RestyleShape { .. } => "restyle shape",
            Edit::RotatePage(_) => "rotate page",
            Edit::AddPage(_) => "add page",
            Edit::AddImage(_) => "add image",
            Edit::DuplicatePage { .. } => "duplicate page",
            Edit::DeletePage(_) => "delete page",
            Edit::BatchRotate { .. } => "rotate pages",
            Edit::BatchDuplicate { .. } => "duplicate pages",
            Edit::BatchDelete { .. } => "delete pages",
            Edit::BatchMove { .. } => "move pages",
        }
    }

    /// Field mutations on one target can be folded into a single record.
    fn target(&self) -> Option<(PageId, AnnotationId)> {
        match self {
            Edit::MoveAnnotation { page, id, .. }
            | Edit::ResizeText { page, id, .. }
            | Edit::ResizeHighlight { page, id, .. }
            | Edit::RotateText { page, id, .. }
            | Edit::UpdateText { page, id, .. }
            | Edit::RecolorHighlight { page, id, .. }
            | Edit::RestyleShape { page, id, .. } => Some((*page, *id)),
            _ => None,
        }
    }

    /// Folds `newer` into `self` when both mutate the same field of the same target:
    /// keeps this record's "before" and takes the newer "after".
    fn absorb(&mut self, newer: Edit) -> Result<(), Edit> {
        if self.target().is_none() || self.target() != newer.target() {
            return Err(newer);
        }
        match (self, newer) {
            (Edit::MoveAnnotation { after, .. }, Edit::MoveAnnotation { after: next, .. }) => *after = next,
            (Edit::ResizeText { after, .. }, Edit::ResizeText { after: next, .. }) => *after = next,
            (Edit::ResizeHighlight { after, .. }, Edit::ResizeHighlight { after: next, .. }) => *after = next,
            (Edit::RotateText { after, .. }, Edit::RotateText { after: next, .. }) => *after = next,
            (Edit::UpdateText { after, .. }, Edit::UpdateText { after: next, .. }) => *after = next,
            (Edit::RecolorHighlight { after, .. }, Edit::RecolorHighlight { after: next, .. }) => *after = next,
            (Edit::RestyleShape { after, .. }, Edit::RestyleShape { after: next, .. }) => *after = next,
            (_, newer) => return Err(newer),
        }
        Ok(())
    }

    /// Applies the inverse of this record. `None` when the target no longer exists.
    pub fn revert(&self, doc: &mut Document) -> Option<Applied> {
        match self {
            Edit::AddAnnotation { page, annotation, .. } => {
                doc.delete_annotation(*page, annotation.id())?;
                Some(Applied::focus(Focus::ClearAnnotation))
            }
            Edit::DeleteAnnotation {
                page,
                index,
                annotation,
            } => {
                if !doc.insert_annotation(*page, *index, annotation.clone()) {
                    return None;
                }
                Some(Applied::focus(Focus::Annotation {
                    page: *page,
                    id: annotation.id(),
                }))
            }
            Edit::MoveAnnotation { page, id, before, .. } => {
                doc.set_placement(*page, *id, before).then(|| select(*page, *id))
            }
            Edit::ResizeText { page, id, before, .. } => {
                doc.resize_text(*page, *id, *before).map(|_| select(*page, *id))
            }
            Edit::ResizeHighlight { page, id, before, .. } => doc
                .resize_highlight(*page, *id, before.width, before.height)
                .map(|_| select(*page, *id)),
            Edit::RotateText { page, id, before, .. } => {
                doc.rotate_text(*page, *id, *before).map(|_| select(*page, *id))
            }
            Edit::UpdateText { page, id, before, .. } => doc
                .update_text_content(*page, *id, before.clone())
                .map(|_| select(*page, *id)),
            Edit::RecolorHighlight { page, id, before, .. } => {
                doc.recolor_highlight(*page, *id, *before).map(|_| select(*page, *id))
            }
            Edit::RestyleShape { page, id, before, .. } => {
                doc.restyle_shape(*page, *id, *before).map(|_| select(*page, *id))
            }
            Edit::RotatePage(change) => set_rotations(doc, std::slice::from_ref(change), |c| c.before),
            Edit::AddPage(entry) | Edit::AddImage(entry) => remove_inserted(doc, std::slice::from_ref(entry)),
            Edit::DuplicatePage { inserted, .. } => remove_inserted(doc, std::slice::from_ref(inserted)),
            Edit::BatchDuplicate { inserted } => remove_inserted(doc, inserted),
            Edit::DeletePage(entry) => restore_deleted(doc, std::slice::from_ref(entry)),
            Edit::BatchDelete { removed } => restore_deleted(doc, removed),
            Edit::BatchRotate { changes } => set_rotations(doc, changes, |c| c.before),
            Edit::BatchMove { moved, .. } => {
                if moved.iter().all(|entry| doc.page_index(entry.page).is_none()) {
                    return None;
                }
                doc.unmove_pages(moved);
                let first = moved.iter().filter_map(|entry| doc.page_index(entry.page)).min();
                Some(Applied::focus(Focus::Page(first)))
            }
        }
    }

    /// Re-applies the forward effect of this record. `None` when the target is gone.
    pub fn reapply(&self, doc: &mut Document) -> Option<Applied> {
        match self {
            Edit::AddAnnotation {
                page,
                index,
                annotation,
            } => {
                if !doc.insert_annotation(*page, *index, annotation.clone()) {
                    return None;
                }
                Some(Applied::focus(Focus::Annotation {
                    page: *page,
                    id: annotation.id(),
                }))
            }
            Edit::DeleteAnnotation { page, annotation, .. } => {
                doc.delete_annotation(*page, annotation.id())?;
                Some(Applied::focus(Focus::ClearAnnotation))
            }
            Edit::MoveAnnotation { page, id, after, .. } => {
                doc.set_placement(*page, *id, after).then(|| select(*page, *id))
            }
            Edit::ResizeText { page, id, after, .. } => {
                doc.resize_text(*page, *id, *after).map(|_| select(*page, *id))
            }
            Edit::ResizeHighlight { page, id, after, .. } => doc
                .resize_highlight(*page, *id, after.width, after.height)
                .map(|_| select(*page, *id)),
            Edit::RotateText { page, id, after, .. } => {
                doc.rotate_text(*page, *id, *after).map(|_| select(*page, *id))
            }
            Edit::UpdateText { page, id, after, .. } => doc
                .update_text_content(*page, *id, after.clone())
                .map(|_| select(*page, *id)),
            Edit::RecolorHighlight { page, id, after, .. } => {
                doc.recolor_highlight(*page, *id, *after).map(|_| select(*page, *id))
            }
            Edit::RestyleShape { page, id, after, .. } => {
                doc.restyle_shape(*page, *id, *after).map(|_| select(*page, *id))
            }
            Edit::RotatePage(change) => set_rotations(doc, std::slice::from_ref(change), |c| c.after),
            Edit::AddPage(entry) | Edit::AddImage(entry) => reinsert(doc, std::slice::from_ref(entry)),
            Edit::DuplicatePage { source, inserted } => {
                // Redo needs the source page.
                doc.page_index(*source)?;
                reinsert(doc, std::slice::from_ref(inserted))
            }
            Edit::BatchDuplicate { inserted } => reinsert(doc, inserted),
            Edit::DeletePage(entry) => delete_again(doc, std::slice::from_ref(entry)),
            Edit::BatchDelete { removed } => delete_again(doc, removed),
            Edit::BatchRotate { changes } => set_rotations(doc, changes, |c| c.after),
            Edit::BatchMove { moved, destination } => {
                let ids: Vec<PageId> = moved.iter().map(|entry| entry.page).collect();
                if doc.move_pages(&ids, *destination).is_empty() {
                    return None;
                }
                let first = ids.iter().filter_map(|id| doc.page_index(*id)).min();
                Some(Applied::focus(Focus::Page(first)))
            }
        }
    }
}

fn select(page: PageId, id: AnnotationId) -> Applied {
    Applied::focus(Focus::Annotation { page, id })
}

fn set_rotations(
    doc: &mut Document,
    changes: &[RotationChange],
    pick: impl Fn(&RotationChange) -> Rotation,
) -> Option<Applied> {
    let touched: Vec<PageId> = changes
        .iter()
        .filter(|change| doc.set_rotation(change.page, pick(change)).is_some())
        .map(|change| change.page)
        .collect();
    if touched.is_empty() {
        return None;
    }
    let focus = match touched.as_slice() {
        [single] => Focus::Page(doc.page_index(*single)),
        _ => Focus::Unchanged,
    };
    Some(Applied::invalidating(focus, touched))
}

/// Undo of an insertion: find each inserted page by identity, wherever it has moved.
fn remove_inserted(doc: &mut Document, inserted: &[IndexedPage]) -> Option<Applied> {
    let ids: Vec<PageId> = inserted.iter().map(|entry| entry.page.id).collect();
    let removed = doc.remove_pages(&ids);
    let lowest = removed.first()?.index;
    let focus = neighbor(doc, lowest.saturating_sub(1));
    Some(Applied::invalidating(
        Focus::Page(focus),
        removed.iter().map(|entry| entry.page.id).collect(),
    ))
}

/// Redo of an insertion: fresh deep copies at the recorded indices, low to high.
fn reinsert(doc: &mut Document, inserted: &[IndexedPage]) -> Option<Applied> {
    let missing: Vec<IndexedPage> = inserted
        .iter()
        .filter(|entry| doc.page_index(entry.page.id).is_none())
        .cloned()
        .collect();
    let last = missing.iter().map(|entry| entry.page.id).last()?;
    doc.restore_pages(&missing);
    Some(Applied::focus(Focus::Page(doc.page_index(last))))
}

fn restore_deleted(doc: &mut Document, removed: &[IndexedPage]) -> Option<Applied> {
    let missing: Vec<IndexedPage> = removed
        .iter()
        .filter(|entry| doc.page_index(entry.page.id).is_none())
        .cloned()
        .collect();
    let first = missing.first()?.page.id;
    doc.restore_pages(&missing);
    Some(Applied::focus(Focus::Page(doc.page_index(first))))
}

fn delete_again(doc: &mut Document, removed: &[IndexedPage]) -> Option<Applied> {
    let ids: Vec<PageId> = removed.iter().map(|entry| entry.page.id).collect();
    let gone = doc.remove_pages(&ids);
    let lowest = removed.iter().map(|entry| entry.index).min()?;
    if gone.is_empty() {
        return None;
    }
    Some(Applied::invalidating(
        Focus::Page(neighbor(doc, lowest)),
        gone.iter().map(|entry| entry.page.id).collect(),
    ))
}

/// `index` clamped into the document, or `None` when no pages remain.
fn neighbor(doc: &Document, index: usize) -> Option<usize> {
    if doc.is_empty() {
        None
    } else {
        Some(index.min(doc.len() - 1))
    }
}

/// Two bounded stacks. The oldest undo entry is dropped on overflow.
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Edit>,
    redo: Vec<Edit>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: VecDeque::with_capacity(capacity.max(1) + 1),
            redo: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn peek_undo(&self) -> Option<&Edit> {
        self.undo.back()
    }

    pub fn peek_redo(&self) -> Option<&Edit> {
        self.redo.last()
    }

    /// Pushes a new user edit. Any pending redo is discarded.
    pub fn record(&mut self, edit: Edit) {
        self.redo.clear();
        self.push_undo(edit);
    }

    /// Like [`History::record`], but folds the edit into the top record when both
    /// change the same field of the same annotation and nothing is waiting for redo.
    /// Returns `true` when the edit was folded.
    pub fn record_coalescing(&mut self, edit: Edit) -> bool {
        if self.redo.is_empty() {
            if let Some(top) = self.undo.back_mut() {
                match top.absorb(edit) {
                    Ok(()) => return true,
                    Err(edit) => {
                        self.record(edit);
                        return false;
                    }
                }
            }
        }
        self.record(edit);
        false
    }

    pub fn take_undo(&mut self) -> Option<Edit> {
        self.undo.pop_back()
    }

    pub fn take_redo(&mut self) -> Option<Edit> {
        self.redo.pop()
    }

    pub fn push_redo(&mut self, edit: Edit) {
        self.redo.push(edit);
    }

    /// Pushes without touching the redo stack; used when a redo lands back on undo.
    pub fn push_undo(&mut self, edit: Edit) {
        self.undo.push_back(edit);
        while self.undo.len() > self.capacity {
            self.undo.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
