//! Pointer gestures on the selected page.
//!
//! A drag captures the "before" state at pointer-down, mutates the document live while
//! the pointer moves, and records a single [`Edit`] at pointer-up. Drags that end where
//! they started record nothing.

use serde::{Deserialize, Serialize};

use crate::geometry::{clockwise_angle, to_document_point, to_surface_point, unrotate_about, Point};
use crate::history::Edit;
use crate::hit::{
    hit_test_highlight_handle, hit_test_page, hit_test_text_handle, text_handles, Handle, Hit,
};
use crate::model::{AnnotationKind, ShapeKind};
use crate::notice::NoticeKind;
use crate::session::Session;
use crate::store::{Placement, Size};
use crate::{AnnotationId, PageId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Select,
    Text,
    Highlight,
    Line,
    Arrow,
    Rectangle,
    Ellipse,
    Freehand,
}

impl Tool {
    pub fn shape_kind(self) -> Option<ShapeKind> {
        match self {
            Tool::Line => Some(ShapeKind::Line),
            Tool::Arrow => Some(ShapeKind::Arrow),
            Tool::Rectangle => Some(ShapeKind::Rectangle),
            Tool::Ellipse => Some(ShapeKind::Ellipse),
            Tool::Freehand => Some(ShapeKind::Freehand),
            Tool::Select | Tool::Text | Tool::Highlight => None,
        }
    }
}

/// A gesture in progress. Points are in document space.
#[derive(Debug, Clone, PartialEq)]
pub enum Drag {
    Move {
        page: PageId,
        id: AnnotationId,
        origin: Point,
        before: Placement,
    },
    ResizeText {
        page: PageId,
        id: AnnotationId,
        /// Box center at pointer-down; the frame in which the drag is measured.
        pivot: Point,
        rotation: f64,
        anchor_x: f64,
        origin_extent: f64,
        before: f64,
    },
    ResizeHighlight {
        page: PageId,
        id: AnnotationId,
        origin: Point,
        before: Size,
    },
    RotateText {
        page: PageId,
        id: AnnotationId,
        center: Point,
        origin_angle: f64,
        before: f64,
    },
    DrawHighlight {
        page: PageId,
        anchor: Point,
        current: Point,
    },
    DrawShape {
        page: PageId,
        kind: ShapeKind,
        anchor: Point,
        current: Point,
        path: Vec<Point>,
    },
}

impl Drag {
    pub fn page(&self) -> PageId {
        match self {
            Drag::Move { page, .. }
            | Drag::ResizeText { page, .. }
            | Drag::ResizeHighlight { page, .. }
            | Drag::RotateText { page, .. }
            | Drag::DrawHighlight { page, .. }
            | Drag::DrawShape { page, .. } => *page,
        }
    }
}

impl Session {
    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.cancel_drag();
        self.tool = tool;
    }

    /// The gesture in progress, for painting previews.
    pub fn drag(&self) -> Option<&Drag> {
        self.drag.as_ref()
    }

    pub fn pointer_to_document(&self, page: PageId, pointer: Point) -> Option<Point> {
        let (width, height, rotation) = self.page_geometry(page)?;
        Some(to_document_point(pointer, self.scale, width, height, rotation))
    }

    pub fn document_to_pointer(&self, page: PageId, point: Point) -> Option<Point> {
        let (width, height, rotation) = self.page_geometry(page)?;
        Some(to_surface_point(point, self.scale, width, height, rotation))
    }

    /// Starts a gesture at a pointer-space position on the selected page.
    /// Returns `true` when the press did something.
    pub fn pointer_down(&mut self, pointer: Point) -> bool {
        self.cancel_drag();
        let Some(page) = self.selected_page else {
            self.notify(NoticeKind::NoPageSelected);
            return false;
        };
        let Some(at) = self.pointer_to_document(page, pointer) else {
            return false;
        };
        match self.tool {
            Tool::Select => self.begin_select(page, at),
            Tool::Text => self.add_text(page, at, None).is_some(),
            Tool::Highlight => {
                self.drag = Some(Drag::DrawHighlight {
                    page,
                    anchor: at,
                    current: at,
                });
                true
            }
            tool => match tool.shape_kind() {
                Some(kind) => {
                    let path = if kind == ShapeKind::Freehand {
                        vec![at]
                    } else {
                        Vec::new()
                    };
                    self.drag = Some(Drag::DrawShape {
                        page,
                        kind,
                        anchor: at,
                        current: at,
                        path,
                    });
                    true
                }
                None => false,
            },
        }
    }

    pub fn pointer_move(&mut self, pointer: Point) {
        let Some(mut drag) = self.drag.take() else {
            return;
        };
        let page = drag.page();
        if let Some(at) = self.pointer_to_document(page, pointer) {
            self.update_drag(&mut drag, at);
            self.redraw.request(Some(page));
        }
        self.drag = Some(drag);
    }

    /// Ends the gesture. Returns `true` when an edit was recorded.
    pub fn pointer_up(&mut self, pointer: Point) -> bool {
        let Some(mut drag) = self.drag.take() else {
            return false;
        };
        let page = drag.page();
        if let Some(at) = self.pointer_to_document(page, pointer) {
            self.update_drag(&mut drag, at);
        }
        let committed = match drag {
            Drag::DrawHighlight {
                page,
                anchor,
                current,
            } => self.add_highlight(page, anchor, current).is_some(),
            Drag::DrawShape {
                page,
                kind,
                anchor,
                current,
                path,
            } => {
                let path = (kind == ShapeKind::Freehand).then_some(path);
                self.add_shape(page, kind, anchor, current, path).is_some()
            }
            edit_drag => match self.finish_edit(edit_drag) {
                Some(edit) => {
                    self.record(edit);
                    true
                }
                None => false,
            },
        };
        self.redraw.request(Some(page));
        committed
    }

    /// Abandons the gesture in progress and puts back whatever it changed.
    pub fn cancel_drag(&mut self) {
        let Some(drag) = self.drag.take() else {
            return;
        };
        match drag {
            Drag::Move {
                page, id, before, ..
            } => {
                self.document.set_placement(page, id, &before);
            }
            Drag::ResizeText {
                page, id, before, ..
            } => {
                self.document.resize_text(page, id, before);
            }
            Drag::ResizeHighlight {
                page, id, before, ..
            } => {
                self.document
                    .resize_highlight(page, id, before.width, before.height);
            }
            Drag::RotateText {
                page, id, before, ..
            } => {
                self.document.rotate_text(page, id, before);
            }
            Drag::DrawHighlight { .. } | Drag::DrawShape { .. } => {}
        }
        self.redraw.request(self.selected_page);
    }

    fn begin_select(&mut self, page: PageId, at: Point) -> bool {
        if let Some(drag) = self.handle_drag(page, at) {
            self.drag = Some(drag);
            return true;
        }
        let hit = self.document.page(page).and_then(|target| {
            hit_test_page(
                target,
                at,
                self.scale,
                self.config.hit.tolerance_px,
                &self.measure,
            )
        });
        let Some(hit) = hit else {
            self.clear_annotation_selection();
            return false;
        };
        let Some(before) = self.document.placement(page, hit.id) else {
            return false;
        };
        self.set_selection(Some(page), Some(hit));
        self.drag = Some(Drag::Move {
            page,
            id: hit.id,
            origin: at,
            before,
        });
        self.redraw.request(Some(page));
        true
    }

    /// A drag on one of the selected annotation's handles, if `at` is on one.
    fn handle_drag(&self, page: PageId, at: Point) -> Option<Drag> {
        let Hit { kind, id } = self.selected_annotation?;
        let target = self.document.page(page)?;
        match kind {
            AnnotationKind::Text => {
                let text = target.text(id)?;
                let handles = text_handles(text, &self.measure);
                match hit_test_text_handle(at, text, self.scale, &self.measure)? {
                    Handle::Resize => {
                        let local = unrotate_about(at, handles.center, text.rotation);
                        Some(Drag::ResizeText {
                            page,
                            id,
                            pivot: handles.center,
                            rotation: text.rotation,
                            anchor_x: text.x,
                            origin_extent: local.x - text.x,
                            before: text.font_size,
                        })
                    }
                    Handle::Rotate => Some(Drag::RotateText {
                        page,
                        id,
                        center: handles.center,
                        origin_angle: clockwise_angle(handles.center, at),
                        before: text.rotation,
                    }),
                }
            }
            AnnotationKind::Highlight => {
                let highlight = target.highlight(id)?;
                hit_test_highlight_handle(at, highlight, self.scale)?;
                Some(Drag::ResizeHighlight {
                    page,
                    id,
                    origin: at,
                    before: Size {
                        width: highlight.width,
                        height: highlight.height,
                    },
                })
            }
            AnnotationKind::Shape => None,
        }
    }

    fn update_drag(&mut self, drag: &mut Drag, at: Point) {
        match drag {
            Drag::Move {
                page,
                id,
                origin,
                before,
            } => {
                self.document.set_placement(*page, *id, before);
                self.document
                    .move_annotation(*page, *id, at.x - origin.x, at.y - origin.y);
            }
            Drag::ResizeText {
                page,
                id,
                pivot,
                rotation,
                anchor_x,
                origin_extent,
                before,
            } => {
                if origin_extent.abs() > f64::EPSILON {
                    let local = unrotate_about(at, *pivot, *rotation);
                    let size = *before * (local.x - *anchor_x) / *origin_extent;
                    self.document.resize_text(*page, *id, size);
                }
            }
            Drag::ResizeHighlight {
                page,
                id,
                origin,
                before,
            } => {
                // Dragging right widens; dragging down (lower document Y) makes it taller.
                let width = before.width + (at.x - origin.x);
                let height = before.height - (at.y - origin.y);
                self.document.resize_highlight(*page, *id, width, height);
            }
            Drag::RotateText {
                page,
                id,
                center,
                origin_angle,
                before,
            } => {
                let degrees = (*before + clockwise_angle(*center, at) - *origin_angle).rem_euclid(360.0);
                self.document.rotate_text(*page, *id, degrees);
            }
            Drag::DrawHighlight { current, .. } => *current = at,
            Drag::DrawShape {
                kind,
                current,
                path,
                ..
            } => {
                *current = at;
                if *kind == ShapeKind::Freehand && path.last() != Some(&at) {
                    path.push(at);
                }
            }
        }
    }

    /// Builds the record for a finished drag on an existing annotation.
    fn finish_edit(&mut self, drag: Drag) -> Option<Edit> {
        match drag {
            Drag::Move {
                page, id, before, ..
            } => {
                let after = self.document.placement(page, id)?;
                (after != before).then_some(Edit::MoveAnnotation {
                    page,
                    id,
                    before,
                    after,
                })
            }
            Drag::ResizeText {
                page, id, before, ..
            } => {
                let after = self.document.page(page)?.text(id)?.font_size;
                (after != before).then_some(Edit::ResizeText {
                    page,
                    id,
                    before,
                    after,
                })
            }
            Drag::ResizeHighlight {
                page, id, before, ..
            } => {
                let current = self.document.page(page)?.highlight(id)?;
                let after = self.committed_highlight_size(current.width, current.height);
                self.document
                    .resize_highlight(page, id, after.width, after.height);
                (after != before).then_some(Edit::ResizeHighlight {
                    page,
                    id,
                    before,
                    after,
                })
            }
            Drag::RotateText {
                page, id, before, ..
            } => {
                let after = self.document.page(page)?.text(id)?.rotation;
                (after != before).then_some(Edit::RotateText {
                    page,
                    id,
                    before,
                    after,
                })
            }
            Drag::DrawHighlight { .. } | Drag::DrawShape { .. } => None,
        }
    }
}
