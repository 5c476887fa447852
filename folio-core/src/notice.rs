use std::fmt;

use serde::Serialize;

use crate::cache::Invalidation;
use crate::{AnnotationId, DocumentId, PageId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NoticeKind {
    NothingToUndo,
    NothingToRedo,
    Undone { label: &'static str },
    Redone { label: &'static str },
    AnnotationDeleted,
    PageDeleted { remaining: usize },
    PagesDeleted { count: usize },
    PageDuplicated,
    PagesMoved { count: usize },
    CopiedToClipboard,
    ClipboardEmpty,
    NoPageSelected,
}

impl NoticeKind {
    pub fn severity(&self) -> Severity {
        match self {
            NoticeKind::NothingToUndo | NoticeKind::NothingToRedo | NoticeKind::ClipboardEmpty => {
                Severity::Info
            }
            NoticeKind::NoPageSelected => Severity::Warning,
            _ => Severity::Success,
        }
    }
}

impl fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoticeKind::NothingToUndo => f.write_str("Nothing to undo"),
            NoticeKind::NothingToRedo => f.write_str("Nothing to redo"),
            NoticeKind::Undone { label } => write!(f, "Undid {label}"),
            NoticeKind::Redone { label } => write!(f, "Redid {label}"),
            NoticeKind::AnnotationDeleted => f.write_str("Annotation deleted"),
            NoticeKind::PageDeleted { remaining } => {
                write!(f, "Page deleted, {remaining} remaining")
            }
            NoticeKind::PagesDeleted { count } => write!(f, "Deleted {count} pages"),
            NoticeKind::PageDuplicated => f.write_str("Page duplicated"),
            NoticeKind::PagesMoved { count } => write!(f, "Moved {count} pages"),
            NoticeKind::CopiedToClipboard => f.write_str("Copied annotation"),
            NoticeKind::ClipboardEmpty => f.write_str("Nothing to paste"),
            NoticeKind::NoPageSelected => f.write_str("No page selected"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub severity: Severity,
    pub kind: NoticeKind,
}

impl From<NoticeKind> for Notice {
    fn from(kind: NoticeKind) -> Self {
        Self {
            severity: kind.severity(),
            kind,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

/// Things the host should react to, drained after each batch of input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum SessionEvent {
    DocumentOpened(DocumentId),
    SelectionChanged {
        page: Option<PageId>,
        annotation: Option<AnnotationId>,
    },
    InvalidateCache(Invalidation),
    Notice(Notice),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_notices_are_informational() {
        let notice = Notice::from(NoticeKind::NothingToUndo);
        assert_eq!(notice.severity, Severity::Info);
        assert_eq!(notice.to_string(), "Nothing to undo");
        assert_eq!(
            Notice::from(NoticeKind::Undone { label: "rotate page" }).to_string(),
            "Undid rotate page"
        );
    }
}
