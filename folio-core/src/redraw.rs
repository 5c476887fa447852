use tracing::trace;

use crate::PageId;

/// A pending request to repaint, optionally narrowed to one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedrawRequest {
    pub page: Option<PageId>,
    /// Increases with every request; lets hosts drop frames that were already drawn.
    pub generation: u64,
}

/// Single-slot redraw queue: at most one request is pending, and a newer one replaces
/// it. Pointer moves can ask for a redraw on every event while the host paints at its
/// own pace.
#[derive(Debug, Default)]
pub struct RedrawScheduler {
    pending: Option<RedrawRequest>,
    generation: u64,
    superseded: u64,
}

impl RedrawScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, page: Option<PageId>) {
        self.generation += 1;
        let next = RedrawRequest {
            page,
            generation: self.generation,
        };
        if let Some(previous) = self.pending.replace(next) {
            self.superseded += 1;
            trace!(generation = previous.generation, "redraw superseded");
        }
    }

    pub fn take(&mut self) -> Option<RedrawRequest> {
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Requests that were dropped in favour of a newer one.
    pub fn superseded(&self) -> u64 {
        self.superseded
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn newer_request_overwrites_pending() {
        let mut redraw = RedrawScheduler::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        redraw.request(Some(first));
        redraw.request(Some(second));
        redraw.request(Some(second));

        let taken = redraw.take().unwrap();
        assert_eq!(taken.page, Some(second));
        assert_eq!(taken.generation, 3);
        assert_eq!(redraw.superseded(), 2);
        assert!(redraw.take().is_none());
    }

    #[test]
    fn taking_clears_the_slot() {
        let mut redraw = RedrawScheduler::new();
        redraw.request(None);
        assert!(redraw.is_pending());
        redraw.take();
        redraw.request(None);
        assert_eq!(redraw.superseded(), 0);
    }
}
