use serde::{Deserialize, Serialize};

use crate::geometry::Rotation;
use crate::model::Page;
use crate::PageId;

/// The live document: an ordered list of pages with their annotations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub pages: Vec<Page>,
}

/// A page together with the index it occupied (or should occupy).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedPage {
    pub index: usize,
    pub page: Page,
}

/// A page that took part in a batch move, and where it sat before the move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovedPage {
    pub page: PageId,
    pub from: usize,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.pages.iter().find(|page| page.id == id)
    }

    pub fn page_mut(&mut self, id: PageId) -> Option<&mut Page> {
        self.pages.iter_mut().find(|page| page.id == id)
    }

    pub fn page_index(&self, id: PageId) -> Option<usize> {
        self.pages.iter().position(|page| page.id == id)
    }

    pub fn page_at(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub fn page_ids(&self) -> Vec<PageId> {
        self.pages.iter().map(|page| page.id).collect()
    }

    /// Inserts at `index`, clamped to the end. Returns the index actually used.
    pub fn insert_page(&mut self, index: usize, page: Page) -> usize {
        let index = index.min(self.pages.len());
        self.pages.insert(index, page);
        index
    }

    pub fn remove_page(&mut self, id: PageId) -> Option<IndexedPage> {
        let index = self.page_index(id)?;
        let page = self.pages.remove(index);
        Some(IndexedPage { index, page })
    }

    /// Sets the rotation and returns the previous one.
    pub fn set_rotation(&mut self, id: PageId, rotation: Rotation) -> Option<Rotation> {
        let page = self.page_mut(id)?;
        Some(std::mem::replace(&mut page.rotation, rotation))
    }

    /// Removes every listed page that still exists. The result is ascending by the index
    /// each page held before removal, so re-inserting in order restores the document.
    pub fn remove_pages(&mut self, ids: &[PageId]) -> Vec<IndexedPage> {
        let mut indices: Vec<usize> = ids.iter().filter_map(|id| self.page_index(*id)).collect();
        indices.sort_unstable();
        indices.dedup();

        let mut removed: Vec<IndexedPage> = indices
            .iter()
            .rev()
            .map(|&index| IndexedPage {
                index,
                page: self.pages.remove(index),
            })
            .collect();
        removed.reverse();
        removed
    }

    /// Re-inserts pages low-to-high so that every recorded index is valid when used.
    pub fn restore_pages(&mut self, pages: &[IndexedPage]) {
        let mut ordered: Vec<&IndexedPage> = pages.iter().collect();
        ordered.sort_by_key(|entry| entry.index);
        for entry in ordered {
            self.insert_page(entry.index, entry.page.clone());
        }
    }

    /// Moves the listed pages, keeping their relative order, so the block starts at
    /// `destination` (an index into the document with the moved pages taken out).
    pub fn move_pages(&mut self, ids: &[PageId], destination: usize) -> Vec<MovedPage> {
        let mut moved: Vec<MovedPage> = ids
            .iter()
            .filter_map(|id| self.page_index(*id).map(|from| MovedPage { page: *id, from }))
            .collect();
        moved.sort_by_key(|entry| entry.from);
        moved.dedup_by_key(|entry| entry.page);
        if moved.is_empty() {
            return moved;
        }

        let block = self.extract_descending(moved.iter().map(|entry| entry.page));
        let start = destination.min(self.pages.len());
        for (offset, page) in block.into_iter().enumerate() {
            self.pages.insert(start + offset, page);
        }
        moved
    }

    /// Puts moved pages back at the indices they held before a batch move.
    pub fn unmove_pages(&mut self, moved: &[MovedPage]) {
        let mut block = self.extract_descending(moved.iter().map(|entry| entry.page));
        let mut order: Vec<(usize, Page)> = Vec::with_capacity(block.len());
        for entry in moved {
            if let Some(pos) = block.iter().position(|page| page.id == entry.page) {
                order.push((entry.from, block.remove(pos)));
            }
        }
        order.sort_by_key(|(from, _)| *from);
        for (from, page) in order {
            self.insert_page(from, page);
        }
    }

    /// Pulls the pages out in descending current-index order, so indices of pages not yet
    /// extracted stay valid, and returns them in ascending document order.
    fn extract_descending(&mut self, ids: impl Iterator<Item = PageId>) -> Vec<Page> {
        let mut indices: Vec<usize> = ids.filter_map(|id| self.page_index(id)).collect();
        indices.sort_unstable_by(|a, b| b.cmp(a));
        indices.dedup();
        let mut pages: Vec<Page> = indices.into_iter().map(|index| self.pages.remove(index)).collect();
        pages.reverse();
        pages
    }
}
