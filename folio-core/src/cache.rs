use serde::{Deserialize, Serialize};

use crate::geometry::Rotation;
use crate::PageId;

/// Identifies one rendered page surface. Two requests with equal keys may share pixels.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKey {
    pub page: PageId,
    pub scale_milli: u32,
    pub rotation: Rotation,
    pub dark_mode: bool,
}

impl CacheKey {
    pub fn new(page: PageId, scale: f64, rotation: Rotation, dark_mode: bool) -> Self {
        Self {
            page,
            scale_milli: quantize_scale(scale),
            rotation,
            dark_mode,
        }
    }

    pub fn scale(&self) -> f64 {
        f64::from(self.scale_milli) / 1000.0
    }
}

/// Which cached surfaces went stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "page", rename_all = "lowercase")]
pub enum Invalidation {
    Page(PageId),
    All,
}

impl Invalidation {
    pub fn covers(&self, key: &CacheKey) -> bool {
        match self {
            Invalidation::Page(page) => key.page == *page,
            Invalidation::All => true,
        }
    }
}

pub fn quantize_scale(scale: f64) -> u32 {
    let scaled = (scale * 1000.0).round();
    if !scaled.is_finite() || scaled <= 0.0 {
        1
    } else if scaled > f64::from(u32::MAX) {
        u32::MAX
    } else {
        scaled as u32
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn scale_is_quantized_to_thousandths() {
        assert_eq!(quantize_scale(1.0), 1000);
        assert_eq!(quantize_scale(1.2344), 1234);
        assert_eq!(quantize_scale(0.0), 1);
        assert_eq!(quantize_scale(f64::NAN), 1);
        assert_eq!(quantize_scale(1e12), u32::MAX);
    }

    #[test]
    fn nearby_scales_share_a_key() {
        let page = Uuid::new_v4();
        let a = CacheKey::new(page, 1.5, Rotation::Deg90, false);
        let b = CacheKey::new(page, 1.5002, Rotation::Deg90, false);
        assert_eq!(a, b);
        assert_ne!(a, CacheKey::new(page, 1.5, Rotation::Deg180, false));
        assert_ne!(a, CacheKey::new(page, 1.5, Rotation::Deg90, true));
    }

    #[test]
    fn page_invalidation_only_covers_that_page() {
        let page = Uuid::new_v4();
        let key = CacheKey::new(page, 1.0, Rotation::Deg0, false);
        let other = CacheKey::new(Uuid::new_v4(), 1.0, Rotation::Deg0, false);
        assert!(Invalidation::Page(page).covers(&key));
        assert!(!Invalidation::Page(page).covers(&other));
        assert!(Invalidation::All.covers(&other));
    }
}
