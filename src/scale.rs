//! Fit-to-container scale computation.

use crate::platform::ContainerSize;
use crate::PageGeometry;

/// Returned for degenerate input so callers never see zero or NaN
pub const MIN_FIT_SCALE: f64 = 1e-3;

/// Uniform factor that fits a `page_w`×`page_h` page inside `container`.
///
/// The result is in `(0, 1]`. It is exactly `1.0` when the container is at
/// least the page size in both dimensions. Otherwise `margin` is kept free on
/// each side, and a container with no room inside its margins gets
/// [`MIN_FIT_SCALE`]. The result never decreases as the container grows.
pub fn compute_fit_scale(container: ContainerSize, page_w: f64, page_h: f64, margin: f64) -> f64 {
    let usable = |v: f64| v.is_finite() && v > 0.0;
    if !usable(container.width) || !usable(container.height) || !usable(page_w) || !usable(page_h) {
        return MIN_FIT_SCALE;
    }
    if container.width >= page_w && container.height >= page_h {
        return 1.0;
    }

    let margin = if margin.is_finite() { margin.max(0.0) } else { 0.0 };
    let available = |v: f64| v - 2.0 * margin;

    let scale = (available(container.width) / page_w)
        .min(available(container.height) / page_h)
        .min(1.0);
    if scale.is_finite() {
        scale.max(MIN_FIT_SCALE)
    } else {
        MIN_FIT_SCALE
    }
}

/// Tracks the current fit scale of one preview.
#[derive(Debug, Clone)]
pub struct ScaleEngine {
    page: PageGeometry,
    margin: f64,
    scale: f64,
    container: Option<ContainerSize>,
}

impl ScaleEngine {
    pub fn new(page: PageGeometry, margin: f64) -> Self {
        Self {
            page,
            margin,
            scale: 1.0,
            container: None,
        }
    }

    /// Recompute for a new container size and return the new scale
    pub fn recompute(&mut self, container: ContainerSize) -> f64 {
        self.scale = compute_fit_scale(
            container,
            self.page.width_px(),
            self.page.height_px(),
            self.margin,
        );
        self.container = Some(container);
        self.scale
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn container(&self) -> Option<ContainerSize> {
        self.container
    }
}
