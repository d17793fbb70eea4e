//! Crop geometry for chart panels, insets and corner cut-outs.
//!
//! Everything here works in top-left-origin pixel coordinates. Raster
//! work itself happens elsewhere; these functions only decide *which*
//! rectangle to cut.

use serde::{Deserialize, Serialize};

use crate::types::{Corner, CropError, Extent, PixelRect};

/// The four corner cut-outs of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CornerBoxes {
    /// Bottom-left box.
    pub sw: PixelRect,
    /// Top-left box.
    pub nw: PixelRect,
    /// Top-right box.
    pub ne: PixelRect,
    /// Bottom-right box.
    pub se: PixelRect,
}

impl CornerBoxes {
    /// The box anchored at `corner`.
    #[must_use]
    pub const fn get(&self, corner: Corner) -> PixelRect {
        match corner {
            Corner::Sw => self.sw,
            Corner::Nw => self.nw,
            Corner::Ne => self.ne,
            Corner::Se => self.se,
        }
    }

    /// Boxes paired with their corner, in SW, NW, NE, SE order.
    pub fn iter(&self) -> impl Iterator<Item = (Corner, PixelRect)> + '_ {
        Corner::ALL.into_iter().map(|corner| (corner, self.get(corner)))
    }
}

/// Square cut-outs of side `corner_size` anchored at each raster corner.
///
/// A side longer than the raster is clamped to the raster, so every box
/// lies fully inside `extent`.
#[must_use]
pub fn corner_boxes(extent: Extent, corner_size: u32) -> CornerBoxes {
    let width = corner_size.min(extent.width);
    let height = corner_size.min(extent.height);
    let right = extent.width - width;
    let bottom = extent.height - height;
    let rect = |x, y| PixelRect {
        x,
        y,
        width,
        height,
    };
    CornerBoxes {
        sw: rect(0, bottom),
        nw: rect(0, 0),
        ne: rect(right, 0),
        se: rect(right, bottom),
    }
}

/// The crop rectangle of an inset from its annotated pixel extremes.
///
/// # Errors
///
/// Returns [`CropError::InvalidCropBox`] unless `0 <= min < max` holds on
/// both axes and the box fits in pixel coordinates.
pub fn inset_box(min_x: i64, max_x: i64, min_y: i64, max_y: i64) -> Result<PixelRect, CropError> {
    let invalid = CropError::InvalidCropBox {
        min_x,
        max_x,
        min_y,
        max_y,
    };
    if min_x < 0 || min_y < 0 || max_x <= min_x || max_y <= min_y {
        return Err(invalid);
    }
    let pixel = |v: i64| u32::try_from(v).map_err(|_| invalid);
    Ok(PixelRect {
        x: pixel(min_x)?,
        y: pixel(min_y)?,
        width: pixel(max_x - min_x)?,
        height: pixel(max_y - min_y)?,
    })
}

/// The whole raster as a crop rectangle.
#[must_use]
pub const fn full_extent_box(extent: Extent) -> PixelRect {
    PixelRect {
        x: 0,
        y: 0,
        width: extent.width,
        height: extent.height,
    }
}
