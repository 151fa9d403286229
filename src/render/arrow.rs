//! Arrow and canvas geometry for the stick view.
//!
//! Canvas units: the reference circle has radius [`ARROW_MAX_LENGTH`] and
//! `y` grows upward, so a stick pushed forward draws an arrow pointing up.

use std::f64::consts::PI;

use ratatui::layout::Rect;

use crate::controller::calibration::AxisVector;

/// Arrow length at the smallest non-zero deflection
pub const ARROW_BASE_LENGTH: f64 = 0.5;

/// Arrow length at full deflection, also the reference circle radius
pub const ARROW_MAX_LENGTH: f64 = 1.0;

pub const ARROWHEAD_LENGTH: f64 = 0.1;

/// Half-angle between the shaft and each side of the head
pub const ARROWHEAD_ANGLE: f64 = PI / 6.0;

/// Free space around the reference circle
const CANVAS_MARGIN: f64 = 1.1;

/// Terminal cells are roughly twice as tall as they are wide
const CELL_ASPECT: f64 = 2.0;

/// Points of an arrow drawn from the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrowGeometry {
    pub length: f64,
    pub tip: (f64, f64),
    pub head_left: (f64, f64),
    pub head_right: (f64, f64),
}

/// Arrow for a stick vector, or `None` at rest.
///
/// Length is `base + magnitude * (max - base)` with magnitude capped at 1.
#[must_use]
pub fn arrow_geometry(axes: AxisVector) -> Option<ArrowGeometry> {
    let magnitude = f64::from(axes.magnitude());
    if magnitude.is_nan() || magnitude <= 0.0 {
        return None;
    }

    let angle = f64::from(axes.y).atan2(f64::from(axes.x));
    let length = ARROW_BASE_LENGTH + magnitude.min(1.0) * (ARROW_MAX_LENGTH - ARROW_BASE_LENGTH);
    let tip = (length * angle.cos(), length * angle.sin());

    let head_point = |offset: f64| {
        (
            tip.0 - ARROWHEAD_LENGTH * (angle + offset).cos(),
            tip.1 - ARROWHEAD_LENGTH * (angle + offset).sin(),
        )
    };

    Some(ArrowGeometry {
        length,
        tip,
        head_left: head_point(-ARROWHEAD_ANGLE),
        head_right: head_point(ARROWHEAD_ANGLE),
    })
}

/// Canvas `(x_bounds, y_bounds)` that keep the reference circle round in
/// `area`, borders included.
#[must_use]
pub fn canvas_bounds(area: Rect) -> ([f64; 2], [f64; 2]) {
    let width = f64::from(area.width.saturating_sub(2).max(1));
    let height = f64::from(area.height.saturating_sub(2).max(1)) * CELL_ASPECT;

    let (x_extent, y_extent) = if width >= height {
        (CANVAS_MARGIN * width / height, CANVAS_MARGIN)
    } else {
        (CANVAS_MARGIN, CANVAS_MARGIN * height / width)
    };

    ([-x_extent, x_extent], [-y_extent, y_extent])
}
