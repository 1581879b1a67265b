//! Pan/zoom state for a rendering surface.
//!
//! The core never owns the surface; it only computes transforms. A transform
//! maps a chart point `p` to the screen as `p * scale + translate`.

use serde::{Deserialize, Serialize};

use crate::config::{ChartConfig, clamp_to_range};
use crate::layout::{NodePosition, Point};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewTransform {
    pub translate_x: f64,
    pub translate_y: f64,
    pub scale: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            translate_x: 0.0,
            translate_y: 0.0,
            scale: 1.0,
        }
    }
}

/// Axis-aligned box in chart coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.min_x
            && point.x <= self.max_x
            && point.y >= self.min_y
            && point.y <= self.max_y
    }
}

/// Initial transform: the horizontal extent of `positions` is centred in the
/// viewport at the configured scale, and the top row is anchored
/// `top_margin` below the top edge.
pub fn initial_transform(
    positions: &[NodePosition],
    viewport_width: f64,
    _viewport_height: f64,
    config: &ChartConfig,
) -> ViewTransform {
    let scale = config.clamp_scale(config.initial_scale);
    let extent = positions.iter().fold(None, |acc: Option<(f64, f64)>, p| {
        Some(match acc {
            Some((min_x, max_x)) => (min_x.min(p.x), max_x.max(p.x)),
            None => (p.x, p.x),
        })
    });
    let center_x = extent.map(|(min_x, max_x)| (min_x + max_x) / 2.0).unwrap_or(0.0);

    ViewTransform {
        translate_x: viewport_width / 2.0 - center_x * scale,
        translate_y: config.top_margin,
        scale,
    }
}

/// Scales `bounds` to fill `fit_margin` of the viewport and centres it on both axes.
pub fn fit_transform(
    bounds: &Bounds,
    viewport_width: f64,
    viewport_height: f64,
    config: &ChartConfig,
) -> ViewTransform {
    let width = bounds.width().max(1.0);
    let height = bounds.height().max(1.0);
    let raw = (viewport_width / width).min(viewport_height / height) * config.fit_margin;
    let scale = if raw.is_finite() && raw > 0.0 {
        config.clamp_scale(raw)
    } else {
        config.clamp_scale(config.initial_scale)
    };
    let center = bounds.center();

    ViewTransform {
        translate_x: viewport_width / 2.0 - center.x * scale,
        translate_y: viewport_height / 2.0 - center.y * scale,
        scale,
    }
}

/// Serializable view state passed between the renderer and the core.
///
/// After the initial placement every change comes from the user; nothing
/// here re-centres on its own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub transform: ViewTransform,
    pub min_scale: f64,
    pub max_scale: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64, config: &ChartConfig) -> Self {
        Self {
            width,
            height,
            transform: ViewTransform {
                scale: config.clamp_scale(config.initial_scale),
                ..ViewTransform::default()
            },
            min_scale: config.min_scale,
            max_scale: config.max_scale,
        }
    }

    pub fn centered_on(
        positions: &[NodePosition],
        width: f64,
        height: f64,
        config: &ChartConfig,
    ) -> Self {
        Self {
            transform: initial_transform(positions, width, height, config),
            ..Self::new(width, height, config)
        }
    }

    pub fn fitted(bounds: &Bounds, width: f64, height: f64, config: &ChartConfig) -> Self {
        Self {
            transform: fit_transform(bounds, width, height, config),
            ..Self::new(width, height, config)
        }
    }

    pub fn scale(&self) -> f64 {
        self.transform.scale
    }

    /// Moves the chart by a screen-space delta.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.transform.translate_x += dx;
        self.transform.translate_y += dy;
    }

    /// Multiplies the scale by `factor`, keeping the chart point under the
    /// screen position `(sx, sy)` in place. The result is clamped to the scale range.
    pub fn zoom_at(&mut self, factor: f64, sx: f64, sy: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let anchor = self.screen_to_chart(sx, sy);
        let scale = clamp_to_range(
            self.transform.scale * factor,
            self.min_scale,
            self.max_scale,
        );
        self.transform.scale = scale;
        self.transform.translate_x = sx - anchor.x * scale;
        self.transform.translate_y = sy - anchor.y * scale;
    }

    /// Sets an absolute scale around the viewport centre.
    pub fn set_scale(&mut self, scale: f64) {
        if self.transform.scale > 0.0 {
            let factor = scale / self.transform.scale;
            self.zoom_at(factor, self.width / 2.0, self.height / 2.0);
        }
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    pub fn screen_to_chart(&self, sx: f64, sy: f64) -> Point {
        Point::new(
            (sx - self.transform.translate_x) / self.transform.scale,
            (sy - self.transform.translate_y) / self.transform.scale,
        )
    }

    pub fn chart_to_screen(&self, point: Point) -> Point {
        Point::new(
            point.x * self.transform.scale + self.transform.translate_x,
            point.y * self.transform.scale + self.transform.translate_y,
        )
    }
}
