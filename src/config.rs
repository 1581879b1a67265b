use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::layout::{NodeSize, SeparationRule};

const NODE_WIDTH: f64 = 180.0;
const NODE_HEIGHT: f64 = 72.0;
const LEVEL_GAP: f64 = 60.0;
const INITIAL_SCALE: f64 = 0.8;
const MIN_SCALE: f64 = 0.1;
const MAX_SCALE: f64 = 2.0;
const TOP_MARGIN: f64 = 40.0;
const FIT_MARGIN: f64 = 0.9;

/// Layout and viewport tunables. Every field has a default, so a config file
/// only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChartConfig {
    pub node_width: f64,
    pub node_height: f64,
    /// Vertical gap between rows, added to `node_height`.
    pub level_gap: f64,
    pub sibling_separation: f64,
    pub cousin_separation: f64,
    pub initial_scale: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    pub top_margin: f64,
    /// Share of the viewport used when fitting the chart (0..=1).
    pub fit_margin: f64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        let separation = SeparationRule::default();
        Self {
            node_width: NODE_WIDTH,
            node_height: NODE_HEIGHT,
            level_gap: LEVEL_GAP,
            sibling_separation: separation.siblings,
            cousin_separation: separation.cousins,
            initial_scale: INITIAL_SCALE,
            min_scale: MIN_SCALE,
            max_scale: MAX_SCALE,
            top_margin: TOP_MARGIN,
            fit_margin: FIT_MARGIN,
        }
    }
}

impl ChartConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        let config: ChartConfig = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config '{}'", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("nodeWidth", self.node_width),
            ("nodeHeight", self.node_height),
            ("initialScale", self.initial_scale),
            ("minScale", self.min_scale),
            ("maxScale", self.max_scale),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                bail!("{name} must be a positive number, got {value}");
            }
        }
        if !self.level_gap.is_finite() || self.level_gap < 0.0 {
            bail!("levelGap must not be negative, got {}", self.level_gap);
        }
        if !self.top_margin.is_finite() {
            bail!("topMargin must be finite");
        }
        // Below one node width, neighbouring boxes would overlap.
        for (name, value) in [
            ("siblingSeparation", self.sibling_separation),
            ("cousinSeparation", self.cousin_separation),
        ] {
            if !value.is_finite() || value < 1.0 {
                bail!("{name} must be at least 1.0, got {value}");
            }
        }
        if self.min_scale > self.max_scale {
            bail!(
                "minScale ({}) must not exceed maxScale ({})",
                self.min_scale,
                self.max_scale
            );
        }
        if !(self.fit_margin > 0.0 && self.fit_margin <= 1.0) {
            bail!("fitMargin must be within (0, 1], got {}", self.fit_margin);
        }
        Ok(())
    }

    pub fn node_size(&self) -> NodeSize {
        NodeSize {
            width: self.node_width,
            height: self.node_height,
        }
    }

    pub fn separation(&self) -> SeparationRule {
        SeparationRule {
            siblings: self.sibling_separation,
            cousins: self.cousin_separation,
        }
    }

    pub fn clamp_scale(&self, scale: f64) -> f64 {
        clamp_to_range(scale, self.min_scale, self.max_scale)
    }
}

/// Clamps `scale` into the range spanned by `a` and `b`, in either order.
/// Unlike `f64::clamp` this never panics on an inverted or NaN bound.
pub(crate) fn clamp_to_range(scale: f64, a: f64, b: f64) -> f64 {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    scale.max(low).min(high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        assert!(ChartConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, r#"{{"nodeWidth": 220, "maxScale": 3}}"#)?;

        let config = ChartConfig::load(file.path())?;
        assert_eq!(config.node_width, 220.0);
        assert_eq!(config.max_scale, 3.0);
        assert_eq!(config.node_height, NODE_HEIGHT);
        Ok(())
    }

    #[test]
    fn rejects_inverted_scale_range() {
        let config = ChartConfig {
            min_scale: 3.0,
            max_scale: 2.0,
            ..ChartConfig::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.clamp_scale(10.0), 3.0);
        assert_eq!(config.clamp_scale(0.5), 2.0);
        assert_eq!(config.clamp_scale(2.5), 2.5);
    }

    #[test]
    fn rejects_overlapping_separation() {
        let config = ChartConfig {
            sibling_separation: 0.5,
            ..ChartConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
