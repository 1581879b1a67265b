//! Layout and consistency engine for multi-parent ownership charts.
//!
//! A [`Graph`] of companies (each with an ordered list of parents) is reduced to
//! a single-root spanning tree, laid out as a tidy tree, and decorated with the
//! secondary parent edges that the tree cannot express. [`ChartLayout`] runs the
//! whole pipeline; [`render_svg`] and the `serve` module are the bundled
//! rendering and persistence front ends.

pub mod chart;
pub mod config;
pub mod descendants;
pub mod error;
pub mod graph;
pub mod layout;
pub mod reduce;
pub mod render;
pub mod secondary;
#[cfg(feature = "server")]
pub mod serve;
pub mod store;
pub mod utils;
pub mod viewport;

pub use chart::{ChartLayout, NodeBox, PrimaryLink};
pub use config::ChartConfig;
pub use descendants::descendants;
pub use error::GraphError;
pub use graph::{Company, DeleteSummary, Graph, MergeSummary, Person};
pub use layout::{NodePosition, NodeSize, Point, SeparationRule, layout, layout_with};
pub use reduce::{ParentRef, PrimaryEdge, PrimaryTree, reduce_to_tree};
pub use render::{RenderOptions, render_svg};
pub use secondary::{SecondaryEdge, secondary_edges};
pub use viewport::{Bounds, ViewTransform, Viewport, fit_transform, initial_transform};
