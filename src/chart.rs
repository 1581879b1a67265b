use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::config::ChartConfig;
use crate::graph::Graph;
use crate::layout::{NodePosition, Point, layout};
use crate::reduce::{ParentRef, reduce_to_tree};
use crate::secondary::{SecondaryEdge, secondary_edges};
use crate::viewport::{Bounds, Viewport};

/// A laid-out company: centre point plus box size.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeBox {
    pub id: String,
    pub name: String,
    pub type_tag: String,
    pub member_count: usize,
    pub depth: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NodeBox {
    pub fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            min_x: self.x - self.width / 2.0,
            min_y: self.y - self.height / 2.0,
            max_x: self.x + self.width / 2.0,
            max_y: self.y + self.height / 2.0,
        }
    }
}

/// Tree edge from a company to its primary parent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryLink {
    pub parent_id: String,
    pub child_id: String,
    pub from: Point,
    pub to: Point,
}

/// Everything a renderer needs for one pass over an immutable graph snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartLayout {
    pub nodes: Vec<NodeBox>,
    pub primary_edges: Vec<PrimaryLink>,
    pub secondary_edges: Vec<SecondaryEdge>,
    pub bounds: Option<Bounds>,
    /// Companies detached from a primary parent cycle.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub broken_cycles: Vec<String>,
}

impl ChartLayout {
    /// Reduce, lay out and decorate `graph`. Pure: the same graph and config
    /// always give the same result.
    pub fn compute(graph: &Graph, config: &ChartConfig) -> Self {
        let tree = reduce_to_tree(&graph.companies);
        let positions = layout(&tree, config.node_size(), config.level_gap, config.separation());

        let members = graph.member_counts();
        let companies: HashMap<&str, _> = graph
            .companies
            .iter()
            .map(|company| (company.id.as_str(), company))
            .collect();
        let placed: HashMap<&str, &NodePosition> =
            positions.iter().map(|p| (p.id.as_str(), p)).collect();

        let nodes: Vec<NodeBox> = positions
            .iter()
            .map(|position| {
                let company = companies.get(position.id.as_str());
                NodeBox {
                    id: position.id.clone(),
                    name: company.map(|c| c.name.clone()).unwrap_or_default(),
                    type_tag: company.map(|c| c.type_tag.clone()).unwrap_or_default(),
                    member_count: members.get(position.id.as_str()).copied().unwrap_or(0),
                    depth: position.depth,
                    x: position.x,
                    y: position.y,
                    width: config.node_width,
                    height: config.node_height,
                }
            })
            .collect();

        let primary_edges: Vec<PrimaryLink> = tree
            .edges()
            .into_iter()
            .filter_map(|edge| {
                let ParentRef::Company(parent_id) = edge.primary_parent else {
                    return None;
                };
                let from = placed.get(parent_id.as_str())?.point();
                let to = placed.get(edge.id.as_str())?.point();
                Some(PrimaryLink {
                    parent_id,
                    child_id: edge.id,
                    from,
                    to,
                })
            })
            .collect();

        let secondary_edges = secondary_edges(&graph.companies, &positions);
        let bounds = nodes.iter().map(NodeBox::bounds).reduce(|a, b| Bounds {
            min_x: a.min_x.min(b.min_x),
            min_y: a.min_y.min(b.min_y),
            max_x: a.max_x.max(b.max_x),
            max_y: a.max_y.max(b.max_y),
        });

        debug!(
            nodes = nodes.len(),
            primary = primary_edges.len(),
            secondary = secondary_edges.len(),
            "chart computed"
        );

        Self {
            nodes,
            primary_edges,
            secondary_edges,
            bounds,
            broken_cycles: tree.broken_cycles().to_vec(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&NodeBox> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn positions(&self) -> Vec<NodePosition> {
        self.nodes
            .iter()
            .map(|node| NodePosition {
                id: node.id.clone(),
                x: node.x,
                y: node.y,
                depth: node.depth,
            })
            .collect()
    }

    /// Id of the company whose box contains the chart point, if any.
    pub fn node_at(&self, point: Point) -> Option<&str> {
        self.nodes
            .iter()
            .rev()
            .find(|node| node.bounds().contains(point))
            .map(|node| node.id.as_str())
    }

    /// Selection hit test in screen coordinates.
    pub fn node_at_screen(&self, viewport: &Viewport, sx: f64, sy: f64) -> Option<&str> {
        self.node_at(viewport.screen_to_chart(sx, sy))
    }

    pub fn initial_viewport(&self, width: f64, height: f64, config: &ChartConfig) -> Viewport {
        Viewport::centered_on(&self.positions(), width, height, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Company, Person};

    #[test]
    fn boxes_carry_names_and_member_counts() {
        let graph = Graph::new(
            vec![
                Company::new("H", "Holding").with_type("holding"),
                Company::new("A", "Alpha").with_parents(["H"]),
            ],
            vec![
                Person::new("p1", "Ada", "CEO", "A"),
                Person::new("p2", "Bo", "CTO", "A"),
            ],
        );
        let chart = ChartLayout::compute(&graph, &ChartConfig::default());

        let alpha = chart.node("A").unwrap();
        assert_eq!(alpha.name, "Alpha");
        assert_eq!(alpha.member_count, 2);
        assert_eq!(chart.node("H").unwrap().type_tag, "holding");
        assert_eq!(chart.primary_edges.len(), 1);
        assert!(chart.secondary_edges.is_empty());
    }

    #[test]
    fn hit_testing_finds_boxes() {
        let config = ChartConfig::default();
        let graph = Graph::new(vec![Company::new("H", "Holding")], Vec::new());
        let chart = ChartLayout::compute(&graph, &config);

        assert_eq!(chart.node_at(Point::new(10.0, 5.0)), Some("H"));
        assert_eq!(chart.node_at(Point::new(config.node_width, 0.0)), None);

        let viewport = chart.initial_viewport(800.0, 600.0, &config);
        let screen = viewport.chart_to_screen(Point::new(0.0, 0.0));
        assert_eq!(chart.node_at_screen(&viewport, screen.x, screen.y), Some("H"));
    }

    #[test]
    fn empty_graph_has_no_bounds() {
        let chart = ChartLayout::compute(&Graph::default(), &ChartConfig::default());
        assert!(chart.nodes.is_empty());
        assert!(chart.bounds.is_none());
    }
}
