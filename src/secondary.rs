use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::graph::Company;
use crate::layout::{NodePosition, Point};

/// Extra edge from a non-primary parent to its child, drawn apart from the tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondaryEdge {
    pub parent_id: String,
    pub child_id: String,
    pub from: Point,
    pub to: Point,
}

/// Rebuilds the parent links the spanning tree dropped: one edge for every
/// `parent_ids[1..]` entry whose parent has been laid out.
///
/// Dangling parents, and children that were not laid out, are skipped.
pub fn secondary_edges(companies: &[Company], positions: &[NodePosition]) -> Vec<SecondaryEdge> {
    let placed: HashMap<&str, Point> = positions
        .iter()
        .map(|position| (position.id.as_str(), position.point()))
        .collect();

    let mut edges = Vec::new();
    for company in companies {
        let secondary = company.secondary_parents();
        if secondary.is_empty() {
            continue;
        }
        let Some(&to) = placed.get(company.id.as_str()) else {
            continue;
        };
        for parent_id in secondary {
            if *parent_id == company.id {
                continue;
            }
            match placed.get(parent_id.as_str()) {
                Some(&from) => edges.push(SecondaryEdge {
                    parent_id: parent_id.clone(),
                    child_id: company.id.clone(),
                    from,
                    to,
                }),
                None => debug!(
                    id = %company.id,
                    parent = %parent_id,
                    "dangling secondary parent omitted"
                ),
            }
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(id: &str, x: f64, y: f64) -> NodePosition {
        NodePosition {
            id: id.to_string(),
            x,
            y,
            depth: 1,
        }
    }

    #[test]
    fn emits_one_edge_per_extra_parent() {
        let companies = vec![
            Company::new("A", "A"),
            Company::new("B", "B"),
            Company::new("D", "D"),
            Company::new("C", "C").with_parents(["A", "B", "D"]),
        ];
        let positions = vec![
            at("A", 0.0, 0.0),
            at("B", 10.0, 0.0),
            at("D", 20.0, 0.0),
            at("C", 5.0, 9.0),
        ];

        let edges = secondary_edges(&companies, &positions);
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].parent_id, "B");
        assert_eq!(edges[0].from, Point::new(10.0, 0.0));
        assert_eq!(edges[0].to, Point::new(5.0, 9.0));
        assert_eq!(edges[1].parent_id, "D");
    }

    #[test]
    fn dangling_secondary_parent_is_skipped() {
        let companies = vec![
            Company::new("A", "A"),
            Company::new("C", "C").with_parents(["A", "ghost"]),
        ];
        let positions = vec![at("A", 0.0, 0.0), at("C", 0.0, 9.0)];
        assert!(secondary_edges(&companies, &positions).is_empty());
    }
}
