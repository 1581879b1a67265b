use std::fmt::Write as FmtWrite;

use anyhow::{Result, anyhow};

use crate::chart::{ChartLayout, NodeBox};
use crate::layout::Point;
use crate::utils::escape_xml;

const TYPE_COLORS: &[&str] = &[
    "#fde68a", "#c4f1f9", "#e9d8fd", "#fbcfe8", "#c6f6d5", "#fed7aa", "#bee3f8", "#e2e8f0",
];
const PRIMARY_STROKE: &str = "#2d3748";
const SECONDARY_STROKE: &str = "#dd6b20";
const TEXT_COLOR: &str = "#1a202c";

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub background: String,
    pub margin: f64,
    pub show_members: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            background: "white".to_string(),
            margin: 40.0,
            show_members: true,
        }
    }
}

/// Draws a computed chart as a standalone SVG document.
///
/// Primary edges are solid elbows from the bottom of the parent to the top
/// of the child; secondary edges are dashed curves in a separate colour.
pub fn render_svg(chart: &ChartLayout, options: &RenderOptions) -> Result<String> {
    let bounds = chart
        .bounds
        .ok_or_else(|| anyhow!("graph does not contain any companies"))?;

    let margin = options.margin.max(0.0);
    let width = bounds.width() + margin * 2.0;
    let height = bounds.height() + margin * 2.0;
    let shift = Point::new(margin - bounds.min_x, margin - bounds.min_y);
    let moved = |p: Point| Point::new(p.x + shift.x, p.y + shift.y);
    let half_height = chart
        .nodes
        .first()
        .map(|node| node.height / 2.0)
        .unwrap_or_default();

    let mut svg = String::new();
    write!(
        svg,
        r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}" viewBox="0 0 {:.0} {:.0}" font-family="Inter, system-ui, sans-serif">
  <rect width="100%" height="100%" fill="{}" />
"##,
        width,
        height,
        width,
        height,
        escape_xml(&options.background)
    )?;

    svg.push_str("  <g class=\"primary-edges\">\n");
    for edge in &chart.primary_edges {
        let from = moved(edge.from);
        let to = moved(edge.to);
        let start_y = from.y + half_height;
        let end_y = to.y - half_height;
        let mid_y = (start_y + end_y) / 2.0;
        write!(
            svg,
            "    <path d=\"M{:.1},{:.1} V{:.1} H{:.1} V{:.1}\" fill=\"none\" stroke=\"{}\" stroke-width=\"2\" data-parent=\"{}\" data-child=\"{}\" />\n",
            from.x,
            start_y,
            mid_y,
            to.x,
            end_y,
            PRIMARY_STROKE,
            escape_xml(&edge.parent_id),
            escape_xml(&edge.child_id)
        )?;
    }
    svg.push_str("  </g>\n");

    svg.push_str("  <g class=\"secondary-edges\">\n");
    for edge in &chart.secondary_edges {
        let from = moved(edge.from);
        let to = moved(edge.to);
        let start = Point::new(from.x, from.y + half_height);
        let end = Point::new(to.x, to.y - half_height);
        let bend = (end.y - start.y).abs().max(half_height * 2.0) / 2.0;
        write!(
            svg,
            "    <path d=\"M{:.1},{:.1} C{:.1},{:.1} {:.1},{:.1} {:.1},{:.1}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.5\" stroke-dasharray=\"8 6\" data-parent=\"{}\" data-child=\"{}\" />\n",
            start.x,
            start.y,
            start.x,
            start.y + bend,
            end.x,
            end.y - bend,
            end.x,
            end.y,
            SECONDARY_STROKE,
            escape_xml(&edge.parent_id),
            escape_xml(&edge.child_id)
        )?;
    }
    svg.push_str("  </g>\n");

    for node in &chart.nodes {
        write_node(&mut svg, node, moved(node.center()), options)?;
    }

    svg.push_str("</svg>\n");
    Ok(svg)
}

fn write_node(
    svg: &mut String,
    node: &NodeBox,
    center: Point,
    options: &RenderOptions,
) -> Result<()> {
    write!(
        svg,
        "  <g class=\"company\" data-id=\"{}\">\n    <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" rx=\"8\" ry=\"8\" fill=\"{}\" stroke=\"{}\" stroke-width=\"2\" />\n",
        escape_xml(&node.id),
        center.x - node.width / 2.0,
        center.y - node.height / 2.0,
        node.width,
        node.height,
        type_color(&node.type_tag),
        PRIMARY_STROKE
    )?;

    write!(
        svg,
        "    <text x=\"{:.1}\" y=\"{:.1}\" fill=\"{}\" font-size=\"14\" font-weight=\"600\" text-anchor=\"middle\" dominant-baseline=\"middle\">{}</text>\n",
        center.x,
        center.y - 10.0,
        TEXT_COLOR,
        escape_xml(&node.name)
    )?;

    let mut caption = node.type_tag.clone();
    if options.show_members && node.member_count > 0 {
        let noun = if node.member_count == 1 { "member" } else { "members" };
        caption = format!("{caption} · {} {noun}", node.member_count);
    }
    write!(
        svg,
        "    <text x=\"{:.1}\" y=\"{:.1}\" fill=\"{}\" font-size=\"11\" text-anchor=\"middle\" dominant-baseline=\"middle\">{}</text>\n  </g>\n",
        center.x,
        center.y + 12.0,
        TEXT_COLOR,
        escape_xml(&caption)
    )?;
    Ok(())
}

fn type_color(type_tag: &str) -> &'static str {
    let hash = type_tag
        .bytes()
        .fold(0_usize, |acc, byte| acc.wrapping_mul(31).wrapping_add(byte as usize));
    TYPE_COLORS[hash % TYPE_COLORS.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChartConfig;
    use crate::graph::{Company, Graph};

    #[test]
    fn draws_both_edge_kinds() -> Result<()> {
        let graph = Graph::new(
            vec![
                Company::new("H", "Holding <Group>"),
                Company::new("A", "A").with_parents(["H"]),
                Company::new("B", "B").with_parents(["H"]),
                Company::new("C", "C").with_parents(["A", "B"]),
            ],
            Vec::new(),
        );
        let chart = ChartLayout::compute(&graph, &ChartConfig::default());
        let svg = render_svg(&chart, &RenderOptions::default())?;

        assert!(svg.starts_with("<?xml"));
        assert!(svg.contains("Holding &lt;Group&gt;"));
        assert_eq!(svg.matches("stroke-dasharray").count(), 1);
        assert_eq!(svg.matches("class=\"company\"").count(), 4);
        Ok(())
    }

    #[test]
    fn empty_chart_is_an_error() {
        let chart = ChartLayout::compute(&Graph::default(), &ChartConfig::default());
        assert!(render_svg(&chart, &RenderOptions::default()).is_err());
    }

    #[test]
    fn type_colors_are_stable() {
        assert_eq!(type_color("holding"), type_color("holding"));
    }
}
