//! Diagram layout
//!
//! Assigns every node of a [`Subgraph`] a fixed-size rectangle and every edge
//! a polyline. Engines sit behind [`LayoutEngine`]; the bundled
//! [`LayeredLayout`] hands the graph to dagre.

use dugong::graphlib::{Graph, GraphOptions};
use dugong::{EdgeLabel, GraphLabel, NodeLabel, RankDir};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::subgraph::Subgraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Ranks stacked vertically, roots on top
    #[default]
    #[serde(alias = "TB")]
    TopBottom,
    /// Ranks laid out left to right
    #[serde(alias = "LR")]
    LeftRight,
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tb" | "top-bottom" | "vertical" => Ok(Direction::TopBottom),
            "lr" | "left-right" | "horizontal" => Ok(Direction::LeftRight),
            other => Err(format!("Unknown direction '{}'. Expected tb or lr", other)),
        }
    }
}

/// Sizes and spacing used by the layout, in diagram units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub node_width: f64,
    pub node_height: f64,
    /// Gap between neighbours in the same rank
    pub node_sep: f64,
    /// Gap between consecutive ranks
    pub rank_sep: f64,
    pub direction: Direction,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 220.0,
            node_height: 70.0,
            node_sep: 80.0,
            rank_sep: 100.0,
            direction: Direction::TopBottom,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedNode {
    pub id: String,
    /// Top-left corner
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Layer index along the flow direction, 0 for the first layer
    pub rank: usize,
}

impl PositionedNode {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether `(x, y)` lies strictly inside the node's box
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x > self.x && x < self.x + self.width && y > self.y && y < self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayoutPoint {
    pub x: f64,
    pub y: f64,
}

/// Polyline for one flow edge, from the source border to the target border
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedEdge {
    /// Same id as the subgraph edge
    pub id: String,
    pub source: String,
    pub target: String,
    pub points: Vec<LayoutPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Layout {
    /// Same order as the subgraph's nodes
    pub nodes: Vec<PositionedNode>,
    pub edges: Vec<RoutedEdge>,
    pub width: f64,
    pub height: f64,
}

impl Layout {
    pub fn position(&self, id: &str) -> Option<&PositionedNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn route(&self, edge_id: &str) -> Option<&RoutedEdge> {
        self.edges.iter().find(|e| e.id == edge_id)
    }

    pub fn rank_count(&self) -> usize {
        self.nodes.iter().map(|n| n.rank + 1).max().unwrap_or(0)
    }
}

pub trait LayoutEngine {
    fn layout(&self, graph: &Subgraph, config: &LayoutConfig) -> Layout;
}

/// Layered (Sugiyama) layout delegated to the `dugong` dagre port.
///
/// Every node gets the configured fixed size. Long edges are routed through
/// dagre's dummy nodes, so they bend around the layers they cross. Results are
/// shifted so the smallest node coordinate is 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayeredLayout;

impl LayoutEngine for LayeredLayout {
    fn layout(&self, graph: &Subgraph, config: &LayoutConfig) -> Layout {
        if graph.nodes.is_empty() {
            return Layout::default();
        }

        let mut g = build_graph(graph, config);
        dugong::layout(&mut g);
        collect(graph, config, &g)
    }
}

type DagreGraph = Graph<NodeLabel, EdgeLabel, GraphLabel>;

fn build_graph(graph: &Subgraph, config: &LayoutConfig) -> DagreGraph {
    let mut g: DagreGraph = Graph::new(GraphOptions {
        multigraph: true,
        compound: false,
        directed: true,
    });
    g.set_graph(GraphLabel {
        rankdir: match config.direction {
            Direction::TopBottom => RankDir::TB,
            Direction::LeftRight => RankDir::LR,
        },
        nodesep: config.node_sep,
        ranksep: config.rank_sep,
        marginx: 0.0,
        marginy: 0.0,
        ..Default::default()
    });

    for node in &graph.nodes {
        g.set_node(
            node.id.clone(),
            NodeLabel {
                width: config.node_width,
                height: config.node_height,
                ..Default::default()
            },
        );
    }

    // Self-loops are routed locally in `collect`
    for edge in graph.edges.iter().filter(|e| e.source != e.target) {
        g.set_edge_named(
            edge.source.clone(),
            edge.target.clone(),
            Some(edge.id.clone()),
            Some(EdgeLabel {
                minlen: 1,
                weight: 1.0,
                ..Default::default()
            }),
        );
    }
    g
}

fn collect(graph: &Subgraph, config: &LayoutConfig, g: &DagreGraph) -> Layout {
    // dagre reports centers; convert to top-left corners
    let corners: Vec<(f64, f64)> = graph
        .nodes
        .iter()
        .map(|node| {
            let label = g.node(&node.id);
            let cx = label.and_then(|n| n.x).unwrap_or(0.0);
            let cy = label.and_then(|n| n.y).unwrap_or(0.0);
            (cx - config.node_width / 2.0, cy - config.node_height / 2.0)
        })
        .collect();

    let min_x = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
    let min_y = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);

    let ranks = ranks_along(&corners, config.direction);
    let nodes: Vec<PositionedNode> = graph
        .nodes
        .iter()
        .zip(&corners)
        .zip(ranks)
        .map(|((element, &(x, y)), rank)| PositionedNode {
            id: element.id.clone(),
            x: x - min_x,
            y: y - min_y,
            width: config.node_width,
            height: config.node_height,
            rank,
        })
        .collect();

    let mut routed: HashMap<String, Vec<LayoutPoint>> = HashMap::new();
    for key in g.edge_keys() {
        let (Some(name), Some(label)) = (key.name.clone(), g.edge_by_key(&key)) else {
            continue;
        };
        let points = label
            .points
            .iter()
            .map(|p| LayoutPoint {
                x: p.x - min_x,
                y: p.y - min_y,
            })
            .collect();
        routed.insert(name, points);
    }

    let edges: Vec<RoutedEdge> = graph
        .edges
        .iter()
        .map(|edge| {
            let points = if edge.source == edge.target {
                self_loop(&nodes, &edge.source, config)
            } else {
                routed.remove(&edge.id).unwrap_or_default()
            };
            RoutedEdge {
                id: edge.id.clone(),
                source: edge.source.clone(),
                target: edge.target.clone(),
                points,
            }
        })
        .collect();

    let node_extent = nodes
        .iter()
        .map(|p| (p.x + p.width, p.y + p.height));
    let point_extent = edges.iter().flat_map(|e| e.points.iter().map(|p| (p.x, p.y)));
    let (width, height) = node_extent
        .chain(point_extent)
        .fold((0.0_f64, 0.0_f64), |(w, h), (x, y)| (w.max(x), h.max(y)));

    Layout {
        nodes,
        edges,
        width,
        height,
    }
}

/// Layer index of each node, from the distinct positions along the flow axis
fn ranks_along(corners: &[(f64, f64)], direction: Direction) -> Vec<usize> {
    let main = |c: &(f64, f64)| match direction {
        Direction::TopBottom => c.1,
        Direction::LeftRight => c.0,
    };

    let mut levels: Vec<f64> = corners.iter().map(main).collect();
    levels.sort_by(f64::total_cmp);
    levels.dedup_by(|a, b| (*a - *b).abs() < 0.5);

    corners
        .iter()
        .map(|c| {
            let v = main(c);
            levels.iter().position(|l| (l - v).abs() < 0.5).unwrap_or(0)
        })
        .collect()
}

/// A small loop off the node's trailing side
fn self_loop(nodes: &[PositionedNode], id: &str, config: &LayoutConfig) -> Vec<LayoutPoint> {
    let Some(n) = nodes.iter().find(|n| n.id == id) else {
        return Vec::new();
    };
    let reach = config.node_sep / 2.0;
    match config.direction {
        Direction::TopBottom => {
            let x = n.x + n.width;
            vec![
                LayoutPoint { x, y: n.y + n.height * 0.25 },
                LayoutPoint { x: x + reach, y: n.y + n.height / 2.0 },
                LayoutPoint { x, y: n.y + n.height * 0.75 },
            ]
        }
        Direction::LeftRight => {
            let y = n.y + n.height;
            vec![
                LayoutPoint { x: n.x + n.width * 0.25, y },
                LayoutPoint { x: n.x + n.width / 2.0, y: y + reach },
                LayoutPoint { x: n.x + n.width * 0.75, y },
            ]
        }
    }
}
