//! Force-directed layout for flat graphs.
//!
//! A velocity Verlet simulation with the d3-force defaults: alpha starts at 1
//! and decays towards 0 over roughly 300 ticks, velocities lose 40% per tick,
//! and the forces run in a fixed order (many-body, link, collide, center).

use super::error::{LayoutError, Result};
use super::sizing::{FLAT_DEFAULT_SIZE, collect_size};
use super::types::Viewport;
use super::viewport::{Placed, fit_to_viewport};
use crate::ir::{GraphEdge, GraphNode, Position};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

const ALPHA_MIN: f64 = 0.001;
const VELOCITY_DECAY: f64 = 0.4;
const DISTANCE_MIN2: f64 = 1.0;
const INITIAL_WIDTH: f64 = 400.0;
const INITIAL_HEIGHT: f64 = 300.0;

#[derive(Clone)]
pub enum LinkDistance {
    Constant(f64),
    PerEdge(Arc<dyn Fn(&GraphEdge) -> f64 + Send + Sync>),
}

impl std::fmt::Debug for LinkDistance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkDistance::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            LinkDistance::PerEdge(_) => f.write_str("PerEdge(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForceOptions {
    pub charge_strength: f64,
    pub link_distance: LinkDistance,
    /// Must lie in `[0, 1]`.
    pub link_strength: f64,
    pub collide_padding: f64,
    pub iterations: usize,
    pub center: Position,
    /// Fixed seed for reproducible runs; the clock seeds unseeded runs.
    pub seed: Option<u64>,
}

impl Default for ForceOptions {
    fn default() -> Self {
        Self {
            charge_strength: -400.0,
            link_distance: LinkDistance::Constant(120.0),
            link_strength: 0.8,
            collide_padding: 12.0,
            iterations: 300,
            center: Position::default(),
            seed: None,
        }
    }
}

/// xorshift64* generator, small and reproducible across platforms.
#[derive(Debug, Clone)]
pub struct XorShift64Star {
    state: u64,
}

impl XorShift64Star {
    pub fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    pub fn from_clock() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or(0x9E37_79B9_7F4A_7C15);
        Self::new(nanos)
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D_u64)
    }

    /// Uniform in `[0, 1)` with 53 bits of precision.
    pub fn next_f64(&mut self) -> f64 {
        let u = self.next_u64() >> 11;
        (u as f64) / ((1u64 << 53) as f64)
    }

    fn jiggle(&mut self) -> f64 {
        (self.next_f64() - 0.5) * 1e-6
    }
}

struct Body {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
    radius: f64,
}

struct Link {
    source: usize,
    target: usize,
    distance: f64,
    bias: f64,
}

struct Simulation {
    bodies: Vec<Body>,
    links: Vec<Link>,
    alpha: f64,
    alpha_decay: f64,
    charge: f64,
    link_strength: f64,
    center: Position,
    rng: XorShift64Star,
}

impl Simulation {
    fn tick(&mut self) {
        self.alpha += (0.0 - self.alpha) * self.alpha_decay;
        self.apply_many_body();
        self.apply_links();
        self.apply_collide();
        self.apply_center();
        for body in &mut self.bodies {
            body.vx *= 1.0 - VELOCITY_DECAY;
            body.vy *= 1.0 - VELOCITY_DECAY;
            body.x += body.vx;
            body.y += body.vy;
        }
    }

    fn apply_many_body(&mut self) {
        let count = self.bodies.len();
        for i in 0..count {
            for j in 0..count {
                if i == j {
                    continue;
                }
                let mut dx = self.bodies[j].x - self.bodies[i].x;
                let mut dy = self.bodies[j].y - self.bodies[i].y;
                if dx == 0.0 {
                    dx = self.rng.jiggle();
                }
                if dy == 0.0 {
                    dy = self.rng.jiggle();
                }
                let mut l = dx * dx + dy * dy;
                if l < DISTANCE_MIN2 {
                    l = (DISTANCE_MIN2 * l).sqrt();
                }
                let w = self.charge * self.alpha / l;
                self.bodies[i].vx += dx * w;
                self.bodies[i].vy += dy * w;
            }
        }
    }

    fn apply_links(&mut self) {
        for link in &self.links {
            let (source, target) = (&self.bodies[link.source], &self.bodies[link.target]);
            let mut dx = target.x + target.vx - source.x - source.vx;
            let mut dy = target.y + target.vy - source.y - source.vy;
            if dx == 0.0 {
                dx = self.rng.jiggle();
            }
            if dy == 0.0 {
                dy = self.rng.jiggle();
            }
            let distance = (dx * dx + dy * dy).sqrt();
            let l = (distance - link.distance) / distance * self.alpha * self.link_strength;
            dx *= l;
            dy *= l;
            let target = &mut self.bodies[link.target];
            target.vx -= dx * link.bias;
            target.vy -= dy * link.bias;
            let source = &mut self.bodies[link.source];
            source.vx += dx * (1.0 - link.bias);
            source.vy += dy * (1.0 - link.bias);
        }
    }

    fn apply_collide(&mut self) {
        let count = self.bodies.len();
        for i in 0..count {
            let ri = self.bodies[i].radius;
            let ri2 = ri * ri;
            let xi = self.bodies[i].x + self.bodies[i].vx;
            let yi = self.bodies[i].y + self.bodies[i].vy;
            for j in (i + 1)..count {
                let rj = self.bodies[j].radius;
                let r = ri + rj;
                let mut dx = xi - (self.bodies[j].x + self.bodies[j].vx);
                let mut dy = yi - (self.bodies[j].y + self.bodies[j].vy);
                let l2 = dx * dx + dy * dy;
                if l2 >= r * r {
                    continue;
                }
                if dx == 0.0 {
                    dx = self.rng.jiggle();
                }
                if dy == 0.0 {
                    dy = self.rng.jiggle();
                }
                let l = (dx * dx + dy * dy).sqrt();
                let push = (r - l) / l;
                dx *= push;
                dy *= push;
                let rj2 = rj * rj;
                let share = rj2 / (ri2 + rj2);
                self.bodies[i].vx += dx * share;
                self.bodies[i].vy += dy * share;
                self.bodies[j].vx -= dx * (1.0 - share);
                self.bodies[j].vy -= dy * (1.0 - share);
            }
        }
    }

    fn apply_center(&mut self) {
        if self.bodies.is_empty() {
            return;
        }
        let count = self.bodies.len() as f64;
        let shift_x = self.bodies.iter().map(|body| body.x).sum::<f64>() / count - self.center.x;
        let shift_y = self.bodies.iter().map(|body| body.y).sum::<f64>() / count - self.center.y;
        for body in &mut self.bodies {
            body.x -= shift_x;
            body.y -= shift_y;
        }
    }
}

/// Force-directed layout of the visible nodes, fitted into `viewport`.
///
/// Hidden nodes are returned unchanged. Edges whose endpoints are missing or
/// hidden are ignored.
pub async fn layout_force_directed(
    nodes: &[GraphNode],
    edges: &[GraphEdge],
    viewport: &Viewport,
    options: &ForceOptions,
) -> Result<Vec<GraphNode>> {
    if !(0.0..=1.0).contains(&options.link_strength) {
        return Err(LayoutError::InvalidOption {
            key: "linkStrength",
            value: options.link_strength.to_string(),
        });
    }

    let mut rng = options
        .seed
        .map(XorShift64Star::new)
        .unwrap_or_else(XorShift64Star::from_clock);

    let members: Vec<usize> = (0..nodes.len()).filter(|idx| !nodes[*idx].hidden).collect();
    let sizes: Vec<_> = members
        .iter()
        .map(|idx| collect_size(&nodes[*idx], FLAT_DEFAULT_SIZE))
        .collect();
    let slot_of: HashMap<&str, usize> = members
        .iter()
        .enumerate()
        .map(|(slot, idx)| (nodes[*idx].id.as_str(), slot))
        .collect();

    let bodies: Vec<Body> = sizes
        .iter()
        .map(|size| {
            let half_diagonal = ((size.width / 2.0).powi(2) + (size.height / 2.0).powi(2)).sqrt();
            Body {
                x: rng.next_f64() * INITIAL_WIDTH,
                y: rng.next_f64() * INITIAL_HEIGHT,
                vx: 0.0,
                vy: 0.0,
                radius: half_diagonal + options.collide_padding,
            }
        })
        .collect();

    let pairs: Vec<(usize, usize, &GraphEdge)> = edges
        .iter()
        .filter_map(|edge| {
            let source = slot_of.get(edge.source.as_str())?;
            let target = slot_of.get(edge.target.as_str())?;
            (source != target).then_some((*source, *target, edge))
        })
        .collect();
    let mut degree = vec![0usize; bodies.len()];
    for (source, target, _) in &pairs {
        degree[*source] += 1;
        degree[*target] += 1;
    }
    let links = pairs
        .iter()
        .map(|(source, target, edge)| Link {
            source: *source,
            target: *target,
            distance: match &options.link_distance {
                LinkDistance::Constant(distance) => *distance,
                LinkDistance::PerEdge(distance) => distance(edge),
            },
            bias: degree[*source] as f64 / (degree[*source] + degree[*target]) as f64,
        })
        .collect();

    let mut simulation = Simulation {
        bodies,
        links,
        alpha: 1.0,
        alpha_decay: 1.0 - ALPHA_MIN.powf(1.0 / 300.0),
        charge: options.charge_strength,
        link_strength: options.link_strength,
        center: options.center,
        rng,
    };
    for _ in 0..options.iterations {
        simulation.tick();
    }
    debug!(
        nodes = simulation.bodies.len(),
        links = simulation.links.len(),
        alpha = simulation.alpha,
        "force simulation settled"
    );

    let boxes: Vec<Placed> = simulation
        .bodies
        .iter()
        .zip(&sizes)
        .map(|(body, size)| Placed {
            position: Some(Position::new(
                body.x - size.width / 2.0,
                body.y - size.height / 2.0,
            )),
            size: *size,
        })
        .collect();
    let fitted = fit_to_viewport(&boxes, viewport);
    Ok(write_fitted(nodes, &members, &sizes, &fitted))
}

/// Copies fitted boxes back onto the nodes at `members`.
pub(crate) fn write_fitted(
    nodes: &[GraphNode],
    members: &[usize],
    sizes: &[crate::ir::Size],
    fitted: &[Placed],
) -> Vec<GraphNode> {
    let mut out = nodes.to_vec();
    for ((idx, size), placed) in members.iter().zip(sizes).zip(fitted) {
        let node = &mut out[*idx];
        if let Some(position) = placed.position {
            node.position = position;
        }
        if placed.size != *size {
            node.width = Some(placed.size.width);
            node.height = Some(placed.size.height);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn ring(count: usize) -> (Vec<GraphNode>, Vec<GraphEdge>) {
        let nodes = (0..count).map(|idx| GraphNode::new(format!("n{idx}"))).collect();
        let edges = (0..count)
            .map(|idx| GraphEdge::new(format!("n{idx}"), format!("n{}", (idx + 1) % count)))
            .collect();
        (nodes, edges)
    }

    #[test]
    fn rng_matches_reference_sequence() {
        let mut rng = XorShift64Star::new(0);
        let mut again = XorShift64Star::new(1);
        assert_eq!(rng.next_u64(), again.next_u64());
        for _ in 0..1000 {
            let value = rng.next_f64();
            assert!((0.0..1.0).contains(&value));
        }
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let (nodes, edges) = ring(6);
        let viewport = Viewport::new(800.0, 600.0);
        let options = ForceOptions {
            seed: Some(42),
            ..ForceOptions::default()
        };
        let first = block_on(layout_force_directed(&nodes, &edges, &viewport, &options)).unwrap();
        let second = block_on(layout_force_directed(&nodes, &edges, &viewport, &options)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn nodes_stay_inside_the_viewport() {
        let (nodes, edges) = ring(8);
        let viewport = Viewport::new(800.0, 600.0).with_padding(20.0);
        let options = ForceOptions {
            seed: Some(7),
            ..ForceOptions::default()
        };
        let out = block_on(layout_force_directed(&nodes, &edges, &viewport, &options)).unwrap();
        for node in &out {
            let size = collect_size(node, FLAT_DEFAULT_SIZE);
            assert!(node.position.x >= 20.0 - 1e-6);
            assert!(node.position.y >= 20.0 - 1e-6);
            assert!(node.position.x + size.width <= 780.0 + 1e-6);
            assert!(node.position.y + size.height <= 580.0 + 1e-6);
        }
    }

    #[test]
    fn collision_keeps_nodes_apart() {
        let nodes = vec![GraphNode::new("a"), GraphNode::new("b")];
        let options = ForceOptions {
            seed: Some(3),
            charge_strength: 0.0,
            ..ForceOptions::default()
        };
        let out = block_on(layout_force_directed(
            &nodes,
            &[],
            &Viewport::new(100_000.0, 100_000.0),
            &options,
        ))
        .unwrap();
        assert!(out[0].position.distance(out[1].position) > 1.0);
    }

    #[test]
    fn hidden_nodes_and_dangling_edges_are_ignored() {
        let nodes = vec![
            GraphNode::new("a"),
            GraphNode::new("b").at(9.0, 9.0).hidden(),
        ];
        let edges = vec![GraphEdge::new("a", "b"), GraphEdge::new("a", "ghost")];
        let options = ForceOptions {
            seed: Some(1),
            ..ForceOptions::default()
        };
        let out = block_on(layout_force_directed(&nodes, &edges, &Viewport::new(800.0, 600.0), &options)).unwrap();
        assert_eq!(out[1].position, Position::new(9.0, 9.0));
    }

    #[test]
    fn link_strength_is_validated() {
        let options = ForceOptions {
            link_strength: 1.5,
            ..ForceOptions::default()
        };
        let err = block_on(layout_force_directed(&[], &[], &Viewport::new(1.0, 1.0), &options)).unwrap_err();
        assert!(matches!(err, LayoutError::InvalidOption { key: "linkStrength", .. }));
    }
}
