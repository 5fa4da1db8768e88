//! Service route over the dry sensors: greedy Nearest-Neighbor construction followed by 2-Opt.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::geo::distance_km;
use crate::sensor::{Sensor, SensorId};

const IMPROVEMENT_EPS_KM: f64 = 1e-12;
const LENGTH_TOLERANCE_KM: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteShape {
    /// Ends at the last stop.
    #[default]
    Open,
    /// Returns to the first stop.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub shape: RouteShape,
    pub stops: Vec<SensorId>,
    pub length_km: f64,
}

impl Route {
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePlan {
    pub initial: Route,
    pub optimized: Route,
    pub two_opt_passes: u32,
    pub two_opt_moves: u32,
}

#[derive(Debug, Clone)]
pub struct RouteOptimizer {
    shape: RouteShape,
    max_passes: u32,
}

impl RouteOptimizer {
    pub fn new(shape: RouteShape, max_passes: u32) -> Self {
        Self { shape, max_passes }
    }

    pub fn plan(&self, stops: &[&Sensor]) -> RoutePlan {
        let tour = Tour::new(stops, self.shape);
        let initial_order = tour.nearest_neighbor();
        let initial = tour.route(&initial_order);

        let mut order = initial_order;
        let (two_opt_passes, two_opt_moves) = if order.len() >= 4 {
            tour.two_opt(&mut order, self.max_passes)
        } else {
            (0, 0)
        };
        let optimized = tour.route(&order);
        log::debug!(
            "route over {} stops: {:.3} km -> {:.3} km after {} passes / {} moves",
            stops.len(),
            initial.length_km,
            optimized.length_km,
            two_opt_passes,
            two_opt_moves
        );

        RoutePlan {
            initial,
            optimized,
            two_opt_passes,
            two_opt_moves,
        }
    }
}

impl Default for RouteOptimizer {
    fn default() -> Self {
        Self::new(RouteShape::Open, 200)
    }
}

struct Tour {
    ids: Vec<SensorId>,
    dist: Vec<Vec<f64>>,
    shape: RouteShape,
}

impl Tour {
    fn new(stops: &[&Sensor], shape: RouteShape) -> Self {
        let ids = stops.iter().map(|s| s.id).collect();
        let dist = stops
            .iter()
            .map(|a| {
                stops
                    .iter()
                    .map(|b| distance_km(a.position(), b.position()))
                    .collect()
            })
            .collect();
        Self { ids, dist, shape }
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn nearest_neighbor(&self) -> Vec<usize> {
        let n = self.len();
        if n == 0 {
            return Vec::new();
        }
        let mut visited = vec![false; n];
        let mut order = Vec::with_capacity(n);
        let mut current = 0;
        visited[0] = true;
        order.push(0);
        while order.len() < n {
            let next = (0..n)
                .filter(|&j| !visited[j])
                .min_by(|&a, &b| {
                    self.dist[current][a]
                        .total_cmp(&self.dist[current][b])
                        .then(self.ids[a].cmp(&self.ids[b]))
                })
                .unwrap_or(current);
            visited[next] = true;
            order.push(next);
            current = next;
        }
        order
    }

    fn length(&self, order: &[usize]) -> f64 {
        let mut total: f64 = order
            .windows(2)
            .map(|pair| self.dist[pair[0]][pair[1]])
            .sum();
        if self.shape == RouteShape::Closed && order.len() > 1 {
            total += self.dist[order[order.len() - 1]][order[0]];
        }
        total
    }

    /// Runs first-improvement 2-Opt until a pass finds nothing or `max_passes` is reached.
    /// Returns `(passes, moves)`.
    fn two_opt(&self, order: &mut [usize], max_passes: u32) -> (u32, u32) {
        let n = order.len();
        let edges = match self.shape {
            RouteShape::Open => n - 1,
            RouteShape::Closed => n,
        };
        let mut passes = 0;
        let mut moves = 0;
        while passes < max_passes {
            passes += 1;
            let mut improved = false;
            for i in 0..edges {
                for j in (i + 2)..edges {
                    // First and wrap edges share the start stop.
                    if self.shape == RouteShape::Closed && i == 0 && j == n - 1 {
                        continue;
                    }
                    let a = order[i];
                    let b = order[i + 1];
                    let c = order[j];
                    let d = order[(j + 1) % n];
                    let delta = self.dist[a][c] + self.dist[b][d]
                        - self.dist[a][b]
                        - self.dist[c][d];
                    if delta < -IMPROVEMENT_EPS_KM {
                        order[i + 1..=j].reverse();
                        improved = true;
                        moves += 1;
                    }
                }
            }
            if !improved {
                break;
            }
        }
        (passes, moves)
    }

    fn route(&self, order: &[usize]) -> Route {
        Route {
            shape: self.shape,
            stops: order.iter().map(|&index| self.ids[index]).collect(),
            length_km: self.length(order),
        }
    }
}

/// Confirms optimization only reordered the dry set and did not lengthen the tour.
pub fn verify_plan(plan: &RoutePlan, dry: &[&Sensor]) -> Result<(), SimulationError> {
    let expected: HashSet<SensorId> = dry.iter().map(|s| s.id).collect();
    for (label, route) in [("initial", &plan.initial), ("optimized", &plan.optimized)] {
        let members: HashSet<SensorId> = route.stops.iter().copied().collect();
        if route.stops.len() != dry.len() || members != expected {
            return Err(SimulationError::InvariantViolation(format!(
                "{label} route visits {} stops but the dry set has {}",
                route.stops.len(),
                dry.len()
            )));
        }
    }
    if plan.optimized.length_km > plan.initial.length_km + LENGTH_TOLERANCE_KM {
        return Err(SimulationError::InvariantViolation(format!(
            "optimized route ({:.6} km) is longer than the initial route ({:.6} km)",
            plan.optimized.length_km, plan.initial.length_km
        )));
    }
    Ok(())
}
