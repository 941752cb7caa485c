//! Static 2-d tree over (lat, lon) points for nearest-neighbour queries.
//!
//! The tree is implicit: after construction, `order[lo..hi]` holds a subtree
//! whose root sits at the midpoint, with the left subtree before it and the
//! right subtree after it. Distances are Euclidean in degrees.

/// Nearest-neighbour index over a fixed point set.
#[derive(Debug, Clone)]
pub struct KdTree {
    points: Vec<[f64; 2]>,
    order: Vec<usize>,
}

struct Best {
    dist: f64,
    index: usize,
}

impl KdTree {
    /// Build over parallel latitude/longitude slices. Points with a
    /// non-finite coordinate are left out of the index.
    pub fn new(lats: &[f64], lons: &[f64]) -> Self {
        let points: Vec<[f64; 2]> = lats.iter().zip(lons).map(|(&a, &b)| [a, b]).collect();
        let mut order: Vec<usize> = (0..points.len())
            .filter(|&i| points[i][0].is_finite() && points[i][1].is_finite())
            .collect();
        build(&points, &mut order, 0);
        Self { points, order }
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Index of the point closest to (lat, lon). Equidistant points resolve
    /// to the lowest index. `None` for an empty tree or a non-finite query.
    pub fn nearest(&self, lat: f64, lon: f64) -> Option<usize> {
        if !lat.is_finite() || !lon.is_finite() || self.order.is_empty() {
            return None;
        }
        let mut best = Best {
            dist: f64::INFINITY,
            index: usize::MAX,
        };
        self.search([lat, lon], 0, self.order.len(), 0, &mut best);
        Some(best.index)
    }

    fn search(&self, query: [f64; 2], lo: usize, hi: usize, depth: usize, best: &mut Best) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        let index = self.order[mid];
        let point = self.points[index];
        let dist = sq(query[0] - point[0]) + sq(query[1] - point[1]);
        if dist < best.dist || (dist == best.dist && index < best.index) {
            best.dist = dist;
            best.index = index;
        }

        let axis = depth % 2;
        let diff = query[axis] - point[axis];
        let (near, far) = if diff < 0.0 {
            ((lo, mid), (mid + 1, hi))
        } else {
            ((mid + 1, hi), (lo, mid))
        };
        self.search(query, near.0, near.1, depth + 1, best);
        // Equal distances still descend so ties can reach a lower index.
        if sq(diff) <= best.dist {
            self.search(query, far.0, far.1, depth + 1, best);
        }
    }
}

fn build(points: &[[f64; 2]], order: &mut [usize], depth: usize) {
    if order.len() <= 1 {
        return;
    }
    let axis = depth % 2;
    let mid = order.len() / 2;
    order.select_nth_unstable_by(mid, |&a, &b| points[a][axis].total_cmp(&points[b][axis]));
    let (left, right) = order.split_at_mut(mid);
    build(points, left, depth + 1);
    build(points, &mut right[1..], depth + 1);
}

fn sq(v: f64) -> f64 {
    v * v
}
