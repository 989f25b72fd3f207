/// Configuration for k-means partitioning.
#[derive(Debug, Clone)]
pub struct KMeansConfig {
    /// Number of clusters. Reduced to the number of points when larger.
    pub k: usize,
    /// Independent k-means++ restarts; the lowest-inertia run wins.
    pub n_init: usize,
    pub max_iter: usize,
    /// Convergence tolerance relative to the mean per-feature variance.
    pub tol: f64,
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            k: 5,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            seed: 42,
        }
    }
}

/// Outcome of a k-means run.
#[derive(Debug, Clone)]
pub struct KMeansResult {
    /// Cluster id per input point, in 0..k.
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances from each point to its centroid.
    pub inertia: f64,
    /// Lloyd iterations used by the winning run.
    pub iterations: usize,
    pub k: usize,
}

/// Partition `points` (all of equal dimension) with Lloyd's algorithm seeded
/// by k-means++. Identical points always land in the same cluster.
pub fn kmeans(points: &[Vec<f64>], config: &KMeansConfig) -> KMeansResult {
    let n = points.len();
    let k = config.k.min(n);
    if n == 0 || k == 0 {
        return KMeansResult {
            labels: vec![0; n],
            centroids: Vec::new(),
            inertia: 0.0,
            iterations: 0,
            k: 0,
        };
    }

    let tol = config.tol * mean_variance(points);
    let run_once = |run: usize| {
        let mut rng = LcgRng::new(config.seed.wrapping_add(run as u64));
        let init = kmeans_plus_plus(points, k, &mut rng);
        let result = lloyd(points, init, config.max_iter, tol);
        tracing::debug!(run, inertia = result.inertia, iterations = result.iterations, "k-means run");
        result
    };

    let mut best = run_once(0);
    for run in 1..config.n_init {
        let result = run_once(run);
        if result.inertia < best.inertia {
            best = result;
        }
    }
    best
}

fn lloyd(points: &[Vec<f64>], mut centroids: Vec<Vec<f64>>, max_iter: usize, tol: f64) -> KMeansResult {
    let k = centroids.len();
    let dim = points[0].len();
    let mut labels = assign(points, &centroids);
    let mut iterations = 0;

    for _ in 0..max_iter {
        iterations += 1;

        let mut sums = vec![vec![0.0f64; dim]; k];
        let mut counts = vec![0usize; k];
        for (p, &l) in points.iter().zip(&labels) {
            counts[l] += 1;
            for (s, x) in sums[l].iter_mut().zip(p) {
                *s += x;
            }
        }

        let mut shift = 0.0;
        for c in 0..k {
            // An empty cluster keeps its previous centroid.
            if counts[c] == 0 {
                continue;
            }
            let updated: Vec<f64> = sums[c].iter().map(|s| s / counts[c] as f64).collect();
            shift += squared_distance(&centroids[c], &updated);
            centroids[c] = updated;
        }

        labels = assign(points, &centroids);
        if shift <= tol {
            break;
        }
    }

    let inertia = points
        .iter()
        .zip(&labels)
        .map(|(p, &l)| squared_distance(p, &centroids[l]))
        .sum();

    KMeansResult {
        labels,
        centroids,
        inertia,
        iterations,
        k,
    }
}

/// Nearest centroid per point; ties go to the lowest centroid index.
fn assign(points: &[Vec<f64>], centroids: &[Vec<f64>]) -> Vec<usize> {
    points
        .iter()
        .map(|p| {
            let mut best = 0;
            let mut best_dist = f64::INFINITY;
            for (c, centroid) in centroids.iter().enumerate() {
                let d = squared_distance(p, centroid);
                if d < best_dist {
                    best_dist = d;
                    best = c;
                }
            }
            best
        })
        .collect()
}

fn kmeans_plus_plus(points: &[Vec<f64>], k: usize, rng: &mut LcgRng) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.below(n)].clone());

    let mut closest: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = closest.iter().sum();
        let next = if total > 0.0 {
            let target = rng.next_f64() * total;
            let mut acc = 0.0;
            let mut chosen = n - 1;
            for (i, d) in closest.iter().enumerate() {
                acc += d;
                if acc > target {
                    chosen = i;
                    break;
                }
            }
            chosen
        } else {
            // Every point coincides with a centroid already.
            rng.below(n)
        };

        let centroid = points[next].clone();
        for (c, p) in closest.iter_mut().zip(points) {
            *c = c.min(squared_distance(p, &centroid));
        }
        centroids.push(centroid);
    }
    centroids
}

fn mean_variance(points: &[Vec<f64>]) -> f64 {
    let n = points.len() as f64;
    let dim = points[0].len();
    if dim == 0 {
        return 0.0;
    }
    let mut total = 0.0;
    for j in 0..dim {
        let mean = points.iter().map(|p| p[j]).sum::<f64>() / n;
        total += points.iter().map(|p| (p[j] - mean).powi(2)).sum::<f64>() / n;
    }
    total / dim as f64
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Simple Linear Congruential Generator for deterministic seeding.
struct LcgRng {
    state: u64,
}

impl LcgRng {
    fn new(seed: u64) -> Self {
        Self { state: seed.wrapping_add(1) }
    }

    fn next(&mut self) -> u64 {
        // LCG constants from Numerical Recipes
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.state
    }

    /// Uniform in [0, 1) from the high 53 bits.
    fn next_f64(&mut self) -> f64 {
        (self.next() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        ((self.next() >> 33) as usize) % n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn blobs() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![0.0, 0.1],
            vec![10.0, 10.0],
            vec![10.1, 10.0],
            vec![10.0, 10.1],
        ]
    }

    fn config(k: usize) -> KMeansConfig {
        KMeansConfig {
            k,
            ..KMeansConfig::default()
        }
    }

    #[test]
    fn separates_two_blobs() {
        let r = kmeans(&blobs(), &config(2));
        assert_eq!(r.labels.len(), 6);
        assert_eq!(r.labels[0], r.labels[1]);
        assert_eq!(r.labels[1], r.labels[2]);
        assert_eq!(r.labels[3], r.labels[4]);
        assert_eq!(r.labels[4], r.labels[5]);
        assert_ne!(r.labels[0], r.labels[3]);
        assert!(r.inertia < 0.1);
    }

    #[test]
    fn labels_in_range() {
        let r = kmeans(&blobs(), &config(5));
        assert_eq!(r.k, 5);
        assert!(r.labels.iter().all(|&l| l < 5));
    }

    #[test]
    fn reproducible_with_same_seed() {
        let a = kmeans(&blobs(), &config(3));
        let b = kmeans(&blobs(), &config(3));
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.inertia, b.inertia);
    }

    #[test]
    fn identical_points_share_cluster() {
        let points = vec![vec![0.3, 0.7, 0.5]; 5];
        let r = kmeans(&points, &config(5));
        let unique: HashSet<usize> = r.labels.iter().copied().collect();
        assert_eq!(unique.len(), 1);
        assert_eq!(r.inertia, 0.0);
    }

    #[test]
    fn k_reduced_to_point_count() {
        let points = vec![vec![0.0], vec![5.0]];
        let r = kmeans(&points, &config(5));
        assert_eq!(r.k, 2);
        assert_ne!(r.labels[0], r.labels[1]);
    }

    #[test]
    fn empty_input() {
        let r = kmeans(&[], &config(5));
        assert!(r.labels.is_empty());
        assert_eq!(r.k, 0);
    }

    #[test]
    fn rng_deterministic_and_bounded() {
        let mut a = LcgRng::new(7);
        let mut b = LcgRng::new(7);
        for _ in 0..100 {
            let x = a.next_f64();
            assert_eq!(x, b.next_f64());
            assert!((0.0..1.0).contains(&x));
            assert!(a.below(3) < 3);
            b.below(3);
        }
    }
}
