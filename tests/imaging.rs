use approx::assert_relative_eq;
use bluebild::sphere::fov_grid;
use bluebild::{eigh, BeamWeights, BluebildError, Imager, ImagerConfig, SpatialImager};
use ndarray::{array, Array1, Array2, Axis};
use num_complex::Complex64;
use sprs::TriMat;

struct Snapshot {
    d: Array1<f64>,
    v: Array2<Complex64>,
    xyz: Array2<f64>,
    cluster_idx: Vec<i64>,
}

fn antennas(rotation: f64) -> Array2<f64> {
    let base = [
        [0.0, 0.0],
        [1.3, 0.2],
        [-0.7, 1.1],
        [0.4, -1.6],
        [2.1, 1.7],
        [-1.9, -0.8],
    ];
    let (s, c) = rotation.sin_cos();
    Array2::from_shape_fn((base.len(), 3), |(a, i)| {
        let [x, y] = base[a];
        match i {
            0 => c * x - s * y,
            1 => s * x + c * y,
            _ => 0.0,
        }
    })
}

fn identity(n: usize) -> BeamWeights {
    BeamWeights::Dense(Array2::from_shape_fn((n, n), |(i, j)| {
        Complex64::new(if i == j { 1.0 } else { 0.0 }, 0.0)
    }))
}

fn snapshots() -> Vec<Snapshot> {
    (0..4)
        .map(|t| {
            let n_eig = 2 + t % 2;
            let v = Array2::from_shape_fn((6, n_eig), |(b, k)| {
                let phase = 0.37 * (b * (k + 1) + t) as f64;
                Complex64::from_polar(1.0 / 6f64.sqrt(), phase)
            });
            let d = Array1::from_shape_fn(n_eig, |k| 3.0 / (k as f64 + 1.0) + 0.1 * t as f64);
            let cluster_idx = (0..n_eig as i64).map(|k| k.min(1)).collect();
            Snapshot {
                d,
                v,
                xyz: antennas(0.2 * t as f64),
                cluster_idx,
            }
        })
        .collect()
}

fn grid() -> Array2<f64> {
    fov_grid([0.0, 0.0, 1.0], 0.3, 4, 4).unwrap()
}

fn run(order: &[usize], precision: u32) -> Imager {
    let snaps = snapshots();
    let mut imager = Imager::new(&ImagerConfig::new(1.0, 2).with_precision(precision), grid().view()).unwrap();
    let w = identity(6);
    for &i in order {
        let s = &snaps[i];
        imager
            .integrate(s.d.view(), s.v.view(), s.xyz.view(), &w, &s.cluster_idx)
            .unwrap();
    }
    imager
}

#[test]
fn scenario_three_by_five_grid() {
    let grid = array![
        [0.0, 0.1, 0.2, -0.1, -0.2],
        [0.0, 0.0, 0.1, 0.1, -0.1],
        [1.0, 0.995, 0.975, 0.99, 0.975]
    ];
    let mut imager = Imager::new(&ImagerConfig::new(1.0, 2), grid.view()).unwrap();
    assert!(matches!(imager.as_image(), Err(BluebildError::NotReady)));

    let xyz = array![[0.0, 0.0, 0.0], [0.5, 0.0, 0.0]];
    let v = array![
        [Complex64::new(0.6, 0.0), Complex64::new(0.0, 0.8)],
        [Complex64::new(0.8, 0.0), Complex64::new(0.6, 0.0)]
    ];
    let out = imager
        .integrate(array![1.0, 2.0].view(), v.view(), xyz.view(), &identity(2), &[0, 1])
        .unwrap();
    assert_eq!(out.dim(), (2, 2, 5));

    // Level i holds eigenpair i alone: lsq = D[i] * std.
    for p in 0..5 {
        assert_relative_eq!(out[[1, 0, p]], out[[0, 0, p]], epsilon = 1e-12);
        assert_relative_eq!(out[[1, 1, p]], 2.0 * out[[0, 1, p]], epsilon = 1e-12);
    }
    let (std, lsq) = imager.as_image().unwrap();
    assert_eq!(std.data().dim(), (2, 5));
    assert_eq!(lsq.data(), out.index_axis(Axis(0), 1));
}

#[test]
fn accumulation_is_order_independent() {
    let forward = run(&[0, 1, 2, 3], 64).statistics().unwrap();
    let backward = run(&[3, 1, 0, 2], 64).statistics().unwrap();
    for (a, b) in forward.iter().zip(backward.iter()) {
        assert_relative_eq!(*a, *b, max_relative = 1e-12, epsilon = 1e-12);
    }
}

#[test]
fn split_and_merged_equals_single_instance() {
    let whole = run(&[0, 1, 2, 3], 64);
    let mut left = run(&[0, 2], 64);
    let right = run(&[1, 3], 64);
    left.merge(&right).unwrap();
    let a = whole.statistics().unwrap();
    let b = left.statistics().unwrap();
    for (x, y) in a.iter().zip(b.iter()) {
        assert_relative_eq!(*x, *y, max_relative = 1e-12, epsilon = 1e-12);
    }
}

#[test]
fn single_and_double_precision_agree() {
    let single = run(&[0, 1, 2, 3], 32).statistics().unwrap();
    let double = run(&[0, 1, 2, 3], 64).statistics().unwrap();
    for (a, b) in single.iter().zip(double.iter()) {
        assert_relative_eq!(*a, *b, max_relative = 1e-4, epsilon = 1e-4);
    }
}

#[test]
fn dense_and_sparse_weights_give_identical_statistics() {
    // Two stations of three antennas each.
    let xyz = antennas(0.0);
    let dense = Array2::from_shape_fn((6, 2), |(a, s)| {
        if a / 3 == s {
            Complex64::from_polar(1.0, 0.3 * a as f64)
        } else {
            Complex64::new(0.0, 0.0)
        }
    });
    let mut tri = TriMat::new((6, 2));
    for ((a, s), &w) in dense.indexed_iter() {
        if w.norm() > 0.0 {
            tri.add_triplet(a, s, w);
        }
    }
    let v = array![
        [Complex64::new(0.6, 0.0), Complex64::new(0.0, 0.8)],
        [Complex64::new(0.0, 0.8), Complex64::new(0.6, 0.0)]
    ];
    let d = array![2.0, 1.0];

    let mut stats = Vec::new();
    for w in [
        BeamWeights::Dense(dense.clone()),
        BeamWeights::Sparse(tri.to_csr()),
        BeamWeights::Sparse(tri.to_csc()),
    ] {
        let mut imager = SpatialImager::<f64>::new(0.8, grid().view(), 2).unwrap();
        imager.integrate(d.view(), v.view(), xyz.view(), &w, &[0, 1]).unwrap();
        stats.push(imager.statistics().unwrap().to_owned());
    }
    for other in &stats[1..] {
        for (a, b) in stats[0].iter().zip(other.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }
}

#[test]
fn point_source_peaks_at_its_pixel() {
    let grid = fov_grid([0.0, 0.0, 1.0], 0.2, 5, 5).unwrap();
    let xyz = antennas(0.0);
    let n = xyz.nrows();
    // Source at the zenith: every antenna sees it in phase.
    let s = Array2::from_elem((n, n), Complex64::new(1.0, 0.0));
    let (d, v) = eigh(s.view(), n).unwrap();
    assert_eq!(d.len(), 1);

    let mut imager = Imager::new(&ImagerConfig::new(1.0, 1), grid.view()).unwrap();
    imager
        .integrate(d.view(), v.view(), xyz.view(), &identity(n), &[0])
        .unwrap();
    let (std, _) = imager.as_image().unwrap();
    let collapsed = std.collapsed();
    let peak = collapsed
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    assert_eq!(peak, 12);
    assert_relative_eq!(collapsed[12], n as f64, max_relative = 1e-9);
}
