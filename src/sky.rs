//! Synthetic instrument and sky for the command-line driver.

use std::f64::consts::PI;

use bluebild::geom::{earth_rotate, enu_to_ecef, radec_to_cart};
use bluebild::{matched_beamformer, BeamWeights};
use ndarray::{Array1, Array2, Axis};
use num_complex::Complex64;

use crate::DynError;

const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653; // rad
const STATION_RING_RADIUS_M: f64 = 6.0;

/// Antenna offsets from the array reference point, Earth-fixed axes.
pub struct Instrument {
    pub xyz: Array2<f64>,
    pub station_of: Vec<usize>,
    pub n_station: usize,
}

/// Stations on a Fermat spiral of the given radius around `site`, each a
/// small ring of `station_size` antennas. The last station may be partial.
pub fn spiral_array(site: [f64; 3], n_antenna: usize, station_size: usize, radius: f64) -> Instrument {
    let station_size = station_size.max(1);
    let n_station = (n_antenna + station_size - 1) / station_size;
    let mut xyz = Array2::<f64>::zeros((n_antenna, 3));
    let mut station_of = Vec::with_capacity(n_antenna);

    for a in 0..n_antenna {
        let s = a / station_size;
        let slot = a % station_size;
        let r = radius * ((s as f64 + 0.5) / n_station as f64).sqrt();
        let theta = s as f64 * GOLDEN_ANGLE;
        let (mut east, mut north) = (r * theta.cos(), r * theta.sin());
        if station_size > 1 {
            let phi = 2.0 * PI * slot as f64 / station_size as f64;
            east += STATION_RING_RADIUS_M * phi.cos();
            north += STATION_RING_RADIUS_M * phi.sin();
        }
        let offset = enu_to_ecef(site, [east, north, 0.0]);
        for i in 0..3 {
            xyz[[a, i]] = offset[i];
        }
        station_of.push(s);
    }
    Instrument {
        xyz,
        station_of,
        n_station,
    }
}

#[derive(Clone, Debug)]
pub struct PointSource {
    pub direction: [f64; 3],
    pub intensity: f64,
}

/// `n` point sources spread over the inner part of the field, the brightest
/// at the field centre.
pub fn field_sources(ra: f64, dec: f64, fov: f64, n: usize) -> Vec<PointSource> {
    (0..n)
        .map(|k| {
            let r = 0.35 * fov * (k as f64 / n.max(1) as f64).sqrt();
            let theta = k as f64 * GOLDEN_ANGLE;
            let d_dec = r * theta.sin();
            let d_ra = r * theta.cos() / dec.cos().abs().max(1e-3);
            PointSource {
                direction: radec_to_cart(ra + d_ra, (dec + d_dec).clamp(-PI / 2.0, PI / 2.0)),
                intensity: 1.0 / (k as f64 + 1.0),
            }
        })
        .collect()
}

/// Everything the imager needs for one snapshot.
pub struct Snapshot {
    pub mjd: f64,
    pub xyz: Array2<f64>,
    pub weights: BeamWeights,
    pub visibilities: Array2<Complex64>,
}

/// Rotate the array to `mjd`, steer every station at `pointing` and form
/// the noise-free beamformed visibilities `S = Wᴴ A diag(I) Aᴴ W`, with
/// `A[a, k] = exp(-j 2π/λ <p_a, r_k>)`.
pub fn observe(
    instrument: &Instrument,
    sources: &[PointSource],
    pointing: [f64; 3],
    wavelength: f64,
    mjd: f64,
    sparse: bool,
) -> Result<Snapshot, DynError> {
    let xyz = earth_rotate(instrument.xyz.view(), mjd)?;
    let weights = matched_beamformer(xyz.view(), &instrument.station_of, pointing, wavelength)?;
    let weights = if sparse {
        weights
    } else {
        BeamWeights::Dense(weights.to_dense())
    };

    let k = 2.0 * PI / wavelength;
    let steering = Array2::from_shape_fn((xyz.nrows(), sources.len()), |(a, s)| {
        let r = sources[s].direction;
        let proj = xyz[[a, 0]] * r[0] + xyz[[a, 1]] * r[1] + xyz[[a, 2]] * r[2];
        Complex64::from_polar(1.0, -k * proj)
    });
    let intensity = Array1::from_iter(sources.iter().map(|s| Complex64::new(s.intensity, 0.0)));

    let w_h = weights.to_dense().t().mapv(|z| z.conj());
    let b = w_h.dot(&steering);
    let weighted = &b * &intensity.insert_axis(Axis(0));
    let visibilities = weighted.dot(&b.t().mapv(|z| z.conj()));

    Ok(Snapshot {
        mjd,
        xyz,
        weights,
        visibilities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluebild::geom::ATCA_ECEF;

    #[test]
    fn spiral_array_groups_antennas_into_stations() {
        let inst = spiral_array(ATCA_ECEF, 10, 4, 1000.0);
        assert_eq!(inst.n_station, 3);
        assert_eq!(inst.station_of, vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2]);
        for row in inst.xyz.axis_iter(Axis(0)) {
            let r = row.iter().map(|x| x * x).sum::<f64>().sqrt();
            assert!(r < 1000.0 + STATION_RING_RADIUS_M + 1e-6);
        }
    }

    #[test]
    fn brightest_source_sits_at_field_centre() {
        let sources = field_sources(1.0, -0.5, 0.1, 3);
        assert_eq!(sources.len(), 3);
        let centre = radec_to_cart(1.0, -0.5);
        for i in 0..3 {
            assert!((sources[0].direction[i] - centre[i]).abs() < 1e-12);
        }
        assert!(sources[0].intensity > sources[1].intensity);
    }

    #[test]
    fn visibilities_are_hermitian() {
        let inst = spiral_array(ATCA_ECEF, 6, 2, 500.0);
        let sources = field_sources(0.3, -0.9, 0.05, 2);
        let pointing = radec_to_cart(0.3, -0.9);
        let snap = observe(&inst, &sources, pointing, 0.2, 60000.0, true).unwrap();
        assert_eq!(snap.visibilities.dim(), (3, 3));
        assert!(snap.weights.is_sparse());
        for i in 0..3 {
            assert!(snap.visibilities[[i, i]].im.abs() < 1e-9);
            assert!(snap.visibilities[[i, i]].re >= 0.0);
            for j in 0..3 {
                let d = snap.visibilities[[i, j]] - snap.visibilities[[j, i]].conj();
                assert!(d.norm() < 1e-9);
            }
        }
    }
}
