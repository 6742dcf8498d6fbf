//! Spherical geometry helpers.
//!
//! Angles are in radians. "Polar" angles are measured from the +z axis,
//! "equatorial" (elevation) angles from the xy-plane; longitudes from +x
//! towards +y.

use std::f64::consts::{FRAC_PI_2, PI};

use ndarray::{Array1, Array2};

use crate::error::{invalid, BluebildError, Result};

fn check_radius(r: f64) -> Result<()> {
    if r >= 0.0 {
        Ok(())
    } else {
        invalid(format!("radius must be non-negative, got {r}"))
    }
}

/// Polar to equatorial: (r, colatitude, lon) -> (r, elevation, lon).
pub fn pol2eq(r: f64, theta: f64, phi: f64) -> (f64, f64, f64) {
    (r, FRAC_PI_2 - theta, phi)
}

/// Equatorial to polar: (r, elevation, lon) -> (r, colatitude, lon).
pub fn eq2pol(r: f64, theta: f64, phi: f64) -> (f64, f64, f64) {
    (r, FRAC_PI_2 - theta, phi)
}

pub fn eq2cart(r: f64, theta: f64, phi: f64) -> Result<[f64; 3]> {
    check_radius(r)?;
    let (st, ct) = theta.sin_cos();
    let (sp, cp) = phi.sin_cos();
    Ok([r * ct * cp, r * ct * sp, r * st])
}

pub fn pol2cart(r: f64, theta: f64, phi: f64) -> Result<[f64; 3]> {
    let (r, elev, phi) = pol2eq(r, theta, phi);
    eq2cart(r, elev, phi)
}

/// Cartesian to equatorial (r, elevation, lon), lon in [0, 2π).
pub fn cart2eq(xyz: [f64; 3]) -> (f64, f64, f64) {
    let [x, y, z] = xyz;
    let r = (x * x + y * y + z * z).sqrt();
    let elev = z.atan2((x * x + y * y).sqrt());
    let mut lon = y.atan2(x);
    if lon < 0.0 {
        lon += 2.0 * PI;
    }
    (r, elev, lon)
}

/// Cartesian to polar (r, colatitude, lon), lon in [0, 2π).
pub fn cart2pol(xyz: [f64; 3]) -> (f64, f64, f64) {
    let (r, elev, lon) = cart2eq(xyz);
    eq2pol(r, elev, lon)
}

/// Equal-angle sample points of order `n`: 2N+2 colatitudes and 2N+2
/// longitudes, i.e. 4(N+1)² points over the sphere.
pub fn ea_sample(n: usize) -> Result<(Array1<f64>, Array1<f64>)> {
    if n == 0 {
        return invalid("equal-angle grid order must be positive");
    }
    let m = 2 * n + 2;
    let theta = Array1::from_shape_fn(m, |q| PI / m as f64 * (q as f64 + 0.5));
    let phi = Array1::from_shape_fn(m, |l| 2.0 * PI / m as f64 * l as f64);
    Ok((theta, phi))
}

/// (3, height·width) unit vectors covering a square field of view of `fov`
/// radians centred on `centre`.
///
/// Pixels are laid out row-major with row 0 at the top (towards +north).
/// Offsets are gnomonic in the local east/north tangent frame of `centre`.
pub fn fov_grid(centre: [f64; 3], fov: f64, height: usize, width: usize) -> Result<Array2<f64>> {
    if !(fov > 0.0 && fov < PI) {
        return invalid(format!("field of view must lie in (0, π), got {fov}"));
    }
    if height == 0 || width == 0 {
        return invalid(format!("empty pixel grid {height}x{width}"));
    }
    let c = normalize(centre)
        .ok_or_else(|| BluebildError::InvalidArgument("field centre is the zero vector".into()))?;

    // East is +z × c; at the poles fall back to +y.
    let east = normalize(cross([0.0, 0.0, 1.0], c)).unwrap_or([0.0, 1.0, 0.0]);
    let north = cross(c, east);

    let step_x = fov / width as f64;
    let step_y = fov / height as f64;
    let mut grid = Array2::<f64>::zeros((3, height * width));
    for row in 0..height {
        let v = (0.5 * fov - (row as f64 + 0.5) * step_y).tan();
        for col in 0..width {
            let u = ((col as f64 + 0.5) * step_x - 0.5 * fov).tan();
            let dir = [
                c[0] + u * east[0] + v * north[0],
                c[1] + u * east[1] + v * north[1],
                c[2] + u * east[2] + v * north[2],
            ];
            let norm = (dir[0] * dir[0] + dir[1] * dir[1] + dir[2] * dir[2]).sqrt();
            let px = row * width + col;
            for i in 0..3 {
                grid[[i, px]] = dir[i] / norm;
            }
        }
    }
    Ok(grid)
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize(a: [f64; 3]) -> Option<[f64; 3]> {
    let n = (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt();
    (n > 1e-12).then(|| [a[0] / n, a[1] / n, a[2] / n])
}
