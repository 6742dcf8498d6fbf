use std::f64::consts::PI;

use ndarray::{Array2, ArrayView2, Axis};

use crate::error::{invalid, BluebildError, Result};

pub const SPEED_OF_LIGHT: f64 = 299792458.0; // m/s

// ITRF position of the ATCA reference station (meters)
pub const ATCA_ECEF: [f64; 3] = [-4750915.837, 2792906.182, -3200483.747];

// --- Frames ---
// Earth-fixed (ECEF): x towards (lat 0, lon 0), z along the rotation axis.
// Sky frame: x towards (RA 0, Dec 0), z towards the celestial pole.
// At sidereal angle GMST the two differ by a rotation about z:
//   p_sky = Rz(GMST) p_ecef
// so <p_sky, s(ra, dec)> = <p_ecef, s_ecef(ha, dec)> with ha = GMST - ra.
// -------------

fn number(token: &str, what: &str) -> Result<f64> {
    token
        .parse::<f64>()
        .map_err(|e| BluebildError::InvalidArgument(format!("{what}: '{token}': {e}")))
}

fn parse_packed(value: f64) -> Result<(f64, f64, f64)> {
    let abs = value.abs();
    let major = (abs / 10000.0).floor();
    let rem = abs - major * 10000.0;
    let m = (rem / 100.0).floor();
    let s = rem - m * 100.0;
    if !(0.0..60.0).contains(&m) || !(0.0..60.0).contains(&s) {
        return invalid(format!("invalid packed sexagesimal value {value}"));
    }
    Ok((major, m, s))
}

// "12h30m05s", "12:30:05", "12 30 05" or packed "123005", with the given
// unit markers treated as separators.
fn parse_sexagesimal(input: &str, markers: &[char], what: &str) -> Result<f64> {
    let cleaned: String = input
        .chars()
        .map(|c| if markers.contains(&c) || c == ':' { ' ' } else { c })
        .collect();
    let parts: Vec<&str> = cleaned.split_whitespace().collect();
    let (major, m, s) = match parts.as_slice() {
        [packed] => parse_packed(number(packed, what)?)?,
        [a, b, c] => {
            let (major, m, s) = (number(a, what)?, number(b, what)?, number(c, what)?);
            if !(0.0..60.0).contains(&m) || !(0.0..60.0).contains(&s) {
                return invalid(format!("{what}: minutes and seconds must lie in [0, 60)"));
            }
            (major, m, s)
        }
        _ => return invalid(format!("{what}: cannot parse '{input}'")),
    };
    Ok(major + m / 60.0 + s / 3600.0)
}

/// Right ascension in radians.
/// Accepts hms markers, hh:mm:ss, packed hhmmss or decimal degrees.
pub fn parse_ra(ra_str: &str) -> Result<f64> {
    let raw = ra_str.trim().to_lowercase();
    if raw.is_empty() {
        return invalid("empty RA");
    }

    let has_marker = raw.contains(&['h', 'm', 's', ':', ' '][..]);
    let hours = if has_marker {
        parse_sexagesimal(&raw, &['h', 'm', 's'], "RA")?
    } else {
        let v = number(&raw, "RA")?;
        if v.abs() < 10000.0 {
            return Ok(v.to_radians());
        }
        let (h, m, s) = parse_packed(v)?;
        h + m / 60.0 + s / 3600.0
    };
    Ok((hours * 15.0).to_radians())
}

/// Declination in radians.
/// Accepts dms markers, dd:mm:ss, packed ddmmss or decimal degrees.
pub fn parse_dec(dec_str: &str) -> Result<f64> {
    let raw = dec_str.trim().to_lowercase();
    if raw.is_empty() {
        return invalid("empty Dec");
    }

    let sign = if raw.starts_with('-') { -1.0 } else { 1.0 };
    let stripped = raw.trim_start_matches(&['+', '-'][..]);

    let has_marker = stripped.contains(&['d', 'm', 's', '\'', '"', ':', ' '][..]);
    let degrees = if has_marker {
        parse_sexagesimal(stripped, &['d', 'm', 's', '\'', '"'], "Dec")?
    } else {
        let v = number(stripped, "Dec")?;
        if v.abs() < 10000.0 {
            v
        } else {
            let (d, m, s) = parse_packed(v)?;
            d + m / 60.0 + s / 3600.0
        }
    };
    let dec = sign * degrees;
    if dec.abs() > 90.0 {
        return invalid(format!("Dec {dec} deg out of range"));
    }
    Ok(dec.to_radians())
}

// ISO 8601-like "2024-02-12T15:52:00Z" to MJD.
fn parse_iso_epoch_to_mjd(epoch_str: &str) -> Result<f64> {
    let normalized = epoch_str.replace('z', "Z");
    let parts: Vec<&str> = normalized
        .split(&['-', 'T', ':', 'Z'][..])
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() < 6 {
        return invalid(format!("invalid epoch '{epoch_str}'"));
    }
    let field = |i: usize| number(parts[i], "epoch");
    let year = field(0)? as i64;
    let month = field(1)? as i64;
    let day = field(2)?;
    let (hour, minute, second) = (field(3)?, field(4)?, field(5)?);
    if !(1..=12).contains(&month) {
        return invalid(format!("invalid month in epoch '{epoch_str}'"));
    }

    // https://en.wikipedia.org/wiki/Julian_day#Julian_day_number_calculation
    let (y, m) = if month <= 2 { (year - 1, month + 12) } else { (year, month) };
    let a = y.div_euclid(100);
    let b = 2 - a + a.div_euclid(4);
    let jd_int = (365.25 * (y + 4716) as f64).floor() + (30.6001 * (m + 1) as f64).floor() + day
        + b as f64
        - 1524.0;
    let frac_day = hour / 24.0 + minute / 1440.0 + second / 86400.0;

    // Julian days start at noon.
    Ok(jd_int - 0.5 + frac_day - 2400000.5)
}

/// Epoch to MJD.
/// Accepts an ISO datetime (2024-02-12T15:52:00Z), an MJD (60350.0) or a
/// Julian year (2000, J2024.5).
pub fn parse_epoch_to_mjd(epoch_str: &str) -> Result<f64> {
    let raw = epoch_str.trim();
    if raw.is_empty() {
        return invalid("empty epoch");
    }
    if raw.contains(&['-', 'T', ':', 'Z', 'z'][..]) {
        return parse_iso_epoch_to_mjd(raw);
    }
    let numeric = number(raw.trim_start_matches(&['J', 'j'][..]), "epoch")?;

    if (40000.0..100000.0).contains(&numeric) {
        return Ok(numeric);
    }
    if (1800.0..3000.0).contains(&numeric) {
        return Ok(51544.5 + (numeric - 2000.0) * 365.25);
    }
    invalid(format!(
        "unsupported epoch '{raw}', use ISO datetime, MJD, or year (e.g. 2000)"
    ))
}

/// Greenwich Mean Sidereal Time [rad] at `mjd`.
pub fn mjd_to_gmst(mjd: f64) -> f64 {
    // IAU 2006; T in Julian centuries of UT1 from J2000.0.
    let jd = mjd + 2400000.5;
    let t_ut1 = (jd - 2451545.0) / 36525.0;

    let gmst_sec = 67310.54841
        + (876600.0 * 3600.0 + 8640184.812866) * t_ut1
        + 0.093104 * t_ut1.powi(2)
        - 6.2e-6 * t_ut1.powi(3);

    (gmst_sec * PI / 43200.0).rem_euclid(2.0 * PI)
}

/// Unit vector towards (ra, dec) in the sky frame.
pub fn radec_to_cart(ra: f64, dec: f64) -> [f64; 3] {
    let (sd, cd) = dec.sin_cos();
    let (sr, cr) = ra.sin_cos();
    [cd * cr, cd * sr, sd]
}

/// Rotate (N, 3) Earth-fixed positions into the sky frame at `mjd`.
pub fn earth_rotate(xyz: ArrayView2<'_, f64>, mjd: f64) -> Result<Array2<f64>> {
    if xyz.ncols() != 3 {
        return invalid(format!("XYZ must have 3 columns, got {}", xyz.ncols()));
    }
    let (s, c) = mjd_to_gmst(mjd).sin_cos();
    let mut out = xyz.to_owned();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let (x, y) = (row[0], row[1]);
        row[0] = c * x - s * y;
        row[1] = s * x + c * y;
    }
    Ok(out)
}

/// Earth-fixed offset of a local (east, north, up) displacement at `site`.
pub fn enu_to_ecef(site: [f64; 3], enu: [f64; 3]) -> [f64; 3] {
    let [x, y, z] = site;
    let lon = y.atan2(x);
    let lat = z.atan2((x * x + y * y).sqrt());
    let (slon, clon) = lon.sin_cos();
    let (slat, clat) = lat.sin_cos();
    let [e, n, u] = enu;
    [
        -slon * e - slat * clon * n + clat * clon * u,
        clon * e - slat * slon * n + clat * slon * u,
        clat * n + slat * u,
    ]
}
