mod args;
mod plot;
mod sky;

use std::path::PathBuf;

use clap::Parser;
use log::{info, warn};
use ndarray::Axis;

use bluebild::geom::{self, ATCA_ECEF};
use bluebild::sphere::{cart2eq, fov_grid};
use bluebild::{Image, Imager, ImagerConfig, IntensityFieldDataProcessor, ParameterEstimator, Timer};

use args::DEFAULT_OUTPUT_DIR;
use plot::{plot_multi_series_f64_x, plot_sky_image, LEVEL_COLORS};

pub type DynError = Box<dyn std::error::Error + Send + Sync>;

fn angular_distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2];
    dot.clamp(-1.0, 1.0).acos()
}

// Direction of the brightest pixel of the level-collapsed image.
fn peak_direction(image: &Image<f64>) -> Option<(usize, [f64; 3])> {
    let collapsed = image.collapsed();
    let (px, _) = collapsed
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    let grid = image.grid();
    Some((px, [grid[[0, px]], grid[[1, px]], grid[[2, px]]]))
}

fn resolve_output_dir(args: &args::Args) -> Result<PathBuf, DynError> {
    let output_dir = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    std::fs::create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn main() -> Result<(), DynError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = args::Args::parse();
    args.validate()?;

    let available_cores = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) } as usize;
    if args.cpu == 0 {
        return Err("--cpu must be at least 1".into());
    }
    if args.cpu > available_cores {
        return Err(format!(
            "--cpu value ({}) exceeds the number of available cores ({})",
            args.cpu, available_cores
        )
        .into());
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(args.cpu)
        .build_global()?;

    // --- Field and instrument ---
    let ra = geom::parse_ra(&args.ra)?;
    let dec = geom::parse_dec(&args.dec)?;
    let mjd_start = geom::parse_epoch_to_mjd(&args.epoch)?;
    let wavelength = args.wavelength();
    let fov = args.fov.to_radians();
    let centre = geom::radec_to_cart(ra, dec);
    let grid = fov_grid(centre, fov, args.height, args.width)?;
    info!(
        "Field centre RA {:.4} deg, Dec {:.4} deg, FoV {:.2} deg, {}x{} pixels",
        ra.to_degrees(),
        dec.to_degrees(),
        args.fov,
        args.width,
        args.height
    );
    info!(
        "Observing at {:.3} MHz (wavelength {:.4} m), start MJD {:.5}",
        args.freq, wavelength, mjd_start
    );

    let instrument = sky::spiral_array(ATCA_ECEF, args.antennas, args.station_size, args.radius);
    let sources = sky::field_sources(ra, dec, fov, args.sources);
    info!(
        "Array: {} antennas in {} stations within {:.0} m; sky: {} point sources",
        args.antennas,
        instrument.n_station,
        args.radius,
        sources.len()
    );
    if sources.is_empty() {
        warn!("Empty sky model; the images will be blank");
    }

    let mut stage_timer = Timer::new();

    stage_timer.start_time("visibility simulation");
    let snapshots = (0..args.snapshots)
        .map(|i| {
            let mjd = mjd_start + i as f64 * args.interval / 86400.0;
            sky::observe(&instrument, &sources, centre, wavelength, mjd, args.sparse)
        })
        .collect::<Result<Vec<_>, DynError>>()?;
    stage_timer.end_time("visibility simulation");

    // --- Calibration pass ---
    stage_timer.start_time("parameter estimation");
    let mut estimator = ParameterEstimator::new(args.levels, args.sigma)?;
    for snapshot in &snapshots {
        estimator.collect(snapshot.visibilities.view())?;
    }
    let (n_eig, centroids) = estimator.infer_parameters()?;
    stage_timer.end_time("parameter estimation");
    info!(
        "Calibration over {} snapshots: N_eig = {}, level centroids {:?}",
        estimator.n_collected(),
        n_eig,
        centroids
    );

    // --- Imaging pass ---
    let config = ImagerConfig::new(wavelength, args.levels).with_precision(args.precision);
    let mut imager = Imager::new(&config, grid.view())?;
    if args.timing {
        imager.set_timer(Timer::new());
    }
    let processor = IntensityFieldDataProcessor::new(n_eig, centroids)?;

    let mut level_energy: Vec<Vec<f64>> = vec![Vec::with_capacity(snapshots.len()); args.levels];
    let mut hours = Vec::with_capacity(snapshots.len());
    for (i, snapshot) in snapshots.iter().enumerate() {
        stage_timer.start_time("eigen-decomposition");
        let (d, v, cluster_idx) = processor.process(snapshot.visibilities.view())?;
        stage_timer.end_time("eigen-decomposition");

        let contribution = imager.integrate(
            d.view(),
            v.view(),
            snapshot.xyz.view(),
            &snapshot.weights,
            &cluster_idx,
        )?;
        let per_level = contribution.index_axis(Axis(0), 0).sum_axis(Axis(1));
        for (level, energy) in per_level.iter().enumerate() {
            level_energy[level].push(*energy);
        }
        hours.push((snapshot.mjd - mjd_start) * 24.0);
        info!(
            "Snapshot {}/{} (MJD {:.5}): {} eigenpairs, D = {:.3}",
            i + 1,
            snapshots.len(),
            snapshot.mjd,
            d.len(),
            d
        );
    }

    // --- Results ---
    let (std_image, lsq_image) = imager.as_image()?;
    if let Some((px, direction)) = peak_direction(&lsq_image) {
        let (_, peak_dec, peak_ra) = cart2eq(direction);
        let offset = sources
            .iter()
            .map(|s| angular_distance(direction, s.direction))
            .fold(f64::INFINITY, f64::min);
        info!(
            "Least-squares peak at pixel {} (RA {:.4} deg, Dec {:.4} deg), {:.3} arcmin from the nearest source",
            px,
            peak_ra.to_degrees(),
            peak_dec.to_degrees(),
            offset.to_degrees() * 60.0
        );
    }

    let output_dir = resolve_output_dir(&args)?;
    for (image, tag, label) in [
        (&std_image, "std", "Standardized estimate"),
        (&lsq_image, "lsq", "Least-squares estimate"),
    ] {
        let path = output_dir.join(format!("bluebild_{tag}.png"));
        let collapsed = image.collapsed();
        plot_sky_image(
            collapsed.as_slice().ok_or("collapsed image is not contiguous")?,
            args.width,
            args.height,
            &format!("{label}, {} levels", image.n_level()),
            &path.to_string_lossy(),
        )?;
        info!("Wrote {}", path.display());
    }
    for level in 0..lsq_image.n_level() {
        if let Some(data) = lsq_image.level(level) {
            let data = data.to_vec();
            let path = output_dir.join(format!("bluebild_lsq_level{level}.png"));
            plot_sky_image(
                &data,
                args.width,
                args.height,
                &format!("Least-squares estimate, level {level}"),
                &path.to_string_lossy(),
            )?;
        }
    }

    let labels: Vec<String> = (0..args.levels).map(|l| format!("level {l}")).collect();
    let series: Vec<(&[f64], &plot::RGBColor, &str)> = level_energy
        .iter()
        .enumerate()
        .map(|(l, energy)| {
            (
                energy.as_slice(),
                &LEVEL_COLORS[l % LEVEL_COLORS.len()],
                labels[l].as_str(),
            )
        })
        .collect();
    let path = output_dir.join("bluebild_level_energy.png");
    plot_multi_series_f64_x(
        &hours,
        &series,
        "Standardized energy per level",
        &path.to_string_lossy(),
        "time since start [h]",
        "energy",
    )?;
    info!("Wrote {}", path.display());

    if args.timing {
        println!("{}", stage_timer.summary());
        if let Some(timer) = imager.timer() {
            println!("{}", timer.summary());
        }
    }

    Ok(())
}
