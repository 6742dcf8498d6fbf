use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_FREQ_MHZ: f64 = 1400.0;
pub const DEFAULT_OUTPUT_DIR: &str = "bluebild";

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Spatial-domain Bluebild imager for a simulated phased-array observation",
    long_about = None,
    after_help = "Examples:\n  bluebild --ra 18h06m14.659 --dec -20d31m31.57s --epoch 2025-09-29T08:38:00Z\n  bluebild --ra 271.561 --dec -20.5254 --fov 4 --width 128 --height 128 --levels 4 --precision 32\n  bluebild --antennas 96 --station-size 8 --sources 5 --snapshots 24 --interval 600 --sparse --timing\n"
)]
pub struct Args {
    /// Field centre RA (supports hhmmss/hms or degrees)
    #[arg(long, default_value = "05h00m00s")]
    pub ra: String,

    /// Field centre Dec (supports ddmmss/dms or degrees)
    #[arg(long, allow_hyphen_values = true, default_value = "-60d00m00s")]
    pub dec: String,

    /// Start epoch of the observation. Accepts year, MJD, or ISO datetime.
    #[arg(long, default_value = "2025-01-01T00:00:00Z")]
    pub epoch: String,

    /// Observing frequency in MHz
    #[arg(long, visible_alias = "obsfreq", default_value_t = DEFAULT_FREQ_MHZ)]
    pub freq: f64,

    /// Field of view in degrees
    #[arg(long, default_value_t = 6.0)]
    pub fov: f64,

    /// Image width in pixels
    #[arg(long, default_value_t = 64)]
    pub width: usize,

    /// Image height in pixels
    #[arg(long, default_value_t = 64)]
    pub height: usize,

    /// Total number of antennas in the simulated array
    #[arg(long, visible_alias = "ant", default_value_t = 48)]
    pub antennas: usize,

    /// Antennas per station (one beam per station)
    #[arg(long = "station-size", default_value_t = 1)]
    pub station_size: usize,

    /// Array radius in metres
    #[arg(long, default_value_t = 3000.0)]
    pub radius: f64,

    /// Number of point sources in the simulated sky
    #[arg(long, default_value_t = 4)]
    pub sources: usize,

    /// Number of snapshots to integrate
    #[arg(long, visible_alias = "snap", default_value_t = 12)]
    pub snapshots: usize,

    /// Time between snapshots in seconds
    #[arg(long, visible_alias = "dt", default_value_t = 900.0)]
    pub interval: f64,

    /// Number of energy levels
    #[arg(long, default_value_t = 3)]
    pub levels: usize,

    /// Float width of the imager (32 or 64)
    #[arg(long, default_value_t = 64)]
    pub precision: u32,

    /// Fraction of the visibility energy kept by the eigenpair selection
    #[arg(long, default_value_t = 0.95)]
    pub sigma: f64,

    /// Use sparse (CSR) beamforming weights
    #[arg(long)]
    pub sparse: bool,

    /// Number of parallel worker threads
    #[arg(long, default_value_t = 2)]
    pub cpu: usize,

    /// Print per-stage timing after the run
    #[arg(long)]
    pub timing: bool,

    /// Output directory for the rendered images
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl Args {
    pub fn wavelength(&self) -> f64 {
        bluebild::geom::SPEED_OF_LIGHT / (self.freq * 1.0e6)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.freq > 0.0) {
            return Err("--freq must be positive".into());
        }
        if !(self.fov > 0.0 && self.fov < 180.0) {
            return Err("--fov must lie in (0, 180) degrees".into());
        }
        if self.width == 0 || self.height == 0 {
            return Err("--width and --height must be at least 1".into());
        }
        if self.station_size == 0 {
            return Err("--station-size must be at least 1".into());
        }
        if self.antennas < self.station_size {
            return Err("--antennas must be at least --station-size".into());
        }
        if !(self.radius > 0.0) {
            return Err("--radius must be positive".into());
        }
        if self.snapshots == 0 {
            return Err("--snapshots must be at least 1".into());
        }
        if self.levels == 0 {
            return Err("--levels must be at least 1".into());
        }
        Ok(())
    }
}
