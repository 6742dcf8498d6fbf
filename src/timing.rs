use std::collections::HashMap;
use std::fmt::Write;
use std::time::{Duration, Instant};

use log::{trace, warn};

#[derive(Debug, Default)]
struct Section {
    name: String,
    started: Option<Instant>,
    elapsed: Duration,
    calls: u64,
    nops: Option<f64>,
}

/// Named-section stopwatch.
///
/// Sections may be started and stopped any number of times; their elapsed
/// time accumulates. `summary()` lists them in order of first use.
#[derive(Debug, Default)]
pub struct Timer {
    sections: Vec<Section>,
    index: HashMap<String, usize>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    fn section_mut(&mut self, tag: &str) -> &mut Section {
        let idx = match self.index.get(tag) {
            Some(&idx) => idx,
            None => {
                self.sections.push(Section {
                    name: tag.to_string(),
                    ..Section::default()
                });
                self.index.insert(tag.to_string(), self.sections.len() - 1);
                self.sections.len() - 1
            }
        };
        &mut self.sections[idx]
    }

    fn section(&self, tag: &str) -> Option<&Section> {
        self.index.get(tag).map(|&idx| &self.sections[idx])
    }

    pub fn start_time(&mut self, tag: &str) {
        trace!("timer start: {tag}");
        let section = self.section_mut(tag);
        if section.started.is_some() {
            warn!("timer section '{tag}' restarted before it was stopped");
        }
        section.started = Some(Instant::now());
    }

    pub fn end_time(&mut self, tag: &str) {
        let section = self.section_mut(tag);
        match section.started.take() {
            Some(start) => {
                section.elapsed += start.elapsed();
                section.calls += 1;
                trace!("timer stop: {tag}");
            }
            None => warn!("timer section '{tag}' stopped without being started"),
        }
    }

    /// Record the operation count of one pass through `tag`, for `gflops`.
    pub fn set_nops(&mut self, tag: &str, nops: f64) {
        self.section_mut(tag).nops = Some(nops);
    }

    pub fn elapsed(&self, tag: &str) -> Duration {
        self.section(tag).map_or(Duration::ZERO, |s| s.elapsed)
    }

    pub fn calls(&self, tag: &str) -> u64 {
        self.section(tag).map_or(0, |s| s.calls)
    }

    pub fn gflops(&self, tag: &str) -> Option<f64> {
        let section = self.section(tag)?;
        let nops = section.nops?;
        let secs = section.elapsed.as_secs_f64();
        if secs > 0.0 {
            Some(nops * section.calls as f64 / secs / 1e9)
        } else {
            None
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn reset(&mut self) {
        self.sections.clear();
        self.index.clear();
    }

    pub fn summary(&self) -> String {
        let width = self
            .sections
            .iter()
            .map(|s| s.name.len())
            .max()
            .unwrap_or(0)
            .max("section".len());
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<width$}  {:>8}  {:>12}  {:>12}  {:>10}",
            "section", "calls", "total [s]", "mean [ms]", "GFLOP/s"
        );
        for s in &self.sections {
            let total = s.elapsed.as_secs_f64();
            let mean_ms = if s.calls > 0 {
                total * 1e3 / s.calls as f64
            } else {
                0.0
            };
            let gflops = self
                .gflops(&s.name)
                .map_or_else(|| "-".to_string(), |g| format!("{g:.3}"));
            let _ = writeln!(
                out,
                "{:<width$}  {:>8}  {:>12.6}  {:>12.3}  {:>10}",
                s.name, s.calls, total, mean_ms, gflops
            );
        }
        out
    }
}
