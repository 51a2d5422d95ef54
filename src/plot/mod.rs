//! Speedup charts.
//!
//! The orchestrator only builds [`SpeedupChart`] values and hands them to a
//! [`ChartSink`]; [`PlottersSink`] turns them into PNG files.

use crate::benchmark_utils::SpeedupSeries;
use crate::error::{HarnessError, Result};
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

const CHART_SIZE: (u32, u32) = (1000, 600);
const FONT_FAMILY: &str = "sans-serif";
const FONT_CANDIDATES: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
];

/// One labelled line of a chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartLine {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

/// Speedup against thread count, with a reference line at the sequential baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedupChart {
    pub title: String,
    pub thread_counts: Vec<usize>,
    pub lines: Vec<ChartLine>,
    pub baseline: f64,
}

impl SpeedupChart {
    fn line(series: &SpeedupSeries) -> ChartLine {
        ChartLine {
            label: series.impl_label.clone(),
            points: series.points.iter().map(|p| (p.threads as f64, p.speedup)).collect(),
        }
    }

    pub fn for_implementation(dataset_label: &str, size_mb: u64, series: &SpeedupSeries) -> Self {
        SpeedupChart {
            title: format!("Speedup: {} on {} ({}MB)", series.impl_label, dataset_label, size_mb),
            thread_counts: series.thread_counts(),
            lines: vec![Self::line(series)],
            baseline: 1.0,
        }
    }

    pub fn comparison(dataset_label: &str, size_mb: u64, thread_counts: &[usize], all: &[SpeedupSeries]) -> Self {
        SpeedupChart {
            title: format!("Speedup Comparison on {} ({}MB)", dataset_label, size_mb),
            thread_counts: thread_counts.to_vec(),
            lines: all.iter().map(Self::line).collect(),
            baseline: 1.0,
        }
    }

    /// Highest y value the chart has to show, baseline included.
    pub fn y_max(&self) -> f64 {
        self.lines
            .iter()
            .flat_map(|l| l.points.iter().map(|&(_, y)| y))
            .fold(self.baseline, f64::max)
    }
}

pub fn implementation_chart_path(dir: &Path, impl_key: &str, dataset_key: &str) -> PathBuf {
    dir.join(format!("speedup_{}_{}.png", impl_key, dataset_key))
}

pub fn comparison_chart_path(dir: &Path, dataset_key: &str) -> PathBuf {
    dir.join(format!("speedup_comparison_{}.png", dataset_key))
}

/// Rendering sink for finished charts.
pub trait ChartSink {
    fn render(&mut self, chart: &SpeedupChart, path: &Path) -> Result<()>;
}

/// Draws charts into PNG files with plotters.
///
/// Text needs a TrueType font. Without one the axes, title and legend are
/// left out and only the lines are drawn.
pub struct PlottersSink {
    labeled: bool,
}

impl PlottersSink {
    pub fn new(font: Option<&Path>) -> Self {
        let labeled = load_font(font);
        if !labeled {
            warn!("no usable font found, charts are drawn without text");
        }
        PlottersSink { labeled }
    }
}

/// Remembers which font request was last resolved.
///
/// Registration is process-wide, so one answer is shared by every sink. A
/// request naming a different explicit font than the cached one resolves again.
struct FontCache {
    resolved: Option<(Option<PathBuf>, bool)>,
}

impl FontCache {
    const fn new() -> Self {
        FontCache { resolved: None }
    }

    fn resolve<F>(&mut self, explicit: Option<&Path>, mut register: F) -> bool
    where
        F: FnMut(&Path) -> bool,
    {
        if let Some((key, labeled)) = &self.resolved {
            if key.as_deref() == explicit {
                return *labeled;
            }
        }
        let candidates: Vec<PathBuf> = match explicit {
            Some(path) => vec![path.to_path_buf()],
            None => FONT_CANDIDATES.iter().map(PathBuf::from).collect(),
        };
        let labeled = candidates.iter().any(|path| register(path.as_path()));
        self.resolved = Some((explicit.map(Path::to_path_buf), labeled));
        labeled
    }
}

static FONTS: Mutex<FontCache> = Mutex::new(FontCache::new());

fn load_font(explicit: Option<&Path>) -> bool {
    let mut cache = FONTS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    cache.resolve(explicit, register_font_file)
}

fn register_font_file(path: &Path) -> bool {
    let Ok(bytes) = fs::read(path) else { return false };
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    match register_font(FONT_FAMILY, FontStyle::Normal, bytes) {
        Ok(()) => {
            debug!(font = %path.display(), "registered chart font");
            true
        }
        // InvalidFont carries no detail and no Debug impl
        Err(_) => {
            warn!(font = %path.display(), "unusable chart font");
            false
        }
    }
}

impl ChartSink for PlottersSink {
    fn render(&mut self, chart: &SpeedupChart, path: &Path) -> Result<()> {
        draw(chart, path, self.labeled).map_err(|message| HarnessError::Chart {
            path: path.to_path_buf(),
            message,
        })?;
        debug!(path = %path.display(), "chart written");
        Ok(())
    }
}

fn draw(chart: &SpeedupChart, path: &Path, labeled: bool) -> std::result::Result<(), String> {
    let x_min = chart.thread_counts.iter().copied().min().unwrap_or(1) as f64;
    let x_max = chart.thread_counts.iter().copied().max().unwrap_or(1) as f64;
    let (x_lo, x_hi) = (x_min - 0.5, x_max + 0.5);
    let y_hi = chart.y_max() * 1.15;

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(|e| e.to_string())?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(20);
    if labeled {
        builder
            .caption(&chart.title, (FONT_FAMILY, 24).into_font())
            .x_label_area_size(45)
            .y_label_area_size(60);
    }
    let mut ctx = builder
        .build_cartesian_2d(x_lo..x_hi, 0f64..y_hi)
        .map_err(|e| e.to_string())?;

    if labeled {
        let ticks = chart.thread_counts.clone();
        ctx.configure_mesh()
            .x_desc("Number of Threads")
            .y_desc("Speedup Factor")
            .x_labels(ticks.len().max(2) * 4)
            .x_label_formatter(&|x| {
                if ticks.iter().any(|&t| (t as f64 - x).abs() < 1e-6) {
                    format!("{}", x.round() as usize)
                } else {
                    String::new()
                }
            })
            .draw()
            .map_err(|e| e.to_string())?;
    }

    let reference = ctx
        .draw_series(LineSeries::new(
            vec![(x_lo, chart.baseline), (x_hi, chart.baseline)],
            BLACK.mix(0.4).stroke_width(1),
        ))
        .map_err(|e| e.to_string())?;
    if labeled {
        reference
            .label("Sequential baseline")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK.mix(0.4)));
    }

    for (idx, line) in chart.lines.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        let series = ctx
            .draw_series(LineSeries::new(line.points.iter().copied(), color.stroke_width(2)))
            .map_err(|e| e.to_string())?;
        if labeled {
            series
                .label(line.label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }
        ctx.draw_series(line.points.iter().map(|&(x, y)| Circle::new((x, y), 4, color.filled())))
            .map_err(|e| e.to_string())?;
    }

    if labeled {
        ctx.configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(|e| e.to_string())?;
    }

    root.present().map_err(|e| e.to_string())?;
    Ok(())
}
