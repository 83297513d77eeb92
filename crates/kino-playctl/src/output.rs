//! Output formatting for CLI

use console::style;
use kino_playback::{
    EngineConfig, EventRecord, Player, PlayerEvent, PlayerKind, QualityLevel, RegistryStats,
    Stats, VideoSource,
};
use kino_playback::simulated::SimulatedElement;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

fn print_json<T: Serialize>(data: &T, pretty: bool) {
    let rendered = if pretty {
        serde_json::to_string_pretty(data)
    } else {
        serde_json::to_string(data)
    };
    println!("{}", rendered.unwrap_or_else(|_| "{}".to_string()));
}

fn print_table<T: Tabled>(rows: Vec<T>) {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}

// =============================================================================
// Validation
// =============================================================================

#[derive(Debug, Serialize, Tabled)]
pub struct SourceRow {
    #[tabled(rename = "URL")]
    pub url: String,
    #[tabled(rename = "Type")]
    pub format: String,
    #[tabled(rename = "Quality")]
    pub quality: String,
    #[tabled(rename = "Label")]
    pub label: String,
}

impl From<&VideoSource> for SourceRow {
    fn from(source: &VideoSource) -> Self {
        Self {
            url: source.url.clone(),
            format: source.format.clone(),
            quality: source.quality.clone().unwrap_or_else(|| "-".to_string()),
            label: source.label.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub kind: PlayerKind,
    pub sources: Vec<SourceRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_config: Option<EngineConfig>,
}

pub fn print_validation(report: &ValidationReport, format: OutputFormat) {
    if format == OutputFormat::Json {
        print_json(report, true);
        return;
    }

    println!("{} configuration is valid", style("OK").green().bold());
    println!("  Controller: {}", style(report.kind).cyan());
    println!("  Sources:");
    for source in &report.sources {
        println!("    {} [{}] {} {}", source.url, source.format, source.quality, source.label);
    }

    if let Some(config) = &report.engine_config {
        println!("  Engine:");
        println!("    Buffer: {}s (max {}s, back {}s)",
            config.max_buffer_length, config.max_max_buffer_length, config.back_buffer_length);
        println!("    Fragment retries: {} every {}ms",
            config.frag_loading_max_retry, config.frag_loading_retry_delay);
        println!("    Worker: {}  Low latency: {}", config.enable_worker, config.low_latency_mode);
    }
}

// =============================================================================
// Quality ladder
// =============================================================================

#[derive(Debug, Tabled)]
struct LevelRow {
    #[tabled(rename = "Rung")]
    rung: String,
    #[tabled(rename = "Resolution")]
    resolution: String,
    #[tabled(rename = "Bitrate")]
    bitrate: String,
    #[tabled(rename = "Level")]
    level: usize,
}

pub fn print_levels(levels: &[QualityLevel], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&levels, true),
        OutputFormat::Text | OutputFormat::Table => {
            let rows = levels
                .iter()
                .map(|level| LevelRow {
                    rung: level.name.clone(),
                    resolution: format!("{}x{}", level.width, level.height),
                    bitrate: format!("{:.2} Mbps", level.bitrate as f64 / 1_000_000.0),
                    level: level.level_index,
                })
                .collect();
            print_table::<LevelRow>(rows);
        }
    }
}

// =============================================================================
// Simulated sessions
// =============================================================================

pub fn print_header(player: &Player<SimulatedElement>, format: OutputFormat) {
    if format == OutputFormat::Json {
        return;
    }
    println!(
        "{} {} ({})",
        style("Player").bold(),
        player.id(),
        style(player.kind()).cyan()
    );
}

fn describe(event: &PlayerEvent) -> String {
    match event {
        PlayerEvent::Progress { loaded, total } => format!("loaded={:.1}s total={:.1}s", loaded, total),
        PlayerEvent::VolumeChange { volume, muted } => format!("volume={:.2} muted={}", volume, muted),
        PlayerEvent::RateChange { rate } => format!("rate={}", rate),
        PlayerEvent::Error(error) => {
            let severity = if error.fatal { "fatal" } else { "non-fatal" };
            format!("{} ({})", error, severity)
        }
        PlayerEvent::QualityChange { from, to } => format!("{} -> {}", from, to),
        PlayerEvent::FullscreenChange { fullscreen } => format!("fullscreen={}", fullscreen),
        PlayerEvent::Pip { active } => format!("active={}", active),
        PlayerEvent::Buffering {
            is_buffering,
            buffer_level,
        } => format!("buffering={} level={:.1}s", is_buffering, buffer_level),
        PlayerEvent::Ready { mode } => format!("mode={:?}", mode).to_lowercase(),
        _ => String::new(),
    }
}

pub fn print_event(record: &EventRecord, format: OutputFormat) {
    if format == OutputFormat::Json {
        print_json(record, false);
        return;
    }

    let name = record.event_name().as_str();
    let name = match &record.event {
        PlayerEvent::Error(_) => style(name).red().bold(),
        PlayerEvent::QualityChange { .. } | PlayerEvent::Ready { .. } => style(name).green(),
        _ => style(name).cyan(),
    };
    println!("{:>9.3}s  {:<16} {}", record.current_time, name, describe(&record.event));
}

#[derive(Debug, Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

pub fn print_stats(stats: &Stats, format: OutputFormat) {
    if format == OutputFormat::Json {
        print_json(stats, false);
        return;
    }

    let rows = vec![
        MetricRow { metric: "Load time", value: format!("{:.3}s", stats.load_time) },
        MetricRow { metric: "Play time", value: format!("{:.3}s", stats.play_time) },
        MetricRow { metric: "Pause time", value: format!("{:.3}s", stats.pause_time) },
        MetricRow { metric: "Seeks", value: stats.seek_count.to_string() },
        MetricRow { metric: "Errors", value: stats.error_count.to_string() },
        MetricRow { metric: "Quality changes", value: stats.quality_changes.to_string() },
        MetricRow { metric: "Buffering events", value: stats.buffering_events.to_string() },
    ];
    println!();
    print_table(rows);
}

pub fn print_registry(stats: &RegistryStats, format: OutputFormat) {
    if format == OutputFormat::Json {
        print_json(stats, false);
        return;
    }

    println!(
        "Registry: {} player(s), {} listener(s), ~{} KiB",
        stats.players,
        stats.listeners,
        stats.estimated_bytes / 1024
    );
}
