mod bootstrap;

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use engagement_core::config::PipelineConfig;
use engagement_core::settings::Settings;
use engagement_data::analysis::{run_pipeline, AnalysisResult};
use engagement_data::report::{self, RankingRequest, ReportFormat};

fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("steam-engagement v{} starting", env!("CARGO_PKG_VERSION"));

    run(&settings, &bootstrap::default_config_path())
}

/// Produce the report selected by `settings` and write it to `--output` or
/// stdout. `default_config` is used when no `--config` is given and it exists.
fn run(settings: &Settings, default_config: &Path) -> Result<()> {
    let config = settings
        .resolve_pipeline_config(default_config)
        .context("invalid configuration")?;
    let format: ReportFormat = settings.format.parse()?;
    let limit = (settings.limit > 0).then_some(settings.limit);

    // Reject an unknown metric before doing any work.
    let request = match settings.view.as_str() {
        "ranking" => Some(RankingRequest::parse(&settings.metric, config.min_support, limit)?),
        _ => None,
    };

    tracing::info!(
        "View: {}, input: {}, shards: {}",
        settings.view,
        settings.input.display(),
        settings.shards
    );

    let analysis = run_pipeline(&settings.input, &config, usize::from(settings.shards))
        .with_context(|| format!("failed to analyse {}", settings.input.display()))?;

    // Render fully before touching the destination so failures leave no
    // partial file behind.
    let mut rendered = Vec::new();
    render(&mut rendered, &settings.view, request.as_ref(), &analysis, &config, limit, format)?;

    match &settings.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!("Report written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&rendered)?;
            stdout.flush()?;
        }
    }

    Ok(())
}

fn render(
    out: &mut Vec<u8>,
    view: &str,
    request: Option<&RankingRequest>,
    analysis: &AnalysisResult,
    config: &PipelineConfig,
    limit: Option<usize>,
    format: ReportFormat,
) -> Result<()> {
    match (view, request) {
        ("ranking", Some(request)) => {
            let rows = report::rank_items(&analysis.items, &analysis.metrics, request);
            report::write_ranking(out, &rows, request.metric, format)?;
        }
        ("quadrants", _) => {
            let quadrants =
                report::quadrant_analysis(&analysis.items, &analysis.metrics, &config.min_support);
            report::write_quadrants(out, &quadrants, format)?;
        }
        ("population", _) => {
            report::write_population(out, &analysis.population, format)?;
        }
        ("users", _) => {
            let rows = report::rank_users(&analysis.users, limit);
            report::write_users(out, &rows, format)?;
        }
        (unknown, _) => anyhow::bail!("Unknown view: {}", unknown),
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
