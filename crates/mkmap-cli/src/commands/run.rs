use crate::cli::RunArgs;
use crate::config::{AppConfig, build_config};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use mkmap::core::io::model_file::ModelDefinition;
use mkmap::engine::error::EngineError;
use mkmap::engine::grid::DescriptorGrid;
use mkmap::engine::mapper::MapSummary;
use mkmap::engine::progress::ProgressReporter;
use mkmap::workflows;
use tracing::{info, warn};

pub fn run(args: RunArgs) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let app = build_config(&args)?;
    let summary = execute(&app, ProgressReporter::with_callback(CliProgressHandler::new().get_callback()))?;

    if summary.failed > 0 {
        warn!("{} point(s) could not be solved.", summary.failed);
        println!(
            "Warning: {} of {} point(s) failed; see the 'status' column.",
            summary.failed, summary.points_total
        );
    }
    println!(
        "✓ Map of {} point(s) written to: {}",
        summary.points_total,
        app.output_path.display()
    );
    Ok(())
}

fn execute(app: &AppConfig, reporter: ProgressReporter) -> Result<MapSummary> {
    info!("Loading reaction model from {:?}", &app.model_path);
    let definition = ModelDefinition::load(&app.model_path)?;

    let grid = DescriptorGrid::new(&app.grid).map_err(EngineError::from)?;
    if grid.dimension() != definition.dimension() {
        return Err(CliError::Config(format!(
            "The grid has {} dimension(s) but the model declares {} descriptor(s).",
            grid.dimension(),
            definition.dimension()
        )));
    }

    println!(
        "Mapping {} point(s) with the {} backend...",
        grid.len(),
        app.core_config.numeric.name()
    );
    info!("Invoking the core mapping workflow...");
    let outcome = workflows::map::run_configured(
        &definition.model,
        &app.grid,
        &definition.scaler,
        &definition.scaler,
        &app.core_config,
        &reporter,
    )?;

    let summary = outcome.summary().clone();
    info!(
        direct = summary.solved_direct,
        independent = summary.solved_independently,
        bisection = summary.solved_by_bisection,
        failed = summary.failed,
        "Workflow finished."
    );

    info!("Writing map table to {:?}", &app.output_path);
    outcome
        .rows(&definition.model, &definition.descriptor_names)
        .save(&app.output_path)?;
    Ok(summary)
}
