use super::file::{
    FileAnalysisConfig, FileBackend, FileConfig, FileGridConfig, FileMapperConfig, FileTraversal,
};
use super::models::AppConfig;
use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use mkmap::core::models::descriptor::DescriptorPoint;
use mkmap::core::numeric::{NumericBackend, Precision};
use mkmap::engine::config::{EngineConfig, EngineConfigBuilder, SearchDirections};
use mkmap::engine::grid::{Axis, GridSpec, TraversalOrder};
use std::str::FromStr;
use tracing::warn;

pub fn build_config(args: &RunArgs) -> Result<AppConfig> {
    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let numeric_file = file_config.numeric.take().unwrap_or_default();
    let solver_file = file_config.solver.take().unwrap_or_default();
    let mapper_file = file_config.mapper.take().unwrap_or_default();
    let analysis_file = file_config.analysis.take().unwrap_or_default();
    let grid_file = file_config.grid.take().ok_or_else(|| {
        CliError::Config("A `[grid]` section is required in the config file.".to_string())
    })?;

    let numeric = if args.double {
        NumericBackend::Double
    } else if let Some(digits) = args.digits {
        NumericBackend::Decimal { digits }
    } else {
        match numeric_file.backend {
            Some(FileBackend::Double) if numeric_file.digits.is_some() => {
                return Err(CliError::Config(
                    "`numeric.digits` only applies to the decimal backend.".to_string(),
                ));
            }
            Some(FileBackend::Double) => NumericBackend::Double,
            Some(FileBackend::Decimal) | None => NumericBackend::Decimal {
                digits: numeric_file.digits.unwrap_or(Precision::DEFAULT_DIGITS),
            },
        }
    };

    let mut builder = EngineConfigBuilder::new().numeric(numeric);
    if let Some(tolerance) = args.tolerance.or(solver_file.tolerance) {
        builder = builder.tolerance(tolerance);
    }
    if let Some(iterations) = solver_file.max_rootfinding_iterations {
        builder = builder.max_rootfinding_iterations(iterations);
    }
    if let Some(enabled) = solver_file.internally_constrain_coverages {
        builder = builder.internally_constrain_coverages(enabled);
    }
    if let Some(threshold) = solver_file.residual_threshold {
        builder = builder.residual_threshold(threshold);
    }
    if let Some(max_bisections) = args.max_bisections.or(mapper_file.max_bisections) {
        builder = builder.max_bisections(max_bisections);
    }
    if args.independent {
        builder = builder.solve_independently(true);
    }
    let builder = merge_mapper(builder, mapper_file)?;
    let builder = merge_analysis(builder, analysis_file, args);

    let core_config = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;
    if let Some(message) = tolerance_warning(&core_config) {
        warn!("{}", message);
    }

    Ok(AppConfig {
        model_path: args.model.clone(),
        output_path: args.output.clone(),
        grid: merge_grid(grid_file)?,
        core_config,
    })
}

fn merge_mapper(
    mut builder: EngineConfigBuilder,
    file_val: FileMapperConfig,
) -> Result<EngineConfigBuilder> {
    if let Some(offsets) = file_val.search_directions {
        builder = builder.search_directions(SearchDirections::Explicit(offsets));
    }
    if let Some(decimals) = file_val.descriptor_decimal_precision {
        builder = builder.descriptor_decimal_precision(decimals);
    }
    if let Some(enabled) = file_val.force_recalculation {
        builder = builder.force_recalculation(enabled);
    }
    if let Some(enabled) = file_val.retry_failed_points {
        builder = builder.retry_failed_points(enabled);
    }
    if let Some(reach) = file_val.bisection_search_reach {
        builder = builder.bisection_search_reach(reach);
    }
    if let Some(enabled) = file_val.solve_independently {
        builder = builder.solve_independently(enabled);
    }

    let traversal = match (file_val.traversal, file_val.seed) {
        (None, None) => None,
        (None | Some(FileTraversal::FromSeed), Some(seed)) => Some(TraversalOrder::FromSeed { seed }),
        (Some(FileTraversal::FromSeed), None) => {
            return Err(CliError::Config(
                "`mapper.traversal = \"from-seed\"` requires `mapper.seed`.".to_string(),
            ));
        }
        (Some(_), Some(_)) => {
            return Err(CliError::Config(
                "`mapper.seed` is only valid with the \"from-seed\" traversal.".to_string(),
            ));
        }
        (Some(FileTraversal::RowMajor), None) => Some(TraversalOrder::RowMajor),
        (Some(FileTraversal::Serpentine), None) => Some(TraversalOrder::Serpentine),
        (Some(FileTraversal::AsListed), None) => Some(TraversalOrder::AsListed),
    };
    if let Some(order) = traversal {
        builder = builder.traversal(order);
    }
    Ok(builder)
}

fn merge_analysis(
    mut builder: EngineConfigBuilder,
    file_val: FileAnalysisConfig,
    args: &RunArgs,
) -> EngineConfigBuilder {
    let reaction_orders = args.reaction_orders || file_val.reaction_orders.unwrap_or(false);
    let rate_control = args.rate_control || file_val.rate_control.unwrap_or(false);
    builder = builder
        .reaction_orders(reaction_orders)
        .rate_control(rate_control);
    if let Some(perturbation) = file_val.perturbation {
        builder = builder.perturbation(perturbation);
    }
    builder
}

/// Doubles cannot resolve residuals below machine epsilon.
fn tolerance_warning(config: &EngineConfig) -> Option<String> {
    let tolerance = config.solver.tolerance;
    if config.numeric == NumericBackend::Double && tolerance < f64::EPSILON {
        Some(format!(
            "Tolerance {:e} is below double precision; most points will not converge. \
             Pass --tolerance or use the decimal backend.",
            tolerance
        ))
    } else {
        None
    }
}

fn merge_grid(file_val: FileGridConfig) -> Result<GridSpec> {
    match (file_val.points, file_val.axes, file_val.resolution) {
        (Some(points), None, None) => Ok(GridSpec::Explicit(
            points.into_iter().map(DescriptorPoint::new).collect(),
        )),
        (None, Some(axes), Some(resolution)) => Ok(GridSpec::Regular {
            axes: axes.into_iter().map(|[min, max]| Axis::new(min, max)).collect(),
            resolution,
        }),
        (None, Some(_), None) | (None, None, Some(_)) => Err(CliError::Config(
            "`grid.axes` and `grid.resolution` must be given together.".to_string(),
        )),
        (None, None, None) => Err(CliError::Config(
            "`[grid]` needs either `points` or `axes` with `resolution`.".to_string(),
        )),
        (Some(_), _, _) => Err(CliError::Config(
            "`grid.points` cannot be combined with `grid.axes` or `grid.resolution`.".to_string(),
        )),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    if set_values.is_empty() {
        return Ok(config);
    }
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Argument(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };

        match key {
            "numeric.backend" => {
                config.numeric.get_or_insert_with(Default::default).backend = Some(match value_str {
                    "double" => FileBackend::Double,
                    "decimal" => FileBackend::Decimal,
                    _ => {
                        return Err(CliError::Config(format!(
                            "Invalid backend for {}: {} (expected 'double' or 'decimal')",
                            key, value_str
                        )));
                    }
                });
            }
            "numeric.digits" => {
                config.numeric.get_or_insert_with(Default::default).digits =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "solver.tolerance" => {
                config.solver.get_or_insert_with(Default::default).tolerance =
                    Some(parse_value(key, value_str, "float")?);
            }
            "solver.max-rootfinding-iterations" => {
                config
                    .solver
                    .get_or_insert_with(Default::default)
                    .max_rootfinding_iterations = Some(parse_value(key, value_str, "integer")?);
            }
            "solver.internally-constrain-coverages" => {
                config
                    .solver
                    .get_or_insert_with(Default::default)
                    .internally_constrain_coverages = Some(parse_value(key, value_str, "boolean")?);
            }
            "solver.residual-threshold" => {
                config
                    .solver
                    .get_or_insert_with(Default::default)
                    .residual_threshold = Some(parse_value(key, value_str, "float")?);
            }
            "mapper.max-bisections" => {
                config
                    .mapper
                    .get_or_insert_with(Default::default)
                    .max_bisections = Some(parse_value(key, value_str, "integer")?);
            }
            "mapper.descriptor-decimal-precision" => {
                config
                    .mapper
                    .get_or_insert_with(Default::default)
                    .descriptor_decimal_precision = Some(parse_value(key, value_str, "integer")?);
            }
            "mapper.bisection-search-reach" => {
                config
                    .mapper
                    .get_or_insert_with(Default::default)
                    .bisection_search_reach = Some(parse_value(key, value_str, "integer")?);
            }
            "mapper.force-recalculation" => {
                config
                    .mapper
                    .get_or_insert_with(Default::default)
                    .force_recalculation = Some(parse_value(key, value_str, "boolean")?);
            }
            "mapper.retry-failed-points" => {
                config
                    .mapper
                    .get_or_insert_with(Default::default)
                    .retry_failed_points = Some(parse_value(key, value_str, "boolean")?);
            }
            "mapper.solve-independently" => {
                config
                    .mapper
                    .get_or_insert_with(Default::default)
                    .solve_independently = Some(parse_value(key, value_str, "boolean")?);
            }
            "analysis.reaction-orders" => {
                config
                    .analysis
                    .get_or_insert_with(Default::default)
                    .reaction_orders = Some(parse_value(key, value_str, "boolean")?);
            }
            "analysis.rate-control" => {
                config
                    .analysis
                    .get_or_insert_with(Default::default)
                    .rate_control = Some(parse_value(key, value_str, "boolean")?);
            }
            "analysis.perturbation" => {
                config
                    .analysis
                    .get_or_insert_with(Default::default)
                    .perturbation = Some(parse_value(key, value_str, "float")?);
            }
            "mapper.traversal" => {
                config.mapper.get_or_insert_with(Default::default).traversal =
                    Some(match value_str {
                        "row-major" => FileTraversal::RowMajor,
                        "serpentine" => FileTraversal::Serpentine,
                        "from-seed" => FileTraversal::FromSeed,
                        "as-listed" => FileTraversal::AsListed,
                        _ => {
                            return Err(CliError::Config(format!(
                                "Invalid traversal for {}: {}",
                                key, value_str
                            )));
                        }
                    });
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
