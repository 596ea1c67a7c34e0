use crate::core::io::map_table::{ColumnGroup, MapRow, MapTable};
use crate::core::models::descriptor::DescriptorPoint;
use crate::core::models::model::ReactionModel;
use crate::core::numeric::{Decimal, Numeric, NumericBackend};
use crate::core::scaling::{InitialGuess, Projection};
use crate::engine::cache::SolutionCache;
use crate::engine::config::{AnalysisConfig, ConfigError, EngineConfig};
use crate::engine::error::EngineError;
use crate::engine::grid::{DescriptorGrid, GridSpec};
use crate::engine::mapper::{MapSummary, MinResidMapper};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::sensitivity::{Sensitivity, SensitivityAnalyzer};
use crate::engine::state::{FailureRecord, Solution};
use tracing::{info, instrument};

/// Everything a finished mapping run produced.
#[derive(Debug, Clone)]
pub struct MapResult<N> {
    pub grid: DescriptorGrid,
    pub cache: SolutionCache<N>,
    pub summary: MapSummary,
    /// Per grid point, in grid order; all `None` unless an analysis was requested.
    pub sensitivities: Vec<Option<Sensitivity>>,
    pub analysis: AnalysisConfig,
}

fn render<N: Numeric>(values: &[N]) -> Vec<String> {
    values.iter().map(Numeric::to_repr).collect()
}

fn render_matrix(matrix: &[Vec<f64>]) -> Vec<String> {
    matrix.iter().flatten().map(|value| format!("{value:e}")).collect()
}

impl<N: Numeric> MapResult<N> {
    /// Stored solution for every grid point, in grid order.
    pub fn solutions(&self) -> Vec<(&DescriptorPoint, Option<&Solution<N>>)> {
        self.grid
            .points()
            .iter()
            .map(|point| (point, self.cache.get(point)))
            .collect()
    }

    pub fn failures(&self) -> Vec<&FailureRecord> {
        self.cache.failures().collect()
    }

    fn column_groups(&self, model: &ReactionModel) -> Vec<ColumnGroup> {
        let adsorbates = model.adsorbate_names();
        let steps: Vec<&str> = model.steps().iter().map(|step| step.name.as_str()).collect();
        let gases = model.gas_names();

        let mut groups = vec![ColumnGroup::new("theta", adsorbates)];
        for prefix in ["k_f", "k_r", "K", "r_f", "r_r", "r"] {
            groups.push(ColumnGroup::new(prefix, steps.iter().copied()));
        }
        for prefix in ["production", "consumption", "tof"] {
            groups.push(ColumnGroup::new(prefix, gases.iter().copied()));
        }
        let pairs = |columns: &[&str]| -> Vec<String> {
            gases
                .iter()
                .flat_map(|gas| columns.iter().map(move |column| format!("{gas}/{column}")))
                .collect()
        };
        if self.analysis.reaction_orders {
            groups.push(ColumnGroup::new("order", pairs(&gases)));
        }
        if self.analysis.rate_control {
            groups.push(ColumnGroup::new("drc", pairs(&steps)));
        }
        groups
    }

    fn row_values(&self, solution: &Solution<N>, sensitivity: Option<&Sensitivity>) -> Vec<Vec<String>> {
        let rates = &solution.rates;
        let mut values = vec![
            render(&solution.coverages),
            render(&rates.forward_constants),
            render(&rates.reverse_constants),
            rates
                .equilibrium_constants
                .iter()
                .map(|constant| constant.as_ref().map_or_else(|| "inf".to_string(), Numeric::to_repr))
                .collect(),
            render(&rates.forward),
            render(&rates.reverse),
            render(&rates.net),
            render(&rates.production),
            render(&rates.consumption),
            render(&rates.turnover_frequency),
        ];
        if self.analysis.reaction_orders {
            values.push(sensitivity.map(|s| render_matrix(&s.reaction_orders)).unwrap_or_default());
        }
        if self.analysis.rate_control {
            values.push(sensitivity.map(|s| render_matrix(&s.rate_control)).unwrap_or_default());
        }
        values
    }

    /// Full-grid export table in grid order.
    pub fn rows(&self, model: &ReactionModel, descriptor_names: &[String]) -> MapTable {
        let rows = self
            .grid
            .points()
            .iter()
            .enumerate()
            .map(|(idx, point)| match self.cache.entry(point) {
                Some(entry) => MapRow {
                    coordinates: point.coordinates().to_vec(),
                    status: if entry.solution.converged {
                        "converged"
                    } else {
                        "unconverged"
                    },
                    method: Some(entry.method.as_str()),
                    iterations: Some(entry.solution.iterations),
                    residual_norm: Some(entry.solution.residual_norm.to_repr()),
                    values: self.row_values(
                        &entry.solution,
                        self.sensitivities.get(idx).and_then(Option::as_ref),
                    ),
                },
                None => MapRow {
                    coordinates: point.coordinates().to_vec(),
                    status: "failed",
                    method: None,
                    iterations: None,
                    residual_norm: None,
                    values: Vec::new(),
                },
            })
            .collect();

        MapTable {
            descriptor_names: descriptor_names.to_vec(),
            groups: self.column_groups(model),
            rows,
        }
    }
}

/// Result of a run whose backend was chosen from the configuration.
#[derive(Debug, Clone)]
pub enum MapOutcome {
    Double(MapResult<f64>),
    Decimal(MapResult<Decimal>),
}

impl MapOutcome {
    pub fn summary(&self) -> &MapSummary {
        match self {
            MapOutcome::Double(result) => &result.summary,
            MapOutcome::Decimal(result) => &result.summary,
        }
    }

    pub fn failures(&self) -> Vec<&FailureRecord> {
        match self {
            MapOutcome::Double(result) => result.failures(),
            MapOutcome::Decimal(result) => result.failures(),
        }
    }

    pub fn rows(&self, model: &ReactionModel, descriptor_names: &[String]) -> MapTable {
        match self {
            MapOutcome::Double(result) => result.rows(model, descriptor_names),
            MapOutcome::Decimal(result) => result.rows(model, descriptor_names),
        }
    }
}

fn check_backend<N: Numeric>(config: &EngineConfig) -> Result<(), ConfigError> {
    if N::NAME != config.numeric.name() {
        return Err(ConfigError::BackendMismatch {
            configured: config.numeric.name(),
            requested: N::NAME,
        });
    }
    Ok(())
}

/// Maps `spec` from an empty cache.
#[instrument(skip_all, name = "map_workflow")]
pub fn run<N: Numeric>(
    model: &ReactionModel,
    spec: &GridSpec,
    projection: &dyn Projection,
    guess: &dyn InitialGuess,
    config: &EngineConfig,
    reporter: &ProgressReporter,
) -> Result<MapResult<N>, EngineError> {
    check_backend::<N>(config)?;

    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    let grid = DescriptorGrid::new(spec)?;
    info!(
        points = grid.len(),
        dimension = grid.dimension(),
        adsorbates = model.adsorbates().len(),
        steps = model.steps().len(),
        "Descriptor grid prepared."
    );
    let cache = SolutionCache::new(
        config.mapper.descriptor_decimal_precision,
        grid.spacing().to_vec(),
    );
    reporter.report(Progress::PhaseFinish);

    map_with_cache(model, grid, cache, projection, guess, config, reporter)
}

/// Continues a previous run, reusing its grid and cache under a new configuration.
#[instrument(skip_all, name = "resume_workflow")]
pub fn resume<N: Numeric>(
    model: &ReactionModel,
    previous: MapResult<N>,
    projection: &dyn Projection,
    guess: &dyn InitialGuess,
    config: &EngineConfig,
    reporter: &ProgressReporter,
) -> Result<MapResult<N>, EngineError> {
    check_backend::<N>(config)?;
    if previous.cache.decimals() != config.mapper.descriptor_decimal_precision {
        return Err(ConfigError::InvalidParameter {
            parameter: "descriptor_decimal_precision",
            reason: format!(
                "cache was keyed with {} decimals, configuration asks for {}",
                previous.cache.decimals(),
                config.mapper.descriptor_decimal_precision
            ),
        }
        .into());
    }
    let cached = previous.cache.len();
    let failed = previous.cache.failures().count();
    info!(cached, failed, "Resuming from existing cache.");
    reporter.report(Progress::Message(format!(
        "Resuming with {} cached and {} failed point(s).",
        cached, failed
    )));
    map_with_cache(
        model,
        previous.grid,
        previous.cache,
        projection,
        guess,
        config,
        reporter,
    )
}

/// Runs with the backend named in `config.numeric`.
pub fn run_configured(
    model: &ReactionModel,
    spec: &GridSpec,
    projection: &dyn Projection,
    guess: &dyn InitialGuess,
    config: &EngineConfig,
    reporter: &ProgressReporter,
) -> Result<MapOutcome, EngineError> {
    match config.numeric {
        NumericBackend::Double => {
            run::<f64>(model, spec, projection, guess, config, reporter).map(MapOutcome::Double)
        }
        NumericBackend::Decimal { .. } => {
            run::<Decimal>(model, spec, projection, guess, config, reporter)
                .map(MapOutcome::Decimal)
        }
    }
}

fn map_with_cache<N: Numeric>(
    model: &ReactionModel,
    grid: DescriptorGrid,
    mut cache: SolutionCache<N>,
    projection: &dyn Projection,
    guess: &dyn InitialGuess,
    config: &EngineConfig,
    reporter: &ProgressReporter,
) -> Result<MapResult<N>, EngineError> {
    let mapper = MinResidMapper::new(model, projection, guess, config, reporter);
    let summary = mapper.run(&grid, &mut cache)?;
    let sensitivities =
        SensitivityAnalyzer::new(model, projection, config, reporter).run(&grid, &cache);
    Ok(MapResult {
        grid,
        cache,
        summary,
        sensitivities,
        analysis: config.analysis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::model_file::ModelDefinition;
    use crate::core::kinetics::ParameterVector;
    use crate::core::models::model::test_models;
    use crate::core::scaling::ProjectionError;
    use crate::engine::grid::Axis;
    use std::sync::Mutex;

    fn two_state_projection(point: &DescriptorPoint) -> Result<ParameterVector, ProjectionError> {
        Ok(ParameterVector::new(
            vec![2.0 + point.coordinates()[0]],
            vec![1.0],
        ))
    }

    fn half_guess(
        _: &ReactionModel,
        _: &DescriptorPoint,
        _: &ParameterVector,
    ) -> Result<Vec<f64>, ProjectionError> {
        Ok(vec![0.5, 0.5])
    }

    fn line(resolution: usize) -> GridSpec {
        GridSpec::Regular {
            axes: vec![Axis::new(0.0, 1.0)],
            resolution: vec![resolution],
        }
    }

    fn double_config() -> EngineConfig {
        EngineConfig::builder()
            .numeric(NumericBackend::Double)
            .tolerance(1e-12)
            .build()
            .unwrap()
    }

    #[test]
    fn run_rejects_backend_mismatch() {
        let model = test_models::two_state();
        let config = EngineConfig::default();
        let result = run::<f64>(
            &model,
            &line(3),
            &two_state_projection,
            &half_guess,
            &config,
            &ProgressReporter::new(),
        );
        assert!(matches!(
            result,
            Err(EngineError::Config(ConfigError::BackendMismatch {
                configured: "decimal",
                requested: "double"
            }))
        ));
    }

    #[test]
    fn run_rejects_invalid_grid() {
        let model = test_models::two_state();
        let spec = GridSpec::Regular {
            axes: vec![Axis::new(1.0, 0.0)],
            resolution: vec![3],
        };
        let result = run::<f64>(
            &model,
            &spec,
            &two_state_projection,
            &half_guess,
            &double_config(),
            &ProgressReporter::new(),
        );
        assert!(matches!(result, Err(EngineError::Grid(_))));
    }

    #[test]
    fn solutions_follow_grid_order_and_match_equilibrium() {
        let model = test_models::two_state();
        let result = run::<f64>(
            &model,
            &line(3),
            &two_state_projection,
            &half_guess,
            &double_config(),
            &ProgressReporter::new(),
        )
        .unwrap();

        let solutions = result.solutions();
        assert_eq!(solutions.len(), 3);
        for (point, solution) in solutions {
            let k = 2.0 + point.coordinates()[0];
            let solution = solution.unwrap();
            assert!(solution.converged);
            assert!((solution.coverages[1] - k / (k + 1.0)).abs() < 1e-12);
        }
        assert!(result.failures().is_empty());
    }

    #[test]
    fn rows_mark_failed_points_and_fill_columns() {
        let model = test_models::two_state();
        let projection = |point: &DescriptorPoint| -> Result<ParameterVector, ProjectionError> {
            if point.coordinates()[0] > 0.9 {
                Err(ProjectionError::Other("no data".into()))
            } else {
                two_state_projection(point)
            }
        };
        let result = run::<f64>(
            &model,
            &line(3),
            &projection,
            &half_guess,
            &double_config(),
            &ProgressReporter::new(),
        )
        .unwrap();

        let table = result.rows(&model, &["x".to_string()]);
        assert_eq!(table.groups[0].labels, vec!["A*", "B*"]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0].status, "converged");
        assert_eq!(table.rows[0].method, Some("direct"));
        assert_eq!(table.rows[0].values[0].len(), 2);
        assert_eq!(table.rows[0].values[3], vec!["2e0"]);
        assert_eq!(table.rows[2].status, "failed");
        assert!(table.rows[2].values.is_empty());

        let mut buffer = Vec::new();
        table.write_csv(&mut buffer, "memory").unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.lines().nth(3).unwrap().starts_with("1,failed,,,"));
    }

    #[test]
    fn resume_skips_cached_points_and_retries_failures() {
        let model = test_models::two_state();
        let attempts = Mutex::new(0usize);
        let flaky = |point: &DescriptorPoint| -> Result<ParameterVector, ProjectionError> {
            let mut count = attempts.lock().unwrap();
            *count += 1;
            if point.coordinates()[0] > 0.9 && *count <= 3 {
                Err(ProjectionError::Other("transient".into()))
            } else {
                two_state_projection(point)
            }
        };
        let first = run::<f64>(
            &model,
            &line(3),
            &flaky,
            &half_guess,
            &double_config(),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(first.summary.failed, 1);

        let retry = EngineConfig::builder()
            .numeric(NumericBackend::Double)
            .tolerance(1e-12)
            .retry_failed_points(true)
            .build()
            .unwrap();
        let messages = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::Message(text) = event {
                messages.lock().unwrap().push(text);
            }
        }));
        let second = resume(&model, first, &flaky, &half_guess, &retry, &reporter).unwrap();
        drop(reporter);
        assert_eq!(
            messages.into_inner().unwrap(),
            vec!["Resuming with 2 cached and 1 failed point(s)."]
        );
        assert_eq!(second.summary.skipped, 2);
        assert_eq!(second.summary.solved_direct, 1);
        assert!(second.failures().is_empty());
    }

    #[test]
    fn resume_rejects_changed_key_precision() {
        let model = test_models::two_state();
        let first = run::<f64>(
            &model,
            &line(2),
            &two_state_projection,
            &half_guess,
            &double_config(),
            &ProgressReporter::new(),
        )
        .unwrap();
        let finer = EngineConfig::builder()
            .numeric(NumericBackend::Double)
            .descriptor_decimal_precision(4)
            .build()
            .unwrap();
        assert!(matches!(
            resume(
                &model,
                first,
                &two_state_projection,
                &half_guess,
                &finer,
                &ProgressReporter::new()
            ),
            Err(EngineError::Config(ConfigError::InvalidParameter { .. }))
        ));
    }

    #[test]
    fn run_configured_dispatches_on_backend() {
        let model = test_models::two_state();
        let outcome = run_configured(
            &model,
            &line(2),
            &two_state_projection,
            &half_guess,
            &double_config(),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert!(matches!(outcome, MapOutcome::Double(_)));

        let outcome = run_configured(
            &model,
            &line(2),
            &two_state_projection,
            &half_guess,
            &EngineConfig::default(),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert!(matches!(outcome, MapOutcome::Decimal(_)));
        assert_eq!(outcome.summary().solved_direct, 2);
        assert!(outcome.failures().is_empty());
    }

    #[test]
    fn model_file_drives_a_full_map() {
        let definition = ModelDefinition::parse(
            r#"
temperature = 500.0
descriptor-names = ["E_A"]

[[sites]]
name = "s"

[[gases]]
name = "A_g"
pressure = 1.0

[[gases]]
name = "B_g"
pressure = 0.0

[[adsorbates]]
name = "A*"
site = "s"
formation-energy = { intercept = 0.0, slopes = [1.0] }

[[adsorbates]]
name = "B*"
site = "s"
formation-energy = 0.2

[[steps]]
name = "adsorption"
initial = ["A_g", "*_s"]
final = ["A*"]
reaction-energy = { intercept = 0.0, slopes = [1.0] }

[[steps]]
name = "conversion"
initial = ["A*"]
final = ["B*"]
reaction-energy = { intercept = 0.2, slopes = [-1.0] }
activation-energy = 0.6

[[steps]]
name = "desorption"
initial = ["B*"]
final = ["B_g", "*_s"]
reaction-energy = -0.2
"#,
            "inline",
        )
        .unwrap();
        let config = EngineConfig::builder()
            .numeric(NumericBackend::Decimal { digits: 80 })
            .tolerance(1e-30)
            .build()
            .unwrap();
        let spec = GridSpec::Regular {
            axes: vec![Axis::new(-0.5, 0.5)],
            resolution: vec![5],
        };
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::PhaseStart { name } = event {
                events.lock().unwrap().push(name);
            }
        }));
        let result = run::<Decimal>(
            &definition.model,
            &spec,
            &definition.scaler,
            &definition.scaler,
            &config,
            &reporter,
        )
        .unwrap();

        assert_eq!(result.summary.points_total, 5);
        assert_eq!(result.summary.solved_direct, 5);
        assert_eq!(result.summary.failed, 0);
        assert_eq!(*events.lock().unwrap(), vec!["Preparation", "Mapping"]);
        let table = result.rows(&definition.model, &definition.descriptor_names);
        assert_eq!(table.header()[0], "E_A");
        let tof = table.groups.iter().find(|group| group.prefix == "tof").unwrap();
        assert_eq!(tof.labels, vec!["A_g", "B_g"]);
        assert!(result.sensitivities.iter().all(Option::is_none));
    }

    #[test]
    fn requested_sensitivities_reach_the_table() {
        let model = test_models::adsorption_chain();
        let irreversible = |_: &DescriptorPoint| -> Result<ParameterVector, ProjectionError> {
            Ok(ParameterVector::new(vec![1.0, 1.0, 1.0], vec![0.0, 0.0, 0.0]))
        };
        let guess = |_: &ReactionModel, _: &DescriptorPoint, _: &ParameterVector| -> Result<Vec<f64>, ProjectionError> {
            Ok(vec![0.2, 0.3])
        };
        let config = EngineConfig::builder()
            .numeric(NumericBackend::Double)
            .tolerance(1e-12)
            .reaction_orders(true)
            .rate_control(true)
            .build()
            .unwrap();
        let phases = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::PhaseStart { name } = event {
                phases.lock().unwrap().push(name);
            }
        }));
        let result = run::<f64>(&model, &line(2), &irreversible, &guess, &config, &reporter).unwrap();
        drop(reporter);
        assert_eq!(
            phases.into_inner().unwrap(),
            vec!["Preparation", "Mapping", "Sensitivity Analysis"]
        );
        assert!(result.sensitivities.iter().all(Option::is_some));

        let table = result.rows(&model, &["x".to_string()]);
        let header = table.header();
        assert!(header.contains(&"order[B_g/A_g]".to_string()));
        assert!(header.contains(&"drc[B_g/A to B]".to_string()));
        assert!(header.contains(&"K[A adsorption]".to_string()));

        let drc_group = table.groups.iter().position(|group| group.prefix == "drc").unwrap();
        let equilibrium = table.groups.iter().position(|group| group.prefix == "K").unwrap();
        for row in &table.rows {
            assert_eq!(row.values[equilibrium], vec!["inf", "inf", "inf"]);
            let total: f64 = row.values[drc_group][3..]
                .iter()
                .map(|cell| cell.parse::<f64>().unwrap())
                .sum();
            assert!((total - 1.0).abs() < 1e-6, "degree of rate control sums to {total}");
        }
    }
}
