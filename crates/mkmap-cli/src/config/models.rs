use mkmap::engine::config::EngineConfig;
use mkmap::engine::grid::GridSpec;
use std::path::PathBuf;

pub struct AppConfig {
    pub model_path: PathBuf,
    pub output_path: PathBuf,
    pub grid: GridSpec,
    pub core_config: EngineConfig,
}
