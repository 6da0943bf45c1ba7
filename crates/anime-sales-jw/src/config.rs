use std::path::PathBuf;

use chart_db::{LoadMode, LoadOptions};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_MAX_FIND_RESULTS: usize = 500;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub load: LoadOptions,
    pub export_prefix: Option<PathBuf>,
    pub serve: bool,
    pub max_find_results: usize,
}

impl Config {
    /// Read the process arguments and environment.
    pub fn load() -> Self {
        Self::from_sources(std::env::args().skip(1), |key| std::env::var(key).ok())
    }

    /// Command-line flags win over environment variables, which win over defaults.
    pub fn from_sources<I, F>(args: I, env: F) -> Self
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let mut strict = false;
        let mut serve = true;
        let mut cli_data_dir: Option<PathBuf> = None;
        let mut cli_load_mode: Option<LoadMode> = None;
        let mut cli_export: Option<PathBuf> = None;
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--strict" => strict = true,
                "--no-serve" => serve = false,
                "--data-dir" => cli_data_dir = args.next().map(PathBuf::from),
                "--export" => cli_export = args.next().map(PathBuf::from),
                _ => {
                    if let Some(path) = arg.strip_prefix("--data-dir=") {
                        cli_data_dir = Some(PathBuf::from(path));
                    } else if let Some(prefix) = arg.strip_prefix("--export=") {
                        cli_export = Some(PathBuf::from(prefix));
                    } else if let Some(mode) = arg.strip_prefix("--load-mode=") {
                        cli_load_mode = parse_load_mode(mode);
                    }
                }
            }
        }

        let host = env("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = env("PORT")
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        let data_dir = cli_data_dir
            .or_else(|| env("CHART_DATA_DIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let mode = cli_load_mode
            .or_else(|| env("CHART_LOAD_MODE").as_deref().and_then(parse_load_mode))
            .unwrap_or(LoadMode::Mmap);
        let export_prefix = cli_export.or_else(|| env("CHART_EXPORT_PREFIX").map(PathBuf::from));
        let max_find_results = env("MAX_FIND_RESULTS")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MAX_FIND_RESULTS);

        Config {
            host,
            port,
            data_dir,
            load: LoadOptions { mode, strict },
            export_prefix,
            serve,
            max_find_results,
        }
    }
}

fn parse_load_mode(raw: &str) -> Option<LoadMode> {
    match raw.to_ascii_lowercase().as_str() {
        "mmap" => Some(LoadMode::Mmap),
        "owned" => Some(LoadMode::Owned),
        _ => None,
    }
}
