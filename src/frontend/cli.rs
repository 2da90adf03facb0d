use crate::frontend::config::{Config, StoreBackend};
use crate::infrastructure::{init_logging, LogConfig, LogFormat};
use crate::invoke::{FunctionRegistry, Preparer};
use crate::store::StoreKey;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliConfig {
    pub config_path: Option<PathBuf>,
    pub store_dir: Option<PathBuf>,
    pub compress: bool,
    pub stats: bool,
    pub json_logs: bool,
    pub verbose: bool,
}

/// Three-component vector, passed by value through a deferred call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

pub fn print_xy(x: i32, y: i32) {
    println!("x = {}, y = {}", x, y);
}

pub fn print_vector(v: Vec3) {
    print!("{}", describe_vector(&v));
}

fn describe_vector(v: &Vec3) -> String {
    format!("v2.x = {}\nv2.y = {}\nv2.z = {}\n", v.x, v.y, v.z)
}

pub struct Cli {
    config: CliConfig,
}

impl Cli {
    pub fn new(config: CliConfig) -> Self {
        Self { config }
    }

    /// Resolve the runtime config: explicit file, else discovery, then flags
    pub fn resolve_config(&self) -> Result<Config, Box<dyn Error>> {
        let mut config = match &self.config.config_path {
            Some(path) => Config::load(path)?,
            None => Config::discover(),
        };

        if let Some(dir) = &self.config.store_dir {
            config.store.backend = StoreBackend::File;
            config.store.directory = dir.clone();
        }
        if self.config.compress {
            config.store.compress = true;
        }

        Ok(config)
    }

    /// Prepare two calls, store them, then run them back
    pub fn run(&self) -> Result<(), Box<dyn Error>> {
        let config = self.resolve_config()?;
        let registry = Arc::new(FunctionRegistry::with_codec(config.codec()));
        let preparer = Preparer::new(registry.clone(), config.open_store()?);

        let xy = registry.register("print_xy", print_xy)?;
        let vector = registry.register("print_vector", print_vector)?;

        let first = preparer.prepare(&xy, StoreKey::new("filename")?, (1, 2))?;
        let second = preparer.prepare_unique(&vector, (Vec3 { x: 1.0, y: 2.0, z: 3.0 },))?;
        info!(first = %first.key(), second = %second.key(), backend = ?config.store.backend, "Calls prepared");

        preparer.invoke(&first)?;

        let executor = preparer.executor();
        executor.consume(second.key())?;
        preparer.store().remove(first.key())?;

        if self.config.stats {
            println!("{}", serde_json::to_string_pretty(&registry.stats().snapshot())?);
        }

        Ok(())
    }
}

const USAGE: &str = "\
Usage: deferred-call [OPTIONS]

Options:
  --config FILE     Load configuration from FILE
  --store-dir DIR   Persist calls as files under DIR
  --compress        Compress stored calls with zstd
  --stats           Print call statistics as JSON
  --json-logs       Emit logs as JSON
  -v, --verbose     Debug logging
  -h, --help        Print this help";

pub fn parse_args_from<I>(args: I) -> Result<CliConfig, String>
where
    I: IntoIterator<Item = String>,
{
    let mut config = CliConfig::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().ok_or("--config requires an argument")?;
                config.config_path = Some(PathBuf::from(path));
            }
            "--store-dir" => {
                let dir = args.next().ok_or("--store-dir requires an argument")?;
                config.store_dir = Some(PathBuf::from(dir));
            }
            "--compress" => config.compress = true,
            "--stats" => config.stats = true,
            "--json-logs" => config.json_logs = true,
            "-v" | "--verbose" => config.verbose = true,
            "-h" | "--help" => return Err(USAGE.to_string()),
            other => return Err(format!("Unknown option: {}\n\n{}", other, USAGE)),
        }
    }

    Ok(config)
}

pub fn parse_args() -> Result<CliConfig, String> {
    parse_args_from(std::env::args().skip(1))
}

/// Entry point for the CLI binary
pub fn main() -> Result<(), Box<dyn Error>> {
    let config = parse_args()?;

    let log_config = LogConfig::new()
        .with_level(if config.verbose { Level::DEBUG } else { Level::WARN })
        .with_format(if config.json_logs { LogFormat::Json } else { LogFormat::Compact });
    let _guard = init_logging(log_config);

    Cli::new(config).run()
}
