//! HGL to YAML
//!
//! Compiles one HGL source file into a Home Assistant automations file.
//!
//! # Usage
//!
//! ```bash
//! hgl-to-yaml house.hgl                 # writes house.yaml
//! hgl-to-yaml --debug house.hgl out.yaml
//! HGL_BASE_URL=https://hass.local hgl-to-yaml house.hgl
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use hgl_automation::YamlEmitter;
use hgl_compiler::Compiler;
use hgl_config::{
    check_input_extension, load_source, output_path_for, write_output, CompilerConfig,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const GENERATOR: &str = "hgl-to-yaml";

#[derive(Parser, Debug)]
#[command(name = "hgl-to-yaml")]
#[command(version)]
#[command(about = "Compile HGL home-automation rules into Home Assistant automation YAML")]
#[command(long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(long)]
    debug: bool,

    /// Base URL of the Home Assistant instance, used in generated media URLs
    #[arg(long, env = "HGL_BASE_URL")]
    base_url: Option<String>,

    /// Compiler settings file (YAML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// HGL source file
    input: PathBuf,

    /// Output file (defaults to the input with a .yaml extension)
    output: Option<PathBuf>,
}

fn init_logging(debug: bool) -> Result<()> {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Settings from the config file, then command-line overrides
fn load_config(cli: &Cli) -> Result<CompilerConfig> {
    let config = match &cli.config {
        Some(path) => CompilerConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CompilerConfig::default(),
    };
    let config = match &cli.base_url {
        Some(url) => config.with_base_url(url.as_str())?,
        None => config,
    };
    Ok(config.with_source_name(cli.input.display().to_string()))
}

/// Compile `input` and return the full output text
fn compile(input: &Path, config: CompilerConfig, invocation: &str) -> Result<Vec<u8>> {
    let source = load_source(input)?;

    let mut emitter = YamlEmitter::new(Vec::new());
    emitter.write_header(GENERATOR, invocation)?;
    let count = Compiler::new(config)
        .compile(&source, &mut emitter)
        .with_context(|| format!("failed to compile {}", input.display()))?;
    info!("Compiled {} records from {}", count, input.display());

    Ok(emitter.into_inner())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug)?;

    check_input_extension(&cli.input)?;
    let output = match &cli.output {
        Some(path) => path.clone(),
        None => output_path_for(&cli.input)?,
    };
    let config = load_config(&cli)?;
    let invocation = std::env::args().collect::<Vec<_>>().join(" ");

    let content = compile(&cli.input, config, &invocation)?;
    write_output(&output, &content)?;
    info!("Wrote {}", output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_arguments() {
        let cli = Cli::try_parse_from(["hgl-to-yaml", "--debug", "house.hgl"]).unwrap();
        assert!(cli.debug);
        assert_eq!(cli.input, PathBuf::from("house.hgl"));
        assert!(cli.output.is_none());

        let cli = Cli::try_parse_from([
            "hgl-to-yaml",
            "--base-url",
            "https://hass.local",
            "house.hgl",
            "out.yaml",
        ])
        .unwrap();
        assert_eq!(cli.base_url.as_deref(), Some("https://hass.local"));
        assert_eq!(cli.output, Some(PathBuf::from("out.yaml")));
    }

    #[test]
    fn test_base_url_flag_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hgl.yaml");
        std::fs::write(&path, "base_url: http://from-file:8123\n").unwrap();

        let cli = Cli::try_parse_from([
            "hgl-to-yaml",
            "--config",
            path.to_str().unwrap(),
            "--base-url",
            "https://from-flag",
            "house.hgl",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.base_url, "https://from-flag");
        assert_eq!(config.source_name, "house.hgl");
    }

    #[test]
    fn test_compile_writes_header_then_records() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("porch.hgl");
        std::fs::write(&input, "when light.porch is on do switch.relay1\n").unwrap();

        let content = compile(&input, CompilerConfig::default(), "hgl-to-yaml porch.hgl").unwrap();
        let text = String::from_utf8(content).unwrap();
        assert!(text.starts_with("## THIS FILE WAS GENERATED BY hgl-to-yaml\n## hgl-to-yaml porch.hgl\n"));
        assert!(text.contains("- alias:"));
        assert!(text.contains("when light.porch is on (line 1)"));
    }

    #[test]
    fn test_compile_error_produces_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.hgl");
        std::fs::write(&input, "when light.porch is\n").unwrap();

        assert!(compile(&input, CompilerConfig::default(), "hgl-to-yaml broken.hgl").is_err());
        assert!(!dir.path().join("broken.yaml").exists());
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = compile(
            &dir.path().join("missing.hgl"),
            CompilerConfig::default(),
            "hgl-to-yaml missing.hgl",
        );
        assert!(result.is_err());
    }
}
