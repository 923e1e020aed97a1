//! Source loading, output path derivation and output writing

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Extension given to emitted config files
pub const OUTPUT_EXTENSION: &str = "yaml";

/// Extensions that mark a file as compiler output
const OUTPUT_LIKE_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// Reject input files that already look like emitted output
pub fn check_input_extension(path: &Path) -> ConfigResult<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension {
        Some(ext) if OUTPUT_LIKE_EXTENSIONS.contains(&ext.as_str()) => {
            Err(ConfigError::ExtensionGuard {
                path: path.to_path_buf(),
                extension: ext,
            })
        }
        _ => Ok(()),
    }
}

/// Default output path: the input with its extension replaced by `yaml`
pub fn output_path_for(input: &Path) -> ConfigResult<PathBuf> {
    check_input_extension(input)?;
    Ok(input.with_extension(OUTPUT_EXTENSION))
}

/// Read a source file as UTF-8 text
pub fn load_source(path: impl AsRef<Path>) -> ConfigResult<String> {
    let path = path.as_ref();
    debug!("Loading source file: {:?}", path);

    fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write the full output in one go
pub fn write_output(path: impl AsRef<Path>, content: &[u8]) -> ConfigResult<()> {
    let path = path.as_ref();
    debug!("Writing {} bytes to {:?}", content.len(), path);

    fs::write(path, content).map_err(|e| ConfigError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}
