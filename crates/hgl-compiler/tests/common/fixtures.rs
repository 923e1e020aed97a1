//! Test fixtures and compile helpers
//!
//! Fixtures are `.hgl` sources stored in the `tests/fixtures/` directory.

use std::path::Path;

use hgl_automation::{AutomationRecord, YamlEmitter};
use hgl_compiler::{CompileResult, Compiler};
use hgl_config::CompilerConfig;

/// Load a fixture file as a string
pub fn load_fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);

    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to load fixture '{}' from {:?}: {}", name, path, e))
}

/// Compile a fixture with the default configuration
pub fn compile_fixture(name: &str) -> CompileResult<Vec<AutomationRecord>> {
    Compiler::new(CompilerConfig::default()).compile_to_vec(&load_fixture(name))
}

/// Compile a fixture through the YAML emitter and return the output text
#[allow(dead_code)]
pub fn emit_fixture(name: &str) -> String {
    let mut emitter = YamlEmitter::new(Vec::new());
    emitter
        .write_header("hgl-to-yaml", &format!("hgl-to-yaml {}", name))
        .unwrap();
    Compiler::new(CompilerConfig::default())
        .compile(&load_fixture(name), &mut emitter)
        .unwrap_or_else(|e| panic!("Failed to compile fixture '{}': {}", name, e));
    String::from_utf8(emitter.into_inner()).unwrap()
}

/// Find the record with `alias`
#[allow(dead_code)]
pub fn record<'a>(records: &'a [AutomationRecord], alias: &str) -> &'a AutomationRecord {
    records
        .iter()
        .find(|r| r.alias == alias)
        .unwrap_or_else(|| panic!("no record named '{}'", alias))
}
