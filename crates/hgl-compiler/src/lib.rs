//! HGL Compiler
//!
//! This crate compiles HGL, a line-oriented home-automation language, into
//! Home Assistant automation records.
//!
//! # Architecture
//!
//! ```text
//! SOURCE → PARSE TREE → FRAGMENTS → DRAFT → RECORDS → SINK
//! ```
//!
//! - **Parser**: pest grammar and typed syntax tree ([`ast`], [`parser`])
//! - **Leaf transforms**: values, durations, times, brace templates
//! - **Structural transforms**: entity states, conditions, actions
//! - **Rule compiler**: merge, else inversion, expansion fan-out, naming
//!
//! Records are handed to the [`RuleSink`] as soon as each rule compiles.
//!
//! # Example
//!
//! ```
//! use hgl_compiler::Compiler;
//! use hgl_config::CompilerConfig;
//!
//! let compiler = Compiler::new(CompilerConfig::default());
//! let records = compiler
//!     .compile_to_vec("when sensor.{a,b} is motion do light.turn_on(*)\n")
//!     .unwrap();
//! assert_eq!(records.len(), 2);
//! assert_eq!(records[0].alias, "when sensor.a is motion (line 1) #0");
//! ```

pub mod ast;
pub mod braces;
pub mod compiler;
pub mod context;
pub mod error;
pub mod fragment;
pub mod leaf;
pub mod naming;
pub mod parser;
pub mod render;
pub mod structural;

pub use compiler::RuleCompiler;
pub use context::CompilerContext;
pub use error::{CompileError, CompileResult};
pub use parser::parse;

use hgl_automation::{AutomationRecord, RuleSink};
use hgl_config::CompilerConfig;
use tracing::info;

/// One-shot compiler over whole source files
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile `source`, streaming records into `sink`
    ///
    /// Returns the number of records emitted. The whole source is parsed
    /// before the first record is built; the first failure aborts the run.
    pub fn compile(&self, source: &str, sink: &mut dyn RuleSink) -> CompileResult<usize> {
        let file = parse(source)?;
        info!("Compiling {} statements", file.statements.len());

        let mut rules = RuleCompiler::new(&self.config, sink);
        let ctx = file
            .statements
            .iter()
            .try_fold(CompilerContext::new(&self.config), |ctx, statement| {
                rules.compile_statement(ctx, statement)
            })?;
        rules.finish(ctx)?;

        info!("Compiled {} records", rules.emitted());
        Ok(rules.emitted())
    }

    /// Compile `source` into a list of records
    pub fn compile_to_vec(&self, source: &str) -> CompileResult<Vec<AutomationRecord>> {
        let mut records = Vec::new();
        self.compile(source, &mut records)?;
        Ok(records)
    }
}
