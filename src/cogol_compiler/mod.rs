// Cogol Compiler Module
// Compiles Cogol source into QFTASM listings

pub mod arg;
pub mod codegen;
pub mod codegen_branch;
pub mod codegen_calls;
pub mod codegen_moves;
pub mod codegen_refs;
pub mod codegen_resolve;
pub mod command;
pub mod config;
pub mod error;
pub mod lexer;
pub mod listing;
pub mod open_loop;
pub mod peephole;
pub mod scratch;
pub mod subroutine;
pub mod symbols;

#[cfg(test)]
mod codegen_tests;
#[cfg(test)]
mod peephole_tests;

pub use config::CompilerConfig;
pub use error::{CompilerError, Diagnostic, DiagnosticKind, Severity};
pub use listing::CompiledProgram;

/// Main compiler structure
pub struct CogolCompiler {
    config: CompilerConfig,
}

impl Default for CogolCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl CogolCompiler {
    pub fn new() -> Self {
        Self::with_config(CompilerConfig::default())
    }

    pub fn with_config(config: CompilerConfig) -> Self {
        CogolCompiler { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile Cogol source to a QFTASM program.
    ///
    /// Problems in the source never abort compilation; they are collected in
    /// the returned program's diagnostics.
    pub fn compile(&self, source: &str) -> CompiledProgram {
        // Phase 1: Lexical Analysis
        let (tokens, lexer_diagnostics) = lexer::Lexer::new(source).tokenize();

        // Phase 2: Main pass and deferred calls
        let mut code_generator = codegen::CodeGen::new(self.config.clone());
        code_generator.add_diagnostics(lexer_diagnostics);
        code_generator.compile_tokens(tokens);

        // Phase 3: Resolution, optimization and layout
        code_generator.finish()
    }
}
