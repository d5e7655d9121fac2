// QFTASM code generation session
//
// `CodeGen` walks the token stream statement by statement and appends to the
// main program. The per-concern pieces live in sibling files:
// codegen_refs (variable references and declarations), codegen_moves
// (assignments), codegen_branch (conditions and blocks), codegen_calls
// (subroutines and call sites) and codegen_resolve (label resolution).

use crate::cogol_compiler::arg::{Arg, Label, Mode};
use crate::cogol_compiler::codegen_calls::CallStatement;
use crate::cogol_compiler::command::Command;
use crate::cogol_compiler::config::CompilerConfig;
use crate::cogol_compiler::error::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::cogol_compiler::lexer::TokenStream;
use crate::cogol_compiler::listing::CompiledProgram;
use crate::cogol_compiler::open_loop::OpenLoop;
use crate::cogol_compiler::peephole;
use crate::cogol_compiler::scratch::ScratchPool;
use crate::cogol_compiler::subroutine::Subroutine;
use crate::cogol_compiler::symbols::{
    SymbolTable, CALL_STACK_POINTER, DISPLAY, PROGRAM_COUNTER,
};
use indexmap::IndexMap;

pub struct CodeGen {
    pub(crate) config: CompilerConfig,
    pub(crate) tokens: TokenStream,
    pub(crate) globals: SymbolTable,
    /// Constant stores for initialized globals, placed ahead of the program
    pub(crate) predefs: Vec<Command>,
    pub(crate) program: Vec<Command>,
    pub(crate) scratch: ScratchPool,
    /// Open blocks, innermost last
    pub(crate) loops: Vec<OpenLoop>,
    pub(crate) subroutines: IndexMap<String, Subroutine>,
    /// Subroutines whose bodies enclose the current statement, innermost last
    pub(crate) enclosing: Vec<String>,
    /// Call statements in parse order, compiled after the main pass
    pub(crate) pending_calls: Vec<CallStatement>,
    /// Index into `pending_calls` of a call that is still the last thing in
    /// the program; labels meant for "the last instruction" go onto it.
    pub(crate) prev_call: Option<usize>,
    pub(crate) next_block_id: u32,
    pub(crate) diagnostics: Diagnostics,
}

impl CodeGen {
    pub fn new(config: CompilerConfig) -> Self {
        let mut globals = SymbolTable::new();
        globals.declare_word(PROGRAM_COUNTER);
        globals.declare_word(DISPLAY);

        let mut scratch = ScratchPool::new();
        for _ in 0..config.initial_scratch_cells {
            let address = globals.declare_word(&scratch.next_name());
            scratch.add(address, false);
        }

        CodeGen {
            config,
            tokens: TokenStream::default(),
            globals,
            predefs: Vec::new(),
            program: Vec::new(),
            scratch,
            loops: Vec::new(),
            subroutines: IndexMap::new(),
            enclosing: Vec::new(),
            pending_calls: Vec::new(),
            prev_call: None,
            next_block_id: 0,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn add_diagnostics(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    /// Runs the main pass over `tokens`, then compiles the deferred calls
    /// and places the call stack.
    pub fn compile_tokens(&mut self, tokens: TokenStream) {
        self.tokens = tokens;

        // The stack pointer starts at the first stack cell
        self.program.push(
            Command::copy(
                &Arg::variable(Mode::Constant, CALL_STACK_POINTER, 1),
                &Arg::variable(Mode::Constant, CALL_STACK_POINTER, 0),
            )
            .tagged(Label::PreloadCallStack),
        );

        while !self.tokens.is_empty() {
            self.compile_statement();
        }

        for open in self.loops.iter().rev() {
            self.diagnostics.report(
                DiagnosticKind::UnexpectedToken,
                format!("block {} is never closed", open.name),
                "",
            );
        }

        self.compile_pending_calls();
        self.declare_call_stack();
        log::debug!(
            "Main pass done: {} instructions, {} predefs, {} subroutines",
            self.program.len(),
            self.predefs.len(),
            self.subroutines.len()
        );
    }

    fn compile_statement(&mut self) {
        self.scratch.release_all();
        let start = self.program.len();

        match self.tokens.peek() {
            ";" => {
                self.tokens.pop();
            }
            "call" => {
                self.queue_call();
                return;
            }
            "my" => self.compile_def(),
            "if" | "while" => self.compile_block_start(),
            "do" => self.compile_do_start(),
            "}" => self.compile_block_end(),
            "sub" => self.compile_sub(),
            "return" => self.compile_return(),
            _ => self.compile_move(),
        }

        if self.program.len() > start {
            self.prev_call = None;
        }
    }

    fn declare_call_stack(&mut self) {
        let base = self
            .globals
            .declare_array(CALL_STACK_POINTER, self.config.call_stack_size, 0);
        log::debug!(
            "call stack pointer at {} ({} named stack cells)",
            base,
            self.config.call_stack_size
        );
    }

    /// Grabs a free scratch cell, growing the pool when all are busy
    pub(crate) fn alloc_scratch(&mut self) -> usize {
        if let Some(address) = self.scratch.acquire() {
            return address;
        }
        let address = self.globals.declare_word(&self.scratch.next_name());
        self.scratch.add(address, true);
        log::trace!("scratch pool grew to {} cells", self.scratch.len());
        address
    }

    pub(crate) fn release(&mut self, arg: &Arg) {
        for address in &arg.scratches {
            self.scratch.release(*address);
        }
    }

    /// A scratch cell in destination form
    pub(crate) fn scratch_arg(&mut self) -> Arg {
        Arg::scratch(self.alloc_scratch())
    }

    /// Reuses the first scratch cell backing `arg`, or takes a fresh one
    pub(crate) fn reuse_scratch(&mut self, arg: &Arg) -> usize {
        match arg.scratches.first() {
            Some(address) => *address,
            None => self.alloc_scratch(),
        }
    }

    /// Like `reuse_scratch`, but never hands out a cell backing `keep`
    pub(crate) fn reuse_scratch_except(&mut self, arg: &Arg, keep: &Arg) -> usize {
        match arg.scratches.first() {
            Some(address) if !keep.scratches.contains(address) => *address,
            _ => self.alloc_scratch(),
        }
    }

    pub(crate) fn next_id(&mut self) -> u32 {
        let id = self.next_block_id;
        self.next_block_id += 1;
        id
    }

    pub(crate) fn program_counter(&self) -> Arg {
        Arg::constant(self.globals.address(PROGRAM_COUNTER).unwrap_or(0) as i32)
    }

    /// Reports a problem, consuming the rest of the statement as context
    pub(crate) fn report_statement(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let context = self.tokens.remove_statement().join(" ");
        self.diagnostics.report(kind, message, context);
    }

    pub(crate) fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.diagnostics.report(kind, message, "");
    }

    /// Consumes `expected`, or reports what was found instead
    pub(crate) fn expect(&mut self, expected: &str) -> bool {
        if self.tokens.eat(expected) {
            true
        } else {
            let found = self.tokens.peek().to_string();
            self.report_statement(
                DiagnosticKind::UnexpectedToken,
                format!("expected '{}' but found '{}'", expected, found),
            );
            false
        }
    }

    /// Collects `_token` suffixes up to the next `{` and consumes the brace
    pub(crate) fn block_suffix(&mut self) -> String {
        let mut suffix = String::new();
        while !self.tokens.is_empty() && self.tokens.peek() != "{" {
            suffix.push('_');
            suffix.push_str(&self.tokens.pop());
        }
        self.tokens.eat("{");
        suffix
    }

    /// Adds `label` to the last instruction of the program, or to a pending
    /// call that still ends the program.
    pub(crate) fn tag_last(&mut self, label: Label, grew_since: usize) {
        match self.prev_call {
            Some(index) if self.program.len() <= grew_since => {
                self.pending_calls[index].tags.push(label);
            }
            _ => {
                if let Some(last) = self.program.last_mut() {
                    last.tags.push(label);
                }
            }
        }
    }

    /// Places predefs, resolves every symbol, optimizes and lays out the
    /// final program.
    pub fn finish(mut self) -> CompiledProgram {
        let mut commands = std::mem::take(&mut self.predefs);
        commands.append(&mut self.program);

        let landing_sites = self.resolve_symbols(&mut commands);
        if self.config.optimize {
            commands = peephole::optimize(&commands, &landing_sites);
        }
        // One leading no-op so that a jump value v lands on the instruction
        // resolved to index v
        commands.insert(0, Command::nop());

        let subroutine_maps = self
            .subroutines
            .iter()
            .map(|(name, sub)| (name.clone(), sub.table.memory_map().to_vec()))
            .collect();

        log::info!(
            "Compiled {} instructions using {} memory cells ({} diagnostics)",
            commands.len(),
            self.globals.next_free(),
            self.diagnostics.len()
        );

        CompiledProgram {
            commands,
            memory_map: self.globals.memory_map().to_vec(),
            subroutine_maps,
            diagnostics: self.diagnostics.into_vec(),
            annotate: self.config.annotate_listing,
        }
    }
}
