// Subroutine frames
//
// A subroutine's locals live in a frame allocated on the call stack at each
// call. The global cell named after the subroutine holds the active frame's
// base. Offset 0 keeps the return address, offset 1 the caller's frame base.

use crate::cogol_compiler::arg::{Arg, Mode};
use crate::cogol_compiler::command::{Command, Opcode};
use crate::cogol_compiler::open_loop::BlockName;
use crate::cogol_compiler::symbols::{SymbolTable, CALL_STACK_POINTER};

pub const RETURN_SLOT: &str = "return";
pub const PREVIOUS_FRAME_SLOT: &str = "previous_call";

#[derive(Debug, Clone)]
pub struct Subroutine {
    pub name: String,
    pub block: BlockName,
    pub table: SymbolTable,
    /// Frame slots in declaration order, the two bookkeeping slots first
    pub params: Vec<String>,
    /// Per-slot code storing the default value into a fresh frame
    pub inits: Vec<Vec<Command>>,
    /// Instructions that return to the caller and restore its frame
    pub epilogue: Vec<Command>,
}

impl Subroutine {
    pub fn new(name: &str, block: BlockName) -> Self {
        let mut sub = Subroutine {
            name: name.to_string(),
            block,
            table: SymbolTable::new(),
            params: Vec::new(),
            inits: Vec::new(),
            epilogue: Vec::new(),
        };
        sub.declare_word(RETURN_SLOT);
        sub.declare_word(PREVIOUS_FRAME_SLOT);
        sub
    }

    /// Words per frame
    pub fn frame_size(&self) -> usize {
        self.table.next_free()
    }

    /// Number of slots a caller may pass explicitly
    pub fn user_param_count(&self) -> usize {
        self.params.len().saturating_sub(2)
    }

    pub fn declare_word(&mut self, name: &str) -> usize {
        let offset = self.table.declare_word(name);
        self.params.push(name.to_string());
        self.inits.push(Vec::new());
        offset
    }

    pub fn declare_word_with_default(&mut self, name: &str, value: i32) -> usize {
        let offset = self.table.declare_word(name);
        let init = vec![
            self.point_call_at(offset),
            Command::copy(&Arg::constant(value), &call_target()),
        ];
        self.params.push(name.to_string());
        self.inits.push(init);
        offset
    }

    /// Elements are stored into the fresh frame, then the base slot is
    /// pointed at the first element.
    pub fn declare_array(&mut self, name: &str, size: usize, values: &[i32]) -> usize {
        let base = self.table.declare_array(name, size, values.len());
        let mut init = Vec::new();
        for (i, value) in values.iter().enumerate() {
            init.push(self.point_call_at(base + 1 + i));
            init.push(Command::copy(&Arg::constant(*value), &call_target()));
        }
        init.push(self.point_call_at(base));
        init.push(Command::new(
            Opcode::Add,
            &call_cell().with_mode(Mode::Address),
            &Arg::constant(1),
            &call_target(),
        ));
        self.params.push(name.to_string());
        self.inits.push(init);
        base
    }

    /// `call = frame + offset`, frame read from the subroutine's global cell
    fn point_call_at(&self, offset: usize) -> Command {
        Command::new(
            Opcode::Add,
            &self.frame_base(),
            &Arg::constant(offset as i32),
            &call_cell(),
        )
    }

    /// Reads the current frame base
    pub fn frame_base(&self) -> Arg {
        Arg::variable(Mode::Address, &self.name, 0)
    }

    pub fn is_array(&self, param: &str) -> bool {
        matches!(
            self.table.var_type(param),
            Some(crate::cogol_compiler::symbols::VarType::Array)
        )
    }
}

/// The call stack pointer cell, destination form
fn call_cell() -> Arg {
    Arg::variable(Mode::Constant, CALL_STACK_POINTER, 0)
}

/// The cell the call stack pointer points at, destination form
fn call_target() -> Arg {
    Arg::variable(Mode::Address, CALL_STACK_POINTER, 0)
}
