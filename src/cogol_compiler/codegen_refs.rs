// Variable references and declarations
//
// A reference in source (`x`, `$x`, `arr[i]`, `p.field`, a numeral) becomes
// one operand, plus whatever address arithmetic has to run first to produce
// it. That arithmetic is appended to the caller's code buffer.

use crate::cogol_compiler::arg::{Arg, Mode};
use crate::cogol_compiler::codegen::CodeGen;
use crate::cogol_compiler::command::{Command, Opcode};
use crate::cogol_compiler::error::DiagnosticKind;
use crate::cogol_compiler::symbols::{is_reserved, VarType};

/// What a `my` declaration or a subroutine parameter declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declarator {
    Word,
    WordWithDefault(i32),
    Array { size: usize, values: Vec<i32> },
}

impl CodeGen {
    /// Compiles one reference. `is_dest` gives the destination form, one
    /// indirection level below the source form. Returns `None` after
    /// reporting a problem.
    pub(crate) fn compile_ref(&mut self, code: &mut Vec<Command>, is_dest: bool) -> Option<Arg> {
        let mut shift = 0;
        let mut name = self.tokens.pop();
        while name == "$" || name == "\\" {
            shift += if name == "$" { 1 } else { -1 };
            name = self.tokens.pop();
        }

        if is_reserved(&name) {
            self.report_statement(
                DiagnosticKind::ReservedName,
                format!("reserved address '{}'", name),
            );
            return None;
        }

        if let Ok(value) = name.parse::<i32>() {
            if is_dest && shift == 0 {
                self.report_statement(
                    DiagnosticKind::UnexpectedToken,
                    format!("cannot assign to the number {}", name),
                );
                return None;
            }
            return self.apply_shift(Arg::constant(value), shift, is_dest);
        }

        let owner = self.local_owner(&name);
        if owner.is_none() && !self.globals.contains(&name) {
            self.report_statement(
                DiagnosticKind::UndeclaredVariable,
                format!("undeclared variable '{}'", name),
            );
            return None;
        }

        let arg = match self.tokens.peek() {
            "[" => self.compile_index(code, &name, owner.as_deref())?,
            "." => self.compile_field(code, &name, owner.as_deref()),
            _ => self.compile_plain(code, &name, owner.as_deref()),
        };
        self.apply_shift(arg, shift, is_dest)
    }

    fn apply_shift(&mut self, mut arg: Arg, shift: i32, is_dest: bool) -> Option<Arg> {
        let level = arg.mode.level() + shift - i32::from(is_dest);
        let max = if is_dest { 2 } else { 3 };
        match Mode::from_level(level) {
            Some(mode) if level <= max => {
                arg.mode = mode;
                Some(arg)
            }
            _ => {
                self.report(
                    DiagnosticKind::InvalidMode,
                    format!("invalid addressing mode {} for operand {}", level, arg),
                );
                None
            }
        }
    }

    /// The innermost enclosing subroutine that declares `name`
    pub(crate) fn local_owner(&self, name: &str) -> Option<String> {
        self.enclosing
            .iter()
            .rev()
            .find(|sub| {
                self.subroutines
                    .get(sub.as_str())
                    .is_some_and(|s| s.params.iter().any(|p| p == name))
            })
            .cloned()
    }

    fn local_offset(&self, owner: &str, name: &str) -> usize {
        self.subroutines
            .get(owner)
            .and_then(|sub| sub.table.address(name))
            .unwrap_or(0)
    }

    fn var_type(&self, owner: Option<&str>, name: &str) -> VarType {
        let ty = match owner {
            Some(sub) => self
                .subroutines
                .get(sub)
                .and_then(|s| s.table.var_type(name)),
            None => self.globals.var_type(name),
        };
        ty.cloned().unwrap_or(VarType::Scalar)
    }

    /// `ADD frame offset tmp`: address of a local in the current frame
    fn local_address(&mut self, code: &mut Vec<Command>, owner: &str, offset: usize) -> usize {
        let temp = self.alloc_scratch();
        code.push(Command::new(
            Opcode::Add,
            &Arg::variable(Mode::Address, owner, 0),
            &Arg::constant(offset as i32),
            &Arg::constant(temp as i32),
        ));
        temp
    }

    fn compile_plain(&mut self, code: &mut Vec<Command>, name: &str, owner: Option<&str>) -> Arg {
        if self.var_type(owner, name) == VarType::Array {
            self.report(
                DiagnosticKind::TypeMismatch,
                format!("array '{}' used as a plain value (reads its base pointer)", name),
            );
        }
        match owner {
            None => Arg::cell(self.globals.address(name).unwrap_or(0)),
            Some(sub) => {
                let offset = self.local_offset(sub, name);
                let temp = self.local_address(code, sub, offset);
                Arg::through_scratch(temp)
            }
        }
    }

    fn compile_index(
        &mut self,
        code: &mut Vec<Command>,
        name: &str,
        owner: Option<&str>,
    ) -> Option<Arg> {
        self.tokens.pop();
        let index = self.compile_ref(code, false)?;
        let is_array = self.var_type(owner, name) == VarType::Array;

        let arg = match owner {
            None => {
                let base = self.globals.address(name).unwrap_or(0);
                match (is_array, index.constant_value()) {
                    (true, Some(i)) => Arg::new(Mode::Address, (base as i32 + 1).wrapping_add(i)),
                    (true, None) => {
                        let temp = self.reuse_scratch(&index);
                        code.push(Command::new(
                            Opcode::Add,
                            &Arg::constant(base as i32 + 1),
                            &index,
                            &Arg::constant(temp as i32),
                        ));
                        Arg::through_scratch(temp)
                    }
                    // A scalar holding a pointer
                    (false, _) => {
                        let temp = self.reuse_scratch(&index);
                        code.push(Command::new(
                            Opcode::Add,
                            &Arg::cell(base),
                            &index,
                            &Arg::constant(temp as i32),
                        ));
                        Arg::through_scratch(temp)
                    }
                }
            }
            Some(sub) => {
                let offset = self.local_offset(sub, name) as i32;
                let frame = Arg::variable(Mode::Address, sub, 0);
                match (is_array, index.constant_value()) {
                    (true, Some(i)) => {
                        let temp = self.alloc_scratch();
                        code.push(Command::new(
                            Opcode::Add,
                            &frame,
                            &Arg::constant((offset + 1).wrapping_add(i)),
                            &Arg::constant(temp as i32),
                        ));
                        Arg::through_scratch(temp)
                    }
                    (true, None) => {
                        // The index is read before the cell is overwritten
                        let temp = self.reuse_scratch(&index);
                        code.push(Command::new(
                            Opcode::Add,
                            &frame,
                            &index,
                            &Arg::constant(temp as i32),
                        ));
                        code.push(Command::new(
                            Opcode::Add,
                            &Arg::cell(temp),
                            &Arg::constant(offset + 1),
                            &Arg::constant(temp as i32),
                        ));
                        Arg::through_scratch(temp)
                    }
                    (false, _) => {
                        let temp = self.local_address(code, sub, offset as usize);
                        code.push(Command::new(
                            Opcode::Add,
                            &Arg::new(Mode::Deref, temp as i32),
                            &index,
                            &Arg::constant(temp as i32),
                        ));
                        Arg::through_scratch(temp)
                    }
                }
            }
        };

        for address in &index.scratches {
            if !arg.scratches.contains(address) {
                self.scratch.release(*address);
            }
        }
        if !self.tokens.eat("]") {
            let found = self.tokens.peek().to_string();
            self.report_statement(
                DiagnosticKind::UnexpectedToken,
                format!("expected ']' after index of '{}' but found '{}'", name, found),
            );
            return None;
        }
        Some(arg)
    }

    fn compile_field(&mut self, code: &mut Vec<Command>, name: &str, owner: Option<&str>) -> Arg {
        self.tokens.pop();
        let field = self.field_tokens().concat();
        let target_sub = match self.var_type(owner, name) {
            VarType::SubroutinePointer(sub) => sub,
            VarType::Scalar => name.to_string(),
            VarType::Array => {
                self.report(
                    DiagnosticKind::TypeMismatch,
                    format!("field access on array '{}'", name),
                );
                name.to_string()
            }
        };
        let field_offset = Arg::local(&field, &target_sub);

        let temp = match owner {
            None => {
                let temp = self.alloc_scratch();
                code.push(Command::new(
                    Opcode::Add,
                    &Arg::cell(self.globals.address(name).unwrap_or(0)),
                    &field_offset,
                    &Arg::constant(temp as i32),
                ));
                temp
            }
            Some(sub) => {
                let offset = self.local_offset(sub, name);
                let temp = self.local_address(code, sub, offset);
                code.push(Command::new(
                    Opcode::Add,
                    &Arg::new(Mode::Deref, temp as i32),
                    &field_offset,
                    &Arg::constant(temp as i32),
                ));
                temp
            }
        };
        Arg::through_scratch(temp)
    }

    /// Tokens naming a field: `a`, `a.b`, or `a[i]` forms, joined later
    pub(crate) fn field_tokens(&mut self) -> Vec<String> {
        let mut parts = vec![self.tokens.pop()];
        match self.tokens.peek() {
            "." => {
                parts.push(self.tokens.pop());
                parts.extend(self.field_tokens());
            }
            "[" => {
                parts.push(self.tokens.pop());
                parts.extend(self.field_tokens());
                if self.tokens.peek() == "]" {
                    parts.push(self.tokens.pop());
                }
            }
            _ => {}
        }
        parts
    }

    /// Warns when a resolved operand cannot be represented in a 16-bit word
    pub(crate) fn check_bounds(&mut self, arg: &Arg, is_dest: bool) {
        let Some(value) = arg.value() else {
            return;
        };
        if arg.mode == Mode::Constant && !is_dest {
            if !(-32768..=65535).contains(&value) {
                self.report(
                    DiagnosticKind::OutOfRange,
                    format!("constant {} does not fit in 16 bits", value),
                );
            }
        } else if !(0..=65535).contains(&value) {
            self.report(
                DiagnosticKind::OutOfRange,
                format!("address {} is outside memory", value),
            );
        }
    }

    /// `my` statement: declares a global
    pub(crate) fn compile_def(&mut self) {
        self.tokens.pop();
        let name = self.tokens.pop();
        if is_reserved(&name) {
            self.report_statement(
                DiagnosticKind::ReservedName,
                format!("cannot declare reserved name '{}'", name),
            );
            return;
        }
        if self.globals.contains(&name) {
            self.report_statement(
                DiagnosticKind::Redeclaration,
                format!("'{}' is already declared", name),
            );
            return;
        }

        let Some(declarator) = self.parse_declarator(&name, &[";"]) else {
            return;
        };
        match declarator {
            Declarator::Word => {
                self.globals.declare_word(&name);
            }
            Declarator::WordWithDefault(value) => {
                let address = self.globals.declare_word(&name);
                if value != 0 {
                    self.predefs
                        .push(Command::copy(&Arg::constant(value), &Arg::constant(address as i32)));
                }
            }
            Declarator::Array { size, values } => {
                let base = self.globals.declare_array(&name, size, values.len());
                for (i, value) in values.iter().enumerate() {
                    if *value != 0 {
                        let element = (base + 1 + i) as i32;
                        self.predefs
                            .push(Command::copy(&Arg::constant(*value), &Arg::constant(element)));
                    }
                }
                self.predefs.push(Command::copy(
                    &Arg::constant(base as i32 + 1),
                    &Arg::constant(base as i32),
                ));
            }
        }
    }

    /// Parses what follows a declared name, up to and including one of
    /// `terminators`.
    pub(crate) fn parse_declarator(&mut self, name: &str, terminators: &[&str]) -> Option<Declarator> {
        let kind = self.tokens.pop();

        if terminators.contains(&kind.as_str()) {
            return Some(Declarator::Word);
        }

        if kind == "=" {
            let mut scratch_code = Vec::new();
            let init = self.compile_ref(&mut scratch_code, false)?;
            return match init.constant_value() {
                Some(value) if terminators.contains(&self.tokens.peek()) => {
                    self.tokens.pop();
                    Some(Declarator::WordWithDefault(value))
                }
                _ => {
                    let context = self.tokens.remove_through(terminators).join(" ");
                    self.diagnostics.report(
                        DiagnosticKind::NonConstantInitializer,
                        format!("initial value of '{}' must be a single constant", name),
                        context,
                    );
                    Some(Declarator::Word)
                }
            };
        }

        if kind == "[" {
            let size_token = self.tokens.pop();
            let size = match size_token.parse::<usize>() {
                Ok(size) => size,
                Err(_) => {
                    self.report(
                        DiagnosticKind::UnexpectedToken,
                        format!("array size of '{}' must be a number, found '{}'", name, size_token),
                    );
                    0
                }
            };
            if !self.tokens.eat("]") {
                let context = self.tokens.remove_through(terminators).join(" ");
                self.diagnostics.report(
                    DiagnosticKind::UnexpectedToken,
                    format!("expected ']' in declaration of '{}'", name),
                    context,
                );
                return Some(Declarator::Array { size, values: Vec::new() });
            }

            let after = self.tokens.pop();
            if terminators.contains(&after.as_str()) {
                return Some(Declarator::Array { size, values: Vec::new() });
            }
            if after != "=" || !self.tokens.eat("{") {
                let context = self.tokens.remove_through(terminators).join(" ");
                self.diagnostics.report(
                    DiagnosticKind::UnexpectedToken,
                    format!("invalid initializer for array '{}'", name),
                    context,
                );
                return Some(Declarator::Array { size, values: Vec::new() });
            }

            let values = self.parse_initializer_list(name, terminators);
            return Some(Declarator::Array { size, values });
        }

        let context = self.tokens.remove_through(terminators).join(" ");
        self.diagnostics.report(
            DiagnosticKind::UnexpectedToken,
            format!("unexpected '{}' in declaration of '{}'", kind, name),
            context,
        );
        None
    }

    /// `{ c, c, ... }` followed by a terminator; the opening brace is gone
    fn parse_initializer_list(&mut self, name: &str, terminators: &[&str]) -> Vec<i32> {
        let mut values = Vec::new();
        loop {
            let mut scratch_code = Vec::new();
            let Some(element) = self.compile_ref(&mut scratch_code, false) else {
                return values;
            };
            match element.constant_value() {
                Some(value) => values.push(value),
                None => {
                    self.report(
                        DiagnosticKind::NonConstantInitializer,
                        format!("element {} of '{}' is not a constant", values.len(), name),
                    );
                    values.push(0);
                }
            }

            match self.tokens.pop().as_str() {
                "," => continue,
                "}" => {
                    if terminators.contains(&self.tokens.peek()) {
                        self.tokens.pop();
                    } else {
                        let context = self.tokens.remove_through(terminators).join(" ");
                        self.diagnostics.report(
                            DiagnosticKind::UnexpectedToken,
                            format!("unexpected tokens after initializer of '{}'", name),
                            context,
                        );
                    }
                    return values;
                }
                other => {
                    let context = self.tokens.remove_through(terminators).join(" ");
                    self.diagnostics.report(
                        DiagnosticKind::UnexpectedToken,
                        format!("unexpected '{}' in initializer of '{}'", other, name),
                        context,
                    );
                    return values;
                }
            }
        }
    }
}
