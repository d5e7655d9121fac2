// Assignment statements
//
//   dst = a;            dst = a op b;        dst op= b;
//   dst++;  dst--;      dst = a if x cmp y;  dst = - b;

use crate::cogol_compiler::arg::{Arg, Label};
use crate::cogol_compiler::codegen::CodeGen;
use crate::cogol_compiler::codegen_branch::{Branch, Comparison};
use crate::cogol_compiler::command::{Command, Opcode};
use crate::cogol_compiler::error::DiagnosticKind;

/// Opcode for a binary operator token; `*` is handled separately
pub fn binary_opcode(op: &str) -> Option<Opcode> {
    match op {
        "+" | "--" => Some(Opcode::Add),
        "-" | "+-" => Some(Opcode::Sub),
        "&" => Some(Opcode::And),
        "|" => Some(Opcode::Or),
        "^" => Some(Opcode::Xor),
        "&!" => Some(Opcode::Ant),
        "<<" => Some(Opcode::Sl),
        ">>>" => Some(Opcode::Srl),
        ">>" => Some(Opcode::Sra),
        _ => None,
    }
}

impl CodeGen {
    pub(crate) fn compile_move(&mut self) {
        let mut code = Vec::new();
        if self.compile_move_into(&mut code) {
            self.program.extend(code);
        }
    }

    fn compile_move_into(&mut self, code: &mut Vec<Command>) -> bool {
        let Some(dest) = self.compile_ref(code, true) else {
            return false;
        };
        self.check_bounds(&dest, true);

        let eq = self.tokens.pop();
        let (lhs, op) = match eq.as_str() {
            "=" => {
                let lhs = if self.tokens.peek() == "-" {
                    Arg::constant(0)
                } else {
                    match self.compile_ref(code, false) {
                        Some(arg) => arg,
                        None => return false,
                    }
                };
                (lhs, self.tokens.pop())
            }
            "++" | "--" => {
                let step = if eq == "++" { 1 } else { -1 };
                code.push(Command::new(
                    Opcode::Add,
                    &dest.read(),
                    &Arg::constant(step),
                    &dest,
                ));
                return self.expect(";");
            }
            compound if compound.len() > 1 && compound.ends_with('=') => {
                let op = compound[..compound.len() - 1].to_string();
                // The destination keeps ownership of its address cell
                (dest.read().detached(), op)
            }
            other => {
                let other = other.to_string();
                self.report_statement(
                    DiagnosticKind::UnsupportedOperator,
                    format!("'{}' is not an assignment operator", other),
                );
                return false;
            }
        };
        self.check_bounds(&lhs, false);

        match op.as_str() {
            ";" => {
                code.push(Command::copy(&lhs, &dest));
                true
            }
            "if" => self.compile_conditional_move(code, &lhs, &dest),
            _ => {
                let Some(rhs) = self.compile_ref(code, false) else {
                    return false;
                };
                self.check_bounds(&rhs, false);
                if !self.expect(";") {
                    return false;
                }
                if op == "*" {
                    self.compile_multiply(code, &lhs, &rhs, &dest);
                    return true;
                }
                match binary_opcode(&op) {
                    Some(opcode) => {
                        code.push(Command::new(opcode, &lhs, &rhs, &dest));
                        true
                    }
                    None => {
                        self.report(
                            DiagnosticKind::UnsupportedOperator,
                            format!("unsupported operator '{}'", op),
                        );
                        false
                    }
                }
            }
        }
    }

    /// `dst = src if a cmp b;`
    fn compile_conditional_move(&mut self, code: &mut Vec<Command>, source: &Arg, dest: &Arg) -> bool {
        let Some(a) = self.compile_ref(code, false) else {
            return false;
        };
        let op_token = self.tokens.pop();
        let Some(op) = Comparison::from_token(&op_token) else {
            self.report_statement(
                DiagnosticKind::UnsupportedOperator,
                format!("'{}' is not a comparison", op_token),
            );
            return false;
        };
        let Some(b) = self.compile_ref(code, false) else {
            return false;
        };
        if !self.expect(";") {
            return false;
        }

        match self.compile_comparison(code, a, op, b) {
            Branch::Always => code.push(Command::copy(source, dest)),
            Branch::Never => {}
            Branch::IfNegative(test) => code.push(Command::new(Opcode::Mlz, &test, source, dest)),
            Branch::IfNonZero(test) => code.push(Command::new(Opcode::Mnz, &test, source, dest)),
        }
        true
    }

    /// Repeated addition of `rhs`, `|lhs|` times, with the sign of lhs
    /// applied by adding `-rhs` when lhs is negative.
    fn compile_multiply(&mut self, code: &mut Vec<Command>, lhs: &Arg, rhs: &Arg, dest: &Arg) {
        let id = self.next_id();
        let end = Label::MultiplyEnd(id);
        let pc = self.program_counter();

        // Cells holding the destination's address must survive the loop
        let counter = self.reuse_scratch_except(lhs, dest);
        code.push(Command::new(Opcode::Sub, &Arg::constant(0), lhs, &Arg::constant(counter as i32)));
        let addend = self.reuse_scratch_except(rhs, dest);
        code.push(Command::new(Opcode::Add, &Arg::constant(0), rhs, &Arg::constant(addend as i32)));

        let counter_cell = Arg::cell(counter);
        let addend_cell = Arg::cell(addend);
        code.extend([
            // lhs > 0: count -lhs up to zero
            Command::new(Opcode::Mlz, &counter_cell, &Arg::label(end.clone(), -1), &pc),
            Command::copy(&Arg::constant(0), dest),
            // otherwise count lhs up and add -rhs each time
            Command::new(Opcode::Sub, &Arg::constant(0), &counter_cell, &Arg::constant(counter as i32)),
            Command::jump(Arg::label(end.clone(), -1)),
            Command::new(Opcode::Sub, &Arg::constant(0), &addend_cell, &Arg::constant(addend as i32)),
            Command::new(Opcode::Add, &dest.read(), &addend_cell, dest),
            Command::new(Opcode::Mlz, &counter_cell, &Arg::label(end.clone(), -2), &pc),
            Command::new(Opcode::Add, &counter_cell, &Arg::constant(1), &Arg::constant(counter as i32))
                .tagged(end),
        ]);
    }
}
