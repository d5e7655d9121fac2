// Conditions and block structure
//
// Every condition is lowered to one test operand that is either negative or
// non-zero exactly when the condition holds, so a single MLZ or MNZ on the
// program counter implements the branch. Each taken jump runs one more
// instruction (the delay slot) before landing.

use crate::cogol_compiler::arg::Arg;
use crate::cogol_compiler::codegen::CodeGen;
use crate::cogol_compiler::command::{Command, Opcode};
use crate::cogol_compiler::error::DiagnosticKind;
use crate::cogol_compiler::open_loop::{BlockKind, BlockName, OpenLoop};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    pub fn from_token(token: &str) -> Option<Comparison> {
        match token {
            "<" => Some(Comparison::Lt),
            "<=" => Some(Comparison::Le),
            ">" => Some(Comparison::Gt),
            ">=" => Some(Comparison::Ge),
            "==" => Some(Comparison::Eq),
            "!=" => Some(Comparison::Ne),
            _ => None,
        }
    }

    pub fn negated(self) -> Comparison {
        match self {
            Comparison::Lt => Comparison::Ge,
            Comparison::Le => Comparison::Gt,
            Comparison::Gt => Comparison::Le,
            Comparison::Ge => Comparison::Lt,
            Comparison::Eq => Comparison::Ne,
            Comparison::Ne => Comparison::Eq,
        }
    }

    pub fn holds(self, a: i32, b: i32) -> bool {
        match self {
            Comparison::Lt => a < b,
            Comparison::Le => a <= b,
            Comparison::Gt => a > b,
            Comparison::Ge => a >= b,
            Comparison::Eq => a == b,
            Comparison::Ne => a != b,
        }
    }
}

/// How a lowered condition is tested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Branch {
    Always,
    Never,
    /// Holds when the operand is negative
    IfNegative(Arg),
    /// Holds when the operand is non-zero
    IfNonZero(Arg),
}

impl CodeGen {
    /// Emits the code computing the test for `a op b` and returns how to use it.
    pub(crate) fn compile_comparison(
        &mut self,
        code: &mut Vec<Command>,
        a: Arg,
        op: Comparison,
        b: Arg,
    ) -> Branch {
        if let (Some(x), Some(y)) = (a.constant_value(), b.constant_value()) {
            let holds = op.holds(x, y);
            self.report(
                DiagnosticKind::ConstantCondition,
                format!("condition {} {:?} {} is always {}", x, op, y, holds),
            );
            return if holds { Branch::Always } else { Branch::Never };
        }

        let (mut a, mut op, mut b) = (a, op, b);

        // Inclusive bounds against a constant become strict ones, unless the
        // adjusted constant would leave i32
        match op {
            Comparison::Le => {
                if let Some(y) = b.constant_value().and_then(|y| y.checked_add(1)) {
                    b = Arg::constant(y);
                    op = Comparison::Lt;
                } else if let Some(x) = a.constant_value().and_then(|x| x.checked_sub(1)) {
                    a = Arg::constant(x);
                    op = Comparison::Lt;
                }
            }
            Comparison::Ge => {
                if let Some(y) = b.constant_value().and_then(|y| y.checked_sub(1)) {
                    b = Arg::constant(y);
                    op = Comparison::Gt;
                } else if let Some(x) = a.constant_value().and_then(|x| x.checked_add(1)) {
                    a = Arg::constant(x);
                    op = Comparison::Gt;
                }
            }
            _ => {}
        }

        match op {
            Comparison::Gt => {
                std::mem::swap(&mut a, &mut b);
                op = Comparison::Lt;
            }
            Comparison::Ge => {
                std::mem::swap(&mut a, &mut b);
                op = Comparison::Le;
            }
            _ => {}
        }

        match op {
            Comparison::Lt if b.is_zero() => Branch::IfNegative(a),
            Comparison::Lt => {
                let test = self.difference(code, &a, &b);
                Branch::IfNegative(test)
            }
            // a - (b + 1) < 0
            Comparison::Le => {
                self.release(&b);
                let temp = self.alloc_scratch();
                code.push(Command::new(Opcode::Add, &b, &Arg::constant(1), &Arg::constant(temp as i32)));
                code.push(Command::new(Opcode::Sub, &a, &Arg::cell(temp), &Arg::constant(temp as i32)));
                Branch::IfNegative(Arg::cell(temp))
            }
            Comparison::Ne if b.is_zero() => Branch::IfNonZero(a),
            Comparison::Ne if a.is_zero() => Branch::IfNonZero(b),
            Comparison::Ne => {
                let test = self.difference(code, &a, &b);
                Branch::IfNonZero(test)
            }
            // (x - 1) & !x is negative only for x == 0
            Comparison::Eq => {
                let x = if b.is_zero() {
                    a
                } else if a.is_zero() {
                    b
                } else {
                    self.difference(code, &a, &b)
                };
                let temp = self.alloc_scratch();
                code.push(Command::new(Opcode::Add, &x, &Arg::constant(-1), &Arg::constant(temp as i32)));
                code.push(Command::new(Opcode::Ant, &Arg::cell(temp), &x, &Arg::constant(temp as i32)));
                Branch::IfNegative(Arg::cell(temp))
            }
            Comparison::Gt | Comparison::Ge => Branch::Never,
        }
    }

    /// `a - b` into a scratch cell, reusing the operands' cells
    fn difference(&mut self, code: &mut Vec<Command>, a: &Arg, b: &Arg) -> Arg {
        self.release(a);
        self.release(b);
        let temp = self.alloc_scratch();
        code.push(Command::new(Opcode::Sub, a, b, &Arg::constant(temp as i32)));
        let mut test = Arg::cell(temp);
        test.scratches.push(temp);
        test
    }

    /// Instruction jumping to `target` when `branch` holds
    pub(crate) fn branch_command(&self, branch: &Branch, target: Arg) -> Option<Command> {
        let pc = self.program_counter();
        match branch {
            Branch::Always => Some(Command::jump(target)),
            Branch::Never => None,
            Branch::IfNegative(test) => Some(Command::new(Opcode::Mlz, test, &target, &pc)),
            Branch::IfNonZero(test) => Some(Command::new(Opcode::Mnz, test, &target, &pc)),
        }
    }

    /// `( a cmp b )` or `( a )`, which tests `a != 0`
    fn parse_condition(&mut self, code: &mut Vec<Command>) -> Option<(Arg, Comparison, Arg)> {
        if !self.expect("(") {
            return None;
        }
        let a = self.compile_ref(code, false)?;
        let op_token = self.tokens.pop();
        if op_token == ")" {
            return Some((a, Comparison::Ne, Arg::constant(0)));
        }
        let Some(op) = Comparison::from_token(&op_token) else {
            self.report_statement(
                DiagnosticKind::UnsupportedOperator,
                format!("'{}' is not a comparison", op_token),
            );
            return None;
        };
        let b = self.compile_ref(code, false)?;
        self.check_bounds(&a, false);
        self.check_bounds(&b, false);
        if !self.expect(")") {
            return None;
        }
        Some((a, op, b))
    }

    /// `if (...) {` and `while (...) {`
    pub(crate) fn compile_block_start(&mut self) {
        let keyword = self.tokens.pop();
        let kind = if keyword == "while" {
            BlockKind::While
        } else {
            BlockKind::If
        };
        let id = self.next_id();

        let mut code = Vec::new();
        let condition = self.parse_condition(&mut code);
        let suffix = self.block_suffix();
        let name = BlockName::new(kind, id, suffix);
        log::trace!("opening block {}", name);

        let Some((a, op, b)) = condition else {
            // Keep the block structure intact so the closing brace matches
            self.loops.push(OpenLoop::new(name));
            return;
        };

        match kind {
            BlockKind::While => self.open_while(name, code, a, op, b),
            _ => {
                let skip = self.compile_comparison(&mut code, a, op.negated(), b);
                self.program.extend(code);
                if let Some(jump) = self.branch_command(&skip, Arg::label(name.end(), 1)) {
                    self.program.push(jump);
                    self.program.push(Command::nop());
                }
                self.loops.push(OpenLoop::new(name));
            }
        }
    }

    /// The condition is evaluated at the bottom of the loop. Entry jumps
    /// straight to it, running the first condition instruction in the delay
    /// slot.
    fn open_while(&mut self, name: BlockName, mut cond: Vec<Command>, a: Arg, op: Comparison, b: Arg) {
        self.program.push(Command::jump(Arg::label(name.end(), 0)).tagged(name.begin()));
        self.program.push(Command::nop());

        let branch = self.compile_comparison(&mut cond, a, op, b);
        let back = self
            .branch_command(&branch, Arg::label(name.begin(), 2))
            .unwrap_or_else(Command::nop);
        cond.push(back);

        let end_index = (cond.len() - 1).min(1);
        cond[end_index].tags.push(name.end());
        if end_index == 1 {
            if let Some(slot) = self.program.last_mut() {
                *slot = cond[0].clone();
            }
        }
        cond.push(Command::nop());

        let mut open = OpenLoop::new(name);
        open.trailer = cond;
        self.loops.push(open);
    }

    /// `do {` ... `} while (...);`
    pub(crate) fn compile_do_start(&mut self) {
        self.tokens.pop();
        let id = self.next_id();
        let suffix = self.block_suffix();
        let name = BlockName::new(BlockKind::DoWhile, id, suffix);
        // The loop body starts right after the current last instruction
        let len = self.program.len();
        self.tag_last(name.begin(), len);
        self.loops.push(OpenLoop::new(name));
    }

    /// Closing brace of any block
    pub(crate) fn compile_block_end(&mut self) {
        self.tokens.pop();
        let Some(open) = self.loops.pop() else {
            self.report(DiagnosticKind::UnexpectedToken, "'}' without an open block");
            return;
        };
        log::trace!("closing block {}", open.name);

        let start = self.program.len();
        let kind = open.kind();
        let name = open.name;
        self.program.extend(open.trailer);

        match kind {
            BlockKind::If if self.tokens.peek() == "else" => {
                self.tokens.pop();
                let id = self.next_id();
                let suffix = self.block_suffix();
                let else_name = BlockName::new(BlockKind::Else, id, suffix);
                self.program.push(
                    Command::jump(Arg::label(else_name.end(), 1)).tagged(else_name.begin()),
                );
                self.program.push(Command::nop());
                self.loops.push(OpenLoop::new(else_name));
            }
            BlockKind::DoWhile => self.close_do_while(&name),
            BlockKind::Sub => {
                self.enclosing.pop();
            }
            _ => {}
        }

        if kind != BlockKind::While {
            self.tag_last(name.end(), start);
        }
    }

    fn close_do_while(&mut self, name: &BlockName) {
        if !self.tokens.eat("while") {
            let found = self.tokens.peek().to_string();
            self.report_statement(
                DiagnosticKind::UnexpectedToken,
                format!("expected 'while' after do block, found '{}'", found),
            );
            return;
        }
        let mut code = Vec::new();
        let Some((a, op, b)) = self.parse_condition(&mut code) else {
            return;
        };
        if !self.expect(";") {
            return;
        }
        let branch = self.compile_comparison(&mut code, a, op, b);
        self.program.extend(code);
        if let Some(jump) = self.branch_command(&branch, Arg::label(name.begin(), 1)) {
            self.program.push(jump);
            self.program.push(Command::nop());
        }
    }
}
