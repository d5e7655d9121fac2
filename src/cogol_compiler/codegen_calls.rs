// Subroutines and call sites
//
// Call statements are parsed during the main pass but compiled only after it,
// once every subroutine's frame layout is known. Each call remembers where in
// the program it belongs and which subroutines enclosed it.

use crate::cogol_compiler::arg::{Arg, Label, Mode};
use crate::cogol_compiler::codegen::CodeGen;
use crate::cogol_compiler::codegen_moves::binary_opcode;
use crate::cogol_compiler::codegen_refs::Declarator;
use crate::cogol_compiler::command::{Command, Opcode};
use crate::cogol_compiler::error::DiagnosticKind;
use crate::cogol_compiler::lexer::TokenStream;
use crate::cogol_compiler::open_loop::{BlockKind, BlockName, OpenLoop};
use crate::cogol_compiler::subroutine::Subroutine;
use crate::cogol_compiler::symbols::{is_reserved, VarType, CALL_STACK_POINTER};

/// A `call` statement waiting for the deferred pass
#[derive(Debug, Clone)]
pub struct CallStatement {
    /// Program index the compiled call is inserted at
    pub location: usize,
    /// Statement tokens from `call` through `;`
    pub tokens: Vec<String>,
    /// Enclosing subroutines at the call site, innermost last
    pub enclosing: Vec<String>,
    /// Labels for the call's last instruction
    pub tags: Vec<Label>,
    /// The destination receives the callee's frame rather than a field of it
    pub returns_pointer: bool,
}

impl CallStatement {
    pub fn new(location: usize, tokens: Vec<String>, enclosing: Vec<String>) -> Self {
        let last_paren = tokens.iter().rposition(|t| t == ")");
        let last_dot = tokens.iter().rposition(|t| t == ".");
        CallStatement {
            location,
            tokens,
            enclosing,
            tags: Vec::new(),
            returns_pointer: last_paren >= last_dot,
        }
    }

    /// Index of the assignment token, if the call result is stored
    fn assign_index(&self) -> Option<usize> {
        self.tokens
            .iter()
            .take_while(|t| t.as_str() != "(")
            .position(|t| t.ends_with('='))
    }

    pub fn pointer_name(&self) -> Option<&str> {
        self.assign_index()?;
        self.tokens.get(1).map(String::as_str)
    }

    pub fn subroutine_name(&self) -> Option<&str> {
        let index = self.assign_index().map_or(1, |i| i + 1);
        self.tokens.get(index).map(String::as_str)
    }
}

fn call_stack_pointer() -> Arg {
    Arg::variable(Mode::Constant, CALL_STACK_POINTER, 0)
}

impl CodeGen {
    /// `sub name(params) {`
    pub(crate) fn compile_sub(&mut self) {
        self.tokens.pop();
        let name = self.tokens.pop();

        if is_reserved(&name) {
            self.report(
                DiagnosticKind::ReservedName,
                format!("cannot name a subroutine '{}'", name),
            );
        } else if self.subroutines.contains_key(&name) {
            self.report(
                DiagnosticKind::Redeclaration,
                format!("subroutine '{}' is already declared", name),
            );
        } else if self.globals.contains(&name) {
            self.report(
                DiagnosticKind::Redeclaration,
                format!("'{}' is already declared as a variable", name),
            );
        } else {
            // Holds the active frame base of this subroutine
            self.globals.declare_word(&name);
        }

        let id = self.next_id();
        let block = BlockName::new(BlockKind::Sub, id, format!("_{}", name));
        self.subroutines
            .insert(name.clone(), Subroutine::new(&name, block.clone()));
        self.enclosing.push(name.clone());

        if self.expect("(") {
            self.tokens.eat(")");
            while !self.tokens.is_empty() && self.tokens.peek() != "{" {
                self.compile_param(&name);
            }
        }
        self.tokens.eat("{");

        // Skip over the body when the declaration is reached
        self.program.push(Command::jump(Arg::label(block.end(), 1)));
        self.program.push(Command::nop().tagged(block.begin()));

        let epilogue = self.subroutine_epilogue(&name);
        if let Some(sub) = self.subroutines.get_mut(&name) {
            sub.epilogue = epilogue.clone();
        }
        let mut open = OpenLoop::new(block);
        open.trailer = epilogue;
        self.loops.push(open);
        log::debug!("subroutine '{}' declared", name);
    }

    /// Restores the caller's stack pointer and frame, jumping back through
    /// the return slot on the way.
    fn subroutine_epilogue(&mut self, name: &str) -> Vec<Command> {
        let temp = self.alloc_scratch();
        let frame = Arg::variable(Mode::Address, name, 0);
        let epilogue = vec![
            Command::copy(&frame, &call_stack_pointer()),
            Command::new(Opcode::Add, &Arg::constant(1), &frame, &Arg::constant(temp as i32)),
            Command::jump(Arg::variable(Mode::Deref, name, 0)),
            Command::copy(&Arg::new(Mode::Deref, temp as i32), &Arg::variable(Mode::Constant, name, 0)),
        ];
        self.scratch.release(temp);
        epilogue
    }

    fn compile_param(&mut self, sub_name: &str) {
        let name = self.tokens.pop();
        let taken = self
            .subroutines
            .get(sub_name)
            .is_some_and(|sub| sub.table.contains(&name));
        if is_reserved(&name) || taken {
            let kind = if taken {
                DiagnosticKind::Redeclaration
            } else {
                DiagnosticKind::ReservedName
            };
            let context = self.tokens.remove_through(&[",", ")"]).join(" ");
            self.diagnostics.report(
                kind,
                format!("cannot declare parameter '{}' of '{}'", name, sub_name),
                context,
            );
            return;
        }

        let Some(declarator) = self.parse_declarator(&name, &[",", ")"]) else {
            return;
        };
        let Some(sub) = self.subroutines.get_mut(sub_name) else {
            return;
        };
        match declarator {
            Declarator::Word => {
                sub.declare_word(&name);
            }
            Declarator::WordWithDefault(value) => {
                sub.declare_word_with_default(&name, value);
            }
            Declarator::Array { size, values } => {
                sub.declare_array(&name, size, &values);
            }
        }
    }

    /// `return;` runs a copy of the innermost subroutine's epilogue
    pub(crate) fn compile_return(&mut self) {
        self.tokens.pop();
        let Some(name) = self.enclosing.last().cloned() else {
            self.report_statement(DiagnosticKind::InvalidReturn, "return outside a subroutine");
            return;
        };
        if !self.tokens.eat(";") {
            self.report_statement(
                DiagnosticKind::InvalidReturn,
                "return does not take a value; assign to a field instead",
            );
            return;
        }
        if let Some(sub) = self.subroutines.get(&name) {
            let epilogue: Vec<Command> = sub.epilogue.iter().map(Command::untagged).collect();
            self.program.extend(epilogue);
        }
    }

    /// Records a call statement for the deferred pass
    pub(crate) fn queue_call(&mut self) {
        let tokens = self.tokens.remove_statement();
        let call = CallStatement::new(self.program.len(), tokens, self.enclosing.clone());

        if call.returns_pointer {
            if let (Some(pointer), Some(sub)) = (call.pointer_name(), call.subroutine_name()) {
                let pointer_type = VarType::SubroutinePointer(sub.to_string());
                match self.local_owner(pointer) {
                    Some(owner) => {
                        if let Some(owner_sub) = self.subroutines.get_mut(&owner) {
                            owner_sub.table.set_type(pointer, pointer_type);
                        }
                    }
                    None => self.globals.set_type(pointer, pointer_type),
                }
            }
        }

        log::trace!("queued call at {}: {}", call.location, call.tokens.join(" "));
        self.pending_calls.push(call);
        self.prev_call = Some(self.pending_calls.len() - 1);
    }

    /// Compiles queued calls, most recent first, and splices each into the
    /// program at its recorded location.
    pub(crate) fn compile_pending_calls(&mut self) {
        let calls = std::mem::take(&mut self.pending_calls);
        self.prev_call = None;

        let compiled: Vec<(usize, Vec<Command>)> = calls
            .iter()
            .rev()
            .map(|call| (call.location, self.compile_call(call)))
            .collect();

        // Later locations first, so earlier ones stay valid
        for (location, code) in compiled {
            let at = location.min(self.program.len());
            self.program.splice(at..at, code);
        }
    }

    fn compile_call(&mut self, call: &CallStatement) -> Vec<Command> {
        self.scratch.release_all();
        let saved_tokens = std::mem::replace(&mut self.tokens, TokenStream::new(call.tokens.clone()));
        let saved_enclosing = std::mem::replace(&mut self.enclosing, call.enclosing.clone());

        let compiled = self.compile_call_tokens(call);

        self.tokens = saved_tokens;
        self.enclosing = saved_enclosing;

        let mut code = compiled.unwrap_or_default();
        if code.is_empty() {
            code.push(Command::nop());
        }
        if let Some(last) = code.last_mut() {
            last.tags.extend(call.tags.iter().cloned());
        }
        code
    }

    fn compile_call_tokens(&mut self, call: &CallStatement) -> Option<Vec<Command>> {
        self.tokens.pop();
        let mut code = Vec::new();

        let mut pointer_code = Vec::new();
        let (destination, assign) = if call.pointer_name().is_some() {
            let dest = self.compile_ref(&mut pointer_code, true)?;
            (Some(dest), self.tokens.pop())
        } else {
            (None, String::new())
        };

        let sub_name = self.tokens.pop();
        let Some(sub) = self.subroutines.get(&sub_name).cloned() else {
            self.report_statement(
                DiagnosticKind::UndeclaredSubroutine,
                format!("undeclared subroutine '{}'", sub_name),
            );
            return None;
        };

        let pointer = match (&destination, call.returns_pointer) {
            (Some(dest), true) => {
                code.extend(pointer_code.iter().cloned());
                dest.clone()
            }
            _ => self.scratch_arg(),
        };

        let frame = sub.frame_base();
        let stack_top = call_stack_pointer().read();

        // New frame at the stack top; remember the caller's frame in it
        let temp = self.alloc_scratch();
        code.push(Command::new(Opcode::Add, &stack_top, &Arg::constant(1), &Arg::constant(temp as i32)));
        code.push(Command::copy(&frame, &Arg::cell(temp)));
        self.scratch.release(temp);
        code.push(Command::copy(&stack_top, &pointer));

        let supplied = self.compile_arguments(&mut code, &sub, &pointer)?;

        let return_label = Label::CallReturn {
            id: self.next_id(),
            sub: sub.name.clone(),
        };
        code.push(Command::copy(&pointer.read(), &Arg::variable(Mode::Constant, &sub.name, 0)));
        code.push(Command::copy(&Arg::label(return_label.clone(), 1), &frame));
        self.release(&pointer);

        for (slot, init) in sub.inits.iter().enumerate() {
            if !supplied[slot] {
                code.extend(init.iter().cloned());
            }
        }

        code.push(Command::jump(Arg::label(sub.block.begin(), 1)));
        code.push(
            Command::new(
                Opcode::Add,
                &Arg::constant(sub.frame_size() as i32),
                &frame,
                &call_stack_pointer(),
            )
            .tagged(return_label),
        );

        if self.tokens.pop() == "." {
            self.compile_field_result(&mut code, &sub, destination, &assign, pointer_code)?;
        }
        Some(code)
    }

    /// `( a, , b )`: each argument is stored into the new frame through
    /// `pointer`. Returns which frame slots were supplied.
    fn compile_arguments(&mut self, code: &mut Vec<Command>, sub: &Subroutine, pointer: &Arg) -> Option<Vec<bool>> {
        let mut supplied = vec![false; sub.params.len()];
        if !self.expect("(") {
            return None;
        }
        let mut slot = 2;
        loop {
            match self.tokens.peek() {
                ")" => {
                    self.tokens.pop();
                    return Some(supplied);
                }
                "," => {
                    self.tokens.pop();
                    slot += 1;
                    continue;
                }
                "" | ";" => {
                    self.report_statement(
                        DiagnosticKind::UnexpectedToken,
                        format!("unterminated argument list in call to '{}'", sub.name),
                    );
                    return None;
                }
                _ => {}
            }

            if slot - 2 >= sub.user_param_count() {
                self.report_statement(
                    DiagnosticKind::UnsupportedArgument,
                    format!(
                        "too many arguments for '{}' (takes {})",
                        sub.name,
                        sub.user_param_count()
                    ),
                );
                return None;
            }
            let param = sub.params[slot].clone();
            if sub.is_array(&param) {
                self.report_statement(
                    DiagnosticKind::UnsupportedArgument,
                    format!("array parameter '{}' of '{}' cannot be passed", param, sub.name),
                );
                return None;
            }

            let source = self.compile_ref(code, false)?;
            self.check_bounds(&source, false);
            let temp = self.alloc_scratch();
            code.push(Command::new(
                Opcode::Add,
                &pointer.read(),
                &Arg::local(&param, &sub.name),
                &Arg::constant(temp as i32),
            ));
            code.push(Command::copy(&source, &Arg::cell(temp)));
            self.scratch.release(temp);
            self.release(&source);
            supplied[slot] = true;
        }
    }

    /// `call x = f(...).field;` reads a field of the finished frame into x
    fn compile_field_result(
        &mut self,
        code: &mut Vec<Command>,
        sub: &Subroutine,
        destination: Option<Arg>,
        assign: &str,
        pointer_code: Vec<Command>,
    ) -> Option<()> {
        let field = self.field_tokens().concat();
        let Some(dest) = destination else {
            self.report_statement(
                DiagnosticKind::UnexpectedToken,
                format!("field '{}' of '{}' is read but not stored", field, sub.name),
            );
            return None;
        };

        // The callee may have reused scratch cells; recompute the destination
        code.extend(pointer_code);
        let temp = self.alloc_scratch();
        code.push(Command::new(
            Opcode::Add,
            &call_stack_pointer().read(),
            &Arg::local(&field, &sub.name),
            &Arg::constant(temp as i32),
        ));
        let value = Arg::new(Mode::Deref, temp as i32);

        if assign == "=" {
            code.push(Command::copy(&value, &dest));
        } else {
            let op = assign.strip_suffix('=').unwrap_or(assign);
            match binary_opcode(op) {
                Some(opcode) => code.push(Command::new(opcode, &dest.read(), &value, &dest)),
                None => {
                    self.report(
                        DiagnosticKind::UnsupportedOperator,
                        format!("unsupported operator '{}' on call result", assign),
                    );
                }
            }
        }

        if !self.tokens.eat(";") {
            self.report_statement(
                DiagnosticKind::UnexpectedToken,
                format!("expected ';' after call to '{}'", sub.name),
            );
        }
        Some(())
    }
}
