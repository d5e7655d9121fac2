// QFTASM instructions
//
// Every instruction has the same shape: `OP arg1 arg2 arg3`, where arg3 names
// the destination cell. Writing address 0 (the program counter) is a jump.

use crate::cogol_compiler::arg::{Arg, Label, Mode};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Move arg2 into the destination if arg1 is non-zero
    Mnz,
    /// Move arg2 into the destination if arg1 is negative
    Mlz,
    Add,
    Sub,
    And,
    Or,
    Xor,
    /// arg1 AND NOT arg2
    Ant,
    Sl,
    Srl,
    Sra,
}

lazy_static! {
    static ref OPCODES_BY_MNEMONIC: HashMap<&'static str, Opcode> = {
        let mut map = HashMap::new();
        for opcode in Opcode::ALL {
            map.insert(opcode.mnemonic(), opcode);
        }
        map
    };
}

impl Opcode {
    pub const ALL: [Opcode; 11] = [
        Opcode::Mnz,
        Opcode::Mlz,
        Opcode::Add,
        Opcode::Sub,
        Opcode::And,
        Opcode::Or,
        Opcode::Xor,
        Opcode::Ant,
        Opcode::Sl,
        Opcode::Srl,
        Opcode::Sra,
    ];

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Mnz => "MNZ",
            Opcode::Mlz => "MLZ",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Xor => "XOR",
            Opcode::Ant => "ANT",
            Opcode::Sl => "SL",
            Opcode::Srl => "SRL",
            Opcode::Sra => "SRA",
        }
    }

    pub fn from_mnemonic(mnemonic: &str) -> Option<Opcode> {
        OPCODES_BY_MNEMONIC.get(mnemonic).copied()
    }

    pub fn is_commutative(self) -> bool {
        matches!(self, Opcode::Add | Opcode::And | Opcode::Or | Opcode::Xor)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub opcode: Opcode,
    pub arg1: Arg,
    pub arg2: Arg,
    pub arg3: Arg,
    pub tags: Vec<Label>,
}

impl Command {
    /// Builds an instruction from copies of the operands. Scratch ownership
    /// stays with the caller's operands.
    pub fn new(opcode: Opcode, arg1: &Arg, arg2: &Arg, arg3: &Arg) -> Self {
        Command {
            opcode,
            arg1: arg1.detached(),
            arg2: arg2.detached(),
            arg3: arg3.detached(),
            tags: Vec::new(),
        }
    }

    /// `MLZ 0 0 0`: never moves anything
    pub fn nop() -> Self {
        let zero = Arg::constant(0);
        Command::new(Opcode::Mlz, &zero, &zero, &zero)
    }

    /// Unconditional move
    pub fn copy(source: &Arg, dest: &Arg) -> Self {
        Command::new(Opcode::Mlz, &Arg::constant(-1), source, dest)
    }

    /// Unconditional jump to `target`
    pub fn jump(target: Arg) -> Self {
        Command::copy(&target, &Arg::constant(0))
    }

    pub fn tagged(mut self, label: Label) -> Self {
        self.tags.push(label);
        self
    }

    pub fn untagged(&self) -> Self {
        Command {
            tags: Vec::new(),
            ..self.clone()
        }
    }

    pub fn args(&self) -> [&Arg; 3] {
        [&self.arg1, &self.arg2, &self.arg3]
    }

    pub fn args_mut(&mut self) -> [&mut Arg; 3] {
        [&mut self.arg1, &mut self.arg2, &mut self.arg3]
    }

    pub fn is_nop(&self) -> bool {
        self.opcode == Opcode::Mlz
            && self.arg1.is_zero()
            && self.arg2.is_zero()
            && self.arg3.is_zero()
    }

    /// Whether this instruction may write the program counter
    pub fn writes_program_counter(&self) -> bool {
        !self.is_nop() && self.arg3.mode == Mode::Constant && self.arg3.value() == Some(0)
    }

    /// Target of an unconditional `MLZ -1 N 0` jump with a resolved constant N
    pub fn jump_target(&self) -> Option<i32> {
        if self.opcode == Opcode::Mlz
            && self.arg1.constant_value() == Some(-1)
            && self.arg3.constant_value() == Some(0)
        {
            self.arg2.constant_value()
        } else {
            None
        }
    }

    pub fn render(&self, annotate: bool) -> String {
        let mut line = format!(
            "{} {} {} {};",
            self.opcode, self.arg1, self.arg2, self.arg3
        );
        if annotate {
            for tag in &self.tags {
                line.push(' ');
                line.push_str(&tag.to_string());
            }
        }
        line
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.render(false))
    }
}
