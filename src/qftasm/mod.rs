// QFTASM reference machine
//
// 65536 words of 16-bit memory, wrapping arithmetic. Address 0 is the program
// counter: writing v to it makes execution continue at instruction v + 1 after
// exactly one more instruction (the delay slot). Address 1 is the display;
// writes to it are recorded.

pub mod parse;

#[cfg(test)]
mod machine_tests;

use crate::cogol_compiler::arg::{Mode, Operand};
use crate::cogol_compiler::command::{Command, Opcode};
use crate::cogol_compiler::error::CompilerError;
use rand::Rng;

pub use parse::parse_listing;

pub const MEMORY_WORDS: usize = 65536;
pub const PROGRAM_COUNTER: usize = 0;
pub const DISPLAY: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Operation {
    mode: Mode,
    value: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Instruction {
    opcode: Opcode,
    args: [Operation; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Continue,
    Halted,
}

pub struct Machine {
    memory: Vec<u16>,
    program: Vec<Instruction>,
    next: usize,
    /// Landing index of a taken jump, applied after the delay slot
    pending_jump: Option<usize>,
    steps: usize,
    display_writes: Vec<u16>,
}

impl Machine {
    /// Fails if any operand is still symbolic
    pub fn new(commands: &[Command]) -> Result<Self, CompilerError> {
        let mut program = Vec::with_capacity(commands.len());
        for (index, command) in commands.iter().enumerate() {
            let mut args = [Operation {
                mode: Mode::Constant,
                value: 0,
            }; 3];
            for (slot, arg) in command.args().into_iter().enumerate() {
                let value = match &arg.operand {
                    Operand::Resolved(value) => *value as u16,
                    Operand::Unresolved(_) => {
                        return Err(CompilerError::UnresolvedOperand(arg.to_string(), index))
                    }
                };
                args[slot] = Operation {
                    mode: arg.mode,
                    value,
                };
            }
            program.push(Instruction {
                opcode: command.opcode,
                args,
            });
        }

        Ok(Machine {
            memory: vec![0; MEMORY_WORDS],
            program,
            next: 0,
            pending_jump: None,
            steps: 0,
            display_writes: Vec::new(),
        })
    }

    pub fn read_word(&self, addr: usize) -> u16 {
        self.memory[addr % MEMORY_WORDS]
    }

    pub fn read_signed(&self, addr: usize) -> i16 {
        self.read_word(addr) as i16
    }

    pub fn write_word(&mut self, addr: usize, value: u16) {
        self.memory[addr % MEMORY_WORDS] = value;
    }

    pub fn memory(&self) -> &[u16] {
        &self.memory
    }

    /// Fills memory with noise, as a freshly powered machine would have.
    /// The program counter and display start at zero.
    pub fn randomize_memory<R: Rng>(&mut self, rng: &mut R) {
        for word in self.memory.iter_mut() {
            *word = rng.gen::<u16>();
        }
        self.memory[PROGRAM_COUNTER] = 0;
        self.memory[DISPLAY] = 0;
    }

    pub fn display_writes(&self) -> &[u16] {
        &self.display_writes
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn is_halted(&self) -> bool {
        self.next >= self.program.len()
    }

    fn read_operand(&self, op: Operation) -> u16 {
        let mut value = op.value;
        for _ in 0..op.mode.level() {
            value = self.read_word(value as usize);
        }
        value
    }

    fn destination(&self, op: Operation) -> usize {
        let mut addr = op.value;
        for _ in 0..op.mode.level() {
            addr = self.read_word(addr as usize);
        }
        addr as usize
    }

    pub fn step(&mut self) -> StepResult {
        if self.is_halted() {
            return StepResult::Halted;
        }
        let index = self.next;
        let instruction = self.program[index];
        self.memory[PROGRAM_COUNTER] = index as u16;

        let a = self.read_operand(instruction.args[0]);
        let b = self.read_operand(instruction.args[1]);
        let target = self.destination(instruction.args[2]);

        let result = match instruction.opcode {
            Opcode::Mnz => (a != 0).then_some(b),
            Opcode::Mlz => ((a as i16) < 0).then_some(b),
            Opcode::Add => Some(a.wrapping_add(b)),
            Opcode::Sub => Some(a.wrapping_sub(b)),
            Opcode::And => Some(a & b),
            Opcode::Or => Some(a | b),
            Opcode::Xor => Some(a ^ b),
            Opcode::Ant => Some(a & !b),
            Opcode::Sl => Some(a.wrapping_shl(u32::from(b & 15))),
            Opcode::Srl => Some(a.wrapping_shr(u32::from(b & 15))),
            Opcode::Sra => Some(((a as i16).wrapping_shr(u32::from(b & 15))) as u16),
        };

        let mut jump = None;
        if let Some(value) = result {
            self.memory[target] = value;
            if target == PROGRAM_COUNTER {
                jump = Some(value as usize + 1);
            }
            if target == DISPLAY {
                log::debug!("display <- {}", value);
                self.display_writes.push(value);
            }
        }

        self.next = self.pending_jump.take().unwrap_or(index + 1);
        self.pending_jump = jump;
        self.steps += 1;

        if self.is_halted() {
            StepResult::Halted
        } else {
            StepResult::Continue
        }
    }

    /// Runs until the program falls off its end or `max_steps` is reached.
    /// Returns true if it halted.
    pub fn run(&mut self, max_steps: usize) -> bool {
        for _ in 0..max_steps {
            if self.step() == StepResult::Halted {
                log::debug!("halted after {} steps", self.steps);
                return true;
            }
        }
        self.is_halted()
    }
}
