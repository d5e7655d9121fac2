// Peephole optimizer
//
// Works on the fully resolved program and never changes instruction count or
// positions, so every resolved jump target stays valid.

use crate::cogol_compiler::arg::{Arg, Mode};
use crate::cogol_compiler::command::{Command, Opcode};
use std::collections::BTreeSet;

/// Rewrites one instruction into a simpler equivalent.
pub fn simplify(command: &Command) -> Command {
    let mut out = command.clone();

    if out.opcode == Opcode::Sub {
        if let Some(value) = out.arg2.constant_value() {
            out.opcode = Opcode::Add;
            out.arg2 = Arg::constant(value.wrapping_neg());
        }
    }

    // Canonical operand order: higher mode first, then higher value
    if out.opcode.is_commutative() && sort_key(&out.arg1) < sort_key(&out.arg2) {
        std::mem::swap(&mut out.arg1, &mut out.arg2);
    }

    match out.opcode {
        Opcode::Mlz => {
            if let Some(test) = out.arg1.constant_value() {
                if test < 0 {
                    out.arg1 = Arg::constant(-1);
                } else {
                    make_nop(&mut out);
                }
            }
        }
        Opcode::Mnz => {
            if let Some(test) = out.arg1.constant_value() {
                out.opcode = Opcode::Mlz;
                if test != 0 {
                    out.arg1 = Arg::constant(-1);
                } else {
                    make_nop(&mut out);
                }
            }
        }
        _ => {}
    }

    out
}

fn sort_key(arg: &Arg) -> (Mode, i32) {
    (arg.mode, arg.value().unwrap_or(i32::MIN))
}

fn make_nop(command: &mut Command) {
    command.opcode = Opcode::Mlz;
    command.arg1 = Arg::constant(0);
    command.arg2 = Arg::constant(0);
    command.arg3 = Arg::constant(0);
}

/// An unconditional jump to N followed by a no-op slot becomes a jump to N+1
/// with a copy of instruction N in the slot. Returns the rewritten pair.
pub fn thread_jump(jump: &Command, slot: &Command, program: &[Command]) -> Option<(Command, Command)> {
    if !slot.is_nop() {
        return None;
    }
    let target = usize::try_from(jump.jump_target()?).ok()?;
    let landing = program.get(target)?;

    let mut new_jump = jump.clone();
    new_jump.arg2 = Arg::constant(target as i32 + 1);
    let mut new_slot = landing.untagged();
    new_slot.tags = slot.tags.clone();
    Some((new_jump, new_slot))
}

/// Simplifies every instruction, then threads jumps whose delay slot is a
/// no-op. A slot that is itself a jump target keeps its no-op.
pub fn optimize(commands: &[Command], landing_sites: &BTreeSet<usize>) -> Vec<Command> {
    let mut out: Vec<Command> = commands.iter().map(simplify).collect();
    let mut protected = landing_sites.clone();

    for i in 0..out.len().saturating_sub(1) {
        // A jump sitting in another branch's delay slot never reaches its own slot
        if protected.contains(&(i + 1)) || (i > 0 && out[i - 1].writes_program_counter()) {
            continue;
        }
        if let Some((jump, slot)) = thread_jump(&out[i], &out[i + 1], &out) {
            log::trace!("threaded jump at {} to {}", i, jump.arg2);
            if let Some(target) = jump.jump_target() {
                protected.insert(target as usize);
            }
            out[i] = jump;
            out[i + 1] = slot;
        }
    }

    log::debug!("peephole pass over {} instructions done", out.len());
    out
}
