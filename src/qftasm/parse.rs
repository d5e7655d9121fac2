// Reads a QFTASM listing (`i. OP a b c;` lines) back into instructions

use crate::cogol_compiler::arg::{Arg, Mode};
use crate::cogol_compiler::command::{Command, Opcode};
use crate::cogol_compiler::error::CompilerError;

pub fn parse_listing(text: &str) -> Result<Vec<Command>, CompilerError> {
    let mut commands = Vec::new();
    for (line_number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let command = parse_line(line)
            .map_err(|msg| CompilerError::ListingParseError(msg, line_number + 1))?;
        commands.push(command);
    }
    Ok(commands)
}

fn parse_line(line: &str) -> Result<Command, String> {
    let (_, rest) = line
        .split_once('.')
        .ok_or_else(|| format!("missing instruction index in '{}'", line))?;
    let (body, _) = rest
        .split_once(';')
        .ok_or_else(|| format!("missing ';' in '{}'", line))?;

    let fields: Vec<&str> = body.split_whitespace().collect();
    if fields.len() != 4 {
        return Err(format!("expected an opcode and three operands in '{}'", body.trim()));
    }
    let opcode = Opcode::from_mnemonic(fields[0])
        .ok_or_else(|| format!("unknown opcode '{}'", fields[0]))?;
    let arg1 = parse_operand(fields[1])?;
    let arg2 = parse_operand(fields[2])?;
    let arg3 = parse_operand(fields[3])?;
    Ok(Command::new(opcode, &arg1, &arg2, &arg3))
}

fn parse_operand(text: &str) -> Result<Arg, String> {
    let (mode, digits) = match text.chars().next() {
        Some('A') => (Mode::Address, &text[1..]),
        Some('B') => (Mode::Deref, &text[1..]),
        Some('C') => (Mode::DoubleDeref, &text[1..]),
        _ => (Mode::Constant, text),
    };
    let value = digits
        .parse::<i32>()
        .map_err(|_| format!("invalid operand '{}'", text))?;
    Ok(Arg::new(mode, value))
}
