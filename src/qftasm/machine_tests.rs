// Reference machine tests

#[cfg(test)]
mod tests {
    use crate::cogol_compiler::arg::{Arg, Mode};
    use crate::cogol_compiler::command::{Command, Opcode};
    use crate::cogol_compiler::CompilerError;
    use crate::qftasm::{parse_listing, Machine, StepResult};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn c(value: i32) -> Arg {
        Arg::constant(value)
    }

    fn op(opcode: Opcode, a: Arg, b: Arg, dest: i32) -> Command {
        Command::new(opcode, &a, &b, &c(dest))
    }

    /// Runs `commands` to completion and returns the machine
    fn run(commands: &[Command]) -> Machine {
        let mut machine = Machine::new(commands).unwrap();
        assert!(machine.run(1_000));
        machine
    }

    #[test]
    fn test_arithmetic_wraps_at_16_bits() {
        let machine = run(&[
            op(Opcode::Add, c(65535), c(1), 10),
            op(Opcode::Sub, c(0), c(1), 11),
            op(Opcode::Add, c(32767), c(1), 12),
        ]);
        assert_eq!(machine.read_word(10), 0);
        assert_eq!(machine.read_word(11), 0xFFFF);
        assert_eq!(machine.read_signed(12), -32768);
    }

    #[test]
    fn test_bitwise_and_shifts() {
        let machine = run(&[
            op(Opcode::And, c(0b1100), c(0b1010), 10),
            op(Opcode::Or, c(0b1100), c(0b1010), 11),
            op(Opcode::Xor, c(0b1100), c(0b1010), 12),
            op(Opcode::Ant, c(0b1100), c(0b1010), 13),
            op(Opcode::Sl, c(1), c(4), 14),
            op(Opcode::Srl, c(-32768), c(15), 15),
            op(Opcode::Sra, c(-16), c(2), 16),
            // Shift amounts use the low four bits only
            op(Opcode::Sl, c(1), c(17), 17),
        ]);
        assert_eq!(machine.read_word(10), 0b1000);
        assert_eq!(machine.read_word(11), 0b1110);
        assert_eq!(machine.read_word(12), 0b0110);
        assert_eq!(machine.read_word(13), 0b0100);
        assert_eq!(machine.read_word(14), 16);
        assert_eq!(machine.read_word(15), 1);
        assert_eq!(machine.read_signed(16), -4);
        assert_eq!(machine.read_word(17), 2);
    }

    #[test]
    fn test_conditional_moves() {
        let machine = run(&[
            op(Opcode::Mlz, c(-1), c(5), 10),
            op(Opcode::Mlz, c(0), c(5), 11),
            op(Opcode::Mlz, c(1), c(5), 12),
            op(Opcode::Mnz, c(3), c(6), 13),
            op(Opcode::Mnz, c(0), c(6), 14),
        ]);
        assert_eq!(machine.read_word(10), 5);
        assert_eq!(machine.read_word(11), 0);
        assert_eq!(machine.read_word(12), 0);
        assert_eq!(machine.read_word(13), 6);
        assert_eq!(machine.read_word(14), 0);
    }

    #[test]
    fn test_addressing_modes() {
        let mut machine = Machine::new(&[
            op(Opcode::Mlz, c(-1), Arg::cell(10), 30),
            op(Opcode::Mlz, c(-1), Arg::new(Mode::Deref, 10), 31),
            op(Opcode::Mlz, c(-1), Arg::new(Mode::DoubleDeref, 10), 32),
            Command::new(Opcode::Mlz, &c(-1), &c(4), &Arg::cell(10)),
            Command::new(Opcode::Mlz, &c(-1), &c(9), &Arg::new(Mode::Deref, 10)),
        ])
        .unwrap();
        machine.write_word(10, 20);
        machine.write_word(20, 25);
        machine.write_word(25, 7);
        assert!(machine.run(100));

        assert_eq!(machine.read_word(30), 20);
        assert_eq!(machine.read_word(31), 25);
        assert_eq!(machine.read_word(32), 7);
        assert_eq!(machine.read_word(20), 4);
        assert_eq!(machine.read_word(4), 9);
    }

    #[test]
    fn test_jump_runs_one_delay_slot() {
        let machine = run(&[
            Command::jump(c(2)),
            op(Opcode::Add, c(0), c(7), 10),
            op(Opcode::Add, c(0), c(9), 11),
            op(Opcode::Add, c(0), c(1), 12),
        ]);
        assert_eq!(machine.read_word(10), 7);
        assert_eq!(machine.read_word(11), 0);
        assert_eq!(machine.read_word(12), 1);
        assert_eq!(machine.steps(), 3);
    }

    #[test]
    fn test_program_counter_reads_current_index() {
        let machine = run(&[Command::nop(), Command::copy(&Arg::cell(0), &c(10))]);
        assert_eq!(machine.read_word(10), 1);
    }

    #[test]
    fn test_display_writes_are_recorded() {
        let machine = run(&[
            Command::copy(&c(3), &c(1)),
            op(Opcode::Add, Arg::cell(1), c(1), 1),
            Command::copy(&c(5), &c(2)),
        ]);
        assert_eq!(machine.display_writes(), &[3, 4]);
    }

    #[test]
    fn test_step_limit() {
        // Jumps back to itself forever
        let mut machine = Machine::new(&[Command::nop(), Command::jump(c(0)), Command::nop()]).unwrap();
        assert!(!machine.run(500));
        assert_eq!(machine.steps(), 500);
        assert!(!machine.is_halted());
    }

    #[test]
    fn test_step_reports_halt() {
        let mut machine = Machine::new(&[Command::nop()]).unwrap();
        assert_eq!(machine.step(), StepResult::Halted);
        assert_eq!(machine.step(), StepResult::Halted);
        assert_eq!(machine.steps(), 1);
    }

    #[test]
    fn test_unresolved_operand_is_rejected() {
        let command = Command::copy(&Arg::variable(Mode::Address, "x", 0), &c(3));
        match Machine::new(&[Command::nop(), command]) {
            Err(CompilerError::UnresolvedOperand(operand, index)) => {
                assert_eq!(operand, "A(x)");
                assert_eq!(index, 1);
            }
            _ => panic!("expected an unresolved operand error"),
        }
    }

    #[test]
    fn test_randomized_memory_keeps_registers_clear() {
        let mut machine = Machine::new(&[]).unwrap();
        machine.randomize_memory(&mut StdRng::seed_from_u64(7));
        assert_eq!(machine.read_word(0), 0);
        assert_eq!(machine.read_word(1), 0);
        assert!(machine.memory()[2..].iter().any(|word| *word != 0));
    }

    #[test]
    fn test_parse_listing() {
        let text = "0. MLZ 0 0 0;\n1. ADD A3 -2 B4;\n\n2. MNZ C5 7 0; beginWhile0\n";
        let commands = parse_listing(text).unwrap();
        assert_eq!(commands.len(), 3);
        assert!(commands[0].is_nop());
        assert_eq!(commands[1].opcode, Opcode::Add);
        assert_eq!(commands[1].arg1, Arg::cell(3));
        assert_eq!(commands[1].arg2, c(-2));
        assert_eq!(commands[1].arg3, Arg::new(Mode::Deref, 4));
        assert_eq!(commands[2].arg1, Arg::new(Mode::DoubleDeref, 5));
        assert_eq!(commands[2].to_string(), "MNZ C5 7 0;");
    }

    #[test]
    fn test_parse_listing_errors() {
        match parse_listing("0. MLZ 0 0 0;\n1. FOO 1 2 3;") {
            Err(CompilerError::ListingParseError(_, line)) => assert_eq!(line, 2),
            _ => panic!("expected a parse error"),
        }
        assert!(parse_listing("0. ADD 1 2;").is_err());
        assert!(parse_listing("0. ADD 1 X2 3;").is_err());
    }
}
