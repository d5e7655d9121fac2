// Peephole optimizer tests

#[cfg(test)]
mod tests {
    use crate::cogol_compiler::arg::{Arg, Label, Mode};
    use crate::cogol_compiler::command::{Command, Opcode};
    use crate::cogol_compiler::peephole::{optimize, simplify, thread_jump};
    use crate::cogol_compiler::{CogolCompiler, CompilerConfig};
    use crate::qftasm::Machine;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeSet;

    fn cmd(opcode: Opcode, a: Arg, b: Arg, c: Arg) -> Command {
        Command::new(opcode, &a, &b, &c)
    }

    fn c(value: i32) -> Arg {
        Arg::constant(value)
    }

    fn rendered(commands: &[Command]) -> Vec<String> {
        commands.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_constant_subtraction_becomes_addition() {
        let sub = cmd(Opcode::Sub, Arg::cell(3), c(5), c(3));
        assert_eq!(simplify(&sub).to_string(), "ADD A3 -5 3;");
        // Subtracting from a constant is left alone
        let sub = cmd(Opcode::Sub, c(5), Arg::cell(3), c(3));
        assert_eq!(simplify(&sub).to_string(), "SUB 5 A3 3;");
    }

    #[test]
    fn test_commutative_operands_are_ordered() {
        let add = cmd(Opcode::Add, c(4), Arg::cell(8), c(2));
        assert_eq!(simplify(&add).to_string(), "ADD A8 4 2;");
        let and = cmd(Opcode::And, Arg::cell(3), Arg::cell(4), c(3));
        assert_eq!(simplify(&and).to_string(), "AND A4 A3 3;");
        let xor = cmd(Opcode::Xor, Arg::cell(3), Arg::new(Mode::Deref, 2), c(3));
        assert_eq!(simplify(&xor).to_string(), "XOR B2 A3 3;");
        // Order matters for ANT and shifts
        let ant = cmd(Opcode::Ant, Arg::cell(3), Arg::cell(4), c(3));
        assert_eq!(simplify(&ant).to_string(), "ANT A3 A4 3;");
    }

    #[test]
    fn test_constant_tests_are_decided() {
        let mlz = cmd(Opcode::Mlz, c(-7), c(5), c(3));
        assert_eq!(simplify(&mlz).to_string(), "MLZ -1 5 3;");
        let mlz = cmd(Opcode::Mlz, c(4), c(5), c(3));
        assert!(simplify(&mlz).is_nop());
        let mnz = cmd(Opcode::Mnz, c(2), Arg::cell(5), c(3));
        assert_eq!(simplify(&mnz).to_string(), "MLZ -1 A5 3;");
        let mnz = cmd(Opcode::Mnz, c(0), c(5), c(3));
        assert!(simplify(&mnz).is_nop());
        let mnz = cmd(Opcode::Mnz, Arg::cell(2), c(5), c(3));
        assert_eq!(simplify(&mnz).to_string(), "MNZ A2 5 3;");
    }

    #[test]
    fn test_simplify_keeps_tags() {
        let sub = cmd(Opcode::Sub, Arg::cell(3), c(1), c(3)).tagged(Label::MultiplyEnd(0));
        assert_eq!(simplify(&sub).tags, vec![Label::MultiplyEnd(0)]);
    }

    #[test]
    fn test_thread_jump() {
        let program = vec![
            Command::jump(c(3)),
            Command::nop(),
            Command::nop(),
            cmd(Opcode::Add, Arg::cell(5), c(1), c(5)),
            Command::nop(),
        ];
        let (jump, slot) = thread_jump(&program[0], &program[1], &program).unwrap();
        assert_eq!(jump.to_string(), "MLZ -1 4 0;");
        assert_eq!(slot.to_string(), "ADD A5 1 5;");

        // Only a no-op slot can be replaced
        let busy_slot = cmd(Opcode::Add, Arg::cell(6), c(1), c(6));
        assert!(thread_jump(&program[0], &busy_slot, &program).is_none());
        // Jumps past the end stay as they are
        assert!(thread_jump(&Command::jump(c(9)), &program[1], &program).is_none());
    }

    #[test]
    fn test_landing_site_slot_is_kept() {
        let program = vec![
            Command::jump(c(3)),
            Command::nop(),
            Command::nop(),
            cmd(Opcode::Add, Arg::cell(5), c(1), c(5)),
        ];
        let optimized = optimize(&program, &BTreeSet::from([1]));
        assert_eq!(rendered(&optimized), rendered(&program));

        let optimized = optimize(&program, &BTreeSet::new());
        assert_eq!(
            rendered(&optimized),
            vec!["MLZ -1 4 0;", "ADD A5 1 5;", "MLZ 0 0 0;", "ADD A5 1 5;"]
        );
    }

    #[test]
    fn test_jump_in_delay_slot_is_not_threaded() {
        let program = vec![
            Command::jump(c(4)),
            Command::jump(c(3)),
            Command::nop(),
            cmd(Opcode::Add, Arg::cell(5), c(1), c(5)),
            cmd(Opcode::Add, Arg::cell(6), c(1), c(6)),
        ];
        let optimized = optimize(&program, &BTreeSet::new());
        assert_eq!(rendered(&optimized), rendered(&program));
    }

    #[test]
    fn test_jump_to_jump_is_threaded() {
        let program = vec![
            Command::jump(c(3)),
            Command::nop(),
            cmd(Opcode::Add, c(0), c(7), c(10)),
            Command::jump(c(6)),
            Command::nop(),
            cmd(Opcode::Add, c(0), c(9), c(11)),
            cmd(Opcode::Add, c(0), c(1), c(12)),
        ];
        let optimized = optimize(&program, &BTreeSet::new());
        // The second jump now runs in the first one's delay slot
        assert_eq!(optimized[0].jump_target(), Some(4));
        assert_eq!(optimized[1].jump_target(), Some(6));
        assert!(optimized[4].is_nop());

        let mut results = Vec::new();
        for commands in [&program, &optimized] {
            let mut laid_out = vec![Command::nop()];
            laid_out.extend(commands.iter().cloned());
            let mut machine = Machine::new(&laid_out).unwrap();
            assert!(machine.run(100));
            results.push((machine.memory()[10..13].to_vec(), machine.steps()));
        }
        assert_eq!(results[0].0, vec![0, 0, 1]);
        assert_eq!(results[1].0, results[0].0);
        assert!(results[1].1 < results[0].1);
    }

    #[test]
    fn test_optimized_programs_agree_on_random_memory() {
        // A zero initializer emits no store, so every variable is assigned
        // before use and only scratch and stack cells start out random
        let sources = [
            "my i; my s; i = 0; s = 0; while (i < 20) { s += i; i++; }",
            "my a = 7; my b = -3; my c; c = a * b; if (c < 0) { c = -c; } else { c = 0; }",
            "my x = 4; my y; y = 0; do { y += x; x--; } while (x != 0);",
            "my t[4] = {3, 1, 4, 1}; my i; my m; i = 0; m = 0;
             while (i < 4) { m = t[i] if t[i] > m; i++; }",
            "my r; r = 0;
             sub f(n, k = 2) { r += n; r += k; if (n > 0) { n--; call f(n, 1); } }
             call f(3);",
        ];
        for source in sources {
            let compile = |optimize| {
                let config = CompilerConfig {
                    optimize,
                    ..CompilerConfig::default()
                };
                CogolCompiler::with_config(config).compile(source)
            };
            let plain = compile(false);
            let optimized = compile(true);
            assert!(!plain.has_errors(), "{:?}", plain.diagnostics);
            assert_eq!(plain.commands.len(), optimized.commands.len());

            for seed in 0..4 {
                let mut machines = Vec::new();
                for program in [&plain, &optimized] {
                    let mut machine = Machine::new(&program.commands).unwrap();
                    machine.randomize_memory(&mut StdRng::seed_from_u64(seed));
                    assert!(machine.run(1_000_000), "no halt: {}", source);
                    machines.push(machine);
                }
                // The program counter cell may differ, everything else may not
                assert_eq!(machines[0].memory()[1..], machines[1].memory()[1..], "{}", source);
                assert_eq!(machines[0].display_writes(), machines[1].display_writes());
            }
        }
    }
}
