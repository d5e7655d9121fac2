// Code generation tests: declarations, moves, memory layout and diagnostics

#[cfg(test)]
mod tests {
    use crate::cogol_compiler::arg::Operand;
    use crate::cogol_compiler::codegen::CodeGen;
    use crate::cogol_compiler::lexer::Lexer;
    use crate::cogol_compiler::{CogolCompiler, CompiledProgram, CompilerConfig, DiagnosticKind};
    use std::collections::HashSet;

    fn compile(source: &str) -> CompiledProgram {
        CogolCompiler::new().compile(source)
    }

    fn compile_unoptimized(source: &str) -> CompiledProgram {
        let config = CompilerConfig {
            optimize: false,
            ..CompilerConfig::default()
        };
        CogolCompiler::with_config(config).compile(source)
    }

    fn lines(program: &CompiledProgram) -> Vec<String> {
        program.listing().lines().map(String::from).collect()
    }

    fn count(program: &CompiledProgram, kind: DiagnosticKind) -> usize {
        program.diagnostics.iter().filter(|d| d.kind == kind).count()
    }

    #[test]
    fn test_empty_program() {
        let program = compile("");
        assert!(program.diagnostics.is_empty());
        // Leading no-op, then the call stack preload
        assert_eq!(lines(&program), vec!["0. MLZ 0 0 0;", "1. MLZ -1 4 3;"]);
        assert_eq!(program.address_of("call"), Some(3));
    }

    #[test]
    fn test_declare_and_add() {
        let program = compile("my x = 5; my y; y = x + 3;");
        assert!(program.diagnostics.is_empty(), "{:?}", program.diagnostics);
        assert_eq!(
            lines(&program),
            vec![
                "0. MLZ 0 0 0;",
                "1. MLZ -1 5 3;",
                "2. MLZ -1 6 5;",
                "3. ADD A3 3 4;",
            ]
        );
        assert_eq!(program.address_of("x"), Some(3));
        assert_eq!(program.address_of("y"), Some(4));
        assert_eq!(program.address_of("call"), Some(5));
    }

    #[test]
    fn test_memory_map_text() {
        let program = compile("my x;");
        assert_eq!(
            program.memory_map_text(),
            "0: pc\n1: display\n2: scratch0\n3: x\n4: call\n"
        );
    }

    #[test]
    fn test_zero_initializer_emits_nothing() {
        let program = compile("my x = 0;");
        assert_eq!(program.commands.len(), 2);
    }

    #[test]
    fn test_array_declaration_layout() {
        let program = compile("my a[3] = {1, 0, 7};");
        assert!(program.diagnostics.is_empty(), "{:?}", program.diagnostics);
        assert_eq!(program.address_of("a"), Some(3));
        assert_eq!(program.address_of("a[0]"), Some(4));
        assert_eq!(program.address_of("a[2]"), Some(6));
        assert_eq!(
            lines(&program),
            vec![
                "0. MLZ 0 0 0;",
                "1. MLZ -1 1 4;",
                "2. MLZ -1 7 6;",
                "3. MLZ -1 4 3;",
                "4. MLZ -1 8 7;",
            ]
        );
    }

    #[test]
    fn test_oversized_initializer_extends_array() {
        let program = compile("my a[1] = {1, 2}; my b;");
        assert_eq!(program.address_of("a[1]"), Some(5));
        assert_eq!(program.address_of("b"), Some(6));
    }

    #[test]
    fn test_constant_index_reads_element_directly() {
        let program = compile("my a[4]; my x; x = a[2];");
        assert_eq!(program.address_of("x"), Some(8));
        assert_eq!(lines(&program).last().unwrap(), "3. MLZ -1 A6 8;");
    }

    #[test]
    fn test_variable_index_goes_through_scratch() {
        let program = compile_unoptimized("my a[4]; my i; my x; x = a[i];");
        assert_eq!(
            lines(&program)[2..],
            ["2. MLZ -1 11 10;", "3. ADD 4 A8 2;", "4. MLZ -1 B2 9;"]
        );
    }

    #[test]
    fn test_while_loop_layout() {
        let program = compile_unoptimized("my x; while (x < 10) { x = x + 1; }");
        assert!(program.diagnostics.is_empty(), "{:?}", program.diagnostics);
        // Entry jump to the bottom test, with the test's first instruction
        // already running in its delay slot
        assert_eq!(
            lines(&program)[2..],
            [
                "2. MLZ -1 5 0;",
                "3. SUB A3 10 2;",
                "4. ADD A3 1 3;",
                "5. SUB A3 10 2;",
                "6. MLZ A2 3 0;",
                "7. MLZ 0 0 0;",
            ]
        );
    }

    /// Scratch cells still busy after the last statement, and the pool size
    fn scratch_after(source: &str) -> (usize, usize) {
        let (tokens, lexer_diagnostics) = Lexer::new(source).tokenize();
        assert!(lexer_diagnostics.is_empty());
        let mut codegen = CodeGen::new(CompilerConfig::default());
        codegen.compile_tokens(tokens);
        assert!(codegen.diagnostics.is_empty(), "{:?}", codegen.diagnostics);
        (codegen.scratch.busy_count(), codegen.scratch.len())
    }

    #[test]
    fn test_live_operands_get_distinct_scratch_cells() {
        // Destination, left and right operand each hold their own cell
        assert_eq!(
            scratch_after("my a[4]; my i; my j; my k; a[i] = a[j] + a[k];"),
            (3, 3)
        );
        // The loop counter may not take the destination's address cell
        assert_eq!(scratch_after("my a[4]; my i; my j; a[i] *= a[j];"), (3, 3));
        // A constant multiplier still gets its own addend cell
        assert_eq!(scratch_after("my a[4]; my i; a[i] *= 3;"), (3, 3));
        // Every statement starts with an empty pool
        assert_eq!(scratch_after("my a[4]; my i; a[i] = 1; i = 2;"), (0, 1));
    }

    #[test]
    fn test_extreme_constants_only_warn() {
        let sources = [
            "my x; my y; while (x <= 2147483647) { y = 1; }",
            "my x; my y; if (x >= -2147483648) { y = 1; }",
            "my x; my y; if (-2147483648 <= x) { y = 1; }",
            "my x; my y; do { y = 1; } while (2147483647 >= x);",
            "my a[2]; my y; y = a[2147483647];",
        ];
        for source in sources {
            let program = compile(source);
            assert!(!program.has_errors(), "{}: {:?}", source, program.diagnostics);
            assert!(
                program.warnings().any(|d| d.kind == DiagnosticKind::OutOfRange),
                "{}",
                source
            );
        }
        let program = compile("my x; my y; y = 1 if x <= 2147483647;");
        assert!(!program.has_errors(), "{:?}", program.diagnostics);
    }

    #[test]
    fn test_binary_operators() {
        let program = compile_unoptimized(
            "my x; my y;
             x = x & y; x = x &! y; x = y >>> 2; x = y >> 1;
             x = y << 3; x = x | 1; x = x ^ y; x = x - y;",
        );
        assert!(program.diagnostics.is_empty(), "{:?}", program.diagnostics);
        let listing = lines(&program);
        assert_eq!(
            listing[2..],
            [
                "2. AND A3 A4 3;",
                "3. ANT A3 A4 3;",
                "4. SRL A4 2 3;",
                "5. SRA A4 1 3;",
                "6. SL A4 3 3;",
                "7. OR A3 1 3;",
                "8. XOR A3 A4 3;",
                "9. SUB A3 A4 3;",
            ]
        );
    }

    #[test]
    fn test_increments_and_compound_assignment() {
        let program = compile_unoptimized("my x; x++; x--; x += 5; x -= 2; x = -x;");
        assert!(program.diagnostics.is_empty(), "{:?}", program.diagnostics);
        assert_eq!(
            lines(&program)[2..],
            [
                "2. ADD A3 1 3;",
                "3. ADD A3 -1 3;",
                "4. ADD A3 5 3;",
                "5. SUB A3 2 3;",
                "6. SUB 0 A3 3;",
            ]
        );
    }

    #[test]
    fn test_optimizer_rewrites_constant_subtraction() {
        let program = compile("my x; x -= 2;");
        assert_eq!(lines(&program).last().unwrap(), "2. ADD A3 -2 3;");
    }

    #[test]
    fn test_pointer_shifts() {
        let program = compile("my p; my x; x = $p; $p = 4; x = \\p;");
        assert!(program.diagnostics.is_empty(), "{:?}", program.diagnostics);
        assert_eq!(
            lines(&program)[2..],
            ["2. MLZ -1 B3 4;", "3. MLZ -1 4 A3;", "4. MLZ -1 3 4;"]
        );
    }

    #[test]
    fn test_invalid_mode_is_reported() {
        let program = compile("my x; \\x = 1; x = $$$x;");
        assert_eq!(count(&program, DiagnosticKind::InvalidMode), 2);
    }

    #[test]
    fn test_conditional_move() {
        let program = compile("my x; my y; x = 5 if y < 0;");
        assert_eq!(lines(&program).last().unwrap(), "2. MLZ A4 5 3;");
    }

    #[test]
    fn test_equality_test_grows_scratch_pool() {
        let program = compile_unoptimized("my x; my y; x = 1 if y == 3;");
        assert_eq!(program.address_of("scratch1"), Some(5));
        assert_eq!(program.address_of("call"), Some(6));
        assert_eq!(
            lines(&program)[2..],
            [
                "2. SUB A4 3 2;",
                "3. ADD A2 -1 5;",
                "4. ANT A5 A2 5;",
                "5. MLZ A5 1 3;",
            ]
        );
    }

    #[test]
    fn test_constant_condition_is_a_warning() {
        let program = compile("my x; x = 1 if 2 < 3; x = 2 if 3 < 2;");
        assert_eq!(count(&program, DiagnosticKind::ConstantCondition), 2);
        assert!(!program.has_errors());
        // The always-true move survives, the never-true one is dropped
        assert_eq!(lines(&program).last().unwrap(), "2. MLZ -1 1 3;");
    }

    #[test]
    fn test_redeclaration() {
        let program = compile("my x; my x = 2;");
        assert_eq!(count(&program, DiagnosticKind::Redeclaration), 1);
        assert!(program.has_errors());
        assert_eq!(program.address_of("call"), Some(4));
    }

    #[test]
    fn test_undeclared_variable() {
        let program = compile("my x; y = 1; x = 2;");
        assert_eq!(count(&program, DiagnosticKind::UndeclaredVariable), 1);
        // Compilation continues with the next statement
        assert_eq!(lines(&program).last().unwrap(), "2. MLZ -1 2 3;");
    }

    #[test]
    fn test_reserved_names() {
        let program = compile("my pc; my scratch4; my x; pc = 1; x = call;");
        assert_eq!(count(&program, DiagnosticKind::ReservedName), 4);
        assert_eq!(program.address_of("x"), Some(3));
    }

    #[test]
    fn test_display_is_writable() {
        let program = compile("display = 7;");
        assert!(program.diagnostics.is_empty(), "{:?}", program.diagnostics);
        assert_eq!(lines(&program).last().unwrap(), "2. MLZ -1 7 1;");
    }

    #[test]
    fn test_assigning_to_a_number_is_rejected() {
        let program = compile("5 = 3;");
        assert_eq!(count(&program, DiagnosticKind::UnexpectedToken), 1);
    }

    #[test]
    fn test_unsupported_operator() {
        let program = compile("my x; x = x ! 2; x = x < 2;");
        assert_eq!(count(&program, DiagnosticKind::UnsupportedOperator), 2);
    }

    #[test]
    fn test_out_of_range_constant_is_a_warning() {
        let program = compile("my x; x = 70000;");
        assert_eq!(count(&program, DiagnosticKind::OutOfRange), 1);
        assert!(!program.has_errors());
    }

    #[test]
    fn test_array_used_as_value_is_a_warning() {
        let program = compile("my a[2]; my p; p = a;");
        assert_eq!(count(&program, DiagnosticKind::TypeMismatch), 1);
        assert!(!program.has_errors());
    }

    #[test]
    fn test_non_constant_initializer() {
        let program = compile("my x; my y = x; my z;");
        assert_eq!(count(&program, DiagnosticKind::NonConstantInitializer), 1);
        assert_eq!(program.address_of("y"), Some(4));
        assert_eq!(program.address_of("z"), Some(5));
    }

    #[test]
    fn test_unclosed_block() {
        let program = compile("my x; while (x < 3) { x++;");
        assert_eq!(count(&program, DiagnosticKind::UnexpectedToken), 1);
        let program = compile("my x; x++; }");
        assert_eq!(count(&program, DiagnosticKind::UnexpectedToken), 1);
    }

    #[test]
    fn test_annotated_listing_shows_labels() {
        let config = CompilerConfig {
            annotate_listing: true,
            ..CompilerConfig::default()
        };
        let program =
            CogolCompiler::with_config(config).compile("my x; while (x < 3) { x++; }");
        let listing = program.listing();
        assert!(listing.contains("preloadCallStack"));
        assert!(listing.contains("beginWhile0"));
        assert!(listing.contains("endWhile0"));
        assert!(!compile("my x; while (x < 3) { x++; }")
            .listing()
            .contains("beginWhile0"));
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let source = "my a[3] = {1, 2, 3}; my i; my s;
            sub f(n) { s += n; }
            while (i < 3) { call f(a[i]); i++; }";
        let first = compile(source);
        let second = compile(source);
        assert_eq!(first.listing(), second.listing());
        assert_eq!(first.memory_map_text(), second.memory_map_text());
    }

    #[test]
    fn test_every_address_holds_one_name() {
        let program = compile(
            "my a[2]; my b = 3; my c[1] = {1, 2, 3};
             sub f(n, m[2]) { n = m[1]; }
             call f(b);",
        );
        let mut seen = HashSet::new();
        for names in &program.memory_map {
            assert_eq!(names.len(), 1, "{:?}", names);
            assert!(seen.insert(names[0].clone()));
        }
    }

    #[test]
    fn test_output_is_fully_resolved() {
        let program = compile(
            "my x; my y[2];
             sub f(a, b = 2) { a += b; if (a > 3) { return; } }
             if (x == 1) { call x = f(x).a; } else { y[x] = 2; }
             do { x++; } while (x < 5);",
        );
        assert!(!program.has_errors(), "{:?}", program.diagnostics);
        for command in &program.commands {
            for arg in command.args() {
                assert!(matches!(arg.operand, Operand::Resolved(_)), "{}", command);
            }
        }
    }
}
