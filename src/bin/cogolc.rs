// cogolc - Cogol to QFTASM compiler
// Compiles a Cogol source file to a QFTASM listing plus a memory map

use std::env;
use std::fs;
use std::path::Path;
use std::process;

use cogol::cogol_compiler::{CogolCompiler, CompilerConfig};
use cogol::qftasm::Machine;

fn main() {
    // Initialize logging
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        process::exit(1);
    }

    let mut input_file = "";
    let mut output_file = String::new();
    let mut map_file = String::new();
    let mut config_file = String::new();
    let mut no_optimize = false;
    let mut annotate = false;
    let mut run_steps: Option<usize> = None;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-o" | "--output" => {
                output_file = option_value(&args, i, "-o requires a filename");
                i += 2;
            }
            "-m" | "--map" => {
                map_file = option_value(&args, i, "-m requires a filename");
                i += 2;
            }
            "--config" => {
                config_file = option_value(&args, i, "--config requires a filename");
                i += 2;
            }
            "--run" => {
                let steps = option_value(&args, i, "--run requires a step limit");
                run_steps = match steps.parse::<usize>() {
                    Ok(steps) => Some(steps),
                    Err(_) => {
                        eprintln!("Error: invalid step limit '{}'", steps);
                        process::exit(1);
                    }
                };
                i += 2;
            }
            "--no-optimize" => {
                no_optimize = true;
                i += 1;
            }
            "--annotate" => {
                annotate = true;
                i += 1;
            }
            "-v" | "--verbose" => {
                verbose = true;
                i += 1;
            }
            "-h" | "--help" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            arg if arg.starts_with('-') => {
                eprintln!("Error: Unknown option '{}'", arg);
                print_usage(&args[0]);
                process::exit(1);
            }
            _ => {
                if input_file.is_empty() {
                    input_file = &args[i];
                } else {
                    eprintln!("Error: Multiple input files specified");
                    process::exit(1);
                }
                i += 1;
            }
        }
    }

    if input_file.is_empty() {
        eprintln!("Error: No input file specified");
        print_usage(&args[0]);
        process::exit(1);
    }

    let mut config = if config_file.is_empty() {
        CompilerConfig::default()
    } else {
        match CompilerConfig::load(Path::new(&config_file)) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Error: {}", err);
                process::exit(1);
            }
        }
    };
    if no_optimize {
        config.optimize = false;
    }
    if annotate {
        config.annotate_listing = true;
    }

    let base_name = match Path::new(input_file).file_stem() {
        Some(stem) => stem.to_string_lossy().to_string(),
        None => {
            eprintln!("Error: Invalid input filename");
            process::exit(1);
        }
    };
    if output_file.is_empty() {
        output_file = format!("{}.qftasm", base_name);
    }
    if map_file.is_empty() {
        map_file = format!("{}.map", base_name);
    }

    if verbose {
        println!("Compiling {} -> {} (map: {})", input_file, output_file, map_file);
    }

    // Read source file
    let source = match fs::read_to_string(input_file) {
        Ok(content) => content,
        Err(err) => {
            eprintln!("Error reading '{}': {}", input_file, err);
            process::exit(1);
        }
    };

    let program = CogolCompiler::with_config(config).compile(&source);
    for diagnostic in &program.diagnostics {
        eprintln!("{}", diagnostic);
    }

    if let Err(err) = fs::write(&output_file, program.listing()) {
        eprintln!("Error writing '{}': {}", output_file, err);
        process::exit(1);
    }
    if let Err(err) = fs::write(&map_file, program.memory_map_text()) {
        eprintln!("Error writing '{}': {}", map_file, err);
        process::exit(1);
    }

    if verbose {
        println!(
            "Wrote {} instructions to {} ({} memory cells)",
            program.commands.len(),
            output_file,
            program.memory_map.len()
        );
    }

    if let Some(steps) = run_steps {
        match Machine::new(&program.commands) {
            Ok(mut machine) => {
                let halted = machine.run(steps);
                for value in machine.display_writes() {
                    println!("display: {}", value);
                }
                if !halted {
                    println!("(stopped after {} steps)", machine.steps());
                }
            }
            Err(err) => {
                eprintln!("Error: {}", err);
                process::exit(1);
            }
        }
    }

    if program.has_errors() {
        process::exit(1);
    }
}

fn option_value(args: &[String], i: usize, message: &str) -> String {
    if i + 1 >= args.len() {
        eprintln!("Error: {}", message);
        process::exit(1);
    }
    args[i + 1].clone()
}

fn print_usage(program_name: &str) {
    println!("Usage: {} [options] <input.cogol>", program_name);
    println!();
    println!("Options:");
    println!("  -o, --output <file>    Listing filename (default: input.qftasm)");
    println!("  -m, --map <file>       Memory map filename (default: input.map)");
    println!("  --config <file>        TOML compiler configuration");
    println!("  --no-optimize          Skip the peephole pass");
    println!("  --annotate             Print instruction labels in the listing");
    println!("  --run <steps>          Run the result in the simulator, printing display writes");
    println!("  -v, --verbose          Verbose output");
    println!("  -h, --help             Show this help message");
    println!();
    println!("Examples:");
    println!("  {} tetris.cogol                 # Writes tetris.qftasm and tetris.map", program_name);
    println!("  {} --run 100000 demo.cogol      # Compile, then simulate", program_name);
}
