// qftasm-run - runs a QFTASM listing on the reference machine

use std::env;
use std::fs;
use std::process;

use cogol::qftasm::{parse_listing, Machine};
use rand::rngs::StdRng;
use rand::SeedableRng;

const DEFAULT_STEPS: usize = 1_000_000;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut input_file = "";
    let mut max_steps = DEFAULT_STEPS;
    let mut seed: Option<u64> = None;
    let mut dump: Vec<usize> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--steps" => {
                max_steps = parse_number(&args, i, "--steps");
                i += 2;
            }
            "--seed" => {
                seed = Some(parse_number(&args, i, "--seed"));
                i += 2;
            }
            "--dump" => {
                dump.push(parse_number(&args, i, "--dump"));
                i += 2;
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
                input_file = &args[i];
                i += 1;
            }
        }
    }

    if input_file.is_empty() {
        print_usage(&args[0]);
        process::exit(1);
    }

    let text = match fs::read_to_string(input_file) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("Error reading '{}': {}", input_file, err);
            process::exit(1);
        }
    };

    let mut machine = match parse_listing(&text).and_then(|commands| Machine::new(&commands)) {
        Ok(machine) => machine,
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(1);
        }
    };
    if let Some(seed) = seed {
        machine.randomize_memory(&mut StdRng::seed_from_u64(seed));
    }

    let halted = machine.run(max_steps);
    for value in machine.display_writes() {
        println!("display: {}", value);
    }
    for addr in dump {
        println!("[{}] = {}", addr, machine.read_signed(addr));
    }
    if halted {
        println!("halted after {} steps", machine.steps());
    } else {
        println!("step limit of {} reached", max_steps);
        process::exit(2);
    }
}

fn parse_number<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    match args.get(i + 1).map(|v| v.parse::<T>()) {
        Some(Ok(value)) => value,
        _ => {
            eprintln!("Error: {} requires a number", flag);
            process::exit(1);
        }
    }
}

fn print_usage(program_name: &str) {
    println!("Usage: {} [options] <program.qftasm>", program_name);
    println!();
    println!("Options:");
    println!("  --steps <n>     Step limit (default: {})", DEFAULT_STEPS);
    println!("  --seed <n>      Start from random memory with this seed");
    println!("  --dump <addr>   Print a memory cell after the run (repeatable)");
    println!("  -h, --help      Show this help message");
}
