use std::path::Path;

use kitchen_brigade::sim::{self, BenchParams};
use kitchen_brigade::{KitchenError, StopMode, logging};
use log::LevelFilter;

fn parse_list<T: std::str::FromStr>(arg: &str) -> Option<Vec<T>> {
    if arg == "-" {
        return None;
    }
    let mut values = Vec::new();
    for part in arg.split(',') {
        if part.trim().is_empty() {
            return None;
        }
        let value = part.trim().parse::<T>().ok()?;
        values.push(value);
    }
    Some(values)
}

fn print_usage(program: &str) {
    println!("Kitchen Brigade CLI");
    println!("Usage:");
    println!("  {program} (run demo)");
    println!("  {program} bench [chefs] [preps] [orders] [cut_ms] [cook_ms] [validate]");
    println!("  {program} stress [chef_sets] [prep_sets] [order_sets] [validate]");
    println!("  {program} run <config.toml> [halt]");
    println!("  {program} --help");
    println!();
    println!("Sets are comma-separated lists (e.g., 1,2,4). Use \"-\" to keep the default for a set.");
    println!("Defaults:");
    println!("  bench  chefs=4 preps=0 orders=20 cut_ms=10 cook_ms=30");
    println!("  stress chefs=1,2,4,8 preps=0,2 orders=10,25");
    println!("Flags:");
    println!("  validate  report exclusivity and order accounting violations");
    println!("  halt      stop waiting workers at session end instead of draining");
    println!("Set RUST_LOG (e.g. RUST_LOG=info) for per-thread logs on stderr.");
}

fn exit_with_usage(program: &str, message: &str) -> ! {
    eprintln!("{message}");
    print_usage(program);
    std::process::exit(2);
}

fn parse_bench(program: &str, args: impl Iterator<Item = String>) -> (BenchParams, bool) {
    let mut params = BenchParams::default();
    let mut validate = false;
    let mut position = 0;
    for arg in args {
        if arg == "validate" {
            validate = true;
            continue;
        }
        let parsed = arg.parse::<u64>().ok();
        match (position, parsed) {
            (0, Some(v)) => params.chefs = v as usize,
            (1, Some(v)) => params.preps = v as usize,
            (2, Some(v)) => params.orders = v,
            (3, Some(v)) => params.cut_ms = v,
            (4, Some(v)) => params.cook_ms = v,
            _ => exit_with_usage(program, &format!("bench: unexpected argument: {arg}")),
        }
        position += 1;
    }
    (params, validate)
}

fn run_stress(program: &str, args: impl Iterator<Item = String>) -> Result<(), KitchenError> {
    let mut chef_sets: Option<Vec<usize>> = None;
    let mut prep_sets: Option<Vec<usize>> = None;
    let mut order_sets: Option<Vec<u64>> = None;
    let mut validate = false;
    let mut position = 0;
    for arg in args {
        if arg == "validate" {
            validate = true;
            continue;
        }
        let valid = match position {
            0 => {
                chef_sets = parse_list(&arg);
                arg == "-" || chef_sets.is_some()
            }
            1 => {
                prep_sets = parse_list(&arg);
                arg == "-" || prep_sets.is_some()
            }
            2 => {
                order_sets = parse_list(&arg);
                arg == "-" || order_sets.is_some()
            }
            _ => exit_with_usage(program, &format!("stress: unexpected argument: {arg}")),
        };
        if !valid {
            exit_with_usage(program, &format!("stress: invalid set value: {arg}"));
        }
        position += 1;
    }
    sim::run_stress(chef_sets, prep_sets, order_sets, validate)
}

fn main() {
    logging::init(LevelFilter::Warn);
    let program = std::env::args()
        .next()
        .unwrap_or_else(|| "kitchen_brigade".to_string());
    let mut args = std::env::args().skip(1);
    let result = match args.next().as_deref() {
        Some("bench") => {
            let (params, validate) = parse_bench(&program, args);
            sim::run_benchmark(params, validate)
        }
        Some("stress") => run_stress(&program, args),
        Some("run") => {
            let Some(path) = args.next() else {
                exit_with_usage(&program, "run: missing configuration file");
            };
            let mode = match args.next().as_deref() {
                None => StopMode::Drain,
                Some("halt") => StopMode::Halt,
                Some(other) => exit_with_usage(&program, &format!("run: unexpected argument: {other}")),
            };
            sim::run_config(Path::new(&path), mode)
        }
        Some("--help") | Some("-h") | Some("help") => {
            print_usage(&program);
            Ok(())
        }
        Some(other) => exit_with_usage(&program, &format!("unknown command: {other}")),
        None => sim::run_demo(),
    };
    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
