//! Imops CLI - special-op matching for n-dimensional images
//!
//! This is a demonstration CLI for the imops library.

use anyhow::{bail, Context, Result};
use imops::prelude::*;
use std::time::Instant;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage(&args[0]);
        return;
    }

    if let Err(e) = dispatch(&args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn dispatch(args: &[String]) -> Result<()> {
    match args[1].as_str() {
        "list" => list_ops(&load_env(&args[2..])?),
        "info" => {
            let Some(name) = args.get(2) else {
                bail!("please specify an op name or id");
            };
            let json = args[3..].iter().any(|a| a == "--json");
            op_info(&load_env(&args[3..])?, name, json)
        }
        "run" => {
            let Some(name) = args.get(2) else {
                bail!("please specify an op name");
            };
            run_op(&load_env(&[])?, name, &args[3..])
        }
        "demo" => demo(&load_env(&args[2..])?),
        "help" | "--help" | "-h" => {
            print_usage(&args[0]);
            Ok(())
        }
        other => {
            print_usage(&args[0]);
            bail!("unknown command: {}", other)
        }
    }
}

fn print_usage(program: &str) {
    println!("imops v{}", imops::VERSION);
    println!();
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  list                   List registered ops");
    println!("  info <op> [--json]     Show an op's declared signature");
    println!("  run <op> <values...>   Call an op with dynamic values");
    println!("  demo                   Map a subtract op over a small image");
    println!("  help                   Show this help message");
    println!();
    println!("Options:");
    println!("  --config <file>        Load settings from a TOML file");
}

/// Build the builtin environment, honouring `--config <file>`.
fn load_env(args: &[String]) -> Result<OpEnvironment> {
    let env = OpEnvironment::with_builtins().context("failed to register builtin ops")?;
    match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = args
                .get(i + 1)
                .context("--config needs a file path")?;
            let config = OpsConfig::from_file(path)
                .with_context(|| format!("failed to load config from {}", path))?;
            Ok(env.with_config(config))
        }
        None => Ok(env),
    }
}

fn list_ops(env: &OpEnvironment) -> Result<()> {
    let registry = env.registry();
    println!("Registered ops ({} implementations):", registry.len());
    println!();

    for name in registry.names() {
        println!("  {}", name);
        for (id, entry) in registry.iter() {
            if entry.info.name != name {
                continue;
            }
            println!(
                "      {} [priority {}] - {}",
                id, entry.info.priority, entry.info.description
            );
        }
    }
    Ok(())
}

fn op_info(env: &OpEnvironment, name: &str, json: bool) -> Result<()> {
    let infos: Vec<&OpInfo> = env
        .registry()
        .iter()
        .map(|(_, entry)| entry.info.as_ref())
        .filter(|info| info.answers_to(name))
        .collect();
    if infos.is_empty() {
        bail!("no op answers to '{}'; use 'list' to see registered ops", name);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    for info in infos {
        println!("Op: {}", info.id);
        println!("Name: {}", info.name);
        if !info.aliases.is_empty() {
            println!("Aliases: {}", info.aliases.join(", "));
        }
        println!("Priority: {}", info.priority);
        println!("Description: {}", info.description);

        let shapes: Vec<String> = info.special_types.iter().map(|t| t.to_string()).collect();
        println!("Shapes: {}", shapes.join(", "));

        println!("Inputs:");
        for port in &info.inputs {
            match &port.default {
                Some(default) => println!("  • {} [{}] = {}", port.name, port.data_type, default),
                None => println!("  • {} [{}]", port.name, port.data_type),
            }
        }
        if let Some(output) = &info.output {
            println!("Output: {}", output);
        }
        println!();
    }
    Ok(())
}

fn run_op(env: &OpEnvironment, name: &str, raw: &[String]) -> Result<()> {
    let values = raw
        .iter()
        .map(|s| {
            s.parse::<f64>()
                .map(Value::Double)
                .with_context(|| format!("'{}' is not a number", s))
        })
        .collect::<Result<Vec<_>>>()?;

    let out = env.run(name, values)?;
    println!("{}", out);
    Ok(())
}

fn demo(env: &OpEnvironment) -> Result<()> {
    let input = ArrayImg::from_fn(Dims::new([10, 10]), |c| (c[0] + 10 * c[1]) as u8);
    let sub = env
        .op("math.subtract")
        .arg(5.0)
        .unary_computer::<u8, u8>()?;
    println!("Resolved math.subtract for u8 -> {}", sub.id());

    let mappers = [
        ("sequential", Mapper::sequential()),
        ("configured", env.mapper()),
    ];
    let mut results = Vec::with_capacity(mappers.len());
    for (label, mapper) in &mappers {
        let mut output = input.create_like();
        let start = Instant::now();
        mapper.map_unary(&sub, &input, &mut output)?;
        println!(
            "  {:<10} {:?} in {:?} ({} chunks)",
            label,
            mapper.execution(),
            start.elapsed(),
            mapper.ranges(input.len()).len()
        );
        results.push(output);
    }

    if results.windows(2).any(|w| w[0] != w[1]) {
        bail!("mappers disagree");
    }
    println!();
    println!("First row after subtracting 5:");
    println!("  {:?}", &results[0].as_slice()[..10]);
    Ok(())
}
