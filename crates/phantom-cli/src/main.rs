use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use phantom_repair::{
    init_tracing, json_schema, ArchiveModel, ClassStub, RepairConfig, RepairError, RepairReport,
    RepairSession,
};
use phantom_solver::Constraint;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "phantom", version, about = "Complete class hierarchies with phantom types")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Solve the phantom hierarchy of an archive and describe the missing classes
    Repair(RepairArgs),
    /// Print the constraints extracted from an archive without solving them
    Constraints(ConstraintsArgs),
    /// Print the JSON schema of the configuration file
    ConfigSchema,
}

#[derive(Args)]
struct RepairArgs {
    /// Archive model (JSON)
    archive: PathBuf,
    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
    /// Write the JSON report to this file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct ConstraintsArgs {
    /// Archive model (JSON)
    archive: PathBuf,
    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Repair(args) => {
            let mut session = open_session(&args.archive, args.config.as_deref())?;
            let report = match session.run() {
                Ok(report) => report,
                Err(err) => return unsatisfiable(err),
            };
            if let Some(output) = &args.output {
                let json = serde_json::to_string_pretty(&report)?;
                std::fs::write(output, json)
                    .with_context(|| format!("failed to write {}", output.display()))?;
                tracing::info!(path = %output.display(), "wrote repair report");
            } else if args.json {
                print_json(&report)?;
            } else {
                print_report(&report);
            }
            Ok(0)
        }
        Command::Constraints(args) => {
            let mut session = open_session(&args.archive, args.config.as_deref())?;
            if let Err(err) = session.extract() {
                return unsatisfiable(err);
            }
            let constraints: Vec<&Constraint> = session.constraints().iter().collect();
            if args.json {
                print_json(&constraints)?;
            } else {
                for constraint in constraints {
                    println!("{constraint}");
                }
            }
            Ok(0)
        }
        Command::ConfigSchema => {
            print_json(&json_schema())?;
            Ok(0)
        }
    }
}

fn open_session(archive: &Path, config: Option<&Path>) -> Result<RepairSession> {
    let config = match config {
        Some(path) => RepairConfig::load_from_path(path)?,
        None => RepairConfig::default(),
    };
    init_tracing(&config.logging);
    let archive = ArchiveModel::from_path(archive)?;
    Ok(RepairSession::new(config, archive)?)
}

/// A contradictory archive is a result, not a failure of the tool.
fn unsatisfiable(err: RepairError) -> Result<i32> {
    if err.is_unsatisfiable() {
        println!("unsatisfiable: {err}");
        Ok(1)
    } else {
        Err(err.into())
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{out}");
    Ok(())
}

fn print_report(report: &RepairReport) {
    for stub in &report.phantoms {
        print_stub(stub);
    }
    println!(
        "summary: {} phantom types, {} constraints, {} placement attempts",
        report.phantoms.len(),
        report.constraints.len(),
        report.solution.attempts
    );
}

fn print_stub(stub: &ClassStub) {
    let kind = if stub.is_interface() { "interface" } else { "class" };
    print!("{kind} {} [{:#06x}]", stub.internal_name, stub.access_flags);
    if !stub.is_interface() {
        if let Some(superclass) = &stub.super_class {
            print!(" extends {superclass}");
        }
    }
    if !stub.interfaces.is_empty() {
        let names: Vec<String> = stub.interfaces.iter().map(ToString::to_string).collect();
        print!(" implements {}", names.join(", "));
    }
    println!();
    for field in &stub.fields {
        println!(
            "  field {} {} [{:#06x}]",
            field.name,
            field.descriptor.descriptor(),
            field.access_flags
        );
    }
    for method in &stub.methods {
        println!(
            "  method {}{} [{:#06x}]",
            method.name, method.descriptor, method.access_flags
        );
    }
    for inner in &stub.inner_classes {
        println!("  inner {} in {}", inner.inner, inner.outer);
    }
}
