use clap::Parser;
use maji_ndogo_processor::cli::{self, Args};
use std::process;

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    let Some(command) = args.command.clone() else {
        show_help_and_commands();
        process::exit(0);
    };

    // Stages run one after another, so a single-threaded runtime is enough
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Failed to create async runtime: {}", e);
            process::exit(1);
        });

    match runtime.block_on(cli::run(args, command)) {
        Ok(_) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

/// Show help information and available commands when no subcommand is provided
fn show_help_and_commands() {
    println!("Maji Ndogo Processor - Farm Survey and Weather Station Pipelines");
    println!("================================================================");
    println!();
    println!("USAGE:");
    println!("    maji-ndogo-processor [OPTIONS] <COMMAND>");
    println!();
    println!("COMMANDS:");
    println!("    field       Ingest and clean the field survey, then map weather stations");
    println!("    weather     Extract station measurements and print per-station means");
    println!("    help        Show this help message or help for specific commands");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH>     Pipeline configuration file [default: pipeline.toml]");
    println!("        --log-level <LVL>   DEBUG, INFO or NONE");
    println!("    -q, --quiet             Compact log output");
    println!();
    println!("EXAMPLES:");
    println!("    maji-ndogo-processor field --config pipeline.toml");
    println!("    maji-ndogo-processor field --database sqlite://Maji_Ndogo_farm_survey_small.db");
    println!("    maji-ndogo-processor weather --log-level debug");
}
