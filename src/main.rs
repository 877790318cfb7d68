use clap::{Arg, Command};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use plant_mapper::run_pipeline;

fn main() {
    let matches = Command::new("Plant Mapper")
        .version("1.0")
        .about("Cleans power plant GeoJSON data, counts plants per state, and renders a density chart and an interactive map")
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .num_args(1)
                .required(true)
                .help("GeoJSON file of power plant locations"),
        )
        .arg(
            Arg::new("reports")
                .short('r')
                .long("reports")
                .num_args(1)
                .default_value("reports")
                .help("Directory the chart and map are written to"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::SetTrue)
                .help("Enable debug-level progress output"),
        )
        .get_matches();

    let level = if matches.get_flag("verbose") {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let input = PathBuf::from(matches.get_one::<String>("input").unwrap());
    let reports = PathBuf::from(matches.get_one::<String>("reports").unwrap());

    if !input.exists() {
        eprintln!("Error: File not found: {}", input.display());
        std::process::exit(1);
    }

    match run_pipeline(&input, &reports) {
        Ok(_) => println!("Processing completed successfully"),
        Err(e) => {
            eprintln!("Error processing {}: {}", input.display(), e);
            std::process::exit(1);
        }
    }
}
