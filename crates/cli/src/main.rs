//! NeuPIMS-Sim CLI (spec §6): loads the five JSON config files plus the DRAM
//! timing `.ini`, parses the client dataset, and drives [`Simulator`] to
//! completion.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use neupims_core::config::client::parse_dataset;
use neupims_core::config::Config;
use neupims_core::sim::Simulator;

#[derive(Parser, Debug)]
#[command(
    name = "neupims-sim",
    author,
    version,
    about = "Cycle-accurate simulator for systolic-array NPU + PIM-HBM LLM inference accelerators"
)]
struct Cli {
    /// Hardware config JSON (core array, SRAM, vector unit, interconnect).
    #[arg(long)]
    config: PathBuf,

    /// Memory config JSON (DRAM/PIM protocol and geometry).
    #[arg(long = "mem_config")]
    mem_config: PathBuf,

    /// Client dataset config JSON (arrival cadence, output length).
    #[arg(long = "cli_config")]
    cli_config: PathBuf,

    /// Model config JSON (transformer shape).
    #[arg(long = "model_config")]
    model_config: PathBuf,

    /// System config JSON (run mode, batching limits).
    #[arg(long = "sys_config")]
    sys_config: PathBuf,

    /// DRAM timing `.ini` file.
    #[arg(long = "dram_config")]
    dram_config: PathBuf,

    /// Request dataset CSV (`input_len, channel` columns).
    #[arg(long = "models_list")]
    dataset: PathBuf,

    /// Directory log files are written to.
    #[arg(long = "log_dir", default_value = "./log")]
    log_dir: PathBuf,

    /// Log verbosity.
    #[arg(long = "log_level", default_value = "info")]
    log_level: String,

    /// Run mode override; defaults to the system config's `run_mode`.
    #[arg(long = "mode")]
    mode: Option<String>,

    /// Maximum core cycles to simulate before giving up (safety bound).
    #[arg(long = "max_cycles", default_value_t = 100_000_000)]
    max_cycles: u64,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if let Err(message) = run(&cli) {
        eprintln!("{message}");
        process::exit(1);
    }
}

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: &Cli) -> Result<(), String> {
    let hardware_json = read_to_string(&cli.config)?;
    let memory_json = read_to_string(&cli.mem_config)?;
    let model_json = read_to_string(&cli.model_config)?;
    let system_json = read_to_string(&cli.sys_config)?;
    let client_json = read_to_string(&cli.cli_config)?;
    let dram_ini_text = read_to_string(&cli.dram_config)?;
    let dataset_csv = read_to_string(&cli.dataset)?;

    let config = Config::from_sources(&hardware_json, &memory_json, &model_json, &system_json, &client_json, &dram_ini_text)
        .map_err(|e| format!("configuration error: {e}"))?;
    let dataset = parse_dataset(&dataset_csv).map_err(|e| format!("dataset error: {e}"))?;

    fs::create_dir_all(&cli.log_dir).map_err(|e| format!("creating log dir {:?}: {e}", cli.log_dir))?;

    let mut simulator = Simulator::new(&config, dataset).map_err(|e| format!("simulator init error: {e}"))?;
    let report = simulator.run(cli.max_cycles);

    tracing::info!(
        total_cycles = report.total_cycles,
        completed_requests = report.completed_requests.len(),
        total_energy = report.total_energy,
        "simulation finished"
    );

    let op_stats_path = cli.log_dir.join("op_stats.tsv");
    fs::write(&op_stats_path, report.op_stats.to_tsv()).map_err(|e| format!("writing {op_stats_path:?}: {e}"))?;

    let stage_io_path = cli.log_dir.join("stage_io.tsv");
    fs::write(&stage_io_path, neupims_core::stats::stage_io_to_tsv(&report.stage_io))
        .map_err(|e| format!("writing {stage_io_path:?}: {e}"))?;

    Ok(())
}

fn read_to_string(path: &PathBuf) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("reading {path:?}: {e}"))
}
