use anyhow::{Context, Result};
use clap::Parser;
use pptree_codegen::Language;
use pptree_core::{synthesize, GraphStats, MappingPolicy, Netlist, SynthConfig};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// pptree - parallel-prefix adder synthesis
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Operand width in bits [default: 32]
    #[arg(short, long)]
    width: Option<usize>,

    /// Starting topology (ripple-carry, sklansky, kogge-stone, brent-kung, han-carlson)
    #[arg(short, long)]
    start: Option<String>,

    /// Transform sequence, e.g. "LF@6_LF@4"
    #[arg(short, long)]
    transforms: Option<String>,

    /// Name of the generated module [default: adder]
    #[arg(long)]
    top_module: Option<String>,

    /// Cell mapping policy (behavioral, structural)
    #[arg(short, long)]
    mapping: Option<String>,

    /// Output directory
    #[arg(long, default_value = ".")]
    hdl_root: PathBuf,

    /// HDL to emit
    #[arg(long, default_value = "verilog")]
    language: String,

    /// Configuration file; command-line flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip validation after each transform
    #[arg(long)]
    no_validate: bool,

    /// Also write a JSON report
    #[arg(long)]
    json: bool,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Machine-readable summary of a run
#[derive(Serialize)]
struct Report<'a> {
    config: &'a SynthConfig,
    stats: GraphStats,
    transforms: Vec<String>,
    inverse: Vec<String>,
    netlist: &'a Netlist,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let config = resolve_config(&cli)?;
    let language = cli
        .language
        .parse::<Language>()
        .context("Invalid --language value")?;
    run(&config, language, &cli.hdl_root, cli.json)
}

/// Merge the configuration file with command-line overrides
fn resolve_config(cli: &Cli) -> Result<SynthConfig> {
    let mut config = match &cli.config {
        Some(path) => SynthConfig::from_path(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => SynthConfig::default(),
    };

    if let Some(width) = cli.width {
        config.width = width;
    }
    if let Some(start) = &cli.start {
        config.start = start.clone();
    }
    if let Some(transforms) = &cli.transforms {
        config.transforms = transforms.clone();
    }
    if let Some(top) = &cli.top_module {
        config.top_module = top.clone();
    }
    if let Some(mapping) = &cli.mapping {
        config.mapping = mapping
            .parse::<MappingPolicy>()
            .context("Invalid --mapping value")?;
    }
    if cli.no_validate {
        config.engine.validate = false;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn run(config: &SynthConfig, language: Language, hdl_root: &Path, json: bool) -> Result<()> {
    info!(
        "Synthesizing {}-bit {} adder with transforms {:?}",
        config.width, config.start, config.transforms
    );

    let synthesis = synthesize(config).context("Synthesis failed")?;
    info!("Final graph:\n{}", synthesis.graph);

    let hdl = pptree_codegen::generate_hdl(&synthesis.netlist, language)
        .with_context(|| format!("Failed to generate {}", language))?;
    let dot = pptree_codegen::generate_dot(&synthesis.graph.layout())
        .context("Failed to render diagram")?;

    fs::create_dir_all(hdl_root)
        .with_context(|| format!("Failed to create output directory {:?}", hdl_root))?;

    let hdl_path = hdl_root.join(format!("{}.{}", config.top_module, language.extension()));
    fs::write(&hdl_path, hdl).with_context(|| format!("Failed to write {:?}", hdl_path))?;
    let dot_path = hdl_root.join(format!("{}.dot", config.top_module));
    fs::write(&dot_path, dot).with_context(|| format!("Failed to write {:?}", dot_path))?;

    if json {
        let report = Report {
            config,
            stats: synthesis.graph.stats(),
            transforms: synthesis
                .applied
                .iter()
                .map(|a| a.descriptor.to_string())
                .collect(),
            inverse: synthesis
                .applied
                .iter()
                .rev()
                .map(|a| a.inverse().to_string())
                .collect(),
            netlist: &synthesis.netlist,
        };
        let json_path = hdl_root.join(format!("{}.json", config.top_module));
        fs::write(&json_path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("Failed to write {:?}", json_path))?;
    }

    println!("{}", synthesis.graph.stats().summary());
    println!("Wrote {:?} and {:?}", hdl_path, dot_path);
    Ok(())
}
