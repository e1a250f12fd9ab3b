use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use domgen_emit::{emit, exposed_types, Flavor, KnownTypes};
use domgen_graph::{Integrated, Integrator, IntegratorOptions, Unresolved};
use sources::{load_inputs, Inputs, JsonIdlConverter};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

mod config;
mod report;
mod sources;

pub use config::{GeneratorConfig, InputFiles, OutputFiles};
pub use sources::{CommentMap, IdlConverter, IdlSource};

fn print_stdout(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "domgen")]
#[command(about = "Generate DOM TypeScript declarations from WebIDL fragments", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Integrate all inputs and write the declaration files
    Generate(RunArgs),

    /// Integrate all inputs and print the finished graph as JSON
    Merge(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Directory holding the JSON inputs
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Directory the declaration files are written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fail on partials and includes whose target is missing
    #[arg(long)]
    strict: bool,
}

impl RunArgs {
    fn resolve(&self) -> Result<GeneratorConfig> {
        let mut config = match &self.config {
            Some(path) => GeneratorConfig::load(path)?,
            None => GeneratorConfig::default(),
        };
        if let Some(dir) = &self.input_dir {
            config.input_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if self.strict {
            config.unresolved = Unresolved::Fail;
        }
        config
            .validate()
            .map_err(|reason| anyhow!("Invalid configuration: {reason}"))?;
        Ok(config)
    }
}

pub fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Generate(args) => run_generate(&args.resolve()?),
        Commands::Merge(args) => run_merge(&args.resolve()?),
    }
}

fn integrate(config: &GeneratorConfig) -> Result<(Integrated, KnownTypes)> {
    let Inputs {
        baseline,
        fragments,
        templates,
        known,
    } = load_inputs(config, &JsonIdlConverter::new(config))?;

    let integrator = Integrator::new(IntegratorOptions {
        unresolved: config.unresolved,
    });
    let integrated = integrator
        .integrate(baseline, fragments, &templates)
        .context("Failed to integrate IDL fragments")?;
    log::info!("{}", report::render_summary(&integrated.report));
    Ok((integrated, known))
}

fn run_generate(config: &GeneratorConfig) -> Result<()> {
    let (Integrated { graph, .. }, known) = integrate(config)?;

    let window = exposed_types(&graph, "Window", known.for_context("Window"))
        .context("Failed to extract Window types")?;
    let worker = exposed_types(&graph, "Worker", known.for_context("Worker"))
        .context("Failed to extract Worker types")?;

    let outputs = [
        (config.web_output(), emit(&window, Flavor::Web)?),
        (config.worker_output(), emit(&worker, Flavor::Worker)?),
        (config.iterators_output(), emit(&graph, Flavor::Iterators)?),
    ];

    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.output_dir.display()
        )
    })?;
    for (path, text) in &outputs {
        fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Wrote {}", path.display());
    }
    Ok(())
}

fn run_merge(config: &GeneratorConfig) -> Result<()> {
    let (integrated, _) = integrate(config)?;
    let json = serde_json::to_string_pretty(&integrated.graph)?;
    print_stdout(&json)
}
