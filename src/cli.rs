use crate::aggregator::AggregatedDefinitions;
use crate::config::AggregatorConfig;
use crate::describe::{DescriptionProvider, GeminiDescriber, HeuristicDescriber};
use crate::document::{DocumentBuilder, ServiceDocument};
use crate::error::Error;
use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
use crate::source::load_service_source;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Environment variable holding the Gemini API key
pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Generate API documents from Rust web services and merge many services into one catalog
#[derive(Parser, Debug)]
#[command(name = "openapi-catalog")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate the document of one service from its source tree
    Generate(GenerateArgs),
    /// Fetch the documents of configured services and merge them
    Aggregate(AggregateArgs),
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Path to the Rust project directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Service id shown in log output (defaults to the directory name)
    #[arg(long = "service-id", value_name = "ID")]
    pub service_id: Option<String>,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Where endpoint summaries come from
    #[arg(long = "describe", value_enum, default_value = "none")]
    pub describe: DescribeMode,

    /// Document title
    #[arg(long = "title")]
    pub title: Option<String>,

    /// Document version
    #[arg(long = "version", value_name = "VERSION")]
    pub api_version: Option<String>,
}

#[derive(Args, Debug)]
pub struct AggregateArgs {
    /// Aggregator config file (YAML or JSON)
    #[arg(long = "config", value_name = "FILE")]
    pub config: PathBuf,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Emit the unified document together with every raw service document
    #[arg(long = "raw")]
    pub raw: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// Description provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DescribeMode {
    /// Leave summaries empty
    None,
    /// Derive summaries from handler names
    Heuristic,
    /// Ask a Gemini model (needs GEMINI_API_KEY)
    Gemini,
}

/// Run the selected subcommand
pub fn run(args: CliArgs) -> Result<()> {
    debug!("Parsed arguments: {:?}", args);
    match args.command {
        Command::Generate(args) => run_generate(args),
        Command::Aggregate(args) => run_aggregate(args),
    }
}

fn run_generate(args: GenerateArgs) -> Result<()> {
    info!("Project path: {}", args.project_path.display());
    let document = generate_document(&args)?;
    info!("Document has {} paths", document.paths().len());

    let content = render(&document, args.output_format)?;
    emit(&content, args.output_path.as_deref())
}

/// Build the document for `args.project_path`
pub fn generate_document(args: &GenerateArgs) -> Result<ServiceDocument> {
    // Fail on a missing key before scanning anything
    let describer = describer_for(args.describe)?;

    let source = load_service_source(&args.project_path)
        .with_context(|| format!("Failed to load {}", args.project_path.display()))?;
    if source.groups.is_empty() {
        warn!("No routes found in the project");
    }

    let service_id = match &args.service_id {
        Some(id) => id.clone(),
        None => default_service_id(&args.project_path)?,
    };
    info!("Service id: {}", service_id);

    let mut builder = DocumentBuilder::new();
    if args.title.is_some() || args.api_version.is_some() {
        let defaults = DocumentBuilder::new().info().clone();
        builder = builder.with_info(
            args.title.clone().unwrap_or(defaults.title),
            args.api_version.clone().unwrap_or(defaults.version),
            defaults.description,
        );
    }
    if let Some(describer) = describer {
        builder = builder.with_describer(describer);
    }

    Ok(builder.generate(&service_id, &source)?)
}

fn describer_for(mode: DescribeMode) -> Result<Option<Box<dyn DescriptionProvider>>> {
    Ok(match mode {
        DescribeMode::None => None,
        DescribeMode::Heuristic => Some(Box::new(HeuristicDescriber)),
        DescribeMode::Gemini => {
            let key = std::env::var(GEMINI_API_KEY_VAR)
                .map_err(|_| Error::Configuration(format!("{} is not set", GEMINI_API_KEY_VAR)))?;
            Some(Box::new(GeminiDescriber::new(key)?))
        }
    })
}

fn default_service_id(project_path: &Path) -> Result<String> {
    let canonical = project_path
        .canonicalize()
        .with_context(|| format!("Project path does not exist: {}", project_path.display()))?;
    canonical
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .context("Cannot derive a service id from the project path, use --service-id")
}

fn run_aggregate(args: AggregateArgs) -> Result<()> {
    let config = AggregatorConfig::load(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    info!("Aggregating {} configured services", config.services.len());

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let definitions = runtime.block_on(config.catalog().definitions());
    report_failures(&definitions);

    let content = if args.raw {
        render(&definitions, args.output_format)?
    } else {
        render(&definitions.unified_spec, args.output_format)?
    };
    emit(&content, args.output_path.as_deref())
}

fn report_failures(definitions: &AggregatedDefinitions) {
    for (service_id, slot) in &definitions.individual_specs {
        if let crate::aggregator::RawSlot::Error { error } = slot {
            warn!("Service {} left out: {}", service_id, error);
        }
    }
}

fn render<T: Serialize>(doc: &T, format: OutputFormat) -> Result<String> {
    info!("Serializing to {:?} format...", format);
    match format {
        OutputFormat::Yaml => serialize_yaml(doc),
        OutputFormat::Json => serialize_json(doc),
    }
}

fn emit(content: &str, output_path: Option<&Path>) -> Result<()> {
    match output_path {
        Some(path) => {
            write_to_file(content, path)?;
            info!("Wrote document to {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate_args() {
        let args = CliArgs::try_parse_from([
            "openapi-catalog",
            "generate",
            "./svc",
            "--service-id",
            "orders",
            "-f",
            "json",
            "--describe",
            "heuristic",
            "--version",
            "2.0.0",
            "-v",
        ])
        .unwrap();

        assert!(args.verbose);
        let Command::Generate(generate) = args.command else {
            panic!("expected generate");
        };
        assert_eq!(generate.service_id.as_deref(), Some("orders"));
        assert!(matches!(generate.output_format, OutputFormat::Json));
        assert_eq!(generate.describe, DescribeMode::Heuristic);
        assert_eq!(generate.api_version.as_deref(), Some("2.0.0"));
        assert_eq!(generate.title, None);
    }

    #[test]
    fn test_parse_aggregate_args() {
        let args = CliArgs::try_parse_from([
            "openapi-catalog",
            "aggregate",
            "--config",
            "catalog.yaml",
            "--raw",
            "-o",
            "out.yaml",
        ])
        .unwrap();

        let Command::Aggregate(aggregate) = args.command else {
            panic!("expected aggregate");
        };
        assert_eq!(aggregate.config, PathBuf::from("catalog.yaml"));
        assert!(aggregate.raw);
        assert!(matches!(aggregate.output_format, OutputFormat::Yaml));
    }

    #[test]
    fn test_aggregate_requires_config() {
        assert!(CliArgs::try_parse_from(["openapi-catalog", "aggregate"]).is_err());
    }

    #[test]
    fn test_service_id_help_matches_its_use() {
        use clap::CommandFactory;

        let command = CliArgs::command();
        let generate = command.find_subcommand("generate").unwrap();
        let service_id = generate
            .get_arguments()
            .find(|arg| arg.get_id() == "service_id")
            .unwrap();
        let help = service_id.get_help().unwrap().to_string();
        assert!(help.contains("log"));
        assert!(!help.contains("operation"));
    }

    #[test]
    fn test_default_service_id_is_directory_name() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let project = temp_dir.path().join("inventory");
        std::fs::create_dir(&project).unwrap();
        assert_eq!(default_service_id(&project).unwrap(), "inventory");
    }
}
