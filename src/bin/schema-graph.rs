//! Schema Graph CLI
//!
//! Command-line interface for loading, indexing and naming JSON Schemas.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use schema_graph::{
    source_to_url, AutoRetriever, CompileError, CompileOptions, CompoundDescriptor, Draft,
    MappedRetriever, MetaSchemaRegistry, Retriever, SchemaManager,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "schema-graph")]
#[command(about = "Load, index and name JSON Schema documents across drafts")]
#[command(version)]
struct Cli {
    /// Log loading progress to stderr (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every indexed node with its draft, name, reference and compounds
    Index {
        #[command(flatten)]
        source: SourceArgs,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print `name<TAB>url` for every indexed node
    Names {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// List registered drafts and their meta-schema URLs
    Drafts,
}

#[derive(Args)]
struct SourceArgs {
    /// Schema source: file path or URL (http://, https:// or file://)
    schema: String,

    /// Require the entry document to declare this draft (e.g. draft-07, 2020-12)
    #[arg(long)]
    draft: Option<Draft>,

    /// Draft assumed when the entry document has no $schema
    #[arg(long, default_value = "2020-12")]
    default_draft: Draft,

    /// Local directory containing schema files
    #[arg(long)]
    schema_local_base: Option<PathBuf>,

    /// URL prefix mapped onto the local base (default: the schema's own directory)
    #[arg(long, requires = "schema_local_base")]
    schema_remote_base: Option<String>,

    /// Name used for nodes without a usable URL segment
    #[arg(long, default_value = "Schema")]
    placeholder: String,
}

#[derive(Serialize)]
struct NodeRecord<'a> {
    url: &'a Url,
    draft: Draft,
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference: Option<&'a Url>,
    #[serde(skip_serializing_if = "no_compounds")]
    compounds: &'a [CompoundDescriptor],
}

fn no_compounds(compounds: &&[CompoundDescriptor]) -> bool {
    compounds.is_empty()
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Index {
            source,
            output,
            pretty,
        } => run_index(&source, output, pretty),
        Commands::Names { source } => run_names(&source),
        Commands::Drafts => run_drafts(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn report(e: &CompileError) -> u8 {
    eprintln!("Error: {}", e);
    e.exit_code() as u8
}

fn compile(args: &SourceArgs) -> Result<SchemaManager, u8> {
    let entry = source_to_url(&args.schema).map_err(|e| report(&e))?;
    let options = CompileOptions::new()
        .default_draft(args.default_draft)
        .expected_draft(args.draft)
        .name_placeholder(args.placeholder.as_str());

    let auto = AutoRetriever::new(options.http_timeout);
    let retriever: Box<dyn Retriever> = match &args.schema_local_base {
        Some(local_base) => {
            let remote_base = match &args.schema_remote_base {
                Some(base) => base.clone(),
                None => entry
                    .join(".")
                    .map(|dir| dir.to_string())
                    .unwrap_or_else(|_| entry.to_string()),
            };
            Box::new(MappedRetriever::new(auto, remote_base, local_base.clone()))
        }
        None => Box::new(auto),
    };

    let mut manager = SchemaManager::new(retriever, options);
    manager.compile(&entry).map_err(|e| report(&e))?;
    Ok(manager)
}

fn run_index(args: &SourceArgs, output: Option<PathBuf>, pretty: bool) -> Result<(), u8> {
    let manager = compile(args)?;

    let records: Vec<NodeRecord<'_>> = manager
        .nodes()
        .map(|(url, draft)| NodeRecord {
            url,
            draft,
            name: manager.get_name(url),
            reference: manager.get_reference(url),
            compounds: manager.get_compound_descriptors(url),
        })
        .collect();

    let json_output = if pretty {
        serde_json::to_string_pretty(&records)
    } else {
        serde_json::to_string(&records)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn run_names(args: &SourceArgs) -> Result<(), u8> {
    let manager = compile(args)?;
    let Some(names) = manager.names() else {
        return Ok(());
    };
    for (url, name) in names.iter() {
        println!("{}\t{}", name, url);
    }
    Ok(())
}

fn run_drafts() -> Result<(), u8> {
    for descriptor in MetaSchemaRegistry::builtin().descriptors() {
        println!("{}\t{}", descriptor.key(), descriptor.meta_schema_url);
    }
    Ok(())
}
