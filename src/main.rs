use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;
use symdex::index::build::{build_index, BuildOptions};
use symdex::index::stats::{list_indexes, show_stats};
use symdex::indexer::{DECLARATIONS, REFERENCES};
use symdex::output::{self, ResultRecord};
use symdex::query::{MatchMode, MatchRule};
use symdex::utils::{self, AppConfig};
use symdex::Index;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "symdex")]
#[command(about = "Persistent symbol and reference index for source trees")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Codebase path (auto-detects git root)
    #[arg(short, long, global = true, default_value = ".")]
    path: PathBuf,

    /// Index file to use instead of the per-codebase location
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log storage activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or update the index
    Index {
        /// Discard the existing index first
        #[arg(short, long)]
        force: bool,

        /// Only index files matching this glob (repeatable)
        #[arg(short, long = "include")]
        include: Vec<String>,
    },
    /// Find words in the index
    Query {
        /// Word, prefix or pattern to look for
        key: String,

        /// Categories to search (default: decl and ref)
        #[arg(short, long = "category")]
        categories: Vec<String>,

        /// How the key is matched
        #[arg(short, long, value_enum, default_value_t = Mode::Exact)]
        mode: Mode,

        /// Case-insensitive matching
        #[arg(short = 'i', long)]
        ignore_case: bool,
    },
    /// List indexed document names
    Names {
        /// Only names starting with this prefix
        prefix: Option<String>,
    },
    /// Remove documents from the index
    Remove {
        /// Document names as shown by `symdex names`
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Print every word of the index
    Dump {
        /// Categories to dump (default: all)
        #[arg(short, long = "category")]
        categories: Vec<String>,
    },
    /// Show index statistics
    Stats,
    /// Empty the index
    Reset,
    /// List all indexed codebases
    List,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Exact,
    Prefix,
    Pattern,
    Regex,
    CamelCase,
}

impl From<Mode> for MatchMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Exact => MatchMode::Exact,
            Mode::Prefix => MatchMode::Prefix,
            Mode::Pattern => MatchMode::Pattern,
            Mode::Regex => MatchMode::Regex,
            Mode::CamelCase => MatchMode::CamelCase,
        }
    }
}

/// Where the index lives and which codebase it belongs to
struct Location {
    root: PathBuf,
    index_file: PathBuf,
    /// Stored in the app data directory, with meta.json beside it
    managed: bool,
}

fn locate(cli: &Cli) -> Result<Location> {
    match &cli.index {
        Some(index_file) => Ok(Location {
            root: cli
                .path
                .canonicalize()
                .with_context(|| format!("Invalid path {}", cli.path.display()))?,
            index_file: index_file.clone(),
            managed: false,
        }),
        None => {
            let root = utils::find_codebase_root(&cli.path)?;
            let index_file = utils::index_file_path(&root)?;
            Ok(Location {
                root,
                index_file,
                managed: true,
            })
        }
    }
}

fn open_index(location: &Location, config: &AppConfig) -> Result<Index> {
    if !location.index_file.exists() {
        anyhow::bail!(
            "No index at {}. Run `symdex index` first.",
            location.index_file.display()
        );
    }
    Index::open(&location.index_file, config.index.clone())
        .with_context(|| format!("Failed to open index {}", location.index_file.display()))
}

fn init_logging(verbose: bool) {
    let default = if verbose { "symdex=debug" } else { "symdex=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = AppConfig::load()?;
    let color = !cli.no_color;

    match &cli.command {
        Commands::Index { force, include } => {
            let location = locate(&cli)?;
            let options = BuildOptions {
                include: include.clone(),
                force: *force,
                silent: cli.json,
            };
            let summary =
                build_index(&location.root, &location.index_file, &options, &config)?;
            if location.managed {
                utils::write_meta(
                    &location.root,
                    &location.index_file,
                    summary.documents,
                )?;
            }
            if cli.json {
                output::print_json(&serde_json::json!({
                    "indexed": summary.indexed,
                    "removed": summary.removed,
                    "errors": summary.errors,
                    "documents": summary.documents,
                }))?;
            } else {
                println!(
                    "{} documents indexed ({} updated, {} removed)",
                    summary.documents, summary.indexed, summary.removed
                );
            }
        }
        Commands::Query {
            key,
            categories,
            mode,
            ignore_case,
        } => {
            let location = locate(&cli)?;
            let index = open_index(&location, &config)?;
            let categories = query_categories(categories);
            let categories: Vec<&str> = categories.iter().map(String::as_str).collect();
            let mut rule = MatchRule::new((*mode).into(), true);
            if *ignore_case {
                rule = rule.ignore_case();
            }

            let results = index.query(&categories, Some(key.as_str()), rule)?;
            if cli.json {
                output::print_json(&output::to_records(&results)?)?;
            } else if results.is_empty() {
                eprintln!("No matches for {:?}", key);
            } else {
                output::print_results(&results, color)?;
            }
        }
        Commands::Names { prefix } => {
            let location = locate(&cli)?;
            let index = open_index(&location, &config)?;
            let names = index.query_document_names(prefix.as_deref())?;
            if cli.json {
                output::print_json(&names)?;
            } else {
                output::print_names(&names, color)?;
            }
        }
        Commands::Remove { names } => {
            let location = locate(&cli)?;
            let mut index = open_index(&location, &config)?;
            let known = index.query_document_names(None)?;
            let mut removed = 0;
            for name in names {
                if known.binary_search(name).is_ok() {
                    index.remove(name);
                    removed += 1;
                } else {
                    eprintln!("Not indexed: {}", name);
                }
            }
            index.save()?;
            update_meta(&location, &index)?;
            println!("Removed {} document(s)", removed);
        }
        Commands::Dump { categories } => {
            let location = locate(&cli)?;
            let index = open_index(&location, &config)?;
            dump(&index, categories, cli.json, color)?;
        }
        Commands::Stats => {
            let location = locate(&cli)?;
            let index = open_index(&location, &config)?;
            let stats = index.stats()?;
            if cli.json {
                output::print_json(&stats)?;
            } else {
                let meta = location
                    .index_file
                    .parent()
                    .map(utils::read_meta)
                    .transpose()?
                    .flatten();
                show_stats(&stats, meta.as_ref());
            }
        }
        Commands::Reset => {
            let location = locate(&cli)?;
            let mut index = open_index(&location, &config)?;
            index.reset()?;
            update_meta(&location, &index)?;
            println!("Index emptied: {}", location.index_file.display());
        }
        Commands::List => {
            list_indexes(cli.json)?;
        }
    }

    Ok(())
}

fn query_categories(requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        vec![DECLARATIONS.to_string(), REFERENCES.to_string()]
    } else {
        requested.to_vec()
    }
}

fn update_meta(location: &Location, index: &Index) -> Result<()> {
    if location.managed {
        utils::write_meta(
            &location.root,
            &location.index_file,
            index.snapshot().document_count(),
        )?;
    }
    Ok(())
}

fn dump(index: &Index, requested: &[String], json: bool, color: bool) -> Result<()> {
    let categories: Vec<String> = if requested.is_empty() {
        index.snapshot().categories().map(String::from).collect()
    } else {
        requested.to_vec()
    };

    let _session = index.start_query();
    let mut by_category: BTreeMap<&str, Vec<ResultRecord>> = BTreeMap::new();
    let mut out = output::color_stdout(color);

    for category in &categories {
        let results = index.query(&[category.as_str()], None, MatchRule::exact())?;
        if json {
            by_category.insert(category.as_str(), output::to_records(&results)?);
        } else {
            output::write_category_heading(&mut out, category)?;
            output::write_results(&mut out, &results)?;
        }
    }

    if json {
        output::print_json(&by_category)?;
    }
    Ok(())
}
