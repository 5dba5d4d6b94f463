//! Command-line front end: build, query and unpack XBW indexes.
//!
//! ```bash
//! xbwt index dblp.xml -o dblp.xbw
//! xbwt search dblp.xbw '<article<author=Paolo' --snippets
//! xbwt navigate dblp.xbw 42 --op parent
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use prettytable::{row, Table};
use tracing::info;

use xbwt_index::{
    compress_document, decompress_document, parse_path, CodecKind, IndexConfig, Layout, XbwtIndex,
};

#[derive(Parser)]
#[command(name = "xbwt", about = "Compressed, searchable XML indexes", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Block codec, overriding the configuration
    #[arg(long, global = true)]
    codec: Option<CodecKind>,

    /// Compression level for zstd and deflate
    #[arg(long, short = 'l', global = true)]
    level: Option<i32>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all logging
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a searchable index from an XML document
    Index {
        input: PathBuf,
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Rebuild the XML document held by an index
    Deindex {
        input: PathBuf,
        /// Defaults to stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Pack an XML document into a compact, non-searchable container
    Compress {
        input: PathBuf,
        #[arg(long, short)]
        output: PathBuf,
        #[arg(long, default_value = "separate")]
        layout: Layout,
    },

    /// Unpack a compact container
    Decompress {
        input: PathBuf,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Count path matches, e.g. '<article<author=Paolo'
    Search {
        index: PathBuf,
        query: String,
        /// Print every content hit with its context
        #[arg(long)]
        snippets: bool,
        /// Bytes shown around each hit
        #[arg(long)]
        context: Option<usize>,
    },

    /// Print the element enclosing a row
    Subtree { index: PathBuf, row: usize },

    /// Run one navigation primitive on a row
    Navigate {
        index: PathBuf,
        row: usize,
        #[arg(long, value_enum)]
        op: NavOp,
    },

    /// Show the block layout of an index
    Info { index: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum NavOp {
    Parent,
    Children,
    Text,
    Label,
}

fn init_tracing(cli: &Cli) {
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("off")
    } else if cli.verbose {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<IndexConfig> {
    let mut config = match &cli.config {
        Some(path) => IndexConfig::from_json_file(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => IndexConfig::default(),
    };
    if let Some(codec) = cli.codec {
        config.codec = codec;
    }
    if cli.level.is_some() {
        config.compression_level = cli.level;
    }
    config.validate()?;
    Ok(config)
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn load_index(path: &Path, config: &IndexConfig) -> Result<XbwtIndex> {
    let image = read_input(path)?;
    XbwtIndex::from_bytes(&image, config)
        .with_context(|| format!("loading index {} with codec {}", path.display(), config.codec))
}

fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => fs::write(path, bytes).with_context(|| format!("writing {}", path.display())),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    match cli.command {
        Commands::Index { input, output } => {
            let xml = read_input(&input)?;
            let index = XbwtIndex::from_xml(&xml, &config)
                .with_context(|| format!("indexing {}", input.display()))?;
            let image = index.to_bytes()?;
            info!(input = xml.len(), image = image.len(), "writing index");
            write_output(Some(&output), &image)?;
        }
        Commands::Deindex { input, output } => {
            let index = load_index(&input, &config)?;
            write_output(output.as_deref(), &index.extract_document()?)?;
        }
        Commands::Compress { input, output, layout } => {
            let xml = read_input(&input)?;
            let packed = compress_document(&xml, &config, layout)
                .with_context(|| format!("compressing {}", input.display()))?;
            println!(
                "{}: {} -> {} bytes ({:.3} ratio)",
                input.display(),
                xml.len(),
                packed.len(),
                xml.len() as f64 / packed.len().max(1) as f64
            );
            write_output(Some(&output), &packed)?;
        }
        Commands::Decompress { input, output } => {
            let packed = read_input(&input)?;
            let xml = decompress_document(&packed, &config)
                .with_context(|| format!("decompressing {}", input.display()))?;
            write_output(output.as_deref(), &xml)?;
        }
        Commands::Search { index, query, snippets, context } => {
            let index = load_index(&index, &config)?;
            let tokens = parse_path(&query)?;
            let mut nav = index.navigator();
            let result = if snippets {
                nav.search_snippets(tokens.as_slice(), context.unwrap_or(config.snippet_context))?
            } else {
                nav.search(tokens.as_slice())?
            };
            println!("path occurrences: {}", result.path_occurrences);
            println!("occurrences: {}", result.occurrences);
            for snippet in &result.snippets {
                println!("  {}", String::from_utf8_lossy(snippet).replace('\0', " | "));
            }
            let stats = nav.stats();
            println!("blocks touched: {} ({} bytes)", stats.total_blocks(), stats.total_bytes());
        }
        Commands::Subtree { index, row } => {
            let index = load_index(&index, &config)?;
            let subtree = index.navigator().subtree_text(row)?;
            eprintln!("anchor row {}", subtree.anchor);
            write_output(None, &subtree.text)?;
            println!();
        }
        Commands::Navigate { index, row, op } => {
            let index = load_index(&index, &config)?;
            let mut nav = index.navigator();
            match op {
                NavOp::Parent => println!("{}", nav.parent(row)?),
                NavOp::Children => match nav.children(row)? {
                    Some(range) => println!("{}..={}", range.first, range.last),
                    None => println!("none"),
                },
                NavOp::Text => match nav.text_content(row)? {
                    Some(text) => println!("{}", String::from_utf8_lossy(&text)),
                    None => println!("none"),
                },
                NavOp::Label => println!("{}", String::from_utf8_lossy(nav.label(row)?)),
            }
        }
        Commands::Info { index: path } => {
            let index = load_index(&path, &config)?;
            let summary = index.summary();
            let mut table = Table::new();
            table.add_row(row!["Stream", "Blocks", "Bytes", "Block size"]);
            table.add_row(row!["Last", summary.last_blocks, summary.last_bytes, format!("{} ones", summary.block_population)]);
            table.add_row(row!["Alpha", summary.alpha_blocks, summary.alpha_bytes, format!("{} tokens", summary.block_symbol_count)]);
            table.add_row(row!["Pcdata", summary.pcdata_blocks, summary.pcdata_bytes, "per path"]);
            table.printstd();
            println!(
                "nodes: {}, content items: {}, text bytes: {}, labels: {}",
                summary.nodes, summary.content_items, summary.text_len, summary.alphabet_len
            );
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);
    if let Err(e) = run(cli) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
