//! docseek CLI: index and search office documents across directories

mod display;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docseek_core::index::{IndexStats, ProgressCallback, ProgressEvent};
use docseek_core::query::is_non_latin;
use docseek_core::semantic::AiFileIndex;
use docseek_core::{
    discover, notes, CancelFlag, Config, Database, Dispatcher, Indexer, SearchMode, SearchRequest,
    SemanticIndex,
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::display::{format_bytes, print_hit, SyntaxHighlighter};

#[derive(Parser)]
#[command(name = "docseek")]
#[command(about = "Index and search office documents across directories", long_about = None)]
#[command(version)]
struct Cli {
    /// Log more (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,

    /// Keyword for an index search (when no subcommand is given)
    #[arg(trailing_var_arg = true)]
    query: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a .docseek workspace in the current directory
    Init,

    /// Show roots, index and AI index statistics
    Status,

    /// Delete the index database and the AI index (config is kept)
    Reset {
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },

    /// Manage the registered root directories
    Root {
        #[command(subcommand)]
        action: RootCommand,
    },

    /// Index the roots (incremental unless --rebuild)
    Index {
        /// Drop the rows of the selected roots and index from scratch
        #[arg(long)]
        rebuild: bool,

        /// Only these roots (default: all)
        #[arg(long = "root")]
        roots: Vec<String>,
    },

    /// Re-index files changed since the last run
    Update {
        #[arg(long = "root")]
        roots: Vec<String>,
    },

    /// Keep the index up to date, updating periodically until Ctrl-C
    Watch {
        /// Seconds between updates (default: from config)
        #[arg(long)]
        interval: Option<u64>,

        #[arg(long = "root")]
        roots: Vec<String>,
    },

    /// Search for a keyword
    Search {
        /// Keyword(s) to look for
        keyword: Vec<String>,

        /// live, index or ai
        #[arg(short, long, default_value = "index")]
        mode: SearchMode,

        /// Only these roots (default: all)
        #[arg(long = "root")]
        roots: Vec<String>,

        /// Maximum number of results
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Pass the keyword to SQLite FTS5 as a query expression
        #[arg(long)]
        raw: bool,

        /// Number of context lines to show for text matches
        #[arg(short = 'C', long, default_value = "2")]
        context: usize,
    },

    /// Manage the AI (vector) index
    Ai {
        #[command(subcommand)]
        action: AiCommand,
    },

    /// Organize a folder of Markdown notes
    Notes {
        #[command(subcommand)]
        action: NotesCommand,
    },
}

#[derive(Subcommand)]
enum RootCommand {
    /// Register a directory
    Add { dir: PathBuf },
    /// Unregister a root and drop its indexed files
    Remove { dir: String },
    /// List roots in search order
    List,
    /// Move a root one place up
    Up { dir: String },
    /// Move a root one place down
    Down { dir: String },
}

#[derive(Subcommand)]
enum AiCommand {
    /// Embed the documents of the keyword index
    Build,
    /// Delete the AI index
    Clear,
    /// Show AI index statistics
    Status,
}

#[derive(Subcommand)]
enum NotesCommand {
    /// List the #tags used in the notes
    Tags { dir: PathBuf },
    /// Show which notes mention each note
    Backlinks { dir: PathBuf },
    /// Count notes and their size
    Stats { dir: PathBuf },
    /// Write an index.md into every folder of notes
    Index { dir: PathBuf },
    /// Create a timestamped note
    New { dir: PathBuf },
    /// Create a timestamped folder
    Folder { dir: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .init();

    let cancel = CancelFlag::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nCancelling... (press Ctrl-C again to quit)");
                cancel.cancel();
            }
            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(130);
            }
        }
    });

    match cli.command {
        Some(Commands::Init) => cmd_init()?,
        Some(Commands::Status) => cmd_status()?,
        Some(Commands::Reset { yes }) => cmd_reset(yes)?,
        Some(Commands::Root { action }) => cmd_root(action)?,
        Some(Commands::Index { rebuild, roots }) => {
            cmd_index(rebuild, roots, cancel).await?;
        }
        Some(Commands::Update { roots }) => cmd_index(false, roots, cancel).await?,
        Some(Commands::Watch { interval, roots }) => cmd_watch(interval, roots, cancel).await?,
        Some(Commands::Search {
            keyword,
            mode,
            roots,
            limit,
            raw,
            context,
        }) => {
            let request = SearchRequest {
                keyword: keyword.join(" "),
                mode,
                roots,
                limit,
                raw_query: raw,
            };
            cmd_search(request, context, cancel).await?;
        }
        Some(Commands::Ai { action }) => cmd_ai(action, cancel).await?,
        Some(Commands::Notes { action }) => cmd_notes(action)?,
        None => {
            if cli.query.is_empty() {
                println!("Usage: docseek <keyword> or docseek <command>");
                println!("Run 'docseek --help' for more information.");
            } else {
                let request = SearchRequest::new(cli.query.join(" "), SearchMode::Index);
                cmd_search(request, 2, cancel).await?;
            }
        }
    }

    Ok(())
}

fn workspace() -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    discover::find_workspace_root(&cwd)
        .context("Not in a docseek workspace. Run 'docseek init' first.")
}

fn open_database(workspace: &Path) -> Result<Database> {
    Database::open(&discover::db_path(workspace)).context("Failed to open the index database")
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    pb
}

/// Feed indexing progress into a progress bar.
fn progress_callback(pb: ProgressBar) -> ProgressCallback {
    Box::new(move |event| match event {
        ProgressEvent::Scanning { count } => {
            pb.set_message(format!("Scanning... {} files found", count));
        }
        ProgressEvent::Indexing {
            current,
            total,
            path,
        } => {
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("█▓░"),
            );
            pb.set_length(total as u64);
            pb.set_position(current as u64);
            pb.set_message(path.to_string_lossy().to_string());
        }
        ProgressEvent::Removing { count } => {
            pb.set_message(format!("Removing {} vanished files...", count));
        }
        ProgressEvent::Embedding { current, total } => {
            pb.set_message(format!("Embedding chunks {}/{}...", current, total));
        }
    })
}

fn cmd_init() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let ds_dir = discover::init_workspace(&cwd)?;

    println!("Initialized docseek workspace in {}", ds_dir.display());
    println!("Run 'docseek root add <dir>' to register a directory, then 'docseek index'.");

    Ok(())
}

fn cmd_status() -> Result<()> {
    let root = workspace()?;
    let config = Config::load(&root)?;
    let db = open_database(&root)?;

    println!("docseek workspace: {}", root.display());
    println!();
    println!("Configuration:");
    println!("  Model: {}", config.model);
    println!("  Max file size: {}", format_bytes(config.max_file_size));
    println!("  Update interval: {}s", config.update_interval_secs);
    println!();

    let counts = db.counts_by_root()?;
    let roots = db.list_roots()?;
    println!("Roots:");
    if roots.is_empty() {
        println!("  (none)");
    }
    for root in &roots {
        let files = counts
            .iter()
            .find(|(path, _)| *path == root.path)
            .map(|(_, n)| *n)
            .unwrap_or(0);
        println!("  {}. {} ({} files)", root.position, root.path, files);
    }
    println!();

    println!("Index:");
    println!("  Files indexed: {}", db.indexed_file_count()?);
    for (file_type, count) in db.counts_by_type()? {
        println!("    {:<5} {}", file_type, count);
    }
    println!();

    let ai = AiFileIndex::load(&root)?;
    println!("AI index:");
    println!("  Documents: {}", ai.files.len());
    println!(
        "  Chunks: {}",
        ai.files.values().map(|f| f.chunk_count).sum::<usize>()
    );

    Ok(())
}

fn cmd_reset(yes: bool) -> Result<()> {
    let root = workspace()?;
    if !yes {
        println!("This deletes the index database and the AI index of {}.", root.display());
        println!("Registered roots are lost; config.json is kept.");
        println!("Run 'docseek reset --yes' to proceed.");
        return Ok(());
    }

    let db = discover::db_path(&root);
    if db.exists() {
        std::fs::remove_file(&db).context("Failed to delete the index database")?;
    }
    SemanticIndex::clear(&root)?;
    Database::open(&db)?;

    println!("✓ All index data cleared");
    Ok(())
}

fn cmd_root(action: RootCommand) -> Result<()> {
    let root = workspace()?;
    let mut db = open_database(&root)?;

    match action {
        RootCommand::Add { dir } => {
            if db.add_root(&dir)? {
                println!("✓ Added root {}", dir.display());
                println!("Run 'docseek index' to index it.");
            } else {
                println!("Root already registered: {}", dir.display());
            }
        }
        RootCommand::Remove { dir } => {
            let name = db
                .select_roots(std::slice::from_ref(&dir))?
                .into_iter()
                .next()
                .with_context(|| format!("Root is not registered: {dir}"))?;
            db.remove_root(&name)?;
            if discover::ai_files_path(&root).exists() {
                let removed = SemanticIndex::open(&root)?.remove_root(&name)?;
                tracing::info!("dropped {removed} documents from the AI index");
            }
            println!("✓ Removed root {}", name);
        }
        RootCommand::List => {
            let roots = db.list_roots()?;
            if roots.is_empty() {
                println!("No roots registered. Add one with 'docseek root add <dir>'.");
            }
            for (i, r) in roots.iter().enumerate() {
                println!("{}. {}", i + 1, r.path);
            }
        }
        RootCommand::Up { dir } => {
            db.move_root_up(&dir)?;
            println!("✓ Moved {} up", dir);
        }
        RootCommand::Down { dir } => {
            db.move_root_down(&dir)?;
            println!("✓ Moved {} down", dir);
        }
    }

    Ok(())
}

/// Run a rebuild or an update on a blocking thread.
async fn run_index(
    root: PathBuf,
    rebuild: bool,
    roots: Vec<String>,
    cancel: CancelFlag,
    pb: Option<ProgressBar>,
) -> Result<Option<IndexStats>> {
    let stats = tokio::task::spawn_blocking(move || -> docseek_core::Result<Option<IndexStats>> {
        let mut db = Database::open(&discover::db_path(&root))?;
        let config = Config::load(&root)?;
        let roots = db.select_roots(&roots)?;
        if roots.is_empty() {
            return Ok(None);
        }

        let mut indexer = Indexer::new(&mut db, &config).with_cancel(cancel);
        if let Some(pb) = pb {
            indexer.set_progress_callback(progress_callback(pb));
        }
        let stats = if rebuild {
            indexer.rebuild(&roots)?
        } else {
            indexer.update(&roots)?
        };
        Ok(Some(stats))
    })
    .await
    .context("Indexing task failed")??;

    Ok(stats)
}

fn print_index_stats(stats: &IndexStats) {
    if stats.cancelled {
        println!("✗ Indexing cancelled:");
    } else {
        println!("✓ Indexing complete:");
    }
    println!("  Files scanned:   {}", stats.files_scanned);
    println!("  Files added:     {}", stats.files_added);
    println!("  Files updated:   {}", stats.files_updated);
    println!("  Files unchanged: {}", stats.files_unchanged);
    println!("  Files removed:   {}", stats.files_removed);
    println!("  Files skipped:   {}", stats.files_skipped);
    if stats.files_failed > 0 {
        println!("  Extraction failures: {}", stats.files_failed);
    }
}

async fn cmd_index(rebuild: bool, roots: Vec<String>, cancel: CancelFlag) -> Result<()> {
    let root = workspace()?;

    let pb = spinner("Scanning files...");
    let stats = run_index(root, rebuild, roots, cancel, Some(pb.clone())).await;
    pb.finish_and_clear();

    match stats? {
        Some(stats) => print_index_stats(&stats),
        None => println!("No roots registered. Add one with 'docseek root add <dir>'."),
    }
    Ok(())
}

/// Resolve once `cancel` is set.
async fn cancelled(cancel: &CancelFlag) {
    while !cancel.is_cancelled() {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

async fn cmd_watch(interval: Option<u64>, roots: Vec<String>, cancel: CancelFlag) -> Result<()> {
    let root = workspace()?;
    let config = Config::load(&root)?;
    let secs = interval.unwrap_or(config.update_interval_secs).max(1);

    println!("Updating every {}s. Press Ctrl-C to stop.", secs);
    let mut ticker = tokio::time::interval(Duration::from_secs(secs));

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancelled(&cancel) => break,
        }

        match run_index(root.clone(), false, roots.clone(), cancel.clone(), None).await? {
            Some(stats) => println!(
                "[update] +{} added, {} updated, {} removed, {} unchanged",
                stats.files_added, stats.files_updated, stats.files_removed, stats.files_unchanged
            ),
            None => println!("[update] no roots registered"),
        }

        if cancel.is_cancelled() {
            break;
        }
    }

    println!("Stopped.");
    Ok(())
}

async fn cmd_search(request: SearchRequest, context: usize, cancel: CancelFlag) -> Result<()> {
    let root = workspace()?;

    let pb = spinner(match request.mode {
        SearchMode::Live => "Scanning files...",
        SearchMode::Index => "Searching...",
        SearchMode::Ai => "Searching AI index...",
    });

    let hits = tokio::task::spawn_blocking({
        let request = request.clone();
        move || -> docseek_core::Result<_> {
            let db = Database::open(&discover::db_path(&root))?;
            let config = Config::load(&root)?;
            Dispatcher::new(&root, &db, &config)
                .with_cancel(cancel)
                .search(&request)
        }
    })
    .await
    .context("Search task failed")?;

    pb.finish_and_clear();
    let hits = hits?;

    if hits.is_empty() {
        println!("No results found for: {}", request.keyword);
        return Ok(());
    }

    let highlighter = SyntaxHighlighter::new();
    let snippet_marks = request.mode == SearchMode::Index && !is_non_latin(&request.keyword);

    println!(
        "{} results for: {} ({} search)\n",
        hits.len(),
        request.keyword,
        request.mode
    );

    for (i, hit) in hits.iter().enumerate() {
        print_hit(i + 1, hit, &highlighter, context, snippet_marks);
    }

    Ok(())
}

async fn cmd_ai(action: AiCommand, cancel: CancelFlag) -> Result<()> {
    let root = workspace()?;

    match action {
        AiCommand::Build => {
            let pb = spinner("Loading documents...");
            let stats = tokio::task::spawn_blocking({
                let pb = pb.clone();
                move || -> docseek_core::Result<_> {
                    let db = Database::open(&discover::db_path(&root))?;
                    let documents = db.indexed_documents()?;
                    let mut index = SemanticIndex::open(&root)?;
                    index.set_progress_callback(progress_callback(pb));
                    index.build(documents, &cancel)
                }
            })
            .await
            .context("AI build task failed")?;
            pb.finish_and_clear();
            let stats = stats?;

            if stats.cancelled {
                println!("✗ AI index build cancelled:");
            } else {
                println!("✓ AI index built:");
            }
            println!("  Documents embedded:  {}", stats.documents_indexed);
            println!("  Documents unchanged: {}", stats.documents_unchanged);
            println!("  Documents removed:   {}", stats.documents_removed);
            println!("  Chunks created:      {}", stats.chunks_created);
        }
        AiCommand::Clear => {
            SemanticIndex::clear(&root)?;
            println!("✓ AI index cleared");
        }
        AiCommand::Status => {
            let stats = SemanticIndex::open(&root)?.stats()?;
            println!("AI index:");
            println!("  Documents: {}", stats.documents);
            println!("  Chunks:    {}", stats.chunks);
            println!("  Vectors:   {}", stats.points);
            println!("  Size:      {}", format_bytes(stats.size_bytes));
        }
    }

    Ok(())
}

fn cmd_notes(action: NotesCommand) -> Result<()> {
    match action {
        NotesCommand::Tags { dir } => {
            let tags = notes::extract_tags(&dir)?;
            if tags.is_empty() {
                println!("No tags found.");
            }
            for tag in tags {
                println!("#{}", tag);
            }
        }
        NotesCommand::Backlinks { dir } => {
            let backlinks = notes::find_backlinks(&dir)?;
            println!("{} notes have backlinks", backlinks.len());
            for (note, links) in backlinks {
                println!("{}: {} backlinks", note.display(), links.len());
                for link in links {
                    println!("  ← {}", link.display());
                }
            }
        }
        NotesCommand::Stats { dir } => {
            let stats = notes::collection_stats(&dir)?;
            println!("Markdown files: {}", stats.files);
            println!("Total size:     {}", format_bytes(stats.total_bytes));
        }
        NotesCommand::Index { dir } => {
            let written = notes::generate_indexes(&dir)?;
            println!("✓ Wrote {} index pages", written);
        }
        NotesCommand::New { dir } => {
            let path = notes::create_note(&dir, chrono::Local::now().naive_local())?;
            println!("✓ Created {}", path.display());
        }
        NotesCommand::Folder { dir } => {
            let path = notes::create_folder(&dir, chrono::Local::now().naive_local())?;
            println!("✓ Created {}", path.display());
        }
    }

    Ok(())
}
