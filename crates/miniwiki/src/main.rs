use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use miniwiki_core::backup::MAX_BACKUPS;
use miniwiki_core::config::load_config;
use miniwiki_core::links::{collect_link_titles, parse_wiki_links};
use miniwiki_core::pages::WikiPage;
use miniwiki_core::runtime::{
    InitOptions, PathOverrides, ResolutionContext, ResolvedPaths, init_layout, inspect_runtime,
    resolve_paths,
};
use miniwiki_core::storage::SqliteStorage;
use miniwiki_core::store::PageStore;

#[derive(Debug, Parser)]
#[command(
    name = "miniwiki",
    version,
    about = "Minimal personal wiki over local key-value storage"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    wiki_root: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    data_dir: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    wiki_root: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            wiki_root: cli.wiki_root.clone(),
            data_dir: cli.data_dir.clone(),
            config: cli.config.clone(),
            diagnostics: cli.diagnostics,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    Init(InitArgs),
    List,
    Show(ShowArgs),
    Edit(EditArgs),
    Remove(RemoveArgs),
    Links(LinksArgs),
    Export(ExportArgs),
    Import(ImportArgs),
    Backups(BackupsArgs),
    Status,
}

#[derive(Debug, Args)]
struct InitArgs {
    #[arg(long, help = "Overwrite an existing config file")]
    force: bool,
    #[arg(long, help = "Skip writing .miniwiki/config.toml")]
    no_config: bool,
}

#[derive(Debug, Args)]
struct ShowArgs {
    title: String,
    #[arg(long, help = "Print content verbatim without rendering links")]
    raw: bool,
}

#[derive(Debug, Args)]
struct EditArgs {
    title: String,
    #[arg(long, help = "Page content; read from stdin when omitted")]
    content: Option<String>,
}

#[derive(Debug, Args)]
struct RemoveArgs {
    title: String,
}

#[derive(Debug, Args)]
struct LinksArgs {
    title: String,
}

#[derive(Debug, Args)]
struct ExportArgs {
    #[arg(long, value_name = "PATH", help = "Write JSON to a file instead of stdout")]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ImportArgs {
    path: PathBuf,
}

#[derive(Debug, Args)]
struct BackupsArgs {
    #[command(subcommand)]
    command: BackupsSubcommand,
}

#[derive(Debug, Subcommand)]
enum BackupsSubcommand {
    List,
    Restore { timestamp: u64 },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Init(args)) => run_init(&runtime, args),
        Some(Commands::List) => run_list(&runtime),
        Some(Commands::Show(args)) => run_show(&runtime, args),
        Some(Commands::Edit(args)) => run_edit(&runtime, args),
        Some(Commands::Remove(RemoveArgs { title })) => run_remove(&runtime, &title),
        Some(Commands::Links(LinksArgs { title })) => run_links(&runtime, &title),
        Some(Commands::Export(args)) => run_export(&runtime, args),
        Some(Commands::Import(ImportArgs { path })) => run_import(&runtime, &path),
        Some(Commands::Backups(BackupsArgs { command })) => match command {
            BackupsSubcommand::List => run_backups_list(&runtime),
            BackupsSubcommand::Restore { timestamp } => run_backups_restore(&runtime, timestamp),
        },
        Some(Commands::Status) => run_status(&runtime),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn resolve_runtime_paths(runtime: &RuntimeOptions) -> Result<ResolvedPaths> {
    let context = ResolutionContext::from_process()?;
    let overrides = PathOverrides {
        wiki_root: runtime.wiki_root.clone(),
        data_dir: runtime.data_dir.clone(),
        config: runtime.config.clone(),
    };
    resolve_paths(&context, &overrides)
}

fn open_store(paths: &ResolvedPaths) -> Result<PageStore> {
    let config = load_config(&paths.config_path)?;
    let storage = SqliteStorage::open(&paths.db_path)?;
    PageStore::open_with_home(Box::new(storage), config.home_content())
}

fn print_diagnostics(runtime: &RuntimeOptions, paths: &ResolvedPaths) {
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn run_init(runtime: &RuntimeOptions, args: InitArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let report = init_layout(
        &paths,
        &InitOptions {
            materialize_config: !args.no_config,
            force: args.force,
        },
    )?;

    println!("Initialized miniwiki runtime layout");
    println!("wiki_root: {}", paths.wiki_root.display());
    println!("state_dir: {}", paths.state_dir.display());
    println!("data_dir: {}", paths.data_dir.display());
    println!("db_path: {}", paths.db_path.display());
    println!("config_path: {}", paths.config_path.display());
    println!("created_dirs: {}", report.created_dirs.len());
    println!("wrote_config: {}", report.wrote_config);
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_list(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let store = open_store(&paths)?;

    println!("pages.count: {}", store.pages().len());
    for (title, page) in store.pages() {
        println!("page: {title} ({} bytes)", page.content.len());
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_show(runtime: &RuntimeOptions, args: ShowArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let store = open_store(&paths)?;

    let Some(page) = store.pages().get(&args.title) else {
        bail!("no such page: {}", args.title);
    };

    if args.raw {
        println!("{}", page.content);
    } else {
        println!("{}", parse_wiki_links(&page.content, |title| format!("<{title}>")));
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_edit(runtime: &RuntimeOptions, args: EditArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let mut store = open_store(&paths)?;

    let content = match args.content {
        Some(content) => content,
        None => io::read_to_string(io::stdin()).context("failed to read content from stdin")?,
    };

    let title = args.title.trim().to_string();
    if title.is_empty() {
        bail!("page title cannot be empty");
    }

    store.upsert_page(WikiPage {
        title: title.clone(),
        content,
    })?;

    println!("saved page: {title}");
    println!("pages.count: {}", store.pages().len());
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_remove(runtime: &RuntimeOptions, title: &str) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let mut store = open_store(&paths)?;

    if !store.remove_page(title)? {
        bail!("no such page: {title}");
    }

    println!("removed page: {title}");
    println!("pages.count: {}", store.pages().len());
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_links(runtime: &RuntimeOptions, title: &str) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let store = open_store(&paths)?;

    let Some(page) = store.pages().get(title) else {
        bail!("no such page: {title}");
    };

    let titles = collect_link_titles(&page.content);
    println!("links.count: {}", titles.len());
    for target in &titles {
        let marker = if store.pages().contains_key(target) {
            "ok"
        } else {
            "missing"
        };
        println!("link: {target} ({marker})");
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_export(runtime: &RuntimeOptions, args: ExportArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let store = open_store(&paths)?;

    let data = store.export_data()?;
    match args.output {
        Some(output) => {
            fs::write(&output, &data)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("exported: {}", output.display());
            println!("bytes: {}", data.len());
        }
        None => println!("{data}"),
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_import(runtime: &RuntimeOptions, path: &PathBuf) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let mut store = open_store(&paths)?;

    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    if !store.import_data(&raw)? {
        bail!(
            "import rejected: {} is not a JSON object of pages; existing pages are untouched",
            path.display()
        );
    }

    println!("imported: {}", path.display());
    println!("pages.count: {}", store.pages().len());
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_backups_list(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let store = open_store(&paths)?;

    let backups = store.backups()?;
    println!("backups.count: {} (cap {MAX_BACKUPS})", backups.len());
    for entry in &backups {
        println!("backup: {} pages={}", entry.timestamp, entry.data.len());
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_backups_restore(runtime: &RuntimeOptions, timestamp: u64) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let mut store = open_store(&paths)?;

    let known = store
        .backups()?
        .iter()
        .any(|entry| entry.timestamp == timestamp);
    store.restore_backup(timestamp)?;

    if known {
        println!("restored backup: {timestamp}");
        println!("pages.count: {}", store.pages().len());
    } else {
        println!("backup not found: {timestamp}");
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_status(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let status = inspect_runtime(&paths)?;
    let config = load_config(&paths.config_path)?;

    println!("runtime status");
    println!("wiki_name: {}", config.wiki_name());
    println!("wiki_root: {}", paths.wiki_root.display());
    println!("state_dir_exists: {}", format_flag(status.state_dir_exists));
    println!("data_dir_exists: {}", format_flag(status.data_dir_exists));
    println!("db_exists: {}", format_flag(status.db_exists));
    println!(
        "db_size_bytes: {}",
        status
            .db_size_bytes
            .map(|size| size.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    );
    println!("config_exists: {}", format_flag(status.config_exists));

    if status.db_exists {
        let store = open_store(&paths)?;
        println!("pages.count: {}", store.pages().len());
        println!("backups.count: {}", store.backups()?.len());
    }

    if !status.warnings.is_empty() {
        println!("warnings:");
        for warning in &status.warnings {
            println!("  - {warning}");
        }
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}
