//! Quill CLI - Keep favorite quotes at your fingertips
//!
//! Collect, shuffle, and sync quotes from the terminal.

use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, shells, Generator};
use quill_core::export::{parse_import, render_json_export, render_markdown_export};
use quill_core::notify::{NoticeKind, Notifier};
use quill_core::remote::{HttpRemoteApi, RemoteConfig, DEFAULT_BASE_URL};
use quill_core::storage::JsonFileStorage;
use quill_core::store::QuoteStore;
use quill_core::sync::{Conflict, ConflictLedger, Resolution, SyncEngine, DEFAULT_SYNC_INTERVAL};
use quill_core::Quote;
use serde::Serialize;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Collect, shuffle, and sync favorite quotes from the command line")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Optional directory for the local snapshot files
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Remote feed base URL
    #[arg(long, value_name = "URL")]
    remote_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new quote
    #[command(alias = "new")]
    Add {
        /// Quote text
        text: Vec<String>,
        /// Category label
        #[arg(short, long)]
        category: String,
    },
    /// List quotes
    List {
        /// Only show quotes in this category
        #[arg(long)]
        category: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a random quote
    Random {
        /// Only draw from this category
        #[arg(long)]
        category: Option<String>,
    },
    /// List categories with quote counts
    Categories {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import quotes from a JSON file
    Import {
        /// Path to a JSON array of text/category objects
        file: PathBuf,
    },
    /// Export quotes
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Sync quotes with the remote feed
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SyncCommands {
    /// Keep syncing at a fixed interval
    Watch {
        /// Seconds between cycles
        #[arg(long, default_value = "30")]
        interval: u64,
    },
    /// List pending conflicts
    Conflicts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a pending conflict
    Resolve {
        /// Conflict number as shown by `quill sync conflicts`
        number: usize,
        /// Which side to keep
        #[arg(long, value_enum)]
        keep: KeepSide,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] quill_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Please provide the quote text")]
    EmptyQuoteText,
    #[error("Please provide a category for the quote")]
    EmptyCategory,
    #[error("Conflict numbers start at 1")]
    ConflictNumberZero,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum ExportFormat {
    Json,
    Markdown,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum KeepSide {
    Local,
    Remote,
}

impl KeepSide {
    const fn resolution(self) -> Resolution {
        match self {
            Self::Local => Resolution::KeepLocal,
            Self::Remote => Resolution::KeepRemote,
        }
    }

    const fn describe(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// Notices go to stdout on success and stderr on failure.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str, kind: NoticeKind) {
        match kind {
            NoticeKind::Success => println!("{message}"),
            NoticeKind::Error => eprintln!("{message}"),
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("quill=info".parse().unwrap())
                .add_directive("quill_core=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let paths = resolve_data_dir(cli.data_dir);
    let remote_url = resolve_remote_url(cli.remote_url);

    match cli.command {
        Some(Commands::Add { text, category }) => run_add(&text, &category, &paths)?,
        Some(Commands::List { category, json }) => run_list(category.as_deref(), json, &paths)?,
        Some(Commands::Random { category }) => run_random(category.as_deref(), &paths)?,
        Some(Commands::Categories { json }) => run_categories(json, &paths)?,
        Some(Commands::Import { file }) => run_import(&file, &paths, &ConsoleNotifier)?,
        Some(Commands::Export { format, output }) => {
            run_export(format, output.as_deref(), &paths)?;
        }
        Some(Commands::Sync { command }) => match command {
            None => run_sync(&paths, &remote_url).await?,
            Some(SyncCommands::Watch { interval }) => {
                run_sync_watch(interval, &paths, &remote_url).await?;
            }
            Some(SyncCommands::Conflicts { json }) => run_sync_conflicts(json, &paths)?,
            Some(SyncCommands::Resolve { number, keep }) => {
                run_sync_resolve(number, keep, &paths)?;
            }
        },
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        None => {
            Cli::command().print_help().map_err(CliError::Io)?;
            println!();
        }
    }

    Ok(())
}

fn run_add(text_parts: &[String], category: &str, paths: &DataPaths) -> Result<(), CliError> {
    let text = normalize_field(&text_parts.join(" ")).ok_or(CliError::EmptyQuoteText)?;
    let category = normalize_field(category).ok_or(CliError::EmptyCategory)?;

    let mut store = open_store(paths);
    let id = store.add(Quote::new(text, category));
    store.persist();

    println!("{id}");
    Ok(())
}

#[derive(Debug, Serialize)]
struct QuoteListItem {
    id: String,
    text: String,
    category: String,
    remote_id: Option<i64>,
    updated_at: i64,
    synced: bool,
}

fn run_list(category: Option<&str>, as_json: bool, paths: &DataPaths) -> Result<(), CliError> {
    let store = open_store(paths);
    let quotes = store.filtered(category);

    if as_json {
        let items = quotes
            .iter()
            .map(|quote| quote_to_list_item(quote))
            .collect::<Vec<QuoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if quotes.is_empty() {
        match category {
            Some(name) => println!("No quotes found in category \"{name}\"."),
            None => println!("No quotes available. Please add one!"),
        }
        return Ok(());
    }

    for line in format_quote_lines(&quotes) {
        println!("{line}");
    }
    Ok(())
}

fn run_random(category: Option<&str>, paths: &DataPaths) -> Result<(), CliError> {
    let store = open_store(paths);

    if store.is_empty() {
        println!("No quotes available. Please add one!");
        return Ok(());
    }

    match store.random(category) {
        Some(quote) => println!("\"{}\" — ({})", quote.text, quote.category),
        None => {
            if let Some(name) = category {
                println!("No quotes found in category \"{name}\".");
            }
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct CategoryItem {
    name: String,
    count: usize,
}

fn run_categories(as_json: bool, paths: &DataPaths) -> Result<(), CliError> {
    let store = open_store(paths);
    let categories = store.categories();

    if as_json {
        let items = categories
            .into_iter()
            .map(|(name, count)| CategoryItem { name, count })
            .collect::<Vec<CategoryItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    for (name, count) in categories {
        println!("{name:<20}  {count}");
    }
    Ok(())
}

fn run_import(file: &Path, paths: &DataPaths, notifier: &dyn Notifier) -> Result<(), CliError> {
    let payload = std::fs::read_to_string(file)?;
    let seeds = parse_import(&payload)?;

    let mut store = open_store(paths);
    let count = store.import(seeds);
    store.persist();

    notifier.notify(
        &format!("Quotes imported successfully ({count} added)"),
        NoticeKind::Success,
    );
    Ok(())
}

fn run_export(
    format: ExportFormat,
    output_path: Option<&Path>,
    paths: &DataPaths,
) -> Result<(), CliError> {
    let store = open_store(paths);
    let rendered = match format {
        ExportFormat::Json => render_json_export(store.quotes())?,
        ExportFormat::Markdown => render_markdown_export(store.quotes()),
    };

    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}

async fn run_sync(paths: &DataPaths, remote_url: &str) -> Result<(), CliError> {
    let engine = build_engine(paths, remote_url)?;
    engine.sync_once().await?;
    Ok(())
}

async fn run_sync_watch(
    interval_secs: u64,
    paths: &DataPaths,
    remote_url: &str,
) -> Result<(), CliError> {
    let interval = if interval_secs == 0 {
        DEFAULT_SYNC_INTERVAL
    } else {
        Duration::from_secs(interval_secs)
    };

    let engine = build_engine(paths, remote_url)?;
    println!(
        "Syncing with {remote_url} every {}s (Ctrl-C to stop)",
        interval.as_secs()
    );
    engine.watch(interval).await;
    Ok(())
}

#[derive(Debug, Serialize)]
struct ConflictSideItem {
    text: String,
    category: String,
}

#[derive(Debug, Serialize)]
struct ConflictItem {
    number: usize,
    quote_id: String,
    remote_id: i64,
    detected_at: i64,
    detected_at_iso: String,
    local: ConflictSideItem,
    server: ConflictSideItem,
}

fn run_sync_conflicts(as_json: bool, paths: &DataPaths) -> Result<(), CliError> {
    let ledger = open_ledger(paths);
    let conflicts = ledger.list();

    if as_json {
        let items = conflicts
            .iter()
            .enumerate()
            .map(|(index, conflict)| conflict_to_item(index, conflict))
            .collect::<Vec<ConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No pending conflicts.");
        return Ok(());
    }

    for line in format_conflict_lines(conflicts) {
        println!("{line}");
    }
    println!();
    println!("Resolve with `quill sync resolve <NUMBER> --keep local|remote`");
    Ok(())
}

fn run_sync_resolve(number: usize, keep: KeepSide, paths: &DataPaths) -> Result<(), CliError> {
    if number == 0 {
        return Err(CliError::ConflictNumberZero);
    }

    let mut store = open_store(paths);
    let mut ledger = open_ledger(paths);
    let resolved = ledger.resolve(number - 1, keep.resolution(), &mut store)?;

    println!("Kept the {} version of {}", keep.describe(), resolved.id);
    Ok(())
}

fn run_completions(shell: CompletionShell, output_path: Option<&Path>) -> Result<(), CliError> {
    let mut command = Cli::command();
    let mut buffer = Vec::new();

    match shell {
        CompletionShell::Bash => generate_for_shell(shells::Bash, &mut command, &mut buffer),
        CompletionShell::Zsh => generate_for_shell(shells::Zsh, &mut command, &mut buffer),
        CompletionShell::Fish => generate_for_shell(shells::Fish, &mut command, &mut buffer),
    }

    if let Some(path) = output_path {
        std::fs::write(path, &buffer)?;
        println!("{}", path.display());
    } else {
        io::stdout().write_all(&buffer)?;
    }

    Ok(())
}

fn generate_for_shell<G: Generator>(
    generator: G,
    command: &mut clap::Command,
    buffer: &mut Vec<u8>,
) {
    generate(generator, command, "quill", buffer);
}

fn build_engine(
    paths: &DataPaths,
    remote_url: &str,
) -> Result<SyncEngine<HttpRemoteApi, ConsoleNotifier>, CliError> {
    let config = RemoteConfig::new(remote_url);
    tracing::debug!("using remote feed at {}", config.base_url);
    let remote = HttpRemoteApi::new(&config).map_err(quill_core::Error::from)?;
    let store = open_store(paths).into_shared();
    let ledger = open_ledger(paths).into_shared();
    Ok(SyncEngine::new(store, ledger, remote, ConsoleNotifier).with_page_size(config.page_size))
}

fn open_store(paths: &DataPaths) -> QuoteStore {
    QuoteStore::open(Box::new(JsonFileStorage::new(paths.quotes_file())))
}

fn open_ledger(paths: &DataPaths) -> ConflictLedger {
    ConflictLedger::open(Box::new(JsonFileStorage::new(paths.conflicts_file())))
}

fn quote_to_list_item(quote: &Quote) -> QuoteListItem {
    QuoteListItem {
        id: quote.id.to_string(),
        text: quote.text.clone(),
        category: quote.category.clone(),
        remote_id: quote.remote_id,
        updated_at: quote.updated_at,
        synced: !quote.is_pending(),
    }
}

fn format_quote_lines(quotes: &[&Quote]) -> Vec<String> {
    quotes
        .iter()
        .map(|quote| {
            let id = quote.id.to_string();
            let preview = text_preview(&quote.text, 56);
            let marker = if quote.is_pending() { "pending" } else { "synced" };
            format!("{id:<28}  {preview:<56}  {:<14}  {marker}", quote.category)
        })
        .collect()
}

fn conflict_to_item(index: usize, conflict: &Conflict) -> ConflictItem {
    ConflictItem {
        number: index + 1,
        quote_id: conflict.quote_id.to_string(),
        remote_id: conflict.remote_id,
        detected_at: conflict.detected_at,
        detected_at_iso: format_timestamp(conflict.detected_at),
        local: ConflictSideItem {
            text: conflict.local.text.clone(),
            category: conflict.local.category.clone(),
        },
        server: ConflictSideItem {
            text: conflict.server.text.clone(),
            category: conflict.server.category.clone(),
        },
    }
}

fn format_conflict_lines(conflicts: &[Conflict]) -> Vec<String> {
    conflicts
        .iter()
        .enumerate()
        .map(|(index, conflict)| {
            format!(
                "{:>2}  {}  remote={}  local: \"{}\" ({})  incoming: \"{}\" ({})",
                index + 1,
                format_timestamp(conflict.detected_at),
                conflict.remote_id,
                text_preview(&conflict.local.text, 30),
                conflict.local.category,
                text_preview(&conflict.server.text, 30),
                conflict.server.category,
            )
        })
        .collect()
}

fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

fn text_preview(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

fn normalize_field(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn resolve_data_dir(cli_data_dir: Option<PathBuf>) -> DataPaths {
    let dir = cli_data_dir
        .or_else(|| env::var_os("QUILL_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(default_data_dir);
    DataPaths { dir }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quill")
}

fn resolve_remote_url(cli_remote_url: Option<String>) -> String {
    cli_remote_url
        .or_else(|| env::var("QUILL_REMOTE_URL").ok())
        .and_then(|url| normalize_field(&url))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

/// Locations of the snapshot files under the data directory.
#[derive(Debug, Clone)]
struct DataPaths {
    dir: PathBuf,
}

impl DataPaths {
    fn quotes_file(&self) -> PathBuf {
        self.dir.join("quotes.json")
    }

    fn conflicts_file(&self) -> PathBuf {
        self.dir.join("conflicts.json")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    use pretty_assertions::assert_eq;
    use quill_core::notify::NullNotifier;

    use super::*;

    #[test]
    fn normalize_field_trims_and_rejects_empty() {
        assert_eq!(normalize_field("  hello  "), Some("hello".to_string()));
        assert_eq!(normalize_field(" \n\t "), None);
    }

    #[test]
    fn text_preview_truncates_with_ellipsis() {
        let preview = text_preview("This is a very long sentence that should be shortened", 20);
        assert_eq!(preview, "This is a very lo...");
        assert_eq!(text_preview("short", 20), "short");
    }

    #[test]
    fn text_preview_collapses_whitespace() {
        assert_eq!(text_preview("one\n  two\tthree", 40), "one two three");
    }

    #[test]
    fn format_timestamp_renders_utc() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
    }

    #[test]
    fn keep_side_maps_to_resolution() {
        assert_eq!(KeepSide::Local.resolution(), Resolution::KeepLocal);
        assert_eq!(KeepSide::Remote.resolution(), Resolution::KeepRemote);
        assert_eq!(KeepSide::Local.describe(), "local");
        assert_eq!(KeepSide::Remote.describe(), "remote");
    }

    #[test]
    fn resolve_remote_url_prefers_flag() {
        assert_eq!(
            resolve_remote_url(Some("https://feed.example.com".to_string())),
            "https://feed.example.com"
        );
    }

    #[test]
    fn run_add_persists_quote_and_rejects_blank_fields() {
        let paths = unique_test_data_dir();

        run_add(
            &["Stay".to_string(), "hungry.".to_string()],
            "Motivation",
            &paths,
        )
        .unwrap();

        let store = open_store(&paths);
        // Three starter quotes plus the new one
        assert_eq!(store.len(), 4);
        let added = &store.quotes()[3];
        assert_eq!(added.text, "Stay hungry.");
        assert_eq!(added.category, "Motivation");
        assert!(added.is_pending());

        assert!(matches!(
            run_add(&[" ".to_string()], "Motivation", &paths),
            Err(CliError::EmptyQuoteText)
        ));
        assert!(matches!(
            run_add(&["Text".to_string()], "  ", &paths),
            Err(CliError::EmptyCategory)
        ));

        cleanup_data_dir(&paths);
    }

    #[test]
    fn run_import_appends_and_rejects_malformed_payloads() {
        let paths = unique_test_data_dir();
        let import_path = paths.dir.join("incoming.json");
        std::fs::create_dir_all(&paths.dir).unwrap();
        std::fs::write(
            &import_path,
            r#"[{"text": "A", "category": "X"}, {"text": "B", "category": "Y"}]"#,
        )
        .unwrap();

        run_import(&import_path, &paths, &NullNotifier).unwrap();
        assert_eq!(open_store(&paths).len(), 5);

        std::fs::write(&import_path, r#"{"text": "A"}"#).unwrap();
        let error = run_import(&import_path, &paths, &NullNotifier).unwrap_err();
        assert!(matches!(
            error,
            CliError::Core(quill_core::Error::InvalidInput(_))
        ));
        // Rejected import leaves the snapshot unchanged
        assert_eq!(open_store(&paths).len(), 5);

        cleanup_data_dir(&paths);
    }

    #[test]
    fn run_export_writes_importable_json_file() {
        let paths = unique_test_data_dir();
        let output_path = paths.dir.join("export.json");
        std::fs::create_dir_all(&paths.dir).unwrap();

        run_add(&["Only one".to_string()], "Test", &paths).unwrap();
        run_export(ExportFormat::Json, Some(&output_path), &paths).unwrap();

        let exported = std::fs::read_to_string(&output_path).unwrap();
        let seeds = parse_import(&exported).unwrap();
        assert_eq!(seeds.len(), 4);
        assert!(seeds.iter().any(|seed| seed.text == "Only one"));

        cleanup_data_dir(&paths);
    }

    #[test]
    fn run_export_renders_markdown_blockquotes() {
        let paths = unique_test_data_dir();
        let output_path = paths.dir.join("export.md");
        std::fs::create_dir_all(&paths.dir).unwrap();

        run_export(ExportFormat::Markdown, Some(&output_path), &paths).unwrap();

        let exported = std::fs::read_to_string(&output_path).unwrap();
        assert!(exported.starts_with("> "));
        assert!(exported.contains("> — Motivation"));

        cleanup_data_dir(&paths);
    }

    #[test]
    fn run_sync_resolve_validates_number() {
        let paths = unique_test_data_dir();

        assert!(matches!(
            run_sync_resolve(0, KeepSide::Local, &paths),
            Err(CliError::ConflictNumberZero)
        ));

        // No pending conflicts recorded yet
        let error = run_sync_resolve(1, KeepSide::Local, &paths).unwrap_err();
        assert!(matches!(
            error,
            CliError::Core(quill_core::Error::NotFound(_))
        ));

        cleanup_data_dir(&paths);
    }

    #[test]
    fn run_completions_writes_bash_script_file() {
        let output_path = std::env::temp_dir().join(format!(
            "quill-completions-test-{}.bash",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |duration| duration.as_nanos())
        ));

        run_completions(CompletionShell::Bash, Some(&output_path)).unwrap();

        let script = std::fs::read_to_string(&output_path).unwrap();
        assert!(script.contains("_quill()"));
        assert!(script.contains("complete -F _quill"));

        let _ = std::fs::remove_file(output_path);
    }

    #[test]
    fn format_quote_lines_marks_sync_state() {
        let pending = Quote::new("Pending quote", "X");
        let mut synced = Quote::new("Synced quote", "Y");
        synced.remote_id = Some(7);

        let lines = format_quote_lines(&[&pending, &synced]);
        assert!(lines[0].ends_with("pending"));
        assert!(lines[1].ends_with("synced"));
    }

    fn unique_test_data_dir() -> DataPaths {
        static NEXT_TEST_DIR_ID: AtomicU64 = AtomicU64::new(0);

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_nanos());
        let sequence = NEXT_TEST_DIR_ID.fetch_add(1, Ordering::Relaxed);
        DataPaths {
            dir: std::env::temp_dir().join(format!("quill-cli-test-{timestamp}-{sequence}")),
        }
    }

    fn cleanup_data_dir(paths: &DataPaths) {
        let _ = std::fs::remove_dir_all(&paths.dir);
    }
}
