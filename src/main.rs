//! shaare-store operator CLI.
//!
//! Runs single operations against the configured datastore as a logged-in user.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;

use shaare_store::app::App;
use shaare_store::datastore::DatastoreFile;
use shaare_store::managers::bookmark_manager::BookmarkServiceTrait;
use shaare_store::types::bookmark::{tags_from_str, BookmarkDraft};
use shaare_store::types::render::BookmarkView;
use shaare_store::types::search::{Pagination, RequestContext, SearchRequest, Visibility};

/// Command-line arguments for the shaare-store CLI
#[derive(Parser)]
#[command(name = "shaare-store", version, about = "Single-file bookmark datastore")]
struct Args {
    /// Path to the config file (defaults to $SHAARE_STORE_CONFIG or the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add a bookmark; an empty URL creates a note
    Add {
        url: String,
        #[arg(short, long, default_value = "")]
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Tags, separated by spaces or commas
        #[arg(long, default_value = "")]
        tags: String,
        #[arg(long)]
        private: bool,
        #[arg(long)]
        sticky: bool,
    },
    /// Print one bookmark as JSON
    Get { id: u64 },
    /// Delete one bookmark
    Delete { id: u64 },
    /// Search bookmarks by tags and text
    Search {
        /// Required tags; prefix with '-' to exclude
        #[arg(long, default_value = "")]
        tags: String,
        #[arg(long, default_value = "")]
        term: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        per_page: Option<usize>,
        /// all, public or private
        #[arg(long, default_value = "all")]
        visibility: String,
        #[arg(long)]
        untagged: bool,
    },
    /// Print tag usage counts
    Tags {
        /// Only count among bookmarks carrying these tags
        filter: Vec<String>,
    },
    /// Check that the datastore file decodes cleanly
    Verify,
}

fn main() -> ExitCode {
    let args = Args::parse();
    shaare_store::logging::init(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.config.map(|p| p.to_string_lossy().to_string());
    let open = || App::new(config.clone());
    let ctx = RequestContext::admin();

    match args.command {
        Command::Add {
            url,
            title,
            description,
            tags,
            private,
            sticky,
        } => {
            let app = open()?;
            let separator = &app.settings().tags_separator;
            let draft = BookmarkDraft::new(&url, &title)
                .with_description(&description)
                .with_tags(tags_from_str(&tags, separator))
                .private(private)
                .sticky(sticky);
            let id = app.store.add(&ctx, draft)?;
            let stored = app.store.get(&ctx, id)?;
            println!("{}\t{}", id, stored.permalink());
        }
        Command::Get { id } => {
            let app = open()?;
            let bookmark = app.store.get(&ctx, id)?;
            println!("{}", serde_json::to_string_pretty(&bookmark)?);
        }
        Command::Delete { id } => {
            let app = open()?;
            let removed = app.store.delete(&ctx, id)?;
            println!("deleted {}\t{}", removed.id, removed.display_url());
        }
        Command::Search {
            tags,
            term,
            page,
            per_page,
            visibility,
            untagged,
        } => {
            let app = open()?;
            let separator = app.settings().tags_separator.clone();
            let visibility = Visibility::parse(&visibility)
                .ok_or_else(|| format!("invalid visibility: {}", visibility))?;
            let per_page = per_page.unwrap_or(app.settings().links_per_page).max(1);
            let tags = if separator.is_empty() {
                tags
            } else {
                tags.replace(separator.as_str(), " ")
            };
            let tags: Vec<String> = tags.split_whitespace().map(str::to_string).collect();
            let request = SearchRequest::new()
                .tags(tags)
                .term(&term)
                .untagged_only(untagged)
                .paginate(Pagination::page(page, per_page));
            let result = app.store.search(&ctx.with_visibility(visibility), &request)?;
            for bookmark in &result.bookmarks {
                let view = BookmarkView::new(bookmark, result.highlights.get(&bookmark.id));
                println!(
                    "{}\t{}\t{}\t{}",
                    view.id,
                    view.highlighted_title(),
                    view.url,
                    view.tags.join(separator.as_str())
                );
            }
            println!(
                "-- {} result(s), page {}/{}",
                result.total_count,
                result.page(),
                result.last_page()
            );
        }
        Command::Tags { filter } => {
            let app = open()?;
            for (tag, count) in app.store.bookmarks_count_per_tag(&ctx, &filter)? {
                println!("{}\t{}", count, tag);
            }
        }
        Command::Verify => verify(config.clone())?,
    }
    Ok(())
}

fn verify(config: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    use shaare_store::services::settings_engine::{SettingsEngine, SettingsEngineTrait};

    let settings = SettingsEngine::new(config).load()?;
    let file = DatastoreFile::new(&settings.datastore_path, settings.disk_space_margin_bytes);
    if !file.exists() {
        println!("{}: no datastore yet", file.path().display());
        return Ok(());
    }
    let collection = file.load()?;
    println!(
        "{}: ok, {} bookmark(s), next id {}",
        file.path().display(),
        collection.len(),
        collection.next_id
    );
    Ok(())
}
