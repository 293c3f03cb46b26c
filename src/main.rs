//! redditfreq - word frequencies over scraped Reddit posts

use analyzer::{read_post_file, FilePostSource, Tokenizer, WordFrequencyAnalyzer};
use anyhow::Result;
use clap::{Parser, Subcommand};
use database::Database;
use redditfreq_core::{
    AnalysisRun, AnalyzerConfig, CoreError, DataSource, ErrorExt, ErrorReporter,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

type Analyzer = WordFrequencyAnalyzer<Database, FilePostSource, Database>;

#[derive(Parser)]
#[command(name = "redditfreq")]
#[command(about = "Word frequency analysis of scraped Reddit posts")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count words in scraped posts
    Analyze {
        /// Recount everything instead of only new posts
        #[arg(long)]
        full: bool,
        /// Where to read posts from: database, files or both
        #[arg(long, default_value = "both")]
        source: DataSource,
        /// Restrict the run to one subreddit
        #[arg(long)]
        subreddit: Option<String>,
        /// Number of top words in the summary
        #[arg(long)]
        top_n: Option<usize>,
        /// Also list words matching this pattern (`*` and `?` wildcards)
        #[arg(long)]
        search: Option<String>,
        /// Also show per-subreddit counts of this word
        #[arg(long)]
        word: Option<String>,
    },

    /// Show the most frequent words
    Top {
        /// Number of words
        #[arg(short = 'n', long)]
        count: Option<usize>,
        /// Filter by subreddit
        #[arg(long)]
        subreddit: Option<String>,
    },

    /// Find words by substring or wildcard pattern
    Search {
        pattern: String,
        /// Filter by subreddit
        #[arg(long)]
        subreddit: Option<String>,
    },

    /// Show how often a word occurs in each subreddit
    Word { word: String },

    /// List subreddits with counted posts
    Subreddits,

    /// List stored posts
    Posts {
        /// Filter by subreddit
        #[arg(long)]
        subreddit: Option<String>,
        /// Maximum number of posts (default 100)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show database statistics
    Stats,

    /// Store posts from a scraped JSON file and count the new ones
    Import { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AnalyzerConfig::load_or_default(cli.config.as_deref())?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting redditfreq with database {}", config.database_url);

    match run(cli.command, &config).await {
        Ok(()) => Ok(()),
        Err(e @ CoreError::NoData { .. }) => {
            ErrorReporter::new().report(&e);
            println!("{}", e.user_friendly_message());
            Ok(())
        }
        Err(e) => {
            ErrorReporter::new().report(&e);
            Err(anyhow::anyhow!(e.user_friendly_message()))
        }
    }
}

async fn run(command: Commands, config: &AnalyzerConfig) -> Result<(), CoreError> {
    let mut db = Database::new(config.database_url.clone());
    db.connect().await?;
    db.run_migrations().await?;

    let analyzer = WordFrequencyAnalyzer::new(
        db.clone(),
        FilePostSource::new(&config.data_dir),
        db.clone(),
    )
    .with_tokenizer(Tokenizer::from_config(&config.tokenizer));

    let result = dispatch(command, config, &db, &analyzer).await;
    db.close().await;
    result
}

async fn dispatch(
    command: Commands,
    config: &AnalyzerConfig,
    db: &Database,
    analyzer: &Analyzer,
) -> Result<(), CoreError> {
    match command {
        Commands::Analyze {
            full,
            source,
            subreddit,
            top_n,
            search,
            word,
        } => {
            let run = AnalysisRun::new(source, !full, subreddit.as_deref());
            let outcome = analyzer.analyze(&run).await?;
            let summary = analyzer
                .summarize_run(
                    &outcome,
                    top_n.unwrap_or(config.default_top_n),
                    search.as_deref(),
                    word.as_deref(),
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Top { count, subreddit } => {
            let n = count.unwrap_or(config.default_top_n);
            for (rank, (word, count)) in analyzer
                .top_words(n, subreddit.as_deref())
                .await?
                .into_iter()
                .enumerate()
            {
                println!("{:>4}. {:<24} {}", rank + 1, word, count);
            }
        }
        Commands::Search { pattern, subreddit } => {
            let matches = analyzer
                .search_words(&pattern, subreddit.as_deref())
                .await?;
            if matches.is_empty() {
                println!("No words match '{}'", pattern);
            }
            for (word, count) in matches {
                println!("{:<24} {}", word, count);
            }
        }
        Commands::Word { word } => match analyzer.get_word_details(&word).await? {
            Some(details) => {
                println!("{}: {}", details.word, details.total_count);
                for (subreddit, count) in &details.per_subreddit {
                    println!("  r/{:<22} {}", subreddit, count);
                }
            }
            None => println!("'{}' has not been seen in any analyzed post", word),
        },
        Commands::Subreddits => {
            for subreddit in analyzer.list_subreddits().await? {
                println!("r/{}", subreddit);
            }
        }
        Commands::Posts { subreddit, limit } => {
            for post in db.list_posts(subreddit.as_deref(), limit).await? {
                println!("{:<10} r/{:<20} {}", post.id, post.subreddit, post.title);
            }
        }
        Commands::Stats => {
            let stats = db.get_database_stats().await?;
            println!("Posts:           {}", stats.total_posts);
            println!("Processed posts: {}", stats.processed_posts);
            println!("Unique words:    {}", stats.unique_words);
            println!("Subreddits:      {}", stats.subreddits.join(", "));
        }
        Commands::Import { file } => import(&file, db, analyzer).await?,
    }
    Ok(())
}

/// Saves the file's posts, then folds every not yet counted database post
/// into the totals.
async fn import(file: &Path, db: &Database, analyzer: &Analyzer) -> Result<(), CoreError> {
    let posts = read_post_file(file).await?;
    let saved = db.save_posts(&posts).await?;
    tracing::info!(
        "Imported {} of {} posts from {}",
        saved,
        posts.len(),
        file.display()
    );
    println!("Saved {} new posts from {}", saved, file.display());

    let outcome = analyzer
        .analyze(&AnalysisRun::incremental(DataSource::Database))
        .await?;
    println!(
        "Counted {} posts, {} distinct words overall",
        outcome.posts_processed,
        outcome.counts.len()
    );
    Ok(())
}
