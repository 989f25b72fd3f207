use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use social_pulse::ops;
use social_pulse::store::DocumentStore;
use social_pulse::PipelineConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pulse",
    version,
    about = "Engagement, sentiment, clustering and trend analytics for social-media posts"
)]
struct Cli {
    /// SQLite document store. Without it, documents are read as a JSON array from stdin
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// TOML file overriding the default pipeline configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Collection to read with --db (default: the configured target collection)
    #[arg(long, global = true)]
    collection: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive cleaned_content from content
    Clean,
    /// Compute batch-relative engagement scores
    Engagement,
    /// Score sentiment of cleaned_content
    Sentiment,
    /// Cluster documents on TF-IDF and sentiment features
    Cluster {
        /// Number of clusters
        #[arg(short, long)]
        clusters: Option<usize>,
        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Rank suggested communities and platforms by mean engagement
    Rank,
    /// Monthly keyword mentions and category mention counts
    Trends {
        /// Keyword to track (case-insensitive)
        #[arg(short, long)]
        keyword: Option<String>,
    },
    /// Forecast monthly document counts per category
    Forecast {
        /// Number of future months
        #[arg(long)]
        horizon: Option<usize>,
    },
    /// Merge source collections into the target collection (requires --db)
    Merge,
    /// Replace the top-posts collection with the highest-scoring documents (requires --db)
    Snapshot {
        /// Number of documents to keep
        #[arg(short = 'n', long)]
        top: Option<usize>,
    },
    /// Merge, analyze, persist derived fields and snapshot (requires --db)
    Run,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let mut source = Source::open(cli.db.as_ref(), cli.collection.as_deref(), &config)?;

    let output = match cli.command {
        Commands::Clean => per_document(&mut source, ops::op_clean)?,
        Commands::Engagement => per_document(&mut source, ops::op_engagement)?,
        Commands::Sentiment => per_document(&mut source, ops::op_sentiment)?,
        Commands::Cluster { clusters, seed } => {
            if let Some(k) = clusters {
                config.clusters = k.max(1);
            }
            if let Some(seed) = seed {
                config.seed = seed;
            }
            let rows = source.rows()?;
            let mut out = ops::op_cluster(&rows, &config);
            source.persist(&ops::into_rows(out["documents"].clone()))?;
            if let (true, Some(obj)) = (source.is_store(), out.as_object_mut()) {
                obj.remove("documents");
            }
            out
        }
        Commands::Rank => {
            let rows = source.rows()?;
            json!({
                "communities": ops::op_rank_communities(&rows, &config),
                "platforms": ops::op_rank_platforms(&rows, &config),
            })
        }
        Commands::Trends { keyword } => {
            if let Some(keyword) = keyword {
                config.trend_keyword = keyword;
            }
            let rows = source.rows()?;
            json!({
                "keyword_trend": ops::op_trends(&rows, &config),
                "category_mentions": ops::op_category_mentions(&rows, &config),
            })
        }
        Commands::Forecast { horizon } => {
            if let Some(h) = horizon {
                config.forecast_horizon = h;
            }
            ops::op_forecast(&source.rows()?, &config)
        }
        Commands::Merge => merge(source.store_mut("merge")?, &config)?,
        Commands::Snapshot { top } => {
            if let Some(n) = top {
                config.top_n = n;
            }
            snapshot(source.store_mut("snapshot")?, &config)?
        }
        Commands::Run => run(source.store_mut("run")?, &config)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Where a command's documents come from: stdin, or one store collection.
enum Source {
    Stdin,
    Store {
        store: DocumentStore,
        collection: String,
    },
}

impl Source {
    fn open(db: Option<&PathBuf>, collection: Option<&str>, config: &PipelineConfig) -> Result<Self> {
        let Some(path) = db else {
            return Ok(Self::Stdin);
        };
        let store = DocumentStore::open_or_create(&path.to_string_lossy())
            .with_context(|| format!("opening store at {}", path.display()))?;
        Ok(Self::Store {
            store,
            collection: collection.unwrap_or(config.collections.target.as_str()).to_string(),
        })
    }

    fn is_store(&self) -> bool {
        matches!(self, Self::Store { .. })
    }

    fn rows(&self) -> Result<Vec<Value>> {
        match self {
            Self::Stdin => read_stdin_json(),
            Self::Store { store, collection } => store
                .load(collection)
                .with_context(|| format!("loading collection '{collection}'")),
        }
    }

    /// Write derived fields back when reading from a store.
    fn persist(&mut self, rows: &[Value]) -> Result<()> {
        if let Self::Store { store, collection } = self {
            let updated = store
                .update_fields(collection, &ops::derived_updates(rows))
                .with_context(|| format!("updating collection '{collection}'"))?;
            tracing::info!(collection = %collection, updated, "persisted derived fields");
        }
        Ok(())
    }

    fn store_mut(&mut self, command: &str) -> Result<&mut DocumentStore> {
        match self {
            Self::Store { store, .. } => Ok(store),
            Self::Stdin => bail!("`{command}` needs a document store; pass --db <path>"),
        }
    }
}

fn read_stdin_json() -> Result<Vec<Value>> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read stdin")?;
    let parsed: Value = serde_json::from_str(&buf).context("invalid JSON on stdin")?;
    Ok(match parsed {
        Value::Array(arr) => arr,
        single => vec![single],
    })
}

/// Run a per-document op. From stdin the annotated documents are printed;
/// from a store they are persisted and a short report is printed instead.
fn per_document(source: &mut Source, op: fn(&[Value]) -> Value) -> Result<Value> {
    let rows = source.rows()?;
    let annotated = op(&rows);
    if !source.is_store() {
        return Ok(annotated);
    }
    let docs = ops::into_rows(annotated);
    source.persist(&docs)?;
    Ok(ops::batch_report(&docs))
}

fn merge(store: &mut DocumentStore, config: &PipelineConfig) -> Result<Value> {
    let target = &config.collections.target;
    let mut sources = Vec::with_capacity(config.collections.sources.len());
    for name in &config.collections.sources {
        let docs = store
            .load(name)
            .with_context(|| format!("loading source collection '{name}'"))?;
        sources.push((name.clone(), docs));
    }
    let existing = store
        .record_ids(target)
        .with_context(|| format!("reading record ids of '{target}'"))?;

    let mut report = ops::op_merge(&sources, &existing, config);
    let documents = ops::into_rows(report["documents"].take());
    let inserted = store
        .insert_new(target, &documents)
        .with_context(|| format!("inserting into '{target}'"))?;
    report["inserted"] = json!(inserted);
    if let Some(obj) = report.as_object_mut() {
        obj.remove("documents");
    }
    Ok(report)
}

fn snapshot(store: &mut DocumentStore, config: &PipelineConfig) -> Result<Value> {
    let target = &config.collections.target;
    let top_posts = &config.collections.top_posts;
    let rows = store
        .load(target)
        .with_context(|| format!("loading collection '{target}'"))?;

    let top = ops::into_rows(ops::op_top_engagement(&rows, config.top_n));
    if top.is_empty() {
        return Ok(json!({
            "collection": top_posts,
            "written": 0,
            "warning": "no scored documents; collection left untouched",
        }));
    }
    let written = store
        .replace_collection(top_posts, &top)
        .with_context(|| format!("replacing collection '{top_posts}'"))?;
    tracing::info!(collection = %top_posts, written, "wrote top engagement snapshot");
    Ok(json!({ "collection": top_posts, "written": written }))
}

fn run(store: &mut DocumentStore, config: &PipelineConfig) -> Result<Value> {
    let merged = merge(store, config)?;

    let target = &config.collections.target;
    let rows = store
        .load(target)
        .with_context(|| format!("loading collection '{target}'"))?;
    let mut result = ops::run_pipeline(&rows, config);

    let documents = ops::into_rows(result["documents"].take());
    let updated = store
        .update_fields(target, &ops::derived_updates(&documents))
        .with_context(|| format!("updating collection '{target}'"))?;
    tracing::info!(collection = %target, updated, "persisted derived fields");

    if let Some(obj) = result.as_object_mut() {
        obj.remove("documents");
        obj.insert("merge".into(), merged);
        obj.insert("updated".into(), json!(updated));
        obj.insert("snapshot".into(), snapshot(store, config)?);
    }
    Ok(result)
}
