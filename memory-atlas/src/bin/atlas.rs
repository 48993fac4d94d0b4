//! Command-line access to the atlas engine.
//!
//! Usage:
//!   atlas info <dataset.json>
//!   atlas project <dataset.json> --algorithm <pca|umap|tsne>
//!   atlas precompute <dataset.json> --output <out.json> [--algorithms pca,umap]
//!   atlas search <dataset.json> <query> [--endpoint URL] [--offline]
//!
//! Examples:
//!   atlas precompute ./exports/memories.json -o ./exports/memories.projected.json
//!   atlas search ./exports/memories.json "deployment rollback" --endpoint http://localhost:5001

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use memory_atlas::{
    Algorithm, AtlasConfig, Bounds, Dataset, Embedder, EmbedderChain, HttpEmbedder,
    LocalReducer, NullEmbedder, ProjectionController, ProjectionReport, SearchReport, Session,
};

#[derive(Parser)]
#[command(name = "atlas")]
#[command(about = "Inspect, project and search document embedding datasets")]
struct Args {
    /// Engine configuration (JSON); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print dataset metadata and consistency notes
    Info {
        /// Dataset file (.json)
        dataset: PathBuf,
    },
    /// Compute a layout and print its bounds
    Project {
        /// Dataset file (.json)
        dataset: PathBuf,

        /// Projection algorithm (pca, umap, tsne)
        #[arg(short, long, default_value = "umap")]
        algorithm: Algorithm,
    },
    /// Compute layouts offline and write them into a copy of the dataset
    Precompute {
        /// Dataset file (.json)
        dataset: PathBuf,

        /// Output file; may be the input file to update it in place
        #[arg(short, long)]
        output: PathBuf,

        /// Algorithms to compute (comma separated)
        #[arg(short, long, value_delimiter = ',', default_values = ["pca", "umap"])]
        algorithms: Vec<Algorithm>,
    },
    /// Search the dataset and print the top matches
    Search {
        /// Dataset file (.json)
        dataset: PathBuf,

        /// Query text
        query: String,

        /// Embedding server endpoint (overrides ATLAS_EMBED_ENDPOINT)
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Skip the embedding server and match text only
        #[arg(long)]
        offline: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = match &args.config {
        Some(path) => AtlasConfig::load(path)?,
        None => AtlasConfig::default(),
    };
    config.validate()?;

    match args.command {
        Command::Info { dataset } => info(&dataset),
        Command::Project { dataset, algorithm } => project(config, &dataset, algorithm).await,
        Command::Precompute {
            dataset,
            output,
            algorithms,
        } => precompute(config, &dataset, &output, &algorithms).await,
        Command::Search {
            dataset,
            query,
            endpoint,
            offline,
        } => search(config, &dataset, &query, endpoint, offline).await,
    }
}

fn info(path: &Path) -> anyhow::Result<()> {
    let dataset = Dataset::load(path)?;
    let meta = &dataset.metadata;

    println!("Dataset: {}", meta.name);
    let model = if meta.embedding_model.is_empty() {
        "unknown"
    } else {
        meta.embedding_model.as_str()
    };
    println!("  Model:       {model}");
    println!("  Dimensions:  {}", dataset.effective_dim());
    println!("  Documents:   {}", dataset.len());
    let precomputed: Vec<&str> = dataset
        .precomputed_algorithms()
        .iter()
        .map(|a| a.as_str())
        .collect();
    println!(
        "  Precomputed: {}",
        if precomputed.is_empty() {
            "none".to_string()
        } else {
            precomputed.join(", ")
        }
    );

    let notes = dataset.validate();
    if !notes.is_empty() {
        println!("\nNotes:");
        for note in notes {
            println!("  - {note}");
        }
    }
    Ok(())
}

async fn project(config: AtlasConfig, path: &Path, algorithm: Algorithm) -> anyhow::Result<()> {
    let dataset = Dataset::load(path)?;
    let reducer = LocalReducer::new(config.projection.clone());
    let mut session = Session::new(config);
    session.load_dataset(dataset);

    match session.set_algorithm(algorithm, &reducer).await {
        ProjectionReport::Installed { source, .. } => {
            println!("Layout: {algorithm} ({source:?})");
            if let Some(bounds) = Bounds::of(session.positions()) {
                println!("  Points: {}", session.positions().len());
                println!(
                    "  Min:    [{:.2}, {:.2}, {:.2}]",
                    bounds.min[0], bounds.min[1], bounds.min[2]
                );
                println!(
                    "  Max:    [{:.2}, {:.2}, {:.2}]",
                    bounds.max[0], bounds.max[1], bounds.max[2]
                );
                println!("  Radius: {:.2}", bounds.radius());
            }
            Ok(())
        }
        ProjectionReport::Failed(reason) => anyhow::bail!("{reason}"),
        ProjectionReport::Stale | ProjectionReport::NoDataset => {
            anyhow::bail!("projection did not complete")
        }
    }
}

async fn precompute(
    config: AtlasConfig,
    path: &Path,
    output: &Path,
    algorithms: &[Algorithm],
) -> anyhow::Result<()> {
    let dataset = Dataset::load(path)?;
    let reducer = LocalReducer::new(config.projection.clone());
    let controller = ProjectionController::new(config.projection);

    let projected = controller.precompute(&dataset, algorithms, &reducer).await?;
    projected.save(output)?;

    let names: Vec<&str> = algorithms.iter().map(|a| a.as_str()).collect();
    println!(
        "Wrote {} ({} documents, layouts: {})",
        output.display(),
        projected.len(),
        names.join(", ")
    );
    Ok(())
}

async fn search(
    config: AtlasConfig,
    path: &Path,
    query: &str,
    endpoint: Option<String>,
    offline: bool,
) -> anyhow::Result<()> {
    let dataset = Dataset::load(path)?;

    let embedder: Arc<dyn Embedder> = if offline {
        Arc::new(NullEmbedder)
    } else {
        let mut embedder_config = config.embedder.clone();
        if let Some(endpoint) = endpoint {
            embedder_config = embedder_config.with_endpoint(endpoint);
        }
        Arc::new(EmbedderChain::new().with_provider(Arc::new(HttpEmbedder::new(embedder_config)?)))
    };

    let preview_count = config.search.preview_count;
    let mut session = Session::new(config);
    session.load_dataset(dataset);

    let SearchReport::Completed {
        mode,
        matches,
        status,
    } = session.search(query, embedder.as_ref()).await
    else {
        anyhow::bail!("search did not complete");
    };

    println!("Search: \"{query}\" ({mode:?}, {matches} matches, {status})");
    if let Some(dataset) = session.dataset() {
        for preview in session.search_outcome().previews(dataset, preview_count) {
            println!(
                "  [{:>3}] {:.3}  {}  {}",
                preview.index, preview.score, preview.id, preview.snippet
            );
        }
    }
    Ok(())
}
