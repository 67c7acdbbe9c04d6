mod input;
mod tokenizer;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use termindex::kmeans::{self, closest_centroid_to_info, cluster_sizes, purity, top_classes};
use termindex::persist::{deserialise_from_file, load_centroids, save_centroids, serialise_to_file};
use termindex::{IndexError, KMeansConfig, Termination, TotalIndex};
use tracing_subscriber::{fmt, EnvFilter};

use crate::tokenizer::Tokenizer;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build term index snapshots and cluster them with k-means", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index snapshot from JSON/JSONL documents
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Snapshot file to write
        #[arg(long)]
        output: PathBuf,
        /// Stopword file, one word per line (defaults to a built-in English list)
        #[arg(long)]
        stopwords: Option<PathBuf>,
    },
    /// Cluster the documents of a snapshot
    Cluster {
        #[arg(long)]
        index: PathBuf,
        #[arg(short)]
        k: usize,
        /// Random seed; drawn at random and logged when absent
        #[arg(long, env = "TERMINDEX_SEED")]
        seed: Option<u64>,
        /// Worker threads (defaults to the number of logical cores)
        #[arg(long, env = "TERMINDEX_WORKERS")]
        workers: Option<usize>,
        #[arg(long, default_value_t = 100)]
        max_iterations: usize,
        /// Write the snapshot with cluster assignments here
        #[arg(long)]
        output: Option<PathBuf>,
        /// Write the centroids here, for `classify`
        #[arg(long)]
        centroids: Option<PathBuf>,
        /// Write a JSON report here
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Find the closest cluster for a plain-text document
    Classify {
        /// Clustered snapshot
        #[arg(long)]
        index: PathBuf,
        #[arg(long)]
        centroids: PathBuf,
        /// Text file holding the document body
        #[arg(long)]
        document: PathBuf,
        #[arg(long)]
        stopwords: Option<PathBuf>,
        /// How many of the cluster's classes to print
        #[arg(long, default_value_t = 8)]
        top: usize,
    },
    /// Check the structural invariants of a snapshot
    Verify {
        #[arg(long)]
        index: PathBuf,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, stopwords } => build_index(&input, &output, stopwords.as_deref()),
        Commands::Cluster { index, k, seed, workers, max_iterations, output, centroids, report } => {
            let mut config = KMeansConfig::new(k).with_max_iterations(max_iterations);
            if let Some(workers) = workers {
                config = config.with_workers(workers);
            }
            let outputs = ClusterOutputs { snapshot: output, centroids, report };
            cluster_index(&index, &config, seed, &outputs)
        }
        Commands::Classify { index, centroids, document, stopwords, top } => {
            classify(&index, &centroids, &document, stopwords.as_deref(), top)
        }
        Commands::Verify { index } => {
            let ti = deserialise_from_file(&index)?;
            ti.verify()?;
            println!("{}: {} documents, {} terms, ok", index.display(), ti.document_count(), ti.term_count());
            Ok(())
        }
    }
}

fn load_tokenizer(stopwords: Option<&Path>) -> Result<Tokenizer> {
    match stopwords {
        Some(path) => Tokenizer::from_stopword_file(path),
        None => Ok(Tokenizer::english()),
    }
}

fn build_index(input: &Path, output: &Path, stopwords: Option<&Path>) -> Result<()> {
    let tokenizer = load_tokenizer(stopwords)?;
    let files = input::input_files(input);
    if files.is_empty() {
        bail!("no .json or .jsonl input under {}", input.display());
    }

    let mut raw = Vec::new();
    for file in &files {
        for doc in input::read_file(file)? {
            raw.push(tokenizer.count(&doc.name, doc.classes, &doc.body));
        }
    }
    tracing::info!(files = files.len(), documents = raw.len(), "tokenized input");

    let mut ti = TotalIndex::new();
    ti.add_many(raw)?;
    ti.normalise();
    ti.verify()?;
    serialise_to_file(&ti, output)?;

    tracing::info!(output = %output.display(), "index build complete");
    Ok(())
}

struct ClusterOutputs {
    snapshot: Option<PathBuf>,
    centroids: Option<PathBuf>,
    report: Option<PathBuf>,
}

#[derive(Serialize)]
struct ClusterReport {
    created_at: String,
    k: usize,
    seed: u64,
    termination: Termination,
    iterations: usize,
    rss: Vec<f64>,
    purity: f64,
    clusters: Vec<ClusterSummary>,
}

#[derive(Serialize)]
struct ClusterSummary {
    size: usize,
    top_classes: Vec<String>,
}

fn cluster_index(path: &Path, config: &KMeansConfig, seed: Option<u64>, outputs: &ClusterOutputs) -> Result<()> {
    let mut ti = deserialise_from_file(path)?;
    let seed = seed.unwrap_or_else(|| rand::rng().random());
    tracing::info!(seed, k = config.k, workers = config.workers, "clustering");

    let mut rng = StdRng::seed_from_u64(seed);
    let run = kmeans::kmeans(&mut ti, config, &mut rng)?;
    let sizes = cluster_sizes(&ti, config.k)?;
    let quality = purity(&ti, config.k)?;

    let clusters: Vec<ClusterSummary> = sizes
        .iter()
        .zip(&quality.class_counts)
        .map(|(&size, counts)| ClusterSummary {
            size,
            top_classes: top_classes(counts, 3)
                .into_iter()
                .filter_map(|class| ti.classes.name(class))
                .collect(),
        })
        .collect();

    for (i, cluster) in clusters.iter().enumerate() {
        println!("{i}: {} [{}]", cluster.size, cluster.top_classes.join(", "));
    }
    println!("purity {:.3} after {} iterations ({:?})", quality.purity, run.iterations, run.termination);

    if let Some(snapshot) = &outputs.snapshot {
        serialise_to_file(&ti, snapshot)?;
    }
    if let Some(centroids) = &outputs.centroids {
        save_centroids(&ti.centroids, centroids)?;
    }
    if let Some(report_path) = &outputs.report {
        let report = ClusterReport {
            created_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "".into()),
            k: config.k,
            seed,
            termination: run.termination,
            iterations: run.iterations,
            rss: run.rss,
            purity: quality.purity,
            clusters,
        };
        fs::write(report_path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("writing report {}", report_path.display()))?;
    }
    Ok(())
}

fn classify(index: &Path, centroids: &Path, document: &Path, stopwords: Option<&Path>, top: usize) -> Result<()> {
    let mut ti = deserialise_from_file(index)?;
    ti.centroids = load_centroids(centroids)?;
    let k = ti.centroids.len();

    let tokenizer = load_tokenizer(stopwords)?;
    let body = fs::read_to_string(document)
        .with_context(|| format!("reading {}", document.display()))?;
    let name = document.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let doc = tokenizer.count(&name, Vec::new(), &body);

    let cluster = closest_centroid_to_info(&ti, &doc)?;
    println!("{name} is in cluster {cluster}");

    match purity(&ti, k) {
        Ok(quality) => {
            println!("purity {:.3}; most common classes:", quality.purity);
            for class in top_classes(&quality.class_counts[cluster], top) {
                println!("  {}", ti.classes.name(class).unwrap_or_default());
            }
        }
        Err(IndexError::NotClustered) => {
            tracing::warn!(index = %index.display(), "snapshot has no cluster assignments; skipping class summary");
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}
