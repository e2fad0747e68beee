use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use movie_types::{ErrorKind, Movie};
use server::{AppConfig, MovieAggregator};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::info;

/// Movies - query the movie-info and reviews aggregation
#[derive(Parser)]
#[command(name = "movies")]
#[command(about = "Retrieve movies with their reviews from the live upstreams", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: AppConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve one movie with all of its reviews
    Get {
        /// Movie-info id to retrieve
        #[arg(long)]
        id: String,
    },

    /// Run benchmark to test latency under concurrency
    Benchmark {
        /// Movie-info id to retrieve on every request
        #[arg(long)]
        id: String,

        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,

        /// Number of concurrent requests
        #[arg(long, default_value = "10")]
        concurrent: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let aggregator =
        MovieAggregator::from_config(&cli.config).context("Failed to set up upstream clients")?;

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Get { id } => handle_get(&aggregator, &id).await?,
        Commands::Benchmark {
            id,
            requests,
            concurrent,
        } => handle_benchmark(aggregator, id, requests, concurrent).await?,
    }

    Ok(())
}

/// Handle the 'get' command
async fn handle_get(aggregator: &MovieAggregator, id: &str) -> Result<()> {
    info!("Retrieving movie {}", id);
    match aggregator.retrieve_movie(id).await {
        Ok(movie) => {
            print_movie(&movie);
            Ok(())
        }
        Err(err) => {
            println!(
                "{} {} {}",
                "✗".red(),
                err.kind().to_string().red().bold(),
                err
            );
            if let Some(status) = err.status_code() {
                println!("  upstream status: {}", status);
            }
            Err(err).with_context(|| format!("Failed to retrieve movie {}", id))
        }
    }
}

/// Handle the 'benchmark' command
async fn handle_benchmark(
    aggregator: MovieAggregator,
    id: String,
    requests: usize,
    concurrent: usize,
) -> Result<()> {
    if requests == 0 {
        bail!("--requests must be at least 1");
    }

    info!(
        "Benchmarking {} requests for movie {} ({} in flight)",
        requests,
        id,
        concurrent.max(1)
    );
    let permits = Arc::new(Semaphore::new(concurrent.max(1)));
    let id = Arc::new(id);
    let wall_clock = Instant::now();

    // Each task waits for a permit, so at most `concurrent` are in flight
    let mut handles = vec![];
    for _ in 0..requests {
        let aggregator = aggregator.clone();
        let permits = permits.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            let _permit = permits.acquire_owned().await?;
            let start = Instant::now();
            let outcome = aggregator.retrieve_movie(&id).await.map(|_| ()).map_err(|e| e.kind());
            Ok::<_, anyhow::Error>((start.elapsed(), outcome))
        }));
    }

    let mut timings = vec![];
    let mut failures: HashMap<ErrorKind, usize> = HashMap::new();
    for handle in handles {
        let (elapsed, outcome) = handle.await??;
        timings.push(elapsed);
        if let Err(kind) = outcome {
            *failures.entry(kind).or_insert(0) += 1;
        }
    }
    let total_time = wall_clock.elapsed();
    info!("Benchmark finished in {:?}", total_time);

    timings.sort();
    let latency_sum: Duration = timings.iter().sum();
    let avg_latency = latency_sum / timings.len() as u32;
    let throughput = requests as f64 / total_time.as_secs_f64();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Total time: {:?}", total_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", percentile(&timings, 0.50));
    println!("P95 latency: {:?}", percentile(&timings, 0.95));
    println!("P99 latency: {:?}", percentile(&timings, 0.99));
    println!("Throughput: {:.2} requests/second", throughput);

    if failures.is_empty() {
        println!("{} All {} requests succeeded", "✓".green(), requests);
    } else {
        let mut kinds: Vec<_> = failures.into_iter().collect();
        kinds.sort_by(|a, b| b.1.cmp(&a.1));
        for (kind, count) in kinds {
            println!("{} {}: {} failed", "✗".red(), kind, count);
        }
    }

    Ok(())
}

/// Latency at quantile `q` of an ascending, non-empty slice
fn percentile(sorted: &[Duration], q: f64) -> Duration {
    let index = ((sorted.len() as f64 * q) as usize).min(sorted.len() - 1);
    sorted[index]
}

/// Helper function to format and print a movie
fn print_movie(movie: &Movie) {
    let metadata = &movie.metadata;
    println!(
        "{} ({})",
        metadata.title.bold().blue(),
        metadata
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "????".to_string())
    );
    if let Some(date) = metadata.release_date {
        println!("{}Released: {}", "• ".green(), date);
    }
    if !metadata.cast.is_empty() {
        println!("{}Cast: {}", "• ".green(), metadata.cast.join(", "));
    }

    match movie.average_rating() {
        Some(avg) => println!(
            "{}Reviews: {} (average rating {:.2})",
            "• ".cyan(),
            movie.reviews.len(),
            avg
        ),
        None => println!("{}Reviews: {}", "• ".cyan(), movie.reviews.len()),
    }
    for review in &movie.reviews {
        let rating = review
            .rating
            .map(|r| format!("{:.1}", r))
            .unwrap_or_else(|| "-".to_string());
        println!("  - [{}] {}", rating, review.comment);
    }
}
