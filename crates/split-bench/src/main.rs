//! Split benchmark for the YBWC thread pool
//!
//! Searches one synthetic game tree with several thread counts and reports,
//! for each run:
//! - Score and best move (which must agree across runs)
//! - Search performance (time, nodes and NPS)
//! - Split activity and speedup over the first run

use std::process;
use std::time::Duration;

use clap::Parser;
use colored::*;
use log::info;
use num_format::{Locale, ToFormattedString};
use rand::Rng;
use ybwc::search::SearchLimits;
use ybwc::synthetic::{MAX_BRANCHING, SearchResult, TreePosition, TreeSearch};
use ybwc::types::{Depth, Score};
use ybwc::{PoolError, PoolOptions, ThreadPool};

/// Speedup thresholds for color coding, as a fraction of the thread count
const EFFICIENCY_GOOD: f64 = 0.7;
const EFFICIENCY_FAIR: f64 = 0.4;

/// Outcome of a single benchmark run
#[derive(Debug)]
struct RunResult {
    threads: usize,
    search: SearchResult,
    splits: u64,
    split_point_searches: u64,
}

/// Round duration to 0.01ms precision for consistent display
fn round_duration(elapsed: Duration) -> Duration {
    let rounded_micros = (elapsed.as_secs_f64() * 10000.0).round() as u64 * 100;
    Duration::from_micros(rounded_micros)
}

fn nodes_per_second(nodes: u64, elapsed: Duration) -> u64 {
    let secs = round_duration(elapsed).as_secs_f64();
    if secs > 0.0 {
        (nodes as f64 / secs).round() as u64
    } else {
        0
    }
}

/// Print the table header for benchmark results
fn print_header() {
    println!(
        "| {:^7} | {:^5} | {:^9} | {:^14} | {:^13} | {:^10} | {:^10} | {:^6} | {:^4} | {:^7} |",
        "Threads", "Depth", "Time(s)", "Nodes", "NPS", "Splits", "SP Joins", "Score", "Move", "Speedup"
    );
    println!(
        "|--------:|------:|----------:|---------------:|--------------:|-----------:|-----------:|-------:|-----:|--------:|"
    );
}

/// Apply color coding to the speedup relative to the ideal linear speedup
fn colorize_speedup(speedup: f64, threads: usize) -> ColoredString {
    let speedup_str = format!("{speedup:.2}x");
    let efficiency = speedup / threads as f64;
    if efficiency >= EFFICIENCY_GOOD {
        speedup_str.bright_green()
    } else if efficiency >= EFFICIENCY_FAIR {
        speedup_str.bright_yellow()
    } else {
        speedup_str.bright_red()
    }
}

/// Print a single benchmark row
fn print_result(result: &RunResult, baseline: Option<Duration>) {
    let search = &result.search;
    let rounded_secs = round_duration(search.elapsed).as_secs_f64();
    let speedup = baseline
        .filter(|_| rounded_secs > 0.0)
        .map(|base| base.as_secs_f64() / rounded_secs)
        .unwrap_or(1.0);
    let best_move = search
        .best_move
        .map_or_else(|| "-".to_string(), |mv| mv.0.to_string());

    println!(
        "| {:>7} | {:>5} | {:>9.4} | {:>14} | {:>13} | {:>10} | {:>10} | {:>6} | {:>4} | {:>7} |",
        result.threads,
        search.depth,
        rounded_secs,
        search.nodes.to_formatted_string(&Locale::en),
        nodes_per_second(search.nodes, search.elapsed).to_formatted_string(&Locale::en),
        result.splits.to_formatted_string(&Locale::en),
        result.split_point_searches.to_formatted_string(&Locale::en),
        search.score,
        best_move,
        colorize_speedup(speedup, result.threads)
    );
}

/// Run one search with a fresh pool of `threads` threads
fn run(
    threads: usize,
    options: &PoolOptions,
    pos: &TreePosition,
    limits: &SearchLimits,
) -> Result<RunResult, PoolError> {
    let options = options.clone().with_threads(Some(threads));
    let pool = ThreadPool::new(TreeSearch::new(), &options)?;

    pool.begin_search(pos, limits, &[], None);
    pool.wait_for_search_finished();

    let engine = pool.engine();
    Ok(RunResult {
        threads,
        search: engine.last_result().unwrap_or_default(),
        splits: engine.splits(),
        split_point_searches: engine.split_point_searches(),
    })
}

/// Check that every run found the same score
fn print_agreement(results: &[RunResult], fixed_depth: bool) -> bool {
    let scores: Vec<Score> = results.iter().map(|r| r.search.score).collect();
    let agree = scores.windows(2).all(|w| w[0] == w[1]);

    println!();
    if !fixed_depth {
        println!("{}", "Scores not compared: runs were time limited".normal());
        true
    } else if agree {
        println!("{}", "All runs agree on the score".bright_green());
        true
    } else {
        println!("{} {scores:?}", "Score mismatch between runs:".bright_red());
        false
    }
}

/// Command line arguments for the split benchmark
#[derive(Parser)]
#[command(author, version, about = "Parallel split benchmark over a synthetic game tree")]
struct Args {
    /// Comma separated thread counts to run
    #[arg(short, long, value_delimiter = ',', default_value = "1,2,4")]
    threads: Vec<usize>,

    /// Search depth in plies
    #[arg(short, long, default_value = "9")]
    depth: Depth,

    /// Number of children of every node
    #[arg(short, long, default_value = "8")]
    branching: usize,

    /// Seed of the synthetic tree; random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Minimum depth at which a node may be split
    #[arg(long, default_value = "4")]
    min_split_depth: Depth,

    /// Maximum threads working on one split point, master included
    #[arg(long, default_value = "5")]
    split_width: usize,

    /// Wake idle threads at search start instead of on recruitment
    #[arg(long)]
    no_sleeping_threads: bool,

    /// Do not let finished threads join other split points
    #[arg(long)]
    no_late_join: bool,

    /// Stop each search after this many milliseconds
    #[arg(long)]
    movetime: Option<u64>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    if args.threads.is_empty() {
        eprintln!("Error: --threads needs at least one thread count");
        process::exit(1);
    }
    if !(1..=MAX_BRANCHING).contains(&args.branching) {
        eprintln!("Error: --branching must be between 1 and {MAX_BRANCHING}");
        process::exit(1);
    }

    let options = PoolOptions::default()
        .with_min_split_depth(args.min_split_depth)
        .with_max_threads_per_split_point(args.split_width)
        .with_sleeping_threads(!args.no_sleeping_threads)
        .with_late_join(!args.no_late_join);
    for &threads in &args.threads {
        if let Err(e) = options.clone().with_threads(Some(threads)).validate() {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }

    let seed = args.seed.unwrap_or_else(|| rand::rng().random());
    let pos = TreePosition::new(seed, args.branching);
    let limits = SearchLimits {
        depth: args.depth,
        movetime: args.movetime.unwrap_or(0),
        ..SearchLimits::default()
    };
    info!("tree seed {seed}, branching {}", args.branching);

    println!(
        "Seed {}, branching {}, depth {}\n",
        seed.to_string().bold(),
        args.branching,
        args.depth
    );
    print_header();

    let mut results = Vec::with_capacity(args.threads.len());
    for &threads in &args.threads {
        let result = match run(threads, &options, &pos, &limits) {
            Ok(result) => result,
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        };
        let baseline = results.first().map(|first: &RunResult| first.search.elapsed);
        print_result(&result, baseline);
        results.push(result);
    }

    if !print_agreement(&results, args.movetime.is_none()) {
        process::exit(1);
    }
}
