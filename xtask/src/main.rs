use std::path::Path;
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the Lagos navigator workspace",
    long_about = "A unified CLI for demo searches, benchmarks, and CI checks\n\
                  in the Lagos navigator workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one search through the CLI
    Search {
        /// Start: "lat,lon" or a known place name
        #[arg(long, default_value = "Victoria Island")]
        from: String,
        /// Destination: "lat,lon" or a known place name
        #[arg(long, default_value = "Banana Island")]
        to: String,
        /// Use live TomTom data (needs TOMTOM_API_KEY)
        #[arg(long, env = "NAV_LIVE")]
        live: bool,
    },
    /// Search and keep printing traffic refreshes
    Watch {
        #[arg(long, default_value = "CMS (Marina)")]
        from: String,
        #[arg(long, default_value = "Lekki Phase 1")]
        to: String,
        /// Refresh period in seconds
        #[arg(long, default_value_t = 60)]
        interval: u64,
        #[arg(long, env = "NAV_LIVE")]
        live: bool,
    },
    /// Run Criterion benchmarks
    Bench,
    /// Compare benchmarks: stash changes, create baseline, restore, compare
    BenchCompare,
    /// Run CI checks (fmt, clippy, tests, smoke run, benchmarks)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Offline CLI searches
    Smoke,
    /// Run benchmarks
    Bench,
    /// Run check + smoke + bench
    All,
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn git(args: &[&str]) -> ExitStatus {
    eprintln!("+ git {}", args.join(" "));
    Command::new("git")
        .args(args)
        .status()
        .expect("failed to execute git")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn run_git(args: &[&str]) {
    let status = git(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

/// `cargo run -p nav_cli -- <args>`, adding `--offline` unless live.
fn run_cli(live: bool, args: &[&str]) {
    let mut full = vec!["run", "-p", "nav_cli", "--"];
    if !live {
        full.push("--offline");
    }
    full.extend_from_slice(args);
    run_cargo(&full);
}

fn bench(extra: &[&str]) {
    let mut args = vec!["bench", "--package", "nav_core", "--bench", "performance"];
    if !extra.is_empty() {
        args.push("--");
        args.extend_from_slice(extra);
    }
    run_cargo(&args);
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test nav_core");
    run_cargo(&["test", "-p", "nav_core"]);

    step("Test nav_core without network backends");
    run_cargo(&[
        "test",
        "-p",
        "nav_core",
        "--no-default-features",
        "--features",
        "test-helpers",
    ]);

    step("Build nav_cli");
    run_cargo(&["build", "-p", "nav_cli"]);
}

fn ci_smoke() {
    step("Offline search, Victoria Island to Banana Island");
    run_cli(
        false,
        &["search", "--from", "Victoria Island", "--to", "Banana Island"],
    );

    step("Offline search through CMS, all routes, JSON");
    run_cli(
        false,
        &[
            "search",
            "--from",
            "CMS (Marina)",
            "--to",
            "Ikoyi",
            "--all-routes",
            "--json",
        ],
    );
}

fn ci_bench() {
    step("Run benchmarks");
    bench(&[]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Search { from, to, live } => {
            run_cli(live, &["search", "--from", &from, "--to", &to]);
        }
        Commands::Watch {
            from,
            to,
            interval,
            live,
        } => {
            let interval = interval.to_string();
            run_cli(
                live,
                &["watch", "--from", &from, "--to", &to, "--interval", &interval],
            );
        }
        Commands::Bench => bench(&[]),
        Commands::BenchCompare => {
            let baseline_dir = Path::new("target/criterion");
            if baseline_dir.exists() {
                step("Removing existing benchmark data");
                std::fs::remove_dir_all(baseline_dir).expect("failed to remove target/criterion");
            }

            step("Stashing current changes");
            run_git(&[
                "stash",
                "push",
                "-m",
                "Temporary stash for benchmark comparison",
            ]);

            step("Running benchmark to create baseline");
            bench(&["--save-baseline", "main"]);

            step("Reapplying changes");
            run_git(&["stash", "pop"]);

            step("Running benchmark comparing against baseline");
            bench(&["--baseline", "main"]);

            eprintln!("\nDone! Check the output above to see performance comparison.");
        }
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Smoke => ci_smoke(),
                CiJob::Bench => ci_bench(),
                CiJob::All => {
                    ci_check();
                    ci_smoke();
                    ci_bench();
                }
            }
            eprintln!("\nCI job passed.");
        }
    }
}
