mod logic;
mod util;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use hilo_game::{EmbeddedCatalog, GameEngine, JsonFileCatalog};
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use logic::reports::{self, TestReport};
use logic::{LogicTester, PolicyKind, TesterStore};
use util::{resolve_seeds, split_csv};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Console,
    Json,
    Markdown,
}

#[derive(Debug, Parser)]
#[command(name = "hilo-tester", version)]
#[command(about = "Seeded simulation QA for Meme Higher or Lower")]
struct Args {
    /// Seeds to run (comma-separated, `a..b` for ranges)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Sessions per seed; each iteration offsets the seed by its index
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Guessing policies (comma-separated, or `all`)
    #[arg(long, default_value = "all")]
    policy: String,

    /// Catalog JSON file; the built-in sample catalog is used when omitted
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Stop a session after this many guesses even if it has not been lost
    #[arg(long, default_value_t = 100)]
    max_guesses: u32,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Persist the best streak to this JSON file instead of memory
    #[arg(long)]
    high_score_file: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    announce_banner(&args);

    let start_time = Instant::now();
    let seeds = resolve_seeds(&split_csv(&args.seeds))?;
    let policies = PolicyKind::resolve(&split_csv(&args.policy))?;
    let engine = load_engine(&args)?;
    let catalog_size = engine.catalog().len();
    let mut tester = LogicTester::new(engine, args.max_guesses, args.verbose)?;

    let mut results = Vec::with_capacity(policies.len());
    for policy in policies {
        results.push(tester.run_policy(policy, &seeds, args.iterations).await);
    }

    let report = TestReport {
        generated_at: Utc::now(),
        catalog_size,
        high_score: tester.engine().high_score(),
        results,
        leaderboard: tester.leaderboard(),
    };
    write_report(&args, &report, start_time)?;

    if !report.passed() {
        std::process::exit(1);
    }

    Ok(())
}

fn announce_banner(args: &Args) {
    if args.output.is_none() && args.report != ReportFormat::Console {
        return;
    }
    println!("{}", "🎮 Meme Higher or Lower Tester".bright_cyan().bold());
    println!("{}", "==============================".cyan());
}

fn load_engine(args: &Args) -> Result<GameEngine<TesterStore>> {
    let store = TesterStore::from_path(args.high_score_file.clone());
    match &args.catalog {
        Some(path) => GameEngine::new(&JsonFileCatalog::new(path), store)
            .with_context(|| format!("failed to load catalog {}", path.display())),
        None => GameEngine::new(&EmbeddedCatalog::sample(), store),
    }
}

fn write_report(args: &Args, report: &TestReport, start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report {
        ReportFormat::Json => reports::generate_json_report(&mut output_target, report)?,
        ReportFormat::Markdown => reports::generate_markdown_report(&mut output_target, report)?,
        ReportFormat::Console => {
            reports::generate_console_report(&mut output_target, report, start_time.elapsed())?;
            writeln!(&mut output_target)?;
            writeln!(&mut output_target, "🏁 Total time: {:?}", start_time.elapsed())?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
