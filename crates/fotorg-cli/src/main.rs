use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use fotorg_core::{HashAlgorithm, OrganizeOptions, OrganizeOutcome, RuleKind};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Preview, then ask before applying
    Preview,
    /// Apply without asking
    Real,
}

#[derive(Parser)]
#[command(name = "fotorg", version, about = "Photo organizer - detect duplicates and sort photos by date or GPS location")]
struct Cli {
    /// Folder holding the photos
    #[arg(short, long)]
    source: PathBuf,

    /// preview asks before applying; real applies right after the preview
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Organization rule: "data" (YYYY/MM) or "local" (GPS)
    #[arg(short, long, default_value = "data")]
    rule: String,

    /// Decimal places in GPS folder names
    #[arg(short, long, default_value_t = 3)]
    precision: usize,

    /// Process at most this many files
    #[arg(long)]
    limit: Option<usize>,

    /// Content hash used for duplicate detection: sha256, sha512 or blake3
    #[arg(long, default_value = "sha256")]
    hash: String,

    /// Destination root (default: <source parent>/Foto_Organizada)
    #[arg(short, long)]
    dest: Option<PathBuf>,

    /// Apply without confirmation
    #[arg(short, long)]
    yes: bool,

    /// Print summaries as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(error_exit_code(&e))
        }
    }
}

/// 2 for bad user input, 1 for anything else.
fn error_exit_code(e: &anyhow::Error) -> u8 {
    let invalid_input = e
        .downcast_ref::<fotorg_core::Error>()
        .is_some_and(fotorg_core::Error::is_invalid_input);
    if invalid_input {
        2
    } else {
        1
    }
}

/// Whether to apply without asking.
fn applies_without_prompt(mode: Option<Mode>, yes: bool) -> bool {
    yes || mode == Some(Mode::Real)
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let t_total = std::time::Instant::now();

    let rule: RuleKind = cli.rule.parse()?;
    let hash_algorithm: HashAlgorithm = cli.hash.parse()?;
    let options = OrganizeOptions {
        source: cli.source,
        destination: cli.dest,
        rule,
        precision: cli.precision,
        limit: cli.limit,
        hash_algorithm,
        preview: true,
    };
    log::debug!("options: {:?}", options);

    let progress = StageProgress::default();
    let report = |stage: &str, current: u64, total: u64, message: &str| {
        progress.update(stage, current, total, message);
    };

    let prepared = fotorg_core::prepare(&options, &report)?;
    progress.finish();

    if prepared.items() == 0 {
        eprintln!("No photos found in {}", options.source.display());
        return Ok(ExitCode::SUCCESS);
    }

    let preview = prepared.execute(true, &report);
    progress.finish();
    print_outcome(&preview, cli.json)?;

    let apply = applies_without_prompt(cli.mode, cli.yes)
        || confirm("Apply the operations now? [y/N] ")?;
    if !apply {
        eprintln!("Nothing changed on disk.");
        return Ok(ExitCode::SUCCESS);
    }

    let outcome = prepared.execute(false, &report);
    progress.finish();
    print_outcome(&outcome, cli.json)?;

    // Per-file errors are reported in the summary only
    eprintln!("Done! ({:.2}s)", t_total.elapsed().as_secs_f64());
    Ok(ExitCode::SUCCESS)
}

/// One progress bar, restarted whenever the stage changes.
#[derive(Default)]
struct StageProgress {
    current: RefCell<Option<(String, ProgressBar)>>,
}

impl StageProgress {
    fn update(&self, stage: &str, current: u64, total: u64, message: &str) {
        let mut slot = self.current.borrow_mut();
        if slot.as_ref().map(|(s, _)| s.as_str()) != Some(stage) {
            if let Some((_, pb)) = slot.take() {
                pb.finish_and_clear();
            }
            let pb = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::default_bar().template("[{bar:40}] {pos}/{len} {prefix} {msg}") {
                pb.set_style(style);
            }
            pb.set_prefix(stage.to_string());
            *slot = Some((stage.to_string(), pb));
        }
        if let Some((_, pb)) = slot.as_ref() {
            pb.set_length(total);
            pb.set_position(current);
            pb.set_message(message.to_string());
        }
    }

    fn finish(&self) {
        if let Some((_, pb)) = self.current.borrow_mut().take() {
            pb.finish_and_clear();
        }
    }
}

/// Keep asking until the answer is yes or no. End of input means no.
fn confirm(prompt: &str) -> anyhow::Result<bool> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        eprint!("{}", prompt);
        io::stderr().flush().ok();
        let Some(line) = lines.next() else {
            return Ok(false);
        };
        match parse_answer(&line.context("reading answer")?) {
            Some(answer) => return Ok(answer),
            None => eprintln!("Please answer y or n."),
        }
    }
}

/// `y`/`s` mean yes, `n` or an empty line mean no.
fn parse_answer(line: &str) -> Option<bool> {
    match line.trim() {
        "y" | "Y" | "s" | "S" => Some(true),
        "n" | "N" | "" => Some(false),
        _ => None,
    }
}

fn print_outcome(outcome: &OrganizeOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.summary)?);
        return Ok(());
    }

    let s = &outcome.summary;
    let title = if outcome.preview { "Preview" } else { "Result" };
    println!("== {} ({} -> {}) ==", title, outcome.items, outcome.destination.display());
    println!(
        "total: {}  moved: {}  skipped: {}  errors: {}",
        s.total, s.moved, s.skipped, s.errored
    );
    if let Some(dups) = s.duplicates {
        println!(
            "duplicates: {} in {} group(s)",
            dups,
            outcome.duplicate_groups.len()
        );
    }
    println!(
        "log: {} info, {} warn, {} error",
        s.log_levels.info, s.log_levels.warn, s.log_levels.error
    );

    let reasons = s.skip_reasons_by_count();
    if !reasons.is_empty() {
        println!("skip reasons:");
        for (reason, count) in reasons {
            println!("  {:>5}  {}", count, reason);
        }
    }

    let folders = s.top_folders(5);
    if !folders.is_empty() {
        println!("top folders:");
        for (folder, count) in folders {
            println!("  {:>5}  {}", count, folder.display());
        }
    }

    for entry in outcome.entries.iter().filter(|e| e.level != fotorg_core::LogLevel::Info) {
        println!("[{}] {}", entry.level, entry.message);
    }
    Ok(())
}
