//! Reroute CLI
//!
//! CLI tool for compiling redirect rules and checking them against URLs.

mod document;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rr_compiler::RuleEvaluator;
use rr_core::pattern::PatternShape;
use rr_core::{ResourceType, RuleBook};

use crate::document::{load_book, native_rules, write_output};

#[derive(Parser)]
#[command(name = "rr-cli")]
#[command(about = "Reroute redirect rule compiler and tools")]
struct Cli {
    /// Log compiler and loader details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile rules into native declarative redirect rules
    Compile {
        /// Rule file or store state document
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Test a URL against the active rules
    Test {
        /// Rule file or store state document
        #[arg(short, long)]
        input: PathBuf,

        /// Candidate URL
        #[arg(short, long)]
        url: String,

        /// Show the result of every rule, not just the first match
        #[arg(short, long)]
        all: bool,
    },

    /// Evaluate the compiled native rules against a URL
    Simulate {
        /// Rule file or store state document
        #[arg(short, long)]
        input: PathBuf,

        /// Request URL
        #[arg(short, long)]
        url: String,

        /// Resource type of the request
        #[arg(short = 't', long, default_value = "main_frame")]
        resource_type: String,
    },

    /// Validate a rule file
    Validate {
        /// Rule file or store state document
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Dump rule book info
    Info {
        /// Rule file or store state document
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Compile { input, output } => cmd_compile(&input, output.as_deref()),
        Commands::Test { input, url, all } => cmd_test(&input, &url, all),
        Commands::Simulate {
            input,
            url,
            resource_type,
        } => cmd_simulate(&input, &url, &resource_type),
        Commands::Validate { input } => cmd_validate(&input),
        Commands::Info { input } => cmd_info(&input),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_compile(input: &Path, output: Option<&Path>) -> Result<(), String> {
    let book = load_book(input)?;
    let native = native_rules(&book);
    let text = serde_json::to_string_pretty(&native)
        .map_err(|e| format!("Failed to serialize rules: {}", e))?;

    match output {
        Some(path) => {
            write_output(path, &text)?;
            println!(
                "Compiled {} of {} rules to '{}'",
                native.len(),
                book.rules().len(),
                path.display()
            );
        }
        None => println!("{}", text),
    }

    Ok(())
}

fn cmd_test(input: &Path, url: &str, all: bool) -> Result<(), String> {
    let book = load_book(input)?;

    if all {
        for (index, rule) in book.rules().iter().enumerate() {
            let result = rule.test(url);
            let state = if book.is_rule_active(rule) { "active" } else { "inactive" };
            match (&result.redirect_url, result.matched) {
                (Some(target), true) => {
                    println!("  [{}] {} ({}) -> {}", index, rule.display_name(), state, target)
                }
                _ => println!("  [{}] {} ({}) no match", index, rule.display_name(), state),
            }
        }
        println!();
    }

    match book.find_redirect(url) {
        Some((index, result)) => {
            let rule = &book.rules()[index];
            println!("Matched rule [{}] {}", index, rule.display_name());
            if let Some(captured) = &result.captured_text {
                println!("  Captured:    {}", captured);
            }
            println!("  Redirect:    {}", result.redirect_url.unwrap_or_default());
        }
        None => println!("No active rule matches '{}'", url),
    }

    Ok(())
}

fn cmd_simulate(input: &Path, url: &str, resource_type: &str) -> Result<(), String> {
    let book = load_book(input)?;
    let native = native_rules(&book);
    let evaluator =
        RuleEvaluator::new(&native).map_err(|e| format!("Compiled rules are invalid: {}", e))?;

    match evaluator.evaluate(url, ResourceType::from_str(resource_type)) {
        Some(redirect) => {
            println!("Rule {} redirects to {}", redirect.rule_id, redirect.url);
        }
        None => println!("No rule applies; request proceeds unchanged"),
    }

    Ok(())
}

fn cmd_validate(input: &Path) -> Result<(), String> {
    let book = load_book(input)?;

    let mut malformed = 0usize;
    let mut inactive = 0usize;
    for (index, rule) in book.rules().iter().enumerate() {
        if !rule.is_well_formed() {
            malformed += 1;
            println!(
                "  [{}] {}: {}",
                index,
                rule.display_name(),
                describe_problem(&rule.from_url, &rule.to_url)
            );
        } else if !book.is_rule_active(rule) {
            inactive += 1;
        }
    }

    let total = book.rules().len();
    println!("Rule file '{}'", input.display());
    println!("  Rules:       {}", total);
    println!("  Active:      {}", total - malformed - inactive);
    println!("  Inactive:    {}", inactive);
    println!("  Malformed:   {}", malformed);

    if malformed > 0 {
        return Err(format!("{} malformed rules", malformed));
    }
    Ok(())
}

fn describe_problem(from: &str, to: &str) -> &'static str {
    match (PatternShape::classify(from), PatternShape::classify(to)) {
        (PatternShape::Empty, _) => "missing fromUrl",
        (_, PatternShape::Empty) => "missing toUrl",
        (PatternShape::Invalid, _) => "fromUrl has more than one ** marker",
        (_, PatternShape::Invalid) => "toUrl has more than one ** marker",
        _ => "ok",
    }
}

fn cmd_info(input: &Path) -> Result<(), String> {
    let book = load_book(input)?;
    print_book(&book);
    Ok(())
}

fn print_book(book: &RuleBook) {
    println!("Rule book");
    println!("  Enabled:     {}", book.is_enabled());
    println!("  Rules:       {}", book.rules().len());
    println!("  Active:      {}", book.active_rules().count());
    println!();

    println!("Sections:");
    for section in book.sections() {
        println!(
            "  {:<20} {:<9} {} rules",
            section.name,
            if section.enabled { "enabled" } else { "disabled" },
            book.rules_in_section(&section.name).count()
        );
    }
}
