//! Truthfulness Benchmark CLI

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use truthfulqa_benchmark::{
    config::{Config, OnGenerationError},
    dataset::{load_dataset, QuestionRecord},
    prompt::{candidates_display, ChatPrompt},
    providers::create_provider_with_config,
    reporting::{print_console_report, write_answers_jsonl, RunReport},
    runner::{AnswerGenerator, ChatAnswerGenerator, ConsoleProgress, Executor, ExecutorConfig},
};

#[derive(Parser)]
#[command(name = "truthfulqa-benchmark")]
#[command(about = "Multiple-choice truthfulness benchmark for chat LLM providers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the benchmark over a dataset
    Run(RunArgs),

    /// Print questions and candidates from a dataset
    ListQuestions {
        /// Dataset file (.parquet, .json, .jsonl)
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Number of questions to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Write the rendered prompts to text files for review
    DumpPrompts {
        /// Dataset file (.parquet, .json, .jsonl)
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Output directory for prompt files
        #[arg(short, long, default_value = "results/prompts")]
        output: PathBuf,

        /// Number of questions to render
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Check that a provider is reachable with the configured key
    Check {
        /// Provider id from config (default: benchmark.provider)
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// Generate sample configuration
    InitConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config/truthfulqa.toml")]
        output: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Dataset file (.parquet, .json, .jsonl)
    #[arg(short, long)]
    dataset: Option<PathBuf>,

    /// Provider id from config, or "openai" / "anthropic"
    #[arg(short, long)]
    provider: Option<String>,

    /// Model override
    #[arg(short, long)]
    model: Option<String>,

    /// Maximum in-flight requests
    #[arg(long)]
    parallel: Option<usize>,

    /// Only evaluate the first N questions
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// What to do when a generation call fails
    #[arg(long, value_enum)]
    on_error: Option<OnGenerationError>,

    /// Shuffle the candidate order shown to the model
    #[arg(long)]
    shuffle: bool,

    /// Seed for --shuffle
    #[arg(long)]
    seed: Option<u64>,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip writing answers.jsonl
    #[arg(long)]
    no_save_answers: bool,

    /// Suppress progress lines
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "truthfulqa_benchmark=debug,info"
    } else {
        "truthfulqa_benchmark=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => {
            let config = Config::from_file(path)?;
            tracing::info!("Loaded configuration from {}", path.display());
            config
        }
        None => Config::load_or_default(),
    };

    match cli.command {
        Commands::Run(args) => {
            run_benchmark(config, args).await?;
        }

        Commands::ListQuestions { dataset, limit } => {
            list_questions(config, dataset, limit)?;
        }

        Commands::DumpPrompts { dataset, output, limit } => {
            dump_prompts(config, dataset, output, limit)?;
        }

        Commands::Check { provider } => {
            check_provider(config, provider).await?;
        }

        Commands::InitConfig { output } => {
            init_config(output)?;
        }
    }

    Ok(())
}

fn apply_run_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(dataset) = &args.dataset {
        config.dataset.path = dataset.display().to_string();
    }
    if let Some(limit) = args.limit {
        config.dataset.limit = Some(limit);
    }
    if let Some(provider) = &args.provider {
        config.benchmark.provider = provider.clone();
    }
    if let Some(model) = &args.model {
        config.benchmark.model = Some(model.clone());
    }
    if let Some(parallel) = args.parallel {
        config.benchmark.parallel_requests = parallel;
    }
    if let Some(policy) = args.on_error {
        config.benchmark.on_generation_error = policy;
    }
    if args.shuffle {
        config.benchmark.shuffle_choices = true;
    }
    if let Some(seed) = args.seed {
        config.benchmark.shuffle_seed = seed;
    }
    if let Some(output) = &args.output {
        config.output.output_dir = output.display().to_string();
    }
    if args.no_save_answers {
        config.output.save_answers = false;
    }
}

fn load_records(
    config: &Config,
    dataset: Option<PathBuf>,
) -> Result<Vec<QuestionRecord>, Box<dyn std::error::Error>> {
    let path = dataset.unwrap_or_else(|| PathBuf::from(&config.dataset.path));
    Ok(load_dataset(&path, &config.dataset)?)
}

async fn run_benchmark(mut config: Config, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    apply_run_overrides(&mut config, &args);
    config.validate()?;

    let started_at = Utc::now();
    let run_id = started_at.format("%Y%m%d-%H%M%S").to_string();

    println!("=== Truthfulness Benchmark ===");
    println!("Run ID:   {}", run_id);
    println!("Dataset:  {}", config.dataset.path);
    println!("On error: {}", config.benchmark.on_generation_error);
    if config.benchmark.shuffle_choices {
        println!("Shuffle:  seed {}", config.benchmark.shuffle_seed);
    }
    println!();

    let records = load_records(&config, None)?;
    if records.is_empty() {
        eprintln!("Error: No questions in {}", config.dataset.path);
        std::process::exit(1);
    }

    let provider = match create_provider_with_config(&config.benchmark.provider, &config) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("  OPENAI_API_KEY for OpenAI");
            eprintln!("  ANTHROPIC_API_KEY for Anthropic/Claude");
            std::process::exit(1);
        }
    };

    let generator = ChatAnswerGenerator::from_config(
        provider,
        ChatPrompt::from_config(&config.prompt),
        &config.benchmark,
    );
    // Surface template mistakes before any request is sent
    generator.render("", "")?;

    println!("Provider:  {} ({})", generator.provider_name(), generator.model());
    println!("Questions: {}", records.len());
    println!();

    let provider_name = generator.provider_name().to_string();
    let model = generator.model().to_string();

    let mut executor = Executor::new(Arc::new(generator), ExecutorConfig::from(&config.benchmark));
    if !args.quiet {
        executor = executor.with_progress(Arc::new(ConsoleProgress::default()));
    }

    println!("Running benchmark...");
    let run = executor.run(&records).await?;

    let report = RunReport::new(&run_id, &config.dataset.path, provider_name, model, &run);
    print_console_report(&report);

    let run_dir = PathBuf::from(&config.output.output_dir).join(&run_id);
    std::fs::create_dir_all(&run_dir)?;

    let summary_path = run_dir.join("summary.json");
    report.write_to_file(&summary_path)?;
    println!("Summary written to: {}", summary_path.display());

    if config.output.save_answers {
        let answers_path = run_dir.join("answers.jsonl");
        write_answers_jsonl(&answers_path, &run)?;
        println!("Answers written to: {} ({} lines)", answers_path.display(), run.len());
    }

    println!("{}", serde_json::to_string_pretty(&report.summary)?);
    Ok(())
}

fn list_questions(
    mut config: Config,
    dataset: Option<PathBuf>,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    config.dataset.limit = Some(limit);
    let records = load_records(&config, dataset)?;

    println!("Questions ({}):", records.len());
    println!("{:-<60}", "");

    for (row, record) in records.iter().enumerate() {
        println!("[{}] {}", row, record.question());
        for (idx, candidate) in record.candidates().iter().enumerate() {
            let marker = if idx == 0 { "*" } else { " " };
            println!("    {} {}", marker, candidate);
        }
    }

    Ok(())
}

fn dump_prompts(
    mut config: Config,
    dataset: Option<PathBuf>,
    output_dir: PathBuf,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    config.dataset.limit = Some(limit);
    let records = load_records(&config, dataset)?;

    if records.is_empty() {
        eprintln!("Error: No questions to dump");
        std::process::exit(1);
    }

    std::fs::create_dir_all(&output_dir)?;
    let prompt = ChatPrompt::from_config(&config.prompt);

    println!("=== Dumping Prompts ===");
    println!("Questions: {}", records.len());
    println!("Output:    {}", output_dir.display());
    println!();

    for (row, record) in records.iter().enumerate() {
        let rendered = prompt.render(record.question(), &candidates_display(record.candidates()))?;
        let filename = format!("question-{:04}.txt", row);

        let content = format!(
            "=== Prompt: row {} ===\n\
             Ground truth: {}\n\
             Candidates:   {}\n\
             {}\n\
             === SYSTEM ===\n\n\
             {}\n\n\
             === USER ===\n\n\
             {}",
            row,
            record.ground_truth(),
            record.candidates().len(),
            "=".repeat(50),
            rendered.system,
            rendered.user,
        );

        std::fs::write(output_dir.join(&filename), content)?;
        println!("  [{}] -> {}", row, filename);
    }

    println!("\nDone. {} files written to {}", records.len(), output_dir.display());
    Ok(())
}

async fn check_provider(config: Config, provider: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let id = provider.unwrap_or_else(|| config.benchmark.provider.clone());
    let provider = create_provider_with_config(&id, &config)?;

    println!("Checking {} ({})...", provider.name(), provider.default_model());
    if provider.health_check().await? {
        println!("OK");
        Ok(())
    } else {
        eprintln!("Error: {} did not answer a test request", id);
        std::process::exit(1);
    }
}

fn init_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    config.save_toml(&output)?;
    println!("Configuration written to: {}", output.display());
    Ok(())
}
