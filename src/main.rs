use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use edumint::backend::HttpBackend;
use edumint::banner;
use edumint::config::ClientConfig;
use edumint::errors::{ClientError, Result};
use edumint::history::{self, HistoryView};
use edumint::job::{GenerationView, JobInput, JobState, EMPTY_INPUT};
use edumint::models::{GeneratedOutput, JobStatus};
use edumint::render;

#[derive(Parser, Debug)]
#[command(author, version, about = "Client for the EduMint problem generation service", long_about = None)]
struct Cli {
    /// Path to a TOML config file (defaults to the per-user config if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the backend base URL
    #[arg(long, global = true)]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the admin job history, refreshing until interrupted
    History {
        /// Fetch once and exit
        #[arg(long)]
        once: bool,
    },
    /// Submit a generation job and follow it until it finishes
    Generate(GenerateArgs),
    /// Render a Markdown file to HTML on stdout
    Render {
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Source text for the problems
    #[arg(long, group = "input")]
    text: Option<String>,

    /// Read the source text from a file
    #[arg(long, group = "input")]
    text_file: Option<PathBuf>,

    /// Upload a PDF as the source
    #[arg(long, group = "input")]
    pdf: Option<PathBuf>,

    /// Watch the advertisement and print the answers as well
    #[arg(long)]
    show_answers: bool,

    /// Write the rendered result as an HTML page
    #[arg(long)]
    html: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let config = ClientConfig::load(cli.config.as_deref())?;
    match &cli.api_base {
        Some(api_base) => config.with_api_base(api_base),
        None => Ok(config),
    }
}

async fn run(cli: Cli) -> Result<bool> {
    if let Command::Render { path } = &cli.command {
        let markdown = tokio::fs::read_to_string(path).await?;
        print!("{}", render::render(&markdown));
        return Ok(true);
    }

    banner::print_banner();
    let config = load_config(&cli)?;
    log::info!("Using backend at {}", config.api_base);
    let backend = Arc::new(HttpBackend::from_config(config.clone())?);

    match cli.command {
        Command::History { once } => show_history(backend, &config, once).await,
        Command::Generate(args) => generate(backend, &config, args).await,
        Command::Render { .. } => Ok(true),
    }
}

async fn show_history(backend: Arc<HttpBackend>, config: &ClientConfig, once: bool) -> Result<bool> {
    let view = HistoryView::mount(backend, config.history_interval);
    let mut rx = view.subscribe();
    let mut printed = 0;

    loop {
        let state = tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(true),
            next = rx.wait_for(|s| s.refreshes > printed) => match next {
                Ok(s) => s.clone(),
                Err(_) => return Ok(false),
            },
        };
        printed = state.refreshes;

        if state.history.is_empty() && state.error.is_none() {
            println!("No generation jobs yet.");
        } else {
            println!("{}", history::render_table(&state.history));
        }
        if let Some(error) = &state.error {
            eprintln!("❌ Error: {}", error);
        }

        if once {
            return Ok(state.error.is_none());
        }
        println!("🔄 Refreshing every {}s (Ctrl-C to stop)", config.history_interval.as_secs());
    }
}

async fn read_input(args: &GenerateArgs) -> Result<JobInput> {
    if let Some(text) = &args.text {
        return Ok(JobInput::Text(text.clone()));
    }
    if let Some(path) = &args.text_file {
        return Ok(JobInput::Text(tokio::fs::read_to_string(path).await?));
    }
    if let Some(path) = &args.pdf {
        return JobInput::pdf_from_path(path).await;
    }
    Err(ClientError::Validation(EMPTY_INPUT.to_string()))
}

async fn generate(backend: Arc<HttpBackend>, config: &ClientConfig, args: GenerateArgs) -> Result<bool> {
    let input = read_input(&args).await?;
    let view = GenerationView::mount(backend, config);
    let mut rx = view.subscribe();

    println!("📤 Sending job to the server...");
    let job_id = view.submit(input).await?;
    println!("⏳ Job {} accepted. Results appear automatically when processing finishes.", job_id);

    let finished = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!("Stopped watching job {}; it keeps running on the server.", job_id);
            return Ok(false);
        }
        state = follow_job(&mut rx) => state,
    };

    if let Some(error) = &finished.error {
        eprintln!("❌ {}", error);
        return Ok(false);
    }

    let Some(output) = finished.completed_result().cloned() else {
        eprintln!("❌ Job finished without a result.");
        return Ok(false);
    };

    print_questions(&output, false);

    let mut show_answers = false;
    if args.show_answers && view.snapshot().can_reveal() {
        println!("📺 Showing advertisement... (please wait)");
        show_answers = view.reveal_answers().await;
        if show_answers {
            print_questions(&output, true);
        }
    }

    if let Some(path) = &args.html {
        write_html(path, &output, show_answers).await?;
    }

    Ok(true)
}

/// Prints each status change until the job is no longer open.
async fn follow_job(rx: &mut tokio::sync::watch::Receiver<JobState>) -> JobState {
    let mut last_status: Option<JobStatus> = None;

    loop {
        let state = rx.borrow_and_update().clone();
        if state.job_status != last_status {
            if let Some(status) = &state.job_status {
                println!("   status: {}", status);
            }
            last_status = state.job_status.clone();
        }
        if state.polling_job().is_none() && !state.is_loading {
            return state;
        }
        if rx.changed().await.is_err() {
            return state;
        }
    }
}

fn print_questions(output: &GeneratedOutput, with_answers: bool) {
    println!();
    println!("📝 {}", output.exam_title().unwrap_or("Generated problems"));
    if !output.has_questions() {
        println!("No questions were found.");
        return;
    }
    for q in &output.questions {
        let topic = q.topic.as_deref().filter(|t| !t.is_empty()).unwrap_or("N/A");
        println!("\nQuestion {} (Topic: {})", q.question_index, topic);
        println!("{}", q.question_text);
        if with_answers {
            println!("\n  Answer:");
            println!("{}", q.answer_text);
        }
    }
}

async fn write_html(path: &Path, output: &GeneratedOutput, show_answers: bool) -> Result<()> {
    tokio::fs::write(path, render::render_document(output, show_answers)).await?;
    println!("💾 Wrote {}", path.display());
    Ok(())
}
