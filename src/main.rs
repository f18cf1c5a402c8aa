use anyhow::Result;
use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Input, Select};
use sci_storm::config::DEFAULT_CONFIG_PATH;
use sci_storm::models::{ExperimentRequest, GenerationContext, SessionState};
use sci_storm::report::{render_transcript, write_transcript};
use sci_storm::tasks::{DIALOGUE_TASK, DRAFTING_TASK, EVIDENCE_TASK, EXPERIMENT_TASK};
use sci_storm::{load_config, server, AppConfig, BackendAdapter, ExpertRoster, InferenceEngine};
use sci_storm::{GenerationOptions, SessionDriver, Step};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sci-storm", about = "Collaborative scientific authoring agent")]
struct Cli {
    /// Path to config.yaml
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Expert roster YAML; the built-in panel is used when omitted
    #[arg(long, global = true)]
    experts: Option<PathBuf>,

    /// Override the configured backend provider (ollama | vllm)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Override the configured model
    #[arg(long, global = true)]
    model: Option<String>,

    /// Sampling temperature for every backend call
    #[arg(long, global = true, default_value_t = 0.7)]
    temperature: f32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive session with review checkpoints
    Generate {
        /// Where the session transcript is written
        #[arg(long, default_value = "output/transcript.md")]
        output: PathBuf,

        /// Passes over the roster in the expert dialogue
        #[arg(long, default_value_t = 1)]
        turns: usize,
    },
    /// Serve the unattended session pipeline over HTTP
    Serve {
        #[arg(long, default_value = "0.0.0.0:3000")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sci_storm=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Generate { ref output, turns } => {
            let roster = load_roster(cli.experts.as_deref())?;
            run_interactive(&cli, &config, roster, output, turns).await
        }
        Command::Serve { ref bind } => {
            let roster = load_roster(cli.experts.as_deref())?;
            let engine = build_engine(&cli, &config, roster)?;
            let driver = Arc::new(SessionDriver::new(engine));
            server::serve(driver, bind).await
        }
    }
}

fn load_roster(path: Option<&Path>) -> Result<ExpertRoster> {
    let roster = match path {
        Some(path) => ExpertRoster::from_yaml_file(path)?,
        None => ExpertRoster::default(),
    };
    if roster.is_empty() {
        Ok(ExpertRoster::default_panel())
    } else {
        Ok(roster)
    }
}

fn build_engine(cli: &Cli, config: &AppConfig, roster: ExpertRoster) -> Result<Arc<InferenceEngine>> {
    let mut backend = BackendAdapter::new(config.backend.clone())?;
    if let Some(provider) = cli.provider.as_deref() {
        backend.switch(provider, cli.model.as_deref())?;
    } else if let Some(model) = cli.model.as_deref() {
        let provider = backend.provider().to_string();
        backend.switch(&provider, Some(model))?;
    }
    info!(provider = %backend.provider(), model = %backend.model(), "Backend selected");

    let engine = InferenceEngine::from_config(config, roster, Arc::new(backend))?
        .with_options(GenerationOptions::with_temperature(cli.temperature));
    Ok(Arc::new(engine))
}

async fn run_interactive(
    cli: &Cli,
    config: &AppConfig,
    mut roster: ExpertRoster,
    output: &Path,
    turns: usize,
) -> Result<()> {
    println!("Welcome to Sci-STORM. Checkpoints will pause for your review.\n");

    // Checkpoint 1: research setup
    let styles = ["Paper", "Report", "Blog"];
    let style = Select::new()
        .with_prompt("Document style")
        .items(&styles)
        .default(1)
        .interact()?;
    let goal: String = Input::new()
        .with_prompt("Target objective / research question")
        .interact_text()?;
    let structure: String = Input::new()
        .with_prompt("Structural requirements (e.g., IMRaD, bullet outline)")
        .default("IMRaD".to_string())
        .interact_text()?;
    let outline_hint: String = Input::new()
        .with_prompt("Outline format hint (optional)")
        .allow_empty(true)
        .interact_text()?;
    let language: String = Input::new()
        .with_prompt("Output language (optional)")
        .allow_empty(true)
        .interact_text()?;

    println!("\nGoal: {}\nStyle: {}\nStructure: {}\n", goal, styles[style], structure);
    if !Confirm::new().with_prompt("Proceed with this goal?").default(true).interact()? {
        anyhow::bail!("Aborting: goal not confirmed");
    }

    // Checkpoint 2: expert roster
    println!("\nProposed expert roster:\n{}\n", roster.describe_team());
    if Confirm::new()
        .with_prompt("Would you like to add another expert?")
        .default(false)
        .interact()?
    {
        let name: String = Input::new().with_prompt("Expert name").interact_text()?;
        let focus: String = Input::new()
            .with_prompt("Focus area")
            .default("Custom focus".to_string())
            .interact_text()?;
        let system_prompt: String = Input::new().with_prompt("System prompt").interact_text()?;
        roster.register(name, system_prompt, focus);
        println!("\nFinalized experts:\n{}\n", roster.describe_team());
    }
    if !Confirm::new()
        .with_prompt("Confirm experts and continue?")
        .default(true)
        .interact()?
    {
        anyhow::bail!("Aborting: experts not confirmed");
    }

    let mut ctx = GenerationContext::new(goal, styles[style], structure);
    ctx.outline_format_hint = Some(outline_hint).filter(|h| !h.trim().is_empty());
    ctx.output_language = Some(language).filter(|l| !l.trim().is_empty());

    let engine = build_engine(cli, config, roster)?;
    let driver = SessionDriver::new(engine);
    let session_id = driver.start(SessionState::new(ctx, turns)).await?;

    while let Step::Paused { next_task } = driver.step(&session_id).await? {
        checkpoint(&driver, &session_id, &next_task).await?;
    }

    let state = driver.state(&session_id).await?;
    for section in &state.sections {
        println!("\n## {}\n\n{}", section.title, section.content);
    }
    let transcript = render_transcript(&state, chrono::Utc::now());
    write_transcript(output, &transcript)?;
    println!("\nSession complete. Transcript saved to {}", output.display());
    Ok(())
}

/// Review point before `next_task` runs.
async fn checkpoint(driver: &SessionDriver, session_id: &str, next_task: &str) -> Result<()> {
    let mut state = driver.state(session_id).await?;
    match next_task {
        // Checkpoint 3: outline approval
        DIALOGUE_TASK => {
            println!(
                "\nDraft outline:\n{}\n",
                state.context.outline.as_deref().unwrap_or_default()
            );
            if !Confirm::new()
                .with_prompt("Approve outline to continue?")
                .default(true)
                .interact()?
            {
                anyhow::bail!("Outline rejected; rerun after refining the outline requirements");
            }
            let feedback: String = Input::new()
                .with_prompt("Feedback for the expert dialogue (optional)")
                .allow_empty(true)
                .interact_text()?;
            state.human_feedback = Some(feedback).filter(|f| !f.trim().is_empty());
            driver.set_state(session_id, state).await?;
        }
        EVIDENCE_TASK => {
            println!("\nExpert dialogue:\n{}\n", state.dialogue.join("\n\n"));
        }
        // Checkpoint 4: optional experiment
        EXPERIMENT_TASK => {
            if let Some(search) = &state.search {
                match &search.error {
                    Some(error) => println!("\nWeb search: {}", error),
                    None => println!("\nWeb search returned {} sources", search.sources.len()),
                }
            }
            if Confirm::new()
                .with_prompt("Run an experiment on the execution service before drafting?")
                .default(false)
                .interact()?
            {
                let hypothesis: String = Input::new().with_prompt("Hypothesis").interact_text()?;
                let code_path: String = Input::new().with_prompt("Path to code file").interact_text()?;
                let code = std::fs::read_to_string(&code_path)
                    .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", code_path, e))?;
                state.experiment = Some(ExperimentRequest { hypothesis, code });
                driver.set_state(session_id, state).await?;
            }
        }
        DRAFTING_TASK => {
            if let Some(report) = &state.experiment_report {
                println!("\n{}\n", report);
            } else if let Some(error) = &state.experiment_error {
                println!("\nExperiment failed: {}\n", error);
            }
            println!("Drafting sections...");
        }
        _ => {}
    }
    Ok(())
}
