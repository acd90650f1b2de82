use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use locate_patch::agent::summarize::{render_summaries, Summaries, Summarizer};
use locate_patch::agent::{locate, prompts, rag};
use locate_patch::artifacts::{RunArtifacts, RunLog};
use locate_patch::commits::{self, Commit};
use locate_patch::config::{Config, DEFAULT_CONFIG_FILE};
use locate_patch::conversation::{AnswerSource, FixedAnswer, StdinAnswers, Termination};
use locate_patch::embedding::{ChunkIndex, Document};
use locate_patch::git;
use locate_patch::llm::LlmPool;
use locate_patch::patch::{ChangeSet, PatchEngine};
use locate_patch::pipeline::Pipeline;

/// Locate the code a commit touches, then apply the model's change set.
#[derive(Debug, Parser)]
#[command(name = "locate-patch", version)]
struct Cli {
    /// YAML config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the commits in the data folder.
    Commits,

    /// Run an interactive locate session for one commit.
    Locate(RunArgs),

    /// Apply a change-set JSON file to the project tree.
    Apply {
        /// Change-set file.
        change_set: PathBuf,
    },

    /// Checkout, locate, request a change set and apply it.
    Pipeline(RunArgs),

    /// Summarize every source file at a commit's parent (cached).
    Summarize(CommitArg),

    /// Locate from retrieved file summaries in a single model call.
    Rag(CommitArg),
}

#[derive(Debug, Args)]
struct CommitArg {
    /// Commit hash or prefix; prompts for a choice when absent.
    #[arg(long)]
    commit: Option<String>,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    commit: CommitArg,

    /// Answer every model question with this text instead of asking on the terminal.
    #[arg(long)]
    auto_answer: Option<String>,
}

impl RunArgs {
    fn answers(&self) -> Box<dyn AnswerSource> {
        match &self.auto_answer {
            Some(text) => Box::new(FixedAnswer::new(text.clone())),
            None => Box::new(StdinAnswers::new()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;

    match cli.command {
        Command::Commits => {
            let commits = commits::load_commits(&config.data_folder)?;
            print!("{}", commits::render_listing(&commits));
        }
        Command::Locate(args) => run_locate(&config, &args).await?,
        Command::Apply { change_set } => run_apply(&config, &change_set)?,
        Command::Pipeline(args) => run_pipeline(&config, &args).await?,
        Command::Summarize(arg) => run_summarize(&config, &arg).await?,
        Command::Rag(arg) => run_rag(&config, &arg).await?,
    }
    Ok(())
}

async fn pick_commit(config: &Config, arg: &CommitArg) -> Result<Commit> {
    let all = commits::load_commits(&config.data_folder)?;
    let commit = match &arg.commit {
        Some(hash) => commits::find_commit(&all, hash)?,
        None => commits::select_commit(&all).await?,
    };
    println!("\nSelected: commit {} - {}", commit.hash, commit.message);
    Ok(commit.clone())
}

fn checkout(config: &Config, commit: &Commit) -> Result<()> {
    let parent = git::checkout_parent(&config.project_root, &commit.hash)
        .with_context(|| format!("checking out the parent of {}", commit.hash))?;
    println!("git checkout success: {parent}");
    Ok(())
}

async fn run_locate(config: &Config, args: &RunArgs) -> Result<()> {
    let commit = pick_commit(config, &args.commit).await?;
    checkout(config, &commit)?;

    let model = LlmPool::from_config(&config.model)?;
    let mut answers = args.answers();
    let session = locate::locate(&model, config, &commit, answers.as_mut()).await?;

    let artifacts = RunArtifacts::new(&config.results_dir, &config.logs_dir);
    let transcript = artifacts.write_transcript(
        locate::STAGE,
        &commit.data_type,
        &commit.hash,
        &session.conversation,
        session.result(),
    )?;
    println!("Transcript saved to {}", transcript.display());

    match session.termination {
        Termination::Finalized(result) => {
            println!("\nFunctions to change:\n{}", serde_json::to_string_pretty(&result)?);
            let path = artifacts.write_result(locate::STAGE, &commit.data_type, &commit.hash, &result)?;
            println!("Result saved to {}", path.display());
            Ok(())
        }
        Termination::Exhausted { turns } => bail!("no final answer after {turns} turns"),
        Termination::Failed(e) => Err(e.into()),
    }
}

fn run_apply(config: &Config, path: &Path) -> Result<()> {
    let set = ChangeSet::load(path)?;
    info!(operations = set.operations.len(), "applying change set");
    let report = PatchEngine::new(&config.project_root).apply(&set);
    println!("{report}");
    if report.failures() > 0 {
        bail!("change set applied with {} failures", report.failures());
    }
    Ok(())
}

async fn run_pipeline(config: &Config, args: &RunArgs) -> Result<()> {
    let commit = pick_commit(config, &args.commit).await?;
    let model = LlmPool::from_config(&config.model)?;
    let artifacts = RunArtifacts::new(&config.results_dir, &config.logs_dir);
    let mut log = RunLog::create(&artifacts.run_log_path(&commit.data_type, &commit.hash))?;
    let mut answers = args.answers();

    let pipeline = Pipeline::new(config, &model, artifacts);
    pipeline.run(&commit, answers.as_mut(), &mut log).await?;
    println!("Log saved to {}", log.path().display());
    Ok(())
}

async fn load_summaries(config: &Config, commit: &Commit, model: &LlmPool) -> Result<Summaries> {
    let template = prompts::load_template(prompts::Template::Summary, config.prompt_dir.as_deref())?;
    let summarizer = Summarizer::new(model, template, config.summarize.concurrency);
    Ok(summarizer
        .cached(
            &config.project_root,
            &config.source_extension,
            &config.cache_dir,
            &commit.hash,
        )
        .await?)
}

async fn run_summarize(config: &Config, arg: &CommitArg) -> Result<()> {
    let commit = pick_commit(config, arg).await?;
    checkout(config, &commit)?;
    let model = LlmPool::from_config(&config.model)?;

    let summaries = load_summaries(config, &commit, &model).await?;
    print!("{}", render_summaries(&summaries));
    Ok(())
}

async fn run_rag(config: &Config, arg: &CommitArg) -> Result<()> {
    let commit = pick_commit(config, arg).await?;
    checkout(config, &commit)?;
    let model = LlmPool::from_config(&config.model)?;

    let summaries = load_summaries(config, &commit, &model).await?;
    let documents: Vec<Document> = summaries
        .into_iter()
        .map(|(file, summary)| Document::new(file, summary))
        .collect();
    let index = ChunkIndex::build(
        &documents,
        config.retrieval.chunk_size,
        config.retrieval.chunk_overlap,
    );

    let answer = rag::rag_locate(&model, &index, config, &commit).await?;
    println!("\nModel answer:\n{}", answer.reply);
    match answer.result {
        Some(result) => {
            let artifacts = RunArtifacts::new(&config.results_dir, &config.logs_dir);
            let path = artifacts.write_result(rag::STAGE, &commit.data_type, &commit.hash, &result)?;
            println!("Result saved to {}", path.display());
            Ok(())
        }
        None => bail!("the model's answer carried no JSON locate result"),
    }
}
