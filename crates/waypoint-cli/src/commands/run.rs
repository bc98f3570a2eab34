use crate::OutputFormat;
use crate::commands::{BrowserArgs, MethodArg, runtime};
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use console::style;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use waypoint_browser::CdpDriver;
use waypoint_core::prompt::extract_url_and_task;
use waypoint_core::{EngineConfig, InteractionLoop, PluginPipeline, RunReport};
use waypoint_llm::{ChatClient, ClientConfig, Provider};
use waypoint_plugins::{CredentialStore, CredentialsPlugin, TelemetryPlugin, TelemetrySummary};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ProviderArg {
    Openai,
    Groq,
}

impl From<ProviderArg> for Provider {
    fn from(provider: ProviderArg) -> Self {
        match provider {
            ProviderArg::Openai => Provider::OpenAi,
            ProviderArg::Groq => Provider::Groq,
        }
    }
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// What to do, in plain words
    #[arg(value_name = "MESSAGE")]
    pub message: String,

    /// Start URL; when omitted the model picks it out of MESSAGE
    #[arg(long)]
    pub url: Option<String>,

    /// Engine config file (JSON), defaults to ~/.waypoint/config.json if present
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Hard ceiling on loop iterations
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<u32>,

    /// Draw numbered badges over mapped elements
    #[arg(long)]
    pub show_visuals: bool,

    /// Element detection method
    #[arg(long, value_enum)]
    pub method: Option<MethodArg>,

    /// Skip asking the model whether the task is done after each pass
    #[arg(long)]
    pub no_completion_check: bool,

    /// Chat completion provider
    #[arg(long, value_enum, default_value = "openai")]
    pub provider: ProviderArg,

    /// Model name (provider default if omitted)
    #[arg(long)]
    pub model: Option<String>,

    /// API key, read from OPENAI_API_KEY or GROQ_API_KEY if omitted
    #[arg(long)]
    pub api_key: Option<String>,

    /// JSON file of {host, username, password} entries for login forms
    #[arg(long, value_name = "FILE")]
    pub credentials: Option<PathBuf>,

    #[command(flatten)]
    pub browser: BrowserArgs,
}

pub fn execute(args: RunArgs, format: OutputFormat) -> Result<()> {
    let config = load_config(&args)?;

    let provider = Provider::from(args.provider);
    let mut client_config = ClientConfig::new(provider);
    client_config.api_key = args
        .api_key
        .clone()
        .or_else(|| std::env::var(provider.api_key_env()).ok());
    client_config.model = args.model.clone();
    let model = Arc::new(ChatClient::new(client_config)?);

    let credentials = match &args.credentials {
        Some(path) => {
            let store = CredentialStore::from_file(path)
                .with_context(|| format!("Failed to load credentials from {}", path.display()))?;
            Some(store)
        }
        None => None,
    };

    let runtime = runtime()?;
    let (report, telemetry) = runtime.block_on(run_task(&args, config, model, credentials))?;

    match format {
        OutputFormat::Json => {
            let output = json!({
                "report": report,
                "telemetry": telemetry,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Pretty => print_report(&report, &telemetry),
    }

    if !report.is_success() {
        anyhow::bail!("Task not completed: {}", report.stop_reason);
    }
    Ok(())
}

/// Config file (explicit, else the default location if it exists), then flag overrides.
fn load_config(args: &RunArgs) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => EngineConfig::from_file(&path)?,
            None => EngineConfig::default(),
        },
    };

    if let Some(max_iterations) = args.max_iterations {
        config.max_iterations = max_iterations;
    }
    if args.show_visuals {
        config.show_visuals = true;
    }
    if let Some(method) = args.method {
        config.detection = method.into();
    }
    if args.no_completion_check {
        config.completion_check = false;
    }

    config.validate()?;
    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".waypoint").join("config.json"))
}

async fn run_task(
    args: &RunArgs,
    config: EngineConfig,
    model: Arc<ChatClient>,
    credentials: Option<CredentialStore>,
) -> Result<(RunReport, TelemetrySummary)> {
    let (url, task) = match &args.url {
        Some(url) => (url.clone(), args.message.clone()),
        None => {
            eprintln!("🔎 Working out where to start...");
            extract_url_and_task(model.as_ref(), &args.message)
                .await
                .context("Could not find a URL in the message, pass --url")?
        }
    };

    eprintln!("🚀 Launching Chrome...");
    let driver = Arc::new(CdpDriver::launch(args.browser.launch_options()).await?);
    eprintln!("📍 Starting at: {}", url);
    eprintln!("🎯 Task: {}", task);

    let telemetry = Arc::new(TelemetryPlugin::new());
    let mut plugins = PluginPipeline::new().with(telemetry.clone());
    if let Some(store) = credentials {
        plugins.register(Arc::new(CredentialsPlugin::new(store)));
    }

    let engine = InteractionLoop::new(driver, model, plugins, config);
    let interrupt = {
        let cancel = engine.cancellation_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping after the current step");
                cancel.cancel();
            }
        })
    };

    let report = engine.run(&url, &task).await;
    interrupt.abort();

    Ok((report, telemetry.summary()))
}

fn print_report(report: &RunReport, telemetry: &TelemetrySummary) {
    println!();
    if report.is_success() {
        println!("✅ {}", style(&report.stop_reason).green().bold());
    } else {
        println!("❌ {}", style(&report.stop_reason).red().bold());
    }
    println!();

    println!("{}", style("Iterations").bold());
    for record in &report.iterations {
        println!(
            "  {:>3}. {} ({} elements)",
            record.iteration, record.url, record.elements
        );
        if let Some(decision) = &record.decision {
            println!("       {} {}", style("decided:").dim(), decision);
        }
        for action in &record.actions {
            println!("       {} {}", style("ran:").dim(), action.name());
        }
    }
    println!();

    let elapsed = report.finished_at - report.started_at;
    println!("{}", style("Summary").bold());
    println!("  Final URL:   {}", report.state.url);
    println!("  Iterations:  {}", report.state.iteration);
    println!(
        "  Actions:     {} ({} failed)",
        telemetry.actions_attempted(),
        telemetry.actions_failed
    );
    println!("  Errors:      {}", telemetry.errors);
    println!("  Duration:    {}s", elapsed.num_seconds());
}
