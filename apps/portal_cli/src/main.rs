use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use portal_client::{
    AdvanceOutcome, DashboardEvent, DashboardState, DashboardView,
    HttpPortalTransport, PollingDashboardClient, Progress, StepWizardClient, WizardForm,
};
use shared::error::FieldErrors;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod values;

use config::{load_settings, Settings, DEFAULT_CONFIG_PATH};
use values::load_step_values;

#[derive(Parser, Debug)]
#[command(about = "Faculty portal client: profile wizard and analytics dashboard")]
struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Overrides `base_url` from the settings file and environment.
    #[arg(long)]
    base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Complete the faculty profile, saving one step at a time.
    Wizard {
        #[arg(long)]
        values: PathBuf,
    },
    /// Show submission analytics, refreshing until interrupted.
    Dashboard {
        #[arg(long)]
        once: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings(&args.config)?;
    if let Some(base_url) = args.base_url {
        settings.base_url = base_url;
    }
    let transport = Arc::new(
        HttpPortalTransport::new(settings.transport_config()?)
            .context("failed to build portal transport")?,
    );
    info!(base_url = %transport.config().base_url, "portal client ready");

    match args.command {
        Command::Wizard { values } => run_wizard(&settings, transport, values).await,
        Command::Dashboard { once } => run_dashboard(&settings, transport, once).await,
    }
}

async fn run_wizard(
    settings: &Settings,
    transport: Arc<HttpPortalTransport>,
    values_path: PathBuf,
) -> Result<()> {
    let step_values = load_step_values(&values_path)?;
    let wizard = StepWizardClient::new(
        transport,
        WizardForm::faculty_profile(),
        settings.completion_redirect()?,
    )?;

    for (step, fields) in step_values {
        for (name, value) in fields {
            wizard.set_step_field(step, name, value).await?;
        }
    }

    println!("{}", render_progress(&wizard.progress().await));
    loop {
        match wizard.advance().await {
            Ok(AdvanceOutcome::Advanced(progress)) => println!("{}", render_progress(&progress)),
            Ok(AdvanceOutcome::Completed { redirect }) => {
                println!("Profile complete. Continue at {redirect}");
                return Ok(());
            }
            Err(err) => {
                if let Some(errors) = err.field_errors() {
                    eprint!("{}", render_field_errors(errors));
                }
                let step = wizard.state().await.current_step();
                return Err(anyhow!(err).context(format!(
                    "step {step} was not saved; fix the errors and run again"
                )));
            }
        }
    }
}

async fn run_dashboard(
    settings: &Settings,
    transport: Arc<HttpPortalTransport>,
    once: bool,
) -> Result<()> {
    let dashboard = PollingDashboardClient::new(transport);

    if once {
        dashboard.poll().await;
        return match dashboard.state().await {
            DashboardState::Content(view) => {
                println!("{}", render_view(&view));
                Ok(())
            }
            DashboardState::Error { message } => bail!("failed to load analytics: {message}"),
            DashboardState::Loading => bail!("analytics are not available right now"),
        };
    }

    let mut events = dashboard.subscribe();
    let poller = dashboard.start(settings.poll_interval())?;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(DashboardEvent::Updated(view)) => println!("{}", render_view(&view)),
                Some(DashboardEvent::LoadFailed { message }) => {
                    break Err(anyhow!("failed to load analytics: {message}"));
                }
                Some(DashboardEvent::Reloading) => {}
                None => break Ok(()),
            },
            _ = &mut ctrl_c => break Ok(()),
        }
    };

    poller.shutdown().await;
    events.unsubscribe();
    result
}

fn render_progress(progress: &Progress) -> String {
    format!(
        "Step {} of {} ({}%)",
        progress.step, progress.total_steps, progress.percent
    )
}

fn render_view(view: &DashboardView) -> String {
    let [approved, pending] = view.chart.datapoints();
    let [approved_label, pending_label] = view.chart.labels();
    format!(
        "total={} pending={} approved={} approval_rate={} | {approved_label}={approved} {pending_label}={pending}",
        view.stats.total, view.stats.pending, view.stats.approved, view.stats.approval_rate,
    )
}

fn render_field_errors(errors: &FieldErrors) -> String {
    errors
        .iter()
        .flat_map(|(field, messages)| {
            messages
                .iter()
                .map(move |message| format!("  {field}: {message}\n"))
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
