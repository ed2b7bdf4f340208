// ABOUTME: Entry point for the cloudrun-deploy CLI application.
// ABOUTME: Parses arguments, resolves settings and dispatches to the deploy pipeline.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use cloudrun_deploy::backend::ServiceRecord;
use cloudrun_deploy::config::{self, Settings};
use cloudrun_deploy::deploy::{DeployImageRequest, DeployRequest, FileItem, Pipeline};
use cloudrun_deploy::error::Result;
use cloudrun_deploy::gcp::GcpClient;
use cloudrun_deploy::output::Output;
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut output = Output::new(cli.output);
    output.start_timer();

    if let Err(e) = run(cli, &output).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    let cwd = env::current_dir()?;

    if let Commands::Init { force } = cli.command {
        let path = config::init_config(&cwd, cli.project.as_deref(), force)?;
        output.success(&format!("Created {}", path.display()));
        return Ok(());
    }

    let settings = Settings::discover_or_default(&cwd)?
        .with_env()?
        .with_overrides(cli.project.as_deref(), cli.region.as_deref())?;
    let project = settings.project()?.clone();

    let record = match cli.command {
        Commands::Deploy {
            paths,
            service,
            no_skip_iam_check,
        } => {
            let files = paths.into_iter().map(FileItem::Path).collect();
            let request = DeployRequest::new(
                project.as_str(),
                &service,
                settings.region.as_str(),
                files,
            )?
            .skip_iam_check(settings.skip_iam_check && !no_skip_iam_check);

            let client = GcpClient::connect(project, settings.gcp).await?;
            Pipeline::new(&client)
                .with_progress(output)
                .with_timings(settings.timings)
                .deploy(&request)
                .await?
        }
        Commands::DeployImage {
            image,
            service,
            no_skip_iam_check,
        } => {
            let request = DeployImageRequest::new(
                project.as_str(),
                &service,
                settings.region.as_str(),
                &image,
            )?
            .skip_iam_check(settings.skip_iam_check && !no_skip_iam_check);

            let client = GcpClient::connect(project, settings.gcp).await?;
            Pipeline::new(&client)
                .with_progress(output)
                .with_timings(settings.timings)
                .deploy_image(&request)
                .await?
        }
        Commands::Init { .. } => return Ok(()),
    };

    output.success(&deployed_message(&record));
    Ok(())
}

fn deployed_message(record: &ServiceRecord) -> String {
    match &record.uri {
        Some(uri) => format!("Deployed {} at {uri}", record.name),
        None => format!("Deployed {}", record.name),
    }
}
