// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use cloudrun_deploy::output::OutputMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cloudrun-deploy")]
#[command(about = "Deploy local source or container images to Cloud Run")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputMode::Normal)]
    pub output: OutputMode,

    /// Google Cloud project (overrides GOOGLE_CLOUD_PROJECT and the config file)
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// Region to deploy to (overrides GOOGLE_CLOUD_REGION and the config file)
    #[arg(long, global = true)]
    pub region: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build local source remotely and deploy it
    Deploy {
        /// Files or directories to package (defaults to the current directory)
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,

        /// Cloud Run service name
        #[arg(short, long)]
        service: String,

        /// Keep the invoker IAM check (service is not publicly reachable)
        #[arg(long)]
        no_skip_iam_check: bool,
    },

    /// Deploy an existing container image
    DeployImage {
        /// Image reference, e.g. europe-west1-docker.pkg.dev/project/repo/app:tag
        #[arg(short, long)]
        image: String,

        /// Cloud Run service name
        #[arg(short, long)]
        service: String,

        /// Keep the invoker IAM check (service is not publicly reachable)
        #[arg(long)]
        no_skip_iam_check: bool,
    },

    /// Initialize a new cloudrun-deploy.yml configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
