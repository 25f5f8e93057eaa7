use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {}. Please specify 'yaml' or 'json'", s)),
        }
    }
}

/// Generate and check AppStudio custom resource definitions
#[derive(Parser, Debug)]
#[command(name = "appstudio-crdgen")]
#[command(about = "Generate and check AppStudio custom resource definitions", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the CustomResourceDefinition of every registered kind
    Crd {
        /// Output format: yaml or json
        #[arg(short, long, default_value = "yaml")]
        format: OutputFormat,

        /// Output file path (if not specified, outputs to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate Component manifests, reporting every violation
    Validate {
        /// Manifest files to check
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },
}
