//! Emits the CRDs of the AppStudio kinds and checks Component manifests
//! against the same rules the API types enforce.

mod cli;

use anyhow::Context;
use appstudio::error::Error;
use appstudio::Registry;
use clap::Parser;
use cli::{Args, Command, OutputFormat};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

fn main() -> anyhow::Result<()> {
    // logs go to stderr so generated manifests can be piped
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("appstudio=info,appstudio_crdgen=info")),
        )
        .init();

    let args = Args::parse();
    let registry = Registry::with_component_kinds();

    match args.command {
        Command::Crd { format, output } => {
            let rendered = render_crds(&registry, format)?;
            match output {
                Some(path) => {
                    fs::write(&path, rendered)
                        .with_context(|| format!("writing {}", path.display()))?;
                    tracing::info!(path = %path.display(), "wrote custom resource definitions");
                }
                None => print!("{rendered}"),
            }
            Ok(())
        }
        Command::Validate { files } => validate(&registry, &files),
    }
}

fn render_crds(registry: &Registry, format: OutputFormat) -> anyhow::Result<String> {
    let crds = registry.crds();
    match format {
        OutputFormat::Yaml => {
            let mut out = String::new();
            for crd in &crds {
                out.push_str("---\n");
                out.push_str(&serde_yaml::to_string(crd).context("serialize CRD")?);
            }
            Ok(out)
        }
        OutputFormat::Json => {
            let items = serde_json::to_value(&crds).context("serialize CRD")?;
            let list = json!({"apiVersion": "v1", "kind": "List", "items": items});
            let mut out = serde_json::to_string_pretty(&list).context("serialize CRD")?;
            out.push('\n');
            Ok(out)
        }
    }
}

fn validate(registry: &Registry, files: &[PathBuf]) -> anyhow::Result<()> {
    let mut invalid = 0;
    for file in files {
        match check_manifest(registry, file) {
            Ok(()) => println!("{}: valid", file.display()),
            Err(err) => {
                invalid += 1;
                match err.downcast_ref::<Error>() {
                    Some(Error::Validation(validation)) => {
                        println!("{}: invalid", file.display());
                        for violation in validation.violations() {
                            println!("  {violation}");
                        }
                    }
                    _ => println!("{}: {err:#}", file.display()),
                }
            }
        }
    }
    if invalid > 0 {
        anyhow::bail!("{invalid} of {} manifests are invalid", files.len());
    }
    Ok(())
}

fn check_manifest(registry: &Registry, file: &Path) -> anyhow::Result<()> {
    let yaml = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let value: Value = serde_yaml::from_str(&yaml).with_context(|| format!("parsing {}", file.display()))?;
    let component = registry.admit_component(value)?;
    tracing::debug!(component = %component.spec.component_name, "manifest is valid");
    Ok(())
}
