mod config;
mod logging;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flowmend_core::{
    Catalog, Hints, Inspection, NormalizeOutcome, Normalizer, WorkflowDocument, inspect,
    parse_candidate, validate_document,
};
use serde_json::Value;
use tracing::{info, warn};

// ── CLI ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "flowmend", about = "Repair generated workflow documents")]
struct Cli {
    /// Path to config file (default: ./flowmend.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize a candidate document into a valid workflow
    Normalize {
        /// Candidate file (stdin when omitted or "-")
        input: Option<PathBuf>,

        /// Name hint for the fallback skeleton
        #[arg(long)]
        name: Option<String>,

        /// Description hint for the fallback skeleton
        #[arg(long)]
        description: Option<String>,

        /// Input is raw generator text; extract the JSON from it first
        #[arg(long)]
        text: bool,

        /// Write the document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        compact: bool,
    },
    /// Check a document against the schema without repairing it
    Check {
        /// Document file (stdin when "-")
        input: PathBuf,
    },
    /// Summarize a document: counts, env variables and credentials it needs
    Inspect {
        /// Document file (stdin when "-")
        input: PathBuf,

        /// Repair the document before inspecting it
        #[arg(long)]
        normalize: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the fallback skeleton document
    Skeleton {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        compact: bool,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;
    let _guard = logging::init(&config.logging)?;

    let defaults = &config.normalize;
    let hints = |name: Option<String>, description: Option<String>| Hints {
        name: name.or_else(|| defaults.name.clone()).unwrap_or_default(),
        description: description
            .or_else(|| defaults.description.clone())
            .unwrap_or_default(),
    };

    match cli.command {
        Command::Normalize {
            input,
            name,
            description,
            text,
            output,
            compact,
        } => {
            let content = read_input(input.as_deref())?;
            let outcome = normalize_content(&content, text, hints(name, description))?;
            for repair in &outcome.repairs {
                info!("{}", repair);
            }
            if outcome.used_skeleton() {
                warn!("Candidate was unsalvageable; wrote the fallback skeleton");
            }
            write_output(output.as_deref(), &render(&outcome.document, compact)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { input } => {
            let content = read_input(Some(&input))?;
            match check_content(&content) {
                Ok(document) => {
                    println!(
                        "ok: {} nodes, {} edges, {} triggers",
                        document.nodes.len(),
                        document.edge_count(),
                        document.trigger_count
                    );
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    println!("invalid: {:#}", e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Inspect {
            input,
            normalize,
            json,
        } => {
            let content = read_input(Some(&input))?;
            let report = inspect_content(&content, normalize)?;
            let rendered = if json {
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?
            } else {
                report.to_string()
            };
            write_output(None, &rendered)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Skeleton {
            name,
            description,
            compact,
        } => {
            let document = Normalizer::new().hints(hints(name, description)).skeleton();
            write_output(None, &render(&document, compact)?)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ── Commands ────────────────────────────────────────────────────

/// Parse the input and normalize it. Only unreadable JSON is an error, and
/// only when the input is not flagged as generator text.
fn normalize_content(content: &str, as_text: bool, hints: Hints) -> Result<NormalizeOutcome> {
    let candidate: Value = if as_text {
        parse_candidate(content)
    } else {
        serde_json::from_str(content).context("Input is not JSON (use --text for raw output)")?
    };
    Ok(Normalizer::new().hints(hints).normalize(&candidate))
}

/// Strict parse plus invariant check.
fn check_content(content: &str) -> Result<WorkflowDocument> {
    let document: WorkflowDocument =
        serde_json::from_str(content).context("Document does not match the schema")?;
    validate_document(&document, Catalog::shared()).context("Document violates an invariant")?;
    Ok(document)
}

/// Strict parse, or a repair pass first when `normalize` is set.
fn inspect_content(content: &str, normalize: bool) -> Result<Inspection> {
    let document: WorkflowDocument = if normalize {
        let candidate: Value = serde_json::from_str(content).context("Input is not JSON")?;
        Normalizer::new().normalize(&candidate).document
    } else {
        serde_json::from_str(content)
            .context("Document does not match the schema (use --normalize)")?
    };
    Ok(inspect(&document, Catalog::shared()))
}

fn render(document: &WorkflowDocument, compact: bool) -> Result<String> {
    let rendered = if compact {
        serde_json::to_string(document)
    } else {
        serde_json::to_string_pretty(document)
    };
    rendered.context("Failed to serialize workflow")
}

// ── I/O ─────────────────────────────────────────────────────────

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input: {}", path.display())),
        _ => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("Failed to read stdin")?;
            Ok(content)
        }
    }
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("Failed to write output: {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", content).context("Failed to write stdout")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_content_json() {
        let outcome = normalize_content(r#"{"nodes": [{"id": "a"}]}"#, false, Hints::default())
            .unwrap();
        assert_eq!(outcome.document.nodes[0].id, "a");
    }

    #[test]
    fn test_normalize_content_rejects_non_json_without_text_flag() {
        assert!(normalize_content("not json", false, Hints::default()).is_err());
    }

    #[test]
    fn test_normalize_content_text_falls_back_to_skeleton() {
        let hints = Hints {
            name: "Fallback".into(),
            description: String::new(),
        };
        let outcome = normalize_content("Sorry, I can't help.", true, hints).unwrap();
        assert!(outcome.used_skeleton());
        assert_eq!(outcome.document.name, "Fallback");
    }

    #[test]
    fn test_check_accepts_normalized_output() {
        let outcome = normalize_content(
            r#"{"nodes": [{"type": "webhook"}, {"type": "gmail"}]}"#,
            false,
            Hints::default(),
        )
        .unwrap();
        let rendered = render(&outcome.document, true).unwrap();
        let document = check_content(&rendered).unwrap();
        assert_eq!(document.nodes.len(), 2);
        assert_eq!(document.edge_count(), 1);
    }

    #[test]
    fn test_check_rejects_raw_candidates() {
        assert!(check_content(r#"{"nodes": [{"id": "a"}]}"#).is_err());

        let outcome = normalize_content(r#"{"nodes": [{"id": "a"}]}"#, false, Hints::default())
            .unwrap();
        let mut value = serde_json::to_value(&outcome.document).unwrap();
        value["connections"] = serde_json::json!({"a": [[{
            "targetNodeId": "ghost", "portType": "main", "portIndex": 0
        }]]});
        let err = check_content(&value.to_string()).unwrap_err();
        assert!(format!("{:#}", err).contains("ghost"));
    }

    #[test]
    fn test_inspect_content() {
        let candidate = r#"{"nodes": [{"type": "webhook"}, {"type": "slack"}]}"#;
        assert!(inspect_content(candidate, false).is_err());

        let report = inspect_content(candidate, true).unwrap();
        assert_eq!(report.stats.total_nodes, 2);
        assert_eq!(report.stats.trigger_count, 1);
        assert_eq!(report.env_variables, ["SLACK_CHANNEL"]);
        assert_eq!(report.credentials, ["Slack API"]);

        let document = normalize_content(candidate, false, Hints::default())
            .unwrap()
            .document;
        let strict = inspect_content(&render(&document, true).unwrap(), false).unwrap();
        assert_eq!(strict.stats.total_connections, 1);
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "flowmend",
            "normalize",
            "in.json",
            "--name",
            "N",
            "--text",
            "-o",
            "out.json",
        ])
        .unwrap();
        match cli.command {
            Command::Normalize {
                input,
                name,
                text,
                output,
                ..
            } => {
                assert_eq!(input, Some(PathBuf::from("in.json")));
                assert_eq!(name.as_deref(), Some("N"));
                assert!(text);
                assert_eq!(output, Some(PathBuf::from("out.json")));
            }
            _ => panic!("expected normalize"),
        }

        let cli = Cli::try_parse_from(["flowmend", "inspect", "doc.json", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Inspect {
                json: true,
                normalize: false,
                ..
            }
        ));
    }
}
