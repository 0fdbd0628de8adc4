use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use json_validation_service::registry::{directory, CompileSettings, SchemaOrigin, SchemaRegistry};
use json_validation_service::validation::ValidationEngine;

#[derive(Parser)]
#[command(name = "jvs-cli")]
#[command(about = "Management and offline-check CLI for the JSON Validation Service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Admin key sent as a bearer token.
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate local files against a local schema, without a server
    Check {
        /// Schema file
        #[arg(short, long)]
        schema: PathBuf,
        /// Report format checks (`format` keyword) as violations
        #[arg(long)]
        formats: bool,
        /// Documents to validate
        #[arg(required = true)]
        documents: Vec<PathBuf>,
    },
    /// Check service health
    Health,
    /// List registered schemas
    Schemas,
    /// Validate a file against a registered schema
    Validate {
        /// Registered schema name
        name: String,
        /// Document to validate
        document: PathBuf,
    },
}

const EXIT_INVALID: u8 = 1;
const EXIT_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            ref schema,
            formats,
            ref documents,
        } => check(schema, formats, documents),
        Commands::Health => remote(&cli, |c, url| c.get(format!("{url}/health"))).await,
        Commands::Schemas => remote(&cli, |c, url| c.get(format!("{url}/schemas"))).await,
        Commands::Validate {
            ref name,
            ref document,
        } => match std::fs::read(document) {
            Ok(body) => {
                remote(&cli, |c, url| {
                    c.post(format!("{url}/validate/{name}"))
                        .header(CONTENT_TYPE, "application/json")
                        .body(body)
                })
                .await
            }
            Err(e) => Err(format!("cannot read {}: {e}", document.display()).into()),
        },
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let value = serde_json::from_str(&content)
        .map_err(|e| format!("{} is not valid JSON: {e}", path.display()))?;
    Ok(value)
}

/// Register every sibling file that compiles as a schema, so `$ref`s from
/// the checked schema resolve. Files that are not schemas (often the
/// documents being checked) are skipped.
fn load_siblings(registry: &SchemaRegistry, dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut pending: Vec<(String, Value)> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter_map(|path| {
            let name = directory::schema_name_for_file(&path)?;
            let source = read_json(&path).ok()?;
            Some((name, source))
        })
        .collect();

    // Siblings may reference each other, so retry until a pass makes no progress.
    loop {
        let before = pending.len();
        pending.retain(|(name, source)| {
            registry
                .register(name, source.clone(), SchemaOrigin::Directory)
                .is_err()
        });
        if pending.len() == before {
            return;
        }
    }
}

fn check(
    schema: &Path,
    formats: bool,
    documents: &[PathBuf],
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let registry = SchemaRegistry::new(CompileSettings {
        validate_formats: formats,
    });
    let dir = schema
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    load_siblings(&registry, dir);

    let name = "cli-schema";
    registry.register(name, read_json(schema)?, SchemaOrigin::Api)?;
    let engine = ValidationEngine::new(std::sync::Arc::new(registry), usize::MAX);

    let mut all_valid = true;
    for path in documents {
        let report = engine.validate_named(name, &read_json(path)?)?;
        if report.valid {
            println!("{}: valid", path.display());
        } else {
            all_valid = false;
            println!("{}: invalid", path.display());
            for violation in &report.errors {
                println!("  {violation}");
            }
        }
    }

    Ok(if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_INVALID)
    })
}

async fn remote<F>(cli: &Cli, build: F) -> Result<ExitCode, Box<dyn std::error::Error>>
where
    F: FnOnce(&reqwest::Client, &str) -> reqwest::RequestBuilder,
{
    let client = reqwest::Client::new();
    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {key}"))?,
        );
    }

    let url = cli.url.trim_end_matches('/');
    let res = build(&client, url).headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let body = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };

    if status.is_success() {
        println!("{body}");
        Ok(ExitCode::SUCCESS)
    } else if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
        println!("{body}");
        Ok(ExitCode::from(EXIT_INVALID))
    } else {
        eprintln!("Error: service returned status {status}");
        eprintln!("{body}");
        Ok(ExitCode::from(EXIT_ERROR))
    }
}
