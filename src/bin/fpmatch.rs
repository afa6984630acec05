//! fpmatch - offline inspection of stored fingerprint templates
//!
//! Scores template files against each other with the same driverless
//! strategies the engine uses at login, and prints JSON.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use biometric_engine::fingerprint::{most_representative, TemplateScorer};
use biometric_engine::{
    BackendRegistry, Capture, Engine, EngineConfig, FingerprintTemplate, IdentificationCandidate,
};

#[derive(Parser, Debug)]
#[command(name = "fpmatch", about = "Score and identify fingerprint template files")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pairwise similarity of two templates
    Score { a: PathBuf, b: PathBuf },
    /// 1:N identification of a probe against `id=path` candidates
    Identify {
        probe: PathBuf,
        #[arg(required = true, value_name = "ID=PATH")]
        candidates: Vec<String>,
        /// Acceptance threshold (default: request threshold from config)
        #[arg(long, env = "FPMATCH_THRESHOLD")]
        threshold: Option<u8>,
    },
    /// Pick the template that agrees best with the others
    Representative {
        #[arg(required = true, num_args = 2..)]
        templates: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = EngineConfig::load()?;
    let engine = Engine::new(config, BackendRegistry::new());

    let output = match args.command {
        Command::Score { a, b } => {
            let a = read_template(&a)?;
            let b = read_template(&b)?;
            let scorer = TemplateScorer::new(engine.config().fingerprint);
            let outcome = scorer.score_detailed(&a, &b, None);
            json!({
                "score": outcome.score,
                "strategy": outcome.strategy,
            })
        }
        Command::Identify {
            probe,
            candidates,
            threshold,
        } => {
            let probe = Capture::fingerprint_template(read_template(&probe)?);
            let candidates = candidates
                .iter()
                .map(|spec| parse_candidate(spec))
                .collect::<Result<Vec<_>>>()?;
            let threshold =
                threshold.unwrap_or(engine.config().fingerprint.request_score_threshold);
            let result = engine.identify_fingerprint(&probe, &candidates)?;
            json!({
                "found": result.found,
                "best_score": result.best_score,
                "best_candidate_id": result.best_candidate_id,
                "accepted": result.accepted(threshold),
                "threshold": threshold,
                "scored": result.scored,
                "total": result.total,
            })
        }
        Command::Representative { templates } => {
            let loaded = templates
                .iter()
                .map(|path| -> Result<FingerprintTemplate> {
                    Ok(FingerprintTemplate::new(read_template(path)?, 0))
                })
                .collect::<Result<Vec<_>>>()?;
            let mut scorer = TemplateScorer::new(engine.config().fingerprint);
            let idx = most_representative(&loaded, &mut scorer)?;
            json!({
                "index": idx,
                "path": idx.map(|i| templates[i].display().to_string()),
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn read_template(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read template {}", path.display()))?;
    if bytes.is_empty() {
        return Err(anyhow!("template {} is empty", path.display()));
    }
    Ok(bytes)
}

fn parse_candidate(spec: &str) -> Result<IdentificationCandidate> {
    let (id, path) = spec
        .split_once('=')
        .ok_or_else(|| anyhow!("candidate '{}' must be ID=PATH", spec))?;
    if id.is_empty() {
        return Err(anyhow!("candidate '{}' has an empty id", spec));
    }
    let bytes = read_template(Path::new(path))?;
    Ok(IdentificationCandidate::new(
        id,
        FingerprintTemplate::new(bytes, 0),
    ))
}
