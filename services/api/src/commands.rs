use crate::infra::build_dispatcher;
use clap::Args;
use std::path::PathBuf;
use talent_dispatch::config::AppConfig;
use talent_dispatch::error::AppError;
use talent_dispatch::inference::{CredentialSlot, ScoringResult};
use talent_dispatch::intake::ScoringBatchImporter;
use talent_dispatch::telemetry;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// CSV with job_description and candidate_text columns (id, company_context, preferred_slot optional)
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Print results as a JSON array instead of a summary
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ResumeArgs {
    /// Plain-text resume to parse
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Credential slot to try first (primary, secondary, tertiary)
    #[arg(long)]
    pub(crate) prefer: Option<CredentialSlot>,
}

pub(crate) async fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let requests = ScoringBatchImporter::from_path(&args.input)?;
    let dispatcher = build_dispatcher(&config)?;

    let mut handles = Vec::with_capacity(requests.len());
    for request in requests {
        handles.push(dispatcher.submit(request)?);
    }
    dispatcher.flush();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await);
    }
    dispatcher.shutdown().await;

    if args.json {
        let rendered = serde_json::to_string_pretty(&results)
            .map_err(|err| AppError::Io(std::io::Error::other(err)))?;
        println!("{rendered}");
    } else {
        render_results(&results);
    }
    Ok(())
}

pub(crate) async fn run_resume(args: ResumeArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let resume_text = std::fs::read_to_string(&args.input)?;
    let dispatcher = build_dispatcher(&config)?;
    let invocation = dispatcher
        .invoker()
        .parse_resume(&resume_text, args.prefer)
        .await?;

    let rendered = serde_json::to_string_pretty(&invocation.value)
        .map_err(|err| AppError::Io(std::io::Error::other(err)))?;
    println!("{rendered}");
    eprintln!(
        "parsed via {} after {} failed attempt(s)",
        invocation.slot,
        invocation.failed_attempts.len()
    );
    Ok(())
}

fn render_results(results: &[ScoringResult]) {
    let failed = results.iter().filter(|result| result.is_failure()).count();
    println!(
        "Scored {} candidate(s), {} failed",
        results.len() - failed,
        failed
    );

    for result in results {
        let source = match result.served_by {
            Some(slot) => slot.label(),
            None => "none",
        };
        println!(
            "- {} | {:>3} | {} | via {} | {}",
            result.request_id,
            result.score,
            result.status.label(),
            source,
            result.reasoning
        );
    }
}
