use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tracing::info;

use sealgrid_core::{Dataset, DecodedOutput, Record};
use sealgrid_executor::{Executor, TimingReport};
use sealgrid_sim::{JsonDataset, cluster};

use crate::config::SearchConfig;

#[derive(Debug, Serialize)]
struct SearchReport {
    output_id: u64,
    result: DecodedOutput,
    record: Option<Record>,
    actions: usize,
    elapsed_ms: u128,
    timing: Option<TimingReport>,
}

/// Run the search described by a config file on a simulated cluster.
pub async fn run(config_path: &str, format: &str) -> anyhow::Result<()> {
    let config = SearchConfig::from_file(Path::new(config_path))?;
    config.validate()?;

    let dataset = Arc::new(JsonDataset::from_file(
        &config.dataset.path,
        &config.query.id_attribute,
    )?);
    let job = config.query.build_job()?;
    let nodes = cluster(
        &config.cluster.seed,
        config.cluster.nodes,
        config.cluster.latency(),
    );
    info!(
        dataset = %config.dataset.path.display(),
        items = dataset.len(),
        nodes = nodes.len(),
        "running search"
    );

    let execution = Executor::new(
        job,
        Arc::clone(&dataset) as Arc<dyn Dataset>,
        nodes,
        config.roots,
        config.executor.clone(),
    )?
    .execute()
    .await?;
    let result = execution.decode().context("decoding final output")?;

    let report = SearchReport {
        output_id: execution.output_id,
        record: dataset.item_by_id(result.id),
        result,
        actions: execution.actions,
        elapsed_ms: execution.elapsed.as_millis(),
        timing: execution.timing,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_text(&report)?,
    }
    Ok(())
}

fn print_text(report: &SearchReport) -> anyhow::Result<()> {
    println!(
        "best match: id {} (score {})",
        report.result.id, report.result.score
    );
    if let Some(record) = &report.record {
        println!("  {}", serde_json::to_string(record)?);
    }
    println!(
        "{} actions in {} ms, final output #{}",
        report.actions, report.elapsed_ms, report.output_id
    );
    if let Some(timing) = &report.timing {
        print!("{timing}");
    }
    Ok(())
}
