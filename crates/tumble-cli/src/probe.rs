use std::sync::Arc;

use anyhow::{anyhow, Result};
use tumble_client::ApiClient;
use tumble_harness::{standard_probes, ProbeRunner};

/// Runs the built-in battery (or one question) and reports the grades.
pub(crate) async fn run(client: Arc<ApiClient>, id: Option<&str>, json: bool) -> Result<()> {
    let probes = standard_probes();
    let runner = Arc::new(ProbeRunner::new(client));

    let results = match id {
        Some(id) => {
            let question = probes
                .iter()
                .find(|probe| probe.id == id)
                .ok_or_else(|| anyhow!("unknown probe id: {id}"))?;
            match runner.run_one(question).await {
                Some(result) => vec![result],
                None => Vec::new(),
            }
        }
        None => {
            // Ctrl-C aborts the battery between or during questions.
            let stopper = runner.clone();
            let watcher = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    stopper.stop_all();
                }
            });
            let results = runner.run_all(&probes).await;
            watcher.abort();
            results
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    println!(
        "{:<20} {:<10} {:<10} {:<6} {:>8}  {}",
        "probe", "expected", "actual", "pass", "ms", "note"
    );
    for result in &results {
        let expected = probes
            .iter()
            .find(|probe| probe.id == result.question_id)
            .map(|probe| probe.expected_tier.to_string())
            .unwrap_or_default();
        let actual = result
            .actual_tier
            .map(|tier| tier.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20} {:<10} {:<10} {:<6} {:>8}  {}",
            result.question_id,
            expected,
            actual,
            if result.pass { "pass" } else { "FAIL" },
            result.duration_ms,
            result.error.as_deref().unwrap_or("")
        );
    }

    let passed = results.iter().filter(|result| result.pass).count();
    println!();
    println!("{passed}/{} passed", results.len());
    Ok(())
}
