//! Markdown export of an experiment run, uploaded to object storage.

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use tracing::info;
use uuid::Uuid;

use crate::blueprint::spec::PromptSpec;
use crate::errors::AppError;
use crate::experiment::runner::ExperimentRun;

/// `experiments/{org_id}/{experiment_id}.md`; personal runs use `personal`.
pub fn report_key(organization_id: Option<Uuid>, experiment_id: Uuid) -> String {
    let scope = organization_id.map_or_else(|| "personal".to_string(), |id| id.to_string());
    format!("experiments/{scope}/{experiment_id}.md")
}

pub fn render_report_md(experiment_id: Uuid, spec: &PromptSpec, run: &ExperimentRun) -> String {
    let mut md = format!("# Experiment {experiment_id}\n\n");
    md.push_str(&format!("**Intent:** {}\n\n", spec.intent));
    if let Some(audience) = &spec.audience {
        md.push_str(&format!("**Audience:** {audience}\n\n"));
    }
    md.push_str(&format!(
        "**Cells:** {} ({} succeeded, {} failed)\n\n",
        run.cells.len(),
        run.succeeded,
        run.failed
    ));

    for cell in &run.cells {
        let best = if run.best_index == Some(cell.index) {
            " (best)"
        } else {
            ""
        };
        md.push_str(&format!(
            "## Cell {}: {} / {} / {}{best}\n\n",
            cell.index + 1,
            cell.tone,
            cell.length,
            cell.format
        ));

        if let Some(error) = &cell.error {
            md.push_str(&format!("_Failed: {error}_\n\n"));
            continue;
        }

        if let Some(score) = &cell.score {
            md.push_str(&format!(
                "**Score:** {} ({})\n\n",
                score.overall_score,
                score.grade.as_str()
            ));
            md.push_str("| Dimension | Score | Weight |\n|---|---|---|\n");
            for d in &score.dimensions {
                md.push_str(&format!("| {} | {:.1} | {:.2} |\n", d.dimension, d.score, d.weight));
            }
            md.push('\n');
        }
        if let Some(feedback) = &cell.feedback {
            md.push_str(&format!("> {feedback}\n\n"));
        }
        if let Some(output) = &cell.output {
            md.push_str("### Output\n\n");
            md.push_str(output.trim());
            md.push_str("\n\n");
        }
    }
    md
}

/// Uploads the rendered report under `key`.
pub async fn upload_report(
    s3: &S3Client,
    bucket: &str,
    key: &str,
    markdown: String,
) -> Result<(), AppError> {
    s3.put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(markdown.into_bytes()))
        .content_type("text/markdown")
        .send()
        .await
        .map_err(|e| AppError::S3(format!("report upload failed: {e}")))?;

    info!("Uploaded experiment report to s3://{bucket}/{key}");
    Ok(())
}
