//! Work performed for one document.

use std::io::Write;
use std::path::{Path, PathBuf};

use md2pdf_cache::{AbortReason, ArtifactStore, DedupCache, Fingerprint, Lookup};
use md2pdf_config::OutputConfig;
use md2pdf_convert::{
    DiagramRenderer, DocumentCompiler, DocumentMetadata, extract_diagrams, image_reference,
    substitute_diagrams,
};
use md2pdf_pool::{AttemptContext, ErrorKind, JobError};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

use crate::error::{Step, cache_job_error, job_error};

/// Name prefix of the prepared documents written next to their sources.
pub(crate) const PREPARED_PREFIX: &str = ".md2pdf-";

/// Collaborators shared by every job of a pipeline.
#[derive(Debug)]
pub(crate) struct Tools<R, C> {
    pub renderer: R,
    pub compiler: C,
    pub store: ArtifactStore,
    pub output: OutputConfig,
}

/// Convert one Markdown file, returning the PDF path.
///
/// Diagrams are rendered in document order through the shared cache, then
/// the substituted document is compiled. A document without diagrams is
/// compiled directly from its source file.
pub(crate) async fn convert_document<R, C>(
    tools: &Tools<R, C>,
    cache: &DedupCache,
    input: &Path,
    ctx: &AttemptContext,
) -> Result<PathBuf, JobError>
where
    R: DiagramRenderer,
    C: DocumentCompiler,
{
    let markdown = tokio::fs::read_to_string(input)
        .await
        .map_err(|e| JobError::io(&e, Some(input.to_path_buf())))?;
    let metadata = DocumentMetadata::extract(&markdown, input);
    let blocks = extract_diagrams(&markdown);

    let output = tools.output.output_path(input);
    if let Some(dir) = output.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| JobError::io(&e, Some(dir.to_path_buf())))?;
    }

    let prepared = if blocks.is_empty() {
        None
    } else {
        let format = tools.renderer.format();
        let mut replacements = Vec::with_capacity(blocks.len());
        for block in &blocks {
            let artifact = render_diagram(tools, cache, &block.source, &ctx.cancel)
                .await
                .map_err(|e| with_document(e, input))?;
            replacements.push((block.span.clone(), image_reference(&artifact, format)));
        }
        let content = substitute_diagrams(&markdown, &replacements);
        Some(write_prepared(input, &content)?)
    };

    tracing::debug!(
        job = %ctx.job,
        attempt = ctx.attempt,
        diagrams = blocks.len(),
        title = %metadata.title,
        "Compiling document"
    );
    let source = prepared.as_ref().map_or(input, NamedTempFile::path);
    tools
        .compiler
        .compile(source, &output, &metadata, &ctx.cancel)
        .await
        .map_err(|e| with_document(job_error(e, Step::Compile), input))?;

    Ok(output)
}

/// Resolve one diagram to an artifact path, rendering it at most once.
async fn render_diagram<R, C>(
    tools: &Tools<R, C>,
    cache: &DedupCache,
    source: &str,
    cancel: &CancellationToken,
) -> Result<PathBuf, JobError>
where
    R: DiagramRenderer,
{
    let fingerprint = Fingerprint::of(source);

    let lookup = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(JobError::cancelled()),
        lookup = cache.lookup_or_reserve(&fingerprint) => lookup,
    };
    let reservation = match lookup {
        Ok(Lookup::Hit(path)) => return Ok(path),
        Ok(Lookup::Miss(reservation)) => reservation,
        // Another job already failed on this exact source
        Err(reason) => return Err(JobError::render(reason.message)),
    };

    if let Some(path) = tools.store.existing(&fingerprint) {
        tracing::debug!(%fingerprint, "Reusing diagram from an earlier run");
        reservation.commit(path.clone());
        return Ok(path);
    }

    match produce(tools, &fingerprint, source, cancel).await {
        Ok(path) => {
            reservation.commit(path.clone());
            Ok(path)
        }
        Err(error) => {
            let reason = if error.kind == ErrorKind::Render {
                AbortReason::deterministic(error.message.clone())
            } else {
                AbortReason::transient(error.message.clone())
            };
            reservation.abort(reason);
            Err(error)
        }
    }
}

/// Render into a staging directory and publish under the fingerprint name.
async fn produce<R, C>(
    tools: &Tools<R, C>,
    fingerprint: &Fingerprint,
    source: &str,
    cancel: &CancellationToken,
) -> Result<PathBuf, JobError>
where
    R: DiagramRenderer,
{
    let staging = tools.store.staging().map_err(cache_job_error)?;
    let rendered = tools
        .renderer
        .render(source, staging.path(), cancel)
        .await
        .map_err(|e| job_error(e, Step::Render))?;
    let published = tools
        .store
        .publish(fingerprint, &rendered)
        .map_err(cache_job_error)?;
    tracing::info!(%fingerprint, path = %published.display(), "Rendered diagram");
    Ok(published)
}

/// Write the substituted document next to its source so relative resources
/// still resolve. Removed when the handle drops.
fn write_prepared(input: &Path, content: &str) -> Result<NamedTempFile, JobError> {
    let dir = input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut file = tempfile::Builder::new()
        .prefix(PREPARED_PREFIX)
        .suffix(".md")
        .tempfile_in(dir)
        .map_err(|e| JobError::io(&e, Some(dir.to_path_buf())))?;
    file.write_all(content.as_bytes())
        .and_then(|()| file.flush())
        .map_err(|e| JobError::io(&e, Some(file.path().to_path_buf())))?;
    Ok(file)
}

/// Attach the document path unless the error already names a file.
fn with_document(error: JobError, input: &Path) -> JobError {
    if error.path.is_some() {
        error
    } else {
        error.with_path(input)
    }
}

/// Whether `path` is a prepared document written by [`convert_document`].
pub(crate) fn is_prepared(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with(PREPARED_PREFIX))
}
