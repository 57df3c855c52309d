//! Batch and watch orchestration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use md2pdf_cache::{ArtifactStore, DedupCache};
use md2pdf_config::{Config, DiagramFormat, MermaidConfig, OutputConfig, ProcessingConfig};
use md2pdf_convert::{
    DiagramRenderer, DocumentCompiler, FileMatcher, MermaidRenderer, PandocCompiler,
};
use md2pdf_pool::{
    AttemptContext, BatchResult, ConversionJob, JobId, PoolConfig, ProgressSink, RetryPolicy,
    WorkerPool,
};
use md2pdf_watch::Trigger;
use tokio_util::sync::CancellationToken;

use crate::PipelineError;
use crate::convert::{Tools, convert_document, is_prepared};

/// Converts Markdown files to PDF, one job per file.
///
/// Construction validates every setting that could fail a batch up front:
/// an invalid worker count or pattern is reported before any job runs.
pub struct Pipeline<R, C> {
    tools: Arc<Tools<R, C>>,
    pool: WorkerPool,
    matcher: FileMatcher,
    watch: md2pdf_watch::WatchConfig,
}

impl Pipeline<MermaidRenderer, PandocCompiler> {
    /// Pipeline backed by `mmdc` and `pandoc`.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let renderer = MermaidRenderer::new(config.mermaid.clone());
        let compiler = PandocCompiler::new(config.pandoc.clone(), config.font.clone());
        Self::new(config, renderer, compiler)
    }
}

impl<R, C> Pipeline<R, C>
where
    R: DiagramRenderer + 'static,
    C: DocumentCompiler + 'static,
{
    pub fn new(config: &Config, renderer: R, compiler: C) -> Result<Self, PipelineError> {
        let pool = WorkerPool::new(pool_config(&config.processing))?;
        let matcher = FileMatcher::new(
            &config.input_patterns,
            &config.ignore_patterns,
            config.watch.recursive,
        )?;
        let store = open_store(&config.mermaid, renderer.format())?;
        let output = OutputConfig {
            output_dir: absolute(&config.output.output_dir)?,
            ..config.output.clone()
        };
        let watch = md2pdf_watch::WatchConfig {
            debounce: config.watch.debounce(),
            recursive: config.watch.recursive,
            ignore_patterns: config.ignore_patterns.clone(),
        };

        Ok(Self {
            tools: Arc::new(Tools {
                renderer,
                compiler,
                store,
                output,
            }),
            pool,
            matcher,
            watch,
        })
    }

    /// Directory holding rendered diagram artifacts.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        self.tools.store.root()
    }

    /// Output path a given input file converts to.
    #[must_use]
    pub fn output_path(&self, input: &Path) -> PathBuf {
        self.tools.output.output_path(input)
    }

    /// Files a batch over `inputs` would convert.
    pub fn resolve(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>, PipelineError> {
        Ok(self.matcher.collect(inputs)?)
    }

    /// Resolve `inputs` and convert every matching file.
    pub async fn run(
        &self,
        inputs: &[PathBuf],
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<BatchResult<PathBuf>, PipelineError> {
        let files = self.resolve(inputs)?;
        Ok(self.run_files(files, progress, cancel).await)
    }

    /// Convert exactly `files`.
    ///
    /// Jobs share one [`DedupCache`] for the duration of the batch.
    pub async fn run_files(
        &self,
        files: Vec<PathBuf>,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> BatchResult<PathBuf> {
        let jobs: Vec<_> = files
            .into_iter()
            .map(|path| ConversionJob::new(JobId::new(path.display().to_string()), path))
            .collect();

        let cache = Arc::new(DedupCache::new());
        let work = {
            let tools = Arc::clone(&self.tools);
            let cache = Arc::clone(&cache);
            move |input: PathBuf, ctx: AttemptContext| {
                let tools = Arc::clone(&tools);
                let cache = Arc::clone(&cache);
                async move { convert_document(&tools, &cache, &input, &ctx).await }
            }
        };

        let result = self.pool.submit_batch(jobs, work, progress, cancel).await;

        let stats = cache.stats();
        tracing::info!(
            rendered = stats.misses,
            reused = stats.hits,
            coalesced = stats.coalesced,
            "Diagram cache"
        );
        result
    }

    /// Watch `roots` and run a batch for every debounced change set.
    ///
    /// `on_batch` receives each trigger with its result. Returns when
    /// `cancel` fires; a batch in progress at that point is cancelled too.
    pub async fn watch<F>(
        &self,
        roots: &[PathBuf],
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
        mut on_batch: F,
    ) -> Result<(), PipelineError>
    where
        F: FnMut(&Trigger, &BatchResult<PathBuf>),
    {
        // Event paths from notify are canonical
        let roots = roots
            .iter()
            .map(|root| {
                root.canonicalize().map_err(|source| PipelineError::Path {
                    path: root.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (mut triggers, handle) = md2pdf_watch::watch(&roots, &self.watch)?;

        loop {
            let trigger = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                trigger = triggers.recv() => match trigger {
                    Some(trigger) => trigger,
                    None => break,
                },
            };

            let files = self.changed_inputs(&trigger);
            if files.is_empty() {
                tracing::debug!(changes = trigger.len(), "No convertible files in change set");
                continue;
            }

            tracing::info!(
                root = %trigger.root.display(),
                files = files.len(),
                "Change detected, converting"
            );
            let result = self.run_files(files, progress, cancel).await;
            on_batch(&trigger, &result);
        }

        handle.stop();
        tracing::info!("Stopped watching");
        Ok(())
    }

    /// Existing input files named by a trigger.
    fn changed_inputs(&self, trigger: &Trigger) -> Vec<PathBuf> {
        trigger
            .present()
            .filter(|path| !is_prepared(path))
            .filter(|path| self.matcher.accepts(&trigger.root, path))
            .filter(|path| path.is_file())
            .map(Path::to_path_buf)
            .collect()
    }
}

impl<R, C> std::fmt::Debug for Pipeline<R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("pool", &self.pool)
            .field("cache_dir", &self.tools.store.root())
            .finish_non_exhaustive()
    }
}

fn pool_config(processing: &ProcessingConfig) -> PoolConfig {
    PoolConfig {
        max_workers: processing.max_workers,
        timeout: processing.timeout(),
        retry: RetryPolicy {
            attempts: processing.retry_attempts,
            backoff_factor: processing.retry_backoff,
            retry_render_failures: processing.retry_render_failures,
            ..RetryPolicy::default()
        },
    }
}

/// Open the artifact store, falling back to a temporary directory when the
/// configured one is unusable.
fn open_store(mermaid: &MermaidConfig, format: DiagramFormat) -> Result<ArtifactStore, PipelineError> {
    let version = mermaid.render_version();
    let root = absolute(&mermaid.cache_dir)?;

    match ArtifactStore::open(&root, format.extension(), &version) {
        Ok(store) => Ok(store),
        Err(e) => {
            let fallback = std::env::temp_dir().join("md2pdf-mermaid");
            tracing::warn!(
                cache_dir = %root.display(),
                fallback = %fallback.display(),
                error = %e,
                "Diagram cache unavailable, using temporary directory"
            );
            Ok(ArtifactStore::open(fallback, format.extension(), &version)?)
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf, PipelineError> {
    std::path::absolute(path).map_err(|source| PipelineError::Path {
        path: path.to_path_buf(),
        source,
    })
}
