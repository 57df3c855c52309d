//! Conversion orchestration for md2pdf.
//!
//! [`Pipeline`] ties the pieces together: it resolves input files, turns each
//! one into a conversion job, runs the jobs through the bounded
//! [`WorkerPool`](md2pdf_pool::WorkerPool), and shares one
//! [`DedupCache`](md2pdf_cache::DedupCache) per batch so identical diagrams
//! are rendered once. In watch mode every debounced change set becomes a new
//! batch.
//!
//! ```text
//! inputs -> FileMatcher -> jobs -> WorkerPool --(per job)--> read markdown
//!                                                          -> render diagrams (DedupCache, ArtifactStore)
//!                                                          -> substitute + compile
//! ```

mod convert;
mod error;
mod pipeline;

pub use error::PipelineError;
pub use pipeline::Pipeline;
