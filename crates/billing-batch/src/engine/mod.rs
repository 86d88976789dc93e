//! Generic chunk-oriented batch engine
//!
//! Jobs are ordered lists of steps; chunk steps stream items from a reader
//! through a processor into a writer, committing one chunk at a time.
//! Nothing in here knows about billing.

pub mod chunk;
pub mod fault;
pub mod item;
pub mod job;
pub mod parameters;
pub mod repository;
pub mod step;

// Re-export commonly used types
pub use chunk::{execute_chunked, ChunkConfig, SkipPolicy};
pub use fault::{Fault, FaultHandler, SkipFileFaultHandler};
pub use item::{
    ItemProcessor, ItemReader, ItemWriter, ListItemReader, ListItemWriter, PassThroughProcessor,
    ReadItem,
};
pub use job::{Job, JobBuilder, JobLauncher, JobResult, JobStatus};
pub use parameters::{NoOpValidator, ParametersValidator, RunParameters, ValidationError};
pub use repository::{InMemoryJobRepository, JobRepository, SqliteJobRepository};
pub use step::{
    ChunkStep, ChunkStepBuilder, Step, StepContribution, StepResult, StepStatus, Tasklet,
    TaskletStep,
};
