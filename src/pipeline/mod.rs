// The ingest pipeline stages: bounded queues, directory discovery, the
// worker pool, and the serialized dual-store writer.

pub mod discovery;
pub mod queue;
pub mod worker;
pub mod writer;

pub use discovery::Discovery;
pub use queue::{work_queue, WorkQueue, WorkSource};
pub use worker::WorkerPool;
pub use writer::DualStoreWriter;
