//! Network side: the connection supervisor.

mod supervisor;

pub use supervisor::{SessionOutcome, Supervisor, WorkerMessage};
