//! Error types for the engine binary.
//!
//! [`AppError`] is the top-level error that wraps every failure mode during
//! startup and shutdown.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, giving `main` a single
/// type to propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The simulation document could not be loaded.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: simfeed_core::config::ConfigError,
    },

    /// The observer server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: simfeed_observer::ServerError,
    },

    /// The scheduler task failed.
    #[error("scheduler error: {source}")]
    Scheduler {
        /// The underlying scheduler error.
        #[from]
        source: simfeed_core::scheduler::SchedulerError,
    },

    /// A spawned task panicked or was cancelled.
    #[error("task error: {source}")]
    Task {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },

    /// NATS connection failed.
    #[error("NATS error: {message}")]
    Nats {
        /// Description of the NATS failure.
        message: String,
    },
}
