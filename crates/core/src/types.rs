/// Jobs are keyed by UUID on the scheduler side.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Path of the job-update WebSocket endpoint on the scheduler host.
pub const JOBS_WS_PATH: &str = "/ws/jobs/";
