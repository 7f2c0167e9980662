use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("unknown job status: {0}")]
    UnknownStatus(String),

    #[error("unknown task type: {0}")]
    UnknownTaskType(String),
}
