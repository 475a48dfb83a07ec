use cdn_experiment::ExperimentError;
use std::io;

#[derive(thiserror::Error, Debug)]
pub enum EdgeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("experiment error: {0}")]
    Experiment(#[from] ExperimentError),
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
}
