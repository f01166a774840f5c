use thiserror::Error;

/// Failures of the external media tools (`ffmpeg`, `ffprobe`).
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("media metadata error: {0}")]
    Metadata(String),
}

pub type MediaResult<T> = std::result::Result<T, MediaError>;
