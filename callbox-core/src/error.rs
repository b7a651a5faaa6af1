use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected shape in {}: expected {expected}", .path.display())]
    Shape { path: PathBuf, expected: &'static str },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SnoozeError {
    #[error("invalid recipient {name:?}, must be one of: {}", .known.join(", "))]
    UnknownRecipient { name: String, known: Vec<String> },
}
