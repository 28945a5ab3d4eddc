use std::io;
use std::path::PathBuf;

/// The external systems a round depends on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Collaborator {
    ImageGenerator,
    ObjectDetector,
}

impl std::fmt::Display for Collaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Collaborator::ImageGenerator => write!(f, "image generator"),
            Collaborator::ObjectDetector => write!(f, "object detector"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CollaboratorError {
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),
    #[error("request was rejected with status {status}: {payload}")]
    Rejected { status: u16, payload: String },
    #[error("no API key is configured")]
    MissingApiKey,
    #[error("I/O error")]
    Io(#[from] io::Error),
    #[error("malformed message")]
    Protocol(#[from] serde_json::Error),
    #[error("the detector process closed its output")]
    ProcessExited,
    #[error("could not decode the generated image")]
    Image(#[from] image::ImageError),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not read '{}'", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse definitions file '{}'", path.display())]
    MalformedDefinitions {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid target in definitions file '{}'", path.display())]
    InvalidTarget {
        path: PathBuf,
        #[source]
        source: taboo::InvalidTarget,
    },
    #[error("line {line} of credentials file '{}' is not a key=value pair", path.display())]
    MalformedCredentials { path: PathBuf, line: usize },
    #[error("could not parse detector config '{}'", path.display())]
    MalformedDetectorConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("detector config '{}' has an empty command", path.display())]
    EmptyDetectorCommand { path: PathBuf },
    #[error("'{}' is not a directory", path.display())]
    NotADirectory { path: PathBuf },
    #[error(transparent)]
    UnknownTargets(#[from] taboo::UnknownTargets),
}

#[derive(thiserror::Error, Debug)]
pub enum GameError {
    #[error("configuration error")]
    Config(#[from] ConfigError),
    #[error("no unused targets are left for round {round_index}")]
    EmptyPool { round_index: usize },
    #[error("target '{answer}' has no definition")]
    UnknownTarget { answer: String },
    #[error("the {collaborator} failed")]
    Collaborator {
        collaborator: Collaborator,
        #[source]
        source: CollaboratorError,
    },
    #[error("the player's input was closed")]
    InputClosed,
    #[error("could not talk to the player")]
    Terminal(#[source] io::Error),
    #[error("could not save image '{}'", path.display())]
    SaveImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("could not write round recording '{}'", path.display())]
    Recording {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl GameError {
    pub fn generator(source: CollaboratorError) -> Self {
        GameError::Collaborator {
            collaborator: Collaborator::ImageGenerator,
            source,
        }
    }

    pub fn detector(source: CollaboratorError) -> Self {
        GameError::Collaborator {
            collaborator: Collaborator::ObjectDetector,
            source,
        }
    }
}
