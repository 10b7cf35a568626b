use thiserror::Error;

pub mod coordinate;
pub mod selector;
pub mod version;

pub use coordinate::{Coordinate, FileId, SourceArtifact};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid coordinate `{0}`, expected group:artifact[:version]")]
    InvalidCoordinate(String),
    #[error("Invalid file id `{0}`, expected group:artifact:version!/path/inside/archive")]
    InvalidFileIdentifier(String),
    #[error("Invalid scope `{0}`, expected one of compile, runtime, test, all")]
    InvalidScope(String),
    #[error("Invalid line range `{0}`, expected start,end")]
    InvalidLineRange(String),
}
