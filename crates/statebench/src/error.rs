use std::{
    fmt::{self, Display},
    io, result,
};

pub type Result<T, E = Error> = result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
    IO(io::Error),

    /// The key is absent from the database.
    NotFound,
    Closed,
    CorruptKeyFile {
        offset: u64,
        reason: &'static str,
    },
    /// Any error reported by a storage engine, stringified.
    Engine(String),
    InvalidConfig(String),

    Str(&'static str),
    String(String),
}

impl Error {
    pub fn engine(error: impl Display) -> Self {
        Self::Engine(error.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::IO(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::String(value.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::IO(error) => Display::fmt(&error, f),
            Error::NotFound => write!(f, "key not found"),
            Error::Closed => write!(f, "database is closed"),
            Error::CorruptKeyFile { offset, reason } => {
                write!(f, "corrupt key file at byte {offset}: {reason}")
            }
            Error::Engine(s) => write!(f, "storage engine error: {s}"),
            Error::InvalidConfig(s) => write!(f, "invalid configuration: {s}"),

            Error::Str(s) => write!(f, "{s}"),
            Error::String(s) => write!(f, "{s}"),
        }
    }
}

impl std::error::Error for Error {}
