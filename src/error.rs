use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("no target specified, use one of --file, --ip or --ignore")]
    NoTarget,

    #[error("failed to read {}: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid network block '{value}': {source}")]
    InvalidCidr {
        value: String,
        #[source]
        source: ipnet::AddrParseError,
    },

    #[error("unsupported output type '{0}', expected json or csv")]
    UnsupportedFormat(String),

    #[error("request failed: {0}")]
    Transport(#[from] minreq::Error),

    #[error("unexpected HTTP status {0}")]
    Status(i32),

    #[error("{} already exists, aborted by operator", .0.display())]
    Aborted(PathBuf),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LookupError {
    /// Process exit status for an error that ended the run.
    pub fn exit_code(&self) -> i32 {
        match self {
            LookupError::Aborted(_) => 0,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, LookupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(LookupError::NoTarget.exit_code(), 1);
        assert_eq!(LookupError::UnsupportedFormat("xml".into()).exit_code(), 1);
        assert_eq!(LookupError::Aborted(PathBuf::from("out.csv")).exit_code(), 0);
        assert_eq!(LookupError::Status(500).exit_code(), 1);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            LookupError::UnsupportedFormat("xml".into()).to_string(),
            "unsupported output type 'xml', expected json or csv"
        );
        assert_eq!(
            LookupError::Aborted(PathBuf::from("out.csv")).to_string(),
            "out.csv already exists, aborted by operator"
        );
        let unreadable = LookupError::FileRead {
            path: PathBuf::from("ips.txt"),
            source: io::Error::new(io::ErrorKind::InvalidData, "bad bytes"),
        };
        assert_eq!(unreadable.to_string(), "failed to read ips.txt: bad bytes");
    }
}
