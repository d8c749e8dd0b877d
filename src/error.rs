//! The `error` module defines the crate-wide error type.

use std::error;
use std::fmt;
use std::io;

use super::Result;

/// `Error` enumerates everything that can go wrong while loading a channel,
/// decoding a block, or servicing the file-based IPC protocol.
#[derive(Debug)]
pub enum Error {
    /// An IO error occurred while reading or writing one of the protocol files.
    IoError(io::Error),
    /// A segment, block, or channel manifest was malformed.
    ParseError(&'static str),
    /// An operation was attempted that this crate does not implement.
    Unsupported(&'static str),
    /// A block's CRC did not match its header. Distinct from `ParseError` so
    /// callers can match on it without string comparison.
    CrcMismatch,
    /// The supplied passphrase did not grant the access level a channel requires.
    AccessDenied,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::IoError(ref err) => err.fmt(f),
            Error::ParseError(ref msg) => write!(f, "malformed channel data: {}", msg),
            Error::Unsupported(ref what) => write!(f, "unsupported: {}", what),
            Error::CrcMismatch => write!(f, "block CRC did not match its header"),
            Error::AccessDenied => write!(f, "passphrase does not grant required access level"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::IoError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

/// Creates a decode/parse error.
pub fn parse_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::ParseError(desc))
}

/// Creates an unsupported-operation error.
pub fn unsupported_error<T>(what: &'static str) -> Result<T> {
    Err(Error::Unsupported(what))
}
