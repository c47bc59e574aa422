/*!
 The error type returned by every fallible operation in this crate.
*/

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::Utf8Error;

/// The kind of table slot a reference was expected to resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    CString,
    Class,
    Object,
}

impl Display for ReferenceKind {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        match self {
            Self::CString => write!(fmt, "C string"),
            Self::Class => write!(fmt, "class"),
            Self::Object => write!(fmt, "object"),
        }
    }
}

/// Errors produced while reading or unarchiving a `typedstream`.
///
/// There is a single structural-fault variant, [`InvalidTypedStream`](TypedStreamError::InvalidTypedStream),
/// covering every malformed-byte condition described by the format itself, and a handful
/// of secondary variants surfaced by the unarchiver once the bytes are structurally sound
/// but semantically unexpected (wrong reference kind, wrong class, unsupported version, ...).
#[derive(Debug)]
pub enum TypedStreamError {
    /// A structural or tagging fault: truncated reads, invalid signature, an out-of-range
    /// or contextually invalid tag byte, an invalid boolean, a NUL byte inside a C string,
    /// an empty or nil type-encoding string, a malformed array/struct encoding, or an
    /// unsupported streamer version. `at` is the byte offset where the fault was detected.
    InvalidTypedStream { at: usize, reason: String },
    /// Ran out of bytes while `what` was being read at offset `at`.
    OutOfBounds { at: usize, what: &'static str },
    /// A reference's declared kind did not match the kind of the slot it resolved to.
    ReferenceKindMismatch {
        index: usize,
        expected: ReferenceKind,
        found: ReferenceKind,
    },
    /// A known class's contribution hook was asked to read a version it does not implement.
    UnsupportedClassVersion { class: String, version: i32 },
    /// The wire superclass name at some level of the chain disagreed with the base class
    /// name a known archived class declares.
    ClassHierarchyMismatch {
        class: String,
        expected_base: String,
        found_base: String,
    },
    /// A `decode_values_of_types`/`decode_value_of_type` call found the wire encoding did
    /// not match (tolerant of struct-name anonymization).
    UnexpectedEncoding {
        expected: String,
        found: String,
    },
    /// A decoded object was not an instance of the expected known class (nor a subclass).
    UnexpectedClass { expected: String, found: String },
    /// `decode_single_root` found more than one top-level typed-value group or a group
    /// with more than one value.
    MultipleRoots,
    /// `decode_single_root` found no top-level typed-value groups at all.
    NoRoots,
    /// Bytes claiming to be UTF-8 (e.g. a class or struct name) were not valid UTF-8.
    StringParseError(Utf8Error),
}

impl Display for TypedStreamError {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        match self {
            Self::InvalidTypedStream { at, reason } => {
                write!(fmt, "invalid typedstream at offset {at}: {reason}")
            }
            Self::OutOfBounds { at, what } => {
                write!(fmt, "ran out of bytes reading {what} at offset {at}")
            }
            Self::ReferenceKindMismatch {
                index,
                expected,
                found,
            } => write!(
                fmt,
                "reference {index} expected a {expected} slot, found a {found} slot"
            ),
            Self::UnsupportedClassVersion { class, version } => {
                write!(fmt, "{class} does not support archive version {version}")
            }
            Self::ClassHierarchyMismatch {
                class,
                expected_base,
                found_base,
            } => write!(
                fmt,
                "{class} expected base class {expected_base}, found {found_base} on the wire"
            ),
            Self::UnexpectedEncoding { expected, found } => write!(
                fmt,
                "expected type encoding {expected}, found {found} on the wire"
            ),
            Self::UnexpectedClass { expected, found } => write!(
                fmt,
                "expected an instance of {expected}, found {found}"
            ),
            Self::MultipleRoots => write!(fmt, "stream contains more than one root value"),
            Self::NoRoots => write!(fmt, "stream contains no root value"),
            Self::StringParseError(err) => write!(fmt, "invalid UTF-8: {err}"),
        }
    }
}

impl std::error::Error for TypedStreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::StringParseError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<Utf8Error> for TypedStreamError {
    fn from(err: Utf8Error) -> Self {
        Self::StringParseError(err)
    }
}

pub(crate) fn invalid(at: usize, reason: impl Into<String>) -> TypedStreamError {
    TypedStreamError::InvalidTypedStream {
        at,
        reason: reason.into(),
    }
}
