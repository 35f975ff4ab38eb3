//! Closed error model shared by every layer of the codec.
//!
//! A single error struct records the call site, an optional human message,
//! and an optional source error, propagated with a `.at(context)` adapter
//! rather than `?` losing the call site.

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::panic::Location;

/// The closed set of error kinds this crate can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    GenericError,
    PrefixUnknown,
    VersionUnsupported,
    FrameParameterUnsupported,
    CorruptionDetected,
    ChecksumWrong,
    DictionaryCorrupted,
    DictionaryWrong,
    ParameterUnsupported,
    ParameterOutOfBound,
    TableLogTooLarge,
    MaxSymbolValueTooLarge,
    MaxSymbolValueTooSmall,
    StageWrong,
    InitMissing,
    MemoryAllocation,
    WorkSpaceTooSmall,
    DstSizeTooSmall,
    SrcSizeWrong,
    DstBufferNull,
}

impl ErrorCode {
    /// Classification used by callers deciding whether a partially-produced
    /// frame can still be salvaged.
    pub fn class(self) -> ErrorClass {
        use ErrorClass::*;
        use ErrorCode::*;
        match self {
            CorruptionDetected | ChecksumWrong | DictionaryCorrupted | SrcSizeWrong => InputFatal,
            DstSizeTooSmall => CapacityTransient,
            ParameterUnsupported
            | ParameterOutOfBound
            | StageWrong
            | InitMissing
            | FrameParameterUnsupported
            | VersionUnsupported
            | PrefixUnknown
            | DictionaryWrong
            | TableLogTooLarge
            | MaxSymbolValueTooLarge
            | MaxSymbolValueTooSmall
            | DstBufferNull
            | GenericError => Configuration,
            MemoryAllocation | WorkSpaceTooSmall => Resource,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    InputFatal,
    CapacityTransient,
    Configuration,
    Resource,
}

pub struct ZstdError {
    pub code: ErrorCode,
    pub message: Option<String>,
    pub context: Option<String>,
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub location: &'static Location<'static>,
}

pub type Res<T> = Result<T, ZstdError>;

impl Debug for ZstdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZstdError")
            .field("code", &self.code)
            .field("message", &self.message)
            .field("context", &self.context)
            .field("location", &self.location)
            .finish()
    }
}

impl Display for ZstdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} at {}", self.code, self.location)?;
        if let Some(context) = &self.context {
            write!(f, " ({context})")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(source) = &self.source {
            write!(f, "\ncaused by {source}")?;
        }
        Ok(())
    }
}

impl StdError for ZstdError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<ZstdError> for std::io::Error {
    fn from(value: ZstdError) -> Self {
        let kind = match value.code.class() {
            ErrorClass::InputFatal => std::io::ErrorKind::InvalidData,
            ErrorClass::CapacityTransient => std::io::ErrorKind::WriteZero,
            ErrorClass::Configuration => std::io::ErrorKind::InvalidInput,
            ErrorClass::Resource => std::io::ErrorKind::OutOfMemory,
        };
        std::io::Error::new(kind, value)
    }
}

impl ZstdError {
    #[track_caller]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ZstdError {
            code,
            message: Some(message.into()),
            context: None,
            source: None,
            location: Location::caller(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Adapter trait: attach a call-site-local context string to an error as it
/// unwinds, without discarding the original location.
pub trait WithContext<T> {
    fn at(self, context: &str) -> Res<T>;
}

impl<T> WithContext<T> for Res<T> {
    fn at(self, context: &str) -> Res<T> {
        self.map_err(|mut e| {
            e.context = Some(match e.context.take() {
                Some(prev) => format!("{context} <- {prev}"),
                None => context.to_string(),
            });
            e
        })
    }
}

#[macro_export]
macro_rules! bail {
    ($code:expr, $($arg:tt)*) => {
        return Err($crate::error::ZstdError::new($code, format!($($arg)*)))
    };
}

#[macro_export]
macro_rules! ensure {
    ($cond:expr, $code:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($code, $($arg)*);
        }
    };
}
