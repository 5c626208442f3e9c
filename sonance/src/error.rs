//! Error types for Sonance

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SonanceError {
    /// Operation on a closed, deleted or never-issued handle.
    #[error("Invalid {kind} handle: {handle}")]
    InvalidHandle { kind: HandleKind, handle: String },

    /// Valid handle, illegal for the object's current state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Invalid enum: {0}")]
    InvalidEnum(String),

    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Failed to open device: {0}")]
    DeviceOpen(String),
}

pub type Result<T> = std::result::Result<T, SonanceError>;

/// The kind of object a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Device,
    Context,
    Buffer,
    Source,
}

impl std::fmt::Display for HandleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Device => "device",
            Self::Context => "context",
            Self::Buffer => "buffer",
            Self::Source => "source",
        };
        f.write_str(name)
    }
}

impl SonanceError {
    pub(crate) fn invalid_handle(kind: HandleKind, handle: impl std::fmt::Display) -> Self {
        Self::InvalidHandle {
            kind,
            handle: handle.to_string(),
        }
    }

    /// Returns the backend error enumerant this error is reported as.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidHandle { kind, .. } => match kind {
                HandleKind::Device => ErrorCode::InvalidDevice,
                HandleKind::Context => ErrorCode::InvalidContext,
                HandleKind::Buffer | HandleKind::Source => ErrorCode::InvalidName,
            },
            Self::InvalidOperation(_) => ErrorCode::InvalidOperation,
            Self::InvalidValue(_) => ErrorCode::InvalidValue,
            Self::InvalidEnum(_) => ErrorCode::InvalidEnum,
            Self::OutOfMemory(_) => ErrorCode::OutOfMemory,
            Self::DeviceOpen(_) => ErrorCode::InvalidDevice,
        }
    }
}

/// Error enumerants reported through the sticky `get_error` polling interface.
///
/// The AL and ALC ranges reuse numeric values (`AL_INVALID_NAME` and
/// `ALC_INVALID_DEVICE` are both `0xA001`), so [`ErrorCode::raw`] only makes
/// sense together with the object that was polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorCode {
    #[default]
    NoError,
    InvalidName,
    InvalidDevice,
    InvalidContext,
    InvalidEnum,
    InvalidValue,
    InvalidOperation,
    OutOfMemory,
}

impl ErrorCode {
    pub fn raw(self) -> i32 {
        match self {
            Self::NoError => 0,
            Self::InvalidName | Self::InvalidDevice => 0xA001,
            Self::InvalidEnum | Self::InvalidContext => 0xA002,
            Self::InvalidValue => 0xA003,
            Self::InvalidOperation => 0xA004,
            Self::OutOfMemory => 0xA005,
        }
    }

    /// Human-readable description of the code.
    pub fn description(self) -> &'static str {
        match self {
            Self::NoError => "No error.",
            Self::InvalidName => "Invalid name. A bad ID was passed to a function.",
            Self::InvalidDevice => {
                "No device. The device handle or specifier names an inaccessible driver/server."
            }
            Self::InvalidContext => {
                "Invalid context ID. The context argument does not name a valid context."
            }
            Self::InvalidEnum => "Bad enum. A token used is not valid, or not applicable.",
            Self::InvalidValue => {
                "Bad value. A value (e.g. attribute) is not valid, or not applicable."
            }
            Self::InvalidOperation => {
                "Invalid operation. The requested operation is not valid in the current state."
            }
            Self::OutOfMemory => "Out of memory. Unable to allocate memory.",
        }
    }

    /// Translates a polled code into a typed result.
    ///
    /// `NoError` becomes `Ok(())`; every other code becomes the matching
    /// [`SonanceError`] variant carrying `what` as its context.
    pub fn into_result(self, what: &str) -> Result<()> {
        let context = format!("{what}: {}", self.description());
        match self {
            Self::NoError => Ok(()),
            Self::InvalidName => Err(SonanceError::InvalidHandle {
                kind: HandleKind::Source,
                handle: what.to_string(),
            }),
            Self::InvalidDevice => Err(SonanceError::invalid_handle(HandleKind::Device, what)),
            Self::InvalidContext => Err(SonanceError::invalid_handle(HandleKind::Context, what)),
            Self::InvalidEnum => Err(SonanceError::InvalidEnum(context)),
            Self::InvalidValue => Err(SonanceError::InvalidValue(context)),
            Self::InvalidOperation => Err(SonanceError::InvalidOperation(context)),
            Self::OutOfMemory => Err(SonanceError::OutOfMemory(context)),
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Returns the description for `code` (`GetErrorString`).
pub fn error_string(code: ErrorCode) -> &'static str {
    code.description()
}

/// Sticky last-error slot shared by devices and contexts.
///
/// A failing call overwrites whatever code is stored; reading clears it.
#[derive(Debug, Default)]
pub(crate) struct ErrorSlot {
    last: std::cell::Cell<ErrorCode>,
}

impl ErrorSlot {
    /// Records the error of a failed result and passes the result through.
    pub(crate) fn track<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(error) = &result {
            log::debug!("Recording sticky error {:?}: {}", error.code(), error);
            self.last.set(error.code());
        }
        result
    }

    pub(crate) fn take(&self) -> ErrorCode {
        self.last.replace(ErrorCode::NoError)
    }
}
