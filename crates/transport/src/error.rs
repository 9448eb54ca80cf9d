use okv_primitives::UnboundedPrefix;
use std::fmt::{Display, Formatter};


/// Numeric error codes delivered by the backend.
pub mod code {
    pub const PAST_VERSION: u32 = 1007;
    pub const FUTURE_VERSION: u32 = 1009;
    pub const NOT_COMMITTED: u32 = 1020;
    pub const COMMIT_UNKNOWN_RESULT: u32 = 1021;
    pub const TRANSACTION_TOO_OLD: u32 = 1031;
    pub const NO_MORE_SERVERS: u32 = 1042;
    pub const BROKEN_PROMISE: u32 = 1043;
    pub const OPERATION_CANCELLED: u32 = 1101;
    pub const TRANSACTION_TOO_LARGE: u32 = 2101;
    pub const KEY_TOO_LARGE: u32 = 2102;
    pub const VALUE_TOO_LARGE: u32 = 2103;
}


/// What the caller should do about a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The cancellation token fired; partial output is valid.
    Cancelled,
    /// Conflict or stale read; retry the transaction from scratch.
    Retryable,
    /// Network or server loss; retry with backoff.
    Transport,
    /// The caller violated a limit; fix the inputs.
    FatalInput,
    /// Other backend failure.
    Backend,
    /// Programming error on the caller's side.
    Contract
}


impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Retryable => "retryable",
            ErrorKind::Transport => "transport",
            ErrorKind::FatalInput => "fatal input",
            ErrorKind::Backend => "backend",
            ErrorKind::Contract => "contract"
        };
        f.write_str(name)
    }
}


/// Partition a backend error code into the caller-facing taxonomy.
pub fn classify(code: u32) -> ErrorKind {
    match code {
        code::PAST_VERSION
        | code::FUTURE_VERSION
        | code::NOT_COMMITTED
        | code::COMMIT_UNKNOWN_RESULT
        | code::TRANSACTION_TOO_OLD => ErrorKind::Retryable,
        code::OPERATION_CANCELLED => ErrorKind::Cancelled,
        code::NO_MORE_SERVERS | code::BROKEN_PROMISE => ErrorKind::Transport,
        code::TRANSACTION_TOO_LARGE | code::KEY_TOO_LARGE | code::VALUE_TOO_LARGE => {
            ErrorKind::FatalInput
        }
        _ => ErrorKind::Backend
    }
}


#[derive(Clone, Debug)]
pub struct BackendError {
    pub code: u32,
    pub message: String
}


impl BackendError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into()
        }
    }

    pub fn kind(&self) -> ErrorKind {
        classify(self.code)
    }
}


impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "backend error {}: {}", self.code, self.message)
    }
}


impl std::error::Error for BackendError {}


#[derive(Clone, Copy, Debug)]
pub struct Cancelled;


impl Display for Cancelled {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation was cancelled")
    }
}


impl std::error::Error for Cancelled {}


#[derive(Clone, Debug)]
pub struct ContractViolation {
    pub message: String
}


impl ContractViolation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into()
        }
    }
}


impl Display for ContractViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "contract violation: {}", self.message)
    }
}


impl std::error::Error for ContractViolation {}


/// Sticky terminal status of a cursor that already failed once.
#[derive(Clone, Copy, Debug)]
pub struct CursorFaulted {
    pub kind: ErrorKind
}


impl Display for CursorFaulted {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "cursor previously failed with a {} error", self.kind)
    }
}


impl std::error::Error for CursorFaulted {}


/// Classify an error chain into the taxonomy.
pub fn error_kind(err: &anyhow::Error) -> ErrorKind {
    for cause in err.chain() {
        if cause.downcast_ref::<Cancelled>().is_some() {
            return ErrorKind::Cancelled;
        }
        if let Some(backend) = cause.downcast_ref::<BackendError>() {
            return backend.kind();
        }
        if let Some(fault) = cause.downcast_ref::<CursorFaulted>() {
            return fault.kind;
        }
        if cause.downcast_ref::<ContractViolation>().is_some() {
            return ErrorKind::Contract;
        }
        if cause.downcast_ref::<UnboundedPrefix>().is_some() {
            return ErrorKind::Contract;
        }
    }
    ErrorKind::Backend
}
