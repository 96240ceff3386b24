//! Status vocabulary shared by nodes, the scheduler and application code.
//!
//! Nodes report per-cycle results as [`RunResult`]: `Ok(Progress)` for normal
//! operation (including a deliberate skip) and `Err(NodeError)` for anything
//! that should terminate the current scheduling loop. [`Status`] is the flat
//! form of all of these with stable numeric codes, used when a result has to
//! cross an FFI or application boundary.

use core::fmt;

/// Non-error outcome of a node's `run()` step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Progress {
    /// The node consumed and produced its blocks.
    Done,
    /// The node had nothing to do this cycle. Not an error.
    Skip,
}

/// Cycle-terminating failure reported by a node's `run()` step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeError {
    /// The node would have read more elements than a channel holds.
    BufferUnderflow,
    /// The node would have written more elements than a channel can take.
    BufferOverflow,
    /// A pool was exhausted while the node ran.
    MemoryAllocation,
    /// The node discovered late that it was never properly initialized.
    InitFailure,
    /// A driver or operating-system call failed.
    Os,
}

/// Failure reported by a node's `init()` step. Aborts graph construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InitError {
    /// The node could not reach a usable state.
    InitFailure,
    /// A pool or allocation needed by the node was unavailable.
    MemoryAllocation,
}

/// Result of one `run()` step.
pub type RunResult = Result<Progress, NodeError>;

/// Every status the runtime can report, with stable numeric codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    /// `0`
    Success,
    /// `1`
    Skip,
    /// `-1`
    BufferUnderflow,
    /// `-2`
    BufferOverflow,
    /// `-3`
    MemoryAllocation,
    /// `-4`
    InitFailure,
    /// `-6`
    Os,
    /// `-7`
    Stop,
    /// `-8`
    Paused,
}

impl Status {
    /// Every status, in code order of declaration.
    pub const ALL: [Status; 9] = [
        Status::Success,
        Status::Skip,
        Status::BufferUnderflow,
        Status::BufferOverflow,
        Status::MemoryAllocation,
        Status::InitFailure,
        Status::Os,
        Status::Stop,
        Status::Paused,
    ];

    /// Numeric code of this status.
    pub const fn code(self) -> i32 {
        match self {
            Status::Success => 0,
            Status::Skip => 1,
            Status::BufferUnderflow => -1,
            Status::BufferOverflow => -2,
            Status::MemoryAllocation => -3,
            Status::InitFailure => -4,
            Status::Os => -6,
            Status::Stop => -7,
            Status::Paused => -8,
        }
    }

    /// Status for a numeric code, or `None` for unknown codes.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.code() == code)
    }

    /// `true` for the statuses that terminate a scheduling loop with a fault.
    pub const fn is_error(self) -> bool {
        self.code() < 0 && !matches!(self, Status::Stop | Status::Paused)
    }
}

impl From<Progress> for Status {
    fn from(progress: Progress) -> Self {
        match progress {
            Progress::Done => Status::Success,
            Progress::Skip => Status::Skip,
        }
    }
}

impl From<NodeError> for Status {
    fn from(err: NodeError) -> Self {
        match err {
            NodeError::BufferUnderflow => Status::BufferUnderflow,
            NodeError::BufferOverflow => Status::BufferOverflow,
            NodeError::MemoryAllocation => Status::MemoryAllocation,
            NodeError::InitFailure => Status::InitFailure,
            NodeError::Os => Status::Os,
        }
    }
}

impl From<InitError> for Status {
    fn from(err: InitError) -> Self {
        match err {
            InitError::InitFailure => Status::InitFailure,
            InitError::MemoryAllocation => Status::MemoryAllocation,
        }
    }
}

impl From<InitError> for NodeError {
    fn from(err: InitError) -> Self {
        match err {
            InitError::InitFailure => NodeError::InitFailure,
            InitError::MemoryAllocation => NodeError::MemoryAllocation,
        }
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferUnderflow => write!(f, "buffer underflow"),
            Self::BufferOverflow => write!(f, "buffer overflow"),
            Self::MemoryAllocation => write!(f, "memory allocation failure"),
            Self::InitFailure => write!(f, "initialization failure"),
            Self::Os => write!(f, "driver or OS error"),
        }
    }
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&NodeError::from(*self), f)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::Success => "success",
            Status::Skip => "skip",
            Status::BufferUnderflow => "buffer underflow",
            Status::BufferOverflow => "buffer overflow",
            Status::MemoryAllocation => "memory allocation failure",
            Status::InitFailure => "initialization failure",
            Status::Os => "driver or OS error",
            Status::Stop => "stopped",
            Status::Paused => "paused",
        };
        write!(f, "{text} ({})", self.code())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for NodeError {}

#[cfg(feature = "std")]
impl std::error::Error for InitError {}
