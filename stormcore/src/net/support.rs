pub type NetResult<T> = Result<T, NetError>;

/// Two-tier error plumbing for the byte-level code paths. `Wait` means the
/// operation cannot make progress yet (no complete frame buffered) and is
/// not an error; `Fatal` errors terminate the session.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum NetError {
    Wait,
    Fatal(ErrorKind),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorKind {
    /// The read or write buffer cannot hold the requested bytes.
    BufferExhausted,
    /// A declared length runs past the end of the frame.
    Truncated,
}

pub trait ErrorUtils {
    fn has_failed(&self) -> bool;
}

impl<T> ErrorUtils for NetResult<T> {
    fn has_failed(&self) -> bool {
        match self {
            Ok(_) => false,
            Err(NetError::Wait) => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_is_not_failure() {
        let result: NetResult<()> = Err(NetError::Wait);
        assert!(!result.has_failed());
        assert!(Ok::<(), NetError>(()).has_failed() == false);
        assert!(Err::<(), _>(NetError::Fatal(ErrorKind::Truncated)).has_failed());
    }
}
