use core::fmt::{Display, Formatter};

/// The decision state of a multi-word CAS operation.
///
/// `Undecided` can transition to `Succeeded` or to `Failed`, exactly once, through
/// a single CAS on the owning descriptor's status word. That CAS is the operation's
/// linearization point: the first thread to perform it decides the outcome for the
/// originator and every helper alike.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Status {
    /// The operation is still acquiring cells; its outcome is not yet fixed.
    Undecided = 0,
    /// Every cell held its expected value; the new values are being installed.
    Succeeded = 1,
    /// Some cell held an unexpected value; the original values are being restored.
    Failed = 2,
}

impl Status {
    pub(crate) fn word(self) -> usize {
        self as usize
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A status word held a value outside the three defined states.
#[derive(Debug, Eq, PartialEq)]
pub(crate) struct OutOfBoundsStatusError(pub(crate) usize);

impl TryFrom<usize> for Status {
    type Error = OutOfBoundsStatusError;

    fn try_from(word: usize) -> Result<Self, OutOfBoundsStatusError> {
        match word {
            w if w == Status::Undecided as usize => Ok(Status::Undecided),
            w if w == Status::Succeeded as usize => Ok(Status::Succeeded),
            w if w == Status::Failed as usize => Ok(Status::Failed),
            w => Err(OutOfBoundsStatusError(w)),
        }
    }
}
