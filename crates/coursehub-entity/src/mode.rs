//! The global access mode gating course selection.

use serde::{Deserialize, Serialize};

/// Global tri-state controlling what student sessions may do.
///
/// Persisted as an integer in the `misc` table and mirrored in a
/// process-wide atomic cell by the mode controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Mode {
    /// Student access is disabled; live sessions are disconnected.
    Closed = 0,
    /// Students can see their current holdings but not change them.
    Frozen = 1,
    /// Normal operation: students can choose and release courses.
    Open = 2,
}

impl Mode {
    /// The persisted integer form.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for Mode {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Closed),
            1 => Ok(Self::Frozen),
            2 => Ok(Self::Open),
            other => Err(other),
        }
    }
}

impl TryFrom<u32> for Mode {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Closed),
            1 => Ok(Self::Frozen),
            2 => Ok(Self::Open),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        for mode in [Mode::Closed, Mode::Frozen, Mode::Open] {
            assert_eq!(Mode::try_from(mode.as_i32()), Ok(mode));
        }
    }

    #[test]
    fn test_rejects_unknown() {
        assert_eq!(Mode::try_from(3), Err(3));
        assert_eq!(Mode::try_from(-1), Err(-1));
    }
}
