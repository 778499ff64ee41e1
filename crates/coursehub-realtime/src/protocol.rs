//! The line-oriented text protocol spoken over the WebSocket.
//!
//! A frame is a sequence of space-separated fields. The final field may
//! be a "trailing": when a field starts with `:`, the rest of the line
//! (spaces included) is that field, with the leading `:` stripped. This
//! is an RFC-1459-style message without CR-LF framing or prefixes; the
//! WebSocket provides message boundaries. Fields may not contain space,
//! NUL, CR, or LF, and only the trailing may begin with `:`.

use std::fmt;

/// WebSocket subprotocol identifier negotiated at upgrade.
pub const SUBPROTOCOL: &str = "cca1";

/// Split a frame into its fields, honoring the trailing argument.
pub fn split_frame(line: &str) -> Vec<String> {
    let mut fields = Vec::with_capacity(4);
    let mut rest = line;
    loop {
        match rest.split_once(' ') {
            None => {
                fields.push(rest.to_string());
                break;
            }
            Some((head, tail)) => {
                fields.push(head.to_string());
                if let Some(trailing) = tail.strip_prefix(':') {
                    fields.push(trailing.to_string());
                    break;
                }
                rest = tail;
            }
        }
    }
    fields
}

/// A parse failure, reported to the client as `E :<reason>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The frame was empty.
    Empty,
    /// The frame had more fields than the configured cap.
    TooManyArguments,
    /// The verb is not part of the protocol.
    UnknownVerb(String),
    /// The verb was given the wrong number of arguments.
    BadArity(&'static str),
    /// A course id argument was not an integer.
    BadCourseId,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty message"),
            Self::TooManyArguments => write!(f, "Too many arguments"),
            Self::UnknownVerb(verb) => write!(f, "Unknown command {verb}"),
            Self::BadArity(verb) => write!(f, "Invalid number of arguments for {verb}"),
            Self::BadCourseId => write!(f, "Course ID must be an integer"),
        }
    }
}

/// A frame sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// Legacy handshake; the server re-emits the welcome.
    Hello,
    /// Request to hold a seat: `Y <courseid>`.
    Choose {
        /// Course to hold.
        course_id: i32,
    },
    /// Release a held seat: `N <courseid>`.
    Release {
        /// Course to release.
        course_id: i32,
    },
}

impl ClientFrame {
    /// Parse one inbound frame, bounding the field count at `args_cap`.
    pub fn parse(line: &str, args_cap: usize) -> Result<Self, FrameError> {
        let fields = split_frame(line);
        if fields.len() > args_cap {
            return Err(FrameError::TooManyArguments);
        }
        let verb = fields.first().map(String::as_str).unwrap_or("");
        match verb {
            "" => Err(FrameError::Empty),
            "HELLO" => Ok(Self::Hello),
            "Y" => Ok(Self::Choose {
                course_id: parse_course_id(&fields, "Y")?,
            }),
            "N" => Ok(Self::Release {
                course_id: parse_course_id(&fields, "N")?,
            }),
            other => Err(FrameError::UnknownVerb(other.to_string())),
        }
    }
}

fn parse_course_id(fields: &[String], verb: &'static str) -> Result<i32, FrameError> {
    if fields.len() != 2 {
        return Err(FrameError::BadArity(verb));
    }
    fields[1].parse().map_err(|_| FrameError::BadCourseId)
}

/// Why a `Y`/`N` request was rejected with an `R` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The course has no free seats.
    Full,
    /// The user already holds a course in the same group.
    GroupConflict,
    /// The course id is not in the catalogue.
    NoSuchCourse,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "Full"),
            Self::GroupConflict => write!(f, "Group conflict"),
            Self::NoSuchCourse => write!(f, "No such course"),
        }
    }
}

/// A frame sent by the server. `Display` yields the exact wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    /// Hold confirmed (or re-confirmed): `Y <courseid>`.
    Confirm {
        /// Confirmed course.
        course_id: i32,
    },
    /// Seat released: `N <courseid>`.
    Released {
        /// Released course.
        course_id: i32,
    },
    /// Request rejected: `R <courseid> :<reason>`.
    Reject {
        /// Rejected course.
        course_id: i32,
        /// Why.
        reason: RejectReason,
    },
    /// Current seat count: `M <courseid> <selected>`.
    Count {
        /// Course the count belongs to.
        course_id: i32,
        /// Allocated seats right now.
        selected: u32,
    },
    /// Mode switched to open.
    Start,
    /// Mode switched to frozen.
    Stop,
    /// Error, often terminal for the frame: `E :<reason>`.
    Error {
        /// Human-readable reason.
        reason: String,
    },
    /// Not authenticated; sent before close.
    Unauthenticated,
    /// Welcome with the user's current course ids: `HI :<csv>`.
    Welcome {
        /// Course ids the user currently holds.
        course_ids: Vec<i32>,
    },
}

impl ServerFrame {
    /// Shorthand for an `E :<reason>` frame.
    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ServerFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirm { course_id } => write!(f, "Y {course_id}"),
            Self::Released { course_id } => write!(f, "N {course_id}"),
            Self::Reject { course_id, reason } => write!(f, "R {course_id} :{reason}"),
            Self::Count {
                course_id,
                selected,
            } => write!(f, "M {course_id} {selected}"),
            Self::Start => write!(f, "START"),
            Self::Stop => write!(f, "STOP"),
            Self::Error { reason } => write!(f, "E :{reason}"),
            Self::Unauthenticated => write!(f, "U"),
            Self::Welcome { course_ids } => {
                let csv = course_ids
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, "HI :{csv}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_fields() {
        assert_eq!(split_frame("Y 5"), vec!["Y", "5"]);
        assert_eq!(split_frame("HELLO"), vec!["HELLO"]);
    }

    #[test]
    fn test_split_trailing_keeps_spaces() {
        assert_eq!(
            split_frame("SQUISH POP :cat purr!!"),
            vec!["SQUISH", "POP", "cat purr!!"]
        );
        // A trailing colon inside the content is preserved.
        assert_eq!(split_frame("E ::hi there"), vec!["E", ":hi there"]);
    }

    #[test]
    fn test_parse_verbs() {
        assert_eq!(ClientFrame::parse("HELLO", 4), Ok(ClientFrame::Hello));
        assert_eq!(
            ClientFrame::parse("Y 12", 4),
            Ok(ClientFrame::Choose { course_id: 12 })
        );
        assert_eq!(
            ClientFrame::parse("N 3", 4),
            Ok(ClientFrame::Release { course_id: 3 })
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(ClientFrame::parse("", 4), Err(FrameError::Empty));
        assert_eq!(
            ClientFrame::parse("Y", 4),
            Err(FrameError::BadArity("Y"))
        );
        assert_eq!(
            ClientFrame::parse("Y 1 2", 4),
            Err(FrameError::BadArity("Y"))
        );
        assert_eq!(
            ClientFrame::parse("Y five", 4),
            Err(FrameError::BadCourseId)
        );
        assert_eq!(
            ClientFrame::parse("QUIT now", 4),
            Err(FrameError::UnknownVerb("QUIT".to_string()))
        );
        assert_eq!(
            ClientFrame::parse("Y 1 2 3 4", 4),
            Err(FrameError::TooManyArguments)
        );
    }

    #[test]
    fn test_error_reason_text() {
        assert_eq!(
            FrameError::UnknownVerb("FOO".to_string()).to_string(),
            "Unknown command FOO"
        );
        assert_eq!(
            FrameError::BadArity("Y").to_string(),
            "Invalid number of arguments for Y"
        );
    }

    #[test]
    fn test_server_frame_wire_forms() {
        assert_eq!(ServerFrame::Confirm { course_id: 5 }.to_string(), "Y 5");
        assert_eq!(ServerFrame::Released { course_id: 2 }.to_string(), "N 2");
        assert_eq!(
            ServerFrame::Reject {
                course_id: 7,
                reason: RejectReason::Full
            }
            .to_string(),
            "R 7 :Full"
        );
        assert_eq!(
            ServerFrame::Reject {
                course_id: 4,
                reason: RejectReason::GroupConflict
            }
            .to_string(),
            "R 4 :Group conflict"
        );
        assert_eq!(
            ServerFrame::Count {
                course_id: 2,
                selected: 14
            }
            .to_string(),
            "M 2 14"
        );
        assert_eq!(ServerFrame::Start.to_string(), "START");
        assert_eq!(ServerFrame::Stop.to_string(), "STOP");
        assert_eq!(
            ServerFrame::error("Course selections are not open").to_string(),
            "E :Course selections are not open"
        );
        assert_eq!(ServerFrame::Unauthenticated.to_string(), "U");
        assert_eq!(
            ServerFrame::Welcome {
                course_ids: vec![1, 3, 9]
            }
            .to_string(),
            "HI :1,3,9"
        );
        assert_eq!(
            ServerFrame::Welcome { course_ids: vec![] }.to_string(),
            "HI :"
        );
    }
}
