pub const PREFIX: &str = "EA-";

pub const RESET: &str = "EA-Reset";
pub const ALLOCATION: &str = "EA-Allocation";
pub const COMPLETE: &str = "EA-Complete";
pub const FAILED: &str = "EA-Failed";

/// Transport-level handshake; never decoded as an [`crate::event::Event`].
pub const WELCOME: &str = "EA-Welcome";

pub fn is_assignment_tag(tag: &str) -> bool {
    tag.starts_with(PREFIX)
}
