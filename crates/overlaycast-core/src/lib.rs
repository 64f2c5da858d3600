// ABOUTME: Core library for overlaycast, containing domain types shared by every other crate.
// ABOUTME: Defines overlay records, source classification, session modes, and transcoder invocations.

pub mod invocation;
pub mod names;
pub mod overlay;
pub mod session;
pub mod source;

pub use invocation::{Invocation, PLAYLIST_FILENAME, is_local_file};
pub use names::is_plain_file_name;
pub use overlay::{ID_KEY, OverlayRecord};
pub use session::{STREAM_URL_PREFIX, SessionMode, SessionModeError};
pub use source::SourceKind;
