//! Markdown generation: the aggregate trip note and one marker note per photo.

pub mod marker;
pub mod note;

pub use marker::{MarkerOutcome, marker_file_name, render_marker, write_markers};
pub use note::{MapBlock, render_note, write_note};

/// Frontmatter fence line.
pub const FRONTMATTER_DELIMITER: &str = "---";

/// Extension of every generated note.
pub const NOTE_EXTENSION: &str = "md";
