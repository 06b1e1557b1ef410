//! 📂 Previously, on "Things That Could Go Wrong With A File"...
//!
//! The export landed in a bucket. Somebody copied it down. Maybe they gunzipped it, maybe
//! they didn't. Maybe it has a header row, maybe it has Windows line endings, maybe a log
//! line somewhere in the middle has bytes that were never UTF-8 to begin with.
//!
//! This module reads that file line by line, in order, without judging (the transformer
//! does the judging). It also owns the dead-letter file: the opt-in NDJSON where lines
//! the index never got go to be remembered.
//!
//! 🚰 File → (gzip?) → BufReader → lines → ship worker → … → DeadLetterFile (sometimes)
//! 🦆 (mandatory, no notes)

mod dead_letter;
mod file_source;

pub(crate) use dead_letter::{DeadLetterFile, FailureStage};
pub(crate) use file_source::FileSource;
pub use file_source::FileSourceConfig;
