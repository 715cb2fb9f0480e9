//! Identifier helpers.

use uuid::Uuid;

/// Identifier used when no request or transaction id source is configured.
///
/// This is id zero in upper-case hexadecimal.
pub const PLACEHOLDER_ID: &str = "0";

/// Returns [`PLACEHOLDER_ID`].
#[must_use]
pub fn placeholder_id() -> String {
    PLACEHOLDER_ID.to_string()
}

/// Returns a fresh UUID v7 in hyphenated form.
///
/// UUID v7 is time-ordered, which keeps ids from one service roughly sortable
/// by creation time.
#[must_use]
pub fn uuid_v7_id() -> String {
    Uuid::now_v7().to_string()
}
