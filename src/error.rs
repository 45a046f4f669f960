//! # Error Types
//!
//! This module defines all error types for the style renderer.
//!
//! Most problems inside a style file are absorbed where they occur: a truncated
//! `CASM` section is skipped, an unknown chord-type code keeps the previous
//! value, an unparseable chord token repeats the previous chord. Only the
//! failures a caller can act on surface as [`StyleError`].
//!
//! ## Error Types
//! - `StructuralParse` - The container is unusable as a whole
//! - `Codec` - The embedded Standard MIDI File could not be decoded or encoded
//! - `PartNotFound` - The requested style part does not exist
//! - `Config` - A render job or render options are invalid
//!
//! ## Usage
//! ```rust,no_run
//! use stylemap::{render_style, RenderOptions, StyleError};
//!
//! let bytes = std::fs::read("Jazz.sty").unwrap();
//! match render_style(&bytes, &RenderOptions::new("Main B")) {
//!     Ok(song) => println!("{} notes", song.notes.len()),
//!     Err(StyleError::PartNotFound { available, .. }) => {
//!         eprintln!("try one of: {}", available.join(", "));
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StyleError {
    /// The container is structurally unusable.
    ///
    /// The metadata parser itself never raises this; it prefers an empty
    /// settings table so rendering can fall back to plain transposition.
    #[error("Invalid style container: {0}")]
    StructuralParse(String),

    /// The sequence codec rejected the data.
    ///
    /// # Example
    /// ```
    /// # use stylemap::StyleError;
    /// let err = StyleError::Codec("unexpected end of file".to_string());
    /// assert_eq!(err.to_string(), "MIDI codec error: unexpected end of file");
    /// ```
    #[error("MIDI codec error: {0}")]
    Codec(String),

    /// The requested part is not present in the style.
    ///
    /// `available` holds the marker names of every part in file order.
    ///
    /// # Example
    /// ```
    /// # use stylemap::StyleError;
    /// let err = StyleError::PartNotFound {
    ///     part: "Main E".to_string(),
    ///     available: vec!["Main A".to_string(), "Fill In AA".to_string()],
    /// };
    /// assert_eq!(
    ///     err.to_string(),
    ///     "Style part \"Main E\" not found. Available markers: Main A, Fill In AA"
    /// );
    /// ```
    #[error("Style part \"{part}\" not found. Available markers: {}", available.join(", "))]
    PartNotFound { part: String, available: Vec<String> },

    /// Invalid render job or render options.
    ///
    /// # Example
    /// ```
    /// # use stylemap::StyleError;
    /// let err = StyleError::Config("bars must be at least 1".to_string());
    /// assert_eq!(err.to_string(), "Invalid render configuration: bars must be at least 1");
    /// ```
    #[error("Invalid render configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, StyleError>;
