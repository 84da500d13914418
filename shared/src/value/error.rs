use thiserror::Error;

/// Errors that can occur while decoding wire values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// Wire value does not have the JSON shape its type tag requires
    #[error("Expected {expected} for {tag} value, found {found}")]
    ShapeMismatch {
        tag: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// A reference value is not a parseable UUID
    #[error("Invalid UUID in reference value: {value}")]
    InvalidUuid { value: String },

    /// A color value does not fit in 32 bits
    #[error("Color value {value} does not fit in 32 bits (0xRRGGBBAA)")]
    ColorOutOfRange { value: u64 },
}
