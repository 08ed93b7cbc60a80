//! Error types for tessellated model operations.

use thiserror::Error;

/// Errors that can occur while building, loading or querying a model.
#[derive(Error, Debug)]
pub enum GeoTessError {
    /// Grid file or stream has a bad header, version or content.
    #[error("malformed grid: {0}")]
    MalformedGrid(String),

    /// Model file or stream has a bad header, version or content.
    #[error("malformed model: {0}")]
    MalformedModel(String),

    /// A post-load consistency check failed.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// A profile does not have a legal shape for its position in the model.
    #[error("illegal profile shape: {0}")]
    IllegalProfileShape(String),

    /// Attribute names, units or values disagree in count.
    #[error("attribute mismatch: {0}")]
    AttributeMismatch(String),

    /// A data type name was encountered with no registered codec.
    #[error("unknown data type: {0}")]
    UnknownDataType(String),

    /// Interpolation requested outside the legal radius range.
    #[error("query out of range: radius {radius} outside [{bottom}, {top}] in layer {layer}")]
    OutOfRangeQuery {
        radius: f64,
        bottom: f64,
        top: f64,
        layer: usize,
    },

    /// Model population failed as a whole.
    #[error("population failed: {0}")]
    PopulationFailed(String),

    /// Gradients were requested before they were computed.
    #[error("gradients not computed for attribute {attribute} in layer {layer}")]
    GradientsNotComputed { attribute: usize, layer: usize },

    /// Caller supplied an argument outside its legal range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage/IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GeoTessError {
    /// Create a MalformedGrid error.
    pub fn malformed_grid(msg: impl Into<String>) -> Self {
        Self::MalformedGrid(msg.into())
    }

    /// Create a MalformedModel error.
    pub fn malformed_model(msg: impl Into<String>) -> Self {
        Self::MalformedModel(msg.into())
    }

    /// Create an Integrity error.
    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    /// Create an IllegalProfileShape error.
    pub fn illegal_profile(msg: impl Into<String>) -> Self {
        Self::IllegalProfileShape(msg.into())
    }

    /// Create an AttributeMismatch error.
    pub fn attribute_mismatch(msg: impl Into<String>) -> Self {
        Self::AttributeMismatch(msg.into())
    }

    /// Create an UnknownDataType error.
    pub fn unknown_data_type(name: impl Into<String>) -> Self {
        Self::UnknownDataType(name.into())
    }

    /// Create a PopulationFailed error.
    pub fn population_failed(msg: impl Into<String>) -> Self {
        Self::PopulationFailed(msg.into())
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl From<std::fmt::Error> for GeoTessError {
    fn from(err: std::fmt::Error) -> Self {
        Self::Io(std::io::Error::new(std::io::ErrorKind::Other, err))
    }
}

impl From<serde_json::Error> for GeoTessError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_yaml::Error> for GeoTessError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for tessellated model operations.
pub type Result<T> = std::result::Result<T, GeoTessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = GeoTessError::malformed_grid("bad magic");
        assert_eq!(err.to_string(), "malformed grid: bad magic");

        let err = GeoTessError::OutOfRangeQuery {
            radius: 7000.0,
            bottom: 6000.0,
            top: 6371.0,
            layer: 2,
        };
        assert!(err.to_string().contains("7000"));
        assert!(err.to_string().contains("layer 2"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.geotess");
        let err: GeoTessError = io.into();
        assert!(matches!(err, GeoTessError::Io(_)));
    }
}
