//!
//! Configuration errors, raised before any input or output is opened.
//!
//! Everything else (I/O, malformed tables, model failures) travels as `anyhow::Error`
//! with context attached at the boundary where it happened.
//!
use crate::runner::{Density, ModelFamily};
use crate::train::Layout;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The requested model family cannot be used with the likelihood family
    #[error("model `{family}` does not support density `{density}`")]
    Unsupported {
        family: ModelFamily,
        density: Density,
    },

    /// Neither a priors file (train) nor a parameters file (load) was given
    #[error("model `{family}` needs either a priors file to train or a parameters file to load")]
    MissingModelSource { family: ModelFamily },

    /// Loaded parameters were trained for another model layout
    #[error("parameters file holds `{found}` parameters but `{expected}` parameters are needed")]
    ParameterLayout { expected: Layout, found: Layout },

    #[error("window size must be positive")]
    ZeroWindow,
}
