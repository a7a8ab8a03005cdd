//! CLI command implementations
//!
//! Every command returns the process exit code:
//! 0 success, 2 configuration error, 3 invalid input, 4 text analysis
//! unavailable, 5 fatal error.

pub mod analyze;
pub mod init;
pub mod validate;

use crate::domain::{Ahd2FhirError, ErrorKind};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_CONFIGURATION: i32 = 2;
pub const EXIT_INVALID_INPUT: i32 = 3;
pub const EXIT_TRANSIENT: i32 = 4;
pub const EXIT_FATAL: i32 = 5;

/// Exit code for a pipeline error
pub fn exit_code(error: &Ahd2FhirError) -> i32 {
    if let Ahd2FhirError::Configuration(_) = error {
        return EXIT_CONFIGURATION;
    }
    match error.kind() {
        ErrorKind::InvalidInput => EXIT_INVALID_INPUT,
        ErrorKind::TransientUpstreamFailure => EXIT_TRANSIENT,
        ErrorKind::Unexpected => EXIT_FATAL,
    }
}
