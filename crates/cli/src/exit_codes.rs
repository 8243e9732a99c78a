//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `misp-review` exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain        | Description                                  |
//! |---------|---------------|----------------------------------------------|
//! | 0       | Universal     | Success                                      |
//! | 1       | Universal     | General error (unspecified)                  |
//! | 2       | Universal     | CLI usage error (bad args, conflicting flags)|
//! | 10-19   | config        | Review configuration and credential profiles |
//! | 20-29   | store         | MISP communication                           |
//! | 30-39   | workflow      | Review state transitions                     |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `CliError`

use misp_review_engine::ReviewError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unparseable dates, `--scored` with `--unscored`.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Config (10-19)
// =============================================================================

/// Review configuration missing, unreadable, or lacking a required id.
pub const EXIT_CONFIG: u8 = 10;

/// Credential profile file or profile missing or invalid.
pub const EXIT_PROFILE: u8 = 11;

// =============================================================================
// Store (20-29)
// =============================================================================

/// Network failure, unexpected HTTP status, or malformed MISP response.
pub const EXIT_STORE: u8 = 20;

/// MISP rejected the API key (401/403).
pub const EXIT_STORE_AUTH: u8 = 21;

/// The requested event does not exist.
pub const EXIT_NOT_FOUND: u8 = 22;

// =============================================================================
// Workflow (30-39)
// =============================================================================

/// The report is not in a state that allows the requested change.
pub const EXIT_PRECONDITION: u8 = 30;

/// Map an engine error to its exit code.
pub fn review_exit_code(err: &ReviewError) -> u8 {
    match err {
        ReviewError::ConfigParse(_) | ReviewError::MissingConfiguration(_) => EXIT_CONFIG,
        ReviewError::NotFound { .. } => EXIT_NOT_FOUND,
        ReviewError::PreconditionFailed(_) => EXIT_PRECONDITION,
        ReviewError::AmbiguousFilter => EXIT_USAGE,
        ReviewError::Unauthorized(_) => EXIT_STORE_AUTH,
        ReviewError::Store(_) => EXIT_STORE,
    }
}
