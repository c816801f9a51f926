// Exit codes for scripted triage
use stcodec_format::{Error, ErrorKind};

use crate::commands::TensorNotFound;

pub const EXIT_GENERIC_FAIL: i32 = 1;
pub const EXIT_INVALID_INPUT: i32 = 2;
pub const EXIT_NOT_FOUND: i32 = 3;

/// Map a command failure to its process exit code.
///
/// Decode and validation failures anywhere in the chain mean the input file
/// is bad. Stream failures and everything else are generic.
pub fn code_for(err: &anyhow::Error) -> i32 {
    if err.chain().any(|e| e.is::<TensorNotFound>()) {
        return EXIT_NOT_FOUND;
    }
    match err.chain().find_map(|e| e.downcast_ref::<Error>()) {
        Some(e) if e.kind() != ErrorKind::Io => EXIT_INVALID_INPUT,
        _ => EXIT_GENERIC_FAIL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use stcodec_format::Stage;

    #[test]
    fn codec_errors_are_invalid_input() {
        let err = Err::<(), _>(Error::MalformedHeader("x".into())).context("reading model");
        assert_eq!(code_for(&err.unwrap_err()), EXIT_INVALID_INPUT);

        let nested = Error::Truncated { stage: Stage::TensorData, expected: 4, actual: 1 }.in_tensor("w");
        assert_eq!(code_for(&anyhow::Error::new(nested)), EXIT_INVALID_INPUT);
    }

    #[test]
    fn io_and_other_errors_are_generic() {
        let io = Error::Io { stage: Stage::Seek, source: std::io::Error::other("disk") };
        assert_eq!(code_for(&anyhow::Error::new(io)), EXIT_GENERIC_FAIL);
        assert_eq!(code_for(&anyhow::anyhow!("boom")), EXIT_GENERIC_FAIL);
    }

    #[test]
    fn failure_codes_are_distinct_and_nonzero() {
        let codes = [EXIT_GENERIC_FAIL, EXIT_INVALID_INPUT, EXIT_NOT_FOUND];
        assert!(codes.iter().all(|&c| c != 0));
        assert!(codes[0] != codes[1] && codes[1] != codes[2] && codes[0] != codes[2]);
    }

    #[test]
    fn missing_tensor_is_not_found() {
        let err = anyhow::Error::new(TensorNotFound("w".into())).context("extracting");
        assert_eq!(code_for(&err), EXIT_NOT_FOUND);
    }
}
