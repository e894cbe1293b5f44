// src/engine/common.rs
//
// Common utilities shared across engine modules.

use crate::error::ImageError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

pub type EngineResult<T> = std::result::Result<T, ImageError>;

/// Run a codec call, turning a panic inside it into `InternalPanic`.
///
/// Third-party decoders occasionally panic on hostile input; the handle must
/// survive that with its previous buffer intact.
pub fn run_with_panic_policy<T, F>(stage: &'static str, f: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(target: "image_dsl::engine", stage, %message, "panic caught");
            Err(ImageError::internal_panic(format!("{stage}: {message}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_ok_and_err() {
        assert_eq!(run_with_panic_policy("t", || Ok(3)).unwrap(), 3);
        let err = run_with_panic_policy::<(), _>("t", || Err(ImageError::corrupted_image()))
            .unwrap_err();
        assert!(matches!(err, ImageError::CorruptedImage));
    }

    #[test]
    fn converts_panic_to_internal_error() {
        let err = run_with_panic_policy::<(), _>("decode:test", || panic!("boom")).unwrap_err();
        match err {
            ImageError::InternalPanic { message } => {
                assert!(message.contains("decode:test"));
                assert!(message.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
