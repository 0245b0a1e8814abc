//! Unique identifier generation.
//!
//! Every processed slice and every report needs a fresh, globally unique
//! DICOM UID. Generation sits behind a small trait so the orchestration
//! can run with a deterministic source in tests.

/// Organizationally neutral UID root for UUID-derived UIDs (ITU-T X.667).
const UUID_UID_ROOT: &str = "2.25";

/// A source of fresh, globally unique DICOM UIDs.
pub trait UidSource {
    fn fresh(&self) -> String;
}

/// UID source backed by 128 random bits under the `2.25` root.
pub struct RandomUid;

impl UidSource for RandomUid {
    fn fresh(&self) -> String {
        format!("{UUID_UID_ROOT}.{}", rand::random::<u128>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_fits_the_dicom_limit() {
        let uid = RandomUid.fresh();
        assert!(uid.starts_with("2.25."));
        // UI values are capped at 64 characters.
        assert!(uid.len() <= 64);
        assert!(uid[5..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn consecutive_uids_differ() {
        let a = RandomUid.fresh();
        let b = RandomUid.fresh();
        assert_ne!(a, b);
    }
}
