//! Private operations of the access grants.

use crate::access::Grant;
use crate::Result;

/// Disables the encryption of the object's paths of `grant`.
///
/// The projects opened with `grant` send the object's keys to the satellite as they are passed
/// and return, when listing, the keys as the satellite stores them; for objects uploaded with
/// the path encryption enabled, they are the encrypted path components encoded in base64 with the
/// URL alphabet and padding, joined by `/`. Such keys are opaque values which can only be passed
/// back to [`Project::stat_object`](crate::Project::stat_object) and
/// [`Project::delete_object`](crate::Project::delete_object); uploads and downloads are rejected
/// because the object's content keys cannot be derived from them.
///
/// The flag is kept when the access grant is serialized and shared.
pub fn enable_path_encryption_bypass(grant: &mut Grant) -> Result<()> {
    grant.encryption_mut().enable_bypass();
    tracing::debug!(satellite = %grant.satellite_url(), "path encryption bypass enabled");
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::access::{self, Permission, SharePrefix};

    #[test]
    fn test_enable_path_encryption_bypass() {
        let mut grant = access::test::grant();
        assert!(!grant.encryption().is_bypass(), "bypass disabled by default");

        enable_path_encryption_bypass(&mut grant).expect("enable bypass");
        assert!(grant.encryption().is_bypass(), "bypass enabled");
        assert_eq!(
            grant
                .encryption()
                .encrypt_path("bucket", "a/b")
                .expect("encrypt path"),
            "a/b",
            "paths are used verbatim"
        );

        let shared = grant
            .share(
                &Permission::read_only(),
                vec![SharePrefix::new("bucket", "a").expect("share prefix")],
            )
            .expect("share");
        assert!(shared.encryption().is_bypass(), "shared grant keeps the flag");

        let parsed = Grant::new(&grant.serialize().expect("serialize")).expect("parse");
        assert!(parsed.encryption().is_bypass(), "serialized grant keeps the flag");
    }
}
