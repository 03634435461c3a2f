//! Helper functions which are used across the modules of this crate.

use crate::Error;

use std::time::{Duration, SystemTime};

/// Returns an Error::InvalidArguments with the passed argument's name if the `&str` function
/// argument is empty.
pub(crate) fn not_empty_str_fn_arg(arg_name: &str, arg_val: &str) -> Result<(), Error> {
    if arg_val.is_empty() {
        return Err(Error::new_invalid_arguments(arg_name, "cannot be empty"));
    }

    Ok(())
}

/// Returns an Error::InvalidArguments with the passed argument's name if the bucket name function
/// argument is empty or contains a slash, which would mix it up with the object's path.
pub(crate) fn bucket_fn_arg(arg_name: &str, arg_val: &str) -> Result<(), Error> {
    not_empty_str_fn_arg(arg_name, arg_val)?;

    if arg_val.contains('/') {
        return Err(Error::new_invalid_arguments(
            arg_name,
            "cannot contain slashes (i.e. '/')",
        ));
    }

    Ok(())
}

/// Returns the current time measured since the Unix Epoch time.
pub(crate) fn unix_now() -> Duration {
    // The system clock is never set before the Unix Epoch in any sane system.
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    #[test]
    fn test_not_empty_str_fn_arg() {
        not_empty_str_fn_arg("some", "this is fine").expect("returned error on a non empty string");

        let err = not_empty_str_fn_arg("some", "").expect_err("returned Ok on an empty string");
        if let Error::InvalidArguments(args) = err {
            assert_eq!(
                args.names, "some",
                "invalid Error::InvalidArguments name field value"
            );
            assert_eq!(
                args.msg, "cannot be empty",
                "invalid Error::InvalidArguments msg field value"
            )
        } else {
            panic!("expected an Error::InvalidArguments");
        }
    }

    #[test]
    fn test_bucket_fn_arg() {
        bucket_fn_arg("bucket", "a-bucket").expect("valid bucket name");

        for invalid in ["", "a/bucket"] {
            if let Error::InvalidArguments(args) =
                bucket_fn_arg("bucket", invalid).expect_err("invalid bucket name")
            {
                assert_eq!(args.names, "bucket", "invalid error argument name");
            } else {
                panic!("expected an Error::InvalidArguments");
            }
        }
    }

    #[test]
    fn test_unix_now() {
        assert!(unix_now() > Duration::from_secs(1_600_000_000), "sane clock");
    }
}
