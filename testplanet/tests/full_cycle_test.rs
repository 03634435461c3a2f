use std::io::{Read, Write};
use std::time::Duration;

use uplink::access::{Grant, Permission, SharePrefix};
use uplink::{error, EncryptionKey, Error};

mod common;

#[test]
fn integration_create_upload_list_download_delete() {
    testplanet::run(testplanet::Config::default(), |planet| {
        let satellite = &planet.satellites()[0];
        let access = planet.uplinks()[0].access(satellite).expect("access");
        let serialized = access.serialize().expect("serialize access");
        let project = common::open(&Grant::new(&serialized).expect("access grant parsing"));

        let bucket_name = "full-cycle";
        let (created_bucket, ok) = project.create_bucket(bucket_name).expect("create bucket");
        assert!(ok, "bucket shouldn't exist");
        assert_eq!(bucket_name, created_bucket.name);
        assert!(
            common::unix_now() - created_bucket.created_at <= Duration::from_secs(3),
            "bucket created at"
        );

        // Check that the new created bucket exists.
        assert!(
            project
                .list_buckets(None)
                .any(|res| match res {
                    Ok(b) => b.name == bucket_name,
                    Err(err) => panic!("listing buckets: {}", err),
                }),
            "list buckets haven't listed the newly create bucket"
        );

        let object_key = "test-data.txt";
        let mut upload = project
            .upload_object(bucket_name, object_key, None)
            .expect("upload object");

        let object_data = String::from("Uplink Rust test object");
        upload
            .write_all(object_data.as_bytes())
            .expect("upload object write data");
        upload.commit().expect("upload object commit");

        // Check that new uploaded object exists.
        assert!(
            project
                .list_objects(bucket_name, None)
                .expect("list objects")
                .any(|res| match res {
                    Ok(o) => o.key == object_key,
                    Err(err) => panic!("listing objects: {}", err),
                }),
            "list objects haven't found the newly uploaded object",
        );

        let mut download = project
            .download_object(bucket_name, object_key, None)
            .expect("download object");

        let downloaded_object = download.info().clone();
        assert_eq!(object_key, downloaded_object.key, "downloaded object key");
        assert!(!downloaded_object.is_prefix, "downloaded object is_prefix");
        assert_eq!(
            upload.info().metadata_system.created,
            downloaded_object.metadata_system.created,
            "downloaded object created at",
        );

        let mut downloaded_object_data = String::new();
        download
            .read_to_string(&mut downloaded_object_data)
            .expect("download object read");
        assert_eq!(object_data, downloaded_object_data, "object data");

        let deleted_object = project
            .delete_object(bucket_name, object_key)
            .expect("delete object")
            .expect("deleted object info");
        assert_eq!(object_key, deleted_object.key, "deleted object key");
        assert_eq!(
            downloaded_object.metadata_system.created, deleted_object.metadata_system.created,
            "deleted object created at",
        );

        let deleted_bucket = project.delete_bucket(bucket_name).expect("delete bucket");
        assert_eq!(created_bucket, deleted_bucket, "deleted bucket");

        project.close().expect("close project");
    });
}

#[test]
fn integration_grant_override_encryption_key() {
    testplanet::run(testplanet::Config::default(), |planet| {
        let satellite = &planet.satellites()[0];
        let grant_root = planet.uplinks()[0].access(satellite).expect("access");

        // Create bucket for user.
        let bucket_name = "multitenant";
        common::open(&grant_root)
            .create_bucket(bucket_name)
            .expect("create bucket");

        // Create an access grant for the user and restrict it to its bucket.
        let mut grant_user = grant_root
            .share(
                &Permission::full(),
                vec![SharePrefix::full_bucket(bucket_name).expect("share prefix creation")],
            )
            .expect("no error creating user's grant");

        // User create its encryption key and override the key of the provided access grant.
        let key_user =
            EncryptionKey::derive("pass", "salt".as_bytes()).expect("deriving encryption key");
        if let Error::InvalidArguments(error::Args { names, .. }) = grant_user
            .override_encryption_key(bucket_name, "no-slash", &key_user)
            .expect_err("override with a prefix without trailing slash")
        {
            assert_eq!(names, "prefix", "invalid error argument name");
        } else {
            panic!("expected an invalid arguments error");
        }
        grant_user
            .override_encryption_key(bucket_name, "", &key_user)
            .expect("no error overriding grant encryption key");

        // Upload an object with the user's grant.
        let object_key = "overridden-encryption-key-data.txt";
        let object_data = b"Uplink Rust test object: overridden encryption key";
        let user_project = common::open(&grant_user);
        common::upload(&user_project, bucket_name, object_key, object_data)
            .expect("upload with the user's grant");

        // The user downloads it, even from a serialized copy of its grant.
        let serialized = grant_user.serialize().expect("serialize user's grant");
        let copy = Grant::new(&serialized).expect("parse user's grant");
        assert_eq!(
            common::download(&common::open(&copy), bucket_name, object_key).expect("download"),
            object_data,
            "downloaded with the user's grant"
        );

        // The root grant neither finds the object by its key nor decrypts its listed key.
        let root_project = common::open(&grant_root);
        if let Error::Uplink(error::Uplink::ObjectNotFound(_)) =
            common::download(&root_project, bucket_name, object_key)
                .expect_err("download with the root grant")
        {
        } else {
            panic!("expected an object not found error");
        }
        common::list_keys(&root_project, bucket_name)
            .expect_err("decrypt a key encrypted with the user's key");
    });
}
