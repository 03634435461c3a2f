use uplink::Error;

use std::io::Write;

mod common;

fn small_segments() -> testplanet::Config {
    testplanet::Config {
        max_segment_size: 5000,
        ..Default::default()
    }
}

fn total_pieces(planet: &testplanet::Planet) -> usize {
    planet.storage_nodes().iter().map(|n| n.piece_count()).sum()
}

#[test]
fn integration_upload_commit_and_abort() {
    testplanet::run(small_segments(), |planet| {
        let satellite = &planet.satellites()[0];
        let project = common::open(&planet.uplinks()[0].access(satellite).expect("access"));
        project.ensure_bucket("testbucket").expect("ensure bucket");

        // Commit an upload.
        let mut upload = project
            .upload_object("testbucket", "test-data-1.txt", None)
            .expect("upload object");
        upload
            .write_all(b"Uplink Rust test object")
            .expect("upload object write data");
        upload.commit().expect("upload object commit");

        assert!(
            upload
                .abort()
                .expect_err("abort a committed upload")
                .is_upload_done(),
            "abort after commit"
        );
        if let Error::TransactionClosed = Error::from(
            upload
                .write_all(b"more")
                .expect_err("write to a committed upload"),
        ) {
        } else {
            panic!("expected a transaction closed error");
        }

        // Abort an upload with remote segments.
        let mut upload = project
            .upload_object("testbucket", "test-data-2.txt", None)
            .expect("upload object");
        upload
            .write_all(&common::random_data(12000))
            .expect("upload object write data");
        assert_eq!(total_pieces(planet), 2 * 3, "pieces of the full segments");
        upload.abort().expect("abort an uncommitted upload");
        assert_eq!(total_pieces(planet), 0, "pieces of the aborted upload");
        assert!(
            upload
                .commit()
                .expect_err("commit an aborted upload")
                .is_upload_done(),
            "commit after abort"
        );

        // Commit an upload without any written data.
        let mut upload = project
            .upload_object("testbucket", "test-data-3.txt", None)
            .expect("upload object");
        upload.commit().expect("upload object commit");
        assert_eq!(
            upload.info().metadata_system.content_length,
            0,
            "empty object"
        );
        assert!(
            common::download(&project, "testbucket", "test-data-3.txt")
                .expect("download empty object")
                .is_empty(),
            "empty content"
        );

        let mut keys = common::list_keys(&project, "testbucket").expect("list");
        keys.sort();
        assert_eq!(
            keys,
            vec!["test-data-1.txt", "test-data-3.txt"],
            "only committed uploads are listed"
        );
    });
}

#[test]
fn integration_dropped_upload_is_aborted() {
    testplanet::run(small_segments(), |planet| {
        let satellite = &planet.satellites()[0];
        let project = common::open(&planet.uplinks()[0].access(satellite).expect("access"));
        project.ensure_bucket("testbucket").expect("ensure bucket");

        {
            let mut upload = project
                .upload_object("testbucket", "dropped", None)
                .expect("upload object");
            upload
                .write_all(&common::random_data(11000))
                .expect("write data");
            assert_eq!(total_pieces(planet), 2 * 3, "pieces while uploading");
        }

        assert_eq!(total_pieces(planet), 0, "pieces after dropping the upload");
        assert!(
            common::list_keys(&project, "testbucket")
                .expect("list")
                .is_empty(),
            "dropped upload isn't listed"
        );
    });
}

#[test]
fn integration_failed_commit_keeps_the_upload_open() {
    let config = testplanet::Config {
        latency: std::time::Duration::from_millis(20),
        ..Default::default()
    };

    testplanet::run(config, |planet| {
        let satellite = &planet.satellites()[0];
        let client = &planet.uplinks()[0];
        client
            .create_bucket(satellite, "testbucket")
            .expect("create bucket");

        let access = client.access(satellite).expect("access");
        let ctx = uplink::Context::background();
        let project =
            uplink::Project::open_with_context(&access, &uplink::Config::default(), ctx.clone())
                .expect("open project");

        let mut upload = project
            .upload_object("testbucket", "object", None)
            .expect("upload object");
        upload.write_all(b"data").expect("write data");

        ctx.cancel();
        assert!(
            upload
                .commit()
                .expect_err("commit with a canceled context")
                .is_canceled(),
            "canceled commit"
        );
        assert!(
            !upload
                .commit()
                .expect_err("commit again with a canceled context")
                .is_upload_done(),
            "the upload is still open"
        );

        assert!(
            common::list_keys(&common::open(&access), "testbucket")
                .expect("list")
                .is_empty(),
            "the object isn't committed"
        );
    });
}
