#![allow(dead_code)]

use uplink::access::Grant;
use uplink::Project;

use std::io::{Read, Write};
use std::time::{Duration, SystemTime};

use rand::RngCore;

/// Returns `size` random bytes.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut data = vec![0u8; size];
    rand::rng().fill_bytes(&mut data);
    data
}

/// Get the time since UNIX epoch at the time to call this function.
pub fn unix_now() -> Duration {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("system time since Unix epoch failed")
}

/// Uploads `data` to the object of `bucket` with `key` and commits it.
pub fn upload(project: &Project, bucket: &str, key: &str, data: &[u8]) -> uplink::Result<()> {
    let mut upload = project.upload_object(bucket, key, None)?;
    upload.write_all(data)?;
    upload.commit()
}

/// Downloads the whole content of the object of `bucket` with `key`.
pub fn download(project: &Project, bucket: &str, key: &str) -> uplink::Result<Vec<u8>> {
    let mut download = project.download_object(bucket, key, None)?;
    let mut data = Vec::new();
    download.read_to_end(&mut data)?;
    download.close()?;
    Ok(data)
}

/// Returns the keys of the objects of `bucket` listed recursively.
pub fn list_keys(project: &Project, bucket: &str) -> uplink::Result<Vec<String>> {
    let mut opts = uplink::options::ListObjects::default();
    opts.recursive = true;

    project
        .list_objects(bucket, Some(&opts))?
        .map(|item| item.map(|info| info.key))
        .collect()
}

/// Opens a project with `grant` panicking if it fails.
pub fn open(grant: &Grant) -> Project {
    Project::open(grant).expect("open project")
}
