//! Integration tests for gdsync-drive
//!
//! Uses wiremock to simulate the Google Drive v3 API and verifies
//! end-to-end behavior of the DriveClient and DriveRemoteStore.

mod common;

mod test_listing;
