//! Chunked single-file transfer with retry.
//!
//! [`FileSyncDownloader`] copies one remote file to disk in fixed-size
//! chunks, accounting every chunk to the [`ProgressTracker`]. A failed
//! attempt has its bytes rolled back from the batch total before the next
//! attempt starts. After a successful transfer the destination mtime is set
//! to the remote timestamp, which is what makes the next run skip the file.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use filetime::FileTime;
use tracing::{debug, warn};
use uuid::Uuid;

use super::progress::{ProgressEvent, ProgressTracker};
use crate::manager::error::{ManagerError, ManagerResult};
use crate::manager::traits::PackageSource;

/// Streams remote files to disk for one install batch.
pub struct FileSyncDownloader<'a, S: PackageSource + ?Sized> {
    source: &'a S,
    chunk_size: usize,
    max_attempts: u32,
}

impl<'a, S: PackageSource + ?Sized> FileSyncDownloader<'a, S> {
    /// Create a downloader.
    ///
    /// # Arguments
    ///
    /// * `source` - Transport used to open remote streams
    /// * `chunk_size` - Bytes read per chunk (minimum 1)
    /// * `max_attempts` - Attempts per file (minimum 1)
    pub fn new(source: &'a S, chunk_size: usize, max_attempts: u32) -> Self {
        Self {
            source,
            chunk_size: chunk_size.max(1),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Transfer `remote_id` to `destination`.
    ///
    /// Returns the number of bytes written by the successful attempt.
    /// Retryable errors are retried until `max_attempts` is reached, which
    /// yields [`ManagerError::RetriesExhausted`]. Local filesystem errors
    /// abort immediately.
    pub fn fetch(
        &self,
        remote_id: &Uuid,
        destination: &Path,
        expected_size: u64,
        remote_modified: DateTime<Utc>,
        tracker: &mut ProgressTracker<'_>,
    ) -> ManagerResult<u64> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            tracker.begin_file(expected_size);

            let error = match self.transfer(remote_id, destination, expected_size, tracker) {
                Ok(written) => {
                    set_modified(destination, remote_modified)?;
                    tracker.complete_file();
                    debug!(
                        path = %destination.display(),
                        bytes = written,
                        attempt,
                        "File transferred"
                    );
                    return Ok(written);
                }
                Err(e) => e,
            };

            let rolled_back = tracker.rollback_attempt();

            if !error.is_retryable() {
                return Err(error);
            }

            warn!(
                path = %destination.display(),
                attempt,
                max_attempts = self.max_attempts,
                rolled_back,
                error = %error,
                "Transfer attempt failed"
            );
            tracker.emit(ProgressEvent::AttemptFailed {
                path: destination.to_path_buf(),
                attempt,
                reason: error.to_string(),
            });

            if attempt >= self.max_attempts {
                return Err(ManagerError::RetriesExhausted {
                    path: destination.to_path_buf(),
                    attempts: attempt,
                    last: Box::new(error),
                });
            }
        }
    }

    /// One attempt. The stream and file handle are dropped on every exit.
    fn transfer(
        &self,
        remote_id: &Uuid,
        destination: &Path,
        expected_size: u64,
        tracker: &mut ProgressTracker<'_>,
    ) -> ManagerResult<u64> {
        let mut stream = self.source.open_file_stream(remote_id)?;

        if expected_size == 0 {
            if let Some(length) = stream.content_length {
                tracker.adopt_file_size(length);
            }
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|source| ManagerError::CreateDirFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut file = File::create(destination).map_err(|source| ManagerError::WriteFailed {
            path: destination.to_path_buf(),
            source,
        })?;

        let mut buffer = vec![0u8; self.chunk_size];
        let mut written: u64 = 0;

        loop {
            let read = match stream.reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(ManagerError::Transfer {
                        remote_id: *remote_id,
                        reason: format!("read error after {} bytes: {}", written, e),
                    })
                }
            };

            file.write_all(&buffer[..read])
                .map_err(|source| ManagerError::WriteFailed {
                    path: destination.to_path_buf(),
                    source,
                })?;

            written += read as u64;
            tracker.add_chunk(read as u64);
        }

        if let Some(length) = stream.content_length {
            if written != length {
                return Err(ManagerError::Transfer {
                    remote_id: *remote_id,
                    reason: format!("stream ended after {} of {} bytes", written, length),
                });
            }
        }

        file.flush().map_err(|source| ManagerError::WriteFailed {
            path: destination.to_path_buf(),
            source,
        })?;

        Ok(written)
    }
}

fn set_modified(path: &Path, modified: DateTime<Utc>) -> ManagerResult<()> {
    let mtime = FileTime::from_unix_time(modified.timestamp(), modified.timestamp_subsec_nanos());
    filetime::set_file_mtime(path, mtime).map_err(|source| ManagerError::WriteFailed {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::Mutex;

    use chrono::TimeZone;
    use tempfile::TempDir;

    use super::*;
    use crate::manager::download::progress::ProgressCounters;
    use crate::manager::traits::RemoteStream;
    use crate::package::Package;

    /// Reader that yields `limit` bytes and then fails.
    struct BrokenReader {
        remaining: usize,
    }

    impl Read for BrokenReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
            }
            let n = buf.len().min(self.remaining);
            buf[..n].fill(0xAB);
            self.remaining -= n;
            Ok(n)
        }
    }

    enum Step {
        Ok(Vec<u8>),
        FailAfter(usize, u64),
        Refuse,
    }

    struct ScriptedSource {
        steps: Mutex<VecDeque<Step>>,
        opened: Mutex<u32>,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                opened: Mutex::new(0),
            }
        }

        fn opened(&self) -> u32 {
            *self.opened.lock().unwrap()
        }
    }

    impl PackageSource for ScriptedSource {
        fn fetch_manifest(&self, package_id: &Uuid) -> ManagerResult<Package> {
            Err(ManagerError::ManifestFetch {
                package_id: *package_id,
                reason: "not scripted".to_string(),
            })
        }

        fn open_file_stream(&self, remote_id: &Uuid) -> ManagerResult<RemoteStream> {
            *self.opened.lock().unwrap() += 1;
            match self.steps.lock().unwrap().pop_front() {
                Some(Step::Ok(data)) => {
                    let len = data.len() as u64;
                    Ok(RemoteStream::new(Cursor::new(data), Some(len)))
                }
                Some(Step::FailAfter(bytes, declared)) => Ok(RemoteStream::new(
                    BrokenReader { remaining: bytes },
                    Some(declared),
                )),
                Some(Step::Refuse) | None => Err(ManagerError::HttpStatus {
                    remote_id: *remote_id,
                    status: 503,
                }),
            }
        }
    }

    fn remote_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_fetch_writes_file_and_sets_mtime() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("nested/tool.exe");
        let source = ScriptedSource::new(vec![Step::Ok(vec![7u8; 1000])]);
        let counters = ProgressCounters::new();
        let mut tracker = ProgressTracker::new(&counters, None, 1000);

        let downloader = FileSyncDownloader::new(&source, 64, 3);
        let written = downloader
            .fetch(&Uuid::new_v4(), &dest, 1000, remote_time(), &mut tracker)
            .unwrap();

        assert_eq!(written, 1000);
        assert_eq!(fs::read(&dest).unwrap(), vec![7u8; 1000]);
        let mtime = FileTime::from_last_modification_time(&fs::metadata(&dest).unwrap());
        assert_eq!(mtime.unix_seconds(), remote_time().timestamp());
        assert_eq!(counters.snapshot().total_written, 1000);
        assert_eq!(counters.snapshot().files_completed, 1);
    }

    #[test]
    fn test_unknown_size_adopts_stream_length() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("data.bin");
        let source = ScriptedSource::new(vec![Step::Ok(vec![1u8; 200])]);
        let counters = ProgressCounters::new();
        let mut tracker = ProgressTracker::new(&counters, None, 0);

        FileSyncDownloader::new(&source, 50, 3)
            .fetch(&Uuid::new_v4(), &dest, 0, remote_time(), &mut tracker)
            .unwrap();

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.file_expected, 200);
        assert_eq!(snapshot.file_percent(), 100);
    }

    #[test]
    fn test_retry_rolls_back_partial_bytes() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("big.bin");
        let source = ScriptedSource::new(vec![
            Step::FailAfter(300, 1000),
            Step::Refuse,
            Step::Ok(vec![2u8; 1000]),
        ]);
        let counters = ProgressCounters::new();
        let mut tracker = ProgressTracker::new(&counters, None, 1000);

        let written = FileSyncDownloader::new(&source, 100, 3)
            .fetch(&Uuid::new_v4(), &dest, 1000, remote_time(), &mut tracker)
            .unwrap();

        assert_eq!(written, 1000);
        assert_eq!(source.opened(), 3);
        assert_eq!(counters.snapshot().total_written, 1000);
        assert_eq!(fs::metadata(&dest).unwrap().len(), 1000);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("never.bin");
        let source = ScriptedSource::new(vec![
            Step::FailAfter(10, 100),
            Step::FailAfter(20, 100),
            Step::FailAfter(30, 100),
            Step::Ok(vec![0u8; 100]),
        ]);
        let counters = ProgressCounters::new();
        let mut tracker = ProgressTracker::new(&counters, None, 100);

        let err = FileSyncDownloader::new(&source, 8, 3)
            .fetch(&Uuid::new_v4(), &dest, 100, remote_time(), &mut tracker)
            .unwrap_err();

        assert!(matches!(
            err,
            ManagerError::RetriesExhausted { attempts: 3, .. }
        ));
        assert_eq!(source.opened(), 3);
        assert_eq!(counters.snapshot().total_written, 0);
    }

    #[test]
    fn test_short_stream_is_retryable() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("short.bin");

        struct ShortSource;
        impl PackageSource for ShortSource {
            fn fetch_manifest(&self, package_id: &Uuid) -> ManagerResult<Package> {
                Err(ManagerError::ManifestFetch {
                    package_id: *package_id,
                    reason: "unused".to_string(),
                })
            }
            fn open_file_stream(&self, _remote_id: &Uuid) -> ManagerResult<RemoteStream> {
                Ok(RemoteStream::new(Cursor::new(vec![0u8; 10]), Some(20)))
            }
        }

        let counters = ProgressCounters::new();
        let mut tracker = ProgressTracker::new(&counters, None, 20);
        let err = FileSyncDownloader::new(&ShortSource, 4, 2)
            .fetch(&Uuid::new_v4(), &dest, 20, remote_time(), &mut tracker)
            .unwrap_err();

        match err {
            ManagerError::RetriesExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 2);
                assert!(last.is_retryable());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_filesystem_error_is_not_retried() {
        let temp = TempDir::new().unwrap();
        // The destination's parent is a regular file, so creating it fails.
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, b"").unwrap();
        let dest = blocker.join("file.bin");

        let source = ScriptedSource::new(vec![Step::Ok(vec![0u8; 10]), Step::Ok(vec![0u8; 10])]);
        let counters = ProgressCounters::new();
        let mut tracker = ProgressTracker::new(&counters, None, 10);

        let err = FileSyncDownloader::new(&source, 4, 3)
            .fetch(&Uuid::new_v4(), &dest, 10, remote_time(), &mut tracker)
            .unwrap_err();

        assert!(!err.is_retryable());
        assert!(matches!(err, ManagerError::CreateDirFailed { .. }));
        assert_eq!(source.opened(), 1);
    }
}
