//! Batch continuation
//!
//! Keeps an [`EncodeSession`] alive between invocations so one logical encode
//! can be fed in chunks. Each session id owns at most one live session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::engine::EncodeSession;
use crate::error::{EncodeError, EncodeResult};
use crate::ports::ContinuationSignal;

/// Result of feeding one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// More chunks are expected
    Pending { frames_written: u64 },
    /// The session was finalised
    Complete { frames_written: u64 },
}

impl ChunkOutcome {
    pub fn frames_written(&self) -> u64 {
        match self {
            ChunkOutcome::Pending { frames_written } | ChunkOutcome::Complete { frames_written } => *frames_written,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ChunkOutcome::Complete { .. })
    }
}

struct BatchEntry {
    session: EncodeSession,
    chunks: u32,
    created_at: DateTime<Utc>,
}

/// Table slot; empty until the first chunk has launched its session
type Slot = Arc<Mutex<Option<BatchEntry>>>;

/// Table of in-flight batch sessions
///
/// The table lock is only held to look up or remove a slot. Launching and
/// feeding happen under the slot's own lock.
pub struct BatchContinuationManager {
    sessions: Mutex<HashMap<String, Slot>>,
    signal: Arc<dyn ContinuationSignal>,
}

impl BatchContinuationManager {
    pub fn new(signal: Arc<dyn ContinuationSignal>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            signal,
        }
    }

    /// Feed one chunk of frames to the session registered under `session_id`
    ///
    /// `launch` is only called when no session exists yet for the id. A
    /// second call for an id whose previous chunk is still being fed fails
    /// with [`EncodeError::DuplicateSession`].
    pub fn advance<I, F>(
        &self,
        session_id: &str,
        frames: I,
        is_final_chunk: bool,
        launch: F,
    ) -> EncodeResult<ChunkOutcome>
    where
        I: IntoIterator<Item = EncodeResult<Vec<u8>>>,
        F: FnOnce() -> EncodeResult<EncodeSession>,
    {
        let mut sessions = self.table();
        let slot = Arc::clone(
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(None))),
        );
        // Claimed under the table lock so a new slot is never visible unlocked
        let claimed = slot.try_lock();
        drop(sessions);
        let mut guard = match claimed {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                return Err(EncodeError::DuplicateSession {
                    session_id: session_id.to_string(),
                })
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        if guard.is_none() {
            match launch() {
                Ok(session) => {
                    info!(session_id, output = %session.output_path().display(), "Starting batch session");
                    *guard = Some(BatchEntry {
                        session,
                        chunks: 0,
                        created_at: Utc::now(),
                    });
                }
                Err(e) => {
                    self.remove(session_id);
                    return Err(e);
                }
            }
        }
        let Some(entry) = guard.as_mut() else {
            return Err(EncodeError::InvalidSessionState {
                state: "missing".to_string(),
                operation: "continue a batch".to_string(),
            });
        };

        let result = Self::feed_chunk(entry, frames, is_final_chunk);
        match result {
            Ok(outcome @ ChunkOutcome::Complete { frames_written }) => {
                let elapsed = Utc::now() - entry.created_at;
                // Removed while still claimed so no caller can pick up the finished slot
                self.remove(session_id);
                *guard = None;
                info!(
                    session_id,
                    frames_written,
                    elapsed_ms = elapsed.num_milliseconds(),
                    "Batch session complete"
                );
                Ok(outcome)
            }
            Ok(outcome) => {
                entry.chunks += 1;
                debug!(session_id, chunk = entry.chunks, frames_written = outcome.frames_written(), "chunk accepted");
                drop(guard);
                self.signal.request_next_chunk(session_id);
                Ok(outcome)
            }
            Err(e) => {
                self.remove(session_id);
                *guard = None;
                warn!(session_id, "Batch session aborted: {}", e);
                Err(e)
            }
        }
    }

    fn feed_chunk<I>(entry: &mut BatchEntry, frames: I, is_final_chunk: bool) -> EncodeResult<ChunkOutcome>
    where
        I: IntoIterator<Item = EncodeResult<Vec<u8>>>,
    {
        for frame in frames {
            entry.session.feed(&frame?)?;
        }
        if is_final_chunk {
            let frames_written = entry.session.finish()?;
            Ok(ChunkOutcome::Complete { frames_written })
        } else {
            Ok(ChunkOutcome::Pending {
                frames_written: entry.session.frames_written(),
            })
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remove(&self, session_id: &str) {
        self.table().remove(session_id);
    }

    /// Whether a session is live for the id
    pub fn is_active(&self, session_id: &str) -> bool {
        self.table().contains_key(session_id)
    }

    pub fn active_sessions(&self) -> usize {
        self.table().len()
    }

    /// Drop a live session, terminating its encoder
    pub fn discard(&self, session_id: &str) -> bool {
        let removed = self.table().remove(session_id);
        if removed.is_some() {
            warn!(session_id, "Discarding unfinished batch session");
        }
        removed.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSignal {
        requests: Mutex<Vec<String>>,
    }

    impl ContinuationSignal for RecordingSignal {
        fn request_next_chunk(&self, session_id: &str) {
            self.requests.lock().unwrap().push(session_id.to_string());
        }
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use crate::domain::model::EncodeArguments;
        use crate::engine::SessionConfig;
        use std::path::Path;
        use tempfile::TempDir;

        fn cat_session(output: &Path) -> EncodeResult<EncodeSession> {
            EncodeSession::start(SessionConfig {
                arguments: EncodeArguments {
                    program: "sh".into(),
                    input_args: vec!["-c".to_string(), "cat > \"$0\"".to_string()],
                    extra_input_args: vec![],
                    output_args: vec![],
                    environment: HashMap::new(),
                },
                output_path: output.to_path_buf(),
                metadata: None,
                save_metadata: false,
                metadata_dir: output.with_file_name("temp"),
                secondary: None,
            })
        }

        fn frames(range: std::ops::Range<u8>) -> Vec<EncodeResult<Vec<u8>>> {
            range.map(|value| Ok(vec![value; 8])).collect()
        }

        #[test]
        fn test_chunked_feed_matches_single_feed() {
            let dir = TempDir::new().unwrap();
            let signal = Arc::new(RecordingSignal::default());
            let manager = BatchContinuationManager::new(signal.clone());

            let chunked = dir.path().join("chunked.bin");
            let first = manager.advance("a", frames(0..2), false, || cat_session(&chunked)).unwrap();
            assert_eq!(first, ChunkOutcome::Pending { frames_written: 2 });
            assert!(manager.is_active("a"));
            manager
                .advance("a", frames(2..4), false, || panic!("session must be reused"))
                .unwrap();
            let last = manager
                .advance("a", frames(4..5), true, || panic!("session must be reused"))
                .unwrap();
            assert_eq!(last, ChunkOutcome::Complete { frames_written: 5 });
            assert!(!manager.is_active("a"));

            let single = dir.path().join("single.bin");
            let whole = manager.advance("b", frames(0..5), true, || cat_session(&single)).unwrap();
            assert_eq!(whole.frames_written(), 5);

            assert_eq!(std::fs::read(&chunked).unwrap(), std::fs::read(&single).unwrap());
            assert_eq!(*signal.requests.lock().unwrap(), vec!["a".to_string(), "a".to_string()]);
        }

        #[test]
        fn test_concurrent_advance_is_duplicate_session() {
            let dir = TempDir::new().unwrap();
            let manager = BatchContinuationManager::new(Arc::new(RecordingSignal::default()));
            let output = dir.path().join("out.bin");

            let mut nested = None;
            let reentrant = (0..1u8).map(|value| {
                // Runs while the outer call still holds the session
                nested = Some(manager.advance("x", Vec::<EncodeResult<Vec<u8>>>::new(), false, || panic!("no second session")));
                Ok(vec![value; 8])
            });
            let outer = manager.advance("x", reentrant, false, || cat_session(&output)).unwrap();

            assert_eq!(outer, ChunkOutcome::Pending { frames_written: 1 });
            assert!(matches!(nested, Some(Err(EncodeError::DuplicateSession { .. }))));
            assert!(manager.is_active("x"));
            assert!(manager.discard("x"));
            assert_eq!(manager.active_sessions(), 0);
        }

        #[test]
        fn test_failed_chunk_removes_session() {
            let dir = TempDir::new().unwrap();
            let manager = BatchContinuationManager::new(Arc::new(RecordingSignal::default()));
            let output = dir.path().join("out.bin");

            let bad = vec![Ok(vec![0u8; 8]), Err(EncodeError::InvalidFrame { message: "short".to_string() })];
            let err = manager.advance("y", bad, false, || cat_session(&output)).unwrap_err();
            assert!(matches!(err, EncodeError::InvalidFrame { .. }));
            assert!(!manager.is_active("y"));
        }
    }

    fn launch_failure() -> EncodeError {
        EncodeError::EncoderLaunchFailure {
            program: "ffmpeg".to_string(),
            message: "missing".to_string(),
        }
    }

    #[test]
    fn test_launch_runs_with_slot_claimed_and_table_free() {
        let manager = BatchContinuationManager::new(Arc::new(RecordingSignal::default()));
        let no_frames = Vec::<EncodeResult<Vec<u8>>>::new;

        let mut during_launch = None;
        let result = manager.advance("first", no_frames(), false, || {
            during_launch = Some((
                manager.is_active("first"),
                manager.advance("first", no_frames(), false, || panic!("slot is already claimed")),
                manager.advance("second", no_frames(), true, || Err(launch_failure())),
            ));
            Err(launch_failure())
        });

        let (visible, same_id, other_id) = during_launch.unwrap();
        assert!(visible);
        assert!(matches!(same_id, Err(EncodeError::DuplicateSession { .. })));
        assert!(matches!(other_id, Err(EncodeError::EncoderLaunchFailure { .. })));
        assert!(result.is_err());
        assert_eq!(manager.active_sessions(), 0);
    }

    #[test]
    fn test_launch_failure_leaves_no_entry() {
        let manager = BatchContinuationManager::new(Arc::new(RecordingSignal::default()));
        let result = manager.advance("z", Vec::<EncodeResult<Vec<u8>>>::new(), false, || Err(launch_failure()));
        assert!(result.is_err());
        assert!(!manager.is_active("z"));
    }
}
