//! Kiosk session loop: grab a frame, ask the recognizer, record the event.
//!
//! The loop is deliberately thin. Everything with behavior worth testing
//! (classification, storage, the wire protocol) lives in the library
//! crates; this module only wires them together and applies the repeat
//! suppression window so one person standing in front of the camera does
//! not produce a burst of identical rows.

use std::collections::HashMap;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime};
use thiserror::Error;

use rollcall_capture::camera::FrameSource;
use rollcall_capture::recognizer::{Recognizer, RecognizerError};
use rollcall_capture::Frame;
use rollcall_core::policy::{classify, Schedule};
use rollcall_core::store::{RecordStore, StoreError};
use rollcall_core::types::{AttendanceEvent, EventKind};

/// How long to wait between capture attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Back-off after a failed camera read before trying again.
const CAMERA_RETRY: Duration = Duration::from_millis(100);

/// Operator commands fed to the loop from the stdin reader thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Flip between check-in and check-out.
    Toggle,
    /// End the session.
    Quit,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error(transparent)]
    Recognizer(#[from] RecognizerError),
}

/// Why a frame produced no attendance row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissReason {
    /// Nobody matched above the confidence threshold.
    NoMatch,
    /// A face matched but the liveness check rejected it.
    Spoof,
    /// The recognizer answered but could not process the frame.
    Backend(String),
}

/// Outcome of feeding one frame through the pipeline.
#[derive(Debug)]
pub enum Observation {
    Recorded {
        event: AttendanceEvent,
        display_name: String,
    },
    Miss(MissReason),
    /// Inside the repeat suppression window; the frame was not sent out.
    Cooldown,
}

/// Progress notifications surfaced to the operator terminal.
#[derive(Debug)]
pub enum SessionUpdate {
    Mode(EventKind),
    Recorded {
        event: AttendanceEvent,
        display_name: String,
    },
    Miss(MissReason),
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SessionStats {
    pub recorded: u32,
    pub misses: u32,
}

pub struct Session<'a> {
    store: &'a RecordStore,
    schedule: Schedule,
    /// Employee id to display name, loaded from the roster at startup.
    names: HashMap<String, String>,
    mode: EventKind,
    cooldown: Duration,
    last_recorded: Option<Instant>,
}

impl<'a> Session<'a> {
    pub fn new(
        store: &'a RecordStore,
        schedule: Schedule,
        names: HashMap<String, String>,
        mode: EventKind,
        cooldown: Duration,
    ) -> Self {
        Self {
            store,
            schedule,
            names,
            mode,
            cooldown,
            last_recorded: None,
        }
    }

    pub fn mode(&self) -> EventKind {
        self.mode
    }

    /// Runs one frame through identify-classify-append.
    ///
    /// Backend refusals and liveness rejections come back as
    /// [`Observation::Miss`]; the loop keeps going. Transport failures and
    /// storage failures are returned as errors and end the session.
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        recognizer: &mut dyn Recognizer,
        now: NaiveDateTime,
    ) -> Result<Observation, SessionError> {
        if let Some(last) = self.last_recorded {
            if last.elapsed() < self.cooldown {
                return Ok(Observation::Cooldown);
            }
        }

        let verdict = match recognizer.identify(frame) {
            Ok(verdict) => verdict,
            Err(RecognizerError::Backend(message)) => {
                tracing::warn!(reason = %message, "recognizer could not process frame");
                return Ok(Observation::Miss(MissReason::Backend(message)));
            }
            Err(other) => return Err(other.into()),
        };

        if !verdict.is_live {
            tracing::warn!(
                confidence = verdict.confidence,
                "liveness check failed, ignoring frame"
            );
            return Ok(Observation::Miss(MissReason::Spoof));
        }

        let Some(employee_id) = verdict.employee_id else {
            return Ok(Observation::Miss(MissReason::NoMatch));
        };

        let (kind, status) = classify(now.time(), self.mode, &self.schedule);
        let event = AttendanceEvent::new(employee_id, now.date(), now.time(), kind, status);
        self.store.append(&event)?;
        self.last_recorded = Some(Instant::now());

        let display_name = match self.names.get(&event.employee_id) {
            Some(name) => name.clone(),
            None => {
                tracing::warn!(id = %event.employee_id, "matched id is not in the roster");
                event.employee_id.clone()
            }
        };
        tracing::info!(
            id = %event.employee_id,
            kind = %event.kind,
            status = %event.status,
            confidence = verdict.confidence,
            "recorded attendance"
        );
        Ok(Observation::Recorded {
            event,
            display_name,
        })
    }

    /// Main loop. Returns when the operator quits or the control channel
    /// closes; camera read failures are retried, everything else that
    /// fails ends the session with an error.
    pub fn run(
        &mut self,
        frames: &mut dyn FrameSource,
        recognizer: &mut dyn Recognizer,
        controls: &Receiver<Control>,
        mut notify: impl FnMut(SessionUpdate),
    ) -> Result<SessionStats, SessionError> {
        let mut stats = SessionStats::default();
        loop {
            match controls.try_recv() {
                Ok(Control::Toggle) => {
                    self.mode = self.mode.toggled();
                    tracing::info!(mode = %self.mode, "mode switched");
                    notify(SessionUpdate::Mode(self.mode));
                    continue;
                }
                Ok(Control::Quit) => break,
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => break,
            }

            let frame = match frames.grab() {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::warn!(error = %err, "camera read failed, retrying");
                    std::thread::sleep(CAMERA_RETRY);
                    continue;
                }
            };

            let now = Local::now().naive_local();
            match self.process_frame(&frame, recognizer, now)? {
                Observation::Recorded {
                    event,
                    display_name,
                } => {
                    stats.recorded += 1;
                    notify(SessionUpdate::Recorded {
                        event,
                        display_name,
                    });
                }
                Observation::Miss(reason) => {
                    stats.misses += 1;
                    notify(SessionUpdate::Miss(reason));
                }
                Observation::Cooldown => {}
            }

            std::thread::sleep(POLL_INTERVAL);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::mpsc;
    use std::time::Instant;

    use chrono::{NaiveDate, NaiveTime};
    use tempfile::TempDir;

    use rollcall_capture::camera::CameraError;
    use rollcall_capture::recognizer::{Identification, ImageReport};
    use rollcall_core::types::AttendanceStatus;

    struct Scripted {
        verdicts: VecDeque<Result<Identification, RecognizerError>>,
    }

    impl Scripted {
        fn new(verdicts: Vec<Result<Identification, RecognizerError>>) -> Self {
            Self {
                verdicts: verdicts.into(),
            }
        }
    }

    impl Recognizer for Scripted {
        fn identify(&mut self, _frame: &Frame) -> Result<Identification, RecognizerError> {
            self.verdicts
                .pop_front()
                .unwrap_or_else(|| panic!("identify called more often than scripted"))
        }

        fn inspect(&mut self, _image: &[u8]) -> Result<ImageReport, RecognizerError> {
            unreachable!("inspect is not used by the session loop")
        }
    }

    struct StillFrames {
        frame: Frame,
        grabs_left: u32,
        quit_tx: Option<mpsc::Sender<Control>>,
    }

    impl FrameSource for StillFrames {
        fn grab(&mut self) -> Result<Frame, CameraError> {
            if self.grabs_left > 0 {
                self.grabs_left -= 1;
                if self.grabs_left == 0 {
                    if let Some(tx) = self.quit_tx.take() {
                        let _ = tx.send(Control::Quit);
                    }
                }
            }
            Ok(self.frame.clone())
        }
    }

    fn gray_frame() -> Frame {
        Frame {
            data: vec![128; 16],
            width: 4,
            height: 4,
            timestamp: Instant::now(),
            sequence: 0,
        }
    }

    fn schedule() -> Schedule {
        Schedule {
            work_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            work_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            grace_minutes: 10,
        }
    }

    fn match_for(id: &str) -> Result<Identification, RecognizerError> {
        Ok(Identification {
            employee_id: Some(id.to_string()),
            confidence: 0.93,
            is_live: true,
        })
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 25)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn session<'a>(store: &'a RecordStore, cooldown: Duration) -> Session<'a> {
        let names = HashMap::from([("emp-001".to_string(), "Ana Flores".to_string())]);
        Session::new(store, schedule(), names, EventKind::CheckIn, cooldown)
    }

    #[test]
    fn test_match_is_recorded_with_status() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path());
        let mut recognizer = Scripted::new(vec![match_for("emp-001")]);
        let mut session = session(&store, Duration::ZERO);

        let obs = session
            .process_frame(&gray_frame(), &mut recognizer, at(9, 30))
            .unwrap();
        match obs {
            Observation::Recorded {
                event,
                display_name,
            } => {
                assert_eq!(display_name, "Ana Flores");
                assert_eq!(event.kind, EventKind::CheckIn);
                assert_eq!(event.status, AttendanceStatus::Late);
            }
            other => panic!("expected a recorded event, got {other:?}"),
        }

        let stored = store.read(at(9, 30).date()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].employee_id, "emp-001");
    }

    #[test]
    fn test_unknown_face_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path());
        let mut recognizer = Scripted::new(vec![Ok(Identification {
            employee_id: None,
            confidence: 0.31,
            is_live: true,
        })]);
        let mut session = session(&store, Duration::ZERO);

        let obs = session
            .process_frame(&gray_frame(), &mut recognizer, at(9, 5))
            .unwrap();
        assert!(matches!(obs, Observation::Miss(MissReason::NoMatch)));
        assert!(store.read(at(9, 5).date()).is_err());
    }

    #[test]
    fn test_liveness_failure_records_nothing() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path());
        // A confident match that is not a live face must still be dropped.
        let mut recognizer = Scripted::new(vec![Ok(Identification {
            employee_id: Some("emp-001".to_string()),
            confidence: 0.97,
            is_live: false,
        })]);
        let mut session = session(&store, Duration::ZERO);

        let obs = session
            .process_frame(&gray_frame(), &mut recognizer, at(9, 5))
            .unwrap();
        assert!(matches!(obs, Observation::Miss(MissReason::Spoof)));
        assert!(store.read(at(9, 5).date()).is_err());
    }

    #[test]
    fn test_backend_refusal_is_a_miss_not_fatal() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path());
        let mut recognizer = Scripted::new(vec![
            Err(RecognizerError::Backend("no face found".to_string())),
            match_for("emp-001"),
        ]);
        let mut session = session(&store, Duration::ZERO);

        let obs = session
            .process_frame(&gray_frame(), &mut recognizer, at(9, 0))
            .unwrap();
        assert!(matches!(obs, Observation::Miss(MissReason::Backend(_))));

        // The session keeps going afterwards.
        let obs = session
            .process_frame(&gray_frame(), &mut recognizer, at(9, 1))
            .unwrap();
        assert!(matches!(obs, Observation::Recorded { .. }));
    }

    #[test]
    fn test_transport_failure_ends_the_session() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path());
        let mut recognizer = Scripted::new(vec![Err(RecognizerError::Transport(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "peer went away",
        )))]);
        let mut session = session(&store, Duration::ZERO);

        let err = session
            .process_frame(&gray_frame(), &mut recognizer, at(9, 0))
            .unwrap_err();
        assert!(matches!(err, SessionError::Recognizer(_)));
    }

    #[test]
    fn test_cooldown_suppresses_immediate_repeat() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path());
        // One scripted verdict: a second identify call would panic.
        let mut recognizer = Scripted::new(vec![match_for("emp-001")]);
        let mut session = session(&store, Duration::from_secs(60));

        let obs = session
            .process_frame(&gray_frame(), &mut recognizer, at(9, 0))
            .unwrap();
        assert!(matches!(obs, Observation::Recorded { .. }));

        let obs = session
            .process_frame(&gray_frame(), &mut recognizer, at(9, 0))
            .unwrap();
        assert!(matches!(obs, Observation::Cooldown));
        assert_eq!(store.read(at(9, 0).date()).unwrap().len(), 1);
    }

    #[test]
    fn test_zero_cooldown_keeps_every_event() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path());
        let mut recognizer = Scripted::new(vec![match_for("emp-001"), match_for("emp-001")]);
        let mut session = session(&store, Duration::ZERO);

        session
            .process_frame(&gray_frame(), &mut recognizer, at(9, 0))
            .unwrap();
        session
            .process_frame(&gray_frame(), &mut recognizer, at(9, 2))
            .unwrap();

        // Both rows survive; nothing deduplicates repeated check-ins.
        assert_eq!(store.read(at(9, 0).date()).unwrap().len(), 2);
    }

    #[test]
    fn test_match_outside_roster_falls_back_to_id() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path());
        let mut recognizer = Scripted::new(vec![match_for("emp-ghost")]);
        let mut session = session(&store, Duration::ZERO);

        let obs = session
            .process_frame(&gray_frame(), &mut recognizer, at(9, 0))
            .unwrap();
        match obs {
            Observation::Recorded { display_name, .. } => assert_eq!(display_name, "emp-ghost"),
            other => panic!("expected a recorded event, got {other:?}"),
        }
    }

    #[test]
    fn test_run_toggle_switches_to_checkout() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path());
        let mut recognizer = Scripted::new(vec![match_for("emp-001")]);

        let (tx, rx) = mpsc::channel();
        tx.send(Control::Toggle).unwrap();
        let mut frames = StillFrames {
            frame: gray_frame(),
            grabs_left: 1,
            quit_tx: Some(tx),
        };

        let mut session = session(&store, Duration::ZERO);
        let mut updates = Vec::new();
        let stats = session
            .run(&mut frames, &mut recognizer, &rx, |update| {
                updates.push(update)
            })
            .unwrap();

        assert_eq!(stats.recorded, 1);
        assert!(matches!(
            updates.first(),
            Some(SessionUpdate::Mode(EventKind::CheckOut))
        ));
        // Check-out is never late, whatever the wall clock says.
        let stored = &store.read(Local::now().date_naive()).unwrap()[0];
        assert_eq!(stored.kind, EventKind::CheckOut);
        assert_eq!(stored.status, AttendanceStatus::OnTime);
    }

    #[test]
    fn test_run_stops_when_controls_disconnect() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path());
        let mut recognizer = Scripted::new(vec![]);
        let mut frames = StillFrames {
            frame: gray_frame(),
            grabs_left: 0,
            quit_tx: None,
        };

        let (tx, rx) = mpsc::channel::<Control>();
        drop(tx);

        let mut session = session(&store, Duration::ZERO);
        let stats = session
            .run(&mut frames, &mut recognizer, &rx, |_| {})
            .unwrap();
        assert_eq!(stats.recorded, 0);
        assert_eq!(stats.misses, 0);
    }
}
