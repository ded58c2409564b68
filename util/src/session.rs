//! Session management
//!
//! A session is one execution of a vehicle executable. It owns a timestamped directory under
//! `$VEH_SW_ROOT/sessions` holding the log file, the CSV archives and any JSON documents saved
//! during the run. Saving happens on a background thread so the control loop never blocks on disk
//! access.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use erased_serde::Serialize;
use log::{info, warn};
use std::ffi::OsStr;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

use crate::time;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static SESSION_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();
static SAVE_SENDER: OnceCell<Mutex<Sender<SaveRequest>>> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// A chrono format string which diplays a timestamp. See
/// https://docs.rs/chrono/0.4.11/chrono/format/strftime/index.html for more
/// information.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// How long the save thread waits for a request before checking the stop flag.
const SAVE_POLL_PERIOD: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

type SaveRequest = (PathBuf, Box<dyn Serialize + Send>);

/// A struct storing information about the current session
#[derive(Clone)]
pub struct Session {
    /// The root directory for this session
    pub session_root: PathBuf,

    /// The root directory for this session's archives
    pub arch_root: PathBuf,

    /// The path to the session's log file
    pub log_file_path: PathBuf,

    save_sender: Sender<SaveRequest>,

    save_stop: Arc<AtomicBool>,

    save_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors associated with the session module.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("The software root environment variable (VEH_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot create the session directory: {0}")]
    CannotCreateDir(std::io::Error),

    #[error(
        "Cannot initialise the session epoch, have you already initialised the \
         session? (conquer_once error: {0})"
    )]
    CannotInitEpoch(conquer_once::TryInitError),

    #[error("Cannot get the epoch time, did you forget to initialise the session?")]
    CannotGetEpoch,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start a new session within the given directory, relative to the software root.
    ///
    /// This will create a new session directory named `{exec_name}_{timestamp}`
    pub fn new(exec_name: &str, sessions_dir: &str) -> Result<Self, SessionError> {
        let root = crate::host::get_sw_root().map_err(|_| SessionError::SwRootNotSet)?;

        Self::new_in(root.join(sessions_dir), exec_name)
    }

    /// Start a new session inside an explicit sessions directory.
    pub fn new_in<P: AsRef<Path>>(sessions_dir: P, exec_name: &str) -> Result<Self, SessionError> {
        SESSION_EPOCH
            .try_init_once(Utc::now)
            .map_err(SessionError::CannotInitEpoch)?;

        let timestamp = SESSION_EPOCH
            .get()
            .ok_or(SessionError::CannotGetEpoch)?
            .format(TIMESTAMP_FORMAT);

        let path = sessions_dir
            .as_ref()
            .join(format!("{}_{}", exec_name, timestamp));
        let arch_path = path.join("arch");

        fs::create_dir_all(&arch_path).map_err(SessionError::CannotCreateDir)?;

        let log_file_path = path.join(format!("{}.log", exec_name));

        let (tx, rx) = channel();

        // Keep a copy for the free `save` function
        SAVE_SENDER.init_once(|| Mutex::new(tx.clone()));

        let save_stop = Arc::new(AtomicBool::new(false));

        let session_root = path.clone();
        let stop = save_stop.clone();
        let handle = thread::spawn(move || save_thread(stop, session_root, rx));

        Ok(Session {
            session_root: path,
            arch_root: arch_path,
            log_file_path,
            save_sender: tx,
            save_stop,
            save_handle: Arc::new(Mutex::new(Some(handle))),
        })
    }

    /// Exit the session, waiting for the save thread to finish any pending actions
    pub fn exit(self) {
        self.save_stop.store(true, Ordering::Release);

        info!("Stopping save thread");

        let handle = match self.save_handle.lock() {
            Ok(mut h) => h.take(),
            Err(_) => {
                warn!("Save thread handle poisoned, pending saves may be lost");
                None
            }
        };

        if let Some(h) = handle {
            if h.join().is_err() {
                warn!("Save thread panicked");
            }
        }

        info!("Save thread exited");
    }

    /// Saves the given data to the given session-relative path in a background thread.
    pub fn save<P: AsRef<Path>, T: Serialize + Send + 'static>(&self, path: P, data: T) {
        if let Err(e) = self
            .save_sender
            .send((path.as_ref().to_path_buf(), Box::new(data)))
        {
            warn!(
                "Could not send data to be saved to path {:?}: {}",
                path.as_ref(),
                e
            )
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the number of seconds elapsed since the start of the session.
///
/// Returns NaN if no session has been started yet.
pub fn get_elapsed_seconds() -> f64 {
    match SESSION_EPOCH.get() {
        Some(e) => time::duration_to_seconds(Utc::now() - *e).unwrap_or(std::f64::NAN),
        None => std::f64::NAN,
    }
}

/// Return a reference to the session's epoch, if a session has been started.
pub fn get_epoch() -> Option<&'static DateTime<Utc>> {
    SESSION_EPOCH.get()
}

/// Save the given data into the session-relative path
pub fn save<P: AsRef<Path>, T: Serialize + Send + 'static>(path: P, data: T) {
    match SAVE_SENDER.get() {
        Some(m) => match m.lock() {
            Ok(s) => {
                if let Err(e) = s.send((path.as_ref().to_path_buf(), Box::new(data))) {
                    warn!(
                        "Couldn't send data to save thread for file {:?}: {}",
                        path.as_ref(),
                        e
                    )
                }
            }
            Err(_) => warn!("Couldn't get lock on save sender"),
        },
        None => warn!("Cannot save data as session is not initialised yet"),
    }
}

/// Saves the given data to the path, appending a timestamp before the path's extension
pub fn save_with_timestamp<P: AsRef<Path>, T: Serialize + Send + 'static>(path: P, data: T) {
    save(timestamped_path(path, &Utc::now()), data);
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn timestamped_path<P: AsRef<Path>>(path: P, time: &DateTime<Utc>) -> PathBuf {
    let stem = path.as_ref().file_stem().unwrap_or_else(|| OsStr::new(""));

    let mut file_name = stem.to_os_string();
    file_name.push("_");
    file_name.push(time.format(TIMESTAMP_FORMAT).to_string());

    if let Some(ext) = path.as_ref().extension() {
        file_name.push(".");
        file_name.push(ext);
    }

    path.as_ref().with_file_name(file_name)
}

fn save_thread(stop: Arc<AtomicBool>, session_root: PathBuf, receiver: Receiver<SaveRequest>) {
    loop {
        match receiver.recv_timeout(SAVE_POLL_PERIOD) {
            Ok((path, data)) => write_json(&session_root.join(path), &*data),
            // Requests queued before the stop are always received before a timeout
            Err(RecvTimeoutError::Timeout) => {
                if stop.load(Ordering::Acquire) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn write_json(full_path: &Path, data: &(dyn Serialize + Send)) {
    match full_path.extension().and_then(|s| s.to_str()) {
        Some("json") => (),
        ext => {
            warn!(
                "Unrecognised file path extension for {:?} (got {:?})",
                full_path, ext
            );
            return;
        }
    }

    if let Some(parent) = full_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Couldn't create parent directory for {:?}: {}", full_path, e);
            return;
        }
    }

    let file = match OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(true)
        .open(full_path)
    {
        Ok(f) => f,
        Err(e) => {
            warn!("Couldn't create file {:?}: {}", full_path, e);
            return;
        }
    };

    if let Err(e) = serde_json::to_writer_pretty(&file, data) {
        warn!("Couldn't serialize data for file {:?}: {}", full_path, e);
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamped_path() {
        let t = Utc.ymd(2021, 3, 4).and_hms(5, 6, 7);

        assert_eq!(
            timestamped_path("nav/tm.json", &t),
            PathBuf::from("nav/tm_20210304_050607.json")
        );
        assert_eq!(
            timestamped_path("notes", &t),
            PathBuf::from("notes_20210304_050607")
        );
    }
}
