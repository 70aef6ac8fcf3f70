//! Shared fixtures for tether-task integration tests
//!
//! `FakeSessions` is an in-memory session backend keyed by session name.
//! Sessions can be given a lifetime measured on a `ManualClock`, killed from
//! "outside" the controller, or made to fail on create/send.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tether_foundation::{Error, Result};
use tether_task::{Clock, ManualClock, SessionBackend, TaskManager, TaskManagerConfig};

#[derive(Debug, Clone)]
pub struct FakeSession {
    pub working_dir: PathBuf,
    pub command: String,
    pub output: Vec<String>,
    pub sent: Vec<String>,
    pub ends_at: Option<DateTime<Utc>>,
    pub killed: bool,
}

pub struct FakeSessions {
    clock: Arc<ManualClock>,
    sessions: Mutex<HashMap<String, FakeSession>>,
    lifetime: Mutex<Option<Duration>>,
    fail_create: Mutex<Option<String>>,
    fail_send: AtomicBool,
    fail_kill: AtomicBool,
    exists_calls: AtomicUsize,
}

impl FakeSessions {
    pub fn new(clock: Arc<ManualClock>) -> Arc<Self> {
        Arc::new(Self {
            clock,
            sessions: Mutex::new(HashMap::new()),
            lifetime: Mutex::new(None),
            fail_create: Mutex::new(None),
            fail_send: AtomicBool::new(false),
            fail_kill: AtomicBool::new(false),
            exists_calls: AtomicUsize::new(0),
        })
    }

    /// Sessions created from now on end by themselves after `lifetime`
    pub fn set_lifetime(&self, lifetime: Option<Duration>) {
        *self.lifetime.lock().unwrap() = lifetime;
    }

    pub fn fail_create(&self, reason: &str) {
        *self.fail_create.lock().unwrap() = Some(reason.to_string());
    }

    pub fn fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub fn fail_kill(&self, fail: bool) {
        self.fail_kill.store(fail, Ordering::SeqCst);
    }

    /// Terminate a session without going through the controller
    pub fn end(&self, name: &str) {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(name) {
            session.killed = true;
        }
    }

    pub fn push_output(&self, name: &str, line: &str) {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(name) {
            session.output.push(line.to_string());
        }
    }

    pub fn session(&self, name: &str) -> Option<FakeSession> {
        self.sessions.lock().unwrap().get(name).cloned()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }

    fn is_alive(&self, session: &FakeSession) -> bool {
        if session.killed {
            return false;
        }
        match session.ends_at {
            Some(ends_at) => self.clock.now() < ends_at,
            None => true,
        }
    }

    fn with_live<T>(&self, name: &str, f: impl FnOnce(&mut FakeSession) -> T) -> Result<T> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(name) {
            Some(session) if self.is_alive(session) => Ok(f(session)),
            _ => Err(Error::Session(format!("can't find session: {}", name))),
        }
    }
}

#[async_trait]
impl SessionBackend for FakeSessions {
    async fn create_session(&self, name: &str, working_dir: &Path, command: &str) -> Result<()> {
        if let Some(reason) = self.fail_create.lock().unwrap().clone() {
            return Err(Error::Session(reason));
        }

        let ends_at = self.lifetime.lock().unwrap().map(|lifetime| {
            self.clock.now() + chrono::Duration::from_std(lifetime).unwrap()
        });

        let mut sessions = self.sessions.lock().unwrap();
        if sessions.contains_key(name) {
            return Err(Error::Session(format!("duplicate session: {}", name)));
        }
        sessions.insert(
            name.to_string(),
            FakeSession {
                working_dir: working_dir.to_path_buf(),
                command: command.to_string(),
                output: vec![format!("started {}", name)],
                sent: Vec::new(),
                ends_at,
                killed: false,
            },
        );
        Ok(())
    }

    async fn session_exists(&self, name: &str) -> bool {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.with_live(name, |_| ()).is_ok()
    }

    async fn capture_output(&self, name: &str, max_lines: usize) -> Result<String> {
        self.with_live(name, |session| {
            let skip = session.output.len().saturating_sub(max_lines);
            session.output[skip..].join("\n")
        })
    }

    async fn send_keys(&self, name: &str, text: &str) -> Result<()> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(Error::Session("send-keys failed".to_string()));
        }
        self.with_live(name, |session| {
            session.sent.push(text.to_string());
            session.output.push(text.to_string());
        })
    }

    async fn kill_session(&self, name: &str) -> Result<()> {
        if self.fail_kill.load(Ordering::SeqCst) {
            return Err(Error::Session("kill-session failed".to_string()));
        }
        self.with_live(name, |session| session.killed = true)
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub struct Harness {
    pub manager: TaskManager,
    pub sessions: Arc<FakeSessions>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(TaskManagerConfig::default())
    }

    pub fn with_config(config: TaskManagerConfig) -> Self {
        let clock = Arc::new(ManualClock::default());
        let sessions = FakeSessions::new(clock.clone());
        let manager = TaskManager::with_clock(config, sessions.clone(), clock.clone());
        Self {
            manager,
            sessions,
            clock,
        }
    }
}

/// A directory that exists on every test host
pub fn workdir() -> PathBuf {
    std::env::temp_dir()
}
