//! A scripted in-memory transport standing in for a broker connection,
//! playing the same role as the teacher's `src/interface_mocks.rs`.
//!
//! Each reconnect attempt pulls the next queued [`Script`] and plays it back
//! on `read_some`; every byte written is recorded so a test can assert on
//! the exact wire trace (dup flags, resend order, and so on).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use mqtt5_core::topic::Endpoint;
use mqtt5_core::transport::{Transport, TransportError};

/// One step in a scripted connection's read side.
pub enum ReadStep {
    /// Hand back these exact bytes on the next `read_some` call.
    Frame(Vec<u8>),
    /// Never resolve, simulating a connection that is open and idle.
    Hang,
    /// Resolve with `Ok(0)`, simulating the peer closing the connection.
    Close,
    /// Resolve with an error, simulating a dropped connection.
    Fail,
}

/// What happens once a script's explicit steps are all consumed.
#[derive(Clone, Copy)]
pub enum Exhausted {
    Close,
    Fail,
    Hang,
}

/// One scripted connection attempt.
pub struct Script {
    steps: VecDeque<ReadStep>,
    on_exhausted: Exhausted,
}

impl Script {
    #[must_use]
    pub fn new(on_exhausted: Exhausted) -> Self {
        Self {
            steps: VecDeque::new(),
            on_exhausted,
        }
    }

    #[must_use]
    pub fn then(mut self, step: ReadStep) -> Self {
        self.steps.push_back(step);
        self
    }

    #[must_use]
    pub fn then_frame(self, frame: Vec<u8>) -> Self {
        self.then(ReadStep::Frame(frame))
    }
}

struct SharedInner {
    scripts: VecDeque<Script>,
    /// Bytes written on each connection attempt, one entry per attempt.
    writes: Vec<Vec<u8>>,
}

/// State shared across every [`MockTransport`] instance a test drives
/// through one or more reconnects.
pub struct Shared {
    inner: Mutex<SharedInner>,
}

impl Shared {
    #[must_use]
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(SharedInner {
                scripts: scripts.into_iter().collect(),
                writes: Vec::new(),
            }),
        })
    }

    /// All bytes written on connection attempt `index` (0-based).
    #[must_use]
    pub fn written(&self, index: usize) -> Vec<u8> {
        self.inner.lock().unwrap().writes.get(index).cloned().unwrap_or_default()
    }

    /// How many connection attempts have been made so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.inner.lock().unwrap().writes.len()
    }
}

thread_local! {
    static NEXT_SHARED: std::cell::RefCell<Option<Arc<Shared>>> = const { std::cell::RefCell::new(None) };
}

/// Register `shared` as the state the next [`MockTransport::default`] calls
/// (on this thread) should draw their scripts from. Tests run on the
/// current-thread runtime so the spawned session tasks observe the same
/// thread-local as the test body.
pub fn install(shared: &Arc<Shared>) {
    NEXT_SHARED.with(|cell| *cell.borrow_mut() = Some(shared.clone()));
}

/// A single connection attempt's view onto [`Shared`].
pub struct MockTransport {
    shared: Arc<Shared>,
    script: Mutex<Option<Script>>,
    attempt: Mutex<Option<usize>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        let shared = NEXT_SHARED
            .with(|cell| cell.borrow().clone())
            .expect("support::mock_transport::install() must run before the session starts");
        Self {
            shared,
            script: Mutex::new(None),
            attempt: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self, _endpoint: &Endpoint) -> Result<(), TransportError> {
        let mut inner = self.shared.inner.lock().unwrap();
        let script = inner.scripts.pop_front().unwrap_or_else(|| Script::new(Exhausted::Hang));
        inner.writes.push(Vec::new());
        let index = inner.writes.len() - 1;
        drop(inner);
        *self.script.lock().unwrap() = Some(script);
        *self.attempt.lock().unwrap() = Some(index);
        Ok(())
    }

    async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let step = {
            let mut guard = self.script.lock().unwrap();
            let script = guard.as_mut().expect("read_some called before connect");
            script.steps.pop_front()
        };
        let on_exhausted = self.script.lock().unwrap().as_ref().unwrap().on_exhausted;
        let step = step.unwrap_or(match on_exhausted {
            Exhausted::Close => ReadStep::Close,
            Exhausted::Fail => ReadStep::Fail,
            Exhausted::Hang => ReadStep::Hang,
        });
        // A real socket read always costs at least one scheduler tick; give
        // already-runnable tasks (e.g. a reply waiter about to register) a
        // chance to do so before this step resolves.
        if !matches!(step, ReadStep::Hang) {
            tokio::task::yield_now().await;
        }
        match step {
            ReadStep::Frame(frame) => {
                let n = frame.len().min(buf.len());
                buf[..n].copy_from_slice(&frame[..n]);
                Ok(n)
            }
            ReadStep::Close => Ok(0),
            ReadStep::Fail => Err(TransportError::Closed),
            ReadStep::Hang => std::future::pending().await,
        }
    }

    async fn write_all(&mut self, bufs: &[&[u8]]) -> Result<(), TransportError> {
        let index = self.attempt.lock().unwrap().expect("write_all called before connect");
        let mut inner = self.shared.inner.lock().unwrap();
        for buf in bufs {
            inner.writes[index].extend_from_slice(buf);
        }
        Ok(())
    }

    fn close(&mut self) {}
}
