//! Handler pipeline capability set.
//!
//! The state machine depends on handlers only through [`Pipeline`]: start,
//! process, writable and finalize hooks. A [`PipelineFactory`] supplies the
//! pipeline once a request head has parsed; the service layer implements it
//! with endpoint/host/route dispatch.

use crate::error::HttpError;
use crate::packet::RecvQueue;
use crate::rx::Rx;
use crate::tx::Tx;

/// Progress report from a pipeline's `process` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Output pending; call again on the next writable event.
    Pending,
    /// All output bytes were produced and handed off.
    WriteComplete,
    /// The exchange is finished.
    Complete,
}

/// The capability set a handler exposes to the connection state machine.
pub trait Pipeline: Send {
    /// Invoked once when the request head has parsed.
    ///
    /// # Errors
    ///
    /// An error aborts the request and is answered by the error path.
    fn start(&mut self, _rx: &mut Rx, _tx: &mut Tx) -> Result<(), HttpError> {
        Ok(())
    }

    /// Drives the exchange: consume queued body packets, produce output.
    fn process(&mut self, rx: &mut Rx, tx: &mut Tx, recv: &mut RecvQueue) -> Verdict;

    /// The connection became writable; more output may be produced.
    fn writable(&mut self, _rx: &mut Rx, _tx: &mut Tx) {}

    /// The exchange is being torn down.
    fn finalize(&mut self, _rx: &mut Rx, _tx: &mut Tx) {}
}

/// Supplies pipelines and concurrency-limit decisions to a connection.
pub trait PipelineFactory {
    /// Validates the endpoint's concurrency limits before a new request is
    /// parsed. Returning false answers 503.
    fn validate_open(&mut self) -> bool {
        true
    }

    /// Selects the pipeline for a parsed request.
    ///
    /// # Errors
    ///
    /// An error (e.g. no matching host or route) aborts the request.
    fn create(&mut self, rx: &mut Rx, tx: &mut Tx) -> Result<Box<dyn Pipeline>, HttpError>;

    /// A request on this connection completed and its context was
    /// destroyed.
    fn request_complete(&mut self) {}
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::packet::Packet;
    use std::sync::{Arc, Mutex};

    /// Everything delivered to pipelines created by a [`SharedFactory`],
    /// in arrival order across requests.
    #[derive(Debug, Default)]
    pub struct Recorded {
        pub started: usize,
        pub process_calls: usize,
        pub writable_calls: usize,
        /// One entry per completed body: the payload and whether the end
        /// marker arrived.
        pub bodies: Vec<(Vec<u8>, bool)>,
        pub current: Vec<u8>,
        /// Methods of requests a pipeline was created for.
        pub methods: Vec<String>,
    }

    struct SharedPipeline {
        rec: Arc<Mutex<Recorded>>,
        verdict: Verdict,
    }

    impl Pipeline for SharedPipeline {
        fn start(&mut self, _rx: &mut Rx, _tx: &mut Tx) -> Result<(), HttpError> {
            self.rec.lock().unwrap().started += 1;
            Ok(())
        }

        fn process(&mut self, _rx: &mut Rx, _tx: &mut Tx, recv: &mut RecvQueue) -> Verdict {
            let mut rec = self.rec.lock().unwrap();
            rec.process_calls += 1;
            while let Some(packet) = recv.pop() {
                match packet {
                    Packet::Data(bytes) => rec.current.extend_from_slice(&bytes),
                    Packet::End => {
                        let body = std::mem::take(&mut rec.current);
                        rec.bodies.push((body, true));
                    }
                }
            }
            self.verdict
        }

        fn writable(&mut self, _rx: &mut Rx, _tx: &mut Tx) {
            self.rec.lock().unwrap().writable_calls += 1;
        }
    }

    /// Factory handing out recording pipelines that share one log.
    pub struct SharedFactory {
        pub rec: Arc<Mutex<Recorded>>,
        pub verdict: Verdict,
        pub allow_open: bool,
        pub completed: usize,
    }

    impl Default for SharedFactory {
        fn default() -> Self {
            Self {
                rec: Arc::new(Mutex::new(Recorded::default())),
                verdict: Verdict::Complete,
                allow_open: true,
                completed: 0,
            }
        }
    }

    impl PipelineFactory for SharedFactory {
        fn validate_open(&mut self) -> bool {
            self.allow_open
        }

        fn create(&mut self, rx: &mut Rx, _tx: &mut Tx) -> Result<Box<dyn Pipeline>, HttpError> {
            let mut rec = self.rec.lock().unwrap();
            if let Some(method) = rx.method {
                rec.methods.push(method.to_string());
            }
            Ok(Box::new(SharedPipeline {
                rec: Arc::clone(&self.rec),
                verdict: self.verdict,
            }))
        }

        fn request_complete(&mut self) {
            self.completed += 1;
        }
    }
}
