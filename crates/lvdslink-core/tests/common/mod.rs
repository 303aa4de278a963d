#![allow(dead_code)]

use lvdslink_core::bridge::{
    ControlChannel, ControlRequest, IoctlSerial, Reply, Transceiver, TransportError,
};
use lvdslink_core::config::BridgeConfig;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Bursts a simulated device emits after receiving a message
pub type Bursts = Vec<(Duration, Vec<u8>)>;

type Responder = Box<dyn Fn(&[u8]) -> Bursts + Send + Sync>;

/// What the fake driver observed, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Send(Vec<u8>),
    Receive(Vec<u8>),
}

#[derive(Default)]
struct BridgeState {
    rx: VecDeque<u8>,
    scheduled: Vec<(Instant, Vec<u8>)>,
    baud: u32,
    events: Vec<Event>,
    rx_count_calls: usize,
}

impl BridgeState {
    fn land_due_bursts(&mut self) {
        let now = Instant::now();
        self.scheduled.sort_by_key(|(at, _)| *at);
        while let Some((at, _)) = self.scheduled.first() {
            if *at > now {
                break;
            }
            let (_, bytes) = self.scheduled.remove(0);
            self.rx.extend(bytes);
        }
    }
}

/// Bridge driver stand-in whose device answers on a timeline
pub struct FakeBridge {
    state: Mutex<BridgeState>,
    responder: Responder,
    call_delay: Duration,
}

impl std::fmt::Debug for FakeBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeBridge")
            .field("call_delay", &self.call_delay)
            .finish_non_exhaustive()
    }
}

impl FakeBridge {
    /// A device that never answers
    pub fn silent() -> Self {
        Self::with_responder(|_| Vec::new())
    }

    pub fn with_responder(responder: impl Fn(&[u8]) -> Bursts + Send + Sync + 'static) -> Self {
        Self {
            state: Mutex::new(BridgeState::default()),
            responder: Box::new(responder),
            call_delay: Duration::ZERO,
        }
    }

    /// Slow every driver call down by `delay`
    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    /// Put bytes in the receive FIFO right now
    pub fn inject(&self, bytes: &[u8]) {
        self.state.lock().unwrap().rx.extend(bytes.iter().copied());
    }

    /// Schedule bytes to land `after` from now
    pub fn schedule(&self, after: Duration, bytes: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .scheduled
            .push((Instant::now() + after, bytes.to_vec()));
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Send(bytes) => Some(bytes),
                Event::Receive(_) => None,
            })
            .collect()
    }

    pub fn rx_count_calls(&self) -> usize {
        self.state.lock().unwrap().rx_count_calls
    }

    pub fn baud(&self) -> u32 {
        self.state.lock().unwrap().baud
    }
}

impl ControlChannel for FakeBridge {
    fn call(&self, request: ControlRequest, arg: &mut IoctlSerial) -> Result<(), TransportError> {
        if !self.call_delay.is_zero() {
            std::thread::sleep(self.call_delay);
        }
        let mut state = self.state.lock().unwrap();
        state.land_due_bursts();
        match request {
            ControlRequest::SerialSendTx => {
                let message = arg.payload().to_vec();
                let now = Instant::now();
                for (after, bytes) in (self.responder)(&message) {
                    state.scheduled.push((now + after, bytes));
                }
                state.events.push(Event::Send(message));
            }
            ControlRequest::SerialRecvRx => {
                let want = if arg.len == 0 { usize::MAX } else { arg.len as usize };
                let n = want.min(state.rx.len()).min(arg.data.len());
                let bytes: Vec<u8> = state.rx.drain(..n).collect();
                arg.data[..n].copy_from_slice(&bytes);
                arg.len = n as u32;
                state.events.push(Event::Receive(bytes));
            }
            ControlRequest::SerialRxCount => {
                state.rx_count_calls += 1;
                arg.len = state.rx.len() as u32;
            }
            ControlRequest::SerialBaud => {
                if arg.len != 0 {
                    state.baud = arg.len;
                }
                arg.len = state.baud;
            }
            _ => arg.len = 0,
        }
        Ok(())
    }
}

/// Route library logs to the test harness; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Timings small enough for tests
pub fn fast_config() -> BridgeConfig {
    BridgeConfig {
        start_timeout_ms: 30,
        settle_ms: 10,
        poll_interval_ms: 1,
        ..BridgeConfig::default()
    }
}

/// One call made on a [`ScriptedTransceiver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Send(Vec<u8>),
    Receive,
    Transact(Vec<u8>),
}

/// Transceiver that replays canned replies
#[derive(Default)]
pub struct ScriptedTransceiver {
    transact_replies: Mutex<VecDeque<Vec<u8>>>,
    receive_replies: Mutex<VecDeque<Vec<u8>>>,
    calls: Mutex<Vec<Call>>,
    max_transfer: Option<usize>,
}

impl ScriptedTransceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_transfer(mut self, max: usize) -> Self {
        self.max_transfer = Some(max);
        self
    }

    pub fn reply(self, bytes: &[u8]) -> Self {
        self.transact_replies.lock().unwrap().push_back(bytes.to_vec());
        self
    }

    pub fn late_bytes(self, bytes: &[u8]) -> Self {
        self.receive_replies.lock().unwrap().push_back(bytes.to_vec());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transceiver for ScriptedTransceiver {
    fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(Call::Send(bytes.to_vec()));
        Ok(())
    }

    fn receive(&self, _max_count: usize) -> Result<Vec<u8>, TransportError> {
        self.calls.lock().unwrap().push(Call::Receive);
        Ok(self
            .receive_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    fn transact(&self, message: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Transact(message.to_vec()));
        Ok(self
            .transact_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    fn transact_with(
        &self,
        message: &[u8],
        _response_count: usize,
        _start_timeout: Duration,
        _settle: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        self.transact(message)
    }

    fn transact_validated(
        &self,
        message: &[u8],
        _reread_delay: Duration,
        accept: &dyn Fn(&[u8]) -> bool,
    ) -> Result<Reply, TransportError> {
        let first = self.transact(message)?;
        let late = if first.is_empty() || accept(&first) {
            Vec::new()
        } else {
            self.receive(0)?
        };
        Ok(Reply { first, late })
    }

    fn max_transfer(&self) -> usize {
        self.max_transfer.unwrap_or(lvdslink_core::bridge::MAX_TRANSFER)
    }
}
