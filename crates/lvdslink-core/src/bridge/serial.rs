//! Quiet-period serial channel
//!
//! Turns the bridge's polled, boundary-less byte FIFO into a
//! request/response primitive.
//!
//! Completion is inferred from quiescence: once bytes start arriving, the
//! response is considered complete when the receive count has not changed
//! for the settle window. Bytes that arrive after that window are left in the
//! FIFO and discarded by the next transaction's flush.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::ioctl::{ControlChannel, ControlRequest, DeviceNode, IoctlSerial};
use super::{TransportError, UartStatus};
use crate::config::BridgeConfig;

/// Byte-level request/response contract offered to command layers
///
/// Both the Tamarisk codec and ASCII-hex zoom-block tooling ride on this; it
/// knows nothing about framing.
pub trait Transceiver: Send + Sync {
    /// Queue `bytes` for transmission
    fn send(&self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Snapshot read of up to `max_count` buffered bytes (0 = all)
    fn receive(&self, max_count: usize) -> Result<Vec<u8>, TransportError>;

    /// Send `message` and collect the reply with the channel's default timings
    fn transact(&self, message: &[u8]) -> Result<Vec<u8>, TransportError>;

    /// Send `message` and collect up to `response_count` reply bytes (0 = all)
    fn transact_with(
        &self,
        message: &[u8],
        response_count: usize,
        start_timeout: Duration,
        settle: Duration,
    ) -> Result<Vec<u8>, TransportError>;

    /// Transact, then re-read once if `accept` rejects the reply
    ///
    /// The re-read happens after `reread_delay`, never re-sends `message`,
    /// and runs inside the same exclusive section as the transaction so it
    /// cannot drain another caller's reply.
    fn transact_validated(
        &self,
        message: &[u8],
        reread_delay: Duration,
        accept: &dyn Fn(&[u8]) -> bool,
    ) -> Result<Reply, TransportError>;

    /// Largest message a single `send` accepts
    fn max_transfer(&self) -> usize;
}

/// Bytes collected by [`Transceiver::transact_validated`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// What arrived before the line went quiet
    pub first: Vec<u8>,
    /// What the single re-read found; empty if none was needed or nothing came
    pub late: Vec<u8>,
}

/// Serial channel over the bridge's emulated UART
///
/// One instance per physical device. `transact` holds an exclusive lock for
/// its whole duration; plain `send`/`receive` calls do not take it.
pub struct LvdsSerial<C: ControlChannel = DeviceNode> {
    channel: C,
    device_path: PathBuf,
    lock: Mutex<()>,
    start_timeout: Duration,
    settle: Duration,
    poll_interval: Duration,
}

impl LvdsSerial<DeviceNode> {
    /// Open the bridge device named in `config`
    pub fn open(config: &BridgeConfig) -> Result<Self, TransportError> {
        Self::new(DeviceNode::new(config.device_path.clone()), config)
    }
}

impl<C: ControlChannel> LvdsSerial<C> {
    /// Wrap `channel`, apply the configured baud rate and discard stale bytes
    pub fn new(channel: C, config: &BridgeConfig) -> Result<Self, TransportError> {
        config.validate()?;
        let serial = Self {
            channel,
            device_path: config.device_path.clone(),
            lock: Mutex::new(()),
            start_timeout: config.start_timeout(),
            settle: config.settle(),
            poll_interval: config.poll_interval(),
        };
        serial.set_baud(config.baud_rate)?;
        let stale = serial.receive(0)?;
        tracing::debug!(
            "bridge serial ready at {} baud, flushed {} stale bytes",
            config.baud_rate,
            stale.len()
        );
        Ok(serial)
    }

    /// Underlying control channel
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Device path from the configuration the channel was built with
    pub fn device_path(&self) -> &Path {
        &self.device_path
    }

    /// Release the control channel, e.g. to reopen at another baud rate
    pub fn into_inner(self) -> C {
        self.channel
    }

    /// Issue a control request whose argument only carries a length/value
    pub(crate) fn query(&self, request: ControlRequest, len: u32) -> Result<IoctlSerial, TransportError> {
        let mut arg = IoctlSerial::with_len(len);
        self.channel.call(request, &mut arg)?;
        tracing::trace!("{:?}({}) -> {}", request, len, arg.len);
        Ok(arg)
    }

    /// Queue `bytes` on the transmitter
    pub fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let max = self.channel.max_transfer();
        if bytes.len() > max {
            return Err(TransportError::MessageTooLarge {
                len: bytes.len(),
                max,
            });
        }
        let mut arg = IoctlSerial::with_data(bytes)?;
        self.channel.call(ControlRequest::SerialSendTx, &mut arg)?;
        tracing::trace!("tx {:02x?}", bytes);
        Ok(())
    }

    /// Read up to `max_count` buffered bytes (0 = everything buffered)
    ///
    /// Never waits for data; an empty result means nothing was buffered.
    /// Requests larger than one transfer are clamped.
    pub fn receive(&self, max_count: usize) -> Result<Vec<u8>, TransportError> {
        let count = max_count.min(self.channel.max_transfer());
        let mut arg = IoctlSerial::with_len(count as u32);
        self.channel.call(ControlRequest::SerialRecvRx, &mut arg)?;
        let bytes = arg.payload().to_vec();
        if !bytes.is_empty() {
            tracing::trace!("rx {:02x?}", bytes);
        }
        Ok(bytes)
    }

    /// Number of bytes waiting in the receive FIFO
    pub fn rx_count(&self) -> Result<usize, TransportError> {
        Ok(self.query(ControlRequest::SerialRxCount, 0)?.len as usize)
    }

    /// Last byte that landed in the receive FIFO
    pub fn rx_last_byte(&self) -> Result<u8, TransportError> {
        Ok(self.query(ControlRequest::SerialRxLast, 0)?.len as u8)
    }

    /// Decoded UART status flags
    pub fn status(&self) -> Result<UartStatus, TransportError> {
        Ok(UartStatus::from_word(
            self.query(ControlRequest::GetUartStatus, 0)?.len,
        ))
    }

    /// Change the emulated line rate. Do not call while a transaction is running.
    pub fn set_baud(&self, baud: u32) -> Result<(), TransportError> {
        if baud == 0 {
            return Err(TransportError::Config("baud rate must be non-zero".into()));
        }
        self.query(ControlRequest::SerialBaud, baud)?;
        Ok(())
    }

    /// Line rate currently programmed into the bridge
    pub fn get_baud(&self) -> Result<u32, TransportError> {
        Ok(self.query(ControlRequest::SerialBaud, 0)?.len)
    }

    /// Wait until a reply has arrived and gone quiet
    ///
    /// Returns `Ok(false)` if no byte arrived within `start_timeout`; that is
    /// a normal "device did not answer" outcome. Otherwise polls until the
    /// receive count has been stable for `settle` and returns `Ok(true)`.
    pub fn wait_for_quiet(&self, start_timeout: Duration, settle: Duration) -> Result<bool, TransportError> {
        let start = Instant::now();
        let mut count = loop {
            let n = self.rx_count()?;
            if n != 0 {
                break n;
            }
            if start.elapsed() >= start_timeout {
                return Ok(false);
            }
            std::thread::sleep(self.poll_interval);
        };

        let mut last_change = Instant::now();
        while last_change.elapsed() < settle {
            std::thread::sleep(self.poll_interval);
            let n = self.rx_count()?;
            if n != count {
                count = n;
                last_change = Instant::now();
            }
        }
        Ok(true)
    }

    /// Flush, send, wait for quiet and read back, as one exclusive unit
    pub fn transact_with(
        &self,
        message: &[u8],
        response_count: usize,
        start_timeout: Duration,
        settle: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        // Guards no data, so a panic in another holder leaves nothing torn.
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.exchange(message, response_count, start_timeout, settle)
    }

    /// [`transact`](Self::transact) plus at most one re-read, all under the lock
    pub fn transact_validated(
        &self,
        message: &[u8],
        reread_delay: Duration,
        accept: &dyn Fn(&[u8]) -> bool,
    ) -> Result<Reply, TransportError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let first = self.exchange(message, 0, self.start_timeout, self.settle)?;
        if first.is_empty() || accept(&first) {
            return Ok(Reply {
                first,
                late: Vec::new(),
            });
        }

        tracing::debug!(
            "transact: reply {:02x?} rejected, re-reading once in {}ms",
            first,
            reread_delay.as_millis()
        );
        std::thread::sleep(reread_delay);
        let late = self.receive(0)?;
        Ok(Reply { first, late })
    }

    /// Body of a transaction; callers hold the lock
    fn exchange(
        &self,
        message: &[u8],
        response_count: usize,
        start_timeout: Duration,
        settle: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let started = Instant::now();

        let stale = self.receive(0)?;
        if !stale.is_empty() {
            tracing::debug!("transact: discarded {} stale bytes: {:02x?}", stale.len(), stale);
        }

        self.send(message)?;
        let arrived = self.wait_for_quiet(start_timeout, settle)?;
        let response = self.receive(response_count)?;

        tracing::debug!(
            "transact: sent {:02x?}, received {} bytes in {}ms{}",
            message,
            response.len(),
            started.elapsed().as_millis(),
            if arrived { "" } else { " (no reply)" }
        );
        Ok(response)
    }

    /// [`transact_with`](Self::transact_with) using the configured timings
    pub fn transact(&self, message: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.transact_with(message, 0, self.start_timeout, self.settle)
    }
}

impl<C: ControlChannel> Transceiver for LvdsSerial<C> {
    fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        LvdsSerial::send(self, bytes)
    }

    fn receive(&self, max_count: usize) -> Result<Vec<u8>, TransportError> {
        LvdsSerial::receive(self, max_count)
    }

    fn transact(&self, message: &[u8]) -> Result<Vec<u8>, TransportError> {
        LvdsSerial::transact(self, message)
    }

    fn transact_with(
        &self,
        message: &[u8],
        response_count: usize,
        start_timeout: Duration,
        settle: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        LvdsSerial::transact_with(self, message, response_count, start_timeout, settle)
    }

    fn transact_validated(
        &self,
        message: &[u8],
        reread_delay: Duration,
        accept: &dyn Fn(&[u8]) -> bool,
    ) -> Result<Reply, TransportError> {
        LvdsSerial::transact_validated(self, message, reread_delay, accept)
    }

    fn max_transfer(&self) -> usize {
        self.channel.max_transfer()
    }
}

impl<C: ControlChannel + std::fmt::Debug> std::fmt::Debug for LvdsSerial<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LvdsSerial")
            .field("channel", &self.channel)
            .field("device_path", &self.device_path)
            .field("start_timeout", &self.start_timeout)
            .field("settle", &self.settle)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};

    /// Driver stand-in with a plain FIFO and a call log
    #[derive(Default)]
    struct FakeDriver {
        state: Mutex<FakeState>,
    }

    #[derive(Default)]
    struct FakeState {
        rx: VecDeque<u8>,
        baud: u32,
        registers: HashMap<ControlRequest, u32>,
        calls: Vec<ControlRequest>,
        fail: Option<ControlRequest>,
    }

    impl ControlChannel for FakeDriver {
        fn call(&self, request: ControlRequest, arg: &mut IoctlSerial) -> Result<(), TransportError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(request);
            if state.fail == Some(request) {
                return Err(TransportError::Control {
                    request: request.code(),
                    source: std::io::Error::from_raw_os_error(libc::EIO),
                });
            }
            match request {
                ControlRequest::SerialRecvRx => {
                    let want = if arg.len == 0 { usize::MAX } else { arg.len as usize };
                    let n = want.min(state.rx.len()).min(64);
                    for i in 0..n {
                        arg.data[i] = state.rx.pop_front().unwrap();
                    }
                    arg.len = n as u32;
                }
                ControlRequest::SerialRxCount => arg.len = state.rx.len() as u32,
                ControlRequest::SerialBaud => {
                    if arg.len != 0 {
                        state.baud = arg.len;
                    }
                    arg.len = state.baud;
                }
                ControlRequest::SerialSendTx => {}
                other => arg.len = state.registers.get(&other).copied().unwrap_or(0),
            }
            Ok(())
        }
    }

    fn fast_config() -> BridgeConfig {
        BridgeConfig {
            start_timeout_ms: 10,
            settle_ms: 6,
            poll_interval_ms: 1,
            ..BridgeConfig::default()
        }
    }

    #[test]
    fn test_new_sets_baud_then_flushes() {
        let driver = FakeDriver::default();
        driver.state.lock().unwrap().rx.extend([0xAA, 0xBB]);
        let serial = LvdsSerial::new(driver, &fast_config().with_baud_rate(57600)).unwrap();

        let state = serial.channel().state.lock().unwrap();
        assert_eq!(state.baud, 57600);
        assert!(state.rx.is_empty());
        assert_eq!(
            state.calls,
            vec![ControlRequest::SerialBaud, ControlRequest::SerialRecvRx]
        );
    }

    #[test]
    fn test_get_baud_reads_back() {
        let serial = LvdsSerial::new(FakeDriver::default(), &fast_config()).unwrap();
        serial.set_baud(115200).unwrap();
        assert_eq!(serial.get_baud().unwrap(), 115200);
    }

    #[test]
    fn test_zero_baud_rejected() {
        let serial = LvdsSerial::new(FakeDriver::default(), &fast_config()).unwrap();
        assert!(matches!(serial.set_baud(0), Err(TransportError::Config(_))));
    }

    #[test]
    fn test_send_too_large() {
        let serial = LvdsSerial::new(FakeDriver::default(), &fast_config()).unwrap();
        let err = serial.send(&[0u8; 65]).unwrap_err();
        assert!(matches!(err, TransportError::MessageTooLarge { len: 65, max: 64 }));
    }

    #[test]
    fn test_receive_limited_count() {
        let serial = LvdsSerial::new(FakeDriver::default(), &fast_config()).unwrap();
        serial.channel().state.lock().unwrap().rx.extend([1, 2, 3, 4]);
        assert_eq!(serial.receive(3).unwrap(), vec![1, 2, 3]);
        assert_eq!(serial.rx_count().unwrap(), 1);
        assert_eq!(serial.receive(0).unwrap(), vec![4]);
        assert!(serial.receive(0).unwrap().is_empty());
    }

    #[test]
    fn test_status_decoded() {
        let serial = LvdsSerial::new(FakeDriver::default(), &fast_config()).unwrap();
        serial
            .channel()
            .state
            .lock()
            .unwrap()
            .registers
            .insert(ControlRequest::GetUartStatus, 0x15);
        let status = serial.status().unwrap();
        assert!(status.rx_empty);
        assert!(status.tx_empty);
        assert!(status.rx_busy);
        assert!(!status.tx_busy);
    }

    #[test]
    fn test_wait_for_quiet_no_data() {
        let serial = LvdsSerial::new(FakeDriver::default(), &fast_config()).unwrap();
        let start = Instant::now();
        let arrived = serial
            .wait_for_quiet(Duration::from_millis(15), Duration::from_millis(5))
            .unwrap();
        assert!(!arrived);
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_wait_for_quiet_settles_on_stable_count() {
        let serial = LvdsSerial::new(FakeDriver::default(), &fast_config()).unwrap();
        serial.channel().state.lock().unwrap().rx.extend([0x01, 0x07]);
        let start = Instant::now();
        let arrived = serial
            .wait_for_quiet(Duration::from_millis(50), Duration::from_millis(8))
            .unwrap();
        assert!(arrived);
        assert!(start.elapsed() >= Duration::from_millis(8));
    }

    #[test]
    fn test_rx_count_failure_propagates() {
        let serial = LvdsSerial::new(FakeDriver::default(), &fast_config()).unwrap();
        serial.channel().state.lock().unwrap().fail = Some(ControlRequest::SerialRxCount);
        let err = serial
            .wait_for_quiet(Duration::from_millis(5), Duration::from_millis(5))
            .unwrap_err();
        assert_eq!(err.request(), Some(0x7603));
    }

    #[test]
    fn test_rx_last_byte() {
        let serial = LvdsSerial::new(FakeDriver::default(), &fast_config()).unwrap();
        serial
            .channel()
            .state
            .lock()
            .unwrap()
            .registers
            .insert(ControlRequest::SerialRxLast, 0x1F8);
        assert_eq!(serial.rx_last_byte().unwrap(), 0xF8);
        assert_eq!(
            serial.channel().state.lock().unwrap().calls.last(),
            Some(&ControlRequest::SerialRxLast)
        );
    }

    #[test]
    fn test_transact_without_reply_is_empty() {
        let serial = LvdsSerial::new(FakeDriver::default(), &fast_config()).unwrap();
        let reply = serial.transact(&[0x81, 0x09, 0x00, 0x02, 0xFF]).unwrap();
        assert!(reply.is_empty());
    }
}
