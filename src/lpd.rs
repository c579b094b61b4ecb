//! `lpd`
//!
//! The delivery client: hands the finished job to the device over the
//! classic line-printer daemon protocol.
//!
//! The protocol is a stepwise handshake of single-byte commands and
//! single-byte status replies (0 = success): select a queue, announce and
//! send a control file, announce the data file, stream the job bytes.
//! Only the initial connect is retried; any mid-transfer rejection is
//! fatal. The remote spooler's final acknowledgment after the data stream
//! is deliberately not awaited.

use std::env;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::error::{DeliveryError, ProtocolStep};
use crate::job::PrintJob;

/// TCP port of the line-printer daemon service.
pub const LPD_PORT: u16 = 515;

/// Maximum total wait for a connection before giving up.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(300);

/// Pause between connection attempts.
const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Ceiling on a single resolve-and-connect attempt, so one hung call
/// cannot eat the whole retry budget.
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(60);

/// A source of time, injectable so the retry deadline is testable
/// without wall-clock waits.
pub trait Clock {
    /// The current instant.
    fn now(&self) -> Instant;
    /// Blocks for the given duration.
    fn sleep(&self, duration: Duration);
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// The spool-file identity of one job.
#[derive(Debug, Clone)]
pub struct JobTicket {
    /// Queue to select on the device.
    pub queue: String,
    /// Job name, used in the spool file names and shown to operators.
    pub name: String,
    /// Submitting user.
    pub user: String,
    /// Hostname the job originates from.
    pub origin: String,
}

impl JobTicket {
    /// Builds a ticket from the job configuration and the local hostname.
    pub fn from_job(job: &PrintJob) -> Self {
        JobTicket {
            queue: job.queue.clone(),
            name: job.name.clone(),
            user: job.user.clone(),
            origin: local_hostname(),
        }
    }

    /// The composed control file: originating host, owner, job name, the
    /// print directive for the data file, its unlink record and the
    /// source file name.
    fn control_file(&self) -> String {
        format!(
            "H{origin}\nP{user}\nJ{name}\nldfA{name}{origin}\nUdfA{name}{origin}\nN{name}\n",
            origin = self.origin,
            user = self.user,
            name = self.name,
        )
    }

    /// The data file name shared by the control records and the data
    /// transfer command.
    fn data_file_name(&self) -> String {
        format!("dfA{}{}", self.name, self.origin)
    }

    /// The control file name used in the transfer command.
    fn control_file_name(&self) -> String {
        format!("cfA{}{}", self.name, self.origin)
    }
}

/// First label of the local hostname, falling back to `localhost`.
pub fn local_hostname() -> String {
    env::var("HOSTNAME")
        .ok()
        .and_then(|name| name.split('.').next().map(str::to_owned))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| String::from("localhost"))
}

/// A connection-retrying line-printer protocol client for one device.
#[derive(Debug)]
pub struct LpdClient<C: Clock = SystemClock> {
    host: String,
    max_wait: Duration,
    clock: C,
}

impl LpdClient<SystemClock> {
    /// Creates a client for the given device host with the default
    /// connect-retry budget.
    pub fn new(host: &str) -> Self {
        LpdClient {
            host: host.to_owned(),
            max_wait: DEFAULT_MAX_WAIT,
            clock: SystemClock,
        }
    }
}

impl<C: Clock> LpdClient<C> {
    /// Creates a client with an explicit retry budget and clock.
    pub fn with_clock(host: &str, max_wait: Duration, clock: C) -> Self {
        LpdClient {
            host: host.to_owned(),
            max_wait,
            clock,
        }
    }

    /// Delivers a finished job to the device.
    ///
    /// # Arguments
    /// * `ticket`: The job's spool identity.
    /// * `data`: The framed job bytes.
    ///
    /// # Returns
    /// `Ok(())` once the job bytes have been streamed; the connection is
    /// then closed without waiting for the spooler's final acknowledgment.
    ///
    /// # Errors
    /// [`DeliveryError`] on connect-retry exhaustion, a rejected handshake
    /// step, or a mid-transfer I/O failure.
    pub fn send(&self, ticket: &JobTicket, data: &[u8]) -> Result<(), DeliveryError> {
        let mut stream = self.connect()?;
        self.transfer(&mut stream, ticket, data)?;
        info!("job '{}': {} bytes sent to {}", ticket.name, data.len(), self.host);
        Ok(())
    }

    /// Connects to the device, retrying once per second until the retry
    /// budget is exhausted.
    fn connect(&self) -> Result<TcpStream, DeliveryError> {
        let host = self.host.clone();
        self.connect_with(move |attempt_timeout| dial(&host, attempt_timeout))
    }

    /// The retry loop around an arbitrary dialing function.
    ///
    /// The deadline is checked explicitly against the injected clock; each
    /// attempt is handed the remaining budget, capped at the per-attempt
    /// ceiling.
    fn connect_with<S>(
        &self,
        mut dial: impl FnMut(Duration) -> io::Result<S>,
    ) -> Result<S, DeliveryError> {
        let deadline = self.clock.now() + self.max_wait;
        loop {
            let remaining = deadline.saturating_duration_since(self.clock.now());
            if remaining.is_zero() {
                return Err(DeliveryError::ConnectTimeout {
                    host: self.host.clone(),
                    waited_secs: self.max_wait.as_secs(),
                });
            }
            match dial(remaining.min(ATTEMPT_TIMEOUT)) {
                Ok(stream) => return Ok(stream),
                Err(error) => warn!("connect to {} failed: {error}", self.host),
            }
            self.clock.sleep(RETRY_INTERVAL);
        }
    }

    /// Runs the handshake and streams the job over an open connection.
    fn transfer<S: Read + Write>(
        &self,
        stream: &mut S,
        ticket: &JobTicket,
        data: &[u8],
    ) -> Result<(), DeliveryError> {
        // Receive-job command: select the queue.
        stream.write_all(format!("\x02{}\n", ticket.queue).as_bytes())?;
        self.expect_ack(stream, ProtocolStep::QueueSelect)?;

        let control = ticket.control_file();
        debug!("control file for {}:\n{control}", self.host);
        stream.write_all(
            format!("\x02{} {}\n", control.len(), ticket.control_file_name()).as_bytes(),
        )?;
        self.expect_ack(stream, ProtocolStep::ControlHeader)?;

        stream.write_all(control.as_bytes())?;
        stream.write_all(&[0])?;
        self.expect_ack(stream, ProtocolStep::ControlFile)?;

        stream
            .write_all(format!("\x03{} {}\n", data.len(), ticket.data_file_name()).as_bytes())?;
        self.expect_ack(stream, ProtocolStep::DataHeader)?;

        stream.write_all(data)?;
        stream.flush()?;
        Ok(())
    }

    /// Reads one status byte and fails on anything non-zero.
    fn expect_ack<S: Read>(&self, stream: &mut S, step: ProtocolStep) -> Result<(), DeliveryError> {
        let mut status = [0u8; 1];
        stream.read_exact(&mut status)?;
        if status[0] != 0 {
            return Err(DeliveryError::Rejected {
                host: self.host.clone(),
                step,
                status: status[0],
            });
        }
        Ok(())
    }
}

/// Resolves the device host and attempts one connection to each of its
/// addresses within the given timeout.
fn dial(host: &str, timeout: Duration) -> io::Result<TcpStream> {
    let addrs = (host, LPD_PORT).to_socket_addrs()?;
    let mut last = io::Error::new(io::ErrorKind::AddrNotAvailable, "host has no addresses");
    for addr in addrs {
        debug!("trying to connect to {addr}");
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(error) => last = error,
        }
    }
    Err(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::VecDeque;

    /// A clock that only advances when slept on.
    struct FakeClock {
        now: Cell<Instant>,
    }

    impl FakeClock {
        fn new() -> Self {
            FakeClock {
                now: Cell::new(Instant::now()),
            }
        }
    }

    impl Clock for &FakeClock {
        fn now(&self) -> Instant {
            self.now.get()
        }

        fn sleep(&self, duration: Duration) {
            self.now.set(self.now.get() + duration);
        }
    }

    /// A stream with scripted status replies that records what was sent.
    struct ScriptedStream {
        replies: VecDeque<u8>,
        written: Vec<u8>,
    }

    impl ScriptedStream {
        fn new(replies: &[u8]) -> Self {
            ScriptedStream {
                replies: replies.iter().copied().collect(),
                written: Vec::new(),
            }
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.replies.pop_front() {
                Some(byte) if !buf.is_empty() => {
                    buf[0] = byte;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn ticket() -> JobTicket {
        JobTicket {
            queue: String::from("Legend"),
            name: String::from("badge"),
            user: String::from("kiln"),
            origin: String::from("workshop"),
        }
    }

    fn client(clock: &FakeClock) -> LpdClient<&FakeClock> {
        LpdClient::with_clock("laser.local", Duration::from_secs(5), clock)
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|window| window == needle)
    }

    #[test]
    fn test_transfer_streams_the_whole_handshake() {
        let clock = FakeClock::new();
        let lpd = client(&clock);
        let mut stream = ScriptedStream::new(&[0, 0, 0, 0]);
        let data = b"\x1b%-12345Xjob";

        lpd.transfer(&mut stream, &ticket(), data).unwrap();

        assert!(stream.written.starts_with(b"\x02Legend\n"));
        assert!(contains(&stream.written, b"\x0266 cfAbadgeworkshop\n"));
        assert!(contains(
            &stream.written,
            b"Hworkshop\nPkiln\nJbadge\nldfAbadgeworkshop\nUdfAbadgeworkshop\nNbadge\n\x00"
        ));
        assert!(contains(&stream.written, b"\x0312 dfAbadgeworkshop\n"));
        assert!(stream.written.ends_with(data));
    }

    #[test]
    fn test_rejected_queue_select_aborts_immediately() {
        let clock = FakeClock::new();
        let lpd = client(&clock);
        let mut stream = ScriptedStream::new(&[1]);

        let error = lpd.transfer(&mut stream, &ticket(), b"job").unwrap_err();
        match error {
            DeliveryError::Rejected { step, status, host } => {
                assert_eq!(step, ProtocolStep::QueueSelect);
                assert_eq!(status, 1);
                assert_eq!(host, "laser.local");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(
            !contains(&stream.written, b"cfA"),
            "nothing past the rejected step is sent"
        );
    }

    #[test]
    fn test_rejected_data_header_streams_no_job_bytes() {
        let clock = FakeClock::new();
        let lpd = client(&clock);
        let mut stream = ScriptedStream::new(&[0, 0, 0, 0x20]);
        let data = b"JOBBYTES";

        let error = lpd.transfer(&mut stream, &ticket(), data).unwrap_err();
        match error {
            DeliveryError::Rejected { step, status, .. } => {
                assert_eq!(step, ProtocolStep::DataHeader);
                assert_eq!(status, 0x20);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(contains(&stream.written, b"\x038 dfAbadgeworkshop\n"));
        assert!(!contains(&stream.written, data));
    }

    #[test]
    fn test_rejected_control_file_names_the_step() {
        let clock = FakeClock::new();
        let lpd = client(&clock);
        let mut stream = ScriptedStream::new(&[0, 0, 7]);

        let error = lpd.transfer(&mut stream, &ticket(), b"job").unwrap_err();
        match error {
            DeliveryError::Rejected { step, .. } => {
                assert_eq!(step, ProtocolStep::ControlFile);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!contains(&stream.written, b"dfA"), "data header never sent");
    }

    #[test]
    fn test_connect_retries_until_the_deadline() {
        let clock = FakeClock::new();
        let lpd = client(&clock);
        let mut attempts = 0;

        let error = lpd
            .connect_with(|_| -> io::Result<()> {
                attempts += 1;
                Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
            })
            .unwrap_err();

        match error {
            DeliveryError::ConnectTimeout { host, waited_secs } => {
                assert_eq!(host, "laser.local");
                assert_eq!(waited_secs, 5);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(attempts, 5, "one attempt per second of budget");
    }

    #[test]
    fn test_connect_succeeds_mid_retry() {
        let clock = FakeClock::new();
        let lpd = client(&clock);
        let mut attempts = 0;

        let result = lpd.connect_with(|_| {
            attempts += 1;
            if attempts < 3 {
                Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
            } else {
                Ok(())
            }
        });

        assert!(result.is_ok());
        assert_eq!(attempts, 3);
    }

    #[test]
    fn test_attempts_are_capped_by_remaining_budget() {
        let clock = FakeClock::new();
        let lpd = client(&clock);
        let mut timeouts = Vec::new();

        let _ = lpd.connect_with(|timeout| -> io::Result<()> {
            timeouts.push(timeout);
            Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"))
        });

        assert_eq!(timeouts[0], Duration::from_secs(5), "budget below ceiling");
        assert_eq!(timeouts[4], Duration::from_secs(1), "last second remaining");
    }
}
