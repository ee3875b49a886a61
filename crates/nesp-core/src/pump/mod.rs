//! Pump session
//!
//! A [`Pump`] owns the transport to one pump, sequences codec calls over
//! it, and tracks whether the pump is idle, running, or halted by an alarm.
//!
//! Running state is never inferred from local bookkeeping alone: `running`,
//! `status` and the wait loop always issue a fresh status query, so a
//! syringe that emptied or stalled since the last call is seen at once.

mod config;
mod error;
mod types;

pub use config::{PumpConfig, DEFAULT_POLL_INTERVAL_MS};
pub use error::PumpError;
pub use types::{
    Alarm, FirmwareVersion, Identity, PumpAddress, PumpConfiguration, PumpStatus,
    PumpingDirection, SessionState, MAX_ADDRESS,
};

use std::time::{Duration, Instant};

use crate::protocol::{
    codec::{self, DecodedResponse, Dispensed, Reply},
    packet, Command, ProtocolError, SerialTransport, Transport, REPLY_TERMINATOR,
};
use crate::units;

/// A configuration change applied through [`Pump::configure`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setting {
    /// Syringe inside diameter in millimeters
    Diameter(f64),
    /// Infuse or withdraw
    Direction(PumpingDirection),
    /// Volume to pump in milliliters
    Volume(f64),
    /// Pumping rate in milliliters per minute
    Rate(f64),
}

/// Session with a single pump
pub struct Pump<T: Transport = SerialTransport> {
    transport: T,
    address: PumpAddress,
    timeout: Duration,
    poll_interval: Duration,
    /// Frames are sent and received as CRC packets
    safe_mode: bool,
    state: SessionState,
    last_status: Option<PumpStatus>,
    configuration: PumpConfiguration,
    identity: Option<Identity>,
}

impl Pump<SerialTransport> {
    /// Open a serial port and connect to the pump on it
    pub fn open(port_name: &str, config: PumpConfig) -> Result<Self, PumpError> {
        let transport = SerialTransport::open(port_name, Some(config.baud_rate))?;
        Self::connect(transport, config)
    }
}

impl<T: Transport> Pump<T> {
    /// Create a session without talking to the pump
    ///
    /// The pump is assumed to be in basic mode. Use [`Pump::connect`] to
    /// apply the configured safe mode and verify the pump identity.
    pub fn new(transport: T, config: &PumpConfig) -> Result<Self, PumpError> {
        Ok(Self {
            transport,
            address: PumpAddress::new(config.address)?,
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
            safe_mode: false,
            state: SessionState::Idle,
            last_status: None,
            configuration: PumpConfiguration::default(),
            identity: None,
        })
    }

    /// Create a session and perform the handshake
    ///
    /// Applies the configured safe mode timeout, then queries and caches the
    /// pump identity. A power-on reset alarm on the first exchange is
    /// acknowledged and the exchange repeated once.
    pub fn connect(transport: T, config: PumpConfig) -> Result<Self, PumpError> {
        let mut pump = Self::new(transport, &config)?;

        // The pump accepts a safe-mode packet in either mode
        let seconds = config.safe_mode_timeout;
        match pump.apply_safe_mode(seconds, true) {
            Err(PumpError::Protocol(ProtocolError::Alarm(Alarm::Reset))) => {
                tracing::info!(address = %pump.address, "pump was reset, acknowledging");
                pump.state = SessionState::Idle;
                pump.apply_safe_mode(seconds, true)?;
            }
            other => other?,
        }

        let identity = pump.identity()?.clone();
        if let Some(expected) = config.expected_model {
            if identity.model != expected {
                return Err(PumpError::IdentityMismatch {
                    expected,
                    actual: identity.model,
                });
            }
        }
        tracing::info!(
            address = %pump.address,
            model = %identity.model,
            firmware = %identity.firmware,
            safe_mode = pump.safe_mode,
            "connected to pump"
        );
        Ok(pump)
    }

    pub fn address(&self) -> PumpAddress {
        self.address
    }

    /// Current state machine state (no I/O)
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Status decoded from the most recent reply (no I/O)
    pub fn last_status(&self) -> Option<PumpStatus> {
        self.last_status
    }

    /// Configuration acknowledged by the pump so far (no I/O)
    pub fn configuration(&self) -> &PumpConfiguration {
        &self.configuration
    }

    pub fn is_safe_mode(&self) -> bool {
        self.safe_mode
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// End the session and release the port
    ///
    /// The pump keeps running if it was started; call [`Pump::stop`] first
    /// to halt it.
    pub fn close(self) {
        tracing::debug!(address = %self.address, state = %self.state, "closing session");
        drop(self.transport);
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    /// Model and firmware, queried once and cached for the session
    pub fn identity(&mut self) -> Result<&Identity, PumpError> {
        let identity = match self.identity.take() {
            Some(identity) => identity,
            None => {
                let payload = self.transceive(&Command::QueryVersion)?;
                codec::parse_identity(&payload)?
            }
        };
        Ok(self.identity.insert(identity))
    }

    /// Model number, e.g. "1000" for an NE-1000
    pub fn model_number(&mut self) -> Result<&str, PumpError> {
        Ok(&self.identity()?.model)
    }

    pub fn firmware_version(&mut self) -> Result<FirmwareVersion, PumpError> {
        Ok(self.identity()?.firmware)
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Apply a configuration change
    ///
    /// Only allowed while idle. The local copy is updated only after the
    /// pump acknowledges; values that cannot be encoded fail before any I/O.
    pub fn configure(&mut self, setting: Setting) -> Result<(), PumpError> {
        self.require_idle("configure")?;

        match setting {
            Setting::Diameter(mm) => {
                self.transceive(&Command::SetDiameter(mm))?;
                self.configuration.diameter_mm = Some(mm);
            }
            Setting::Direction(direction) => {
                self.transceive(&Command::SetDirection(direction))?;
                self.configuration.direction = Some(direction);
            }
            Setting::Volume(ml) => {
                let (value, unit) = units::volume_setting(ml)?;
                self.transceive(&Command::SetVolumeUnit(unit))?;
                self.transceive(&Command::SetVolume(value.value()))?;
                self.configuration.volume_ml = Some(unit.to_milliliters(value.value()));
            }
            Setting::Rate(ml_per_min) => {
                let (value, unit) = units::rate_setting(ml_per_min)?;
                self.transceive(&Command::SetRate(value.value(), unit))?;
                self.configuration.rate_ml_per_min =
                    Some(unit.to_milliliters_per_minute(value.value()));
            }
        }
        tracing::debug!(address = %self.address, ?setting, "configuration acknowledged");
        Ok(())
    }

    pub fn set_diameter(&mut self, mm: f64) -> Result<(), PumpError> {
        self.configure(Setting::Diameter(mm))
    }

    pub fn set_direction(&mut self, direction: PumpingDirection) -> Result<(), PumpError> {
        self.configure(Setting::Direction(direction))
    }

    pub fn set_volume(&mut self, ml: f64) -> Result<(), PumpError> {
        self.configure(Setting::Volume(ml))
    }

    pub fn set_rate(&mut self, ml_per_min: f64) -> Result<(), PumpError> {
        self.configure(Setting::Rate(ml_per_min))
    }

    /// Syringe diameter in millimeters, read from the pump
    pub fn diameter(&mut self) -> Result<f64, PumpError> {
        let payload = self.transceive(&Command::QueryDiameter)?;
        let mm = codec::parse_number(&payload)?;
        self.configuration.diameter_mm = Some(mm);
        Ok(mm)
    }

    /// Pumping direction, read from the pump
    pub fn direction(&mut self) -> Result<PumpingDirection, PumpError> {
        let payload = self.transceive(&Command::QueryDirection)?;
        let direction = codec::parse_direction(&payload)?;
        self.configuration.direction = Some(direction);
        Ok(direction)
    }

    /// Pumping volume in milliliters, read from the pump
    pub fn volume(&mut self) -> Result<f64, PumpError> {
        let payload = self.transceive(&Command::QueryVolume)?;
        let ml = codec::parse_volume(&payload)?;
        self.configuration.volume_ml = Some(ml);
        Ok(ml)
    }

    /// Pumping rate in mL/min, read from the pump
    pub fn rate(&mut self) -> Result<f64, PumpError> {
        let payload = self.transceive(&Command::QueryRate)?;
        let ml_per_min = codec::parse_rate(&payload)?;
        self.configuration.rate_ml_per_min = Some(ml_per_min);
        Ok(ml_per_min)
    }

    /// Safe mode timeout in seconds (0 = basic mode), read from the pump
    pub fn safe_mode_timeout(&mut self) -> Result<u8, PumpError> {
        let payload = self.transceive(&Command::QuerySafeMode)?;
        payload.parse::<u8>().map_err(|_| {
            ProtocolError::Malformed(format!("bad safe mode timeout {:?}", payload)).into()
        })
    }

    /// Switch between basic mode (0) and safe mode (1-255 seconds)
    pub fn set_safe_mode_timeout(&mut self, seconds: u8) -> Result<(), PumpError> {
        self.require_idle("change safe mode")?;
        self.apply_safe_mode(seconds, self.safe_mode)
    }

    fn apply_safe_mode(&mut self, seconds: u8, send_safe: bool) -> Result<(), PumpError> {
        let safe_mode = seconds != 0;
        // The reply already uses the new framing
        let response = self.exchange(&Command::SetSafeMode(seconds), send_safe, safe_mode)?;
        self.accept(response)?;
        if safe_mode != self.safe_mode {
            tracing::debug!(address = %self.address, safe_mode, "communication mode changed");
        }
        self.safe_mode = safe_mode;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Dispensed volume
    // ------------------------------------------------------------------

    /// Volume infused since the counter was cleared, in milliliters
    pub fn volume_infused(&mut self) -> Result<f64, PumpError> {
        Ok(self.dispensed()?.infused_ml)
    }

    /// Volume withdrawn since the counter was cleared, in milliliters
    pub fn volume_withdrawn(&mut self) -> Result<f64, PumpError> {
        Ok(self.dispensed()?.withdrawn_ml)
    }

    pub fn dispensed(&mut self) -> Result<Dispensed, PumpError> {
        let payload = self.transceive(&Command::QueryDispensed)?;
        Ok(codec::parse_dispensed(&payload)?)
    }

    pub fn clear_volume_infused(&mut self) -> Result<(), PumpError> {
        self.clear_dispensed(PumpingDirection::Infuse)
    }

    pub fn clear_volume_withdrawn(&mut self) -> Result<(), PumpError> {
        self.clear_dispensed(PumpingDirection::Withdraw)
    }

    fn clear_dispensed(&mut self, direction: PumpingDirection) -> Result<(), PumpError> {
        self.require_not_alarmed("clear dispensed volume")?;
        self.transceive(&Command::ClearDispensed(direction))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Run control
    // ------------------------------------------------------------------

    /// Start pumping with the configured direction, volume and rate
    ///
    /// With `blocking`, polls until the pump stops before returning. Without
    /// it, returns as soon as the pump acknowledges and the session stays
    /// `Running` until [`Pump::running`] or [`Pump::wait_while_running`]
    /// observe the stop.
    ///
    /// `RUN` is not idempotent: if the reply is lost (timeout) the pump may
    /// nevertheless be running. Check [`Pump::running`] before retrying.
    pub fn run(&mut self, blocking: bool) -> Result<(), PumpError> {
        self.require_idle("run")?;
        self.transceive(&Command::Run)?;
        self.transition(SessionState::Running);

        if blocking {
            self.wait_while_running()?;
        }
        Ok(())
    }

    /// Pump at maximum rate in the configured direction until stopped
    pub fn run_purge(&mut self) -> Result<(), PumpError> {
        self.require_idle("purge")?;
        self.transceive(&Command::Purge)?;
        self.transition(SessionState::Running);
        Ok(())
    }

    /// Stop pumping and clear an alarm
    ///
    /// `STP` is sent in every state, so a pump started behind the
    /// session's back (a lost `RUN` reply, or running before connect) is
    /// halted too. If the pump still reports an alarm the session stays in
    /// `Error` and the alarm is returned.
    pub fn stop(&mut self) -> Result<(), PumpError> {
        self.transceive(&Command::Stop)?;
        self.transition(SessionState::Idle);
        Ok(())
    }

    /// Query the current status
    pub fn status(&mut self) -> Result<PumpStatus, PumpError> {
        let response = self.exchange(&Command::QueryStatus, self.safe_mode, self.safe_mode)?;
        let status = response.status;
        self.accept(response)?;
        self.observe(status);
        Ok(status)
    }

    /// Whether the pump is running right now (issues a status query)
    pub fn running(&mut self) -> Result<bool, PumpError> {
        let status = self.status()?;
        Ok(status.is_running() && self.state == SessionState::Running)
    }

    /// Poll until the pump is no longer running
    ///
    /// Returns the first non-running status. An alarm moves the session to
    /// `Error` and is returned as an error.
    pub fn wait_while_running(&mut self) -> Result<PumpStatus, PumpError> {
        loop {
            let status = self.status()?;
            if !status.is_running() {
                return Ok(status);
            }
            self.pause();
        }
    }

    /// Like [`Pump::wait_while_running`] but gives up after `limit`
    ///
    /// Returns `Ok(true)` if the pump stopped, `Ok(false)` if it was still
    /// running when the limit elapsed.
    pub fn wait_while_running_for(&mut self, limit: Duration) -> Result<bool, PumpError> {
        let deadline = Instant::now() + limit;
        loop {
            if !self.status()?.is_running() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            self.pause();
        }
    }

    // ------------------------------------------------------------------
    // State machine
    // ------------------------------------------------------------------

    fn pause(&self) {
        if !self.poll_interval.is_zero() {
            std::thread::sleep(self.poll_interval);
        }
    }

    fn require_idle(&self, operation: &'static str) -> Result<(), PumpError> {
        match self.state {
            SessionState::Idle => Ok(()),
            state => Err(PumpError::InvalidState { operation, state }),
        }
    }

    fn require_not_alarmed(&self, operation: &'static str) -> Result<(), PumpError> {
        match self.state {
            SessionState::Error => Err(PumpError::InvalidState {
                operation,
                state: SessionState::Error,
            }),
            _ => Ok(()),
        }
    }

    fn transition(&mut self, state: SessionState) {
        if self.state != state {
            tracing::debug!(address = %self.address, from = %self.state, to = %state, "state change");
            self.state = state;
        }
    }

    /// Fold a freshly queried status into the session state
    fn observe(&mut self, status: PumpStatus) {
        let state = self.state;
        match state {
            SessionState::Error => {}
            _ if status.is_running() => self.transition(SessionState::Running),
            SessionState::Running => self.transition(SessionState::Idle),
            SessionState::Idle => {}
        }
    }

    fn enter_alarm(&mut self, alarm: Alarm) {
        tracing::warn!(address = %self.address, %alarm, "pump alarm");
        self.last_status = Some(PumpStatus::Alarm(alarm));
        self.transition(SessionState::Error);
    }

    // ------------------------------------------------------------------
    // Framing
    // ------------------------------------------------------------------

    /// Send a command in the current mode and return its payload
    fn transceive(&mut self, command: &Command) -> Result<String, PumpError> {
        let response = self.exchange(command, self.safe_mode, self.safe_mode)?;
        self.accept(response)
    }

    /// Turn a reply into its payload, surfacing refusals
    fn accept(&self, response: DecodedResponse) -> Result<String, PumpError> {
        match response.reply {
            Reply::Data(payload) => Ok(payload),
            Reply::Ignored => {
                tracing::debug!(address = %self.address, "command ignored by pump");
                Ok(String::new())
            }
            Reply::Rejected(error) => {
                tracing::warn!(address = %self.address, %error, "command rejected");
                Err(PumpError::DeviceRejected(error))
            }
        }
    }

    /// One request/response round trip
    fn exchange(
        &mut self,
        command: &Command,
        send_safe: bool,
        receive_safe: bool,
    ) -> Result<DecodedResponse, PumpError> {
        let frame = if send_safe {
            packet::encode(self.address, command)?
        } else {
            codec::encode(self.address, command)?
        };

        self.transport.clear_input()?;
        tracing::debug!(
            address = %self.address,
            ?command,
            frame = ?String::from_utf8_lossy(&frame),
            "sending"
        );
        self.transport.write_all(&frame)?;

        let decoded = if receive_safe {
            let mut raw = self.transport.read_exact(packet::HEADER_SIZE, self.timeout)?;
            let remaining = packet::remaining_length(&raw)?;
            raw.extend(self.transport.read_exact(remaining, self.timeout)?);
            tracing::debug!(reply = ?raw, "received");
            packet::decode_frame(&raw)?
        } else {
            let raw = self.transport.read_until(REPLY_TERMINATOR, self.timeout)?;
            tracing::debug!(reply = ?String::from_utf8_lossy(&raw), "received");
            codec::decode_frame(&raw)?
        };

        // A reply from another unit on the bus must not touch this session
        if decoded.address != self.address.value() {
            return Err(ProtocolError::AddressMismatch {
                expected: self.address.value(),
                actual: decoded.address,
            }
            .into());
        }
        if let PumpStatus::Alarm(alarm) = decoded.status {
            self.enter_alarm(alarm);
            return Err(ProtocolError::Alarm(alarm).into());
        }
        self.last_status = Some(decoded.status);
        Ok(decoded)
    }
}
