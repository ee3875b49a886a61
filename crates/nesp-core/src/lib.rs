//! # NESP Core Library
//!
//! Control library for New Era syringe pumps (NE-1000 family, also sold
//! as Aladdin / LA) over a serial link.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Encoding and decoding of the pump's ASCII command protocol
//! - Safe mode (CRC-16 framed) communication
//! - A pump session tracking idle / running / alarm state
//! - Blocking and non-blocking runs with status polling
//!
//! ## Example
//!
//! ```rust,ignore
//! use nesp_core::prelude::*;
//!
//! let mut pump = Pump::open("/dev/ttyUSB0", PumpConfig::default())?;
//! pump.set_diameter(30.0)?;
//! pump.set_direction(PumpingDirection::Infuse)?;
//! pump.set_volume(1.0)?;
//! pump.set_rate(20.0)?;
//!
//! // Start without waiting, then poll
//! pump.run(false)?;
//! while pump.running()? {
//!     std::thread::sleep(std::time::Duration::from_millis(100));
//! }
//! ```

pub mod protocol;
pub mod pump;
pub mod units;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::protocol::{list_ports, SerialTransport, Transport};
    pub use crate::pump::{
        Alarm, Identity, Pump, PumpConfig, PumpError, PumpStatus, PumpingDirection,
        SessionState, Setting,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
