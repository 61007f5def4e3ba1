//! FX29 力传感器驱动与守护进程。
//!
//! ```text
//! SensorHandle ──read_force──> raw_reader ──> CalibrationModel
//!      │
//!      └──change_address──> address_change ──> BusTransport (I2C + power pin)
//! ```
//!
//! 守护进程以下的部分均为阻塞、单线程。一个传输层可以通过 `&RefCell<T>` 服务多个句柄。

pub mod address_change;
pub mod binrw_impls;
pub mod calibration;
pub mod config;
pub mod data_models;
pub mod diagnostics;
pub mod error;
pub mod mqtt_handlers;
pub mod raw_reader;
pub mod sensor;
pub mod sensor_handlers;
pub mod sensor_types;
pub mod transport;
pub mod utils;

pub use address_change::{change_address, AddressChangeReport, ProtocolStep};
pub use calibration::CalibrationModel;
pub use data_models::{EepromWord02, ForceSample, SanityReport, SanityVerdict};
pub use diagnostics::sanity_check;
pub use error::{CalibrationError, DegenerateCalibration, ProtocolError, UnexpectedAcknowledgement};
pub use raw_reader::{read_raw, RawReading};
pub use sensor::SensorHandle;
pub use transport::{BusTransport, HalError, HalTransport};
