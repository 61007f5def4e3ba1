//! 单个 I2C 地址上的传感器。

use log::{info, warn};
use uom::si::f32::Force;
use uom::si::force::newton;

use crate::address_change::{self, AddressChangeReport};
use crate::calibration::CalibrationModel;
use crate::error::{CalibrationError, ProtocolError};
use crate::raw_reader::{self, RawReading, FORCE_REGISTER};
use crate::transport::BusTransport;

/// 传感器出厂默认地址
pub const DEFAULT_ADDRESS: u8 = 0x28;

/// 一个物理传感器: I2C 地址、传输层和校准参数。
///
/// 句柄的地址在其生命周期内不变。[`SensorHandle::change_address`] 成功后，
/// 需用新地址创建新句柄。多个传感器共享总线时，传入 `&RefCell<T>` 作为传输层。
pub struct SensorHandle<T> {
    transport: T,
    address: u8,
    register: u8,
    calibration: CalibrationModel,
}

impl<T> SensorHandle<T>
where
    T: BusTransport,
{
    pub fn new(transport: T, address: u8) -> Self {
        Self::with_register(transport, address, FORCE_REGISTER)
    }

    /// 指定力值寄存器创建句柄
    pub fn with_register(transport: T, address: u8, register: u8) -> Self {
        Self {
            transport,
            address,
            register,
            calibration: CalibrationModel::default(),
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn calibration(&self) -> &CalibrationModel {
        &self.calibration
    }

    pub fn calibration_mut(&mut self) -> &mut CalibrationModel {
        &mut self.calibration
    }

    /// 消耗句柄并归还传输层
    pub fn release(self) -> T {
        self.transport
    }

    pub fn read_raw(&mut self) -> Result<RawReading, T::Error> {
        raw_reader::read_raw(&mut self.transport, self.address, self.register)
    }

    /// 校准后的力值，读取失败时返回 `None`
    pub fn read_force(&mut self) -> Option<Force> {
        match self.read_raw() {
            Ok(raw) => Some(Force::new::<newton>(self.calibration.force_from_raw(raw))),
            Err(e) => {
                warn!("读取 {:#04x} 力值失败: {:?}", self.address, e);
                None
            }
        }
    }

    /// 两点校准。
    ///
    /// `zero_capture` 在传感器空载后返回，`load_capture` 在负载稳定后返回施加的
    /// 力 (牛顿)。每次回调后句柄读取一次原始值。只有整个流程成功才会更新校准参数。
    pub fn calibrate<Z, L>(
        &mut self,
        zero_capture: Z,
        load_capture: L,
    ) -> Result<(), CalibrationError<T::Error>>
    where
        Z: FnOnce(),
        L: FnOnce() -> f32,
    {
        let mut candidate = self.calibration;

        zero_capture();
        let zero = self.read_raw().map_err(CalibrationError::Transport)?;
        candidate.begin_zero_capture(zero);

        let known_force = load_capture();
        let loaded = self.read_raw().map_err(CalibrationError::Transport)?;
        candidate.complete_with_known_load(loaded, known_force)?;

        info!(
            "{:#04x} 校准完成: zero_offset = {}, sensitivity = {}",
            self.address,
            candidate.zero_offset(),
            candidate.sensitivity()
        );
        self.calibration = candidate;
        Ok(())
    }

    /// 将此传感器的地址改为 `new_address`
    pub fn change_address(
        &mut self,
        new_address: u8,
    ) -> Result<AddressChangeReport, ProtocolError<T::Error>> {
        address_change::change_address(&mut self.transport, self.address, new_address)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::error::DegenerateCalibration;
    use crate::transport::fake::{FakeBusError, FakeTransport, Op};

    #[test]
    fn read_force_applies_calibration() {
        let bus = FakeTransport::with_replies(&[&[0x00, 0x96]]);
        let mut sensor = SensorHandle::new(bus, DEFAULT_ADDRESS);
        sensor.calibration_mut().set_manual(100, 2.0);

        let force = sensor.read_force().unwrap();
        assert_eq!(force.get::<newton>(), 100.0);
    }

    #[test]
    fn read_force_is_none_on_bus_failure() {
        let mut bus = FakeTransport::default();
        bus.fail_at = Some(0);
        let mut sensor = SensorHandle::new(bus, DEFAULT_ADDRESS);
        assert!(sensor.read_force().is_none());
    }

    #[test]
    fn zero_force_is_some() {
        let bus = FakeTransport::with_replies(&[&[0x03, 0xE8]]);
        let mut sensor = SensorHandle::new(bus, DEFAULT_ADDRESS);
        sensor.calibration_mut().set_manual(1000, 0.5);
        assert_eq!(sensor.read_force().map(|f| f.get::<newton>()), Some(0.0));
    }

    #[test]
    fn calibrate_reads_after_each_capture() {
        // 1000 unloaded, 1500 under 50 N, then 2000
        let bus = FakeTransport::with_replies(&[&[0x03, 0xE8], &[0x05, 0xDC], &[0x07, 0xD0]]);
        let mut sensor = SensorHandle::new(bus, DEFAULT_ADDRESS);

        let mut zero_prompts = 0;
        sensor
            .calibrate(|| zero_prompts += 1, || 50.0)
            .unwrap();

        assert_eq!(zero_prompts, 1);
        assert_eq!(sensor.calibration().zero_offset(), 1000);
        assert!((sensor.calibration().sensitivity() - 0.1).abs() < 1e-6);
        let force = sensor.read_force().unwrap().get::<newton>();
        assert!((force - 100.0).abs() < 1e-3);
    }

    #[test]
    fn degenerate_calibration_keeps_previous_model() {
        let bus = FakeTransport::with_replies(&[&[0x03, 0xE8], &[0x03, 0xE8]]);
        let mut sensor = SensorHandle::new(bus, DEFAULT_ADDRESS);
        sensor.calibration_mut().set_manual(7, 3.0);

        let err = sensor.calibrate(|| (), || 10.0).unwrap_err();
        assert!(matches!(
            err,
            CalibrationError::Degenerate(DegenerateCalibration { raw: 1000 })
        ));
        assert_eq!(*sensor.calibration(), CalibrationModel::new(7, 3.0));
    }

    #[test]
    fn calibration_read_failure_is_transport_error() {
        let mut bus = FakeTransport::with_replies(&[&[0x03, 0xE8]]);
        // select + fetch for zero succeed, loaded select fails
        bus.fail_at = Some(2);
        let mut sensor = SensorHandle::new(bus, DEFAULT_ADDRESS);

        let err = sensor.calibrate(|| (), || 10.0).unwrap_err();
        assert!(matches!(err, CalibrationError::Transport(FakeBusError)));
        assert_eq!(*sensor.calibration(), CalibrationModel::IDENTITY);
    }

    #[test]
    fn change_address_targets_current_address() {
        let bus = FakeTransport::with_replies(&[&[0x5A, 0x00, 0x47]]);
        let mut sensor = SensorHandle::new(bus, 0x28);

        let report = sensor.change_address(0x31).unwrap();
        assert_eq!(report.old_address, 0x28);
        assert_eq!(report.new_address, 0x31);
        assert_eq!(sensor.address(), 0x28);

        let bus = sensor.release();
        assert!(bus.ops.iter().all(|op| match op {
            Op::Write(address, _) | Op::Read(address, _, _) => *address == 0x28,
            _ => true,
        }));
    }

    #[test]
    fn handles_share_one_bus() {
        let bus = RefCell::new(FakeTransport::with_replies(&[&[0x00, 0x0A], &[0x00, 0x14]]));
        let mut left = SensorHandle::new(&bus, 0x11);
        let mut right = SensorHandle::new(&bus, 0x12);

        assert_eq!(left.read_raw(), Ok(10));
        assert_eq!(right.read_raw(), Ok(20));
        assert_eq!(
            bus.borrow().io_ops(),
            vec![
                Op::Write(0x11, vec![0x06]),
                Op::Read(0x11, 0x06, 2),
                Op::Write(0x12, vec![0x06]),
                Op::Read(0x12, 0x06, 2),
            ]
        );
    }
}
