use std::thread;
use std::time::Duration;

use linux_embedded_hal::sysfs_gpio::Direction;
use linux_embedded_hal::{Delay, I2cdev, SysfsPin};
use log::{debug, error, info};
use tokio::sync::mpsc;

use super::config::AppConfig;
use super::data_models::ForceSample;
use super::sensor::SensorHandle;
use super::sensor_types::SensorEvent;
use super::transport::{BusTransport, HalTransport};

/// 基于 Linux `i2c-dev` 和 sysfs GPIO 电源线的传输层
pub type LinuxTransport = HalTransport<I2cdev, SysfsPin, Delay>;

// 打开 I2C 总线并导出电源控制引脚
pub fn open_linux_transport(
    config: &AppConfig,
) -> Result<LinuxTransport, Box<dyn std::error::Error + Send + Sync>> {
    let i2c = I2cdev::new(&config.i2c_bus)?;
    info!("已打开 I2C 总线 {}", config.i2c_bus);

    let power = SysfsPin::new(config.power_pin);
    power.export()?;
    // 导出后保持传感器上电
    power.set_direction(Direction::High)?;
    info!("电源控制引脚 GPIO {} 已就绪", config.power_pin);

    Ok(HalTransport::new(i2c, power, Delay))
}

/// 阻塞式采样循环，在独立线程中运行，直到 `event_tx` 的接收端被丢弃。
pub fn sensor_task<T: BusTransport>(
    mut sensor: SensorHandle<T>,
    interval: Duration,
    event_tx: mpsc::Sender<SensorEvent>,
) {
    let address = sensor.address();
    info!("采样任务启动: {:#04x}, 间隔 {:?}", address, interval);
    loop {
        let event = match sensor.read_raw() {
            Ok(raw) => {
                let force = sensor.calibration().force_from_raw(raw);
                debug!("{:#04x}: raw = {}, force = {:.2} N", address, raw, force);
                SensorEvent::Sample(ForceSample::now(address, raw, force))
            }
            Err(e) => {
                error!("读取 {:#04x} 失败: {:?}", address, e);
                SensorEvent::ReadFailed {
                    address,
                    reason: format!("{:?}", e),
                }
            }
        };

        if event_tx.blocking_send(event).is_err() {
            info!("事件通道关闭，采样任务退出。");
            return;
        }
        thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::FakeTransport;

    #[test]
    fn emits_samples_until_receiver_is_dropped() {
        let bus = FakeTransport::with_replies(&[&[0x00, 0x96], &[0x00, 0xC8]]);
        let mut sensor = SensorHandle::new(bus, 0x28);
        sensor.calibration_mut().set_manual(100, 2.0);

        let (tx, mut rx) = mpsc::channel(1);
        let worker = thread::spawn(move || sensor_task(sensor, Duration::from_millis(1), tx));

        match rx.blocking_recv() {
            Some(SensorEvent::Sample(sample)) => {
                assert_eq!(sample.address, 0x28);
                assert_eq!(sample.raw, 150);
                assert_eq!(sample.force_newtons, 100.0);
            }
            other => panic!("unexpected event {other:?}"),
        }
        match rx.blocking_recv() {
            Some(SensorEvent::Sample(sample)) => assert_eq!(sample.force_newtons, 200.0),
            other => panic!("unexpected event {other:?}"),
        }
        // replies exhausted: the fake bus now fails every fetch
        assert!(matches!(
            rx.blocking_recv(),
            Some(SensorEvent::ReadFailed { address: 0x28, .. })
        ));

        drop(rx);
        worker.join().unwrap();
    }
}
