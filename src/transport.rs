//! 总线传输层: 按寄存器寻址的 I²C 读写、传感器电源控制线以及协议步骤之间的阻塞延时。

use std::cell::RefCell;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;
use thiserror::Error;

/// 驱动所需的全部外部能力。
///
/// 实现均为阻塞式。多个传感器句柄通过 `&RefCell<T>` 共享传输层，由调用方保证串行访问。
pub trait BusTransport {
    type Error: core::fmt::Debug;

    /// 向 `address` 上的设备写入 `bytes`
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error>;

    /// 选择 `register` 并读回 `buf.len()` 字节 (重复起始条件)
    fn read_register(&mut self, address: u8, register: u8, buf: &mut [u8])
        -> Result<(), Self::Error>;

    /// 控制电源线，`false` 为断电
    fn set_power(&mut self, on: bool) -> Result<(), Self::Error>;

    fn delay_us(&mut self, us: u32);

    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.delay_us(1_000);
        }
    }
}

impl<T: BusTransport> BusTransport for &RefCell<T> {
    type Error = T::Error;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        self.borrow_mut().write(address, bytes)
    }

    fn read_register(
        &mut self,
        address: u8,
        register: u8,
        buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.borrow_mut().read_register(address, register, buf)
    }

    fn set_power(&mut self, on: bool) -> Result<(), Self::Error> {
        self.borrow_mut().set_power(on)
    }

    fn delay_us(&mut self, us: u32) {
        self.borrow_mut().delay_us(us)
    }

    fn delay_ms(&mut self, ms: u32) {
        self.borrow_mut().delay_ms(ms)
    }
}

/// [`HalTransport`] 的错误
#[derive(Debug, Error)]
pub enum HalError<I, P> {
    #[error("I2C transfer failed: {0:?}")]
    I2c(I),
    #[error("power pin update failed: {0:?}")]
    Pin(P),
}

/// 基于 `embedded-hal` 1.0 trait 的 [`BusTransport`] 实现
pub struct HalTransport<I2C, P, D> {
    i2c: I2C,
    power: P,
    delay: D,
}

impl<I2C, P, D> HalTransport<I2C, P, D>
where
    I2C: I2c,
    P: OutputPin,
    D: DelayNs,
{
    pub fn new(i2c: I2C, power: P, delay: D) -> Self {
        Self { i2c, power, delay }
    }

    /// 消耗自身并归还底层外设
    pub fn release(self) -> (I2C, P, D) {
        (self.i2c, self.power, self.delay)
    }
}

impl<I2C, P, D> BusTransport for HalTransport<I2C, P, D>
where
    I2C: I2c,
    P: OutputPin,
    D: DelayNs,
{
    type Error = HalError<I2C::Error, P::Error>;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        self.i2c.write(address, bytes).map_err(HalError::I2c)
    }

    fn read_register(
        &mut self,
        address: u8,
        register: u8,
        buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.i2c
            .write_read(address, &[register], buf)
            .map_err(HalError::I2c)
    }

    fn set_power(&mut self, on: bool) -> Result<(), Self::Error> {
        if on {
            self.power.set_high().map_err(HalError::Pin)
        } else {
            self.power.set_low().map_err(HalError::Pin)
        }
    }

    fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us)
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms)
    }
}
