use log::debug;

use crate::transport::BusTransport;

/// 传感器输出的 16 位无符号原始力值，需结合校准参数才有意义
pub type RawReading = u16;

/// 力值数据寄存器
pub const FORCE_REGISTER: u8 = 0x06;

/// 选择寄存器与读取之间的间隔
pub const SELECT_TO_FETCH_MS: u32 = 10;

/// 选择 `register`，等待后读取两个字节 (高字节在前)。
///
/// 传输层错误原样返回，是否重试由调用方决定。
pub fn read_raw<T: BusTransport>(
    transport: &mut T,
    address: u8,
    register: u8,
) -> Result<RawReading, T::Error> {
    transport.write(address, &[register])?;
    transport.delay_ms(SELECT_TO_FETCH_MS);

    let mut data = [0u8; 2];
    transport.read_register(address, register, &mut data)?;
    let raw = u16::from_be_bytes(data);
    debug!("原始读数 {:#04x}: {:02x?} -> {}", address, data, raw);
    Ok(raw)
}
