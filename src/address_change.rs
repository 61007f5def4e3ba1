//! I2C 地址重编程。
//!
//! 传感器没有"设置地址"寄存器。地址保存在 EEPROM word 02 中，只能在命令模式下
//! 访问，而命令模式只能在上电后的短窗口 (约 6 ms) 内进入:
//!
//! ```text
//! power cycle -> 0xA0 (enter) -> 0x02 (stage word 02) -> fetch [ack, _, lo]
//!   -> patch -> 0x42 hi lo (write) -> 0x80 (exit) -> power cycle
//! ```
//!
//! 设备唯一的反馈是读取响应中的确认字节，因此没有总线错误的完整流程即视为成功。
//! 总线错误会立即终止流程，不做任何回滚。

use core::fmt;

use log::{debug, info, warn};

use crate::binrw_impls::{Command, EepromReply, EEPROM_ACK, EEPROM_REPLY_REGISTER};
use crate::data_models::EepromWord02;
use crate::error::{ProtocolError, UnexpectedAcknowledgement};
use crate::transport::BusTransport;

/// 7 位 I2C 地址上限
pub const MAX_ADDRESS: u8 = 0x7F;

/// 断电保持的最短时间
pub const POWER_OFF_MS: u32 = 100;
/// 上电后的稳定时间，必须在命令模式窗口之内
pub const POWER_ON_SETTLE_US: u32 = 100;
/// 每条命令写入后的等待时间
pub const COMMAND_DELAY_MS: u32 = 10;

/// 地址修改的各个步骤 (按执行顺序)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolStep {
    PowerCycle,
    EnterCommandMode,
    RequestEepromWord,
    FetchEepromWord,
    PatchWord,
    WriteEepromWord,
    ExitCommandMode,
    FinalPowerCycle,
}

impl ProtocolStep {
    pub const ALL: [ProtocolStep; 8] = [
        ProtocolStep::PowerCycle,
        ProtocolStep::EnterCommandMode,
        ProtocolStep::RequestEepromWord,
        ProtocolStep::FetchEepromWord,
        ProtocolStep::PatchWord,
        ProtocolStep::WriteEepromWord,
        ProtocolStep::ExitCommandMode,
        ProtocolStep::FinalPowerCycle,
    ];

    /// 步骤序号 (从 1 开始)
    pub fn number(self) -> usize {
        self as usize + 1
    }
}

impl fmt::Display for ProtocolStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolStep::PowerCycle => "power cycle",
            ProtocolStep::EnterCommandMode => "enter command mode",
            ProtocolStep::RequestEepromWord => "request EEPROM word 02",
            ProtocolStep::FetchEepromWord => "fetch EEPROM word 02",
            ProtocolStep::PatchWord => "patch EEPROM word 02",
            ProtocolStep::WriteEepromWord => "write EEPROM word 02",
            ProtocolStep::ExitCommandMode => "exit command mode",
            ProtocolStep::FinalPowerCycle => "final power cycle",
        };
        write!(f, "step {} ({})", self.number(), name)
    }
}

/// 地址修改完成后的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressChangeReport {
    pub old_address: u8,
    pub new_address: u8,
    pub word_read: EepromWord02,
    pub word_written: EepromWord02,
    /// 读取响应缺少 0x5A 确认值时设置
    pub ack_warning: Option<UnexpectedAcknowledgement>,
}

/// 将 `old_address` 上的传感器改为 `new_address`。
///
/// 阻塞约 0.25 秒。开始后不得中断: 未完成的命令模式交互会使设备地址处于未知状态。
pub fn change_address<T: BusTransport>(
    transport: &mut T,
    old_address: u8,
    new_address: u8,
) -> Result<AddressChangeReport, ProtocolError<T::Error>> {
    for address in [old_address, new_address] {
        if address > MAX_ADDRESS {
            return Err(ProtocolError::InvalidAddress(address));
        }
    }
    info!("开始修改 I2C 地址: {:#04x} -> {:#04x}", old_address, new_address);

    power_cycle(transport).map_err(abort(ProtocolStep::PowerCycle))?;

    send(transport, old_address, Command::StartCommandMode, ProtocolStep::EnterCommandMode)?;
    send(transport, old_address, Command::ReadWord02, ProtocolStep::RequestEepromWord)?;

    let mut data = [0u8; EepromReply::LEN];
    transport
        .read_register(old_address, EEPROM_REPLY_REGISTER, &mut data)
        .map_err(abort(ProtocolStep::FetchEepromWord))?;
    let reply = EepromReply::parse(&data)?;
    debug!("EEPROM word 02 响应: {:02x?}", data);

    let ack_warning = if reply.is_acknowledged() {
        None
    } else {
        let warning = UnexpectedAcknowledgement {
            received: reply.ack,
            expected: EEPROM_ACK,
        };
        warn!("{}", warning);
        Some(warning)
    };

    let word_read = reply.word();
    let word_written = word_read.with_address(new_address);
    debug!(
        "{}: {:#06x} -> {:#06x}",
        ProtocolStep::PatchWord,
        word_read.0,
        word_written.0
    );

    send(transport, old_address, Command::WriteWord02(word_written.0), ProtocolStep::WriteEepromWord)?;
    send(transport, old_address, Command::StartNormalMode, ProtocolStep::ExitCommandMode)?;

    power_cycle(transport).map_err(abort(ProtocolStep::FinalPowerCycle))?;

    info!("I2C 地址已从 {:#04x} 修改为 {:#04x}", old_address, new_address);
    Ok(AddressChangeReport {
        old_address,
        new_address,
        word_read,
        word_written,
        ack_warning,
    })
}

/// 断电 [`POWER_OFF_MS`]，重新上电并等待 [`POWER_ON_SETTLE_US`]。
///
/// 重新打开命令模式的进入窗口。
pub fn power_cycle<T: BusTransport>(transport: &mut T) -> Result<(), T::Error> {
    transport.set_power(false)?;
    transport.delay_ms(POWER_OFF_MS);
    transport.set_power(true)?;
    transport.delay_us(POWER_ON_SETTLE_US);
    Ok(())
}

fn send<T: BusTransport>(
    transport: &mut T,
    address: u8,
    command: Command,
    step: ProtocolStep,
) -> Result<(), ProtocolError<T::Error>> {
    let frame = command.encode()?;
    debug!("{}: {:02x?} -> {:#04x}", step, frame, address);
    transport.write(address, &frame).map_err(abort(step))?;
    transport.delay_ms(COMMAND_DELAY_MS);
    Ok(())
}

fn abort<E>(step: ProtocolStep) -> impl FnOnce(E) -> ProtocolError<E> {
    move |cause| ProtocolError::Aborted { step, cause }
}
