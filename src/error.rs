use thiserror::Error;

use crate::address_change::ProtocolStep;
use crate::raw_reader::RawReading;

/// 负载读数等于零点偏移，无法计算灵敏度，需要重新采集。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("loaded reading {raw} equals the zero offset")]
pub struct DegenerateCalibration {
    pub raw: RawReading,
}

#[derive(Debug, Error)]
pub enum CalibrationError<E> {
    #[error(transparent)]
    Degenerate(#[from] DegenerateCalibration),
    #[error("raw read failed during calibration: {0:?}")]
    Transport(E),
}

/// EEPROM 读取响应缺少 0x5A 确认值。仅作提示，地址修改会继续使用返回的字。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("unexpected acknowledgement byte {received:#04x}, expected {expected:#04x}")]
pub struct UnexpectedAcknowledgement {
    pub received: u8,
    pub expected: u8,
}

#[derive(Debug, Error)]
pub enum ProtocolError<E> {
    /// 在任何总线通信之前拒绝
    #[error("address {0:#04x} does not fit in 7 bits")]
    InvalidAddress(u8),
    /// 总线通信失败，设备地址状态未知
    #[error("address change aborted during {step}: {cause:?}")]
    Aborted { step: ProtocolStep, cause: E },
    #[error("command frame codec error: {0}")]
    Codec(#[from] binrw::Error),
}

impl<E> ProtocolError<E> {
    /// 总线失败时所处的步骤
    pub fn failed_step(&self) -> Option<ProtocolStep> {
        match self {
            ProtocolError::Aborted { step, .. } => Some(*step),
            _ => None,
        }
    }
}
