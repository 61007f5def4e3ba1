use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::raw_reader::RawReading;

bitflags! {
    /// EEPROM word 02 字段布局
    pub struct Word02Fields: u16 {
        const RESERVED_LOW = 0x0007;   // bits 2:0, copied through
        const ADDRESS = 0x03F8;        // bits 9:3, 7-bit bus address
        const PROTOCOL = 0x1C00;       // bits 12:10, protocol-mode tag
        const RESERVED_HIGH = 0x8000;  // bit 15, copied through
        const PRESERVED = Self::RESERVED_LOW.bits | Self::RESERVED_HIGH.bits;
    }
}

/// EEPROM 配置字 02，保存 I2C 地址
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EepromWord02(pub u16);

impl EepromWord02 {
    /// 与新地址一同写入的协议模式标记
    pub const PROTOCOL_TAG: u16 = 0b011;

    pub fn address(self) -> u8 {
        ((self.0 & Word02Fields::ADDRESS.bits()) >> 3) as u8
    }

    pub fn protocol_tag(self) -> u8 {
        ((self.0 & Word02Fields::PROTOCOL.bits()) >> 10) as u8
    }

    /// 保留保留位，替换地址与协议标记
    pub fn with_address(self, new_address: u8) -> Self {
        let address = (u16::from(new_address) << 3) & Word02Fields::ADDRESS.bits();
        Self((self.0 & Word02Fields::PRESERVED.bits()) | address | (Self::PROTOCOL_TAG << 10))
    }
}

// 力值采样 (发布到 MQTT)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceSample {
    pub timestamp: DateTime<Utc>,
    pub address: u8,
    pub raw: RawReading,
    pub force_newtons: f32,
}

impl ForceSample {
    pub fn now(address: u8, raw: RawReading, force_newtons: f32) -> Self {
        Self {
            timestamp: Utc::now(),
            address,
            raw,
            force_newtons,
        }
    }
}

/// 单个地址的自检结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SanityVerdict {
    Works,
    /// 至少一次读取失败
    NoValues,
    /// 读数停留在设备缺失或未上电时的固定值
    BadValues { first: RawReading },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanityReport {
    pub address: u8,
    pub readings: Vec<Option<RawReading>>,
    pub verdict: SanityVerdict,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_follows_mask_formula() {
        let word = EepromWord02(0x1234);
        let expected = (0x1234 & 0x8007) | (0x2A << 3) | (0b011 << 10);
        assert_eq!(word.with_address(0x2A), EepromWord02(expected));
        assert_eq!(word.with_address(0x2A), EepromWord02(0x0D54));
    }

    #[test]
    fn patch_preserves_reserved_bits_only() {
        let patched = EepromWord02(0xFFFF).with_address(0x00);
        assert_eq!(patched, EepromWord02(0x8007 | 0x0C00));
        assert_eq!(patched.address(), 0x00);
        assert_eq!(patched.protocol_tag(), 0b011);
    }

    #[test]
    fn address_and_tag_read_back() {
        let patched = EepromWord02(0x5A47).with_address(0x11);
        assert_eq!(patched.address(), 0x11);
        assert_eq!(patched.protocol_tag(), 0b011);
        assert_eq!(patched.0 & 0x8007, 0x5A47 & 0x8007);
    }

    #[test]
    fn field_masks_do_not_overlap() {
        assert!((Word02Fields::ADDRESS & Word02Fields::PROTOCOL).is_empty());
        assert!((Word02Fields::ADDRESS & Word02Fields::PRESERVED).is_empty());
        assert_eq!(Word02Fields::PRESERVED.bits(), 0x8007);
    }
}
