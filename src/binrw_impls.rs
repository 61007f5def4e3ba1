use std::io::Cursor;

use binrw::{BinRead, BinResult, BinWrite};

use super::data_models::EepromWord02;

/// 命令帧长度: 命令字节 + 2 字节负载
pub const COMMAND_FRAME_LEN: usize = 3;

/// EEPROM 读取响应首字节应为此确认值
pub const EEPROM_ACK: u8 = 0x5A;

/// 读取 EEPROM 响应的寄存器
pub const EEPROM_REPLY_REGISTER: u8 = 0x00;

// 命令模式指令: 命令字节 + 2 字节负载 (高字节在前)
#[derive(BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[bw(big)]
pub enum Command {
    #[bw(magic = b"\xA0\x00\x00")]
    StartCommandMode,
    #[bw(magic = b"\x02\x00\x00")]
    ReadWord02,
    #[bw(magic = 0x42u8)]
    WriteWord02(u16),
    #[bw(magic = b"\x80\x00\x00")]
    StartNormalMode,
}

impl Command {
    /// 序列化为总线上写出的字节
    pub fn encode(&self) -> BinResult<[u8; COMMAND_FRAME_LEN]> {
        let mut frame = [0u8; COMMAND_FRAME_LEN];
        let mut writer = Cursor::new(&mut frame[..]);
        self.write_be(&mut writer)?;
        Ok(frame)
    }
}

/// [`Command::ReadWord02`] 的 3 字节响应: `[ack, _, word_low]`
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EepromReply {
    pub ack: u8,
    pub unused: u8,
    pub low: u8,
}

impl EepromReply {
    pub const LEN: usize = 3;

    pub fn parse(bytes: &[u8; Self::LEN]) -> BinResult<Self> {
        Self::read_be(&mut Cursor::new(bytes))
    }

    pub fn is_acknowledged(&self) -> bool {
        self.ack == EEPROM_ACK
    }

    /// 字的高字节为首字节，低字节为末字节，中间字节不参与
    pub fn word(&self) -> EepromWord02 {
        EepromWord02(u16::from_be_bytes([self.ack, self.low]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_payload_commands() {
        assert_eq!(Command::StartCommandMode.encode().unwrap(), [0xA0, 0x00, 0x00]);
        assert_eq!(Command::ReadWord02.encode().unwrap(), [0x02, 0x00, 0x00]);
        assert_eq!(Command::StartNormalMode.encode().unwrap(), [0x80, 0x00, 0x00]);
    }

    #[test]
    fn write_word_is_high_byte_first() {
        assert_eq!(
            Command::WriteWord02(0x0D54).encode().unwrap(),
            [0x42, 0x0D, 0x54]
        );
    }

    #[test]
    fn write_word_carries_patched_eeprom_word() {
        let word = EepromWord02(0x1234).with_address(0x2A);
        assert_eq!(
            Command::WriteWord02(word.0).encode().unwrap(),
            [0x42, 0x0D, 0x54]
        );
    }

    #[test]
    fn every_command_is_one_frame_long() {
        for command in [
            Command::StartCommandMode,
            Command::ReadWord02,
            Command::WriteWord02(0xFFFF),
            Command::StartNormalMode,
        ] {
            let mut out = Cursor::new(Vec::new());
            command.write_be(&mut out).unwrap();
            assert_eq!(out.into_inner().len(), COMMAND_FRAME_LEN);
        }
    }

    #[test]
    fn reply_word_skips_middle_byte() {
        let reply = EepromReply::parse(&[0x5A, 0xFF, 0x47]).unwrap();
        assert!(reply.is_acknowledged());
        assert_eq!(reply.word(), EepromWord02(0x5A47));
    }

    #[test]
    fn reply_with_wrong_ack() {
        let reply = EepromReply::parse(&[0x00, 0x01, 0x02]).unwrap();
        assert!(!reply.is_acknowledged());
        assert_eq!(reply.word(), EepromWord02(0x0002));
    }
}
