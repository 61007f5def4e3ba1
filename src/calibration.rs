//! 原始读数的两点线性校准。
//!
//! `force = (raw - zero_offset) * sensitivity`

use crate::error::DegenerateCalibration;
use crate::raw_reader::RawReading;

/// 零点偏移 (原始值) 与灵敏度 (每个原始计数对应的牛顿数)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationModel {
    zero_offset: i32,
    sensitivity: f32,
}

impl CalibrationModel {
    /// 恒等映射: 原始值直接作为力值
    pub const IDENTITY: Self = Self {
        zero_offset: 0,
        sensitivity: 1.0,
    };

    pub const fn new(zero_offset: i32, sensitivity: f32) -> Self {
        Self {
            zero_offset,
            sensitivity,
        }
    }

    pub fn zero_offset(&self) -> i32 {
        self.zero_offset
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    /// 记录空载时的读数
    pub fn begin_zero_capture(&mut self, raw: RawReading) {
        self.zero_offset = i32::from(raw);
    }

    /// 根据 `known_force` 下的读数计算灵敏度。
    ///
    /// 负载读数与零点相同时返回错误，模型保持不变。
    pub fn complete_with_known_load(
        &mut self,
        raw_loaded: RawReading,
        known_force: f32,
    ) -> Result<(), DegenerateCalibration> {
        let delta = i32::from(raw_loaded) - self.zero_offset;
        if delta == 0 {
            return Err(DegenerateCalibration { raw: raw_loaded });
        }
        self.sensitivity = known_force / delta as f32;
        Ok(())
    }

    #[inline]
    pub fn force_from_raw(&self, raw: RawReading) -> f32 {
        (i32::from(raw) - self.zero_offset) as f32 * self.sensitivity
    }

    /// 直接设置已知的校准参数
    pub fn set_manual(&mut self, zero_offset: i32, sensitivity: f32) {
        self.zero_offset = zero_offset;
        self.sensitivity = sensitivity;
    }
}

impl Default for CalibrationModel {
    fn default() -> Self {
        Self::IDENTITY
    }
}
