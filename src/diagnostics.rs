//! 总线自检: 检查这些地址上的传感器是否正常工作。

use log::{info, warn};

use crate::data_models::{SanityReport, SanityVerdict};
use crate::raw_reader::{read_raw, RawReading};
use crate::transport::BusTransport;

/// 设备缺失或未上电时读数平均值停留的数值
pub const STUCK_PATTERNS: [RawReading; 2] = [0xC000, 0xFFFF];

/// 从每个地址读取 `register` 的 `samples` 个值并判定传感器状态。
///
/// 读取失败记为 `None`，不影响后续采样。同一传感器两次采样之间等待 `interval_ms`。
pub fn sanity_check<T: BusTransport>(
    transport: &mut T,
    addresses: &[u8],
    register: u8,
    samples: usize,
    interval_ms: u32,
) -> Vec<SanityReport> {
    addresses
        .iter()
        .map(|&address| {
            info!("检查传感器 {:#04x}", address);
            let mut readings = Vec::with_capacity(samples);
            for i in 0..samples {
                if i > 0 {
                    transport.delay_ms(interval_ms);
                }
                match read_raw(transport, address, register) {
                    Ok(raw) => readings.push(Some(raw)),
                    Err(e) => {
                        warn!("读取 {:#04x} 失败: {:?}", address, e);
                        readings.push(None);
                    }
                }
            }

            let verdict = judge(&readings);
            match verdict {
                SanityVerdict::Works => info!("[PASS] {:#04x} 工作正常", address),
                _ => warn!("[FAIL] {:#04x}: {:?}", address, verdict),
            }
            SanityReport {
                address,
                readings,
                verdict,
            }
        })
        .collect()
}

/// 根据单个传感器的读数给出判定
pub fn judge(readings: &[Option<RawReading>]) -> SanityVerdict {
    let values: Option<Vec<RawReading>> = readings.iter().copied().collect();
    let values = match values {
        Some(v) if !v.is_empty() => v,
        _ => return SanityVerdict::NoValues,
    };

    let sum: u64 = values.iter().map(|&v| u64::from(v)).sum();
    let count = values.len() as u64;
    if STUCK_PATTERNS
        .iter()
        .any(|&pattern| sum == u64::from(pattern) * count)
    {
        SanityVerdict::BadValues { first: values[0] }
    } else {
        SanityVerdict::Works
    }
}
