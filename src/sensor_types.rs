use crate::data_models::ForceSample;

// 传感器事件 (采样线程 -> 主循环)
#[derive(Debug)]
pub enum SensorEvent {
    Sample(ForceSample),
    ReadFailed { address: u8, reason: String },
}
