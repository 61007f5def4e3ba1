use std::num::ParseIntError;

// 解析十六进制地址, 允许 "0x" 前缀
pub fn parse_hex_u8(input: &str) -> Result<u8, ParseIntError> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u8::from_str_radix(digits, 16)
}

// 逗号分隔的地址列表, 例如 "0x11, 0x12,31"
pub fn parse_hex_list(input: &str) -> Result<Vec<u8>, ParseIntError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_hex_u8)
        .collect()
}
