//! CRC-32 체크섬
//!
//! IEEE 다항식(0xEDB88320, reflected)을 사용하는 표준 CRC-32.
//! 입력은 길이가 아니라 첫 번째 0 바이트에서 끝난다: 0 바이트 이후 내용은 체크섬에 포함되지 않음.

/// 체크섬이 덮는 범위: 첫 번째 0 바이트 이전까지
pub fn covered(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}

/// 첫 번째 0 바이트 이전까지의 CRC-32
pub fn digest(bytes: &[u8]) -> u32 {
    crc32fast::hash(covered(bytes))
}

/// 체크섬 검증
pub fn verify(bytes: &[u8], expected: u32) -> bool {
    digest(bytes) == expected
}
