//! 에러 타입 정의

use thiserror::Error;

/// netcomm 프로토콜 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("직렬화 에러: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("잘못된 프레임: {len} 바이트 (헤더보다 짧음)")]
    MalformedFrame { len: usize },

    #[error("알 수 없는 프레임 타입: {0}")]
    UnknownFrameType(u8),

    #[error("체크섬 불일치: expected {expected:08X}, got {actual:08X}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("응답 타임아웃: sequence={sequence}, attempts={attempts}")]
    Timeout { sequence: i16, attempts: u32 },

    #[error("예상하지 못한 응답 타입: {0}")]
    UnexpectedReplyType(u8),

    #[error("서버가 무결성 오류 보고: sequence={sequence}")]
    IntegrityFatal { sequence: i16 },

    #[error("재전송 한도 초과: sequence={sequence}, attempts={attempts}")]
    ResendLimitExceeded { sequence: i16, attempts: u32 },

    #[error("메시지 길이 초과: {len} > {max}")]
    MessageTooLong { len: usize, max: usize },

    #[error("메시지에 0 바이트 포함: offset={offset}")]
    EmbeddedZero { offset: usize },

    #[error("유효하지 않은 설정: {0}")]
    InvalidConfig(String),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
