//! 프레임 정의와 와이어 인코딩
//!
//! 와이어 레이아웃 (little-endian, 패딩 없음):
//!
//! ```text
//! offset  size  field
//! 0       4     checksum   payload의 CRC-32 (첫 0 바이트까지)
//! 4       2     sequence   단편 순번 (0 = 무시, init = 1, 마지막 단편 = 512)
//! 6       1     type       FrameType 태그
//! 7       ..    payload    최대 1451 바이트
//! ```
//!
//! 제어 프레임(init, keepalive, 서버 응답)은 0으로 채워 64바이트 고정 크기로 전송한다.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::checksum;
use crate::{
    Error, Result, HEADER_SIZE, INIT_SEQUENCE, LAST_FRAGMENT_SEQUENCE, PAYLOAD_CAPACITY,
    REPLY_SIZE,
};

/// 프레임 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// 수신 확인
    Ack = 0,

    /// 재전송 요청 (체크섬 불일치)
    Resend = 1,

    /// 세션 유지
    Keepalive = 2,

    /// 무결성 오류 (재전송 한도 초과, 복구 불가)
    IntegrityFatal = 3,

    /// 세션 초기화
    Init = 4,

    /// 진단용 오류 주입 프레임
    Diagnostic = 8,

    /// 메시지 단편
    Data = 10,

    /// 메시지 끝
    LastFragment = 16,
}

impl FrameType {
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// 64바이트 고정 크기로 보내는 제어 프레임인지
    pub fn is_control(self) -> bool {
        matches!(
            self,
            FrameType::Ack
                | FrameType::Resend
                | FrameType::Keepalive
                | FrameType::IntegrityFatal
                | FrameType::Init
        )
    }

    /// 체크섬 검증 대상 프레임인지
    pub fn carries_data(self) -> bool {
        matches!(self, FrameType::Data | FrameType::Diagnostic)
    }
}

impl TryFrom<u8> for FrameType {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(FrameType::Ack),
            1 => Ok(FrameType::Resend),
            2 => Ok(FrameType::Keepalive),
            3 => Ok(FrameType::IntegrityFatal),
            4 => Ok(FrameType::Init),
            8 => Ok(FrameType::Diagnostic),
            10 => Ok(FrameType::Data),
            16 => Ok(FrameType::LastFragment),
            other => Err(Error::UnknownFrameType(other)),
        }
    }
}

/// 고정 헤더 (bincode fixint little-endian 직렬화 시 정확히 7바이트)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    pub checksum: u32,
    pub sequence: i16,
    pub kind: u8,
}

/// 프레임 (전송 단위)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// payload의 CRC-32, 데이터 프레임에서만 의미 있음
    pub checksum: u32,

    /// 단편 순번
    pub sequence: i16,

    /// 프레임 타입
    pub kind: FrameType,

    /// 페이로드
    pub payload: Bytes,
}

impl Frame {
    /// 체크섬 없는 프레임 생성
    pub fn new(kind: FrameType, sequence: i16, payload: Bytes) -> Self {
        Self {
            checksum: 0,
            sequence,
            kind,
            payload,
        }
    }

    /// 데이터 프레임 생성 (체크섬 자동 계산)
    pub fn data(sequence: i16, payload: Bytes) -> Self {
        Self {
            checksum: checksum::digest(&payload),
            sequence,
            kind: FrameType::Data,
            payload,
        }
    }

    pub fn init() -> Self {
        Self::new(FrameType::Init, INIT_SEQUENCE, Bytes::new())
    }

    pub fn keepalive() -> Self {
        Self::new(FrameType::Keepalive, INIT_SEQUENCE, Bytes::new())
    }

    /// 메시지 끝 프레임. 시퀀스는 순번이 아니라 고정 마커
    pub fn last_fragment() -> Self {
        Self::new(FrameType::LastFragment, LAST_FRAGMENT_SEQUENCE, Bytes::new())
    }

    /// 서버 응답 프레임 (응답 대상 프레임의 시퀀스를 그대로 돌려줌)
    pub fn reply(kind: FrameType, sequence: i16) -> Self {
        Self::new(kind, sequence, Bytes::new())
    }

    /// 체크섬을 고의로 1 틀리게 만든 진단 프레임
    pub fn diagnostic(sequence: i16, payload: Bytes) -> Self {
        Self {
            checksum: checksum::digest(&payload).wrapping_add(1),
            sequence,
            kind: FrameType::Diagnostic,
            payload,
        }
    }

    pub fn header(&self) -> FrameHeader {
        FrameHeader {
            checksum: self.checksum,
            sequence: self.sequence,
            kind: self.kind.tag(),
        }
    }

    /// 체크섬 검증
    pub fn verify_checksum(&self) -> bool {
        checksum::verify(&self.payload, self.checksum)
    }

    /// 체크섬 검증, 불일치면 기대값/계산값을 담은 에러
    pub fn verify(&self) -> Result<()> {
        let actual = self.computed_checksum();
        if actual != self.checksum {
            return Err(Error::ChecksumMismatch {
                expected: self.checksum,
                actual,
            });
        }
        Ok(())
    }

    /// 수신측이 계산한 체크섬
    pub fn computed_checksum(&self) -> u32 {
        checksum::digest(&self.payload)
    }

    /// 논리적 페이로드 (첫 0 바이트 이전까지)
    pub fn text(&self) -> Bytes {
        let len = checksum::covered(&self.payload).len();
        self.payload.slice(..len)
    }

    /// 헤더 + 페이로드 직렬화
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.payload.len() > PAYLOAD_CAPACITY {
            return Err(Error::MessageTooLong {
                len: self.payload.len(),
                max: PAYLOAD_CAPACITY,
            });
        }

        let header_bytes = bincode::serialize(&self.header())?;
        debug_assert_eq!(header_bytes.len(), HEADER_SIZE);

        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&header_bytes);
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }

    /// 0으로 채워 고정 크기로 직렬화
    pub fn to_padded_bytes(&self, size: usize) -> Result<Vec<u8>> {
        let mut buf = self.to_bytes()?;
        if buf.len() < size {
            buf.resize(size, 0);
        }
        Ok(buf)
    }

    /// 타입에 맞는 와이어 형식으로 직렬화
    ///
    /// 제어 프레임은 64바이트 고정, 그 외에는 헤더 + 페이로드
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        if self.kind.is_control() {
            self.to_padded_bytes(REPLY_SIZE)
        } else {
            self.to_bytes()
        }
    }

    /// 바이트에서 프레임 역직렬화
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::MalformedFrame { len: bytes.len() });
        }

        let header: FrameHeader = bincode::deserialize(&bytes[..HEADER_SIZE])?;
        let kind = FrameType::try_from(header.kind)?;

        let end = bytes.len().min(HEADER_SIZE + PAYLOAD_CAPACITY);
        let payload = Bytes::copy_from_slice(&bytes[HEADER_SIZE..end]);

        Ok(Self {
            checksum: header.checksum,
            sequence: header.sequence,
            kind,
            payload,
        })
    }
}
