//! 세션 상태
//!
//! 피어 주소별로 하나씩 유지된다. init 프레임으로 생성/갱신되고,
//! 빈 데이터그램 또는 유휴 시간 초과로 제거된다.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};

/// 피어 하나의 수신 세션
#[derive(Debug)]
pub struct Session {
    /// 피어 주소
    pub peer: SocketAddr,

    /// 다음에 기대하는 데이터 시퀀스
    pub expected_sequence: i16,

    /// 연속 체크섬 실패 횟수
    pub resend_count: u32,

    /// 조립 중인 메시지
    buffer: BytesMut,

    /// 마지막 단편까지 받아 메시지가 닫힌 상태
    closed: bool,

    /// 이 세션에서 전달 완료된 메시지 수
    pub messages_delivered: u64,

    /// 생성 시간
    pub created_at: Instant,

    /// 마지막 활동 시간
    pub last_activity: Instant,
}

impl Session {
    pub fn new(peer: SocketAddr) -> Self {
        let now = Instant::now();
        Self {
            peer,
            expected_sequence: 1,
            resend_count: 0,
            buffer: BytesMut::new(),
            closed: false,
            messages_delivered: 0,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// init 수신 시 진행 중이던 메시지를 버리고 처음부터
    pub fn reset(&mut self) {
        self.expected_sequence = 1;
        self.resend_count = 0;
        self.buffer.clear();
        self.closed = false;
        self.touch();
    }

    /// 직전에 수락한 단편의 재전송인지
    pub fn is_duplicate(&self, sequence: i16) -> bool {
        self.expected_sequence > 1 && sequence == self.expected_sequence - 1
    }

    /// 단편 수락
    pub fn accept(&mut self, sequence: i16, payload: &[u8]) {
        self.buffer.extend_from_slice(payload);
        self.expected_sequence = sequence.saturating_add(1);
        self.resend_count = 0;
        self.closed = false;
        self.touch();
    }

    /// 체크섬 실패 기록, 누적 실패 횟수 반환
    pub fn record_failure(&mut self) -> u32 {
        self.resend_count += 1;
        self.touch();
        self.resend_count
    }

    /// 메시지 완료: 조립된 내용을 꺼내고 다음 메시지 준비
    pub fn complete(&mut self) -> Bytes {
        self.expected_sequence = 1;
        self.resend_count = 0;
        self.messages_delivered += 1;
        self.closed = true;
        self.touch();
        self.buffer.split().freeze()
    }

    /// 메시지가 닫힌 뒤 새 init/단편이 아직 없음 (마지막 단편 재전송 판별용)
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// 조립 중인 바이트 수
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_idle(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }
}
