//! 전송 통계

use std::time::{Duration, Instant};

/// 전체 전송 통계 (송신측/수신측 공용)
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 송신 프레임 수 (재전송 포함)
    pub frames_sent: u64,

    /// 재전송 프레임 수
    pub retransmissions: u64,

    /// 받은(송신측) 또는 보낸(수신측) RESEND 수
    pub resend_requests: u64,

    /// 응답 타임아웃 수
    pub timeouts: u64,

    /// 수신 프레임 수
    pub frames_received: u64,

    /// 체크섬 불일치 프레임 수
    pub checksum_failures: u64,

    /// 무결성 오류(type 3) 응답 수
    pub integrity_errors: u64,

    /// 디코딩 실패로 버린 데이터그램 수
    pub malformed_frames: u64,

    /// 시퀀스 0 이하로 무시한 프레임 수
    pub ignored_frames: u64,

    /// 재전송으로 중복 도착한 단편 수
    pub duplicate_fragments: u64,

    /// 전송/전달 완료 메시지 수
    pub messages: u64,

    /// 페이로드 바이트 수
    pub payload_bytes: u64,

    /// 마지막 RESEND 시간
    pub last_resend_time: Option<Instant>,
}

impl TransferStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            frames_sent: 0,
            retransmissions: 0,
            resend_requests: 0,
            timeouts: 0,
            frames_received: 0,
            checksum_failures: 0,
            integrity_errors: 0,
            malformed_frames: 0,
            ignored_frames: 0,
            duplicate_fragments: 0,
            messages: 0,
            payload_bytes: 0,
            last_resend_time: None,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 재전송 비율 (0.0 ~ 1.0)
    pub fn retransmit_rate(&self) -> f64 {
        if self.frames_sent == 0 {
            return 0.0;
        }
        self.retransmissions as f64 / self.frames_sent as f64
    }

    /// 손상 비율 (0.0 ~ 1.0)
    pub fn corruption_rate(&self) -> f64 {
        if self.frames_received == 0 {
            return 0.0;
        }
        self.checksum_failures as f64 / self.frames_received as f64
    }

    /// RESEND 기록
    pub fn record_resend(&mut self) {
        self.resend_requests += 1;
        self.last_resend_time = Some(Instant::now());
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Messages: {} | Bytes: {} | Sent: {} (retx {:.1}%) | Received: {} | Corrupt: {} | Timeouts: {}",
            self.elapsed().as_secs_f64(),
            self.messages,
            self.payload_bytes,
            self.frames_sent,
            self.retransmit_rate() * 100.0,
            self.frames_received,
            self.checksum_failures,
            self.timeouts,
        )
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let mut stats = TransferStats::new();
        assert_eq!(stats.retransmit_rate(), 0.0);
        assert_eq!(stats.corruption_rate(), 0.0);

        stats.frames_sent = 4;
        stats.retransmissions = 1;
        stats.frames_received = 10;
        stats.checksum_failures = 5;
        assert!((stats.retransmit_rate() - 0.25).abs() < f64::EPSILON);
        assert!((stats.corruption_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_resend() {
        let mut stats = TransferStats::new();
        stats.record_resend();
        assert_eq!(stats.resend_requests, 1);
        assert!(stats.last_resend_time.is_some());
        assert!(stats.summary().contains("Messages: 0"));
    }
}
