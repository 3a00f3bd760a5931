//! 프로토콜 설정

use std::time::Duration;

use crate::{Error, Result, DEFAULT_FRAGMENT_PAYLOAD, MAX_MESSAGE_LEN, PAYLOAD_CAPACITY};

/// netcomm 프로토콜 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 데이터 프레임당 최대 페이로드 (바이트)
    pub fragment_payload: usize,

    /// 메시지 최대 길이 (바이트)
    pub max_message_len: usize,

    /// 응답 대기 타임아웃 (밀리초)
    /// None이면 응답이 올 때까지 무한 대기
    pub reply_timeout_ms: Option<u64>,

    /// 프레임당 연속 타임아웃 허용 횟수
    pub max_timeouts: u32,

    /// RESEND 응답에 대한 송신측 재전송 한도
    /// None이면 무제한
    pub max_resend_attempts: Option<u32>,

    /// 세션 내 연속 체크섬 실패 한도, 도달하면 수신측이 무결성 오류(type 3) 응답
    /// None이면 항상 RESEND
    pub server_resend_limit: Option<u32>,

    /// 진단 프로브 최대 시도 횟수
    pub diagnostic_attempts: u32,

    /// 유휴 세션 정리 기준 (밀리초)
    pub session_idle_timeout_ms: u64,

    /// 빈 데이터그램 수신 시 서버 수신 루프 종료 여부
    pub stop_on_disconnect: bool,

    /// 송신 데이터 프레임의 체크섬을 고의로 틀리게 보낼 확률 (0.0 ~ 1.0)
    pub corruption_rate: f64,

    /// 서버 주기 작업 간격 (밀리초)
    pub tick_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fragment_payload: DEFAULT_FRAGMENT_PAYLOAD,
            max_message_len: MAX_MESSAGE_LEN,
            reply_timeout_ms: Some(1000),
            max_timeouts: 5,
            max_resend_attempts: None,
            server_resend_limit: Some(16),
            diagnostic_attempts: 5,
            session_idle_timeout_ms: 300_000, // 5분
            stop_on_disconnect: false,
            corruption_rate: 0.0,
            tick_interval_ms: 50,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 원래 프로토콜 동작: 타임아웃 없음, 재전송 무제한, 연결 종료 시 수신 중단
    pub fn legacy() -> Self {
        Self {
            reply_timeout_ms: None,
            max_resend_attempts: None,
            server_resend_limit: None,
            stop_on_disconnect: true,
            ..Self::default()
        }
    }

    /// 불안정한 네트워크용 설정
    pub fn unstable_network() -> Self {
        Self {
            reply_timeout_ms: Some(3000),
            max_timeouts: 10,
            server_resend_limit: Some(64),
            diagnostic_attempts: 10,
            ..Self::default()
        }
    }

    /// 응답 대기 시간
    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout_ms.map(Duration::from_millis)
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.session_idle_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// 메시지 길이에 대한 단편 수 (마지막 빈 단편 포함)
    pub fn fragments_for(&self, len: usize) -> usize {
        len / self.fragment_payload + 1
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        // 체크섬 스캔용 종료 0 바이트 자리를 남겨야 함
        if self.fragment_payload == 0 || self.fragment_payload >= PAYLOAD_CAPACITY {
            return Err(Error::InvalidConfig(format!(
                "fragment_payload는 1 ~ {} 범위여야 함: {}",
                PAYLOAD_CAPACITY - 1,
                self.fragment_payload
            )));
        }

        if self.fragments_for(self.max_message_len) > i16::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "max_message_len {}은 시퀀스 범위를 초과함",
                self.max_message_len
            )));
        }

        if !(0.0..=1.0).contains(&self.corruption_rate) {
            return Err(Error::InvalidConfig(format!(
                "corruption_rate는 0.0 ~ 1.0 범위여야 함: {}",
                self.corruption_rate
            )));
        }

        if self.reply_timeout_ms == Some(0) {
            return Err(Error::InvalidConfig("reply_timeout_ms는 0일 수 없음".into()));
        }

        if self.diagnostic_attempts == 0 {
            return Err(Error::InvalidConfig("diagnostic_attempts는 1 이상이어야 함".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
        assert!(Config::legacy().validate().is_ok());
        assert!(Config::unstable_network().validate().is_ok());
    }

    #[test]
    fn test_legacy_blocks_forever() {
        let config = Config::legacy();
        assert!(config.reply_timeout().is_none());
        assert!(config.stop_on_disconnect);
        assert!(config.server_resend_limit.is_none());
    }

    #[test]
    fn test_fragment_payload_bounds() {
        let mut config = Config::default();
        config.fragment_payload = PAYLOAD_CAPACITY;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        config.fragment_payload = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        config.fragment_payload = PAYLOAD_CAPACITY - 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sequence_range_checked() {
        let config = Config {
            fragment_payload: 1,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fragments_for() {
        let config = Config::default();
        assert_eq!(config.fragments_for(0), 1);
        assert_eq!(config.fragments_for(2), 1);
        assert_eq!(config.fragments_for(511), 2);
        assert_eq!(config.fragments_for(512), 2);
        assert_eq!(config.fragments_for(1022), 3);
    }
}
