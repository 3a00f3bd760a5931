//! 수신자 (서버측 프로토콜 엔진)
//!
//! - 프레임 검증 (체크섬) 및 ACK / RESEND / 무결성 오류 응답 결정
//! - 피어 주소별 세션 테이블
//! - 수락된 단편을 이벤트 스트림으로 전달하고 메시지 단위로 조립

use std::net::SocketAddr;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::frame::{Frame, FrameType};
use crate::session::Session;
use crate::stats::TransferStats;
use crate::Config;

/// 서버 이벤트 채널 수신기 타입
pub type EventReceiver = mpsc::Receiver<ServerEvent>;

/// 수신측에서 외부로 내보내는 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// 새 피어가 init을 보냄
    SessionOpened { peer: SocketAddr },

    /// 체크섬 검증을 통과한 단편
    Fragment {
        peer: SocketAddr,
        sequence: i16,
        payload: Bytes,
    },

    /// 마지막 단편 수신, 조립된 메시지
    MessageComplete { peer: SocketAddr, message: Bytes },

    /// 세션 종료 (빈 데이터그램 또는 유휴 시간 초과)
    SessionClosed { peer: SocketAddr },
}

/// 수신자
pub struct Receiver {
    /// 설정
    config: Config,

    /// 피어별 세션
    sessions: DashMap<SocketAddr, Session>,

    /// 수신 통계
    stats: RwLock<TransferStats>,

    /// 이벤트 송신 채널
    events: mpsc::Sender<ServerEvent>,
}

impl Receiver {
    /// 새 수신자와 이벤트 채널 생성
    pub fn new(config: Config) -> (Self, EventReceiver) {
        let (events, events_rx) = mpsc::channel(1024);
        let receiver = Self {
            config,
            sessions: DashMap::new(),
            stats: RwLock::new(TransferStats::new()),
            events,
        };
        (receiver, events_rx)
    }

    /// 데이터그램 하나 처리, 보낼 응답 프레임 반환
    pub async fn handle_datagram(&self, datagram: &[u8], peer: SocketAddr) -> Option<Frame> {
        if datagram.is_empty() {
            self.close_session(peer).await;
            return None;
        }

        let frame = match Frame::from_bytes(datagram) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.write().malformed_frames += 1;
                debug!("프레임 버림 ({}): {}", peer, e);
                return None;
            }
        };

        self.stats.write().frames_received += 1;

        let mut events = Vec::new();
        let reply = self.handle_frame(frame, peer, &mut events);

        for event in events {
            let _ = self.events.send(event).await;
        }

        reply
    }

    /// 프레임 타입별 처리 (세션 잠금은 여기서만 잡고 놓음)
    fn handle_frame(
        &self,
        frame: Frame,
        peer: SocketAddr,
        events: &mut Vec<ServerEvent>,
    ) -> Option<Frame> {
        // 시퀀스 0 이하는 아직 유효하지 않은 프레임
        if frame.sequence <= 0 {
            self.stats.write().ignored_frames += 1;
            trace!("시퀀스 {} 프레임 무시: {}", frame.sequence, peer);
            return None;
        }

        let sequence = frame.sequence;
        let reply = match frame.kind {
            FrameType::Init => {
                match self.sessions.entry(peer) {
                    Entry::Occupied(mut entry) => {
                        entry.get_mut().reset();
                        debug!("세션 갱신: {}", peer);
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(Session::new(peer));
                        info!("클라이언트 연결: {}", peer);
                        events.push(ServerEvent::SessionOpened { peer });
                    }
                }
                FrameType::Ack
            }

            FrameType::Data | FrameType::Diagnostic => self.handle_data(frame, peer, events),

            FrameType::LastFragment => {
                let mut session = self.session_for(peer, events);
                if session.is_closed() {
                    // ACK 유실로 인한 재전송
                    self.stats.write().duplicate_fragments += 1;
                } else {
                    let message = session.complete();
                    {
                        let mut stats = self.stats.write();
                        stats.messages += 1;
                    }
                    debug!("메시지 완료 ({}): {} bytes", peer, message.len());
                    events.push(ServerEvent::MessageComplete { peer, message });
                }
                FrameType::Ack
            }

            FrameType::Keepalive => {
                if let Some(mut session) = self.sessions.get_mut(&peer) {
                    session.touch();
                }
                FrameType::Ack
            }

            FrameType::Ack | FrameType::Resend | FrameType::IntegrityFatal => {
                debug!("클라이언트의 응답 프레임 무시: {:?} from {}", frame.kind, peer);
                return None;
            }
        };

        Some(Frame::reply(reply, sequence))
    }

    /// 데이터/진단 프레임 검증
    fn handle_data(
        &self,
        frame: Frame,
        peer: SocketAddr,
        events: &mut Vec<ServerEvent>,
    ) -> FrameType {
        let mut session = self.session_for(peer, events);

        if let Err(e) = frame.verify() {
            let failures = session.record_failure();
            self.stats.write().checksum_failures += 1;
            debug!("{} seq={}: {}", peer, frame.sequence, e);

            if let Some(limit) = self.config.server_resend_limit {
                if failures >= limit {
                    session.resend_count = 0;
                    self.stats.write().integrity_errors += 1;
                    warn!(
                        "무결성 오류: {} seq={} ({}회 연속 실패)",
                        peer, frame.sequence, failures
                    );
                    return FrameType::IntegrityFatal;
                }
            }

            self.stats.write().record_resend();
            return FrameType::Resend;
        }

        // 진단 프레임은 검증만 하고 전달하지 않음
        if frame.kind == FrameType::Diagnostic {
            session.touch();
            return FrameType::Ack;
        }

        if session.is_duplicate(frame.sequence) {
            self.stats.write().duplicate_fragments += 1;
            debug!("중복 단편 ({} seq={}), 재확인만 보냄", peer, frame.sequence);
            return FrameType::Ack;
        }

        let payload = frame.text();
        session.accept(frame.sequence, &payload);
        self.stats.write().payload_bytes += payload.len() as u64;

        events.push(ServerEvent::Fragment {
            peer,
            sequence: frame.sequence,
            payload,
        });
        FrameType::Ack
    }

    /// 세션 조회, 없으면 생성 (init 없이 도착한 데이터도 받아들임)
    fn session_for(
        &self,
        peer: SocketAddr,
        events: &mut Vec<ServerEvent>,
    ) -> dashmap::mapref::one::RefMut<'_, SocketAddr, Session> {
        let mut opened = false;
        let session = self.sessions.entry(peer).or_insert_with(|| {
            opened = true;
            Session::new(peer)
        });
        if opened {
            info!("init 없이 세션 생성: {}", peer);
            events.push(ServerEvent::SessionOpened { peer });
        }
        session
    }

    /// 세션 종료
    pub async fn close_session(&self, peer: SocketAddr) -> bool {
        let Some((_, session)) = self.sessions.remove(&peer) else {
            return false;
        };

        info!(
            "클라이언트 연결 종료: {} ({} messages, {:?})",
            peer,
            session.messages_delivered,
            session.created_at.elapsed()
        );
        let _ = self.events.send(ServerEvent::SessionClosed { peer }).await;
        true
    }

    /// 유휴 세션 정리, 제거된 세션 수 반환
    pub async fn evict_idle(&self) -> usize {
        let timeout = self.config.session_idle_timeout();
        let idle: Vec<SocketAddr> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_idle(timeout))
            .map(|entry| *entry.key())
            .collect();

        let mut evicted = 0;
        for peer in idle {
            if self.sessions.remove(&peer).is_some() {
                warn!("유휴 세션 정리: {}", peer);
                let _ = self.events.send(ServerEvent::SessionClosed { peer }).await;
                evicted += 1;
            }
        }
        evicted
    }

    /// 응답 송신 기록
    pub fn record_sent(&self) {
        self.stats.write().frames_sent += 1;
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn has_session(&self, peer: &SocketAddr) -> bool {
        self.sessions.contains_key(peer)
    }

    /// 세션 상태 조회
    pub fn inspect_session<R>(
        &self,
        peer: &SocketAddr,
        f: impl FnOnce(&Session) -> R,
    ) -> Option<R> {
        self.sessions.get(peer).map(|session| f(&session))
    }

    /// 통계 반환
    pub fn stats(&self) -> TransferStats {
        self.stats.read().clone()
    }
}
