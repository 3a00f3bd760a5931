//! 송신자 (클라이언트측 프로토콜 엔진)
//!
//! - init → 단편별 데이터 프레임 → 마지막 단편 순서로 전송
//! - 프레임 하나 보내고 응답을 기다림 (stop-and-wait)
//! - RESEND 응답이면 같은 프레임을 그대로 재전송
//! - 응답 타임아웃 시 재전송, 연속 한도 초과 시 `Error::Timeout`

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::fragment::Fragmenter;
use crate::frame::{Frame, FrameType};
use crate::stats::TransferStats;
use crate::{Config, Error, Result, MAX_DATAGRAM_SIZE};

/// 진단 프레임 시퀀스 (0은 수신측이 무시하므로 1 사용)
pub const DIAGNOSTIC_SEQUENCE: i16 = 1;

/// 진단 프레임 페이로드
pub const DIAGNOSTIC_PAYLOAD: &[u8] = b"This is a test message.";

/// 메시지 전송 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageReceipt {
    /// 단편 수 (빈 종료 단편 포함)
    pub fragments: usize,

    /// 전송한 데이터 프레임 수 (재전송 제외)
    pub data_frames: usize,

    /// 전송한 전체 프레임 수 (init, 재전송, 마지막 단편 포함)
    pub frames_sent: u32,

    /// 메시지 바이트 수
    pub bytes: usize,
}

/// 진단 프로브 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 서버가 손상을 감지함 (ACK 없음)
    Rejected { attempts: u32, fatal: bool },

    /// 서버가 손상된 프레임을 ACK함
    Accepted { attempts: u32 },

    /// 응답 없음
    Unanswered { attempts: u32 },
}

impl ProbeOutcome {
    /// 서버의 손상 감지가 정상 동작했는지
    pub fn detected(&self) -> bool {
        matches!(self, ProbeOutcome::Rejected { .. })
    }

    pub fn attempts(&self) -> u32 {
        match *self {
            ProbeOutcome::Rejected { attempts, .. }
            | ProbeOutcome::Accepted { attempts }
            | ProbeOutcome::Unanswered { attempts } => attempts,
        }
    }
}

/// 송신자
pub struct Sender {
    /// 설정
    config: Config,

    /// 소켓
    socket: Arc<UdpSocket>,

    /// 서버 주소
    peer: SocketAddr,

    /// 전송 통계
    stats: RwLock<TransferStats>,

    /// 아직 도착하지 않은 응답 (시퀀스, 개수)
    stale_replies: Mutex<Option<(i16, u32)>>,
}

impl Sender {
    pub fn new(config: Config, socket: Arc<UdpSocket>, peer: SocketAddr) -> Self {
        Self {
            config,
            socket,
            peer,
            stats: RwLock::new(TransferStats::new()),
            stale_replies: Mutex::new(None),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// init 프레임을 보내고 ACK 대기
    pub async fn handshake(&self) -> Result<u32> {
        self.exchange(&Frame::init()).await
    }

    /// 메시지 하나 전송: init → 데이터 단편들 → 마지막 단편
    pub async fn send_message(&self, message: &[u8]) -> Result<MessageReceipt> {
        self.validate(message)?;

        let fragmenter = Fragmenter::new(
            Bytes::copy_from_slice(message),
            self.config.fragment_payload,
        )?;
        let fragments = fragmenter.len();

        let mut frames_sent = self.handshake().await?;
        let mut data_frames = 0;

        for fragment in fragmenter {
            // 빈 종료 단편은 마지막 단편 프레임으로 대신함
            if fragment.payload.is_empty() {
                continue;
            }
            let frame = Frame::data(fragment.sequence, fragment.payload);
            frames_sent += self.exchange(&frame).await?;
            data_frames += 1;
        }

        frames_sent += self.finalize().await?;

        {
            let mut stats = self.stats.write();
            stats.messages += 1;
            stats.payload_bytes += message.len() as u64;
        }

        debug!(
            "메시지 전송 완료: {} bytes, {} 단편, {} 프레임",
            message.len(),
            data_frames,
            frames_sent
        );

        Ok(MessageReceipt {
            fragments,
            data_frames,
            frames_sent,
            bytes: message.len(),
        })
    }

    /// 메시지 끝 알림
    pub async fn finalize(&self) -> Result<u32> {
        let attempts = self.exchange(&Frame::last_fragment()).await?;
        info!("Server has acknowledged the end of message stream");
        Ok(attempts)
    }

    /// 세션 유지 프레임
    pub async fn keepalive(&self) -> Result<()> {
        self.exchange(&Frame::keepalive()).await.map(|_| ())
    }

    /// 빈 데이터그램으로 세션 종료 요청
    pub async fn terminate(&self) -> Result<()> {
        self.socket.send_to(&[], self.peer).await?;
        debug!("세션 종료 요청 전송: {}", self.peer);
        Ok(())
    }

    /// 프레임 전송 후 ACK까지 재전송, 전송 횟수 반환
    ///
    /// 응답은 이 프레임의 시퀀스를 되돌려줘야 한다. 타임아웃 재전송 뒤 늦게 도착한
    /// 이전 프레임의 응답은 버린다.
    pub async fn exchange(&self, frame: &Frame) -> Result<u32> {
        let bytes = frame.to_wire()?;

        // init과 첫 데이터 단편은 시퀀스가 같으므로 시퀀스만으로는 구분 불가
        let mut pending = self.stale_replies.lock().take();
        self.discard_queued(&mut pending);
        let mut stale = match pending {
            Some((sequence, count)) if sequence == frame.sequence => count,
            _ => 0,
        };

        let mut attempts = 0u32;
        let mut answered = 0u32;
        let mut resends = 0u32;
        let mut timeouts = 0u32;

        let result = loop {
            if let Err(e) = self.transmit(frame, &bytes, attempts > 0).await {
                break Err(e);
            }
            attempts += 1;

            let reply = match self.await_matching(frame.sequence, &mut stale).await {
                Ok(reply) => reply,
                Err(e) => break Err(e),
            };

            let reply = match reply {
                Some(reply) => reply,
                None => {
                    timeouts += 1;
                    self.stats.write().timeouts += 1;
                    if timeouts >= self.config.max_timeouts {
                        warn!(
                            "응답 없음: seq={} ({}회 타임아웃)",
                            frame.sequence, timeouts
                        );
                        break Err(Error::Timeout {
                            sequence: frame.sequence,
                            attempts,
                        });
                    }
                    debug!(
                        "응답 타임아웃: seq={}, 재전송 {}/{}",
                        frame.sequence, timeouts, self.config.max_timeouts
                    );
                    continue;
                }
            };
            answered += 1;
            timeouts = 0;

            match reply.kind {
                FrameType::Ack => break Ok(attempts),
                FrameType::Resend => {
                    resends += 1;
                    self.stats.write().record_resend();
                    if let Some(max) = self.config.max_resend_attempts {
                        if resends > max {
                            break Err(Error::ResendLimitExceeded {
                                sequence: frame.sequence,
                                attempts,
                            });
                        }
                    }
                    debug!("RESEND 수신: seq={}, 재전송", frame.sequence);
                }
                FrameType::IntegrityFatal => {
                    self.stats.write().integrity_errors += 1;
                    break Err(Error::IntegrityFatal {
                        sequence: frame.sequence,
                    });
                }
                other => break Err(Error::UnexpectedReplyType(other.tag())),
            }
        };

        // 타임아웃으로 재전송한 만큼 응답이 뒤늦게 올 수 있음
        let outstanding = stale + attempts.saturating_sub(answered);
        if outstanding > 0 {
            *self.stale_replies.lock() = Some((frame.sequence, outstanding));
        }

        result
    }

    /// 같은 시퀀스의 응답이 올 때까지 대기, 기한이 지나면 None
    ///
    /// `stale`개 만큼은 이전 프레임의 늦은 응답으로 보고 버린다.
    async fn await_matching(&self, sequence: i16, stale: &mut u32) -> Result<Option<Frame>> {
        let deadline = self.deadline();
        loop {
            let Some(reply) = self.await_reply(deadline).await? else {
                return Ok(None);
            };

            if reply.sequence != sequence {
                self.stats.write().ignored_frames += 1;
                debug!(
                    "다른 시퀀스의 응답 무시: expected {}, got {}",
                    sequence, reply.sequence
                );
                continue;
            }
            if *stale > 0 {
                *stale -= 1;
                self.stats.write().ignored_frames += 1;
                debug!("늦게 도착한 이전 응답 무시: seq={}", sequence);
                continue;
            }
            return Ok(Some(reply));
        }
    }

    /// 소켓에 이미 쌓인 데이터그램 버림, 버린 개수 반환
    ///
    /// 버린 응답 중 `pending` 시퀀스와 같은 것은 늦은 응답 개수에서 뺀다.
    fn discard_queued(&self, pending: &mut Option<(i16, u32)>) -> usize {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let mut discarded = 0;
        while let Ok((len, from)) = self.socket.try_recv_from(&mut buf) {
            discarded += 1;
            if from != self.peer {
                continue;
            }
            let Some((sequence, count)) = pending.as_mut() else {
                continue;
            };
            if let Ok(reply) = Frame::from_bytes(&buf[..len]) {
                if reply.sequence == *sequence && *count > 0 {
                    *count -= 1;
                }
            }
        }
        if discarded > 0 {
            self.stats.write().ignored_frames += discarded as u64;
            debug!("대기 중이던 응답 {}개 버림", discarded);
        }
        discarded
    }

    fn deadline(&self) -> Option<Instant> {
        self.config
            .reply_timeout()
            .map(|timeout| Instant::now() + timeout)
    }

    /// 고의로 손상된 프레임을 보내 서버의 손상 감지를 확인
    pub async fn probe(&self) -> Result<ProbeOutcome> {
        let frame = Frame::diagnostic(DIAGNOSTIC_SEQUENCE, Bytes::from_static(DIAGNOSTIC_PAYLOAD));
        let bytes = frame.to_wire()?;
        let max_attempts = self.config.diagnostic_attempts.max(1);
        let mut pending = self.stale_replies.lock().take();
        self.discard_queued(&mut pending);

        let mut attempts = 0u32;
        let mut answered = false;

        while attempts < max_attempts {
            self.send_datagram(&bytes, attempts > 0).await?;
            attempts += 1;

            match self.await_reply(self.deadline()).await {
                Ok(Some(reply)) => {
                    answered = true;
                    match reply.kind {
                        FrameType::Ack => return Ok(ProbeOutcome::Accepted { attempts }),
                        FrameType::IntegrityFatal => {
                            return Ok(ProbeOutcome::Rejected {
                                attempts,
                                fatal: true,
                            })
                        }
                        _ => {}
                    }
                }
                Ok(None) => {
                    self.stats.write().timeouts += 1;
                }
                Err(Error::UnexpectedReplyType(tag)) => {
                    answered = true;
                    debug!("진단 응답 타입 {}", tag);
                }
                Err(e) => return Err(e),
            }
        }

        if answered {
            Ok(ProbeOutcome::Rejected {
                attempts,
                fatal: false,
            })
        } else {
            Ok(ProbeOutcome::Unanswered { attempts })
        }
    }

    /// 메시지 검증
    fn validate(&self, message: &[u8]) -> Result<()> {
        if message.len() > self.config.max_message_len {
            return Err(Error::MessageTooLong {
                len: message.len(),
                max: self.config.max_message_len,
            });
        }

        // 체크섬이 첫 0 바이트에서 멈추므로 이후 내용은 보호되지 않음
        if let Some(offset) = message.iter().position(|&b| b == 0) {
            return Err(Error::EmbeddedZero { offset });
        }

        Ok(())
    }

    /// 손상 주입 여부 결정
    fn should_corrupt(&self, frame: &Frame) -> bool {
        frame.kind == FrameType::Data
            && self.config.corruption_rate > 0.0
            && rand::thread_rng().gen_bool(self.config.corruption_rate)
    }

    async fn transmit(&self, frame: &Frame, bytes: &[u8], retransmission: bool) -> Result<()> {
        if self.should_corrupt(frame) {
            let mut damaged = frame.clone();
            damaged.checksum = damaged.checksum.wrapping_add(1);
            debug!("손상 주입: seq={}", frame.sequence);
            return self.send_datagram(&damaged.to_wire()?, retransmission).await;
        }

        self.send_datagram(bytes, retransmission).await
    }

    async fn send_datagram(&self, bytes: &[u8], retransmission: bool) -> Result<()> {
        self.socket.send_to(bytes, self.peer).await?;

        let mut stats = self.stats.write();
        stats.frames_sent += 1;
        if retransmission {
            stats.retransmissions += 1;
        }
        Ok(())
    }

    /// 기한까지 응답 대기, 타임아웃이면 None
    async fn await_reply(&self, deadline: Option<Instant>) -> Result<Option<Frame>> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            let (len, from) = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, self.socket.recv_from(&mut buf)).await {
                        Ok(result) => result?,
                        Err(_) => return Ok(None),
                    }
                }
                None => self.socket.recv_from(&mut buf).await?,
            };

            if from != self.peer {
                debug!("알 수 없는 주소의 데이터그램 무시: {}", from);
                continue;
            }

            match Frame::from_bytes(&buf[..len]) {
                Ok(frame) => {
                    self.stats.write().frames_received += 1;
                    return Ok(Some(frame));
                }
                Err(Error::UnknownFrameType(tag)) => return Err(Error::UnexpectedReplyType(tag)),
                Err(e) => {
                    self.stats.write().malformed_frames += 1;
                    debug!("응답 디코딩 실패: {}", e);
                }
            }
        }
    }

    /// 통계 반환
    pub fn stats(&self) -> TransferStats {
        self.stats.read().clone()
    }
}
