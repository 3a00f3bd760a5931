//! 서버 역할
//!
//! 모든 로컬 주소에 바인딩한 소켓 하나로 수신 루프를 돌며,
//! 프레임마다 `Receiver`가 정한 응답을 64바이트 고정 크기로 돌려준다.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::frame::Frame;
use crate::receiver::{EventReceiver, Receiver, ServerEvent};
use crate::stats::TransferStats;
use crate::{Config, Result, MAX_DATAGRAM_SIZE};

/// 서버
pub struct Server {
    /// 설정
    config: Config,

    /// 소켓
    socket: UdpSocket,

    /// 프로토콜 엔진
    receiver: Receiver,

    /// 실행 중 플래그
    running: AtomicBool,

    /// 바인드 주소
    local_addr: SocketAddr,
}

impl Server {
    /// 소켓 바인딩
    ///
    /// 반환된 `EventReceiver`는 계속 읽어야 한다. 이벤트 채널은 1024개로 제한되고
    /// 수신 루프가 전송을 기다리므로, 읽지 않고 들고만 있으면 채널이 차는 순간
    /// 서버가 응답을 멈춘다. 이벤트가 필요 없으면 바로 drop하면 된다.
    pub async fn bind(config: Config, bind_addr: SocketAddr) -> Result<(Self, EventReceiver)> {
        config.validate()?;

        let socket = UdpSocket::bind(bind_addr).await?;
        let local_addr = socket.local_addr()?;
        let (receiver, events) = Receiver::new(config.clone());

        let server = Self {
            config,
            socket,
            receiver,
            running: AtomicBool::new(true),
            local_addr,
        };
        Ok((server, events))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 수신 루프
    ///
    /// `stop()` 호출, 수신 에러, 또는 `stop_on_disconnect` 설정 시 빈 데이터그램으로 종료
    pub async fn run(&self) -> Result<()> {
        info!(
            "Server listening on IP {} and port {}",
            self.local_addr.ip(),
            self.local_addr.port()
        );

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let mut tick = tokio::time::interval(self.config.tick_interval());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result = loop {
            if !self.running.load(Ordering::SeqCst) {
                break Ok(());
            }

            tokio::select! {
                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, peer)) => {
                            if let Some(reply) = self.receiver.handle_datagram(&buf[..len], peer).await {
                                self.send_reply(&reply, peer).await;
                            }
                            if len == 0 && self.config.stop_on_disconnect {
                                info!("연결 종료 요청으로 수신 중단: {}", peer);
                                break Ok(());
                            }
                        }
                        // ICMP port unreachable (Windows)
                        Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                            debug!("수신 에러 무시: {}", e);
                        }
                        Err(e) => {
                            warn!("수신 에러: {}", e);
                            break Err(e.into());
                        }
                    }
                }
                _ = tick.tick() => {
                    // 주기적 작업
                    self.receiver.evict_idle().await;
                }
            }
        };

        info!("Server stopped listening");
        result
    }

    async fn send_reply(&self, reply: &Frame, peer: SocketAddr) {
        let bytes = match reply.to_wire() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("응답 직렬화 실패: {}", e);
                return;
            }
        };

        match self.socket.send_to(&bytes, peer).await {
            Ok(_) => self.receiver.record_sent(),
            Err(e) => warn!("응답 전송 실패 ({}): {}", peer, e),
        }
    }

    /// 정지
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn receiver(&self) -> &Receiver {
        &self.receiver
    }

    /// 통계 반환
    pub fn stats(&self) -> TransferStats {
        self.receiver.stats()
    }
}

/// 서버를 띄우고 받은 메시지를 표준 출력으로 내보냄, 수신 루프가 끝나면 통계 반환
pub async fn run_server(config: Config, bind_addr: SocketAddr) -> Result<TransferStats> {
    let (server, mut events) = Server::bind(config, bind_addr).await?;

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ServerEvent::SessionOpened { peer } => info!("Client connected: {}", peer),
                ServerEvent::Fragment {
                    peer,
                    sequence,
                    payload,
                } => {
                    let mut stdout = std::io::stdout().lock();
                    if sequence == 1 {
                        let _ = write!(stdout, "Client {}: ", peer);
                    }
                    let _ = stdout.write_all(&payload);
                    let _ = stdout.flush();
                }
                ServerEvent::MessageComplete { peer, message } => {
                    println!();
                    debug!("메시지 수신 완료 ({}): {} bytes", peer, message.len());
                }
                ServerEvent::SessionClosed { peer } => info!("Client disconnected: {}", peer),
            }
        }
    });

    let result = server.run().await;
    let stats = server.stats();
    info!("{}", stats.summary());

    // 이벤트 채널을 닫아 출력 태스크 종료
    drop(server);
    let _ = printer.await;

    result.map(|_| stats)
}
