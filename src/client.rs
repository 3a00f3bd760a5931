//! 클라이언트 역할
//!
//! 서버 주소로 init 핸드셰이크 후 메시지를 전송하고, 빈 데이터그램으로 연결을 끝낸다.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::net::UdpSocket;
use tracing::{info, warn};

use crate::sender::{MessageReceipt, ProbeOutcome, Sender};
use crate::stats::TransferStats;
use crate::{Config, Error, Result};

/// 클라이언트
pub struct Client {
    socket: Arc<UdpSocket>,
    sender: Sender,
}

impl Client {
    /// 소켓 생성 후 서버와 init 핸드셰이크
    pub async fn connect(config: Config, server_addr: SocketAddr) -> Result<Self> {
        config.validate()?;

        // 0.0.0.0으로 지정하면 응답 주소와 맞지 않으므로 루프백으로 바꿈
        let server_addr = match server_addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => {
                SocketAddr::new(Ipv4Addr::LOCALHOST.into(), server_addr.port())
            }
            IpAddr::V6(ip) if ip.is_unspecified() => {
                SocketAddr::new(Ipv6Addr::LOCALHOST.into(), server_addr.port())
            }
            _ => server_addr,
        };

        let bind_addr: SocketAddr = if server_addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
        let sender = Sender::new(config, socket.clone(), server_addr);

        sender.handshake().await?;
        info!("Successfully connected to server {}", server_addr);

        Ok(Self { socket, sender })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.sender.peer()
    }

    /// 메시지 전송
    pub async fn send_message(&self, message: &[u8]) -> Result<MessageReceipt> {
        self.sender.send_message(message).await
    }

    pub async fn send_text(&self, text: &str) -> Result<MessageReceipt> {
        self.send_message(text.as_bytes()).await
    }

    pub async fn keepalive(&self) -> Result<()> {
        self.sender.keepalive().await
    }

    /// 손상 감지 진단
    pub async fn run_diagnostic(&self) -> Result<ProbeOutcome> {
        let outcome = self.sender.probe().await?;
        match outcome {
            ProbeOutcome::Rejected { attempts, fatal } => info!(
                "Server detected the corrupted frame ({} attempts, fatal={})",
                attempts, fatal
            ),
            ProbeOutcome::Accepted { attempts } => warn!(
                "Server accepted a corrupted frame after {} attempts",
                attempts
            ),
            ProbeOutcome::Unanswered { attempts } => {
                warn!("No reply to diagnostic frame after {} attempts", attempts)
            }
        }
        Ok(outcome)
    }

    /// 연결 종료, 최종 통계 반환
    pub async fn disconnect(self) -> Result<TransferStats> {
        self.sender.terminate().await?;
        info!("CLIENT: disconnected from {}", self.sender.peer());
        Ok(self.sender.stats())
    }

    /// 통계 반환
    pub fn stats(&self) -> TransferStats {
        self.sender.stats()
    }
}

/// 입력의 각 줄을 메시지 하나로 전송, 입력이 끝나면 연결 종료
pub async fn run_client<R>(config: Config, server_addr: SocketAddr, input: R) -> Result<TransferStats>
where
    R: AsyncBufRead + Unpin,
{
    let client = Client::connect(config, server_addr).await?;
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            continue;
        }

        match client.send_text(&line).await {
            Ok(receipt) => info!(
                "Message has been successfully sent ({} bytes, {} frames)",
                receipt.bytes, receipt.frames_sent
            ),
            // 입력 문제는 해당 메시지만 건너뜀
            Err(e @ (Error::MessageTooLong { .. } | Error::EmbeddedZero { .. })) => {
                warn!("메시지 전송 불가: {}", e);
            }
            Err(e) => return Err(e),
        }
    }

    let stats = client.disconnect().await?;
    info!("{}", stats.summary());
    Ok(stats)
}
