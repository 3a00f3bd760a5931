//! # netcomm
//!
//! UDP 위에서 동작하는 단순 신뢰 메시지 전송 프로토콜
//!
//! ## 핵심 특징
//! - **고정 프레임**: checksum(4) + sequence(2) + type(1) + payload
//! - **CRC-32 무결성 검증**: 손상된 프레임은 resend 요청으로 재전송
//! - **단편화**: 메시지를 511바이트 이하 조각으로 분할, 수신측에서 순서대로 연결
//! - **Stop-and-wait**: 프레임 하나 보내고 응답(ACK/RESEND)을 기다림
//! - **세션 테이블**: 피어 주소별 시퀀스/재전송 카운터 관리

pub mod checksum;
pub mod client;
pub mod config;
pub mod error;
pub mod fragment;
pub mod frame;
pub mod receiver;
pub mod sender;
pub mod server;
pub mod session;
pub mod stats;

pub use client::{run_client, Client};
pub use config::Config;
pub use error::{Error, Result};
pub use fragment::{Fragment, Fragmenter};
pub use frame::{Frame, FrameType};
pub use receiver::{Receiver, ServerEvent};
pub use sender::{MessageReceipt, ProbeOutcome, Sender};
pub use server::{run_server, Server};
pub use session::Session;
pub use stats::TransferStats;

/// 서버 기본 포트
pub const PORT: u16 = 8080;

/// 단편 크기 상수 (마지막 단편 프레임의 시퀀스 마커로도 사용)
pub const FRAG_SIZE: usize = 512;

/// 기본 단편 페이로드 크기 (종료용 0 바이트 자리 1바이트 제외)
pub const DEFAULT_FRAGMENT_PAYLOAD: usize = FRAG_SIZE - 1;

/// 프레임 헤더 크기: checksum(4) + sequence(2) + type(1)
pub const HEADER_SIZE: usize = 7;

/// 페이로드 필드 할당 크기 (Ethernet II 1500B 기준)
pub const PAYLOAD_CAPACITY: usize = 1451;

/// 수신 버퍼 크기 (헤더 + 페이로드 + 정렬 패딩)
pub const MAX_DATAGRAM_SIZE: usize = 1460;

/// 제어 프레임(init, 서버 응답)의 고정 전송 크기
pub const REPLY_SIZE: usize = 64;

/// 메시지 최대 길이 (바이트)
pub const MAX_MESSAGE_LEN: usize = 99_999;

/// 마지막 단편 프레임의 시퀀스 값 (순번이 아닌 고정 마커)
pub const LAST_FRAGMENT_SEQUENCE: i16 = FRAG_SIZE as i16;

/// init 프레임 시퀀스
pub const INIT_SEQUENCE: i16 = 1;
