//! netcomm 서버
//!
//! 모든 로컬 주소에서 메시지를 받아 표준 출력으로 내보낸다.
//!
//! 사용법:
//!   cargo run --release --bin netcomm-server -- [OPTIONS]
//!
//! 예시:
//!   cargo run --release --bin netcomm-server -- --port 8080
//!   cargo run --release --bin netcomm-server -- --legacy

use std::net::{Ipv4Addr, SocketAddr};

use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use netcomm::{Config, PORT};

/// 서버 실행 설정
struct ServerArgs {
    bind_addr: SocketAddr,
    config: Config,
}

impl Default for ServerArgs {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, PORT)),
            config: Config::default(),
        }
    }
}

const HELP: &str = r#"netcomm server - UDP 신뢰 메시지 수신기

사용법:
  cargo run --release --bin netcomm-server -- [OPTIONS]

옵션:
  -b, --bind <ADDR>           바인드 주소 (기본: 0.0.0.0:8080)
  -p, --port <PORT>           포트만 지정 (모든 로컬 주소)
  --resend-limit <N|off>      연속 체크섬 실패 후 무결성 오류 응답 (기본: 16)
  --idle-timeout <MS>         유휴 세션 정리 기준 (기본: 300000)
  --stop-on-disconnect        빈 데이터그램을 받으면 수신 종료
  --legacy                    원래 프로토콜 동작 (타임아웃/한도 없음, 연결 종료 시 중단)
  -h, --help                  이 도움말 출력

환경 변수:
  RUST_LOG                    로그 레벨 (기본: info)
"#;

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, String> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| format!("{} 옵션에 값이 필요함", flag))
}

fn parse_args(args: &[String]) -> Result<ServerArgs, String> {
    let mut parsed = ServerArgs::default();

    // 프리셋을 먼저 적용해야 개별 옵션이 덮어쓰이지 않음
    if args.iter().skip(1).any(|arg| arg == "--legacy") {
        parsed.config = Config::legacy();
    }

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--bind" | "-b" => {
                parsed.bind_addr = value(&args, i, flag)?
                    .parse()
                    .map_err(|e| format!("유효한 주소 필요: {}", e))?;
                i += 1;
            }
            "--port" | "-p" => {
                let port: u16 = value(&args, i, flag)?
                    .parse()
                    .map_err(|e| format!("유효한 포트 필요: {}", e))?;
                parsed.bind_addr.set_port(port);
                i += 1;
            }
            "--resend-limit" => {
                let raw = value(&args, i, flag)?;
                parsed.config.server_resend_limit = match raw {
                    "off" => None,
                    n => Some(n.parse().map_err(|e| format!("유효한 숫자 필요: {}", e))?),
                };
                i += 1;
            }
            "--idle-timeout" => {
                parsed.config.session_idle_timeout_ms = value(&args, i, flag)?
                    .parse()
                    .map_err(|e| format!("유효한 숫자 필요: {}", e))?;
                i += 1;
            }
            "--stop-on-disconnect" => {
                parsed.config.stop_on_disconnect = true;
            }
            "--legacy" => {}
            "--help" | "-h" => {
                println!("{}", HELP);
                std::process::exit(0);
            }
            other => return Err(format!("알 수 없는 옵션: {}", other)),
        }
        i += 1;
    }

    Ok(parsed)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args: Vec<String> = std::env::args().collect();
    let args = match parse_args(&args) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}\n\n{}", msg, HELP);
            std::process::exit(2);
        }
    };

    info!("netcomm server starting...");
    info!("Bind address: {}", args.bind_addr);
    info!("Resend limit: {:?}", args.config.server_resend_limit);

    // 소켓 생성/바인딩 실패는 복구하지 않음
    match netcomm::run_server(args.config, args.bind_addr).await {
        Ok(_) => {
            info!("Returning to main menu");
            Ok(())
        }
        Err(e) => {
            error!("서버 종료: {}", e);
            std::process::exit(1);
        }
    }
}
