//! netcomm 클라이언트
//!
//! 표준 입력의 각 줄을 메시지로 서버에 보낸다. 입력이 끝나면 빈 데이터그램으로 연결을 종료한다.
//!
//! 사용법:
//!   cargo run --release --bin netcomm-client -- [OPTIONS]
//!
//! 예시:
//!   # 대화형 전송
//!   cargo run --release --bin netcomm-client -- --server 127.0.0.1:8080
//!
//!   # 메시지 하나만 전송
//!   cargo run --release --bin netcomm-client -- -m "hello"
//!
//!   # 서버 손상 감지 진단
//!   cargo run --release --bin netcomm-client -- --diagnostic

use std::net::SocketAddr;

use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use netcomm::{Client, Config, PORT};

/// 클라이언트 실행 설정
struct ClientArgs {
    server_addr: SocketAddr,
    message: Option<String>,
    diagnostic: bool,
    config: Config,
}

impl Default for ClientArgs {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], PORT)),
            message: None,
            diagnostic: false,
            config: Config::default(),
        }
    }
}

const HELP: &str = r#"netcomm client - UDP 신뢰 메시지 송신기

사용법:
  cargo run --release --bin netcomm-client -- [OPTIONS]

옵션:
  -s, --server <ADDR>       서버 주소 (기본: 127.0.0.1:8080)
  -m, --message <TEXT>      메시지 하나만 보내고 종료
  -d, --diagnostic          손상된 프레임으로 서버의 손상 감지 확인
  --timeout <MS|off>        응답 대기 시간 (기본: 1000)
  --retries <N>             연속 타임아웃 허용 횟수 (기본: 5)
  --fragment-size <N>       단편 페이로드 크기 (기본: 511)
  --corrupt <RATIO>         데이터 프레임 손상 주입 확률 0.0~1.0 (기본: 0)
  --legacy                  원래 프로토콜 동작 (타임아웃 없음)
  -h, --help                이 도움말 출력

환경 변수:
  RUST_LOG                  로그 레벨 (기본: info)
"#;

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, String> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| format!("{} 옵션에 값이 필요함", flag))
}

fn number<T: std::str::FromStr>(raw: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e| format!("유효한 숫자 필요 ({}): {}", raw, e))
}

fn parse_args(args: &[String]) -> Result<ClientArgs, String> {
    let mut parsed = ClientArgs::default();

    // 프리셋을 먼저 적용해야 개별 옵션이 덮어쓰이지 않음
    if args.iter().skip(1).any(|arg| arg == "--legacy") {
        parsed.config = Config::legacy();
    }

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--server" | "-s" => {
                parsed.server_addr = value(&args, i, flag)?
                    .parse()
                    .map_err(|e| format!("유효한 주소 필요: {}", e))?;
                i += 1;
            }
            "--message" | "-m" => {
                parsed.message = Some(value(&args, i, flag)?.to_string());
                i += 1;
            }
            "--diagnostic" | "-d" => {
                parsed.diagnostic = true;
            }
            "--timeout" => {
                parsed.config.reply_timeout_ms = match value(&args, i, flag)? {
                    "off" => None,
                    raw => Some(number(raw)?),
                };
                i += 1;
            }
            "--retries" => {
                parsed.config.max_timeouts = number(value(&args, i, flag)?)?;
                i += 1;
            }
            "--fragment-size" => {
                parsed.config.fragment_payload = number(value(&args, i, flag)?)?;
                i += 1;
            }
            "--corrupt" => {
                parsed.config.corruption_rate = number(value(&args, i, flag)?)?;
                i += 1;
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

    info!("Server address: {}", args.server_addr);
    info!("Reply timeout: {:?} ms", args.config.reply_timeout_ms);

    if args.diagnostic {
        let client = Client::connect(args.config, args.server_addr).await?;
        let outcome = client.run_diagnostic().await?;
        if outcome.detected() {
            info!("Server detected an error. Message not sent.");
        } else {
            warn!("Server did not detect the corrupted frame: {:?}", outcome);
        }
        client.disconnect().await?;
        return Ok(());
    }

    if let Some(message) = args.message {
        let client = Client::connect(args.config, args.server_addr).await?;
        let receipt = client.send_text(&message).await?;
        info!(
            "Message has been successfully sent ({} bytes, {} frames)",
            receipt.bytes, receipt.frames_sent
        );
        let stats = client.disconnect().await?;
        info!("{}", stats.summary());
        return Ok(());
    }

    info!("Type your message, one per line (EOF to disconnect)");
    let input = BufReader::new(tokio::io::stdin());
    if let Err(e) = netcomm::run_client(args.config, args.server_addr, input).await {
        error!("클라이언트 종료: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("netcomm-client")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_legacy_keeps_earlier_options() {
        let parsed = parse_args(&args(&["--fragment-size", "100", "--timeout", "250", "--legacy"])).unwrap();
        assert_eq!(parsed.config.fragment_payload, 100);
        assert_eq!(parsed.config.reply_timeout_ms, Some(250));
        assert_eq!(parsed.config.server_resend_limit, Config::legacy().server_resend_limit);

        let parsed = parse_args(&args(&["--legacy", "--retries", "9"])).unwrap();
        assert_eq!(parsed.config.reply_timeout_ms, None);
        assert_eq!(parsed.config.max_timeouts, 9);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&args(&["--timeout"])).is_err());
        assert!(parse_args(&args(&["--retries", "many"])).is_err());
        assert!(parse_args(&args(&["--bogus"])).is_err());
    }
}
