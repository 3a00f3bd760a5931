//! 메시지 단편화
//!
//! 메시지를 `max_payload` 바이트 이하 조각으로 나누고 1부터 시퀀스를 붙인다.
//! 마지막 조각에는 `is_last`가 표시되며, 메시지 길이가 조각 크기의 배수이면
//! 메시지 끝을 알리기 위해 빈 조각을 하나 더 만든다.

use bytes::Bytes;

use crate::{Error, Result, PAYLOAD_CAPACITY};

/// 단편 (데이터 프레임 하나의 페이로드)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub sequence: i16,
    pub payload: Bytes,
    pub is_last: bool,
}

/// 단편 생성기
///
/// 한 번만 순회할 수 있는 지연 반복자
#[derive(Debug)]
pub struct Fragmenter {
    message: Bytes,
    max_payload: usize,
    offset: usize,
    next_sequence: i16,
    done: bool,
}

impl Fragmenter {
    pub fn new(message: Bytes, max_payload: usize) -> Result<Self> {
        if max_payload == 0 || max_payload >= PAYLOAD_CAPACITY {
            return Err(Error::InvalidConfig(format!(
                "단편 크기는 1 ~ {} 범위여야 함: {}",
                PAYLOAD_CAPACITY - 1,
                max_payload
            )));
        }

        let total = message.len() / max_payload + 1;
        if total > i16::MAX as usize {
            return Err(Error::MessageTooLong {
                len: message.len(),
                max: (i16::MAX as usize - 1) * max_payload,
            });
        }

        Ok(Self {
            message,
            max_payload,
            offset: 0,
            next_sequence: 1,
            done: false,
        })
    }

    /// 생성될 전체 단편 수
    pub fn total(&self) -> usize {
        self.message.len() / self.max_payload + 1
    }
}

impl Iterator for Fragmenter {
    type Item = Fragment;

    fn next(&mut self) -> Option<Fragment> {
        if self.done {
            return None;
        }

        let remaining = self.message.len() - self.offset;
        let take = remaining.min(self.max_payload);
        let payload = self.message.slice(self.offset..self.offset + take);
        self.offset += take;

        // 딱 맞게 나누어 떨어진 경우 다음 호출에서 빈 조각이 마지막이 됨
        let is_last = take < self.max_payload;
        let fragment = Fragment {
            sequence: self.next_sequence,
            payload,
            is_last,
        };

        if is_last {
            self.done = true;
        } else {
            self.next_sequence += 1;
        }
        Some(fragment)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let left = (self.message.len() - self.offset) / self.max_payload + 1;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Fragmenter {}

impl std::iter::FusedIterator for Fragmenter {}
