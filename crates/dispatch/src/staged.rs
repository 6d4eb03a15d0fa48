//! 단계적 로그 레벨
//!
//! 같은 종류의 실패가 연속되면 처음 몇 번만 크게 기록하고 이후에는 점점
//! 낮은 레벨로 기록합니다. 연속 횟수 n에 대해:
//!
//! | n        | 레벨  |
//! |----------|-------|
//! | 1..=3    | error |
//! | 4..=20   | info  |
//! | 21..     | debug |

/// error 레벨로 기록하는 최대 연속 횟수
pub const LOUD_LIMIT: u32 = 3;

/// info 레벨로 기록하는 최대 연속 횟수
pub const QUIET_LIMIT: u32 = 20;

/// 연속 실패 횟수에 따른 로그 레벨
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagedLevel {
    /// 처음 몇 번의 실패
    Error,
    /// 계속되는 실패
    Info,
    /// 장기간 계속되는 실패
    Debug,
}

impl StagedLevel {
    /// 연속 횟수(1부터)에 해당하는 레벨을 반환합니다.
    pub fn for_streak(n: u32) -> Self {
        if n <= LOUD_LIMIT {
            Self::Error
        } else if n <= QUIET_LIMIT {
            Self::Info
        } else {
            Self::Debug
        }
    }
}

/// 연속 실패 카운터
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Streak {
    count: u32,
}

impl Streak {
    /// 실패 하나를 기록하고 (연속 횟수, 레벨)을 반환합니다.
    pub fn hit(&mut self) -> (u32, StagedLevel) {
        self.count = self.count.saturating_add(1);
        (self.count, StagedLevel::for_streak(self.count))
    }

    /// 카운터를 0으로 되돌리고 직전 연속 횟수를 반환합니다.
    pub fn reset(&mut self) -> u32 {
        std::mem::take(&mut self.count)
    }

    /// 현재 연속 횟수
    pub fn count(&self) -> u32 {
        self.count
    }
}

/// 런타임에 정해진 [`StagedLevel`]로 tracing 이벤트를 기록합니다.
macro_rules! staged_event {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            $crate::staged::StagedLevel::Error => tracing::error!($($arg)+),
            $crate::staged::StagedLevel::Info => tracing::info!($($arg)+),
            $crate::staged::StagedLevel::Debug => tracing::debug!($($arg)+),
        }
    };
}

pub(crate) use staged_event;
