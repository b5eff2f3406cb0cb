//! # スケジューリングポリシー
//!
//! 送信成功後に次回送信までどれだけ待つか（待機日数テーブル）と、
//! 新規フォローアップの送信回数上限の既定値をまとめる。
//!
//! どちらもハードコードせず設定値として注入する。

use chrono::Duration;

use crate::{DomainError, value_objects::MaxAttempts};

/// 試行ごとの待機日数テーブル
///
/// k 回目の送信が成功した後、次回送信は `now + delays[k - 1]` に予定する。
/// テーブルより多く送信した場合は最後の値を使い続ける。
///
/// # 不変条件
///
/// - 1 要素以上
/// - 各要素は 1 日以上
///
/// # 使用例
///
/// ```rust
/// use followupmate_domain::schedule::DelayTable;
///
/// let table: DelayTable = "3,7,14".parse().unwrap();
/// assert_eq!(table.delay_after(2).num_days(), 7);
/// assert_eq!(table.delay_after(4).num_days(), 14);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayTable {
    days: Vec<u32>,
}

impl DelayTable {
    pub fn from_days(days: &[u32]) -> Result<Self, DomainError> {
        if days.is_empty() {
            return Err(DomainError::Validation(
                "待機日数テーブルは 1 件以上必要です".to_string(),
            ));
        }
        if days.contains(&0) {
            return Err(DomainError::Validation(
                "待機日数は 1 日以上である必要があります".to_string(),
            ));
        }
        Ok(Self {
            days: days.to_vec(),
        })
    }

    /// `attempt_count` 回目の送信が成功した後の待機期間を返す
    ///
    /// `attempt_count` は送信成功後の累計回数（1 始まり）。0 は 1 として扱う。
    pub fn delay_after(&self, attempt_count: u32) -> Duration {
        let index = (attempt_count.max(1) - 1) as usize;
        let days = self
            .days
            .get(index)
            .or_else(|| self.days.last())
            .copied()
            .unwrap_or(1);
        Duration::days(i64::from(days))
    }

    pub fn days(&self) -> &[u32] {
        &self.days
    }
}

impl Default for DelayTable {
    fn default() -> Self {
        Self {
            days: vec![3, 7, 14],
        }
    }
}

impl std::str::FromStr for DelayTable {
    type Err = DomainError;

    /// カンマ区切りの日数（例: `"3,7,14"`）をパースする
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let days = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<u32>().map_err(|_| {
                    DomainError::Validation(format!("待機日数が数値ではありません: {part}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_days(&days)
    }
}

/// フォローアップのスケジューリングポリシー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUpPolicy {
    pub delays: DelayTable,
    pub default_max_attempts: MaxAttempts,
}

impl Default for FollowUpPolicy {
    fn default() -> Self {
        Self {
            delays: DelayTable::default(),
            default_max_attempts: MaxAttempts::DEFAULT,
        }
    }
}
