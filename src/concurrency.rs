//! 乐观并发控制契约
//! 所有带版本号实体的写入统一走"单条条件更新"：
//! 校验存储版本等于期望版本并原子地 +1，而不是读取后写回

use crate::error::AppError;

/// 条件写入的三态结果
/// Conflict 与 NotFound 必须区分：调用方要能分辨"被别人改了"与"不存在"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// 写入成功，携带新版本号（= 期望版本 + 1）
    Applied { new_version: i64 },
    /// 实体存在但版本不匹配，存储状态未改变
    Conflict,
    /// 实体不存在或已被软删除
    NotFound,
}

impl WriteOutcome {
    /// 由条件更新的影响行数与后续存在性探测推导结果
    /// 0 行且实体仍存在 ⇒ 版本冲突；0 行且不存在 ⇒ NotFound
    pub fn resolve(rows_affected: u64, expected_version: i64, still_exists: bool) -> Self {
        if rows_affected > 0 {
            WriteOutcome::Applied {
                new_version: expected_version + 1,
            }
        } else if still_exists {
            WriteOutcome::Conflict
        } else {
            WriteOutcome::NotFound
        }
    }

    /// 转换为错误：Conflict 要求调用方携带最新版本重试，绝不自动重试
    pub fn require_applied(self, entity: &str) -> Result<i64, AppError> {
        match self {
            WriteOutcome::Applied { new_version } => Ok(new_version),
            WriteOutcome::Conflict => {
                metrics::counter!("version_conflict_total").increment(1);
                Err(AppError::VersionConflict(entity.to_string()))
            }
            WriteOutcome::NotFound => Err(AppError::not_found(entity)),
        }
    }
}
