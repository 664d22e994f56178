//! 操作进度事件与状态机
//!
//! pending → submitted → (proving → finalizing)? → completed | failed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Pending,
    Submitted,
    Proving,
    Finalizing,
    Completed,
    Failed,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Submitted => "submitted",
            Self::Proving => "proving",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// 进度事件（瞬时，推送到事件总线后不保留）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// 本次操作的 ID（同一操作的所有事件共享）
    pub operation_id: Uuid,
    /// "transfer" / "bridge"
    pub operation_type: String,
    pub status: ProgressStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(operation_id: Uuid, operation_type: impl Into<String>, status: ProgressStatus) -> Self {
        Self {
            operation_id,
            operation_type: operation_type.into(),
            status,
            chain_id: None,
            transaction_hash: None,
            message: None,
            recipient: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_chain(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_transaction_hash(mut self, hash: impl Into<String>) -> Self {
        self.transaction_hash = Some(hash.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_recipient(mut self, recipient: Option<String>) -> Self {
        self.recipient = recipient;
        self
    }
}

/// 状态转换规则
pub struct ProgressStateMachine;

impl ProgressStateMachine {
    /// 验证状态转换是否合法
    pub fn can_transition(from: ProgressStatus, to: ProgressStatus) -> bool {
        use ProgressStatus::*;

        matches!(
            (from, to),
            // 正常流程
            (Pending, Submitted)
            | (Submitted, Proving)
            | (Proving, Finalizing)
            | (Finalizing, Completed)
            // 同环境操作不经过证明阶段
            | (Pending, Completed)
            | (Submitted, Completed)

            // 失败分支
            | (Pending, Failed)
            | (Submitted, Failed)
            | (Proving, Failed)
            | (Finalizing, Failed)
        )
    }
}
