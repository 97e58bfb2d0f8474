//! 审计服务
//! 有界队列 + 后台落库任务。记录是相对响应的"发射后不管"：
//! 队列写满或存储降级都不会阻塞或失败业务请求，但关闭时队列会被排空。

use crate::{models::audit::AuditEvent, repository::audit_repo::AuditRepository};
use sqlx::PgPool;
use tokio::sync::mpsc;

/// 审计事件入口（可克隆，随 AppState 分发）
#[derive(Clone)]
pub struct AuditService {
    sender: mpsc::Sender<AuditEvent>,
}

/// 后台落库端：持有接收端与仓库，由 bin 持有 JoinHandle 以便关闭时排空
pub struct AuditDrain {
    receiver: mpsc::Receiver<AuditEvent>,
    repo: AuditRepository,
}

impl AuditService {
    /// 创建服务与配套的落库端
    pub fn new(db: PgPool, queue_capacity: usize) -> (Self, AuditDrain) {
        let (sender, receiver) = mpsc::channel(queue_capacity);

        (
            Self { sender },
            AuditDrain {
                receiver,
                repo: AuditRepository::new(db),
            },
        )
    }

    /// 非阻塞投递：队列满时丢弃并告警，绝不拖慢请求
    pub fn record(&self, event: AuditEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {
                metrics::counter!("audit_events_enqueued_total").increment(1);
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                metrics::counter!("audit_events_dropped_total").increment(1);
                tracing::warn!(
                    kind = %event.kind,
                    principal_id = %event.principal_id,
                    "Audit queue full, event dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::warn!(
                    kind = %event.kind,
                    principal_id = %event.principal_id,
                    "Audit drain stopped, event dropped"
                );
            }
        }
    }
}

impl AuditDrain {
    /// 持续消费队列并落库，发送端全部关闭且队列排空后返回
    /// 存储故障只记日志：遥测问题不能影响业务请求
    pub async fn run(mut self) {
        tracing::info!("Audit drain task started");

        while let Some(event) = self.receiver.recv().await {
            if let Err(e) = self.repo.insert(&event).await {
                metrics::counter!("audit_events_failed_total").increment(1);
                tracing::error!(
                    error = %e,
                    kind = %event.kind,
                    principal_id = %event.principal_id,
                    "Failed to persist audit event"
                );
            }
        }

        tracing::info!("Audit drain task finished");
    }
}
