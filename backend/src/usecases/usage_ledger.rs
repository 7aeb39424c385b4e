use chrono::Utc;
use quota_core::domain::{
    entities::usage_events::InsertUsageEventEntity,
    repositories::usage_events::UsageEventRepository,
    value_objects::enums::usage_routes::UsageRoute,
};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Append-only record of billable actions.
pub struct UsageLedger<U>
where
    U: UsageEventRepository + Send + Sync + 'static,
{
    usage_event_repository: Arc<U>,
}

impl<U> UsageLedger<U>
where
    U: UsageEventRepository + Send + Sync + 'static,
{
    pub fn new(usage_event_repository: Arc<U>) -> Self {
        Self {
            usage_event_repository,
        }
    }

    /// Failures are logged and swallowed: the action already happened and must not
    /// fail because of bookkeeping. Counted limits may undercount as a result.
    pub async fn record(&self, user_id: Uuid, route: UsageRoute) -> Option<Uuid> {
        let insert_usage_event_entity = InsertUsageEventEntity {
            user_id,
            route: route.to_string(),
            charged_credit: false,
            created_at: Utc::now(),
        };

        match self
            .usage_event_repository
            .record(insert_usage_event_entity)
            .await
        {
            Ok(event_id) => {
                debug!(%user_id, %route, %event_id, "usage_ledger: event recorded");
                Some(event_id)
            }
            Err(err) => {
                error!(
                    %user_id,
                    %route,
                    db_error = ?err,
                    "usage_ledger: failed to record usage event; continuing"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quota_core::domain::repositories::usage_events::MockUsageEventRepository;

    #[tokio::test]
    async fn records_the_route_tag() {
        let user_id = Uuid::new_v4();
        let event_id = Uuid::new_v4();

        let mut usage_events = MockUsageEventRepository::new();
        usage_events
            .expect_record()
            .withf(move |event| {
                event.user_id == user_id && event.route == "docx-download" && !event.charged_credit
            })
            .times(1)
            .returning(move |_| Ok(event_id));

        let ledger = UsageLedger::new(Arc::new(usage_events));
        assert_eq!(ledger.record(user_id, UsageRoute::DocxDownload).await, Some(event_id));
    }

    #[tokio::test]
    async fn write_failures_are_swallowed() {
        let mut usage_events = MockUsageEventRepository::new();
        usage_events
            .expect_record()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("disk full")));

        let ledger = UsageLedger::new(Arc::new(usage_events));
        assert_eq!(ledger.record(Uuid::new_v4(), UsageRoute::Generation).await, None);
    }
}
