use serde::Serialize;
use tracing::info;

use crate::error::{DomainError, ServiceResult};
use crate::identity::Actor;
use crate::ids::{ChannelId, SubscriptionId, UserId};
use crate::models::{UserSummary, now};
use crate::pagination::{Page, PageRequest};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubscriptionToggle {
    pub subscribed: bool,
}

#[derive(Clone)]
pub struct SubscriptionService {
    store: Store,
}

impl SubscriptionService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Subscribes to `channel`, or unsubscribes when already subscribed.
    pub async fn toggle(&self, actor: Actor, channel: ChannelId) -> ServiceResult<SubscriptionToggle> {
        let subscriber = actor.resolve(&self.store).await?;
        if subscriber == UserId::from(channel) {
            return Err(DomainError::validation("You cannot subscribe to yourself"));
        }
        self.require_channel(channel).await?;

        if self.store.delete_subscription(subscriber, channel).await? {
            info!(subscriber = %subscriber, channel = %channel, "unsubscribed");
            return Ok(SubscriptionToggle { subscribed: false });
        }
        self.store
            .insert_subscription(SubscriptionId::new(), subscriber, channel, now())
            .await?;
        info!(subscriber = %subscriber, channel = %channel, "subscribed");
        Ok(SubscriptionToggle { subscribed: true })
    }

    pub async fn list_subscribers(
        &self,
        channel: ChannelId,
        page: PageRequest,
    ) -> ServiceResult<Page<UserSummary>> {
        self.require_channel(channel).await?;
        let (items, total) = tokio::try_join!(
            self.store.list_subscribers(channel, page),
            self.store.count_subscribers(channel),
        )?;
        Ok(Page::new(items, page, total))
    }

    pub async fn list_subscriptions(
        &self,
        actor: Actor,
        page: PageRequest,
    ) -> ServiceResult<Page<UserSummary>> {
        let subscriber = actor.resolve(&self.store).await?;
        let (items, total) = tokio::try_join!(
            self.store.list_subscriptions(subscriber, page),
            self.store.count_subscriptions(subscriber),
        )?;
        Ok(Page::new(items, page, total))
    }

    async fn require_channel(&self, channel: ChannelId) -> ServiceResult<()> {
        if self.store.user_exists(UserId::from(channel)).await? {
            Ok(())
        } else {
            Err(DomainError::not_found("Channel not found"))
        }
    }
}
