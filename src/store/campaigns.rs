//! Campaign repository.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::workflow::Campaign;

#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn insert(&self, campaign: Campaign) -> Result<Campaign, StoreError>;
    async fn get(&self, id: Uuid) -> Result<Campaign, StoreError>;
    async fn update(&self, campaign: Campaign) -> Result<Campaign, StoreError>;
    /// Oldest first.
    async fn list(&self) -> Result<Vec<Campaign>, StoreError>;
    async fn count(&self) -> usize;
}

#[derive(Default)]
pub struct InMemoryCampaigns {
    inner: RwLock<HashMap<Uuid, Campaign>>,
}

fn not_found(id: Uuid) -> StoreError {
    StoreError::NotFound {
        entity: "campaign",
        id: id.to_string(),
    }
}

#[async_trait]
impl CampaignRepository for InMemoryCampaigns {
    async fn insert(&self, campaign: Campaign) -> Result<Campaign, StoreError> {
        campaign.validate()?;
        let mut map = self.inner.write().await;
        if map.contains_key(&campaign.id) {
            return Err(StoreError::DuplicateKey { field: "id".into() });
        }
        map.insert(campaign.id, campaign.clone());
        Ok(campaign)
    }

    async fn get(&self, id: Uuid) -> Result<Campaign, StoreError> {
        self.inner.read().await.get(&id).cloned().ok_or_else(|| not_found(id))
    }

    async fn update(&self, campaign: Campaign) -> Result<Campaign, StoreError> {
        campaign.validate()?;
        let mut map = self.inner.write().await;
        match map.get_mut(&campaign.id) {
            Some(slot) => {
                *slot = campaign.clone();
                Ok(campaign)
            }
            None => Err(not_found(campaign.id)),
        }
    }

    async fn list(&self) -> Result<Vec<Campaign>, StoreError> {
        let mut all: Vec<Campaign> = self.inner.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    async fn count(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_get_update() {
        let repo = InMemoryCampaigns::default();
        let mut c = repo.insert(Campaign::new("Acme", vec!["acme.com".into()])).await.unwrap();
        assert_eq!(repo.get(c.id).await.unwrap(), c);

        c.exploits.push("xss-poc".into());
        repo.update(c.clone()).await.unwrap();
        assert_eq!(repo.get(c.id).await.unwrap().exploits, vec!["xss-poc".to_string()]);
        assert_eq!(repo.count().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let repo = InMemoryCampaigns::default();
        let c = Campaign::new("Acme", vec!["acme.com".into()]);
        repo.insert(c.clone()).await.unwrap();
        assert_eq!(
            repo.insert(c).await,
            Err(StoreError::DuplicateKey { field: "id".into() })
        );
    }

    #[tokio::test]
    async fn test_invalid_campaign_rejected() {
        let repo = InMemoryCampaigns::default();
        assert!(matches!(
            repo.insert(Campaign::new("", vec!["x".into()])).await,
            Err(StoreError::Validation { .. })
        ));
        assert_eq!(repo.count().await, 0);
    }

    #[test]
    fn test_update_unknown_is_not_found() {
        let repo = InMemoryCampaigns::default();
        let c = Campaign::new("Acme", vec!["acme.com".into()]);
        let err = tokio_test::assert_err!(tokio_test::block_on(repo.update(c.clone())));
        assert!(matches!(err, StoreError::NotFound { .. }));

        tokio_test::assert_ok!(tokio_test::block_on(repo.insert(c.clone())));
        tokio_test::assert_ok!(tokio_test::block_on(repo.update(c)));
    }
}
