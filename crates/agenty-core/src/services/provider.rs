//! Provider CRUD

use agenty_ai::ApiKind;
use agenty_storage::{ModelProviderDto, PageRequest, PagedResponse, ProviderStore};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use crate::error::{BusinessError, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProviderDto {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProviderDto {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Clone)]
pub struct ProviderService {
    store: ProviderStore,
}

impl ProviderService {
    pub fn new(store: ProviderStore) -> Self {
        Self { store }
    }

    pub async fn create(&self, dto: CreateProviderDto) -> Result<ModelProviderDto> {
        if dto.name.is_empty() || dto.base_url.is_empty() {
            return Err(BusinessError::invalid_params("name and baseUrl are required").into());
        }
        if ApiKind::from_tag(&dto.kind).is_none() {
            return Err(
                BusinessError::invalid_params(format!("unknown provider type: {}", dto.kind))
                    .into(),
            );
        }

        if self
            .store
            .name_exists(&dto.name, None)
            .await
            .inspect_err(|err| error!(error = %err, "failed to check provider existence"))?
        {
            return Err(BusinessError::provider_already_exists().into());
        }

        let provider = self
            .store
            .create(&dto.name, &dto.kind, &dto.base_url, &dto.api_key)
            .await
            .inspect_err(|err| error!(error = %err, "failed to create provider"))?;
        Ok(provider.to_dto())
    }

    pub async fn get(&self, id: Uuid) -> Result<ModelProviderDto> {
        let provider = self
            .store
            .find(id)
            .await?
            .ok_or_else(BusinessError::provider_not_found)?;
        Ok(provider.to_dto())
    }

    pub async fn list(&self, mut page: PageRequest) -> Result<PagedResponse<ModelProviderDto>> {
        page.apply_defaults();
        let (providers, total) = self
            .store
            .list(&page)
            .await
            .inspect_err(|err| error!(error = %err, "failed to list providers"))?;

        Ok(PagedResponse {
            total,
            page: page.page,
            page_size: page.page_size,
            data: providers.iter().map(|p| p.to_dto()).collect(),
        })
    }

    pub async fn update(&self, id: Uuid, dto: UpdateProviderDto) -> Result<ModelProviderDto> {
        let mut provider = self
            .store
            .find(id)
            .await?
            .ok_or_else(BusinessError::provider_not_found)?;

        if let Some(name) = dto.name.filter(|n| !n.is_empty()) {
            if name != provider.name && self.store.name_exists(&name, Some(id)).await? {
                return Err(BusinessError::provider_already_exists().into());
            }
            provider.name = name;
        }
        if let Some(kind) = dto.kind.filter(|k| !k.is_empty()) {
            if ApiKind::from_tag(&kind).is_none() {
                return Err(
                    BusinessError::invalid_params(format!("unknown provider type: {}", kind))
                        .into(),
                );
            }
            provider.kind = kind;
        }
        if let Some(base_url) = dto.base_url.filter(|u| !u.is_empty()) {
            provider.base_url = base_url;
        }
        if let Some(api_key) = dto.api_key.filter(|k| !k.is_empty()) {
            provider.api_key = api_key;
        }

        self.store
            .update(&provider)
            .await
            .inspect_err(|err| error!(error = %err, provider_id = %id, "failed to update provider"))?;
        Ok(provider.to_dto())
    }

    pub async fn delete(&self, id: Uuid, force: bool) -> Result<()> {
        if self.store.find(id).await?.is_none() {
            return Err(BusinessError::provider_not_found().into());
        }

        let deleted = self
            .store
            .soft_delete(id, force)
            .await
            .inspect_err(|err| error!(error = %err, provider_id = %id, "failed to delete provider"))?;
        if !deleted {
            return Err(BusinessError::provider_in_use().into());
        }
        Ok(())
    }
}
