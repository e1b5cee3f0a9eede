//! Model CRUD and default-model rules

use std::collections::HashMap;

use agenty_storage::{ModelDto, ModelStore, PageRequest, PagedResponse, ProviderStore};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use crate::error::{BusinessError, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateModelDto {
    pub provider_id: Uuid,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub default_model: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateModelDto {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub default_model: bool,
}

#[derive(Clone)]
pub struct ModelService {
    models: ModelStore,
    providers: ProviderStore,
}

impl ModelService {
    pub fn new(models: ModelStore, providers: ProviderStore) -> Self {
        Self { models, providers }
    }

    pub async fn get_default(&self) -> Result<ModelDto> {
        let model = self
            .models
            .find_default()
            .await?
            .ok_or_else(BusinessError::model_not_found)?;
        let provider = self
            .providers
            .find(model.provider_id)
            .await?
            .ok_or_else(BusinessError::provider_not_found)?;
        Ok(model.to_dto(Some(provider.to_dto())))
    }

    pub async fn create(&self, dto: CreateModelDto) -> Result<ModelDto> {
        if dto.name.is_empty() || dto.code.is_empty() {
            return Err(BusinessError::invalid_params("name and code are required").into());
        }

        if self.providers.find(dto.provider_id).await?.is_none() {
            return Err(BusinessError::provider_not_found().into());
        }
        if self
            .models
            .name_exists(dto.provider_id, &dto.name, None)
            .await?
        {
            return Err(BusinessError::model_already_exists().into());
        }
        if self
            .models
            .code_exists(dto.provider_id, &dto.code, None)
            .await?
        {
            return Err(BusinessError::model_already_exists().into());
        }

        let model = self
            .models
            .create(dto.provider_id, &dto.name, &dto.code, dto.default_model)
            .await
            .inspect_err(|err| error!(error = %err, "failed to create model"))?;
        Ok(model.to_dto(None))
    }

    pub async fn get(&self, id: Uuid) -> Result<ModelDto> {
        let model = self
            .models
            .find(id)
            .await?
            .ok_or_else(BusinessError::model_not_found)?;
        let provider = self
            .providers
            .find(model.provider_id)
            .await?
            .ok_or_else(BusinessError::provider_not_found)?;
        Ok(model.to_dto(Some(provider.to_dto())))
    }

    pub async fn list(&self, mut page: PageRequest) -> Result<PagedResponse<ModelDto>> {
        page.apply_defaults();
        let (models, total) = self
            .models
            .list(&page)
            .await
            .inspect_err(|err| error!(error = %err, "failed to list models"))?;

        let provider_ids: Vec<Uuid> = {
            let mut ids: Vec<Uuid> = models.iter().map(|m| m.provider_id).collect();
            ids.sort();
            ids.dedup();
            ids
        };
        let providers = if provider_ids.is_empty() {
            Vec::new()
        } else {
            self.providers.find_by_ids(&provider_ids).await?
        };
        let provider_map: HashMap<Uuid, _> =
            providers.iter().map(|p| (p.id, p.to_dto())).collect();

        Ok(PagedResponse {
            total,
            page: page.page,
            page_size: page.page_size,
            data: models
                .iter()
                .map(|m| m.to_dto(provider_map.get(&m.provider_id).cloned()))
                .collect(),
        })
    }

    pub async fn list_by_provider(
        &self,
        provider_id: Uuid,
        mut page: PageRequest,
    ) -> Result<PagedResponse<ModelDto>> {
        page.apply_defaults();
        if self.providers.find(provider_id).await?.is_none() {
            return Err(BusinessError::provider_not_found().into());
        }

        let (models, total) = self.models.list_by_provider(provider_id, &page).await?;
        Ok(PagedResponse {
            total,
            page: page.page,
            page_size: page.page_size,
            data: models.iter().map(|m| m.to_dto(None)).collect(),
        })
    }

    pub async fn update(&self, id: Uuid, dto: UpdateModelDto) -> Result<()> {
        let mut model = self
            .models
            .find(id)
            .await?
            .ok_or_else(BusinessError::model_not_found)?;

        if let Some(name) = dto.name.filter(|n| !n.is_empty()) {
            if name != model.name
                && self
                    .models
                    .name_exists(model.provider_id, &name, Some(id))
                    .await?
            {
                return Err(BusinessError::model_already_exists().into());
            }
            model.name = name;
        }
        if let Some(code) = dto.code.filter(|c| !c.is_empty()) {
            if code != model.code
                && self
                    .models
                    .code_exists(model.provider_id, &code, Some(id))
                    .await?
            {
                return Err(BusinessError::model_already_exists().into());
            }
            model.code = code;
        }

        self.models
            .update_fields(&model)
            .await
            .inspect_err(|err| error!(error = %err, model_id = %id, "failed to update model"))?;
        self.models.set_default(id, dto.default_model).await?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let model = self
            .models
            .find(id)
            .await?
            .ok_or_else(BusinessError::model_not_found)?;

        if model.default_model {
            return Err(BusinessError::deleting_default_model().into());
        }

        self.models
            .soft_delete(id)
            .await
            .inspect_err(|err| error!(error = %err, model_id = %id, "failed to delete model"))?;
        Ok(())
    }
}
