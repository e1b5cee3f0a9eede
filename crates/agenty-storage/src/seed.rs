//! Preset providers and models inserted on first startup

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

struct PresetProvider {
    name: &'static str,
    kind: &'static str,
    base_url: &'static str,
    models: &'static [PresetModel],
}

struct PresetModel {
    name: &'static str,
    code: &'static str,
    default_model: bool,
}

const PRESET_PROVIDERS: &[PresetProvider] = &[
    PresetProvider {
        name: "OpenAI",
        kind: "openai",
        base_url: "https://api.openai.com/v1",
        models: &[
            PresetModel {
                name: "GPT-5.3 Codex",
                code: "gpt-5.3-codex",
                default_model: false,
            },
            PresetModel {
                name: "GPT-5.2",
                code: "gpt-5.2",
                default_model: false,
            },
            PresetModel {
                name: "GPT-4o",
                code: "gpt-4o-2024-11-20",
                default_model: false,
            },
        ],
    },
    PresetProvider {
        name: "Google",
        kind: "gemini",
        base_url: "https://generativelanguage.googleapis.com",
        models: &[
            PresetModel {
                name: "Gemini 3.1 Pro Preview",
                code: "gemini-3.1-pro-preview",
                default_model: false,
            },
            PresetModel {
                name: "Gemini 3 Pro Preview",
                code: "gemini-3-pro-preview",
                default_model: false,
            },
            PresetModel {
                name: "Gemini 3 Flash Preview",
                code: "gemini-3-flash-preview",
                default_model: false,
            },
        ],
    },
    PresetProvider {
        name: "Anthropic",
        kind: "anthropic",
        base_url: "https://api.anthropic.com",
        models: &[
            PresetModel {
                name: "Claude Opus 4.6",
                code: "claude-opus-4-6",
                default_model: false,
            },
            PresetModel {
                name: "Claude Sonnet 4.6",
                code: "claude-sonnet-4-6",
                default_model: false,
            },
            PresetModel {
                name: "Claude Haiku 4.5",
                code: "claude-haiku-4-5-20251001",
                default_model: false,
            },
        ],
    },
    PresetProvider {
        name: "Kimi",
        kind: "kimi",
        base_url: "https://api.moonshot.cn/v1",
        models: &[PresetModel {
            name: "Kimi k2.5",
            code: "kimi-k2.5",
            default_model: true,
        }],
    },
];

/// Insert the curated provider/model preset, skipping providers that
/// already exist by (name, kind). API keys start empty; users fill them in.
pub async fn seed_presets(pool: &PgPool) -> Result<()> {
    let mut tx = pool.begin().await?;

    for preset in PRESET_PROVIDERS {
        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM model_providers \
             WHERE name = $1 AND kind = $2 AND deleted_at IS NULL",
        )
        .bind(preset.name)
        .bind(preset.kind)
        .fetch_one(&mut *tx)
        .await?;
        if existing > 0 {
            continue;
        }

        let provider_id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO model_providers (id, name, kind, base_url, api_key) \
             VALUES ($1, $2, $3, $4, '')",
        )
        .bind(provider_id)
        .bind(preset.name)
        .bind(preset.kind)
        .bind(preset.base_url)
        .execute(&mut *tx)
        .await?;
        info!(name = preset.name, "created preset provider");

        for model in preset.models {
            sqlx::query(
                "INSERT INTO models (id, provider_id, name, code, default_model) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(Uuid::now_v7())
            .bind(provider_id)
            .bind(model.name)
            .bind(model.code)
            .bind(model.default_model)
            .execute(&mut *tx)
            .await?;
            info!(
                provider = preset.name,
                model = model.name,
                code = model.code,
                "created preset model"
            );
        }
    }

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_preset_model_is_default() {
        let defaults: usize = PRESET_PROVIDERS
            .iter()
            .flat_map(|p| p.models.iter())
            .filter(|m| m.default_model)
            .count();
        assert_eq!(defaults, 1);
    }

    #[test]
    fn preset_kinds_are_known_tags() {
        for preset in PRESET_PROVIDERS {
            assert!(matches!(
                preset.kind,
                "openai" | "anthropic" | "gemini" | "kimi"
            ));
        }
    }

    #[test]
    fn preset_codes_are_unique_per_provider() {
        for preset in PRESET_PROVIDERS {
            let mut codes: Vec<&str> = preset.models.iter().map(|m| m.code).collect();
            codes.sort();
            codes.dedup();
            assert_eq!(codes.len(), preset.models.len());
        }
    }
}
