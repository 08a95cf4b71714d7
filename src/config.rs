//! Configuração do tankflow carregada a partir de `tankflow.toml`.
//!
//! A struct [`TankflowConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `TANKFLOW_STORE` tem precedência sobre o arquivo.

use serde::Deserialize;
use std::path::Path;

use crate::error::TankflowError;
use crate::workflow::ValidationRules;

/// Configuração de nível superior carregada de `tankflow.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct TankflowConfig {
    /// Caminho do arquivo JSON que guarda os jobs de transporte.
    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// Mínimo de fotos de prova exigidas por entrega.
    #[serde(default = "default_min_delivery_photos")]
    pub min_delivery_photos: usize,

    /// Leitura máxima plausível do odômetro, em km.
    #[serde(default = "default_odometer_max_km")]
    pub odometer_max_km: u32,
}

// Valor padrão do caminho do store: "tankflow-jobs.json".
fn default_store_path() -> String {
    "tankflow-jobs.json".to_string()
}

// Valor padrão de fotos por entrega: 1.
fn default_min_delivery_photos() -> usize {
    1
}

// Valor padrão do teto do odômetro: 2.000.000 km.
fn default_odometer_max_km() -> u32 {
    2_000_000
}

impl Default for TankflowConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            min_delivery_photos: default_min_delivery_photos(),
            odometer_max_km: default_odometer_max_km(),
        }
    }
}

impl TankflowConfig {
    /// Carrega a configuração de `tankflow.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self, TankflowError> {
        Self::load_from(Path::new("tankflow.toml"))
    }

    fn load_from(path: &Path) -> Result<Self, TankflowError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<TankflowConfig>(&contents)?
        } else {
            Self::default()
        };

        // A variável de ambiente tem precedência sobre o arquivo para o
        // caminho do store.
        if let Ok(store) = std::env::var("TANKFLOW_STORE")
            && !store.is_empty()
        {
            config.store_path = store;
        }

        Ok(config)
    }

    /// Regras de validação derivadas da configuração.
    pub fn rules(&self) -> ValidationRules {
        ValidationRules {
            min_delivery_photos: self.min_delivery_photos,
            odometer_max_km: self.odometer_max_km,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = TankflowConfig::default();
        assert_eq!(config.store_path, "tankflow-jobs.json");
        assert_eq!(config.min_delivery_photos, 1);
        assert_eq!(config.odometer_max_km, 2_000_000);
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            store_path = "/var/lib/tankflow/jobs.json"
            min_delivery_photos = 2
        "#;
        let config: TankflowConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.store_path, "/var/lib/tankflow/jobs.json");
        assert_eq!(config.min_delivery_photos, 2);
        assert_eq!(config.odometer_max_km, 2_000_000);
    }

    #[test]
    fn invalid_toml_surfaces_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tankflow.toml");
        std::fs::write(&path, "store_path = [not valid").unwrap();

        let err = TankflowConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, TankflowError::Toml(_)));
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TankflowConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.min_delivery_photos, 1);
    }

    #[test]
    fn rules_carry_config_values() {
        let config: TankflowConfig = toml::from_str("min_delivery_photos = 3").unwrap();
        let rules = config.rules();
        assert_eq!(rules.min_delivery_photos, 3);
        assert_eq!(rules.odometer_max_km, 2_000_000);
    }
}
