//! Named configuration presets served by the backend.
//!
//! The cache is filled once, at start-up, from `GET /api/config-presets`.
//! Presets are optional: a failed fetch is logged and leaves the cache empty,
//! and every later lookup simply misses.

use crate::config::Language;
use crate::dispatch::Transport;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// A named bundle of configuration values.
///
/// Every field is optional on the wire. Missing strings read as `""` and
/// missing booleans as `false`, which is exactly what applying the preset
/// writes into the form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    /// Human-readable label, e.g. "Academic Paper".
    pub name: String,
    pub pdf_engine: String,
    pub document_class: String,
    pub geometry: String,
    pub fontsize: String,
    pub mainfont: String,
    pub linestretch: String,
    pub colorlinks: bool,
    pub number_sections: bool,
    pub toc: bool,
    /// Raw language code; see [`Preset::language`].
    pub language: String,
    pub cjk_mainfont: String,
    pub cjk_sansfont: String,
    pub cjk_monofont: String,
}

impl Preset {
    /// The preset's language. Unknown codes are treated as no language.
    pub fn language(&self) -> Language {
        Language::from_code(&self.language).unwrap_or_else(|| {
            warn!("Preset '{}' has unknown language '{}'", self.name, self.language);
            Language::None
        })
    }
}

/// Process-lifetime store of presets, keyed by preset id.
#[derive(Debug, Clone, Default)]
pub struct PresetsCache {
    presets: HashMap<String, Preset>,
    loaded: bool,
}

impl PresetsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from an already-fetched map.
    pub fn from_map(presets: HashMap<String, Preset>) -> Self {
        Self {
            presets,
            loaded: true,
        }
    }

    /// Fetch presets once. Later calls are no-ops; failures leave the cache empty.
    pub async fn load<T: Transport + ?Sized>(&mut self, transport: &T) {
        if self.loaded {
            debug!("Presets already loaded; skipping fetch");
            return;
        }
        self.loaded = true;
        match transport.fetch_presets().await {
            Ok(presets) => {
                info!("Loaded {} presets", presets.len());
                self.presets = presets;
            }
            Err(e) => {
                warn!("Failed to load presets: {}", e);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Preset> {
        self.presets.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    /// All presets sorted by id.
    pub fn list(&self) -> Vec<(&str, &Preset)> {
        let mut entries: Vec<(&str, &Preset)> = self
            .presets
            .iter()
            .map(|(id, p)| (id.as_str(), p))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::tests::FakeTransport;

    const PRESETS_JSON: &str = r#"{
        "simple": {
            "name": "Simple Document",
            "pdf_engine": "xelatex",
            "document_class": "article",
            "geometry": "margin=1in",
            "fontsize": "12pt",
            "mainfont": "",
            "linestretch": "",
            "colorlinks": true,
            "number_sections": false,
            "toc": false
        },
        "japanese": {
            "name": "Japanese Document",
            "pdf_engine": "xelatex",
            "document_class": "article",
            "geometry": "a4paper,margin=2cm",
            "fontsize": "12pt",
            "colorlinks": true,
            "language": "ja",
            "cjk_mainfont": "MS Mincho",
            "cjk_sansfont": "MS Gothic",
            "east_asian_line_breaks": true
        }
    }"#;

    #[test]
    fn deserialises_backend_payload() {
        let map: HashMap<String, Preset> = serde_json::from_str(PRESETS_JSON).unwrap();
        let ja = &map["japanese"];
        assert_eq!(ja.language(), Language::Japanese);
        assert_eq!(ja.cjk_sansfont, "MS Gothic");
        assert_eq!(ja.mainfont, "", "missing strings read as empty");
        assert!(!ja.toc);
        assert_eq!(map["simple"].language(), Language::None);
    }

    #[test]
    fn unknown_language_is_none() {
        let p = Preset {
            language: "fr".into(),
            ..Preset::default()
        };
        assert_eq!(p.language(), Language::None);
    }

    #[test]
    fn list_is_sorted() {
        let map: HashMap<String, Preset> = serde_json::from_str(PRESETS_JSON).unwrap();
        let cache = PresetsCache::from_map(map);
        let ids: Vec<&str> = cache.list().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["japanese", "simple"]);
    }

    #[tokio::test]
    async fn load_failure_leaves_cache_empty() {
        let transport = FakeTransport::new().with_presets_error();
        let mut cache = PresetsCache::new();
        cache.load(&transport).await;
        assert!(cache.is_empty());
        assert!(cache.get("simple").is_none());
    }

    #[tokio::test]
    async fn load_fetches_once() {
        let map: HashMap<String, Preset> = serde_json::from_str(PRESETS_JSON).unwrap();
        let transport = FakeTransport::new().with_presets(map);
        let mut cache = PresetsCache::new();
        cache.load(&transport).await;
        cache.load(&transport).await;
        assert_eq!(cache.len(), 2);
        assert_eq!(transport.preset_fetches(), 1);
    }
}
