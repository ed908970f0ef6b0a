//! Form state and the configuration collector.
//!
//! [`FormState`] mirrors the inputs a front-end exposes: text fields, flag
//! checkboxes, and one checkbox per East Asian language. The language
//! checkboxes are mutually exclusive at input time ([`FormState::set_language`])
//! and the exclusivity is re-derived by [`FormState::collect`], so even a
//! form whose checkboxes were poked directly yields a consistent record.

use crate::config::{
    ConversionConfig, Language, DEFAULT_DOCUMENT_CLASS, DEFAULT_FONTSIZE, DEFAULT_GEOMETRY,
    DEFAULT_PDF_ENGINE,
};
use crate::presets::Preset;
use tracing::debug;

/// Current values of every configuration input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    pub pdf_engine: String,
    pub document_class: String,
    pub geometry: String,
    pub fontsize: String,
    pub mainfont: String,
    pub linestretch: String,
    pub colorlinks: bool,
    pub number_sections: bool,
    pub toc: bool,
    pub language_zh: bool,
    pub language_ja: bool,
    pub language_ko: bool,
    pub cjk_mainfont: String,
    pub cjk_sansfont: String,
    pub cjk_monofont: String,
    /// Id of the preset last applied, if any.
    pub selected_preset: Option<String>,
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            pdf_engine: DEFAULT_PDF_ENGINE.to_string(),
            document_class: DEFAULT_DOCUMENT_CLASS.to_string(),
            geometry: DEFAULT_GEOMETRY.to_string(),
            fontsize: DEFAULT_FONTSIZE.to_string(),
            mainfont: String::new(),
            linestretch: String::new(),
            colorlinks: true,
            number_sections: false,
            toc: false,
            language_zh: false,
            language_ja: false,
            language_ko: false,
            cjk_mainfont: String::new(),
            cjk_sansfont: String::new(),
            cjk_monofont: String::new(),
            selected_preset: None,
        }
    }
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the form into a [`ConversionConfig`].
    ///
    /// Pure: the form is not modified. If several language checkboxes are
    /// set, the first of zh, ja, ko wins.
    pub fn collect(&self) -> ConversionConfig {
        ConversionConfig {
            pdf_engine: self.pdf_engine.clone(),
            document_class: self.document_class.clone(),
            geometry: self.geometry.clone(),
            fontsize: self.fontsize.clone(),
            mainfont: self.mainfont.clone(),
            linestretch: self.linestretch.clone(),
            colorlinks: self.colorlinks,
            number_sections: self.number_sections,
            toc: self.toc,
            language: self.language(),
            cjk_mainfont: self.cjk_mainfont.clone(),
            cjk_sansfont: self.cjk_sansfont.clone(),
            cjk_monofont: self.cjk_monofont.clone(),
        }
    }

    /// The language implied by the checkboxes.
    pub fn language(&self) -> Language {
        if self.language_zh {
            Language::Chinese
        } else if self.language_ja {
            Language::Japanese
        } else if self.language_ko {
            Language::Korean
        } else {
            Language::None
        }
    }

    /// Check or uncheck one language box. Checking one unchecks the others.
    ///
    /// `Language::None` with `checked = true` clears every box.
    pub fn set_language(&mut self, language: Language, checked: bool) {
        if checked {
            self.language_zh = language == Language::Chinese;
            self.language_ja = language == Language::Japanese;
            self.language_ko = language == Language::Korean;
            return;
        }
        match language {
            Language::Chinese => self.language_zh = false,
            Language::Japanese => self.language_ja = false,
            Language::Korean => self.language_ko = false,
            Language::None => {}
        }
    }

    fn clear_languages(&mut self) {
        self.language_zh = false;
        self.language_ja = false;
        self.language_ko = false;
    }

    /// Whether the CJK font override inputs should be shown.
    pub fn cjk_fonts_visible(&self) -> bool {
        self.language_zh || self.language_ja || self.language_ko
    }

    /// Overwrite every field from `preset` and remember `id` as selected.
    pub fn apply_preset(&mut self, id: &str, preset: &Preset) {
        debug!("Applying preset '{}'", id);
        self.pdf_engine = preset.pdf_engine.clone();
        self.document_class = preset.document_class.clone();
        self.geometry = preset.geometry.clone();
        self.fontsize = preset.fontsize.clone();
        self.mainfont = preset.mainfont.clone();
        self.linestretch = preset.linestretch.clone();
        self.colorlinks = preset.colorlinks;
        self.number_sections = preset.number_sections;
        self.toc = preset.toc;

        self.clear_languages();
        self.set_language(preset.language(), true);

        self.cjk_mainfont = preset.cjk_mainfont.clone();
        self.cjk_sansfont = preset.cjk_sansfont.clone();
        self.cjk_monofont = preset.cjk_monofont.clone();
        self.selected_preset = Some(id.to_string());
    }

    /// The "custom" entry of the preset selector: forget the preset and
    /// uncheck the languages, leaving the other inputs as they are.
    pub fn select_custom(&mut self) {
        self.selected_preset = None;
        self.clear_languages();
    }

    /// Restore defaults and clear the selected preset.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
