use serde::Serialize;

/// Extraction mode requested by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrMode {
    #[default]
    PlainOcr,
    Markdown,
    TablesCsv,
    TablesMd,
    KvJson,
    FigureChart,
    FindRef,
    LayoutMap,
    PiiRedact,
    Multilingual,
    Describe,
    Freeform,
}

impl OcrMode {
    pub const ALL: [OcrMode; 12] = [
        OcrMode::PlainOcr,
        OcrMode::Markdown,
        OcrMode::TablesCsv,
        OcrMode::TablesMd,
        OcrMode::KvJson,
        OcrMode::FigureChart,
        OcrMode::FindRef,
        OcrMode::LayoutMap,
        OcrMode::PiiRedact,
        OcrMode::Multilingual,
        OcrMode::Describe,
        OcrMode::Freeform,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OcrMode::PlainOcr => "plain_ocr",
            OcrMode::Markdown => "markdown",
            OcrMode::TablesCsv => "tables_csv",
            OcrMode::TablesMd => "tables_md",
            OcrMode::KvJson => "kv_json",
            OcrMode::FigureChart => "figure_chart",
            OcrMode::FindRef => "find_ref",
            OcrMode::LayoutMap => "layout_map",
            OcrMode::PiiRedact => "pii_redact",
            OcrMode::Multilingual => "multilingual",
            OcrMode::Describe => "describe",
            OcrMode::Freeform => "freeform",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|mode| mode.as_str() == s)
    }

    /// Modes whose output is only meaningful with detection boxes
    pub fn requires_grounding(self) -> bool {
        matches!(
            self,
            OcrMode::FindRef | OcrMode::LayoutMap | OcrMode::PiiRedact
        )
    }
}

/// OCR backend a request is routed to.
///
/// DeepSeek takes a multipart upload plus the mode fields and builds its own
/// prompt. The others take a base64 JSON document and also read PDFs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OcrProvider {
    #[default]
    Deepseek,
    Paddleocr,
    Easyocr,
    DotsOcr,
}

impl OcrProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            OcrProvider::Deepseek => "deepseek",
            OcrProvider::Paddleocr => "paddleocr",
            OcrProvider::Easyocr => "easyocr",
            OcrProvider::DotsOcr => "dots-ocr",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "deepseek" | "deepseek-ocr" => Some(OcrProvider::Deepseek),
            "paddleocr" | "paddle" => Some(OcrProvider::Paddleocr),
            "easyocr" => Some(OcrProvider::Easyocr),
            "dots-ocr" | "dots_ocr" | "dots" => Some(OcrProvider::DotsOcr),
            _ => None,
        }
    }

    pub fn accepts_pdf(self) -> bool {
        !matches!(self, OcrProvider::Deepseek)
    }
}

/// Everything a request asks of the provider
#[derive(Debug, Clone, Default)]
pub struct OcrOptions {
    pub provider: OcrProvider,
    pub mode: OcrMode,
    pub prompt: Option<String>,
    pub grounding: bool,
    pub include_caption: bool,
    pub find_term: Option<String>,
    pub schema: Option<String>,
}

impl OcrOptions {
    /// Grounding as applied by the provider
    pub fn effective_grounding(&self) -> bool {
        self.grounding || self.mode.requires_grounding()
    }

    /// Text fields of the multipart upload, next to the `image` part
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("mode", self.mode.as_str().to_string()),
            ("prompt", self.prompt.clone().unwrap_or_default()),
            ("grounding", self.grounding.to_string()),
            ("include_caption", self.include_caption.to_string()),
        ];
        if let Some(term) = non_blank(&self.find_term) {
            fields.push(("find_term", term.to_string()));
        }
        if let Some(schema) = non_blank(&self.schema) {
            fields.push(("schema", schema.to_string()));
        }
        fields
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field<'a>(fields: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
        fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn every_mode_parses_back() {
        for mode in OcrMode::ALL {
            assert_eq!(OcrMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(OcrMode::parse("handwriting"), None);
    }

    #[test]
    fn locating_modes_force_grounding() {
        for mode in [OcrMode::FindRef, OcrMode::LayoutMap, OcrMode::PiiRedact] {
            let options = OcrOptions {
                mode,
                ..Default::default()
            };
            assert!(options.effective_grounding());
        }
        assert!(!OcrOptions::default().effective_grounding());
    }

    #[test]
    fn provider_names_and_pdf_support() {
        assert_eq!(OcrProvider::parse(""), Some(OcrProvider::Deepseek));
        assert_eq!(OcrProvider::parse("PaddleOCR"), Some(OcrProvider::Paddleocr));
        assert_eq!(OcrProvider::parse("dots_ocr"), Some(OcrProvider::DotsOcr));
        assert_eq!(OcrProvider::parse("tesseract"), None);
        assert!(!OcrProvider::Deepseek.accepts_pdf());
        assert!(OcrProvider::Easyocr.accepts_pdf());
        assert_eq!(
            serde_json::to_value(OcrProvider::DotsOcr).unwrap(),
            serde_json::json!("dots-ocr")
        );
    }

    #[test]
    fn form_carries_mode_inputs_verbatim() {
        let options = OcrOptions {
            mode: OcrMode::KvJson,
            include_caption: true,
            find_term: Some(" Invoice No ".to_string()),
            schema: Some("{\"total\":\"\"}".to_string()),
            ..Default::default()
        };
        let fields = options.form_fields();
        assert_eq!(field(&fields, "mode"), Some("kv_json"));
        assert_eq!(field(&fields, "schema"), Some("{\"total\":\"\"}"));
        assert_eq!(field(&fields, "find_term"), Some("Invoice No"));
        assert_eq!(field(&fields, "include_caption"), Some("true"));
        assert_eq!(field(&fields, "grounding"), Some("false"));
        assert_eq!(field(&fields, "prompt"), Some(""));
    }

    #[test]
    fn freeform_prompt_is_sent_without_markers() {
        let options = OcrOptions {
            mode: OcrMode::Freeform,
            prompt: Some("Read the stamp".to_string()),
            ..Default::default()
        };
        let fields = options.form_fields();
        assert_eq!(field(&fields, "prompt"), Some("Read the stamp"));
        assert!(field(&fields, "find_term").is_none());
        assert!(field(&fields, "schema").is_none());
    }
}
