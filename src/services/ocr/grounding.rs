//! Detection blocks embedded in grounded OCR output.
//!
//! Grounded providers annotate text as
//! `<|ref|>label<|/ref|><|det|>[[x1,y1,x2,y2], ...]<|/det|>` with coordinates
//! on a 0..999 grid regardless of the image size.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

/// Upper bound of the normalized coordinate grid
const GRID_MAX: f64 = 999.0;

static DET_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)<\|ref\|>(?P<label>.*?)<\|/ref\|>\s*<\|det\|>\s*(?P<coords>\[.*?\])\s*<\|/det\|>",
    )
    .expect("valid detection regex")
});

static GROUNDING_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<\|grounding\|>").expect("valid grounding regex"));

/// A labelled box in image pixels
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub label: String,
    #[serde(rename = "box")]
    pub bbox: [i64; 4],
}

/// Whether the text carries any grounding markup worth parsing
pub fn has_grounding(text: &str) -> bool {
    text.contains("<|det|>") || text.contains("<|ref|>") || text.contains("<|grounding|>")
}

fn scale(value: f64, extent: u32) -> i64 {
    (value * f64::from(extent) / GRID_MAX) as i64
}

// Accepts `[x1,y1,x2,y2]` as well as `[[x1,y1,x2,y2], ...]`
fn coordinate_sets(coords: &str) -> Option<Vec<Vec<Value>>> {
    let parsed: Value = serde_json::from_str(coords).ok()?;
    let items = parsed.as_array()?;

    if items.len() == 4 && items.iter().all(Value::is_number) {
        return Some(vec![items.clone()]);
    }

    Some(
        items
            .iter()
            .filter_map(|item| item.as_array().cloned())
            .collect(),
    )
}

/// Extracts every detection, scaled to `width` x `height` pixels.
/// Blocks whose coordinates fail to parse are skipped.
pub fn parse_detections(text: &str, width: u32, height: u32) -> Vec<Detection> {
    let mut detections = Vec::new();

    for captures in DET_BLOCK.captures_iter(text) {
        let label = captures["label"].trim().to_string();
        let Some(sets) = coordinate_sets(captures["coords"].trim()) else {
            tracing::debug!(label = %label, "Skipping unparseable detection block");
            continue;
        };

        for set in sets {
            let numbers: Vec<f64> = set.iter().filter_map(Value::as_f64).collect();
            if numbers.len() < 4 || numbers.len() != set.len() {
                continue;
            }
            detections.push(Detection {
                label: label.clone(),
                bbox: [
                    scale(numbers[0], width),
                    scale(numbers[1], height),
                    scale(numbers[2], width),
                    scale(numbers[3], height),
                ],
            });
        }
    }

    detections
}

/// Replaces detection blocks with their labels and drops grounding markers
pub fn clean_grounding_text(text: &str) -> String {
    let cleaned = DET_BLOCK.replace_all(text, "$label");
    GROUNDING_TAG.replace_all(&cleaned, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_single_box_to_image_pixels() {
        let text = "<|ref|>Total<|/ref|><|det|>[[0, 0, 999, 999]]<|/det|>";
        let detections = parse_detections(text, 800, 600);
        assert_eq!(
            detections,
            vec![Detection {
                label: "Total".to_string(),
                bbox: [0, 0, 800, 600],
            }]
        );
    }

    #[test]
    fn accepts_flat_and_multiple_boxes() {
        let text = "<|ref|>a<|/ref|><|det|>[100, 200, 300, 400]<|/det|>\n\
                    <|ref|>b<|/ref|><|det|>[[504, 700, 625, 910], [771, 570, 996, 996]]<|/det|>";
        let detections = parse_detections(text, 999, 999);
        assert_eq!(detections.len(), 3);
        assert_eq!(detections[0].bbox, [100, 200, 300, 400]);
        assert_eq!(detections[1].label, "b");
        assert_eq!(detections[2].bbox, [771, 570, 996, 996]);
    }

    #[test]
    fn malformed_blocks_are_skipped() {
        let text = "<|ref|>bad<|/ref|><|det|>[[1, 2, oops]]<|/det|> \
                    <|ref|>short<|/ref|><|det|>[[1, 2]]<|/det|> \
                    <|ref|>good<|/ref|><|det|>[[10, 10, 20, 20]]<|/det|>";
        let detections = parse_detections(text, 999, 999);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "good");
    }

    #[test]
    fn cleaning_keeps_labels() {
        let text = "<|grounding|>Amount: <|ref|>42.00<|/ref|><|det|>[[1,2,3,4]]<|/det|> EUR";
        assert_eq!(clean_grounding_text(text), "Amount: 42.00 EUR");
        assert!(has_grounding(text));
        assert!(!has_grounding("plain text"));
    }
}
