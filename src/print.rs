//! Paper Sizes and Orientation
//!
//! Physical sheet dimensions handed to the export backends.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSize {
    #[default]
    A4,
    A3,
    Letter,
    Legal,
    A5,
}

impl PaperSize {
    pub const ALL: [PaperSize; 5] = [
        PaperSize::A4,
        PaperSize::A3,
        PaperSize::Letter,
        PaperSize::Legal,
        PaperSize::A5,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PaperSize::A4 => "A4 (210 × 297 mm)",
            PaperSize::A3 => "A3 (297 × 420 mm)",
            PaperSize::Letter => "Letter (8.5 × 11 in)",
            PaperSize::Legal => "Legal (8.5 × 14 in)",
            PaperSize::A5 => "A5 (148 × 210 mm)",
        }
    }

    /// Portrait width and height in millimetres.
    pub fn portrait_mm(&self) -> (f64, f64) {
        match self {
            PaperSize::A4 => (210.0, 297.0),
            PaperSize::A3 => (297.0, 420.0),
            PaperSize::Letter => (215.9, 279.4),
            PaperSize::Legal => (215.9, 355.6),
            PaperSize::A5 => (148.0, 210.0),
        }
    }
}

impl FromStr for PaperSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a4" => Ok(PaperSize::A4),
            "a3" => Ok(PaperSize::A3),
            "letter" => Ok(PaperSize::Letter),
            "legal" => Ok(PaperSize::Legal),
            "a5" => Ok(PaperSize::A5),
            other => Err(format!("unknown paper size: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "landscape" => Ok(Orientation::Landscape),
            "portrait" => Ok(Orientation::Portrait),
            other => Err(format!("unknown orientation: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDimensions {
    pub width_mm: f64,
    pub height_mm: f64,
}

pub fn page_dimensions(paper: PaperSize, orientation: Orientation) -> PageDimensions {
    let (width, height) = paper.portrait_mm();
    match orientation {
        Orientation::Portrait => PageDimensions { width_mm: width, height_mm: height },
        Orientation::Landscape => PageDimensions { width_mm: height, height_mm: width },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landscape_swaps_axes() {
        let dims = page_dimensions(PaperSize::A4, Orientation::Landscape);
        assert_eq!((dims.width_mm, dims.height_mm), (297.0, 210.0));
        let dims = page_dimensions(PaperSize::Letter, Orientation::Portrait);
        assert_eq!((dims.width_mm, dims.height_mm), (215.9, 279.4));
    }

    #[test]
    fn test_paper_serde_names() {
        assert_eq!(serde_json::to_string(&PaperSize::Legal).unwrap(), r#""legal""#);
        let o: Orientation = serde_json::from_str(r#""portrait""#).unwrap();
        assert_eq!(o, Orientation::Portrait);
        assert_eq!("Letter".parse::<PaperSize>(), Ok(PaperSize::Letter));
        assert!("tabloid".parse::<PaperSize>().is_err());
    }
}
