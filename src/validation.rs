//! Document Validation - Rule/Policy Separation
//!
//! Cheap checks run on the raw upload before it reaches the document
//! loader. Rules produce structured violations; any error-severity
//! violation makes the input invalid.

use serde::{Deserialize, Serialize};

pub const PDF_MIME_TYPE: &str = "application/pdf";
const PDF_SIGNATURE: &[u8] = b"%PDF-";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<ValidationViolation>,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == ViolationSeverity::Error)
    }

    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.message.clone()).collect()
    }
}

/// Raw upload as handed over by the caller.
#[derive(Debug, Clone, Copy)]
pub struct DocumentInput<'a> {
    pub bytes: &'a [u8],
    /// Declared MIME type, if the caller knows one.
    pub mime_type: Option<&'a str>,
}

pub trait DocumentRule {
    fn name(&self) -> &'static str;
    fn validate(&self, input: &DocumentInput<'_>) -> Vec<ValidationViolation>;
}

pub struct MimeTypeRule;

impl DocumentRule for MimeTypeRule {
    fn name(&self) -> &'static str { "mime_type" }

    fn validate(&self, input: &DocumentInput<'_>) -> Vec<ValidationViolation> {
        match input.mime_type {
            Some(mime) if mime != PDF_MIME_TYPE => vec![ValidationViolation {
                rule: self.name().to_string(),
                severity: ViolationSeverity::Error,
                message: "Please select a PDF file".to_string(),
                expected: Some(PDF_MIME_TYPE.to_string()),
                actual: Some(mime.to_string()),
            }],
            _ => vec![],
        }
    }
}

pub struct FileSizeRule {
    pub max_bytes: u64,
}

impl DocumentRule for FileSizeRule {
    fn name(&self) -> &'static str { "file_size" }

    fn validate(&self, input: &DocumentInput<'_>) -> Vec<ValidationViolation> {
        let size = input.bytes.len() as u64;
        if size == 0 {
            return vec![ValidationViolation {
                rule: self.name().to_string(),
                severity: ViolationSeverity::Error,
                message: "File appears to be empty".to_string(),
                expected: Some("non-empty file".to_string()),
                actual: Some(format_file_size(0)),
            }];
        }
        if size > self.max_bytes {
            return vec![ValidationViolation {
                rule: self.name().to_string(),
                severity: ViolationSeverity::Error,
                message: format!(
                    "File too large ({}). Maximum size is {}",
                    format_file_size(size),
                    format_file_size(self.max_bytes)
                ),
                expected: Some(format!("<= {}", format_file_size(self.max_bytes))),
                actual: Some(format_file_size(size)),
            }];
        }
        vec![]
    }
}

pub struct SignatureRule;

impl DocumentRule for SignatureRule {
    fn name(&self) -> &'static str { "signature" }

    fn validate(&self, input: &DocumentInput<'_>) -> Vec<ValidationViolation> {
        if input.bytes.is_empty() || input.bytes.starts_with(PDF_SIGNATURE) {
            return vec![];
        }
        let head = &input.bytes[..input.bytes.len().min(PDF_SIGNATURE.len())];
        vec![ValidationViolation {
            rule: self.name().to_string(),
            severity: ViolationSeverity::Error,
            message: "Invalid file signature. The file does not appear to be a valid PDF.".to_string(),
            expected: Some("%PDF-".to_string()),
            actual: Some(String::from_utf8_lossy(head).into_owned()),
        }]
    }
}

/// Runs every rule and collects the violations.
pub struct Validator {
    rules: Vec<Box<dyn DocumentRule>>,
}

impl Validator {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            rules: vec![
                Box::new(MimeTypeRule),
                Box::new(FileSizeRule { max_bytes }),
                Box::new(SignatureRule),
            ],
        }
    }

    pub fn validate(&self, input: &DocumentInput<'_>) -> ValidationResult {
        let violations: Vec<_> = self.rules.iter().flat_map(|rule| rule.validate(input)).collect();
        let valid = !violations.iter().any(|v| v.severity == ViolationSeverity::Error);
        ValidationResult { valid, violations }
    }
}

/// Human readable size with one decimal, e.g. `"1.5 KB"`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(bytes: &[u8], mime: Option<&'static str>) -> ValidationResult {
        Validator::new(1024).validate(&DocumentInput { bytes, mime_type: mime })
    }

    #[test]
    fn test_valid_pdf() {
        let result = input(b"%PDF-1.7\n...", Some(PDF_MIME_TYPE));
        assert!(result.valid);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn test_fake_pdf_is_rejected_by_signature() {
        let result = input(b"This is just a text file, not a real PDF.", Some(PDF_MIME_TYPE));
        assert!(!result.valid);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].rule, "signature");
        assert!(result.violations[0].message.contains("Invalid file signature"));
    }

    #[test]
    fn test_empty_and_oversized() {
        let empty = input(b"", None);
        assert!(!empty.valid);
        assert_eq!(empty.messages(), vec!["File appears to be empty".to_string()]);

        let mut big = b"%PDF-".to_vec();
        big.resize(2048, b' ');
        let result = input(&big, None);
        assert!(result.has_errors());
        assert!(result.violations[0].message.contains("2.0 KB"));
    }

    #[test]
    fn test_wrong_mime_type() {
        let result = input(b"%PDF-1.4", Some("text/plain"));
        assert!(!result.valid);
        assert_eq!(result.violations[0].rule, "mime_type");
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512.0 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(250 * 1024 * 1024), "250.0 MB");
    }
}
