//! Layout Digests
//!
//! A layout fingerprint is everything that decides what prints where: the
//! grid, the paper and the composed cells. `created_at` and other manifest
//! metadata are left out, so equal store states digest equally whenever
//! the manifest is built.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::compose::ComposedCell;
use crate::print::PageDimensions;
use crate::templates::TemplateId;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutFingerprint<'a> {
    pub template_id: Option<TemplateId>,
    pub rows: usize,
    pub cols: usize,
    pub sheets: usize,
    pub dimensions: PageDimensions,
    pub cells: &'a [ComposedCell],
}

impl LayoutFingerprint<'_> {
    /// Lowercase hex SHA-256 of the fingerprint's JSON form. Field order is
    /// fixed by the struct definitions, so the encoding is stable.
    pub fn digest(&self) -> Result<String, serde_json::Error> {
        let mut hasher = Sha256::new();
        serde_json::to_writer(&mut hasher, self)?;
        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::print::{page_dimensions, Orientation, PaperSize};
    use crate::resource::ResourceHandle;

    fn cell(slot: usize, resource: Option<ResourceHandle>, rotation_degrees: u16) -> ComposedCell {
        ComposedCell { sheet: 0, cell_index: slot, slot, resource, rotation_degrees }
    }

    fn fingerprint(cells: &[ComposedCell]) -> LayoutFingerprint<'_> {
        LayoutFingerprint {
            template_id: None,
            rows: 1,
            cols: cells.len(),
            sheets: 1,
            dimensions: page_dimensions(PaperSize::A4, Orientation::Landscape),
            cells,
        }
    }

    #[test]
    fn test_digest_is_hex_sha256() {
        let cells = [cell(0, None, 0)];
        let digest = fingerprint(&cells).digest().unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(digest, fingerprint(&cells).digest().unwrap());
    }

    #[test]
    fn test_rotation_changes_digest() {
        let handle = ResourceHandle::new();
        let upright = [cell(0, Some(handle), 0), cell(1, None, 0)];
        let rotated = [cell(0, Some(handle), 180), cell(1, None, 0)];
        assert_ne!(fingerprint(&upright).digest().unwrap(), fingerprint(&rotated).digest().unwrap());
    }

    #[test]
    fn test_template_changes_digest() {
        let cells = [cell(0, None, 0)];
        let plain = fingerprint(&cells);
        let templated = LayoutFingerprint { template_id: Some(TemplateId::Mini8), ..fingerprint(&cells) };
        assert_ne!(plain.digest().unwrap(), templated.digest().unwrap());
    }
}
