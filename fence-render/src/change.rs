//! Short-circuit for unchanged region lists

use fence_core::Region;

use crate::orchestrator::RenderedRegion;

/// Last region list delivered together with its results
///
/// Replaced as a whole after a batch completes, never updated piecemeal.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    last: Option<Delivered>,
}

#[derive(Debug, Clone)]
struct Delivered {
    regions: Vec<Region>,
    results: Vec<RenderedRegion>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Previous results if `regions` equals the last delivered list field by field
    pub fn unchanged(&self, regions: &[Region]) -> Option<&[RenderedRegion]> {
        self.last
            .as_ref()
            .filter(|last| last.regions == regions)
            .map(|last| last.results.as_slice())
    }

    /// Record a fully completed batch
    pub fn record(&mut self, regions: Vec<Region>, results: Vec<RenderedRegion>) {
        self.last = Some(Delivered { regions, results });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::RenderStatus;
    use fence_core::delimit;

    fn results_for(regions: &[Region]) -> Vec<RenderedRegion> {
        regions
            .iter()
            .map(|region| RenderedRegion {
                region: region.clone(),
                artifact: None,
                status: RenderStatus::Skipped,
            })
            .collect()
    }

    #[test]
    fn test_empty_detector_reports_change() {
        let detector = ChangeDetector::new();
        assert!(detector.unchanged(&[]).is_none());
    }

    #[test]
    fn test_identical_list_is_unchanged() {
        let regions = delimit(&["```math", "x", "```"]);
        let mut detector = ChangeDetector::new();
        detector.record(regions.clone(), results_for(&regions));

        let again = delimit(&["```math", "x", "```"]);
        let previous = detector.unchanged(&again).unwrap();
        assert_eq!(previous.len(), 1);
        assert_eq!(previous[0].region, regions[0]);
    }

    #[test]
    fn test_moved_region_is_a_change() {
        let regions = delimit(&["```math", "x", "```"]);
        let mut detector = ChangeDetector::new();
        detector.record(regions.clone(), results_for(&regions));

        // Same identity, different range
        let shifted = delimit(&["", "```math", "x", "```"]);
        assert_eq!(shifted[0].identity, regions[0].identity);
        assert!(detector.unchanged(&shifted).is_none());
    }
}
