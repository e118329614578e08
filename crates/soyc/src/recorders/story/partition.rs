//! Reconciling nested provenance ranges into a flat partition

use anyhow::{Result, bail};
use log::trace;

use crate::program::{Range, SourceInfoId};

/// A slice of output attributed to exactly one source info
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Segment {
    pub range: Range,
    pub info: SourceInfoId,
}

/// Builds the partition, merging neighbours that share a source info
#[derive(Default)]
struct Segments {
    done: Vec<Segment>,
}

impl Segments {
    fn push(&mut self, info: SourceInfoId, start: usize, end: usize) {
        trace!("Attributing [{start}, {end}) to {info:?}");
        if let Some(last) = self.done.last_mut()
            && last.info == info
            && last.range.end == start
        {
            last.range.end = end;
            return;
        }
        self.done.push(Segment {
            range: Range::new(start, end),
            info,
        });
    }
}

/// Turn possibly nested `(range, info)` pairs into consecutive, non-overlapping segments
///
/// Ranges are visited in dependency order and each one is handed to `observe`
/// as it is entered, containers before anything they contain, whether or not
/// any output ends up attributed to it. Output covered by a range but by none
/// of its children is attributed to that range. The result covers `[0, end)`
/// of the outermost range exactly; output before the outermost range or any
/// range reaching outside it is an error.
pub(crate) fn partition<F>(ranges: &[(Range, SourceInfoId)], mut observe: F) -> Result<Vec<Segment>>
where
    F: FnMut(Range, SourceInfoId) -> Result<()>,
{
    let mut sorted = ranges.to_vec();
    sorted.sort_by(|(a, _), (b, _)| Range::dependency_order(a, b));

    let Some(&(outermost, _)) = sorted.first() else {
        return Ok(Vec::new());
    };

    let mut segments = Segments::default();
    let mut stack: Vec<(Range, SourceInfoId)> = Vec::new();
    let mut last_end = 0;

    for &(range, info) in &sorted {
        while let Some(&(top, _)) = stack.last()
            && !top.contains(&range)
        {
            reconcile(&mut stack, &mut last_end, &mut segments);
        }

        // Output between what is attributed so far and this range belongs
        // to the innermost range enclosing both
        if last_end < range.start {
            let Some(&(_, parent_info)) = stack.last() else {
                bail!(
                    "Output [{last_end}, {}) lies before range {range} and no range encloses it",
                    range.start
                );
            };
            segments.push(parent_info, last_end, range.start);
            last_end = range.start;
        }
        observe(range, info)?;
        stack.push((range, info));
    }
    while !stack.is_empty() {
        reconcile(&mut stack, &mut last_end, &mut segments);
    }

    if last_end != outermost.end {
        bail!(
            "Ranges do not nest inside the outermost range {outermost}: output was attributed up to offset {last_end}"
        );
    }
    Ok(segments.done)
}

/// Pop the top frame and attribute whatever of it is not attributed yet
fn reconcile(
    stack: &mut Vec<(Range, SourceInfoId)>,
    last_end: &mut usize,
    segments: &mut Segments,
) {
    let Some((range, info)) = stack.pop() else {
        return;
    };
    if *last_end < range.end {
        let start = (*last_end).max(range.start);
        segments.push(info, start, range.end);
        *last_end = range.end;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn info(id: u32) -> SourceInfoId {
        SourceInfoId::new(id)
    }

    fn segments(ranges: &[(Range, SourceInfoId)]) -> Result<Vec<Segment>> {
        partition(ranges, |_, _| Ok(()))
    }

    fn seg(start: usize, end: usize, id: u32) -> Segment {
        Segment {
            range: Range::new(start, end),
            info: info(id),
        }
    }

    #[test]
    fn test_container_leftovers_go_to_container() {
        let ranges = [
            (Range::new(0, 100), info(0)),
            (Range::new(10, 20), info(1)),
            (Range::new(30, 100), info(0)),
        ];
        assert_eq!(
            segments(&ranges).unwrap(),
            vec![seg(0, 10, 0), seg(10, 20, 1), seg(20, 100, 0)]
        );
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let ranges = [
            (Range::new(30, 100), info(0)),
            (Range::new(10, 20), info(1)),
            (Range::new(0, 100), info(0)),
        ];
        assert_eq!(
            segments(&ranges).unwrap(),
            vec![seg(0, 10, 0), seg(10, 20, 1), seg(20, 100, 0)]
        );
    }

    #[test]
    fn test_deep_nesting() {
        let ranges = [
            (Range::new(0, 50), info(0)),
            (Range::new(5, 40), info(1)),
            (Range::new(10, 20), info(2)),
            (Range::new(12, 14), info(3)),
            (Range::new(25, 40), info(4)),
        ];
        assert_eq!(
            segments(&ranges).unwrap(),
            vec![
                seg(0, 5, 0),
                seg(5, 10, 1),
                seg(10, 12, 2),
                seg(12, 14, 3),
                seg(14, 20, 2),
                seg(20, 25, 1),
                seg(25, 40, 4),
                seg(40, 50, 0),
            ]
        );
    }

    #[test]
    fn test_ranges_are_observed_containers_first() {
        let ranges = [
            (Range::new(10, 20), info(2)),
            (Range::new(0, 20), info(1)),
            (Range::new(0, 10), info(0)),
            (Range::new(0, 20), info(3)),
        ];
        let mut observed = Vec::new();
        let segments = partition(&ranges, |range, info| {
            observed.push((range, info));
            Ok(())
        })
        .unwrap();

        // Stable sort keeps input order among identical ranges
        assert_eq!(
            observed,
            vec![
                (Range::new(0, 20), info(1)),
                (Range::new(0, 20), info(3)),
                (Range::new(0, 10), info(0)),
                (Range::new(10, 20), info(2)),
            ]
        );
        // Both containers are fully covered and get no output of their own
        assert_eq!(segments, vec![seg(0, 10, 0), seg(10, 20, 2)]);
    }

    #[test]
    fn test_observer_error_stops_the_walk() {
        let ranges = [(Range::new(0, 8), info(0)), (Range::new(2, 4), info(1))];
        let mut calls = 0;
        let err = partition(&ranges, |_, info| {
            calls += 1;
            if info == SourceInfoId::new(1) {
                bail!("cannot resolve {info:?}");
            }
            Ok(())
        })
        .unwrap_err();
        assert!(err.to_string().contains("cannot resolve"), "{err}");
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_identical_ranges_attribute_to_innermost() {
        let ranges = [(Range::new(0, 8), info(0)), (Range::new(0, 8), info(1))];
        assert_eq!(segments(&ranges).unwrap(), vec![seg(0, 8, 1)]);
    }

    #[test]
    fn test_partition_is_complete() {
        let ranges = [
            (Range::new(0, 1000), info(0)),
            (Range::new(0, 300), info(1)),
            (Range::new(100, 200), info(2)),
            (Range::new(150, 160), info(3)),
            (Range::new(300, 700), info(1)),
            (Range::new(650, 700), info(4)),
            (Range::new(990, 1000), info(5)),
        ];
        let segments = segments(&ranges).unwrap();

        let mut offset = 0;
        for segment in &segments {
            assert_eq!(segment.range.start, offset);
            assert!(!segment.range.is_empty());
            offset = segment.range.end;
        }
        assert_eq!(offset, 1000);
        assert_eq!(
            segments.iter().map(|s| s.range.len()).sum::<usize>(),
            1000
        );
        for pair in segments.windows(2) {
            assert_ne!(pair[0].info, pair[1].info, "neighbours are merged");
        }
    }

    #[test]
    fn test_sibling_outside_outermost_is_an_error() {
        let ranges = [(Range::new(0, 10), info(0)), (Range::new(10, 20), info(1))];
        let err = segments(&ranges).unwrap_err();
        assert!(err.to_string().contains("[0, 10)"), "{err}");
    }

    #[test]
    fn test_overlapping_ranges_are_an_error() {
        let ranges = [
            (Range::new(0, 20), info(0)),
            (Range::new(5, 15), info(1)),
            (Range::new(10, 25), info(2)),
        ];
        assert!(segments(&ranges).is_err());
    }

    #[test]
    fn test_empty_input() {
        assert!(segments(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_output_before_outermost_range_is_an_error() {
        let ranges = [(Range::new(4, 10), info(0)), (Range::new(6, 8), info(1))];
        let err = segments(&ranges).unwrap_err();
        assert!(err.to_string().contains("[0, 4)"), "{err}");
    }
}
