//! Pairwise crossing detection over candidate links.
//!
//! Two links cross when their straight segments intersect properly and the
//! links share no unit (see [`Link::crosses`]). The oracle enumerates every
//! unordered crossing pair exactly once, rejecting pairs whose bounding boxes
//! are disjoint before running the orientation test.

use wac_core::geometry::BoundingBox;
use wac_core::Link;

/// Stateless crossing queries over a slice of links.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossingOracle;

impl CrossingOracle {
    pub fn crosses(a: &Link, b: &Link) -> bool {
        a.crosses(b)
    }

    /// All index pairs `(i, j)` with `i < j` whose links cross.
    ///
    /// Pairs come out sorted by `i`, then `j`.
    pub fn crossing_pairs(links: &[Link]) -> Vec<(usize, usize)> {
        let boxes: Vec<BoundingBox> = links.iter().map(|l| l.segment().bounding_box()).collect();
        let mut pairs = Vec::new();
        for i in 0..links.len() {
            for j in (i + 1)..links.len() {
                if !boxes[i].overlaps(&boxes[j]) {
                    continue;
                }
                if links[i].crosses(&links[j]) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    /// Indices of the links in `links` that cross `target`.
    pub fn crossing(links: &[Link], target: &Link) -> Vec<usize> {
        let target_box = target.segment().bounding_box();
        links
            .iter()
            .enumerate()
            .filter(|(_, link)| link.segment().bounding_box().overlaps(&target_box))
            .filter(|(_, link)| link.crosses(target))
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wac_core::Unit;

    fn link(a: (&str, f64, f64), b: (&str, f64, f64)) -> Link {
        Link::new(Unit::new(a.0, a.1, a.2), Unit::new(b.0, b.1, b.2)).unwrap()
    }

    #[test]
    fn test_pairs_are_ordered_and_unique() {
        let links = vec![
            link(("WTG_1", 0.0, 0.0), ("OSS_1", 1.0, 1.0)),
            link(("WTG_2", 0.0, 1.0), ("OSS_2", 1.0, 0.0)),
            link(("WTG_3", 5.0, 5.0), ("OSS_3", 6.0, 6.0)),
            link(("WTG_4", 0.5, -1.0), ("OSS_4", 0.5, 2.0)),
        ];
        let pairs = CrossingOracle::crossing_pairs(&links);
        // both diagonals and the vertical meet at (0.5, 0.5)
        assert_eq!(pairs, vec![(0, 1), (0, 3), (1, 3)]);
        assert!(pairs.iter().all(|&(i, j)| i < j));
    }

    #[test]
    fn test_disjoint_boxes_never_cross() {
        let links = vec![
            link(("WTG_1", 0.0, 0.0), ("OSS_1", 1.0, 1.0)),
            link(("WTG_2", 10.0, 11.0), ("OSS_2", 11.0, 10.0)),
        ];
        assert!(CrossingOracle::crossing_pairs(&links).is_empty());
    }

    #[test]
    fn test_crossing_target() {
        let links = vec![
            link(("WTG_2", 0.0, 1.0), ("OSS_2", 1.0, 0.0)),
            link(("WTG_2", 0.0, 1.0), ("WTG_1", 0.0, 0.0)),
        ];
        let target = link(("WTG_1", 0.0, 0.0), ("OSS_1", 1.0, 1.0));
        assert_eq!(CrossingOracle::crossing(&links, &target), vec![0]);
        assert!(CrossingOracle::crosses(&links[0], &target));
    }
}
