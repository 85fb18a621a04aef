//! Address pattern parser.
//!
//! A pattern is `banks:offsets`, where each side is a comma separated list of hex values or
//! inclusive `lo-hi` ranges, e.g. `00-3f,80-bf:2100-213f`. It expands to the cross product of its
//! bank ranges and offset ranges.

use crate::bus::BusError;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub banks: Vec<RangeInclusive<u8>>,
    pub offsets: Vec<RangeInclusive<u16>>,
}

impl Pattern {
    pub fn parse(pattern: &str) -> Result<Self, BusError> {
        let err = || BusError::Pattern(pattern.into());

        let (banks, offsets) = pattern.split_once(':').ok_or_else(err)?;
        let banks = parse_ranges(banks, |s| u8::from_str_radix(s, 16).ok()).ok_or_else(err)?;
        let offsets = parse_ranges(offsets, |s| u16::from_str_radix(s, 16).ok()).ok_or_else(err)?;

        Ok(Self { banks, offsets })
    }

    /// Every `(page, first, last)` byte span matched by the pattern, where `page` is the address
    /// bits 8-23 and `first..=last` are offsets within the page.
    pub fn spans(&self) -> impl Iterator<Item = (u32, u8, u8)> + '_ {
        self.banks.iter().flat_map(move |banks| {
            banks.clone().flat_map(move |bank| {
                self.offsets.iter().flat_map(move |offsets| {
                    let (lo, hi) = (*offsets.start(), *offsets.end());
                    ((lo >> 8)..=(hi >> 8)).map(move |page| {
                        let first = if page == lo >> 8 { lo as u8 } else { 0x00 };
                        let last = if page == hi >> 8 { hi as u8 } else { 0xFF };
                        ((u32::from(bank) << 8) | u32::from(page), first, last)
                    })
                })
            })
        })
    }
}

fn parse_ranges<T: PartialOrd>(
    list: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<Vec<RangeInclusive<T>>> {
    list.split(',')
        .map(|range| {
            let range = range.trim();
            let (lo, hi) = match range.split_once('-') {
                Some((lo, hi)) => (parse(lo.trim())?, parse(hi.trim())?),
                None => (parse(range)?, parse(range)?),
            };
            (lo <= hi).then_some(lo..=hi)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn parses_ranges_and_singles() {
        let pattern = Pattern::parse("00-3f,80-bf:2100-213f").unwrap();
        assert_eq!(pattern.banks, vec![0x00..=0x3F, 0x80..=0xBF]);
        assert_eq!(pattern.offsets, vec![0x2100..=0x213F]);

        let pattern = Pattern::parse("7e:0000-ffff, 4016").unwrap();
        assert_eq!(pattern.banks, vec![0x7E..=0x7E]);
        assert_eq!(pattern.offsets, vec![0x0000..=0xFFFF, 0x4016..=0x4016]);
    }

    #[test]
    fn expands_cross_product_into_page_spans() {
        let pattern = Pattern::parse("00,80:2180-2183").unwrap();
        let spans: Vec<_> = pattern.spans().collect();
        assert_eq!(spans, vec![(0x0021, 0x80, 0x83), (0x8021, 0x80, 0x83)]);

        let pattern = Pattern::parse("7e:10f0-12ff").unwrap();
        let spans: Vec<_> = pattern.spans().collect();
        assert_eq!(spans, vec![(0x7E10, 0xF0, 0xFF), (0x7E11, 0x00, 0xFF), (0x7E12, 0x00, 0xFF)]);
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["", "00-3f", "00-3f:", "zz:0000", "40-3f:0000", "00:10000", "00:8000-ffff-1"] {
            assert!(
                matches!(Pattern::parse(bad), Err(BusError::Pattern(_))),
                "pattern {bad:?} should be rejected"
            );
        }
    }
}
