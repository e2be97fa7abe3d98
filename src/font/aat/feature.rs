//! §4.A.8: a fixed table mapping OpenType feature tags to one or more AAT
//! `(feature-type, selector)` pairs. Feature selection drives which `morx`
//! chain subtables execute, via each subtable's sub-feature flag bitmask
//! tested against a per-chain default-flags value.

/// An AAT feature type/selector pair, as found in the `feat` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AatFeatureSelector {
    pub feature_type: u16,
    pub selector: u16,
}

/// OpenType feature tag → AAT selector(s). Mirrors the well-known mapping
/// HarfBuzz/CoreText ship (a handful of common OT tags map to the AAT
/// Ligatures/TypographicExtras/etc. feature types); unmapped tags have no
/// AAT equivalent and are simply never enabled via this path.
pub fn ot_tag_to_aat_selectors(tag: &str) -> &'static [AatFeatureSelector] {
    const LIGA: &[AatFeatureSelector] = &[AatFeatureSelector { feature_type: 1, selector: 2 }];
    const SMCP: &[AatFeatureSelector] = &[AatFeatureSelector { feature_type: 3, selector: 3 }];
    const C2SC: &[AatFeatureSelector] = &[AatFeatureSelector { feature_type: 3, selector: 5 }];
    const ONUM: &[AatFeatureSelector] = &[AatFeatureSelector { feature_type: 21, selector: 1 }];
    const LNUM: &[AatFeatureSelector] = &[AatFeatureSelector { feature_type: 21, selector: 0 }];
    const PNUM: &[AatFeatureSelector] = &[AatFeatureSelector { feature_type: 6, selector: 1 }];
    const TNUM: &[AatFeatureSelector] = &[AatFeatureSelector { feature_type: 6, selector: 0 }];
    const FRAC: &[AatFeatureSelector] = &[AatFeatureSelector { feature_type: 11, selector: 1 }];
    const SS01: &[AatFeatureSelector] = &[AatFeatureSelector { feature_type: 35, selector: 2 }];
    const SS02: &[AatFeatureSelector] = &[AatFeatureSelector { feature_type: 35, selector: 4 }];
    const EMPTY: &[AatFeatureSelector] = &[];

    match tag {
        "liga" | "clig" => LIGA,
        "smcp" => SMCP,
        "c2sc" => C2SC,
        "onum" => ONUM,
        "lnum" => LNUM,
        "pnum" => PNUM,
        "tnum" => TNUM,
        "frac" => FRAC,
        "ss01" => SS01,
        "ss02" => SS02,
        _ => EMPTY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn liga_maps_to_the_ligatures_feature_type() {
        let sels = ot_tag_to_aat_selectors("liga");
        assert_eq!(sels, &[AatFeatureSelector { feature_type: 1, selector: 2 }]);
    }

    #[test]
    fn unknown_tags_map_to_nothing() {
        assert!(ot_tag_to_aat_selectors("zzzz").is_empty());
    }
}
