use std::fmt::Display;

use bitflags::bitflags;

bitflags! {
    /// A mask of the MS levels a reader should return. Levels outside `1..=3`
    /// are never accepted.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct MsFilter: u8 {
        const MS1 = 1;
        const MS2 = 2;
        const MS3 = 4;
    }
}

impl Default for MsFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl MsFilter {
    /// The filter bit for `ms_level`, if the level is one that can be filtered on
    pub fn from_level(ms_level: u8) -> Option<Self> {
        match ms_level {
            1 => Some(Self::MS1),
            2 => Some(Self::MS2),
            3 => Some(Self::MS3),
            _ => None,
        }
    }

    /// Test whether a spectrum at `ms_level` passes this filter
    pub fn accepts(&self, ms_level: u8) -> bool {
        Self::from_level(ms_level).is_some_and(|level| self.contains(level))
    }
}

impl Display for MsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let levels: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        write!(f, "{}", levels.join("|"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_accepts() {
        let filter = MsFilter::default();
        assert!(filter.accepts(1));
        assert!(filter.accepts(3));
        assert!(!filter.accepts(0));
        assert!(!filter.accepts(4));

        let filter = MsFilter::MS2;
        assert!(!filter.accepts(1));
        assert!(filter.accepts(2));
        assert_eq!((MsFilter::MS1 | MsFilter::MS3).bits(), 5);
        assert_eq!((MsFilter::MS1 | MsFilter::MS2).to_string(), "MS1|MS2");
    }
}
