use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::item::ItemRecord;

/// Folder for items without a capture date
pub const NO_DATE_FOLDER: &str = "SemData";
/// Folder for items without GPS data
pub const NO_LOCATION_FOLDER: &str = "SemLocal";
pub const DEFAULT_GPS_PREFIX: &str = "GPS";
pub const DEFAULT_PRECISION: usize = 3;

/// Maps an item to the folder it belongs in. Never touches the disk.
pub trait OrganizationRule {
    fn compute_destination(&self, item: &dyn ItemRecord, root: &Path) -> PathBuf;
}

impl<R: OrganizationRule + ?Sized> OrganizationRule for Box<R> {
    fn compute_destination(&self, item: &dyn ItemRecord, root: &Path) -> PathBuf {
        (**self).compute_destination(item, root)
    }
}

impl<R: OrganizationRule + ?Sized> OrganizationRule for &R {
    fn compute_destination(&self, item: &dyn ItemRecord, root: &Path) -> PathBuf {
        (**self).compute_destination(item, root)
    }
}

/// `root/YYYY/MM`, or `root/SemData` without a capture date.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByDate;

impl OrganizationRule for ByDate {
    fn compute_destination(&self, item: &dyn ItemRecord, root: &Path) -> PathBuf {
        match item.capture_time() {
            Some(dt) => root
                .join(format!("{:04}", dt.year()))
                .join(format!("{:02}", dt.month())),
            None => root.join(NO_DATE_FOLDER),
        }
    }
}

/// `root/<prefix>_<lat>_<lon>` with coordinates at a fixed number of decimals.
#[derive(Debug, Clone)]
pub struct ByLocation {
    pub precision: usize,
    pub no_location_folder: String,
    pub prefix: String,
}

impl ByLocation {
    pub fn new(precision: usize) -> Self {
        Self {
            precision,
            ..Self::default()
        }
    }
}

impl Default for ByLocation {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            no_location_folder: NO_LOCATION_FOLDER.to_string(),
            prefix: DEFAULT_GPS_PREFIX.to_string(),
        }
    }
}

impl OrganizationRule for ByLocation {
    fn compute_destination(&self, item: &dyn ItemRecord, root: &Path) -> PathBuf {
        let Some(point) = item.location() else {
            return root.join(&self.no_location_folder);
        };
        // Float formatting rounds the exact value, ties to even
        root.join(format!(
            "{}_{:.p$}_{:.p$}",
            self.prefix,
            point.latitude,
            point.longitude,
            p = self.precision
        ))
    }
}

/// Rule selector as named on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleKind {
    #[default]
    #[serde(rename = "data")]
    ByDate,
    #[serde(rename = "local")]
    ByLocation,
}

impl RuleKind {
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::ByDate => "data",
            RuleKind::ByLocation => "local",
        }
    }

    /// Build the rule; `precision` only matters for the location rule.
    pub fn build(&self, precision: usize) -> Box<dyn OrganizationRule> {
        match self {
            RuleKind::ByDate => Box::new(ByDate),
            RuleKind::ByLocation => Box::new(ByLocation::new(precision)),
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RuleKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data" => Ok(RuleKind::ByDate),
            "local" => Ok(RuleKind::ByLocation),
            other => Err(Error::UnknownRule(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{GeoPoint, Item};
    use chrono::NaiveDate;

    #[test]
    fn test_by_date_year_month() {
        let dt = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap().and_hms_opt(10, 0, 0).unwrap();
        let item = Item::new("/in/a.jpg").with_capture_time(dt);
        assert_eq!(
            ByDate.compute_destination(&item, Path::new("R")),
            PathBuf::from("R/2024/12")
        );

        let early = NaiveDate::from_ymd_opt(987, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let item = Item::new("/in/b.jpg").with_capture_time(early);
        assert_eq!(
            ByDate.compute_destination(&item, Path::new("R")),
            PathBuf::from("R/0987/03")
        );
    }

    #[test]
    fn test_by_date_without_date() {
        let item = Item::new("/in/a.jpg");
        assert_eq!(
            ByDate.compute_destination(&item, Path::new("R")),
            PathBuf::from("R/SemData")
        );
    }

    #[test]
    fn test_by_location_rounds_to_precision() {
        let item = Item::new("/in/a.jpg").with_location(GeoPoint::new(38.722222, -9.138889));
        assert_eq!(
            ByLocation::default().compute_destination(&item, Path::new("R")),
            PathBuf::from("R/GPS_38.722_-9.139")
        );
        assert_eq!(
            ByLocation::new(1).compute_destination(&item, Path::new("R")),
            PathBuf::from("R/GPS_38.7_-9.1")
        );
    }

    #[test]
    fn test_by_location_keeps_trailing_zeros() {
        let item = Item::new("/in/a.jpg").with_location(GeoPoint::new(41.5, 2.0));
        assert_eq!(
            ByLocation::default().compute_destination(&item, Path::new("R")),
            PathBuf::from("R/GPS_41.500_2.000")
        );
    }

    #[test]
    fn test_by_location_without_gps_uses_default_folder() {
        let item = Item::new("/in/a.jpg");
        assert_eq!(
            ByLocation::default().compute_destination(&item, Path::new("R")),
            PathBuf::from("R/SemLocal")
        );
    }

    #[test]
    fn test_by_location_custom_names_and_missing_gps() {
        let rule = ByLocation {
            precision: 2,
            no_location_folder: "Unknown".to_string(),
            prefix: "LOC".to_string(),
        };
        let without = Item::new("/in/a.jpg");
        assert_eq!(rule.compute_destination(&without, Path::new("R")), PathBuf::from("R/Unknown"));

        let with = Item::new("/in/b.jpg").with_location(GeoPoint::new(-33.8688, 151.2093));
        assert_eq!(
            rule.compute_destination(&with, Path::new("R")),
            PathBuf::from("R/LOC_-33.87_151.21")
        );
    }

    #[test]
    fn test_rule_kind_names() {
        assert_eq!("data".parse::<RuleKind>().unwrap(), RuleKind::ByDate);
        assert_eq!("local".parse::<RuleKind>().unwrap(), RuleKind::ByLocation);
        assert!(matches!("gps".parse::<RuleKind>(), Err(Error::UnknownRule(_))));
        assert_eq!(RuleKind::ByLocation.to_string(), "local");
    }
}
