use super::RasHdf;
use crate::attrs::{parse_duration, Properties};
use anyhow::Result;
use serde_json::Value;
use std::path::Path;

const SUMMARY_KEYS: &[&str] = &[
    "results_summary:computation_time_total",
    "results_summary:run_time_window",
    "results_summary:solution",
];

/// A plan HDF. Plans also carry the geometry groups, so perimeters are read from here too.
pub struct RasPlanHdf {
    hdf: RasHdf,
}

impl RasPlanHdf {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            hdf: RasHdf::open(path)?,
        })
    }

    pub fn hdf(&self) -> &RasHdf {
        &self.hdf
    }

    pub fn plan_attrs(&self) -> Result<Properties> {
        let mut attrs = self.hdf.root_attrs()?;

        if let Some(info) = self
            .hdf
            .group_attrs("Plan Data/Plan Information", "Plan Information")?
        {
            attrs.extend(info);
        }
        if let Some(params) = self
            .hdf
            .group_attrs("Plan Data/Plan Parameters", "Plan Parameters")?
        {
            attrs.extend(params);
        }
        if let Some(mut precip) = self
            .hdf
            .group_attrs("Event Conditions/Meteorology/Precipitation", "Meteorology")?
        {
            precip.remove("meteorology:projection");
            attrs.extend(precip);
        }
        Ok(attrs)
    }

    pub fn plan_results_attrs(&self) -> Result<Properties> {
        let mut attrs = Properties::new();

        if let Some(unsteady) = self.hdf.group_attrs("Results/Unsteady", "Unsteady Results")? {
            attrs.extend(unsteady);
        }

        if let Some(summary) = self
            .hdf
            .group_attrs("Results/Unsteady/Summary", "Results Summary")?
        {
            for key in SUMMARY_KEYS {
                let value = summary.get(*key).cloned().unwrap_or(Value::Null);
                attrs.insert(key.to_string(), value);
            }
            if let Some(total) = summary
                .get("results_summary:computation_time_total")
                .and_then(Value::as_str)
            {
                let minutes = parse_duration(total)? / 60.0;
                attrs.insert(
                    "results_summary:computation_time_total_minutes".to_string(),
                    minutes.into(),
                );
            }
        }

        if let Some(volume) = self.hdf.group_attrs(
            "Results/Unsteady/Summary/Volume Accounting",
            "Volume Accounting",
        )? {
            attrs.extend(volume);
        }
        Ok(attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ras_hdf::fixtures;
    use serde_json::json;

    #[test]
    fn test_plan_attrs() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_plan_hdf(dir.path()).unwrap();

        let attrs = RasPlanHdf::open(&path).unwrap().plan_attrs().unwrap();

        assert_eq!(attrs["file_type"], json!("HEC-RAS Results"));
        assert_eq!(attrs["plan_information:plan_name"], json!("Unsteady Multi 9-SA run"));
        assert_eq!(
            attrs["plan_information:simulation_end_time"],
            json!("1900-01-03T00:00:00")
        );
        assert!(attrs.get("plan_information:simulation_time_window").is_none());
        assert_eq!(attrs["plan_parameters:1d_cores"], json!(0));
        assert_eq!(attrs["meteorology:enabled"], json!(false));
        assert!(attrs.get("meteorology:projection").is_none());
    }

    #[test]
    fn test_plan_results_attrs() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_plan_hdf(dir.path()).unwrap();

        let attrs = RasPlanHdf::open(&path).unwrap().plan_results_attrs().unwrap();

        assert_eq!(attrs["unsteady_results:short_id"], json!("9-SAs"));
        assert_eq!(
            attrs["results_summary:run_time_window"],
            json!(["2024-03-18T10:10:10", "2024-03-18T10:12:00"])
        );
        assert_eq!(attrs["results_summary:computation_time_total"], json!("00:01:30"));
        assert_eq!(attrs["results_summary:computation_time_total_minutes"], json!(1.5));
        assert!(attrs.get("results_summary:maximum_wsel_error").is_none());
        assert_eq!(attrs["volume_accounting:vol_accounting_in"], json!("Acre Feet"));
        assert_eq!(attrs["volume_accounting:error"], json!(0.5));
    }
}
