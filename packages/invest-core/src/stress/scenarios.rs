//! Historical stress scenario catalog.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// A named historical market window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    /// Catalog key (e.g. "covid_crash")
    pub key: String,
    /// Display name
    pub name: String,
    /// First day of the window (inclusive)
    pub start_date: NaiveDate,
    /// Last day of the window (inclusive)
    pub end_date: NaiveDate,
    pub description: String,
}

impl Scenario {
    /// Whether a date falls inside the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
}

fn scenario(
    key: &str,
    name: &str,
    start: (i32, u32, u32),
    end: (i32, u32, u32),
    description: &str,
) -> Scenario {
    Scenario {
        key: key.to_string(),
        name: name.to_string(),
        start_date: date(start.0, start.1, start.2),
        end_date: date(end.0, end.1, end.2),
        description: description.to_string(),
    }
}

/// Built-in scenarios, keyed by catalog key.
pub static SCENARIOS: LazyLock<BTreeMap<String, Scenario>> = LazyLock::new(|| {
    [
        scenario(
            "dot_com_crash",
            "Dot-Com Bubble",
            (2000, 3, 10),
            (2002, 10, 9),
            "Market collapse after the dot-com bubble burst",
        ),
        scenario(
            "financial_crisis",
            "2008 Financial Crisis",
            (2007, 10, 9),
            (2009, 3, 9),
            "Global financial crisis of 2008",
        ),
        scenario(
            "covid_crash",
            "COVID-19 Pandemic",
            (2020, 2, 19),
            (2020, 3, 23),
            "Market crash caused by the COVID-19 pandemic",
        ),
        scenario(
            "inflation_2022",
            "2022 Inflation Shock",
            (2021, 11, 1),
            (2022, 10, 12),
            "Drawdown driven by rising inflation and rate hikes",
        ),
        scenario(
            "euro_debt_crisis",
            "European Debt Crisis",
            (2011, 7, 1),
            (2012, 7, 26),
            "European sovereign debt crisis",
        ),
    ]
    .into_iter()
    .map(|s| (s.key.clone(), s))
    .collect()
});

/// All scenarios in key order.
pub fn list_scenarios() -> Vec<Scenario> {
    SCENARIOS.values().cloned().collect()
}

/// Look up a scenario by key (case-insensitive).
pub fn get_scenario(key: &str) -> Option<Scenario> {
    SCENARIOS.get(&key.to_lowercase()).cloned()
}

pub fn scenario_keys() -> Vec<String> {
    SCENARIOS.keys().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_five_scenarios() {
        assert_eq!(list_scenarios().len(), 5);
        assert_eq!(
            scenario_keys(),
            vec![
                "covid_crash",
                "dot_com_crash",
                "euro_debt_crisis",
                "financial_crisis",
                "inflation_2022"
            ]
        );
    }

    #[test]
    fn test_get_scenario() {
        let covid = get_scenario("COVID_CRASH").unwrap();
        assert_eq!(covid.start_date, NaiveDate::from_ymd_opt(2020, 2, 19).unwrap());
        assert_eq!(covid.end_date, NaiveDate::from_ymd_opt(2020, 3, 23).unwrap());
        assert!(covid.contains(NaiveDate::from_ymd_opt(2020, 3, 1).unwrap()));
        assert!(!covid.contains(NaiveDate::from_ymd_opt(2020, 3, 24).unwrap()));

        assert!(get_scenario("tulip_mania").is_none());
    }

    #[test]
    fn test_windows_are_ordered() {
        for s in list_scenarios() {
            assert!(s.start_date < s.end_date, "{} has an inverted window", s.key);
        }
    }
}
