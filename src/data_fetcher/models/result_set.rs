use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Envelope shared by the stats API endpoints: a list of named tables,
/// each a header row plus positional rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(rename = "resultSets")]
    pub result_sets: Vec<ResultSet>,
}

impl StatsResponse {
    /// Looks a table up by name, e.g. `TeamGameLog` or `PlayerStats`.
    pub fn result_set(&self, name: &str) -> Option<&ResultSet> {
        self.result_sets.iter().find(|set| set.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSet {
    pub name: String,
    pub headers: Vec<String>,
    #[serde(rename = "rowSet")]
    pub row_set: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.row_set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_set.is_empty()
    }

    /// Iterates rows with by-name column access.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        let index: HashMap<&str, usize> = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.as_str(), i))
            .collect();
        let index = Arc::new(index);
        self.row_set.iter().map(move |values| Row {
            index: index.clone(),
            values,
        })
    }
}

/// One positional row of a [`ResultSet`], addressed by header name.
#[derive(Debug, Clone)]
pub struct Row<'a> {
    index: Arc<HashMap<&'a str, usize>>,
    values: &'a [Value],
}

impl<'a> Row<'a> {
    /// Raw cell, `None` when the column is absent from the headers.
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.index.get(column).and_then(|&i| self.values.get(i))
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    /// Text cell; numbers are rendered as text, null is `None`.
    pub fn text(&self, column: &str) -> Option<String> {
        match self.get(column)? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Numeric cell; numeric strings are accepted, null is `None`.
    pub fn number(&self, column: &str) -> Option<f64> {
        match self.get(column)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Counting stat. The API never sends negatives or fractions for these.
    pub fn count(&self, column: &str) -> Option<u32> {
        self.number(column)
            .filter(|n| *n >= 0.0)
            .map(|n| n.round() as u32)
    }

    /// Identifier cell (team and player ids arrive as numbers).
    pub fn id(&self, column: &str) -> Option<u64> {
        self.number(column)
            .filter(|n| *n >= 0.0 && n.fract() == 0.0)
            .map(|n| n as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> StatsResponse {
        serde_json::from_value(json!({
            "resource": "teamgamelog",
            "resultSets": [{
                "name": "TeamGameLog",
                "headers": ["Team_ID", "Game_ID", "GAME_DATE", "PTS", "FG_PCT", "WL"],
                "rowSet": [
                    [1610612750, "0022400571", "JAN 15, 2025", 118, 0.512, "W"],
                    [1610612750, "0022400560", "JAN 13, 2025", "99", null, null]
                ]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_result_set_lookup_by_name() {
        let response = sample();
        assert!(response.result_set("TeamGameLog").is_some());
        assert!(response.result_set("PlayerStats").is_none());
        assert_eq!(response.result_set("TeamGameLog").unwrap().len(), 2);
    }

    #[test]
    fn test_row_access_by_header() {
        let response = sample();
        let set = response.result_set("TeamGameLog").unwrap();
        let rows: Vec<Row<'_>> = set.rows().collect();

        assert_eq!(rows[0].text("Game_ID").as_deref(), Some("0022400571"));
        assert_eq!(rows[0].id("Team_ID"), Some(1610612750));
        assert_eq!(rows[0].count("PTS"), Some(118));
        assert_eq!(rows[0].number("FG_PCT"), Some(0.512));
        assert_eq!(rows[0].text("WL").as_deref(), Some("W"));

        // numeric strings and nulls
        assert_eq!(rows[1].count("PTS"), Some(99));
        assert_eq!(rows[1].number("FG_PCT"), None);
        assert_eq!(rows[1].text("WL"), None);
    }

    #[test]
    fn test_missing_column_is_none() {
        let response = sample();
        let set = response.result_set("TeamGameLog").unwrap();
        let row = set.rows().next().unwrap();
        assert!(!row.has_column("REB"));
        assert_eq!(row.count("REB"), None);
    }
}
