// Player dataset loading and lookups.

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};
use xai_models::{PlayerRecord, Result, XaiError};

#[derive(Debug, Deserialize)]
struct RawPlayerRow {
    #[serde(default)]
    player_name: String,
    #[serde(default)]
    team: String,
    #[serde(default)]
    position: Option<String>,
    #[serde(default)]
    nationality: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    age: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    minutes_played: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    matches_played: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    goals: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    assists: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    passes: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    shots: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    tackles: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    injuries_last_season: Option<f64>,
    #[serde(default)]
    is_starting_xi: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    performance_score: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    injury_risk: Option<f64>,
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "1.0" | "yes" | "y" => Some(true),
        "false" | "0" | "0.0" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl RawPlayerRow {
    fn into_record(self) -> PlayerRecord {
        let is_starting_xi = self.is_starting_xi.as_deref().and_then(|raw| {
            let parsed = parse_flag(raw);
            if parsed.is_none() && !raw.trim().is_empty() {
                warn!("unrecognised is_starting_xi value '{}' for '{}'", raw, self.player_name.trim());
            }
            parsed
        });

        PlayerRecord {
            player_name: self.player_name.trim().to_string(),
            team: self.team.trim().to_string(),
            position: non_empty(self.position),
            nationality: non_empty(self.nationality),
            age: finite(self.age),
            minutes_played: finite(self.minutes_played),
            matches_played: finite(self.matches_played),
            goals: finite(self.goals),
            assists: finite(self.assists),
            passes: finite(self.passes),
            shots: finite(self.shots),
            tackles: finite(self.tackles),
            injuries_last_season: finite(self.injuries_last_season),
            is_starting_xi,
            performance_score: finite(self.performance_score),
            injury_risk: finite(self.injury_risk),
        }
    }
}

/// The full player table, loaded once and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<PlayerRecord>,
    by_name: HashMap<String, usize>,
}

impl Dataset {
    pub fn from_records(records: Vec<PlayerRecord>) -> Self {
        let mut by_name = HashMap::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            if record.player_name.is_empty() {
                continue;
            }
            if by_name.contains_key(&record.player_name) {
                warn!("duplicate player '{}', keeping first row", record.player_name);
                continue;
            }
            by_name.insert(record.player_name.clone(), idx);
        }

        Self { records, by_name }
    }

    pub fn from_reader<R: Read>(rdr: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(rdr);

        let mut records = Vec::new();
        for (line, result) in reader.deserialize::<RawPlayerRow>().enumerate() {
            match result {
                Ok(raw) => {
                    if raw.player_name.trim().is_empty() {
                        debug!("skipping row {} without player_name", line + 1);
                        continue;
                    }
                    records.push(raw.into_record());
                }
                Err(e) => {
                    warn!("skipping malformed player row: {}", e);
                }
            }
        }

        Ok(Self::from_records(records))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            XaiError::Dataset(format!("failed to open {}: {}", path.display(), e))
        })?;
        let dataset = Self::from_reader(file)?;
        info!("📥 Dataset loaded from {}: {} rows", path.display(), dataset.len());
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PlayerRecord] {
        &self.records
    }

    pub fn player(&self, name: &str) -> Option<&PlayerRecord> {
        self.by_name.get(name).map(|idx| &self.records[*idx])
    }

    pub fn require_player(&self, name: &str) -> Result<&PlayerRecord> {
        self.player(name).ok_or_else(|| XaiError::PlayerNotFound {
            name: name.to_string(),
        })
    }

    /// Sorted, de-duplicated player names.
    pub fn players(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.player_name.as_str())
            .filter(|name| !name.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Sorted, de-duplicated team names.
    pub fn teams(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.team.as_str())
            .filter(|team| !team.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn has_team(&self, team: &str) -> bool {
        self.records.iter().any(|r| r.team == team)
    }

    /// Every row belonging to `team`, in dataset order.
    pub fn team_players(&self, team: &str) -> Vec<&PlayerRecord> {
        self.records.iter().filter(|r| r.team == team).collect()
    }

    /// One row per distinct name, in request order, resolved the same way
    /// as [`Dataset::player`]. Unknown names are skipped; see
    /// [`Dataset::missing_players`].
    pub fn players_by_names(&self, names: &[String]) -> Vec<&PlayerRecord> {
        let mut seen = HashSet::new();
        names
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .filter_map(|name| self.player(name))
            .collect()
    }

    pub fn missing_players(&self, names: &[String]) -> Vec<String> {
        names
            .iter()
            .filter(|name| !self.by_name.contains_key(name.as_str()))
            .cloned()
            .collect()
    }

    /// Linear-interpolated quantile of `minutes_played` over rows that have it.
    pub fn minutes_quantile(&self, q: f64) -> f64 {
        let values: Vec<f64> = self.records.iter().filter_map(|r| r.minutes_played).collect();
        quantile(values, q)
    }
}

/// Quantile with linear interpolation between order statistics. Returns 0
/// for an empty input.
fn quantile(mut values: Vec<f64>, q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);

    let q = q.clamp(0.0, 1.0);
    let pos = q * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;

    values[lo] + (values[hi] - values[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
player_name,team,age,minutes_played,matches_played,goals,assists,passes,shots,tackles,injuries_last_season,is_starting_xi,performance_score,injury_risk,position
Bukayo Saka,Arsenal,22,2900,35,14,11,1200,80,30,1,True,86.5,0.21,RW
Declan Rice,Arsenal,25,3100,38,7,8,2100,40,95,0,True,81.0,0.12,CM
Reece James,Chelsea,24,900,12,1,2,500,10,20,4,False,65.0,0.78,RB
Cole Palmer,Chelsea,22,,34,22,11,1300,120,15,,1,88.0,,AM
,Chelsea,30,100,2,0,0,10,0,1,0,0,50,0.1,GK
";

    fn sample() -> Dataset {
        Dataset::from_reader(SAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn test_loads_rows_and_skips_nameless() {
        let dataset = sample();
        assert_eq!(dataset.len(), 4);

        let saka = dataset.player("Bukayo Saka").unwrap();
        assert_eq!(saka.team, "Arsenal");
        assert_eq!(saka.goals, Some(14.0));
        assert_eq!(saka.is_starting_xi, Some(true));
        assert_eq!(saka.position.as_deref(), Some("RW"));
    }

    #[test]
    fn test_missing_values_stay_missing() {
        let dataset = sample();
        let palmer = dataset.player("Cole Palmer").unwrap();

        assert_eq!(palmer.minutes_played, None);
        assert_eq!(palmer.injuries_last_season, None);
        assert_eq!(palmer.injury_risk, None);
        assert_eq!(palmer.is_starting_xi, Some(true));
    }

    #[test]
    fn test_sorted_unique_names_and_teams() {
        let dataset = sample();
        assert_eq!(
            dataset.players(),
            vec!["Bukayo Saka", "Cole Palmer", "Declan Rice", "Reece James"]
        );
        assert_eq!(dataset.teams(), vec!["Arsenal", "Chelsea"]);
    }

    #[test]
    fn test_team_roster_and_name_lookup() {
        let dataset = sample();
        let chelsea: Vec<_> = dataset
            .team_players("Chelsea")
            .iter()
            .map(|r| r.player_name.clone())
            .collect();
        assert_eq!(chelsea, vec!["Reece James", "Cole Palmer"]);
        assert!(dataset.team_players("Spurs").is_empty());

        let names = vec!["Cole Palmer".to_string(), "Bukayo Saka".to_string(), "Nobody".to_string()];
        let found: Vec<_> = dataset
            .players_by_names(&names)
            .iter()
            .map(|r| r.player_name.clone())
            .collect();
        assert_eq!(found, vec!["Cole Palmer", "Bukayo Saka"]);
        assert_eq!(dataset.missing_players(&names), vec!["Nobody"]);
    }

    #[test]
    fn test_require_player_error() {
        let dataset = sample();
        let err = dataset.require_player("Nobody").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_duplicate_names_keep_first_row() {
        let csv = "player_name,team,goals\nAlex,Arsenal,3\nAlex,Chelsea,9\n";
        let dataset = Dataset::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.player("Alex").unwrap().team, "Arsenal");
        assert_eq!(dataset.players(), vec!["Alex"]);

        let names = vec!["Alex".to_string(), "Alex".to_string()];
        let squad = dataset.players_by_names(&names);
        assert_eq!(squad.len(), 1);
        assert_eq!(squad[0].goals, Some(3.0));
    }

    #[test]
    fn test_quantile_interpolates() {
        assert_eq!(quantile(vec![], 0.75), 0.0);
        assert_eq!(quantile(vec![10.0], 0.75), 10.0);
        assert_eq!(quantile(vec![4.0, 1.0, 3.0, 2.0], 0.75), 3.25);
        assert_eq!(quantile(vec![1.0, 2.0, 3.0, 4.0, 5.0], 0.5), 3.0);
    }

    #[test]
    fn test_minutes_quantile_ignores_missing() {
        let dataset = sample();
        // 900, 2900, 3100 -> pos 1.5
        assert_eq!(dataset.minutes_quantile(0.75), 3000.0);
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let dataset = Dataset::from_path(file.path()).unwrap();
        assert_eq!(dataset.len(), 4);

        let missing = Dataset::from_path(Path::new("/definitely/not/here.csv"));
        assert!(matches!(missing, Err(XaiError::Dataset(_))));
    }
}
