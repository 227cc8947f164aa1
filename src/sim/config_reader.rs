// The JSON files read by seatsim: configuration and rosters.

use std::fs;

use log::debug;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use seat_apportionment::projection::ProjectionConfig;
use seat_apportionment::*;

use crate::sim::*;

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(rename = "seatsAvailable")]
    pub seats_available: Option<u32>,
    #[serde(rename = "defaultQuotient")]
    pub default_quotient: Option<u64>,
    #[serde(rename = "tiebreakMode")]
    pub tiebreak_mode: Option<String>,
    #[serde(rename = "randomSeed")]
    pub random_seed: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RosterCandidate {
    pub name: String,
    pub votes: i64,
    pub gender: Option<String>,
}

/// A party as written in a roster file. Votes are read as signed numbers so
/// that negative counts are reported instead of failing to parse.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RosterParty {
    pub name: String,
    #[serde(rename = "displayColor")]
    pub display_color: Option<String>,
    #[serde(rename = "displayTextColor")]
    pub display_text_color: Option<String>,
    #[serde(rename = "legendVotes")]
    pub legend_votes: Option<i64>,
    pub candidates: Option<Vec<RosterCandidate>>,
}

pub fn read_config(path: &str) -> SimResult<SimConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: SimConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

pub fn read_roster(path: &str) -> SimResult<Vec<Party>> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let parties: Vec<RosterParty> =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    debug!("read_roster: {:?} parties in {:?}", parties.len(), path);
    validate_roster(&parties)
}

fn checked_votes(field: String, votes: i64) -> SimResult<u64> {
    ensure!(votes >= 0, NegativeVotesSnafu { field, votes });
    Ok(votes as u64)
}

pub fn validate_roster(parties: &[RosterParty]) -> SimResult<Vec<Party>> {
    let mut res: Vec<Party> = Vec::new();
    for (idx, rp) in parties.iter().enumerate() {
        let legend_votes = checked_votes(
            format!("parties[{}].legendVotes", idx),
            rp.legend_votes.unwrap_or(0),
        )?;
        let mut candidates: Vec<Candidate> = Vec::new();
        for (cidx, rc) in rp.candidates.iter().flatten().enumerate() {
            let votes = checked_votes(
                format!("parties[{}].candidates[{}].votes", idx, cidx),
                rc.votes,
            )?;
            candidates.push(Candidate {
                name: rc.name.clone(),
                votes,
                gender: match rc.gender.clone() {
                    Some(x) if x.is_empty() => None,
                    x => x,
                },
            });
        }
        res.push(Party {
            name: rp.name.clone(),
            display_color: rp.display_color.clone().unwrap_or_default(),
            display_text_color: rp.display_text_color.clone().unwrap_or_default(),
            legend_votes,
            candidates,
        });
    }
    Ok(res)
}

pub fn validate_rules(config: &SimConfig) -> SimResult<ProjectionConfig> {
    let default = ProjectionConfig::DEFAULT;
    let tiebreak_mode = match config.tiebreak_mode.as_deref() {
        None | Some("inputOrder") => TieBreakMode::InputOrder,
        Some("partyName") => TieBreakMode::PartyName,
        Some("mostVotes") => TieBreakMode::MostVotes,
        Some("random") => {
            let seed = match config.random_seed.clone().map(|s| s.parse::<u32>()) {
                Some(Result::Ok(x)) => x,
                x => {
                    whatever!("Cannot use tiebreak mode random without a valid randomSeed: {:?}", x)
                }
            };
            TieBreakMode::Random(seed)
        }
        Some(x) => {
            whatever!("Unknown tiebreak mode {:?}", x)
        }
    };
    let seats_available = config.seats_available.unwrap_or(default.seats_available);
    let default_quotient = match config.default_quotient {
        Some(0) => {
            whatever!("defaultQuotient must be positive")
        }
        Some(x) => x,
        None => default.default_quotient,
    };
    Ok(ProjectionConfig {
        seats_available,
        default_quotient,
        rules: ApportionmentRules {
            tiebreak_mode,
            ..default.rules
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_gives_the_defaults() {
        let config = validate_rules(&SimConfig::default()).unwrap();
        assert_eq!(config, ProjectionConfig::DEFAULT);
    }

    #[test]
    fn tiebreak_modes() {
        let js = r#"{"seatsAvailable": 8, "tiebreakMode": "random", "randomSeed": "42"}"#;
        let sc: SimConfig = serde_json::from_str(js).unwrap();
        let config = validate_rules(&sc).unwrap();
        assert_eq!(config.seats_available, 8);
        assert_eq!(config.rules.tiebreak_mode, TieBreakMode::Random(42));

        let sc = SimConfig {
            tiebreak_mode: Some("random".to_string()),
            ..SimConfig::default()
        };
        assert!(validate_rules(&sc).is_err());
        let sc = SimConfig {
            tiebreak_mode: Some("coinFlip".to_string()),
            ..SimConfig::default()
        };
        assert!(validate_rules(&sc).is_err());
    }

    #[test]
    fn negative_votes_are_rejected() {
        let js = r#"[{"name": "PT", "candidates": [{"name": "ZÉ", "votes": -5}]}]"#;
        let parties: Vec<RosterParty> = serde_json::from_str(js).unwrap();
        let res = validate_roster(&parties);
        assert!(
            matches!(res, Err(SimError::NegativeVotes { field, votes: -5 }) if field == "parties[0].candidates[0].votes")
        );
    }

    #[test]
    fn optional_fields() {
        let js = r#"[{"name": "NOVO", "legendVotes": 2500}]"#;
        let parties: Vec<RosterParty> = serde_json::from_str(js).unwrap();
        let res = validate_roster(&parties).unwrap();
        assert_eq!(res[0].legend_votes, 2500);
        assert!(res[0].candidates.is_empty());
        assert_eq!(res[0].display_color, "");
    }
}
