/*!
Seat projections over the scenarios of a store.

The service resolves a scenario, aggregates its votes and runs the
apportionment with the configured number of seats. An owner without any
scenario is not an error: the queries answer [`Projection::NotConfigured`].
*/

use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::config::*;
use crate::store::{Scenario, ScenarioRecord, ScenarioStore, StoreError};
use crate::{apportion, candidate_rank, elected_candidates, seat_margin};
use crate::{CandidateRank, ElectedCandidate, SeatMargin, VoteLedger};

pub const DEFAULT_ELECTORAL_QUOTIENT: u64 = 190_000;
pub const DEFAULT_SEATS_AVAILABLE: u32 = 10;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// The number of seats of the race.
    pub seats_available: u32,
    /// The quotient used when the owner has no quotient setting of its own.
    pub default_quotient: u64,
    pub rules: ApportionmentRules,
}

impl ProjectionConfig {
    pub const DEFAULT: ProjectionConfig = ProjectionConfig {
        seats_available: DEFAULT_SEATS_AVAILABLE,
        default_quotient: DEFAULT_ELECTORAL_QUOTIENT,
        rules: ApportionmentRules::DEFAULT_RULES,
    };
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        ProjectionConfig::DEFAULT
    }
}

/// Which scenario a query runs against.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ScenarioRef {
    /// The active scenario of the owner, or its base scenario.
    Active,
    Id(String),
}

impl ScenarioRef {
    /// `active` (any case) designates the active scenario, anything else an id.
    pub fn parse(s: &str) -> ScenarioRef {
        if s.eq_ignore_ascii_case("active") {
            ScenarioRef::Active
        } else {
            ScenarioRef::Id(s.to_string())
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PartyStatus {
    Found,
    PartyNotFound,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatProjection {
    pub party_name: String,
    pub seats_won: u32,
    pub total_votes: u64,
    pub scenario_id: String,
    pub scenario_name: String,
    pub electoral_quotient: u64,
    pub status: PartyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// The answer of a query. `NotConfigured` means that there is nothing to
/// project yet.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "state", content = "projection")]
pub enum Projection<T> {
    #[serde(rename_all = "camelCase")]
    NotConfigured { message: String },
    Ready(T),
}

impl<T> Projection<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Projection::Ready(x) => Some(x),
            Projection::NotConfigured { .. } => None,
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Projection::Ready(_))
    }
}

/// The full apportionment of one scenario.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioProjection {
    pub scenario: Scenario,
    pub result: ApportionmentResult,
    pub elected: Vec<ElectedCandidate>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyMargin {
    pub party_name: String,
    pub scenario_id: String,
    pub seats_won: u32,
    pub status: PartyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin: Option<SeatMargin>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatDelta {
    pub party_name: String,
    pub left_seats: u32,
    pub right_seats: u32,
    pub left_votes: u64,
    pub right_votes: u64,
    /// right - left
    pub delta: i64,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioComparison {
    pub left: ScenarioProjection,
    pub right: ScenarioProjection,
    pub deltas: Vec<SeatDelta>,
}

#[derive(Eq, PartialEq, Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProjectionError {
    #[snafu(display("{source}"))]
    Store { source: StoreError },
    #[snafu(display("Apportionment of scenario {scenario_id} failed: {source}"))]
    Engine {
        source: EngineError,
        scenario_id: String,
    },
}

pub type ProjectionResult<T> = Result<Projection<T>, ProjectionError>;

/// Answers seat queries over a shared store.
#[derive(Debug, Clone)]
pub struct ProjectionService {
    store: Arc<ScenarioStore>,
    config: ProjectionConfig,
}

impl ProjectionService {
    pub fn new(store: Arc<ScenarioStore>, config: ProjectionConfig) -> ProjectionService {
        ProjectionService { store, config }
    }

    pub fn store(&self) -> &ScenarioStore {
        &self.store
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// The quotient for new scenarios of this owner: its own setting, or the
    /// configured default.
    pub fn effective_default_quotient(&self, owner: &str) -> u64 {
        self.store
            .default_quotient(owner)
            .unwrap_or(self.config.default_quotient)
    }

    fn not_configured<T>(owner: &str) -> Projection<T> {
        Projection::NotConfigured {
            message: format!("No party list is configured for owner {}", owner),
        }
    }

    // None when there is nothing to project.
    fn resolve(
        &self,
        owner: &str,
        scenario: &ScenarioRef,
    ) -> Result<Option<ScenarioRecord>, ProjectionError> {
        if !self.store.has_scenarios(owner) {
            debug!("resolve: owner {:?} has no scenarios", owner);
            return Ok(None);
        }
        match scenario {
            ScenarioRef::Active => Ok(self
                .store
                .get_active(owner)
                .filter(|rec| !rec.parties.is_empty())),
            ScenarioRef::Id(id) => self.store.get(owner, id).map(Some).context(StoreSnafu {}),
        }
    }

    fn compute(&self, rec: &ScenarioRecord) -> Result<ApportionmentResult, ProjectionError> {
        let ledger = VoteLedger::from_roster(&rec.parties);
        apportion(
            &ledger,
            rec.scenario.electoral_quotient,
            self.config.seats_available,
            &self.config.rules,
        )
        .context(EngineSnafu {
            scenario_id: rec.scenario.id.clone(),
        })
    }

    fn project_record(&self, rec: ScenarioRecord) -> Result<ScenarioProjection, ProjectionError> {
        let result = self.compute(&rec)?;
        let elected = elected_candidates(&rec.parties, &result, &self.config.rules);
        Ok(ScenarioProjection {
            scenario: rec.scenario,
            result,
            elected,
        })
    }

    /// The seats of one party. The party name is matched ignoring case.
    pub fn seats_for(
        &self,
        owner: &str,
        scenario: &ScenarioRef,
        party_name: &str,
    ) -> ProjectionResult<SeatProjection> {
        let rec = match self.resolve(owner, scenario)? {
            Some(rec) => rec,
            None => return Ok(Self::not_configured(owner)),
        };
        let result = self.compute(&rec)?;
        let proj = match result.party(party_name) {
            Some(ps) => SeatProjection {
                party_name: ps.name.clone(),
                seats_won: ps.seats_won,
                total_votes: ps.total_votes,
                scenario_id: rec.scenario.id.clone(),
                scenario_name: rec.scenario.name.clone(),
                electoral_quotient: rec.scenario.electoral_quotient,
                status: PartyStatus::Found,
                message: None,
            },
            None => SeatProjection {
                party_name: party_name.to_string(),
                seats_won: 0,
                total_votes: 0,
                scenario_id: rec.scenario.id.clone(),
                scenario_name: rec.scenario.name.clone(),
                electoral_quotient: rec.scenario.electoral_quotient,
                status: PartyStatus::PartyNotFound,
                message: Some(format!(
                    "Party {} is not part of scenario {}",
                    party_name, rec.scenario.name
                )),
            },
        };
        info!(
            "seats_for: owner {:?}, scenario {:?}, party {:?}: {:?} seats",
            owner, proj.scenario_id, proj.party_name, proj.seats_won
        );
        Ok(Projection::Ready(proj))
    }

    /// The full apportionment table of a scenario.
    pub fn project(&self, owner: &str, scenario: &ScenarioRef) -> ProjectionResult<ScenarioProjection> {
        match self.resolve(owner, scenario)? {
            Some(rec) => Ok(Projection::Ready(self.project_record(rec)?)),
            None => Ok(Self::not_configured(owner)),
        }
    }

    pub fn margin_for(
        &self,
        owner: &str,
        scenario: &ScenarioRef,
        party_name: &str,
    ) -> ProjectionResult<PartyMargin> {
        let rec = match self.resolve(owner, scenario)? {
            Some(rec) => rec,
            None => return Ok(Self::not_configured(owner)),
        };
        let result = self.compute(&rec)?;
        let margin = seat_margin(&result, party_name, &self.config.rules);
        let res = match result.party(party_name) {
            Some(ps) => PartyMargin {
                party_name: ps.name.clone(),
                scenario_id: rec.scenario.id,
                seats_won: ps.seats_won,
                status: PartyStatus::Found,
                margin,
            },
            None => PartyMargin {
                party_name: party_name.to_string(),
                scenario_id: rec.scenario.id,
                seats_won: 0,
                status: PartyStatus::PartyNotFound,
                margin: None,
            },
        };
        Ok(Projection::Ready(res))
    }

    /// Where a candidate with `expected_votes` would stand among the
    /// candidates of the scenario.
    pub fn candidate_rank(
        &self,
        owner: &str,
        scenario: &ScenarioRef,
        expected_votes: u64,
        exclude: Option<&str>,
    ) -> ProjectionResult<CandidateRank> {
        match self.resolve(owner, scenario)? {
            Some(rec) => Ok(Projection::Ready(candidate_rank(
                &rec.parties,
                expected_votes,
                exclude,
            ))),
            None => Ok(Self::not_configured(owner)),
        }
    }

    /// Compares the seats of two scenarios, party by party.
    ///
    /// Parties are listed in the order of the left scenario, followed by
    /// the parties only present on the right.
    pub fn compare(
        &self,
        owner: &str,
        left: &ScenarioRef,
        right: &ScenarioRef,
    ) -> ProjectionResult<ScenarioComparison> {
        let (l, r) = match (self.resolve(owner, left)?, self.resolve(owner, right)?) {
            (Some(l), Some(r)) => (self.project_record(l)?, self.project_record(r)?),
            _ => return Ok(Self::not_configured(owner)),
        };

        let mut names: Vec<String> = l.result.parties.iter().map(|p| p.name.clone()).collect();
        for p in r.result.parties.iter() {
            if l.result.party(&p.name).is_none() {
                names.push(p.name.clone());
            }
        }
        let deltas = names
            .into_iter()
            .map(|name| {
                let lp = l.result.party(&name);
                let rp = r.result.party(&name);
                let left_seats = lp.map(|p| p.seats_won).unwrap_or(0);
                let right_seats = rp.map(|p| p.seats_won).unwrap_or(0);
                SeatDelta {
                    party_name: name,
                    left_seats,
                    right_seats,
                    left_votes: lp.map(|p| p.total_votes).unwrap_or(0),
                    right_votes: rp.map(|p| p.total_votes).unwrap_or(0),
                    delta: right_seats as i64 - left_seats as i64,
                }
            })
            .collect();
        Ok(Projection::Ready(ScenarioComparison {
            left: l,
            right: r,
            deltas,
        }))
    }
}
