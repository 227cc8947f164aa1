// ********* Input data structures ***********

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// A candidate on a party list.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub name: String,
    pub votes: u64,
    /// Descriptive only. It plays no role in the apportionment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

/// A party list within one scenario.
///
/// `legend_votes` are the votes cast for the list itself and not for any of
/// its candidates.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub name: String,
    #[serde(default)]
    pub display_color: String,
    #[serde(default)]
    pub display_text_color: String,
    #[serde(default)]
    pub legend_votes: u64,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

/// The total number of votes obtained by a party, candidates and legend
/// votes included.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyTally {
    pub name: String,
    pub total_votes: u64,
}

// ******** Output data structures *********

/// The seats obtained by one party.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartySeats {
    pub name: String,
    pub total_votes: u64,
    /// True if the party reached the minimum share of the electoral quotient.
    pub eligible: bool,
    /// Seats obtained with full electoral quotients.
    pub direct_seats: u32,
    /// Seats obtained in the highest averages rounds.
    pub remainder_seats: u32,
    pub seats_won: u32,
}

/// A party taking part in a highest averages round.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contender {
    pub party: String,
    pub votes: u64,
    /// The number of seats held before the round, plus one.
    pub divisor: u32,
}

impl Contender {
    /// The average of this contender, as a floating point number.
    ///
    /// Only meant for display. All the decisions are taken on exact ratios.
    pub fn average(&self) -> f64 {
        self.votes as f64 / self.divisor as f64
    }
}

/// Statistics for one highest averages round.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStats {
    pub round: u32,
    pub winner: Contender,
    pub runner_up: Option<Contender>,
    /// All the parties that were still able to receive a seat in this round,
    /// in input order.
    pub contenders: Vec<Contender>,
    /// True if the winner had to be picked among several equal averages.
    pub tiebreak: bool,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApportionmentResult {
    pub electoral_quotient: u64,
    pub seats_available: u32,
    /// The smallest vote total that makes a party eligible.
    pub eligibility_threshold: u64,
    /// The parties, in input order.
    pub parties: Vec<PartySeats>,
    pub rounds: Vec<RoundStats>,
}

impl ApportionmentResult {
    /// The total number of seats handed out.
    pub fn seats_allocated(&self) -> u32 {
        self.parties.iter().map(|p| p.seats_won).sum()
    }

    /// Finds a party by name, ignoring case. An exact match comes first.
    pub fn party(&self, name: &str) -> Option<&PartySeats> {
        let lname = name.to_lowercase();
        self.parties.iter().find(|p| p.name == name).or_else(|| {
            self.parties
                .iter()
                .find(|p| p.name.to_lowercase() == lname)
        })
    }
}

/// Errors that prevent the apportionment from completing.
#[derive(Eq, PartialEq, Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EngineError {
    #[snafu(display("The electoral quotient must be positive, got {quotient}"))]
    InvalidQuotient { quotient: u64 },
    #[snafu(display("Invalid ratio for {field}: {numerator}/{denominator}"))]
    InvalidRatio {
        field: String,
        numerator: u64,
        denominator: u64,
    },
    #[snafu(display("The vote total of party {party} does not fit in 64 bits"))]
    VoteOverflow { party: String },
}

// ********* Configuration **********

/// How to pick the winner of a highest averages round when several parties
/// have exactly the same average.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum TieBreakMode {
    /// The party that appears first in the input wins.
    InputOrder,
    /// The party with the lexicographically smallest name wins.
    PartyName,
    /// The party with the largest vote total wins, then input order.
    MostVotes,
    /// A permutation that is hard to guess in advance but reproducible from
    /// the seed. It uses a cryptographic hash on the party names.
    Random(u32),
}

/// An exact fraction, used for the participation floors.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ratio {
    pub numerator: u64,
    pub denominator: u64,
}

impl Ratio {
    pub const fn new(numerator: u64, denominator: u64) -> Ratio {
        Ratio {
            numerator,
            denominator,
        }
    }

    /// True if `votes >= ratio * quotient`, computed without rounding.
    pub fn reached_by(&self, votes: u64, quotient: u64) -> bool {
        (votes as u128) * (self.denominator as u128)
            >= (self.numerator as u128) * (quotient as u128)
    }

    /// The smallest vote count that reaches `ratio * quotient`.
    pub fn min_votes(&self, quotient: u64) -> u64 {
        let num = (self.numerator as u128) * (quotient as u128);
        let den = self.denominator as u128;
        let res = (num + den - 1) / den;
        res.min(u64::MAX as u128) as u64
    }

    pub(crate) fn check(&self, field: &str) -> Result<(), EngineError> {
        ensure!(
            self.denominator > 0,
            InvalidRatioSnafu {
                field,
                numerator: self.numerator,
                denominator: self.denominator,
            }
        );
        Ok(())
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ApportionmentRules {
    pub tiebreak_mode: TieBreakMode,
    /// The share of the electoral quotient a party needs to take part in
    /// the apportionment.
    pub eligibility_ratio: Ratio,
    /// The share of the electoral quotient a candidate needs to be seated
    /// ahead of the other candidates of the same list.
    pub candidate_floor_ratio: Ratio,
}

impl ApportionmentRules {
    pub const DEFAULT_RULES: ApportionmentRules = ApportionmentRules {
        tiebreak_mode: TieBreakMode::InputOrder,
        eligibility_ratio: Ratio::new(4, 5),
        candidate_floor_ratio: Ratio::new(1, 5),
    };
}

impl Default for ApportionmentRules {
    fn default() -> Self {
        ApportionmentRules::DEFAULT_RULES
    }
}
