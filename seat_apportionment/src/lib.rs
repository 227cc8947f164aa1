mod aggregate;
mod analysis;
pub mod builder;
mod config;
pub mod manual;
pub mod projection;
pub mod store;

use log::{debug, info, warn};
use snafu::prelude::*;

use std::cmp::Ordering;

pub use crate::aggregate::*;
pub use crate::analysis::*;
pub use crate::config::*;

// **** Private structures ****

type RoundId = u32;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
struct PartyId(usize);

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
struct VoteCount(u64);

// votes / divisor, compared exactly by cross multiplication. 300/2 and
// 150/1 are equal.
#[derive(Debug, Clone, Copy)]
struct Average {
    votes: VoteCount,
    divisor: u32,
}

impl Average {
    fn cross(&self, other: &Average) -> (u128, u128) {
        (
            (self.votes.0 as u128) * (other.divisor as u128),
            (other.votes.0 as u128) * (self.divisor as u128),
        )
    }
}

impl Ord for Average {
    fn cmp(&self, other: &Self) -> Ordering {
        let (lhs, rhs) = self.cross(other);
        lhs.cmp(&rhs)
    }
}

impl PartialEq for Average {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Average {}

impl PartialOrd for Average {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
struct Standing {
    id: PartyId,
    name: String,
    votes: VoteCount,
    eligible: bool,
}

// The outcome of the highest averages phase.
struct Distribution {
    seats: Vec<u32>,
    rounds: Vec<RoundStats>,
}

/// Runs the D'Hondt apportionment for the given party totals.
///
/// Arguments:
/// * `tallies` the total votes of each party. The order matters for the
/// `InputOrder` tiebreak mode.
/// * `electoral_quotient` the number of votes that grants one seat
/// * `seats_available` the number of seats to fill
/// * `rules` the rules for eligibility and tiebreaks
pub fn run_apportionment(
    tallies: &[PartyTally],
    electoral_quotient: u64,
    seats_available: u32,
    rules: &ApportionmentRules,
) -> Result<ApportionmentResult, EngineError> {
    info!(
        "Apportioning {:?} seats among {:?} parties, quotient: {:?}, rules: {:?}",
        seats_available,
        tallies.len(),
        electoral_quotient,
        rules
    );
    ensure!(
        electoral_quotient > 0,
        InvalidQuotientSnafu {
            quotient: electoral_quotient
        }
    );
    rules.eligibility_ratio.check("eligibility_ratio")?;

    let standings: Vec<Standing> = tallies
        .iter()
        .enumerate()
        .map(|(idx, t)| Standing {
            id: PartyId(idx),
            name: t.name.clone(),
            votes: VoteCount(t.total_votes),
            eligible: rules
                .eligibility_ratio
                .reached_by(t.total_votes, electoral_quotient),
        })
        .collect();
    for s in standings.iter() {
        debug!(
            "run_apportionment: party {:?}: {:?} votes, eligible: {:?}",
            s.name, s.votes.0, s.eligible
        );
    }

    let no_seats = vec![0; standings.len()];

    // Nothing to distribute.
    if seats_available == 0 || standings.is_empty() {
        return Ok(build_result(
            &standings,
            &no_seats,
            &no_seats,
            Vec::new(),
            electoral_quotient,
            seats_available,
            rules,
        ));
    }

    let direct_seats: Vec<u32> = standings
        .iter()
        .map(|s| {
            if s.eligible {
                (s.votes.0 / electoral_quotient).min(u32::MAX as u64) as u32
            } else {
                0
            }
        })
        .collect();
    let direct_total: u64 = direct_seats.iter().map(|x| *x as u64).sum();
    debug!(
        "run_apportionment: direct seats: {:?} (total {:?})",
        direct_seats, direct_total
    );

    if direct_total > seats_available as u64 {
        // The quotient does not match the number of seats. The direct seats
        // are trimmed by handing out all the seats in averages order, without
        // giving any party more than its full quotients.
        warn!(
            "run_apportionment: {:?} direct seats exceed the {:?} available seats, check the electoral quotient {:?}",
            direct_total, seats_available, electoral_quotient
        );
        let dist = highest_averages(
            &standings,
            &no_seats,
            Some(direct_seats.as_slice()),
            seats_available,
            rules.tiebreak_mode,
        );
        return Ok(build_result(
            &standings,
            &dist.seats,
            &no_seats,
            dist.rounds,
            electoral_quotient,
            seats_available,
            rules,
        ));
    }

    let remaining = seats_available - direct_total as u32;
    info!(
        "run_apportionment: {:?} direct seats, {:?} remaining seats",
        direct_total, remaining
    );
    let dist = highest_averages(
        &standings,
        &direct_seats,
        None,
        remaining,
        rules.tiebreak_mode,
    );
    let extra: Vec<u32> = dist
        .seats
        .iter()
        .zip(direct_seats.iter())
        .map(|(total, direct)| total - direct)
        .collect();
    Ok(build_result(
        &standings,
        &direct_seats,
        &extra,
        dist.rounds,
        electoral_quotient,
        seats_available,
        rules,
    ))
}

/// Aggregates the ledger and runs the apportionment on the party totals.
pub fn apportion(
    ledger: &VoteLedger,
    electoral_quotient: u64,
    seats_available: u32,
    rules: &ApportionmentRules,
) -> Result<ApportionmentResult, EngineError> {
    let tallies = aggregate_votes(ledger)?;
    run_apportionment(&tallies, electoral_quotient, seats_available, rules)
}

fn build_result(
    standings: &[Standing],
    direct: &[u32],
    extra: &[u32],
    rounds: Vec<RoundStats>,
    electoral_quotient: u64,
    seats_available: u32,
    rules: &ApportionmentRules,
) -> ApportionmentResult {
    let parties = standings
        .iter()
        .map(|s| {
            let idx = s.id.0;
            PartySeats {
                name: s.name.clone(),
                total_votes: s.votes.0,
                eligible: s.eligible,
                direct_seats: direct[idx],
                remainder_seats: extra[idx],
                seats_won: direct[idx] + extra[idx],
            }
        })
        .collect();
    ApportionmentResult {
        electoral_quotient,
        seats_available,
        eligibility_threshold: rules.eligibility_ratio.min_votes(electoral_quotient),
        parties,
        rounds,
    }
}

/// Hands out `num_seats` seats one at a time to the eligible party with the
/// largest average. `start` is the number of seats each party already holds.
/// If `cap` is provided, a party stops receiving seats once it reaches its cap.
fn highest_averages(
    standings: &[Standing],
    start: &[u32],
    cap: Option<&[u32]>,
    num_seats: u32,
    tiebreak: TieBreakMode,
) -> Distribution {
    let mut seats: Vec<u32> = start.to_vec();
    let mut rounds: Vec<RoundStats> = Vec::new();

    for idx in 0..num_seats {
        let round_id: RoundId = idx + 1;
        let mut contenders: Vec<(PartyId, Average)> = standings
            .iter()
            .filter(|s| s.eligible)
            .filter(|s| cap.map_or(true, |c| seats[s.id.0] < c[s.id.0]))
            .map(|s| {
                (
                    s.id,
                    Average {
                        votes: s.votes,
                        divisor: seats[s.id.0] + 1,
                    },
                )
            })
            .collect();

        if contenders.is_empty() {
            debug!(
                "highest_averages: round {:?}: no party can receive a seat, stopping",
                round_id
            );
            break;
        }

        let contender_stats: Vec<Contender> = contenders
            .iter()
            .map(|(pid, avg)| to_contender(standings, *pid, avg))
            .collect();

        // Stable sort: equal averages keep the input order.
        contenders.sort_by(|a, b| b.1.cmp(&a.1));
        let best = contenders[0].1;
        let tied: Vec<PartyId> = contenders
            .iter()
            .filter(|(_, avg)| avg.cmp(&best) == Ordering::Equal)
            .map(|(pid, _)| *pid)
            .collect();

        let winner_id = if tied.len() == 1 {
            tied[0]
        } else {
            let w = resolve_tiebreak(standings, &tied, tiebreak, round_id);
            debug!(
                "highest_averages: round {:?}: tie between {:?}, resolved with {:?} to {:?}",
                round_id, tied, tiebreak, w
            );
            w
        };

        let (_, winner_avg) = contenders
            .iter()
            .find(|(pid, _)| *pid == winner_id)
            .copied()
            .unwrap_or(contenders[0]);
        let runner_up = contenders
            .iter()
            .find(|(pid, _)| *pid != winner_id)
            .map(|(pid, avg)| to_contender(standings, *pid, avg));

        let winner = to_contender(standings, winner_id, &winner_avg);
        debug!(
            "highest_averages: round {:?}: seat to {:?} ({:?}/{:?}), runner up: {:?}",
            round_id, winner.party, winner.votes, winner.divisor, runner_up
        );
        seats[winner_id.0] += 1;
        rounds.push(RoundStats {
            round: round_id,
            winner,
            runner_up,
            contenders: contender_stats,
            tiebreak: tied.len() > 1,
        });
    }

    Distribution { seats, rounds }
}

fn to_contender(standings: &[Standing], pid: PartyId, avg: &Average) -> Contender {
    Contender {
        party: standings[pid.0].name.clone(),
        votes: avg.votes.0,
        divisor: avg.divisor,
    }
}

// Invariant: `tied` is not empty and is in input order.
fn resolve_tiebreak(
    standings: &[Standing],
    tied: &[PartyId],
    tiebreak: TieBreakMode,
    round_id: RoundId,
) -> PartyId {
    let mut sorted: Vec<PartyId> = tied.to_vec();
    match tiebreak {
        TieBreakMode::InputOrder => {
            sorted.sort();
        }
        TieBreakMode::PartyName => {
            sorted.sort_by(|a, b| {
                standings[a.0]
                    .name
                    .cmp(&standings[b.0].name)
                    .then(a.cmp(b))
            });
        }
        TieBreakMode::MostVotes => {
            sorted.sort_by(|a, b| {
                standings[b.0]
                    .votes
                    .cmp(&standings[a.0].votes)
                    .then(a.cmp(b))
            });
        }
        TieBreakMode::Random(seed) => {
            let named: Vec<(PartyId, String)> = sorted
                .iter()
                .map(|pid| (*pid, standings[pid.0].name.clone()))
                .collect();
            sorted = party_permutation_crypto(&named, seed, round_id);
        }
    }
    sorted[0]
}

/// Whether party `a` takes the seat over party `b` when both have the same
/// average in round `round_id`. Each side is a name and a vote total; the
/// totals may differ from the ones in `result`. Parties missing from the
/// result never win.
pub(crate) fn wins_tie(
    result: &ApportionmentResult,
    tiebreak: TieBreakMode,
    round_id: RoundId,
    a: (&str, u64),
    b: (&str, u64),
) -> bool {
    let standings: Vec<Standing> = result
        .parties
        .iter()
        .enumerate()
        .map(|(idx, p)| {
            let votes = if p.name == a.0 {
                a.1
            } else if p.name == b.0 {
                b.1
            } else {
                p.total_votes
            };
            Standing {
                id: PartyId(idx),
                name: p.name.clone(),
                votes: VoteCount(votes),
                eligible: p.eligible,
            }
        })
        .collect();
    let find = |name: &str| standings.iter().find(|s| s.name == name).map(|s| s.id);
    match (find(a.0), find(b.0)) {
        (Some(ida), Some(idb)) if ida != idb => {
            let mut tied = vec![ida, idb];
            tied.sort();
            resolve_tiebreak(&standings, &tied, tiebreak, round_id) == ida
        }
        _ => false,
    }
}

/// Generates a "random" permutation of the parties. Random in this context means hard to guess in advance.
/// The order only depends on the seed, the round and the party names.
fn party_permutation_crypto(
    parties: &[(PartyId, String)],
    seed: u32,
    round_id: RoundId,
) -> Vec<PartyId> {
    let mut data: Vec<(PartyId, String)> = parties
        .iter()
        .map(|(pid, name)| {
            let key = format!("{:08}{:08}{}", seed, round_id, name);
            (*pid, sha256::digest(key.as_str()))
        })
        .collect();
    data.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
    data.iter().map(|p| p.0).collect()
}
