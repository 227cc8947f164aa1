// Post-apportionment analysis: seat margins, seated candidates and
// candidate rankings.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::aggregate::is_legend_marker;
use crate::config::*;
use crate::wins_tie;

/// How secure the last seat of a party is.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum SeatMargin {
    /// The party did not reach the eligibility threshold.
    #[serde(rename_all = "camelCase")]
    BelowThreshold { votes_short: u64 },
    /// The party won the given highest averages round.
    /// `margin` is the number of votes it can lose before the runner up
    /// overtakes it, `competitor_gap` the number of votes the runner up must gain.
    #[serde(rename_all = "camelCase")]
    Holding {
        round: u32,
        competitor: String,
        margin: u64,
        competitor_gap: u64,
    },
    /// The party lost every round it took part in. `votes_short` is the
    /// smallest number of extra votes that would have won one of them.
    #[serde(rename_all = "camelCase")]
    Chasing {
        round: u32,
        competitor: String,
        votes_short: u64,
    },
    /// No highest averages round was contested by this party.
    NotContested,
}

// One side of a contest for a seat: a party and the divisor it competes with.
#[derive(Clone, Copy)]
struct Side<'a> {
    party: &'a str,
    votes: u64,
    divisor: u32,
}

// Smallest v such that `side` with v votes takes the seat over `other`.
// An equal average is enough when the tiebreak favours `side` at that count.
fn votes_to_win(
    result: &ApportionmentResult,
    rules: &ApportionmentRules,
    round: u32,
    side: Side,
    other: Side,
) -> u64 {
    let num = (other.votes as u128) * (side.divisor as u128);
    let den = other.divisor as u128;
    let res = if num % den != 0 {
        num / den + 1
    } else {
        let tie_votes = (num / den).min(u64::MAX as u128) as u64;
        let takes_tie = wins_tie(
            result,
            rules.tiebreak_mode,
            round,
            (side.party, tie_votes),
            (other.party, other.votes),
        );
        num / den + if takes_tie { 0 } else { 1 }
    };
    res.min(u64::MAX as u128) as u64
}

/// Computes the margin of the given party, found by name ignoring case.
/// Ties count the way `rules` resolves them.
/// Returns `None` if the party is not part of the result.
pub fn seat_margin(
    result: &ApportionmentResult,
    party_name: &str,
    rules: &ApportionmentRules,
) -> Option<SeatMargin> {
    let party = result.party(party_name)?;

    if !party.eligible {
        return Some(SeatMargin::BelowThreshold {
            votes_short: result.eligibility_threshold.saturating_sub(party.total_votes),
        });
    }

    // The last round won is the tightest one: it has the largest divisor.
    let last_won = result
        .rounds
        .iter()
        .filter(|r| r.winner.party == party.name)
        .filter(|r| r.runner_up.is_some())
        .last();
    if let Some(r) = last_won {
        if let Some(ru) = r.runner_up.as_ref() {
            let holder = Side {
                party: &r.winner.party,
                votes: r.winner.votes,
                divisor: r.winner.divisor,
            };
            let competitor = Side {
                party: &ru.party,
                votes: ru.votes,
                divisor: ru.divisor,
            };
            let keep = votes_to_win(result, rules, r.round, holder, competitor);
            let overtake = votes_to_win(result, rules, r.round, competitor, holder);
            return Some(SeatMargin::Holding {
                round: r.round,
                competitor: ru.party.clone(),
                margin: party.total_votes.saturating_sub(keep),
                competitor_gap: overtake.saturating_sub(ru.votes),
            });
        }
    }

    let mut best: Option<(u64, &RoundStats)> = None;
    for r in result.rounds.iter() {
        if r.winner.party == party.name {
            continue;
        }
        let own = r.contenders.iter().find(|c| c.party == party.name);
        if let Some(own) = own {
            let chaser = Side {
                party: &own.party,
                votes: own.votes,
                divisor: own.divisor,
            };
            let winner = Side {
                party: &r.winner.party,
                votes: r.winner.votes,
                divisor: r.winner.divisor,
            };
            let needed = votes_to_win(result, rules, r.round, chaser, winner);
            let short = needed.saturating_sub(own.votes);
            debug!(
                "seat_margin: {:?} is {:?} votes short in round {:?}",
                party.name, short, r.round
            );
            if short > 0 && best.map_or(true, |(b, _)| short < b) {
                best = Some((short, r));
            }
        }
    }
    match best {
        Some((votes_short, r)) => Some(SeatMargin::Chasing {
            round: r.round,
            competitor: r.winner.party.clone(),
            votes_short,
        }),
        None => Some(SeatMargin::NotContested),
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElectionKind {
    /// Seated with a full electoral quotient.
    Direct,
    /// Seated in a highest averages round.
    Remainder,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectedCandidate {
    pub party: String,
    pub name: String,
    pub votes: u64,
    /// Position within the party list, starting at 1.
    pub position: u32,
    pub kind: ElectionKind,
    /// True if the candidate reached the individual vote floor.
    pub met_floor: bool,
}

/// Fills the seats of each party with its candidates.
///
/// Candidates reaching the individual floor are seated first, by decreasing
/// votes, then the others. Legend rows never take a seat.
/// The output is sorted by party name, then by decreasing votes.
pub fn elected_candidates(
    roster: &[Party],
    result: &ApportionmentResult,
    rules: &ApportionmentRules,
) -> Vec<ElectedCandidate> {
    let floor = rules.candidate_floor_ratio;
    let quotient = result.electoral_quotient;
    let mut elected: Vec<ElectedCandidate> = Vec::new();

    for ps in result.parties.iter().filter(|p| p.seats_won > 0) {
        let candidates: Vec<&Candidate> = roster
            .iter()
            .filter(|p| p.name == ps.name)
            .flat_map(|p| p.candidates.iter())
            .filter(|c| !is_legend_marker(&c.name))
            .collect();

        let mut with_floor: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| floor.reached_by(c.votes, quotient))
            .cloned()
            .collect();
        let mut without_floor: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| !floor.reached_by(c.votes, quotient))
            .cloned()
            .collect();
        with_floor.sort_by(|a, b| b.votes.cmp(&a.votes));
        without_floor.sort_by(|a, b| b.votes.cmp(&a.votes));

        let seated = with_floor
            .iter()
            .map(|c| (*c, true))
            .chain(without_floor.iter().map(|c| (*c, false)))
            .take(ps.seats_won as usize);
        for (idx, (c, met_floor)) in seated.enumerate() {
            let kind = if (idx as u32) < ps.direct_seats {
                ElectionKind::Direct
            } else {
                ElectionKind::Remainder
            };
            elected.push(ElectedCandidate {
                party: ps.name.clone(),
                name: c.name.clone(),
                votes: c.votes,
                position: idx as u32 + 1,
                kind,
                met_floor,
            });
        }
        if candidates.len() < ps.seats_won as usize {
            debug!(
                "elected_candidates: party {:?} won {:?} seats but only has {:?} candidates",
                ps.name,
                ps.seats_won,
                candidates.len()
            );
        }
    }

    elected.sort_by(|a, b| a.party.cmp(&b.party).then(b.votes.cmp(&a.votes)));
    elected
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRank {
    pub position: u32,
    pub total_candidates: u32,
}

/// The position an expected vote count would have among all the candidates
/// of the roster.
///
/// Candidates whose name contains `exclude` (ignoring case) are left out, as
/// well as legend rows.
pub fn candidate_rank(roster: &[Party], expected_votes: u64, exclude: Option<&str>) -> CandidateRank {
    let exclude = exclude.map(|s| s.to_uppercase()).filter(|s| !s.is_empty());
    let votes: Vec<u64> = roster
        .iter()
        .flat_map(|p| p.candidates.iter())
        .filter(|c| !is_legend_marker(&c.name))
        .filter(|c| match exclude.as_ref() {
            Some(ex) => !c.name.to_uppercase().contains(ex.as_str()),
            None => true,
        })
        .map(|c| c.votes)
        .collect();
    let above = votes.iter().filter(|v| **v > expected_votes).count();
    CandidateRank {
        position: above as u32 + 1,
        total_candidates: votes.len() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_apportionment;

    fn tallies(data: &[(&str, u64)]) -> Vec<PartyTally> {
        data.iter()
            .map(|(name, votes)| PartyTally {
                name: name.to_string(),
                total_votes: *votes,
            })
            .collect()
    }

    fn seed_result() -> ApportionmentResult {
        let data = tallies(&[
            ("PT", 680000),
            ("PSD/MDB", 535000),
            ("PP", 290000),
            ("REPUBLICANOS", 305000),
        ]);
        run_apportionment(&data, 190000, 10, &ApportionmentRules::DEFAULT_RULES).unwrap()
    }

    fn party(name: &str, candidates: &[(&str, u64)]) -> Party {
        Party {
            name: name.to_string(),
            display_color: String::new(),
            display_text_color: String::new(),
            legend_votes: 0,
            candidates: candidates
                .iter()
                .map(|(n, v)| Candidate {
                    name: n.to_string(),
                    votes: *v,
                    gender: None,
                })
                .collect(),
        }
    }

    #[test]
    fn holding_margin() {
        let res = seed_result();
        let rules = ApportionmentRules::DEFAULT_RULES;
        // REPUBLICANOS won round 3 with 305000/2 against PP at 290000/2.
        // PP comes first in input order and wins a tie.
        let m = seat_margin(&res, "republicanos", &rules).unwrap();
        assert_eq!(
            m,
            SeatMargin::Holding {
                round: 3,
                competitor: "PP".to_string(),
                // Needs > 290000 votes to stay ahead: 290001.
                margin: 305000 - 290001,
                // 305000 ties, and the tie goes to PP.
                competitor_gap: 305000 - 290000,
            }
        );
    }

    #[test]
    fn holding_margin_when_the_holder_wins_ties() {
        let res = seed_result();
        let rules = ApportionmentRules::DEFAULT_RULES;
        // PT won round 2 with 680000/4 against REPUBLICANOS at 305000/2.
        // At 610000 PT ties 305000/2 and keeps the seat on input order.
        let m = seat_margin(&res, "PT", &rules).unwrap();
        assert_eq!(
            m,
            SeatMargin::Holding {
                round: 2,
                competitor: "REPUBLICANOS".to_string(),
                margin: 70000,
                // 340000/2 ties 680000/4 but loses the tie.
                competitor_gap: 340001 - 305000,
            }
        );

        // The margin agrees with the engine: the round 2 seat changes hands
        // one vote past it.
        let round_2_winner = |pt_votes: u64| {
            let data = tallies(&[
                ("PT", pt_votes),
                ("PSD/MDB", 535000),
                ("PP", 290000),
                ("REPUBLICANOS", 305000),
            ]);
            let r = run_apportionment(&data, 190000, 10, &rules).unwrap();
            r.rounds[1].winner.party.clone()
        };
        assert_eq!(round_2_winner(680000 - 70000), "PT");
        assert_eq!(round_2_winner(680000 - 70001), "REPUBLICANOS");
    }

    #[test]
    fn margins_follow_the_tiebreak_mode() {
        let res = seed_result();
        // By name, PP < REPUBLICANOS: PP still takes the tie at 305000.
        let by_name = ApportionmentRules {
            tiebreak_mode: TieBreakMode::PartyName,
            ..ApportionmentRules::DEFAULT_RULES
        };
        assert_eq!(
            seat_margin(&res, "PP", &by_name),
            Some(SeatMargin::Chasing {
                round: 3,
                competitor: "REPUBLICANOS".to_string(),
                votes_short: 15000,
            })
        );
        // With most votes, PT at 610000 ties with REPUBLICANOS at 305000 and
        // has more votes.
        let by_votes = ApportionmentRules {
            tiebreak_mode: TieBreakMode::MostVotes,
            ..ApportionmentRules::DEFAULT_RULES
        };
        assert!(matches!(
            seat_margin(&res, "PT", &by_votes),
            Some(SeatMargin::Holding { margin: 70000, .. })
        ));
    }

    #[test]
    fn chasing_margin() {
        let res = seed_result();
        // PP lost round 3 to REPUBLICANOS: 290000/2 vs 305000/2.
        // Round 1: PSD/MDB at 535000/3: PP needs > 356666.6 -> 356667 (66667 short)
        // Round 2: PT at 680000/4 = 170000: PT wins the tie, PP needs 340001 (50001 short)
        // Round 3: PP wins the tie at 305000 (15000 short)
        let m = seat_margin(&res, "PP", &ApportionmentRules::DEFAULT_RULES).unwrap();
        assert_eq!(
            m,
            SeatMargin::Chasing {
                round: 3,
                competitor: "REPUBLICANOS".to_string(),
                votes_short: 15000,
            }
        );
    }

    #[test]
    fn below_threshold_margin() {
        let rules = ApportionmentRules::DEFAULT_RULES;
        let data = tallies(&[("A", 500000), ("B", 100000)]);
        let res = run_apportionment(&data, 190000, 10, &rules).unwrap();
        assert_eq!(
            seat_margin(&res, "B", &rules),
            Some(SeatMargin::BelowThreshold { votes_short: 52000 })
        );
        // A is alone in every round.
        assert_eq!(seat_margin(&res, "A", &rules), Some(SeatMargin::NotContested));
        assert_eq!(seat_margin(&res, "C", &rules), None);
    }

    #[test]
    fn elected_candidates_respect_the_floor() {
        let roster = vec![party(
            "REPUBLICANOS",
            &[
                ("JADYEL", 120000),
                ("ANA FIDELIS", 40000),
                ("CHARLES", 40000),
                ("MAGNO", 25000),
                ("LEGENDA", 80000),
            ],
        )];
        let data = tallies(&[("REPUBLICANOS", 305000), ("PT", 680000)]);
        let res = run_apportionment(&data, 190000, 10, &ApportionmentRules::DEFAULT_RULES).unwrap();
        let seats = res.party("REPUBLICANOS").unwrap().seats_won;
        assert_eq!(seats, 3);
        let elected = elected_candidates(&roster, &res, &ApportionmentRules::DEFAULT_RULES);
        let names: Vec<&str> = elected.iter().map(|e| e.name.as_str()).collect();
        // Floor is 38000: JADYEL, ANA FIDELIS, CHARLES all reach it.
        assert_eq!(names, vec!["JADYEL", "ANA FIDELIS", "CHARLES"]);
        assert_eq!(elected[0].kind, ElectionKind::Direct);
        assert_eq!(elected[1].kind, ElectionKind::Remainder);
        assert!(elected.iter().all(|e| e.met_floor));
        // PT has no candidates in the roster.
        assert!(elected.iter().all(|e| e.party == "REPUBLICANOS"));
    }

    #[test]
    fn candidates_below_the_floor_fill_remaining_seats() {
        let roster = vec![party("A", &[("LOW1", 1000), ("HIGH", 50000), ("LOW2", 2000)])];
        let data = tallies(&[("A", 400000)]);
        let res = run_apportionment(&data, 190000, 3, &ApportionmentRules::DEFAULT_RULES).unwrap();
        let elected = elected_candidates(&roster, &res, &ApportionmentRules::DEFAULT_RULES);
        let summary: Vec<(&str, bool, u32)> = elected
            .iter()
            .map(|e| (e.name.as_str(), e.met_floor, e.position))
            .collect();
        assert_eq!(
            summary,
            vec![("HIGH", true, 1), ("LOW2", false, 2), ("LOW1", false, 3)]
        );
    }

    #[test]
    fn rank_of_expected_votes() {
        let roster = vec![
            party("REPUBLICANOS", &[("JADYEL", 120000), ("MAGNO", 25000)]),
            party("PT", &[("ZÉ", 120000), ("F NOGUEIRA", 100000), ("LEGENDA", 10000)]),
        ];
        let rank = candidate_rank(&roster, 110000, Some("jadyel"));
        assert_eq!(
            rank,
            CandidateRank {
                position: 2,
                total_candidates: 3
            }
        );
        let rank = candidate_rank(&roster, 110000, None);
        assert_eq!(rank.position, 3);
        assert_eq!(rank.total_candidates, 4);
    }
}
