use log::debug;
use snafu::prelude::*;

use crate::config::*;

/// Candidate names that stand for the legend votes of a list. The rows
/// carrying them only exist so that spreadsheets display the legend votes
/// next to the candidates; their votes are already counted in
/// `Party::legend_votes`.
pub const LEGEND_MARKERS: [&str; 2] = ["LEGENDA", "VOTOS LEGENDA"];

/// The comparison is case-sensitive.
pub fn is_legend_marker(candidate_name: &str) -> bool {
    LEGEND_MARKERS.contains(&candidate_name)
}

#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct LedgerRow {
    pub party_name: String,
    pub candidate_name: String,
    pub votes: u64,
}

/// A read-only view over the votes of one scenario: one row per
/// (party, candidate) pair, and the legend votes of each party.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct VoteLedger {
    legend: Vec<(String, u64)>,
    rows: Vec<LedgerRow>,
}

impl VoteLedger {
    pub fn new() -> VoteLedger {
        VoteLedger::default()
    }

    /// Flattens a roster. The parties keep the order of the roster.
    pub fn from_roster(parties: &[Party]) -> VoteLedger {
        let mut ledger = VoteLedger::new();
        for p in parties.iter() {
            ledger.add_legend(&p.name, p.legend_votes);
            for c in p.candidates.iter() {
                ledger.add_row(&p.name, &c.name, c.votes);
            }
        }
        ledger
    }

    pub fn add_legend(&mut self, party_name: &str, votes: u64) {
        self.legend.push((party_name.to_string(), votes));
    }

    pub fn add_row(&mut self, party_name: &str, candidate_name: &str, votes: u64) {
        self.rows.push(LedgerRow {
            party_name: party_name.to_string(),
            candidate_name: candidate_name.to_string(),
            votes,
        });
    }

    pub fn rows(&self) -> &[LedgerRow] {
        &self.rows
    }

    pub fn legend_votes(&self) -> &[(String, u64)] {
        &self.legend
    }

    pub fn is_empty(&self) -> bool {
        self.legend.is_empty() && self.rows.is_empty()
    }
}

/// Computes the total votes of each party.
///
/// Parties are returned in order of first appearance: legend entries first,
/// then candidate rows. Repeated entries for the same party or the same
/// candidate add up.
pub fn aggregate_votes(ledger: &VoteLedger) -> Result<Vec<PartyTally>, EngineError> {
    let mut tallies: Vec<PartyTally> = Vec::new();

    fn add_to(
        tallies: &mut Vec<PartyTally>,
        party_name: &str,
        votes: u64,
    ) -> Result<(), EngineError> {
        let idx = match tallies.iter().position(|t| t.name == party_name) {
            Some(idx) => idx,
            None => {
                tallies.push(PartyTally {
                    name: party_name.to_string(),
                    total_votes: 0,
                });
                tallies.len() - 1
            }
        };
        let tally = &mut tallies[idx];
        tally.total_votes = tally
            .total_votes
            .checked_add(votes)
            .context(VoteOverflowSnafu { party: party_name })?;
        Ok(())
    }

    for (party_name, votes) in ledger.legend.iter() {
        add_to(&mut tallies, party_name, *votes)?;
    }

    for row in ledger.rows.iter() {
        if is_legend_marker(&row.candidate_name) {
            debug!(
                "aggregate_votes: skipping legend row {:?} for party {:?}",
                row.candidate_name, row.party_name
            );
            // The party still exists, even if it only has legend rows.
            add_to(&mut tallies, &row.party_name, 0)?;
            continue;
        }
        add_to(&mut tallies, &row.party_name, row.votes)?;
    }

    debug!("aggregate_votes: tallies: {:?}", tallies);
    Ok(tallies)
}
