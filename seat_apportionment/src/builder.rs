pub use crate::config::*;
use crate::store::StoreError;

/// A builder for party rosters.
///
/// Candidates are added to the party that was declared last.
///
/// ```
/// pub use seat_apportionment::builder::Builder;
/// # use seat_apportionment::store::StoreError;
///
/// let roster = Builder::new()
///     .party("PT")?
///     .legend_votes(10000)?
///     .candidate("ZÉ", 120000)?
///     .candidate("F COSTA", 120000)?
///     .party("REPUBLICANOS")?
///     .candidate("JADYEL", 120000)?
///     .build();
///
/// assert_eq!(roster.len(), 2);
/// assert_eq!(roster[0].candidates.len(), 2);
/// # Ok::<(), StoreError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Builder {
    pub(crate) _parties: Vec<Party>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder {
            _parties: Vec::new(),
        }
    }

    /// Starts a new party list.
    pub fn party(self, name: &str) -> Result<Builder, StoreError> {
        self.party_with_colors(name, "", "")
    }

    pub fn party_with_colors(
        mut self,
        name: &str,
        color: &str,
        text_color: &str,
    ) -> Result<Builder, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::Validation {
                field: "party.name".to_string(),
                reason: "party names may not be empty".to_string(),
            });
        }
        let lname = name.to_lowercase();
        if self._parties.iter().any(|p| p.name.to_lowercase() == lname) {
            return Err(StoreError::Validation {
                field: "party.name".to_string(),
                reason: format!("party {} is declared twice", name),
            });
        }
        self._parties.push(Party {
            name: name.to_string(),
            display_color: color.to_string(),
            display_text_color: text_color.to_string(),
            legend_votes: 0,
            candidates: Vec::new(),
        });
        Ok(self)
    }

    /// Sets the legend votes of the current party.
    pub fn legend_votes(mut self, votes: u64) -> Result<Builder, StoreError> {
        let party = self.current()?;
        party.legend_votes = votes;
        Ok(self)
    }

    /// Adds a candidate to the current party.
    pub fn candidate(self, name: &str, votes: u64) -> Result<Builder, StoreError> {
        self.candidate_with_gender(name, votes, None)
    }

    pub fn candidate_with_gender(
        mut self,
        name: &str,
        votes: u64,
        gender: Option<&str>,
    ) -> Result<Builder, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::Validation {
                field: "candidate.name".to_string(),
                reason: "candidate names may not be empty".to_string(),
            });
        }
        let party = self.current()?;
        party.candidates.push(Candidate {
            name: name.to_string(),
            votes,
            gender: gender.map(|s| s.to_string()),
        });
        Ok(self)
    }

    pub fn build(self) -> Vec<Party> {
        self._parties
    }

    fn current(&mut self) -> Result<&mut Party, StoreError> {
        self._parties.last_mut().ok_or_else(|| StoreError::Validation {
            field: "party".to_string(),
            reason: "declare a party before adding votes".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_before_party() {
        let res = Builder::new().candidate("ZÉ", 1000);
        assert!(matches!(res, Err(StoreError::Validation { .. })));
    }

    #[test]
    fn duplicate_party() {
        let res = Builder::new().party("PT").and_then(|b| b.party("PT"));
        assert!(matches!(res, Err(StoreError::Validation { field, .. }) if field == "party.name"));
        // Parties are looked up ignoring case.
        let res = Builder::new().party("PT").and_then(|b| b.party("pt"));
        assert!(matches!(res, Err(StoreError::Validation { field, .. }) if field == "party.name"));
    }

    #[test]
    fn colors_and_gender() {
        let roster = Builder::new()
            .party_with_colors("PP", "#003399", "#ffffff")
            .and_then(|b| b.candidate_with_gender("SAMANTA CAVALCA", 10000, Some("mulher")))
            .unwrap()
            .build();
        assert_eq!(roster[0].display_color, "#003399");
        assert_eq!(roster[0].candidates[0].gender.as_deref(), Some("mulher"));
    }
}
