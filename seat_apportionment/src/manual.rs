/*!

This is the long-form manual for `seat_apportionment` and `seatsim`.

## The apportionment

Seats are distributed with the D'Hondt method of highest averages, after an
eligibility filter:

1. The total of a party is the sum of its legend votes and of the votes of its
   candidates. Rows named `LEGENDA` or `VOTOS LEGENDA` (exactly, case included)
   repeat the legend votes in some spreadsheets and are not counted again.
2. A party is eligible if its total reaches 80% of the electoral quotient.
   Ineligible parties win no seat.
3. Every eligible party receives one direct seat per full quotient.
4. The remaining seats are distributed one at a time: in each round, the party
   with the highest `votes / (seats + 1)` wins a seat.

Averages are compared exactly, without floating point numbers. When two
parties have exactly the same average, the tiebreak mode decides:

* `inputOrder` (default) the party that comes first in the roster wins
* `partyName` the party with the smallest name wins
* `mostVotes` the party with the most votes wins, then the roster order
* `random` a reproducible permutation, derived from the `randomSeed` setting

If the direct seats exceed the seats available, the library logs a warning and
picks the direct seats with the same highest averages rule, each party being
capped at its number of full quotients.

## Scenarios

The party lists live in scenarios. Each owner (a campaign team) has one `base`
scenario that cannot be deleted, and any number of simulations cloned from an
existing scenario. Exactly one scenario is active at any time, unless it was
explicitly deactivated or deleted: in that case, queries fall back to `base`.

Updating a scenario also makes it the active scenario.

## The command line

```text
seatsim [--state FILE] [--owner OWNER] [--config FILE] [--seats N] [--verbose] <COMMAND>
```

The state file (default `seatsim_state.json`) holds all the scenarios of all
the owners. It is created on the first `init`.

* `init --roster FILE [--quotient Q]` loads the base scenario
* `clone --name NAME [--description TEXT] [--from ID]` clones a scenario (default: `base`)
* `update --scenario ID --roster FILE [--quotient Q]` replaces a roster
* `delete --scenario ID`
* `activate --scenario ID [--off]`
* `list`
* `seats --party NAME [--scenario ID]` the number of seats of one party
* `project [--scenario ID]` the full table, round by round, with the seated candidates
* `margin --party NAME [--scenario ID]` the number of votes that would move the last seat.
  Exact ties count as the tiebreak mode resolves them.
* `rank --votes N [--exclude NAME] [--scenario ID]` the position of a vote count among the candidates
* `compare --left ID --right ID` prints the seat deltas, and a line diff of the two scenarios on the standard error

`--scenario active` (the default) designates the active scenario.

## Roster files

A JSON array of parties:

```json
[
  {
    "name": "PT",
    "displayColor": "#c4122d",
    "displayTextColor": "#ffffff",
    "legendVotes": 10000,
    "candidates": [
      { "name": "ZÉ", "votes": 300000, "gender": "homem" },
      { "name": "LEGENDA", "votes": 10000 }
    ]
  }
]
```

Only `name` is mandatory for a party, `name` and `votes` for a candidate.
Votes must not be negative.

## Configuration file

```json
{
  "seatsAvailable": 10,
  "defaultQuotient": 190000,
  "tiebreakMode": "inputOrder",
  "randomSeed": "42"
}
```

All the fields are optional. `--seats` overrides `seatsAvailable`.
*/
