use clap::{Parser, Subcommand};

/// This is a seat apportionment simulator for proportional legislative races.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, default seatsim_state.json) The file holding the scenarios of all the owners, in JSON format.
    /// It is created if it does not exist.
    #[clap(short, long, value_parser, default_value = "seatsim_state.json")]
    pub state: String,

    /// (default 'default') The owner (campaign team) of the scenarios.
    #[clap(short, long, value_parser, default_value = "default")]
    pub owner: String,

    /// (file path, optional) A JSON configuration file with the number of seats, the default quotient and
    /// the tiebreak mode. For more information about the file format, read the documentation of
    /// seat_apportionment::manual.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (number, optional) The number of seats of the race. Overrides the configuration file.
    #[clap(long, value_parser)]
    pub seats: Option<u32>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Loads the base scenario from a roster file.
    Init {
        /// (file path) A JSON array of parties.
        #[clap(long, value_parser)]
        roster: String,
        /// (number, optional) The electoral quotient. It is also saved as the default quotient of the owner.
        #[clap(long, value_parser)]
        quotient: Option<u64>,
    },
    /// Creates a simulation as a copy of an existing scenario.
    #[clap(name = "clone")]
    CloneScenario {
        #[clap(long, value_parser)]
        name: String,
        #[clap(long, value_parser)]
        description: Option<String>,
        /// (default base) The scenario to copy.
        #[clap(long, value_parser, default_value = "base")]
        from: String,
    },
    /// Replaces the roster of a scenario, and makes it the active scenario.
    Update {
        #[clap(long, value_parser)]
        scenario: String,
        #[clap(long, value_parser)]
        roster: String,
        /// (number, optional) The new electoral quotient. By default, the quotient is unchanged.
        #[clap(long, value_parser)]
        quotient: Option<u64>,
    },
    /// Deletes a simulation.
    Delete {
        #[clap(long, value_parser)]
        scenario: String,
    },
    /// Activates a scenario, or deactivates it with --off.
    Activate {
        #[clap(long, value_parser)]
        scenario: String,
        #[clap(long, takes_value = false)]
        off: bool,
    },
    /// Lists the scenarios of the owner.
    List,
    /// The number of seats of one party.
    Seats {
        #[clap(long, value_parser)]
        party: String,
        #[clap(long, value_parser, default_value = "active")]
        scenario: String,
    },
    /// The full apportionment of a scenario.
    Project {
        #[clap(long, value_parser, default_value = "active")]
        scenario: String,
    },
    /// How many votes separate a party from winning or losing its last seat.
    Margin {
        #[clap(long, value_parser)]
        party: String,
        #[clap(long, value_parser, default_value = "active")]
        scenario: String,
    },
    /// The position a vote count would have among the candidates.
    Rank {
        #[clap(long, value_parser)]
        votes: u64,
        /// (optional) Leaves out the candidates whose name contains this text.
        #[clap(long, value_parser)]
        exclude: Option<String>,
        #[clap(long, value_parser, default_value = "active")]
        scenario: String,
    },
    /// Compares the seats of two scenarios.
    Compare {
        #[clap(long, value_parser, default_value = "base")]
        left: String,
        #[clap(long, value_parser, default_value = "active")]
        right: String,
    },
}
