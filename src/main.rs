//! Bank command-line front end
//!
//! # Usage
//!
//! ```bash
//! bank --database bank.db init
//! bank add-holder --name "Ada Lovelace" --login-id ada --birth-date 1990-12-10
//! bank open --number 1 --kind savings --balance 1000 --holder 1 --secret-key s3cret \
//!     --minimum-balance 100 --penalty-fee 10 --interest-rate 0.0025
//! bank --login ada transfer 1 2 250.00
//! bank history 1 --from 2024-06-01 --to 2024-06-30
//! bank process --strategy async --batch-size 2000 operations.csv > accounts.csv
//! ```
//!
//! Set `RUST_LOG=debug` to see every applied operation on stderr.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (denied operation, unknown account, unreadable file, etc.)

use banking_engine::cli;
use std::process;

fn main() {
    env_logger::init();

    let args = cli::parse_args();

    let mut output = std::io::stdout();
    if let Err(e) = cli::run(args, &mut output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
