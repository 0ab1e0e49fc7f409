//! parcel - resolve bindle invoices into parcel selections

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = parcel_resolver::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
