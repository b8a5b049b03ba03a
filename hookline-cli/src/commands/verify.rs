//! `hookline verify`

use super::read_body;
use crate::error::CliResult;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct VerifyArgs {
    pub secret: String,
    pub signature: String,
    pub file: Option<PathBuf>,
}

/// Returns whether the signature matched
pub fn run(args: VerifyArgs) -> CliResult<bool> {
    let body = read_body(args.file.as_deref())?;
    let valid = hookline_webhooks::verify(&body, args.signature.trim(), &args.secret);

    if valid {
        println!("{}", "valid".green());
    } else {
        println!("{}", "invalid".red());
    }
    Ok(valid)
}
