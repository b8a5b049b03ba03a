//! `hookline sign`

use super::read_body;
use crate::error::CliResult;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SignArgs {
    pub secret: String,
    pub file: Option<PathBuf>,
}

pub fn run(args: SignArgs) -> CliResult<()> {
    let body = read_body(args.file.as_deref())?;
    println!("{}", hookline_webhooks::sign(&body, &args.secret));
    Ok(())
}
