use clap::{Arg, Command, ValueHint};
use std::error::Error;
use std::path::PathBuf;

/// Parse the command line and check that the named input file exists
/// before any other work is done.
pub fn parse_args() -> Result<PathBuf, Box<dyn Error>> {
    let matches = Command::new("envelope")
        .version(clap::crate_version!())
        .about("Flags population pairs with outlying distance statistics")
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .required(true)
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help("Tab-separated distance statistics, one population pair per row")
                .value_hint(ValueHint::FilePath),
        )
        .get_matches();

    let path = PathBuf::from(
        matches
            .get_one::<String>("file")
            .expect("file argument is required"),
    );

    if !path.is_file() {
        return Err(format!("{} does not exist", path.display()).into());
    }

    Ok(path)
}
