//! Descriptive metadata flags, one per standard bag-info header.
//!
//! `--contact-name "Ed Summers"` becomes `Contact-Name: Ed Summers`.

use bagit_core::STANDARD_BAG_INFO_HEADERS;
use clap::{Arg, ArgMatches, Args, Command, FromArgMatches};
use std::collections::BTreeMap;

/// Flag name for a header: `Contact-Name` -> `contact-name`.
pub fn flag_name(header: &str) -> String {
    header.to_ascii_lowercase()
}

/// Header name for a flag: each hyphen-separated word capitalized.
pub fn header_name(flag: &str) -> String {
    flag.trim_start_matches('-')
        .split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("-")
}

#[derive(Debug, Clone, Default)]
pub struct BagInfoArgs {
    pub bag_info: BTreeMap<String, String>,
}

impl FromArgMatches for BagInfoArgs {
    fn from_arg_matches(matches: &ArgMatches) -> Result<Self, clap::Error> {
        let mut args = Self::default();
        args.update_from_arg_matches(matches)?;
        Ok(args)
    }

    fn update_from_arg_matches(&mut self, matches: &ArgMatches) -> Result<(), clap::Error> {
        for header in STANDARD_BAG_INFO_HEADERS {
            let flag = flag_name(header);
            if let Some(value) = matches.get_one::<String>(&flag) {
                self.bag_info.insert(header_name(&flag), value.clone());
            }
        }
        Ok(())
    }
}

impl Args for BagInfoArgs {
    fn augment_args(cmd: Command) -> Command {
        STANDARD_BAG_INFO_HEADERS
            .iter()
            .fold(cmd.next_help_heading("Bag metadata"), |cmd, header| {
                let flag = flag_name(header);
                cmd.arg(
                    Arg::new(flag.clone())
                        .long(flag)
                        .value_name("VALUE")
                        .help(format!("Set {} in the descriptive tag file", header)),
                )
            })
    }

    fn augment_args_for_update(cmd: Command) -> Command {
        Self::augment_args(cmd)
    }
}
