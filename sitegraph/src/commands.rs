use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;
use url::Url;

/// `--url` / `--file` / `--site`, shared by every subcommand that reads a sitemap.
fn with_source_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(-u --"url" <URL>)
            .required(false)
            .help("Sitemap (or sitemap index) URL to fetch")
            .value_parser(clap::value_parser!(Url))
            .conflicts_with_all(["file", "site"]),
    )
    .arg(
        arg!(-F --"file" <PATH>)
            .required(false)
            .help("Local sitemap XML file; index entries are still fetched over HTTP")
            .value_parser(clap::value_parser!(PathBuf))
            .conflicts_with_all(["url", "site"]),
    )
    .arg(
        arg!(-s --"site" <URL>)
            .required(false)
            .help("Site root; the sitemap is discovered through robots.txt")
            .value_parser(clap::value_parser!(Url))
            .conflicts_with_all(["url", "file"]),
    )
    .group(
        clap::ArgGroup::new("source")
            .args(["url", "file", "site"])
            .required(true),
    )
    .arg(
        arg!(-c --"config" <PATH>)
            .required(false)
            .help("Config file (default: ~/.config/sitegraph/config.json)")
            .value_parser(clap::value_parser!(PathBuf)),
    )
    .arg(
        arg!(--"timeout" <SECONDS>)
            .required(false)
            .help("Request timeout in seconds")
            .value_parser(clap::value_parser!(u64)),
    )
    .arg(
        arg!(--"max-depth" <DEPTH>)
            .required(false)
            .help("How many levels of nested sitemap indexes to follow")
            .value_parser(clap::value_parser!(usize)),
    )
    .arg(
        arg!(--"max-sitemaps" <NUM>)
            .required(false)
            .help("Maximum number of sub-sitemaps fetched per run")
            .value_parser(clap::value_parser!(usize)),
    )
}

fn with_output_arg(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(-o --"output" <PATH>)
            .required(false)
            .help("Save output to file (default: display to screen)")
            .value_parser(clap::value_parser!(PathBuf)),
    )
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitegraph")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitegraph")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(arg!(-v --"verbose" "Log debug output to stderr").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Creates the sitegraph config directory, config file and database")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location of the sitegraph config directory")
                        .default_value("~/.config/sitegraph/"),
                )
                .arg(
                    arg!(-f - -"force")
                        .help("Overwrite any existing config file and database at the location.")
                        .required(false),
                ),
        )
        .subcommand(with_output_arg(with_source_args(
            command!("fetch")
                .about("Fetches a sitemap, following sitemap indexes, and lists its entries")
                .arg(
                    arg!(--"format" <FORMAT>)
                        .required(false)
                        .help("Output format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )))
        .subcommand(with_output_arg(with_source_args(
            command!("tree")
                .about("Prints the page hierarchy of a sitemap")
                .arg(
                    arg!(--"format" <FORMAT>)
                        .required(false)
                        .help("Output format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(--"max-nodes" <NUM>)
                        .required(false)
                        .help("Keep only the first NUM pages")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )))
        .subcommand(with_output_arg(with_source_args(
            command!("layout")
                .about("Lays out the page hierarchy and writes the projected graph as JSON")
                .arg(
                    arg!(-l --"layout" <LAYOUT>)
                        .required(false)
                        .help("Layout algorithm (default from config, else tree); repeat for several")
                        .value_parser(["grid", "depth-columns", "radial", "force", "tree"])
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(--"width" <PX>)
                        .required(false)
                        .help("Viewport width")
                        .value_parser(clap::value_parser!(f64))
                        .requires("height"),
                )
                .arg(
                    arg!(--"height" <PX>)
                        .required(false)
                        .help("Viewport height")
                        .value_parser(clap::value_parser!(f64))
                        .requires("width"),
                )
                .arg(
                    arg!(--"spacing" <PX>)
                        .required(false)
                        .help("Gap between nodes")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    arg!(--"iterations" <NUM>)
                        .required(false)
                        .help("Force layout iterations")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"seed" <SEED>)
                        .required(false)
                        .help("Force layout seed")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"max-nodes" <NUM>)
                        .required(false)
                        .help("Project at most NUM pages (default 500)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"db" <PATH>)
                        .required(false)
                        .help("Persist the graph to this sitegraph database")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-p --"project" <ID>)
                        .required(false)
                        .help("Existing project id in the database (default: create one)")
                        .requires("db"),
                )
                .arg(
                    arg!(--"keep-positions" "Pages already placed in the project keep their position")
                        .required(false)
                        .requires("project"),
                ),
        )))
        .subcommand(
            command!("move")
                .about("Stores a hand-placed position for one node")
                .arg(
                    arg!(--"db" <PATH>)
                        .required(true)
                        .help("sitegraph database holding the node")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(arg!(--"node" <ID>).required(true).help("Node id"))
                .arg(
                    arg!(--"x" <X>)
                        .required(true)
                        .allow_negative_numbers(true)
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    arg!(--"y" <Y>)
                        .required(true)
                        .allow_negative_numbers(true)
                        .value_parser(clap::value_parser!(f64)),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_is_consistent() {
        command_argument_builder().debug_assert();
    }

    #[test]
    fn test_source_is_required() {
        let result = command_argument_builder().try_get_matches_from(["sitegraph", "tree"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_sources_conflict() {
        let result = command_argument_builder().try_get_matches_from([
            "sitegraph",
            "fetch",
            "--url",
            "https://example.com/sitemap.xml",
            "--file",
            "sitemap.xml",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_layout_args() {
        let matches = command_argument_builder()
            .try_get_matches_from([
                "sitegraph",
                "layout",
                "--file",
                "sitemap.xml",
                "--layout",
                "radial",
                "--spacing",
                "80",
                "--max-nodes",
                "20",
            ])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "layout");
        assert_eq!(sub.get_one::<String>("layout").unwrap(), "radial");
        assert_eq!(*sub.get_one::<f64>("spacing").unwrap(), 80.0);
        assert_eq!(*sub.get_one::<usize>("max-nodes").unwrap(), 20);
    }

    #[test]
    fn test_layout_repeats() {
        let matches = command_argument_builder()
            .try_get_matches_from([
                "sitegraph", "layout", "--file", "sitemap.xml", "-l", "tree", "-l", "grid",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        let layouts: Vec<&String> = sub.get_many::<String>("layout").unwrap().collect();
        assert_eq!(layouts, ["tree", "grid"]);
        assert!(!sub.get_flag("keep-positions"));
    }

    #[test]
    fn test_keep_positions_needs_project() {
        let result = command_argument_builder().try_get_matches_from([
            "sitegraph",
            "layout",
            "--file",
            "sitemap.xml",
            "--db",
            "graph.db",
            "--keep-positions",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_move_args() {
        let matches = command_argument_builder()
            .try_get_matches_from([
                "sitegraph", "move", "--db", "graph.db", "--node", "abc", "--x", "-12.5", "--y",
                "40",
            ])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "move");
        assert_eq!(sub.get_one::<String>("node").unwrap(), "abc");
        assert_eq!(*sub.get_one::<f64>("x").unwrap(), -12.5);
        assert_eq!(*sub.get_one::<f64>("y").unwrap(), 40.0);
    }
}
